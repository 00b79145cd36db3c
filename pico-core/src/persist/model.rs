//! The persisted form of a channel.
//!
//! Every key of [ChannelSnapshot] must be present when decoding, though
//! optional values may be `null`.  Binary values are hex strings.

use bitcoin::secp256k1::SecretKey;
use bitcoin::{ScriptBuf, Transaction};
use serde_derive::{Deserialize, Serialize};

use crate::channel::{ChannelState, CommitEntry};
use crate::policy::error::{snapshot_error, ValidationError};
use crate::prelude::*;
use crate::tx::script::{CommitScriptParams, DepositScriptParams, Secret};
use crate::util::ser_util::{opt_transaction_hex, transaction_hex};

/// A persisted commit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitSnapshot {
    /// The commit transaction
    #[serde(with = "transaction_hex")]
    pub transaction: Transaction,
    /// The commit script
    pub script: ScriptBuf,
    /// The revoke secret, once revoked
    #[serde(deserialize_with = "serde::Deserialize::deserialize")]
    pub revoke_secret: Option<Secret>,
}

/// A persisted channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    /// 32-byte secret key of the payer role
    #[serde(deserialize_with = "serde::Deserialize::deserialize")]
    pub payer_key: Option<SecretKey>,
    /// 32-byte secret key of the payee role
    #[serde(deserialize_with = "serde::Deserialize::deserialize")]
    pub payee_key: Option<SecretKey>,
    /// The payee's spend secret
    #[serde(deserialize_with = "serde::Deserialize::deserialize")]
    pub spend_secret: Option<Secret>,
    /// Deposit script bytes
    #[serde(deserialize_with = "serde::Deserialize::deserialize")]
    pub deposit_script: Option<ScriptBuf>,
    /// Transactions are consensus-encoded
    #[serde(with = "opt_transaction_hex")]
    pub deposit_tx: Option<Transaction>,
    /// Payer timeout reclaim
    #[serde(with = "opt_transaction_hex")]
    pub timeout_tx: Option<Transaction>,
    /// Payer change reclaim
    #[serde(with = "opt_transaction_hex")]
    pub change_tx: Option<Transaction>,
    /// Revoke secrets of requested commits
    pub commits_requested: Vec<Secret>,
    /// Active commits, in ascending order of quantity
    pub commits_active: Vec<CommitSnapshot>,
    /// Revoked commits
    pub commits_revoked: Vec<CommitSnapshot>,
}

impl From<&CommitEntry> for CommitSnapshot {
    fn from(entry: &CommitEntry) -> Self {
        CommitSnapshot {
            transaction: entry.transaction.clone(),
            script: entry.script.clone(),
            revoke_secret: entry.revoke_secret.clone(),
        }
    }
}

impl TryFrom<CommitSnapshot> for CommitEntry {
    type Error = ValidationError;

    fn try_from(s: CommitSnapshot) -> Result<Self, Self::Error> {
        let params = CommitScriptParams::from_script(&s.script).map_err(|e| {
            snapshot_error(format!("commit script: {}", Into::<String>::into(e)))
        })?;
        if let Some(secret) = &s.revoke_secret {
            if secret.hash160() != params.revoke_secret_hash {
                return Err(snapshot_error(format!(
                    "revoke secret does not hash to {}",
                    params.revoke_secret_hash
                )));
            }
        }
        Ok(CommitEntry {
            transaction: s.transaction,
            script: s.script,
            revoke_secret: s.revoke_secret,
        })
    }
}

impl From<&ChannelState> for ChannelSnapshot {
    fn from(state: &ChannelState) -> Self {
        ChannelSnapshot {
            payer_key: state.payer_key,
            payee_key: state.payee_key,
            spend_secret: state.spend_secret.clone(),
            deposit_script: state.deposit_script.clone(),
            deposit_tx: state.deposit_tx.clone(),
            timeout_tx: state.timeout_tx.clone(),
            change_tx: state.change_tx.clone(),
            commits_requested: state.commits_requested.clone(),
            commits_active: state.commits_active.iter().map(CommitSnapshot::from).collect(),
            commits_revoked: state.commits_revoked.iter().map(CommitSnapshot::from).collect(),
        }
    }
}

impl TryFrom<ChannelSnapshot> for ChannelState {
    type Error = ValidationError;

    fn try_from(s: ChannelSnapshot) -> Result<Self, Self::Error> {
        if let Some(script) = &s.deposit_script {
            DepositScriptParams::from_script(script).map_err(|e| {
                snapshot_error(format!("deposit script: {}", Into::<String>::into(e)))
            })?;
        }
        let commits_active = s
            .commits_active
            .into_iter()
            .map(CommitEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let commits_revoked = s
            .commits_revoked
            .into_iter()
            .map(CommitEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChannelState {
            payer_key: s.payer_key,
            payee_key: s.payee_key,
            spend_secret: s.spend_secret,
            deposit_script: s.deposit_script,
            deposit_tx: s.deposit_tx,
            timeout_tx: s.timeout_tx,
            change_tx: s.change_tx,
            commits_requested: s.commits_requested,
            commits_active,
            commits_revoked,
        })
    }
}

/// Encode a snapshot as JSON
pub fn to_json(snapshot: &ChannelSnapshot) -> Result<String, ValidationError> {
    serde_json::to_string(snapshot).map_err(|e| snapshot_error(format!("to_json: {}", e)))
}

/// Decode a snapshot from JSON
pub fn from_json(json: &str) -> Result<ChannelSnapshot, ValidationError> {
    serde_json::from_str(json).map_err(|e| snapshot_error(format!("from_json: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::error::ValidationErrorKind;
    use crate::util::test_utils::*;
    use bitcoin::consensus::encode::serialize_hex;
    use pico_common::HexEncode;
    use serde_json::{json, Value};

    fn make_state() -> ChannelState {
        let secret = make_test_revoke_secret(1);
        let mut revoked = CommitEntry::new(
            make_test_tx(1, 100),
            make_test_commit_params(&secret, 2).to_script(),
        );
        revoked.revoke_secret = Some(secret);
        ChannelState {
            payer_key: Some(make_test_privkey(TEST_PAYER)),
            payee_key: None,
            spend_secret: None,
            deposit_script: Some(make_test_deposit_params(5).to_script()),
            deposit_tx: Some(make_test_tx(0, 1000)),
            timeout_tx: None,
            change_tx: None,
            commits_requested: vec![make_test_revoke_secret(3)],
            commits_active: vec![CommitEntry::new(
                make_test_tx(2, 200),
                make_test_commit_params(&make_test_revoke_secret(2), 2).to_script(),
            )],
            commits_revoked: vec![revoked],
        }
    }

    #[test]
    fn snapshot_format_test() {
        let state = make_state();
        let value: Value =
            serde_json::from_str(&to_json(&ChannelSnapshot::from(&state)).unwrap()).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 10);
        let payer_key = make_test_privkey(TEST_PAYER).secret_bytes().to_hex();
        assert_eq!(value["payer_key"], json!(payer_key));
        assert_eq!(value["payee_key"], Value::Null);
        assert_eq!(
            value["deposit_script"],
            json!(make_test_deposit_params(5).to_script().as_bytes().to_hex())
        );
        assert_eq!(value["deposit_tx"], json!(serialize_hex(&make_test_tx(0, 1000))));
        let requested = make_test_revoke_secret(3).as_slice().to_hex();
        assert_eq!(value["commits_requested"], json!([requested]));
        assert_eq!(value["commits_active"][0]["revoke_secret"], Value::Null);
        assert_eq!(
            value["commits_revoked"][0]["revoke_secret"],
            json!(make_test_revoke_secret(1).as_slice().to_hex())
        );
    }

    #[test]
    fn snapshot_round_trip_test() {
        let snapshot = ChannelSnapshot::from(&make_state());
        let decoded = from_json(&to_json(&snapshot).unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
        let state = ChannelState::try_from(decoded).unwrap();
        assert_eq!(ChannelSnapshot::from(&state), snapshot);
    }

    #[test]
    fn missing_key_rejected_test() {
        let snapshot = ChannelSnapshot::from(&make_state());
        for key in ["payee_key", "deposit_tx", "spend_secret", "commits_active"] {
            let mut value = serde_json::to_value(&snapshot).unwrap();
            value.as_object_mut().unwrap().remove(key);
            let err = from_json(&value.to_string()).unwrap_err();
            assert!(matches!(err.kind, ValidationErrorKind::Snapshot(_)), "{}", key);
        }
        let mut value = serde_json::to_value(&snapshot).unwrap();
        value["commits_revoked"][0].as_object_mut().unwrap().remove("revoke_secret");
        assert!(from_json(&value.to_string()).is_err());
    }

    #[test]
    fn malformed_value_rejected_test() {
        let snapshot = ChannelSnapshot::from(&make_state());
        for (key, bad) in [
            ("payer_key", json!("00")),
            ("deposit_tx", json!("zz")),
            ("spend_secret", json!("xyz")),
            ("deposit_script", json!(42)),
        ] {
            let mut value = serde_json::to_value(&snapshot).unwrap();
            value[key] = bad;
            assert!(from_json(&value.to_string()).is_err(), "{}", key);
        }
    }

    #[test]
    fn invalid_scripts_rejected_test() {
        let mut snapshot = ChannelSnapshot::from(&make_state());
        let commit_script = make_test_commit_params(&make_test_revoke_secret(1), 2).to_script();
        snapshot.deposit_script = Some(commit_script);
        let err = ChannelState::try_from(snapshot).unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::Snapshot(_)));

        let mut snapshot = ChannelSnapshot::from(&make_state());
        snapshot.commits_active[0].script = make_test_deposit_params(5).to_script();
        let err = ChannelState::try_from(snapshot).unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::Snapshot(_)));

        let mut snapshot = ChannelSnapshot::from(&make_state());
        snapshot.commits_revoked[0].revoke_secret = Some(make_test_revoke_secret(9));
        let err = ChannelState::try_from(snapshot).unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::Snapshot(_)));
    }
}
