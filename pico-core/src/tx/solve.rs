//! Spending witnesses for the deposit and commit scripts.
//!
//! A witness here is the sequence of pushes that satisfies one branch of a
//! template, in script form.  The redeem script itself is not included.

use bitcoin::opcodes::all::{OP_PUSHBYTES_0, OP_PUSHNUM_1};
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, LegacySighash};
use bitcoin::{Script, ScriptBuf};
use tracing::*;

use super::script::{get_word, CommitScriptParams, DepositScriptParams, Secret};
use crate::policy::error::{
    script_format_error, signature_verification_error, undefined_role_error, ValidationError,
};
use crate::prelude::*;
use crate::util::crypto_utils::{
    ecdsa_sign, ecdsa_verify, parse_bitcoin_signature, signature_to_bitcoin_vec,
};
use crate::{mismatch_err, script_format_err};

/// Length of the all-zero stand-in for the payee signature in a commit
/// that the payee has not signed yet
pub const PLACEHOLDER_SIGNATURE_LEN: usize = 72;

/// Looks up the secret key for a public key
pub trait KeyLookup {
    /// The secret key for `pubkey`, if known
    fn secret_key_for(&self, secp_ctx: &Secp256k1<All>, pubkey: &PublicKey) -> Option<SecretKey>;
}

impl KeyLookup for [SecretKey] {
    fn secret_key_for(&self, secp_ctx: &Secp256k1<All>, pubkey: &PublicKey) -> Option<SecretKey> {
        self.iter().find(|key| key.public_key(secp_ctx) == *pubkey).cloned()
    }
}

impl KeyLookup for Vec<SecretKey> {
    fn secret_key_for(&self, secp_ctx: &Secp256k1<All>, pubkey: &PublicKey) -> Option<SecretKey> {
        self.as_slice().secret_key_for(secp_ctx, pubkey)
    }
}

/// What to sign, and with which keys
pub struct SigningInput<'a> {
    /// Signing context
    pub secp_ctx: &'a Secp256k1<All>,
    /// Key material of the signing party
    pub keys: &'a dyn KeyLookup,
    /// The sighash of the spending input
    pub sighash: LegacySighash,
    /// Appended to each signature
    pub sighash_type: EcdsaSighashType,
}

/// Payer reclaims the deposit after the expire time
#[derive(Clone, Debug, Default)]
pub struct TimeoutSpend;

/// Payer reclaims the remaining deposit with the disclosed spend secret
#[derive(Clone, Debug)]
pub struct ChangeSpend {
    /// The payee's spend secret
    pub spend_secret: Secret,
}

/// Payer signs its half of the 2-of-2 for a new commit
#[derive(Clone, Debug, Default)]
pub struct CreateCommitSpend {
    /// Stand-in for the payee signature, all-zero by default
    pub placeholder: Option<Vec<u8>>,
}

/// Payee checks the payer signature and completes the 2-of-2
#[derive(Clone, Debug)]
pub struct FinalizeCommitSpend {
    /// The witness produced by [CreateCommitSpend]
    pub existing_witness: ScriptBuf,
}

/// Payee claims a commit after the delay time
#[derive(Clone, Debug)]
pub struct PayoutSpend {
    /// The payee's spend secret
    pub spend_secret: Secret,
}

/// Payer claims a revoked commit
#[derive(Clone, Debug)]
pub struct RevokeSpend {
    /// The revoke secret of the commit
    pub revoke_secret: Secret,
}

/// The spend path to build a witness for
#[derive(Clone, Debug)]
pub enum SpendType {
    /// Deposit: timelocked payer reclaim
    Timeout(TimeoutSpend),
    /// Deposit: secret-reveal payer reclaim
    Change(ChangeSpend),
    /// Deposit: payer half of the multisig
    CreateCommit(CreateCommitSpend),
    /// Deposit: full multisig
    FinalizeCommit(FinalizeCommitSpend),
    /// Commit: payee payout
    Payout(PayoutSpend),
    /// Commit: payer revocation
    Revoke(RevokeSpend),
}

impl SpendType {
    /// A short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SpendType::Timeout(_) => "timeout",
            SpendType::Change(_) => "change",
            SpendType::CreateCommit(_) => "create_commit",
            SpendType::FinalizeCommit(_) => "finalize_commit",
            SpendType::Payout(_) => "payout",
            SpendType::Revoke(_) => "revoke",
        }
    }
}

/// A decoded script of either template
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptTemplate {
    /// A deposit script
    Deposit(DepositScriptParams),
    /// A commit script
    Commit(CommitScriptParams),
}

impl ScriptTemplate {
    /// Decode a script of either template
    pub fn from_script(script: &Script) -> Result<Self, ValidationError> {
        if let Ok(params) = DepositScriptParams::from_script(script) {
            return Ok(ScriptTemplate::Deposit(params));
        }
        if let Ok(params) = CommitScriptParams::from_script(script) {
            return Ok(ScriptTemplate::Commit(params));
        }
        mismatch_err!("unknown script template: {}", script.to_asm_string())
    }

    /// Compile back to a script
    pub fn to_script(&self) -> ScriptBuf {
        match self {
            ScriptTemplate::Deposit(params) => params.to_script(),
            ScriptTemplate::Commit(params) => params.to_script(),
        }
    }

    /// Build the witness for `spend`
    pub fn solve(
        &self,
        input: &SigningInput,
        spend: &SpendType,
    ) -> Result<ScriptBuf, ValidationError> {
        match self {
            ScriptTemplate::Deposit(params) => params.solve(input, spend),
            ScriptTemplate::Commit(params) => params.solve(input, spend),
        }
    }
}

fn sign(input: &SigningInput, pubkey: &PublicKey) -> Result<Vec<u8>, ValidationError> {
    let key = input
        .keys
        .secret_key_for(input.secp_ctx, pubkey)
        .ok_or_else(|| undefined_role_error(format!("sign: no secret key for {}", pubkey)))?;
    let sig = ecdsa_sign(input.secp_ctx, &key, &input.sighash);
    Ok(signature_to_bitcoin_vec(sig, input.sighash_type))
}

fn push_data(builder: Builder, data: &[u8]) -> Result<Builder, ValidationError> {
    let bytes = PushBytesBuf::try_from(data.to_vec())
        .map_err(|_| script_format_error(format!("push_data: {} bytes", data.len())))?;
    Ok(builder.push_slice(bytes))
}

impl DepositScriptParams {
    /// Build the witness for a deposit spend path
    pub fn solve(
        &self,
        input: &SigningInput,
        spend: &SpendType,
    ) -> Result<ScriptBuf, ValidationError> {
        debug!("solving deposit {} with {:?}", spend.name(), input.sighash_type);
        match spend {
            SpendType::Timeout(_) => self.solve_timeout(input),
            SpendType::Change(s) => self.solve_change(input, s),
            SpendType::CreateCommit(s) => self.solve_create_commit(input, s),
            SpendType::FinalizeCommit(s) => self.solve_finalize_commit(input, s),
            _ => mismatch_err!("{} does not spend a deposit script", spend.name()),
        }
    }

    fn solve_timeout(&self, input: &SigningInput) -> Result<ScriptBuf, ValidationError> {
        let sig = sign(input, &self.payer_pubkey)?;
        Ok(push_data(Builder::new(), &sig)?
            .push_opcode(OP_PUSHBYTES_0)
            .push_opcode(OP_PUSHBYTES_0)
            .into_script())
    }

    fn solve_change(
        &self,
        input: &SigningInput,
        spend: &ChangeSpend,
    ) -> Result<ScriptBuf, ValidationError> {
        if spend.spend_secret.hash160() != self.spend_secret_hash {
            mismatch_err!("spend secret does not hash to {}", self.spend_secret_hash);
        }
        let sig = sign(input, &self.payer_pubkey)?;
        let builder = push_data(Builder::new(), &sig)?;
        Ok(push_data(builder, spend.spend_secret.as_slice())?
            .push_opcode(OP_PUSHNUM_1)
            .push_opcode(OP_PUSHBYTES_0)
            .into_script())
    }

    fn solve_create_commit(
        &self,
        input: &SigningInput,
        spend: &CreateCommitSpend,
    ) -> Result<ScriptBuf, ValidationError> {
        let sig = sign(input, &self.payer_pubkey)?;
        let placeholder =
            spend.placeholder.clone().unwrap_or_else(|| vec![0u8; PLACEHOLDER_SIGNATURE_LEN]);
        let builder = push_data(Builder::new().push_opcode(OP_PUSHBYTES_0), &sig)?;
        Ok(push_data(builder, &placeholder)?.push_opcode(OP_PUSHNUM_1).into_script())
    }

    fn solve_finalize_commit(
        &self,
        input: &SigningInput,
        spend: &FinalizeCommitSpend,
    ) -> Result<ScriptBuf, ValidationError> {
        let existing = &spend.existing_witness;
        if get_word(existing, 0)?.opcode != OP_PUSHBYTES_0.to_u8() {
            script_format_err!("existing witness does not start with OP_0");
        }
        if existing.instructions().count() != 4
            || get_word(existing, 3)?.opcode != OP_PUSHNUM_1.to_u8()
        {
            script_format_err!("existing witness is not OP_0 <sig> <sig> OP_1");
        }
        let payer_sig = get_word(existing, 1)?.data;
        let (sig, sighash_type) = parse_bitcoin_signature(&payer_sig).map_err(|e| {
            signature_verification_error(format!("solve_finalize_commit: bad payer sig: {}", e))
        })?;
        if sighash_type != input.sighash_type {
            return Err(signature_verification_error(format!(
                "solve_finalize_commit: payer sighash type {:?} != {:?}",
                sighash_type, input.sighash_type
            )));
        }
        if !ecdsa_verify(input.secp_ctx, &self.payer_pubkey, &input.sighash, &sig) {
            error!("payer signature does not verify for {}", self.payer_pubkey);
            return Err(signature_verification_error(
                "solve_finalize_commit: invalid payer signature",
            ));
        }
        let payee_sig = sign(input, &self.payee_pubkey)?;
        let builder = push_data(Builder::new().push_opcode(OP_PUSHBYTES_0), &payer_sig)?;
        Ok(push_data(builder, &payee_sig)?.push_opcode(OP_PUSHNUM_1).into_script())
    }
}

impl CommitScriptParams {
    /// Build the witness for a commit spend path
    pub fn solve(
        &self,
        input: &SigningInput,
        spend: &SpendType,
    ) -> Result<ScriptBuf, ValidationError> {
        debug!("solving commit {} with {:?}", spend.name(), input.sighash_type);
        match spend {
            SpendType::Payout(s) => {
                let sig = sign(input, &self.payee_pubkey)?;
                let builder = push_data(Builder::new(), &sig)?;
                Ok(push_data(builder, s.spend_secret.as_slice())?
                    .push_opcode(OP_PUSHNUM_1)
                    .into_script())
            }
            SpendType::Revoke(s) => {
                let sig = sign(input, &self.payer_pubkey)?;
                let builder = push_data(Builder::new(), &sig)?;
                Ok(push_data(builder, s.revoke_secret.as_slice())?
                    .push_opcode(OP_PUSHBYTES_0)
                    .into_script())
            }
            _ => mismatch_err!("{} does not spend a commit script", spend.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::error::ValidationErrorKind;
    use crate::util::crypto_utils::bitcoin_vec_to_signature;
    use crate::util::test_utils::{
        make_test_privkey, make_test_pubkey, TEST_REVOKE_SECRET, TEST_SPEND_SECRET,
    };
    use bitcoin::hashes::Hash;
    use test_log::test;

    const PAYER: u8 = 1;
    const PAYEE: u8 = 2;

    fn deposit_params() -> DepositScriptParams {
        DepositScriptParams {
            payer_pubkey: make_test_pubkey(PAYER),
            payee_pubkey: make_test_pubkey(PAYEE),
            spend_secret_hash: Secret::new(&TEST_SPEND_SECRET).hash160(),
            expire_time: 5,
        }
    }

    fn commit_params() -> CommitScriptParams {
        CommitScriptParams {
            payer_pubkey: make_test_pubkey(PAYER),
            payee_pubkey: make_test_pubkey(PAYEE),
            spend_secret_hash: Secret::new(&TEST_SPEND_SECRET).hash160(),
            revoke_secret_hash: Secret::new(&TEST_REVOKE_SECRET).hash160(),
            delay_time: 2,
        }
    }

    fn input<'a>(
        secp_ctx: &'a Secp256k1<All>,
        keys: &'a Vec<SecretKey>,
        sighash: [u8; 32],
    ) -> SigningInput<'a> {
        SigningInput {
            secp_ctx,
            keys,
            sighash: LegacySighash::from_byte_array(sighash),
            sighash_type: EcdsaSighashType::All,
        }
    }

    fn assert_signed_by(secp_ctx: &Secp256k1<All>, sigvec: &[u8], key: u8, sighash: [u8; 32]) {
        let sig = bitcoin_vec_to_signature(sigvec, EcdsaSighashType::All).unwrap();
        let sighash = LegacySighash::from_byte_array(sighash);
        assert!(ecdsa_verify(secp_ctx, &make_test_pubkey(key), &sighash, &sig));
    }

    fn word_count(script: &Script) -> usize {
        script.instructions().count()
    }

    #[test]
    fn timeout_test() {
        let secp_ctx = Secp256k1::new();
        let keys = vec![make_test_privkey(PAYER)];
        let witness = deposit_params()
            .solve(&input(&secp_ctx, &keys, [3; 32]), &SpendType::Timeout(TimeoutSpend))
            .unwrap();
        assert_eq!(word_count(&witness), 3);
        assert_signed_by(&secp_ctx, &get_word(&witness, 0).unwrap().data, PAYER, [3; 32]);
        assert_eq!(get_word(&witness, 1).unwrap().opcode, 0);
        assert_eq!(get_word(&witness, 2).unwrap().opcode, 0);
    }

    #[test]
    fn change_test() {
        let secp_ctx = Secp256k1::new();
        let keys = vec![make_test_privkey(PAYER)];
        let spend_secret = Secret::new(&TEST_SPEND_SECRET);
        let spend = SpendType::Change(ChangeSpend { spend_secret });
        let witness = deposit_params().solve(&input(&secp_ctx, &keys, [3; 32]), &spend).unwrap();
        assert_eq!(word_count(&witness), 4);
        assert_eq!(get_word(&witness, 1).unwrap().data, TEST_SPEND_SECRET.to_vec());
        assert_eq!(get_word(&witness, 2).unwrap().opcode, OP_PUSHNUM_1.to_u8());
        assert_eq!(get_word(&witness, 3).unwrap().opcode, 0);

        let spend = SpendType::Change(ChangeSpend { spend_secret: Secret::new(&[9; 32]) });
        let err = deposit_params().solve(&input(&secp_ctx, &keys, [3; 32]), &spend).unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::Mismatch(_)));
    }

    #[test]
    fn create_and_finalize_commit_test() {
        let secp_ctx = Secp256k1::new();
        let params = deposit_params();
        let payer_keys = vec![make_test_privkey(PAYER)];
        let created = params
            .solve(
                &input(&secp_ctx, &payer_keys, [4; 32]),
                &SpendType::CreateCommit(CreateCommitSpend::default()),
            )
            .unwrap();
        assert_eq!(word_count(&created), 4);
        assert_eq!(get_word(&created, 0).unwrap().opcode, 0);
        assert_eq!(get_word(&created, 2).unwrap().data, vec![0u8; PLACEHOLDER_SIGNATURE_LEN]);
        assert_eq!(get_word(&created, 3).unwrap().opcode, OP_PUSHNUM_1.to_u8());

        let payee_keys = vec![make_test_privkey(PAYEE)];
        let spend =
            SpendType::FinalizeCommit(FinalizeCommitSpend { existing_witness: created.clone() });
        let finalized = params.solve(&input(&secp_ctx, &payee_keys, [4; 32]), &spend).unwrap();
        assert_eq!(word_count(&finalized), 4);
        assert_eq!(get_word(&finalized, 1).unwrap(), get_word(&created, 1).unwrap());
        assert_signed_by(&secp_ctx, &get_word(&finalized, 1).unwrap().data, PAYER, [4; 32]);
        assert_signed_by(&secp_ctx, &get_word(&finalized, 2).unwrap().data, PAYEE, [4; 32]);
    }

    #[test]
    fn create_commit_placeholder_test() {
        let secp_ctx = Secp256k1::new();
        let keys = vec![make_test_privkey(PAYER)];
        let spend = SpendType::CreateCommit(CreateCommitSpend { placeholder: Some(vec![7; 10]) });
        let created = deposit_params().solve(&input(&secp_ctx, &keys, [4; 32]), &spend).unwrap();
        assert_eq!(get_word(&created, 2).unwrap().data, vec![7; 10]);
    }

    #[test]
    fn finalize_rejects_bad_signature_test() {
        let secp_ctx = Secp256k1::new();
        let params = deposit_params();
        let payer_keys = vec![make_test_privkey(PAYER)];
        let payee_keys = vec![make_test_privkey(PAYEE)];
        // well-formed, but over a different sighash
        let created = params
            .solve(
                &input(&secp_ctx, &payer_keys, [5; 32]),
                &SpendType::CreateCommit(CreateCommitSpend::default()),
            )
            .unwrap();
        let spend = SpendType::FinalizeCommit(FinalizeCommitSpend { existing_witness: created });
        let err = params.solve(&input(&secp_ctx, &payee_keys, [6; 32]), &spend).unwrap_err();
        assert_eq!(
            err.kind,
            ValidationErrorKind::SignatureVerification(
                "solve_finalize_commit: invalid payer signature".to_string()
            )
        );

        // signed by the payee instead of the payer
        let sig = ecdsa_sign(
            &secp_ctx,
            &make_test_privkey(PAYEE),
            &LegacySighash::from_byte_array([6; 32]),
        );
        let forged = signature_to_bitcoin_vec(sig, EcdsaSighashType::All);
        let builder = push_data(Builder::new().push_opcode(OP_PUSHBYTES_0), &forged).unwrap();
        let existing_witness =
            push_data(builder, &[0; 72]).unwrap().push_opcode(OP_PUSHNUM_1).into_script();
        let spend = SpendType::FinalizeCommit(FinalizeCommitSpend { existing_witness });
        let err = params.solve(&input(&secp_ctx, &payee_keys, [6; 32]), &spend).unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::SignatureVerification(_)));
    }

    #[test]
    fn finalize_rejects_witness_shape_test() {
        let secp_ctx = Secp256k1::new();
        let params = deposit_params();
        let payer_keys = vec![make_test_privkey(PAYER)];
        let payee_keys = vec![make_test_privkey(PAYEE)];
        let created = params
            .solve(
                &input(&secp_ctx, &payer_keys, [5; 32]),
                &SpendType::CreateCommit(CreateCommitSpend::default()),
            )
            .unwrap();
        let payer_sig = get_word(&created, 1).unwrap().data;
        let start = || push_data(Builder::new().push_opcode(OP_PUSHBYTES_0), &payer_sig).unwrap();

        let truncated = push_data(start(), &[0; 72]).unwrap().into_script();
        let extra = push_data(start(), &[0; 72])
            .unwrap()
            .push_opcode(OP_PUSHNUM_1)
            .push_opcode(OP_PUSHNUM_1)
            .into_script();
        let wrong_branch =
            push_data(start(), &[0; 72]).unwrap().push_opcode(OP_PUSHBYTES_0).into_script();
        for existing_witness in [truncated, extra, wrong_branch] {
            let spend = SpendType::FinalizeCommit(FinalizeCommitSpend { existing_witness });
            let err = params.solve(&input(&secp_ctx, &payee_keys, [5; 32]), &spend).unwrap_err();
            assert!(matches!(err.kind, ValidationErrorKind::ScriptFormat(_)), "{:?}", err);
        }

        // the well-formed witness still finalizes
        let spend = SpendType::FinalizeCommit(FinalizeCommitSpend { existing_witness: created });
        assert!(params.solve(&input(&secp_ctx, &payee_keys, [5; 32]), &spend).is_ok());
    }

    #[test]
    fn finalize_rejects_sighash_type_mismatch_test() {
        let secp_ctx = Secp256k1::new();
        let params = deposit_params();
        let payer_keys = vec![make_test_privkey(PAYER)];
        let mut payer_input = input(&secp_ctx, &payer_keys, [5; 32]);
        payer_input.sighash_type = EcdsaSighashType::Single;
        let created = params
            .solve(&payer_input, &SpendType::CreateCommit(CreateCommitSpend::default()))
            .unwrap();
        let payee_keys = vec![make_test_privkey(PAYEE)];
        let spend = SpendType::FinalizeCommit(FinalizeCommitSpend { existing_witness: created });
        let err = params.solve(&input(&secp_ctx, &payee_keys, [5; 32]), &spend).unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::SignatureVerification(_)));
    }

    #[test]
    fn payout_and_revoke_test() {
        let secp_ctx = Secp256k1::new();
        let params = commit_params();
        let payee_keys = vec![make_test_privkey(PAYEE)];
        let spend_secret = Secret::new(&TEST_SPEND_SECRET);
        let spend = SpendType::Payout(PayoutSpend { spend_secret });
        let payout = params.solve(&input(&secp_ctx, &payee_keys, [8; 32]), &spend).unwrap();
        assert_eq!(word_count(&payout), 3);
        assert_signed_by(&secp_ctx, &get_word(&payout, 0).unwrap().data, PAYEE, [8; 32]);
        assert_eq!(get_word(&payout, 1).unwrap().data, TEST_SPEND_SECRET.to_vec());
        assert_eq!(get_word(&payout, 2).unwrap().opcode, OP_PUSHNUM_1.to_u8());

        let payer_keys = vec![make_test_privkey(PAYER)];
        let spend =
            SpendType::Revoke(RevokeSpend { revoke_secret: Secret::new(&TEST_REVOKE_SECRET) });
        let revoke = params.solve(&input(&secp_ctx, &payer_keys, [8; 32]), &spend).unwrap();
        assert_eq!(word_count(&revoke), 3);
        assert_signed_by(&secp_ctx, &get_word(&revoke, 0).unwrap().data, PAYER, [8; 32]);
        assert_eq!(get_word(&revoke, 1).unwrap().data, TEST_REVOKE_SECRET.to_vec());
        assert_eq!(get_word(&revoke, 2).unwrap().opcode, 0);
    }

    #[test]
    fn wrong_template_test() {
        let secp_ctx = Secp256k1::new();
        let keys = vec![make_test_privkey(PAYER), make_test_privkey(PAYEE)];
        let err = commit_params()
            .solve(&input(&secp_ctx, &keys, [1; 32]), &SpendType::Timeout(TimeoutSpend))
            .unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::Mismatch(_)));
        let spend_secret = Secret::new(&TEST_SPEND_SECRET);
        let spend = SpendType::Payout(PayoutSpend { spend_secret });
        let err = deposit_params().solve(&input(&secp_ctx, &keys, [1; 32]), &spend).unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::Mismatch(_)));
    }

    #[test]
    fn missing_key_test() {
        let secp_ctx = Secp256k1::new();
        let keys = vec![make_test_privkey(PAYEE)];
        let err = deposit_params()
            .solve(&input(&secp_ctx, &keys, [1; 32]), &SpendType::Timeout(TimeoutSpend))
            .unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::UndefinedRole(_)));
    }

    #[test]
    fn template_detection_test() {
        let deposit = deposit_params();
        let commit = commit_params();
        assert_eq!(
            ScriptTemplate::from_script(&deposit.to_script()).unwrap(),
            ScriptTemplate::Deposit(deposit.clone())
        );
        assert_eq!(
            ScriptTemplate::from_script(&commit.to_script()).unwrap(),
            ScriptTemplate::Commit(commit.clone())
        );
        assert_eq!(ScriptTemplate::Commit(commit.clone()).to_script(), commit.to_script());
        let err = ScriptTemplate::from_script(&ScriptBuf::from_bytes(vec![0x51])).unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::Mismatch(_)));
    }
}
