use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};

use crate::chain::oracle::{ConfirmationOracle, Error};
use crate::prelude::*;
use crate::tx::script::{CommitScriptParams, DepositScriptParams, Secret};

// ValidationError assertions:

#[allow(unused)]
#[cfg(test)]
macro_rules! assert_validation_ok {
    ($res: expr) => {
        if $res.is_err() {
            panic!("unexpected ValidationError: {:#?}", $res.unwrap_err());
        }
    };
}

#[allow(unused)]
#[cfg(test)]
macro_rules! assert_error_kind {
    ($res: expr, $kind: ident) => {
        match $res {
            Ok(_) => panic!("expected {} error", stringify!($kind)),
            // avoid printing the backtrace ...
            Err(e) => assert!(
                matches!(e.kind, $crate::policy::error::ValidationErrorKind::$kind(_)),
                "expected {}, got {:?}",
                stringify!($kind),
                e.kind
            ),
        }
    };
}

/// The payer's key index in tests
pub const TEST_PAYER: u8 = 1;
/// The payee's key index in tests
pub const TEST_PAYEE: u8 = 2;

pub const TEST_SPEND_SECRET: [u8; 32] = [0xa5; 32];
pub const TEST_REVOKE_SECRET: [u8; 32] = [0x5a; 32];

/// Make a secp256k1 test key pair
pub fn make_test_key(i: u8) -> (PublicKey, SecretKey) {
    let secp_ctx = Secp256k1::signing_only();
    let secret_key = SecretKey::from_slice(&[i; 32]).unwrap();
    (PublicKey::from_secret_key(&secp_ctx, &secret_key), secret_key)
}

pub fn make_test_pubkey(i: u8) -> PublicKey {
    make_test_key(i).0
}

pub fn make_test_privkey(i: u8) -> SecretKey {
    make_test_key(i).1
}

/// A revoke secret distinct for each `i`
pub fn make_test_revoke_secret(i: u8) -> Secret {
    let mut bytes = TEST_REVOKE_SECRET;
    bytes[0] = i;
    Secret::new(&bytes)
}

pub fn make_test_deposit_params(expire_time: u16) -> DepositScriptParams {
    DepositScriptParams {
        payer_pubkey: make_test_pubkey(TEST_PAYER),
        payee_pubkey: make_test_pubkey(TEST_PAYEE),
        spend_secret_hash: Secret::new(&TEST_SPEND_SECRET).hash160(),
        expire_time,
    }
}

pub fn make_test_commit_params(revoke_secret: &Secret, delay_time: u16) -> CommitScriptParams {
    CommitScriptParams {
        payer_pubkey: make_test_pubkey(TEST_PAYER),
        payee_pubkey: make_test_pubkey(TEST_PAYEE),
        spend_secret_hash: Secret::new(&TEST_SPEND_SECRET).hash160(),
        revoke_secret_hash: revoke_secret.hash160(),
        delay_time,
    }
}

/// A transaction whose txid is distinct for each `vout`, paying `value` sats
pub fn make_test_tx(vout: u32, value: u64) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint { txid: Txid::all_zeros(), vout },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ZERO,
            witness: Witness::default(),
        }],
        output: vec![TxOut { value: Amount::from_sat(value), script_pubkey: ScriptBuf::new() }],
    }
}

/// An in-memory confirmation oracle
pub struct MockOracle {
    confirms: Mutex<Map<Txid, u32>>,
    quantities: Mutex<Map<Txid, u64>>,
    unavailable: Mutex<bool>,
}

impl SendSync for MockOracle {}

impl MockOracle {
    pub fn new() -> Self {
        MockOracle {
            confirms: Mutex::new(Map::new()),
            quantities: Mutex::new(Map::new()),
            unavailable: Mutex::new(false),
        }
    }

    pub fn set_confirms(&self, tx: &Transaction, confirms: u32) {
        self.confirms.lock().unwrap().insert(tx.compute_txid(), confirms);
    }

    pub fn set_quantity(&self, tx: &Transaction, quantity: u64) {
        self.quantities.lock().unwrap().insert(tx.compute_txid(), quantity);
    }

    /// Make every call fail with [Error::Unavailable]
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn check_available(&self) -> Result<(), Error> {
        if *self.unavailable.lock().unwrap() {
            return Err(Error::Unavailable("mock oracle offline".to_string()));
        }
        Ok(())
    }
}

impl ConfirmationOracle for MockOracle {
    fn confirmations(&self, txid: &Txid) -> Result<u32, Error> {
        self.check_available()?;
        Ok(self.confirms.lock().unwrap().get(txid).copied().unwrap_or(0))
    }

    fn output_quantity(&self, tx: &Transaction) -> Result<u64, Error> {
        self.check_available()?;
        let txid = tx.compute_txid();
        self.quantities
            .lock()
            .unwrap()
            .get(&txid)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("no quantity for {}", txid)))
    }
}
