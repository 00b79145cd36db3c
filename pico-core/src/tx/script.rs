//! The deposit and commit script templates.
//!
//! Deposit script:
//!
//! ```text
//! OP_IF
//!     2 <payer_pubkey> <payee_pubkey> 2 OP_CHECKMULTISIG
//! OP_ELSE
//!     OP_IF
//!         OP_HASH160 <spend_secret_hash> OP_EQUALVERIFY
//!         <payer_pubkey> OP_CHECKSIG
//!     OP_ELSE
//!         <expire_time> OP_CHECKSEQUENCEVERIFY OP_DROP
//!         <payer_pubkey> OP_CHECKSIG
//!     OP_ENDIF
//! OP_ENDIF
//! ```
//!
//! Commit script:
//!
//! ```text
//! OP_IF
//!     <delay_time> OP_CHECKSEQUENCEVERIFY OP_DROP
//!     OP_HASH160 <spend_secret_hash> OP_EQUALVERIFY
//!     <payee_pubkey> OP_CHECKSIG
//! OP_ELSE
//!     OP_HASH160 <revoke_secret_hash> OP_EQUALVERIFY
//!     <payer_pubkey> OP_CHECKSIG
//! OP_ENDIF
//! ```
//!
//! Fields are extracted by their word position in the script.  Full
//! decompilation recompiles the extracted fields and requires a byte-exact
//! match, which verifies the template shape.

use core::fmt;

use bitcoin::hashes::hash160;
use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::*;
use bitcoin::opcodes::Opcode;
use bitcoin::script::{Builder, Instruction};
use bitcoin::secp256k1::PublicKey;
use bitcoin::{Script, ScriptBuf};
use pico_common::HexEncode;
use serde_derive::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, Bytes, IfIsHumanReadable};

use crate::policy::error::{script_format_error, timelock_range_error, ValidationError};
use crate::prelude::*;
use crate::util::crypto_utils::hash160;
use crate::{mismatch_err, script_format_err};

/// The largest relative timelock, in BIP68 block units
pub const MAX_SEQUENCE: u32 = 0x0000FFFF;

const DEPOSIT_PAYER_PUBKEY_WORD: usize = 2;
const DEPOSIT_PAYEE_PUBKEY_WORD: usize = 3;
const DEPOSIT_SPEND_SECRET_HASH_WORD: usize = 9;
const DEPOSIT_EXPIRE_TIME_WORD: usize = 14;

const COMMIT_DELAY_TIME_WORD: usize = 1;
const COMMIT_SPEND_SECRET_HASH_WORD: usize = 5;
const COMMIT_PAYEE_PUBKEY_WORD: usize = 7;
const COMMIT_REVOKE_SECRET_HASH_WORD: usize = 11;
const COMMIT_PAYER_PUBKEY_WORD: usize = 13;

// raw opcode values used when decoding sequence numbers
const OPCODE_ZERO: u8 = 0x00;
const OPCODE_PUSHBYTES_1: u8 = 0x01;
const OPCODE_PUSHBYTES_75: u8 = 0x4b;
const OPCODE_PUSHNUM_1: u8 = 0x51;
const OPCODE_PUSHNUM_16: u8 = 0x60;

/// A preimage whose hash160 is committed to in a script
#[serde_as]
#[derive(PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Secret(#[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")] Vec<u8>);

impl Secret {
    /// Create a secret
    pub fn new(inner: &[u8]) -> Self {
        Self(inner.to_vec())
    }

    /// Convert to a byte slice
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// The hash160 committed to in scripts
    pub fn hash160(&self) -> hash160::Hash {
        hash160(&self.0)
    }
}

// Only the hash is shown, so secrets stay out of the logs
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(hash160={})", self.hash160())
    }
}

/// An opcode and the data it pushes, if any
#[derive(Clone, PartialEq, Eq)]
pub struct ScriptWord {
    /// The raw opcode byte
    pub opcode: u8,
    /// The pushed data, empty for non-push opcodes
    pub data: Vec<u8>,
}

impl fmt::Debug for ScriptWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.data.is_empty() {
            write!(f, "{:?}", Opcode::from(self.opcode))
        } else {
            write!(f, "{:?} {}", Opcode::from(self.opcode), self.data.to_hex())
        }
    }
}

/// Return the word at position `index` of the script
pub fn get_word(script: &Script, index: usize) -> Result<ScriptWord, ValidationError> {
    let bytes = script.as_bytes();
    for (n, item) in script.instruction_indices().enumerate() {
        let (pos, ins) = item.map_err(|e| {
            script_format_error(format!("get_word: unparseable opcode at word {}: {:?}", n, e))
        })?;
        if n == index {
            let data = match ins {
                Instruction::PushBytes(d) => d.as_bytes().to_vec(),
                Instruction::Op(_) => Vec::new(),
            };
            return Ok(ScriptWord { opcode: bytes[pos], data });
        }
    }
    script_format_err!("word {} out of range", index)
}

/// Decode a relative timelock from a script word.
///
/// Direct pushes are read as unsigned little-endian integers.
pub fn parse_sequence_value(word: &ScriptWord) -> Result<u16, ValidationError> {
    let value: u64 = match word.opcode {
        OPCODE_ZERO => 0,
        OPCODE_PUSHBYTES_1..=OPCODE_PUSHBYTES_75 => {
            if word.data.len() > 8 {
                return Err(timelock_range_error(format!(
                    "parse_sequence_value: {} byte push exceeds {}",
                    word.data.len(),
                    MAX_SEQUENCE
                )));
            }
            word.data.iter().rev().fold(0u64, |acc, b| (acc << 8) | *b as u64)
        }
        OPCODE_PUSHNUM_1..=OPCODE_PUSHNUM_16 => (word.opcode - OPCODE_PUSHNUM_1 + 1) as u64,
        _ => script_format_err!("invalid sequence value: {:?}", word),
    };
    if value > MAX_SEQUENCE as u64 {
        return Err(timelock_range_error(format!(
            "parse_sequence_value: {} > {}",
            value, MAX_SEQUENCE
        )));
    }
    Ok(value as u16)
}

fn parse_pubkey(script: &Script, index: usize) -> Result<PublicKey, ValidationError> {
    let word = get_word(script, index)?;
    PublicKey::from_slice(&word.data).map_err(|_| {
        script_format_error(format!("parse_pubkey: word {} is not a public key: {:?}", index, word))
    })
}

fn parse_hash160(script: &Script, index: usize) -> Result<hash160::Hash, ValidationError> {
    let word = get_word(script, index)?;
    hash160::Hash::from_slice(&word.data).map_err(|_| {
        script_format_error(format!("parse_hash160: word {} is not a hash160: {:?}", index, word))
    })
}

/// The payer public key of a deposit script
pub fn get_deposit_payer_pubkey(script: &Script) -> Result<PublicKey, ValidationError> {
    parse_pubkey(script, DEPOSIT_PAYER_PUBKEY_WORD)
}

/// The payee public key of a deposit script
pub fn get_deposit_payee_pubkey(script: &Script) -> Result<PublicKey, ValidationError> {
    parse_pubkey(script, DEPOSIT_PAYEE_PUBKEY_WORD)
}

/// The spend secret hash of a deposit script
pub fn get_deposit_spend_secret_hash(script: &Script) -> Result<hash160::Hash, ValidationError> {
    parse_hash160(script, DEPOSIT_SPEND_SECRET_HASH_WORD)
}

/// The expire time of a deposit script
pub fn get_deposit_expire_time(script: &Script) -> Result<u16, ValidationError> {
    parse_sequence_value(&get_word(script, DEPOSIT_EXPIRE_TIME_WORD)?)
}

/// The delay time of a commit script
pub fn get_commit_delay_time(script: &Script) -> Result<u16, ValidationError> {
    parse_sequence_value(&get_word(script, COMMIT_DELAY_TIME_WORD)?)
}

/// The spend secret hash of a commit script
pub fn get_commit_spend_secret_hash(script: &Script) -> Result<hash160::Hash, ValidationError> {
    parse_hash160(script, COMMIT_SPEND_SECRET_HASH_WORD)
}

/// The payee public key of a commit script
pub fn get_commit_payee_pubkey(script: &Script) -> Result<PublicKey, ValidationError> {
    parse_pubkey(script, COMMIT_PAYEE_PUBKEY_WORD)
}

/// The revoke secret hash of a commit script
pub fn get_commit_revoke_secret_hash(script: &Script) -> Result<hash160::Hash, ValidationError> {
    parse_hash160(script, COMMIT_REVOKE_SECRET_HASH_WORD)
}

/// The payer public key of a commit script
pub fn get_commit_payer_pubkey(script: &Script) -> Result<PublicKey, ValidationError> {
    parse_pubkey(script, COMMIT_PAYER_PUBKEY_WORD)
}

/// The parameters of a deposit script
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositScriptParams {
    /// The payer, who funds the channel
    pub payer_pubkey: PublicKey,
    /// The payee, who receives commitments
    pub payee_pubkey: PublicKey,
    /// hash160 of the payee's spend secret
    pub spend_secret_hash: hash160::Hash,
    /// Relative timelock after which the payer may reclaim the deposit
    pub expire_time: u16,
}

impl DepositScriptParams {
    /// Compile to a script
    pub fn to_script(&self) -> ScriptBuf {
        compile_deposit_script(self)
    }

    /// Decompile from a script
    pub fn from_script(script: &Script) -> Result<Self, ValidationError> {
        decompile_deposit_script(script)
    }
}

/// The parameters of a commit script
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitScriptParams {
    /// The payer, who may revoke
    pub payer_pubkey: PublicKey,
    /// The payee, who may claim the payout
    pub payee_pubkey: PublicKey,
    /// hash160 of the payee's spend secret
    pub spend_secret_hash: hash160::Hash,
    /// hash160 of this commitment's revoke secret
    pub revoke_secret_hash: hash160::Hash,
    /// Relative timelock before the payee may claim the payout
    pub delay_time: u16,
}

impl CommitScriptParams {
    /// Compile to a script
    pub fn to_script(&self) -> ScriptBuf {
        compile_commit_script(self)
    }

    /// Decompile from a script
    pub fn from_script(script: &Script) -> Result<Self, ValidationError> {
        decompile_commit_script(script)
    }
}

/// Compile a deposit script
pub fn compile_deposit_script(params: &DepositScriptParams) -> ScriptBuf {
    let payer = params.payer_pubkey.serialize();
    Builder::new()
        .push_opcode(OP_IF)
        .push_int(2)
        .push_slice(&payer)
        .push_slice(&params.payee_pubkey.serialize())
        .push_int(2)
        .push_opcode(OP_CHECKMULTISIG)
        .push_opcode(OP_ELSE)
        .push_opcode(OP_IF)
        .push_opcode(OP_HASH160)
        .push_slice(params.spend_secret_hash.as_byte_array())
        .push_opcode(OP_EQUALVERIFY)
        .push_slice(&payer)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_int(params.expire_time as i64)
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_slice(&payer)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_ENDIF)
        .into_script()
}

/// Compile a commit script
pub fn compile_commit_script(params: &CommitScriptParams) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_IF)
        .push_int(params.delay_time as i64)
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_opcode(OP_HASH160)
        .push_slice(params.spend_secret_hash.as_byte_array())
        .push_opcode(OP_EQUALVERIFY)
        .push_slice(&params.payee_pubkey.serialize())
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_opcode(OP_HASH160)
        .push_slice(params.revoke_secret_hash.as_byte_array())
        .push_opcode(OP_EQUALVERIFY)
        .push_slice(&params.payer_pubkey.serialize())
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ENDIF)
        .into_script()
}

/// Decompile a deposit script, verifying the template shape
pub fn decompile_deposit_script(script: &Script) -> Result<DepositScriptParams, ValidationError> {
    let params = DepositScriptParams {
        payer_pubkey: get_deposit_payer_pubkey(script)?,
        payee_pubkey: get_deposit_payee_pubkey(script)?,
        spend_secret_hash: get_deposit_spend_secret_hash(script)?,
        expire_time: get_deposit_expire_time(script)?,
    };
    if params.to_script().as_script() != script {
        mismatch_err!("not a deposit script: {}", script.to_asm_string());
    }
    Ok(params)
}

/// Decompile a commit script, verifying the template shape
pub fn decompile_commit_script(script: &Script) -> Result<CommitScriptParams, ValidationError> {
    let params = CommitScriptParams {
        payer_pubkey: get_commit_payer_pubkey(script)?,
        payee_pubkey: get_commit_payee_pubkey(script)?,
        spend_secret_hash: get_commit_spend_secret_hash(script)?,
        revoke_secret_hash: get_commit_revoke_secret_hash(script)?,
        delay_time: get_commit_delay_time(script)?,
    };
    if params.to_script().as_script() != script {
        mismatch_err!("not a commit script: {}", script.to_asm_string());
    }
    Ok(params)
}
