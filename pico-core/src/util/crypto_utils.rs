use crate::prelude::*;
use bitcoin::hashes::hash160;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{self, ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, LegacySighash};

/// The hash160 (RIPEMD160 of SHA256) of a secret or key
pub fn hash160(data: &[u8]) -> hash160::Hash {
    hash160::Hash::hash(data)
}

/// Convert a [Signature] to Bitcoin signature bytes, with the given sighash type
pub fn signature_to_bitcoin_vec(sig: Signature, sighash_type: EcdsaSighashType) -> Vec<u8> {
    let mut sigvec = sig.serialize_der().to_vec();
    sigvec.push(sighash_type as u8);
    sigvec
}

/// Convert a Bitcoin signature bytes, with the specified EcdsaSighashType, to [Signature]
pub fn bitcoin_vec_to_signature(
    sigvec: &[u8],
    sighash_type: EcdsaSighashType,
) -> Result<Signature, secp256k1::Error> {
    let (sig, mode) = parse_bitcoin_signature(sigvec)?;
    if mode != sighash_type {
        return Err(secp256k1::Error::InvalidSignature);
    }
    Ok(sig)
}

/// Split Bitcoin signature bytes into the [Signature] and its trailing sighash type
pub fn parse_bitcoin_signature(
    sigvec: &[u8],
) -> Result<(Signature, EcdsaSighashType), secp256k1::Error> {
    let (mode, der) = sigvec.split_last().ok_or(secp256k1::Error::InvalidSignature)?;
    let typ = EcdsaSighashType::from_standard(*mode as u32)
        .map_err(|_| secp256k1::Error::InvalidSignature)?;
    Ok((Signature::from_der(der)?, typ))
}

fn sighash_message(sighash: &LegacySighash) -> Message {
    Message::from_digest(sighash.to_byte_array())
}

pub(crate) fn ecdsa_sign(
    secp_ctx: &Secp256k1<secp256k1::All>,
    privkey: &SecretKey,
    sighash: &LegacySighash,
) -> Signature {
    secp_ctx.sign_ecdsa(&sighash_message(sighash), privkey)
}

pub(crate) fn ecdsa_verify(
    secp_ctx: &Secp256k1<secp256k1::All>,
    pubkey: &PublicKey,
    sighash: &LegacySighash,
    sig: &Signature,
) -> bool {
    secp_ctx.verify_ecdsa(&sighash_message(sighash), sig, pubkey).is_ok()
}
