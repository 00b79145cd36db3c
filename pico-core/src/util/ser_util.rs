//! Serde adapters for channel snapshots.
//!
//! Transactions are stored as hex of their consensus encoding.  Modules
//! ending with `_hex` are meant for `#[serde(with = "...")]`, which also
//! makes the field required when deserializing even if it is an `Option`.

use alloc::borrow::Cow;
use bitcoin::consensus::encode;
use bitcoin::Transaction;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

fn decode_transaction<E: serde::de::Error>(s: &str) -> Result<Transaction, E> {
    let bytes = pico_common::from_hex(s).map_err(|e| E::custom(format!("bad hex: {}", e)))?;
    encode::deserialize(&bytes).map_err(|e| E::custom(format!("bad transaction: {}", e)))
}

/// A [Transaction] as a hex string
pub mod transaction_hex {
    use super::*;

    /// Serialize
    pub fn serialize<S: Serializer>(tx: &Transaction, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode::serialize_hex(tx))
    }

    /// Deserialize
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Transaction, D::Error> {
        let s = <Cow<'de, str> as Deserialize<'de>>::deserialize(deserializer)?;
        decode_transaction(&s)
    }
}

/// An optional [Transaction] as a hex string or null
pub mod opt_transaction_hex {
    use super::*;

    /// Serialize
    pub fn serialize<S: Serializer>(
        tx: &Option<Transaction>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match tx {
            Some(tx) => serializer.serialize_some(&encode::serialize_hex(tx)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Transaction>, D::Error> {
        let s = <Option<Cow<'de, str>> as Deserialize<'de>>::deserialize(deserializer)?;
        match s {
            Some(s) if s.is_empty() => Err(D::Error::custom("empty transaction")),
            Some(s) => decode_transaction(&s).map(Some),
            None => Ok(None),
        }
    }
}
