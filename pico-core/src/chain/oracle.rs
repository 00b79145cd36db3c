use bitcoin::{Transaction, Txid};

use crate::prelude::*;

/// Error returned by a confirmation oracle
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The backing service is temporarily unavailable, might work later
    Unavailable(String),
    /// The transaction does not carry the channel asset
    NotFound(String),
    /// Non-recoverable internal error
    Internal(String),
}

/// Read-only view of the chain, as needed by a channel.
///
/// Implementations are backed by a node or an indexer.  Repeated calls
/// must be free of side effects, since a channel re-queries quantities
/// each time it orders its commitments.
pub trait ConfirmationOracle: SendSync {
    /// The number of confirmations of a transaction, zero if unknown or
    /// unconfirmed
    fn confirmations(&self, txid: &Txid) -> Result<u32, Error>;

    /// The asset quantity carried by the relevant output of a transaction
    fn output_quantity(&self, tx: &Transaction) -> Result<u64, Error>;
}
