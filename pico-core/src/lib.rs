#![crate_name = "picopayments"]

//! Script templates and channel state for unidirectional micropayment channels.
//! See [`channel::Channel`] for the entry point.

#![forbid(unsafe_code)]
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

#[cfg(not(feature = "std"))]
compile_error!("the `std` feature must be enabled");

#[macro_use]
extern crate alloc;
extern crate core;

pub use bitcoin;

/// Confirmation oracle interface
pub mod chain;
/// Various utilities
#[macro_use]
pub mod util;
/// Channel state
pub mod channel;
/// Persistence model
pub mod persist;
/// Error handling
pub mod policy;
/// Script templates and spend witnesses
pub mod tx;

pub use alloc::sync::Arc;

/// Convenience re-exports
pub mod prelude {
    pub use alloc::{boxed::Box, string::String, vec, vec::Vec};

    pub use std::collections::BTreeMap as OrderedMap;
    pub use std::collections::HashMap as Map;

    pub use alloc::borrow::ToOwned;
    pub use alloc::string::ToString;

    pub use std::sync::{Mutex, MutexGuard};

    /// Convenience trait for Send + Sync
    pub trait SendSync: Send + Sync {}
}

pub use prelude::SendSync;
