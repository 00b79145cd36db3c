use crate::prelude::*;

/// Models for persistence
pub mod model;

use model::ChannelSnapshot;

#[derive(Clone, Debug, PartialEq)]
/// Error returned by persister
pub enum Error {
    /// Persister is temporarily unavailable, might work later
    Unavailable(String),
    /// Inconsistent state, needed resource is missing
    NotFound(String),
    /// Non-recoverable internal error
    Internal(String),
}

/// Persister of channel snapshots.
///
/// Channels are keyed by a caller-chosen name.  Implementations should
/// persist durably before returning.
pub trait Persist: SendSync {
    /// Store or replace a channel snapshot
    fn put_channel(&self, name: &str, snapshot: &ChannelSnapshot) -> Result<(), Error>;

    /// Fetch a channel snapshot
    fn get_channel(&self, name: &str) -> Result<ChannelSnapshot, Error>;

    /// List the stored channel names
    fn list_channels(&self) -> Result<Vec<String>, Error>;

    /// Remove a channel snapshot
    fn delete_channel(&self, name: &str) -> Result<(), Error>;
}

/// An in-memory persister, storing snapshots as JSON
pub struct MemoryPersister {
    channels: Mutex<OrderedMap<String, String>>,
}

impl SendSync for MemoryPersister {}

impl MemoryPersister {
    /// An empty persister
    pub fn new() -> Self {
        MemoryPersister { channels: Mutex::new(OrderedMap::new()) }
    }
}

impl Persist for MemoryPersister {
    fn put_channel(&self, name: &str, snapshot: &ChannelSnapshot) -> Result<(), Error> {
        let json = model::to_json(snapshot).map_err(|e| Error::Internal(e.to_string()))?;
        self.channels.lock().unwrap().insert(name.to_string(), json);
        Ok(())
    }

    fn get_channel(&self, name: &str) -> Result<ChannelSnapshot, Error> {
        let channels = self.channels.lock().unwrap();
        let json = channels.get(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        model::from_json(json).map_err(|e| Error::Internal(e.to_string()))
    }

    fn list_channels(&self) -> Result<Vec<String>, Error> {
        Ok(self.channels.lock().unwrap().keys().cloned().collect())
    }

    fn delete_channel(&self, name: &str) -> Result<(), Error> {
        match self.channels.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(name.to_string())),
        }
    }
}
