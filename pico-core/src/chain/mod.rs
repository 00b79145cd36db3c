/// Confirmation and quantity lookups
pub mod oracle;
