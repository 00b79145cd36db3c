#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

pub trait HexEncode {
	fn to_hex(&self) -> String;
}

impl<T: hex::ToHex> HexEncode for T {
	fn to_hex(&self) -> String {
		self.encode_hex()
	}
}

/// Decode a hex string, tolerating an optional `0x` prefix
pub fn from_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
	hex::decode(s.strip_prefix("0x").unwrap_or(s))
}
