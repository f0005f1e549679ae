#![deny(missing_docs)]
#![doc = "Shared error surface and canonical JSON helpers for the texpr verification oracle."]

/// Structured error families shared across the oracle crates.
pub mod errors;
/// Input fingerprinting.
pub mod hash;
/// Sorted-key JSON helpers.
pub mod serde;

pub use self::errors::{ErrorInfo, OracleError};
pub use self::hash::sha256_hex;
pub use self::serde::{from_json_slice, to_pretty_json_bytes};
