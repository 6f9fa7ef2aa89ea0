//! # Encoding Module
//!
//! Byte-level key utilities shared by the node engine:
//!
//! - **Key head**: order-preserving 4-byte digest of a key suffix
//! - **Common prefix**: longest shared prefix of two byte strings

pub mod key;

pub use key::{common_prefix_len, head};
