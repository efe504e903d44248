//! Order-preserving byte encoding of key values.
//!
//! Encoded keys compare under `memcmp` in the same order as the values they
//! encode, so a `BTreeMap<Vec<u8>, _>` iterates in store key order.

pub mod composite;
pub mod number;
pub mod string;

/// A key value that can be encoded for byte-ordered comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    String(String),
    Number(f64),
}
