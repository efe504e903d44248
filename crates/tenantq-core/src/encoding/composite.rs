use crate::error::EncodingError;

use super::KeyValue;

/// Type tag constants for composite key encoding.
pub const TAG_STRING: u8 = 0x01;
pub const TAG_NUMBER: u8 = 0x02;

/// Return the type tag for a `KeyValue`.
fn key_value_tag(kv: &KeyValue) -> u8 {
    match kv {
        KeyValue::String(_) => TAG_STRING,
        KeyValue::Number(_) => TAG_NUMBER,
    }
}

/// Encode a single `KeyValue` with its type tag prefix.
fn encode_tagged(kv: &KeyValue, out: &mut Vec<u8>) -> Result<(), EncodingError> {
    out.push(key_value_tag(kv));
    match kv {
        KeyValue::String(s) => out.extend(super::string::encode_string(s)),
        KeyValue::Number(n) => out.extend(super::number::encode_number(*n)?),
    }
    Ok(())
}

/// Encode a composite key (partition + optional sort).
///
/// Format:
/// - `[type_tag][encoded_partition_key]` (partition only)
/// - `[type_tag][encoded_partition_key][type_tag][encoded_sort_key]` (partition + sort)
///
/// Every component is self-delimiting, so further components (such as the
/// primary key suffix of an index entry) can be appended without breaking
/// the ordering of the leading components.
pub fn encode_composite(
    partition: &KeyValue,
    sort: Option<&KeyValue>,
) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::new();
    encode_tagged(partition, &mut out)?;
    if let Some(sk) = sort {
        encode_tagged(sk, &mut out)?;
    }
    Ok(out)
}

/// Encode just a partition key prefix (for range scan start bounds).
pub fn encode_partition_prefix(partition: &KeyValue) -> Result<Vec<u8>, EncodingError> {
    encode_composite(partition, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> KeyValue {
        KeyValue::String(v.to_string())
    }

    #[test]
    fn test_partition_only() {
        let encoded = encode_composite(&s("g1"), None).unwrap();
        assert_eq!(encoded[0], TAG_STRING);
        assert_eq!(encoded, encode_partition_prefix(&s("g1")).unwrap());
    }

    #[test]
    fn test_sort_key_orders_within_partition() {
        let a = encode_composite(&s("g1"), Some(&s("2024-01-01"))).unwrap();
        let b = encode_composite(&s("g1"), Some(&s("2024-01-02"))).unwrap();
        let other = encode_composite(&s("g2"), Some(&s("2000-01-01"))).unwrap();
        assert!(a < b);
        assert!(b < other, "partition key dominates sort key");
    }

    #[test]
    fn test_prefix_partition_does_not_interleave() {
        // "g1" must sort entirely before "g10" even with sort keys attached.
        let g1 = encode_composite(&s("g1"), Some(&s("zzz"))).unwrap();
        let g10 = encode_composite(&s("g10"), Some(&s("aaa"))).unwrap();
        assert!(g1 < g10);
    }

    #[test]
    fn test_number_sort_key() {
        let lo = encode_composite(&s("p"), Some(&KeyValue::Number(-5.0))).unwrap();
        let hi = encode_composite(&s("p"), Some(&KeyValue::Number(3.0))).unwrap();
        assert!(lo < hi);
        assert_eq!(
            encode_composite(&s("p"), Some(&KeyValue::Number(f64::NAN))),
            Err(EncodingError::NaN)
        );
    }
}
