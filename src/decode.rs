//! Decoders for the positional return values of view calls.
//!
//! View returns arrive as raw byte vectors in the serialization the contract
//! runtime uses: unsigned integers little-endian, booleans as a single byte,
//! addresses as 32 fixed bytes, options tag-prefixed, vectors length-prefixed
//! with a ULEB128 count. Every decoder returns `None` instead of failing so
//! callers can substitute per-field defaults.

use crate::ledger::Address;

pub fn decode_u64_le(bytes: &[u8]) -> Option<u64> {
    let fixed: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(fixed))
}

pub fn decode_bool(bytes: &[u8]) -> Option<bool> {
    match bytes.first()? {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

pub fn decode_address(bytes: &[u8]) -> Option<Address> {
    let fixed: [u8; 32] = bytes.get(..32)?.try_into().ok()?;
    Some(Address::from(fixed))
}

/// Option-tagged address: a leading `0`/`1` byte, then 32 bytes when set.
pub fn decode_option_address(bytes: &[u8]) -> Option<Option<Address>> {
    match bytes.first()? {
        0 => Some(None),
        1 => decode_address(&bytes[1..]).map(Some),
        _ => None,
    }
}

/// ULEB128-length-prefixed vector of addresses.
pub fn decode_address_vec(bytes: &[u8]) -> Option<Vec<Address>> {
    let (count, mut rest) = decode_uleb128(bytes)?;
    let count = usize::try_from(count).ok()?;
    let mut addresses = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let address = decode_address(rest)?;
        addresses.push(address);
        rest = &rest[32..];
    }
    Some(addresses)
}

fn decode_uleb128(bytes: &[u8]) -> Option<(u64, &[u8])> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (index, byte) in bytes.iter().enumerate() {
        if shift >= 64 {
            return None;
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some((value, &bytes[index + 1..]));
        }
        shift += 7;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_u64_le__reads_little_endian() {
        let mut bytes = vec![0u8; 8];
        bytes[0] = 2;
        assert_eq!(decode_u64_le(&bytes), Some(2));
        assert_eq!(decode_u64_le(&1_000_000_000u64.to_le_bytes()), Some(1_000_000_000));
    }

    #[test]
    fn decode_u64_le__rejects_short_buffers() {
        assert_eq!(decode_u64_le(&[1, 0, 0]), None);
        assert_eq!(decode_u64_le(&[]), None);
    }

    #[test]
    fn decode_bool__accepts_only_canonical_bytes() {
        assert_eq!(decode_bool(&[0]), Some(false));
        assert_eq!(decode_bool(&[1]), Some(true));
        assert_eq!(decode_bool(&[2]), None);
        assert_eq!(decode_bool(&[]), None);
    }

    #[test]
    fn decode_option_address__handles_both_tags() {
        assert_eq!(decode_option_address(&[0]), Some(None));

        let mut set = vec![1u8];
        set.extend_from_slice(&[7u8; 32]);
        assert_eq!(
            decode_option_address(&set),
            Some(Some(Address::from([7u8; 32])))
        );

        // Set tag with a truncated payload is undecodable, not "absent".
        assert_eq!(decode_option_address(&[1, 7, 7]), None);
    }

    #[test]
    fn decode_address_vec__reads_length_prefixed_entries() {
        let mut bytes = vec![2u8];
        bytes.extend_from_slice(&[1u8; 32]);
        bytes.extend_from_slice(&[2u8; 32]);
        let decoded = decode_address_vec(&bytes).unwrap();
        assert_eq!(
            decoded,
            vec![Address::from([1u8; 32]), Address::from([2u8; 32])]
        );

        assert_eq!(decode_address_vec(&[0]), Some(Vec::new()));
        assert_eq!(decode_address_vec(&[2, 1, 2, 3]), None);
    }
}
