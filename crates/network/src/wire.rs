//! Wire format for payloads, paths and headers.
//!
//! All values are fixed-width little-endian integers packed back to back:
//!
//! ```text
//! payload: [i32 LE][i32 LE]...
//! path:    [u32 LE][u32 LE]...     (ranks)
//! header:  [u64 LE][u64 LE]...     (sizes, ranks, verdicts)
//! ```
//!
//! There is no length prefix. Framing is the caller's job: the router sends
//! a size message ahead of every data message.

use bytes::{Buf, BufMut};
use thiserror::Error;
use vnet_types::Rank;

/// Errors from wire decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("buffer of {len} bytes is not a multiple of {width}")]
    Misaligned { len: usize, width: usize },

    #[error("expected {expected} values, got {actual}")]
    WrongCount { expected: usize, actual: usize },
}

fn check_alignment(data: &[u8], width: usize) -> Result<(), WireError> {
    if data.len() % width == 0 {
        Ok(())
    } else {
        Err(WireError::Misaligned {
            len: data.len(),
            width,
        })
    }
}

/// Encode an `i32` payload.
pub fn encode_payload(values: &[i32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for &v in values {
        buf.put_i32_le(v);
    }
    buf
}

/// Decode an `i32` payload.
pub fn decode_payload(mut data: &[u8]) -> Result<Vec<i32>, WireError> {
    check_alignment(data, 4)?;
    let mut out = Vec::with_capacity(data.len() / 4);
    while data.has_remaining() {
        out.push(data.get_i32_le());
    }
    Ok(out)
}

/// Encode a rank sequence.
pub fn encode_ranks(ranks: &[Rank]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ranks.len() * 4);
    for &r in ranks {
        buf.put_u32_le(r);
    }
    buf
}

/// Decode a rank sequence.
pub fn decode_ranks(mut data: &[u8]) -> Result<Vec<Rank>, WireError> {
    check_alignment(data, 4)?;
    let mut out = Vec::with_capacity(data.len() / 4);
    while data.has_remaining() {
        out.push(data.get_u32_le());
    }
    Ok(out)
}

/// Encode a header of `u64` words.
pub fn encode_header(words: &[u64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(words.len() * 8);
    for &w in words {
        buf.put_u64_le(w);
    }
    buf
}

/// Decode a header of exactly `N` `u64` words.
pub fn decode_header<const N: usize>(mut data: &[u8]) -> Result<[u64; N], WireError> {
    check_alignment(data, 8)?;
    let actual = data.len() / 8;
    if actual != N {
        return Err(WireError::WrongCount { expected: N, actual });
    }
    let mut out = [0u64; N];
    for word in out.iter_mut() {
        *word = data.get_u64_le();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_layout_is_little_endian() {
        assert_eq!(encode_payload(&[1, -1]), vec![1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_payload_extremes() {
        let original = vec![i32::MIN, -7, 0, 7, i32::MAX];
        assert_eq!(decode_payload(&encode_payload(&original)).unwrap(), original);
    }

    #[test]
    fn test_empty() {
        assert!(encode_payload(&[]).is_empty());
        assert_eq!(decode_payload(&[]).unwrap(), Vec::<i32>::new());
        assert_eq!(decode_ranks(&[]).unwrap(), Vec::<Rank>::new());
    }

    #[test]
    fn test_ranks() {
        let path = vec![0, 1, 5, u32::MAX];
        assert_eq!(decode_ranks(&encode_ranks(&path)).unwrap(), path);
    }

    #[test]
    fn test_misaligned_data() {
        assert_eq!(
            decode_payload(&[1, 2, 3]),
            Err(WireError::Misaligned { len: 3, width: 4 })
        );
        assert!(decode_ranks(&[0; 5]).is_err());
        assert!(decode_header::<1>(&[0; 7]).is_err());
    }

    #[test]
    fn test_header_word_count() {
        let bytes = encode_header(&[3, 9, 1]);
        assert_eq!(decode_header::<3>(&bytes).unwrap(), [3, 9, 1]);
        assert_eq!(
            decode_header::<2>(&bytes),
            Err(WireError::WrongCount {
                expected: 2,
                actual: 3
            })
        );
    }
}
