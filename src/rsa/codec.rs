// Block Codec
// Splits message bytes into big-endian integer blocks smaller than the modulus
//
// Textbook RSA: there is no randomised padding here. Every block except the
// last is exactly block_byte_size(n) bytes wide; the last one may be shorter.

use num_traits::Zero;

use super::bigint::{bit_length, from_bytes, to_bytes, RsaBigInt};
use crate::error::{RsaError, RsaResult};

/// One plaintext block: its position, integer value and byte width
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainBlock {
    pub index: usize,
    pub value: RsaBigInt,
    pub width: usize,
}

/// Largest number of bytes whose integer value is always below `n`
pub fn block_byte_size(n: &RsaBigInt) -> usize {
    let bits = bit_length(n);
    if bits == 0 {
        return 0;
    }
    ((bits - 1) / 8) as usize
}

/// Number of blocks a message of `byte_length` bytes encodes to
pub fn block_count(byte_length: usize, n: &RsaBigInt) -> usize {
    match block_byte_size(n) {
        0 => 0,
        size => byte_length.div_ceil(size),
    }
}

/// Encode message bytes into ordered blocks
pub fn encode(message: &[u8], n: &RsaBigInt) -> RsaResult<Vec<PlainBlock>> {
    if message.is_empty() {
        return Ok(Vec::new());
    }

    let size = block_byte_size(n);
    if size == 0 {
        return Err(RsaError::InvalidParameter(format!(
            "modulus {} is too small to carry a single byte per block",
            n
        )));
    }

    message
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| {
            let value = from_bytes(chunk);
            if &value >= n {
                return Err(RsaError::InvalidBlock(format!(
                    "block {} value is not smaller than the modulus",
                    index
                )));
            }
            Ok(PlainBlock {
                index,
                value,
                width: chunk.len(),
            })
        })
        .collect()
}

/// Rebuild blocks from decrypted values, inferring each block's width.
///
/// All but the last block are full width. The last block's width comes from
/// `byte_length` when known, otherwise from its minimal byte representation.
pub fn blocks_from_values(
    values: Vec<RsaBigInt>,
    n: &RsaBigInt,
    byte_length: Option<usize>,
) -> RsaResult<Vec<PlainBlock>> {
    let count = values.len();
    if count == 0 {
        return match byte_length {
            Some(len) if len > 0 => Err(RsaError::InvalidBlock(format!(
                "byte_length {} given but there are no blocks",
                len
            ))),
            _ => Ok(Vec::new()),
        };
    }

    let size = block_byte_size(n);
    if size == 0 {
        return Err(RsaError::InvalidParameter(format!(
            "modulus {} is too small to carry a single byte per block",
            n
        )));
    }

    let last_width = match byte_length {
        Some(len) => {
            let full = (count - 1) * size;
            if len <= full || len > full + size {
                return Err(RsaError::InvalidBlock(format!(
                    "byte_length {} does not match {} blocks of {} bytes",
                    len, count, size
                )));
            }
            Some(len - full)
        }
        None => None,
    };

    Ok(values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let width = if index + 1 < count {
                size
            } else {
                last_width.unwrap_or_else(|| minimal_width(&value).max(1))
            };
            PlainBlock { index, value, width }
        })
        .collect())
}

/// Decode ordered blocks back into message bytes
pub fn decode(blocks: &[PlainBlock]) -> RsaResult<Vec<u8>> {
    let mut message = Vec::with_capacity(blocks.iter().map(|b| b.width).sum());

    for block in blocks {
        let bytes = if block.value.is_zero() { Vec::new() } else { to_bytes(&block.value) };
        if bytes.len() > block.width {
            return Err(RsaError::InvalidBlock(format!(
                "block {} holds {} bytes but is only {} bytes wide",
                block.index,
                bytes.len(),
                block.width
            )));
        }
        // Restore leading zero bytes dropped by the integer form
        message.resize(message.len() + block.width - bytes.len(), 0);
        message.extend_from_slice(&bytes);
    }

    Ok(message)
}

fn minimal_width(value: &RsaBigInt) -> usize {
    bit_length(value).div_ceil(8) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa::bigint::from_u64;

    #[test]
    fn test_block_byte_size() {
        assert_eq!(block_byte_size(&from_u64(3233)), 1); // 12 bits
        assert_eq!(block_byte_size(&from_u64(255)), 0);
        assert_eq!(block_byte_size(&from_u64(256)), 1); // 9 bits
        assert_eq!(block_byte_size(&(from_u64(1) << 2047u32)), 255);
    }

    #[test]
    fn test_encode_splits_in_order() {
        let n = from_u64(1) << 40u32; // 41 bits -> 5 bytes per block
        let blocks = encode(b"Hello, RSA!", &n).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].value, from_bytes(b"Hello"));
        assert_eq!(blocks[1].value, from_bytes(b", RSA"));
        assert_eq!(blocks[2].value, from_bytes(b"!"));
        assert_eq!(blocks.iter().map(|b| b.width).collect::<Vec<_>>(), vec![5, 5, 1]);
        assert_eq!(decode(&blocks).unwrap(), b"Hello, RSA!");
    }

    #[test]
    fn test_empty_message() {
        let n = from_u64(3233);
        assert!(encode(b"", &n).unwrap().is_empty());
        assert!(decode(&[]).unwrap().is_empty());
        assert!(blocks_from_values(Vec::new(), &n, None).unwrap().is_empty());
        assert!(blocks_from_values(Vec::new(), &n, Some(0)).unwrap().is_empty());
        assert!(blocks_from_values(Vec::new(), &n, Some(3)).is_err());
    }

    #[test]
    fn test_modulus_too_small() {
        let err = encode(b"A", &from_u64(200)).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
        // Empty input needs no block at all
        assert!(encode(b"", &from_u64(200)).unwrap().is_empty());
    }

    #[test]
    fn test_interior_zero_bytes_preserved() {
        let n = from_u64(1) << 24u32; // 3 bytes per block
        let message = [0u8, 0, 65, 0, 0, 0, 66];
        let blocks = encode(&message, &n).unwrap();
        let values = blocks.iter().map(|b| b.value.clone()).collect();
        let rebuilt = blocks_from_values(values, &n, None).unwrap();
        assert_eq!(decode(&rebuilt).unwrap(), message);
    }

    #[test]
    fn test_last_block_leading_zeros_need_length() {
        let n = from_u64(1) << 24u32;
        let message = [65u8, 66, 67, 0, 68];
        let blocks = encode(&message, &n).unwrap();
        let values: Vec<_> = blocks.iter().map(|b| b.value.clone()).collect();

        let with_length = blocks_from_values(values.clone(), &n, Some(message.len())).unwrap();
        assert_eq!(decode(&with_length).unwrap(), message);

        let without_length = blocks_from_values(values, &n, None).unwrap();
        assert_eq!(decode(&without_length).unwrap(), vec![65, 66, 67, 68]);
    }

    #[test]
    fn test_byte_length_mismatch() {
        let n = from_u64(1) << 24u32;
        let values = vec![from_u64(1), from_u64(2)];
        assert!(blocks_from_values(values.clone(), &n, Some(3)).is_err());
        assert!(blocks_from_values(values.clone(), &n, Some(7)).is_err());
        assert!(blocks_from_values(values, &n, Some(4)).is_ok());
    }

    #[test]
    fn test_decode_rejects_oversized_block() {
        let block = PlainBlock {
            index: 0,
            value: from_u64(0x1_0000),
            width: 2,
        };
        assert_eq!(decode(&[block]).unwrap_err().kind(), "invalid_block");
    }

    #[test]
    fn test_multibyte_utf8_across_boundaries() {
        let n = from_u64(1) << 16u32; // 2 bytes per block
        let message = "héllo wörld ✓".as_bytes();
        let blocks = encode(message, &n).unwrap();
        assert_eq!(blocks.len(), block_count(message.len(), &n));
        assert_eq!(decode(&blocks).unwrap(), message);
    }
}
