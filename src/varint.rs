//! BOSS variable-length unsigned integers.
//!
//! Each byte carries 7 bits, least significant group first. Continuation bytes have the high bit
//! clear, and the final byte has it set. There is no upper bound on the value, so anything that
//! doesn't fit in a `u64` is carried as a [`BigUint`].

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};

/// An unsigned magnitude, as carried by a varint or a header. The `Big` variant is only ever used
/// for values above `u64::MAX`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Magnitude {
    Small(u64),
    Big(BigUint),
}

impl Magnitude {
    /// Returns the magnitude as a `u64` if it fits.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Magnitude::Small(v) => Some(*v),
            Magnitude::Big(_) => None,
        }
    }

    /// Minimal number of bytes needed to hold the magnitude. Zero needs zero bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Magnitude::Small(v) => (64 - v.leading_zeros() as usize + 7) / 8,
            Magnitude::Big(v) => ((v.bits() + 7) / 8) as usize,
        }
    }

    /// Minimal little-endian byte representation.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Magnitude::Small(v) => v.to_le_bytes()[..self.byte_len()].to_vec(),
            Magnitude::Big(v) => v.to_bytes_le(),
        }
    }

    /// Build from little-endian bytes, keeping to the native form whenever the value fits.
    pub fn from_le_bytes(bytes: &[u8]) -> Magnitude {
        if bytes.len() <= 8 {
            let mut raw = [0u8; 8];
            raw[..bytes.len()].copy_from_slice(bytes);
            Magnitude::Small(u64::from_le_bytes(raw))
        } else {
            Magnitude::from(BigUint::from_bytes_le(bytes))
        }
    }
}

impl From<u64> for Magnitude {
    fn from(v: u64) -> Self {
        Magnitude::Small(v)
    }
}

impl From<BigUint> for Magnitude {
    fn from(v: BigUint) -> Self {
        match v.to_u64() {
            Some(v) => Magnitude::Small(v),
            None => Magnitude::Big(v),
        }
    }
}

/// Write a native varint.
pub fn write(buf: &mut ByteBuffer, mut value: u64) {
    while value > 0x7F {
        buf.write_byte((value & 0x7F) as u8);
        value >>= 7;
    }
    buf.write_byte((value as u8) | 0x80);
}

/// Write an arbitrary-precision varint. Stays on the native path unless the value needs more.
pub fn write_big(buf: &mut ByteBuffer, value: &BigUint) {
    if let Some(v) = value.to_u64() {
        return write(buf, v);
    }
    let mask = BigUint::from(0x7Fu8);
    let mut value = value.clone();
    while value > mask {
        let low = (&value & &mask).to_u8().unwrap_or(0);
        buf.write_byte(low);
        value >>= 7u32;
    }
    buf.write_byte(value.to_u8().unwrap_or(0) | 0x80);
}

pub fn write_magnitude(buf: &mut ByteBuffer, value: &Magnitude) {
    match value {
        Magnitude::Small(v) => write(buf, *v),
        Magnitude::Big(v) => write_big(buf, v),
    }
}

/// Read a varint. Returns `None` if the buffer was already at its end, and fails if it ends partway
/// through the varint.
pub fn read(buf: &mut ByteBuffer) -> Result<Option<Magnitude>> {
    if buf.is_at_end() {
        return Ok(None);
    }
    let mut small: u64 = 0;
    let mut big: Option<BigUint> = None;
    let mut shift: u32 = 0;
    loop {
        let byte = buf
            .read_byte()
            .ok_or_else(|| Error::MalformedHeader("varint ended early".to_string()))?;
        let group = (byte & 0x7F) as u64;
        if let Some(b) = big.as_mut() {
            *b |= BigUint::from(group) << shift;
        } else if fits_shifted(group, shift) {
            small |= group << shift;
        } else {
            big = Some(BigUint::from(small) | (BigUint::from(group) << shift));
        }
        if byte & 0x80 != 0 {
            break;
        }
        shift += 7;
    }
    Ok(Some(match big {
        Some(b) => Magnitude::from(b),
        None => Magnitude::Small(small),
    }))
}

fn fits_shifted(group: u64, shift: u32) -> bool {
    shift < 64 && (shift == 0 || group >> (64 - shift) == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(v: u64) -> Vec<u8> {
        let mut buf = ByteBuffer::new();
        write(&mut buf, v);
        buf.into_inner()
    }

    #[test]
    fn encode_decode_2() {
        for s in 0..=63 {
            let i = 1u64 << s;
            let mut buf = ByteBuffer::from_vec(encode(i));
            let o = read(&mut buf).unwrap().unwrap();
            assert_eq!(o, Magnitude::Small(i), "u64 results should match");
            assert!(buf.is_at_end());
        }
    }

    #[test]
    fn known_bytes() {
        assert_eq!(encode(0), vec![0x80]);
        assert_eq!(encode(0x7F), vec![0xFF]);
        assert_eq!(encode(0x80), vec![0x00, 0x81]);
        assert_eq!(encode(300), vec![0x2C, 0x82]);
    }

    #[test]
    fn beyond_u64() {
        let big = BigUint::from(u64::MAX) * 977u32 + 3u32;
        let mut buf = ByteBuffer::new();
        write_big(&mut buf, &big);
        buf.seek(0);
        assert_eq!(read(&mut buf).unwrap(), Some(Magnitude::Big(big)));

        let mut buf = ByteBuffer::new();
        write_big(&mut buf, &BigUint::from(u64::MAX));
        buf.seek(0);
        assert_eq!(read(&mut buf).unwrap(), Some(Magnitude::Small(u64::MAX)));
    }

    #[test]
    fn end_of_stream() {
        let mut buf = ByteBuffer::new();
        assert_eq!(read(&mut buf).unwrap(), None);
        let mut buf = ByteBuffer::from_vec(vec![0x00, 0x01]);
        assert!(read(&mut buf).is_err());
    }

    #[test]
    fn byte_len() {
        assert_eq!(Magnitude::Small(0).byte_len(), 0);
        assert_eq!(Magnitude::Small(255).byte_len(), 1);
        assert_eq!(Magnitude::Small(256).byte_len(), 2);
        assert_eq!(Magnitude::Small(u64::MAX).byte_len(), 8);
        assert_eq!(Magnitude::from(BigUint::from(u64::MAX) + 1u32).byte_len(), 9);
    }
}
