use num_traits::ToPrimitive;

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};
use crate::varint::{self, Magnitude};

/// Header field values at or above this don't fit in the header byte itself.
const DIRECT_LIMIT: u64 = 23;
/// Header field value announcing a varint byte count followed by that many magnitude bytes.
const ESCAPE_FIELD: u8 = 31;

/// The 3-bit type code at the bottom of every header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeCode {
    Int,
    Extra,
    NInt,
    Text,
    Bin,
    CRef,
    List,
    Dict,
}

impl TypeCode {
    pub fn from_u8(v: u8) -> Result<TypeCode> {
        Ok(match v {
            0 => TypeCode::Int,
            1 => TypeCode::Extra,
            2 => TypeCode::NInt,
            3 => TypeCode::Text,
            4 => TypeCode::Bin,
            5 => TypeCode::CRef,
            6 => TypeCode::List,
            7 => TypeCode::Dict,
            _ => return Err(Error::UnknownType(v)),
        })
    }

    pub fn into_u8(self) -> u8 {
        match self {
            TypeCode::Int => 0,
            TypeCode::Extra => 1,
            TypeCode::NInt => 2,
            TypeCode::Text => 3,
            TypeCode::Bin => 4,
            TypeCode::CRef => 5,
            TypeCode::List => 6,
            TypeCode::Dict => 7,
        }
    }
}

/// Markers carried as the magnitude of an EXTRA header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extra {
    DZero,
    FZero,
    DOne,
    FOne,
    DMinusOne,
    FMinusOne,
    Float,
    Double,
    Object,
    Method,
    Function,
    GlobRef,
    True,
    False,
    Compressed,
    Time,
}

impl Extra {
    pub fn into_u64(self) -> u64 {
        match self {
            Extra::DZero => 0,
            Extra::FZero => 1,
            Extra::DOne => 2,
            Extra::FOne => 3,
            Extra::DMinusOne => 4,
            Extra::FMinusOne => 5,
            Extra::Float => 6,
            Extra::Double => 7,
            Extra::Object => 8,
            Extra::Method => 9,
            Extra::Function => 10,
            Extra::GlobRef => 11,
            Extra::True => 12,
            Extra::False => 13,
            Extra::Compressed => 14,
            Extra::Time => 15,
        }
    }

    /// Convert from the header magnitude. Returns `None` if the marker isn't recognized.
    pub fn from_u64(v: u64) -> Option<Extra> {
        Some(match v {
            0 => Extra::DZero,
            1 => Extra::FZero,
            2 => Extra::DOne,
            3 => Extra::FOne,
            4 => Extra::DMinusOne,
            5 => Extra::FMinusOne,
            6 => Extra::Float,
            7 => Extra::Double,
            8 => Extra::Object,
            9 => Extra::Method,
            10 => Extra::Function,
            11 => Extra::GlobRef,
            12 => Extra::True,
            13 => Extra::False,
            14 => Extra::Compressed,
            15 => Extra::Time,
            _ => return None,
        })
    }
}

/// A decoded header: the type code and the magnitude that goes with it. What the magnitude means
/// depends on the type: a value for INT/NINT, a byte length for TEXT/BIN, an element count for
/// LIST/DICT, a cache index for CREF, or an [`Extra`] marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub code: TypeCode,
    pub value: Magnitude,
}

impl Header {
    /// The magnitude as a `usize`, for lengths and indexes. Anything that can't fit is reported
    /// against `step`.
    pub fn len(&self, step: &'static str) -> Result<usize> {
        let len = match self.value {
            Magnitude::Small(v) => v.to_usize(),
            Magnitude::Big(_) => None,
        };
        len.ok_or_else(|| Error::ParseLimit(format!("{} length doesn't fit in memory", step)))
    }
}

pub fn write(buf: &mut ByteBuffer, code: TypeCode, value: &Magnitude) {
    let code = code.into_u8();
    if let Magnitude::Small(v) = value {
        if *v < DIRECT_LIMIT {
            buf.write_byte(code | ((*v as u8) << 3));
            return;
        }
    }
    let bytes = value.to_le_bytes();
    if bytes.len() < 9 {
        buf.write_byte(code | (((bytes.len() + 22) as u8) << 3));
    } else {
        buf.write_byte(code | (ESCAPE_FIELD << 3));
        varint::write(buf, bytes.len() as u64);
    }
    buf.write(&bytes);
}

pub fn write_u64(buf: &mut ByteBuffer, code: TypeCode, value: u64) {
    write(buf, code, &Magnitude::Small(value))
}

/// Read a header. Returns `None` at a clean end of data.
pub fn read(buf: &mut ByteBuffer) -> Result<Option<Header>> {
    let byte = match buf.read_byte() {
        Some(b) => b,
        None => return Ok(None),
    };
    let code = TypeCode::from_u8(byte & 0x07)?;
    let field = byte >> 3;
    let value = if (field as u64) < DIRECT_LIMIT {
        Magnitude::Small(field as u64)
    } else {
        let size = if field == ESCAPE_FIELD {
            varint::read(buf)?
                .and_then(|m| m.as_u64())
                .and_then(|m| m.to_usize())
                .ok_or_else(|| Error::MalformedHeader("bad magnitude byte count".to_string()))?
        } else {
            (field - 22) as usize
        };
        if size > buf.remaining() {
            return Err(Error::MalformedHeader(format!(
                "magnitude needs {} bytes, but there are only {} bytes left",
                size,
                buf.remaining()
            )));
        }
        Magnitude::from_le_bytes(buf.read(size))
    };
    Ok(Some(Header { code, value }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn encode(code: TypeCode, v: u64) -> Vec<u8> {
        let mut buf = ByteBuffer::new();
        write_u64(&mut buf, code, v);
        buf.into_inner()
    }

    fn decode(bytes: Vec<u8>) -> Header {
        let mut buf = ByteBuffer::from_vec(bytes);
        let header = read(&mut buf).unwrap().unwrap();
        assert!(buf.is_at_end(), "header should consume every byte");
        header
    }

    #[test]
    fn known_bytes() {
        assert_eq!(encode(TypeCode::Int, 7), vec![0x38]);
        assert_eq!(encode(TypeCode::Int, 70), vec![0xB8, 0x46]);
        assert_eq!(encode(TypeCode::Int, 70000), vec![0xC8, 0x70, 0x11, 0x01]);
        assert_eq!(encode(TypeCode::NInt, 7), vec![0x3A]);
        assert_eq!(encode(TypeCode::Text, 5), vec![0x2B]);
    }

    #[test]
    fn boundaries() {
        let cases: Vec<(u64, usize)> = vec![
            (0, 1),
            (22, 1),
            (23, 2),
            (255, 2),
            (256, 3),
            (65535, 3),
            (65536, 4),
            ((1u64 << 63) - 1, 9),
            (u64::MAX, 9),
        ];
        for code in [TypeCode::Int, TypeCode::List] {
            for (v, len) in cases.iter() {
                let enc = encode(code, *v);
                assert_eq!(enc.len(), *len, "header length for {}", v);
                let header = decode(enc);
                assert_eq!(header.code, code);
                assert_eq!(header.value, Magnitude::Small(*v));
            }
        }
    }

    #[test]
    fn escape_for_big() {
        let big = BigUint::from(u64::MAX) + 1u32;
        let mut buf = ByteBuffer::new();
        write(&mut buf, TypeCode::Int, &Magnitude::Big(big.clone()));
        let enc = buf.into_inner();
        assert_eq!(enc[0], 0xF8);
        assert_eq!(enc[1], 0x89, "byte count varint");
        assert_eq!(enc.len(), 2 + 9);
        assert_eq!(decode(enc).value, Magnitude::Big(big));
    }

    #[test]
    fn truncated() {
        let mut buf = ByteBuffer::from_vec(vec![0xC8, 0x70]);
        assert!(matches!(read(&mut buf), Err(Error::MalformedHeader(_))));
        let mut buf = ByteBuffer::from_vec(vec![0xF8]);
        assert!(matches!(read(&mut buf), Err(Error::MalformedHeader(_))));
        let mut buf = ByteBuffer::new();
        assert!(read(&mut buf).unwrap().is_none());
    }

    #[test]
    fn extra_markers() {
        for v in 0..16 {
            assert_eq!(Extra::from_u64(v).unwrap().into_u64(), v);
        }
        assert!(Extra::from_u64(16).is_none());
    }
}
