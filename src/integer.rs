use std::cmp;
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{NumCast, ToPrimitive};

use crate::varint::Magnitude;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum IntPriv {
    /// Always non-less than zero.
    PosInt(u64),
    /// Always less than zero.
    NegInt(i64),
    /// Always outside the range `i64::MIN..=u64::MAX`.
    Big(Box<BigInt>),
}

/// Represents a BOSS integer. BOSS integers have no fixed width, so anything outside the native
/// 64-bit range falls back to an arbitrary-precision integer.
///
/// A `Value` that contains integer can be constructed using `From` trait.
#[derive(Clone, PartialEq, Eq)]
pub struct Integer {
    n: IntPriv,
}

impl Integer {
    /// Returns `true` if the integer can be represented as `i64`.
    #[inline]
    pub fn is_i64(&self) -> bool {
        match self.n {
            IntPriv::PosInt(n) => n <= i64::MAX as u64,
            IntPriv::NegInt(..) => true,
            IntPriv::Big(..) => false,
        }
    }

    /// Returns `true` if the integer can be represented as `u64`.
    #[inline]
    pub fn is_u64(&self) -> bool {
        matches!(self.n, IntPriv::PosInt(..))
    }

    /// Returns `true` if the integer needed the arbitrary-precision fallback.
    #[inline]
    pub fn is_big(&self) -> bool {
        matches!(self.n, IntPriv::Big(..))
    }

    /// Returns `true` if the integer is less than zero.
    pub fn is_negative(&self) -> bool {
        match self.n {
            IntPriv::PosInt(..) => false,
            IntPriv::NegInt(..) => true,
            IntPriv::Big(ref b) => b.sign() == Sign::Minus,
        }
    }

    /// Returns the integer represented as `i64` if possible, or else `None`.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self.n {
            IntPriv::PosInt(n) => NumCast::from(n),
            IntPriv::NegInt(n) => Some(n),
            IntPriv::Big(..) => None,
        }
    }

    /// Returns the integer represented as `u64` if possible, or else `None`.
    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        match self.n {
            IntPriv::PosInt(n) => Some(n),
            IntPriv::NegInt(..) => None,
            IntPriv::Big(..) => None,
        }
    }

    /// Returns the integer represented as `f64`. Large values lose precision.
    pub fn as_f64(&self) -> Option<f64> {
        match self.n {
            IntPriv::PosInt(n) => NumCast::from(n),
            IntPriv::NegInt(n) => NumCast::from(n),
            IntPriv::Big(ref b) => b.to_f64(),
        }
    }

    /// Returns the integer as an arbitrary-precision integer.
    pub fn to_big(&self) -> BigInt {
        match self.n {
            IntPriv::PosInt(n) => BigInt::from(n),
            IntPriv::NegInt(n) => BigInt::from(n),
            IntPriv::Big(ref b) => (**b).clone(),
        }
    }

    /// Split into sign and absolute value, the way the BOSS INT/NINT headers carry it.
    pub(crate) fn to_parts(&self) -> (bool, Magnitude) {
        match self.n {
            IntPriv::PosInt(n) => (false, Magnitude::Small(n)),
            IntPriv::NegInt(n) => (true, Magnitude::Small(n.unsigned_abs())),
            IntPriv::Big(ref b) => {
                let negative = b.sign() == Sign::Minus;
                (negative, Magnitude::Big(b.magnitude().clone()))
            }
        }
    }

    /// Rebuild an integer from a sign flag and an absolute value, always picking the native
    /// representation when the value fits in it.
    pub(crate) fn from_parts(negative: bool, mag: Magnitude) -> Integer {
        match (negative, mag) {
            (false, Magnitude::Small(m)) => Integer::from(m),
            (true, Magnitude::Small(0)) => Integer::from(0u64),
            (true, Magnitude::Small(m)) if m <= (1u64 << 63) => Integer {
                n: IntPriv::NegInt(0i64.wrapping_sub(m as i64)),
            },
            (true, Magnitude::Small(m)) => Integer::from(-BigInt::from(m)),
            (negative, Magnitude::Big(b)) => {
                let sign = if negative { Sign::Minus } else { Sign::Plus };
                Integer::from(BigInt::from_biguint(sign, b))
            }
        }
    }
}

pub(crate) fn get_int_internal(val: &Integer) -> &IntPriv {
    &val.n
}

impl std::default::Default for Integer {
    fn default() -> Self {
        Self {
            n: IntPriv::PosInt(0),
        }
    }
}

impl cmp::Ord for Integer {
    fn cmp(&self, other: &Integer) -> Ordering {
        match (&self.n, &other.n) {
            (IntPriv::NegInt(lhs), IntPriv::NegInt(rhs)) => lhs.cmp(rhs),
            (IntPriv::NegInt(_), IntPriv::PosInt(_)) => Ordering::Less,
            (IntPriv::PosInt(_), IntPriv::NegInt(_)) => Ordering::Greater,
            (IntPriv::PosInt(lhs), IntPriv::PosInt(rhs)) => lhs.cmp(rhs),
            _ => self.to_big().cmp(&other.to_big()),
        }
    }
}

impl cmp::PartialOrd for Integer {
    fn partial_cmp(&self, other: &Integer) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Debug for Integer {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        Debug::fmt(&self.n, fmt)
    }
}

impl Display for Integer {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self.n {
            IntPriv::PosInt(v) => Display::fmt(&v, fmt),
            IntPriv::NegInt(v) => Display::fmt(&v, fmt),
            IntPriv::Big(ref v) => Display::fmt(v, fmt),
        }
    }
}

macro_rules! impl_from_unsigned {
    ($t: ty) => {
        impl From<$t> for Integer {
            fn from(n: $t) -> Self {
                Integer {
                    n: IntPriv::PosInt(n as u64),
                }
            }
        }
    };
}

macro_rules! impl_from_signed {
    ($t: ty) => {
        impl From<$t> for Integer {
            fn from(n: $t) -> Self {
                if n < 0 {
                    Integer {
                        n: IntPriv::NegInt(n as i64),
                    }
                } else {
                    Integer {
                        n: IntPriv::PosInt(n as u64),
                    }
                }
            }
        }
    };
}

impl_from_unsigned!(u8);
impl_from_unsigned!(u16);
impl_from_unsigned!(u32);
impl_from_unsigned!(u64);
impl_from_unsigned!(usize);
impl_from_signed!(i8);
impl_from_signed!(i16);
impl_from_signed!(i32);
impl_from_signed!(i64);
impl_from_signed!(isize);

impl From<BigInt> for Integer {
    fn from(n: BigInt) -> Self {
        if let Some(v) = n.to_u64() {
            Integer::from(v)
        } else if let Some(v) = n.to_i64() {
            Integer::from(v)
        } else {
            Integer {
                n: IntPriv::Big(Box::new(n)),
            }
        }
    }
}

impl From<BigUint> for Integer {
    fn from(n: BigUint) -> Self {
        Integer::from(BigInt::from(n))
    }
}

impl From<i128> for Integer {
    fn from(n: i128) -> Self {
        Integer::from(BigInt::from(n))
    }
}

impl From<u128> for Integer {
    fn from(n: u128) -> Self {
        Integer::from(BigInt::from(n))
    }
}

use std::convert::TryFrom;

macro_rules! impl_try_from {
    ($t: ty) => {
        impl TryFrom<Integer> for $t {
            type Error = Integer;
            fn try_from(v: Integer) -> Result<Self, Self::Error> {
                match v.n {
                    IntPriv::PosInt(n) => TryFrom::try_from(n).map_err(|_| v),
                    IntPriv::NegInt(n) => TryFrom::try_from(n).map_err(|_| v),
                    IntPriv::Big(_) => Err(v),
                }
            }
        }
    };
}

impl_try_from!(u8);
impl_try_from!(u16);
impl_try_from!(u32);
impl_try_from!(u64);
impl_try_from!(usize);
impl_try_from!(i8);
impl_try_from!(i16);
impl_try_from!(i32);
impl_try_from!(i64);
impl_try_from!(isize);

use serde::{
    de::{Deserialize, Deserializer},
    ser::{Error as SerError, Serialize, Serializer},
};

impl Serialize for Integer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.n {
            IntPriv::PosInt(v) => serializer.serialize_u64(v),
            IntPriv::NegInt(v) => serializer.serialize_i64(v),
            IntPriv::Big(ref v) => match v.to_i128() {
                Some(v) => serializer.serialize_i128(v),
                None => match v.to_u128() {
                    Some(v) => serializer.serialize_u128(v),
                    None => Err(S::Error::custom("integer too large for serde's 128-bit types")),
                },
            },
        }
    }
}

impl<'de> Deserialize<'de> for Integer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IntVisitor;
        impl<'de> serde::de::Visitor<'de> for IntVisitor {
            type Value = Integer;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
                write!(fmt, "an integer")
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Integer::from(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Integer::from(v))
            }

            fn visit_i128<E: serde::de::Error>(self, v: i128) -> Result<Self::Value, E> {
                Ok(Integer::from(v))
            }

            fn visit_u128<E: serde::de::Error>(self, v: u128) -> Result<Self::Value, E> {
                Ok(Integer::from(v))
            }
        }

        deserializer.deserialize_any(IntVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_from_big() {
        let x = Integer::from(BigInt::from(u64::MAX));
        assert!(x.is_u64());
        let x = Integer::from(BigInt::from(i64::MIN));
        assert!(x.is_i64());
        let x = Integer::from(BigInt::from(u64::MAX) + 1u32);
        assert!(x.is_big());
        let x = Integer::from(BigInt::from(i64::MIN) - 1);
        assert!(x.is_big());
        assert!(x.is_negative());
    }

    #[test]
    fn parts() {
        let cases = vec![
            Integer::from(0),
            Integer::from(1),
            Integer::from(-1),
            Integer::from(i64::MIN),
            Integer::from(i64::MAX),
            Integer::from(u64::MAX),
            Integer::from(-BigInt::from(u64::MAX)),
            Integer::from(BigInt::from(u64::MAX) * 1000u32),
        ];
        for case in cases {
            let (neg, mag) = case.to_parts();
            assert_eq!(Integer::from_parts(neg, mag), case);
        }
    }

    #[test]
    fn negative_zero_is_zero() {
        let x = Integer::from_parts(true, Magnitude::Small(0));
        assert_eq!(x, Integer::from(0));
        assert!(!x.is_negative());
    }

    #[test]
    fn ordering() {
        let big_pos = Integer::from(BigInt::from(u64::MAX) + 1u32);
        let big_neg = Integer::from(BigInt::from(i64::MIN) - 1);
        assert!(big_neg < Integer::from(i64::MIN));
        assert!(Integer::from(-1) < Integer::from(0));
        assert!(Integer::from(u64::MAX) < big_pos);
        assert!(big_neg < big_pos);
    }

    #[test]
    fn display() {
        assert_eq!(Integer::from(-7).to_string(), "-7");
        let big = Integer::from(BigInt::from(u64::MAX) + 1u32);
        assert_eq!(big.to_string(), "18446744073709551616");
    }
}
