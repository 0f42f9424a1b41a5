//! Deserialization out of [`Value`].
//!
//! This mirrors the [`ser`](crate::ser) mapping: structs come from dictionaries, enum variants
//! come from either a bare string (unit variants) or a dictionary with a single pair.

use serde::de::value::SeqDeserializer;
use serde::de::Error as DeError;
use serde::de::*;

use crate::{
    error::{Error, Result},
    integer::{get_int_internal, IntPriv},
    timestamp::TIMESTAMP_NAME,
    value::{Dict, Value},
};

/// Convert a [`Value`] into any deserializable type.
pub fn from_value<'de, T: Deserialize<'de>>(value: &'de Value) -> Result<T> {
    T::deserialize(ValueDeserializer::new(value))
}

/// Decode the first value in some BOSS data, then deserialize it.
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    let value = crate::protocol::load(data)?;
    from_value(&value)
}

struct ValueDeserializer<'de> {
    value: &'de Value,
}

impl<'de> ValueDeserializer<'de> {
    fn new(value: &'de Value) -> Self {
        Self { value }
    }

    fn unexpected(&self) -> Unexpected<'de> {
        match self.value {
            Value::Null => Unexpected::Unit,
            Value::Bool(v) => Unexpected::Bool(*v),
            Value::Int(v) => match get_int_internal(v) {
                IntPriv::PosInt(v) => Unexpected::Unsigned(*v),
                IntPriv::NegInt(v) => Unexpected::Signed(*v),
                IntPriv::Big(_) => Unexpected::Other("big integer"),
            },
            Value::F64(v) => Unexpected::Float(*v),
            Value::Str(v) => Unexpected::Str(v),
            Value::Bin(v) => Unexpected::Bytes(v),
            Value::List(_) => Unexpected::Seq,
            Value::Dict(_) => Unexpected::Map,
            Value::Timestamp(_) => Unexpected::Other("timestamp"),
        }
    }
}

fn time_parts(sec: i64, nano: u32) -> SeqDeserializer<std::vec::IntoIter<i64>, Error> {
    SeqDeserializer::new(vec![sec, nano as i64].into_iter())
}

impl<'de> serde::Deserializer<'de> for ValueDeserializer<'de> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(v) => visitor.visit_bool(*v),
            Value::Int(v) => match get_int_internal(v) {
                IntPriv::PosInt(v) => visitor.visit_u64(*v),
                IntPriv::NegInt(v) => visitor.visit_i64(*v),
                IntPriv::Big(_) => {
                    if v.is_negative() {
                        let v = i128::try_from(v.to_big())
                            .map_err(|_| Error::invalid_value(self.unexpected(), &"an i128"))?;
                        visitor.visit_i128(v)
                    } else {
                        let v = u128::try_from(v.to_big())
                            .map_err(|_| Error::invalid_value(self.unexpected(), &"a u128"))?;
                        visitor.visit_u128(v)
                    }
                }
            },
            Value::F64(v) => visitor.visit_f64(*v),
            Value::Str(v) => visitor.visit_borrowed_str(v),
            Value::Bin(v) => visitor.visit_borrowed_bytes(v),
            Value::List(v) => visitor.visit_seq(ListAccess::new(v)),
            Value::Dict(v) => visitor.visit_map(DictAccess::new(v)),
            Value::Timestamp(t) => visitor.visit_newtype_struct(time_parts(
                t.timestamp_utc(),
                t.timestamp_subsec_nanos(),
            )),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.value.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Value::Timestamp(t) if name == TIMESTAMP_NAME => visitor.visit_newtype_struct(
                time_parts(t.timestamp_utc(), t.timestamp_subsec_nanos()),
            ),
            _ => visitor.visit_newtype_struct(self),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Value::Str(_) => visitor.visit_enum(VariantAccessor {
                variant: self.value,
                content: None,
            }),
            Value::Dict(dict) => {
                let mut iter = dict.iter();
                match (iter.next(), iter.next()) {
                    (Some((variant, content)), None) => visitor.visit_enum(VariantAccessor {
                        variant,
                        content: Some(content),
                    }),
                    _ => Err(Error::invalid_value(
                        self.unexpected(),
                        &"a dictionary with a single key-value pair",
                    )),
                }
            }
            _ => Err(Error::invalid_type(
                self.unexpected(),
                &"a string or a single-pair dictionary",
            )),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}

struct ListAccess<'de> {
    iter: std::slice::Iter<'de, Value>,
}

impl<'de> ListAccess<'de> {
    fn new(list: &'de [Value]) -> Self {
        Self { iter: list.iter() }
    }
}

impl<'de> serde::de::SeqAccess<'de> for ListAccess<'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(v) => seed.deserialize(ValueDeserializer::new(v)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct DictAccess<'de> {
    iter: std::slice::Iter<'de, (Value, Value)>,
    pending: Option<&'de Value>,
}

impl<'de> DictAccess<'de> {
    fn new(dict: &'de Dict) -> Self {
        Self {
            iter: dict.entries().iter(),
            pending: None,
        }
    }
}

impl<'de> serde::de::MapAccess<'de> for DictAccess<'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some((k, v)) => {
                self.pending = Some(v);
                seed.deserialize(ValueDeserializer::new(k)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let value = self
            .pending
            .take()
            .ok_or_else(|| Error::SerdeFail("map value requested before its key".to_string()))?;
        seed.deserialize(ValueDeserializer::new(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct VariantAccessor<'de> {
    variant: &'de Value,
    content: Option<&'de Value>,
}

impl<'de> serde::de::EnumAccess<'de> for VariantAccessor<'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self)>
    where
        V: DeserializeSeed<'de>,
    {
        let val = seed.deserialize(ValueDeserializer::new(self.variant))?;
        Ok((val, self))
    }
}

impl<'de> serde::de::VariantAccess<'de> for VariantAccessor<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.content {
            None | Some(Value::Null) => Ok(()),
            Some(v) => Err(Error::invalid_type(
                ValueDeserializer::new(v).unexpected(),
                &"unit variant",
            )),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        let content = self
            .content
            .ok_or_else(|| Error::invalid_type(Unexpected::UnitVariant, &"newtype variant"))?;
        seed.deserialize(ValueDeserializer::new(content))
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let content = self
            .content
            .ok_or_else(|| Error::invalid_type(Unexpected::UnitVariant, &"tuple variant"))?;
        serde::Deserializer::deserialize_seq(ValueDeserializer::new(content), visitor)
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let content = self
            .content
            .ok_or_else(|| Error::invalid_type(Unexpected::UnitVariant, &"struct variant"))?;
        serde::Deserializer::deserialize_map(ValueDeserializer::new(content), visitor)
    }
}
