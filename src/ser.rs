//! Serialization into [`Value`].
//!
//! Enum variants, when mapped, are:
//! - Unit - Just the variant name as a string
//! - Newtype - Dict with one pair. Key is variant name, content is the value
//! - Tuple - Dict with one pair. Key is variant name, content is the tuple as a list
//! - Struct - Dict with one pair. Key is variant name, content is the struct
//!
//! Structs become dictionaries with their fields in declaration order, so the encoded form is
//! stable for a given type.

use serde::ser::*;

use crate::error::{Error, Result};
use crate::timestamp::TIMESTAMP_NAME;
use crate::{Dict, Integer, Timestamp, Value};

/// Convert any serializable type into a [`Value`].
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    value.serialize(ValueSerializer)
}

/// Serialize straight to BOSS.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    crate::protocol::dump(&to_value(value)?)
}

struct ValueSerializer;

impl Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;
    type SerializeSeq = SeqSerializer;
    type SerializeTuple = SeqSerializer;
    type SerializeTupleStruct = SeqSerializer;
    type SerializeTupleVariant = VariantSerializer<SeqSerializer>;
    type SerializeMap = MapSerializer;
    type SerializeStruct = MapSerializer;
    type SerializeStructVariant = VariantSerializer<MapSerializer>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::Int(Integer::from(v)))
    }

    fn serialize_i128(self, v: i128) -> Result<Value> {
        Ok(Value::Int(Integer::from(v)))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(Value::Int(Integer::from(v)))
    }

    fn serialize_u128(self, v: u128) -> Result<Value> {
        Ok(Value::Int(Integer::from(v)))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::F64(v.into()))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::F64(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::Str(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Bin(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        self.serialize_unit()
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<Value> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        v: &T,
    ) -> Result<Value> {
        let inner = v.serialize(ValueSerializer)?;
        if name == TIMESTAMP_NAME {
            let sec = inner[0]
                .as_i64()
                .ok_or_else(|| Error::SerdeFail("timestamp seconds missing".to_string()))?;
            let nano = inner[1].as_u64().unwrap_or(0);
            let nano = u32::try_from(nano)
                .map_err(|_| Error::SerdeFail("timestamp nanoseconds out of range".to_string()))?;
            let time = Timestamp::from_utc(sec, nano)
                .ok_or_else(|| Error::SerdeFail("timestamp nanoseconds out of range".to_string()))?;
            Ok(Value::Timestamp(time))
        } else {
            Ok(inner)
        }
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value> {
        let mut dict = Dict::with_capacity(1);
        dict.insert(variant, value.serialize(ValueSerializer)?);
        Ok(Value::dict(dict))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqSerializer> {
        Ok(SeqSerializer::new(len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqSerializer> {
        Ok(SeqSerializer::new(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqSerializer> {
        // Tuple structs usually just discard the name
        Ok(SeqSerializer::new(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Ok(VariantSerializer {
            variant,
            inner: SeqSerializer::new(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapSerializer> {
        Ok(MapSerializer::new(len.unwrap_or(0)))
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapSerializer> {
        Ok(MapSerializer::new(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Ok(VariantSerializer {
            variant,
            inner: MapSerializer::new(len),
        })
    }
}

struct SeqSerializer {
    items: Vec<Value>,
}

impl SeqSerializer {
    fn new(len: usize) -> Self {
        // Don't trust the hint too far
        Self {
            items: Vec::with_capacity(len.min(4096)),
        }
    }
}

impl SerializeSeq for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::list(self.items))
    }
}

impl SerializeTuple for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        SerializeSeq::end(self)
    }
}

impl SerializeTupleStruct for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        SerializeSeq::end(self)
    }
}

struct MapSerializer {
    dict: Dict,
    pending_key: Option<Value>,
}

impl MapSerializer {
    fn new(len: usize) -> Self {
        Self {
            dict: Dict::with_capacity(len.min(4096)),
            pending_key: None,
        }
    }
}

impl SerializeMap for MapSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        self.pending_key = Some(key.serialize(ValueSerializer)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| Error::SerdeFail("map value without a key".to_string()))?;
        self.dict.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::dict(self.dict))
    }
}

impl SerializeStruct for MapSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.dict.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        SerializeMap::end(self)
    }
}

struct VariantSerializer<S> {
    variant: &'static str,
    inner: S,
}

impl<S: SerializeSeq<Ok = Value, Error = Error>> SerializeTupleVariant for VariantSerializer<S> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.inner.serialize_element(value)
    }

    fn end(self) -> Result<Value> {
        let mut dict = Dict::with_capacity(1);
        dict.insert(self.variant, self.inner.end()?);
        Ok(Value::dict(dict))
    }
}

impl<S: SerializeStruct<Ok = Value, Error = Error>> SerializeStructVariant for VariantSerializer<S> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.inner.serialize_field(key, value)
    }

    fn end(self) -> Result<Value> {
        let mut dict = Dict::with_capacity(1);
        dict.insert(self.variant, self.inner.end()?);
        Ok(Value::dict(dict))
    }
}
