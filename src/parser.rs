//! BOSS decoding.
//!
//! The [`Parser`] mirrors the encoder's object cache: text, binary, lists, and dictionaries each
//! take the next slot as their header is read, and containers reserve their slot before decoding
//! any children. The slot is filled in once the container is complete. A cache reference to a
//! container that is still being decoded can only come from cyclic input, and resolves to null.

use byteorder::{ByteOrder, LittleEndian};
use std::sync::Arc;

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};
use crate::header::{self, Extra, Header, TypeCode};
use crate::integer::Integer;
use crate::value::{Dict, Value};
use crate::varint::{self, Magnitude};
use crate::{Timestamp, MAX_DEPTH};

enum Frame {
    List {
        slot: usize,
        items: Vec<Value>,
        left: usize,
    },
    Dict {
        slot: usize,
        dict: Dict,
        key: Option<Value>,
        left: usize,
    },
}

impl Frame {
    /// Hand a decoded child to the frame. Returns the finished container once the last child
    /// arrives.
    fn accept(&mut self, value: Value) -> Option<(usize, Value)> {
        match self {
            Frame::List { slot, items, left } => {
                items.push(value);
                *left -= 1;
                if *left == 0 {
                    let items = std::mem::take(items);
                    Some((*slot, Value::List(Arc::new(items))))
                } else {
                    None
                }
            }
            Frame::Dict {
                slot,
                dict,
                key,
                left,
            } => {
                match key.take() {
                    None => {
                        *key = Some(value);
                        return None;
                    }
                    Some(k) => dict.push(k, value),
                }
                *left -= 1;
                if *left == 0 {
                    let dict = std::mem::take(dict);
                    Some((*slot, Value::Dict(Arc::new(dict))))
                } else {
                    None
                }
            }
        }
    }
}

/// Decodes a sequence of BOSS values sharing one object cache.
///
/// Iterating yields each value in turn. Once an error has been returned, the parser yields
/// nothing more.
#[derive(Debug)]
pub struct Parser {
    buf: ByteBuffer,
    cache: Vec<Value>,
    errored: bool,
}

impl Parser {
    pub fn new(data: &[u8]) -> Parser {
        Parser::from_buffer(ByteBuffer::from_vec(data.to_vec()))
    }

    pub fn from_buffer(buf: ByteBuffer) -> Parser {
        Parser {
            buf,
            cache: vec![Value::Null],
            errored: false,
        }
    }

    /// Add more encoded data after whatever is still waiting to be decoded.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.compact();
        self.buf.append(data);
    }

    /// True if everything handed to the parser has been decoded.
    pub fn is_at_end(&self) -> bool {
        self.buf.is_at_end()
    }

    /// Decode the next value. Returns `None` once the data has been used up at a value boundary.
    pub fn next_value(&mut self) -> Result<Option<Value>> {
        if self.errored {
            return Ok(None);
        }
        let result = self.parse_value();
        if result.is_err() {
            self.errored = true;
        }
        result
    }

    fn too_short(&self, step: &'static str, expected: usize) -> Error {
        Error::LengthTooShort {
            step,
            actual: self.buf.remaining(),
            expected,
        }
    }

    fn read_exact(&mut self, step: &'static str, len: usize) -> Result<&[u8]> {
        if len > self.buf.remaining() {
            return Err(self.too_short(step, len));
        }
        Ok(self.buf.read(len))
    }

    /// Reserve the next cache slot, to be filled in later.
    fn reserve_slot(&mut self) -> usize {
        self.cache.push(Value::Null);
        self.cache.len() - 1
    }

    fn parse_value(&mut self) -> Result<Option<Value>> {
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            let header = match header::read(&mut self.buf)? {
                Some(h) => h,
                None if stack.is_empty() => return Ok(None),
                None => return Err(self.too_short("container contents", 1)),
            };
            let mut value = match header.code {
                TypeCode::List | TypeCode::Dict => {
                    let is_list = header.code == TypeCode::List;
                    let left = header.len("container")?;
                    let min_bytes = if is_list { left } else { left.saturating_mul(2) };
                    if min_bytes > self.buf.remaining() {
                        return Err(self.too_short("container contents", min_bytes));
                    }
                    let slot = self.reserve_slot();
                    if left == 0 {
                        let empty = if is_list {
                            Value::List(Arc::new(Vec::new()))
                        } else {
                            Value::Dict(Arc::new(Dict::new()))
                        };
                        self.cache[slot] = empty.clone();
                        empty
                    } else {
                        if stack.len() >= MAX_DEPTH {
                            return Err(Error::ParseLimit("Depth limit exceeded".to_string()));
                        }
                        stack.push(if is_list {
                            Frame::List {
                                slot,
                                items: Vec::with_capacity(left),
                                left,
                            }
                        } else {
                            Frame::Dict {
                                slot,
                                dict: Dict::with_capacity(left),
                                key: None,
                                left,
                            }
                        });
                        continue;
                    }
                }
                _ => self.parse_scalar(header)?,
            };
            // Hand the value up through every container it completes
            loop {
                let frame = match stack.last_mut() {
                    None => return Ok(Some(value)),
                    Some(frame) => frame,
                };
                match frame.accept(value) {
                    None => break,
                    Some((slot, done)) => {
                        stack.pop();
                        self.cache[slot] = done.clone();
                        value = done;
                    }
                }
            }
        }
    }

    fn parse_scalar(&mut self, header: Header) -> Result<Value> {
        Ok(match header.code {
            TypeCode::Int => Value::Int(Integer::from_parts(false, header.value)),
            TypeCode::NInt => Value::Int(Integer::from_parts(true, header.value)),
            TypeCode::Extra => self.parse_extra(header.value)?,
            TypeCode::Text => {
                let len = header.len("text")?;
                let raw = self.read_exact("text", len)?.to_vec();
                let s = String::from_utf8(raw)
                    .map_err(|e| Error::BadEncode(format!("text isn't valid UTF-8: {}", e)))?;
                let v = Value::Str(s);
                self.cache.push(v.clone());
                v
            }
            TypeCode::Bin => {
                let len = header.len("binary")?;
                let v = Value::Bin(self.read_exact("binary", len)?.to_vec());
                self.cache.push(v.clone());
                v
            }
            TypeCode::CRef => {
                let index = match header.value {
                    Magnitude::Small(v) => v,
                    Magnitude::Big(_) => u64::MAX,
                };
                let len = self.cache.len();
                usize::try_from(index)
                    .ok()
                    .and_then(|i| self.cache.get(i))
                    .cloned()
                    .ok_or(Error::CacheIndexOutOfRange { index, len })?
            }
            TypeCode::List | TypeCode::Dict => {
                return Err(Error::BadEncode("container in scalar position".to_string()))
            }
        })
    }

    fn parse_extra(&mut self, marker: Magnitude) -> Result<Value> {
        let marker = marker.as_u64().unwrap_or(u64::MAX);
        let extra = Extra::from_u64(marker).ok_or(Error::UnknownExtraType(marker))?;
        Ok(match extra {
            Extra::DZero | Extra::FZero => Value::F64(0.0),
            Extra::DOne | Extra::FOne => Value::F64(1.0),
            Extra::DMinusOne | Extra::FMinusOne => Value::F64(-1.0),
            Extra::Float => Value::F64(LittleEndian::read_f32(self.read_exact("f32", 4)?).into()),
            Extra::Double => Value::F64(LittleEndian::read_f64(self.read_exact("f64", 8)?)),
            Extra::True => Value::Bool(true),
            Extra::False => Value::Bool(false),
            Extra::Time => {
                let secs = varint::read(&mut self.buf)?.ok_or_else(|| self.too_short("time", 1))?;
                let secs = secs
                    .as_u64()
                    .and_then(|s| i64::try_from(s).ok())
                    .ok_or_else(|| Error::BadEncode("time is out of range".to_string()))?;
                Value::Timestamp(Timestamp::from_sec(secs))
            }
            Extra::Compressed => return Err(Error::UnimplementedFeature("compressed stream")),
            Extra::Object | Extra::Method | Extra::Function | Extra::GlobRef => {
                return Err(Error::UnknownExtraType(marker))
            }
        })
    }
}

impl std::iter::Iterator for Parser {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_value().transpose()
    }
}
