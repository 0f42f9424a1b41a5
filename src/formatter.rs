//! BOSS encoding.
//!
//! The [`Formatter`] walks a [`Value`] tree without recursion, writing headers and payloads into a
//! [`ByteBuffer`]. Every text, binary, list, and dictionary it writes gets the next slot in the
//! object cache, in the order its header is written. Containers take their slot before any of
//! their children. A later occurrence of a cached object is written as a cache reference.
//!
//! Cache matching:
//! - Text and binary values match by content.
//! - Lists and dictionaries match by identity: only a clone of the same `Arc` is referenced, an
//!   equal but separately built container is encoded again.
//!
//! Slot 0 is the null value, so the first cached object gets index 1.

use std::collections::HashMap;
use std::slice;
use std::sync::Arc;

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};
use crate::header::{self, Extra, TypeCode};
use crate::value::{Dict, Value};
use crate::varint;
use crate::MAX_DEPTH;

enum Frame<'v> {
    List(slice::Iter<'v, Value>),
    Dict(Box<dyn Iterator<Item = &'v Value> + 'v>),
}

impl<'v> Frame<'v> {
    fn next(&mut self) -> Option<&'v Value> {
        match self {
            Frame::List(iter) => iter.next(),
            Frame::Dict(iter) => iter.next(),
        }
    }
}

fn dict_items(dict: &Dict) -> Box<dyn Iterator<Item = &Value> + '_> {
    Box::new(dict.iter().flat_map(|(k, v)| [k, v]))
}

/// Encodes values into BOSS, sharing one object cache across every value it is given.
pub struct Formatter {
    buf: ByteBuffer,
    next_index: u64,
    texts: HashMap<String, u64>,
    bins: HashMap<Vec<u8>, u64>,
    objects: HashMap<usize, u64>,
    // Holding on to every cached container keeps its address from being reused by a new one.
    retained: Vec<Value>,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter {
    pub fn new() -> Self {
        Self {
            buf: ByteBuffer::new(),
            next_index: 1,
            texts: HashMap::new(),
            bins: HashMap::new(),
            objects: HashMap::new(),
            retained: Vec::new(),
        }
    }

    /// Encode one value onto the end of the output.
    ///
    /// On failure, nothing from this value is kept: the output and the cache are exactly as they
    /// were before the call.
    pub fn put(&mut self, value: &Value) -> Result<&mut Self> {
        let mark = (self.buf.len(), self.next_index, self.retained.len());
        if let Err(e) = self.put_inner(value) {
            self.rollback(mark);
            return Err(e);
        }
        Ok(self)
    }

    fn rollback(&mut self, (len, next_index, retained): (usize, u64, usize)) {
        self.buf.truncate(len);
        self.next_index = next_index;
        self.texts.retain(|_, index| *index < next_index);
        self.bins.retain(|_, index| *index < next_index);
        self.objects.retain(|_, index| *index < next_index);
        self.retained.truncate(retained);
    }

    fn put_inner(&mut self, value: &Value) -> Result<()> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut next = Some(value);
        loop {
            let value = match next.take() {
                Some(v) => v,
                None => match stack.last_mut() {
                    None => break,
                    Some(frame) => match frame.next() {
                        Some(v) => v,
                        None => {
                            stack.pop();
                            continue;
                        }
                    },
                },
            };
            if let Some(frame) = self.put_one(value)? {
                stack.push(frame);
                if stack.len() > MAX_DEPTH {
                    return Err(Error::ParseLimit("Depth limit exceeded".to_string()));
                }
            }
        }
        Ok(())
    }

    /// Encoded bytes so far.
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// Take the encoded bytes so far, but keep the cache, so later values can still reference
    /// objects that were already sent.
    pub fn take(&mut self) -> Vec<u8> {
        self.buf.take()
    }

    /// Finish encoding, returning all the encoded bytes.
    pub fn serialize(self) -> Vec<u8> {
        self.buf.into_inner()
    }

    fn put_cref(&mut self, index: u64) {
        header::write_u64(&mut self.buf, TypeCode::CRef, index);
    }

    fn put_extra(&mut self, extra: Extra) {
        header::write_u64(&mut self.buf, TypeCode::Extra, extra.into_u64());
    }

    fn claim_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Returns the identity-cache index of a container, registering it if this is the first
    /// time it's been seen.
    fn object_index(&mut self, value: &Value, addr: usize) -> Option<u64> {
        if let Some(index) = self.objects.get(&addr) {
            return Some(*index);
        }
        let index = self.claim_index();
        self.objects.insert(addr, index);
        self.retained.push(value.clone());
        None
    }

    fn put_one<'v>(&mut self, value: &'v Value) -> Result<Option<Frame<'v>>> {
        match value {
            Value::Null => self.put_cref(0),
            Value::Bool(true) => self.put_extra(Extra::True),
            Value::Bool(false) => self.put_extra(Extra::False),
            Value::Int(v) => {
                let (negative, mag) = v.to_parts();
                let code = if negative {
                    TypeCode::NInt
                } else {
                    TypeCode::Int
                };
                header::write(&mut self.buf, code, &mag);
            }
            Value::F64(v) => {
                let bits = v.to_bits();
                if bits == 0f64.to_bits() {
                    self.put_extra(Extra::DZero);
                } else if bits == 1f64.to_bits() {
                    self.put_extra(Extra::DOne);
                } else if bits == (-1f64).to_bits() {
                    self.put_extra(Extra::DMinusOne);
                } else {
                    self.put_extra(Extra::Double);
                    self.buf.write(&v.to_le_bytes());
                }
            }
            Value::Timestamp(t) => {
                if t.timestamp_utc() < 0 {
                    return Err(Error::UnsupportedType("pre-epoch Time"));
                }
                self.put_extra(Extra::Time);
                varint::write(&mut self.buf, t.timestamp_utc() as u64);
            }
            Value::Str(s) => {
                if let Some(index) = self.texts.get(s.as_str()) {
                    let index = *index;
                    self.put_cref(index);
                } else {
                    let index = self.claim_index();
                    self.texts.insert(s.clone(), index);
                    header::write_u64(&mut self.buf, TypeCode::Text, s.len() as u64);
                    self.buf.write(s.as_bytes());
                }
            }
            Value::Bin(b) => {
                if let Some(index) = self.bins.get(b.as_slice()) {
                    let index = *index;
                    self.put_cref(index);
                } else {
                    let index = self.claim_index();
                    self.bins.insert(b.clone(), index);
                    header::write_u64(&mut self.buf, TypeCode::Bin, b.len() as u64);
                    self.buf.write(b);
                }
            }
            Value::List(list) => {
                let addr = Arc::as_ptr(list) as *const () as usize;
                if let Some(index) = self.object_index(value, addr) {
                    self.put_cref(index);
                } else {
                    header::write_u64(&mut self.buf, TypeCode::List, list.len() as u64);
                    return Ok(Some(Frame::List(list.iter())));
                }
            }
            Value::Dict(dict) => {
                let addr = Arc::as_ptr(dict) as *const () as usize;
                if let Some(index) = self.object_index(value, addr) {
                    self.put_cref(index);
                } else {
                    header::write_u64(&mut self.buf, TypeCode::Dict, dict.len() as u64);
                    return Ok(Some(Frame::Dict(dict_items(dict))));
                }
            }
        }
        Ok(None)
    }
}
