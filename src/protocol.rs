//! One-shot and streaming entry points to the codec.
//!
//! Every value passed to a single [`dump_all`] call, or written through a single [`Writer`],
//! shares one object cache. The same goes for [`load_all`] and [`Reader`] on the decoding side.
//! Data written by a `Writer` must be read back by a single `Reader`, in order.

use crate::error::{Error, Result};
use crate::formatter::Formatter;
use crate::parser::Parser;
use crate::value::Value;

/// Encode a single value.
pub fn dump(value: &Value) -> Result<Vec<u8>> {
    let mut fmt = Formatter::new();
    fmt.put(value)?;
    Ok(fmt.serialize())
}

/// Encode a sequence of values back to back, sharing one cache.
pub fn dump_all<'a, I>(values: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut fmt = Formatter::new();
    for v in values {
        fmt.put(v)?;
    }
    Ok(fmt.serialize())
}

/// Decode the first value. Fails on empty data.
pub fn load(data: &[u8]) -> Result<Value> {
    Parser::new(data)
        .next_value()?
        .ok_or(Error::LengthTooShort {
            step: "first value",
            actual: 0,
            expected: 1,
        })
}

/// Decode every value in the data.
pub fn load_all(data: &[u8]) -> Result<Vec<Value>> {
    Parser::new(data).collect()
}

/// Streaming encoder. Values written later can reference objects written earlier.
#[derive(Default)]
pub struct Writer {
    fmt: Formatter,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, value: &Value) -> Result<&mut Self> {
        self.fmt.put(value)?;
        Ok(self)
    }

    /// Bytes written since the writer was made, or since the last [`take`](Self::take).
    pub fn get(&self) -> &[u8] {
        self.fmt.as_bytes()
    }

    /// Take the pending bytes, ready to send, while keeping the cache for later writes.
    pub fn take(&mut self) -> Vec<u8> {
        self.fmt.take()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.fmt.serialize()
    }
}

/// Streaming decoder, the counterpart to [`Writer`].
#[derive(Debug)]
pub struct Reader {
    parser: Parser,
}

impl Reader {
    pub fn new(data: &[u8]) -> Self {
        Self {
            parser: Parser::new(data),
        }
    }

    /// Queue more data, such as the next chunk taken from a [`Writer`]. Each chunk must hold
    /// whole values.
    pub fn feed(&mut self, data: &[u8]) {
        self.parser.feed(data)
    }

    /// Read the next value, or `None` if there's nothing left.
    pub fn read(&mut self) -> Result<Option<Value>> {
        self.parser.next_value()
    }

    /// Read everything that's left.
    pub fn read_all(&mut self) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        while let Some(v) = self.read()? {
            out.push(v);
        }
        Ok(out)
    }
}
