/// A growable byte sequence with a single cursor, used as both the sink of the encoder and the
/// source of the decoder.
///
/// Writes land at the cursor and extend the buffer as needed. If the cursor was moved past the
/// end, the gap is filled with zeros first. Reads never fail: a short read just returns whatever
/// bytes were left.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: Vec::with_capacity(cap),
            pos: 0,
        }
    }

    /// Wrap existing bytes, with the cursor at the start, ready for reading.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Write bytes at the cursor, advancing it.
    pub fn write(&mut self, bytes: &[u8]) {
        if self.pos > self.data.len() {
            self.data.resize(self.pos, 0);
        }
        let overlap = (self.data.len() - self.pos).min(bytes.len());
        self.data[self.pos..self.pos + overlap].copy_from_slice(&bytes[..overlap]);
        self.data.extend_from_slice(&bytes[overlap..]);
        self.pos += bytes.len();
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.write(&[byte]);
    }

    /// Append bytes at the end without touching the cursor.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Read up to `n` bytes from the cursor, advancing it past whatever was returned.
    pub fn read(&mut self, n: usize) -> &[u8] {
        let start = self.pos.min(self.data.len());
        let end = start.saturating_add(n).min(self.data.len());
        self.pos = end;
        &self.data[start..end]
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Bytes between the cursor and the end.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Drop everything before the cursor and move the cursor to 0.
    pub fn compact(&mut self) {
        let pos = self.pos.min(self.data.len());
        self.data.drain(..pos);
        self.pos = 0;
    }

    /// Drop everything past `len`, pulling the cursor back if it was beyond that.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
        self.pos = self.pos.min(len);
    }

    /// Take all the bytes out, leaving an empty buffer.
    pub fn take(&mut self) -> Vec<u8> {
        self.pos = 0;
        std::mem::take(&mut self.data)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}
