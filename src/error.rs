use std::fmt;

use serde::{de, ser};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// A header byte or its magnitude extension was truncated or otherwise invalid.
    MalformedHeader(String),
    /// A type code outside of the 8 known BOSS types.
    UnknownType(u8),
    /// An EXTRA marker this decoder doesn't know how to interpret.
    UnknownExtraType(u64),
    /// The encoder was handed a value it has no encoding for. Holds the value's shape.
    UnsupportedType(&'static str),
    /// A cache reference pointed past the end of the object cache.
    CacheIndexOutOfRange { index: u64, len: usize },
    /// Reserved format feature that has no implementation, like the compressed-stream marker.
    UnimplementedFeature(&'static str),
    /// Encoded data ended before a value was complete.
    LengthTooShort {
        step: &'static str,
        actual: usize,
        expected: usize,
    },
    /// Basic BOSS encoding failure, such as invalid UTF-8 in a text value.
    BadEncode(String),
    /// Hit a nesting or size limit while encoding or decoding.
    ParseLimit(String),
    /// Occurs when serde serialization or deserialization fails
    SerdeFail(String),
    /// Signature didn't validate against the signed data.
    BadSignature,
    /// A signed record used a record type this crate doesn't handle.
    UnsupportedRecordType(i64),
    /// Authentication tag of an encrypted envelope didn't match. For password-protected keys,
    /// this is also what a wrong password looks like.
    HmacMismatch,
    /// Key material didn't have the expected packed layout.
    KeyFormat(String),
    /// A recognized, but no longer accepted, format version.
    UnsupportedVersion(String),
    /// Failure within the RSA engine.
    Crypto(rsa::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::MalformedHeader(ref err) => write!(f, "Malformed header: {}", err),
            Error::UnknownType(code) => write!(f, "Unknown BOSS type code {}", code),
            Error::UnknownExtraType(marker) => write!(f, "Unknown BOSS extra marker {}", marker),
            Error::UnsupportedType(shape) => write!(f, "Can't encode value of type {}", shape),
            Error::CacheIndexOutOfRange { index, len } => write!(
                f,
                "Cache reference {} is out of range, cache holds {} entries",
                index, len
            ),
            Error::UnimplementedFeature(feat) => write!(f, "Unimplemented feature: {}", feat),
            Error::LengthTooShort {
                step,
                actual,
                expected,
            } => write!(
                f,
                "Expected data length {}, but got {} on step [{}]",
                expected, actual, step
            ),
            Error::BadEncode(ref err) => write!(f, "Basic data encoding failure: {}", err),
            Error::ParseLimit(ref err) => write!(f, "Hit parsing limit: {}", err),
            Error::SerdeFail(ref msg) => f.write_str(msg),
            Error::BadSignature => write!(f, "A signature failed to verify"),
            Error::UnsupportedRecordType(t) => write!(f, "Unsupported signed record type {}", t),
            Error::HmacMismatch => write!(f, "HMAC mismatch: data is corrupt or the key is wrong"),
            Error::KeyFormat(ref err) => write!(f, "Bad key format: {}", err),
            Error::UnsupportedVersion(ref err) => write!(f, "Unsupported version: {}", err),
            Error::Crypto(ref err) => write!(f, "Cryptographic Error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Crypto(ref err) => Some(err),
            _ => None,
        }
    }
}

impl std::convert::From<rsa::Error> for Error {
    fn from(e: rsa::Error) -> Self {
        Self::Crypto(e)
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}
