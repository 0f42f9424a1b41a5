//! BOSS binary serialization, with an RSA public-key layer built on top.
//!
//! BOSS is a compact, self-describing binary format. Repeated strings and containers in a stream
//! are written once and referenced afterwards, which keeps typical records small. The format
//! itself is described in the [`format`] module.
//!
//! This crate provides:
//!
//! - A [`Value`] tree covering everything BOSS carries: arbitrary-size integers, doubles,
//!   booleans, text, byte strings, lists, ordered dictionaries, and timestamps.
//! - [`dump`], [`load`], and [`load_all`] for whole buffers, and a [`Writer`] / [`Reader`] pair
//!   for streams that share one object cache across many values.
//! - A serde bridge: [`to_value`], [`from_value`], [`to_vec`], and [`from_slice`].
//! - RSA keys with BOSS packing, password protection, PSS signatures, and OAEP encryption, in
//!   [`crypto`].
//! - Extended signatures and signed records, both carrying the signer's key along with the
//!   signature.
//!
//! # Example
//!
//! ```
//! # fn main() -> boss_pki::Result<()> {
//! use boss_pki::{dump, load, Dict, Value};
//!
//! let mut dict = Dict::new();
//! dict.insert("name", "boss");
//! dict.insert("answer", 42);
//! let value = Value::from(dict);
//!
//! let bytes = dump(&value)?;
//! assert_eq!(load(&bytes)?, value);
//! # Ok(())
//! # }
//! ```
//!
//! Signing data with an extended signature:
//!
//! ```no_run
//! # fn main() -> boss_pki::Result<()> {
//! use boss_pki::crypto::{extended_signature, PrivateKey};
//!
//! let key = PrivateKey::generate(2048)?;
//! let signature = extended_signature::sign(&key, b"some data")?;
//! let verified = extended_signature::verify(&key.public_key(), &signature, b"some data")?;
//! assert!(verified.is_some());
//! # Ok(())
//! # }
//! ```

mod buffer;
mod de;
mod formatter;
mod header;
mod integer;
mod parser;
mod protocol;
mod ser;
mod timestamp;
mod value;
mod varint;

pub mod capsule;
pub mod crypto;
pub mod error;
pub mod format;

pub use de::{from_slice, from_value};
pub use error::{Error, Result};
pub use integer::Integer;
pub use protocol::{dump, dump_all, load, load_all, Reader, Writer};
pub use ser::{to_value, to_vec};
pub use timestamp::Timestamp;
pub use value::{Dict, Value};

/// Deepest nesting of lists and dictionaries accepted when encoding or decoding.
pub const MAX_DEPTH: usize = 1000;
