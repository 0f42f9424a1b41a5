/*!

The BOSS wire format, and the key and envelope layouts built on it.

BOSS (Binary Object Serialization Specification) is a compact, self-describing format. A stream
is a sequence of values with no framing between them. Repeated strings, byte strings, and
containers are written once and referred to afterwards by position in a per-stream cache, so
data with a lot of repetition stays small.

# Headers

Every value starts with a header byte. The low 3 bits are the type code, and the high 5 bits are
a field that either holds a small magnitude directly or says how the magnitude follows:

| Field     | Meaning                                                           |
|-----------|-------------------------------------------------------------------|
| 0-22      | The magnitude itself                                              |
| 23-30     | Magnitude follows as `field - 22` little-endian bytes (1-8 bytes) |
| 31        | A varint byte count follows, then that many little-endian bytes   |

The shortest form is always written. Decoders accept any of them.

The type codes are:

| Code | Type  | Magnitude is                                   |
|------|-------|------------------------------------------------|
| 0    | INT   | The integer                                    |
| 1    | EXTRA | A marker, see below                            |
| 2    | NINT  | The absolute value of a negative integer       |
| 3    | TEXT  | Length in bytes of the UTF-8 text that follows |
| 4    | BIN   | Length of the bytes that follow                |
| 5    | CREF  | An index into the object cache                 |
| 6    | LIST  | Number of values that follow                   |
| 7    | DICT  | Number of key-value pairs that follow          |

Integers have no size limit. The magnitude may run as long as its byte count says.

# Varints

Varints appear after the escape field and after the time marker. They hold 7 bits per byte,
least significant group first. The last byte has its high bit set; every earlier byte has it
clear. This is the opposite convention from LEB128.

# EXTRA markers

| Marker | Meaning                                              |
|--------|------------------------------------------------------|
| 0      | Double 0.0                                           |
| 1      | Float 0.0                                            |
| 2      | Double 1.0                                           |
| 3      | Float 1.0                                            |
| 4      | Double -1.0                                          |
| 5      | Float -1.0                                           |
| 6      | 4-byte little-endian float follows                   |
| 7      | 8-byte little-endian double follows                  |
| 8-11   | Reserved                                             |
| 12     | `true`                                               |
| 13     | `false`                                              |
| 14     | Compressed stream. Reserved, decoding fails          |
| 15     | Time: a varint of whole seconds since the epoch      |

This crate always writes doubles, and reads floats back as doubles. Time has a one second
resolution on the wire.

# The object cache

Encoder and decoder keep matching caches that start fresh for each stream. Index 0 always holds
null, so a `CREF` of 0 is how null is written. Every text, byte string, list, and dictionary takes
the next index in the order its header appears; a container takes its index before any of its
children. A later occurrence of a cached object can then be written as a `CREF` to its index.

Which occurrences count as "the same" is up to the encoder. Here, text and byte strings match
by content, while lists and dictionaries only match when they are the same shared object.

# Key layouts

Big integers in keys are minimal big-endian byte strings (BIN), not BOSS integers.

| Layout                                 | Contents                                    |
|----------------------------------------|---------------------------------------------|
| `[0, e, p, q]`                         | Private key                                 |
| `[1, e, n]`                            | Public key                                  |
| `[2, ...]`                             | Password-protected private key, version 1. Rejected |
| `[3, key_info, blob]`                  | Password-protected private key, version 2   |

For version 2, `key_info` is a packed key description: the stream
`algorithm, tag, prf, key_length, 0, rounds, salt`, where the `0, rounds` pair (PBKDF type and
round count) is only present for password-derived keys. The blob is
`IV (16) || AES-256-CTR(packed private key) || HMAC-SHA256(IV || ciphertext)`, under a key
derived with PBKDF2-HMAC-SHA256.

A fingerprint is `0x07 || SHA-256(e || n)`. An address is
`mask || SHA3-256(e || n) || CRC32` (37 bytes) or `mask || SHA3-384(e || n) || CRC32` (53 bytes),
where the CRC32 is big-endian and covers everything before it, and `mask` holds the key size
class in its high nibble and an application type mark in its low nibble.

# Envelopes

An extended signature is `{exts, sign}`, with `exts` the packed record
`{key, sha512, created_at, pub_key}` and `sign` a PSS signature over `exts` using SHA-512 and
MGF1-SHA-1. A signed record is `[0, public_key, signature, [nonce, payload]]`, with the inner list
packed separately and signed with PSS using SHA3-384 and MGF1-SHA-1.

*/
