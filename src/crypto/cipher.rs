//! AES block cipher and the counter-mode transformer built on it.
//!
//! The counter block is the IV with a 32-bit big-endian block counter XORed into its last four
//! bytes. The counter starts at zero. Encryption and decryption are the same operation.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};

use crate::error::{Error, Result};

pub const BLOCK_SIZE: usize = 16;

/// AES with a 128, 192, or 256-bit key, picked from the key length.
#[derive(Clone)]
pub enum Aes {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl Aes {
    pub fn new(key: &[u8]) -> Result<Aes> {
        let bad_len = |_| Error::KeyFormat(format!("AES key can't be {} bytes long", key.len()));
        Ok(match key.len() {
            16 => Aes::Aes128(Aes128::new_from_slice(key).map_err(bad_len)?),
            24 => Aes::Aes192(Aes192::new_from_slice(key).map_err(bad_len)?),
            32 => Aes::Aes256(Aes256::new_from_slice(key).map_err(bad_len)?),
            len => {
                return Err(Error::KeyFormat(format!(
                    "AES key can't be {} bytes long",
                    len
                )))
            }
        })
    }

    pub fn encrypt_block(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut out = GenericArray::clone_from_slice(block);
        match self {
            Aes::Aes128(c) => c.encrypt_block(&mut out),
            Aes::Aes192(c) => c.encrypt_block(&mut out),
            Aes::Aes256(c) => c.encrypt_block(&mut out),
        }
        out.into()
    }

    pub fn decrypt_block(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut out = GenericArray::clone_from_slice(block);
        match self {
            Aes::Aes128(c) => c.decrypt_block(&mut out),
            Aes::Aes192(c) => c.decrypt_block(&mut out),
            Aes::Aes256(c) => c.decrypt_block(&mut out),
        }
        out.into()
    }
}

/// Stateful AES-CTR keystream. Data may be fed in pieces of any size.
pub struct CtrTransformer {
    cipher: Aes,
    iv: [u8; BLOCK_SIZE],
    counter: u32,
    keystream: [u8; BLOCK_SIZE],
    index: usize,
}

impl CtrTransformer {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<CtrTransformer> {
        let iv: [u8; BLOCK_SIZE] = iv
            .try_into()
            .map_err(|_| Error::KeyFormat(format!("Bad IV length: {}", iv.len())))?;
        Ok(CtrTransformer {
            cipher: Aes::new(key)?,
            iv,
            counter: 0,
            keystream: [0; BLOCK_SIZE],
            // Forces the first block to be generated on first use
            index: BLOCK_SIZE,
        })
    }

    fn next_block(&mut self) {
        let mut block = self.iv;
        for (b, c) in block[BLOCK_SIZE - 4..]
            .iter_mut()
            .zip(self.counter.to_be_bytes())
        {
            *b ^= c;
        }
        self.keystream = self.cipher.encrypt_block(&block);
        self.counter = self.counter.wrapping_add(1);
        self.index = 0;
    }

    pub fn transform(&mut self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .map(|byte| {
                if self.index >= BLOCK_SIZE {
                    self.next_block();
                }
                let out = self.keystream[self.index] ^ byte;
                self.index += 1;
                out
            })
            .collect()
    }
}
