//! Protected in-memory storage for secret text
//!
//! A [`SecureString`] never keeps its value in the clear. The bytes are stored
//! masked with a random one-time pad and are only unmasked into a dedicated
//! scratch buffer for the duration of a [`SecureString::with_plaintext`] call.
//! The scratch buffer is overwritten with zeros when the call ends, whether the
//! closure returns normally, returns an error, or panics.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CofferError, CofferResult};

/// Masked value plus the pad that unmasks it
#[derive(Zeroize, ZeroizeOnDrop)]
struct Masked {
    data: Vec<u8>,
    pad: Vec<u8>,
}

impl Masked {
    fn seal(mut plaintext: Vec<u8>) -> Self {
        let mut pad = vec![0u8; plaintext.len()];
        OsRng.fill_bytes(&mut pad);
        let data = plaintext.iter().zip(&pad).map(|(p, k)| p ^ k).collect();
        plaintext.zeroize();
        Self { data, pad }
    }

    fn byte(&self, i: usize) -> u8 {
        self.data[i] ^ self.pad[i]
    }
}

/// Zeroes the scratch buffer when dropped, including during unwinding
struct Scratch<'a>(MutexGuard<'a, Vec<u8>>);

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        self.0.as_mut_slice().zeroize();
    }
}

/// Secret text with scoped plaintext access
///
/// Not `Clone` and not `Serialize`: share it behind an `Arc` and convert it
/// to an ordinary string only through [`SecureString::reveal`].
pub struct SecureString {
    masked: Mutex<Option<Masked>>,
    scratch: Mutex<Vec<u8>>,
    len: usize,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SecureString {
    /// Take ownership of `bytes` and protect them; the source buffer is zeroed
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len();
        Self {
            masked: Mutex::new(Some(Masked::seal(bytes))),
            scratch: Mutex::new(vec![0u8; len]),
            len,
        }
    }

    /// Protect a `String`, zeroing its buffer
    pub fn from_string(s: String) -> Self {
        Self::new(s.into_bytes())
    }

    /// Length of the protected value in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether [`SecureString::release`] has been called
    pub fn is_released(&self) -> bool {
        relock(&self.masked).is_none()
    }

    /// Run `f` with the plaintext bytes
    ///
    /// The plaintext lives only in the scratch buffer and is wiped before this
    /// returns. Only the scratch lock is held while `f` runs, so `f` may
    /// compare, format or release this value, but must not unmask it again
    /// (through `with_plaintext`, `with_str` or `reveal`).
    pub fn with_plaintext<R>(&self, f: impl FnOnce(&[u8]) -> R) -> CofferResult<R> {
        // Scratch first: a waiting caller must not hold `masked`
        let mut scratch = Scratch(relock(&self.scratch));
        let guard = relock(&self.masked);
        let Some(masked) = guard.as_ref() else {
            tracing::error!("protected value accessed after release");
            return Err(CofferError::UseAfterRelease);
        };

        for (i, slot) in scratch.0.iter_mut().enumerate() {
            *slot = masked.byte(i);
        }
        drop(guard);
        Ok(f(&scratch.0))
    }

    /// Run `f` with the plaintext as UTF-8 text
    pub fn with_str<R>(&self, f: impl FnOnce(&str) -> R) -> CofferResult<R> {
        self.with_plaintext(|bytes| std::str::from_utf8(bytes).map(f))?
            .map_err(|_| CofferError::Validation("Protected value is not valid UTF-8".into()))
    }

    /// Copy the value out as an ordinary string
    ///
    /// This is the only way to obtain a plain copy; every call is traced.
    pub fn reveal(&self) -> CofferResult<Zeroizing<String>> {
        tracing::debug!(len = self.len, "protected value revealed");
        self.with_plaintext(|bytes| String::from_utf8(bytes.to_vec()))?
            .map(Zeroizing::new)
            .map_err(|e| {
                e.into_bytes().zeroize();
                CofferError::Validation("Protected value is not valid UTF-8".into())
            })
    }

    /// Zero and free the protected value. Idempotent.
    pub fn release(&self) {
        // Dropping `Masked` zeroes it
        relock(&self.masked).take();
        match self.scratch.try_lock() {
            Ok(mut scratch) => scratch.as_mut_slice().zeroize(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().as_mut_slice().zeroize(),
            // A running `with_plaintext` wipes it when its guard drops
            Err(TryLockError::WouldBlock) => {}
        }
    }

    #[cfg(test)]
    fn scratch_snapshot(&self) -> Vec<u8> {
        relock(&self.scratch).clone()
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.release();
    }
}

impl PartialEq for SecureString {
    /// Constant-time comparison of the protected values; released values are
    /// never equal to anything
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return !self.is_released();
        }
        if self.len != other.len {
            return false;
        }
        // Lock in address order so `a == b` and `b == a` cannot deadlock
        let (first, second) = if (self as *const Self) < (other as *const Self) {
            (self, other)
        } else {
            (other, self)
        };
        let a = relock(&first.masked);
        let b = relock(&second.masked);
        match (a.as_ref(), b.as_ref()) {
            (Some(a), Some(b)) => {
                let diff = (0..self.len).fold(0u8, |acc, i| acc | (a.byte(i) ^ b.byte(i)));
                diff == 0
            }
            _ => false,
        }
    }
}

impl Eq for SecureString {}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

// Don't print the contents in Debug output
impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureString")
            .field("len", &self.len)
            .field("released", &self.is_released())
            .finish()
    }
}

// Don't print the contents in Display output
impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED {} bytes]", self.len)
    }
}
