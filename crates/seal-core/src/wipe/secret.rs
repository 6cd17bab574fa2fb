//! Shared handles for sensitive in-memory values.
//!
//! Each handle is a cheap clone of one shared allocation. Cloning does **not**
//! copy the secret: every clone observes the same buffer, so a wipe performed
//! through any handle (usually the [`WipeScope`](super::WipeScope) flush) is
//! visible to all of them. Use `duplicate` to obtain an independent copy with
//! a new identity.
//!
//! All three handles zeroize their contents when the last clone is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use zeroize::{Zeroize, Zeroizing};

use crate::crypto::KEY_LEN;

/// Identity of a tracked allocation, stable while any strong or weak
/// reference to it exists.
pub(crate) type Identity = usize;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned buffer must still be wipeable.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

type TextCell = Mutex<Zeroizing<String>>;

/// A sensitive UTF-8 string (secret, passphrase, decrypted field value).
#[derive(Clone)]
pub struct SecretText(Arc<TextCell>);

impl SecretText {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Arc::new(Mutex::new(Zeroizing::new(value.into()))))
    }

    /// Run `f` against the current contents.
    pub fn expose<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        f(lock(&self.0).as_str())
    }

    /// Copy the contents into a new, independently tracked handle.
    pub fn duplicate(&self) -> Self {
        Self::new(self.expose(str::to_owned))
    }

    /// Number of bytes currently held.
    pub fn len(&self) -> usize {
        lock(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.0).is_empty()
    }

    /// `true` when both handles refer to the same allocation.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub(crate) fn identity(&self) -> Identity {
        Arc::as_ptr(&self.0) as Identity
    }

    pub(crate) fn downgrade(&self) -> Weak<TextCell> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn wipe_cell(cell: &TextCell) {
        lock(cell).zeroize();
    }
}

impl std::fmt::Debug for SecretText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretText([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// Bytes
// ---------------------------------------------------------------------------

type BytesCell = Mutex<Zeroizing<Vec<u8>>>;

/// A sensitive byte buffer (decrypted payload, raw secret bytes).
///
/// Wiping zero-fills the buffer in place; its length is preserved.
#[derive(Clone)]
pub struct SecretBytes(Arc<BytesCell>);

impl SecretBytes {
    pub fn new(value: Vec<u8>) -> Self {
        Self(Arc::new(Mutex::new(Zeroizing::new(value))))
    }

    pub fn expose<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(lock(&self.0).as_slice())
    }

    /// Copy the contents out. The copy is **not** tracked.
    pub fn to_vec(&self) -> Vec<u8> {
        self.expose(<[u8]>::to_vec)
    }

    pub fn len(&self) -> usize {
        lock(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.0).is_empty()
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub(crate) fn identity(&self) -> Identity {
        Arc::as_ptr(&self.0) as Identity
    }

    pub(crate) fn downgrade(&self) -> Weak<BytesCell> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn wipe_cell(cell: &BytesCell) {
        lock(cell).as_mut_slice().zeroize();
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED; {}])", self.len())
    }
}

// ---------------------------------------------------------------------------
// Key material
// ---------------------------------------------------------------------------

type KeyCell = Mutex<Option<Zeroizing<[u8; KEY_LEN]>>>;

/// A derived symmetric key. Single use: destroyed once the operation that
/// derived it completes.
#[derive(Clone)]
pub struct KeyMaterial(Arc<KeyCell>);

impl KeyMaterial {
    pub(crate) fn new(bytes: Zeroizing<[u8; KEY_LEN]>) -> Self {
        Self(Arc::new(Mutex::new(Some(bytes))))
    }

    /// Run `f` against the raw key bytes, or return `None` once destroyed.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8; KEY_LEN]) -> R) -> Option<R> {
        lock(&self.0).as_deref().map(f)
    }

    /// Clear the key. Idempotent.
    pub fn destroy(&self) {
        Self::wipe_cell(&self.0);
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.0).is_none()
    }

    pub(crate) fn identity(&self) -> Identity {
        Arc::as_ptr(&self.0) as Identity
    }

    pub(crate) fn downgrade(&self) -> Weak<KeyCell> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn wipe_cell(cell: &KeyCell) {
        // Dropping the `Zeroizing` wrapper clears the bytes.
        lock(cell).take();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// Tracked members
// ---------------------------------------------------------------------------

/// Weak reference to a tracked handle; the closed set of wipeable kinds.
pub(crate) enum Tracked {
    Text(Weak<TextCell>),
    Bytes(Weak<BytesCell>),
    Key(Weak<KeyCell>),
}

impl Tracked {
    /// Securely destroy the referenced value.
    ///
    /// Returns `false` if every strong handle was already dropped, in which
    /// case the value was zeroized on drop.
    pub(crate) fn destroy(&self) -> bool {
        match self {
            Tracked::Text(w) => w.upgrade().map(|c| SecretText::wipe_cell(&c)).is_some(),
            Tracked::Bytes(w) => w.upgrade().map(|c| SecretBytes::wipe_cell(&c)).is_some(),
            Tracked::Key(w) => w.upgrade().map(|c| KeyMaterial::wipe_cell(&c)).is_some(),
        }
    }
}
