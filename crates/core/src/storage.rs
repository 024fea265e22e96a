//! Durable key-value storage for conversation history.
//!
//! A storage keeps whole string values under namespaced keys. Values are
//! always replaced as a whole, never patched.

mod error;
mod file;
mod memory;

pub use error::{Error, ErrorKind};
pub use file::FileStorage;
pub use memory::MemoryStorage;

/// A durable key-value store.
///
/// Implementations are driven from a single task and may block briefly.
pub trait Storage: Send + 'static {
    /// Reads the value stored under `key`, `None` if there is none.
    fn read(&self, key: &str) -> Result<Option<String>, Error>;

    /// Replaces the value stored under `key`.
    fn write(&mut self, key: &str, value: &str) -> Result<(), Error>;

    /// Removes the value stored under `key`. Removing a missing key is not
    /// an error.
    fn remove(&mut self, key: &str) -> Result<(), Error>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    #[inline]
    fn read(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).read(key)
    }

    #[inline]
    fn write(&mut self, key: &str, value: &str) -> Result<(), Error> {
        (**self).write(key, value)
    }

    #[inline]
    fn remove(&mut self, key: &str) -> Result<(), Error> {
        (**self).remove(key)
    }
}
