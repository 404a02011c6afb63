//! Core trait definitions for KappaView
//!
//! The engine reads the target through [`MemoryAccess`] so it can run against
//! a live process or an in-memory fake.

use kappa_common::MemoryError;

/// Read-only access to a foreign process. `Send` so an engine can be moved
/// onto a worker thread.
pub trait MemoryAccess: Send {
    /// Read `size` bytes starting at `address`
    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>, MemoryError>;

    /// Whether the target process is still running
    fn is_alive(&self) -> bool;
}
