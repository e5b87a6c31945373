//! Session store implementations

mod file;
mod kv_blob;
mod kv_hash;
mod memory;
mod traits;

pub use file::FileStore;
pub use kv_blob::KvBlobStore;
pub use kv_hash::KvHashStore;
pub use memory::MemoryStore;
pub use traits::SessionStore;

use std::time::Duration;

/// TTL in whole seconds, at least one
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[cfg(test)]
pub(crate) mod testing;
