//! Payload handle registry.
//!
//! Binary payloads handed in by the caller are only reachable through
//! handles minted here. A handle has a stable string address the renderer
//! can be given in place of a file path; the payload stays fetchable until
//! the handle is revoked.

use std::{collections::HashMap, fmt, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

/// Address scheme prefix of every handle.
pub const HANDLE_SCHEME: &str = "blob:stage/";

/// Opaque, revocable reference to one payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    id: u64,
}

impl Handle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Address substituted into a resolved manifest.
    pub fn address(&self) -> String {
        format!("{HANDLE_SCHEME}{}", self.id)
    }

    /// Parses an address produced by [`Handle::address`].
    pub fn from_address(address: &str) -> Option<Self> {
        address
            .strip_prefix(HANDLE_SCHEME)?
            .parse()
            .ok()
            .map(|id| Handle { id })
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{HANDLE_SCHEME}{}", self.id)
    }
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    live: HashMap<u64, Bytes>,
}

/// Registry of live payload handles.
///
/// Cloning yields another view of the same registry, so instances can keep
/// one to read payloads lazily.
#[derive(Clone, Default)]
pub struct ResourceHandleRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ResourceHandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh handle bound to `payload`.
    pub fn create(&self, payload: Bytes) -> Handle {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.live.insert(id, payload);
        trace!(handle = id, "Handle created");
        Handle { id }
    }

    /// Invalidates a handle. Unknown or already revoked handles are ignored.
    ///
    /// Returns whether the handle was live.
    pub fn revoke(&self, handle: &Handle) -> bool {
        let removed = self.inner.lock().live.remove(&handle.id).is_some();
        if removed {
            trace!(handle = handle.id, "Handle revoked");
        }
        removed
    }

    /// Revokes every handle in `handles` under a single lock.
    ///
    /// Returns how many of them were live.
    pub fn revoke_all<'a, I>(&self, handles: I) -> usize
    where
        I: IntoIterator<Item = &'a Handle>,
    {
        let mut inner = self.inner.lock();
        let revoked = handles
            .into_iter()
            .filter(|h| inner.live.remove(&h.id).is_some())
            .count();
        trace!(revoked, "Handles revoked");
        revoked
    }

    /// Reads the payload behind a live handle.
    pub fn fetch(&self, handle: &Handle) -> Option<Bytes> {
        self.inner.lock().live.get(&handle.id).cloned()
    }

    /// Reads the payload behind a handle address.
    pub fn fetch_address(&self, address: &str) -> Option<Bytes> {
        Handle::from_address(address).and_then(|h| self.fetch(&h))
    }

    pub fn is_live(&self, handle: &Handle) -> bool {
        self.inner.lock().live.contains_key(&handle.id)
    }

    /// Number of handles currently live.
    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }
}

impl fmt::Debug for ResourceHandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandleRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}
