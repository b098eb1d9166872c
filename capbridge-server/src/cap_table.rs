use crate::server::CapabilityServer;
use capbridge_core::{CapId, HostRuntime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapTableError {
    #[error("capability {0} not found")]
    NotFound(CapId),
}

struct Entry<R: HostRuntime> {
    server: Rc<dyn CapabilityServer<R>>,
    refs: usize,
}

/// Exported capabilities, reference counted by the importing side.
///
/// Releasing the last reference drops the table's handle on the server;
/// for host-backed servers that releases the host object too.
pub struct CapTable<R: HostRuntime> {
    caps: RefCell<IndexMap<CapId, Entry<R>>>,
    next_id: Cell<u64>,
}

impl<R: HostRuntime> CapTable<R> {
    pub fn new() -> Self {
        CapTable {
            caps: RefCell::new(IndexMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// Export a server with one reference held by the importer.
    pub fn export(&self, server: Rc<dyn CapabilityServer<R>>) -> CapId {
        let id = CapId::from(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        debug!(cap = %id, interface = %server.schema().name, "exported capability");
        self.caps.borrow_mut().insert(id, Entry { server, refs: 1 });
        id
    }

    pub fn lookup(&self, id: CapId) -> Option<Rc<dyn CapabilityServer<R>>> {
        self.caps.borrow().get(&id).map(|entry| Rc::clone(&entry.server))
    }

    pub fn retain(&self, id: CapId) -> Result<usize, CapTableError> {
        let mut caps = self.caps.borrow_mut();
        let entry = caps.get_mut(&id).ok_or(CapTableError::NotFound(id))?;
        entry.refs += 1;
        debug!(cap = %id, refs = entry.refs, "retained capability");
        Ok(entry.refs)
    }

    /// Drop one reference. Returns `true` when the capability was removed.
    pub fn release(&self, id: CapId) -> Result<bool, CapTableError> {
        let removed = {
            let mut caps = self.caps.borrow_mut();
            let entry = caps.get_mut(&id).ok_or(CapTableError::NotFound(id))?;
            entry.refs -= 1;
            if entry.refs == 0 {
                caps.shift_remove(&id)
            } else {
                debug!(cap = %id, refs = entry.refs, "released capability reference");
                None
            }
        };
        // The server may run host code on drop, so it goes after the borrow ends.
        match removed {
            Some(entry) => {
                debug!(cap = %id, "disposed capability");
                drop(entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop every export regardless of outstanding references.
    pub fn clear(&self) {
        let drained: Vec<_> = self.caps.borrow_mut().drain(..).collect();
        drop(drained);
    }

    pub fn len(&self) -> usize {
        self.caps.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.borrow().is_empty()
    }

    pub fn stats(&self) -> CapTableStats {
        let caps = self.caps.borrow();
        CapTableStats {
            exported: caps.len(),
            total_refs: caps.values().map(|entry| entry.refs).sum(),
        }
    }
}

impl<R: HostRuntime> Default for CapTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapTableStats {
    pub exported: usize,
    pub total_refs: usize,
}
