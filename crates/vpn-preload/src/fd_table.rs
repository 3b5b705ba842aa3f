//! Virtual descriptor table.
//!
//! Slot `i` stands for virtual descriptor `offset + i`. A slot whose remote
//! descriptor is `-1` is free; registration takes the lowest free slot before
//! growing the table, and slots are never removed.

use libc::c_int;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::error::TableError;
use crate::rpc::{ClientHandle, RpcClient};

const FREE: i32 = -1;

struct Slot {
    /// Weak: the registry owns the client
    client: Option<Weak<dyn RpcClient>>,
    remote_fd: i32,
}

impl Slot {
    fn is_free(&self) -> bool {
        self.remote_fd == FREE
    }

    fn owned_by(&self, client: &ClientHandle) -> bool {
        match &self.client {
            Some(weak) => std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(client)),
            None => false,
        }
    }
}

/// A live virtual descriptor
#[derive(Clone)]
pub struct Resolved {
    pub client: ClientHandle,
    pub remote_fd: i32,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("host", &self.client.host())
            .field("remote_fd", &self.remote_fd)
            .finish()
    }
}

pub struct VirtualFdTable {
    offset: c_int,
    slots: Mutex<Vec<Slot>>,
}

impl VirtualFdTable {
    pub fn new(offset: c_int) -> Self {
        Self {
            offset,
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn offset(&self) -> c_int {
        self.offset
    }

    fn slots(&self) -> MutexGuard<'_, Vec<Slot>> {
        // Every mutation leaves the table consistent, so a poisoned lock is
        // still usable
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn index_of(&self, vfd: c_int) -> Option<usize> {
        if vfd < self.offset {
            return None;
        }
        usize::try_from(vfd.checked_sub(self.offset)?).ok()
    }

    /// Bind `remote_fd` on `client` to a virtual descriptor
    pub fn register(&self, client: &ClientHandle, remote_fd: i32) -> Result<c_int, TableError> {
        if remote_fd < 0 {
            return Err(TableError::InvalidRemote(remote_fd));
        }

        let mut slots = self.slots();
        let index = slots.iter().position(Slot::is_free).unwrap_or(slots.len());
        let vfd = i32::try_from(index)
            .ok()
            .and_then(|i| self.offset.checked_add(i))
            .ok_or(TableError::Exhausted)?;

        let slot = Slot {
            client: Some(Arc::downgrade(client)),
            remote_fd,
        };
        if index == slots.len() {
            slots.try_reserve(1).map_err(|_| TableError::Exhausted)?;
            slots.push(slot);
        } else {
            slots[index] = slot;
        }
        Ok(vfd)
    }

    /// Look up a virtual descriptor. Anything not currently registered,
    /// including kernel descriptors, is `None`.
    pub fn resolve(&self, vfd: c_int) -> Option<Resolved> {
        let index = self.index_of(vfd)?;
        let slots = self.slots();
        let slot = slots.get(index)?;
        if slot.is_free() {
            return None;
        }
        let client = slot.client.as_ref()?.upgrade()?;
        Some(Resolved {
            client,
            remote_fd: slot.remote_fd,
        })
    }

    /// Free the slot behind `vfd`, provided `client` owns it
    pub fn deregister(&self, client: &ClientHandle, vfd: c_int) -> Result<(), TableError> {
        let index = self.index_of(vfd).ok_or(TableError::OutOfRange(vfd))?;
        let mut slots = self.slots();
        let slot = slots.get_mut(index).ok_or(TableError::OutOfRange(vfd))?;
        if slot.is_free() || !slot.owned_by(client) {
            return Err(TableError::NotOwned(vfd));
        }
        slot.client = None;
        slot.remote_fd = FREE;
        Ok(())
    }

    /// Number of slots ever allocated
    pub fn capacity(&self) -> usize {
        self.slots().len()
    }

    /// Number of live virtual descriptors
    pub fn live(&self) -> usize {
        self.slots().iter().filter(|s| !s.is_free()).count()
    }
}
