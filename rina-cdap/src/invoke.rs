//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! Per-session CDAP invoke-id allocation (component C1), grounded on
//! rlite's `uipcp-rib.cpp` `invoke_id_mgr`
//! (`get_invoke_id()`/`put_invoke_id()`).

use crate::error::Error;

/// Issues and recycles invoke-ids for one CDAP session. Retired ids are
/// reused (LIFO) before a fresh one is minted, so a long-lived connection's
/// id space doesn't grow without bound.
#[derive(Debug, Default)]
pub struct InvokeIdAllocator {
    next: i64,
    free: Vec<i64>,
}

impl InvokeIdAllocator {
    pub fn new() -> InvokeIdAllocator {
        InvokeIdAllocator {
            next: 1,
            free: Vec::new(),
        }
    }

    /// Allocates a new locally-initiated invoke-id.
    pub fn get_invoke_id(&mut self) -> Result<i64, Error> {
        if let Some(id) = self.free.pop() {
            return Ok(id);
        }
        if self.next == i64::MAX {
            return Err(Error::InvokeIdsExhausted);
        }
        let id = self.next;
        self.next += 1;
        Ok(id)
    }

    /// Returns an invoke-id to the free-list once its response has been
    /// matched (or the request aborted).
    pub fn put_invoke_id(&mut self, invoke_id: i64) {
        self.free.push(invoke_id);
    }

    pub fn in_use_count(&self) -> usize {
        (self.next as usize).saturating_sub(1) - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_recycled() {
        let mut alloc = InvokeIdAllocator::new();
        let a = alloc.get_invoke_id().unwrap();
        let b = alloc.get_invoke_id().unwrap();
        assert_ne!(a, b);
        alloc.put_invoke_id(a);
        let c = alloc.get_invoke_id().unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn in_use_count_tracks_outstanding() {
        let mut alloc = InvokeIdAllocator::new();
        let a = alloc.get_invoke_id().unwrap();
        let _b = alloc.get_invoke_id().unwrap();
        assert_eq!(alloc.in_use_count(), 2);
        alloc.put_invoke_id(a);
        assert_eq!(alloc.in_use_count(), 1);
    }
}
