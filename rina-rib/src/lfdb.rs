//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The Lower Flow Database (component C6), grounded on rlite's
//! `uipcp-normal-lower-flows.cpp`: a link-state database of directed
//! edges between adjacent IPCP addresses, synchronized by CDAP and aged
//! out when advertisements stop arriving.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rina_utils::Addr;

use crate::debug::Debug;

/// One directed edge in the lower-flow topology.
#[derive(Clone, Debug, PartialEq)]
pub struct LowerFlow {
    pub local_addr: Addr,
    pub remote_addr: Addr,
    pub local_node: String,
    pub remote_node: String,
    pub cost: u32,
    pub seqnum: u64,
    pub state: bool,
    pub age: u32,
}

impl LowerFlow {
    fn reverse_key(&self) -> (Addr, Addr) {
        (self.remote_addr, self.local_addr)
    }
}

/// How long, in age-increment ticks, an advertisement survives without
/// being refreshed (`RL_AGE_MAX` in the source).
pub const AGE_MAX: u32 = 10;
/// How often the age-increment task fires (`RL_AGE_INCR_INTERVAL`).
pub const AGE_INCR_INTERVAL: Duration = Duration::from_secs(1);

/// The Lower Flow Database: `(local_addr, remote_addr) -> LowerFlow`.
#[derive(Debug, Default)]
pub struct Lfdb {
    local_addr: Addr,
    db: BTreeMap<(Addr, Addr), LowerFlow>,
    last_run: Option<Instant>,
}

impl Lfdb {
    pub fn new(local_addr: Addr) -> Lfdb {
        Lfdb {
            local_addr,
            db: BTreeMap::new(),
            last_run: None,
        }
    }

    /// Inserts or refreshes an edge. Returns `true` if the database
    /// actually changed, mirroring the source's
    /// `if (lfz == it->second[...] || lfz.seqnum <= existing.seqnum) return
    /// false;` short-circuit: an edge older than or identical to what we
    /// already hold is dropped silently.
    pub fn add(&mut self, lf: LowerFlow) -> bool {
        let key = (lf.local_addr, lf.remote_addr);
        if let Some(existing) = self.db.get(&key) {
            if *existing == lf || lf.seqnum <= existing.seqnum {
                return false;
            }
        }
        Debug::LowerFlowAdd(&lf).log();
        self.db.insert(key, lf);
        true
    }

    pub fn del(&mut self, local: Addr, remote: Addr) -> bool {
        let removed = self.db.remove(&(local, remote)).is_some();
        if removed {
            Debug::LowerFlowDelete(local, remote).log();
        }
        removed
    }

    /// Refreshes the local node's own outgoing edges after a lower-flow
    /// topology change, bumping the sequence number so neighbors accept
    /// the update (source: `lfdb_update_local`).
    pub fn update_local(&mut self, remote_addr: Addr, remote_node: String, cost: u32, up: bool) -> bool {
        let key = (self.local_addr, remote_addr);
        let seqnum = self.db.get(&key).map(|lf| lf.seqnum + 1).unwrap_or(1);
        let lf = LowerFlow {
            local_addr: self.local_addr,
            remote_addr,
            local_node: String::new(),
            remote_node,
            cost,
            seqnum,
            state: up,
            age: 0,
        };
        let changed = self.add(lf.clone());
        if changed {
            Debug::LowerFlowUpdate(&lf).log();
        }
        changed
    }

    /// Applies a batch of remotely-advertised edges, returning the subset
    /// that actually changed the database (these are the ones the caller
    /// must re-flood to other neighbors, excluding whoever sent them —
    /// source: `prop_lfl` plus `remote_sync_obj_excluding`).
    pub fn handle_update(&mut self, entries: Vec<LowerFlow>) -> Vec<LowerFlow> {
        entries.into_iter().filter(|lf| self.add(lf.clone())).collect()
    }

    /// Returns `true` if both `(a, b)` and `(b, a)` are present with
    /// matching cost — the symmetric-edge requirement the shortest-path
    /// engine enforces before trusting an edge (source: `lfdb_find`).
    pub fn is_symmetric(&self, a: Addr, b: Addr) -> bool {
        match (self.db.get(&(a, b)), self.db.get(&(b, a))) {
            (Some(fwd), Some(rev)) => fwd.state && rev.state && fwd.cost == rev.cost,
            _ => false,
        }
    }

    pub fn get(&self, local: Addr, remote: Addr) -> Option<&LowerFlow> {
        self.db.get(&(local, remote))
    }

    pub fn iter(&self) -> impl Iterator<Item = &LowerFlow> {
        self.db.values()
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Ages every entry except the local node's own advertisements,
    /// discarding any that exceed [`AGE_MAX`]. Returns `true` if anything
    /// was discarded, signalling the caller should rerun the shortest-path
    /// engine (source: `age_incr_cb`).
    pub fn age_tick(&mut self) -> bool {
        self.last_run = Some(Instant::now());
        let mut discarded = false;
        let stale: Vec<(Addr, Addr)> = self
            .db
            .iter_mut()
            .filter(|((local, _), _)| *local != self.local_addr)
            .filter_map(|(key, lf)| {
                lf.age += 1;
                if lf.age > AGE_MAX {
                    Some(*key)
                } else {
                    None
                }
            })
            .collect();
        for key in stale {
            if let Some(lf) = self.db.remove(&key) {
                Debug::LowerFlowAged(&lf).log();
                discarded = true;
            }
        }
        discarded
    }

    /// All edges keyed by their reverse for a symmetry scan, used by tests
    /// covering the asymmetric-exclusion invariant.
    pub fn reverse_edges(&self) -> Vec<(Addr, Addr)> {
        self.db.values().map(|lf| lf.reverse_key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lf(local: u64, remote: u64, seqnum: u64, cost: u32) -> LowerFlow {
        LowerFlow {
            local_addr: Addr(local),
            remote_addr: Addr(remote),
            local_node: String::new(),
            remote_node: String::new(),
            cost,
            seqnum,
            state: true,
            age: 0,
        }
    }

    #[test]
    fn stale_advertisement_is_rejected() {
        let mut db = Lfdb::new(Addr(1));
        assert!(db.add(lf(1, 2, 5, 10)));
        assert!(!db.add(lf(1, 2, 5, 10)));
        assert!(!db.add(lf(1, 2, 4, 999)));
        assert_eq!(db.get(Addr(1), Addr(2)).unwrap().cost, 10);
    }

    #[test]
    fn newer_seqnum_overwrites() {
        let mut db = Lfdb::new(Addr(1));
        db.add(lf(1, 2, 5, 10));
        assert!(db.add(lf(1, 2, 6, 20)));
        assert_eq!(db.get(Addr(1), Addr(2)).unwrap().cost, 20);
    }

    #[test]
    fn asymmetric_edge_is_excluded() {
        let mut db = Lfdb::new(Addr(1));
        db.add(lf(1, 2, 1, 10));
        assert!(!db.is_symmetric(Addr(1), Addr(2)));
        db.add(lf(2, 1, 1, 10));
        assert!(db.is_symmetric(Addr(1), Addr(2)));
    }

    #[test]
    fn aging_discards_only_remote_entries_past_max() {
        let mut db = Lfdb::new(Addr(1));
        db.add(lf(1, 2, 1, 10));
        db.add(lf(2, 1, 1, 10));
        for _ in 0..AGE_MAX {
            assert!(!db.age_tick());
        }
        assert!(db.age_tick());
        assert!(db.get(Addr(2), Addr(1)).is_none());
        assert!(db.get(Addr(1), Addr(2)).is_some(), "local origin never ages");
    }

    #[test]
    fn handle_update_returns_only_changed_entries() {
        let mut db = Lfdb::new(Addr(1));
        db.add(lf(1, 2, 1, 10));
        let changed = db.handle_update(vec![lf(1, 2, 1, 10), lf(3, 4, 1, 5)]);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].remote_addr, Addr(4));
    }
}
