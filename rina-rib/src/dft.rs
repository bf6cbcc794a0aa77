//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The Directory Forwarding Table (component C8): an application-name to
//! address map, distributed on change and replicated in full by default.

use std::collections::BTreeMap;
use std::time::Instant;

use rina_utils::Addr;

/// One DFT entry: an application name, its resolved address, and the time
/// of last update.
#[derive(Clone, Debug)]
pub struct DftEntry {
    pub appl_name: String,
    pub address: Addr,
    pub timestamp: Instant,
}

/// Distributes local DFT changes to neighbors; implemented by the RIB
/// dispatcher, which knows how to reach `/mgmt/dft/table` on every peer.
pub trait DftReplicator: Send {
    fn announce_set(&self, entry: &DftEntry);
    fn announce_unset(&self, appl_name: &str);
}

#[derive(Debug, Default)]
pub struct Dft {
    table: BTreeMap<String, DftEntry>,
}

impl Dft {
    pub fn new() -> Dft {
        Dft::default()
    }

    /// Registers `appl_name` at `address`, distributing the change to
    /// neighbors via `M_CREATE` on `/mgmt/dft/table`.
    pub fn set(&mut self, appl_name: String, address: Addr, replicator: &dyn DftReplicator) {
        let entry = DftEntry {
            appl_name: appl_name.clone(),
            address,
            timestamp: Instant::now(),
        };
        replicator.announce_set(&entry);
        self.table.insert(appl_name, entry);
    }

    /// Applies a remotely-received entry without re-announcing it (the
    /// sender already broadcast it; we are just one of the replicas).
    pub fn apply_remote(&mut self, entry: DftEntry) {
        self.table.insert(entry.appl_name.clone(), entry);
    }

    pub fn unset(&mut self, appl_name: &str, replicator: &dyn DftReplicator) {
        if self.table.remove(appl_name).is_some() {
            replicator.announce_unset(appl_name);
        }
    }

    pub fn apply_remote_unset(&mut self, appl_name: &str) {
        self.table.remove(appl_name);
    }

    /// Returns [`rina_utils::addr::RL_ADDR_NULL`] on miss.
    pub fn resolve(&self, appl_name: &str) -> Addr {
        self.table
            .get(appl_name)
            .map(|e| e.address)
            .unwrap_or(rina_utils::addr::RL_ADDR_NULL)
    }

    pub fn entries(&self) -> impl Iterator<Item = &DftEntry> {
        self.table.values()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingReplicator {
        sets: RefCell<Vec<String>>,
        unsets: RefCell<Vec<String>>,
    }

    impl DftReplicator for RecordingReplicator {
        fn announce_set(&self, entry: &DftEntry) {
            self.sets.borrow_mut().push(entry.appl_name.clone());
        }

        fn announce_unset(&self, appl_name: &str) {
            self.unsets.borrow_mut().push(appl_name.to_owned());
        }
    }

    #[test]
    fn resolve_miss_returns_null_addr() {
        let dft = Dft::new();
        assert!(dft.resolve("nope").is_null());
    }

    #[test]
    fn set_registers_and_replicates() {
        let mut dft = Dft::new();
        let rep = RecordingReplicator::default();
        dft.set("app.server".into(), Addr(7), &rep);
        assert_eq!(dft.resolve("app.server"), Addr(7));
        assert_eq!(rep.sets.borrow().as_slice(), ["app.server"]);
    }

    #[test]
    fn unset_removes_and_replicates_only_if_present() {
        let mut dft = Dft::new();
        let rep = RecordingReplicator::default();
        dft.unset("nothing", &rep);
        assert!(rep.unsets.borrow().is_empty());

        dft.set("app.server".into(), Addr(7), &rep);
        dft.unset("app.server", &rep);
        assert!(dft.resolve("app.server").is_null());
        assert_eq!(rep.unsets.borrow().as_slice(), ["app.server"]);
    }
}
