//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! Distributed address allocation (component C9). On enrolling a peer
//! without an address, the enroller proposes a candidate and waits a
//! configurable window for a NACK before considering it committed.

use std::collections::BTreeMap;
use std::time::Duration;

use rina_utils::Addr;

/// Broadcasts allocator traffic on `/mgmt/addralloc/table`; implemented
/// by the RIB dispatcher.
pub trait AddrAllocTransport: Send {
    fn announce_claim(&self, addr: Addr, owner: &str);
    fn announce_nack(&self, addr: Addr);
}

pub const NACK_WAIT_SECS_DEFAULT: u64 = 2;
pub const NACK_WAIT_SECS_MIN: u64 = 1;
pub const NACK_WAIT_SECS_MAX: u64 = 10;

/// A claim still inside its NACK window.
#[derive(Debug)]
struct PendingClaim {
    addr: Addr,
    owner: String,
}

/// Address space owned by the RIB: `address -> owning node name`, plus any
/// claim currently awaiting its NACK window.
#[derive(Debug, Default)]
pub struct AddressAllocator {
    committed: BTreeMap<Addr, String>,
    pending: Option<PendingClaim>,
    nack_wait_secs: u64,
}

impl AddressAllocator {
    pub fn new() -> AddressAllocator {
        AddressAllocator {
            committed: BTreeMap::new(),
            pending: None,
            nack_wait_secs: NACK_WAIT_SECS_DEFAULT,
        }
    }

    pub fn set_nack_wait_secs(&mut self, secs: u64) {
        self.nack_wait_secs = secs.clamp(NACK_WAIT_SECS_MIN, NACK_WAIT_SECS_MAX);
    }

    pub fn nack_wait(&self) -> Duration {
        Duration::from_secs(self.nack_wait_secs)
    }

    /// Picks the lowest unused address strictly greater than 0; address 0
    /// is reserved as `RL_ADDR_NULL`.
    pub fn pick_candidate(&self) -> Addr {
        let mut candidate = 1u64;
        for &addr in self.committed.keys() {
            if addr.0 == candidate {
                candidate += 1;
            } else if addr.0 > candidate {
                break;
            }
        }
        Addr(candidate)
    }

    /// Proposes `addr` for `owner`, broadcasting the claim and opening the
    /// NACK window. The caller is responsible for arming a
    /// timer of [`Self::nack_wait`] that calls [`Self::commit_pending`] on
    /// expiry.
    pub fn propose(&mut self, addr: Addr, owner: String, transport: &dyn AddrAllocTransport) {
        transport.announce_claim(addr, &owner);
        self.pending = Some(PendingClaim { addr, owner });
    }

    /// Called when the NACK window expires without a rejection: the
    /// candidate becomes a committed address.
    pub fn commit_pending(&mut self) -> Option<Addr> {
        let claim = self.pending.take()?;
        self.committed.insert(claim.addr, claim.owner);
        Some(claim.addr)
    }

    /// A NACK arrived for the pending claim before the window closed —
    /// the proposal is withdrawn and the caller should pick a new
    /// candidate.
    pub fn reject_pending(&mut self) -> Option<Addr> {
        self.pending.take().map(|c| c.addr)
    }

    pub fn is_pending(&self, addr: Addr) -> bool {
        self.pending.as_ref().is_some_and(|c| c.addr == addr)
    }

    /// Handles a claim broadcast by someone else for an address we
    /// already committed: on collision, the smaller-numbered claimant
    /// yields. Returns `true` if we must NACK it (we keep the address).
    pub fn resolve_collision(&self, addr: Addr, claimant: &str, our_name: &str) -> bool {
        match self.committed.get(&addr) {
            Some(existing_owner) if existing_owner == claimant => false,
            Some(_) => our_name < claimant,
            None => false,
        }
    }

    pub fn owner_of(&self, addr: Addr) -> Option<&str> {
        self.committed.get(&addr).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    /// Periodic re-scan for duplicate address ownership claims, forcing
    /// renegotiation on the duplicate. Returns the addresses found in
    /// conflict within `reported`, a snapshot of claims currently seen on
    /// the wire from other nodes.
    pub fn check_for_address_conflicts(&self, reported: &BTreeMap<Addr, String>) -> Vec<Addr> {
        reported
            .iter()
            .filter(|(addr, owner)| {
                self.committed
                    .get(addr)
                    .is_some_and(|ours| *ours != **owner)
            })
            .map(|(addr, _)| *addr)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingTransport {
        claims: RefCell<Vec<(Addr, String)>>,
        nacks: RefCell<Vec<Addr>>,
    }

    impl AddrAllocTransport for RecordingTransport {
        fn announce_claim(&self, addr: Addr, owner: &str) {
            self.claims.borrow_mut().push((addr, owner.to_owned()));
        }

        fn announce_nack(&self, addr: Addr) {
            self.nacks.borrow_mut().push(addr);
        }
    }

    #[test]
    fn pick_candidate_fills_first_gap() {
        let mut alloc = AddressAllocator::new();
        alloc.committed.insert(Addr(1), "a".into());
        alloc.committed.insert(Addr(2), "b".into());
        assert_eq!(alloc.pick_candidate(), Addr(3));
        alloc.committed.remove(&Addr(1));
        assert_eq!(alloc.pick_candidate(), Addr(1));
    }

    #[test]
    fn uncontested_claim_commits_after_window() {
        let mut alloc = AddressAllocator::new();
        let transport = RecordingTransport::default();
        alloc.propose(Addr(5), "peer".into(), &transport);
        assert!(alloc.is_pending(Addr(5)));
        assert_eq!(alloc.commit_pending(), Some(Addr(5)));
        assert_eq!(alloc.owner_of(Addr(5)), Some("peer"));
    }

    #[test]
    fn nack_withdraws_pending_claim() {
        let mut alloc = AddressAllocator::new();
        let transport = RecordingTransport::default();
        alloc.propose(Addr(5), "peer".into(), &transport);
        assert_eq!(alloc.reject_pending(), Some(Addr(5)));
        assert!(alloc.commit_pending().is_none());
    }

    #[test]
    fn smaller_numbered_claimant_wins_collision() {
        let mut alloc = AddressAllocator::new();
        alloc.committed.insert(Addr(9), "node-b".into());
        // "node-a" < "node-b" lexicographically: we yield, no NACK.
        assert!(!alloc.resolve_collision(Addr(9), "node-a", "node-b"));
        // "node-z" > "node-b": we keep the address and NACK the claimant.
        assert!(alloc.resolve_collision(Addr(9), "node-z", "node-b"));
    }

    #[test]
    fn conflict_scan_flags_mismatched_owners() {
        let mut alloc = AddressAllocator::new();
        alloc.committed.insert(Addr(9), "node-b".into());
        let mut reported = BTreeMap::new();
        reported.insert(Addr(9), "node-c".into());
        assert_eq!(alloc.check_for_address_conflicts(&reported), vec![Addr(9)]);
    }
}
