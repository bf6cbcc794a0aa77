//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The shortest-path engine (component C7), grounded on rlite's
//! `SPEngine::run` and `pduft_sync` in `uipcp-normal-lower-flows.cpp`:
//! classic Dijkstra over the Lower Flow Database, restricted to edges
//! with a verified, equal-cost reverse edge, pushed into the forwarding
//! table by resolving each next hop's address back to a neighbor's
//! management port-id.

use std::collections::{BTreeMap, HashMap};

use rina_utils::Addr;

use crate::collections::Neighbors;
use crate::debug::Debug;
use crate::lfdb::Lfdb;
use crate::southbound::ForwardingTable;

#[derive(Clone, Copy, Debug, Default)]
struct NodeInfo {
    dist: u32,
    visited: bool,
}

/// Runs Dijkstra from `local_addr` over the symmetric subset of `lfdb`,
/// returning `destination -> next_hop` for every reachable node.
///
/// Mirrors the source's graph construction: an edge `(a, b)` only
/// participates if `lfdb_find(b, a)` also exists and carries the same
/// cost, so a stale or unidirectional advertisement can never produce a
/// route.
pub fn run(local_addr: Addr, lfdb: &Lfdb) -> HashMap<Addr, Addr> {
    let mut graph: BTreeMap<Addr, Vec<(Addr, u32)>> = BTreeMap::new();
    for lf in lfdb.iter() {
        if !lf.state {
            continue;
        }
        if !lfdb.is_symmetric(lf.local_addr, lf.remote_addr) {
            continue;
        }
        graph
            .entry(lf.local_addr)
            .or_default()
            .push((lf.remote_addr, lf.cost));
    }

    let mut info: HashMap<Addr, NodeInfo> = HashMap::new();
    info.insert(local_addr, NodeInfo { dist: 0, visited: false });
    let mut next_hops: HashMap<Addr, Addr> = HashMap::new();

    loop {
        // Select the closest unvisited node (plain O(n^2) scan, as in the
        // source: DIFs stay small enough that a heap buys nothing).
        let candidate = info
            .iter()
            .filter(|(_, i)| !i.visited)
            .min_by_key(|(_, i)| i.dist)
            .map(|(addr, i)| (*addr, i.dist));
        let Some((addr, dist)) = candidate else {
            break;
        };
        info.get_mut(&addr).unwrap().visited = true;

        for (neigh_addr, cost) in graph.get(&addr).cloned().unwrap_or_default() {
            let new_dist = dist + cost;
            let better = match info.get(&neigh_addr) {
                Some(i) => !i.visited && new_dist < i.dist,
                None => true,
            };
            if better {
                info.insert(
                    neigh_addr,
                    NodeInfo {
                        dist: new_dist,
                        visited: false,
                    },
                );
                let next_hop = if addr == local_addr { neigh_addr } else { next_hops[&addr] };
                next_hops.insert(neigh_addr, next_hop);
            }
        }
    }

    Debug::SpfRun(next_hops.len()).log();
    next_hops
}

/// Pushes a freshly computed `next_hops` map into the kernel forwarding
/// table, resolving each next-hop address to the neighbor's management
/// port-id (source: `pduft_sync`). The table is flushed first so the
/// kernel never observes a partial view.
pub fn pduft_sync(next_hops: &HashMap<Addr, Addr>, neighbors: &Neighbors, table: &dyn ForwardingTable) {
    table.flush();
    let mut pushed = 0;
    for (&dest, &next_hop) in next_hops {
        let Some(neigh) = neighbors.find_by_address(next_hop) else {
            continue;
        };
        let Some(port_id) = neigh.mgmt_port_id else {
            continue;
        };
        table.set(dest, port_id);
        pushed += 1;
    }
    Debug::PduftPush(pushed).log();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lfdb::LowerFlow;

    fn edge(local: u64, remote: u64, cost: u32) -> LowerFlow {
        LowerFlow {
            local_addr: Addr(local),
            remote_addr: Addr(remote),
            local_node: String::new(),
            remote_node: String::new(),
            cost,
            seqnum: 1,
            state: true,
            age: 0,
        }
    }

    #[test]
    fn three_node_linear_topology() {
        let mut lfdb = Lfdb::new(Addr(1));
        lfdb.add(edge(1, 2, 1));
        lfdb.add(edge(2, 1, 1));
        lfdb.add(edge(2, 3, 1));
        lfdb.add(edge(3, 2, 1));

        let next_hops = run(Addr(1), &lfdb);
        assert_eq!(next_hops[&Addr(2)], Addr(2));
        assert_eq!(next_hops[&Addr(3)], Addr(2));
    }

    #[test]
    fn link_removal_prunes_route() {
        let mut lfdb = Lfdb::new(Addr(1));
        lfdb.add(edge(1, 2, 1));
        lfdb.add(edge(2, 1, 1));
        lfdb.add(edge(2, 3, 1));
        lfdb.add(edge(3, 2, 1));
        assert_eq!(run(Addr(1), &lfdb).len(), 2);

        lfdb.del(Addr(2), Addr(3));
        lfdb.del(Addr(3), Addr(2));
        let next_hops = run(Addr(1), &lfdb);
        assert_eq!(next_hops.len(), 1);
        assert!(!next_hops.contains_key(&Addr(3)));
    }

    #[test]
    fn asymmetric_edge_yields_no_route() {
        let mut lfdb = Lfdb::new(Addr(1));
        lfdb.add(edge(1, 2, 1));
        // No reverse edge installed.
        let next_hops = run(Addr(1), &lfdb);
        assert!(next_hops.is_empty());
    }
}
