//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

use rina_utils::Addr;
use tracing::{debug, info};

use crate::collections::NeighborId;
use crate::lfdb::LowerFlow;
use crate::neighbor::EnrollState;

/// Loggable lifecycle events: one enum of borrowed references so logging
/// never allocates on the hot path.
#[derive(Debug)]
pub enum Debug<'a> {
    // Neighbors
    NeighborCreate(&'a NeighborId),
    NeighborDelete(&'a NeighborId),
    // Enrollment: state transitions are logged at INFO.
    EnrollmentStateChange(&'a NeighborId, EnrollState, EnrollState),
    EnrollmentAbort(&'a NeighborId, EnrollState),
    EnrollmentTimeout(&'a NeighborId, EnrollState),
    // LFDB
    LowerFlowAdd(&'a LowerFlow),
    LowerFlowUpdate(&'a LowerFlow),
    LowerFlowDelete(Addr, Addr),
    LowerFlowAged(&'a LowerFlow),
    // SPF
    SpfRun(usize),
    PduftPush(usize),
}

impl Debug<'_> {
    pub fn log(&self) {
        match self {
            Debug::NeighborCreate(id) => debug!(?id, "neighbor created"),
            Debug::NeighborDelete(id) => debug!(?id, "neighbor deleted"),
            Debug::EnrollmentStateChange(id, from, to) => {
                info!(?id, ?from, ?to, "enrollment state change")
            }
            Debug::EnrollmentAbort(id, state) => {
                info!(?id, ?state, "enrollment aborted")
            }
            Debug::EnrollmentTimeout(id, state) => {
                info!(?id, ?state, "enrollment timed out")
            }
            Debug::LowerFlowAdd(lf) => debug!(?lf, "lower flow added"),
            Debug::LowerFlowUpdate(lf) => debug!(?lf, "lower flow updated"),
            Debug::LowerFlowDelete(local, remote) => {
                debug!(%local, %remote, "lower flow deleted")
            }
            Debug::LowerFlowAged(lf) => debug!(?lf, "lower flow aged out"),
            Debug::SpfRun(reachable) => debug!(%reachable, "shortest-path engine ran"),
            Debug::PduftPush(entries) => debug!(%entries, "forwarding table pushed"),
        }
    }
}
