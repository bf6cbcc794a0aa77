//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! Wire shapes for the nested RIB objects a CDAP message carries opaquely
//! in `obj_value`: JSON over the same byte string `JsonCdapCodec` uses for
//! the outer message, the way the LFDB/DFT/neighbor-gossip/enrollment
//! objects are modeled as nested structures in rlite's `uipcp-rib.cpp`.

use rina_utils::Addr;
use serde::{Deserialize, Serialize};

use crate::dft::DftEntry;
use crate::error::Error;
use crate::lfdb::LowerFlow;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LowerFlowWire {
    pub local_addr: u64,
    pub remote_addr: u64,
    pub local_node: String,
    pub remote_node: String,
    pub cost: u32,
    pub seqnum: u64,
    pub state: bool,
}

impl From<&LowerFlow> for LowerFlowWire {
    fn from(lf: &LowerFlow) -> LowerFlowWire {
        LowerFlowWire {
            local_addr: lf.local_addr.0,
            remote_addr: lf.remote_addr.0,
            local_node: lf.local_node.clone(),
            remote_node: lf.remote_node.clone(),
            cost: lf.cost,
            seqnum: lf.seqnum,
            state: lf.state,
        }
    }
}

impl LowerFlowWire {
    pub fn into_lower_flow(self) -> LowerFlow {
        LowerFlow {
            local_addr: Addr(self.local_addr),
            remote_addr: Addr(self.remote_addr),
            local_node: self.local_node,
            remote_node: self.remote_node,
            cost: self.cost,
            seqnum: self.seqnum,
            state: self.state,
            age: 0,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct LowerFlowList(pub Vec<LowerFlowWire>);

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DftEntryWire {
    pub appl_name: String,
    pub address: u64,
}

impl From<&DftEntry> for DftEntryWire {
    fn from(entry: &DftEntry) -> DftEntryWire {
        DftEntryWire {
            appl_name: entry.appl_name.clone(),
            address: entry.address.0,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DftEntryList(pub Vec<DftEntryWire>);

/// A candidate neighbor gossiped during enrollment or periodic neighbor
/// sync: just enough to resolve identity and address, source: `NeighborCandidate`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NeighborCandidateWire {
    pub process_name: String,
    pub process_instance: String,
    pub address: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NeighborCandidateList(pub Vec<NeighborCandidateWire>);

/// The nested object carried by `M_CONNECT`/`M_START`/`M_STOP` during
/// enrollment: the proposed address and whether the enroller already
/// started data transfer early (source: `EnrollmentInfo`).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EnrollmentInfo {
    pub address: Option<u64>,
    pub start_early: bool,
}

pub fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("RIB payload types always serialize")
}

pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(bytes).map_err(|_| Error::MissingNestedObject(0, "malformed nested object"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_flow_wire_round_trips() {
        let lf = LowerFlow {
            local_addr: Addr(1),
            remote_addr: Addr(2),
            local_node: "a".into(),
            remote_node: "b".into(),
            cost: 3,
            seqnum: 4,
            state: true,
            age: 7,
        };
        let wire = LowerFlowWire::from(&lf);
        let back = wire.into_lower_flow();
        assert_eq!(back.local_addr, lf.local_addr);
        assert_eq!(back.remote_addr, lf.remote_addr);
        assert_eq!(back.age, 0, "age is a local aging counter, never carried on the wire");
    }

    #[test]
    fn enrollment_info_decodes_through_json() {
        let info = EnrollmentInfo { address: Some(9), start_early: true };
        let bytes = encode(&info);
        let back: EnrollmentInfo = decode(&bytes).unwrap();
        assert_eq!(back.address, Some(9));
        assert!(back.start_early);
    }
}
