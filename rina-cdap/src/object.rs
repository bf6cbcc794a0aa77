//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The CDAP object namespace. These names and classes traverse the wire
//! bit-exact; keep them as plain `&str` constants the way the RIB
//! dispatcher's handler table (component C11) expects to key on them.

pub const OBJ_NAME_A_DATA: &str = "/a_data";
pub const OBJ_CLASS_A_DATA: &str = "a_data";

pub const OBJ_NAME_DFT: &str = "/mgmt/dft/table";
pub const OBJ_CLASS_DFT: &str = "dft_entries";

pub const OBJ_NAME_LFDB: &str = "/mgmt/routing/lfdb";
pub const OBJ_CLASS_LFDB: &str = "lfdb_entries";

pub const OBJ_NAME_NEIGHBORS: &str = "/mgmt/neighbors/entries";
pub const OBJ_CLASS_NEIGHBORS: &str = "neigh_entries";

pub const OBJ_NAME_FLOWALLOC: &str = "/mgmt/flowalloc/flows";
pub const OBJ_CLASS_FLOWALLOC: &str = "flow";

pub const OBJ_NAME_ADDRALLOC: &str = "/mgmt/addralloc/table";
pub const OBJ_CLASS_ADDRALLOC: &str = "aa_entries";

pub const OBJ_NAME_ENROLLMENT: &str = "/mgmt/enrollment";
pub const OBJ_CLASS_ENROLLMENT: &str = "enrollment";

pub const OBJ_NAME_OPERATIONAL_STATUS: &str = "/mgmt/operational_status";
pub const OBJ_NAME_KEEPALIVE: &str = "/mgmt/keepalive";
pub const OBJ_NAME_LOWERFLOW: &str = "/mgmt/lowerflow";

/// Strips the last `/`-segment off an object name, the single-level
/// hierarchical fallback the dispatcher uses on an exact-match miss.
pub fn container_name(obj_name: &str) -> Option<&str> {
    let idx = obj_name.rfind('/')?;
    if idx == 0 { None } else { Some(&obj_name[..idx]) }
}
