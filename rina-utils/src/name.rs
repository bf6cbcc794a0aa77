//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

use std::fmt;

use serde::{Deserialize, Serialize};

/// An IPCP name: the 4-tuple (process-name, process-instance, entity-name,
/// entity-instance) that identifies a RINA application or IPCP instance
/// within a DIF.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct IpcpName {
    pub process_name: String,
    pub process_instance: String,
    pub entity_name: String,
    pub entity_instance: String,
}

impl IpcpName {
    pub fn new(
        process_name: impl Into<String>,
        process_instance: impl Into<String>,
        entity_name: impl Into<String>,
        entity_instance: impl Into<String>,
    ) -> IpcpName {
        IpcpName {
            process_name: process_name.into(),
            process_instance: process_instance.into(),
            entity_name: entity_name.into(),
            entity_instance: entity_instance.into(),
        }
    }
}

// Canonical string form: "proc-name:proc-instance:entity-name:entity-instance".
impl fmt::Display for IpcpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.process_name,
            self.process_instance,
            self.entity_name,
            self.entity_instance
        )
    }
}
