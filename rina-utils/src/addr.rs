//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

use std::fmt;

use serde::{Deserialize, Serialize};

/// A RINA address within a DIF. Zero means null/unassigned (`RL_ADDR_NULL`).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct Addr(pub u64);

/// The null address, returned by lookups that miss.
pub const RL_ADDR_NULL: Addr = Addr(0);

impl Addr {
    pub fn is_null(&self) -> bool {
        *self == RL_ADDR_NULL
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Addr {
    fn from(value: u64) -> Addr {
        Addr(value)
    }
}
