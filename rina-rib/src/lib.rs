//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

#![cfg_attr(
    feature = "testing",
    allow(dead_code, unused_variables, unused_imports)
)]

pub mod addralloc;
pub mod collections;
pub mod debug;
pub mod dft;
pub mod enrollment;
pub mod error;
pub mod flowalloc;
pub mod lfdb;
pub mod neighbor;
pub mod payload;
pub mod rib;
pub mod southbound;
pub mod spf;
pub mod tasks;

pub use error::Error;
pub use neighbor::{EnrollState, Neighbor, NeighFlow};
pub use rib::{Rib, RibInner};
