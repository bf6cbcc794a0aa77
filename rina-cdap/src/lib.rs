//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! CDAP (Common Distributed Application Protocol) message types and the
//! per-N-1-flow connection state machine (component C2), plus the
//! invoke-id allocator (component C1). The wire codec itself is treated as
//! an external collaborator: [`CdapCodec`] is the seam,
//! [`codec::JsonCdapCodec`] is the bundled implementation used until a
//! real protobuf/CDAP codec is wired in.

pub mod codec;
pub mod conn;
pub mod error;
pub mod invoke;
pub mod msg;
pub mod object;

pub use codec::{CdapCodec, JsonCdapCodec};
pub use conn::{CdapConn, ConnState};
pub use error::Error;
pub use invoke::InvokeIdAllocator;
pub use msg::{CdapMessage, CdapOpcode};
