//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn};

use crate::collections::NeighborId;
use crate::neighbor::EnrollState;

/// RIB errors, grouped by kind: transient I/O, protocol violations, and
/// configuration mistakes. Each kind maps to a severity in [`Error::log`]
/// and a recovery action at the caller.
#[derive(Debug)]
pub enum Error {
    // transient-IO
    IoError(std::io::Error),
    // protocol-violation
    UnexpectedOpcode(NeighborId, EnrollState),
    MissingNestedObject(NeighborId, &'static str),
    Codec(rina_cdap::Error),
    // config
    UnknownPolicy(String),
    ParamOutOfRange(String),
    // resource
    PortIdsExhausted,
    AddressesExhausted,
    FrameTooLarge(usize),
    // peer-failure
    EnrollmentTimedOut(NeighborId),
    KeepaliveMissed(NeighborId),
    // lookups
    NeighborNotFound(NeighborId),
    NeighFlowNotFound(u32),
    // fatal
    MgmtFdOpenFailed(std::io::Error),
}

impl Error {
    pub fn log(&self) {
        match self {
            Error::IoError(e) => warn!(%e, "transient I/O error"),
            Error::UnexpectedOpcode(id, state) => {
                warn!(?id, ?state, "unexpected CDAP opcode for enrollment state")
            }
            Error::MissingNestedObject(id, what) => {
                warn!(?id, %what, "missing nested RIB object")
            }
            Error::Codec(e) => warn!(%e, "CDAP codec error"),
            Error::UnknownPolicy(name) => warn!(%name, "unknown policy"),
            Error::ParamOutOfRange(name) => warn!(%name, "parameter out of range"),
            Error::PortIdsExhausted => error!("port-id space exhausted"),
            Error::AddressesExhausted => error!("address space exhausted"),
            Error::FrameTooLarge(len) => warn!(%len, "management frame too large"),
            Error::EnrollmentTimedOut(id) => warn!(?id, "enrollment timed out"),
            Error::KeepaliveMissed(id) => warn!(?id, "keepalive threshold exceeded"),
            Error::NeighborNotFound(id) => warn!(?id, "neighbor not found"),
            Error::NeighFlowNotFound(port) => warn!(%port, "NeighFlow not found"),
            Error::MgmtFdOpenFailed(e) => error!(%e, "failed to open management fd"),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {e}"),
            Error::UnexpectedOpcode(id, state) => {
                write!(f, "unexpected opcode for {id:?} in state {state:?}")
            }
            Error::MissingNestedObject(id, what) => {
                write!(f, "{id:?}: missing nested object '{what}'")
            }
            Error::Codec(e) => write!(f, "codec error: {e}"),
            Error::UnknownPolicy(name) => write!(f, "unknown policy '{name}'"),
            Error::ParamOutOfRange(name) => write!(f, "parameter '{name}' out of range"),
            Error::PortIdsExhausted => write!(f, "port-id space exhausted"),
            Error::AddressesExhausted => write!(f, "address space exhausted"),
            Error::FrameTooLarge(len) => write!(f, "frame of {len} bytes exceeds EFBIG limit"),
            Error::EnrollmentTimedOut(id) => write!(f, "enrollment timed out for {id:?}"),
            Error::KeepaliveMissed(id) => write!(f, "keepalive missed for {id:?}"),
            Error::NeighborNotFound(id) => write!(f, "neighbor {id:?} not found"),
            Error::NeighFlowNotFound(port) => write!(f, "NeighFlow on port {port} not found"),
            Error::MgmtFdOpenFailed(e) => write!(f, "cannot open management fd: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<rina_cdap::Error> for Error {
    fn from(e: rina_cdap::Error) -> Error {
        Error::Codec(e)
    }
}
