//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::warn;

use crate::conn::ConnState;
use crate::msg::CdapOpcode;

#[derive(Debug)]
pub enum Error {
    /// A write or control transition was attempted on a connection in a
    /// state that doesn't permit it: writes are rejected until connected.
    NotConnected(CdapOpcode, ConnState),
    /// The codec failed to serialize or deserialize a message.
    CodecError(String),
    /// The local invoke-id space is exhausted.
    InvokeIdsExhausted,
}

impl Error {
    pub fn log(&self) {
        warn!("{}", self);
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotConnected(opcode, state) => {
                write!(f, "cannot send {opcode:?} while connection is {state:?}")
            }
            Error::CodecError(msg) => write!(f, "CDAP codec error: {msg}"),
            Error::InvokeIdsExhausted => write!(f, "CDAP invoke-id space exhausted"),
        }
    }
}

impl std::error::Error for Error {}
