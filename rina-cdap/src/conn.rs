//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::codec::CdapCodec;
use crate::error::Error;
use crate::msg::{CdapMessage, CdapOpcode};

/// Connection state of one [`CdapConn`]. A single `CdapConn` is never used
/// by more than one thread concurrently; it belongs to exactly one
/// NeighFlow.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
    Releasing,
}

/// Per-N-1-flow CDAP connection state machine (component C2). Advances on
/// M_CONNECT/M_CONNECT_R/M_RELEASE/M_RELEASE_R; rejects every other write
/// until `Connected`.
pub struct CdapConn<C: CdapCodec> {
    codec: C,
    state: ConnState,
}

impl<C: CdapCodec> CdapConn<C> {
    pub fn new(codec: C) -> CdapConn<C> {
        CdapConn {
            codec,
            state: ConnState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Serializes `msg`, validating and advancing connection state first.
    pub fn msg_ser(&mut self, msg: &CdapMessage) -> Result<Vec<u8>, Error> {
        self.transition(msg.opcode)?;
        self.codec.encode(msg)
    }

    /// Deserializes `bytes` into a message, then validates and advances
    /// connection state the same way `msg_ser` does.
    pub fn msg_deser(&mut self, bytes: &[u8]) -> Result<CdapMessage, Error> {
        let msg = self.codec.decode(bytes)?;
        self.transition(msg.opcode)?;
        Ok(msg)
    }

    /// Returns the connection to `Disconnected` without sending anything.
    pub fn reset(&mut self) {
        self.state = ConnState::Disconnected;
    }

    fn transition(&mut self, opcode: CdapOpcode) -> Result<(), Error> {
        use ConnState::*;
        let next = match (self.state, opcode) {
            (Disconnected, CdapOpcode::MConnect) => Connecting,
            (Connecting, CdapOpcode::MConnectR) => Connected,
            (Connected, CdapOpcode::MRelease) => Releasing,
            (Releasing, CdapOpcode::MReleaseR) => Disconnected,
            // Control opcodes out of sequence, or any application opcode
            // sent/received while not yet Connected.
            (Connected, _) => Connected,
            _ => return Err(Error::NotConnected(opcode, self.state)),
        };
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rina_utils::name::IpcpName;

    use super::*;
    use crate::codec::JsonCdapCodec;

    fn msg(opcode: CdapOpcode) -> CdapMessage {
        CdapMessage::new(
            opcode,
            IpcpName::new("a", "1", "", ""),
            IpcpName::new("b", "1", "", ""),
        )
    }

    #[test]
    fn handshake_advances_state() {
        let mut conn = CdapConn::new(JsonCdapCodec);
        assert_eq!(conn.state(), ConnState::Disconnected);
        conn.msg_ser(&msg(CdapOpcode::MConnect)).unwrap();
        assert_eq!(conn.state(), ConnState::Connecting);
        conn.msg_deser(&JsonCdapCodec.encode(&msg(CdapOpcode::MConnectR)).unwrap())
            .unwrap();
        assert_eq!(conn.state(), ConnState::Connected);
        conn.msg_ser(&msg(CdapOpcode::MCreate)).unwrap();
        assert_eq!(conn.state(), ConnState::Connected);
    }

    #[test]
    fn writes_rejected_until_connected() {
        let mut conn = CdapConn::new(JsonCdapCodec);
        assert!(conn.msg_ser(&msg(CdapOpcode::MCreate)).is_err());
    }

    #[test]
    fn reset_returns_to_disconnected_silently() {
        let mut conn = CdapConn::new(JsonCdapCodec);
        conn.msg_ser(&msg(CdapOpcode::MConnect)).unwrap();
        conn.reset();
        assert_eq!(conn.state(), ConnState::Disconnected);
    }
}
