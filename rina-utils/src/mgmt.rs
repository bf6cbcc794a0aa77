//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The management-frame header that precedes every CDAP byte stream on the
//! management file descriptor. The header is fixed and hand-rolled rather
//! than derived: this is a bit-exact wire shape, not a serde model.

use std::fmt;

pub const HEADER_LEN: usize = 18;
pub const MAX_FRAME_LEN: usize = 8192;

/// Frame type, carried in [`Header::frame_type`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameType {
    /// PDU arriving from the kernel, addressed by local port id.
    In,
    /// Outgoing PDU addressed by local port id.
    OutLocalPort,
    /// Outgoing PDU addressed by destination address (A-DATA).
    OutDstAddr,
}

impl FrameType {
    fn to_u8(self) -> u8 {
        match self {
            FrameType::In => 1,
            FrameType::OutLocalPort => 2,
            FrameType::OutDstAddr => 3,
        }
    }

    fn from_u8(value: u8) -> Option<FrameType> {
        match value {
            1 => Some(FrameType::In),
            2 => Some(FrameType::OutLocalPort),
            3 => Some(FrameType::OutDstAddr),
            _ => None,
        }
    }
}

/// Management frame header: `(type, reserved, local_port, remote_addr, flags)`.
///
/// Which of `local_port`/`remote_addr` is meaningful depends on `frame_type`:
/// `In`/`OutLocalPort` key off `local_port`, `OutDstAddr` keys off
/// `remote_addr`. The unused field is always zeroed on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub frame_type: FrameType,
    pub local_port: u32,
    pub remote_addr: u64,
    pub flags: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeaderError {
    Truncated,
    UnknownFrameType(u8),
    FrameTooLarge(usize),
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderError::Truncated => {
                write!(f, "management frame shorter than the header")
            }
            HeaderError::UnknownFrameType(ty) => {
                write!(f, "unknown management frame type {ty}")
            }
            HeaderError::FrameTooLarge(len) => {
                write!(f, "management frame of {len} bytes exceeds EFBIG limit")
            }
        }
    }
}

impl Header {
    pub fn new(frame_type: FrameType) -> Header {
        Header {
            frame_type,
            local_port: 0,
            remote_addr: 0,
            flags: 0,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = self.frame_type.to_u8();
        buf[1] = 0;
        buf[2..6].copy_from_slice(&self.local_port.to_be_bytes());
        buf[6..14].copy_from_slice(&self.remote_addr.to_be_bytes());
        buf[14..18].copy_from_slice(&self.flags.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Header, HeaderError> {
        if buf.len() < HEADER_LEN {
            return Err(HeaderError::Truncated);
        }
        let frame_type = FrameType::from_u8(buf[0])
            .ok_or(HeaderError::UnknownFrameType(buf[0]))?;
        let local_port = u32::from_be_bytes(buf[2..6].try_into().unwrap());
        let remote_addr = u64::from_be_bytes(buf[6..14].try_into().unwrap());
        let flags = u32::from_be_bytes(buf[14..18].try_into().unwrap());
        Ok(Header {
            frame_type,
            local_port,
            remote_addr,
            flags,
        })
    }
}

/// Validates a full frame (header + body) against the EFBIG boundary.
pub fn check_frame_len(total_len: usize) -> Result<(), HeaderError> {
    if total_len > MAX_FRAME_LEN {
        return Err(HeaderError::FrameTooLarge(total_len));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let hdr = Header {
            frame_type: FrameType::OutDstAddr,
            local_port: 0,
            remote_addr: 42,
            flags: 7,
        };
        let encoded = hdr.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(hdr, decoded);
    }

    #[test]
    fn oversized_frame_rejected() {
        assert!(check_frame_len(MAX_FRAME_LEN + 1).is_err());
        assert!(check_frame_len(MAX_FRAME_LEN).is_ok());
    }

    #[test]
    fn truncated_header_rejected() {
        assert_eq!(Header::decode(&[1, 0, 0]), Err(HeaderError::Truncated));
    }
}
