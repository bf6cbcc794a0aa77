//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

//! The CDAP (de)serializer seam: the wire codec is treated as an external
//! collaborator. [`JsonCdapCodec`] is a real, usable implementation built
//! on `serde_json` — adequate for a userspace IPCP with no requirement to
//! match a specific kernel wire ABI — kept swappable behind the
//! [`CdapCodec`] trait.

use crate::error::Error;
use crate::msg::CdapMessage;

pub trait CdapCodec: Send {
    fn encode(&self, msg: &CdapMessage) -> Result<Vec<u8>, Error>;
    fn decode(&self, bytes: &[u8]) -> Result<CdapMessage, Error>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCdapCodec;

impl CdapCodec for JsonCdapCodec {
    fn encode(&self, msg: &CdapMessage) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(msg).map_err(|e| Error::CodecError(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<CdapMessage, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::CodecError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rina_utils::name::IpcpName;

    use super::*;
    use crate::msg::CdapOpcode;

    #[test]
    fn json_codec_round_trips() {
        let codec = JsonCdapCodec;
        let msg = CdapMessage::new(
            CdapOpcode::MConnect,
            IpcpName::new("a", "1", "", ""),
            IpcpName::new("b", "1", "", ""),
        )
        .with_invoke_id(5);
        let bytes = codec.encode(&msg).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.invoke_id, 5);
        assert_eq!(decoded.opcode, CdapOpcode::MConnect);
    }
}
