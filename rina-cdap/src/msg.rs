//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

use rina_utils::name::IpcpName;
use serde::{Deserialize, Serialize};

/// CDAP operation codes. Only the subset actually put on the wire by
/// enrollment, the DFT, the LFDB, and flow/address allocation is modeled;
/// the full CDAP opcode set (M_READ, M_WRITE, M_CANCELREAD, ...) is out
/// of scope.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum CdapOpcode {
    MConnect,
    MConnectR,
    MRelease,
    MReleaseR,
    MCreate,
    MCreateR,
    MDelete,
    MDeleteR,
    MStart,
    MStartR,
    MStop,
    MStopR,
}

/// A CDAP message. `obj_value` carries the opaque, already-serialized body
/// of the nested RIB object (an `EnrollmentInfo`, `LowerFlowList`, ...); the
/// CDAP layer never interprets it.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct CdapMessage {
    pub opcode: CdapOpcode,
    pub invoke_id: i64,
    pub src_appl: IpcpName,
    pub dst_appl: IpcpName,
    pub obj_class: Option<String>,
    pub obj_name: Option<String>,
    pub obj_value: Option<Vec<u8>>,
    /// Opaque authentication payload, never cryptographically verified by
    /// this layer.
    pub auth: Option<Vec<u8>>,
    pub result: Option<i32>,
    pub result_reason: Option<String>,
}

impl CdapMessage {
    pub fn new(opcode: CdapOpcode, src_appl: IpcpName, dst_appl: IpcpName) -> CdapMessage {
        CdapMessage {
            opcode,
            invoke_id: 0,
            src_appl,
            dst_appl,
            obj_class: None,
            obj_name: None,
            obj_value: None,
            auth: None,
            result: None,
            result_reason: None,
        }
    }

    pub fn with_object(mut self, class: &str, name: &str, value: Vec<u8>) -> CdapMessage {
        self.obj_class = Some(class.to_owned());
        self.obj_name = Some(name.to_owned());
        self.obj_value = Some(value);
        self
    }

    pub fn with_invoke_id(mut self, invoke_id: i64) -> CdapMessage {
        self.invoke_id = invoke_id;
        self
    }

    pub fn with_result(mut self, result: i32, reason: Option<String>) -> CdapMessage {
        self.result = Some(result);
        self.result_reason = reason;
        self
    }
}
