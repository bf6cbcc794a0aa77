//
// Copyright (c) The rina-rib Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::warn;

use crate::Component;

#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    UnknownComponent(Component),
    UnknownPolicy(Component, String),
    UnknownParam(Component, String),
    TypeMismatch(Component, String),
    OutOfRange(Component, String, i64, i64),
}

impl Error {
    pub fn log(&self) {
        warn!("{}", self);
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownComponent(c) => write!(f, "unknown component {c:?}"),
            Error::UnknownPolicy(c, name) => {
                write!(f, "{c:?} has no policy named '{name}'")
            }
            Error::UnknownParam(c, name) => {
                write!(f, "{c:?} has no parameter named '{name}'")
            }
            Error::TypeMismatch(c, name) => {
                write!(f, "{c:?} parameter '{name}' does not accept that type")
            }
            Error::OutOfRange(c, name, min, max) => {
                write!(
                    f,
                    "{c:?} parameter '{name}' must be in range [{min}, {max}]"
                )
            }
        }
    }
}

impl std::error::Error for Error {}
