use std::time::Duration;
use thiserror::Error;

use crate::RouterId;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("link table is full ({0} ports in use)")]
    LinkTableFull(usize),

    #[error("a link to {0} already exists")]
    DuplicateLink(RouterId),

    #[error("cannot attach a link to ourselves ({0})")]
    SelfLink(RouterId),

    #[error("no link attached to port {0}")]
    NoSuchPort(usize),

    #[error("no link to {0}")]
    NoSuchLink(RouterId),

    #[error("expected HELLO from {expected}, reply came from {actual}")]
    IdentityMismatch { expected: RouterId, actual: RouterId },

    #[error("I/O error with {addr}: {source}")]
    Transport {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{addr} did not answer within {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("malformed message from {addr}: {reason}")]
    Malformed { addr: String, reason: String },

    #[error("{peer} rejected the attach request ({reason:?})")]
    AttachRejected {
        peer: RouterId,
        reason: crate::protocol::AttachRejection,
    },

    #[error("handshake task with {peer} did not complete: {reason}")]
    TaskFailed { peer: RouterId, reason: String },

    #[error("unknown destination {0}")]
    UnknownDestination(RouterId),

    #[error("no path to {0}")]
    NoPath(RouterId),
}

impl RouterError {
    pub fn transport(addr: impl Into<String>, source: std::io::Error) -> Self {
        RouterError::Transport { addr: addr.into(), source }
    }

    pub fn malformed(addr: impl Into<String>, reason: impl Into<String>) -> Self {
        RouterError::Malformed { addr: addr.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;
