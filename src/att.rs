//! Attribute Protocol ([Vol 3] Part F).
//!
//! Only the PDUs a GATT server needs to answer value reads and writes and to
//! push value updates are modeled here.

pub use {consts::*, handle::*, pdu::*};

mod consts;
mod handle;
mod pdu;

/// Error type returned when an inbound PDU cannot be decoded.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("empty PDU")]
    Empty,
    #[error("truncated {0} PDU")]
    Truncated(Opcode),
    #[error("{0} PDU with an invalid handle")]
    InvalidHandle(Opcode),
}

/// Common ATT result type.
pub type Result<T> = std::result::Result<T, Error>;

/// `ATT_ERROR_RSP` PDU ([Vol 3] Part F, Section 3.4.1.1).
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("ATT {req:#04X}{} failed with {err}", .hdl.map_or(String::new(), |h| format!(" for handle {:#06X}", u16::from(h))))]
pub struct ErrorRsp {
    pub req: u8,
    pub hdl: Option<Handle>,
    pub err: ErrorCode,
}

impl ErrorRsp {
    /// Creates a new error response.
    #[inline(always)]
    #[must_use]
    pub const fn new(req: u8, hdl: Option<Handle>, err: ErrorCode) -> Self {
        Self { req, hdl, err }
    }
}
