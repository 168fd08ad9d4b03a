//! Generic Attribute Profile ([Vol 3] Part G).
//!
//! A [`Table`] describes the services exposed by the peripheral. It is built
//! once and shared by a [`Server`], which tracks connected centrals, routes
//! their read and write requests to the characteristic callbacks, maintains
//! per-connection CCCD subscriptions, and delivers notifications and
//! indications through the transport.

pub use {
    config::*, consts::*, delivery::*, io::*, queue::*, server::*, subscription::*, table::*,
};

use crate::att::{ErrorCode, Handle};
use crate::host::{self, ConnId};
use crate::{att, Uuid};

mod config;
mod consts;
mod delivery;
mod dispatch;
mod io;
mod queue;
mod server;
mod subscription;
mod table;


/// Error type returned by the GATT layer.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("duplicate UUID {0}")]
    DuplicateUuid(Uuid),
    #[error("invalid {uuid} descriptor for characteristic {chr}: {reason}")]
    InvalidDescriptor {
        chr: Uuid,
        uuid: Uuid,
        reason: &'static str,
    },
    #[error("{access} callback registered for characteristic {chr} without the matching property")]
    InvalidHandler { chr: Uuid, access: Access },
    #[error("attribute not found: {0}")]
    NotFound(Lookup),
    #[error("{access} not permitted for {hdl}")]
    PermissionDenied { hdl: Handle, access: Access },
    #[error("protocol violation for {hdl}: {reason}")]
    ProtocolViolation { hdl: Handle, reason: &'static str },
    #[error("invalid value length {len} for {hdl}")]
    InvalidValueLength { hdl: Handle, len: usize },
    #[error("subscription mode {mode} not supported by {hdl}")]
    UnsupportedMode { hdl: Handle, mode: Mode },
    #[error("handler error: {0}")]
    HandlerError(#[from] IoError),
    #[error("queue overflow while enqueuing {hdl} (evicted {evicted})")]
    QueueOverflow { hdl: Handle, evicted: Handle },
    #[error("indication for {hdl} was not confirmed in time")]
    DeliveryTimeout { hdl: Handle },
    #[error("indication for {hdl} was cancelled")]
    DeliveryCancelled { hdl: Handle },
    #[error("connection {0} does not exist")]
    NotConnected(ConnId),
    #[error("connection {0} already exists")]
    AlreadyConnected(ConnId),
    #[error("connection limit ({0}) reached")]
    ConnectionLimit(usize),
    #[error("malformed PDU: {0}")]
    MalformedPdu(#[from] att::Error),
    #[error(transparent)]
    Transport(#[from] host::Error),
}

impl Error {
    /// Returns the ATT error code that is sent to the client in response to
    /// a request that failed with this error. Delivery-path and connection
    /// errors are never sent to the client and map to `UnlikelyError`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        use Error::*;
        match *self {
            NotFound(_) => ErrorCode::InvalidHandle,
            PermissionDenied {
                access: Access::Read,
                ..
            } => ErrorCode::ReadNotPermitted,
            PermissionDenied {
                access: Access::Write,
                ..
            } => ErrorCode::WriteNotPermitted,
            ProtocolViolation { .. } => ErrorCode::RequestNotSupported,
            InvalidValueLength { .. } => ErrorCode::InvalidAttributeValueLength,
            UnsupportedMode { .. } => ErrorCode::CccdImproperlyConfigured,
            MalformedPdu(_) => ErrorCode::InvalidPdu,
            _ => ErrorCode::UnlikelyError,
        }
    }

    /// Returns whether the error is reported through the delivery hook rather
    /// than to the requester.
    #[inline]
    #[must_use]
    pub const fn is_delivery(&self) -> bool {
        matches!(
            *self,
            Self::QueueOverflow { .. }
                | Self::DeliveryTimeout { .. }
                | Self::DeliveryCancelled { .. }
                | Self::Transport(_)
        )
    }
}

/// Common GATT result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failed attribute lookup key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lookup {
    Handle(Handle),
    Uuid { svc: Uuid, chr: Uuid },
}

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Handle(h) => write!(f, "{h}"),
            Self::Uuid { svc, chr } => write!(f, "{chr} in service {svc}"),
        }
    }
}
