//! Link-layer transport interface.
//!
//! The GATT server does not own the radio. Connection events and inbound
//! requests are pushed into [`gatt::Server`](crate::gatt::Server) by whatever
//! drives the link, and outbound notifications and indications are handed back
//! through the [`Transport`] trait.

use std::fmt::Debug;
use std::sync::Arc;

use futures_core::future::BoxFuture;

use crate::att::Handle;

/// Opaque transport-provided connection identifier.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct ConnId(pub u64);

impl From<u64> for ConnId {
    #[inline(always)]
    fn from(v: u64) -> Self {
        Self(v)
    }
}

crate::impl_display_via_debug! { ConnId }

/// Error type returned by the transport.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("link {0} is closed")]
    LinkClosed(ConnId),
    #[error("transport error: {0}")]
    Other(String),
}

/// Common transport result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Future that resolves when the client confirms an indication.
pub type Ack = BoxFuture<'static, Result<()>>;

/// Outbound side of a BLE link.
pub trait Transport: Debug + Send + Sync + 'static {
    /// Sends an `ATT_HANDLE_VALUE_NTF` PDU. Returns once the payload was
    /// accepted for transmission.
    fn send_notification(&self, cn: ConnId, hdl: Handle, val: &[u8]) -> Result<()>;

    /// Sends an `ATT_HANDLE_VALUE_IND` PDU and returns a future that resolves
    /// when the matching `ATT_HANDLE_VALUE_CFM` is received. Dropping the
    /// future abandons the wait.
    fn send_indication(&self, cn: ConnId, hdl: Handle, val: &[u8]) -> Ack;

    /// Requests the link to be closed. The transport must still report the
    /// disconnect through `on_disconnected` once the link is down.
    fn disconnect(&self, cn: ConnId);
}

impl<T: Transport> Transport for Arc<T> {
    #[inline(always)]
    fn send_notification(&self, cn: ConnId, hdl: Handle, val: &[u8]) -> Result<()> {
        (**self).send_notification(cn, hdl, val)
    }

    #[inline(always)]
    fn send_indication(&self, cn: ConnId, hdl: Handle, val: &[u8]) -> Ack {
        (**self).send_indication(cn, hdl, val)
    }

    #[inline(always)]
    fn disconnect(&self, cn: ConnId) {
        (**self).disconnect(cn);
    }
}
