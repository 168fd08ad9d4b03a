use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use crate::util::name_of;

use super::*;

/// Application callback error. The detail is logged, never sent to the client.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct IoError(String);

impl IoError {
    /// Creates a new callback error.
    #[inline]
    #[must_use]
    pub fn new(detail: impl Display) -> Self {
        Self(detail.to_string())
    }

    /// Returns the error detail.
    #[inline(always)]
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IoError {
    #[inline]
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for IoError {
    #[inline]
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// I/O callback result type.
pub type IoResult<T> = std::result::Result<T, IoError>;

/// Characteristic value read request passed to a read callback.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct ReadReq {
    pub cn: ConnId,
    pub hdl: Handle,
    pub uuid: Uuid,
}

/// Characteristic value write request passed to a write callback.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct WriteReq<'a> {
    pub cn: ConnId,
    pub hdl: Handle,
    pub uuid: Uuid,
    pub val: &'a [u8],
    /// Whether the client expects a write response.
    pub rsp: bool,
}

impl<'a> AsRef<[u8]> for WriteReq<'a> {
    #[inline(always)]
    fn as_ref(&self) -> &'a [u8] {
        self.val
    }
}

type ReadFn = dyn Fn(ReadReq) -> IoResult<Vec<u8>> + Send + Sync;
type WriteFn = dyn for<'a> Fn(WriteReq<'a>) -> IoResult<()> + Send + Sync;

/// Characteristic read callback. Callbacks run on the blocking thread pool
/// and may take as long as they need without stalling other connections.
#[derive(Clone)]
#[repr(transparent)]
pub struct ReadIo(Arc<ReadFn>);

impl ReadIo {
    /// Returns a read callback for a method of `T`.
    #[inline(always)]
    pub fn with<T: Send + Sync + 'static>(
        this: &Arc<T>,
        f: impl Fn(&T, ReadReq) -> IoResult<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        let this = Arc::clone(this);
        Self(Arc::new(move |req: ReadReq| f(&this, req)))
    }

    /// Invokes the callback.
    pub(super) async fn call(&self, req: ReadReq) -> Result<Vec<u8>> {
        let f = Arc::clone(&self.0);
        match tokio::task::spawn_blocking(move || f(req)).await {
            Ok(r) => Ok(r?),
            Err(e) => Err(Error::HandlerError(IoError::new(e))),
        }
    }
}

impl Debug for ReadIo {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        (f.debug_tuple(name_of!(ReadIo)).field(&Arc::as_ptr(&self.0))).finish()
    }
}

impl<F: Fn(ReadReq) -> IoResult<Vec<u8>> + Send + Sync + 'static> From<F> for ReadIo {
    #[inline(always)]
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Characteristic write callback. See [`ReadIo`] for the execution model.
#[derive(Clone)]
#[repr(transparent)]
pub struct WriteIo(Arc<WriteFn>);

impl WriteIo {
    /// Returns a write callback for a method of `T`.
    #[inline(always)]
    pub fn with<T: Send + Sync + 'static>(
        this: &Arc<T>,
        f: impl Fn(&T, WriteReq) -> IoResult<()> + Send + Sync + 'static,
    ) -> Self {
        let this = Arc::clone(this);
        Self(Arc::new(move |req: WriteReq| f(&this, req)))
    }

    /// Invokes the callback with an owned copy of the value.
    pub(super) async fn call(
        &self,
        cn: ConnId,
        hdl: Handle,
        uuid: Uuid,
        val: &[u8],
        rsp: bool,
    ) -> Result<()> {
        let f = Arc::clone(&self.0);
        let val = val.to_vec();
        let r = tokio::task::spawn_blocking(move || {
            f(WriteReq {
                cn,
                hdl,
                uuid,
                val: &val,
                rsp,
            })
        });
        match r.await {
            Ok(r) => Ok(r?),
            Err(e) => Err(Error::HandlerError(IoError::new(e))),
        }
    }
}

impl Debug for WriteIo {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        (f.debug_tuple(name_of!(WriteIo)).field(&Arc::as_ptr(&self.0))).finish()
    }
}

impl<F: for<'a> Fn(WriteReq<'a>) -> IoResult<()> + Send + Sync + 'static> From<F> for WriteIo {
    #[inline(always)]
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}
