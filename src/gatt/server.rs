use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use pin_project::pin_project;
use structbuf::StructBuf;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info, trace, warn};

use crate::att::{self, Opcode, Request};
use crate::host::Transport;
use crate::{SyncMutex, SyncMutexGuard};

use super::*;

/// Connection link state. Transitions are driven by transport events, except
/// for `Disconnecting`, which is entered when the server asks the transport to
/// close a link after a fatal protocol error.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Link {
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

crate::impl_display_via_debug! { Link }

/// GATT server shared by all connections. The attribute table is read
/// concurrently without locking. Each connection has its own subscription
/// state and notification queue behind a separate mutex, which is never held
/// across an await point or an application callback.
#[derive(Debug)]
pub struct Server<T: Transport> {
    pub(super) table: Arc<Table>,
    tx: T,
    pub(super) cfg: Config,
    conns: SyncMutex<HashMap<ConnId, Arc<Conn>>>,
    stats: DeliveryStats,
    hook: Option<Hook>,
}

/// Per-connection state.
#[derive(Debug)]
pub(super) struct Conn {
    id: ConnId,
    st: SyncMutex<ConnState>,
    /// Serializes outbound delivery so that at most one indication is in
    /// flight.
    tx_lock: tokio::sync::Mutex<()>,
    ct: CancellationToken,
    wake: tokio::sync::Notify,
}

#[derive(Debug)]
pub(super) struct ConnState {
    link: Link,
    pub(super) subs: Subscriptions,
    queue: NotificationQueue,
}

impl Conn {
    /// Locks connection state.
    #[inline(always)]
    pub(super) fn lock(&self) -> SyncMutexGuard<'_, ConnState> {
        self.st.lock()
    }
}

impl<T: Transport> Server<T> {
    /// Creates a server for the specified table with the default
    /// configuration.
    #[must_use]
    pub fn new(table: Arc<Table>, tx: T) -> Self {
        Self {
            table,
            tx,
            cfg: Config::default(),
            conns: SyncMutex::default(),
            stats: DeliveryStats::default(),
            hook: None,
        }
    }

    /// Replaces the server configuration.
    #[inline]
    #[must_use]
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the delivery-path event hook.
    #[inline]
    #[must_use]
    pub fn with_hook(mut self, hook: impl Into<Hook>) -> Self {
        self.hook = Some(hook.into());
        self
    }

    /// Returns the attribute table.
    #[inline(always)]
    #[must_use]
    pub const fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Returns the server configuration.
    #[inline(always)]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns the transport.
    #[inline(always)]
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.tx
    }

    /// Returns delivery counters.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> DeliveryCounts {
        self.stats.snapshot()
    }

    /// Handles a new link. Every characteristic starts out unsubscribed.
    pub fn on_connected(&self, cn: ConnId) -> Result<()> {
        let mut conns = self.conns.lock();
        if conns.contains_key(&cn) {
            return Err(Error::AlreadyConnected(cn));
        }
        if conns.len() >= self.cfg.max_connections {
            warn!("Rejecting {cn}: connection limit reached");
            return Err(Error::ConnectionLimit(self.cfg.max_connections));
        }
        let c = Arc::new(Conn {
            id: cn,
            st: SyncMutex::new(ConnState {
                link: Link::Connecting,
                subs: Subscriptions::default(),
                queue: NotificationQueue::new(self.cfg.queue_capacity),
            }),
            tx_lock: tokio::sync::Mutex::new(()),
            ct: CancellationToken::new(),
            wake: tokio::sync::Notify::new(),
        });
        c.lock().link = Link::Connected;
        conns.insert(cn, c);
        info!("GATT client connected: {cn}");
        Ok(())
    }

    /// Handles link termination. The transport must call this exactly once per
    /// connection, including after abnormal link loss.
    #[inline]
    pub fn on_disconnected(&self, cn: ConnId) {
        self.drop_connection(cn);
    }

    /// Discards all subscription and queue state of connection `cn` and
    /// cancels any pending indication. Returns whether the connection existed.
    /// Calling this again for the same connection has no effect.
    pub fn drop_connection(&self, cn: ConnId) -> bool {
        let Some(c) = self.conns.lock().remove(&cn) else {
            debug!("Connection {cn} already dropped");
            return false;
        };
        c.ct.cancel();
        let mut st = c.lock();
        st.link = Link::Disconnected;
        st.subs.clear();
        st.queue.clear();
        drop(st);
        info!("GATT client disconnected: {cn}");
        true
    }

    /// Returns the link state of connection `cn` or [`None`] if the connection
    /// does not exist.
    #[must_use]
    pub fn link_state(&self, cn: ConnId) -> Option<Link> {
        let c = self.conns.lock().get(&cn).map(Arc::clone)?;
        let link = c.lock().link;
        Some(link)
    }

    /// Returns the IDs of all connections.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnId> {
        let mut v: Vec<ConnId> = self.conns.lock().keys().copied().collect();
        v.sort_unstable();
        v
    }

    /// Applies a CCCD value for characteristic value handle `hdl` and returns
    /// the previous subscription mode.
    pub fn set_subscription(&self, cn: ConnId, hdl: Handle, bits: u16) -> Result<Mode> {
        let c = self.table.characteristic(hdl)?;
        let conn = self.active(cn)?;
        self.subscribe(&conn, c, bits)
    }

    /// Returns the subscription mode of connection `cn` for characteristic
    /// value handle `hdl`. Unknown connections and handles are unsubscribed.
    #[must_use]
    pub fn subscription(&self, cn: ConnId, hdl: Handle) -> Mode {
        let Some(c) = self.conn(cn) else {
            return Mode::None;
        };
        let mode = c.lock().subs.get(hdl);
        mode
    }

    /// Returns the number of queued payloads for connection `cn`.
    pub fn pending(&self, cn: ConnId) -> Result<usize> {
        let c = self.conn(cn).ok_or(Error::NotConnected(cn))?;
        let n = c.lock().queue.pending();
        Ok(n)
    }

    /// Replaces the stored value of characteristic `hdl`. Connected clients
    /// are not notified.
    pub fn set_value(&self, hdl: Handle, val: &[u8]) -> Result<()> {
        if val.len() > self.cfg.max_value_len {
            return Err(Error::InvalidValueLength {
                hdl,
                len: val.len(),
            });
        }
        self.table.characteristic(hdl)?.set_value(val);
        Ok(())
    }

    /// Queues a notification of characteristic `hdl` for every subscribed
    /// connection. Returns the number of connections that will receive it.
    #[inline]
    pub fn notify(&self, hdl: Handle, val: &[u8]) -> Result<usize> {
        self.push(hdl, val, Push::Notify)
    }

    /// Queues an indication of characteristic `hdl` for every subscribed
    /// connection. Returns the number of connections that will receive it.
    #[inline]
    pub fn indicate(&self, hdl: Handle, val: &[u8]) -> Result<usize> {
        self.push(hdl, val, Push::Indicate)
    }

    /// Fans out a value update to all subscribed connections.
    fn push(&self, hdl: Handle, val: &[u8], p: Push) -> Result<usize> {
        let c = self.table.characteristic(hdl)?;
        if !c.props().is_pushable() {
            return Err(Error::ProtocolViolation {
                hdl,
                reason: "characteristic does not support notifications or indications",
            });
        }
        if val.len() > self.cfg.max_value_len {
            return Err(Error::InvalidValueLength {
                hdl,
                len: val.len(),
            });
        }
        let conns: Vec<Arc<Conn>> = self.conns.lock().values().map(Arc::clone).collect();
        let mut n = 0;
        for c in conns {
            let r = {
                let mut g = c.lock();
                let st = &mut *g;
                if st.link != Link::Connected || !st.subs.get(hdl).is_some() {
                    continue;
                }
                n += 1;
                st.queue.enqueue(&st.subs, hdl, val, p)
            };
            if let Err(e) = r {
                self.stats.failed(self.hook.as_ref(), c.id, hdl, &e);
            }
            c.wake.notify_one();
        }
        trace!("Queued {p} for {hdl} to {n} connection(s)");
        Ok(n)
    }

    /// Sends all queued payloads of connection `cn` and returns the number of
    /// successful deliveries. Payloads for characteristics the connection has
    /// since unsubscribed from are dropped. Indications are sent one at a
    /// time, each waiting for confirmation or the configured timeout. Failed
    /// deliveries are not retried.
    pub async fn drain(&self, cn: ConnId) -> Result<usize> {
        let c = self.conn(cn).ok_or(Error::NotConnected(cn))?;
        let _tx = c.tx_lock.lock().await;
        let mut n = 0;
        loop {
            let batch = {
                let mut g = c.lock();
                let st = &mut *g;
                if st.link != Link::Connected {
                    break;
                }
                let mut batch = st.queue.dequeue_batch(self.cfg.drain_batch.max(1));
                if batch.is_empty() {
                    break;
                }
                // Subscriptions may have changed since the payloads were queued
                batch.retain(|e| match st.subs.get(e.hdl).delivery(e.push) {
                    Some(push) => {
                        e.push = push;
                        true
                    }
                    None => {
                        trace!("Dropping {} for unsubscribed {}", e.push, e.hdl);
                        false
                    }
                });
                batch
            };
            for e in batch {
                match self.deliver(&c, &e).await {
                    Ok(()) => {
                        self.stats.delivered(e.push);
                        n += 1;
                    }
                    Err(err) => self.stats.failed(self.hook.as_ref(), cn, e.hdl, &err),
                }
            }
        }
        Ok(n)
    }

    /// Sends a single payload.
    async fn deliver(&self, c: &Conn, e: &Queued) -> Result<()> {
        if c.ct.is_cancelled() {
            return Err(Error::DeliveryCancelled { hdl: e.hdl });
        }
        match e.push {
            Push::Notify => {
                trace!("Notifying {} of {}", c.id, e.hdl);
                Ok(self.tx.send_notification(c.id, e.hdl, &e.val)?)
            }
            Push::Indicate => {
                trace!("Indicating {} to {}", e.hdl, c.id);
                let ack = self.tx.send_indication(c.id, e.hdl, &e.val);
                tokio::select! {
                    biased;
                    _ = c.ct.cancelled() => Err(Error::DeliveryCancelled { hdl: e.hdl }),
                    r = tokio::time::timeout(self.cfg.indication_timeout, ack) => match r {
                        Ok(r) => Ok(r?),
                        Err(_) => Err(Error::DeliveryTimeout { hdl: e.hdl }),
                    },
                }
            }
        }
    }

    /// Handles one ATT PDU received from connection `cn` and returns the
    /// response PDU, if any. Request errors are turned into `ATT_ERROR_RSP`.
    /// A malformed PDU is fatal: the transport is asked to close the link and
    /// the error is returned.
    pub async fn handle_pdu(&self, cn: ConnId, pdu: &[u8]) -> Result<Option<StructBuf>> {
        self.active(cn)?;
        let req = match Request::decode(pdu) {
            Ok(req) => req,
            Err(att::Error::InvalidHandle(op)) => {
                return Ok(err_rsp(op as u8, None, ErrorCode::InvalidHandle));
            }
            Err(e) => {
                self.fatal(cn, &e);
                return Err(e.into());
            }
        };
        trace!("{cn} request: {req:?}");
        Ok(match req {
            Request::Read { hdl } => match self.handle_read(cn, hdl).await {
                Ok(v) => Some(att::read_rsp(&v)),
                Err(e) => err_rsp(Opcode::ReadReq as u8, Some(hdl), e.error_code()),
            },
            Request::Write { hdl, val, rsp } => {
                let r = self.handle_write(cn, hdl, val, rsp).await;
                match (r, rsp) {
                    (_, false) => None,
                    (Ok(()), true) => Some(att::write_rsp()),
                    (Err(e), true) => err_rsp(Opcode::WriteReq as u8, Some(hdl), e.error_code()),
                }
            }
            Request::Confirm => None,
            Request::Unsupported(op) => {
                debug!("Unsupported ATT opcode {op:#04X} from {cn}");
                err_rsp(op, None, ErrorCode::RequestNotSupported)
            }
        })
    }

    /// Requests the transport to close the link after a fatal protocol error.
    fn fatal(&self, cn: ConnId, e: &att::Error) {
        warn!("Closing {cn}: {e}");
        if let Some(c) = self.conn(cn) {
            c.lock().link = Link::Disconnecting;
            c.ct.cancel();
        }
        self.tx.disconnect(cn);
    }

    /// Returns the state of connection `cn`.
    #[inline]
    fn conn(&self, cn: ConnId) -> Option<Arc<Conn>> {
        self.conns.lock().get(&cn).map(Arc::clone)
    }

    /// Returns the state of connection `cn` if its link is up.
    pub(super) fn active(&self, cn: ConnId) -> Result<Arc<Conn>> {
        match self.conn(cn) {
            Some(c) if c.lock().link == Link::Connected => Ok(c),
            _ => Err(Error::NotConnected(cn)),
        }
    }

    /// Updates the subscription state of connection `conn`.
    pub(super) fn subscribe(&self, conn: &Conn, c: &Characteristic, bits: u16) -> Result<Mode> {
        let prev = conn.lock().subs.set(c, bits)?;
        debug!(
            "{} subscription for {}: {prev} -> {}",
            conn.id,
            c.handle(),
            Mode::from(Cccd::from_bits_truncate(bits))
        );
        Ok(prev)
    }
}

impl<T: Transport> Server<T> {
    /// Reads attribute `hdl` on behalf of connection `cn`. The result is
    /// available from the returned future even if the caller drops it early,
    /// and it resolves to `NotConnected` if the connection goes away first.
    pub fn on_read_request(self: &Arc<Self>, cn: ConnId, hdl: Handle) -> Pending<Vec<u8>> {
        let this = Arc::clone(self);
        self.spawn_req(cn, async move { this.handle_read(cn, hdl).await })
    }

    /// Writes attribute `hdl` on behalf of connection `cn`. See
    /// [`Self::on_read_request`].
    pub fn on_write_request(
        self: &Arc<Self>,
        cn: ConnId,
        hdl: Handle,
        val: &[u8],
        rsp: bool,
    ) -> Pending<()> {
        let this = Arc::clone(self);
        let val = val.to_vec();
        self.spawn_req(cn, async move { this.handle_write(cn, hdl, &val, rsp).await })
    }

    /// Spawns a request handler task.
    fn spawn_req<R: Send + 'static>(
        &self,
        cn: ConnId,
        f: impl Future<Output = Result<R>> + Send + 'static,
    ) -> Pending<R> {
        let (tx, rx) = oneshot::channel();
        let ct = match self.conn(cn) {
            Some(c) => c.ct.clone(),
            None => {
                let _ = tx.send(Err(Error::NotConnected(cn)));
                return Pending::new(cn, rx, CancellationToken::new());
            }
        };
        tokio::spawn(async move {
            let _ = tx.send(f.await);
        });
        Pending::new(cn, rx, ct)
    }

    /// Spawns a task that drains the queue of connection `cn` whenever new
    /// payloads are queued. The task exits when the connection is dropped.
    pub fn spawn_pump(self: &Arc<Self>, cn: ConnId) -> Result<JoinHandle<()>> {
        let c = self.active(cn)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            debug!("Pump for {cn} started");
            loop {
                tokio::select! {
                    biased;
                    _ = c.ct.cancelled() => break,
                    _ = c.wake.notified() => {}
                }
                if let Err(e) = this.drain(cn).await {
                    debug!("Pump for {cn} failed: {e}");
                    break;
                }
            }
            debug!("Pump for {cn} stopped");
        }))
    }
}

/// Returns an error response PDU unless `req` is a command.
fn err_rsp(req: u8, hdl: Option<Handle>, err: ErrorCode) -> Option<StructBuf> {
    (!Opcode::is_cmd(req)).then(|| att::error_rsp(att::ErrorRsp::new(req, hdl, err)))
}

/// Result of a read or write request handled in the background.
#[pin_project]
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Pending<R> {
    cn: ConnId,
    #[pin]
    rx: oneshot::Receiver<Result<R>>,
    #[pin]
    ct: WaitForCancellationFutureOwned,
}

impl<R> Pending<R> {
    #[inline]
    fn new(cn: ConnId, rx: oneshot::Receiver<Result<R>>, ct: CancellationToken) -> Self {
        Self {
            cn,
            rx,
            ct: ct.cancelled_owned(),
        }
    }
}

impl<R> Future for Pending<R> {
    type Output = Result<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let closed = Err(Error::NotConnected(*this.cn));
        if let Poll::Ready(r) = this.rx.poll(cx) {
            return Poll::Ready(r.unwrap_or(closed));
        }
        if this.ct.poll(cx).is_ready() {
            return Poll::Ready(closed);
        }
        Poll::Pending
    }
}
