use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::util::name_of;

use super::*;

/// Delivery-path event hook. It is called for queue overflows, indication
/// timeouts and cancellations, and transport send failures. The hook runs on
/// the delivering task and must not block.
#[derive(Clone)]
#[repr(transparent)]
pub struct Hook(Arc<dyn Fn(ConnId, Handle, &Error) + Send + Sync>);

impl Hook {
    /// Invokes the hook.
    #[inline(always)]
    pub(super) fn call(&self, cn: ConnId, hdl: Handle, e: &Error) {
        (self.0)(cn, hdl, e);
    }
}

impl Debug for Hook {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        (f.debug_tuple(name_of!(Hook)).field(&Arc::as_ptr(&self.0))).finish()
    }
}

impl<F: Fn(ConnId, Handle, &Error) + Send + Sync + 'static> From<F> for Hook {
    #[inline(always)]
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Server-wide delivery counters.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    notified: AtomicU64,
    confirmed: AtomicU64,
    overflows: AtomicU64,
    timeouts: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize)]
pub struct DeliveryCounts {
    /// Notifications accepted by the transport.
    pub notified: u64,
    /// Indications confirmed by the client.
    pub confirmed: u64,
    /// Payloads evicted from a full queue.
    pub overflows: u64,
    /// Indications that were not confirmed in time.
    pub timeouts: u64,
    /// Indications abandoned because the connection was closed.
    pub cancelled: u64,
    /// Transport send failures.
    pub failed: u64,
}

impl DeliveryStats {
    /// Returns current counter values.
    #[must_use]
    pub fn snapshot(&self) -> DeliveryCounts {
        let get = |v: &AtomicU64| v.load(Ordering::Relaxed);
        DeliveryCounts {
            notified: get(&self.notified),
            confirmed: get(&self.confirmed),
            overflows: get(&self.overflows),
            timeouts: get(&self.timeouts),
            cancelled: get(&self.cancelled),
            failed: get(&self.failed),
        }
    }

    /// Records a successful delivery.
    #[inline]
    pub(super) fn delivered(&self, push: Push) {
        let c = match push {
            Push::Notify => &self.notified,
            Push::Indicate => &self.confirmed,
        };
        c.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a delivery-path error and reports it to the hook.
    pub(super) fn failed(&self, hook: Option<&Hook>, cn: ConnId, hdl: Handle, e: &Error) {
        let c = match *e {
            Error::QueueOverflow { .. } => &self.overflows,
            Error::DeliveryTimeout { .. } => &self.timeouts,
            Error::DeliveryCancelled { .. } => &self.cancelled,
            _ => &self.failed,
        };
        c.fetch_add(1, Ordering::Relaxed);
        warn!("Delivery to {cn} for {hdl} failed: {e}");
        if let Some(hook) = hook {
            hook.call(cn, hdl, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn counters_and_hook() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook = Hook::from({
            let seen = Arc::clone(&seen);
            move |cn: ConnId, hdl: Handle, e: &Error| {
                seen.lock().unwrap().push((cn, hdl, e.to_string()));
            }
        });
        let hdl = Handle::new(3).unwrap();
        let s = DeliveryStats::default();
        s.delivered(Push::Notify);
        s.delivered(Push::Notify);
        s.delivered(Push::Indicate);
        s.failed(Some(&hook), ConnId(7), hdl, &Error::DeliveryTimeout { hdl });
        s.failed(None, ConnId(7), hdl, &Error::DeliveryCancelled { hdl });
        s.failed(
            Some(&hook),
            ConnId(7),
            hdl,
            &Error::QueueOverflow { hdl, evicted: hdl },
        );
        assert_eq!(
            s.snapshot(),
            DeliveryCounts {
                notified: 2,
                confirmed: 1,
                overflows: 1,
                timeouts: 1,
                cancelled: 1,
                failed: 0,
            }
        );
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, ConnId(7));
        assert!(seen[1].2.contains("overflow"));
        let json = serde_json::to_value(s.snapshot()).unwrap();
        assert_eq!(json["notified"], 2);
    }
}
