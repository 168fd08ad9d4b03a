use std::collections::VecDeque;

use smallvec::SmallVec;
use tracing::{trace, warn};

use super::*;

/// Pending value update.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Queued {
    pub hdl: Handle,
    pub val: Vec<u8>,
    pub push: Push,
}

impl Queued {
    /// Returns whether the client must confirm the update.
    #[inline(always)]
    #[must_use]
    pub fn needs_ack(&self) -> bool {
        self.push == Push::Indicate
    }
}

/// Drained batch of pending updates.
pub type Batch = SmallVec<[Queued; 8]>;

/// Bounded per-connection outbound queue of notifications and indications.
/// When full, a new payload for a handle that is already queued replaces the
/// oldest pending payload for that handle. Otherwise the oldest entry overall
/// is evicted.
#[derive(Debug)]
pub struct NotificationQueue {
    cap: usize,
    q: VecDeque<Queued>,
    overflow: u64,
}

impl NotificationQueue {
    /// Creates an empty queue that holds at most `cap` payloads.
    #[inline]
    #[must_use]
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            q: VecDeque::with_capacity(cap.min(64)),
            overflow: 0,
        }
    }

    /// Queues a value update for characteristic value handle `hdl` if the
    /// connection is subscribed to it. The delivery method is chosen by the
    /// subscription mode. Eviction of another payload is reported as
    /// [`Error::QueueOverflow`], but the new payload is queued regardless.
    pub fn enqueue(
        &mut self,
        subs: &Subscriptions,
        hdl: Handle,
        val: &[u8],
        p: Push,
    ) -> Result<()> {
        let Some(push) = subs.get(hdl).delivery(p) else {
            trace!("Dropping {p} for unsubscribed {hdl}");
            return Ok(());
        };
        if self.q.len() < self.cap {
            self.q.push_back(Queued {
                hdl,
                val: val.to_vec(),
                push,
            });
            return Ok(());
        }
        if let Some(e) = self.q.iter_mut().find(|e| e.hdl == hdl) {
            trace!("Coalescing {push} for {hdl}");
            e.val.clear();
            e.val.extend_from_slice(val);
            e.push = push;
            return Ok(());
        }
        let evicted = self.q.pop_front().map_or(hdl, |e| e.hdl);
        self.overflow += 1;
        warn!("Queue overflow for {hdl}, evicted {evicted}");
        self.q.push_back(Queued {
            hdl,
            val: val.to_vec(),
            push,
        });
        Err(Error::QueueOverflow { hdl, evicted })
    }

    /// Removes and returns up to `max_n` payloads in FIFO order. Stops after
    /// the first indication so that at most one indication is in flight.
    pub fn dequeue_batch(&mut self, max_n: usize) -> Batch {
        let mut b = Batch::new();
        while b.len() < max_n {
            let Some(e) = self.q.pop_front() else { break };
            let ack = e.needs_ack();
            b.push(e);
            if ack {
                break;
            }
        }
        b
    }

    /// Returns the number of pending payloads.
    #[inline(always)]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.q.len()
    }

    /// Returns the queue capacity.
    #[inline(always)]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.cap
    }

    /// Returns the number of evictions since the queue was created.
    #[inline(always)]
    #[must_use]
    pub const fn overflows(&self) -> u64 {
        self.overflow
    }

    /// Discards all pending payloads.
    #[inline]
    pub fn clear(&mut self) {
        self.q.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use warble_const::Service as Svc;

    use super::*;

    fn uuid(v: u16) -> Uuid {
        Uuid::from_str(&format!("{v:04X}")).unwrap()
    }

    /// Returns a table with `n` notify characteristics and one indicate
    /// characteristic, subscribed accordingly.
    fn setup(n: u16) -> (Table, Subscriptions) {
        let mut b = Table::build();
        b.primary_service(Svc::HeartRate, |b| {
            for i in 0..n {
                b.characteristic(uuid(0xA000 + i), Prop::NOTIFY, |_| {});
            }
            b.characteristic(uuid(0xB000), Prop::INDICATE, |_| {});
            b.characteristic(uuid(0xB001), Prop::NOTIFY, |_| {});
        });
        let t = b.freeze().unwrap();
        let mut s = Subscriptions::default();
        for c in t.characteristics().take(usize::from(n)) {
            s.set(c, 0x0001).unwrap();
        }
        let ind = t.characteristics().nth(usize::from(n)).unwrap();
        s.set(ind, 0x0002).unwrap();
        (t, s)
    }

    fn handles(t: &Table) -> Vec<Handle> {
        t.characteristics().map(Characteristic::handle).collect()
    }

    #[test]
    fn unsubscribed_drop() {
        let (t, s) = setup(1);
        let h = handles(&t);
        let mut q = NotificationQueue::new(4);
        assert!(q.enqueue(&s, h[2], b"x", Push::Notify).is_ok());
        assert_eq!(q.pending(), 0);
        assert!(q.enqueue(&s, h[0], b"x", Push::Notify).is_ok());
        assert_eq!(q.pending(), 1);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let (t, s) = setup(4);
        let h = handles(&t);
        let mut q = NotificationQueue::new(3);
        for (i, &hdl) in h[..3].iter().enumerate() {
            q.enqueue(&s, hdl, &[i as u8], Push::Notify).unwrap();
        }
        assert_eq!(q.pending(), 3);
        let r = q.enqueue(&s, h[3], &[3], Push::Notify);
        assert!(matches!(
            r,
            Err(Error::QueueOverflow { hdl, evicted }) if hdl == h[3] && evicted == h[0]
        ));
        assert_eq!(q.overflows(), 1);
        assert_eq!(q.pending(), 3);
        let b = q.dequeue_batch(8);
        let got: Vec<_> = b.iter().map(|e| (e.hdl, e.val[0])).collect();
        assert_eq!(got, [(h[1], 1), (h[2], 2), (h[3], 3)]);
    }

    #[test]
    fn coalesce_same_handle() {
        let (t, s) = setup(2);
        let h = handles(&t);
        let mut q = NotificationQueue::new(3);
        q.enqueue(&s, h[0], b"a1", Push::Notify).unwrap();
        q.enqueue(&s, h[1], b"b1", Push::Notify).unwrap();
        q.enqueue(&s, h[0], b"a2", Push::Notify).unwrap();
        q.enqueue(&s, h[0], b"a3", Push::Notify).unwrap();
        assert_eq!(q.pending(), 3);
        assert_eq!(q.overflows(), 0);
        let b = q.dequeue_batch(8);
        let got: Vec<_> = b.iter().map(|e| (e.hdl, e.val.as_slice())).collect();
        assert_eq!(got, [(h[0], &b"a3"[..]), (h[1], &b"b1"[..]), (h[0], &b"a2"[..])]);
    }

    #[test]
    fn fifo_batches() {
        let (t, s) = setup(2);
        let h = handles(&t);
        let mut q = NotificationQueue::new(8);
        q.enqueue(&s, h[0], b"1", Push::Notify).unwrap();
        q.enqueue(&s, h[2], b"2", Push::Notify).unwrap();
        q.enqueue(&s, h[1], b"3", Push::Indicate).unwrap();
        q.enqueue(&s, h[1], b"4", Push::Notify).unwrap();

        let b = q.dequeue_batch(1);
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].val, b"1");

        // Indicate-only subscription turns the notification into an
        // indication and the batch stops there
        let b = q.dequeue_batch(8);
        assert_eq!(b.len(), 1);
        assert!(b[0].needs_ack());
        assert_eq!(b[0].val, b"2");

        let b = q.dequeue_batch(8);
        let got: Vec<_> = b.iter().map(|e| (e.val.as_slice(), e.push)).collect();
        assert_eq!(got, [(&b"3"[..], Push::Notify), (&b"4"[..], Push::Notify)]);
        assert_eq!(q.pending(), 0);
    }
}
