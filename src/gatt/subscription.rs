use std::collections::BTreeMap;

use super::*;

/// Subscription state of a single connection, keyed by characteristic value
/// handle. Characteristics that were never configured are unsubscribed.
#[derive(Clone, Debug, Default)]
pub struct Subscriptions(BTreeMap<Handle, Cccd>);

impl Subscriptions {
    /// Applies a CCCD value written by the client and returns the previous
    /// mode. Reserved bits are ignored.
    pub fn set(&mut self, c: &Characteristic, bits: u16) -> Result<Mode> {
        let v = Cccd::from_bits_truncate(bits);
        let props = c.props();
        if (v.contains(Cccd::NOTIFY) && !props.contains(Prop::NOTIFY))
            || (v.contains(Cccd::INDICATE) && !props.contains(Prop::INDICATE))
        {
            return Err(Error::UnsupportedMode {
                hdl: c.handle(),
                mode: Mode::from(v),
            });
        }
        let prev = if v.is_empty() {
            self.0.remove(&c.handle())
        } else {
            self.0.insert(c.handle(), v)
        };
        Ok(prev.map_or(Mode::None, Mode::from))
    }

    /// Returns the subscription mode for characteristic value handle `hdl`.
    #[inline]
    #[must_use]
    pub fn get(&self, hdl: Handle) -> Mode {
        self.0.get(&hdl).map_or(Mode::None, |&v| Mode::from(v))
    }

    /// Returns the raw CCCD value for characteristic value handle `hdl`.
    #[inline]
    #[must_use]
    pub fn bits(&self, hdl: Handle) -> u16 {
        self.0.get(&hdl).map_or(0, |v| v.bits())
    }

    /// Returns the number of subscribed characteristics.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether there are no subscriptions.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Removes all subscriptions.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use warble_const::{Characteristic as Chr, Service as Svc};

    use super::*;

    fn table() -> Table {
        let mut b = Table::build();
        b.primary_service(Svc::HeartRate, |b| {
            b.characteristic(Chr::HeartRateMeasurement, Prop::NOTIFY, |_| {});
            b.characteristic(Chr::ServiceChanged, Prop::INDICATE, |_| {});
            b.characteristic(Chr::BatteryLevel, Prop::NOTIFY | Prop::INDICATE, |_| {});
        });
        b.freeze().unwrap()
    }

    #[test]
    fn notify_then_off() {
        let t = table();
        let c = t.characteristic(Handle::new(3).unwrap()).unwrap();
        let mut s = Subscriptions::default();
        assert_eq!(s.get(c.handle()), Mode::None);
        assert_eq!(s.set(c, 0x0001).unwrap(), Mode::None);
        assert_eq!(s.get(c.handle()), Mode::Notify);
        assert_eq!(s.bits(c.handle()), 0x0001);
        assert_eq!(s.set(c, 0x0000).unwrap(), Mode::Notify);
        assert_eq!(s.get(c.handle()), Mode::None);
        assert!(s.is_empty());
    }

    #[test]
    fn unsupported_mode() {
        let t = table();
        let mut s = Subscriptions::default();
        let ntf = t.characteristic(Handle::new(3).unwrap()).unwrap();
        let ind = t.characteristic(Handle::new(6).unwrap()).unwrap();
        let both = t.characteristic(Handle::new(9).unwrap()).unwrap();
        assert!(matches!(
            s.set(ntf, 0x0002),
            Err(Error::UnsupportedMode {
                mode: Mode::Indicate,
                ..
            })
        ));
        assert!(matches!(s.set(ind, 0x0001), Err(Error::UnsupportedMode { .. })));
        assert!(matches!(s.set(ind, 0x0003), Err(Error::UnsupportedMode { .. })));
        assert!(s.is_empty());

        assert_eq!(s.set(ind, 0x0002).unwrap(), Mode::None);
        assert_eq!(s.set(both, 0x0003).unwrap(), Mode::None);
        assert_eq!(s.get(both.handle()), Mode::Both);
        assert_eq!(s.set(both, 0x0002).unwrap(), Mode::Both);
        assert_eq!(s.len(), 2);

        // Reserved bits are ignored
        assert_eq!(s.set(ntf, 0xFF01).unwrap(), Mode::None);
        assert_eq!(s.bits(ntf.handle()), 0x0001);

        s.clear();
        assert_eq!(s.get(ind.handle()), Mode::None);
    }
}
