use bitflags::bitflags;

bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
    #[repr(transparent)]
    pub struct Prop: u8 {
        /// Permits reads of the Characteristic Value.
        const READ = 0x02;
        /// Permit writes of the Characteristic Value without response.
        const WRITE_WITHOUT_RESPONSE = 0x04;
        /// Permits writes of the Characteristic Value with response.
        const WRITE = 0x08;
        /// Permits notifications of a Characteristic Value without
        /// acknowledgment. If set, the Client Characteristic Configuration
        /// Descriptor shall exist.
        const NOTIFY = 0x10;
        /// Permits indications of a Characteristic Value with acknowledgment.
        /// If set, the Client Characteristic Configuration Descriptor shall
        /// exist.
        const INDICATE = 0x20;
    }
}

impl Prop {
    /// Returns whether the characteristic can be subscribed to.
    #[inline]
    #[must_use]
    pub const fn is_pushable(self) -> bool {
        self.intersects(Self::NOTIFY.union(Self::INDICATE))
    }

    /// Returns whether the characteristic value can be written in any way.
    #[inline]
    #[must_use]
    pub const fn is_writable(self) -> bool {
        self.intersects(Self::WRITE.union(Self::WRITE_WITHOUT_RESPONSE))
    }
}

bitflags! {
    /// Client Characteristic Configuration descriptor value
    /// ([Vol 3] Part G, Section 3.3.3.3).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct Cccd: u16 {
        /// The Characteristic Value shall be notified. This value can only be
        /// set if the characteristic's properties have the `NOTIFY` bit set.
        const NOTIFY = 1 << 0;
        /// The Characteristic Value shall be indicated. This value can only be
        /// set if the characteristic's properties have the `INDICATE` bit set.
        const INDICATE = 1 << 1;
    }
}

/// Subscription mode of one connection for one characteristic.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Mode {
    #[default]
    None,
    Notify,
    Indicate,
    Both,
}

impl Mode {
    /// Returns whether the connection receives any value updates.
    #[inline(always)]
    #[must_use]
    pub const fn is_some(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns the delivery method for an application push of kind `p`, or
    /// [`None`] if the connection is not subscribed. A single-mode subscription
    /// determines the method regardless of what the application asked for.
    #[inline]
    #[must_use]
    pub const fn delivery(self, p: Push) -> Option<Push> {
        match self {
            Self::None => None,
            Self::Notify => Some(Push::Notify),
            Self::Indicate => Some(Push::Indicate),
            Self::Both => Some(p),
        }
    }
}

impl From<Cccd> for Mode {
    fn from(v: Cccd) -> Self {
        match (v.contains(Cccd::NOTIFY), v.contains(Cccd::INDICATE)) {
            (false, false) => Self::None,
            (true, false) => Self::Notify,
            (false, true) => Self::Indicate,
            (true, true) => Self::Both,
        }
    }
}

impl From<Mode> for Cccd {
    fn from(m: Mode) -> Self {
        match m {
            Mode::None => Self::empty(),
            Mode::Notify => Self::NOTIFY,
            Mode::Indicate => Self::INDICATE,
            Mode::Both => Self::all(),
        }
    }
}

/// Server-initiated value update method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Push {
    /// `ATT_HANDLE_VALUE_NTF`, unacknowledged.
    Notify,
    /// `ATT_HANDLE_VALUE_IND`, confirmed by the client.
    Indicate,
}

/// Attribute access type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Access {
    Read,
    Write,
}

crate::impl_display_via_debug! { Mode, Push, Access }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cccd_mode() {
        assert_eq!(Mode::from(Cccd::from_bits_truncate(0x0000)), Mode::None);
        assert_eq!(Mode::from(Cccd::from_bits_truncate(0x0001)), Mode::Notify);
        assert_eq!(Mode::from(Cccd::from_bits_truncate(0x0002)), Mode::Indicate);
        assert_eq!(Mode::from(Cccd::from_bits_truncate(0xFFFF)), Mode::Both);
        assert_eq!(Cccd::from(Mode::Both).bits(), 0x0003);
    }

    #[test]
    fn delivery() {
        assert_eq!(Mode::None.delivery(Push::Notify), None);
        assert_eq!(Mode::Notify.delivery(Push::Indicate), Some(Push::Notify));
        assert_eq!(Mode::Indicate.delivery(Push::Notify), Some(Push::Indicate));
        assert_eq!(Mode::Both.delivery(Push::Indicate), Some(Push::Indicate));
    }
}
