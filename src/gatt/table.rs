use parking_lot::RwLock;
use structbuf::{Pack, StructBuf};
use tracing::info;

use warble_const::{Declaration, Descriptor as Desc, UuidPacker, UuidType, UuidVec};

pub use builder::*;

use crate::att::HandleRange;

use super::*;

mod builder;

/// Immutable attribute table shared by all connections. Handles are assigned
/// in declaration order starting at 0x0001: each service declaration is
/// followed by its characteristics, and each characteristic by its
/// declaration, value, and descriptors. The characteristic value handle
/// identifies the characteristic in all other APIs.
#[derive(Debug)]
pub struct Table {
    svc: Box<[Service]>,
    attr: Box<[Attr]>,
}

/// Attribute index entry.
#[derive(Clone, Copy, Debug)]
enum Attr {
    Service(usize),
    Declaration(usize, usize),
    Value(usize, usize),
    Descriptor(usize, usize, usize),
}

/// Resolved attribute.
#[derive(Clone, Copy, Debug)]
pub enum AttributeRef<'a> {
    /// Primary service declaration.
    Service(&'a Service),
    /// Characteristic declaration.
    Declaration(&'a Characteristic),
    /// Characteristic value.
    Value(&'a Characteristic),
    /// Characteristic descriptor.
    Descriptor(&'a Characteristic, &'a Descriptor),
}

impl AttributeRef<'_> {
    /// Returns the attribute handle.
    #[must_use]
    pub const fn handle(&self) -> Handle {
        match *self {
            Self::Service(s) => s.hdl,
            Self::Declaration(c) => c.decl,
            Self::Value(c) => c.hdl,
            Self::Descriptor(_, d) => d.hdl,
        }
    }

    /// Returns the attribute type.
    #[must_use]
    pub fn typ(&self) -> Uuid {
        match *self {
            Self::Service(_) => Declaration::PrimaryService.uuid(),
            Self::Declaration(_) => Declaration::Characteristic.uuid(),
            Self::Value(c) => c.uuid,
            Self::Descriptor(_, d) => d.uuid,
        }
    }
}

impl Table {
    /// Returns a new table builder.
    #[inline]
    #[must_use]
    pub fn build() -> Builder<Self> {
        Builder::new()
    }

    /// Returns the attribute with the specified handle.
    pub fn lookup(&self, hdl: Handle) -> Result<AttributeRef<'_>> {
        let Some(&at) = self.attr.get(usize::from(hdl) - 1) else {
            return Err(Error::NotFound(Lookup::Handle(hdl)));
        };
        Ok(match at {
            Attr::Service(s) => AttributeRef::Service(&self.svc[s]),
            Attr::Declaration(s, c) => AttributeRef::Declaration(&self.svc[s].chars[c]),
            Attr::Value(s, c) => AttributeRef::Value(&self.svc[s].chars[c]),
            Attr::Descriptor(s, c, d) => {
                let c = &self.svc[s].chars[c];
                AttributeRef::Descriptor(c, &c.descs[d])
            }
        })
    }

    /// Returns the value attribute of characteristic `chr` in service `svc`.
    pub fn lookup_by_uuid(
        &self,
        svc: impl Into<Uuid>,
        chr: impl Into<Uuid>,
    ) -> Result<AttributeRef<'_>> {
        let (svc, chr) = (svc.into(), chr.into());
        (self.svc.iter())
            .find(|s| s.uuid == svc)
            .and_then(|s| s.chars.iter().find(|c| c.uuid == chr))
            .map(AttributeRef::Value)
            .ok_or(Error::NotFound(Lookup::Uuid { svc, chr }))
    }

    /// Returns the characteristic identified by its value handle.
    pub fn characteristic(&self, hdl: Handle) -> Result<&Characteristic> {
        match self.lookup(hdl)? {
            AttributeRef::Value(c) => Ok(c),
            _ => Err(Error::NotFound(Lookup::Handle(hdl))),
        }
    }

    /// Returns all services in handle order.
    #[inline]
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.svc.iter()
    }

    /// Returns all characteristics in handle order.
    #[inline]
    pub fn characteristics(&self) -> impl Iterator<Item = &Characteristic> {
        self.svc.iter().flat_map(|s| s.chars.iter())
    }

    /// Returns the number of attributes in the table.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.attr.len()
    }

    /// Returns whether the table has no attributes.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attr.is_empty()
    }

    /// Logs table contents.
    pub fn dump(&self) {
        macro_rules! log {
            ($hdl:expr, $fmt:expr$(, $($args:tt)*)?) => {
                info!("[{:#06X}] {}", u16::from($hdl), format_args!($fmt$(, $($args)*)?))
            };
        }
        info!("GATT table:");
        for s in self.services() {
            match s.uuid.typ() {
                UuidType::Service(t) => log!(s.hdl, "{t} <{}>", s.uuid),
                _ => log!(s.hdl, "Service <{}>", s.uuid),
            }
            for (i, c) in s.chars.iter().enumerate() {
                let cont = if i + 1 < s.chars.len() { '|' } else { ' ' };
                match c.uuid.typ() {
                    UuidType::Characteristic(t) => log!(c.decl, "|__ {t} <{}> {:?}", c.uuid, c.props),
                    _ => log!(c.decl, "|__ Characteristic <{}> {:?}", c.uuid, c.props),
                }
                log!(c.hdl, "{cont}   |__ [Value <{}>]", c.uuid);
                for d in &c.descs {
                    match d.uuid.typ() {
                        UuidType::Descriptor(t) => log!(d.hdl, "{cont}   |__ {t} <{}>", d.uuid),
                        _ => log!(d.hdl, "{cont}   |__ Descriptor <{}>", d.uuid),
                    }
                }
            }
        }
    }
}

/// Primary service definition.
#[derive(Debug)]
pub struct Service {
    uuid: Uuid,
    hdl: Handle,
    end: Handle,
    chars: Vec<Characteristic>,
}

impl Service {
    /// Returns the service UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the service declaration handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.hdl
    }

    /// Returns the handle range of the service group.
    #[inline]
    pub const fn range(&self) -> HandleRange {
        HandleRange::new(self.hdl, self.end)
    }

    /// Returns service characteristics in declaration order.
    #[inline(always)]
    #[must_use]
    pub fn characteristics(&self) -> &[Characteristic] {
        &self.chars
    }

    /// Returns the service declaration value.
    #[inline]
    pub(super) fn decl_value(&self) -> Vec<u8> {
        UuidVec::new(self.uuid).to_vec()
    }
}

/// Characteristic definition.
#[derive(Debug)]
pub struct Characteristic {
    uuid: Uuid,
    decl: Handle,
    hdl: Handle,
    props: Prop,
    val: RwLock<Vec<u8>>,
    descs: Vec<Descriptor>,
    cccd: Option<Handle>,
    read: Option<ReadIo>,
    write: Option<WriteIo>,
}

impl Characteristic {
    /// Returns the characteristic UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the characteristic value handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.hdl
    }

    /// Returns the characteristic declaration handle.
    #[inline(always)]
    #[must_use]
    pub const fn decl_handle(&self) -> Handle {
        self.decl
    }

    /// Returns the characteristic properties.
    #[inline(always)]
    #[must_use]
    pub const fn props(&self) -> Prop {
        self.props
    }

    /// Returns the CCCD handle if the characteristic supports subscriptions.
    #[inline(always)]
    #[must_use]
    pub const fn cccd(&self) -> Option<Handle> {
        self.cccd
    }

    /// Returns characteristic descriptors in declaration order.
    #[inline(always)]
    #[must_use]
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descs
    }

    /// Returns a copy of the stored value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Vec<u8> {
        self.val.read().clone()
    }

    /// Replaces the stored value.
    #[inline]
    pub(super) fn set_value(&self, v: &[u8]) {
        let mut val = self.val.write();
        val.clear();
        val.extend_from_slice(v);
    }

    #[inline(always)]
    pub(super) const fn read_io(&self) -> Option<&ReadIo> {
        self.read.as_ref()
    }

    #[inline(always)]
    pub(super) const fn write_io(&self) -> Option<&WriteIo> {
        self.write.as_ref()
    }

    /// Returns the characteristic declaration value
    /// ([Vol 3] Part G, Section 3.3.1).
    pub(super) fn decl_value(&self) -> Vec<u8> {
        let mut b = StructBuf::new(1 + 2 + Uuid::BYTES);
        b.append().u8(self.props.bits()).u16(self.hdl).uuid(self.uuid);
        b.as_ref().to_vec()
    }
}

/// Characteristic descriptor definition. The CCCD carries no stored value;
/// its value is the requesting connection's subscription state.
#[derive(Debug)]
pub struct Descriptor {
    uuid: Uuid,
    hdl: Handle,
    val: Vec<u8>,
}

impl Descriptor {
    /// Returns the descriptor UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the descriptor handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.hdl
    }

    /// Returns the static descriptor value.
    #[inline(always)]
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.val
    }

    /// Returns whether this is a Client Characteristic Configuration
    /// descriptor.
    #[inline]
    #[must_use]
    pub fn is_cccd(&self) -> bool {
        self.uuid == Desc::ClientCharacteristicConfiguration
    }
}

#[cfg(test)]
mod tests;
