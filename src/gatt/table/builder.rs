use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use tracing::debug;

use super::*;

/// Table service definition marker type.
#[derive(Debug)]
pub struct ServiceDef;

/// Table characteristic definition marker type.
#[derive(Debug)]
pub struct CharacteristicDef;

/// Table builder used to define services, characteristics, and descriptors.
/// Definition errors do not interrupt the build. The first one is returned by
/// [`Builder::freeze`].
#[derive(Debug)]
#[repr(transparent)]
pub struct Builder<T>(TableBuilder, PhantomData<T>);

/// Shared builder state.
#[derive(Debug)]
#[doc(hidden)]
pub struct TableBuilder {
    svc: Vec<Service>,
    attr: Vec<Attr>,
    next: Option<Handle>,
    err: Option<Error>,
}

impl TableBuilder {
    /// Allocates the next handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle space is exhausted.
    fn next_handle(&mut self, at: Attr) -> Handle {
        let hdl = self.next.expect("maximum handle reached");
        self.next = hdl.next();
        self.attr.push(at);
        hdl
    }

    /// Records a definition error unless an earlier one was already recorded.
    fn fail(&mut self, e: Error) {
        debug!("GATT table definition error: {e}");
        self.err.get_or_insert(e);
    }

    /// Returns the index of the current service.
    #[inline(always)]
    fn svc_idx(&self) -> usize {
        self.svc.len() - 1
    }

    /// Returns the current service.
    #[inline(always)]
    fn svc(&mut self) -> &mut Service {
        let i = self.svc_idx();
        &mut self.svc[i]
    }

    /// Returns the current characteristic.
    #[inline(always)]
    fn chr(&mut self) -> &mut Characteristic {
        let s = self.svc();
        let i = s.chars.len() - 1;
        &mut s.chars[i]
    }

    /// Returns the builder for a nested definition.
    #[inline(always)]
    fn builder<T>(&mut self) -> &mut Builder<T> {
        // SAFETY: Builder is a transparent wrapper around TableBuilder
        unsafe { &mut *(self as *mut Self).cast() }
    }
}

impl<T> Deref for Builder<T> {
    type Target = TableBuilder;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for Builder<T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Builder<Table> {
    /// Creates a new table builder.
    #[inline]
    #[must_use]
    pub(super) fn new() -> Self {
        Self(
            TableBuilder {
                svc: Vec::new(),
                attr: Vec::with_capacity(32),
                next: Some(Handle::MIN),
                err: None,
            },
            PhantomData,
        )
    }

    /// Validates and returns the final read-only table.
    pub fn freeze(self) -> Result<Table> {
        let b = self.0;
        if let Some(e) = b.err {
            return Err(e);
        }
        Ok(Table {
            svc: b.svc.into_boxed_slice(),
            attr: b.attr.into_boxed_slice(),
        })
    }

    /// Defines a primary service ([Vol 3] Part G, Section 3.1) and calls `f`
    /// to define its characteristics.
    pub fn primary_service<T>(
        &mut self,
        uuid: impl Into<Uuid>,
        f: impl FnOnce(&mut Builder<ServiceDef>) -> T,
    ) -> (Handle, T) {
        let uuid = uuid.into();
        if self.svc.iter().any(|s| s.uuid == uuid) {
            self.fail(Error::DuplicateUuid(uuid));
        }
        let i = self.svc.len();
        let hdl = self.next_handle(Attr::Service(i));
        self.svc.push(Service {
            uuid,
            hdl,
            end: hdl,
            chars: Vec::new(),
        });
        let v = f(self.builder());
        let end = (self.svc().chars.last())
            .map_or(hdl, |c| c.descs.last().map_or(c.hdl, |d| d.hdl));
        self.svc().end = end;
        (hdl, v)
    }
}

impl Builder<ServiceDef> {
    /// Defines a characteristic ([Vol 3] Part G, Section 3.3) and calls `f` to
    /// define its value, callbacks, and descriptors. Returns the value handle.
    ///
    /// A Client Characteristic Configuration descriptor is added automatically
    /// if `props` contains `NOTIFY` or `INDICATE` and `f` does not declare one.
    pub fn characteristic<T>(
        &mut self,
        uuid: impl Into<Uuid>,
        props: Prop,
        f: impl FnOnce(&mut Builder<CharacteristicDef>) -> T,
    ) -> (Handle, T) {
        let uuid = uuid.into();
        if self.svc().chars.iter().any(|c| c.uuid == uuid) {
            self.fail(Error::DuplicateUuid(uuid));
        }
        let (s, c) = (self.svc_idx(), self.svc().chars.len());
        let decl = self.next_handle(Attr::Declaration(s, c));
        let hdl = self.next_handle(Attr::Value(s, c));
        self.svc().chars.push(Characteristic {
            uuid,
            decl,
            hdl,
            props,
            val: RwLock::default(),
            descs: Vec::new(),
            cccd: None,
            read: None,
            write: None,
        });
        let b = self.builder::<CharacteristicDef>();
        let v = f(b);
        b.finalize();
        (hdl, v)
    }
}

impl Builder<CharacteristicDef> {
    /// Sets the initial stored value.
    pub fn value(&mut self, v: impl AsRef<[u8]>) -> &mut Self {
        *self.chr().val.get_mut() = v.as_ref().to_vec();
        self
    }

    /// Sets the read callback. Reads without a callback return the stored
    /// value.
    pub fn on_read(&mut self, io: impl Into<ReadIo>) -> &mut Self {
        self.chr().read = Some(io.into());
        self
    }

    /// Sets the write callback. Writes without a callback replace the stored
    /// value.
    pub fn on_write(&mut self, io: impl Into<WriteIo>) -> &mut Self {
        self.chr().write = Some(io.into());
        self
    }

    /// Declares a characteristic descriptor with a static read-only value
    /// ([Vol 3] Part G, Section 3.3.3). A CCCD UUID is equivalent to calling
    /// [`Self::client_cfg`] and the value is ignored.
    pub fn descriptor(&mut self, uuid: impl Into<Uuid>, val: impl AsRef<[u8]>) -> Handle {
        let uuid = uuid.into();
        if uuid == Desc::ClientCharacteristicConfiguration {
            return self.client_cfg();
        }
        let c = self.chr();
        if c.descs.iter().any(|d| d.uuid == uuid) {
            let chr = c.uuid;
            self.fail(Error::InvalidDescriptor {
                chr,
                uuid,
                reason: "duplicate descriptor",
            });
        }
        self.push_desc(uuid, val.as_ref().to_vec())
    }

    /// Declares a Client Characteristic Configuration descriptor
    /// ([Vol 3] Part G, Section 3.3.3.3).
    pub fn client_cfg(&mut self) -> Handle {
        let uuid = Desc::ClientCharacteristicConfiguration.uuid();
        let c = self.chr();
        let (chr, props, have) = (c.uuid, c.props, c.cccd.is_some());
        if !props.is_pushable() {
            self.fail(Error::InvalidDescriptor {
                chr,
                uuid,
                reason: "characteristic does not support notifications or indications",
            });
        } else if have {
            self.fail(Error::InvalidDescriptor {
                chr,
                uuid,
                reason: "duplicate descriptor",
            });
        }
        let hdl = self.push_desc(uuid, Vec::new());
        self.chr().cccd.get_or_insert(hdl);
        hdl
    }

    /// Appends a descriptor to the current characteristic.
    fn push_desc(&mut self, uuid: Uuid, val: Vec<u8>) -> Handle {
        let s = self.svc_idx();
        let c = self.svc().chars.len() - 1;
        let d = self.chr().descs.len();
        let hdl = self.next_handle(Attr::Descriptor(s, c, d));
        self.chr().descs.push(Descriptor { uuid, hdl, val });
        hdl
    }

    /// Adds a missing CCCD and verifies that callbacks match the properties.
    fn finalize(&mut self) {
        let c = self.chr();
        let (chr, props) = (c.uuid, c.props);
        if props.is_pushable() && c.cccd.is_none() {
            self.client_cfg();
        }
        let c = self.chr();
        if c.read.is_some() && !props.contains(Prop::READ) {
            self.fail(Error::InvalidHandler {
                chr,
                access: Access::Read,
            });
        }
        let c = self.chr();
        if c.write.is_some() && !props.is_writable() {
            self.fail(Error::InvalidHandler {
                chr,
                access: Access::Write,
            });
        }
    }
}
