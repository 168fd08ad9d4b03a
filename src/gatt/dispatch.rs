use tracing::{trace, warn};

use crate::host::Transport;

use super::server::Conn;
use super::*;

impl<T: Transport> Server<T> {
    /// Reads attribute `hdl` on behalf of connection `cn`. Declarations and
    /// static descriptors are answered from the table, the CCCD from the
    /// connection's subscription state, and characteristic values by the read
    /// callback or the stored value.
    pub async fn handle_read(&self, cn: ConnId, hdl: Handle) -> Result<Vec<u8>> {
        let conn = self.active(cn)?;
        let r = self.read(&conn, cn, hdl).await;
        match r {
            Ok(ref v) => trace!("{cn} read {hdl}: {} byte(s)", v.len()),
            Err(ref e) => log_err(cn, hdl, Access::Read, e),
        }
        r
    }

    /// Writes attribute `hdl` on behalf of connection `cn`. `rsp` is `true`
    /// for `ATT_WRITE_REQ` and `false` for `ATT_WRITE_CMD`.
    pub async fn handle_write(&self, cn: ConnId, hdl: Handle, val: &[u8], rsp: bool) -> Result<()> {
        let conn = self.active(cn)?;
        let r = self.write(&conn, cn, hdl, val, rsp).await;
        match r {
            Ok(()) => trace!("{cn} wrote {hdl}: {} byte(s)", val.len()),
            Err(ref e) => log_err(cn, hdl, Access::Write, e),
        }
        r
    }

    async fn read(&self, conn: &Conn, cn: ConnId, hdl: Handle) -> Result<Vec<u8>> {
        match self.table.lookup(hdl)? {
            AttributeRef::Service(s) => Ok(s.decl_value()),
            AttributeRef::Declaration(c) => Ok(c.decl_value()),
            AttributeRef::Descriptor(c, d) if d.is_cccd() => {
                Ok(cccd_value(conn, c.handle()).to_le_bytes().to_vec())
            }
            AttributeRef::Descriptor(_, d) => Ok(d.value().to_vec()),
            AttributeRef::Value(c) => {
                if !c.props().contains(Prop::READ) {
                    return Err(Error::PermissionDenied {
                        hdl,
                        access: Access::Read,
                    });
                }
                match c.read_io() {
                    Some(io) => {
                        let v = io.call(ReadReq { cn, hdl, uuid: c.uuid() }).await?;
                        if v.len() > self.cfg.max_value_len {
                            return Err(Error::InvalidValueLength { hdl, len: v.len() });
                        }
                        Ok(v)
                    }
                    None => Ok(c.value()),
                }
            }
        }
    }

    async fn write(&self, conn: &Conn, cn: ConnId, hdl: Handle, val: &[u8], rsp: bool) -> Result<()> {
        if val.len() > self.cfg.max_value_len {
            return Err(Error::InvalidValueLength {
                hdl,
                len: val.len(),
            });
        }
        match self.table.lookup(hdl)? {
            AttributeRef::Descriptor(c, d) if d.is_cccd() => {
                let &[lo, hi] = val else {
                    return Err(Error::InvalidValueLength {
                        hdl,
                        len: val.len(),
                    });
                };
                self.subscribe(conn, c, u16::from_le_bytes([lo, hi]))?;
                Ok(())
            }
            AttributeRef::Value(c) => {
                let props = c.props();
                if !props.is_writable() {
                    return Err(Error::PermissionDenied {
                        hdl,
                        access: Access::Write,
                    });
                }
                if rsp && !props.contains(Prop::WRITE) {
                    return Err(Error::ProtocolViolation {
                        hdl,
                        reason: "write request without the write property",
                    });
                }
                if !rsp && !props.contains(Prop::WRITE_WITHOUT_RESPONSE) {
                    return Err(Error::ProtocolViolation {
                        hdl,
                        reason: "write command without the write-without-response property",
                    });
                }
                match c.write_io() {
                    Some(io) => io.call(cn, hdl, c.uuid(), val, rsp).await,
                    None => {
                        c.set_value(val);
                        Ok(())
                    }
                }
            }
            _ => Err(Error::PermissionDenied {
                hdl,
                access: Access::Write,
            }),
        }
    }
}

/// Returns the CCCD value of connection `conn` for characteristic `hdl`.
#[inline]
fn cccd_value(conn: &Conn, hdl: Handle) -> u16 {
    conn.lock().subs.bits(hdl)
}

/// Logs a failed request. Callback error details stay on the server.
fn log_err(cn: ConnId, hdl: Handle, access: Access, e: &Error) {
    match *e {
        Error::HandlerError(ref d) => warn!("{access} callback for {hdl} failed for {cn}: {d}"),
        _ => warn!("{access} of {hdl} by {cn} failed: {e}"),
    }
}
