use structbuf::{Pack, StructBuf, Unpacker};

use super::*;

/// Inbound client PDU handled by the GATT server.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Request<'a> {
    /// `ATT_READ_REQ` ([Vol 3] Part F, Section 3.4.4.3).
    Read { hdl: Handle },
    /// `ATT_WRITE_REQ` or `ATT_WRITE_CMD` ([Vol 3] Part F, Section 3.4.5.1
    /// and 3.4.5.3). `rsp` is false for the command form.
    Write {
        hdl: Handle,
        val: &'a [u8],
        rsp: bool,
    },
    /// `ATT_HANDLE_VALUE_CFM` ([Vol 3] Part F, Section 3.4.7.3).
    Confirm,
    /// Any other opcode, known or not.
    Unsupported(u8),
}

impl<'a> Request<'a> {
    /// Decodes a client PDU. Length errors are reported as malformed PDUs. A
    /// well-formed request that references handle 0x0000 fails with
    /// [`Error::InvalidHandle`].
    pub fn decode(pdu: &'a [u8]) -> Result<Self> {
        let Some(&raw) = pdu.first() else {
            return Err(Error::Empty);
        };
        let Ok(op) = Opcode::try_from(raw) else {
            return Ok(Self::Unsupported(raw));
        };
        let hdl = |pdu: &[u8]| {
            let mut p = Unpacker::new(&pdu[1..]);
            let hdl = p.u16();
            if !p.is_ok() {
                return Err(Error::Truncated(op));
            }
            Handle::new(hdl).ok_or(Error::InvalidHandle(op))
        };
        match op {
            Opcode::ReadReq => {
                if pdu.len() != 3 {
                    return Err(Error::Truncated(op));
                }
                Ok(Self::Read { hdl: hdl(pdu)? })
            }
            Opcode::WriteReq | Opcode::WriteCmd => {
                let hdl = hdl(pdu)?;
                let val = pdu.get(3..).unwrap_or_default();
                Ok(Self::Write {
                    hdl,
                    val,
                    rsp: op == Opcode::WriteReq,
                })
            }
            Opcode::HandleValueCfm => {
                if pdu.len() != 1 {
                    return Err(Error::Truncated(op));
                }
                Ok(Self::Confirm)
            }
            _ => Ok(Self::Unsupported(raw)),
        }
    }
}

/// Returns an `ATT_READ_RSP` PDU ([Vol 3] Part F, Section 3.4.4.4).
#[must_use]
pub fn read_rsp(val: &[u8]) -> StructBuf {
    pack(Opcode::ReadRsp, 1 + val.len(), |b| {
        b.append().put(val);
    })
}

/// Returns an `ATT_WRITE_RSP` PDU ([Vol 3] Part F, Section 3.4.5.2).
#[must_use]
pub fn write_rsp() -> StructBuf {
    pack(Opcode::WriteRsp, 1, |_| {})
}

/// Returns an `ATT_ERROR_RSP` PDU ([Vol 3] Part F, Section 3.4.1.1).
#[must_use]
pub fn error_rsp(e: ErrorRsp) -> StructBuf {
    pack(Opcode::ErrorRsp, 5, |b| {
        b.append().u8(e.req).u16(e.hdl.map_or(0, u16::from)).u8(e.err);
    })
}

/// Returns an `ATT_HANDLE_VALUE_NTF` PDU ([Vol 3] Part F, Section 3.4.7.1).
#[must_use]
pub fn handle_value_ntf(hdl: Handle, val: &[u8]) -> StructBuf {
    pack(Opcode::HandleValueNtf, 3 + val.len(), |b| {
        b.append().u16(hdl).put(val);
    })
}

/// Returns an `ATT_HANDLE_VALUE_IND` PDU ([Vol 3] Part F, Section 3.4.7.2).
#[must_use]
pub fn handle_value_ind(hdl: Handle, val: &[u8]) -> StructBuf {
    pack(Opcode::HandleValueInd, 3 + val.len(), |b| {
        b.append().u16(hdl).put(val);
    })
}

/// Returns a new PDU of exactly `n` bytes, calling `f` to encode the
/// parameters after writing the opcode.
#[inline]
fn pack(op: Opcode, n: usize, f: impl FnOnce(&mut StructBuf)) -> StructBuf {
    let mut b = StructBuf::new(n);
    b.append().u8(op);
    f(&mut b);
    debug_assert_eq!(b.as_ref().len(), n);
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdl(h: u16) -> Handle {
        Handle::new(h).unwrap()
    }

    #[test]
    fn decode_requests() {
        assert_eq!(
            Request::decode(&[0x0A, 0x03, 0x00]),
            Ok(Request::Read { hdl: hdl(3) })
        );
        assert_eq!(
            Request::decode(&[0x12, 0x04, 0x00, 0x01, 0x00]),
            Ok(Request::Write {
                hdl: hdl(4),
                val: &[0x01, 0x00],
                rsp: true
            })
        );
        assert_eq!(
            Request::decode(&[0x52, 0x03, 0x00]),
            Ok(Request::Write {
                hdl: hdl(3),
                val: &[],
                rsp: false
            })
        );
        assert_eq!(Request::decode(&[0x1E]), Ok(Request::Confirm));
        assert_eq!(Request::decode(&[0x02, 0x17, 0x00]), Ok(Request::Unsupported(0x02)));
        assert_eq!(Request::decode(&[0xF0]), Ok(Request::Unsupported(0xF0)));
    }

    #[test]
    fn decode_malformed() {
        assert_eq!(Request::decode(&[]), Err(Error::Empty));
        assert_eq!(
            Request::decode(&[0x0A, 0x03]),
            Err(Error::Truncated(Opcode::ReadReq))
        );
        assert_eq!(
            Request::decode(&[0x0A, 0x03, 0x00, 0x00]),
            Err(Error::Truncated(Opcode::ReadReq))
        );
        assert_eq!(
            Request::decode(&[0x12, 0x01]),
            Err(Error::Truncated(Opcode::WriteReq))
        );
        assert_eq!(
            Request::decode(&[0x12, 0x00, 0x00, 0xFF]),
            Err(Error::InvalidHandle(Opcode::WriteReq))
        );
        assert_eq!(Request::decode(&[0x52]), Err(Error::Truncated(Opcode::WriteCmd)));
        assert_eq!(
            Request::decode(&[0x52, 0x03]),
            Err(Error::Truncated(Opcode::WriteCmd))
        );
    }

    #[test]
    fn encode_responses() {
        assert_eq!(read_rsp(b"hi").as_ref(), &[0x0B, b'h', b'i']);
        assert_eq!(write_rsp().as_ref(), &[0x13]);
        let e = ErrorRsp::new(0x0A, Some(hdl(0x0102)), ErrorCode::ReadNotPermitted);
        assert_eq!(error_rsp(e).as_ref(), &[0x01, 0x0A, 0x02, 0x01, 0x02]);
        assert_eq!(
            handle_value_ntf(hdl(3), b"hi").as_ref(),
            &[0x1B, 0x03, 0x00, b'h', b'i']
        );
        assert_eq!(handle_value_ind(hdl(3), &[]).as_ref(), &[0x1D, 0x03, 0x00]);
    }
}
