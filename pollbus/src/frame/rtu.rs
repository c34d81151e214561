use scursor::{ReadCursor, WriteCursor};

use crate::error::InternalError;
use crate::frame::pdu;
use crate::frame::pdu::{Decoded, ResponseMismatch};
use crate::param::{byte_size_for, FunctionCode, Parameter};

pub(crate) mod constants {
    /// device address prefix
    pub(crate) const HEADER_LENGTH: usize = 1;
    /// trailing CRC16
    pub(crate) const CRC_LENGTH: usize = 2;
    /// no RTU frame is shorter than this
    pub(crate) const MIN_FRAME_LENGTH: usize = 4;
    /// address + fcode + register + count + byte count + crc for a multi-write request
    pub(crate) const MIN_MULTI_WRITE_LENGTH: usize = 10;
    /// overhead of a multi-write request around its data: addr + fcode + reg + count + bc + crc
    pub(crate) const MULTI_WRITE_OVERHEAD: usize = 9;
    /// fixed size of a read or single/multi write request frame
    pub(crate) const REQUEST_LENGTH: usize = 8;
    /// fixed size of a write response echo
    pub(crate) const WRITE_RESPONSE_LENGTH: usize = 8;
    /// fixed size of an exception response
    pub(crate) const EXCEPTION_RESPONSE_LENGTH: usize = 5;
    /// overhead of a read response around its data: addr + fcode + byte count + crc
    pub(crate) const READ_RESPONSE_OVERHEAD: usize = 5;
}

/// precomputes the CRC table as a constant!
const CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);

/// Standard Modbus CRC16: polynomial 0xA001 (reflected), initial value 0xFFFF.
///
/// Appended to frames low-byte-first.
pub fn crc16(bytes: &[u8]) -> u16 {
    CRC.checksum(bytes)
}

/// Result of checking a buffer that should contain a complete RTU frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RtuCheck {
    /// more data is required, keep buffering
    Incomplete,
    /// the frame is structurally broken and must be discarded
    Incorrect(RtuFrameError),
    /// a complete frame addressed by the contained device address (0 = broadcast)
    Device(u8),
}

/// Ways an RTU frame can be structurally broken
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RtuFrameError {
    /// frame length does not match any layout of its function code
    Size,
    /// frame carries more bytes than its declared count allows
    Overflow,
    /// CRC validation failed
    Crc,
}

impl std::fmt::Display for RtuFrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RtuFrameError::Size => f.write_str("frame size does not match its function code"),
            RtuFrameError::Overflow => f.write_str("frame exceeds its declared count"),
            RtuFrameError::Crc => f.write_str("CRC validation failure"),
        }
    }
}

/// Completeness pre-check of an accumulating response buffer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum FrameCheck {
    /// more data is required
    Incomplete,
    /// buffer is longer than any valid layout, discard it
    Incorrect,
    /// buffer holds exactly one candidate frame
    Complete,
}

/// Format an RTU request frame for the parameter: device address, PDU, CRC16 low-byte-first.
///
/// Returns the number of bytes written.
pub fn format_request(param: &Parameter, out: &mut [u8]) -> Result<usize, InternalError> {
    let mut cursor = WriteCursor::new(out);
    cursor.write_u8(param.device_address())?;
    pdu::format_request(param, &mut cursor)?;
    let end = cursor.position();
    let crc = CRC.checksum(cursor.get(0..end).ok_or(InternalError::BadSeekOperation)?);
    cursor.write_u16_le(crc)?;
    Ok(cursor.position())
}

/// Analyze a buffer that should contain a complete RTU request frame.
///
/// Requires at least 4 bytes. Multi-write requests require at least 10 bytes and their
/// declared register/coil count is cross-checked against the total frame length. The CRC
/// is validated last, over all bytes except the trailing two. On success returns the
/// parsed device address; 0 denotes a broadcast frame that expects no reply.
pub fn analyze_request(buf: &[u8]) -> RtuCheck {
    if buf.len() < constants::MIN_FRAME_LENGTH {
        return RtuCheck::Incomplete;
    }

    if let Some(
        function @ (FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters),
    ) = FunctionCode::get(buf[1])
    {
        if buf.len() < constants::MIN_MULTI_WRITE_LENGTH {
            return RtuCheck::Incomplete;
        }
        let count = ((buf[4] as u16) << 8) | buf[5] as u16;
        let expected = byte_size_for(function, count) + constants::MULTI_WRITE_OVERHEAD;
        if buf.len() < expected {
            return RtuCheck::Incomplete;
        }
        if buf.len() > expected {
            return RtuCheck::Incorrect(RtuFrameError::Overflow);
        }
    } else if buf.len() != constants::REQUEST_LENGTH {
        return RtuCheck::Incorrect(RtuFrameError::Size);
    }

    let body = &buf[..buf.len() - constants::CRC_LENGTH];
    let received = ((buf[buf.len() - 1] as u16) << 8) | buf[buf.len() - 2] as u16;
    if received != CRC.checksum(body) {
        return RtuCheck::Incorrect(RtuFrameError::Crc);
    }

    RtuCheck::Device(buf[0])
}

/// Completeness check of an accumulating client-side response buffer.
///
/// Sizes the expected frame from the response function code: read responses by their
/// byte-count field, write echoes and exception responses by their fixed layouts. A buffer
/// longer than the expected frame is `Incorrect`; an unknown function code passes through
/// so that decoding can fail it against the in-flight request.
pub(crate) fn check_response(buf: &[u8]) -> FrameCheck {
    if buf.len() < constants::MIN_FRAME_LENGTH {
        return FrameCheck::Incomplete;
    }

    let fcode = buf[1];
    if let Some(function) = FunctionCode::get(fcode) {
        let expected = if function.is_read() {
            buf[2] as usize + constants::READ_RESPONSE_OVERHEAD
        } else {
            constants::WRITE_RESPONSE_LENGTH
        };
        compare_length(buf.len(), expected)
    } else if FunctionCode::get(fcode & 0x7F).is_some() && fcode & 0x80 != 0 {
        compare_length(buf.len(), constants::EXCEPTION_RESPONSE_LENGTH)
    } else {
        // unknown function code, let the decoder reject it
        FrameCheck::Complete
    }
}

fn compare_length(actual: usize, expected: usize) -> FrameCheck {
    if actual == expected {
        FrameCheck::Complete
    } else if actual > expected {
        FrameCheck::Incorrect
    } else {
        FrameCheck::Incomplete
    }
}

/// Decode a complete RTU response frame against the in-flight parameter.
///
/// Validates the CRC, filters by the in-frame device address, then decodes the PDU.
pub(crate) fn decode_response<'a>(
    param: &Parameter,
    buf: &'a [u8],
) -> Result<Decoded<'a>, ResponseMismatch> {
    if buf.len() < constants::MIN_FRAME_LENGTH {
        return Err(ResponseMismatch::TooShort);
    }

    let mut cursor = ReadCursor::new(buf);
    let body = cursor.read_bytes(buf.len() - constants::CRC_LENGTH)?;
    let crc_lo = cursor.read_u8()? as u16;
    let crc_hi = cursor.read_u8()? as u16;
    if (crc_hi << 8) | crc_lo != CRC.checksum(body) {
        return Err(ResponseMismatch::Crc);
    }

    let address = body[0];
    if address != param.device_address() {
        return Err(ResponseMismatch::DeviceAddress(address));
    }

    pdu::decode_response(param, &body[constants::HEADER_LENGTH..])
}
