use scursor::{ReadCursor, WriteCursor};

use crate::error::InternalError;
use crate::exception::ExceptionCode;
use crate::param::{FunctionCode, Parameter};

pub(crate) mod constants {
    /// function code + exception code
    pub(crate) const EXCEPTION_LENGTH: usize = 2;
    /// write echo: function code + register address + count or value
    pub(crate) const WRITE_ECHO_LENGTH: usize = 5;
}

/// Successfully decoded response payload, to be applied to the parameter by the session
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Decoded<'a> {
    /// read response carrying exactly the parameter's byte size of data
    Data(&'a [u8]),
    /// exception response carrying the device's error code
    Exception(ExceptionCode),
    /// write response echoing the request
    WriteEcho,
}

/// Reasons a structurally complete response failed to match the in-flight request
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ResponseMismatch {
    TooShort,
    Crc,
    DeviceAddress(u8),
    LengthField,
    FunctionCode(u8),
    ByteCount(usize),
    EchoMismatch,
}

impl std::fmt::Display for ResponseMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseMismatch::TooShort => f.write_str("response is too short to be valid"),
            ResponseMismatch::Crc => f.write_str("CRC validation failure"),
            ResponseMismatch::DeviceAddress(addr) => {
                write!(f, "response from unexpected device address {addr}")
            }
            ResponseMismatch::LengthField => {
                f.write_str("declared length does not match the buffer")
            }
            ResponseMismatch::FunctionCode(fc) => {
                write!(f, "unexpected response function code {fc:#04X}")
            }
            ResponseMismatch::ByteCount(count) => {
                write!(f, "declared byte count of {count} does not match the request")
            }
            ResponseMismatch::EchoMismatch => {
                f.write_str("echoed register address does not match the request")
            }
        }
    }
}

impl From<scursor::ReadError> for ResponseMismatch {
    fn from(_: scursor::ReadError) -> Self {
        ResponseMismatch::TooShort
    }
}

/// Write the protocol data unit for the parameter's next request.
///
/// Layout: function code, register address, then a count field (reads), the raw value
/// (single writes), or count + byte count + payload (multiple writes).
pub(crate) fn format_request(
    param: &Parameter,
    cursor: &mut WriteCursor,
) -> Result<(), InternalError> {
    cursor.write_u8(param.function().get_value())?;
    cursor.write_u16_be(param.register())?;
    match param.function() {
        FunctionCode::ReadCoils
        | FunctionCode::ReadDiscreteInputs
        | FunctionCode::ReadHoldingRegisters
        | FunctionCode::ReadInputRegisters => {
            cursor.write_u16_be(param.count())?;
        }
        FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => {
            // the 2-byte value buffer is already in wire order
            for byte in param.value() {
                cursor.write_u8(*byte)?;
            }
        }
        FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters => {
            cursor.write_u16_be(param.count())?;
            cursor.write_u8(param.byte_size() as u8)?;
            for byte in param.value() {
                cursor.write_u8(*byte)?;
            }
        }
    }
    Ok(())
}

/// Decode a response PDU against the parameter that produced the in-flight request.
///
/// A 2-byte PDU is an exception response. Read responses must declare exactly the byte
/// count implied by the request; a mismatch is a hard failure, never a partial copy.
pub(crate) fn decode_response<'a>(
    param: &Parameter,
    pdu: &'a [u8],
) -> Result<Decoded<'a>, ResponseMismatch> {
    if pdu.len() < constants::EXCEPTION_LENGTH {
        return Err(ResponseMismatch::TooShort);
    }

    let mut cursor = ReadCursor::new(pdu);
    let fcode = cursor.read_u8()?;

    if pdu.len() == constants::EXCEPTION_LENGTH {
        if fcode != param.function().as_error() {
            return Err(ResponseMismatch::FunctionCode(fcode));
        }
        return Ok(Decoded::Exception(cursor.read_u8()?.into()));
    }

    if fcode != param.function().get_value() {
        return Err(ResponseMismatch::FunctionCode(fcode));
    }

    if param.function().is_read() {
        let byte_count = cursor.read_u8()? as usize;
        let remaining = cursor.remaining();
        let data = cursor.read_bytes(remaining)?;
        if byte_count != data.len() {
            return Err(ResponseMismatch::LengthField);
        }
        if byte_count != param.byte_size() {
            return Err(ResponseMismatch::ByteCount(byte_count));
        }
        Ok(Decoded::Data(data))
    } else {
        if pdu.len() != constants::WRITE_ECHO_LENGTH {
            return Err(ResponseMismatch::LengthField);
        }
        let register = cursor.read_u16_be()?;
        if register != param.register() {
            return Err(ResponseMismatch::EchoMismatch);
        }
        Ok(Decoded::WriteEcho)
    }
}
