use scursor::{ReadCursor, WriteCursor};

use crate::error::InternalError;
use crate::frame::pdu;
use crate::frame::pdu::{Decoded, ResponseMismatch};
use crate::frame::TxId;
use crate::param::Parameter;

pub(crate) mod constants {
    /// transaction id + protocol id + length + unit id
    pub(crate) const HEADER_LENGTH: usize = 7;
    /// no MBAP frame is shorter than this
    pub(crate) const MIN_FRAME_LENGTH: usize = 8;
    /// the length field counts every byte from the unit id onward
    pub(crate) const LENGTH_FIELD_BASE: usize = 6;
}

/// Result of validating an MBAP header against an accumulating buffer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MbapCheck {
    /// more data is required, keep buffering
    Incomplete,
    /// the buffer carries more bytes than the header declares, discard it
    Incorrect,
    /// the buffer holds exactly the declared frame, with the parsed transaction id
    Complete(u16),
}

/// Format a Modbus TCP request frame for the parameter.
///
/// Prepends the 7-byte MBAP header: transaction id, protocol id (always 0), the length of
/// everything from the unit id onward, and the unit id. No CRC; TCP frames are delimited
/// by the length field.
///
/// Returns the number of bytes written.
pub fn format_request(
    param: &Parameter,
    tx_id: TxId,
    out: &mut [u8],
) -> Result<usize, InternalError> {
    if out.len() < constants::HEADER_LENGTH {
        return Err(InternalError::InsufficientWriteSpace);
    }
    let (header, body) = out.split_at_mut(constants::HEADER_LENGTH);

    let pdu_length = {
        let mut cursor = WriteCursor::new(body);
        pdu::format_request(param, &mut cursor)?;
        cursor.position()
    };

    let mut cursor = WriteCursor::new(header);
    cursor.write_u16_be(tx_id.to_u16())?;
    cursor.write_u16_be(0)?;
    cursor.write_u16_be((pdu_length + 1) as u16)?;
    cursor.write_u8(param.device_address())?;

    Ok(constants::HEADER_LENGTH + pdu_length)
}

/// Validate the MBAP header of an accumulating buffer.
///
/// Requires at least 8 bytes. The length field must equal the buffer length minus 6
/// exactly: a buffer larger than declared is `Incorrect`, a smaller one is `Incomplete`.
pub fn validate(buf: &[u8]) -> MbapCheck {
    if buf.len() < constants::MIN_FRAME_LENGTH {
        return MbapCheck::Incomplete;
    }

    let tx_id = ((buf[0] as u16) << 8) | buf[1] as u16;
    let length = ((buf[4] as u16) << 8) | buf[5] as u16;
    let declared = length as usize;
    let actual = buf.len() - constants::LENGTH_FIELD_BASE;

    if declared == actual {
        MbapCheck::Complete(tx_id)
    } else if declared < actual {
        MbapCheck::Incorrect
    } else {
        MbapCheck::Incomplete
    }
}

/// Decode a complete MBAP response frame against the in-flight parameter.
///
/// Re-validates the length field, filters by the unit id, then decodes the PDU.
pub(crate) fn decode_response<'a>(
    param: &Parameter,
    buf: &'a [u8],
) -> Result<Decoded<'a>, ResponseMismatch> {
    if buf.len() < constants::MIN_FRAME_LENGTH {
        return Err(ResponseMismatch::TooShort);
    }

    let mut cursor = ReadCursor::new(buf);
    let _tx_id = cursor.read_u16_be()?;
    let _protocol_id = cursor.read_u16_be()?;
    let length = cursor.read_u16_be()? as usize;
    let unit_id = cursor.read_u8()?;

    if length != buf.len() - constants::LENGTH_FIELD_BASE {
        return Err(ResponseMismatch::LengthField);
    }
    if unit_id != param.device_address() {
        return Err(ResponseMismatch::DeviceAddress(unit_id));
    }

    pdu::decode_response(param, &buf[constants::HEADER_LENGTH..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::ExceptionCode;
    use crate::param::{FunctionCode, PollingMode};

    //                                  |   tx id  |  proto id |  length  | unit | fc | reg adr  |   count  |
    const READ_REQUEST: &[u8] = &[0x00, 0x07, 0x00, 0x00, 0x00, 0x06, 0x2A, 0x03, 0x00, 0x10, 0x00, 0x02];

    //                                   |   tx id  |  proto id |  length  | unit | fc | bc |     values      |
    const READ_RESPONSE: &[u8] = &[0x00, 0x07, 0x00, 0x00, 0x00, 0x07, 0x2A, 0x03, 0x04, 0x12, 0x34, 0x56, 0x78];

    fn read_param() -> Parameter {
        Parameter::new(
            0x2A,
            FunctionCode::ReadHoldingRegisters,
            0x0010,
            2,
            PollingMode::AlwaysPolling,
        )
        .unwrap()
    }

    #[test]
    fn formats_read_request_with_mbap_header() {
        let param = read_param();
        let mut buffer = [0u8; 260];
        let len = format_request(&param, TxId::new(0x0007), &mut buffer).unwrap();
        assert_eq!(&buffer[..len], READ_REQUEST);
    }

    #[test]
    fn validates_exact_length_match() {
        assert_eq!(validate(READ_RESPONSE), MbapCheck::Complete(0x0007));
    }

    #[test]
    fn undersized_buffer_is_incomplete() {
        assert_eq!(validate(&READ_RESPONSE[..7]), MbapCheck::Incomplete);
        assert_eq!(validate(&READ_RESPONSE[..10]), MbapCheck::Incomplete);
    }

    #[test]
    fn oversized_buffer_is_incorrect() {
        // header declares length 5 but 7 bytes follow the length field: the declared
        // frame ends before the buffer does, so the buffer cannot be a single frame
        let frame: &[u8] = &[
            0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x2A, 0x03, 0x02, 0x00, 0x0A, 0x00, 0x14,
        ];
        assert_eq!(validate(frame), MbapCheck::Incorrect);
    }

    #[test]
    fn decodes_read_response_into_value_bytes() {
        let param = read_param();
        assert_eq!(
            decode_response(&param, READ_RESPONSE).unwrap(),
            Decoded::Data(&[0x12, 0x34, 0x56, 0x78])
        );
    }

    #[test]
    fn rejects_response_for_other_unit() {
        let param = Parameter::new(
            0x2B,
            FunctionCode::ReadHoldingRegisters,
            0x0010,
            2,
            PollingMode::AlwaysPolling,
        )
        .unwrap();
        assert_eq!(
            decode_response(&param, READ_RESPONSE).unwrap_err(),
            ResponseMismatch::DeviceAddress(0x2A)
        );
    }

    #[test]
    fn decodes_exception_response() {
        let param = read_param();
        //                    |   tx id  |  proto id |  length  | unit |fc|80| ec |
        let frame: &[u8] = &[0x00, 0x07, 0x00, 0x00, 0x00, 0x03, 0x2A, 0x83, 0x02];
        assert_eq!(
            decode_response(&param, frame).unwrap(),
            Decoded::Exception(ExceptionCode::IllegalDataAddress)
        );
    }
}
