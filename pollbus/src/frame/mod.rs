/// Modbus TCP (MBAP) framing
pub mod mbap;
/// Modbus RTU framing
pub mod rtu;

pub(crate) mod pdu;

pub(crate) mod constants {
    /// maximum protocol data unit size allowed by the Modbus specification
    pub(crate) const MAX_PDU_LENGTH: usize = 253;
    /// largest frame either framing can produce (MBAP header + PDU)
    pub(crate) const MAX_FRAME_LENGTH: usize =
        crate::frame::mbap::constants::HEADER_LENGTH + MAX_PDU_LENGTH;
}

/// Which framing a session speaks on the wire
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// RTU framing: device address prefix and CRC16 trailer
    Rtu,
    /// TCP framing: 7-byte MBAP header, no CRC
    Tcp,
}

/// Modbus TCP transaction identifier with natural u16 wraparound
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
pub struct TxId {
    value: u16,
}

impl TxId {
    /// create a transaction id from its raw value
    pub fn new(value: u16) -> Self {
        TxId { value }
    }

    /// raw value of the transaction id
    pub fn to_u16(self) -> u16 {
        self.value
    }

    /// return the current id and advance to the next one
    pub fn next(&mut self) -> TxId {
        let ret = self.value;
        self.value = self.value.wrapping_add(1);
        TxId::new(ret)
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_id_wraps_naturally() {
        let mut tx_id = TxId::new(u16::MAX);
        assert_eq!(tx_id.next(), TxId::new(u16::MAX));
        assert_eq!(tx_id.next(), TxId::new(0));
        assert_eq!(tx_id.next(), TxId::new(1));
    }
}
