use crate::constants::limits;
use crate::error::InvalidParameter;
use crate::exception::ExceptionCode;

mod constants {
    pub(crate) const READ_COILS: u8 = 1;
    pub(crate) const READ_DISCRETE_INPUTS: u8 = 2;
    pub(crate) const READ_HOLDING_REGISTERS: u8 = 3;
    pub(crate) const READ_INPUT_REGISTERS: u8 = 4;
    pub(crate) const WRITE_SINGLE_COIL: u8 = 5;
    pub(crate) const WRITE_SINGLE_REGISTER: u8 = 6;
    pub(crate) const WRITE_MULTIPLE_COILS: u8 = 15;
    pub(crate) const WRITE_MULTIPLE_REGISTERS: u8 = 16;
}

/// Identifier of a parameter within a registry, assigned by the caller and never reused
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamId {
    /// underlying raw value
    pub value: u32,
}

impl ParamId {
    /// create an id from its raw value
    pub fn new(value: u32) -> Self {
        ParamId { value }
    }
}

impl std::fmt::Display for ParamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Modbus function codes supported by the polling client
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    /// Read a contiguous range of coils (0x01)
    ReadCoils = constants::READ_COILS,
    /// Read a contiguous range of discrete inputs (0x02)
    ReadDiscreteInputs = constants::READ_DISCRETE_INPUTS,
    /// Read a contiguous range of holding registers (0x03)
    ReadHoldingRegisters = constants::READ_HOLDING_REGISTERS,
    /// Read a contiguous range of input registers (0x04)
    ReadInputRegisters = constants::READ_INPUT_REGISTERS,
    /// Write a single coil (0x05)
    WriteSingleCoil = constants::WRITE_SINGLE_COIL,
    /// Write a single register (0x06)
    WriteSingleRegister = constants::WRITE_SINGLE_REGISTER,
    /// Write multiple coils (0x0F)
    WriteMultipleCoils = constants::WRITE_MULTIPLE_COILS,
    /// Write multiple registers (0x10)
    WriteMultipleRegisters = constants::WRITE_MULTIPLE_REGISTERS,
}

impl FunctionCode {
    /// raw value of the function code on the wire
    pub const fn get_value(self) -> u8 {
        self as u8
    }

    /// value of the function code in an exception response
    pub const fn as_error(self) -> u8 {
        self.get_value() | 0x80
    }

    /// try to resolve a raw function code value
    pub fn get(value: u8) -> Option<Self> {
        match value {
            constants::READ_COILS => Some(FunctionCode::ReadCoils),
            constants::READ_DISCRETE_INPUTS => Some(FunctionCode::ReadDiscreteInputs),
            constants::READ_HOLDING_REGISTERS => Some(FunctionCode::ReadHoldingRegisters),
            constants::READ_INPUT_REGISTERS => Some(FunctionCode::ReadInputRegisters),
            constants::WRITE_SINGLE_COIL => Some(FunctionCode::WriteSingleCoil),
            constants::WRITE_SINGLE_REGISTER => Some(FunctionCode::WriteSingleRegister),
            constants::WRITE_MULTIPLE_COILS => Some(FunctionCode::WriteMultipleCoils),
            constants::WRITE_MULTIPLE_REGISTERS => Some(FunctionCode::WriteMultipleRegisters),
            _ => None,
        }
    }

    /// true if the function reads values from the device
    pub fn is_read(self) -> bool {
        matches!(
            self,
            FunctionCode::ReadCoils
                | FunctionCode::ReadDiscreteInputs
                | FunctionCode::ReadHoldingRegisters
                | FunctionCode::ReadInputRegisters
        )
    }

    /// true if the function writes values to the device
    pub fn is_write(self) -> bool {
        !self.is_read()
    }

    /// true if the function addresses single bits rather than 16-bit registers
    pub fn is_bit_addressed(self) -> bool {
        matches!(
            self,
            FunctionCode::ReadCoils
                | FunctionCode::ReadDiscreteInputs
                | FunctionCode::WriteSingleCoil
                | FunctionCode::WriteMultipleCoils
        )
    }

    fn max_count(self) -> u16 {
        match self {
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => {
                limits::MAX_READ_COILS_COUNT
            }
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
                limits::MAX_READ_REGISTERS_COUNT
            }
            FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => 1,
            FunctionCode::WriteMultipleCoils => limits::MAX_WRITE_COILS_COUNT,
            FunctionCode::WriteMultipleRegisters => limits::MAX_WRITE_REGISTERS_COUNT,
        }
    }
}

impl std::fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionCode::ReadCoils => write!(f, "READ COILS ({:#04X})", self.get_value()),
            FunctionCode::ReadDiscreteInputs => {
                write!(f, "READ DISCRETE INPUTS ({:#04X})", self.get_value())
            }
            FunctionCode::ReadHoldingRegisters => {
                write!(f, "READ HOLDING REGISTERS ({:#04X})", self.get_value())
            }
            FunctionCode::ReadInputRegisters => {
                write!(f, "READ INPUT REGISTERS ({:#04X})", self.get_value())
            }
            FunctionCode::WriteSingleCoil => {
                write!(f, "WRITE SINGLE COIL ({:#04X})", self.get_value())
            }
            FunctionCode::WriteSingleRegister => {
                write!(f, "WRITE SINGLE REGISTER ({:#04X})", self.get_value())
            }
            FunctionCode::WriteMultipleCoils => {
                write!(f, "WRITE MULTIPLE COILS ({:#04X})", self.get_value())
            }
            FunctionCode::WriteMultipleRegisters => {
                write!(f, "WRITE MULTIPLE REGISTERS ({:#04X})", self.get_value())
            }
        }
    }
}

/// Per-parameter polling behavior
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PollingMode {
    /// Skip this parameter every cycle
    NoPolling,
    /// Poll this parameter every cycle
    AlwaysPolling,
    /// Poll until a single response with no protocol error, then switch to [PollingMode::NoPolling]
    SetValueOnce,
}

/// Last protocol-level failure recorded on a parameter
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// The device returned a Modbus exception response
    Exception(ExceptionCode),
    /// The response did not match the request that produced it
    ResponseMismatch,
}

impl std::fmt::Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamError::Exception(code) => write!(f, "modbus exception: {code}"),
            ParamError::ResponseMismatch => f.write_str("response mismatch"),
        }
    }
}

/// number of value bytes a request/response carries for the function code and count
pub(crate) fn byte_size_for(function: FunctionCode, count: u16) -> usize {
    match function {
        FunctionCode::ReadCoils
        | FunctionCode::ReadDiscreteInputs
        | FunctionCode::WriteMultipleCoils => (count as usize + 7) / 8,
        FunctionCode::ReadHoldingRegisters
        | FunctionCode::ReadInputRegisters
        | FunctionCode::WriteMultipleRegisters => count as usize * 2,
        FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => 2,
    }
}

/// A single polled value: the request definition, its raw value buffer, and its statistics.
///
/// The value buffer length is always exactly the byte size derived from the function code
/// and count. Changing the count reallocates the buffer zero-filled.
#[derive(Debug, Clone)]
pub struct Parameter {
    alias: String,
    device_address: u8,
    function: FunctionCode,
    register: u16,
    count: u16,
    value: Vec<u8>,
    mode: PollingMode,
    enabled: bool,
    saved_mode: PollingMode,
    requests: u32,
    responses: u32,
    errors: u32,
    timeouts: u32,
    last_error: Option<ParamError>,
}

impl Parameter {
    /// Create a parameter.
    ///
    /// `count` is the number of registers or coils addressed by the function code. Single
    /// write functions always address one item and ignore the requested count.
    pub fn new(
        device_address: u8,
        function: FunctionCode,
        register: u16,
        count: u16,
        mode: PollingMode,
    ) -> Result<Self, InvalidParameter> {
        if device_address > 247 {
            return Err(InvalidParameter::DeviceAddressTooBig(device_address));
        }
        let count = match function {
            FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => 1,
            _ => count,
        };
        if count == 0 {
            return Err(InvalidParameter::CountOfZero);
        }
        if count > function.max_count() {
            return Err(InvalidParameter::CountTooBig(count, function.max_count()));
        }
        Ok(Self {
            alias: String::new(),
            device_address,
            function,
            register,
            count,
            value: vec![0; byte_size_for(function, count)],
            mode,
            enabled: true,
            saved_mode: mode,
            requests: 0,
            responses: 0,
            errors: 0,
            timeouts: 0,
            last_error: None,
        })
    }

    /// attach a human-readable label carried through events
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = alias.to_string();
        self
    }

    /// human-readable label
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// device (unit) address, 0 denotes broadcast
    pub fn device_address(&self) -> u8 {
        self.device_address
    }

    /// function code polled by this parameter
    pub fn function(&self) -> FunctionCode {
        self.function
    }

    /// starting register or coil address
    pub fn register(&self) -> u16 {
        self.register
    }

    /// number of registers or coils addressed
    pub fn count(&self) -> u16 {
        self.count
    }

    /// derived size of the value buffer in bytes
    pub fn byte_size(&self) -> usize {
        self.value.len()
    }

    /// raw value buffer, exactly [Parameter::byte_size] bytes
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// current polling mode
    pub fn mode(&self) -> PollingMode {
        self.mode
    }

    /// change the polling mode
    pub fn set_mode(&mut self, mode: PollingMode) {
        self.mode = mode;
        self.saved_mode = mode;
    }

    /// whether the parameter takes part in polling
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the parameter.
    ///
    /// Disabling remembers the polling mode, forces [PollingMode::NoPolling] and zeroes the
    /// statistics counters. Enabling restores the remembered mode.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.mode = self.saved_mode;
        } else {
            self.saved_mode = self.mode;
            self.mode = PollingMode::NoPolling;
            self.requests = 0;
            self.responses = 0;
            self.errors = 0;
            self.timeouts = 0;
        }
        self.enabled = enabled;
    }

    /// Change the register/coil count, reallocating the value buffer zero-filled
    pub fn set_count(&mut self, count: u16) -> Result<(), InvalidParameter> {
        if count == 0 {
            return Err(InvalidParameter::CountOfZero);
        }
        if count > self.function.max_count() {
            return Err(InvalidParameter::CountTooBig(count, self.function.max_count()));
        }
        self.count = count;
        self.value = vec![0; byte_size_for(self.function, count)];
        Ok(())
    }

    /// Set the value to be written by a write-type parameter.
    ///
    /// The slice length must equal the derived byte size exactly.
    pub fn set_value(&mut self, value: &[u8]) -> Result<(), InvalidParameter> {
        if value.len() != self.value.len() {
            return Err(InvalidParameter::ValueSizeMismatch(
                self.value.len(),
                value.len(),
            ));
        }
        self.value.copy_from_slice(value);
        Ok(())
    }

    /// number of requests transmitted for this parameter
    pub fn requests(&self) -> u32 {
        self.requests
    }

    /// number of valid responses received for this parameter
    pub fn responses(&self) -> u32 {
        self.responses
    }

    /// number of protocol errors and response mismatches recorded for this parameter
    pub fn errors(&self) -> u32 {
        self.errors
    }

    /// number of receive timeouts recorded for this parameter
    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    /// last protocol-level failure, cleared by the next valid response
    pub fn last_error(&self) -> Option<ParamError> {
        self.last_error
    }

    pub(crate) fn record_request(&mut self) {
        self.requests = self.requests.wrapping_add(1);
    }

    pub(crate) fn record_response(&mut self) {
        self.responses = self.responses.wrapping_add(1);
    }

    pub(crate) fn record_error(&mut self, error: ParamError) {
        self.errors = self.errors.wrapping_add(1);
        self.last_error = Some(error);
    }

    pub(crate) fn record_timeout(&mut self) {
        self.timeouts = self.timeouts.wrapping_add(1);
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub(crate) fn store_value(&mut self, data: &[u8]) {
        let count = data.len().min(self.value.len());
        self.value[..count].copy_from_slice(&data[..count]);
    }

    pub(crate) fn force_mode(&mut self, mode: PollingMode) {
        self.mode = mode;
    }

    /// Reset for a new polling run. Read-type parameters lose their value and counters;
    /// write-type parameters keep the pending value and their statistics.
    pub(crate) fn reset(&mut self) {
        if !self.function.is_write() {
            self.value.fill(0);
            self.requests = 0;
            self.responses = 0;
            self.errors = 0;
            self.timeouts = 0;
        }
        self.last_error = None;
    }

    /// owned copy of the parameter state for events
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            alias: self.alias.clone(),
            device_address: self.device_address,
            function: self.function,
            register: self.register,
            count: self.count,
            value: self.value.clone(),
            mode: self.mode,
            enabled: self.enabled,
            requests: self.requests,
            responses: self.responses,
            errors: self.errors,
            timeouts: self.timeouts,
            last_error: self.last_error,
        }
    }
}

/// Owned copy of a [Parameter] at the time an event was emitted
#[derive(Debug, Clone)]
pub struct ParamSnapshot {
    /// human-readable label
    pub alias: String,
    /// device (unit) address
    pub device_address: u8,
    /// function code
    pub function: FunctionCode,
    /// starting register or coil address
    pub register: u16,
    /// number of registers or coils addressed
    pub count: u16,
    /// raw value bytes
    pub value: Vec<u8>,
    /// polling mode at the time of the event
    pub mode: PollingMode,
    /// whether the parameter was enabled
    pub enabled: bool,
    /// requests transmitted
    pub requests: u32,
    /// valid responses received
    pub responses: u32,
    /// protocol errors and response mismatches
    pub errors: u32,
    /// receive timeouts
    pub timeouts: u32,
    /// last protocol-level failure
    pub last_error: Option<ParamError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_addressed_sizes_round_up_to_byte_boundary() {
        let param = Parameter::new(
            1,
            FunctionCode::ReadCoils,
            0,
            19,
            PollingMode::AlwaysPolling,
        )
        .unwrap();
        assert_eq!(param.byte_size(), 3);

        let param = Parameter::new(
            1,
            FunctionCode::ReadCoils,
            0,
            16,
            PollingMode::AlwaysPolling,
        )
        .unwrap();
        assert_eq!(param.byte_size(), 2);
    }

    #[test]
    fn register_sizes_are_twice_the_count() {
        let param = Parameter::new(
            1,
            FunctionCode::ReadHoldingRegisters,
            0,
            3,
            PollingMode::AlwaysPolling,
        )
        .unwrap();
        assert_eq!(param.byte_size(), 6);
    }

    #[test]
    fn single_writes_always_carry_two_bytes() {
        let param = Parameter::new(
            1,
            FunctionCode::WriteSingleRegister,
            0,
            42,
            PollingMode::SetValueOnce,
        )
        .unwrap();
        assert_eq!(param.count(), 1);
        assert_eq!(param.byte_size(), 2);
    }

    #[test]
    fn count_change_reallocates_zero_filled() {
        let mut param = Parameter::new(
            1,
            FunctionCode::ReadHoldingRegisters,
            0,
            1,
            PollingMode::AlwaysPolling,
        )
        .unwrap();
        param.store_value(&[0xAB, 0xCD]);
        param.set_count(2).unwrap();
        assert_eq!(param.value(), &[0, 0, 0, 0]);
    }

    #[test]
    fn rejects_invalid_construction() {
        assert_eq!(
            Parameter::new(248, FunctionCode::ReadCoils, 0, 1, PollingMode::NoPolling)
                .unwrap_err(),
            InvalidParameter::DeviceAddressTooBig(248)
        );
        assert_eq!(
            Parameter::new(1, FunctionCode::ReadCoils, 0, 0, PollingMode::NoPolling).unwrap_err(),
            InvalidParameter::CountOfZero
        );
        assert_eq!(
            Parameter::new(
                1,
                FunctionCode::ReadHoldingRegisters,
                0,
                126,
                PollingMode::NoPolling
            )
            .unwrap_err(),
            InvalidParameter::CountTooBig(126, 125)
        );
    }

    #[test]
    fn disable_remembers_mode_and_clears_counters() {
        let mut param = Parameter::new(
            1,
            FunctionCode::ReadHoldingRegisters,
            0,
            1,
            PollingMode::AlwaysPolling,
        )
        .unwrap();
        param.record_request();
        param.set_enabled(false);
        assert_eq!(param.mode(), PollingMode::NoPolling);
        assert_eq!(param.requests(), 0);
        param.set_enabled(true);
        assert_eq!(param.mode(), PollingMode::AlwaysPolling);
    }
}
