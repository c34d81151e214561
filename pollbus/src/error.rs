/// Errors that occur while constructing a [crate::param::Parameter]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InvalidParameter {
    /// Device address exceeds the Modbus limit of 247
    DeviceAddressTooBig(u8),
    /// Request contains a count of zero
    CountOfZero,
    /// Requested count exceeds the maximum allowed for the function code
    CountTooBig(u16, u16), // count / max
    /// Value written to the parameter does not match its derived byte size
    ValueSizeMismatch(usize, usize), // expected / actual
}

impl std::error::Error for InvalidParameter {}

impl std::fmt::Display for InvalidParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidParameter::DeviceAddressTooBig(addr) => {
                write!(f, "device address {addr} exceeds the maximum of 247")
            }
            InvalidParameter::CountOfZero => f.write_str("request contains a count of zero"),
            InvalidParameter::CountTooBig(count, max) => write!(
                f,
                "count of {count} exceeds maximum allowed count of {max} for this function code"
            ),
            InvalidParameter::ValueSizeMismatch(expected, actual) => write!(
                f,
                "value of {actual} bytes does not match the parameter size of {expected} bytes"
            ),
        }
    }
}

/// Errors returned by [crate::channel::Channel] control operations
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Operation requires the channel to be stopped, but polling is running
    Running,
    /// Operation requires the channel to be started, but polling is stopped
    Stopped,
}

impl std::error::Error for ChannelError {}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Running => f.write_str("polling is running"),
            ChannelError::Stopped => f.write_str("polling is stopped"),
        }
    }
}

/// Errors that should never occur and indicate a bug in the library
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InternalError {
    /// Insufficient space in the write buffer
    InsufficientWriteSpace,
    /// Attempted to read past the end of a buffer
    BadRead,
    /// Cursor seek operation exceeded the bounds of the underlying buffer
    BadSeekOperation,
}

impl std::error::Error for InternalError {}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InternalError::InsufficientWriteSpace => {
                f.write_str("insufficient space for write operation")
            }
            InternalError::BadRead => f.write_str("attempted to read past the end of a buffer"),
            InternalError::BadSeekOperation => {
                f.write_str("cursor seek operation exceeded the bounds of the underlying buffer")
            }
        }
    }
}

impl From<scursor::WriteError> for InternalError {
    fn from(_: scursor::WriteError) -> Self {
        InternalError::InsufficientWriteSpace
    }
}

impl From<scursor::ReadError> for InternalError {
    fn from(_: scursor::ReadError) -> Self {
        InternalError::BadRead
    }
}
