pub use tokio_serial::{DataBits, FlowControl, Parity, StopBits};

/// Serial port settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerialSettings {
    /// baud rate of the port
    pub baud_rate: u32,
    /// number of data bits per character
    pub data_bits: DataBits,
    /// flow control mode
    pub flow_control: FlowControl,
    /// parity checking mode
    pub parity: Parity,
    /// number of stop bits per character
    pub stop_bits: StopBits,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

pub(crate) fn open(
    path: &str,
    settings: SerialSettings,
) -> Result<tokio_serial::SerialStream, tokio_serial::Error> {
    use tokio_serial::SerialPortBuilderExt;

    tokio_serial::new(path, settings.baud_rate)
        .data_bits(settings.data_bits)
        .flow_control(settings.flow_control)
        .parity(settings.parity)
        .stop_bits(settings.stop_bits)
        .open_native_async()
}
