pub(crate) mod worker;

#[cfg(feature = "serial")]
pub(crate) mod serial;
pub(crate) mod tcp;

use std::time::Duration;

/// Timing configuration of a polling worker.
///
/// All pauses and timeouts are independently configurable. The worker captures a copy at
/// start, so changes only apply to the next run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollTiming {
    /// limit on establishing a TCP connection
    pub connect_timeout: Duration,
    /// limit on the graceful TCP disconnect sequence
    pub disconnect_timeout: Duration,
    /// limit on writing a request to the transport
    pub transmit_timeout: Duration,
    /// limit on waiting for response bytes
    pub receive_timeout: Duration,
    /// delay after a completed cycle
    pub polling_pause: Duration,
    /// delay after an empty construct or an incomplete read
    pub skip_pause: Duration,
    /// extra delay after a structurally broken response
    pub error_pause: Duration,
    /// delay before a reconnect attempt
    pub reconnect_pause: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(10_000),
            disconnect_timeout: Duration::from_millis(20_000),
            transmit_timeout: Duration::from_millis(1_000),
            receive_timeout: Duration::from_millis(1_000),
            polling_pause: Duration::from_millis(50),
            skip_pause: Duration::from_millis(1),
            error_pause: Duration::from_millis(50),
            reconnect_pause: Duration::from_millis(2_000),
        }
    }
}
