use std::time::Duration;

use crate::param::{ParamId, ParamSnapshot};

/// Sending half of the event channel consumed by the application layer
pub type EventSender = tokio::sync::mpsc::UnboundedSender<PollEvent>;

/// Receiving half of the event channel consumed by the application layer
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<PollEvent>;

/// create an event channel pair
pub fn event_channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Everything the polling engine reports upward: per-parameter protocol events,
/// transport lifecycle transitions, and raw traffic for logging.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// the polling worker started
    Started,
    /// the polling worker stopped and will emit nothing further
    Stopped,
    /// the transport is open and the request/response cycle begins
    Connected,
    /// the transport closed gracefully
    Disconnected,
    /// a new connection attempt follows after the reconnect pause
    Reconnecting,
    /// the transport could not be opened or connected
    ConnectionError,
    /// graceful disconnect failed; the worker terminates without further recovery
    DisconnectionError,
    /// a request was written to the transport
    Transmitted(Vec<u8>),
    /// raw bytes arrived from the transport
    Received(Vec<u8>),
    /// the current polling slot produced nothing to send
    RequestSkipped,
    /// the accumulated response is not yet a complete frame
    IncompleteData,
    /// the accumulated response formed a valid frame
    ValidData,
    /// the accumulated response was structurally broken and was discarded
    ErrorData,
    /// the write did not complete within the transmit timeout
    TransmitTimeout(Duration),
    /// no response arrived within the receive timeout
    ReceiveTimeout(Duration),
    /// a request for the parameter was constructed and handed to the transport
    RequestSent {
        /// id of the polled parameter
        id: ParamId,
        /// state of the parameter after the request counter was advanced
        param: ParamSnapshot,
    },
    /// a valid response updated the parameter's value buffer
    ValueChanged {
        /// id of the polled parameter
        id: ParamId,
        /// state of the parameter including the new value
        param: ParamSnapshot,
    },
    /// the parameter's exchange failed with an exception or a response mismatch
    ParameterError {
        /// id of the polled parameter
        id: ParamId,
        /// state of the parameter including the recorded error
        param: ParamSnapshot,
    },
    /// the parameter's exchange timed out waiting for a response
    ParameterTimeout {
        /// id of the polled parameter
        id: ParamId,
        /// state of the parameter after the timeout counter was advanced
        param: ParamSnapshot,
    },
}
