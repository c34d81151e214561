use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::decode::DecodeLevel;
use crate::error::ChannelError;
use crate::event::{event_channel, EventReceiver, EventSender};
use crate::frame::FrameKind;
use crate::poll::tcp::TcpPollTask;
use crate::poll::worker::PollWorker;
use crate::poll::PollTiming;
use crate::session::{ProtocolSession, SharedSession};

#[cfg(feature = "serial")]
use crate::poll::serial::SerialPollTask;
#[cfg(feature = "serial")]
use crate::serial::SerialSettings;

/// Transport an interface polls over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// TCP socket transport
    Tcp {
        /// socket address of the remote device or gateway
        addr: SocketAddr,
        /// reconnect automatically after connection loss
        auto_reconnect: bool,
    },
    /// serial port transport
    #[cfg(feature = "serial")]
    Serial {
        /// path of the port, e.g. `/dev/ttyUSB0` or `COM3`
        path: String,
        /// port settings
        settings: SerialSettings,
    },
}

struct Running {
    token: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

/// One polled interface: a transport, its timing, and a shared protocol session.
///
/// The channel is the control plane. Starting spawns a worker task that drives the
/// session over the transport; the worker reads a consistent copy of the timing and
/// transport configuration at start, so configuration setters are rejected while the
/// worker runs. Parameters may be added, removed, and edited at any time through the
/// shared session handle, which serializes against in-flight poll cycles.
pub struct Channel {
    transport: Transport,
    timing: PollTiming,
    decode: DecodeLevel,
    session: SharedSession,
    events: EventSender,
    running: Option<Running>,
}

impl Channel {
    /// Create a channel and the event stream its worker reports into.
    ///
    /// `kind` selects the framing the session speaks; RTU framing over a TCP transport is
    /// a valid combination for serial-to-ethernet gateways.
    pub fn new(transport: Transport, kind: FrameKind) -> (Self, EventReceiver) {
        let (tx, rx) = event_channel();
        let session = Arc::new(Mutex::new(ProtocolSession::new(kind, tx.clone())));
        let channel = Self {
            transport,
            timing: PollTiming::default(),
            decode: DecodeLevel::nothing(),
            session,
            events: tx,
            running: None,
        };
        (channel, rx)
    }

    /// handle to the protocol session for parameter management
    pub fn session(&self) -> SharedSession {
        self.session.clone()
    }

    /// current timing configuration
    pub fn timing(&self) -> PollTiming {
        self.timing
    }

    /// Replace the timing configuration. Rejected while the worker runs.
    pub fn set_timing(&mut self, timing: PollTiming) -> Result<(), ChannelError> {
        if self.is_started() {
            return Err(ChannelError::Running);
        }
        self.timing = timing;
        Ok(())
    }

    /// current transport configuration
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Replace the transport configuration. Rejected while the worker runs.
    pub fn set_transport(&mut self, transport: Transport) -> Result<(), ChannelError> {
        if self.is_started() {
            return Err(ChannelError::Running);
        }
        self.transport = transport;
        Ok(())
    }

    /// current decode level
    pub fn decode_level(&self) -> DecodeLevel {
        self.decode
    }

    /// Replace the decode level. Rejected while the worker runs.
    pub fn set_decode_level(&mut self, decode: DecodeLevel) -> Result<(), ChannelError> {
        if self.is_started() {
            return Err(ChannelError::Running);
        }
        self.decode = decode;
        Ok(())
    }

    /// true while the worker task runs
    pub fn is_started(&self) -> bool {
        match &self.running {
            Some(running) => !running.task.is_finished(),
            None => false,
        }
    }

    /// Spawn the polling worker for the configured transport.
    pub fn start(&mut self) -> Result<(), ChannelError> {
        if self.is_started() {
            return Err(ChannelError::Running);
        }
        let token = CancellationToken::new();
        let worker = PollWorker::new(
            self.session.clone(),
            self.timing,
            self.decode,
            self.events.clone(),
            token.clone(),
        );
        let task = match &self.transport {
            Transport::Tcp {
                addr,
                auto_reconnect,
            } => {
                let task = TcpPollTask::new(*addr, *auto_reconnect, worker);
                tokio::spawn(task.run())
            }
            #[cfg(feature = "serial")]
            Transport::Serial { path, settings } => {
                let task = SerialPollTask::new(path, *settings, worker);
                tokio::spawn(task.run())
            }
        };
        self.running = Some(Running { token, task });
        Ok(())
    }

    /// Request a cooperative stop and wait for the worker to exit.
    ///
    /// Stop latency is bounded by the longest in-flight timed I/O call; every pause is
    /// interrupted immediately.
    pub async fn stop(&mut self) -> Result<(), ChannelError> {
        let running = match self.running.take() {
            Some(x) => x,
            None => return Err(ChannelError::Stopped),
        };
        running.token.cancel();
        let _ = running.task.await;
        Ok(())
    }
}
