//! Round-robin Modbus polling engine for industrial device monitoring, built on
//! [Tokio](https://docs.rs/tokio) and Rust's `async/await` syntax.
//!
//! The crate drives a set of *parameters* — individually addressed register or coil
//! ranges on remote devices — through a strict transmit/receive cycle over a serial
//! port (Modbus RTU) or a TCP connection (Modbus TCP), with per-parameter value
//! buffers, statistics, and a stream of events for the consuming application.
//!
//! # Features
//!
//! * Bit-exact RTU and MBAP framing with panic-free parsing
//! * Round-robin scheduling over a dynamic parameter set
//! * Independent timeouts and pauses for every phase of the cycle
//! * Automatic reconnect for TCP transports
//! * Cooperative, bounded-latency shutdown
//!
//! # Example
//!
//! A TCP interface polling two holding registers once per cycle:
//!
//! ```no_run
//! use pollbus::channel::{Channel, Transport};
//! use pollbus::frame::FrameKind;
//! use pollbus::param::{FunctionCode, Parameter, PollingMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Transport::Tcp {
//!         addr: "192.168.0.10:502".parse()?,
//!         auto_reconnect: true,
//!     };
//!     let (mut channel, mut events) = Channel::new(transport, FrameKind::Tcp);
//!
//!     {
//!         let session = channel.session();
//!         let mut session = session.lock().await;
//!         session.add_parameter(Parameter::new(
//!             0x11,
//!             FunctionCode::ReadHoldingRegisters,
//!             0x0000,
//!             2,
//!             PollingMode::AlwaysPolling,
//!         )?);
//!     }
//!
//!     channel.start()?;
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

/// Control plane: transports, start/stop, configuration gating
pub mod channel;
/// Constants defined by the Modbus specification
pub mod constants;
/// Events reported to the consuming application
pub mod event;
/// Wire formats: RTU and MBAP framing, CRC16
pub mod frame;
/// Polling parameters and their statistics
pub mod param;
/// Insertion-ordered parameter registry
pub mod registry;
/// Round-robin protocol session
pub mod session;

/// Serial port settings
#[cfg(feature = "serial")]
pub mod serial;

mod decode;
mod error;
mod exception;

pub(crate) mod common;
pub(crate) mod poll;

pub use crate::decode::*;
pub use crate::error::*;
pub use crate::exception::*;
pub use crate::poll::PollTiming;
