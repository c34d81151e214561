use crate::error::InternalError;
use crate::event::{EventSender, PollEvent};
use crate::frame;
use crate::frame::pdu::Decoded;
use crate::frame::rtu::FrameCheck;
use crate::frame::mbap::MbapCheck;
use crate::frame::{FrameKind, TxId};
use crate::param::{ParamError, ParamId, Parameter, PollingMode};
use crate::registry::ParamRegistry;

/// Session handle shared between the polling worker and the control plane
pub type SharedSession = std::sync::Arc<tokio::sync::Mutex<ProtocolSession>>;

/// Outcome of feeding an accumulated response buffer to the session
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseCode {
    /// more data is required; no counters changed, keep the buffer and keep reading
    Incomplete,
    /// the buffer could not be matched to the in-flight request and was discarded
    Incorrect,
    /// a valid response was processed
    Valid,
    /// a valid response to a broadcast exchange was processed
    ValidBroadcast,
}

/// Outcome of asking the session for the next request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constructed {
    /// the registry holds no parameters; there is nothing to poll at all
    Empty,
    /// the current polling slot is a non-polled parameter; the cursor advanced past it
    Skip(ParamId),
    /// a request frame ready for transmission
    Request {
        /// parameter targeted by the request
        id: ParamId,
        /// complete frame bytes
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Copy, Clone)]
struct InFlight {
    id: ParamId,
    tx_id: TxId,
}

/// Round-robin polling session over one parameter registry.
///
/// The session owns the registry, a polling cursor over a dense index of parameter ids,
/// and the TCP transaction id. The parameter targeted by the most recent request is
/// retained explicitly, so response matching and timeout accounting never re-derive it
/// from cursor arithmetic. Any structural registry change rebuilds the polling index and
/// resets the session.
pub struct ProtocolSession {
    kind: FrameKind,
    registry: ParamRegistry,
    polling_index: Vec<ParamId>,
    cursor: usize,
    tx_id: TxId,
    in_flight: Option<InFlight>,
    events: EventSender,
    buffer: [u8; frame::constants::MAX_FRAME_LENGTH],
}

impl ProtocolSession {
    /// create a session speaking the given framing, emitting events into the channel
    pub fn new(kind: FrameKind, events: EventSender) -> Self {
        Self {
            kind,
            registry: ParamRegistry::new(),
            polling_index: Vec::new(),
            cursor: 0,
            tx_id: TxId::default(),
            in_flight: None,
            events,
            buffer: [0; frame::constants::MAX_FRAME_LENGTH],
        }
    }

    /// framing this session speaks
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// borrow the parameter registry
    pub fn registry(&self) -> &ParamRegistry {
        &self.registry
    }

    /// Mutably borrow a parameter to edit its value, mode, or timing-independent fields.
    ///
    /// Structural changes (adding or removing parameters) go through
    /// [ProtocolSession::add_parameter] and [ProtocolSession::remove_parameter] so the
    /// polling index stays consistent.
    pub fn parameter_mut(&mut self, id: ParamId) -> Option<&mut Parameter> {
        self.registry.get_mut(id)
    }

    /// Add a parameter under the next monotonic id, returning the assigned id.
    ///
    /// Rebuilds the polling index and resets the session.
    pub fn add_parameter(&mut self, param: Parameter) -> ParamId {
        let id = self.registry.next_id();
        self.registry.append(id, param);
        self.rebuild();
        id
    }

    /// Insert a parameter under an externally assigned id.
    ///
    /// Rebuilds the polling index and resets the session.
    pub fn insert_parameter(&mut self, id: ParamId, param: Parameter) {
        self.registry.append(id, param);
        self.rebuild();
    }

    /// Remove a parameter, returning it if present.
    ///
    /// Rebuilds the polling index and resets the session.
    pub fn remove_parameter(&mut self, id: ParamId) -> Option<Parameter> {
        let removed = self.registry.remove(id);
        self.rebuild();
        removed
    }

    /// true iff the registry holds at least one parameter
    pub fn ready_to_poll(&self) -> bool {
        !self.registry.is_empty()
    }

    /// Reset to the state of a fresh polling run: cursor and transaction id to zero, no
    /// in-flight exchange, read-type parameters zero-filled with cleared counters.
    /// Write-type parameters keep their pending value and statistics.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.tx_id = TxId::default();
        self.in_flight = None;
        for (_, param) in self.registry.iter_mut() {
            param.reset();
        }
    }

    fn rebuild(&mut self) {
        self.polling_index = self.registry.ids();
        self.reset();
    }

    /// Construct the next request in round-robin order.
    ///
    /// Advances (and wraps) the polling cursor. A slot whose parameter is not polled
    /// still advances the cursor but produces [Constructed::Skip]; an empty registry
    /// produces [Constructed::Empty]. On a real request the parameter's request counter
    /// is advanced and a [PollEvent::RequestSent] event is emitted.
    pub fn construct_request(&mut self) -> Result<Constructed, InternalError> {
        if self.polling_index.is_empty() {
            return Ok(Constructed::Empty);
        }
        if self.cursor >= self.polling_index.len() {
            self.cursor = 0;
        }
        let id = self.polling_index[self.cursor];
        self.cursor += 1;

        // the transaction id advances once per cycle, skipped slots included
        let tx_id = self.tx_id.next();

        let param = match self.registry.get(id) {
            Some(x) => x,
            None => return Ok(Constructed::Empty),
        };
        if param.mode() == PollingMode::NoPolling {
            return Ok(Constructed::Skip(id));
        }

        let length = match self.kind {
            FrameKind::Rtu => frame::rtu::format_request(param, &mut self.buffer)?,
            FrameKind::Tcp => frame::mbap::format_request(param, tx_id, &mut self.buffer)?,
        };
        let bytes = self.buffer[..length].to_vec();

        self.in_flight = Some(InFlight { id, tx_id });
        if let Some(param) = self.registry.get_mut(id) {
            param.record_request();
            let snapshot = param.snapshot();
            self.emit(PollEvent::RequestSent { id, param: snapshot });
        }

        Ok(Constructed::Request { id, bytes })
    }

    /// Match an accumulated response buffer to the in-flight request.
    ///
    /// `Incomplete` is silent: no counters change and the caller should keep buffering.
    /// A structurally valid frame with no protocol error advances the response counter
    /// and emits [PollEvent::ValueChanged]; a valid frame carrying a Modbus exception
    /// advances the error counter and emits [PollEvent::ParameterError]; anything else
    /// records a response mismatch on the parameter and emits the same event.
    pub fn process_response(&mut self, bytes: &[u8]) -> ParseCode {
        if bytes.is_empty() {
            return ParseCode::Incomplete;
        }
        match self.kind {
            FrameKind::Rtu => match frame::rtu::check_response(bytes) {
                FrameCheck::Incomplete => ParseCode::Incomplete,
                FrameCheck::Incorrect => self.fail_current(),
                FrameCheck::Complete => self.decode_current(bytes),
            },
            FrameKind::Tcp => match frame::mbap::validate(bytes) {
                MbapCheck::Incomplete => ParseCode::Incomplete,
                MbapCheck::Incorrect => self.fail_current(),
                MbapCheck::Complete(tx_id) => {
                    let expected = self.in_flight.map(|x| x.tx_id.to_u16());
                    if expected == Some(tx_id) {
                        self.decode_current(bytes)
                    } else {
                        tracing::warn!(
                            "received transaction id {} while expecting {:?}",
                            tx_id,
                            expected
                        );
                        self.fail_current()
                    }
                }
            },
        }
    }

    /// Record a receive timeout against the in-flight parameter.
    ///
    /// The polling cursor is untouched; the next [ProtocolSession::construct_request]
    /// naturally advances past the timed-out parameter.
    pub fn on_timeout(&mut self) {
        let id = match self.in_flight {
            Some(x) => x.id,
            None => return,
        };
        if let Some(param) = self.registry.get_mut(id) {
            param.record_timeout();
            let snapshot = param.snapshot();
            self.emit(PollEvent::ParameterTimeout { id, param: snapshot });
        }
    }

    fn decode_current(&mut self, bytes: &[u8]) -> ParseCode {
        let id = match self.in_flight {
            Some(x) => x.id,
            None => return ParseCode::Incorrect,
        };
        let param = match self.registry.get(id) {
            Some(x) => x,
            None => return ParseCode::Incorrect,
        };

        let decoded = match self.kind {
            FrameKind::Rtu => frame::rtu::decode_response(param, bytes),
            FrameKind::Tcp => frame::mbap::decode_response(param, bytes),
        };

        match decoded {
            Ok(Decoded::Data(data)) => {
                let data = data.to_vec();
                self.complete_valid(id, Some(&data))
            }
            Ok(Decoded::WriteEcho) => self.complete_valid(id, None),
            Ok(Decoded::Exception(code)) => {
                if let Some(param) = self.registry.get_mut(id) {
                    param.record_error(ParamError::Exception(code));
                    let snapshot = param.snapshot();
                    self.emit(PollEvent::ParameterError { id, param: snapshot });
                }
                // the frame itself was valid, the device reported the failure
                ParseCode::Valid
            }
            Err(reason) => {
                tracing::warn!("response mismatch for parameter {}: {}", id, reason);
                self.fail_current()
            }
        }
    }

    fn complete_valid(&mut self, id: ParamId, data: Option<&[u8]>) -> ParseCode {
        let param = match self.registry.get_mut(id) {
            Some(x) => x,
            None => return ParseCode::Incorrect,
        };
        if let Some(data) = data {
            param.store_value(data);
        }
        param.clear_error();
        if param.mode() == PollingMode::SetValueOnce {
            // write confirmed once, stop polling it
            param.force_mode(PollingMode::NoPolling);
        }
        param.record_response();
        let broadcast = param.device_address() == 0;
        let snapshot = param.snapshot();
        self.emit(PollEvent::ValueChanged { id, param: snapshot });
        if broadcast {
            ParseCode::ValidBroadcast
        } else {
            ParseCode::Valid
        }
    }

    fn fail_current(&mut self) -> ParseCode {
        if let Some(InFlight { id, .. }) = self.in_flight {
            if let Some(param) = self.registry.get_mut(id) {
                param.record_error(ParamError::ResponseMismatch);
                let snapshot = param.snapshot();
                self.emit(PollEvent::ParameterError { id, param: snapshot });
            }
        }
        ParseCode::Incorrect
    }

    fn emit(&self, event: PollEvent) {
        // the application layer may have dropped its receiver; polling carries on
        let _ = self.events.send(event);
    }
}
