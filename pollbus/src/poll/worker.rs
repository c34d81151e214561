use tokio_util::sync::CancellationToken;

use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::event::{EventSender, PollEvent};
use crate::poll::PollTiming;
use crate::session::{Constructed, ParseCode, SharedSession};

const READ_CHUNK_SIZE: usize = 256;

#[derive(Debug)]
pub(crate) enum TransmitOutcome {
    /// request written, move to receive
    Sent,
    /// nothing to send this cycle
    Skipped,
    /// the write did not complete in time
    Timeout,
    /// the transport failed
    Io(std::io::Error),
}

#[derive(Debug)]
pub(crate) enum ReceiveOutcome {
    /// a valid response was processed
    Valid,
    /// keep accumulating bytes
    Incomplete,
    /// the response was discarded as structurally broken
    Incorrect,
    /// no bytes arrived in time
    Timeout,
    /// the transport failed
    Io(std::io::Error),
}

/// One transmit/receive polling cycle over any physical layer.
///
/// The worker drives the shared session through the TRANSMIT and RECEIVE transitions and
/// emits data-flow events. Transport-specific policy (what a timeout or a broken frame
/// does to the connection) stays with the serial and TCP tasks that own the loop.
pub(crate) struct PollWorker {
    session: SharedSession,
    timing: PollTiming,
    decode: DecodeLevel,
    events: EventSender,
    token: CancellationToken,
    rx_buffer: Vec<u8>,
}

impl PollWorker {
    pub(crate) fn new(
        session: SharedSession,
        timing: PollTiming,
        decode: DecodeLevel,
        events: EventSender,
        token: CancellationToken,
    ) -> Self {
        Self {
            session,
            timing,
            decode,
            events,
            token,
            rx_buffer: Vec::new(),
        }
    }

    pub(crate) fn timing(&self) -> PollTiming {
        self.timing
    }

    pub(crate) fn send(&self, event: PollEvent) {
        // the receiver may be gone; polling carries on regardless
        let _ = self.events.send(event);
    }

    pub(crate) fn stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sleep, but wake immediately when stop is requested. Returns false on stop.
    pub(crate) async fn pause(&self, duration: std::time::Duration) -> bool {
        if duration.is_zero() {
            return !self.stopped();
        }
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    pub(crate) fn clear_rx_buffer(&mut self) {
        self.rx_buffer.clear();
    }

    pub(crate) async fn transmit(&mut self, phys: &mut PhysLayer) -> TransmitOutcome {
        let constructed = { self.session.lock().await.construct_request() };
        let bytes = match constructed {
            Err(err) => {
                tracing::warn!("unable to construct request: {}", err);
                self.send(PollEvent::RequestSkipped);
                return TransmitOutcome::Skipped;
            }
            Ok(Constructed::Empty) | Ok(Constructed::Skip(_)) => {
                self.send(PollEvent::RequestSkipped);
                return TransmitOutcome::Skipped;
            }
            Ok(Constructed::Request { bytes, .. }) => bytes,
        };

        if self.decode.frame.enabled() {
            tracing::info!(
                "FRAME TX - {}",
                FrameDisplay::new(self.decode, &bytes)
            );
        }

        let write = phys.write(&bytes, self.decode.physical);
        match tokio::time::timeout(self.timing.transmit_timeout, write).await {
            Err(_) => {
                self.send(PollEvent::TransmitTimeout(self.timing.transmit_timeout));
                TransmitOutcome::Timeout
            }
            Ok(Err(err)) => TransmitOutcome::Io(err),
            Ok(Ok(())) => {
                self.rx_buffer.clear();
                self.send(PollEvent::Transmitted(bytes));
                TransmitOutcome::Sent
            }
        }
    }

    pub(crate) async fn receive(&mut self, phys: &mut PhysLayer) -> ReceiveOutcome {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = phys.read(&mut chunk, self.decode.physical);
        let count = match tokio::time::timeout(self.timing.receive_timeout, read).await {
            Err(_) => {
                self.send(PollEvent::ReceiveTimeout(self.timing.receive_timeout));
                self.session.lock().await.on_timeout();
                return ReceiveOutcome::Timeout;
            }
            Ok(Err(err)) => return ReceiveOutcome::Io(err),
            Ok(Ok(count)) => count,
        };

        self.rx_buffer.extend_from_slice(&chunk[..count]);
        self.send(PollEvent::Received(chunk[..count].to_vec()));

        let code = { self.session.lock().await.process_response(&self.rx_buffer) };
        match code {
            ParseCode::Incomplete => {
                self.send(PollEvent::IncompleteData);
                ReceiveOutcome::Incomplete
            }
            ParseCode::Valid | ParseCode::ValidBroadcast => {
                if self.decode.frame.enabled() {
                    tracing::info!(
                        "FRAME RX - {}",
                        FrameDisplay::new(self.decode, &self.rx_buffer)
                    );
                }
                self.send(PollEvent::ValidData);
                ReceiveOutcome::Valid
            }
            ParseCode::Incorrect => {
                self.send(PollEvent::ErrorData);
                ReceiveOutcome::Incorrect
            }
        }
    }
}

struct FrameDisplay<'a> {
    decode: DecodeLevel,
    frame: &'a [u8],
}

impl<'a> FrameDisplay<'a> {
    fn new(decode: DecodeLevel, frame: &'a [u8]) -> Self {
        Self { decode, frame }
    }
}

impl std::fmt::Display for FrameDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} bytes", self.frame.len())?;
        if self.decode.frame.payload_enabled() {
            crate::common::phys::format_bytes(f, self.frame)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::*;
    use crate::event::event_channel;
    use crate::frame::FrameKind;
    use crate::param::{FunctionCode, Parameter, PollingMode};
    use crate::session::ProtocolSession;

    const REQUEST: &[u8] = &[0x11, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC6, 0x9B];
    const RESPONSE: &[u8] = &[0x11, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x14, 0xCB, 0xFF];

    fn worker_with_param() -> (PollWorker, crate::event::EventReceiver, SharedSession) {
        let (tx, rx) = event_channel();
        let mut session = ProtocolSession::new(FrameKind::Rtu, tx.clone());
        session.add_parameter(
            Parameter::new(
                0x11,
                FunctionCode::ReadHoldingRegisters,
                0,
                2,
                PollingMode::AlwaysPolling,
            )
            .unwrap(),
        );
        let shared: SharedSession = Arc::new(Mutex::new(session));
        let worker = PollWorker::new(
            shared.clone(),
            PollTiming::default(),
            DecodeLevel::nothing(),
            tx,
            CancellationToken::new(),
        );
        (worker, rx, shared)
    }

    #[tokio::test]
    async fn transmit_then_receive_completes_a_cycle() {
        let (mut worker, mut rx, shared) = worker_with_param();
        let mock = tokio_test::io::Builder::new()
            .write(REQUEST)
            .read(RESPONSE)
            .build();
        let mut phys = PhysLayer::new_mock(mock);

        assert!(matches!(
            worker.transmit(&mut phys).await,
            TransmitOutcome::Sent
        ));
        assert!(matches!(
            worker.receive(&mut phys).await,
            ReceiveOutcome::Valid
        ));

        let session = shared.lock().await;
        let (_, param) = session.registry().iter().next().unwrap();
        assert_eq!(param.value(), &[0x00, 0x0A, 0x00, 0x14]);
        assert_eq!(param.requests(), 1);
        assert_eq!(param.responses(), 1);

        assert!(matches!(rx.try_recv().unwrap(), PollEvent::RequestSent { .. }));
        assert!(matches!(rx.try_recv().unwrap(), PollEvent::Transmitted(_)));
        assert!(matches!(rx.try_recv().unwrap(), PollEvent::Received(_)));
        assert!(matches!(rx.try_recv().unwrap(), PollEvent::ValueChanged { .. }));
        assert!(matches!(rx.try_recv().unwrap(), PollEvent::ValidData));
    }

    #[tokio::test]
    async fn fragmented_response_accumulates_until_complete() {
        let (mut worker, _rx, shared) = worker_with_param();
        let (first, second) = RESPONSE.split_at(4);
        let mock = tokio_test::io::Builder::new()
            .write(REQUEST)
            .read(first)
            .read(second)
            .build();
        let mut phys = PhysLayer::new_mock(mock);

        assert!(matches!(
            worker.transmit(&mut phys).await,
            TransmitOutcome::Sent
        ));
        assert!(matches!(
            worker.receive(&mut phys).await,
            ReceiveOutcome::Incomplete
        ));
        assert!(matches!(
            worker.receive(&mut phys).await,
            ReceiveOutcome::Valid
        ));

        let session = shared.lock().await;
        let (_, param) = session.registry().iter().next().unwrap();
        assert_eq!(param.value(), &[0x00, 0x0A, 0x00, 0x14]);
    }

    #[tokio::test]
    async fn pause_is_interrupted_by_stop() {
        let (tx, _rx) = event_channel();
        let session = ProtocolSession::new(FrameKind::Rtu, tx.clone());
        let token = CancellationToken::new();
        let worker = PollWorker::new(
            Arc::new(Mutex::new(session)),
            PollTiming::default(),
            DecodeLevel::nothing(),
            tx,
            token.clone(),
        );

        token.cancel();
        assert!(!worker.pause(std::time::Duration::from_secs(3600)).await);
    }
}
