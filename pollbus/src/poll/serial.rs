use crate::common::phys::PhysLayer;
use crate::event::PollEvent;
use crate::poll::worker::{PollWorker, ReceiveOutcome, TransmitOutcome};
use crate::serial::SerialSettings;

#[derive(Debug, Copy, Clone, PartialEq)]
enum State {
    Transmit,
    Receive,
}

/// Polling task over a serial port.
///
/// The port is opened once at entry; an open failure ends the task. There is no
/// connection to lose, so timeouts and broken frames only pause and retry.
pub(crate) struct SerialPollTask {
    path: String,
    settings: SerialSettings,
    worker: PollWorker,
}

impl SerialPollTask {
    pub(crate) fn new(path: &str, settings: SerialSettings, worker: PollWorker) -> Self {
        Self {
            path: path.to_string(),
            settings,
            worker,
        }
    }

    pub(crate) async fn run(mut self) {
        self.worker.send(PollEvent::Started);
        match crate::serial::open(&self.path, self.settings) {
            Err(err) => {
                tracing::warn!("unable to open serial port {}: {}", self.path, err);
                self.worker.send(PollEvent::ConnectionError);
            }
            Ok(stream) => {
                tracing::info!("serial port open: {}", self.path);
                self.worker.send(PollEvent::Connected);
                let mut phys = PhysLayer::new_serial(stream);
                self.run_polling(&mut phys).await;
                self.worker.send(PollEvent::Disconnected);
            }
        }
        self.worker.send(PollEvent::Stopped);
    }

    async fn run_polling(&mut self, phys: &mut PhysLayer) {
        let timing = self.worker.timing();
        let mut state = State::Transmit;
        loop {
            if self.worker.stopped() {
                return;
            }
            match state {
                State::Transmit => match self.worker.transmit(phys).await {
                    TransmitOutcome::Sent => {
                        state = State::Receive;
                    }
                    TransmitOutcome::Skipped => {
                        if !self.worker.pause(timing.skip_pause).await {
                            return;
                        }
                    }
                    TransmitOutcome::Timeout => {
                        // the request never left, so this is not a parameter timeout
                        if !self.worker.pause(timing.skip_pause).await {
                            return;
                        }
                    }
                    TransmitOutcome::Io(err) => {
                        tracing::warn!("serial write failed: {}", err);
                        self.worker.send(PollEvent::ConnectionError);
                        return;
                    }
                },
                State::Receive => match self.worker.receive(phys).await {
                    ReceiveOutcome::Incomplete => {
                        // keep accumulating in the receive state
                        if !self.worker.pause(timing.skip_pause).await {
                            return;
                        }
                    }
                    ReceiveOutcome::Valid => {
                        state = State::Transmit;
                        if !self.worker.pause(timing.polling_pause).await {
                            return;
                        }
                    }
                    ReceiveOutcome::Incorrect => {
                        if !self.worker.pause(timing.polling_pause).await {
                            return;
                        }
                        if !self.worker.pause(timing.error_pause).await {
                            return;
                        }
                        self.worker.clear_rx_buffer();
                        state = State::Transmit;
                    }
                    ReceiveOutcome::Timeout => {
                        self.worker.clear_rx_buffer();
                        state = State::Transmit;
                        if !self.worker.pause(timing.skip_pause).await {
                            return;
                        }
                    }
                    ReceiveOutcome::Io(err) => {
                        tracing::warn!("serial read failed: {}", err);
                        self.worker.send(PollEvent::ConnectionError);
                        return;
                    }
                },
            }
        }
    }
}
