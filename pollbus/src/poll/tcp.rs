use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::common::phys::PhysLayer;
use crate::event::PollEvent;
use crate::poll::worker::{PollWorker, ReceiveOutcome, TransmitOutcome};

#[derive(Debug, Copy, Clone, PartialEq)]
enum State {
    Transmit,
    Receive,
}

/// Why the inner transmit/receive machine returned to the outer connection machine
#[derive(Debug, Copy, Clone, PartialEq)]
enum InnerExit {
    /// stop was requested
    Stop,
    /// the link is no longer trustworthy, disconnect and possibly reconnect
    LinkDown,
}

/// Polling task over a TCP connection.
///
/// An outer machine owns connect, graceful disconnect, and auto-reconnect. Any transmit
/// timeout, receive timeout, I/O failure, or structurally broken response abandons the
/// connection; a failed graceful disconnect is fatal and terminates the task.
pub(crate) struct TcpPollTask {
    addr: SocketAddr,
    auto_reconnect: bool,
    worker: PollWorker,
}

impl TcpPollTask {
    pub(crate) fn new(addr: SocketAddr, auto_reconnect: bool, worker: PollWorker) -> Self {
        Self {
            addr,
            auto_reconnect,
            worker,
        }
    }

    pub(crate) async fn run(mut self) {
        self.worker.send(PollEvent::Started);
        let timing = self.worker.timing();
        loop {
            if self.worker.stopped() {
                break;
            }
            match self.connect().await {
                None => {
                    self.worker.send(PollEvent::ConnectionError);
                }
                Some(socket) => {
                    tracing::info!("connected to {}", self.addr);
                    self.worker.send(PollEvent::Connected);
                    let mut phys = PhysLayer::new_tcp(socket);
                    let _exit = self.run_polling(&mut phys).await;

                    // both exits go through the graceful disconnect sequence
                    let shutdown =
                        tokio::time::timeout(timing.disconnect_timeout, phys.shutdown()).await;
                    match shutdown {
                        Ok(Ok(())) => {
                            self.worker.send(PollEvent::Disconnected);
                        }
                        _ => {
                            // the single fatal path: the link can neither be used nor released
                            tracing::error!("unable to disconnect from {}", self.addr);
                            self.worker.send(PollEvent::DisconnectionError);
                            break;
                        }
                    }
                }
            }
            if !self.worker.stopped() && self.auto_reconnect {
                if !self.worker.pause(timing.reconnect_pause).await {
                    break;
                }
                self.worker.send(PollEvent::Reconnecting);
            } else {
                break;
            }
        }
        self.worker.send(PollEvent::Stopped);
    }

    async fn connect(&self) -> Option<TcpStream> {
        let timing = self.worker.timing();
        let attempt = tokio::time::timeout(timing.connect_timeout, TcpStream::connect(self.addr));
        match attempt.await {
            Err(_) => {
                tracing::warn!("timed out connecting to {}", self.addr);
                None
            }
            Ok(Err(err)) => {
                tracing::warn!("error connecting to {}: {}", self.addr, err);
                None
            }
            Ok(Ok(socket)) => Some(socket),
        }
    }

    async fn run_polling(&mut self, phys: &mut PhysLayer) -> InnerExit {
        let timing = self.worker.timing();
        let mut state = State::Transmit;
        loop {
            if self.worker.stopped() {
                return InnerExit::Stop;
            }
            match state {
                State::Transmit => match self.worker.transmit(phys).await {
                    TransmitOutcome::Sent => {
                        state = State::Receive;
                    }
                    TransmitOutcome::Skipped => {
                        if !self.worker.pause(timing.skip_pause).await {
                            return InnerExit::Stop;
                        }
                    }
                    TransmitOutcome::Timeout => return InnerExit::LinkDown,
                    TransmitOutcome::Io(err) => {
                        tracing::warn!("write failed: {}", err);
                        return InnerExit::LinkDown;
                    }
                },
                State::Receive => match self.worker.receive(phys).await {
                    ReceiveOutcome::Incomplete => {
                        if !self.worker.pause(timing.skip_pause).await {
                            return InnerExit::Stop;
                        }
                    }
                    ReceiveOutcome::Valid => {
                        state = State::Transmit;
                        if !self.worker.pause(timing.polling_pause).await {
                            return InnerExit::Stop;
                        }
                    }
                    ReceiveOutcome::Incorrect => return InnerExit::LinkDown,
                    ReceiveOutcome::Timeout => return InnerExit::LinkDown,
                    ReceiveOutcome::Io(err) => {
                        tracing::warn!("read failed: {}", err);
                        return InnerExit::LinkDown;
                    }
                },
            }
        }
    }
}
