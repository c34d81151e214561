#![allow(missing_docs)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use pollbus::channel::{Channel, Transport};
use pollbus::event::{EventReceiver, PollEvent};
use pollbus::frame::FrameKind;
use pollbus::param::{FunctionCode, ParamId, Parameter, PollingMode};
use pollbus::PollTiming;

const UNIT_ID: u8 = 0x11;

/// size of a read request frame: MBAP header + fcode + register + count
const READ_REQUEST_LENGTH: usize = 12;

/// Device stub that answers every read request with two registers: 0x000A, 0x0014
async fn responsive_device(listener: TcpListener) {
    loop {
        let (mut socket, _) = match listener.accept().await {
            Ok(x) => x,
            Err(_) => return,
        };
        loop {
            let mut request = [0u8; READ_REQUEST_LENGTH];
            if socket.read_exact(&mut request).await.is_err() {
                break;
            }
            let response = [
                request[0], request[1], // echo transaction id
                0x00, 0x00, // protocol id
                0x00, 0x07, // length
                UNIT_ID, 0x03, // unit id, function code
                0x04, // byte count
                0x00, 0x0A, 0x00, 0x14, // register values
            ];
            if socket.write_all(&response).await.is_err() {
                break;
            }
        }
    }
}

/// Device stub that accepts connections and reads requests but never replies
async fn silent_device(listener: TcpListener) {
    loop {
        let (mut socket, _) = match listener.accept().await {
            Ok(x) => x,
            Err(_) => return,
        };
        let mut sink = [0u8; 64];
        while let Ok(count) = socket.read(&mut sink).await {
            if count == 0 {
                break;
            }
        }
    }
}

async fn bind_device() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

fn fast_timing() -> PollTiming {
    PollTiming {
        connect_timeout: Duration::from_secs(1),
        disconnect_timeout: Duration::from_secs(1),
        transmit_timeout: Duration::from_millis(500),
        receive_timeout: Duration::from_millis(200),
        polling_pause: Duration::from_millis(10),
        skip_pause: Duration::from_millis(1),
        error_pause: Duration::from_millis(10),
        reconnect_pause: Duration::from_millis(50),
    }
}

async fn read_channel(addr: SocketAddr) -> (Channel, EventReceiver, ParamId) {
    let transport = Transport::Tcp {
        addr,
        auto_reconnect: true,
    };
    let (mut channel, events) = Channel::new(transport, FrameKind::Tcp);
    channel.set_timing(fast_timing()).unwrap();

    let session = channel.session();
    let id = {
        let mut session = session.lock().await;
        session.add_parameter(
            Parameter::new(
                UNIT_ID,
                FunctionCode::ReadHoldingRegisters,
                0x0000,
                2,
                PollingMode::AlwaysPolling,
            )
            .unwrap(),
        )
    };
    (channel, events, id)
}

async fn next_event(events: &mut EventReceiver) -> PollEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event stream closed unexpectedly")
}

async fn wait_for<F>(events: &mut EventReceiver, mut predicate: F) -> Vec<PollEvent>
where
    F: FnMut(&PollEvent) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = predicate(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

#[tokio::test]
async fn polls_values_from_a_responsive_device() {
    let (listener, addr) = bind_device().await;
    tokio::spawn(responsive_device(listener));

    let (mut channel, mut events, id) = read_channel(addr).await;
    channel.start().unwrap();

    let seen = wait_for(&mut events, |event| {
        matches!(event, PollEvent::ValueChanged { .. })
    })
    .await;

    assert!(seen.iter().any(|e| matches!(e, PollEvent::Started)));
    assert!(seen.iter().any(|e| matches!(e, PollEvent::Connected)));
    assert!(seen.iter().any(|e| matches!(e, PollEvent::Transmitted(_))));

    match seen.last().unwrap() {
        PollEvent::ValueChanged { id: event_id, param } => {
            assert_eq!(*event_id, id);
            assert_eq!(param.value, vec![0x00, 0x0A, 0x00, 0x14]);
        }
        other => panic!("expected value change, got {other:?}"),
    }

    {
        let session = channel.session();
        let session = session.lock().await;
        let param = session.registry().get(id).unwrap();
        assert!(param.requests() >= 1);
        assert!(param.responses() >= 1);
        assert_eq!(param.errors(), 0);
        assert_eq!(param.timeouts(), 0);
    }

    channel.stop().await.unwrap();
    assert!(!channel.is_started());
    let seen = wait_for(&mut events, |event| matches!(event, PollEvent::Stopped)).await;
    assert!(seen.iter().any(|e| matches!(e, PollEvent::Stopped)));
}

#[tokio::test]
async fn receive_timeout_disconnects_and_reconnects() {
    let (listener, addr) = bind_device().await;
    tokio::spawn(silent_device(listener));

    let (mut channel, mut events, id) = read_channel(addr).await;
    channel.start().unwrap();

    // run until the second connection comes up
    let mut connects = 0;
    let seen = wait_for(&mut events, |event| {
        if matches!(event, PollEvent::Connected) {
            connects += 1;
        }
        connects == 2
    })
    .await;

    let position = |predicate: fn(&PollEvent) -> bool| seen.iter().position(predicate);
    let timeout_at = position(|e| matches!(e, PollEvent::ReceiveTimeout(_))).unwrap();
    let disconnect_at = position(|e| matches!(e, PollEvent::Disconnected)).unwrap();
    let reconnect_at = position(|e| matches!(e, PollEvent::Reconnecting)).unwrap();
    assert!(timeout_at < disconnect_at && disconnect_at < reconnect_at);

    assert!(seen
        .iter()
        .any(|e| matches!(e, PollEvent::ParameterTimeout { .. })));
    assert!(!seen
        .iter()
        .any(|e| matches!(e, PollEvent::ParameterError { .. })));

    {
        let session = channel.session();
        let session = session.lock().await;
        let param = session.registry().get(id).unwrap();
        assert!(param.timeouts() >= 1);
        assert_eq!(param.errors(), 0, "timeouts must not count as errors");
    }

    channel.stop().await.unwrap();
}

#[tokio::test]
async fn connection_refused_reports_error_and_retries() {
    // bind and immediately drop to get an address nothing listens on
    let (listener, addr) = bind_device().await;
    drop(listener);

    let transport = Transport::Tcp {
        addr,
        auto_reconnect: true,
    };
    let (mut channel, mut events) = Channel::new(transport, FrameKind::Tcp);
    channel.set_timing(fast_timing()).unwrap();
    {
        let session = channel.session();
        let mut session = session.lock().await;
        session.add_parameter(
            Parameter::new(
                UNIT_ID,
                FunctionCode::ReadHoldingRegisters,
                0,
                1,
                PollingMode::AlwaysPolling,
            )
            .unwrap(),
        );
    }
    channel.start().unwrap();

    let mut failures = 0;
    let seen = wait_for(&mut events, |event| {
        if matches!(event, PollEvent::ConnectionError) {
            failures += 1;
        }
        failures == 2
    })
    .await;
    assert!(seen.iter().any(|e| matches!(e, PollEvent::Reconnecting)));

    channel.stop().await.unwrap();
}

#[tokio::test]
async fn configuration_is_locked_while_running() {
    let (listener, addr) = bind_device().await;
    tokio::spawn(responsive_device(listener));

    let (mut channel, mut events, _id) = read_channel(addr).await;
    channel.start().unwrap();
    let _ = wait_for(&mut events, |event| matches!(event, PollEvent::Connected)).await;

    assert_eq!(
        channel.set_timing(PollTiming::default()).unwrap_err(),
        pollbus::ChannelError::Running
    );
    assert_eq!(channel.start().unwrap_err(), pollbus::ChannelError::Running);

    channel.stop().await.unwrap();
    channel.set_timing(PollTiming::default()).unwrap();
}
