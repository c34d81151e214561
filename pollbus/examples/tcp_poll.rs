//! Poll two holding registers from a Modbus TCP device and print every event.

use pollbus::channel::{Channel, Transport};
use pollbus::frame::FrameKind;
use pollbus::param::{FunctionCode, Parameter, PollingMode};
use pollbus::{DecodeLevel, FrameDecodeLevel, PhysDecodeLevel};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let transport = Transport::Tcp {
        addr: "127.0.0.1:502".parse()?,
        auto_reconnect: true,
    };
    let (mut channel, mut events) = Channel::new(transport, FrameKind::Tcp);
    channel.set_decode_level(DecodeLevel::new(
        FrameDecodeLevel::Payload,
        PhysDecodeLevel::Length,
    ))?;

    {
        let session = channel.session();
        let mut session = session.lock().await;
        session.add_parameter(
            Parameter::new(
                0x01,
                FunctionCode::ReadHoldingRegisters,
                0x0000,
                2,
                PollingMode::AlwaysPolling,
            )?
            .with_alias("flow rate"),
        );
        session.add_parameter(
            Parameter::new(
                0x01,
                FunctionCode::ReadInputRegisters,
                0x0010,
                1,
                PollingMode::AlwaysPolling,
            )?
            .with_alias("temperature"),
        );
    }

    channel.start()?;

    while let Some(event) = events.recv().await {
        println!("{event:?}");
    }

    Ok(())
}
