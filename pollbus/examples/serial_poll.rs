//! Poll a holding register over Modbus RTU and write a setpoint once.

use pollbus::channel::{Channel, Transport};
use pollbus::frame::FrameKind;
use pollbus::param::{FunctionCode, Parameter, PollingMode};
use pollbus::serial::SerialSettings;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let transport = Transport::Serial {
        path: "/dev/ttyUSB0".to_string(),
        settings: SerialSettings::default(),
    };
    let (mut channel, mut events) = Channel::new(transport, FrameKind::Rtu);

    {
        let session = channel.session();
        let mut session = session.lock().await;
        session.add_parameter(
            Parameter::new(
                0x11,
                FunctionCode::ReadHoldingRegisters,
                0x0000,
                2,
                PollingMode::AlwaysPolling,
            )?
            .with_alias("pressure"),
        );

        // one-shot write: transmitted until the device confirms it, then parked
        let setpoint = session.add_parameter(
            Parameter::new(
                0x11,
                FunctionCode::WriteSingleRegister,
                0x0010,
                1,
                PollingMode::SetValueOnce,
            )?
            .with_alias("setpoint"),
        );
        if let Some(param) = session.parameter_mut(setpoint) {
            param.set_value(&[0x01, 0x2C])?;
        }
    }

    channel.start()?;

    while let Some(event) = events.recv().await {
        println!("{event:?}");
    }

    Ok(())
}
