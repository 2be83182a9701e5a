//! Fan the default input device out to the default output device.
//!
//! Plays 10 seconds of whatever the input captures, delayed by 200ms at
//! half gain. Pass an input device name to capture from it instead:
//!
//! Run with: cargo run --example fanout [-- "BlackHole 2ch"]

use std::sync::mpsc;
use std::time::Duration;

use route_audio::{EngineEvent, InputSelection, OutputTarget, RouteAudio};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt::init();

    let input = match std::env::args().nth(1) {
        Some(name) => InputSelection::device(name),
        None => InputSelection::default_device(),
    };

    let (events, stopped) = mpsc::channel();
    let engine = RouteAudio::builder()
        .add_output("monitor", OutputTarget::default_device())
        .on_event(move |event| {
            if matches!(event, EngineEvent::Stopped) {
                let _ = events.send(());
            }
        })
        .build()?;

    let monitor = engine.output(&"monitor".into()).expect("registered above");
    monitor.set_delay_ms(200.0);
    monitor.set_gain(0.5);

    engine.start(input)?;
    println!("Routing input to the default output for 10 seconds...");
    println!("Press Ctrl+C to stop early.");

    std::thread::sleep(Duration::from_secs(10));

    println!("Stats: {:?}", engine.stats());

    // stop() returns immediately; wait for the completion notification
    engine.stop();
    stopped.recv_timeout(Duration::from_secs(10))?;
    println!("All streams closed.");

    Ok(())
}
