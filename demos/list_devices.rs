//! List the audio devices CPAL can see.
//!
//! Run with: cargo run --example list_devices

use route_audio::{default_input_device_name, list_input_devices, list_output_devices};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("Input devices:");
    for name in list_input_devices()? {
        println!("  {name}");
    }
    if let Some(name) = default_input_device_name() {
        println!("  (default: {name})");
    }

    println!("Output devices:");
    for name in list_output_devices()? {
        println!("  {name}");
    }

    Ok(())
}
