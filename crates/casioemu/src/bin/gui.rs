use casioemu::{Args, EmulatorCore, display};
use clap::Parser;
use tracing::{info, warn};

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let model = args.load_model().unwrap_or_else(|e| {
        eprintln!("Failed to load model: {}", e);
        std::process::exit(2);
    });

    // Create emulator
    info!("=== Creating Emulator ===");
    let mut emulator = EmulatorCore::new(model, args.to_emulator_config()).unwrap_or_else(|e| {
        eprintln!("Failed to create emulator: {}", e);
        std::process::exit(2);
    });

    if args.scan_source.is_some() && !emulator.set_scan_source(args.scan_source) {
        warn!("{} display does not scan RAM, --scan-source ignored", emulator.hardware());
    }
    for &(address, value) in &args.pokes {
        emulator.write(address, value);
    }

    // Run with display
    info!("=== Starting Emulator with Display ===");
    if let Err(e) = display::run(emulator) {
        eprintln!("Display error: {}", e);
        std::process::exit(1);
    }
}
