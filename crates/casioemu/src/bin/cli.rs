use casioemu::{Args, EmulatorCore};
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

    // Load the model descriptor
    let model = match args.load_model() {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Failed to load model: {}", e);
            std::process::exit(2);
        }
    };

    // Create emulator
    info!("=== Creating Emulator ===");
    let mut emulator = match EmulatorCore::new(model, args.to_emulator_config()) {
        Ok(emu) => emu,
        Err(e) => {
            eprintln!("Failed to create emulator: {}", e);
            std::process::exit(2);
        }
    };

    if args.scan_source.is_some() && !emulator.set_scan_source(args.scan_source) {
        warn!("{} display does not scan RAM, --scan-source ignored", emulator.hardware());
    }
    for &(address, value) in &args.pokes {
        info!("Poke {:#07X} = {:#04X}", address, value);
        emulator.write(address, value);
    }

    // Run peripherals
    info!("=== Running Peripherals (Headless) ===");
    for _ in 0..args.ticks {
        emulator.tick();
    }
    let draw_calls = emulator.frame();
    let lit = draw_calls.iter().filter(|call| call.alpha > 0).count();
    info!("Frame: {} draw calls, {} visible", draw_calls.len(), lit);

    info!("=== Emulation Complete ===");
    emulator.print_final_state();

    let mut exit_code = 0;
    if let Some(path) = &args.dump_ram {
        match std::fs::write(path, emulator.ram()) {
            Ok(()) => info!("Dumped {:#X} bytes of RAM to {:?}", emulator.ram().len(), path),
            Err(e) => {
                eprintln!("Failed to dump RAM to {:?}: {}", path, e);
                exit_code = 1;
            }
        }
    }

    emulator.shutdown();
    std::process::exit(exit_code);
}
