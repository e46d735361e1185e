//! Prepare an inpainting seed for a single image.
//!
//! Usage:
//! ```sh
//! cargo run --example inpaint_file -- input.png mask.png seed.png strength.png
//! ```

use std::env;
use std::path::PathBuf;
use std::process;

use nm_inpainter::{InpaintEngine, OutputPaths};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!("Usage: {} <input> <mask> <seed> <strength>", args[0]);
        process::exit(1);
    }

    let outputs = OutputPaths {
        image: PathBuf::from(&args[3]),
        mask: PathBuf::from(&args[4]),
    };

    let engine = InpaintEngine::new();
    let result = engine.process_file(args[1].as_ref(), args[2].as_ref(), &outputs);

    if result.skipped {
        println!("Skipped: {}", result.message);
    } else if result.success {
        println!("Done: {}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
