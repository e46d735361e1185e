use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nm_inpainter::hook::MaskedContentChoices;
use nm_inpainter::{
    default_output_paths, DebugDumper, DumperConfig, InpaintEngine, OutputPaths, ProcessResult,
};

/// Dumper name looked up in the diagnostics configuration.
const DUMPER_NAME: &str = "nm_inpainter";

#[derive(Parser)]
#[command(
    name = "nm-inpaint",
    about = "Build a blended inpainting seed image and strength mask from a dual-channel mask",
    version,
    after_help = "Mask layout: red channel = region to regenerate, green channel = outer boundary.\n\
                  Pixels outside the green channel are never changed."
)]
struct Cli {
    /// Input image file or directory
    #[arg(required_unless_present = "props")]
    input: Option<String>,

    /// Mask file, or directory of masks named like the inputs
    #[arg(required_unless_present = "props")]
    mask: Option<String>,

    /// Output image file or directory (default: {name}_inpaint.{ext})
    #[arg(short, long)]
    output: Option<String>,

    /// Output strength mask file (default: {name}_inpaint_mask.png)
    #[arg(long)]
    mask_output: Option<String>,

    /// Write intermediate images below this directory
    #[arg(long)]
    debug_dir: Option<String>,

    /// Diagnostics configuration file
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Override the diagnostics level from the configuration
    #[arg(long)]
    debug_level: Option<u32>,

    /// Print plugin metadata as JSON and exit
    #[arg(long)]
    props: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(cli: &Cli) {
    let base_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_engine(cli: &Cli) -> InpaintEngine {
    let Some(debug_dir) = &cli.debug_dir else {
        return InpaintEngine::new();
    };

    let config = match DumperConfig::load(Path::new(&cli.config)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: Failed to read {}: {e}", cli.config);
            process::exit(1);
        }
    };
    let mut dumper = DebugDumper::new(DUMPER_NAME, debug_dir, &config);
    if let Some(level) = cli.debug_level {
        dumper = dumper.with_level(level);
    }
    InpaintEngine::with_diagnostics(Box::new(dumper))
}

fn main() {
    let cli = Cli::parse();
    setup_logging(&cli);

    if cli.props {
        let mut menu = MaskedContentChoices::img2img_default();
        menu.register("img2img_inpainting_fill");
        match serde_json::to_string_pretty(&menu.props()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
        return;
    }

    let (Some(input), Some(mask)) = (&cli.input, &cli.mask) else {
        eprintln!("Error: Input and mask are required");
        process::exit(1);
    };

    let input_path = Path::new(input);
    let mask_path = Path::new(mask);
    for path in [input_path, mask_path] {
        if !path.exists() {
            eprintln!("Error: Path does not exist: {}", path.display());
            process::exit(1);
        }
    }

    let engine = build_engine(&cli);

    let results = if input_path.is_dir() {
        if !mask_path.is_dir() {
            eprintln!("Error: Batch processing needs a mask directory");
            process::exit(1);
        }
        let output_dir = if let Some(o) = &cli.output {
            PathBuf::from(o)
        } else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: nm-inpaint <input_dir> <mask_dir> -o <output_dir>");
            process::exit(1);
        };
        engine.process_directory(input_path, mask_path, &output_dir)
    } else {
        let defaults = default_output_paths(input_path);
        let outputs = OutputPaths {
            image: cli.output.as_ref().map_or(defaults.image, PathBuf::from),
            mask: cli.mask_output.as_ref().map_or(defaults.mask, PathBuf::from),
        };
        vec![engine.process_file(input_path, mask_path, &outputs)]
    };

    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, &cli);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, cli: &Cli) {
    if cli.quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.skipped {
        eprintln!("[SKIP] {filename}: {}", result.message);
    } else if result.success {
        eprintln!("[OK] {filename}");
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if cli.verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
