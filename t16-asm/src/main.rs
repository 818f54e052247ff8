use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use t16_core::asm;

/// Assemble T16 source into a binary image.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The assembly source file
    source: PathBuf,

    /// Where to write the binary image
    #[arg(short, long, default_value = "a.bin")]
    output: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let text = fs::read_to_string(&cli.source)
        .map_err(|e| format!("unable to read {}: {}", cli.source.display(), e))?;

    // Fail fast: the first error ends the run and nothing is written.
    let image = asm::assemble(&text).map_err(|e| e.to_string())?;

    fs::write(&cli.output, image.to_bytes())
        .map_err(|e| format!("unable to write {}: {}", cli.output.display(), e))?;
    Ok(())
}
