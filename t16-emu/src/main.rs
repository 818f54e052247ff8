use clap::Parser;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use t16_core::bus::Bus;
use t16_core::cpu_16::Cpu16;
use t16_core::image;

/// Run a T16 binary image.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Binary image produced by the assembler
    binary: PathBuf,

    /// Print one state line per executed instruction to stderr
    #[arg(long)]
    trace: bool,

    /// Dump all of memory to this path after the machine halts
    #[arg(long)]
    memdump: Option<PathBuf>,
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
    let bytes = fs::read(&cli.binary)
        .map_err(|e| format!("unable to read {}: {}", cli.binary.display(), e))?;
    let words = image::bytes_to_words(&bytes);

    let mut cpu = Cpu16::new(Bus::new());
    cpu.trace = cli.trace;
    cpu.load(&words, 0);
    cpu.run();

    if let Some(error) = &cpu.error {
        // The machine state is still well-defined after an undecodable
        // word, so this is a report rather than a failure.
        eprintln!("{}", error);
    }

    if let Some(path) = &cli.memdump {
        let file = File::create(path)
            .map_err(|e| format!("unable to write {}: {}", path.display(), e))?;
        let mut out = BufWriter::new(file);
        image::dump_memory(&cpu.bus, &mut out)
            .map_err(|e| format!("unable to write {}: {}", path.display(), e))?;
    }
    Ok(())
}
