//! Assemble a `.sla` source into a `.sq` program next to it.

use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::env;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use sublanq::assembler::assemble;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let debug = args.iter().any(|a| a == "--debug");
    let source_path = args.iter().skip(1).find(|a| !a.starts_with("--"));

    let source_path = match source_path {
        Some(path) if path.ends_with(".sla") => Path::new(path),
        _ => {
            eprintln!("Usage: {} <file.sla> [--debug]", args.first().map(String::as_str).unwrap_or("sla"));
            return ExitCode::from(1);
        }
    };

    let level = if debug { LevelFilter::Debug } else { LevelFilter::Warn };
    if let Err(e) = SimpleLogger::new().with_level(level).env().init() {
        eprintln!("Logger unavailable: {}", e);
    }

    let source = match fs::read_to_string(source_path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to open {}: {}", source_path.display(), e);
            return ExitCode::from(1);
        }
    };

    let program = match assemble(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };
    log::debug!("labels: {:?}", program.labels);
    log::debug!("variables: {:?}", program.variables);

    let output_path = source_path.with_extension("sq");
    if let Err(e) = fs::write(&output_path, program.to_sq()) {
        eprintln!("Failed to write {}: {}", output_path.display(), e);
        return ExitCode::from(1);
    }

    log::info!("wrote {} cells to {}", program.image.len(), output_path.display());
    ExitCode::SUCCESS
}
