use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::env;
use std::io;
use std::process::ExitCode;
use sublanq::{
    loader, AnsiDisplay, Config, Display, DisplayKind, Exit, HeadlessDisplay, Machine,
    PortAdapter, Result,
};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let exe = args.first().map(String::as_str).unwrap_or("sublanq");

    let config = match Config::from_args(args.iter().skip(1).cloned()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", Config::usage(exe));
            return ExitCode::from(1);
        }
    };

    if config.help {
        println!("{}", Config::usage(exe));
        return ExitCode::SUCCESS;
    }

    init_logging(config.trace);

    match run(&config) {
        Ok(exit) => {
            log::info!("{:?} after {} steps", exit, exit.steps());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn init_logging(trace: bool) {
    // Logs go to stderr; stdout belongs to port 0
    let level = if trace { LevelFilter::Trace } else { LevelFilter::Warn };
    if let Err(e) = SimpleLogger::new().with_level(level).env().init() {
        eprintln!("Logger unavailable: {}", e);
    }
}

fn run(config: &Config) -> Result<Exit> {
    let memory = loader::load_file(&config.program)?;

    let display: Box<dyn Display> = match config.display {
        DisplayKind::Headless => Box::new(HeadlessDisplay::new()),
        DisplayKind::Ansi => Box::new(AnsiDisplay::new(io::stderr())),
    };

    // Dropping the adapter restores the terminal and cleans up the display
    let mut ports = PortAdapter::stdio(display, config)?;
    let mut machine = Machine::new(memory);
    let exit = machine.run(&mut ports);

    // The raster is saved even when the run failed part way
    if let Some(path) = &config.ppm {
        ports.display().framebuffer().save_ppm(path)?;
    }
    exit
}
