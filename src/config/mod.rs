//! Run configuration
//!
//! Options for one interpreter run, parsed from the command line. Defaults
//! give a 128x128 raster with a blue accent.

use crate::display::{Rgb, DEFAULT_HEIGHT, DEFAULT_WIDTH, MAX_DIMENSION};
use crate::error::{Result, SublanqError};
use std::path::PathBuf;

/// Default accent color of the port 1 gradient
pub const DEFAULT_ACCENT: Rgb = Rgb::new(0, 128, 255);
/// Default display title
pub const DEFAULT_TITLE: &str = "SUBLANQ";

/// Which display backend serves ports 1 and 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayKind {
    /// Keep the raster in memory only
    #[default]
    Headless,
    /// Draw the raster on stderr with ANSI true-color escapes
    Ansi,
}

/// Options for one interpreter run
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Program file to load
    pub program: PathBuf,
    pub display: DisplayKind,
    /// Middle stop of the black -> accent -> white gradient
    pub accent: Rgb,
    /// Raster width in pixels
    pub width: usize,
    /// Raster height in pixels
    pub height: usize,
    pub title: String,
    /// Fixed seed for port 2; None seeds from entropy
    pub seed: Option<u64>,
    /// Save the raster here as a PPM image when the run ends
    pub ppm: Option<PathBuf>,
    /// Log every executed instruction
    pub trace: bool,
    /// Print usage and exit
    pub help: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            program: PathBuf::new(),
            display: DisplayKind::default(),
            accent: DEFAULT_ACCENT,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            title: DEFAULT_TITLE.to_string(),
            seed: None,
            ppm: None,
            trace: false,
            help: false,
        }
    }
}

impl Config {
    /// Parse command line arguments, excluding the executable name
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Config::default();
        let mut program = None;
        let mut args = args.into_iter().map(Into::<String>::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => config.help = true,
                "--trace" => config.trace = true,
                "--display" => {
                    config.display = match option_value(&mut args, &arg)?.as_str() {
                        "headless" => DisplayKind::Headless,
                        "ansi" => DisplayKind::Ansi,
                        other => return Err(invalid(&arg, other)),
                    }
                }
                "--accent" => {
                    let value = option_value(&mut args, &arg)?;
                    config.accent = Rgb::from_hex(&value).ok_or_else(|| invalid(&arg, &value))?;
                }
                "--size" => {
                    let value = option_value(&mut args, &arg)?;
                    let (width, height) = parse_size(&value).ok_or_else(|| invalid(&arg, &value))?;
                    config.width = width;
                    config.height = height;
                }
                "--seed" => {
                    let value = option_value(&mut args, &arg)?;
                    config.seed = Some(value.parse().map_err(|_| invalid(&arg, &value))?);
                }
                "--title" => config.title = option_value(&mut args, &arg)?,
                "--ppm" => config.ppm = Some(PathBuf::from(option_value(&mut args, &arg)?)),
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    return Err(SublanqError::Config(format!("Unknown option: {}", arg)));
                }
                _ => {
                    if program.replace(PathBuf::from(&arg)).is_some() {
                        return Err(SublanqError::Config(format!("Unexpected argument: {}", arg)));
                    }
                }
            }
        }

        match program {
            Some(path) => config.program = path,
            None if config.help => {}
            None => return Err(SublanqError::Config("Missing program file".to_string())),
        }

        Ok(config)
    }

    /// Usage text for the `sublanq` binary
    pub fn usage(exe: &str) -> String {
        format!(
            "Usage: {} [OPTIONS] <program.sq>\n\
             \n\
             Options:\n  \
               --display <headless|ansi>  Display backend for ports 1 and 2 (default: headless)\n  \
               --accent <RRGGBB>          Gradient accent color (default: 0080FF)\n  \
               --size <WxH>               Raster size, at most {}x{} (default: {}x{})\n  \
               --seed <N>                 Seed for the port 2 random source\n  \
               --title <TEXT>             Display title (default: {})\n  \
               --ppm <PATH>               Save the raster as a PPM image when the run ends\n  \
               --trace                    Log every executed instruction\n  \
               -h, --help                 Print this help",
            exe, MAX_DIMENSION, MAX_DIMENSION, DEFAULT_WIDTH, DEFAULT_HEIGHT, DEFAULT_TITLE
        )
    }
}

fn option_value<I: Iterator<Item = String>>(args: &mut I, option: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| SublanqError::Config(format!("Missing value for {}", option)))
}

fn invalid(option: &str, value: &str) -> SublanqError {
    SublanqError::Config(format!("Invalid value for {}: {}", option, value))
}

fn parse_size(value: &str) -> Option<(usize, usize)> {
    let (width, height) = value.split_once(|c| c == 'x' || c == 'X')?;
    let width: usize = width.parse().ok()?;
    let height: usize = height.parse().ok()?;
    if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
        return None;
    }
    Some((width, height))
}
