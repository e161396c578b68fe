//! SUBLANQ Interpreter
//!
//! A one-instruction-set computer in the SUBLEQ family. Every instruction is the
//! triple `(a, b, c)` meaning `mem[a] -= mem[b]; if mem[a] <= 0 jump to c`, with
//! `-1` operands turning the triple into input, output or halt. I/O goes through
//! a small set of numbered ports backed by a character stream, a pixel raster
//! and a pseudo-random source.

pub mod assembler;
pub mod config;
pub mod display;
pub mod loader;
pub mod ports;
pub mod terminal;
pub mod vm;

// Re-export core types for convenience
pub use crate::error::{Result, SublanqError};
pub use config::{Config, DisplayKind};
pub use display::{AnsiDisplay, Display, Framebuffer, HeadlessDisplay, Key, Rgb};
pub use ports::{PortAdapter, Ports};
pub use vm::{Exit, Instruction, Machine, Step};

/// Core error handling types for the SUBLANQ interpreter
pub mod error {
    use std::fmt;
    use std::io;

    /// Result type for SUBLANQ operations
    pub type Result<T> = std::result::Result<T, SublanqError>;

    /// Every way a load, assembly or run can fail
    #[derive(Debug, Clone, PartialEq)]
    pub enum SublanqError {
        // Source and character stream errors
        Io(String),

        // Program file errors
        Format { token: String, position: usize },

        // Runtime errors
        IndexOutOfRange { pc: i64, index: i64, size: usize },

        // Display collaborator errors
        DisplayInit(String),

        // Assembler errors
        Assembly { line: usize, message: String },

        // Command line errors
        Config(String),
    }

    impl fmt::Display for SublanqError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                SublanqError::Io(msg) => write!(f, "{}", msg),
                SublanqError::Format { token, position } => {
                    write!(f, "Invalid integer {:?} at token {}", token, position)
                }
                SublanqError::IndexOutOfRange { pc, index, size } => write!(
                    f,
                    "Memory access out of bounds at instruction {}: index {} (size {})",
                    pc, index, size
                ),
                SublanqError::DisplayInit(msg) => {
                    write!(f, "Display initialization failed: {}", msg)
                }
                SublanqError::Assembly { line, message } => {
                    write!(f, "Assembler error at line {}: {}", line, message)
                }
                SublanqError::Config(msg) => write!(f, "{}", msg),
            }
        }
    }

    impl std::error::Error for SublanqError {}

    impl From<io::Error> for SublanqError {
        fn from(err: io::Error) -> Self {
            SublanqError::Io(err.to_string())
        }
    }
}
