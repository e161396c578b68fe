//! Terminal mode handling
//!
//! Port 0 reads single characters, so stdin has to leave canonical mode while a
//! program is reading it. The mode is held by a guard and restored on drop.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use termios::{tcsetattr, Termios, ECHO, ICANON, TCSANOW};

/// Cbreak mode held on a terminal file descriptor
#[derive(Debug)]
pub struct CbreakGuard {
    fd: RawFd,
    saved: Termios,
}

impl CbreakGuard {
    /// Disable line buffering and echo on `fd`, remembering the previous mode
    pub fn acquire(fd: RawFd) -> io::Result<Self> {
        let saved = Termios::from_fd(fd)?;
        let mut cbreak = saved;
        cbreak.c_lflag &= !(ICANON | ECHO);
        tcsetattr(fd, TCSANOW, &cbreak)?;
        Ok(Self { fd, saved })
    }

    /// Put the process's stdin into cbreak mode
    pub fn stdin() -> io::Result<Self> {
        Self::acquire(io::stdin().as_raw_fd())
    }
}

impl Drop for CbreakGuard {
    fn drop(&mut self) {
        if let Err(e) = tcsetattr(self.fd, TCSANOW, &self.saved) {
            log::warn!("failed to restore terminal mode: {}", e);
        }
    }
}

/// Whether and how the character input stream's terminal is managed
#[derive(Debug)]
pub enum TerminalMode {
    /// The stream is not a terminal we own (pipes, tests, or a failed acquire)
    Unmanaged,
    /// Stdin, switched to cbreak on first use
    Stdin(Option<CbreakGuard>),
}

impl TerminalMode {
    /// Switch to cbreak mode if this mode manages a terminal and has not yet done so
    pub fn engage(&mut self) {
        if let TerminalMode::Stdin(None) = self {
            match CbreakGuard::stdin() {
                Ok(guard) => {
                    log::debug!("stdin switched to cbreak mode");
                    *self = TerminalMode::Stdin(Some(guard));
                }
                Err(e) => {
                    // Not a terminal; read it as a plain stream from now on
                    log::debug!("stdin left in its current mode: {}", e);
                    *self = TerminalMode::Unmanaged;
                }
            }
        }
    }
}
