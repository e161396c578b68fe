//! Memory-mapped I/O ports
//!
//! The VM exchanges single integers with the outside world through numbered
//! ports. The port table:
//!
//! | port | input | output |
//! |------|-------|--------|
//! | 0 | next byte of the character stream (-1 at end) | byte 0-255 to the character stream |
//! | 1 | code of the held key, 27 after a close request, else 0 | gradient pixel at the raster cursor |
//! | 2 | random `u32` | present the raster and poll events |
//!
//! Any other port reads as 0 and ignores writes.

use crate::config::Config;
use crate::display::{check_size, Display, Key, Rgb};
use crate::error::Result;
use crate::terminal::TerminalMode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, ErrorKind, Read, Stdin, Stdout, Write};

/// Character stream port
pub const PORT_CHAR: i64 = 0;
/// Raster and keyboard port
pub const PORT_PIXEL: i64 = 1;
/// Random source and present port
pub const PORT_SYSTEM: i64 = 2;

/// Key codes reported on port 1, in the order they are checked
pub const KEY_CODES: [(Key, i64); 6] = [
    (Key::Up, 128),
    (Key::Down, 129),
    (Key::Left, 130),
    (Key::Right, 131),
    (Key::Enter, 10),
    (Key::Escape, 27),
];

/// Code reported on port 1 once the display asked to close
pub const CLOSE_CODE: i64 = 27;

/// The two operations the VM uses for I/O instructions
pub trait Ports {
    /// Value for an input instruction on `port`
    fn input(&mut self, port: i64) -> Result<i64>;

    /// Deliver the value of an output instruction on `port`
    fn output(&mut self, port: i64, value: i64) -> Result<()>;
}

/// Map a byte onto the black -> accent -> white gradient
///
/// Values outside 0..=255 are clamped first.
pub fn gradient(value: i64, accent: Rgb) -> Rgb {
    let t = value.clamp(0, 255) as f32 / 255.0;
    let channel = |a: u8| -> u8 {
        let a = a as f32;
        if t < 0.5 {
            (a * (t * 2.0)) as u8
        } else {
            (a + (255.0 - a) * ((t - 0.5) * 2.0)) as u8
        }
    };
    Rgb::new(channel(accent.r), channel(accent.g), channel(accent.b))
}

/// Port adapter backed by a character stream, a display and a random source
///
/// Owns all device state: the raster cursor, the terminal mode guard, the
/// random generator and the last close request seen from the display.
pub struct PortAdapter<D: Display, R: Read, W: Write> {
    display: D,
    reader: R,
    writer: W,
    terminal: TerminalMode,
    rng: StdRng,
    accent: Rgb,
    width: usize,
    height: usize,
    cursor: (usize, usize),
    close_requested: bool,
}

impl<D: Display> PortAdapter<D, Stdin, Stdout> {
    /// Adapter on the process's stdin and stdout
    ///
    /// Stdin is switched to cbreak mode the first time port 0 is read, and
    /// restored when the adapter is dropped.
    pub fn stdio(display: D, config: &Config) -> Result<Self> {
        let mut adapter = Self::new(display, io::stdin(), io::stdout(), config)?;
        adapter.terminal = TerminalMode::Stdin(None);
        Ok(adapter)
    }
}

impl<D: Display, R: Read, W: Write> PortAdapter<D, R, W> {
    /// Initialize the display and build an adapter over the given streams
    ///
    /// Fails with `DisplayInit` for an empty or oversized raster.
    pub fn new(mut display: D, reader: R, writer: W, config: &Config) -> Result<Self> {
        check_size(config.width, config.height)?;
        display.init(&config.title, config.width, config.height)?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            display,
            reader,
            writer,
            terminal: TerminalMode::Unmanaged,
            rng,
            accent: config.accent,
            width: config.width,
            height: config.height,
            cursor: (0, 0),
            close_requested: false,
        })
    }

    /// Current raster cursor as (x, y)
    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn read_char(&mut self) -> Result<i64> {
        self.terminal.engage();
        let mut byte = [0u8; 1];
        match self.reader.read_exact(&mut byte) {
            Ok(()) => Ok(byte[0] as i64),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(-1),
            Err(e) => Err(e.into()),
        }
    }

    fn write_char(&mut self, value: i64) -> Result<()> {
        if let Ok(byte) = u8::try_from(value) {
            self.writer.write_all(&[byte])?;
            self.writer.flush()?;
        }
        Ok(())
    }

    fn held_key(&self) -> i64 {
        KEY_CODES
            .iter()
            .find(|(key, _)| self.display.is_key_held(*key))
            .map(|(_, code)| *code)
            .unwrap_or(if self.close_requested { CLOSE_CODE } else { 0 })
    }

    fn paint(&mut self, value: i64) {
        let (x, y) = self.cursor;
        self.display.set_pixel(x, y, gradient(value, self.accent));

        let x = (x + 1) % self.width;
        let y = if x == 0 { (y + 1) % self.height } else { y };
        self.cursor = (x, y);
    }

    fn present(&mut self) -> Result<()> {
        if self.display.present_and_poll()? {
            if !self.close_requested {
                log::debug!("display requested close");
            }
            self.close_requested = true;
        }
        Ok(())
    }
}

impl<D: Display, R: Read, W: Write> Ports for PortAdapter<D, R, W> {
    fn input(&mut self, port: i64) -> Result<i64> {
        match port {
            PORT_CHAR => self.read_char(),
            PORT_PIXEL => Ok(self.held_key()),
            PORT_SYSTEM => Ok(i64::from(self.rng.gen::<u32>())),
            _ => Ok(0),
        }
    }

    fn output(&mut self, port: i64, value: i64) -> Result<()> {
        match port {
            PORT_CHAR => self.write_char(value),
            PORT_PIXEL => {
                self.paint(value);
                Ok(())
            }
            PORT_SYSTEM => self.present(),
            _ => Ok(()),
        }
    }
}

impl<D: Display, R: Read, W: Write> Drop for PortAdapter<D, R, W> {
    fn drop(&mut self) {
        self.display.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{Framebuffer, HeadlessDisplay};
    use crate::error::SublanqError;
    use quickcheck_macros::quickcheck;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Display that counts `cleanup` calls and accepts any raster size
    struct CleanupCounter {
        framebuffer: Framebuffer,
        cleanups: Rc<Cell<usize>>,
    }

    impl Display for CleanupCounter {
        fn init(&mut self, _title: &str, width: usize, height: usize) -> Result<()> {
            self.framebuffer = Framebuffer::new(width, height);
            Ok(())
        }

        fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) {
            self.framebuffer.set_pixel(x, y, color);
        }

        fn present_and_poll(&mut self) -> Result<bool> {
            Ok(false)
        }

        fn is_key_held(&self, _key: Key) -> bool {
            false
        }

        fn framebuffer(&self) -> &Framebuffer {
            &self.framebuffer
        }

        fn cleanup(&mut self) {
            self.cleanups.set(self.cleanups.get() + 1);
        }
    }

    fn counter() -> (CleanupCounter, Rc<Cell<usize>>) {
        let cleanups = Rc::new(Cell::new(0));
        let display = CleanupCounter {
            framebuffer: Framebuffer::default(),
            cleanups: Rc::clone(&cleanups),
        };
        (display, cleanups)
    }

    fn adapter(input: &[u8]) -> PortAdapter<HeadlessDisplay, &[u8], Vec<u8>> {
        let config = Config {
            width: 4,
            height: 2,
            seed: Some(1),
            ..Config::default()
        };
        PortAdapter::new(HeadlessDisplay::new(), input, Vec::new(), &config).unwrap()
    }

    #[test]
    fn test_gradient_endpoints() {
        let accent = Rgb::new(0, 128, 255);
        assert_eq!(gradient(0, accent), Rgb::BLACK);
        assert_eq!(gradient(255, accent), Rgb::WHITE);

        // 128 sits just past the middle stop
        let mid = gradient(128, accent);
        assert!(mid.r <= 1);
        assert_eq!((mid.g, mid.b), (128, 255));
    }

    #[test]
    fn test_gradient_follows_accent() {
        let accent = Rgb::new(200, 40, 10);
        assert_eq!(gradient(128, accent), accent);
        // Halfway to the accent from black
        assert_eq!(gradient(64, accent), Rgb::new(100, 20, 5));
        // Clamped
        assert_eq!(gradient(-5, accent), Rgb::BLACK);
        assert_eq!(gradient(1000, accent), Rgb::WHITE);
    }

    #[quickcheck]
    fn prop_gradient_clamps(value: i64) -> bool {
        let accent = Rgb::new(0, 128, 255);
        gradient(value, accent) == gradient(value.clamp(0, 255), accent)
    }

    #[test]
    fn test_char_output_range() {
        let mut ports = adapter(b"");
        ports.output(PORT_CHAR, 65).unwrap();
        ports.output(PORT_CHAR, 256).unwrap();
        ports.output(PORT_CHAR, -1).unwrap();
        ports.output(PORT_CHAR, 255).unwrap();
        assert_eq!(ports.writer().as_slice(), &[0x41, 0xFF]);
    }

    #[test]
    fn test_char_input_and_end_of_stream() {
        let mut ports = adapter(b"hi");
        assert_eq!(ports.input(PORT_CHAR).unwrap(), 'h' as i64);
        assert_eq!(ports.input(PORT_CHAR).unwrap(), 'i' as i64);
        assert_eq!(ports.input(PORT_CHAR).unwrap(), -1);
    }

    #[test]
    fn test_unknown_ports() {
        let mut ports = adapter(b"x");
        assert_eq!(ports.input(7).unwrap(), 0);
        assert_eq!(ports.input(-3).unwrap(), 0);
        ports.output(9, 65).unwrap();
        assert!(ports.writer().is_empty());
        assert_eq!(ports.cursor(), (0, 0));
    }

    #[test]
    fn test_cursor_wraps_rows_and_origin() {
        let mut ports = adapter(b"");
        for _ in 0..3 {
            ports.output(PORT_PIXEL, 255).unwrap();
        }
        assert_eq!(ports.cursor(), (3, 0));
        ports.output(PORT_PIXEL, 255).unwrap();
        assert_eq!(ports.cursor(), (0, 1));
        for _ in 0..4 {
            ports.output(PORT_PIXEL, 0).unwrap();
        }
        assert_eq!(ports.cursor(), (0, 0));

        let fb = ports.display().framebuffer();
        assert_eq!(fb.get_pixel(3, 0), Some(Rgb::WHITE));
        assert_eq!(fb.get_pixel(3, 1), Some(Rgb::BLACK));
    }

    #[test]
    fn test_held_key_codes() {
        let mut ports = adapter(b"");
        assert_eq!(ports.input(PORT_PIXEL).unwrap(), 0);

        ports.display_mut().press(Key::Enter);
        assert_eq!(ports.input(PORT_PIXEL).unwrap(), 10);

        // Arrows win over enter
        ports.display_mut().press(Key::Right);
        assert_eq!(ports.input(PORT_PIXEL).unwrap(), 131);

        ports.display_mut().release(Key::Right);
        ports.display_mut().release(Key::Enter);
        ports.display_mut().press(Key::Escape);
        assert_eq!(ports.input(PORT_PIXEL).unwrap(), 27);
    }

    #[test]
    fn test_close_request_reads_as_escape() {
        let mut ports = adapter(b"");
        ports.display_mut().request_close();
        // Not visible until the next poll
        assert_eq!(ports.input(PORT_PIXEL).unwrap(), 0);
        ports.output(PORT_SYSTEM, 0).unwrap();
        assert_eq!(ports.input(PORT_PIXEL).unwrap(), CLOSE_CODE);
        assert_eq!(ports.display().presents(), 1);
    }

    #[test]
    fn test_random_is_seeded_and_unsigned() {
        let mut a = adapter(b"");
        let mut b = adapter(b"");
        for _ in 0..16 {
            let value = a.input(PORT_SYSTEM).unwrap();
            assert_eq!(value, b.input(PORT_SYSTEM).unwrap());
            assert!((0..=u32::MAX as i64).contains(&value));
        }
    }

    #[test]
    fn test_display_init_failure() {
        let result = PortAdapter::new(
            HeadlessDisplay::failing("no window"),
            io::empty(),
            io::sink(),
            &Config::default(),
        );
        assert!(matches!(result, Err(SublanqError::DisplayInit(_))));
    }

    #[test]
    fn test_drop_cleans_up_display() {
        let (display, cleanups) = counter();
        let ports = PortAdapter::new(display, io::empty(), io::sink(), &Config::default()).unwrap();
        assert_eq!(cleanups.get(), 0);
        drop(ports);
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn test_empty_raster_is_rejected() {
        // Even a display that would accept it never sees a zero width
        let (display, cleanups) = counter();
        let config = Config {
            width: 0,
            ..Config::default()
        };
        let result = PortAdapter::new(display, io::empty(), io::sink(), &config);
        assert!(matches!(result, Err(SublanqError::DisplayInit(_))));
        assert_eq!(cleanups.get(), 0);
    }

    #[test]
    fn test_oversized_raster_is_rejected() {
        let config = Config {
            width: usize::MAX,
            height: usize::MAX,
            ..Config::default()
        };
        let result = PortAdapter::new(HeadlessDisplay::new(), io::empty(), io::sink(), &config);
        assert!(matches!(result, Err(SublanqError::DisplayInit(_))));
    }

    #[test]
    fn test_display_title_from_config() {
        let ports = adapter(b"");
        assert_eq!(ports.display().title(), "SUBLANQ");
        assert_eq!(ports.display().framebuffer().width(), 4);
    }
}
