//! Display collaborators for the pixel ports
//!
//! Port 1 paints into a raster and port 2 presents it. The VM side only sees the
//! [`Display`] trait; which backend sits behind it is chosen at startup.

use crate::error::{Result, SublanqError};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Default raster width
pub const DEFAULT_WIDTH: usize = 128;
/// Default raster height
pub const DEFAULT_HEIGHT: usize = 128;
/// Largest accepted raster width or height
pub const MAX_DIMENSION: usize = 4096;

/// Check a raster size before anything is allocated for it
pub fn check_size(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(SublanqError::DisplayInit(format!(
            "raster size {}x{} outside 1x1..{}x{}",
            width, height, MAX_DIMENSION, MAX_DIMENSION
        )));
    }
    Ok(())
}

/// A 24-bit color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `RRGGBB` or `#RRGGBB`
    pub fn from_hex(text: &str) -> Option<Self> {
        let hex = text.strip_prefix('#').unwrap_or(text);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Keys the display can report as held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Escape,
}

/// Capability set of a pixel display backend
pub trait Display {
    /// Open the display with a title and raster size
    fn init(&mut self, title: &str, width: usize, height: usize) -> Result<()>;

    /// Write one pixel into the back buffer
    fn set_pixel(&mut self, x: usize, y: usize, color: Rgb);

    /// Show the back buffer and drain pending events; returns true once closing was requested
    fn present_and_poll(&mut self) -> Result<bool>;

    /// Whether `key` is currently held down
    fn is_key_held(&self, key: Key) -> bool;

    /// The back buffer as painted so far
    fn framebuffer(&self) -> &Framebuffer;

    /// Release backend resources
    fn cleanup(&mut self);
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn init(&mut self, title: &str, width: usize, height: usize) -> Result<()> {
        (**self).init(title, width, height)
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) {
        (**self).set_pixel(x, y, color)
    }

    fn present_and_poll(&mut self) -> Result<bool> {
        (**self).present_and_poll()
    }

    fn is_key_held(&self, key: Key) -> bool {
        (**self).is_key_held(key)
    }

    fn framebuffer(&self) -> &Framebuffer {
        (**self).framebuffer()
    }

    fn cleanup(&mut self) {
        (**self).cleanup()
    }
}

/// In-memory RGB raster
#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    /// Row-major pixels
    pixels: Vec<Rgb>,
    width: usize,
    height: usize,
}

impl Framebuffer {
    /// Create a black framebuffer
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![Rgb::BLACK; width * height],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Set a pixel; coordinates outside the raster are ignored
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    /// Get a pixel, or None outside the raster
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Write the raster as a binary PPM (P6) image
    pub fn write_ppm<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "P6 {} {} 255", self.width, self.height)?;
        for pixel in &self.pixels {
            out.write_all(&[pixel.r, pixel.g, pixel.b])?;
        }
        out.flush()
    }

    /// Save the raster as a PPM file at `path`
    pub fn save_ppm(&self, path: &Path) -> Result<()> {
        let to_error = |e: io::Error| SublanqError::Io(format!("{}: {}", path.display(), e));
        let mut out = BufWriter::new(File::create(path).map_err(to_error)?);
        self.write_ppm(&mut out).map_err(to_error)?;
        log::debug!("saved {}x{} raster to {}", self.width, self.height, path.display());
        Ok(())
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// A display with no window: pixels land in a framebuffer, keys are scripted
#[derive(Debug, Clone, Default)]
pub struct HeadlessDisplay {
    framebuffer: Framebuffer,
    title: String,
    held: Vec<Key>,
    close_requested: bool,
    presents: usize,
    init_failure: Option<String>,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// A display whose `init` fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            init_failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of presents so far
    pub fn presents(&self) -> usize {
        self.presents
    }

    pub fn press(&mut self, key: Key) {
        if !self.held.contains(&key) {
            self.held.push(key);
        }
    }

    pub fn release(&mut self, key: Key) {
        self.held.retain(|held| *held != key);
    }

    /// Behave as if the user closed the window
    pub fn request_close(&mut self) {
        self.close_requested = true;
    }
}

impl Display for HeadlessDisplay {
    fn init(&mut self, title: &str, width: usize, height: usize) -> Result<()> {
        if let Some(message) = &self.init_failure {
            return Err(SublanqError::DisplayInit(message.clone()));
        }
        check_size(width, height)?;
        self.title = title.to_string();
        self.framebuffer = Framebuffer::new(width, height);
        Ok(())
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) {
        self.framebuffer.set_pixel(x, y, color);
    }

    fn present_and_poll(&mut self) -> Result<bool> {
        self.presents += 1;
        Ok(self.close_requested)
    }

    fn is_key_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    fn cleanup(&mut self) {
        self.held.clear();
    }
}

/// Draws the raster on a true-color terminal, two pixels per character cell
///
/// The terminal is used for output only, so no key is ever reported held.
#[derive(Debug)]
pub struct AnsiDisplay<W: Write> {
    out: W,
    framebuffer: Framebuffer,
}

impl<W: Write> AnsiDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            framebuffer: Framebuffer::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self) -> std::io::Result<()> {
        let mut frame = String::from("\x1b[H");
        let fb = &self.framebuffer;
        for y in (0..fb.height()).step_by(2) {
            for x in 0..fb.width() {
                let top = fb.get_pixel(x, y).unwrap_or_default();
                let bottom = fb.get_pixel(x, y + 1).unwrap_or_default();
                frame.push_str(&format!(
                    "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m▀",
                    top.r, top.g, top.b, bottom.r, bottom.g, bottom.b
                ));
            }
            frame.push_str("\x1b[0m\r\n");
        }
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write> Display for AnsiDisplay<W> {
    fn init(&mut self, title: &str, width: usize, height: usize) -> Result<()> {
        check_size(width, height)?;
        self.framebuffer = Framebuffer::new(width, height);
        // Clear the screen, hide the cursor and set the window title
        write!(self.out, "\x1b[2J\x1b[?25l\x1b]0;{}\x07", title)
            .and_then(|_| self.out.flush())
            .map_err(|e| SublanqError::DisplayInit(e.to_string()))
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) {
        self.framebuffer.set_pixel(x, y, color);
    }

    fn present_and_poll(&mut self) -> Result<bool> {
        self.draw()?;
        Ok(false)
    }

    fn is_key_held(&self, _key: Key) -> bool {
        false
    }

    fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    fn cleanup(&mut self) {
        if let Err(e) = write!(self.out, "\x1b[0m\x1b[?25h").and_then(|_| self.out.flush()) {
            log::warn!("failed to reset terminal colors: {}", e);
        }
    }
}
