//! Headless reference host.
//!
//! `Hardware` keeps a 160x160 framebuffer of palette indices, the state of
//! the six buttons, a record of everything the cartridge asked for that it
//! cannot rasterize itself (sprites, text, sound), and a bounded log
//! console. Nothing here opens a window; a front end reads the framebuffer
//! and the draw list and renders them however it likes.

use std::collections::VecDeque;

use crate::bytecode::syscall::{BUTTON_COUNT, PALETTE_SIZE};
use crate::runtime::host::Host;

pub const WIDTH: usize = 160;
pub const HEIGHT: usize = 160;

/// Log console capacity; older lines scroll away.
pub const LOG_CAPACITY: usize = 100;

pub type Rgb = (u8, u8, u8);

/// 16 classic colors followed by 16 extended ones.
pub const PALETTE: [Rgb; PALETTE_SIZE] = [
    (0, 0, 0),
    (29, 43, 83),
    (126, 37, 83),
    (0, 135, 81),
    (171, 82, 54),
    (95, 87, 79),
    (194, 195, 199),
    (255, 241, 232),
    (255, 0, 77),
    (255, 163, 0),
    (255, 236, 39),
    (0, 228, 54),
    (41, 173, 255),
    (131, 118, 156),
    (255, 119, 168),
    (255, 204, 170),
    (41, 24, 20),
    (17, 29, 53),
    (66, 33, 54),
    (18, 83, 89),
    (116, 47, 41),
    (73, 51, 59),
    (162, 136, 121),
    (243, 239, 125),
    (190, 18, 80),
    (255, 108, 36),
    (168, 231, 46),
    (0, 181, 67),
    (6, 90, 181),
    (117, 70, 101),
    (255, 110, 89),
    (255, 157, 129),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
    Up,
    Down,
    A,
    B,
}

impl Button {
    pub const ALL: [Button; BUTTON_COUNT] = [
        Button::Left,
        Button::Right,
        Button::Up,
        Button::Down,
        Button::A,
        Button::B,
    ];

    /// The id `btn` takes for this button.
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// A request the framebuffer alone cannot represent.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    Sprite {
        sprite: f64,
        x: f64,
        y: f64,
    },
    Text {
        text: String,
        x: f64,
        y: f64,
        color: u8,
        small: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
    System,
}

impl LogLevel {
    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::System => "SYSTEM",
        }
    }

    /// Palette index the console draws this level in.
    pub fn color(self) -> u8 {
        match self {
            LogLevel::Info => 7,
            LogLevel::Success => 11,
            LogLevel::Warn => 9,
            LogLevel::Error => 8,
            LogLevel::System => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// Scrolling log console.
#[derive(Debug, Clone, Default)]
pub struct LogConsole {
    lines: VecDeque<LogLine>,
}

impl LogConsole {
    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        if self.lines.len() == LOG_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(LogLine {
            level,
            message: message.into(),
        });
    }

    pub fn lines(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn last(&self) -> Option<&LogLine> {
        self.lines.back()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

pub struct Hardware {
    framebuffer: Vec<u8>,
    buttons: [bool; BUTTON_COUNT],
    draws: Vec<DrawCmd>,
    sounds: Vec<f64>,
    console: LogConsole,
}

impl Default for Hardware {
    fn default() -> Self {
        Self::new()
    }
}

impl Hardware {
    pub fn new() -> Self {
        let mut console = LogConsole::default();
        console.push(LogLevel::System, "Spark System v1.0 Ready");
        Self {
            framebuffer: vec![0; WIDTH * HEIGHT],
            buttons: [false; BUTTON_COUNT],
            draws: Vec::new(),
            sounds: Vec::new(),
            console,
        }
    }

    /// Fills the screen with color 0 and forgets recorded draws and sounds.
    pub fn clear_screen(&mut self) {
        self.framebuffer.fill(0);
        self.draws.clear();
        self.sounds.clear();
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        if x < WIDTH && y < HEIGHT {
            Some(self.framebuffer[y * WIDTH + x])
        } else {
            None
        }
    }

    /// Row-major palette indices, `WIDTH * HEIGHT` of them.
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    /// The framebuffer resolved through the palette, 3 bytes per pixel.
    pub fn to_rgb(&self) -> Vec<u8> {
        self.framebuffer
            .iter()
            .flat_map(|&c| {
                let (r, g, b) = PALETTE[c as usize % PALETTE_SIZE];
                [r, g, b]
            })
            .collect()
    }

    /// Pixel count per palette index.
    pub fn color_histogram(&self) -> [usize; PALETTE_SIZE] {
        let mut counts = [0; PALETTE_SIZE];
        for &c in &self.framebuffer {
            counts[c as usize % PALETTE_SIZE] += 1;
        }
        counts
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.buttons[button.id() as usize] = pressed;
    }

    pub fn release_all(&mut self) {
        self.buttons = [false; BUTTON_COUNT];
    }

    pub fn draws(&self) -> &[DrawCmd] {
        &self.draws
    }

    pub fn sounds(&self) -> &[f64] {
        &self.sounds
    }

    pub fn console(&self) -> &LogConsole {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut LogConsole {
        &mut self.console
    }
}

impl Host for Hardware {
    fn pset(&mut self, x: f64, y: f64, color: u8) {
        let (x, y) = (x.floor(), y.floor());
        // clip
        if x < 0.0 || y < 0.0 || x >= WIDTH as f64 || y >= HEIGHT as f64 {
            return;
        }
        self.framebuffer[y as usize * WIDTH + x as usize] = color % PALETTE_SIZE as u8;
    }

    fn spr(&mut self, sprite: f64, x: f64, y: f64) {
        self.draws.push(DrawCmd::Sprite { sprite, x, y });
    }

    fn btn(&mut self, button: u8) -> bool {
        self.buttons.get(button as usize).copied().unwrap_or(false)
    }

    fn cls(&mut self) {
        self.clear_screen();
    }

    fn print(&mut self, text: &str, x: f64, y: f64, color: u8, small: bool) {
        self.draws.push(DrawCmd::Text {
            text: text.to_string(),
            x,
            y,
            color,
            small,
        });
    }

    fn sfx(&mut self, id: f64) {
        self.sounds.push(id);
    }

    fn log(&mut self, message: &str) {
        log::info!(target: "cart", "{}", message);
        self.console.push(LogLevel::Info, message);
    }
}
