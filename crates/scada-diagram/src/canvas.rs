//! Drawing surface abstraction.
//!
//! The renderer emits a flat list of `DrawCommand`s per frame. A `Canvas`
//! turns them into pixels, SVG, or (in tests) just records them.

/// Colours are CSS hex strings from the palette.
pub type Color = &'static str;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Outline drawn around a filled shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

/// One primitive drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Fill the whole surface.
    Clear {
        width: f64,
        height: f64,
        color: Color,
    },
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Color,
    },
    StrokeRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        stroke: Stroke,
    },
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    /// Closed filled polygon.
    Polygon {
        points: Vec<Point>,
        fill: Color,
        stroke: Option<Stroke>,
    },
    Circle {
        center: Point,
        radius: f64,
        fill: Color,
        stroke: Option<Stroke>,
    },
    /// `position` is the text baseline anchor.
    Text {
        position: Point,
        text: String,
        color: Color,
        font_px: f64,
        align: TextAlign,
    },
}

/// A drawing surface.
pub trait Canvas {
    /// Called once before the commands of each frame.
    fn begin_frame(&mut self, _width: f64, _height: f64) {}

    fn draw(&mut self, command: DrawCommand);
}

/// Canvas that keeps the commands of the last frame.
#[derive(Debug, Default, Clone)]
pub struct RecordingCanvas {
    commands: Vec<DrawCommand>,
    frames: u64,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands of the most recent frame.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Frames started so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Text commands, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for RecordingCanvas {
    fn begin_frame(&mut self, _width: f64, _height: f64) {
        self.commands.clear();
        self.frames += 1;
    }

    fn draw(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}
