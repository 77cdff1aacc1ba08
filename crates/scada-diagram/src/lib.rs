//! Animated P&ID diagram for the SCADA monitor.
//!
//! The renderer turns a snapshot and a timestamp into draw commands for a
//! `Canvas`. `FrameLoop` redraws on a fixed tick so animation continues
//! between data updates.

pub mod canvas;
pub mod clock;
pub mod error;
pub mod frame_loop;
pub mod palette;
pub mod renderer;
pub mod svg;

pub use canvas::{Canvas, Color, DrawCommand, Point, RecordingCanvas, Stroke, TextAlign};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DiagramError, DiagramResult};
pub use frame_loop::{FrameLoop, FrameLoopConfig, FrameLoopHandle, SvgExport, MAX_FPS};
pub use palette::ValveState;
pub use renderer::{DiagramRenderer, DEFAULT_WIDTH, DIAGRAM_HEIGHT};
pub use svg::SvgCanvas;
