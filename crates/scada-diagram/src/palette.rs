//! Diagram colours.

use scada_core::{LineStatus, SensorStatus};

use crate::canvas::Color;

pub const BACKGROUND: Color = "#1e242e";
pub const LABEL: Color = "#8b95a5";
pub const SENSOR_LABEL: Color = "#e6e8eb";
pub const OUTLINE: Color = "#fff";

pub const ACTIVE: Color = "#45aaf2";
pub const INACTIVE: Color = "#636e72";
pub const OK: Color = "#26de81";
pub const WARN: Color = "#fed330";
pub const DANGER: Color = "#ff4757";
pub const FAULT: Color = "#a55eea";

/// Valve position shown on the diamond glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveState {
    Open,
    Closed,
    Stuck,
}

impl ValveState {
    /// Stopped and unknown lines show a closed valve; an alarmed line shows
    /// it stuck.
    pub fn for_line(status: LineStatus) -> Self {
        match status {
            LineStatus::Stopped | LineStatus::Unknown => Self::Closed,
            LineStatus::Alarm => Self::Stuck,
            LineStatus::Running | LineStatus::Warning => Self::Open,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Open => OK,
            Self::Stuck => DANGER,
            Self::Closed => INACTIVE,
        }
    }
}

/// Pipe and flow marker colour.
pub fn pipe_color(running: bool) -> Color {
    if running {
        ACTIVE
    } else {
        INACTIVE
    }
}

pub fn motor_color(running: bool) -> Color {
    if running {
        OK
    } else {
        INACTIVE
    }
}

pub fn pump_color(running: bool) -> Color {
    pipe_color(running)
}

/// Sensor square colour. Unknown statuses render gray.
pub fn sensor_color(status: SensorStatus) -> Color {
    match status {
        SensorStatus::Normal => OK,
        SensorStatus::High => WARN,
        SensorStatus::Critical => DANGER,
        SensorStatus::Fault => FAULT,
        SensorStatus::Unknown => INACTIVE,
    }
}
