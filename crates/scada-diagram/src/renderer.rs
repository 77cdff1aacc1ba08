//! P&ID diagram renderer.
//!
//! Each frame is a pure function of (snapshot, time, size): one horizontal
//! pipe per process line with flow markers and four equipment glyphs. Time
//! only drives the animation (flow offset and motor rotation), so frames
//! keep moving between data updates.

use std::f64::consts::TAU;

use scada_core::{ProcessLine, SensorStatus, Snapshot};

use crate::canvas::{Canvas, DrawCommand, Point, Stroke, TextAlign};
use crate::palette::{self, ValveState};

pub const DEFAULT_WIDTH: f64 = 800.0;
/// Diagram height is fixed; only the width follows the container.
pub const DIAGRAM_HEIGHT: f64 = 400.0;

/// Horizontal inset of the pipe from each edge.
pub const PIPE_MARGIN: f64 = 60.0;
pub const PIPE_WIDTH: f64 = 4.0;

pub const FLOW_MARKERS: usize = 5;
/// Markers closer than this to the pipe end are not drawn.
pub const FLOW_END_CLEARANCE: f64 = 20.0;
/// Flow offset advances one pixel per this many milliseconds.
pub const FLOW_MS_PER_PX: f64 = 20.0;
/// Motor indicator advances one radian per this many milliseconds.
pub const MOTOR_MS_PER_RAD: f64 = 100.0;

/// Glyph positions as fractions of pipe length: motor, valve, sensor, pump.
pub const EQUIPMENT_POSITIONS: [f64; 4] = [0.15, 0.35, 0.55, 0.75];

const MOTOR_RADIUS: f64 = 16.0;
const VALVE_HALF: f64 = 14.0;
const SENSOR_HALF: f64 = 10.0;
const PUMP_HALF: f64 = 14.0;

const LABEL_FONT_PX: f64 = 12.0;
const GLYPH_FONT_PX: f64 = 9.0;

const GLYPH_OUTLINE: Stroke = Stroke {
    color: palette::OUTLINE,
    width: 1.5,
};

/// Stateless apart from the surface size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagramRenderer {
    width: f64,
    height: f64,
}

impl Default for DiagramRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH)
    }
}

impl DiagramRenderer {
    pub fn new(width: f64) -> Self {
        let mut renderer = Self {
            width: DEFAULT_WIDTH,
            height: DIAGRAM_HEIGHT,
        };
        renderer.resize(width);
        renderer
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Match the container width. Returns `true` if the size changed.
    pub fn resize(&mut self, parent_width: f64) -> bool {
        let width = if parent_width.is_finite() {
            parent_width.max(1.0)
        } else {
            DEFAULT_WIDTH
        };
        let changed = width != self.width || self.height != DIAGRAM_HEIGHT;
        self.width = width;
        self.height = DIAGRAM_HEIGHT;
        changed
    }

    fn pipe_start(&self) -> f64 {
        PIPE_MARGIN
    }

    fn pipe_end(&self) -> f64 {
        self.width - PIPE_MARGIN
    }

    /// Flow marker spacing along the pipe.
    pub fn flow_spacing(&self) -> f64 {
        (self.pipe_end() - self.pipe_start()) / FLOW_MARKERS as f64
    }

    /// Offset of the first flow marker at `now_ms`, in `[0, spacing)`.
    pub fn flow_offset(&self, now_ms: u64) -> f64 {
        let spacing = self.flow_spacing();
        if spacing <= 0.0 {
            return 0.0;
        }
        (now_ms as f64 / FLOW_MS_PER_PX) % spacing
    }

    /// X positions of the flow markers drawn at `now_ms`.
    pub fn flow_marker_xs(&self, now_ms: u64) -> Vec<f64> {
        let spacing = self.flow_spacing();
        if spacing <= 0.0 {
            return Vec::new();
        }
        let offset = self.flow_offset(now_ms);
        let limit = self.pipe_end() - FLOW_END_CLEARANCE;
        (0..FLOW_MARKERS)
            .map(|a| self.pipe_start() + a as f64 * spacing + offset)
            .filter(|x| *x < limit)
            .collect()
    }

    /// Motor indicator angle in radians at `now_ms`.
    pub fn motor_angle(now_ms: u64) -> f64 {
        (now_ms as f64 / MOTOR_MS_PER_RAD) % TAU
    }

    /// Draw one frame.
    ///
    /// With no snapshot, or a snapshot without lines, only the background
    /// is drawn.
    pub fn draw(&self, snapshot: Option<&Snapshot>, now_ms: u64, canvas: &mut dyn Canvas) {
        canvas.begin_frame(self.width, self.height);
        canvas.draw(DrawCommand::Clear {
            width: self.width,
            height: self.height,
            color: palette::BACKGROUND,
        });

        let Some(snapshot) = snapshot else {
            return;
        };
        if snapshot.lines.is_empty() {
            return;
        }

        let slot = self.height / snapshot.lines.len() as f64;
        for (i, line) in snapshot.lines.iter().enumerate() {
            let y = i as f64 * slot + slot / 2.0;
            self.draw_line(line, y, now_ms, canvas);
        }
    }

    fn draw_line(&self, line: &ProcessLine, y: f64, now_ms: u64, canvas: &mut dyn Canvas) {
        let running = line.status.is_running();
        let x_start = self.pipe_start();
        let x_end = self.pipe_end();
        let pipe_len = x_end - x_start;

        canvas.draw(DrawCommand::Text {
            position: Point::new(10.0, y + 4.0),
            text: line.id.clone(),
            color: palette::LABEL,
            font_px: LABEL_FONT_PX,
            align: TextAlign::Left,
        });

        canvas.draw(DrawCommand::Line {
            from: Point::new(x_start, y),
            to: Point::new(x_end, y),
            stroke: Stroke {
                color: palette::pipe_color(running),
                width: PIPE_WIDTH,
            },
        });

        if running {
            for ax in self.flow_marker_xs(now_ms) {
                canvas.draw(DrawCommand::Polygon {
                    points: vec![
                        Point::new(ax, y - 4.0),
                        Point::new(ax + 8.0, y),
                        Point::new(ax, y + 4.0),
                    ],
                    fill: palette::ACTIVE,
                    stroke: None,
                });
            }
        }

        let at = |fraction: f64| x_start + pipe_len * fraction;
        let [motor_at, valve_at, sensor_at, pump_at] = EQUIPMENT_POSITIONS;

        draw_motor(canvas, at(motor_at), y, running, now_ms);
        draw_valve(canvas, at(valve_at), y, ValveState::for_line(line.status));

        let (status, label) = match line.primary_sensor() {
            Some(sensor) => (sensor.status, Some(sensor.label())),
            None => (SensorStatus::Normal, None),
        };
        draw_sensor(canvas, at(sensor_at), y, status, label);

        draw_pump(canvas, at(pump_at), y, running);
    }
}

fn draw_motor(canvas: &mut dyn Canvas, x: f64, y: f64, running: bool, now_ms: u64) {
    canvas.draw(DrawCommand::Circle {
        center: Point::new(x, y),
        radius: MOTOR_RADIUS,
        fill: palette::motor_color(running),
        stroke: Some(GLYPH_OUTLINE),
    });

    if running {
        // Indicator spans the circle minus a 4px inset, rotated about the centre.
        let angle = DiagramRenderer::motor_angle(now_ms);
        let reach = MOTOR_RADIUS - 4.0;
        let (sin, cos) = angle.sin_cos();
        canvas.draw(DrawCommand::Line {
            from: Point::new(x + reach * sin, y - reach * cos),
            to: Point::new(x - reach * sin, y + reach * cos),
            stroke: Stroke {
                color: palette::OUTLINE,
                width: 2.0,
            },
        });
    }

    canvas.draw(DrawCommand::Text {
        position: Point::new(x, y + 3.0),
        text: "M".to_string(),
        color: palette::OUTLINE,
        font_px: GLYPH_FONT_PX,
        align: TextAlign::Center,
    });
}

fn draw_valve(canvas: &mut dyn Canvas, x: f64, y: f64, state: ValveState) {
    let s = VALVE_HALF;
    canvas.draw(DrawCommand::Polygon {
        points: vec![
            Point::new(x - s, y),
            Point::new(x, y - s),
            Point::new(x + s, y),
            Point::new(x, y + s),
        ],
        fill: state.color(),
        stroke: Some(GLYPH_OUTLINE),
    });
}

fn draw_sensor(
    canvas: &mut dyn Canvas,
    x: f64,
    y: f64,
    status: SensorStatus,
    label: Option<String>,
) {
    let s = SENSOR_HALF;
    canvas.draw(DrawCommand::FillRect {
        x: x - s,
        y: y - s,
        width: s * 2.0,
        height: s * 2.0,
        color: palette::sensor_color(status),
    });
    canvas.draw(DrawCommand::StrokeRect {
        x: x - s,
        y: y - s,
        width: s * 2.0,
        height: s * 2.0,
        stroke: Stroke {
            color: palette::OUTLINE,
            width: 1.0,
        },
    });

    if let Some(text) = label.filter(|t| !t.is_empty()) {
        canvas.draw(DrawCommand::Text {
            position: Point::new(x, y - s - 4.0),
            text,
            color: palette::SENSOR_LABEL,
            font_px: GLYPH_FONT_PX,
            align: TextAlign::Center,
        });
    }
}

fn draw_pump(canvas: &mut dyn Canvas, x: f64, y: f64, running: bool) {
    let s = PUMP_HALF;
    canvas.draw(DrawCommand::Polygon {
        points: vec![
            Point::new(x, y - s),
            Point::new(x + s, y + s),
            Point::new(x - s, y + s),
        ],
        fill: palette::pump_color(running),
        stroke: Some(GLYPH_OUTLINE),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;
    use serde_json::json;

    fn snapshot(lines: serde_json::Value) -> Snapshot {
        Snapshot::from_value(json!({ "lines": lines })).unwrap()
    }

    fn running_line() -> serde_json::Value {
        json!({
            "id": "L1", "name": "Mixing", "status": "running",
            "sensors": [{"id": "L1-T", "type": "temperature", "value": 72.5, "unit": "C", "status": "high"}]
        })
    }

    fn flow_markers(canvas: &RecordingCanvas) -> Vec<f64> {
        canvas
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Polygon { points, fill, stroke: None } if *fill == palette::ACTIVE => {
                    Some(points[0].x)
                }
                _ => None,
            })
            .collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_lines_draws_only_clear() {
        let renderer = DiagramRenderer::new(600.0);
        let mut canvas = RecordingCanvas::new();

        renderer.draw(Some(&snapshot(json!([]))), 12_345, &mut canvas);
        assert_eq!(
            canvas.commands(),
            &[DrawCommand::Clear {
                width: 600.0,
                height: DIAGRAM_HEIGHT,
                color: palette::BACKGROUND,
            }]
        );

        renderer.draw(None, 0, &mut canvas);
        assert_eq!(canvas.commands().len(), 1);
        assert_eq!(canvas.frames(), 2);
    }

    #[test]
    fn test_flow_markers_advance_and_wrap() {
        // Pipe 60..760, spacing 140.
        let renderer = DiagramRenderer::new(820.0);
        assert!(close(renderer.flow_spacing(), 140.0));

        let mut canvas = RecordingCanvas::new();
        renderer.draw(Some(&snapshot(json!([running_line()]))), 0, &mut canvas);
        let at_zero = flow_markers(&canvas);
        assert_eq!(at_zero, vec![60.0, 200.0, 340.0, 480.0, 620.0]);

        // 1000ms → offset 50px.
        renderer.draw(Some(&snapshot(json!([running_line()]))), 1_000, &mut canvas);
        let later = flow_markers(&canvas);
        assert_eq!(later, vec![110.0, 250.0, 390.0, 530.0, 670.0]);

        // 2800ms → 140px wraps back to the origin.
        assert!(close(renderer.flow_offset(2_800), 0.0));

        // 2700ms → offset 135 puts the last marker at 755, inside the end clearance.
        assert_eq!(renderer.flow_marker_xs(2_700).len(), 4);
    }

    #[test]
    fn test_marker_near_pipe_end_is_skipped() {
        // Pipe 60..260, spacing 40; offset 30 puts the last marker at 250 > 240.
        let renderer = DiagramRenderer::new(320.0);
        let xs = renderer.flow_marker_xs(600);
        assert_eq!(xs, vec![90.0, 130.0, 170.0, 210.0]);
    }

    #[test]
    fn test_motor_angle_wraps_at_two_pi() {
        assert!(close(DiagramRenderer::motor_angle(0), 0.0));
        assert!(close(DiagramRenderer::motor_angle(150), 1.5));
        let wrapped = DiagramRenderer::motor_angle(1_000);
        assert!(close(wrapped, 10.0 - TAU));
    }

    #[test]
    fn test_motor_indicator_follows_angle() {
        let renderer = DiagramRenderer::new(820.0);
        let mut canvas = RecordingCanvas::new();
        let now = 157; // ≈ π/2: indicator horizontal
        renderer.draw(Some(&snapshot(json!([running_line()]))), now, &mut canvas);

        let motor_x = 60.0 + 700.0 * 0.15;
        let indicator = canvas.commands().iter().find_map(|c| match c {
            DrawCommand::Line { from, to, stroke } if stroke.width == 2.0 => Some((*from, *to)),
            _ => None,
        });
        let (from, to) = indicator.expect("running motor draws an indicator");
        let angle = DiagramRenderer::motor_angle(now);
        assert!(close(from.x, motor_x + 12.0 * angle.sin()));
        assert!(close(to.y, 200.0 + 12.0 * angle.cos()));
    }

    #[test]
    fn test_stopped_line_has_no_flow_and_gray_glyphs() {
        let renderer = DiagramRenderer::new(820.0);
        let mut canvas = RecordingCanvas::new();
        let line = json!({"id": "L2", "status": "stopped", "sensors": []});
        renderer.draw(Some(&snapshot(json!([line]))), 5_000, &mut canvas);

        assert!(flow_markers(&canvas).is_empty());
        assert!(canvas.commands().iter().any(|c| matches!(
            c,
            DrawCommand::Line { stroke, .. } if stroke.color == palette::INACTIVE && stroke.width == PIPE_WIDTH
        )));
        assert!(canvas.commands().iter().any(|c| matches!(
            c,
            DrawCommand::Circle { fill, .. } if *fill == palette::INACTIVE
        )));
        // Only the line id and motor "M"; no sensor label without sensors.
        assert_eq!(canvas.texts(), vec!["L2", "M"]);
    }

    #[test]
    fn test_line_layout_and_sensor_label() {
        let renderer = DiagramRenderer::new(820.0);
        let mut canvas = RecordingCanvas::new();
        let lines = json!([
            running_line(),
            {"id": "L2", "status": "bogus", "sensors": [{"id": "s", "value": 3, "unit": "bar", "status": "???"}]}
        ]);
        renderer.draw(Some(&snapshot(lines)), 0, &mut canvas);

        // Two slots of 200px: centres at 100 and 300.
        let labels: Vec<(String, f64)> = canvas
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, position, font_px, .. } if *font_px == 12.0 => {
                    Some((text.clone(), position.y))
                }
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec![("L1".to_string(), 104.0), ("L2".to_string(), 304.0)]);

        assert!(canvas.texts().contains(&"72.5C"));
        assert!(canvas.texts().contains(&"3bar"));

        // Unknown sensor status renders gray.
        assert!(canvas.commands().iter().any(|c| matches!(
            c,
            DrawCommand::FillRect { color, y, .. } if *color == palette::INACTIVE && *y == 290.0
        )));
    }

    #[test]
    fn test_resize_is_idempotent() {
        let mut renderer = DiagramRenderer::new(800.0);
        assert!(renderer.resize(1024.0));
        assert!(!renderer.resize(1024.0));
        assert_eq!(renderer.width(), 1024.0);
        assert_eq!(renderer.height(), DIAGRAM_HEIGHT);
        assert!(renderer.resize(0.0));
        assert_eq!(renderer.width(), 1.0);
        assert!(renderer.flow_marker_xs(0).is_empty());
    }
}
