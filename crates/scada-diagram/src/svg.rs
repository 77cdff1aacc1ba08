//! SVG output for headless rendering.

use std::fmt::Write as _;
use std::path::Path;

use crate::canvas::{Canvas, DrawCommand, Point, Stroke, TextAlign};
use crate::error::DiagramResult;

/// Canvas that serialises one frame as an SVG document.
#[derive(Debug, Default, Clone)]
pub struct SvgCanvas {
    width: f64,
    height: f64,
    body: String,
}

impl SvgCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current frame as a standalone SVG document.
    pub fn to_svg(&self) -> String {
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">{body}</svg>"#,
            w = num(self.width),
            h = num(self.height),
            body = self.body,
        )
    }

    /// Write the current frame to `path`.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> DiagramResult<()> {
        tokio::fs::write(path, self.to_svg()).await?;
        Ok(())
    }
}

impl Canvas for SvgCanvas {
    fn begin_frame(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.body.clear();
    }

    fn draw(&mut self, command: DrawCommand) {
        // Writing into a String cannot fail.
        let out = &mut self.body;
        let _ = match command {
            DrawCommand::Clear {
                width,
                height,
                color,
            } => write!(
                out,
                r#"<rect x="0" y="0" width="{}" height="{}" fill="{color}"/>"#,
                num(width),
                num(height)
            ),
            DrawCommand::FillRect {
                x,
                y,
                width,
                height,
                color,
            } => write!(
                out,
                r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{color}"/>"#,
                num(x),
                num(y),
                num(width),
                num(height)
            ),
            DrawCommand::StrokeRect {
                x,
                y,
                width,
                height,
                stroke,
            } => write!(
                out,
                r#"<rect x="{}" y="{}" width="{}" height="{}" fill="none"{}/>"#,
                num(x),
                num(y),
                num(width),
                num(height),
                stroke_attrs(Some(stroke))
            ),
            DrawCommand::Line { from, to, stroke } => write!(
                out,
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}"{}/>"#,
                num(from.x),
                num(from.y),
                num(to.x),
                num(to.y),
                stroke_attrs(Some(stroke))
            ),
            DrawCommand::Polygon {
                points,
                fill,
                stroke,
            } => write!(
                out,
                r#"<polygon points="{}" fill="{fill}"{}/>"#,
                point_list(&points),
                stroke_attrs(stroke)
            ),
            DrawCommand::Circle {
                center,
                radius,
                fill,
                stroke,
            } => write!(
                out,
                r#"<circle cx="{}" cy="{}" r="{}" fill="{fill}"{}/>"#,
                num(center.x),
                num(center.y),
                num(radius),
                stroke_attrs(stroke)
            ),
            DrawCommand::Text {
                position,
                text,
                color,
                font_px,
                align,
            } => {
                let anchor = match align {
                    TextAlign::Left => "start",
                    TextAlign::Center => "middle",
                };
                write!(
                    out,
                    r#"<text x="{}" y="{}" fill="{color}" font-family="monospace" font-size="{}" text-anchor="{anchor}">{}</text>"#,
                    num(position.x),
                    num(position.y),
                    num(font_px),
                    escape(&text)
                )
            }
        };
    }
}

/// Compact number formatting: at most two decimals, no trailing zeros.
fn num(value: f64) -> String {
    let s = format!("{value:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn stroke_attrs(stroke: Option<Stroke>) -> String {
    match stroke {
        Some(s) => format!(r#" stroke="{}" stroke-width="{}""#, s.color, num(s.width)),
        None => String::new(),
    }
}

fn point_list(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", num(p.x), num(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
