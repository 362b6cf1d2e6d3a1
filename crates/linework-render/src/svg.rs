//! Self-contained SVG output.

use crate::scene::{GridLines, Scene, SceneItem};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use kurbo::{Affine, Point, Rect};
use linework_core::assets::PictureFormat;
use linework_core::entities::Colour;
use linework_core::icons::{Paint, Primitive};
use std::fmt::Write;

/// Font stack for labels.
pub const FONT_FAMILY: &str = "DejaVu Sans, Arial, Helvetica, sans-serif";

/// More grid lines than this per axis are not drawn.
const MAX_GRID_LINES: f64 = 4096.0;

const PLACEHOLDER_FILL: Colour = Colour::rgb(235, 235, 235);
const PLACEHOLDER_STROKE: Colour = Colour::rgb(160, 160, 160);

/// Render a scene at its natural size, one pixel per document unit.
pub fn write_svg(scene: &Scene) -> String {
    write_svg_scaled(scene, 1.0)
}

/// Render a scene with its outer size multiplied by `scale`.
///
/// Only `width` and `height` change; content stays in document units
/// mapped through the `viewBox`.
pub fn write_svg_scaled(scene: &Scene, scale: f64) -> String {
    let page = scene.page;
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{}" height="{}" viewBox="{} {} {} {}">"#,
        num(page.width() * scale),
        num(page.height() * scale),
        num(page.x0),
        num(page.y0),
        num(page.width()),
        num(page.height()),
    );
    if let Some(background) = scene.background {
        let _ = writeln!(
            out,
            r#"<rect x="{}" y="{}" width="{}" height="{}"{}/>"#,
            num(page.x0),
            num(page.y0),
            num(page.width()),
            num(page.height()),
            fill(background),
        );
    }
    if let Some(grid) = &scene.grid {
        write_grid(&mut out, grid, page);
    }
    for item in &scene.items {
        write_item(&mut out, item);
    }
    out.push_str("</svg>\n");
    out
}

fn write_grid(out: &mut String, grid: &GridLines, page: Rect) {
    let s = grid.spacing;
    if page.width() / s > MAX_GRID_LINES || page.height() / s > MAX_GRID_LINES {
        log::debug!("Grid spacing {s} too fine to export, skipping");
        return;
    }
    let mut path = String::new();
    let mut x = (page.x0 / s).ceil() * s;
    while x <= page.x1 {
        let _ = write!(path, "M{} {}V{}", num(x), num(page.y0), num(page.y1));
        x += s;
    }
    let mut y = (page.y0 / s).ceil() * s;
    while y <= page.y1 {
        let _ = write!(path, "M{} {}H{}", num(page.x0), num(y), num(page.x1));
        y += s;
    }
    let _ = writeln!(out, r#"<path d="{path}" fill="none"{} stroke-width="1"/>"#, stroke(grid.colour));
}

fn write_item(out: &mut String, item: &SceneItem) {
    match item {
        SceneItem::Path {
            points,
            colour,
            width,
            dash,
            dash_offset,
            cap,
            join,
            ..
        } => {
            let pts: Vec<String> = points.iter().map(|p| format!("{},{}", num(p.x), num(p.y))).collect();
            let _ = write!(
                out,
                r#"<polyline points="{}" fill="none"{} stroke-width="{}" stroke-linecap="{}" stroke-linejoin="{}""#,
                pts.join(" "),
                stroke(*colour),
                num(*width),
                cap.svg(),
                join.svg(),
            );
            if !dash.is_empty() {
                let array: Vec<String> = dash.iter().map(|d| num(*d)).collect();
                let _ = write!(out, r#" stroke-dasharray="{}""#, array.join(" "));
                if *dash_offset != 0.0 {
                    let _ = write!(out, r#" stroke-dashoffset="{}""#, num(*dash_offset));
                }
            }
            out.push_str("/>\n");
        }
        SceneItem::Text {
            text,
            position,
            font_size,
            rotation,
            colour,
            anchor,
            ..
        } => {
            let _ = write!(
                out,
                r#"<text x="{}" y="{}" font-family="{FONT_FAMILY}" font-size="{}"{} text-anchor="{}" dominant-baseline="{}""#,
                num(position.x),
                num(position.y),
                num(*font_size),
                fill(*colour),
                anchor.text_anchor(),
                anchor.dominant_baseline(),
            );
            if *rotation != 0.0 {
                let _ = write!(
                    out,
                    r#" transform="rotate({} {} {})""#,
                    num(*rotation),
                    num(position.x),
                    num(position.y)
                );
            }
            let _ = writeln!(out, ">{}</text>", escape(text));
        }
        SceneItem::Symbol {
            transform,
            primitives,
            colour,
            ..
        } => {
            let _ = writeln!(out, r#"<g transform="{}">"#, matrix(*transform));
            for primitive in primitives {
                write_primitive(out, primitive, *colour);
            }
            out.push_str("</g>\n");
        }
        SceneItem::Picture { rect, rotation, data, .. } => {
            let centre = rect.center();
            let rotate = if *rotation != 0.0 {
                format!(
                    r#" transform="rotate({} {} {})""#,
                    num(*rotation),
                    num(centre.x),
                    num(centre.y)
                )
            } else {
                String::new()
            };
            match data {
                Some((bytes, format)) => {
                    let _ = writeln!(
                        out,
                        r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="xMidYMid meet"{rotate} xlink:href="{}"/>"#,
                        num(rect.x0),
                        num(rect.y0),
                        num(rect.width()),
                        num(rect.height()),
                        data_uri(bytes, *format),
                    );
                }
                None => write_placeholder(out, *rect, &rotate),
            }
        }
    }
}

fn write_primitive(out: &mut String, primitive: &Primitive, colour: Colour) {
    let paint = |p: Paint| match p {
        Paint::Fill => format!(r#"{} stroke="none""#, fill(colour)),
        Paint::Stroke(w) => format!(r#" fill="none"{} stroke-width="{}""#, stroke(colour), num(w)),
    };
    let _ = match primitive {
        Primitive::Circle {
            centre,
            radius,
            paint: p,
        } => writeln!(
            out,
            r#"<circle cx="{}" cy="{}" r="{}"{}/>"#,
            num(centre.x),
            num(centre.y),
            num(*radius),
            paint(*p)
        ),
        Primitive::Rect {
            origin,
            width,
            height,
            paint: p,
        } => writeln!(
            out,
            r#"<rect x="{}" y="{}" width="{}" height="{}"{}/>"#,
            num(origin.x),
            num(origin.y),
            num(*width),
            num(*height),
            paint(*p)
        ),
        Primitive::Line { from, to, paint: p } => writeln!(
            out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}"{} stroke-linecap="round"/>"#,
            num(from.x),
            num(from.y),
            num(to.x),
            num(to.y),
            paint(*p)
        ),
    };
}

/// Crossed box standing in for a missing picture.
fn write_placeholder(out: &mut String, rect: Rect, rotate: &str) {
    let width = (rect.width().min(rect.height()) / 16.0).max(0.5);
    let _ = writeln!(out, "<g{rotate}>");
    let _ = writeln!(
        out,
        r#"<rect x="{}" y="{}" width="{}" height="{}"{}{} stroke-width="{}"/>"#,
        num(rect.x0),
        num(rect.y0),
        num(rect.width()),
        num(rect.height()),
        fill(PLACEHOLDER_FILL),
        stroke(PLACEHOLDER_STROKE),
        num(width),
    );
    let corners = [
        (Point::new(rect.x0, rect.y0), Point::new(rect.x1, rect.y1)),
        (Point::new(rect.x1, rect.y0), Point::new(rect.x0, rect.y1)),
    ];
    for (a, b) in corners {
        let _ = writeln!(
            out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}"{} stroke-width="{}"/>"#,
            num(a.x),
            num(a.y),
            num(b.x),
            num(b.y),
            stroke(PLACEHOLDER_STROKE),
            num(width),
        );
    }
    out.push_str("</g>\n");
}

fn data_uri(bytes: &[u8], format: PictureFormat) -> String {
    format!("data:{};base64,{}", format.mime_type(), BASE64.encode(bytes))
}

fn fill(colour: Colour) -> String {
    if colour.is_opaque() {
        format!(r#" fill="{}""#, colour.hex())
    } else {
        format!(r#" fill="{}" fill-opacity="{}""#, colour.hex(), num(colour.opacity()))
    }
}

fn stroke(colour: Colour) -> String {
    if colour.is_opaque() {
        format!(r#" stroke="{}""#, colour.hex())
    } else {
        format!(r#" stroke="{}" stroke-opacity="{}""#, colour.hex(), num(colour.opacity()))
    }
}

fn matrix(transform: Affine) -> String {
    let [a, b, c, d, e, f] = transform.as_coeffs();
    format!(
        "matrix({} {} {} {} {} {})",
        num(a),
        num(b),
        num(c),
        num(d),
        num(e),
        num(f)
    )
}

/// Shortest decimal form, with float noise below 1e-9 rounded away.
fn num(v: f64) -> String {
    let rounded = (v * 1e9).round() / 1e9;
    if rounded == 0.0 {
        // Avoid "-0"
        "0".to_string()
    } else {
        format!("{rounded}")
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
