//! Built-in icon definitions.
//!
//! Each icon is a short list of vector primitives laid out in a 1000-unit
//! viewbox centred on the origin. Renderers scale the primitives down to the
//! icon's extent with [`BuiltinIcon::scale_for`].

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Side of the square design viewbox.
pub const VIEWBOX: f64 = 1000.0;

/// Stroke width of regular strokes, in viewbox units.
const STROKE: f64 = 80.0;
/// Stroke width of secondary strokes, in viewbox units.
const STROKE_THIN: f64 = 60.0;

/// How a primitive is painted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paint {
    Fill,
    /// Stroke with the given width in viewbox units.
    Stroke(f64),
}

/// A vector primitive in viewbox coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Circle { centre: Point, radius: f64, paint: Paint },
    Rect { origin: Point, width: f64, height: f64, paint: Paint },
    Line { from: Point, to: Point, paint: Paint },
}

/// Symbols shipped with the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinIcon {
    Signal,
    SwitchLeft,
    SwitchRight,
    Buffer,
    Crossing,
}

impl BuiltinIcon {
    pub const ALL: [BuiltinIcon; 5] = [
        BuiltinIcon::Signal,
        BuiltinIcon::SwitchLeft,
        BuiltinIcon::SwitchRight,
        BuiltinIcon::Buffer,
        BuiltinIcon::Crossing,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinIcon::Signal => "signal",
            BuiltinIcon::SwitchLeft => "switch_left",
            BuiltinIcon::SwitchRight => "switch_right",
            BuiltinIcon::Buffer => "buffer",
            BuiltinIcon::Crossing => "crossing",
        }
    }

    /// Look up an icon by its stored name. `switch` is accepted as an alias
    /// for `switch_right`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "switch" => Some(BuiltinIcon::SwitchRight),
            _ => Self::ALL.into_iter().find(|icon| icon.name() == name),
        }
    }

    /// Factor mapping viewbox units onto an icon of side `extent`.
    pub fn scale_for(extent: f64) -> f64 {
        extent / VIEWBOX
    }

    pub fn primitives(self) -> Vec<Primitive> {
        match self {
            BuiltinIcon::Signal => {
                let radius = 280.0;
                let (stem_w, stem_h) = (160.0, 300.0);
                vec![
                    Primitive::Circle {
                        centre: Point::new(0.0, -120.0),
                        radius,
                        paint: Paint::Fill,
                    },
                    Primitive::Rect {
                        origin: Point::new(-stem_w / 2.0, radius - 120.0),
                        width: stem_w,
                        height: stem_h,
                        paint: Paint::Fill,
                    },
                ]
            }
            BuiltinIcon::Buffer => {
                let (w, h) = (760.0, 320.0);
                vec![Primitive::Rect {
                    origin: Point::new(-w / 2.0, -h / 2.0),
                    width: w,
                    height: h,
                    paint: Paint::Stroke(STROKE),
                }]
            }
            BuiltinIcon::Crossing => {
                let l = 400.0;
                vec![
                    Primitive::Line {
                        from: Point::new(-l, -l),
                        to: Point::new(l, l),
                        paint: Paint::Stroke(STROKE),
                    },
                    Primitive::Line {
                        from: Point::new(-l, l),
                        to: Point::new(l, -l),
                        paint: Paint::Stroke(STROKE),
                    },
                ]
            }
            BuiltinIcon::SwitchLeft | BuiltinIcon::SwitchRight => {
                let l = 420.0;
                let offset = if self == BuiltinIcon::SwitchRight { 260.0 } else { -260.0 };
                vec![
                    Primitive::Line {
                        from: Point::new(-l, 0.0),
                        to: Point::new(l, 0.0),
                        paint: Paint::Stroke(STROKE),
                    },
                    Primitive::Line {
                        from: Point::new(-l, 0.0),
                        to: Point::new(l, offset),
                        paint: Paint::Stroke(STROKE_THIN),
                    },
                ]
            }
        }
    }
}
