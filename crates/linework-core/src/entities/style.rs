//! Colours, stroke styles and text anchors.

use peniko::Color;
use serde::{Deserialize, Serialize};

/// Serializable colour representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    255
}

impl Colour {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    pub const fn gray() -> Self {
        Self::rgb(190, 190, 190)
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// `#rrggbb` without alpha.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Alpha as a 0.0..=1.0 opacity.
    pub fn opacity(&self) -> f64 {
        f64::from(self.a) / 255.0
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.trim().strip_prefix('#')?;
        let byte = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let r = byte(&hex[0..1])? * 17;
                let g = byte(&hex[1..2])? * 17;
                let b = byte(&hex[2..3])? * 17;
                Some(Self::rgb(r, g, b))
            }
            6 => Some(Self::rgb(byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?)),
            8 => Some(Self::new(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
                byte(&hex[6..8])?,
            )),
            _ => None,
        }
    }
}

impl Default for Colour {
    fn default() -> Self {
        Self::black()
    }
}

impl From<Color> for Colour {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

impl From<Colour> for Color {
    fn from(colour: Colour) -> Self {
        Color::from_rgba8(colour.r, colour.g, colour.b, colour.a)
    }
}

/// Named dash patterns, defined in stroke-width units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DashPattern {
    #[default]
    Solid,
    Dash,
    Long,
    Short,
    Dot,
    DashDot,
    DashDotDot,
}

impl DashPattern {
    pub const ALL: [DashPattern; 7] = [
        DashPattern::Solid,
        DashPattern::Dash,
        DashPattern::Long,
        DashPattern::Short,
        DashPattern::Dot,
        DashPattern::DashDot,
        DashPattern::DashDotDot,
    ];

    /// On/off lengths in multiples of the stroke width.
    pub fn base(self) -> &'static [f64] {
        match self {
            DashPattern::Solid => &[],
            DashPattern::Dash => &[3.0, 2.0],
            DashPattern::Long => &[6.0, 3.0],
            DashPattern::Short => &[2.0, 2.0],
            // Tiny "on" segment: rendered as dots by round caps
            DashPattern::Dot => &[0.1, 1.9],
            DashPattern::DashDot => &[3.0, 2.0, 0.1, 2.0],
            DashPattern::DashDotDot => &[3.0, 2.0, 0.1, 2.0, 0.1, 2.0],
        }
    }

    /// Pattern scaled by `stroke_width`; empty for solid lines.
    ///
    /// Segments are rounded and clamped to at least one unit so they stay
    /// visible, and odd-length patterns are doubled into on/off pairs.
    pub fn scaled(self, stroke_width: f64) -> Vec<f64> {
        let base = self.base();
        if base.is_empty() {
            return Vec::new();
        }
        let w = stroke_width.max(1.0);
        let mut out: Vec<f64> = base.iter().map(|seg| (seg * w).round().max(1.0)).collect();
        if out.len() % 2 == 1 {
            out.extend(out.clone());
        }
        out
    }

    pub fn is_solid(self) -> bool {
        self == DashPattern::Solid
    }
}

/// Stroke end cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    #[default]
    Round,
    Butt,
    Square,
}

impl LineCap {
    pub fn svg(self) -> &'static str {
        match self {
            LineCap::Round => "round",
            LineCap::Butt => "butt",
            LineCap::Square => "square",
        }
    }
}

/// Stroke corner join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    #[default]
    Round,
    Miter,
    Bevel,
}

impl LineJoin {
    pub fn svg(self) -> &'static str {
        match self {
            LineJoin::Round => "round",
            LineJoin::Miter => "miter",
            LineJoin::Bevel => "bevel",
        }
    }
}

/// Style properties for lines and icons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub stroke_colour: Colour,
    pub stroke_width: f64,
    #[serde(default)]
    pub dash: DashPattern,
    #[serde(default)]
    pub dash_offset: f64,
    /// Fill colour (None = no fill).
    #[serde(default)]
    pub fill_colour: Option<Colour>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            stroke_colour: Colour::black(),
            stroke_width: 5.0,
            dash: DashPattern::Solid,
            dash_offset: 0.0,
            fill_colour: None,
        }
    }
}

impl Style {
    /// Dash array for this style, empty when solid.
    pub fn dash_array(&self) -> Vec<f64> {
        self.dash.scaled(self.stroke_width)
    }

    /// Apply a partial update, returning the diff that restores the old values.
    pub fn apply_diff(&mut self, diff: &StyleDiff) -> StyleDiff {
        let mut undo = StyleDiff::default();
        if let Some(c) = diff.stroke_colour {
            undo.stroke_colour = Some(std::mem::replace(&mut self.stroke_colour, c));
        }
        if let Some(w) = diff.stroke_width {
            undo.stroke_width = Some(std::mem::replace(&mut self.stroke_width, w));
        }
        if let Some(d) = diff.dash {
            undo.dash = Some(std::mem::replace(&mut self.dash, d));
        }
        if let Some(o) = diff.dash_offset {
            undo.dash_offset = Some(std::mem::replace(&mut self.dash_offset, o));
        }
        if let Some(f) = diff.fill_colour {
            undo.fill_colour = Some(std::mem::replace(&mut self.fill_colour, f));
        }
        undo
    }
}

/// A partial style update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleDiff {
    pub stroke_colour: Option<Colour>,
    pub stroke_width: Option<f64>,
    pub dash: Option<DashPattern>,
    pub dash_offset: Option<f64>,
    pub fill_colour: Option<Option<Colour>>,
}

impl StyleDiff {
    pub fn stroke_colour(colour: Colour) -> Self {
        Self { stroke_colour: Some(colour), ..Self::default() }
    }

    pub fn stroke_width(width: f64) -> Self {
        Self { stroke_width: Some(width), ..Self::default() }
    }

    pub fn dash(dash: DashPattern) -> Self {
        Self { dash: Some(dash), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Nine-way anchor for labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    #[default]
    Nw,
    N,
    Ne,
    W,
    #[serde(alias = "centre")]
    Center,
    E,
    Sw,
    S,
    Se,
}

impl Anchor {
    /// Horizontal and vertical alignment factors in 0.0 (start) ..= 1.0 (end).
    fn factors(self) -> (f64, f64) {
        match self {
            Anchor::Nw => (0.0, 0.0),
            Anchor::N => (0.5, 0.0),
            Anchor::Ne => (1.0, 0.0),
            Anchor::W => (0.0, 0.5),
            Anchor::Center => (0.5, 0.5),
            Anchor::E => (1.0, 0.5),
            Anchor::Sw => (0.0, 1.0),
            Anchor::S => (0.5, 1.0),
            Anchor::Se => (1.0, 1.0),
        }
    }

    /// Box of size `width` x `height` positioned relative to an anchor at the origin.
    pub fn local_box(self, width: f64, height: f64) -> kurbo::Rect {
        let (fx, fy) = self.factors();
        let x0 = -fx * width;
        let y0 = -fy * height;
        kurbo::Rect::new(x0, y0, x0 + width, y0 + height)
    }

    /// SVG `text-anchor` value.
    pub fn text_anchor(self) -> &'static str {
        match self.factors().0 {
            x if x < 0.25 => "start",
            x if x > 0.75 => "end",
            _ => "middle",
        }
    }

    /// SVG `dominant-baseline` value.
    pub fn dominant_baseline(self) -> &'static str {
        match self.factors().1 {
            y if y < 0.25 => "hanging",
            y if y > 0.75 => "text-after-edge",
            _ => "middle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colour_hex() {
        assert_eq!(Colour::rgb(255, 16, 0).hex(), "#ff1000");
        assert_eq!(Colour::parse_hex("#f00"), Some(Colour::rgb(255, 0, 0)));
        assert_eq!(Colour::parse_hex("#11223380"), Some(Colour::new(0x11, 0x22, 0x33, 0x80)));
        assert_eq!(Colour::parse_hex("nope"), None);
    }

    #[test]
    fn test_dash_scaling() {
        assert!(DashPattern::Solid.scaled(4.0).is_empty());
        assert_eq!(DashPattern::Dash.scaled(4.0), vec![12.0, 8.0]);
        // Dots never shrink below one unit
        assert_eq!(DashPattern::Dot.scaled(2.0), vec![1.0, 4.0]);
        assert_eq!(DashPattern::DashDotDot.scaled(1.0).len(), 6);
    }

    #[test]
    fn test_style_diff_inverse() {
        let mut style = Style::default();
        let before = style.clone();
        let diff = StyleDiff {
            stroke_colour: Some(Colour::rgb(1, 2, 3)),
            fill_colour: Some(Some(Colour::white())),
            ..StyleDiff::default()
        };
        let undo = style.apply_diff(&diff);
        assert_eq!(style.stroke_colour, Colour::rgb(1, 2, 3));
        style.apply_diff(&undo);
        assert_eq!(style, before);
    }

    #[test]
    fn test_anchor_box() {
        let b = Anchor::Center.local_box(10.0, 4.0);
        assert_eq!(b, kurbo::Rect::new(-5.0, -2.0, 5.0, 2.0));
        assert_eq!(Anchor::Se.text_anchor(), "end");
        assert_eq!(Anchor::Nw.dominant_baseline(), "hanging");
    }
}
