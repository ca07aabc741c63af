//! Geometry primitives and the geometry extraction step.
//!
//! Everything persisted or extracted uses canvas-local, zoom-normalized
//! coordinates. [`canvas_geometry`] is the single place where screen-space
//! layout is converted into that space.

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};

/// Tolerance used when deciding whether a transform component is a default.
const EPSILON: f64 = 1e-6;

/// A 2D point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Size {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Logical canvas dimensions, as persisted in projects and snapshots.
pub type CanvasSize = Size;

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The smallest rectangle containing every point.
    #[must_use]
    pub fn bounding(points: &[Point]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// A 2D affine matrix in CSS `matrix(a, b, c, d, e, f)` order.
///
/// Maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix2D {
    /// Scale/rotation, x column, x component.
    pub a: f64,
    /// Scale/rotation, x column, y component.
    pub b: f64,
    /// Scale/rotation, y column, x component.
    pub c: f64,
    /// Scale/rotation, y column, y component.
    pub d: f64,
    /// Translation x.
    pub e: f64,
    /// Translation y.
    pub f: f64,
}

impl Default for Matrix2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix2D {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// A translation.
    #[must_use]
    pub const fn translate(x: f64, y: f64) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: x,
            f: y,
        }
    }

    /// A (possibly non-uniform) scale.
    #[must_use]
    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            e: 0.0,
            f: 0.0,
        }
    }

    /// A clockwise rotation in degrees (CSS convention, y axis down).
    #[must_use]
    pub fn rotate_deg(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self * other`: apply `other` first, then `self`.
    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    /// Transform a point.
    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    /// Whether this is (numerically) the identity.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        (self.a - 1.0).abs() < EPSILON
            && self.b.abs() < EPSILON
            && self.c.abs() < EPSILON
            && (self.d - 1.0).abs() < EPSILON
            && self.e.abs() < EPSILON
            && self.f.abs() < EPSILON
    }

    /// Magnitude of the linear part's first column.
    #[must_use]
    pub fn linear_scale(&self) -> f64 {
        self.a.hypot(self.b)
    }

    /// Resolved CSS form, `none` for the identity.
    #[must_use]
    pub fn to_css(&self) -> String {
        if self.is_identity() {
            return "none".to_string();
        }
        format!(
            "matrix({}, {}, {}, {}, {}, {})",
            css_number(self.a),
            css_number(self.b),
            css_number(self.c),
            css_number(self.d),
            css_number(self.e),
            css_number(self.f)
        )
    }
}

/// Rotation and uniform scale recovered from an affine matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParts {
    /// Rotation in degrees, `atan2(b, a)`.
    pub rotation: f64,
    /// Scale, `|(a, b)|`.
    pub scale: f64,
}

impl Default for TransformParts {
    fn default() -> Self {
        Self {
            rotation: 0.0,
            scale: 1.0,
        }
    }
}

/// Decompose a matrix into rotation and scale.
#[must_use]
pub fn decompose(m: &Matrix2D) -> TransformParts {
    TransformParts {
        rotation: m.b.atan2(m.a).to_degrees(),
        scale: m.linear_scale(),
    }
}

/// Parse a CSS transform list into a matrix.
///
/// Supports `none`, `matrix`, `translate[X|Y|3d]`, `rotate[Z]`, `scale[X|Y]`
/// with `px`, `deg`, `rad`, `grad` and `turn` units. Returns `None` for
/// anything else.
#[must_use]
pub fn parse_transform(input: &str) -> Option<Matrix2D> {
    let mut rest = input.trim();
    if rest.is_empty() || rest.eq_ignore_ascii_case("none") {
        return Some(Matrix2D::IDENTITY);
    }

    let mut matrix = Matrix2D::IDENTITY;
    while !rest.is_empty() {
        let open = rest.find('(')?;
        let close = open + rest[open..].find(')')?;
        let name = rest[..open].trim().to_ascii_lowercase();
        let args: Vec<&str> = rest[open + 1..close]
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        matrix = matrix.multiply(&transform_function(&name, &args)?);
        rest = rest[close + 1..].trim_start();
    }
    Some(matrix)
}

fn transform_function(name: &str, args: &[&str]) -> Option<Matrix2D> {
    let len = |i: usize| args.get(i).and_then(|a| parse_length(a));
    let num = |i: usize| args.get(i).and_then(|a| a.parse::<f64>().ok());
    match (name, args.len()) {
        ("matrix", 6) => Some(Matrix2D {
            a: num(0)?,
            b: num(1)?,
            c: num(2)?,
            d: num(3)?,
            e: num(4)?,
            f: num(5)?,
        }),
        ("translate", 1) => Some(Matrix2D::translate(len(0)?, 0.0)),
        ("translate", 2) | ("translate3d", 3) => Some(Matrix2D::translate(len(0)?, len(1)?)),
        ("translatex", 1) => Some(Matrix2D::translate(len(0)?, 0.0)),
        ("translatey", 1) => Some(Matrix2D::translate(0.0, len(0)?)),
        ("rotate" | "rotatez", 1) => Some(Matrix2D::rotate_deg(parse_angle(args[0])?)),
        ("scale", 1) => {
            let s = num(0)?;
            Some(Matrix2D::scale(s, s))
        }
        ("scale", 2) => Some(Matrix2D::scale(num(0)?, num(1)?)),
        ("scalex", 1) => Some(Matrix2D::scale(num(0)?, 1.0)),
        ("scaley", 1) => Some(Matrix2D::scale(1.0, num(0)?)),
        _ => None,
    }
}

/// Parse a pixel length (`12px`, `12`, `-3.5px`). Other units are rejected.
#[must_use]
pub fn parse_length(value: &str) -> Option<f64> {
    let v = value.trim();
    v.strip_suffix("px").unwrap_or(v).trim().parse().ok()
}

fn parse_angle(value: &str) -> Option<f64> {
    let v = value.trim();
    if let Some(n) = v.strip_suffix("deg") {
        n.parse().ok()
    } else if let Some(n) = v.strip_suffix("grad") {
        n.parse::<f64>().ok().map(|g| g * 0.9)
    } else if let Some(n) = v.strip_suffix("rad") {
        n.parse::<f64>().ok().map(f64::to_degrees)
    } else if let Some(n) = v.strip_suffix("turn") {
        n.parse::<f64>().ok().map(|t| t * 360.0)
    } else {
        // Bare zero is the only unitless angle CSS accepts.
        v.parse::<f64>().ok().filter(|n| n.abs() < EPSILON)
    }
}

/// Format a number the way resolved CSS values print: no trailing zeros,
/// at most six decimals, no negative zero.
#[must_use]
pub fn css_number(value: f64) -> String {
    let rounded = (value * 1_000_000.0).round() / 1_000_000.0;
    let rounded = if rounded.abs() < EPSILON { 0.0 } else { rounded };
    let mut s = format!("{rounded:.6}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Format a pixel value, e.g. `120px`.
#[must_use]
pub fn px(value: f64) -> String {
    format!("{}px", css_number(value))
}

/// Sparse position record as persisted in the element registry format.
///
/// `rotation` and `scale` are omitted when they equal their defaults (0 and 1).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Canvas-local left edge.
    pub x: f64,
    /// Canvas-local top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Rotation in degrees, absent when zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    /// Uniform scale, absent when one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl Position {
    /// CSS transform reconstructing rotation and scale, if any.
    #[must_use]
    pub fn transform_css(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(r) = self.rotation {
            parts.push(format!("rotate({}deg)", css_number(r)));
        }
        if let Some(s) = self.scale {
            parts.push(format!("scale({})", css_number(s)));
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

/// Geometry of an element in canvas-local, zoom-normalized space.
///
/// This is the explicit record owned by the scene and refreshed by the
/// commit step at the end of each gesture. `rect` is the element's layout
/// box placed so that its center matches the transformed element's center;
/// applying `parts` around that center reproduces the element exactly.
/// Without rotation or scale it equals the bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElementGeometry {
    /// Center-preserving box relative to the canvas origin.
    pub rect: Rect,
    /// Rotation and scale of the element.
    pub parts: TransformParts,
}

impl ElementGeometry {
    /// Sparse persisted form. Rotation is rounded to whole degrees.
    #[must_use]
    pub fn to_position(&self) -> Position {
        let rotation = self.parts.rotation.round();
        Position {
            x: self.rect.x,
            y: self.rect.y,
            width: self.rect.width,
            height: self.rect.height,
            rotation: (rotation.abs() >= 1.0).then_some(rotation),
            scale: ((self.parts.scale - 1.0).abs() > EPSILON).then_some(self.parts.scale),
        }
    }
}

/// Read an element's geometry back from the document.
///
/// Returns `None` if either node is not part of the document. A non-positive
/// zoom is treated as 1. Safe to call mid-gesture: it only reads.
#[must_use]
pub fn canvas_geometry(
    doc: &Document,
    node: NodeId,
    canvas: NodeId,
    zoom: f64,
) -> Option<ElementGeometry> {
    if !doc.is_connected(node) || !doc.is_connected(canvas) {
        return None;
    }
    let zoom = if zoom > 0.0 { zoom } else { 1.0 };
    let size = doc.box_size(node);
    let screen = doc.screen_matrix(node);
    let origin = doc.screen_matrix(canvas).apply(Point::new(0.0, 0.0));
    let center = screen.apply(Point::new(size.width / 2.0, size.height / 2.0));
    let mut parts = decompose(&screen);
    parts.scale /= zoom;

    Some(ElementGeometry {
        rect: Rect::new(
            (center.x - origin.x) / zoom - size.width / 2.0,
            (center.y - origin.y) / zoom - size.height / 2.0,
            size.width,
            size.height,
        ),
        parts,
    })
}

/// Screen-space bounding box of an element, canvas-local and divided by zoom.
#[must_use]
pub fn canvas_bounding_box(doc: &Document, node: NodeId, canvas: NodeId, zoom: f64) -> Rect {
    let zoom = if zoom > 0.0 { zoom } else { 1.0 };
    let element = doc.bounding_rect(node);
    let origin = doc.screen_matrix(canvas).apply(Point::new(0.0, 0.0));
    Rect::new(
        (element.x - origin.x) / zoom,
        (element.y - origin.y) / zoom,
        element.width / zoom,
        element.height / zoom,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn parse_none_is_identity() {
        assert!(parse_transform("none").expect("parse").is_identity());
        assert!(parse_transform("").expect("parse").is_identity());
    }

    #[test]
    fn parse_translate_then_rotate() {
        let m = parse_transform("translate(30px, 10px) rotate(90deg)").expect("parse");
        let p = m.apply(Point::new(1.0, 0.0));
        assert!(close(p.x, 30.0));
        assert!(close(p.y, 11.0));
    }

    #[test]
    fn parse_matrix_roundtrips_through_css() {
        let m = parse_transform("matrix(0.5, 0.5, -0.5, 0.5, 4, 8)").expect("parse");
        assert_eq!(m.to_css(), "matrix(0.5, 0.5, -0.5, 0.5, 4, 8)");
    }

    #[test]
    fn parse_rejects_unknown_functions() {
        assert!(parse_transform("skew(10deg)").is_none());
        assert!(parse_transform("translate(10%)").is_none());
        assert!(parse_transform("rotate(45deg").is_none());
    }

    #[test]
    fn angle_units() {
        let turn = decompose(&parse_transform("rotate(0.25turn)").expect("parse"));
        assert!((turn.rotation - 90.0).abs() < 1e-9);
        let rad = decompose(&parse_transform("rotate(3.141592653589793rad)").expect("parse"));
        assert!((rad.rotation.abs() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn decompose_rotation_and_scale() {
        let m = Matrix2D::rotate_deg(30.0).multiply(&Matrix2D::scale(2.0, 2.0));
        let parts = decompose(&m);
        assert!((parts.rotation - 30.0).abs() < 1e-9);
        assert!((parts.scale - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sparse_position_omits_defaults() {
        let geometry = ElementGeometry {
            rect: Rect::new(10.0, 20.0, 100.0, 60.0),
            parts: TransformParts::default(),
        };
        let json = serde_json::to_value(geometry.to_position()).expect("serialize");
        assert!(json.get("rotation").is_none());
        assert!(json.get("scale").is_none());
        assert_eq!(json["x"], 10.0);
    }

    #[test]
    fn sparse_position_keeps_rotation() {
        let geometry = ElementGeometry {
            rect: Rect::default(),
            parts: TransformParts {
                rotation: 44.7,
                scale: 1.0,
            },
        };
        let position = geometry.to_position();
        assert_eq!(position.rotation, Some(45.0));
        assert!(position.scale.is_none());
        assert_eq!(position.transform_css().as_deref(), Some("rotate(45deg)"));
    }

    fn zoomed_canvas(doc: &mut Document, zoom: f64) -> NodeId {
        let canvas = doc.create_element("div");
        doc.set_attr(
            canvas,
            "style",
            &format!("left: 40px; top: 40px; width: 800px; height: 600px; transform: scale({zoom}); transform-origin: top left"),
        );
        doc.append_child(doc.body(), canvas);
        canvas
    }

    fn child(doc: &mut Document, canvas: NodeId, css: &str) -> NodeId {
        let node = doc.create_element("div");
        doc.set_attr(node, "style", css);
        doc.append_child(canvas, node);
        node
    }

    #[test]
    fn canvas_geometry_normalizes_zoom() {
        let mut doc = Document::new();
        let canvas = zoomed_canvas(&mut doc, 2.0);
        let node = child(&mut doc, canvas, "left: 100px; top: 50px; width: 80px; height: 40px");
        let g = canvas_geometry(&doc, node, canvas, 2.0).expect("geometry");
        assert_eq!(g.rect, Rect::new(100.0, 50.0, 80.0, 40.0));
        assert!(g.to_position().rotation.is_none());
        assert!(g.to_position().scale.is_none());
    }

    #[test]
    fn canvas_geometry_folds_translation_into_position() {
        let mut doc = Document::new();
        let canvas = zoomed_canvas(&mut doc, 1.5);
        let node = child(
            &mut doc,
            canvas,
            "left: 100px; top: 50px; width: 80px; height: 40px; transform: translate(30px, 10px)",
        );
        let position = canvas_geometry(&doc, node, canvas, 1.5)
            .expect("geometry")
            .to_position();
        assert!((position.x - 130.0).abs() < 1e-9);
        assert!((position.y - 60.0).abs() < 1e-9);
        assert!(position.rotation.is_none());
        assert!(position.scale.is_none());
    }

    #[test]
    fn canvas_geometry_keeps_box_under_rotation() {
        let mut doc = Document::new();
        let canvas = zoomed_canvas(&mut doc, 1.0);
        let node = child(
            &mut doc,
            canvas,
            "left: 100px; top: 50px; width: 80px; height: 40px; transform: rotate(45deg) scale(1.5)",
        );
        let g = canvas_geometry(&doc, node, canvas, 1.0).expect("geometry");
        assert!((g.rect.x - 100.0).abs() < 1e-9);
        assert!((g.rect.width - 80.0).abs() < 1e-9);
        assert!((g.parts.rotation - 45.0).abs() < 1e-9);
        assert!((g.parts.scale - 1.5).abs() < 1e-9);

        let bbox = canvas_bounding_box(&doc, node, canvas, 1.0);
        assert!(bbox.width > 80.0);
    }

    #[test]
    fn canvas_geometry_requires_connected_nodes() {
        let mut doc = Document::new();
        let canvas = zoomed_canvas(&mut doc, 1.0);
        let orphan = doc.create_element("div");
        assert!(canvas_geometry(&doc, orphan, canvas, 1.0).is_none());
    }

    #[test]
    fn css_number_trims() {
        assert_eq!(css_number(1.0), "1");
        assert_eq!(css_number(0.5), "0.5");
        assert_eq!(css_number(-0.000_000_1), "0");
        assert_eq!(px(12.25), "12.25px");
    }

    #[test]
    fn bounding_rect_of_points() {
        let r = Rect::bounding(&[
            Point::new(5.0, 1.0),
            Point::new(-1.0, 3.0),
            Point::new(2.0, 9.0),
        ]);
        assert_eq!(r, Rect::new(-1.0, 1.0, 6.0, 8.0));
        assert!(close(r.right(), 5.0));
        assert!(close(r.bottom(), 9.0));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_decompose_recovers_rotation_and_scale(
                rotation in -179.0f64..179.0f64,
                scale in 0.1f64..10.0f64,
            ) {
                let m = Matrix2D::rotate_deg(rotation).multiply(&Matrix2D::scale(scale, scale));
                let parts = decompose(&m);
                prop_assert!((parts.rotation - rotation).abs() < 1e-6);
                prop_assert!((parts.scale - scale).abs() < 1e-6);
            }

            #[test]
            fn prop_geometry_reads_back_what_was_placed(
                x in -500.0f64..500.0f64,
                y in -500.0f64..500.0f64,
                width in 1.0f64..400.0f64,
                height in 1.0f64..400.0f64,
                rotation in -179i32..179i32,
                zoom in 0.25f64..4.0f64,
            ) {
                let mut doc = Document::new();
                let canvas = zoomed_canvas(&mut doc, zoom);
                let position = Position {
                    x: (x * 100.0).round() / 100.0,
                    y: (y * 100.0).round() / 100.0,
                    width: (width * 100.0).round() / 100.0,
                    height: (height * 100.0).round() / 100.0,
                    rotation: (rotation != 0).then_some(f64::from(rotation)),
                    scale: None,
                };
                let css = format!(
                    "left: {}; top: {}; width: {}; height: {}; transform: {}",
                    px(position.x),
                    px(position.y),
                    px(position.width),
                    px(position.height),
                    position.transform_css().unwrap_or_else(|| "none".to_string()),
                );
                let node = child(&mut doc, canvas, &css);
                let read = canvas_geometry(&doc, node, canvas, zoom)
                    .expect("geometry")
                    .to_position();
                prop_assert!((read.x - position.x).abs() < 1e-6);
                prop_assert!((read.y - position.y).abs() < 1e-6);
                prop_assert!((read.width - position.width).abs() < 1e-6);
                prop_assert!((read.height - position.height).abs() < 1e-6);
                prop_assert_eq!(read.rotation, position.rotation);
                prop_assert!(read.scale.is_none());
            }
        }
    }
}
