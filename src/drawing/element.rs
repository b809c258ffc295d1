//! Drawing elements: the closed set of things a drawing is made of.

use enum_dispatch::enum_dispatch;
use glam::DVec2;

use super::style::Style;
use crate::types::BBox;

/// Position of an element in document order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub usize);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What every drawing element can answer
#[enum_dispatch]
pub trait Element {
    fn id(&self) -> ElementId;
    fn bbox(&self) -> BBox;
    fn style(&self) -> &Style;
    /// The `id` attribute of the SVG element this came from
    fn source_id(&self) -> Option<&str>;
}

#[enum_dispatch(Element)]
#[derive(Debug, Clone, PartialEq)]
pub enum DrawingElement {
    Path(PathElement),
    Text(TextElement),
}

impl DrawingElement {
    pub fn as_path(&self) -> Option<&PathElement> {
        match self {
            DrawingElement::Path(p) => Some(p),
            DrawingElement::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextElement> {
        match self {
            DrawingElement::Text(t) => Some(t),
            DrawingElement::Path(_) => None,
        }
    }
}

/// One polyline in drawing space
#[derive(Debug, Clone, PartialEq)]
pub struct PathElement {
    id: ElementId,
    points: Vec<DVec2>,
    closed: bool,
    style: Style,
    source_id: Option<String>,
    bbox: BBox,
}

impl PathElement {
    pub fn new(
        id: ElementId,
        points: Vec<DVec2>,
        closed: bool,
        style: Style,
        source_id: Option<String>,
    ) -> Self {
        let bbox = BBox::from_points(&points);
        Self {
            id,
            points,
            closed,
            style,
            source_id,
            bbox,
        }
    }

    pub fn points(&self) -> &[DVec2] {
        &self.points
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn start(&self) -> DVec2 {
        self.points.first().copied().unwrap_or_default()
    }

    pub fn end(&self) -> DVec2 {
        self.points.last().copied().unwrap_or_default()
    }

    /// Consecutive point pairs, including the closing segment of a closed path
    pub fn segments(&self) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
        let closing = match (self.closed, self.points.first(), self.points.last()) {
            (true, Some(&first), Some(&last)) if first != last => Some((last, first)),
            _ => None,
        };
        self.points
            .windows(2)
            .map(|w| (w[0], w[1]))
            .chain(closing)
    }

    /// Every segment is horizontal or vertical within `tolerance`
    pub fn is_rectilinear(&self, tolerance: f64) -> bool {
        self.segments().all(|(a, b)| {
            let d = (b - a).abs();
            d.x <= tolerance || d.y <= tolerance
        })
    }
}

impl Element for PathElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn bbox(&self) -> BBox {
        self.bbox
    }

    fn style(&self) -> &Style {
        &self.style
    }

    fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }
}

/// A run of text anchored at one point
#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    id: ElementId,
    content: String,
    anchor: DVec2,
    style: Style,
    source_id: Option<String>,
}

impl TextElement {
    pub fn new(
        id: ElementId,
        content: impl Into<String>,
        anchor: DVec2,
        style: Style,
        source_id: Option<String>,
    ) -> Self {
        Self {
            id,
            content: content.into(),
            anchor,
            style,
            source_id,
        }
    }

    /// Text with runs of whitespace collapsed to single spaces
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn anchor(&self) -> DVec2 {
        self.anchor
    }
}

impl Element for TextElement {
    fn id(&self) -> ElementId {
        self.id
    }

    /// Text has no measured extent; its box is the anchor point
    fn bbox(&self) -> BBox {
        BBox::from_corners(self.anchor, self.anchor)
    }

    fn style(&self) -> &Style {
        &self.style
    }

    fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }
}
