//! The in-memory drawing: paths and text pulled out of an SVG document.
//!
//! Only geometry and text survive. Every coordinate is in drawing space
//! (all ancestor transforms applied, y grows downward) and elements keep
//! their document order.

mod element;
mod grammar;
mod path_data;
mod style;
mod transform;

pub use element::{DrawingElement, Element, ElementId, PathElement, TextElement};
pub use grammar::SyntaxError;
pub use path_data::{Subpath, parse_path_data, parse_point_list};
pub use style::{Color, Style, StyleParseError};
pub use transform::parse_transform;

use glam::{DAffine2, DVec2, dvec2};
use miette::SourceSpan;
use roxmltree::Node;

use crate::errors::{MalformedDocumentError, SourceContext};
use crate::log::debug;
use crate::types::BBox;

/// Subtrees that never render directly
const SKIPPED: &[&str] = &[
    "defs", "clipPath", "mask", "symbol", "metadata", "style", "title", "desc",
];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Drawing {
    elements: Vec<DrawingElement>,
    bounds: BBox,
}

impl Drawing {
    /// Parse SVG text
    pub fn parse(source: &str) -> Result<Self, MalformedDocumentError> {
        Self::parse_named("<input>", source)
    }

    /// Parse SVG text, naming the source in diagnostics
    pub fn parse_named(name: &str, source: &str) -> Result<Self, MalformedDocumentError> {
        let ctx = || SourceContext::new(name, source);

        let doc = roxmltree::Document::parse(source).map_err(|err| {
            let ctx = ctx();
            let pos = err.pos();
            let offset = ctx.offset_of(pos.row as usize, pos.col as usize);
            MalformedDocumentError::InvalidXml {
                message: err.to_string(),
                src: ctx.named_source(),
                span: (offset, 0).into(),
            }
        })?;

        let root = doc.root_element();
        if root.tag_name().name() != "svg" {
            return Err(MalformedDocumentError::NotSvg {
                found: root.tag_name().name().to_string(),
                src: ctx().named_source(),
                span: span_of(root),
            });
        }

        let mut reader = Reader {
            ctx: &ctx,
            elements: Vec::new(),
        };
        reader.visit(root, DAffine2::IDENTITY, &Style::default())?;

        let drawing = Drawing::from_elements(reader.elements);
        debug!(
            document = name,
            elements = drawing.elements.len(),
            "parsed drawing"
        );
        Ok(drawing)
    }

    /// Build from elements already in document order
    pub fn from_elements(elements: Vec<DrawingElement>) -> Self {
        let mut bounds = BBox::new();
        for e in &elements {
            bounds.expand_bbox(&e.bbox());
        }
        Drawing { elements, bounds }
    }

    /// Start an in-memory drawing
    pub fn builder() -> DrawingBuilder {
        DrawingBuilder::default()
    }

    pub fn elements(&self) -> &[DrawingElement] {
        &self.elements
    }

    /// Union of all element bounds (empty for an empty drawing)
    pub fn bounds(&self) -> BBox {
        self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathElement> {
        self.elements.iter().filter_map(DrawingElement::as_path)
    }

    pub fn texts(&self) -> impl Iterator<Item = &TextElement> {
        self.elements.iter().filter_map(DrawingElement::as_text)
    }

    /// Elements whose bounds intersect `region`
    pub fn in_region(&self, region: BBox) -> impl Iterator<Item = &DrawingElement> {
        self.elements
            .iter()
            .filter(move |e| region.intersects(&e.bbox()))
    }

    /// Elements satisfying `predicate`, in document order
    pub fn matching<F>(&self, predicate: F) -> impl Iterator<Item = &DrawingElement>
    where
        F: Fn(&DrawingElement) -> bool,
    {
        self.elements.iter().filter(move |e| predicate(e))
    }

    /// Closest text anchor to `point` within `max_distance`; earlier text wins ties
    pub fn nearest_text(&self, point: DVec2, max_distance: f64) -> Option<&TextElement> {
        self.texts()
            .map(|t| ((t.anchor() - point).length(), t))
            .filter(|(d, _)| *d <= max_distance)
            .min_by(|(da, a), (db, b)| da.total_cmp(db).then(a.id().cmp(&b.id())))
            .map(|(_, t)| t)
    }
}

/// Assembles a [`Drawing`] in code, numbering elements in insertion order
#[derive(Debug, Default)]
pub struct DrawingBuilder {
    elements: Vec<DrawingElement>,
}

impl DrawingBuilder {
    fn next_id(&self) -> ElementId {
        ElementId(self.elements.len())
    }

    pub fn path(self, points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        self.styled_path(points, false, Style::default())
    }

    pub fn closed_path(self, points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        self.styled_path(points, true, Style::default())
    }

    pub fn styled_path(
        mut self,
        points: impl IntoIterator<Item = (f64, f64)>,
        closed: bool,
        style: Style,
    ) -> Self {
        let points = points.into_iter().map(|(x, y)| dvec2(x, y)).collect();
        let id = self.next_id();
        self.elements
            .push(PathElement::new(id, points, closed, style, None).into());
        self
    }

    pub fn text(mut self, content: &str, x: f64, y: f64) -> Self {
        let id = self.next_id();
        self.elements.push(
            TextElement::new(id, collapse_whitespace(content), dvec2(x, y), Style::default(), None)
                .into(),
        );
        self
    }

    pub fn build(self) -> Drawing {
        Drawing::from_elements(self.elements)
    }
}

struct Reader<'c, F: Fn() -> SourceContext> {
    ctx: &'c F,
    elements: Vec<DrawingElement>,
}

impl<F: Fn() -> SourceContext> Reader<'_, F> {
    fn visit(
        &mut self,
        node: Node<'_, '_>,
        parent_ctm: DAffine2,
        parent_style: &Style,
    ) -> Result<(), MalformedDocumentError> {
        let tag = node.tag_name().name();
        if SKIPPED.contains(&tag) || node.attribute("display") == Some("none") {
            return Ok(());
        }

        let ctm = match node.attribute("transform") {
            Some(t) => {
                let local = parse_transform(t).map_err(|err| {
                    debug!(%err, "bad transform");
                    self.invalid_number(node, "transform", t)
                })?;
                parent_ctm * local
            }
            None => parent_ctm,
        };
        let style = Style::for_node(node, parent_style);

        match tag {
            "path" => {
                let d = node.attribute("d").unwrap_or_default();
                let subpaths = parse_path_data(d).map_err(|e| {
                    MalformedDocumentError::InvalidPathData {
                        message: e.to_string(),
                        src: (self.ctx)().named_source(),
                        span: span_of(node),
                    }
                })?;
                for sub in subpaths {
                    self.push_path(node, ctm, sub.points, sub.closed, &style);
                }
            }
            "line" => {
                let p = |x, y| -> Result<DVec2, MalformedDocumentError> {
                    Ok(dvec2(self.length(node, x)?, self.length(node, y)?))
                };
                let points = vec![p("x1", "y1")?, p("x2", "y2")?];
                self.push_path(node, ctm, points, false, &style);
            }
            "polyline" | "polygon" => {
                let raw = node.attribute("points").unwrap_or_default();
                let points = parse_point_list(raw).map_err(|err| {
                    debug!(%err, "bad point list");
                    self.invalid_number(node, "points", raw)
                })?;
                if points.len() >= 2 {
                    self.push_path(node, ctm, points, tag == "polygon", &style);
                }
            }
            "rect" => {
                let (x, y) = (self.length(node, "x")?, self.length(node, "y")?);
                let (w, h) = (self.length(node, "width")?, self.length(node, "height")?);
                if w > 0.0 && h > 0.0 {
                    let points = vec![
                        dvec2(x, y),
                        dvec2(x + w, y),
                        dvec2(x + w, y + h),
                        dvec2(x, y + h),
                    ];
                    self.push_path(node, ctm, points, true, &style);
                }
            }
            "text" => self.push_text(node, ctm, &style)?,
            _ => {
                for child in node.children().filter(Node::is_element) {
                    self.visit(child, ctm, &style)?;
                }
            }
        }
        Ok(())
    }

    fn push_path(
        &mut self,
        node: Node<'_, '_>,
        ctm: DAffine2,
        points: Vec<DVec2>,
        closed: bool,
        style: &Style,
    ) {
        let points = points.into_iter().map(|p| ctm.transform_point2(p)).collect();
        let id = ElementId(self.elements.len());
        let source_id = node.attribute("id").map(str::to_string);
        self.elements
            .push(PathElement::new(id, points, closed, style.clone(), source_id).into());
    }

    fn push_text(
        &mut self,
        node: Node<'_, '_>,
        ctm: DAffine2,
        style: &Style,
    ) -> Result<(), MalformedDocumentError> {
        let raw: String = node
            .descendants()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect();
        let content = collapse_whitespace(&raw);
        if content.is_empty() {
            return Ok(());
        }

        // Inkscape often leaves x/y off the <text> and puts them on the first tspan
        let positioned = std::iter::once(node)
            .chain(node.descendants().filter(|n| n.tag_name().name() == "tspan"))
            .find(|n| n.has_attribute("x") || n.has_attribute("y"))
            .unwrap_or(node);
        let anchor = dvec2(
            self.first_coordinate(positioned, "x")?,
            self.first_coordinate(positioned, "y")?,
        );

        let id = ElementId(self.elements.len());
        let source_id = node.attribute("id").map(str::to_string);
        self.elements.push(
            TextElement::new(id, content, ctm.transform_point2(anchor), style.clone(), source_id)
                .into(),
        );
        Ok(())
    }

    /// A single length attribute (missing means 0, `px` suffix allowed)
    fn length(&self, node: Node<'_, '_>, name: &str) -> Result<f64, MalformedDocumentError> {
        let Some(raw) = node.attribute(name) else {
            return Ok(0.0);
        };
        let value = raw.trim();
        value
            .strip_suffix("px")
            .unwrap_or(value)
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.invalid_number(node, name, raw))
    }

    /// Text `x`/`y` may list one coordinate per glyph; the first one anchors the run
    fn first_coordinate(
        &self,
        node: Node<'_, '_>,
        name: &str,
    ) -> Result<f64, MalformedDocumentError> {
        let Some(raw) = node.attribute(name) else {
            return Ok(0.0);
        };
        match raw.split([' ', ',']).find(|s| !s.is_empty()) {
            Some(first) => first
                .strip_suffix("px")
                .unwrap_or(first)
                .parse::<f64>()
                .map_err(|_| self.invalid_number(node, name, raw)),
            None => Ok(0.0),
        }
    }

    fn invalid_number(
        &self,
        node: Node<'_, '_>,
        attribute: &str,
        value: &str,
    ) -> MalformedDocumentError {
        MalformedDocumentError::InvalidNumber {
            attribute: attribute.to_string(),
            value: value.to_string(),
            src: (self.ctx)().named_source(),
            span: span_of(node),
        }
    }
}

fn span_of(node: Node<'_, '_>) -> SourceSpan {
    let range = node.range();
    (range.start, range.len()).into()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100">
  <defs><path id="hidden" d="M 0 0 L 999 999"/></defs>
  <g transform="translate(10,20)" stroke="#000000">
    <path id="trace" d="M 0 0 L 10 5 L 20 0" style="fill:none;stroke-width:0.5"/>
    <text x="5" y="-5"><tspan>I</tspan><tspan>I</tspan></text>
  </g>
  <rect x="0" y="0" width="4" height="10"/>
</svg>"##;

    #[test]
    fn reads_paths_texts_and_transforms() {
        let drawing = Drawing::parse(TRACE).unwrap();
        assert_eq!(drawing.elements().len(), 3);

        let trace = drawing.paths().next().unwrap();
        assert_eq!(trace.source_id(), Some("trace"));
        assert_eq!(trace.start(), dvec2(10.0, 20.0));
        assert_eq!(trace.end(), dvec2(30.0, 20.0));
        assert_eq!(trace.style().stroke, Some(Color::Rgb { r: 0, g: 0, b: 0 }));
        assert_eq!(trace.style().stroke_width, Some(0.5));

        let label = drawing.texts().next().unwrap();
        assert_eq!(label.content(), "II");
        assert_eq!(label.anchor(), dvec2(15.0, 15.0));

        let rect = drawing.paths().nth(1).unwrap();
        assert!(rect.is_closed());
        assert_eq!(rect.points().len(), 4);
    }

    #[test]
    fn bounds_cover_every_element() {
        let drawing = Drawing::parse(TRACE).unwrap();
        assert_eq!(drawing.bounds().min, dvec2(0.0, 0.0));
        assert_eq!(drawing.bounds().max, dvec2(30.0, 25.0));
    }

    #[test]
    fn element_ids_follow_document_order() {
        let drawing = Drawing::parse(TRACE).unwrap();
        let ids: Vec<_> = drawing.elements().iter().map(|e| e.id().0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn not_svg_is_malformed() {
        let err = Drawing::parse("<html/>").unwrap_err();
        assert!(matches!(err, MalformedDocumentError::NotSvg { ref found, .. } if found == "html"));
    }

    #[test]
    fn broken_xml_is_malformed() {
        let err = Drawing::parse("<svg><g></svg>").unwrap_err();
        assert!(matches!(err, MalformedDocumentError::InvalidXml { .. }));
    }

    #[test]
    fn bad_path_data_points_at_the_element() {
        let src = r#"<svg><path d="M 0 0 L oops"/></svg>"#;
        let err = Drawing::parse(src).unwrap_err();
        match err {
            MalformedDocumentError::InvalidPathData { span, .. } => {
                assert_eq!(span.offset(), 5);
                assert_eq!(
                    &src[span.offset()..span.offset() + span.len()],
                    r#"<path d="M 0 0 L oops"/>"#
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn queries() {
        let drawing = Drawing::builder()
            .path([(0.0, 0.0), (10.0, 0.0)])
            .text("II", 50.0, 50.0)
            .text("II", 50.0, 50.0)
            .path([(100.0, 100.0), (110.0, 100.0)])
            .build();

        let region = BBox::from_corners(dvec2(-1.0, -1.0), dvec2(60.0, 60.0));
        assert_eq!(drawing.in_region(region).count(), 3);
        assert_eq!(
            drawing
                .matching(|e| matches!(e, DrawingElement::Path(_)))
                .count(),
            2
        );
        let nearest = drawing.nearest_text(dvec2(45.0, 50.0), 10.0).unwrap();
        assert_eq!(nearest.id(), ElementId(1));
        assert!(drawing.nearest_text(dvec2(0.0, 0.0), 10.0).is_none());
    }
}
