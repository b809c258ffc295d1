//! Stroke grouping: from loose path segments to one ordered trace per lead.
//!
//! [`build_stack`] seeds a trace at the segment nearest to each lead label and
//! chains segments end-to-start in both directions. [`process_stack`] turns the
//! traces into validated per-lead sample sequences.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use glam::DVec2;

use crate::config::{MarkerOptions, StackOptions};
use crate::drawing::{Drawing, Element, ElementId, PathElement};
use crate::errors::ExtractionError;
use crate::log::{debug, warn};
use crate::marker::is_marker_shape;

/// Labeled traces of one drawing, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    pub traces: Vec<LabeledTrace>,
    options: StackOptions,
}

/// Everything chained from one lead label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTrace {
    /// Lead name as configured (labels match case-insensitively)
    pub lead: String,
    pub label: ElementId,
    /// Segments in chain order; empty if nothing was near the label
    pub segments: Vec<ElementId>,
    /// Points of all segments in chain order
    pub points: Vec<DVec2>,
}

/// The pixel samples of one lead, strictly ascending in x
#[derive(Debug, Clone, PartialEq)]
pub struct LeadStack {
    pub lead: String,
    pub label: ElementId,
    pub points: Vec<DVec2>,
}

/// How good a continuation candidate is; smaller is better.
///
/// Join distance first, then the vertical jump at the join, then document order.
#[derive(Debug, Clone, Copy)]
pub struct ContinuationRank {
    pub join: f64,
    pub dy: f64,
    pub order: ElementId,
}

impl ContinuationRank {
    pub fn new(tip: DVec2, candidate: DVec2, order: ElementId) -> Self {
        Self {
            join: (candidate - tip).length(),
            dy: (candidate.y - tip.y).abs(),
            order,
        }
    }
}

impl Ord for ContinuationRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.join
            .total_cmp(&other.join)
            .then(self.dy.total_cmp(&other.dy))
            .then(self.order.cmp(&other.order))
    }
}

impl PartialOrd for ContinuationRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ContinuationRank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ContinuationRank {}

/// Uniform grid over segment end points for radius queries no larger than a cell
struct EndpointIndex {
    cell: f64,
    cells: HashMap<(i64, i64), Vec<(usize, DVec2)>>,
}

impl EndpointIndex {
    fn new(cell: f64, entries: impl IntoIterator<Item = (usize, DVec2)>) -> Self {
        let mut index = EndpointIndex {
            cell,
            cells: HashMap::new(),
        };
        for (i, p) in entries {
            let key = index.key(p);
            index.cells.entry(key).or_default().push((i, p));
        }
        index
    }

    fn key(&self, p: DVec2) -> (i64, i64) {
        (
            (p.x / self.cell).floor() as i64,
            (p.y / self.cell).floor() as i64,
        )
    }

    fn within(&self, p: DVec2, radius: f64) -> impl Iterator<Item = (usize, DVec2)> + '_ {
        let (cx, cy) = self.key(p);
        (cx - 1..=cx + 1)
            .flat_map(move |x| (cy - 1..=cy + 1).map(move |y| (x, y)))
            .filter_map(move |k| self.cells.get(&k))
            .flatten()
            .copied()
            .filter(move |(_, q)| (*q - p).length() <= radius)
    }
}

/// Group the drawing's strokes into labeled traces.
///
/// Marker-shaped paths and grid lines never take part. A grid line is a
/// rectilinear path with neither end point touching a non-rectilinear path;
/// flat pieces of a trace stay because they join its sloped neighbours.
pub fn build_stack(drawing: &Drawing, options: &StackOptions, marker: &MarkerOptions) -> Stack {
    let bounds = drawing.bounds();
    let tol = options.join_tolerance_px;

    let eligible: Vec<(&PathElement, bool)> = drawing
        .paths()
        .filter(|p| p.points().len() >= 2 && !is_marker_shape(p, &bounds, marker))
        .map(|p| (p, p.is_rectilinear(marker.axis_tolerance_px)))
        .collect();
    let curve_ends = EndpointIndex::new(
        tol,
        eligible
            .iter()
            .enumerate()
            .filter(|(_, (_, rectilinear))| !rectilinear)
            .flat_map(|(i, (p, _))| [(i, p.start()), (i, p.end())]),
    );
    let touches_curve = |q: DVec2| curve_ends.within(q, tol).next().is_some();
    let segments: Vec<&PathElement> = eligible
        .iter()
        .filter(|(p, rectilinear)| !rectilinear || touches_curve(p.start()) || touches_curve(p.end()))
        .map(|(p, _)| *p)
        .collect();
    debug!(
        paths = drawing.paths().count(),
        segments = segments.len(),
        "candidate segments"
    );

    let mut tracer = Tracer::new(&segments, tol);
    let mut traces = Vec::new();
    for text in drawing.texts() {
        let content = text.content().trim();
        let Some(lead) = options.leads.iter().find(|l| l.eq_ignore_ascii_case(content)) else {
            continue;
        };
        let chain = match tracer.seed(text.anchor(), options.label_search_radius_px) {
            Some(seed) => tracer.trace(seed),
            None => Vec::new(),
        };
        debug!(lead = %lead, label = %text.id(), segments = chain.len(), "traced lead");
        traces.push(LabeledTrace {
            lead: lead.clone(),
            label: text.id(),
            segments: chain.iter().map(|&i| segments[i].id()).collect(),
            points: chain
                .iter()
                .flat_map(|&i| segments[i].points().iter().copied())
                .collect(),
        });
    }

    Stack {
        traces,
        options: options.clone(),
    }
}

struct Tracer<'a> {
    segments: &'a [&'a PathElement],
    claimed: Vec<bool>,
    starts: EndpointIndex,
    ends: EndpointIndex,
    tol: f64,
}

impl<'a> Tracer<'a> {
    fn new(segments: &'a [&'a PathElement], tol: f64) -> Self {
        Tracer {
            segments,
            claimed: vec![false; segments.len()],
            starts: EndpointIndex::new(tol, segments.iter().enumerate().map(|(i, p)| (i, p.start()))),
            ends: EndpointIndex::new(tol, segments.iter().enumerate().map(|(i, p)| (i, p.end()))),
            tol,
        }
    }

    /// Nearest unclaimed segment to a label anchor
    fn seed(&self, anchor: DVec2, radius: f64) -> Option<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.claimed[*i])
            .map(|(i, p)| (p.bbox().distance_to(anchor), i))
            .filter(|(d, _)| *d <= radius)
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, i)| i)
    }

    /// Chain from `seed` forward and backward; returns segment indices in order
    fn trace(&mut self, seed: usize) -> Vec<usize> {
        self.claimed[seed] = true;
        let mut forward = Vec::new();
        let mut tip = self.segments[seed].end();
        while let Some(next) = self.best(&self.starts, tip) {
            self.claimed[next] = true;
            forward.push(next);
            tip = self.segments[next].end();
        }

        let mut backward = Vec::new();
        let mut tip = self.segments[seed].start();
        while let Some(prev) = self.best(&self.ends, tip) {
            self.claimed[prev] = true;
            backward.push(prev);
            tip = self.segments[prev].start();
        }

        backward.reverse();
        backward.push(seed);
        backward.extend(forward);
        backward
    }

    fn best(&self, index: &EndpointIndex, tip: DVec2) -> Option<usize> {
        index
            .within(tip, self.tol)
            .filter(|(i, _)| !self.claimed[*i])
            .map(|(i, p)| (ContinuationRank::new(tip, p, self.segments[i].id()), i))
            .min_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, i)| i)
    }
}

/// Drop samples whose x (quantized to `resolution`) was already seen, keeping
/// the first one encountered, then sort by x.
pub fn dedup_x(points: &[DVec2], resolution: f64) -> Vec<DVec2> {
    let mut seen = HashSet::new();
    let mut kept: Vec<DVec2> = points
        .iter()
        .copied()
        .filter(|p| seen.insert((p.x / resolution).round() as i64))
        .collect();
    kept.sort_by(|a, b| a.x.total_cmp(&b.x));
    kept
}

/// Validate traces against the expected leads.
///
/// One entry per expected lead in the given order. A lead labeled more than
/// once keeps its first trace in document order, and each later occurrence
/// adds a [`ExtractionError::DuplicateLabel`] right after it.
pub fn process_stack(
    stack: &Stack,
    expected_leads: &[String],
) -> Vec<Result<LeadStack, ExtractionError>> {
    let mut out = Vec::with_capacity(expected_leads.len());
    for lead in expected_leads {
        let mut found = stack
            .traces
            .iter()
            .filter(|t| t.lead.eq_ignore_ascii_case(lead));
        let Some(first) = found.next() else {
            warn!(lead = %lead, "lead label not found");
            out.push(Err(ExtractionError::LabelNotFound { lead: lead.clone() }));
            continue;
        };
        out.push(lead_stack(lead, first, &stack.options));
        for duplicate in found {
            warn!(lead = %lead, label = %duplicate.label, "duplicate lead label");
            out.push(Err(ExtractionError::DuplicateLabel { lead: lead.clone() }));
        }
    }
    out
}

fn lead_stack(
    lead: &str,
    trace: &LabeledTrace,
    options: &StackOptions,
) -> Result<LeadStack, ExtractionError> {
    if trace.segments.is_empty() {
        return Err(ExtractionError::NoPathCluster {
            lead: lead.to_string(),
            radius: options.label_search_radius_px,
        });
    }
    let points = dedup_x(&trace.points, options.x_resolution_px);
    if points.len() < options.min_samples {
        return Err(ExtractionError::TooFewSamples {
            lead: lead.to_string(),
            samples: points.len(),
            min: options.min_samples,
        });
    }
    Ok(LeadStack {
        lead: lead.to_string(),
        label: trace.label,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;

    fn options(leads: &[&str]) -> StackOptions {
        StackOptions {
            leads: leads.iter().map(|s| s.to_string()).collect(),
            ..StackOptions::default()
        }
    }

    fn xs(lead: &LeadStack) -> Vec<f64> {
        lead.points.iter().map(|p| p.x).collect()
    }

    #[test]
    fn chains_segments_in_both_directions() {
        let drawing = Drawing::builder()
            .path([(20.0, 0.0), (30.0, 4.0)])
            .path([(0.0, 0.0), (10.0, 5.0)])
            .path([(10.0, 5.0), (20.0, 0.0)])
            .text("II", 0.0, -10.0)
            .build();
        let opts = options(&["II"]);
        let stack = build_stack(&drawing, &opts, &MarkerOptions::default());
        assert_eq!(
            stack.traces[0].segments,
            vec![ElementId(1), ElementId(2), ElementId(0)]
        );

        let leads = process_stack(&stack, &opts.leads);
        let lead = leads[0].as_ref().unwrap();
        assert_eq!(xs(lead), vec![0.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn labels_match_case_insensitively() {
        let drawing = Drawing::builder()
            .path([(0.0, 0.0), (10.0, 5.0)])
            .text(" AVR ", 0.0, -5.0)
            .build();
        let opts = options(&["aVR"]);
        let stack = build_stack(&drawing, &opts, &MarkerOptions::default());
        assert_eq!(stack.traces.len(), 1);
        assert_eq!(stack.traces[0].lead, "aVR");
    }

    #[test]
    fn tie_break_prefers_the_smaller_vertical_jump() {
        // Both continuations start the same distance from the tip
        let drawing = Drawing::builder()
            .path([(0.0, 0.0), (10.0, 0.0), (10.0, 1.0)])
            .path([(10.5, 1.75), (20.0, 5.0)])
            .path([(10.75, 1.5), (20.0, -5.0)])
            .text("I", 0.0, -5.0)
            .build();
        let opts = options(&["I"]);
        let stack = build_stack(&drawing, &opts, &MarkerOptions::default());
        assert_eq!(stack.traces[0].segments, vec![ElementId(0), ElementId(2)]);
    }

    #[test]
    fn continuation_rank_orders_by_join_then_dy_then_document_order() {
        let tip = dvec2(0.0, 0.0);
        let near = ContinuationRank::new(tip, dvec2(0.5, 0.0), ElementId(9));
        let far = ContinuationRank::new(tip, dvec2(0.9, 0.0), ElementId(1));
        assert!(near < far);

        let flat = ContinuationRank::new(tip, dvec2(0.8, 0.6), ElementId(9));
        let steep = ContinuationRank::new(tip, dvec2(0.6, 0.8), ElementId(1));
        assert!(flat < steep);

        let first = ContinuationRank::new(tip, dvec2(0.5, 0.0), ElementId(1));
        let second = ContinuationRank::new(tip, dvec2(0.5, 0.0), ElementId(2));
        assert!(first < second);
    }

    #[test]
    fn first_sample_at_an_x_wins() {
        let points = [
            dvec2(0.0, 0.0),
            dvec2(5.0, 2.0),
            dvec2(5.0, 8.0),
            dvec2(5.0004, 9.0),
            dvec2(3.0, 1.0),
        ];
        let kept = dedup_x(&points, 0.001);
        assert_eq!(
            kept,
            vec![dvec2(0.0, 0.0), dvec2(3.0, 1.0), dvec2(5.0, 2.0)]
        );
    }

    #[test]
    fn grid_lines_are_not_segments() {
        let drawing = Drawing::builder()
            // grid line right next to the label
            .path([(0.0, -8.0), (100.0, -8.0)])
            .path([(0.0, 0.0), (10.0, 5.0)])
            // flat piece joined to the trace
            .path([(10.0, 5.0), (20.0, 5.0)])
            .text("V1", 0.0, -10.0)
            .build();
        let opts = options(&["V1"]);
        let stack = build_stack(&drawing, &opts, &MarkerOptions::default());
        assert_eq!(stack.traces[0].segments, vec![ElementId(1), ElementId(2)]);
    }

    #[test]
    fn claimed_segments_are_not_reused() {
        let drawing = Drawing::builder()
            .path([(0.0, 0.0), (10.0, 5.0)])
            .text("I", 0.0, -5.0)
            .text("II", 2.0, -5.0)
            .build();
        let opts = options(&["I", "II"]);
        let stack = build_stack(&drawing, &opts, &MarkerOptions::default());
        let leads = process_stack(&stack, &opts.leads);
        assert!(leads[0].is_ok());
        assert_eq!(
            leads[1],
            Err(ExtractionError::NoPathCluster {
                lead: "II".into(),
                radius: 200.0
            })
        );
    }

    #[test]
    fn missing_duplicate_and_short_leads() {
        let drawing = Drawing::builder()
            .path([(0.0, 0.0), (10.0, 5.0), (20.0, 0.0)])
            .path([(0.0, 500.0), (10.0, 505.0)])
            .path([(0.0, 1000.0), (10.0, 1005.0), (20.0, 1000.0)])
            .text("I", 0.0, -5.0)
            .text("II", 0.0, 495.0)
            .text("I", 0.0, 995.0)
            .build();
        let opts = StackOptions {
            min_samples: 3,
            ..options(&["I", "II", "III"])
        };
        let stack = build_stack(&drawing, &opts, &MarkerOptions::default());
        let leads = process_stack(&stack, &opts.leads);

        assert_eq!(leads.len(), 4);
        assert_eq!(leads[0].as_ref().unwrap().label, ElementId(3));
        assert_eq!(
            leads[1],
            Err(ExtractionError::DuplicateLabel { lead: "I".into() })
        );
        assert_eq!(
            leads[2],
            Err(ExtractionError::TooFewSamples {
                lead: "II".into(),
                samples: 2,
                min: 3
            })
        );
        assert_eq!(
            leads[3],
            Err(ExtractionError::LabelNotFound { lead: "III".into() })
        );
    }
}
