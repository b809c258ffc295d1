//! Calibration marker: the reference pulse printed at the left of the strip.
//!
//! The marker's pixel height stands for the standard amplitude and its plateau
//! width for the standard duration. Exactly one marker must be resolved per
//! document; guessing between look-alikes would silently mis-scale every lead.

use serde::Serialize;

use crate::config::{CalibrationStandard, MarkerOptions};
use crate::drawing::{Drawing, Element, ElementId, PathElement};
use crate::errors::CalibrationError;
use crate::log::debug;
use crate::types::{BBox, ScaleFactors};

/// A resolved calibration marker, in drawing pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationMarker {
    #[serde(skip)]
    pub element: ElementId,
    /// Pulse height (H)
    pub height_px: f64,
    /// Plateau width (W)
    pub width_px: f64,
    /// y of the pulse foot; zero amplitude for every lead
    pub baseline_y: f64,
    #[serde(skip)]
    pub bbox: BBox,
}

impl CalibrationMarker {
    pub fn scale(&self, standard: &CalibrationStandard) -> Result<ScaleFactors, CalibrationError> {
        ScaleFactors::try_new(
            standard.amplitude_mv / self.height_px,
            standard.duration_s / self.width_px,
        )
        .map_err(|source| CalibrationError::InvalidScale { source })
    }
}

/// The strip of the drawing searched for the marker
pub fn marker_band(bounds: &BBox, options: &MarkerOptions) -> BBox {
    let mut band = *bounds;
    band.max.x = bounds.min.x + options.band_fraction * bounds.width();
    band
}

/// Measure `path` as a marker, if it has the marker signature: inside the
/// left band, rectilinear, tall and wide enough.
pub fn marker_signature(
    path: &PathElement,
    bounds: &BBox,
    options: &MarkerOptions,
) -> Option<CalibrationMarker> {
    let bbox = path.bbox();
    if bbox.is_empty() || !marker_band(bounds, options).contains(&bbox) {
        return None;
    }
    if !path.is_rectilinear(options.axis_tolerance_px) {
        return None;
    }

    let height = bbox.height();
    let top = path
        .points()
        .iter()
        .filter(|p| p.y - bbox.min.y <= options.axis_tolerance_px);
    let plateau = BBox::from_points(top);
    let width = if plateau.is_empty() { 0.0 } else { plateau.width() };

    (height >= options.min_height_px && width >= options.min_width_px).then(|| CalibrationMarker {
        element: path.id(),
        height_px: height,
        width_px: width,
        baseline_y: bbox.max.y,
        bbox,
    })
}

/// True if `path` looks like a calibration marker within `bounds`
pub fn is_marker_shape(path: &PathElement, bounds: &BBox, options: &MarkerOptions) -> bool {
    marker_signature(path, bounds, options).is_some()
}

/// Find the one calibration marker and derive the document's scale factors.
pub fn locate_marker(
    drawing: &Drawing,
    standard: &CalibrationStandard,
    options: &MarkerOptions,
) -> Result<(CalibrationMarker, ScaleFactors), CalibrationError> {
    let bounds = drawing.bounds();
    let mut candidates: Vec<CalibrationMarker> = drawing
        .paths()
        .filter_map(|p| marker_signature(p, &bounds, options))
        .collect();
    candidates.sort_by(|a, b| {
        b.bbox
            .area()
            .total_cmp(&a.bbox.area())
            .then(a.element.cmp(&b.element))
    });

    let Some(best) = candidates.first().copied() else {
        return Err(CalibrationError::NoCandidate {
            band_px: marker_band(&bounds, options).width().max(0.0),
            min_height: options.min_height_px,
            min_width: options.min_width_px,
        });
    };

    // Candidates the winner does not clearly beat
    let rivals = candidates
        .iter()
        .filter(|c| best.bbox.area() <= c.bbox.area() * (1.0 + options.ambiguity_ratio))
        .count();
    if rivals > 1 {
        debug!(candidates = candidates.len(), rivals, "ambiguous calibration marker");
        return Err(CalibrationError::Ambiguous { count: rivals });
    }

    let scale = best.scale(standard)?;
    debug!(
        element = %best.element,
        height = best.height_px,
        width = best.width_px,
        mv_per_px = scale.mv_per_px,
        s_per_px = scale.s_per_px,
        "calibration marker"
    );
    Ok((best, scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> [(f64, f64); 4] {
        [(x, y), (x + w, y), (x + w, y + h), (x, y + h)]
    }

    fn standard() -> CalibrationStandard {
        CalibrationStandard {
            amplitude_mv: 1.0,
            duration_s: 0.04,
        }
    }

    #[test]
    fn rectangle_marker_sets_the_scale() {
        let drawing = Drawing::builder()
            .closed_path(rect(-40.0, -10.0, 4.0, 10.0))
            .path([(0.0, 0.0), (10.0, 5.0), (20.0, 0.0)])
            .build();
        let (marker, scale) =
            locate_marker(&drawing, &standard(), &MarkerOptions::default()).unwrap();
        assert_eq!(marker.height_px, 10.0);
        assert_eq!(marker.width_px, 4.0);
        assert_eq!(marker.baseline_y, 0.0);
        assert_eq!(scale, ScaleFactors::try_new(0.1, 0.01).unwrap());
    }

    #[test]
    fn stepped_pulse_uses_the_plateau_width() {
        let drawing = Drawing::builder()
            .path([
                (0.0, 20.0),
                (2.0, 20.0),
                (2.0, 0.0),
                (7.0, 0.0),
                (7.0, 20.0),
                (9.0, 20.0),
            ])
            .path([(100.0, 20.0), (110.0, 30.0), (120.0, 20.0)])
            .build();
        let (marker, _) = locate_marker(&drawing, &standard(), &MarkerOptions::default()).unwrap();
        assert_eq!(marker.width_px, 5.0);
        assert_eq!(marker.height_px, 20.0);
        assert_eq!(marker.baseline_y, 20.0);
    }

    #[test]
    fn missing_marker_fails() {
        let drawing = Drawing::builder()
            .path([(0.0, 0.0), (10.0, 5.0), (20.0, 0.0)])
            .build();
        assert!(matches!(
            locate_marker(&drawing, &standard(), &MarkerOptions::default()),
            Err(CalibrationError::NoCandidate { .. })
        ));
    }

    #[test]
    fn two_equal_candidates_are_ambiguous() {
        let drawing = Drawing::builder()
            .closed_path(rect(0.0, 0.0, 4.0, 10.0))
            .closed_path(rect(0.0, 20.0, 4.0, 10.0))
            .path([(50.0, 0.0), (100.0, 5.0), (200.0, 0.0)])
            .build();
        assert_eq!(
            locate_marker(&drawing, &standard(), &MarkerOptions::default()),
            Err(CalibrationError::Ambiguous { count: 2 })
        );
    }

    #[test]
    fn clearly_larger_candidate_wins() {
        let drawing = Drawing::builder()
            .closed_path(rect(0.0, 0.0, 2.0, 4.0))
            .closed_path(rect(0.0, 20.0, 4.0, 10.0))
            .path([(50.0, 0.0), (100.0, 5.0), (200.0, 0.0)])
            .build();
        let (marker, _) = locate_marker(&drawing, &standard(), &MarkerOptions::default()).unwrap();
        assert_eq!(marker.element, ElementId(1));
    }

    #[test]
    fn shapes_outside_the_band_are_ignored() {
        let bounds = BBox::from_corners(glam::dvec2(0.0, 0.0), glam::dvec2(100.0, 100.0));
        let drawing = Drawing::builder()
            .closed_path(rect(50.0, 0.0, 4.0, 10.0))
            .build();
        let path = drawing.paths().next().unwrap();
        assert!(!is_marker_shape(path, &bounds, &MarkerOptions::default()));
    }

    #[test]
    fn scale_is_translation_invariant() {
        let at = |dx: f64, dy: f64| {
            let drawing = Drawing::builder()
                .closed_path(rect(dx, dy, 4.0, 10.0))
                .path([(dx + 50.0, dy), (dx + 200.0, dy + 5.0)])
                .build();
            locate_marker(&drawing, &standard(), &MarkerOptions::default())
                .unwrap()
                .1
        };
        let base = at(0.0, 0.0);
        let shifted = at(1234.5, -321.25);
        assert!((base.mv_per_px - shifted.mv_per_px).abs() < 1e-12);
        assert!((base.s_per_px - shifted.s_per_px).abs() < 1e-12);
        assert!(base.mv_per_px > 0.0 && base.s_per_px > 0.0);
    }
}
