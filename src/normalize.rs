//! Pixel samples to physical units

use serde::{Deserialize, Serialize};

use crate::config::{NormalizeOptions, TimeOrigin};
use crate::stack::LeadStack;
use crate::types::{Millivolts, ScaleFactors, Seconds};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "time_s")]
    pub time: Seconds,
    #[serde(rename = "amplitude_mv")]
    pub amplitude: Millivolts,
}

/// One lead in seconds and millivolts, times strictly increasing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWaveform {
    pub lead: String,
    pub samples: Vec<Sample>,
}

/// Convert a lead's pixel samples with the document's scale factors.
///
/// Amplitude is measured upward from `baseline_y` (pixel y grows downward).
/// A sample that lands on the previous sample's time after scaling is dropped.
pub fn normalize(
    lead: &LeadStack,
    scale: &ScaleFactors,
    baseline_y: f64,
    options: &NormalizeOptions,
) -> NormalizedWaveform {
    let origin = match options.time_origin {
        TimeOrigin::Drawing => 0.0,
        TimeOrigin::LeadStart => lead.points.first().map_or(0.0, |p| p.x),
    };

    let mut samples: Vec<Sample> = Vec::with_capacity(lead.points.len());
    for p in &lead.points {
        let sample = Sample {
            time: scale.time(p.x - origin),
            amplitude: scale.amplitude(baseline_y - p.y),
        };
        if samples.last().is_some_and(|prev| sample.time <= prev.time) {
            continue;
        }
        samples.push(sample);
    }

    NormalizedWaveform {
        lead: lead.lead.clone(),
        samples,
    }
}
