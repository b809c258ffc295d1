//! Flat rows for tabular serializers (CSV and friends)

use serde::{Deserialize, Serialize};

use crate::pipeline::DocumentResult;

/// One sample of one lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformRow {
    pub document_id: String,
    pub lead: String,
    pub time_s: f64,
    pub amplitude_mv: f64,
}

/// One resolved metadata field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub document_id: String,
    pub field: String,
    pub value: String,
}

impl DocumentResult {
    /// Every sample of every resolved lead, leads in expected order
    pub fn waveform_rows(&self) -> impl Iterator<Item = WaveformRow> + '_ {
        self.waveforms.iter().flat_map(move |w| {
            w.samples.iter().map(move |s| WaveformRow {
                document_id: self.document_id.clone(),
                lead: w.lead.clone(),
                time_s: s.time.raw(),
                amplitude_mv: s.amplitude.raw(),
            })
        })
    }

    /// Resolved metadata fields in configured order; unmatched fields are left out
    pub fn metadata_rows(&self) -> impl Iterator<Item = MetadataRow> + '_ {
        self.metadata.iter().filter_map(move |(field, value)| {
            value.map(|value| MetadataRow {
                document_id: self.document_id.clone(),
                field: field.to_string(),
                value: value.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ExtractConfig, MetadataField, MetadataOptions, StackOptions};
    use crate::drawing::Drawing;
    use crate::pipeline::Pipeline;

    #[test]
    fn rows_for_one_document() {
        let config = ExtractConfig {
            stack: StackOptions {
                leads: vec!["I".into()],
                ..StackOptions::default()
            },
            metadata: MetadataOptions {
                fields: vec![
                    MetadataField::new("ID", r"ID:\s*(\w+)", true),
                    MetadataField::new("Date", r"(\d+/\d+/\d+)", false),
                ],
                ..MetadataOptions::default()
            },
            ..ExtractConfig::default()
        };
        let drawing = Drawing::builder()
            .text("ID: 42", -40.0, -60.0)
            .closed_path([(-40.0, -10.0), (-36.0, -10.0), (-36.0, 0.0), (-40.0, 0.0)])
            .path([(0.0, 0.0), (10.0, 5.0), (20.0, 0.0)])
            .text("I", 0.0, -5.0)
            .build();
        let result = Pipeline::new(config).unwrap().process("ecg-1", &drawing);

        let rows: Vec<_> = result
            .waveform_rows()
            .map(|r| format!("{},{},{:.3},{:.3}", r.document_id, r.lead, r.time_s, r.amplitude_mv))
            .collect();
        insta::assert_snapshot!(rows.join("\n"), @r"
        ecg-1,I,0.000,0.000
        ecg-1,I,0.100,-0.500
        ecg-1,I,0.200,0.000
        ");

        let meta: Vec<_> = result.metadata_rows().collect();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].field, "ID");
        assert_eq!(meta[0].value, "42");
    }
}
