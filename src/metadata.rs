//! Metadata fields from the text printed above and below the strips.

use regex_lite::Regex;
use serde::ser::{Serialize, Serializer};

use crate::config::{MetadataField, MetadataOptions};
use crate::drawing::{Drawing, TextElement};
use crate::errors::{ConfigError, MetadataError};
use crate::log::debug;

/// Field name to value, in configured field order. Every configured field is
/// present; unmatched fields are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataRecord {
    fields: Vec<(String, Option<String>)>,
}

impl MetadataRecord {
    /// A record with every field unmatched
    pub fn empty<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            fields: names.into_iter().map(|n| (n.to_string(), None)).collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for MetadataRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.fields.iter().map(|(k, v)| (k, v)))
    }
}

/// Compiled field patterns plus the region settings
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    options: MetadataOptions,
    patterns: Vec<Regex>,
}

impl MetadataExtractor {
    pub fn new(options: &MetadataOptions) -> Result<Self, ConfigError> {
        let patterns = options
            .fields
            .iter()
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            options: options.clone(),
            patterns,
        })
    }

    pub fn fields(&self) -> &[MetadataField] {
        &self.options.fields
    }

    /// Names of the fields a complete document must have
    pub fn expected_fields(&self) -> impl Iterator<Item = &str> {
        self.options
            .fields
            .iter()
            .filter(|f| f.expected)
            .map(|f| f.name.as_str())
    }

    /// A record with every configured field unmatched
    pub fn empty_record(&self) -> MetadataRecord {
        MetadataRecord::empty(self.options.fields.iter().map(|f| f.name.as_str()))
    }

    pub fn extract(&self, drawing: &Drawing) -> Result<MetadataRecord, MetadataError> {
        if drawing.texts().next().is_none() {
            return Err(MetadataError::NoTextRegions);
        }

        let candidates = self.candidate_strings(drawing);
        let fields = self
            .options
            .fields
            .iter()
            .zip(&self.patterns)
            .map(|(field, re)| {
                let value = candidates.iter().find_map(|text| {
                    re.captures(text)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str().trim().to_string())
                        .filter(|v| !v.is_empty())
                });
                debug!(field = %field.name, value = ?value, "metadata field");
                (field.name.clone(), value)
            })
            .collect();
        Ok(MetadataRecord { fields })
    }

    /// Texts in the metadata regions, line by line from the top. Each line
    /// contributes its elements left to right, then the joined line.
    fn candidate_strings(&self, drawing: &Drawing) -> Vec<String> {
        let bounds = drawing.bounds();
        let top = bounds.min.y + self.options.top_band * bounds.height();
        let bottom = bounds.max.y - self.options.bottom_band * bounds.height();

        let mut texts: Vec<&TextElement> = drawing
            .texts()
            .filter(|t| t.anchor().y <= top || t.anchor().y >= bottom)
            .collect();
        texts.sort_by(|a, b| a.anchor().y.total_cmp(&b.anchor().y));

        let mut out = Vec::new();
        let mut rest = texts.as_slice();
        while let Some(first) = rest.first() {
            let line_y = first.anchor().y;
            let len = rest
                .iter()
                .take_while(|t| t.anchor().y - line_y <= self.options.line_tolerance_px)
                .count();
            let mut line = rest[..len].to_vec();
            rest = &rest[len..];

            line.sort_by(|a, b| a.anchor().x.total_cmp(&b.anchor().x));
            out.extend(line.iter().map(|t| t.content().to_string()));
            if line.len() > 1 {
                let joined: Vec<&str> = line.iter().map(|t| t.content()).collect();
                out.push(joined.join(" "));
            }
        }
        out
    }
}

fn compile(field: &MetadataField) -> Result<Regex, ConfigError> {
    let re = Regex::new(&field.pattern).map_err(|source| ConfigError::InvalidPattern {
        field: field.name.clone(),
        source,
    })?;
    if re.captures_len() < 2 {
        return Err(ConfigError::MissingCaptureGroup {
            field: field.name.clone(),
        });
    }
    Ok(re)
}
