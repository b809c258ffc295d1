//! Stroke and fill styles, from presentation attributes and `style` strings.

use thiserror::Error;

use crate::log::warn;

/// A color value
#[derive(Debug, Clone, PartialEq)]
pub enum Color {
    /// No paint
    None,
    Rgb { r: u8, g: u8, b: u8 },
    /// Anything else we do not resolve (`currentColor`, `url(#grad)`, ...)
    Named(String),
}

impl Color {
    /// Parse a color from a string
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("none") {
            return Color::None;
        }

        if let Some(inner) = s.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
            let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
            if let [r, g, b] = parts[..] {
                if let (Ok(r), Ok(g), Ok(b)) = (r.parse(), g.parse(), b.parse()) {
                    return Color::Rgb { r, g, b };
                }
            }
        }

        if let Some(hex) = s.strip_prefix('#') {
            let channel = |i: usize, w: usize| u8::from_str_radix(hex.get(i..i + w)?, 16).ok();
            match hex.len() {
                6 => {
                    if let (Some(r), Some(g), Some(b)) = (channel(0, 2), channel(2, 2), channel(4, 2))
                    {
                        return Color::Rgb { r, g, b };
                    }
                }
                3 => {
                    if let (Some(r), Some(g), Some(b)) = (channel(0, 1), channel(1, 1), channel(2, 1))
                    {
                        // #abc -> #aabbcc
                        return Color::Rgb {
                            r: r * 17,
                            g: g * 17,
                            b: b * 17,
                        };
                    }
                }
                _ => {}
            }
        }

        match s.to_ascii_lowercase().as_str() {
            "black" => Color::Rgb { r: 0, g: 0, b: 0 },
            "white" => Color::Rgb {
                r: 255,
                g: 255,
                b: 255,
            },
            "red" => Color::Rgb { r: 255, g: 0, b: 0 },
            "green" => Color::Rgb { r: 0, g: 128, b: 0 },
            "blue" => Color::Rgb { r: 0, g: 0, b: 255 },
            "gray" | "grey" => Color::Rgb {
                r: 128,
                g: 128,
                b: 128,
            },
            "pink" => Color::Rgb {
                r: 255,
                g: 192,
                b: 203,
            },
            _ => Color::Named(s.to_string()),
        }
    }
}

/// Paint properties of one element after inheritance
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Style {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_width: Option<f64>,
}

impl Style {
    /// Parse style from a CSS-like string (e.g. "fill:none;stroke-width:2.16;stroke:#000")
    pub fn parse(s: &str) -> Result<Self, StyleParseError> {
        let mut style = Style::default();
        for part in s.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = part
                .split_once(':')
                .ok_or_else(|| StyleParseError::InvalidProperty(part.to_string()))?;
            style.set(key.trim(), value.trim())?;
        }
        Ok(style)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StyleParseError> {
        match key {
            "fill" => self.fill = Some(Color::parse(value)),
            "stroke" => self.stroke = Some(Color::parse(value)),
            "stroke-width" => {
                let number = value.strip_suffix("px").unwrap_or(value);
                self.stroke_width = Some(
                    number
                        .parse()
                        .map_err(|_| StyleParseError::InvalidNumber(value.to_string()))?,
                );
            }
            _ => {}
        }
        Ok(())
    }

    /// Style of `node`: presentation attributes, then its `style` attribute,
    /// then whatever the parent set that this node leaves unset.
    ///
    /// Malformed declarations are skipped with a warning; styles never make a
    /// document unreadable.
    pub fn for_node(node: roxmltree::Node<'_, '_>, parent: &Style) -> Style {
        let mut own = Style::default();
        for key in ["fill", "stroke", "stroke-width"] {
            let Some(value) = node.attribute(key) else {
                continue;
            };
            if let Err(err) = own.set(key, value.trim()) {
                warn!(element = node.tag_name().name(), %err, "ignoring presentation attribute");
            }
        }
        if let Some(css) = node.attribute("style") {
            match Style::parse(css) {
                Ok(declared) => own = declared.inherit(&own),
                Err(err) => {
                    warn!(element = node.tag_name().name(), %err, "ignoring style attribute");
                }
            }
        }
        own.inherit(parent)
    }

    /// Fill every unset property from `parent`
    pub fn inherit(mut self, parent: &Style) -> Style {
        if self.fill.is_none() {
            self.fill = parent.fill.clone();
        }
        if self.stroke.is_none() {
            self.stroke = parent.stroke.clone();
        }
        if self.stroke_width.is_none() {
            self.stroke_width = parent.stroke_width;
        }
        self
    }
}

/// Error parsing style
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StyleParseError {
    #[error("invalid style property: {0}")]
    InvalidProperty(String),
    #[error("invalid number in style: {0}")]
    InvalidNumber(String),
}
