use serde::{Deserialize, Serialize};

use crate::sheet::{Align, CellStyle, Stripe};

/// Named colour and font presets used when rendering the report and the
/// email. Colours are hex RGB without the leading `#`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylePresets {
    pub font_family: String,
    pub font_size_pt: u32,
    pub header_fill: String,
    pub header_font: String,
    pub day_fill: String,
    pub alternate_fill: String,
    pub plain_fill: String,
    pub body_font: String,
    pub border: String,
    pub email_alternate_fill: String,
    pub email_highlight: String,
}

impl Default for StylePresets {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size_pt: 10,
            header_fill: "1F3864".to_string(),
            header_font: "FFFFFF".to_string(),
            day_fill: "2E75B6".to_string(),
            alternate_fill: "D9E1F2".to_string(),
            plain_fill: "FFFFFF".to_string(),
            body_font: "222222".to_string(),
            border: "BFBFBF".to_string(),
            email_alternate_fill: "EAF0FB".to_string(),
            email_highlight: "1F6E43".to_string(),
        }
    }
}

impl StylePresets {
    /// Inline CSS for a cell with the given role.
    pub fn css(&self, style: Option<CellStyle>) -> String {
        let (fill, font, bold, align) = match style {
            Some(CellStyle::Header { align }) => (&self.header_fill, &self.header_font, true, align),
            Some(CellStyle::DayHeader) => (&self.day_fill, &self.header_font, true, Align::Center),
            Some(CellStyle::Body { stripe, align }) => {
                let fill = match stripe {
                    Stripe::Alternate => &self.alternate_fill,
                    Stripe::Plain => &self.plain_fill,
                };
                (fill, &self.body_font, false, align)
            }
            None => (&self.plain_fill, &self.body_font, false, Align::Left),
        };

        format!(
            "font-family:{}; font-size:{}pt; background:#{fill}; color:#{font};{} text-align:{}; border:1px solid #{}; padding:2px 6px;",
            self.font_family,
            self.font_size_pt,
            if bold { " font-weight:bold;" } else { "" },
            match align {
                Align::Left => "left",
                Align::Center => "center",
            },
            self.border,
        )
    }

    pub fn is_hex_colour(value: &str) -> bool {
        value.len() == 6 && value.chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn colours(&self) -> [(&'static str, &str); 9] {
        [
            ("header_fill", self.header_fill.as_str()),
            ("header_font", self.header_font.as_str()),
            ("day_fill", self.day_fill.as_str()),
            ("alternate_fill", self.alternate_fill.as_str()),
            ("plain_fill", self.plain_fill.as_str()),
            ("body_font", self.body_font.as_str()),
            ("border", self.border.as_str()),
            ("email_alternate_fill", self.email_alternate_fill.as_str()),
            ("email_highlight", self.email_highlight.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_css_is_bold_on_header_fill() {
        let presets = StylePresets::default();
        let css = presets.css(Some(CellStyle::Header { align: Align::Left }));
        assert!(css.contains("background:#1F3864"));
        assert!(css.contains("font-weight:bold"));
        assert!(css.contains("text-align:left"));
    }

    #[test]
    fn stripes_pick_different_fills() {
        let presets = StylePresets::default();
        let alt = presets.css(Some(CellStyle::Body {
            stripe: Stripe::Alternate,
            align: Align::Center,
        }));
        let plain = presets.css(Some(CellStyle::Body {
            stripe: Stripe::Plain,
            align: Align::Center,
        }));
        assert!(alt.contains("#D9E1F2"));
        assert!(plain.contains("#FFFFFF"));
    }

    #[test]
    fn default_colours_are_valid_hex() {
        let presets = StylePresets::default();
        assert!(presets
            .colours()
            .iter()
            .all(|(_, value)| StylePresets::is_hex_colour(value)));
        assert!(!StylePresets::is_hex_colour("#FFFFFF"));
    }
}
