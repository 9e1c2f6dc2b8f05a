//! Colour ramps and the discrete legend that goes with them.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// `rrggbb` without the leading `#`, as tile services expect.
    pub fn hex(&self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn lerp(&self, other: &Color, t: f64) -> Color {
        let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

impl FromStr for Color {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidColor(s.to_string());
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());

        Ok(Color {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl TryFrom<String> for Color {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.hex())
    }
}

/// Parses a list of `#rrggbb` strings.
pub fn parse_palette<S: AsRef<str>>(colors: &[S]) -> Result<Vec<Color>, ConfigError> {
    colors.iter().map(|c| c.as_ref().parse()).collect()
}

/// Linear mapping of `[min, max]` onto an ordered palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<Color>,
}

impl VisParams {
    pub fn new(min: f64, max: f64, palette: Vec<Color>) -> Result<Self, ConfigError> {
        let vis = VisParams { min, max, palette };
        vis.validate()?;
        Ok(vis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min < self.max) {
            return Err(ConfigError::InvalidVisRange {
                min: self.min,
                max: self.max,
            });
        }
        if self.palette.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }

        Ok(())
    }

    /// Colour of `value`; values outside the domain take the end colours.
    pub fn color_at(&self, value: f64) -> Color {
        let last = self.palette.len() - 1;
        if last == 0 {
            return self.palette[0];
        }

        let t = ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        let position = t * last as f64;
        let lower = (position.floor() as usize).min(last - 1);

        self.palette[lower].lerp(&self.palette[lower + 1], position - lower as f64)
    }
}

/// Title plus one (swatch, label) row per palette entry, in palette order.
#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    pub title: String,
    pub rows: Vec<LegendRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendRow {
    pub color: Color,
    pub label: String,
}

impl Legend {
    pub fn build<S: AsRef<str>>(
        title: &str,
        palette: &[Color],
        labels: &[S],
    ) -> Result<Self, ConfigError> {
        if palette.len() != labels.len() {
            return Err(ConfigError::LegendMismatch {
                palette: palette.len(),
                labels: labels.len(),
            });
        }

        let rows = palette
            .iter()
            .zip(labels)
            .map(|(color, label)| LegendRow {
                color: *color,
                label: label.as_ref().to_string(),
            })
            .collect();

        Ok(Legend {
            title: title.to_string(),
            rows,
        })
    }

    /// Widget tree for a map surface: a bottom-left panel with a bold title
    /// and one horizontal row per entry.
    pub fn to_panel(&self) -> Widget {
        let mut children = vec![Widget::label(
            &self.title,
            &[
                ("fontWeight", "bold"),
                ("fontSize", "14px"),
                ("margin", "0 0 6px 0"),
                ("padding", "0"),
            ],
        )];

        for row in &self.rows {
            let swatch = Widget::label(
                "",
                &[
                    ("backgroundColor", &row.color.to_string()),
                    ("padding", "8px"),
                    ("margin", "0 0 4px 0"),
                ],
            );
            let description = Widget::label(&row.label, &[("margin", "0 0 4px 6px")]);
            children.push(Widget::Panel {
                children: vec![swatch, description],
                layout: Layout::Horizontal,
                style: Style::default(),
            });
        }

        Widget::Panel {
            children,
            layout: Layout::Vertical,
            style: Style::from_pairs(&[("position", "bottom-left"), ("padding", "8px 15px")]),
        }
    }
}

impl fmt::Display for Legend {
    /// Terminal rendering with true-colour swatches.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        for row in &self.rows {
            let Color { r, g, b } = row.color;
            writeln!(f, "\x1b[48;2;{r};{g};{b}m    \x1b[0m {}", row.label)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Vertical,
    Horizontal,
}

/// CSS-like style properties, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style(pub Vec<(String, String)>);

impl Style {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Style(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
impl Style {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    Label {
        text: String,
        style: Style,
    },
    Panel {
        children: Vec<Widget>,
        layout: Layout,
        style: Style,
    },
}

impl Widget {
    pub fn label(text: &str, style: &[(&str, &str)]) -> Self {
        Widget::Label {
            text: text.to_string(),
            style: Style::from_pairs(style),
        }
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn palette() -> Vec<Color> {
        parse_palette(&["#f7fbff", "#deebf7", "#9ecae1", "#3182bd", "#08519c"]).unwrap()
    }

    #[test]
    fn should_parse_colors() {
        let c: Color = "#3182bd".parse().unwrap();
        assert_eq!(c, Color { r: 0x31, g: 0x82, b: 0xbd });
        assert_eq!(c.to_string(), "#3182bd");
        assert_eq!(c.hex(), "3182bd");

        assert!("#3182b".parse::<Color>().is_err());
        assert!("#zz82bd".parse::<Color>().is_err());
    }

    #[test]
    fn should_fail_on_palette_label_mismatch() {
        let labels = ["0–50", "50–100", "100–200", "200–300"];

        let result = Legend::build("MAM Rainfall (mm)", &palette(), &labels);

        assert_eq!(
            result,
            Err(ConfigError::LegendMismatch {
                palette: 5,
                labels: 4
            })
        );
    }

    #[test]
    fn should_keep_rows_in_palette_order() {
        let labels = ["0–50", "50–100", "100–200", "200–300", "300–400+"];

        let legend = Legend::build("MAM Rainfall (mm)", &palette(), &labels).unwrap();

        assert_eq!(legend.rows.len(), 5);
        assert_eq!(legend.rows[0].label, "0–50");
        assert_eq!(legend.rows[0].color, palette()[0]);
        assert_eq!(legend.rows[4].label, "300–400+");
        assert_eq!(legend.rows[4].color, palette()[4]);
    }

    #[test]
    fn should_build_panel_with_title_first() {
        let legend = Legend::build("Title", &palette()[..2], &["a", "b"]).unwrap();

        match legend.to_panel() {
            Widget::Panel {
                children, style, ..
            } => {
                assert_eq!(children.len(), 3);
                assert_eq!(style.get("position"), Some("bottom-left"));
                assert!(matches!(&children[0], Widget::Label { text, .. } if text == "Title"));
                match &children[2] {
                    Widget::Panel {
                        children, layout, ..
                    } => {
                        assert_eq!(*layout, Layout::Horizontal);
                        assert!(matches!(&children[0], Widget::Label { style, .. }
                            if style.get("backgroundColor") == Some("#deebf7")));
                        assert!(matches!(&children[1], Widget::Label { text, .. } if text == "b"));
                    }
                    other => panic!("unexpected row {other:?}"),
                }
            }
            other => panic!("unexpected widget {other:?}"),
        }
    }

    #[test]
    fn should_interpolate_ramp_linearly() {
        let black = Color { r: 0, g: 0, b: 0 };
        let white = Color { r: 255, g: 255, b: 255 };
        let vis = VisParams::new(0.0, 400.0, vec![black, white]).unwrap();

        assert_eq!(vis.color_at(0.0), black);
        assert_eq!(vis.color_at(400.0), white);
        assert_eq!(vis.color_at(-10.0), black);
        assert_eq!(vis.color_at(1000.0), white);
        assert_eq!(vis.color_at(200.0), Color { r: 128, g: 128, b: 128 });
    }

    #[test]
    fn should_hit_palette_stops() {
        let vis = VisParams::new(0.0, 400.0, palette()).unwrap();

        assert_eq!(vis.color_at(100.0), palette()[1]);
        assert_eq!(vis.color_at(300.0), palette()[3]);
    }

    #[test]
    fn should_reject_bad_vis_params() {
        assert!(VisParams::new(400.0, 0.0, palette()).is_err());
        assert_eq!(VisParams::new(0.0, 1.0, vec![]), Err(ConfigError::EmptyPalette));
    }
}
