//! Pipeline settings, read from a TOML file.
//!
//! Every section is optional; anything left out keeps the Kenya MAM rainfall
//! defaults.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    expr::DateRange,
    legend::{parse_palette, VisParams},
    region::RegionFilter,
    season::{MonthDay, SeasonWindow, YearRange},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub region: RegionFilter,
    pub collection: CollectionConfig,
    pub season: SeasonConfig,
    pub visualization: VisConfig,
    pub legend: LegendConfig,
    pub map: MapConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub id: String,
    /// `YYYY-MM-DD`, inclusive.
    pub start: String,
    /// `YYYY-MM-DD`, exclusive.
    pub end: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            id: "UCSB-CHG/CHIRPS/DAILY".to_string(),
            start: "1981-01-01".to_string(),
            end: "2024-12-31".to_string(),
        }
    }
}

impl CollectionConfig {
    pub fn date_range(&self) -> Result<DateRange, ConfigError> {
        DateRange::parse(&self.start, &self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonConfig {
    pub first_year: i32,
    pub last_year: i32,
    pub start: MonthDay,
    pub end: MonthDay,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        let mam = SeasonWindow::mam();
        SeasonConfig {
            first_year: 1981,
            last_year: 2024,
            start: mam.start,
            end: mam.end,
        }
    }
}

impl SeasonConfig {
    pub fn years(&self) -> Result<YearRange, ConfigError> {
        YearRange::new(self.first_year, self.last_year)
    }

    pub fn window(&self) -> SeasonWindow {
        SeasonWindow::new(self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisConfig {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<String>,
}

impl Default for VisConfig {
    fn default() -> Self {
        VisConfig {
            min: 0.0,
            max: 400.0,
            palette: ["#f7fbff", "#deebf7", "#9ecae1", "#3182bd", "#08519c"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl VisConfig {
    pub fn vis_params(&self) -> Result<VisParams, ConfigError> {
        VisParams::new(self.min, self.max, parse_palette(&self.palette)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegendConfig {
    pub title: String,
    pub labels: Vec<String>,
}

impl Default for LegendConfig {
    fn default() -> Self {
        LegendConfig {
            title: "MAM Rainfall (mm)".to_string(),
            labels: ["0–50", "50–100", "100–200", "200–300", "300–400+"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub layer_name: String,
    pub zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            layer_name: "Mean MAM Rainfall (1981–2024)".to_string(),
            zoom: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub description: String,
    /// Meters per pixel.
    pub scale: f64,
    pub format: String,
    pub folder: Option<String>,
    pub max_pixels: Option<u64>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            description: "LongTerm_Mean_MAM_Rainfall_1981_2024_Kenya".to_string(),
            scale: 5000.0,
            format: "GeoTIFF".to_string(),
            folder: None,
            max_pixels: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let failed = |reason: String| ConfigError::File {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| failed(e.to_string()))?;
        Self::from_toml(&content).map_err(|e| failed(e.message().to_string()))
    }
}

// -- Tests -------------------------------------------------------------------
