//! Validates export parameters and hands the job to a backend.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    backend::{Backend, ExportTask},
    error::{ConfigError, PipelineResult},
    expr::Image,
    geometry::Geometry,
};

const MAX_DESCRIPTION_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExportFormat {
    GeoTiff,
    TfRecord,
}

impl ExportFormat {
    /// Name used by the Earth Engine export API.
    pub fn api_name(&self) -> &'static str {
        match self {
            ExportFormat::GeoTiff => "GEO_TIFF",
            ExportFormat::TfRecord => "TF_RECORD_IMAGE",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::GeoTiff => "tif",
            ExportFormat::TfRecord => "tfrecord",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "geotiff" | "geo_tiff" | "tif" | "tiff" => Ok(ExportFormat::GeoTiff),
            "tfrecord" | "tf_record_image" => Ok(ExportFormat::TfRecord),
            _ => Err(ConfigError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for ExportFormat {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ExportFormat> for String {
    fn from(f: ExportFormat) -> Self {
        f.to_string()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::GeoTiff => write!(f, "GeoTIFF"),
            ExportFormat::TfRecord => write!(f, "TFRecord"),
        }
    }
}

/// A validated export job description.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub image: Image,
    pub description: String,
    pub region: Geometry,
    /// Output pixel size in meters.
    pub scale: f64,
    pub format: ExportFormat,
    pub folder: Option<String>,
    pub max_pixels: Option<u64>,
}

impl ExportRequest {
    pub fn new(
        image: Image,
        description: &str,
        region: &Geometry,
        scale: f64,
        format: &str,
    ) -> Result<Self, ConfigError> {
        validate_scale(scale)?;
        validate_description(description)?;
        let format = format.parse()?;

        Ok(ExportRequest {
            image,
            description: description.to_string(),
            region: region.clone(),
            scale,
            format,
            folder: None,
            max_pixels: None,
        })
    }

    pub fn with_folder(mut self, folder: Option<String>) -> Self {
        self.folder = folder;
        self
    }

    pub fn with_max_pixels(mut self, max_pixels: Option<u64>) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    /// Output file name for backends that write files.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.description, self.format.extension())
    }
}

pub fn validate_scale(scale: f64) -> Result<(), ConfigError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ConfigError::InvalidScale(scale));
    }

    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidDescription {
        description: description.to_string(),
        reason: reason.to_string(),
    };

    if description.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(invalid("longer than 100 characters"));
    }
    if !description
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || ".,:;_-".contains(c))
    {
        return Err(invalid("only letters, digits and . , : ; _ - are allowed"));
    }

    Ok(())
}

/// Submits the export without waiting for it to finish.
pub async fn submit(backend: &dyn Backend, request: &ExportRequest) -> PipelineResult<ExportTask> {
    if !backend.supports_format(request.format) {
        return Err(ConfigError::FormatNotAvailable {
            backend: backend.name().to_string(),
            format: request.format.to_string(),
        }
        .into());
    }

    let task = backend.start_export(request).await?;
    info!(task = %task.id, destination = %task.destination, "export submitted");

    Ok(task)
}

// -- Tests -------------------------------------------------------------------
