//! Error taxonomy for the climatology pipeline.
//!
//! Three kinds are kept apart so callers can tell a bad region lookup from a
//! bad configuration from a failing backend.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("region resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// A region-name filter did not identify exactly one feature.
#[derive(Debug, Error, PartialEq)]
pub enum ResolutionError {
    #[error("no feature in '{dataset}' has {field} = '{value}'")]
    NotFound {
        dataset: String,
        field: String,
        value: String,
    },

    #[error("{count} features in '{dataset}' have {field} = '{value}', expected exactly one")]
    Ambiguous {
        dataset: String,
        field: String,
        value: String,
        count: usize,
    },

    #[error("feature {field} = '{value}' has no geometry")]
    MissingGeometry { field: String, value: String },
}

/// Raised before anything is sent to a backend.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("legend has {palette} colors but {labels} labels")]
    LegendMismatch { palette: usize, labels: usize },

    #[error("invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),

    #[error("visualization range is empty: min {min} must be below max {max}")]
    InvalidVisRange { min: f64, max: f64 },

    #[error("palette must contain at least one color")]
    EmptyPalette,

    #[error("invalid month/day {month:02}-{day:02}")]
    InvalidMonthDay { month: u32, day: u32 },

    #[error("invalid month/day '{0}', expected MM-DD")]
    MalformedMonthDay(String),

    #[error("season {start}..{end} does not exist in year {year}")]
    InvalidSeasonYear {
        start: String,
        end: String,
        year: i32,
    },

    #[error("date range must be non-empty: {start} is not before {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("year range {first}..={last} is empty")]
    InvalidYearRange { first: i32, last: i32 },

    #[error("expected {expected} seasonal composites, built {actual}")]
    IncompleteYears { expected: usize, actual: usize },

    #[error("cannot compute a climatology from zero composites")]
    NoComposites,

    #[error("export scale must be a positive number of meters, got {0}")]
    InvalidScale(f64),

    #[error("unsupported export format '{0}'")]
    UnsupportedFormat(String),

    #[error("backend '{backend}' cannot export {format}")]
    FormatNotAvailable { backend: String, format: String },

    #[error("invalid export description '{description}': {reason}")]
    InvalidDescription { description: String, reason: String },

    #[error("could not read configuration '{path}': {reason}")]
    File { path: String, reason: String },
}

/// Failures reported by, or while talking to, a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("unknown image collection '{0}'")]
    UnknownCollection(String),

    #[error("unknown feature collection '{0}'")]
    UnknownFeatures(String),

    #[error("images are on different grids")]
    GridMismatch,

    #[error("collection '{0}' has no frames")]
    EmptyCollection(String),

    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: String,
        operation: String,
    },

    #[error("export of {pixels} pixels exceeds the limit of {max}")]
    TooManyPixels { pixels: u64, max: u64 },

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("tiff error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("export task failed: {0}")]
    Task(String),
}

// -- Tests -------------------------------------------------------------------
