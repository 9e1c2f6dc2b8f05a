//! Reads gridded daily data stored in the _parquet_ file format.

pub mod daily;

pub use daily::load_daily;
