//! Aligns range queries over several genomic signal tracks into one
//! row/column/value table and keeps it current as the query changes.

pub mod align;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod events;
pub mod model;
pub mod output;
pub mod range_query;
pub mod signal;
pub mod source;
pub mod tracks;

pub use data_source::{DataSourceBuilder, DataSourceEvent, SignalDataSource};
pub use error::SignalTableError;
