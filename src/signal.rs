use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::GenomicRange;
use crate::error::SignalTableError;

/// Block size hint passed to every source opened by a data source.
pub const DEFAULT_BLOCK_SIZE_HINT: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Min,
    #[default]
    Max,
    Sum,
    #[serde(rename = "sumsq")]
    SumSquares,
    Avg,
    Norm,
    #[serde(rename = "cnt")]
    Count,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Min => write!(f, "min"),
            Aggregate::Max => write!(f, "max"),
            Aggregate::Sum => write!(f, "sum"),
            Aggregate::SumSquares => write!(f, "sumsq"),
            Aggregate::Avg => write!(f, "avg"),
            Aggregate::Norm => write!(f, "norm"),
            Aggregate::Count => write!(f, "cnt"),
        }
    }
}

impl FromStr for Aggregate {
    type Err = SignalTableError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            "sum" => Ok(Aggregate::Sum),
            "sumsq" => Ok(Aggregate::SumSquares),
            "avg" => Ok(Aggregate::Avg),
            "norm" => Ok(Aggregate::Norm),
            "cnt" | "count" => Ok(Aggregate::Count),
            _ => Err(SignalTableError::InvalidAggregate(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordStats {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub sum_squares: f64,
    pub count: u64,
}

/// One region-scoped result unit returned by a signal source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    #[serde(flatten)]
    pub stats: RecordStats,
}

impl Record {
    pub fn value(&self, aggregate: Aggregate) -> f64 {
        let stats = &self.stats;
        match aggregate {
            Aggregate::Min => stats.min,
            Aggregate::Max => stats.max,
            Aggregate::Sum => stats.sum,
            Aggregate::SumSquares => stats.sum_squares,
            Aggregate::Avg if stats.count == 0 => 0.0,
            Aggregate::Avg => stats.sum / stats.count as f64,
            Aggregate::Norm if stats.count == 0 => 0.0,
            Aggregate::Norm => (stats.sum_squares / stats.count as f64).sqrt(),
            Aggregate::Count => stats.count as f64,
        }
    }
}

/// Whole-source statistics, independent of any query.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub bases_covered: u64,
    pub min: f64,
    pub max: f64,
    pub sum_data: f64,
    pub sum_squares: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub max_items: usize,
}

/// A quantitative track able to answer range queries.
///
/// Implementations return records overlapping the range, ordered by
/// ascending start and capped at `limits.max_items`.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn query(
        &self,
        range: &GenomicRange,
        limits: QueryLimits,
    ) -> Result<Vec<Record>, SignalTableError>;

    async fn summary(&self) -> Result<SummaryStatistics, SignalTableError>;
}

/// Opens the collaborator behind a locator. Supplied by the embedding
/// application when it builds a data source.
pub trait SignalSourceFactory: Send + Sync {
    fn open(
        &self,
        locator: &str,
        relay: Option<&str>,
        block_size_hint: usize,
    ) -> Result<Arc<dyn SignalSource>, SignalTableError>;
}
