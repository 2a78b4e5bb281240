use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::domain::GenomicRange;
use crate::error::SignalTableError;
use crate::signal::{QueryLimits, Record, SignalSource, SignalSourceFactory, SummaryStatistics};

/// A signal source holding all records of one track in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySignalSource {
    records: Vec<Record>,
}

impl MemorySignalSource {
    pub fn new(mut records: Vec<Record>) -> Self {
        records.sort_by(|a, b| {
            a.chromosome
                .cmp(&b.chromosome)
                .then(a.start.cmp(&b.start))
                .then(a.end.cmp(&b.end))
        });
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn summarize(&self) -> SummaryStatistics {
        if self.records.is_empty() {
            return SummaryStatistics::default();
        }
        let mut summary = SummaryStatistics {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            ..SummaryStatistics::default()
        };
        for record in &self.records {
            summary.bases_covered += record.end.saturating_sub(record.start);
            summary.min = summary.min.min(record.stats.min);
            summary.max = summary.max.max(record.stats.max);
            summary.sum_data += record.stats.sum;
            summary.sum_squares += record.stats.sum_squares;
        }
        summary
    }
}

#[async_trait]
impl SignalSource for MemorySignalSource {
    async fn query(
        &self,
        range: &GenomicRange,
        limits: QueryLimits,
    ) -> Result<Vec<Record>, SignalTableError> {
        Ok(self
            .records
            .iter()
            .filter(|r| range.overlaps(&r.chromosome, r.start, r.end))
            .take(limits.max_items)
            .cloned()
            .collect())
    }

    async fn summary(&self) -> Result<SummaryStatistics, SignalTableError> {
        Ok(self.summarize())
    }
}

/// Opens locators naming JSON record dumps on the local filesystem.
///
/// Relative locators resolve against `base_dir`. Remote locators are
/// rejected; the relay address is not used by this factory.
#[derive(Debug, Clone, Default)]
pub struct JsonTrackFactory {
    base_dir: Option<Utf8PathBuf>,
}

impl JsonTrackFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, locator: &str) -> Utf8PathBuf {
        let path = Utf8Path::new(locator);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl SignalSourceFactory for JsonTrackFactory {
    fn open(
        &self,
        locator: &str,
        relay: Option<&str>,
        _block_size_hint: usize,
    ) -> Result<Arc<dyn SignalSource>, SignalTableError> {
        if locator.contains("://") {
            return Err(SignalTableError::SourceOpen {
                locator: locator.to_string(),
                message: "only local JSON tracks are supported".to_string(),
            });
        }
        let path = self.resolve(locator);
        let open_err = |message: String| SignalTableError::SourceOpen {
            locator: locator.to_string(),
            message,
        };
        let content = fs::read_to_string(&path).map_err(|err| open_err(format!("{path}: {err}")))?;
        let records: Vec<Record> =
            serde_json::from_str(&content).map_err(|err| open_err(err.to_string()))?;
        debug!(%path, records = records.len(), ?relay, "loaded JSON track");
        Ok(Arc::new(MemorySignalSource::new(records)))
    }
}
