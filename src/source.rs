use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::domain::GenomicRange;
use crate::error::SignalTableError;
use crate::signal::{QueryLimits, Record, SignalSource, SignalSourceFactory, SummaryStatistics};

const KNOWN_EXTENSIONS: [&str; 2] = [".bigwig", ".bw"];

/// Display boundaries for values drawn from one or more sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueBounds {
    pub min: f64,
    pub max: f64,
}

impl ValueBounds {
    pub fn union(self, other: ValueBounds) -> ValueBounds {
        ValueBounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Per-locator wrapper around a signal source, created once and reused
/// for every readiness cycle.
#[derive(Clone)]
pub struct SourceHandle {
    locator: String,
    label: String,
    source: Arc<dyn SignalSource>,
    summary: Arc<OnceCell<SummaryStatistics>>,
}

impl SourceHandle {
    pub fn new(locator: impl Into<String>, source: Arc<dyn SignalSource>) -> Self {
        let locator = locator.into();
        let label = label_for_locator(&locator);
        Self {
            locator,
            label,
            source,
            summary: Arc::new(OnceCell::new()),
        }
    }

    pub fn open(
        locator: &str,
        relay: Option<&str>,
        block_size_hint: usize,
        factory: &dyn SignalSourceFactory,
    ) -> Result<Self, SignalTableError> {
        let source = factory.open(locator, relay, block_size_hint)?;
        debug!(locator, ?relay, "opened signal source");
        Ok(Self::new(locator, source))
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn query(
        &self,
        range: &GenomicRange,
        limits: QueryLimits,
    ) -> Result<Vec<Record>, SignalTableError> {
        self.source.query(range, limits).await
    }

    /// Whole-source statistics; the collaborator is asked at most once
    /// successfully.
    pub async fn summary(&self) -> Result<SummaryStatistics, SignalTableError> {
        self.summary
            .get_or_try_init(|| self.source.summary())
            .await
            .copied()
    }

    pub async fn value_bounds(&self) -> Result<ValueBounds, SignalTableError> {
        let summary = self.summary().await?;
        Ok(ValueBounds {
            min: summary.min,
            max: summary.max,
        })
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandle")
            .field("locator", &self.locator)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Basename of the locator with a trailing `.bigwig` or `.bw` removed.
/// Matching is case-sensitive and other extensions are kept.
pub fn label_for_locator(locator: &str) -> String {
    let basename = locator.rsplit('/').next().unwrap_or(locator);
    KNOWN_EXTENSIONS
        .iter()
        .find_map(|ext| basename.strip_suffix(ext))
        .unwrap_or(basename)
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[test]
    fn label_strips_known_extensions() {
        assert_eq!(
            label_for_locator("http://host/E001-H3K4me1.pval.signal.bigwig"),
            "E001-H3K4me1.pval.signal"
        );
        assert_eq!(label_for_locator("tracks/sample.bw"), "sample");
        assert_eq!(label_for_locator("plain"), "plain");
    }

    #[test]
    fn label_keeps_unknown_or_mismatched_case() {
        assert_eq!(label_for_locator("/data/sample.BigWig"), "sample.BigWig");
        assert_eq!(label_for_locator("/data/sample.wig"), "sample.wig");
        assert_eq!(label_for_locator("/data/sample.bw.gz"), "sample.bw.gz");
    }

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SignalSource for CountingSource {
        async fn query(
            &self,
            _range: &GenomicRange,
            _limits: QueryLimits,
        ) -> Result<Vec<Record>, SignalTableError> {
            Ok(Vec::new())
        }

        async fn summary(&self) -> Result<SummaryStatistics, SignalTableError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SummaryStatistics {
                bases_covered: 100,
                min: -1.0,
                max: 7.5,
                sum_data: 20.0,
                sum_squares: 90.0,
            })
        }
    }

    #[tokio::test]
    async fn summary_is_computed_once() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let handle = SourceHandle::new("a/b.bw", source.clone());
        let first = handle.summary().await.unwrap();
        let second = handle.clone().summary().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let bounds = handle.value_bounds().await.unwrap();
        assert_eq!(bounds, ValueBounds { min: -1.0, max: 7.5 });
    }
}
