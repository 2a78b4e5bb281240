use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use crate::domain::GenomicRange;
use crate::error::SignalTableError;
use crate::signal::{Aggregate, QueryLimits, Record};
use crate::source::SourceHandle;

/// Shared row index: one entry per aligned row in every field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowTemplate {
    pub chr: Vec<String>,
    pub start: Vec<u64>,
    pub end: Vec<u64>,
}

impl RowTemplate {
    fn from_records(records: &[Record]) -> Self {
        Self {
            chr: records.iter().map(|r| r.chromosome.clone()).collect(),
            start: records.iter().map(|r| r.start).collect(),
            end: records.iter().map(|r| r.end).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.chr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chr.is_empty()
    }

    fn truncate(&mut self, len: usize) {
        self.chr.truncate(len);
        self.start.truncate(len);
        self.end.truncate(len);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRows {
    pub rows: RowTemplate,
    /// Indexed like the handles passed to [`align`]; each holds `rows.len()` values.
    pub per_source_values: Vec<Vec<f64>>,
    /// Handle indices in the order their results arrived.
    pub arrival_order: Vec<usize>,
}

/// Queries every handle concurrently and truncates all results to the
/// shortest one.
///
/// The row template is seeded by whichever result arrives first, so when
/// sources disagree on their row sets the retained rows depend on arrival
/// order. Any failed query fails the whole alignment.
pub async fn align(
    handles: &[SourceHandle],
    range: &GenomicRange,
    limits: QueryLimits,
    aggregate: Aggregate,
) -> Result<AlignedRows, SignalTableError> {
    let mut pending: FuturesUnordered<_> = handles
        .iter()
        .enumerate()
        .map(|(idx, handle)| async move { (idx, handle.query(range, limits).await) })
        .collect();

    let mut template: Option<RowTemplate> = None;
    let mut values: Vec<Option<Vec<f64>>> = vec![None; handles.len()];
    let mut arrival_order = Vec::with_capacity(handles.len());

    while let Some((idx, result)) = pending.next().await {
        let mut records = result?;
        debug!(
            source = handles[idx].label(),
            records = records.len(),
            "source query settled"
        );
        arrival_order.push(idx);

        let rows = template.get_or_insert_with(|| RowTemplate::from_records(&records));
        if records.len() > rows.len() {
            records.truncate(rows.len());
        } else if records.len() < rows.len() {
            warn!(
                source = handles[idx].label(),
                from = rows.len(),
                to = records.len(),
                "truncating aligned rows to shorter source"
            );
            rows.truncate(records.len());
            for captured in values.iter_mut().flatten() {
                captured.truncate(records.len());
            }
        }

        values[idx] = Some(records.iter().map(|r| r.value(aggregate)).collect());
    }

    let rows = template.unwrap_or_default();
    let per_source_values = values
        .into_iter()
        .map(|v| {
            let mut v = v.unwrap_or_default();
            v.truncate(rows.len());
            v
        })
        .collect();

    Ok(AlignedRows {
        rows,
        per_source_values,
        arrival_order,
    })
}
