use serde::Serialize;

use crate::align::RowTemplate;
use crate::domain::RowField;
use crate::error::SignalTableError;

pub const DEFAULT_VALUES_LABEL: &str = "v0";
pub const COLUMN_LABEL: &str = "label";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArrayData {
    Text(Vec<String>),
    Position(Vec<u64>),
    Number(Vec<f64>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Text(v) => v.len(),
            ArrayData::Position(v) => v.len(),
            ArrayData::Number(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A labeled column of homogeneous data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataArray {
    pub label: String,
    pub data: ArrayData,
}

impl DataArray {
    pub fn new(label: impl Into<String>, data: ArrayData) -> Self {
        Self {
            label: label.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match &self.data {
            ArrayData::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_positions(&self) -> Option<&[u64]> {
        match &self.data {
            ArrayData::Position(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_numbers(&self) -> Option<&[f64]> {
        match &self.data {
            ArrayData::Number(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularModel {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<DataArray>,
    pub rows: Vec<DataArray>,
    pub values: Vec<DataArray>,
}

impl TabularModel {
    pub fn row(&self, label: &str) -> Option<&DataArray> {
        self.rows.iter().find(|array| array.label == label)
    }

    pub fn column_labels(&self) -> &[String] {
        self.columns
            .iter()
            .find(|array| array.label == COLUMN_LABEL)
            .and_then(DataArray::as_text)
            .unwrap_or_default()
    }

    /// The selected scalar for one (row, source) cell.
    pub fn value(&self, row: usize, column: usize) -> Option<f64> {
        if row >= self.row_count || column >= self.column_count {
            return None;
        }
        self.values
            .first()
            .and_then(DataArray::as_numbers)
            .and_then(|values| values.get(column * self.row_count + row))
            .copied()
    }
}

/// Assembles the row/column/value arrays. Values are concatenated
/// source-major, so cell (row, col) sits at `col * row_count + row`.
pub fn build(
    labels: &[String],
    rows: RowTemplate,
    per_source_values: Vec<Vec<f64>>,
    values_label: &str,
) -> Result<TabularModel, SignalTableError> {
    let row_count = rows.chr.len();
    if rows.start.len() != row_count || rows.end.len() != row_count {
        return Err(SignalTableError::MalformedModel(format!(
            "row fields disagree in length: chr={}, start={}, end={}",
            row_count,
            rows.start.len(),
            rows.end.len()
        )));
    }
    if per_source_values.len() != labels.len() {
        return Err(SignalTableError::MalformedModel(format!(
            "{} value arrays for {} sources",
            per_source_values.len(),
            labels.len()
        )));
    }
    if let Some((idx, values)) = per_source_values
        .iter()
        .enumerate()
        .find(|(_, values)| values.len() != row_count)
    {
        return Err(SignalTableError::MalformedModel(format!(
            "source {} has {} values, expected {row_count}",
            labels[idx],
            values.len()
        )));
    }

    let column_count = labels.len();
    let values = per_source_values.into_iter().flatten().collect::<Vec<_>>();

    Ok(TabularModel {
        row_count,
        column_count,
        columns: vec![DataArray::new(COLUMN_LABEL, ArrayData::Text(labels.to_vec()))],
        rows: vec![
            DataArray::new(RowField::CHR, ArrayData::Text(rows.chr)),
            DataArray::new(RowField::START, ArrayData::Position(rows.start)),
            DataArray::new(RowField::END, ArrayData::Position(rows.end)),
        ],
        values: vec![DataArray::new(values_label, ArrayData::Number(values))],
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn template(n: u64) -> RowTemplate {
        RowTemplate {
            chr: (0..n).map(|_| "chr1".to_string()).collect(),
            start: (0..n).map(|i| i * 10).collect(),
            end: (0..n).map(|i| i * 10 + 10).collect(),
        }
    }

    #[test]
    fn values_are_source_major() {
        let labels = vec!["a".to_string(), "b".to_string()];
        let model = build(
            &labels,
            template(3),
            vec![vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0]],
            DEFAULT_VALUES_LABEL,
        )
        .unwrap();

        assert_eq!(model.row_count, 3);
        assert_eq!(model.column_count, 2);
        assert_eq!(model.column_labels(), labels.as_slice());
        assert_eq!(model.values[0].label, "v0");
        assert_eq!(
            model.values[0].as_numbers().unwrap(),
            &[1.0, 2.0, 3.0, 10.0, 20.0, 30.0]
        );
        assert_eq!(model.value(1, 1), Some(20.0));
        assert_eq!(model.value(3, 0), None);
        assert!(model.rows.iter().all(|array| array.len() == 3));
        assert_eq!(model.row("start").unwrap().as_positions().unwrap(), &[0, 10, 20]);
    }

    #[test]
    fn mismatched_row_fields_fail() {
        let mut rows = template(3);
        rows.end.pop();
        let err = build(&["a".to_string()], rows, vec![vec![0.0; 3]], "v").unwrap_err();
        assert_matches!(err, SignalTableError::MalformedModel(_));
    }

    #[test]
    fn mismatched_values_fail() {
        let err = build(&["a".to_string()], template(3), vec![vec![0.0; 2]], "v").unwrap_err();
        assert_matches!(err, SignalTableError::MalformedModel(_));
    }

    #[test]
    fn serializes_flat_arrays() {
        let model = build(&["a".to_string()], template(1), vec![vec![0.5]], "pval").unwrap();
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["rows"][0]["data"], serde_json::json!(["chr1"]));
        assert_eq!(json["values"][0]["label"], "pval");
    }
}
