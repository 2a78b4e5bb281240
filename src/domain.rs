use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SignalTableError;

static LOCUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([a-zA-Z0-9_]+)\s*:\s*([0-9]+)\s*-\s*([0-9]+)\s*$").expect("valid locus pattern")
});

/// Interval on one chromosome, as handed to signal sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GenomicRange {
    chromosome: String,
    start: u64,
    end: u64,
}

impl GenomicRange {
    pub fn new(chromosome: impl Into<String>, start: u64, end: u64) -> Result<Self, SignalTableError> {
        let chromosome = chromosome.into();
        if start > end {
            return Err(SignalTableError::InvalidRange {
                chromosome,
                start,
                end,
            });
        }
        Ok(Self {
            chromosome,
            start,
            end,
        })
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn overlaps(&self, chromosome: &str, start: u64, end: u64) -> bool {
        self.chromosome == chromosome && start < self.end && end >= self.start
    }

    /// Predicates selecting the rows of this range; `range_query::extract`
    /// maps them back to `self`.
    pub fn to_queries(&self) -> Vec<Query> {
        vec![
            Query::rows(RowField::CHR, QueryOperator::Eq, self.chromosome.clone()),
            Query::rows(RowField::START, QueryOperator::Lt, self.end.to_string()),
            Query::rows(RowField::END, QueryOperator::Ge, self.start.to_string()),
        ]
    }
}

impl fmt::Display for GenomicRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

impl FromStr for GenomicRange {
    type Err = SignalTableError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let caps = LOCUS_RE
            .captures(value)
            .ok_or_else(|| SignalTableError::InvalidLocus(value.to_string()))?;
        let parse = |idx: usize| {
            caps[idx]
                .parse::<u64>()
                .map_err(|_| SignalTableError::InvalidLocus(value.to_string()))
        };
        let start = parse(2)?;
        let end = parse(3)?;
        GenomicRange::new(&caps[1], start, end)
    }
}

/// Row field names shared by queries and the tabular model.
pub struct RowField;

impl RowField {
    pub const CHR: &'static str = "chr";
    pub const START: &'static str = "start";
    pub const END: &'static str = "end";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryTarget {
    Rows,
    Cols,
    Vals,
}

impl fmt::Display for QueryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryTarget::Rows => write!(f, "rows"),
            QueryTarget::Cols => write!(f, "cols"),
            QueryTarget::Vals => write!(f, "vals"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryOperator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            QueryOperator::Eq => "==",
            QueryOperator::Ne => "!=",
            QueryOperator::Lt => "<",
            QueryOperator::Le => "<=",
            QueryOperator::Gt => ">",
            QueryOperator::Ge => ">=",
        };
        write!(f, "{symbol}")
    }
}

impl FromStr for QueryOperator {
    type Err = SignalTableError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "==" => Ok(QueryOperator::Eq),
            "!=" => Ok(QueryOperator::Ne),
            "<" => Ok(QueryOperator::Lt),
            "<=" => Ok(QueryOperator::Le),
            ">" => Ok(QueryOperator::Gt),
            ">=" => Ok(QueryOperator::Ge),
            other => Err(SignalTableError::InvalidQuery(format!(
                "unknown operator {other}"
            ))),
        }
    }
}

/// One declarative predicate, e.g. `rows.chr == chr1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub target: QueryTarget,
    pub target_field: String,
    pub operator: QueryOperator,
    pub operand: String,
}

impl Query {
    pub fn new(
        target: QueryTarget,
        target_field: impl Into<String>,
        operator: QueryOperator,
        operand: impl Into<String>,
    ) -> Self {
        Self {
            target,
            target_field: target_field.into(),
            operator,
            operand: operand.into(),
        }
    }

    pub fn rows(
        target_field: impl Into<String>,
        operator: QueryOperator,
        operand: impl Into<String>,
    ) -> Self {
        Self::new(QueryTarget::Rows, target_field, operator, operand)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} {} {}",
            self.target, self.target_field, self.operator, self.operand
        )
    }
}
