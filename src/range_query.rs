use crate::domain::{GenomicRange, Query, QueryOperator, QueryTarget, RowField};
use crate::error::SignalTableError;

/// Reduces a conjunctive predicate set to a single genomic interval.
///
/// Only row predicates `chr == X`, `start < X` and `end >= X` are read: the
/// first names the chromosome, `start < X` bounds the range end and
/// `end >= X` bounds the range start. Everything else is ignored. When a
/// field is given more than once the last predicate wins.
pub fn extract(queries: &[Query]) -> Result<GenomicRange, SignalTableError> {
    let mut chromosome: Option<&str> = None;
    let mut start: Option<u64> = None;
    let mut end: Option<u64> = None;

    for query in queries {
        if query.target != QueryTarget::Rows {
            continue;
        }
        match (query.target_field.as_str(), query.operator) {
            (RowField::CHR, QueryOperator::Eq) => chromosome = Some(query.operand.trim()),
            (RowField::START, QueryOperator::Lt) => end = Some(parse_position(query)?),
            (RowField::END, QueryOperator::Ge) => start = Some(parse_position(query)?),
            _ => {}
        }
    }

    match (chromosome, start, end) {
        (Some(chromosome), Some(start), Some(end)) => GenomicRange::new(chromosome, start, end),
        (chromosome, start, end) => {
            let mut missing = Vec::new();
            if chromosome.is_none() {
                missing.push(RowField::CHR);
            }
            if start.is_none() {
                missing.push(RowField::START);
            }
            if end.is_none() {
                missing.push(RowField::END);
            }
            Err(SignalTableError::IncompleteRange { missing })
        }
    }
}

fn parse_position(query: &Query) -> Result<u64, SignalTableError> {
    query
        .operand
        .trim()
        .parse()
        .map_err(|_| SignalTableError::InvalidQuery(format!("non-numeric position in `{query}`")))
}
