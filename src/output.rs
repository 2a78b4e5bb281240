use std::io::{self, Write};

use serde::Serialize;

use crate::domain::GenomicRange;
use crate::model::TabularModel;
use crate::source::ValueBounds;

#[derive(Debug, Clone, Serialize)]
pub struct TableReport<'a> {
    pub range: &'a GenomicRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<ValueBounds>,
    pub model: &'a TabularModel,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_table(report: &TableReport<'_>) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
