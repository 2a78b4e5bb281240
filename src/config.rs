use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data_source::{DEFAULT_MAX_ITEMS, DataSourceOptions};
use crate::domain::GenomicRange;
use crate::error::SignalTableError;
use crate::signal::Aggregate;

pub const DEFAULT_CONFIG_FILE: &str = "signal-table.json";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub tracks: Vec<TrackEntry>,
    #[serde(default)]
    pub relay: Option<String>,
    #[serde(default)]
    pub values_label: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub aggregate: Option<Aggregate>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TrackEntry {
    Shorthand(String),
    Detailed(TrackEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TrackEntryObject {
    pub locator: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub tracks: Vec<String>,
    pub relay: Option<String>,
    pub values_label: Option<String>,
    pub location: Option<GenomicRange>,
    pub max_items: usize,
    pub aggregate: Aggregate,
}

impl ResolvedConfig {
    pub fn to_options(&self) -> DataSourceOptions {
        DataSourceOptions {
            initial_query: self
                .location
                .as_ref()
                .map(GenomicRange::to_queries)
                .unwrap_or_default(),
            relay: self.relay.clone(),
            values_label: self.values_label.clone(),
            max_items: self.max_items,
            aggregate: self.aggregate,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SignalTableError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(SignalTableError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SignalTableError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SignalTableError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SignalTableError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let tracks = config
            .tracks
            .into_iter()
            .map(|entry| match entry {
                TrackEntry::Shorthand(locator) => locator,
                TrackEntry::Detailed(obj) => obj.locator,
            })
            .map(|locator| locator.trim().to_string())
            .collect::<Vec<_>>();
        if let Some(blank) = tracks.iter().position(String::is_empty) {
            return Err(SignalTableError::ConfigParse(format!(
                "track {blank} has an empty locator"
            )));
        }

        let location = config
            .location
            .as_deref()
            .map(str::parse::<GenomicRange>)
            .transpose()?;

        let max_items = Self::validate_max_items(config.max_items.unwrap_or(DEFAULT_MAX_ITEMS))?;

        Ok(ResolvedConfig {
            schema_version,
            tracks,
            relay: config.relay.filter(|relay| !relay.trim().is_empty()),
            values_label: config.values_label,
            location,
            max_items,
            aggregate: config.aggregate.unwrap_or_default(),
        })
    }

    /// Shared by the config file and command-line overrides.
    pub fn validate_max_items(max_items: usize) -> Result<usize, SignalTableError> {
        if max_items == 0 {
            return Err(SignalTableError::ConfigParse(
                "max_items must be positive".to_string(),
            ));
        }
        Ok(max_items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range_query;

    #[test]
    fn parse_config_shorthand() {
        let config = Config {
            schema_version: None,
            tracks: vec![TrackEntry::Shorthand("a.json".to_string())],
            relay: None,
            values_label: None,
            location: None,
            max_items: None,
            aggregate: None,
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.tracks, vec!["a.json"]);
        assert_eq!(resolved.max_items, DEFAULT_MAX_ITEMS);
        assert_eq!(resolved.aggregate, Aggregate::Max);
        assert!(resolved.to_options().initial_query.is_empty());
    }

    #[test]
    fn location_becomes_initial_query() {
        let config: Config = serde_json::from_str(
            r#"{"tracks": [{"locator": "b.json"}], "location": "chr1:1000-100000", "aggregate": "avg"}"#,
        )
        .unwrap();
        let options = ConfigLoader::resolve_config(config).unwrap().to_options();
        let range = range_query::extract(&options.initial_query).unwrap();
        assert_eq!(range.to_string(), "chr1:1000-100000");
        assert_eq!(options.aggregate, Aggregate::Avg);
    }
}
