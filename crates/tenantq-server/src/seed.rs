//! Loading fixture records from JSON-lines files.
//!
//! Each non-empty line is `{"table": "<logical name>", "item": {...}}`.
//! Records go through the same repository calls as `put_item` requests, so
//! log records get their composite index attributes derived on the way in.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use tenantq_core::types::Record;

use crate::error::SeedError;
use crate::service::Service;

#[derive(Debug, Deserialize)]
struct SeedLine {
    table: String,
    item: Record,
}

/// Load every line of `reader` into `service`. Returns the number of records
/// stored per logical table. Stops at the first bad line.
pub fn load(service: &Service, reader: impl BufRead) -> Result<BTreeMap<String, usize>, SeedError> {
    let mut counts = BTreeMap::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let seed: SeedLine = serde_json::from_str(trimmed).map_err(|source| SeedError::Parse {
            line: idx + 1,
            source,
        })?;
        service
            .put_item(&seed.table, seed.item)
            .map_err(|source| SeedError::Rejected {
                line: idx + 1,
                source,
            })?;
        *counts.entry(seed.table).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Load a seed file from disk.
pub fn load_file(service: &Service, path: &Path) -> Result<BTreeMap<String, usize>, SeedError> {
    let counts = load(service, BufReader::new(File::open(path)?))?;
    info!(path = %path.display(), ?counts, "seed file loaded");
    Ok(counts)
}
