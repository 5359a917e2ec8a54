use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use super::traits::{RecordQuery, RecordSource};
use crate::market::record::{RawLine, RawRecord};

/// Reads raw records from a JSONL file or a directory tree of them
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.path.exists() {
            anyhow::bail!("Record path not found: {:?}", self.path);
        }
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.path).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {:?}", self.path))?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|s| s.to_str()) == Some("jsonl")
            {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }
}

/// Parse one JSONL file; malformed lines are skipped with a warning
pub fn read_jsonl(path: &Path) -> Result<Vec<RawRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open record file: {:?}", path))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawLine>(&line) {
            Ok(parsed) => records.push(parsed.into_record()),
            Err(e) => warn!("Skipping {:?}:{}: {}", path, lineno + 1, e),
        }
    }
    Ok(records)
}

#[async_trait]
impl RecordSource for JsonlSource {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<RawRecord>> {
        let files = self.files()?;
        let mut records = Vec::new();

        'files: for file in &files {
            for record in read_jsonl(file)? {
                if records.len() >= query.max_size {
                    break 'files;
                }
                if query.admits(&record) {
                    records.push(record);
                }
            }
        }

        info!(
            "Loaded {} {} records from {} files under {:?}",
            records.len(),
            query.market,
            files.len(),
            self.path
        );
        Ok(records)
    }
}
