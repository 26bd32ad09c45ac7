//! Directory scanning: classify every file in a folder against a registry

use super::pattern::{ClassifyError, ClassifyResult, PatternClassifier};
use super::resolve::Resolution;
use crate::schema::SchemaRegistry;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanOptions {
    /// Matches below this confidence are counted but not reported
    pub min_confidence: f64,
    /// Descend into subdirectories
    pub recursive: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            recursive: false,
        }
    }
}

impl ScanOptions {
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// A file that matched at or above the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub resolution: Resolution,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub matched: Vec<ScanEntry>,
    pub below_threshold: usize,
    pub unmatched: usize,
    /// Entries the walk could not read
    pub unreadable: usize,
    /// Per-file schema evaluation failures
    pub failures: Vec<(PathBuf, ClassifyError)>,
}

impl ScanReport {
    pub fn files_seen(&self) -> usize {
        self.matched.len() + self.below_threshold + self.unmatched
    }
}

impl PatternClassifier {
    /// Evaluate every regular file under `dir`, in filename order.
    pub fn scan(
        &self,
        registry: &SchemaRegistry,
        dir: impl AsRef<Path>,
        options: ScanOptions,
    ) -> ClassifyResult<ScanReport> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ClassifyError::DirectoryNotFound(dir.to_path_buf()));
        }

        let max_depth = if options.recursive { usize::MAX } else { 1 };
        let mut report = ScanReport::default();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, "unreadable directory entry");
                    report.unreadable += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            let outcome = self.classify_registry(registry, &path);
            for failure in outcome.failures {
                report.failures.push((path.clone(), failure));
            }

            match outcome.resolution {
                Some(resolution)
                    if resolution.chosen.classification.confidence >= options.min_confidence =>
                {
                    report.matched.push(ScanEntry { path, resolution });
                }
                Some(_) => report.below_threshold += 1,
                None => report.unmatched += 1,
            }
        }

        info!(
            dir = %dir.display(),
            files = report.files_seen(),
            matched = report.matched.len(),
            below_threshold = report.below_threshold,
            "scan complete"
        );
        Ok(report)
    }
}
