//! Identifier synthesis for catalogued files
//!
//! An identifier is composed offline from the filename (residual text, a
//! trailing numeric suffix, and a date) and then made unique by asking a
//! caller-supplied [`UniquenessOracle`]. The oracle is advisory: two callers
//! synthesizing for colliding inputs at the same time can both see a
//! candidate as available. Persist through a store that enforces identifier
//! uniqueness, or serialize synthesis and persistence.

use super::date::{find_embedded_date, trailing_suffix};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

/// Errors raised while synthesizing identifiers
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("No unique identifier for '{base}' after {attempts} attempts")]
    ExhaustedAttempts { base: String, attempts: usize },

    #[error("Uniqueness check failed: {0}")]
    Oracle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

/// Answers whether a candidate identifier is free to use.
///
/// Any `Fn(&str) -> bool` closure is an oracle.
pub trait UniquenessOracle {
    fn is_available(&self, candidate: &str) -> IdentityResult<bool>;
}

impl<F> UniquenessOracle for F
where
    F: Fn(&str) -> bool,
{
    fn is_available(&self, candidate: &str) -> IdentityResult<bool> {
        Ok(self(candidate))
    }
}

/// Where the date component of an identifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    Filename,
    Modified,
    Created,
}

impl fmt::Display for DateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Filename => "filename",
            Self::Modified => "modified",
            Self::Created => "created",
        })
    }
}

/// Identifier components derived from a filename, before uniqueness checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedIdentity {
    /// Sanitized name text with date and suffix removed (may be empty)
    pub residual: String,
    /// Trailing numeric suffix, without its underscore
    pub suffix: Option<String>,
    pub date: NaiveDate,
    pub date_source: DateSource,
}

impl ProposedIdentity {
    /// `{residual}_{suffix}_{YYYYMMDD}`, omitting empty components
    pub fn base_identifier(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(3);
        if !self.residual.is_empty() {
            parts.push(self.residual.clone());
        }
        if let Some(suffix) = &self.suffix {
            parts.push(suffix.clone());
        }
        parts.push(self.date.format("%Y%m%d").to_string());
        parts.join("_")
    }
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '_'
}

/// Make text safe for an identifier: trimmed, lowercase, spaces to
/// underscores, and nothing outside `[a-z0-9_-]`.
///
/// Idempotent: sanitizing sanitized text changes nothing.
pub fn sanitize_id_part(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || is_separator(*c))
        .collect()
}

/// Derive identifier components from a filename stem.
///
/// `fallback` supplies the date when the stem carries none; it is only
/// invoked in that case.
pub fn propose_for_stem<F>(stem: &str, fallback: F) -> IdentityResult<ProposedIdentity>
where
    F: FnOnce() -> IdentityResult<(NaiveDate, DateSource)>,
{
    let embedded = find_embedded_date(stem);

    // A suffix that overlaps the date span is the date itself.
    let suffix = match (trailing_suffix(stem), embedded) {
        (Some((start, _)), Some(found)) if start < found.end => None,
        (suffix, _) => suffix,
    };
    let core = match suffix {
        Some((start, _)) => &stem[..start],
        None => stem,
    };

    let (residual, date, date_source) = match embedded {
        Some(found) => {
            let before = core[..found.start].trim_end_matches(is_separator);
            let after = core[found.end..].trim_start_matches(is_separator);
            let joined = if !before.is_empty() && !after.is_empty() {
                format!("{}-{}", before, after)
            } else {
                format!("{}{}", before, after)
            };
            (joined, found.date, DateSource::Filename)
        }
        None => {
            let (date, source) = fallback()?;
            (core.to_string(), date, source)
        }
    };

    let residual = residual.trim_matches(is_separator);
    Ok(ProposedIdentity {
        residual: sanitize_id_part(residual),
        suffix: suffix.map(|(_, digits)| digits.to_string()),
        date,
        date_source,
    })
}

/// Date from filesystem metadata: modification time, else creation time.
/// Dates are taken in UTC so they do not depend on the host time zone.
fn filesystem_date(path: &Path) -> IdentityResult<(NaiveDate, DateSource)> {
    let metadata = std::fs::metadata(path)?;
    let (time, source): (SystemTime, DateSource) = match metadata.modified() {
        Ok(modified) => (modified, DateSource::Modified),
        Err(_) => (metadata.created()?, DateSource::Created),
    };
    Ok((DateTime::<Utc>::from(time).date_naive(), source))
}

/// Proposes identifiers for files and resolves collisions
#[derive(Debug, Clone, Copy)]
pub struct IdentitySynthesizer {
    max_attempts: usize,
}

impl Default for IdentitySynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySynthesizer {
    pub const DEFAULT_MAX_ATTEMPTS: usize = 100;

    pub fn new() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Propose identifier components without consulting any oracle.
    pub fn propose(&self, path: impl AsRef<Path>) -> IdentityResult<ProposedIdentity> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IdentityError::NotFound(path.to_path_buf()));
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let proposal = propose_for_stem(&stem, || filesystem_date(path))?;
        debug!(
            path = %path.display(),
            date_source = %proposal.date_source,
            "identity proposed"
        );
        Ok(proposal)
    }

    /// Synthesize a unique identifier for an existing file.
    pub fn synthesize<O>(&self, path: impl AsRef<Path>, oracle: &O) -> IdentityResult<String>
    where
        O: UniquenessOracle + ?Sized,
    {
        let proposal = self.propose(path)?;
        self.resolve_collisions(&proposal.base_identifier(), oracle)
    }

    /// Like [`synthesize`](Self::synthesize), but a missing file yields `None`.
    pub fn synthesize_if_present<O>(
        &self,
        path: impl AsRef<Path>,
        oracle: &O,
    ) -> IdentityResult<Option<String>>
    where
        O: UniquenessOracle + ?Sized,
    {
        match self.synthesize(path, oracle) {
            Ok(id) => Ok(Some(id)),
            Err(IdentityError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Return `base` if available, else the first available `base_1`,
    /// `base_2`, ... up to `base_{max_attempts}`.
    pub fn resolve_collisions<O>(&self, base: &str, oracle: &O) -> IdentityResult<String>
    where
        O: UniquenessOracle + ?Sized,
    {
        if oracle.is_available(base)? {
            return Ok(base.to_string());
        }
        for attempt in 1..=self.max_attempts {
            let candidate = format!("{}_{}", base, attempt);
            if oracle.is_available(&candidate)? {
                debug!(base, candidate = %candidate, attempt, "identifier collision resolved");
                return Ok(candidate);
            }
        }
        Err(IdentityError::ExhaustedAttempts {
            base: base.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs::File;
    use std::time::{Duration, UNIX_EPOCH};

    fn always_available(_: &str) -> bool {
        true
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap();
        path
    }

    fn no_fallback() -> IdentityResult<(NaiveDate, DateSource)> {
        panic!("fallback must not run when the stem carries a date")
    }

    #[test]
    fn date_in_name_becomes_date_component() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "report_20260101.pdf");

        let id = IdentitySynthesizer::new().synthesize(&path, &always_available).unwrap();
        assert_eq!(id, "report_20260101");
    }

    #[test]
    fn business_card_residual_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "busCard_plumber_emergency_20231015.pdf");

        let id = IdentitySynthesizer::new().synthesize(&path, &always_available).unwrap();
        assert_eq!(id, "buscard_plumber_emergency_20231015");
    }

    #[test]
    fn date_removal_joins_prefix_and_suffix_text() {
        let proposal = propose_for_stem("foo_2026_0101_bar", no_fallback).unwrap();
        assert_eq!(proposal.residual, "foo-bar");
        assert_eq!(proposal.base_identifier(), "foo-bar_20260101");
    }

    #[test]
    fn numeric_suffix_is_kept_as_component() {
        let proposal = propose_for_stem("buscard-carpenter-homedepot-2026_0101_010", no_fallback).unwrap();
        assert_eq!(proposal.suffix.as_deref(), Some("010"));
        assert_eq!(proposal.base_identifier(), "buscard-carpenter-homedepot_010_20260101");
    }

    #[test]
    fn date_only_stem_has_no_residual() {
        let proposal = propose_for_stem("2026-03-04", no_fallback).unwrap();
        assert_eq!(proposal.base_identifier(), "20260304");
    }

    #[test]
    fn falls_back_to_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "Scan Of Lease_003.PDF");
        // 2024-02-29T12:00:00Z
        let mtime = UNIX_EPOCH + Duration::from_secs(1_709_208_000);
        File::options().write(true).open(&path).unwrap().set_modified(mtime).unwrap();

        let synth = IdentitySynthesizer::new();
        let proposal = synth.propose(&path).unwrap();
        assert_eq!(proposal.date_source, DateSource::Modified);
        assert_eq!(proposal.date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let id = synth.synthesize(&path, &always_available).unwrap();
        assert_eq!(id, "scan_of_lease_003_20240229");
    }

    #[test]
    fn implausible_date_is_left_in_residual() {
        let fallback = || Ok((NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(), DateSource::Modified));
        let proposal = propose_for_stem("1402_1010-ancient-document", fallback).unwrap();
        assert_eq!(proposal.base_identifier(), "1402_1010-ancient-document_20250506");
    }

    #[test]
    fn collisions_append_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "report_20260101.pdf");
        let calls = Cell::new(0);
        let oracle = |_: &str| {
            calls.set(calls.get() + 1);
            calls.get() > 2
        };

        let id = IdentitySynthesizer::new().synthesize(&path, &oracle).unwrap();
        assert_eq!(id, "report_20260101_2");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhausting_attempts_is_an_error() {
        let synth = IdentitySynthesizer::new().with_max_attempts(3);
        let err = synth.resolve_collisions("taken", &|_: &str| false).unwrap_err();
        match err {
            IdentityError::ExhaustedAttempts { base, attempts } => {
                assert_eq!(base, "taken");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_not_found_unless_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone_20260101.pdf");
        let synth = IdentitySynthesizer::new();

        assert!(matches!(
            synth.synthesize(&missing, &always_available),
            Err(IdentityError::NotFound(_))
        ));
        assert_eq!(synth.synthesize_if_present(&missing, &always_available).unwrap(), None);
    }

    #[test]
    fn oracle_failure_propagates() {
        struct Failing;
        impl UniquenessOracle for Failing {
            fn is_available(&self, _: &str) -> IdentityResult<bool> {
                Err(IdentityError::Oracle("store offline".into()))
            }
        }
        let err = IdentitySynthesizer::new().resolve_collisions("x_20260101", &Failing).unwrap_err();
        assert!(matches!(err, IdentityError::Oracle(_)));
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["  Hello World!  ", "Café_Menu-2", "a b\tc", "already_clean-1", "ÆØÅ"] {
            let once = sanitize_id_part(raw);
            assert_eq!(sanitize_id_part(&once), once, "input: {raw:?}");
        }
        assert_eq!(sanitize_id_part("  Hello World! "), "hello_world");
    }
}
