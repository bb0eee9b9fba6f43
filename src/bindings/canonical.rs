//! In-process path canonicalization.
//!
//! Paths reported by the probing harness frequently do not exist outside the
//! probe environment. Normalization first works lexically: `.` and empty
//! segments are dropped, `..` pops a segment (never above `/`), and relative
//! inputs are anchored at a base directory. Then the longest prefix that
//! exists on disk is resolved through the filesystem and the remainder is
//! appended unchanged. Disabling symlink resolution keeps the lexical form.

use std::path::{Path, PathBuf};

use crate::error::{BindingError, Result};

/// Path normalizer carrying its resolution settings.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    base: PathBuf,
    resolve_symlinks: bool,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self {
            base: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            resolve_symlinks: true,
        }
    }
}

impl Canonicalizer {
    pub fn new(base: impl Into<PathBuf>, resolve_symlinks: bool) -> Self {
        Self {
            base: base.into(),
            resolve_symlinks,
        }
    }

    pub fn resolve_symlinks(&self) -> bool {
        self.resolve_symlinks
    }

    pub fn canonicalize(&self, raw: &str) -> Result<String> {
        let lexical = canonicalize_in(raw, &self.base)?;
        if !self.resolve_symlinks {
            return Ok(lexical);
        }
        Ok(resolve_existing_prefix(&lexical).unwrap_or(lexical))
    }
}

/// Canonicalize `raw` relative to the process working directory.
pub fn canonicalize(raw: &str) -> Result<String> {
    Canonicalizer::default().canonicalize(raw)
}

/// Lexically canonicalize `raw`, anchoring relative input at `base`.
pub fn canonicalize_in(raw: &str, base: &Path) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(BindingError::invalid_path(raw, "empty path"));
    }
    if raw.contains('\0') {
        return Err(BindingError::invalid_path(raw, "embedded NUL byte"));
    }

    let mut segments: Vec<&str> = Vec::new();
    if !raw.starts_with('/') {
        let base = base
            .to_str()
            .ok_or_else(|| BindingError::invalid_path(raw, "base directory is not UTF-8"))?;
        if !base.starts_with('/') {
            return Err(BindingError::invalid_path(raw, "base directory is not absolute"));
        }
        push_segments(&mut segments, base);
    }
    push_segments(&mut segments, raw);

    if segments.is_empty() {
        return Ok("/".to_string());
    }
    let mut out = String::with_capacity(raw.len() + 1);
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    Ok(out)
}

fn push_segments<'a>(segments: &mut Vec<&'a str>, path: &'a str) {
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
}

/// Resolve the deepest existing ancestor of an already-lexical path through
/// the filesystem and re-append the missing tail.
fn resolve_existing_prefix(lexical: &str) -> Option<String> {
    let path = Path::new(lexical);
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    let mut current = Some(path);

    while let Some(candidate) = current {
        if candidate.symlink_metadata().is_ok() {
            let mut resolved = std::fs::canonicalize(candidate).ok()?;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return resolved.to_str().map(str::to_string);
        }
        if let Some(name) = candidate.file_name() {
            tail.push(name);
        }
        current = candidate.parent();
    }
    None
}
