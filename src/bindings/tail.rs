//! Runtime tail flags.
//!
//! Every probed exercise reports the flags it ran with after its binds
//! (`Tail options:`). These are pooled in a [`TailAccumulator`] that the
//! pipeline threads through explicitly, then reduced by [`sanitize`] into the
//! single flag line the runtime launcher appends to its command.

use std::collections::HashSet;
use tracing::warn;

pub const CHDIR_FLAG: &str = "--chdir";

/// Flags allowed through to the runtime unless configured otherwise.
pub const DEFAULT_ALLOWED_FLAGS: &[&str] = &["--share-net"];

/// Ordered pool of raw tail tokens collected from exercise artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailAccumulator {
    tokens: Vec<String>,
}

impl TailAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(tokens.into_iter().map(Into::into));
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// Sanitized runtime flags ending in exactly one `--chdir <target>` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailFlagSet {
    flags: Vec<String>,
    chdir: String,
}

impl TailFlagSet {
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn chdir(&self) -> &str {
        &self.chdir
    }

    pub fn tokens(&self) -> Vec<&str> {
        self.flags
            .iter()
            .map(String::as_str)
            .chain([CHDIR_FLAG, self.chdir.as_str()])
            .collect()
    }

    /// Space-joined with a trailing newline.
    pub fn render(&self) -> String {
        let mut out = self.tokens().join(" ");
        out.push('\n');
        out
    }
}

/// Quote-aware whitespace split. Unbalanced quotes fall back to a plain
/// whitespace split.
pub fn tokenize(text: &str) -> Vec<String> {
    match shell_words::split(text) {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!("Tail flags have unbalanced quoting ({}), splitting on whitespace", e);
            text.split_whitespace().map(str::to_string).collect()
        }
    }
}

/// Reduce raw tail tokens to the runtime flag set.
///
/// Drops every `--chdir <dir>` pair and any stray absolute path, keeps only
/// allow-listed flags (first occurrence), then appends `--chdir
/// runtime_target`.
pub fn sanitize<S: AsRef<str>>(
    tokens: &[S],
    allowed: &[String],
    runtime_target: &str,
) -> TailFlagSet {
    let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut flags = Vec::new();

    let tokens: Vec<&str> = tokens.iter().map(|t| t.as_ref()).collect();
    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        if token == CHDIR_FLAG {
            iter.next();
            continue;
        }
        if token.starts_with('/') {
            continue;
        }
        if !allowed.contains(token) {
            continue;
        }
        if seen.insert(token) {
            flags.push(token.to_string());
        }
    }

    TailFlagSet {
        flags,
        chdir: runtime_target.to_string(),
    }
}

pub fn default_allowed_flags() -> Vec<String> {
    DEFAULT_ALLOWED_FLAGS.iter().map(|s| s.to_string()).collect()
}
