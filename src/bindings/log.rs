//! Parser for raw observation logs written by the probing harness.
//!
//! Three line shapes are recognized, everything else is ignored:
//!
//! | Shape | Example |
//! |-------|---------|
//! | path detail | `/usr/lib/jvm -> r` |
//! | base options | `Base options: --ro-bind /usr /usr --proc /proc` |
//! | tail options | `Tail options: --chdir /tmp/ex1 --share-net` |
//!
//! Lines may carry a `[LOG] ` prefix, which is stripped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::canonical::Canonicalizer;
use super::mode::Mode;
use super::set::PathRecord;
use super::tail;

const LOG_PREFIX: &str = "[LOG] ";
const BASE_LABEL: &str = "Base options:";
const TAIL_LABEL: &str = "Tail options:";

static DETAIL_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(/[^ ]+)\s+->\s+([rwn])$").expect("detail line pattern is valid")
});

/// Everything extracted from one raw log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLog {
    /// Per-path observations in log order, first occurrence per path only.
    /// Hidden entries are kept here for provenance.
    pub detail_pairs: Vec<PathRecord>,
    /// Static binds from the `Base options:` line.
    pub base_modes: BTreeMap<String, Mode>,
    /// Canonical paths consumed by `--proc`/`--dev`/`--tmpfs`. Never emitted.
    pub system_mounts: Vec<String>,
    /// Tokens from `Tail options:` lines, shell-split, in order.
    pub tail_tokens: Vec<String>,
    pub stats: ParseStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub detail_lines: usize,
    pub duplicate_details: usize,
    pub invalid_paths: usize,
    pub ignored_lines: usize,
}

/// Parse the full text of a raw observation log.
pub fn parse(text: &str, canon: &Canonicalizer) -> ParsedLog {
    let mut parsed = ParsedLog::default();
    let mut seen: HashSet<String> = HashSet::new();

    for raw in text.lines() {
        let mut line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix(LOG_PREFIX) {
            line = rest.trim_start();
        }

        if let Some(caps) = DETAIL_LINE.captures(line) {
            parsed.stats.detail_lines += 1;
            let mode: Mode = match caps[2].parse() {
                Ok(mode) => mode,
                Err(_) => continue,
            };
            let path = match canon.canonicalize(&caps[1]) {
                Ok(path) => path,
                Err(e) => {
                    debug!("Dropping detail line: {}", e);
                    parsed.stats.invalid_paths += 1;
                    continue;
                }
            };
            if !seen.insert(path.clone()) {
                parsed.stats.duplicate_details += 1;
                continue;
            }
            parsed.detail_pairs.push(PathRecord::new(mode, path));
            continue;
        }

        if let Some(rest) = line.strip_prefix(BASE_LABEL) {
            parse_base_options(rest, canon, &mut parsed);
            continue;
        }

        if let Some(rest) = line.strip_prefix(TAIL_LABEL) {
            parsed.tail_tokens.extend(tail::tokenize(rest));
            continue;
        }

        parsed.stats.ignored_lines += 1;
    }

    parsed
}

fn parse_base_options(rest: &str, canon: &Canonicalizer, parsed: &mut ParsedLog) {
    let mut tokens = rest.split_whitespace();
    while let Some(flag) = tokens.next() {
        match flag {
            "--ro-bind" | "--bind" => {
                let (Some(src), Some(_dst)) = (tokens.next(), tokens.next()) else {
                    debug!("Truncated {} in base options", flag);
                    break;
                };
                let mode = if flag == "--bind" {
                    Mode::Write
                } else {
                    Mode::ReadOnly
                };
                match canon.canonicalize(src) {
                    Ok(path) => {
                        let slot = parsed.base_modes.entry(path).or_insert(mode);
                        *slot = slot.strongest(mode);
                    }
                    Err(e) => {
                        debug!("Dropping base bind: {}", e);
                        parsed.stats.invalid_paths += 1;
                    }
                }
            }
            "--proc" | "--dev" | "--tmpfs" => {
                let Some(target) = tokens.next() else {
                    break;
                };
                match canon.canonicalize(target) {
                    Ok(path) => parsed.system_mounts.push(path),
                    Err(_) => parsed.stats.invalid_paths += 1,
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon() -> Canonicalizer {
        Canonicalizer::new("/", false)
    }

    const SAMPLE: &str = "\
[LOG] starting probe for exercise H03E01
[LOG] /usr/lib/jvm -> r
/tmp/out -> w
/root/.ssh -> n
/usr/lib/../lib/jvm -> w
Base options: --ro-bind /usr /usr --bind /var/tmp/work /var/tmp/work --proc /proc --dev /dev --tmpfs /tmp --unshare-all
Tail options: --chdir /var/tmp/work/ex1 --share-net
some unrelated noise -> x
";

    #[test]
    fn recognizes_all_three_shapes() {
        let parsed = parse(SAMPLE, &canon());

        assert_eq!(
            parsed.detail_pairs,
            vec![
                PathRecord::new(Mode::ReadOnly, "/usr/lib/jvm"),
                PathRecord::new(Mode::Write, "/tmp/out"),
                PathRecord::new(Mode::Hidden, "/root/.ssh"),
            ]
        );
        assert_eq!(parsed.base_modes.get("/usr"), Some(&Mode::ReadOnly));
        assert_eq!(parsed.base_modes.get("/var/tmp/work"), Some(&Mode::Write));
        assert_eq!(parsed.base_modes.len(), 2);
        assert_eq!(parsed.system_mounts, vec!["/proc", "/dev", "/tmp"]);
        assert_eq!(
            parsed.tail_tokens,
            vec!["--chdir", "/var/tmp/work/ex1", "--share-net"]
        );
    }

    #[test]
    fn first_detail_occurrence_wins() {
        let parsed = parse(SAMPLE, &canon());
        // "/usr/lib/../lib/jvm -> w" canonicalizes onto an existing entry
        assert_eq!(parsed.stats.duplicate_details, 1);
        let jvm: Vec<_> = parsed
            .detail_pairs
            .iter()
            .filter(|r| r.path == "/usr/lib/jvm")
            .collect();
        assert_eq!(jvm.len(), 1);
        assert_eq!(jvm[0].mode, Mode::ReadOnly);
    }

    #[test]
    fn unrecognized_lines_ignored() {
        let parsed = parse("hello\nrelative/path -> r\n/ok -> q\n", &canon());
        assert!(parsed.detail_pairs.is_empty());
        assert_eq!(parsed.stats.ignored_lines, 3);
    }

    #[test]
    fn truncated_base_pair_stops_block() {
        let parsed = parse("Base options: --ro-bind /usr /usr --bind /only-src", &canon());
        assert_eq!(parsed.base_modes.len(), 1);
        assert!(parsed.base_modes.contains_key("/usr"));
    }

    #[test]
    fn multiple_tail_lines_accumulate() {
        let parsed = parse("Tail options: --a\nTail options: --b --c\n", &canon());
        assert_eq!(parsed.tail_tokens, vec!["--a", "--b", "--c"]);
    }

    #[test]
    fn tail_tokens_honor_quotes() {
        let parsed = parse(
            "[LOG] Tail options: --chdir '/tmp/ex 1' '--share-net'\n",
            &canon(),
        );
        assert_eq!(parsed.tail_tokens, vec!["--chdir", "/tmp/ex 1", "--share-net"]);
    }

    #[test]
    fn empty_log_is_empty() {
        assert_eq!(parse("", &canon()), ParsedLog::default());
    }
}
