//! Layered configuration output.
//!
//! # Files
//!
//! | File | Layer |
//! |------|-------|
//! | `BasePhobos.cfg` | cross-language union, runtime fallback policy |
//! | `BaseLanguage-<lang>.cfg` | per-language union |
//! | `TailPhobos.cfg` | sanitized runtime flags |
//! | `debug/BasePhobosIntersect.cfg` | cross-language intersection (audit) |
//! | `debug/Base<Lang>Intersect.cfg` | per-language intersection (audit) |
//!
//! Section format: `[readonly]` then `[write]`, sorted paths one per line,
//! empty sections omitted, sections separated by one blank line. Output is a
//! pure function of its inputs so identical sets give identical bytes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::aggregate::{GlobalConfig, LanguageSet};
use super::artifact::render_paths;
use super::set::BindingSet;
use super::tail::TailFlagSet;
use crate::error::{BindingError, Result};

pub const GLOBAL_CFG: &str = "BasePhobos.cfg";
pub const GLOBAL_INTERSECT_CFG: &str = "BasePhobosIntersect.cfg";
pub const TAIL_CFG: &str = "TailPhobos.cfg";

/// Optional trailing sections of the combined runtime policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySections {
    pub network_allow: Vec<String>,
    pub limits_timeout: u64,
}

impl Default for PolicySections {
    fn default() -> Self {
        Self {
            network_allow: vec!["*".to_string()],
            limits_timeout: 0,
        }
    }
}

/// Where each output family goes.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    /// Runtime-consumed config files.
    pub core_dir: PathBuf,
    /// Audit-only intersection files.
    pub debug_dir: PathBuf,
    /// Optional `.paths` companions of the derived sets.
    pub path_sets_dir: Option<PathBuf>,
}

impl OutputLayout {
    pub fn new(core_dir: impl Into<PathBuf>, debug_subdir: &str) -> Self {
        let core_dir = core_dir.into();
        Self {
            debug_dir: core_dir.join(debug_subdir),
            core_dir,
            path_sets_dir: None,
        }
    }

    pub fn with_path_sets(mut self, dir: impl Into<PathBuf>) -> Self {
        self.path_sets_dir = Some(dir.into());
        self
    }

    pub fn global_cfg(&self) -> PathBuf {
        self.core_dir.join(GLOBAL_CFG)
    }

    pub fn tail_cfg(&self) -> PathBuf {
        self.core_dir.join(TAIL_CFG)
    }

    pub fn language_cfg(&self, lang: &str) -> PathBuf {
        self.core_dir.join(format!("BaseLanguage-{}.cfg", lang))
    }

    pub fn global_intersect_cfg(&self) -> PathBuf {
        self.debug_dir.join(GLOBAL_INTERSECT_CFG)
    }

    pub fn language_intersect_cfg(&self, lang: &str) -> PathBuf {
        self.debug_dir
            .join(format!("Base{}Intersect.cfg", capitalize(lang)))
    }

    /// Every config file a run over `languages` must leave behind.
    pub fn required_outputs(&self, languages: &[LanguageSet]) -> Vec<PathBuf> {
        let mut out = vec![
            self.global_cfg(),
            self.tail_cfg(),
            self.global_intersect_cfg(),
        ];
        for lang in languages {
            out.push(self.language_cfg(&lang.language));
            out.push(self.language_intersect_cfg(&lang.language));
        }
        out
    }
}

/// Render the `[readonly]` / `[write]` sections of a set.
pub fn render_sections(set: &BindingSet) -> String {
    render(&set.readonly(), &set.write(), None)
}

/// Render explicit read-only and writable path lists, with optional
/// `[network]` / `[limits]` sections.
pub fn render<S: AsRef<str>>(
    readonly: &[S],
    write: &[S],
    policy: Option<&PolicySections>,
) -> String {
    let mut sections: Vec<(&str, Vec<String>)> = Vec::new();
    if !readonly.is_empty() {
        sections.push(("readonly", sorted_lines(readonly)));
    }
    if !write.is_empty() {
        sections.push(("write", sorted_lines(write)));
    }
    if let Some(policy) = policy {
        sections.push((
            "network",
            policy
                .network_allow
                .iter()
                .map(|a| format!("allow {}", a))
                .collect(),
        ));
        sections.push(("limits", vec![format!("timeout={}", policy.limits_timeout)]));
    }

    let mut out = String::new();
    for (i, (name, lines)) in sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push('[');
        out.push_str(name);
        out.push_str("]\n");
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn sorted_lines<S: AsRef<str>>(paths: &[S]) -> Vec<String> {
    let mut lines: Vec<String> = paths.iter().map(|p| p.as_ref().to_string()).collect();
    lines.sort();
    lines.dedup();
    lines
}

/// Write `contents` to `dest` through a sibling temp file and a rename, so a
/// reader never observes a half-written file.
pub fn write_atomic(dest: &Path, contents: &str) -> Result<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| BindingError::write(&parent, e))?;

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let tmp = parent.join(format!(".{}.tmp-{}", file_name, std::process::id()));

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, dest)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(BindingError::write(dest, e));
    }
    debug!("Wrote {}", dest.display());
    Ok(())
}

/// Emit every layered config file. Returns the files written, in order.
pub fn emit_all(
    layout: &OutputLayout,
    global: &GlobalConfig,
    languages: &[LanguageSet],
    tail: &TailFlagSet,
    policy: Option<&PolicySections>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let dest = layout.global_cfg();
    write_atomic(
        &dest,
        &render(&global.union.readonly(), &global.union.write(), policy),
    )?;
    written.push(dest);

    for lang in languages {
        let dest = layout.language_cfg(&lang.language);
        write_atomic(&dest, &render_sections(&lang.union))?;
        written.push(dest);

        let dest = layout.language_intersect_cfg(&lang.language);
        write_atomic(&dest, &render_sections(&lang.intersection))?;
        written.push(dest);
    }

    let dest = layout.global_intersect_cfg();
    write_atomic(&dest, &render_sections(&global.intersection))?;
    written.push(dest);

    let dest = layout.tail_cfg();
    write_atomic(&dest, &tail.render())?;
    written.push(dest);

    if let Some(dir) = &layout.path_sets_dir {
        written.extend(emit_path_sets(dir, global, languages)?);
    }

    info!(
        "Emitted {} config files for {} languages",
        written.len(),
        languages.len()
    );
    Ok(written)
}

/// `.paths` companions of the derived sets, for diff-based auditing.
pub fn emit_path_sets(
    dir: &Path,
    global: &GlobalConfig,
    languages: &[LanguageSet],
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for lang in languages {
        let dest = dir.join(format!("{}_union.paths", lang.language));
        write_atomic(&dest, &render_paths(&lang.union))?;
        written.push(dest);

        let dest = dir.join(format!("{}_intersection.paths", lang.language));
        write_atomic(&dest, &render_paths(&lang.intersection))?;
        written.push(dest);
    }

    let dest = dir.join("union_all.paths");
    write_atomic(&dest, &render_paths(&global.union))?;
    written.push(dest);

    let dest = dir.join("intersection_all.paths");
    write_atomic(&dest, &render_paths(&global.intersection))?;
    written.push(dest);

    Ok(written)
}

/// `java` -> `Java`, `CPP` -> `Cpp`.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::mode::Mode;
    use crate::bindings::tail::{default_allowed_flags, sanitize};

    fn set(entries: &[(&str, Mode)]) -> BindingSet {
        entries.iter().map(|(p, m)| (*p, *m)).collect()
    }

    #[test]
    fn sections_sorted_and_separated() {
        let out = render(&["/usr/lib", "/opt/py"], &["/tmp/out"], None);
        assert_eq!(out, "[readonly]\n/opt/py\n/usr/lib\n\n[write]\n/tmp/out\n");
    }

    #[test]
    fn empty_sections_omitted() {
        let none: [&str; 0] = [];
        assert_eq!(render(&none, &["/w"], None), "[write]\n/w\n");
        assert_eq!(render(&["/r"], &none, None), "[readonly]\n/r\n");
        assert_eq!(render(&none, &none, None), "");
    }

    #[test]
    fn policy_sections_use_fixed_defaults() {
        let out = render(&["/usr"], &["/tmp"], Some(&PolicySections::default()));
        assert_eq!(
            out,
            "[readonly]\n/usr\n\n[write]\n/tmp\n\n[network]\nallow *\n\n[limits]\ntimeout=0\n"
        );
    }

    #[test]
    fn capitalizes_like_language_labels() {
        assert_eq!(capitalize("java"), "Java");
        assert_eq!(capitalize("CPP"), "Cpp");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn emit_is_byte_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let union = set(&[("/usr/lib", Mode::ReadOnly), ("/tmp/out", Mode::Write)]);
        let lang = LanguageSet {
            language: "java".into(),
            exercises: 1,
            union: union.clone(),
            intersection: union.clone(),
        };
        let global = GlobalConfig {
            union: union.clone(),
            intersection: union,
        };
        let tail = sanitize(&["--share-net"], &default_allowed_flags(), "/work");
        let layout = OutputLayout::new(tmp.path().join("core"), "debug")
            .with_path_sets(tmp.path().join("sets"));

        let first = emit_all(&layout, &global, std::slice::from_ref(&lang), &tail, None).unwrap();
        let snapshot: Vec<Vec<u8>> = first.iter().map(|p| fs::read(p).unwrap()).collect();
        let second = emit_all(&layout, &global, std::slice::from_ref(&lang), &tail, None).unwrap();
        assert_eq!(first, second);
        let again: Vec<Vec<u8>> = second.iter().map(|p| fs::read(p).unwrap()).collect();
        assert_eq!(snapshot, again);

        for required in layout.required_outputs(&[lang]) {
            assert!(required.exists(), "missing {}", required.display());
        }
        assert!(tmp.path().join("core/debug/BaseJavaIntersect.cfg").exists());
        assert_eq!(
            fs::read_to_string(tmp.path().join("sets/java_union.paths")).unwrap(),
            "w /tmp/out\nr /usr/lib\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_destination_is_write_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "not a dir").unwrap();
        let err = write_atomic(&blocker.join("BasePhobos.cfg"), "x").unwrap_err();
        assert!(matches!(err, BindingError::WriteFailure { .. }));
        assert!(err.is_fatal());
    }
}
