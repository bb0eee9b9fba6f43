//! Full pipeline over raw logs: parse, artifacts, aggregation, emission.

use std::fs;
use std::path::Path;

use phobos_bindings::bindings::{Canonicalizer, OutputLayout};
use phobos_bindings::pipeline::{self, LanguageStatus, RunOptions, WorkerContext};

fn write_log(root: &Path, lang: &str, exercise: &str, body: &str) {
    let dir = root.join("logs").join(lang).join(exercise);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("final_bindings.txt"), body).unwrap();
}

fn options(root: &Path, languages: &[&str]) -> RunOptions {
    RunOptions {
        languages: languages.iter().map(|l| l.to_string()).collect(),
        jobs: 4,
        scan_logs: true,
        worker: WorkerContext {
            logs_root: root.join("logs"),
            log_file_name: "final_bindings.txt".into(),
            path_dir: root.join("sets"),
            canonicalizer: Canonicalizer::new("/", false),
            probe: None,
        },
        layout: OutputLayout::new(root.join("core"), "debug").with_path_sets(root.join("sets")),
        allowed_flags: vec!["--share-net".into()],
        runtime_chdir: "/var/tmp/testing-dir".into(),
        policy: None,
        wait_for_lock: true,
    }
}

fn seed_scenario(root: &Path) {
    write_log(
        root,
        "java",
        "ex1",
        "[LOG] Base options: --ro-bind /usr/lib /usr/lib --proc /proc\n\
         [LOG] /tmp/out -> w\n\
         [LOG] /etc/shadow -> n\n\
         [LOG] Tail options: --chdir /tmp/ex1 --share-net\n",
    );
    write_log(
        root,
        "java",
        "ex2",
        "/usr/lib -> r\n/tmp/./out -> r\nTail options: --chdir /tmp/ex2 --bogus-flag\n",
    );
    write_log(root, "python", "ex1", "/usr/lib -> r\n/opt/py/../py -> r\n");
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap_or_else(|e| panic!("{}: {}", rel, e))
}

#[tokio::test]
async fn two_languages_produce_layered_configs() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    seed_scenario(root);

    let summary = pipeline::run(options(root, &["java", "python"])).await.unwrap();
    assert!(summary.is_success(), "{:?}", summary.lines());
    assert_eq!(
        summary.language("java").unwrap().status,
        LanguageStatus::Aggregated { exercises: 2 }
    );

    assert_eq!(
        read(root, "core/BaseLanguage-java.cfg"),
        "[readonly]\n/usr/lib\n\n[write]\n/tmp/out\n"
    );
    assert_eq!(
        read(root, "core/BaseLanguage-python.cfg"),
        "[readonly]\n/opt/py\n/usr/lib\n"
    );
    assert_eq!(
        read(root, "core/BasePhobos.cfg"),
        "[readonly]\n/opt/py\n/usr/lib\n\n[write]\n/tmp/out\n"
    );
    assert_eq!(
        read(root, "core/debug/BasePhobosIntersect.cfg"),
        "[readonly]\n/usr/lib\n"
    );
    assert_eq!(
        read(root, "core/debug/BaseJavaIntersect.cfg"),
        "[readonly]\n/usr/lib\n\n[write]\n/tmp/out\n"
    );
    assert_eq!(
        read(root, "core/TailPhobos.cfg"),
        "--share-net --chdir /var/tmp/testing-dir\n"
    );

    // hidden and system-mount paths never reach any output
    let java_ex1 = read(root, "sets/java_ex1.paths");
    assert!(!java_ex1.contains("/etc/shadow"));
    assert!(!java_ex1.contains("/proc"));
    assert_eq!(read(root, "sets/intersection_all.paths"), "r /usr/lib\n");

    let record: serde_json::Value =
        serde_json::from_str(&read(root, "sets/java_ex1.json")).unwrap();
    assert_eq!(record["schema_version"], 1);
    assert_eq!(record["log_sha256"].as_str().unwrap().len(), 64);
    assert!(
        record["paths_dynamic"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r["path"] == "/etc/shadow" && r["mode"] == "n")
    );
}

#[tokio::test]
async fn rerun_is_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    seed_scenario(root);

    let first = pipeline::run(options(root, &["python", "java"])).await.unwrap();
    let snapshot: Vec<(std::path::PathBuf, Vec<u8>)> = first
        .written
        .iter()
        .map(|p| (p.clone(), fs::read(p).unwrap()))
        .collect();

    let second = pipeline::run(options(root, &["java", "python"])).await.unwrap();
    assert_eq!(first.written.len(), second.written.len());
    for (path, bytes) in snapshot {
        assert_eq!(fs::read(&path).unwrap(), bytes, "{} changed", path.display());
    }
}

#[tokio::test]
async fn missing_logs_for_one_exercise_only_warn() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    seed_scenario(root);
    // log path is a directory: unreadable as a file
    fs::create_dir_all(root.join("logs/java/ex3/final_bindings.txt")).unwrap();

    let summary = pipeline::run(options(root, &["java", "python"])).await.unwrap();
    assert!(summary.is_success(), "{:?}", summary.lines());
    let java = summary.language("java").unwrap();
    assert_eq!(java.status, LanguageStatus::Aggregated { exercises: 2 });
    assert_eq!(java.warnings.len(), 1, "{:?}", java.warnings);
}
