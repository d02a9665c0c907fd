use labelkit::cache::PersistentCache;
use labelkit::config::CacheConfig;
use labelkit::preprocess::{Embedding, cache_key};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn command(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_labelkit"));
    cmd.args(args)
        .env_remove("LABELKIT_CACHE_DIR")
        .env_remove("LABELKIT_CACHE_MAX_GB");
    cmd
}

fn labelkit(args: &[&str]) -> Output {
    command(args).output().expect("run labelkit")
}

fn info_json(out: &Output) -> serde_json::Value {
    serde_json::from_str(&stdout(out)).unwrap()
}

fn seed(cache_dir: &Path, image: &Path) {
    let cfg = CacheConfig::resolve(Some(cache_dir.to_path_buf()), None).unwrap();
    PersistentCache::open(cfg)
        .unwrap()
        .put(&cache_key(image), &Embedding { shape: vec![1], data: vec![0.5] })
        .unwrap();
}

fn stdout(out: &Output) -> String {
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8(out.stdout.clone()).unwrap()
}

#[test]
fn inline_flags_print_one_per_line() {
    let out = labelkit(&["flags", "--flags", "Apple,Meta,Google"]);
    assert_eq!(stdout(&out), "Apple\nMeta\nGoogle\n");
}

#[test]
fn flags_value_naming_a_file_reads_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flags.txt");
    fs::write(&path, "Apple\n\nMeta\nGoogle\n").unwrap();

    let out = labelkit(&["flags", "--flags", path.to_str().unwrap()]);
    assert_eq!(stdout(&out), "Apple\nMeta\nGoogle\n");

    let out = labelkit(&["flags", "--file", path.to_str().unwrap(), "--format", "json"]);
    let json: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(json["labels"], serde_json::json!(["Apple", "Meta", "Google"]));
    assert_eq!(json["source"]["kind"], "file");
}

#[test]
fn missing_flag_file_fails() {
    let out = labelkit(&["flags", "--file", "/nonexistent/flags.txt"]);
    assert!(!out.status.success());
}

#[test]
fn cache_info_and_clear_on_empty_dir() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");
    fs::create_dir(&cache_dir).unwrap();
    let cache_dir = cache_dir.to_str().unwrap();

    let out = labelkit(&["cache", "info", "--cache-dir", cache_dir, "--format", "json"]);
    assert_eq!(info_json(&out)["files"], 0);

    let out = labelkit(&["cache", "clear", "--cache-dir", cache_dir]);
    assert!(stdout(&out).starts_with("Removed 0 entries"));

    let out = labelkit(&["cache", "clear", "--cache-dir", cache_dir, "--purge"]);
    assert!(stdout(&out).starts_with("Removed "));
    assert!(!dir.path().join("cache").exists());
}

#[test]
fn cache_status_counts_images() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    fs::create_dir_all(&images).unwrap();
    fs::write(images.join("a.jpg"), b"x").unwrap();
    fs::write(images.join("b.png"), b"x").unwrap();
    fs::write(images.join("a.json"), b"{}").unwrap();
    let cache_dir = dir.path().join("cache");
    fs::create_dir(&cache_dir).unwrap();

    let out = labelkit(&[
        "cache",
        "status",
        "--cache-dir",
        cache_dir.to_str().unwrap(),
        "--images",
        images.to_str().unwrap(),
    ]);
    assert_eq!(stdout(&out), "0 of 2 images cached (2 missing)\n");
}

#[test]
fn relative_image_folder_matches_absolute_cache_keys() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("imgs");
    fs::create_dir_all(&images).unwrap();
    fs::write(images.join("a.jpg"), b"x").unwrap();
    fs::write(images.join("b.jpg"), b"x").unwrap();
    let cache_dir = dir.path().join("cache");
    seed(&cache_dir, &images.join("a.jpg"));

    let out = command(&[
        "cache",
        "status",
        "--cache-dir",
        cache_dir.to_str().unwrap(),
        "--images",
        "imgs",
        "--list-missing",
    ])
    .current_dir(dir.path())
    .output()
    .unwrap();
    let text = stdout(&out);
    assert!(text.starts_with("1 of 2 images cached (1 missing)\n"), "{}", text);
    assert!(text.trim_end().ends_with("b.jpg"));
}

#[test]
fn cache_dir_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let from_env = dir.path().join("env-cache");
    fs::create_dir(&from_env).unwrap();

    let out = command(&["cache", "info", "--format", "json"])
        .env("LABELKIT_CACHE_DIR", &from_env)
        .output()
        .unwrap();
    assert_eq!(info_json(&out)["cache_dir"], from_env.to_str().unwrap());
}

#[test]
fn cli_cache_dir_overrides_environment() {
    let dir = tempfile::tempdir().unwrap();
    let from_env = dir.path().join("env-cache");
    let from_cli = dir.path().join("cli-cache");
    fs::create_dir(&from_env).unwrap();
    fs::create_dir(&from_cli).unwrap();

    let out = command(&[
        "cache",
        "info",
        "--format",
        "json",
        "--cache-dir",
        from_cli.to_str().unwrap(),
    ])
    .env("LABELKIT_CACHE_DIR", &from_env)
    .output()
    .unwrap();
    assert_eq!(info_json(&out)["cache_dir"], from_cli.to_str().unwrap());
}

#[test]
fn cli_cache_size_overrides_environment() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().to_str().unwrap();

    let out = command(&["cache", "info", "--cache-dir", cache_dir])
        .env("LABELKIT_CACHE_MAX_GB", "0")
        .output()
        .unwrap();
    assert!(!out.status.success());

    let out = command(&["cache", "info", "--cache-dir", cache_dir, "--max-size-gb", "2"])
        .env("LABELKIT_CACHE_MAX_GB", "0")
        .output()
        .unwrap();
    assert!(out.status.success());
}

#[test]
fn non_positive_cache_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().to_str().unwrap();

    for size in ["0", "-1"] {
        let out = labelkit(&[
            "cache",
            "info",
            "--cache-dir",
            cache_dir,
            &format!("--max-size-gb={size}"),
        ]);
        assert!(!out.status.success(), "size {size} accepted");
        assert!(String::from_utf8_lossy(&out.stderr).contains("positive"));
    }
}

#[test]
fn read_only_commands_do_not_create_missing_cache_dir() {
    let dir = tempfile::tempdir().unwrap();
    let typo = dir.path().join("cahce");

    let out = labelkit(&["cache", "info", "--cache-dir", typo.to_str().unwrap()]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("does not exist"));

    let out = labelkit(&[
        "cache",
        "status",
        "--cache-dir",
        typo.to_str().unwrap(),
        "--images",
        dir.path().to_str().unwrap(),
    ]);
    assert!(!out.status.success());
    assert!(!typo.exists());
}
