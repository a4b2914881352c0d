use deploy_sanitizer::{sanitize, Outcome, Policy, SanitizeOptions};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Relative path -> file contents (None for directories)
fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            let contents = if e.file_type().is_file() {
                Some(fs::read(e.path()).unwrap())
            } else {
                None
            };
            (rel, contents)
        })
        .collect()
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn build_mixed_tree(root: &Path) {
    write(root, "main.py", "import app");
    write(root, "README.md", "# readme");
    write(root, "data/data.csv", "a,b\n1,2");
    write(root, "app/__pycache__/app.cpython-311.pyc", "bc");
    write(root, "app/stale.pyc", "bc");
    write(root, "app/handlers.py", "def h(): pass");
    write(root, ".cache/huggingface/hub/blob", "blob");
    write(root, "app/models/encoder/config.json", "{}");
    write(root, "model_cache/x.safetensors", "w");
    write(root, "store/chroma_db/chroma.sqlite3", "db");
    write(root, "store/embeddings/vectors.npy", "v");
    write(root, "store/vector_cache/idx", "i");
    write(root, "weights/model.onnx", "w");
    write(root, "weights/model.pth", "w");
    write(root, "weights/tokenizer.pkl", "w");
    write(root, "weights/clf.joblib", "w");
    write(root, "weights/graph.pb", "w");
    write(root, "venv/lib/site.py", "x");
    write(root, ".venv/bin/python", "x");
    write(root, "tools/env/activate", "x");
    write(root, "app.db", "db");
    write(root, "state/session.sqlite", "db");
}

#[test]
fn test_cache_and_weights_removed_sources_kept() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "src/__pycache__/a.pyc", "bc");
    write(root, "models/weights.bin", "w");
    write(root, "app.py", "print()");
    write(root, "notes.txt", "notes");

    let report = sanitize(root, &Policy::builtin().unwrap(), SanitizeOptions::default());
    assert_eq!(report.summary().removed, 2);

    let remaining: Vec<String> = snapshot(root).into_keys().collect();
    assert_eq!(remaining, ["app.py", "notes.txt", "src"]);
    assert!(root.join("src").is_dir());
}

#[test]
fn test_mixed_tree_keeps_only_sources() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    build_mixed_tree(root);

    let report = sanitize(root, &Policy::builtin().unwrap(), SanitizeOptions::default());
    assert_eq!(report.failures().count(), 0);

    let files: Vec<String> = snapshot(root)
        .into_iter()
        .filter(|(_, contents)| contents.is_some())
        .map(|(path, _)| path)
        .collect();
    assert_eq!(
        files,
        ["README.md", "app/handlers.py", "data/data.csv", "main.py"]
    );

    for gone in [
        "venv",
        ".venv",
        "tools/env",
        ".cache",
        "app/models",
        "store/chroma_db",
        "weights/model.onnx",
    ] {
        assert!(!root.join(gone).exists(), "{gone} should be removed");
    }
}

#[test]
fn test_second_run_performs_no_deletions() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    build_mixed_tree(root);
    let policy = Policy::builtin().unwrap();

    let first = sanitize(root, &policy, SanitizeOptions::default());
    assert!(!first.is_empty());
    let after_first = snapshot(root);

    let second = sanitize(root, &policy, SanitizeOptions::default());
    assert!(second.is_empty());
    assert_eq!(snapshot(root), after_first);
}

#[test]
fn test_tree_without_matches_is_unchanged() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "main.py", "import os");
    write(root, "README.md", "# hi");
    write(root, "data/data.csv", "1,2,3");
    write(root, "docs/model.md", "not a model dir");
    write(root, "environment/settings.toml", "x = 1");
    let before = snapshot(root);

    let report = sanitize(root, &Policy::builtin().unwrap(), SanitizeOptions::default());

    assert!(report.is_empty());
    assert_eq!(report.summary().failed, 0);
    assert_eq!(snapshot(root), before);
}

#[test]
fn test_matches_inside_vcs_named_directories_are_removed() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "CVS/foo.pyc", "bc");
    write(root, ".git/hooks/foo.pyc", "bc");
    write(root, ".git/HEAD", "ref: refs/heads/main");
    write(root, "_darcs/models/w.bin", "w");

    let report = sanitize(root, &Policy::builtin().unwrap(), SanitizeOptions::default());

    assert_eq!(report.summary().removed, 3);
    assert!(!root.join("CVS/foo.pyc").exists());
    assert!(!root.join(".git/hooks/foo.pyc").exists());
    assert!(!root.join("_darcs/models").exists());
    assert!(root.join(".git/HEAD").exists());
}

#[test]
fn test_skip_vcs_leaves_vcs_directories_alone() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, ".git/lfs/cache.db", "db");
    write(root, "cache.db", "db");

    let mut options = SanitizeOptions::default();
    options.scan.skip_vcs = true;
    sanitize(root, &Policy::builtin().unwrap(), options);

    assert!(root.join(".git/lfs/cache.db").exists());
    assert!(!root.join("cache.db").exists());
}

#[cfg(unix)]
#[test]
fn test_suffix_matched_symlink_keeps_its_target() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("project");
    let outside = dir.path().join("shared");
    write(&outside, "real.db", "keep");
    write(&outside, "models/w.bin", "keep");
    fs::create_dir_all(&root).unwrap();
    std::os::unix::fs::symlink(outside.join("real.db"), root.join("app.db")).unwrap();
    std::os::unix::fs::symlink(outside.join("models"), root.join("models")).unwrap();

    let report = sanitize(&root, &Policy::builtin().unwrap(), SanitizeOptions::default());

    assert_eq!(report.summary().removed, 1);
    assert!(fs::symlink_metadata(root.join("app.db")).is_err());
    assert_eq!(fs::read_to_string(outside.join("real.db")).unwrap(), "keep");
    // Symlinked directories are never matched or entered
    assert!(fs::symlink_metadata(root.join("models")).is_ok());
    assert!(outside.join("models/w.bin").exists());
}

#[cfg(unix)]
#[test]
fn test_undeletable_entry_does_not_stop_the_run() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "locked/models/weights.bin", "w");
    write(root, "app.db", "db");
    write(root, "venv/lib/site.py", "x");

    let locked = root.join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

    // Privileged users ignore directory permissions, nothing to observe then
    let privileged = fs::write(locked.join("write_check"), "x").is_ok();

    let report = sanitize(root, &Policy::builtin().unwrap(), SanitizeOptions::default());

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    // Rules after the failing one still ran
    assert!(!root.join("app.db").exists());
    assert!(!root.join("venv").exists());

    if privileged {
        return;
    }

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, locked.join("models"));
    assert!(matches!(failures[0].outcome, Outcome::Failed(_)));
    assert!(root.join("locked/models").exists());
}
