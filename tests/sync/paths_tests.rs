// Tests for traversal, ignore filtering and path rewriting

use collectr::fs::paths::{compile_patterns, matches_any, relative_to, with_trailing_separator};
use collectr::fs::{enumerate, object_key, relocate, walk_tree};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::support::{relative, write_file};

fn native(s: &str) -> PathBuf {
    PathBuf::from(s.replace('/', &MAIN_SEPARATOR.to_string()))
}

#[test]
fn test_enumerate_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("dirA");
    write_file(&root, "css/css1.css", "a { }");
    write_file(&root, "css/css2.css", "b { }");
    write_file(&root, "js/script1.js", "var a;");
    write_file(&root, "js/script2.js", "var b;");

    let files = walk_tree(&root).unwrap();
    assert_eq!(
        relative(&root, &files),
        vec!["css/css1.css", "css/css2.css", "js/script1.js", "js/script2.js"]
    );
    // Already sorted without post-processing
    let mut sorted = files.clone();
    sorted.sort();
    assert_eq!(files, sorted);
}

#[test]
fn test_walk_prunes_vcs_directories() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_file(root, "index.html", "<html>");
    write_file(root, ".htaccess", "Options -Indexes");
    write_file(root, ".git/HEAD", "ref: refs/heads/main");
    write_file(root, ".git/objects/ab/cdef", "blob");
    write_file(root, "sub/.svn/entries", "12");
    write_file(root, "sub/.hg/store/data", "x");
    write_file(root, "sub/page.html", "<p>");

    let files = walk_tree(root).unwrap();
    assert_eq!(
        relative(root, &files),
        vec![".htaccess", "index.html", "sub/page.html"]
    );
}

#[test]
fn test_walk_skips_directories_themselves() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("empty/nested")).unwrap();
    assert!(walk_tree(dir.path()).unwrap().is_empty());
}

#[test]
fn test_walk_missing_root_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(walk_tree(&dir.path().join("missing")).is_err());
}

#[test]
fn test_enumerate_with_ignore_patterns() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("dirB");
    write_file(&root, "img/img1.jpg", "jpg");
    write_file(&root, "img/img2.png", "png");
    write_file(&root, "img/img3.tiff", "tiff");

    let ignore = compile_patterns(&[r".*\.png".to_string()]).unwrap();
    let enumeration = enumerate(&root, &ignore).unwrap();
    assert_eq!(
        relative(&root, &enumeration.files),
        vec!["img/img1.jpg", "img/img3.tiff"]
    );
    assert_eq!(relative(&root, &enumeration.ignored), vec!["img/img2.png"]);
}

#[test]
fn test_ignore_is_sound_and_complete() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    for rel in [
        "a.css", "a.js", "b.map", "lib/c.js", "lib/c.js.map", "img/d.png", "img/e.PNG", "drafts/x.css",
    ] {
        write_file(root, rel, rel);
    }

    let patterns = vec![r"\.map$".to_string(), r"^drafts".to_string(), r"(?i)\.png$".to_string()];
    let ignore = compile_patterns(&patterns).unwrap();
    let enumeration = enumerate(root, &ignore).unwrap();

    for path in &enumeration.files {
        assert!(!matches_any(&ignore, &relative_to(root, path)), "{}", path.display());
    }
    for path in &enumeration.ignored {
        assert!(matches_any(&ignore, &relative_to(root, path)), "{}", path.display());
    }
    assert_eq!(
        enumeration.files.len() + enumeration.ignored.len(),
        walk_tree(root).unwrap().len()
    );
    assert_eq!(relative(root, &enumeration.files), vec!["a.css", "a.js", "lib/c.js"]);
}

#[test]
fn test_ignore_matches_relative_path_only() {
    // The pattern names the root directory, which is not part of the relative path.
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("public");
    write_file(&root, "site.css", "a");

    let ignore = compile_patterns(&["public".to_string()]).unwrap();
    assert_eq!(enumerate(&root, &ignore).unwrap().files.len(), 1);
}

#[test]
fn test_object_key_strips_root_once() {
    assert_eq!(
        object_key(Path::new("dirB"), &native("dirB/dir/sub/name.ext")),
        native("dir/sub/name.ext").to_string_lossy()
    );
    assert_eq!(
        object_key(&native("dirB/"), &native("dirB/dir/sub/name.ext")),
        native("dir/sub/name.ext").to_string_lossy()
    );
    assert_eq!(
        object_key(Path::new("dirB"), &native("dirB/dirB/name.ext")),
        native("dirB/name.ext").to_string_lossy()
    );
}

#[test]
fn test_object_key_does_not_strip_partial_component() {
    assert_eq!(
        object_key(Path::new("dir"), &native("dirB/a.css")),
        native("dirB/a.css").to_string_lossy()
    );
}

#[test]
fn test_relocate_preserves_sub_path() {
    let old_root = native("test/fixtures/dirA");
    let new_root = native("test/fixtures/dirB/");
    for rel in ["css/css1.css", "js/deep/nested/script.js", "top.css"] {
        let path = old_root.join(native(rel));
        let moved = relocate(&old_root, &new_root, &path);
        assert_eq!(relative_to(&new_root, &moved), relative_to(&old_root, &path));
        assert!(moved
            .to_string_lossy()
            .starts_with(&with_trailing_separator(&new_root)));
    }
}

#[test]
fn test_relocate_replaces_first_occurrence_only() {
    let moved = relocate(Path::new("a"), Path::new("b"), &native("a/x/a/y.css"));
    assert_eq!(moved, native("b/x/a/y.css"));
}
