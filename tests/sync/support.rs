// Shared fixtures for sync tests

use collectr::sync::CommandRunner;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Create `root/rel` with `content`, making parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// Paths relative to `root`, with `/` separators, sorted.
pub fn relative(root: &Path, paths: &[PathBuf]) -> Vec<String> {
    let mut out: Vec<String> = paths
        .iter()
        .map(|p| {
            p.strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    out.sort();
    out
}

/// Stand-in for an external minifier.
///
/// Understands `tool [flags] -o OUT IN`: splits the command line the way a
/// shell would, records the words and writes IN with whitespace stripped to
/// OUT. Commands containing `fail_on` exit 1.
#[derive(Default)]
pub struct FakeMinifier {
    pub calls: Mutex<Vec<Vec<String>>>,
    pub fail_on: Option<String>,
}

impl FakeMinifier {
    pub fn failing_on(pattern: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(pattern.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

impl CommandRunner for FakeMinifier {
    fn invoke(&self, command_line: &str) -> io::Result<i32> {
        let parts = shlex::split(command_line)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "unbalanced quotes"))?;
        self.calls.lock().unwrap().push(parts.clone());
        if let Some(pattern) = &self.fail_on {
            if command_line.contains(pattern.as_str()) {
                return Ok(1);
            }
        }

        let out = parts
            .iter()
            .position(|p| p == "-o")
            .and_then(|i| parts.get(i + 1))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "missing -o"))?;
        let input = parts
            .last()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "missing input"))?;

        let content = fs::read_to_string(input)?;
        let minified: String = content.split_whitespace().collect();
        fs::write(out, minified)?;
        Ok(0)
    }
}
