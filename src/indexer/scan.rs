use crate::indexer::parser::Language;
use anyhow::Result;
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};

/// Build output and dependency folders, never indexed or summarized.
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "out",
    "target",
    "coverage",
    ".git",
    ".next",
    "vendor",
];

/// Where the CLI keeps its database inside a repo.
pub const STATE_DIR: &str = ".symgraph";

#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Normalized absolute path, the key the store uses.
    pub path: String,
    pub abs_path: PathBuf,
    pub language: Language,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub no_ignore: bool,
}

impl ScanOptions {
    pub fn new(no_ignore: bool) -> Self {
        Self { no_ignore }
    }
}

pub fn is_excluded_dir(name: &str) -> bool {
    name == STATE_DIR || EXCLUDED_DIRS.contains(&name)
}

pub fn scan_repo(repo_root: &Path) -> Result<Vec<ScannedFile>> {
    scan_repo_with_options(repo_root, ScanOptions::default())
}

pub fn scan_repo_with_options(repo_root: &Path, options: ScanOptions) -> Result<Vec<ScannedFile>> {
    let mut files = Vec::new();
    let mut builder = WalkBuilder::new(repo_root);
    if options.no_ignore {
        builder
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false);
    } else {
        builder
            .ignore(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .parents(true)
            .require_git(false);
    }
    let walker = builder
        .hidden(false)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            !(is_dir && entry.file_name().to_str().is_some_and(is_excluded_dir))
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("walk error: {err}");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        if let Some(file) = scan_path(entry.path())? {
            files.push(file);
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Describes one file when it has a supported language.
pub fn scan_path(path: &Path) -> Result<Option<ScannedFile>> {
    if !path.is_file() {
        return Ok(None);
    }
    let Some(language) = path.to_str().and_then(Language::from_path) else {
        return Ok(None);
    };
    let abs_path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    Ok(Some(ScannedFile {
        path: crate::util::normalize_path(&abs_path.to_string_lossy()),
        abs_path,
        language,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scan_skips_dependency_dirs_and_unknown_extensions() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("src/a.ts"), "export function a() {}").unwrap();
        fs::write(root.join("src/b.jsx"), "function b() {}").unwrap();
        fs::write(root.join("src/readme.md"), "# hi").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "function x() {}").unwrap();
        fs::write(root.join("dist/a.js"), "function y() {}").unwrap();

        let files = scan_repo(root).unwrap();
        let names: Vec<&str> = files
            .iter()
            .map(|f| f.path.rsplit('/').next().unwrap())
            .collect();
        assert_eq!(names, vec!["a.ts", "b.jsx"]);
        assert_eq!(files[0].language, Language::TypeScript);
        assert!(files[0].path.starts_with('/'));
    }
}
