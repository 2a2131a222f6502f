use anyhow::{Context, Result};
use blake3::Hasher;
use std::fs;
use std::path::{Component, Path};

/// File extensions tried, in order, when a module specifier has none.
const MODULE_EXTENSIONS: &[&str] = &["d.ts", "ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    Ok(())
}

/// Content fingerprint used to gate re-extraction.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content.as_bytes());
    hasher.finalize().to_hex().to_string()
}

pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Lexically normalizes a path with `/` separators, keeping a leading root.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut parts: Vec<String> = Vec::new();
    for comp in Path::new(&path).components() {
        match comp {
            Component::Normal(os) => parts.push(os.to_string_lossy().to_string()),
            Component::ParentDir => {
                if parts.last().is_some_and(|last| last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..".to_string());
                }
            }
            Component::Prefix(prefix) => parts.push(prefix.as_os_str().to_string_lossy().to_string()),
            Component::CurDir | Component::RootDir => {}
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Module key of a file: its path without extension and without a trailing
/// `/index`, so `src/a.ts` and `src/a/index.ts` both answer `./a`.
pub fn module_key(file_path: &str) -> String {
    let normalized = normalize_path(file_path);
    let mut key = normalized.as_str();
    for ext in MODULE_EXTENSIONS {
        if let Some(stripped) = key.strip_suffix(&format!(".{ext}")) {
            key = stripped;
            break;
        }
    }
    let key = key.strip_suffix("/index").unwrap_or(key);
    key.to_string()
}

/// Resolves an import specifier written in `importer` to a module key.
///
/// Relative specifiers are joined with the importer's directory; anything
/// else (package names) is returned verbatim and never matches a file.
pub fn resolve_module_specifier(importer: &str, specifier: &str) -> String {
    let specifier = specifier
        .split(['?', '#'])
        .next()
        .unwrap_or(specifier)
        .trim();
    let is_relative = specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../");
    if !is_relative {
        return specifier.to_string();
    }
    let base_dir = match normalize_path(importer).rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    };
    let joined = if base_dir.is_empty() {
        specifier.to_string()
    } else {
        format!("{base_dir}/{specifier}")
    };
    module_key(&joined)
}

/// Splits a normalized path into its folder chain and file name.
pub fn split_path(path: &str) -> (Vec<&str>, &str) {
    let trimmed = path.trim_start_matches('/');
    let mut parts: Vec<&str> = trimmed.split('/').filter(|p| !p.is_empty()).collect();
    let file = parts.pop().unwrap_or("");
    (parts, file)
}
