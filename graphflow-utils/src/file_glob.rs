//! ABOUTME: Implements the `file()` selector chain: glob expansion under
//! ABOUTME: FSRoot, mime filtering, then a terminal cardinality selector

use graphflow_core::error::{not_found_error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Resolves `file(pattern, selectors...)` per the chain rule: `mime:<type>`
/// narrows the candidate set, the first cardinality keyword encountered
/// (`first|last|count|all`) terminates the chain. Defaults to `all` when no
/// cardinality selector is present.
pub async fn resolve_file(fs_root: &str, pattern: &str, selectors: &[String]) -> Result<Value> {
    let mut candidates = expand_glob(fs_root, pattern)?;

    for selector in selectors {
        if let Some(mime_filter) = selector.strip_prefix("mime:") {
            candidates.retain(|p| mime_matches(p, mime_filter));
            continue;
        }
        return match selector.as_str() {
            "first" => read_one(candidates.first()).await,
            "last" => read_one(candidates.last()).await,
            "count" => Ok(Value::from(candidates.len())),
            "all" => read_all(&candidates).await,
            other => Err(not_found_error(format!("unknown file() selector '{other}'"))),
        };
    }

    read_all(&candidates).await
}

fn expand_glob(fs_root: &str, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = Path::new(fs_root).join(pattern);
    let pattern_str = full.to_string_lossy().into_owned();
    let mut paths: Vec<PathBuf> = glob::glob(&pattern_str)
        .map_err(|e| not_found_error(format!("invalid glob pattern '{pattern}': {e}")))?
        .filter_map(std::result::Result::ok)
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

fn mime_matches(path: &Path, wanted: &str) -> bool {
    let guess = mime_guess::from_path(path).first_or_octet_stream();
    let actual = guess.essence_str();
    if let Some(prefix) = wanted.strip_suffix("/*") {
        actual.starts_with(prefix) && actual.as_bytes().get(prefix.len()) == Some(&b'/')
    } else {
        actual == wanted
    }
}

async fn read_one(path: Option<&PathBuf>) -> Result<Value> {
    match path {
        Some(p) => {
            let body = tokio::fs::read_to_string(p)
                .await
                .map_err(|e| not_found_error(format!("cannot read {}: {e}", p.display())))?;
            Ok(Value::String(body))
        }
        None => Err(not_found_error("file() matched no files")),
    }
}

async fn read_all(paths: &[PathBuf]) -> Result<Value> {
    let mut bodies = Vec::with_capacity(paths.len());
    for p in paths {
        let body = tokio::fs::read_to_string(p)
            .await
            .map_err(|e| not_found_error(format!("cannot read {}: {e}", p.display())))?;
        bodies.push(Value::String(body));
    }
    Ok(Value::Array(bodies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn count_selector_counts_glob_matches() {
        let dir = tempdir().unwrap();
        for name in ["a1.txt", "a2.txt", "a3.txt"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        let root = dir.path().to_string_lossy().into_owned();
        let v = resolve_file(&root, "a*.txt", &["count".to_string()]).await.unwrap();
        assert_eq!(v, Value::from(3));
    }

    #[tokio::test]
    async fn no_matches_yields_zero_for_count_and_empty_list_for_all() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        assert_eq!(
            resolve_file(&root, "*.csv", &["count".to_string()]).await.unwrap(),
            Value::from(0)
        );
        assert_eq!(
            resolve_file(&root, "*.csv", &["all".to_string()]).await.unwrap(),
            Value::Array(vec![])
        );
        assert!(resolve_file(&root, "*.csv", &["first".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn mime_filter_narrows_before_cardinality_selector() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pic.png"), "binarypng").unwrap();
        fs::write(dir.path().join("doc.pdf"), "pdfbytes").unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let v = resolve_file(
            &root,
            "*",
            &["mime:image/*".to_string(), "first".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(v, Value::String("binarypng".to_string()));
    }
}
