//! Thin file I/O around the core
//!
//! Input list readers and the output artifact writer. No algorithmic
//! content lives here beyond filename sanitization.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;
use tracing::warn;
use url::Url;

use crate::error::Result;

/// Leading scheme (`http://`, `https://`) or protocol-relative `//`
static SCHEME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://|^//").expect("hardcoded pattern"));

/// Runs of characters that do not belong in a filename
static HOSTILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|[:cntrl:][:space:].]+"#).expect("hardcoded pattern"));

/// Read a list file: one entry per line, blank lines skipped
pub async fn read_lines(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path).await?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Read a list of URLs, dropping lines that do not parse as URLs
pub async fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let lines = read_lines(path).await?;
    Ok(lines
        .into_iter()
        .filter(|line| match Url::parse(line) {
            Ok(_) => true,
            Err(e) => {
                warn!(%line, "skipping unparseable URL: {}", e);
                false
            }
        })
        .collect())
}

/// Derive an output filename from a URL
///
/// Strips the scheme, collapses filesystem-hostile character runs to `_`,
/// and clamps over-long names to the first 30 plus the last 140 characters
/// joined by `(__)`.
pub fn artifact_name(url: &str) -> String {
    let stripped = SCHEME_PREFIX.replace(url, "");
    let mut name = HOSTILE_CHARS.replace_all(&stripped, "_").into_owned();
    if name.trim_matches('_').is_empty() {
        name = "_".to_string();
    }
    let chars: Vec<char> = name.chars().collect();
    if chars.len() > 180 {
        let head: String = chars[..30].iter().collect();
        let tail: String = chars[chars.len() - 140..].iter().collect();
        name = format!("{}(__){}", head, tail);
    }
    format!("{}.html", name)
}

/// Persist one fetched page body under the output directory
pub async fn write_artifact(dir: &Path, url: &str, body: &str) -> Result<PathBuf> {
    let path = dir.join(artifact_name(url));
    fs::write(&path, body).await?;
    Ok(path)
}
