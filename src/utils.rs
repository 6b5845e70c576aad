use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use url::form_urlencoded;

use crate::error::{DashboardError, Result};

/// Cell spellings that pandas reads as NA by default.
const NA_SPELLINGS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>", "#N/A",
];

/// Exact match only: a whitespace-only cell is a present value, as in pandas.
pub fn is_null_cell(raw: &str) -> bool {
    NA_SPELLINGS.contains(&raw)
}

pub fn non_null(raw: Option<String>) -> Option<String> {
    raw.and_then(|value| {
        if is_null_cell(&value) {
            None
        } else {
            Some(value.trim().to_string())
        }
    })
}

pub fn write_atomic<F>(path: &Path, write_fn: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> std::io::Result<()>,
{
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    let mut temp = NamedTempFile::new_in(parent).map_err(|err| DashboardError::io(parent, err))?;
    write_fn(&mut temp).map_err(|err| DashboardError::io(path, err))?;
    temp.flush().map_err(|err| DashboardError::io(path, err))?;
    temp.persist(path)
        .map_err(|err| DashboardError::io(path, err.error))?;
    Ok(())
}

pub fn write_atomic_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic(path, |file| file.write_all(bytes))
}

pub fn ensure_parent_dir(path: &Path) -> Result<Option<PathBuf>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| DashboardError::io(parent, err))?;
            return Ok(Some(parent.to_path_buf()));
        }
    }
    Ok(None)
}

pub fn format_with_commas<T: ToString>(value: T) -> String {
    let s = value.to_string();
    let (sign, digits) = if let Some(stripped) = s.strip_prefix('-') {
        ("-", stripped)
    } else {
        ("", s.as_str())
    };
    let mut out = String::new();
    let mut count = 0;
    for ch in digits.chars().rev() {
        if count == 3 {
            out.push(',');
            count = 0;
        }
        out.push(ch);
        count += 1;
    }
    let formatted: String = out.chars().rev().collect();
    format!("{}{}", sign, formatted)
}

pub fn parse_query(raw: Option<String>) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    let Some(raw) = raw else { return map };
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        map.entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    map
}
