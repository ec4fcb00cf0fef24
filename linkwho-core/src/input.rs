//! Readers for the site and domain lists a run starts from.

use crate::error::{CoreError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Column of the sites file holding the site identifiers
pub const SITE_COLUMN: &str = "Language Code";

/// Split CSV text into records of fields.
///
/// Double-quoted fields may contain commas, doubled quotes and line breaks.
/// Blank lines produce no record.
pub fn split_csv_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut pending = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => record.push(std::mem::take(&mut field)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => continue,
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                pending = false;
                continue;
            }
            _ => field.push(c),
        }
        pending = true;
    }
    if pending {
        record.push(field);
        records.push(record);
    }

    records.retain(|r: &Vec<String>| !(r.len() == 1 && r[0].trim().is_empty()));
    records
}

/// Split a single CSV record into fields
pub fn split_csv_line(line: &str) -> Vec<String> {
    split_csv_records(line).into_iter().next().unwrap_or_default()
}

fn unique_non_empty<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Parse the sites CSV: a header row followed by records with a `Language Code` column
pub fn parse_sites(content: &str, source: &Path) -> Result<Vec<String>> {
    let mut records = split_csv_records(content.trim_start_matches('\u{feff}')).into_iter();

    let header = records.next().ok_or_else(|| CoreError::Input {
        path: source.to_path_buf(),
        reason: "file is empty".to_string(),
    })?;

    let column = header
        .iter()
        .position(|name| name.trim() == SITE_COLUMN)
        .ok_or_else(|| CoreError::Input {
            path: source.to_path_buf(),
            reason: format!("missing '{}' column", SITE_COLUMN),
        })?;

    let sites = unique_non_empty(records.filter_map(|record| record.into_iter().nth(column)));

    if sites.is_empty() {
        return Err(CoreError::Input {
            path: source.to_path_buf(),
            reason: "no site identifiers found".to_string(),
        });
    }

    Ok(sites)
}

/// Parse the domains file: one domain per line, no header
pub fn parse_domains(content: &str, source: &Path) -> Result<Vec<String>> {
    let domains = unique_non_empty(content.lines().map(str::to_string));

    if domains.is_empty() {
        return Err(CoreError::Input {
            path: source.to_path_buf(),
            reason: "no domains found".to_string(),
        });
    }

    Ok(domains)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CoreError::Input {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub fn read_sites(path: &Path) -> Result<Vec<String>> {
    debug!("Reading site codes from: {}", path.display());
    let sites = parse_sites(&read(path)?, path)?;
    debug!("Found {} site codes.", sites.len());
    Ok(sites)
}

pub fn read_domains(path: &Path) -> Result<Vec<String>> {
    debug!("Reading domains from: {}", path.display());
    let domains = parse_domains(&read(path)?, path)?;
    debug!("Found {} domains.", domains.len());
    Ok(domains)
}
