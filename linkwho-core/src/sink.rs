//! CSV sinks for run results.

use linkwho_scanner::{Contribution, EditorKey, EditorProfile, LinkUsage};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const USAGE_COLUMNS: [&str; 7] = [
    "lang",
    "domain",
    "url",
    "page_title",
    "wiki_link",
    "user",
    "timestamp",
];

pub const SITE_KEY_COLUMN: &str = "_Lang";
pub const EDITOR_KEY_COLUMN: &str = "_User";

/// Quote a CSV field when it holds a delimiter, quote or line break
pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn csv_line<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut line = fields
        .into_iter()
        .map(csv_field)
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Append-only sink for usage rows, shared by every crawl task.
///
/// Each row is flushed as soon as it is written so an interrupted run leaves
/// only whole rows behind.
pub struct UsageSink {
    writer: Mutex<BufWriter<File>>,
    rows: AtomicUsize,
}

impl UsageSink {
    /// Open `path` for appending, writing the header only if the file is new or empty
    pub fn open(path: &Path) -> io::Result<Self> {
        ensure_parent(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = BufWriter::new(file);
        if needs_header {
            writer.write_all(csv_line(USAGE_COLUMNS).as_bytes())?;
            writer.flush()?;
        }

        Ok(Self {
            writer: Mutex::new(writer),
            rows: AtomicUsize::new(0),
        })
    }

    pub fn write(&self, record: &LinkUsage) -> io::Result<()> {
        let line = csv_line([
            record.site.as_str(),
            record.domain.as_str(),
            record.url.as_str(),
            record.page_title.as_str(),
            record.page_link.as_str(),
            record.user.as_str(),
            record.timestamp.as_str(),
        ]);

        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        self.rows.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Rows written by this sink (not counting rows from earlier runs)
    pub fn rows_written(&self) -> usize {
        self.rows.load(Ordering::Relaxed)
    }
}

fn cell(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Write rows of sparse attributes as a table.
///
/// Columns are `_Lang`, `_User`, then the sorted union of attribute names.
/// Nothing is written for an empty row set.
pub fn write_attribute_table<'a, I>(path: &Path, rows: I) -> io::Result<()>
where
    I: IntoIterator<Item = (&'a EditorKey, &'a Map<String, Value>)>,
{
    let rows: Vec<_> = rows.into_iter().collect();

    ensure_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);

    if rows.is_empty() {
        return writer.flush();
    }

    let columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|(_, attributes)| attributes.keys().map(String::as_str))
        .filter(|name| *name != SITE_KEY_COLUMN && *name != EDITOR_KEY_COLUMN)
        .collect();

    let header = [SITE_KEY_COLUMN, EDITOR_KEY_COLUMN].into_iter().chain(columns.iter().copied());
    writer.write_all(csv_line(header).as_bytes())?;

    for (key, attributes) in rows {
        let values: Vec<Cow<'_, str>> = columns
            .iter()
            .map(|column| attributes.get(*column).map(cell).unwrap_or(Cow::Borrowed("")))
            .collect();

        let fields = [key.site.as_str(), key.editor.as_str()]
            .into_iter()
            .chain(values.iter().map(|v| &**v));
        writer.write_all(csv_line(fields).as_bytes())?;
    }

    writer.flush()
}

pub fn write_profiles(path: &Path, profiles: &[EditorProfile]) -> io::Result<()> {
    write_attribute_table(path, profiles.iter().map(|p| (&p.key, &p.attributes)))
}

pub fn write_contributions(path: &Path, contributions: &[Contribution]) -> io::Result<()> {
    write_attribute_table(path, contributions.iter().map(|c| (&c.key, &c.attributes)))
}

/// Write the distinct editor pairs, one `site,editor` per line
pub fn write_editor_pairs(path: &Path, keys: &BTreeSet<EditorKey>) -> io::Result<()> {
    ensure_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    for key in keys {
        writeln!(writer, "{},{}", key.site, key.editor)?;
    }
    writer.flush()
}

/// Read back a pairs file written by [`write_editor_pairs`], skipping blank lines
pub fn read_editor_pairs(path: &Path) -> io::Result<BTreeSet<EditorKey>> {
    let content = fs::read_to_string(path)?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(','))
        .map(|(site, editor)| EditorKey::new(site, editor))
        .collect())
}
