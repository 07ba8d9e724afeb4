use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Default number of days before entries are prunable.
pub const PRUNE_AGE_DAYS: i64 = 30;

/// Past this size the oldest entries are dropped on the next append.
const MAX_LOG_SIZE: usize = 1_048_576;

/// File name of the log inside the data directory
const LOG_FILE_NAME: &str = ".recovery.log";

/// Written at the top of a new log.
const FILE_HEADER: &str = "\
<!-- ticklist recovery log: append-only
     Records that could not be read or saved are copied here verbatim,
     along with any repairs made while loading.
     View with: tl recovery
     Prune old entries: tl recovery --prune
     Safe to delete. -->

---
";

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// A stored record failed to parse and was treated as empty
    Parse,
    /// A record could not be written
    Write,
    /// Stored data violated an invariant and was fixed on load
    Repair,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryCategory::Parse => write!(f, "parse"),
            RecoveryCategory::Write => write!(f, "write"),
            RecoveryCategory::Repair => write!(f, "repair"),
        }
    }
}

impl RecoveryCategory {
    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "parse" => Some(RecoveryCategory::Parse),
            "write" => Some(RecoveryCategory::Write),
            "repair" => Some(RecoveryCategory::Repair),
            _ => None,
        }
    }
}

/// A single entry in the recovery log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Markdown block as stored in the log
    fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} [{}] {}\n\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.category,
            self.description,
        );

        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }

        if !self.body.is_empty() {
            out.push_str("\n```text\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }

        out.push_str("\n---\n");
        out
    }

    /// Same failure and same raw data, ignoring when it happened
    fn repeats(&self, other: &RecoveryEntry) -> bool {
        self.category == other.category
            && self.description == other.description
            && self.body.trim_end_matches('\n') == other.body.trim_end_matches('\n')
    }

    /// One-line summary for stderr
    pub fn summary(&self) -> String {
        let mut line = format!("{}: {}", self.category, self.description);
        for (key, value) in &self.fields {
            line.push_str(&format!(" ({}: {})", key, value));
        }
        line
    }

    /// Serialize to JSON value for `tl recovery --json`.
    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "category": self.category.to_string(),
            "description": self.description,
            "fields": fields,
            "body": self.body,
        })
    }

    pub fn to_display_markdown(&self) -> String {
        self.to_markdown()
    }
}

// ---------------------------------------------------------------------------
// Log file
// ---------------------------------------------------------------------------

/// The recovery log of one data directory
#[derive(Debug, Clone)]
pub struct RecoveryLog {
    path: PathBuf,
}

impl RecoveryLog {
    pub fn in_dir(dir: &Path) -> Self {
        RecoveryLog {
            path: dir.join(LOG_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry. Errors are swallowed and printed to stderr.
    ///
    /// Raw data is copied in once: an entry whose body repeats one already in
    /// the log is skipped, so a record that stays corrupt does not grow the
    /// log on every load.
    pub fn append(&self, entry: &RecoveryEntry) {
        if let Err(e) = self.append_inner(entry) {
            eprintln!("warning: could not write to recovery log: {}", e);
        }
    }

    fn append_inner(&self, entry: &RecoveryEntry) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        if !entry.body.is_empty() && parse_entries(&existing).iter().any(|e| e.repeats(entry)) {
            return Ok(());
        }
        if existing.len() > MAX_LOG_SIZE {
            let trimmed = trim_oldest(&existing, MAX_LOG_SIZE / 2);
            super::kv::atomic_write(&self.path, trimmed.as_bytes())?;
        }

        let needs_header = fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if needs_header {
            file.write_all(FILE_HEADER.as_bytes())?;
        }
        file.write_all(entry.to_markdown().as_bytes())
    }

    /// Entries, most recent first. `limit` keeps only the newest N.
    pub fn entries(&self, limit: Option<usize>) -> Vec<RecoveryEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        let mut entries = parse_entries(&content);
        if let Some(n) = limit {
            let skip = entries.len().saturating_sub(n);
            entries = entries.split_off(skip);
        }
        entries.reverse();
        entries
    }

    /// Remove entries older than `before` (default: [`PRUNE_AGE_DAYS`]), or
    /// every entry when `all` is set. Returns the number removed.
    pub fn prune(&self, before: Option<DateTime<Utc>>, all: bool) -> io::Result<usize> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let entries = parse_entries(&content);
        let cutoff = if all {
            None
        } else {
            Some(before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS)))
        };
        let (kept, removed): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| cutoff.is_some_and(|c| e.timestamp >= c));

        let mut out = String::from(FILE_HEADER);
        for entry in &kept {
            out.push_str(&entry.to_markdown());
        }
        super::kv::atomic_write(&self.path, out.as_bytes())?;
        Ok(removed.len())
    }
}

/// Record a recovery entry in `dir`'s log, or on stderr when there is no
/// directory to log into.
pub fn report(dir: Option<&Path>, entry: RecoveryEntry) {
    eprintln!("warning: {}", entry.summary());
    if let Some(dir) = dir {
        RecoveryLog::in_dir(dir).append(&entry);
    }
}

/// Rebuild the log keeping only the newest entries that fit in `max` bytes.
/// The newest entry is always kept.
fn trim_oldest(content: &str, max: usize) -> String {
    let blocks: Vec<String> = parse_entries(content)
        .iter()
        .map(RecoveryEntry::to_markdown)
        .collect();
    let mut size = FILE_HEADER.len();
    let mut keep = 0;
    for block in blocks.iter().rev() {
        if keep > 0 && size + block.len() > max {
            break;
        }
        size += block.len();
        keep += 1;
    }
    let mut out = String::from(FILE_HEADER);
    for block in &blocks[blocks.len() - keep..] {
        out.push_str(block);
    }
    out
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let Some((timestamp, category, description)) =
            line.strip_prefix("## ").and_then(parse_entry_header)
        else {
            continue;
        };

        let mut fields = Vec::new();
        let mut body_lines: Vec<&str> = Vec::new();
        let mut in_code_block = false;

        for line in lines.by_ref() {
            if in_code_block {
                if line == "```" {
                    in_code_block = false;
                } else {
                    body_lines.push(line);
                }
                continue;
            }
            if line == "---" {
                break;
            }
            if line.starts_with("```") {
                in_code_block = true;
                continue;
            }
            if let Some((key, value)) = line.trim().split_once(": ") {
                fields.push((key.to_string(), value.to_string()));
            }
        }

        entries.push(RecoveryEntry {
            timestamp,
            category,
            description,
            fields,
            body: body_lines.join("\n"),
        });
    }

    entries
}

/// Parse `<timestamp> [<category>] <description>`
fn parse_entry_header(header: &str) -> Option<(DateTime<Utc>, RecoveryCategory, String)> {
    let (timestamp_str, rest) = header.split_once(" [")?;
    let (category_str, description) = rest.split_once("] ")?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp_str)
        .ok()?
        .with_timezone(&Utc);
    let category = RecoveryCategory::parse_category(category_str)?;
    Some((timestamp, category, description.to_string()))
}
