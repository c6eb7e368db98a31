//! Schema checks over persisted entry files

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::config::Config;
use crate::store::EntryStore;
use crate::types::{AwardType, Difficulty, DownloadType, Iwad, Source, SourcePort, WadType, SCHEMA_VERSION};

pub const REQUIRED_FIELDS: &[&str] = &[
    "slug",
    "title",
    "authors",
    "year",
    "description",
    "iwad",
    "type",
    "sourcePort",
    "requires",
    "downloads",
    "thumbnail",
    "screenshots",
    "youtubeVideos",
    "awards",
    "tags",
    "difficulty",
    "notes",
    "_schemaVersion",
    "_source",
];

const MAX_TITLE_CHARS: usize = 200;
const ENTRY_YEARS: (i64, i64) = (1993, 2026);
const AWARD_YEARS: (i64, i64) = (1994, 2026);

static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A placeholder link must never count as a usable download
pub fn is_placeholder_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("example.com") || lower.contains("placeholder")
}

fn in_range(value: &Value, (low, high): (i64, i64)) -> bool {
    value.as_i64().map_or(false, |y| (low..=high).contains(&y))
}

fn check_enum(
    entry: &Map<String, Value>,
    field: &str,
    parse: impl Fn(&str) -> bool,
    violations: &mut Vec<Violation>,
) {
    if let Some(value) = entry.get(field) {
        if !value.as_str().map_or(false, &parse) {
            violations.push(Violation::new(field, format!("Invalid {}: {}", field, value)));
        }
    }
}

fn check_downloads(downloads: &Value, violations: &mut Vec<Violation>) {
    let Some(items) = downloads.as_array().filter(|d| !d.is_empty()) else {
        violations.push(Violation::new("downloads", "Downloads must be a non-empty list"));
        return;
    };
    for (i, download) in items.iter().enumerate() {
        let field = format!("downloads[{}]", i);
        if !download.is_object() {
            violations.push(Violation::new(field, "Download is not an object"));
            continue;
        }
        let kind = download.get("type").and_then(|t| t.as_str());
        if kind.and_then(DownloadType::parse).is_none() {
            violations.push(Violation::new(
                format!("{}.type", field),
                format!("Invalid download type: {}", kind.unwrap_or("null")),
            ));
        }
        match download.get("url").and_then(|u| u.as_str()).filter(|u| !u.is_empty()) {
            None => violations.push(Violation::new(format!("{}.url", field), "Missing URL")),
            Some(url) if is_placeholder_url(url) => violations.push(Violation::new(
                format!("{}.url", field),
                format!("Placeholder URL: {}", url),
            )),
            Some(_) => {}
        }
        let has_filename = download
            .get("filename")
            .and_then(|f| f.as_str())
            .map_or(false, |f| !f.is_empty());
        if !has_filename {
            violations.push(Violation::new(format!("{}.filename", field), "Missing filename"));
        }
    }
}

fn check_awards(awards: &Value, violations: &mut Vec<Violation>) {
    let Some(items) = awards.as_array().filter(|a| !a.is_empty()) else {
        violations.push(Violation::new("awards", "Awards must be a non-empty list"));
        return;
    };
    for (i, award) in items.iter().enumerate() {
        let field = format!("awards[{}]", i);
        if !award.is_object() {
            violations.push(Violation::new(field, "Award is not an object"));
            continue;
        }
        let kind = award.get("type").and_then(|t| t.as_str());
        if kind.and_then(AwardType::parse).is_none() {
            violations.push(Violation::new(
                format!("{}.type", field),
                format!("Invalid award type: {}", kind.unwrap_or("null")),
            ));
        }
        let year = award.get("year").unwrap_or(&Value::Null);
        if !in_range(year, AWARD_YEARS) {
            violations.push(Violation::new(
                format!("{}.year", field),
                format!("Invalid award year: {}", year),
            ));
        }
    }
}

/// Every problem with one entry document; an empty list means the entry is valid
pub fn validate_entry(entry: &Value, filename: &str) -> Vec<Violation> {
    let Some(entry) = entry.as_object() else {
        return vec![Violation::new("json", "Entry is not a JSON object")];
    };
    let mut violations = Vec::new();

    for field in REQUIRED_FIELDS {
        if !entry.contains_key(*field) {
            violations.push(Violation::new(*field, format!("Missing required field: {}", field)));
        }
    }

    if let Some(slug) = entry.get("slug") {
        match slug.as_str() {
            Some(slug) => {
                if !SLUG.is_match(slug) {
                    violations.push(Violation::new("slug", format!("Invalid slug format: {}", slug)));
                }
                let expected = format!("{}.json", slug);
                if filename != expected {
                    violations.push(Violation::new(
                        "slug",
                        format!("Filename '{}' doesn't match slug '{}'", filename, slug),
                    ));
                }
            }
            None => violations.push(Violation::new("slug", "Slug is not a string")),
        }
    }

    if let Some(title) = entry.get("title") {
        let length = title.as_str().map(|t| t.chars().count());
        if !length.map_or(false, |n| n > 0 && n <= MAX_TITLE_CHARS) {
            violations.push(Violation::new(
                "title",
                format!("Invalid title length: {}", length.unwrap_or(0)),
            ));
        }
    }

    if let Some(authors) = entry.get("authors") {
        match authors.as_array().filter(|a| !a.is_empty()) {
            None => violations.push(Violation::new("authors", "Authors must be a non-empty list")),
            Some(items) => {
                for (i, author) in items.iter().enumerate() {
                    match author.get("name").and_then(|n| n.as_str()) {
                        None => violations.push(Violation::new(
                            format!("authors[{}]", i),
                            "Author missing 'name' field",
                        )),
                        Some("") => violations.push(Violation::new(
                            format!("authors[{}].name", i),
                            "Author has empty name",
                        )),
                        Some(_) => {}
                    }
                }
            }
        }
    }

    if let Some(year) = entry.get("year") {
        if !in_range(year, ENTRY_YEARS) {
            violations.push(Violation::new("year", format!("Invalid year: {}", year)));
        }
    }

    check_enum(entry, "iwad", |s| Iwad::parse(s).is_some(), &mut violations);
    check_enum(entry, "type", |s| WadType::parse(s).is_some(), &mut violations);
    check_enum(entry, "sourcePort", |s| SourcePort::parse(s).is_some(), &mut violations);

    if let Some(downloads) = entry.get("downloads") {
        check_downloads(downloads, &mut violations);
    }
    if let Some(awards) = entry.get("awards") {
        check_awards(awards, &mut violations);
    }

    check_enum(entry, "difficulty", |s| Difficulty::parse(s).is_some(), &mut violations);
    check_enum(entry, "_source", |s| Source::parse(s).is_some(), &mut violations);

    if let Some(version) = entry.get("_schemaVersion") {
        if version.as_u64() != Some(u64::from(SCHEMA_VERSION)) {
            violations.push(Violation::new(
                "_schemaVersion",
                format!("Invalid _schemaVersion: {}", version),
            ));
        }
    }

    violations
}

/// Read and check one file; an unreadable file or unparseable JSON is a single `json` violation
pub fn validate_file(path: &Path) -> Vec<Violation> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return vec![Violation::new("json", format!("Read error: {}", e))],
    };
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match serde_json::from_str::<Value>(&content) {
        Ok(entry) => validate_entry(&entry, &filename),
        Err(e) => vec![Violation::new("json", format!("JSON parse error: {}", e))],
    }
}

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    file: &'a str,
    field: &'a str,
    message: &'a str,
}

fn write_report(path: &Path, failures: &[(String, Vec<Violation>)]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create report {}", path.display()))?;
    for (file, violations) in failures {
        for v in violations {
            writer.serialize(ReportRow {
                file,
                field: &v.field,
                message: &v.message,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidateSummary {
    pub valid: usize,
    pub invalid: usize,
    pub violations: usize,
}

impl ValidateSummary {
    pub fn total(&self) -> usize {
        self.valid + self.invalid
    }

    pub fn is_ok(&self) -> bool {
        self.invalid == 0
    }
}

pub fn run_validate(config: &Config, report: Option<&Path>) -> Result<ValidateSummary> {
    println!("WAD Entry Validator");
    println!("{}", "=".repeat(50));

    let store = EntryStore::new(&config.entries_dir);
    if !store.dir().exists() {
        anyhow::bail!("{} not found", store.dir().display());
    }
    let files = store.list()?;
    println!("Found {} JSON files\n", files.len());

    let mut summary = ValidateSummary::default();
    let mut failures: Vec<(String, Vec<Violation>)> = Vec::new();

    for path in &files {
        let violations = validate_file(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if violations.is_empty() {
            summary.valid += 1;
            log::debug!("✓ {}", name);
            continue;
        }

        summary.invalid += 1;
        summary.violations += violations.len();
        println!("✗ {}", name);
        for v in &violations {
            println!("    - {}: {}", v.field, v.message);
        }
        failures.push((name, violations));
    }

    println!("\n{}", "=".repeat(50));
    println!("Valid:   {}", summary.valid);
    println!("Invalid: {}", summary.invalid);
    println!("Total:   {}", summary.total());
    if summary.violations > 0 {
        println!("\n{} violations in {} files", summary.violations, summary.invalid);
    }

    if let Some(report) = report {
        write_report(report, &failures)?;
        println!("\nReport written to {}", report.display());
    }

    Ok(summary)
}
