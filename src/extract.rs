//! Detail extraction: wiki infobox + archive search merged into one metadata record

use anyhow::{bail, Context, Result};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::config::Config;
use crate::fetch::{CachedFetcher, Transport, UrlCache};
use crate::store::{read_json_file, write_json_file};
use crate::types::{ArchiveMatch, Candidate, ListingDocument, MetadataDocument, MetadataRecord};
use crate::utils::element_text;

static INFOBOX: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.infobox").expect("valid selector"));
static WIKITABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.wikitable").expect("valid selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("valid selector"));

static AUTHOR_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,&]|et al\.?").expect("valid regex"));
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("valid regex"));
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

fn patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).expect("valid regex"))
        .collect()
}

// Text fallback tables, first match wins within each field
static IWAD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"IWAD[:\s]+([^\n]+)",
        r"for\s+(Doom\s*(?:II|2)?|Heretic|Hexen|TNT|Plutonia|FreeDoom)",
    ])
});
static PORT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"(?:Port|Engine|Requires)[:\s]+([^\n]+)",
        r"(Boom|GZDoom|ZDoom|Vanilla|MBF21|MBF|Limit.removing)[- ]compatible",
    ])
});
static AUTHOR_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| patterns(&[r"Authors?[:\s]+([^\n]+)"]));
static YEAR_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| patterns(&[r"(?:Year|Released?)[:\s]+[^\n]*?\b(19\d{2}|20\d{2})\b"]));
static TYPE_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| patterns(&[r"\bType[:\s]+([^\n]+)"]));

/// Fields recovered from a wiki detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoboxFields {
    pub iwad: Option<String>,
    pub port: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub wad_type: Option<String>,
}

/// Split an author cell into an ordered, duplicate-free list of names
pub fn split_authors(value: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    AUTHOR_SPLIT
        .split(value)
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .filter(|a| seen.insert(a.to_string()))
        .map(|a| a.to_string())
        .collect()
}

fn first_year(text: &str) -> Option<i32> {
    YEAR.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Parse the infobox of a detail page, falling back to page-text patterns
pub fn parse_infobox(html: &str) -> InfoboxFields {
    let document = Html::parse_document(html);

    let table = document
        .select(&INFOBOX)
        .next()
        .or_else(|| document.select(&WIKITABLE).next());
    let Some(table) = table else {
        let text = element_text(&document.root_element());
        return parse_infobox_from_text(&text);
    };

    let mut fields = InfoboxFields::default();
    for row in table.select(&ROW) {
        let cells: Vec<_> = row.select(&CELL).collect();
        if cells.len() < 2 {
            continue;
        }
        let label = element_text(&cells[0]).trim().to_lowercase();
        let value = element_text(&cells[1]).trim().to_string();

        if label.contains("iwad") {
            fields.iwad = Some(value);
        } else if label.contains("port") || label.contains("engine") {
            fields.port = Some(value);
        } else if label.contains("author") {
            fields.authors = split_authors(&value);
        } else if label.contains("year") {
            if let Some(year) = first_year(&value) {
                fields.year = Some(year);
            }
        } else if label.contains("type") {
            fields.wad_type = Some(value);
        }
    }
    fields
}

/// Fallback for pages without a key/value table
pub fn parse_infobox_from_text(text: &str) -> InfoboxFields {
    InfoboxFields {
        iwad: first_capture(&IWAD_PATTERNS, text),
        port: first_capture(&PORT_PATTERNS, text),
        authors: first_capture(&AUTHOR_PATTERNS, text)
            .map(|a| split_authors(&a))
            .unwrap_or_default(),
        year: first_capture(&YEAR_PATTERNS, text).and_then(|y| y.parse().ok()),
        wad_type: first_capture(&TYPE_PATTERNS, text),
    }
}

/// String field of an archive file; numbers are kept as their text
fn text_field(file: &Value, key: &str) -> Option<String> {
    match file.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric field of an archive file, also accepted as a numeric string
fn number_field(file: &Value, key: &str) -> Option<u64> {
    match file.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Capture one archive file. A field of the wrong shape is left empty.
fn archive_match(file: &Value) -> ArchiveMatch {
    ArchiveMatch {
        id: number_field(file, "id"),
        filename: text_field(file, "filename"),
        url: text_field(file, "url"),
        description: text_field(file, "description"),
        author: text_field(file, "author"),
        date: text_field(file, "date"),
        size: number_field(file, "size"),
    }
}

/// Search query text: the title without punctuation
pub fn sanitize_query(title: &str) -> String {
    NON_WORD.replace_all(title, "").trim().to_string()
}

pub fn search_url(archive_api: &str, title: &str) -> String {
    format!(
        "{}?action=search&query={}&type=title&out=json",
        archive_api,
        urlencoding::encode(&sanitize_query(title))
    )
}

/// Files listed under `content.file`, which may be one object or a list
fn archive_files(envelope: &Value) -> Vec<&Value> {
    match envelope.get("content").and_then(|c| c.get("file")) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => Vec::new(),
    }
}

/// Exact case-insensitive title match, else the first result as listed by the API.
///
/// The fallback can pick an unrelated file that merely shares words with the title.
pub fn select_archive_match(envelope: &Value, title: &str) -> Option<ArchiveMatch> {
    let files = archive_files(envelope);
    let title_lower = title.to_lowercase();
    let exact = files.iter().position(|f| {
        f.get("title")
            .and_then(|t| t.as_str())
            .map_or(false, |t| t.to_lowercase() == title_lower)
    });
    let file = files.get(exact.unwrap_or(0))?;
    if !file.is_object() {
        log::warn!("Unreadable archive entry for {}: {}", title, file);
        return None;
    }
    Some(archive_match(file))
}

/// Build the metadata record for one candidate. Never fails; missing sources leave fields empty.
pub fn process_candidate<T: Transport>(
    fetcher: &mut CachedFetcher<'_, T>,
    config: &Config,
    candidate: &Candidate,
) -> MetadataRecord {
    let mut record = MetadataRecord {
        title: candidate.title.clone(),
        cacoward_year: candidate.year,
        is_winner: candidate.category.is_winner(),
        authors: candidate.author_guess.iter().cloned().collect(),
        wiki_url: candidate.detail_url.clone(),
        iwad: None,
        port: None,
        year: None,
        wad_type: None,
        archive: None,
    };

    match &candidate.detail_url {
        Some(url) => match fetcher.fetch(url) {
            Ok(html) => {
                let fields = parse_infobox(&html);
                record.iwad = fields.iwad;
                record.port = fields.port;
                record.year = fields.year;
                record.wad_type = fields.wad_type;
                if !fields.authors.is_empty() {
                    record.authors = fields.authors;
                }
            }
            Err(e) => log::warn!("{}: detail page unavailable ({})", candidate.title, e),
        },
        None => log::warn!("{}: no detail page link", candidate.title),
    }

    let url = search_url(&config.archive_api, &candidate.title);
    let envelope = fetcher
        .fetch(&url)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()));
    match envelope {
        Ok(envelope) => {
            record.archive = select_archive_match(&envelope, &candidate.title);
            if record.archive.is_none() {
                log::warn!("{}: no archive match", candidate.title);
            }
        }
        Err(e) => log::warn!("{}: archive search failed ({})", candidate.title, e),
    }

    if record.authors.is_empty() {
        if let Some(author) = record
            .archive
            .as_ref()
            .and_then(|a| a.author.as_deref())
            .filter(|a| !a.trim().is_empty())
        {
            record.authors = vec![author.trim().to_string()];
        }
    }

    record
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub winners_only: bool,
    pub year: Option<i32>,
    pub limit: Option<usize>,
    pub quiet: bool,
}

/// Candidates in year order, winners before runners-up, first occurrence of a title only
pub fn build_work_list(listing: &ListingDocument, opts: &ExtractOptions) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut work = Vec::new();

    for (year, year_listing) in &listing.years {
        if opts.year.map_or(false, |y| y != *year) {
            continue;
        }
        for candidate in year_listing.candidates(*year) {
            if opts.winners_only && !candidate.category.is_winner() {
                continue;
            }
            if candidate.title.is_empty() || !seen.insert(candidate.title.clone()) {
                continue;
            }
            work.push(candidate);
        }
    }

    if let Some(limit) = opts.limit {
        work.truncate(limit);
    }
    work
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub processed: usize,
    pub winners: usize,
    pub with_archive: usize,
    pub with_iwad: usize,
}

fn write_metadata(config: &Config, wads: &[MetadataRecord]) -> Result<()> {
    let document = MetadataDocument {
        scraped_at: chrono::Utc::now().to_rfc3339(),
        total_wads: wads.len(),
        wads: wads.to_vec(),
    };
    write_json_file(&config.metadata_path(), &document)
}

pub fn run_extract<T: Transport>(
    transport: &T,
    config: &Config,
    opts: &ExtractOptions,
) -> Result<ExtractSummary> {
    println!("WAD Metadata Scraper");
    println!("{}", "=".repeat(50));
    if opts.winners_only {
        println!("Mode: Winners only");
    }
    if let Some(year) = opts.year {
        println!("Mode: Year {} only", year);
    }
    if let Some(limit) = opts.limit {
        println!("Mode: Limited to {} WADs", limit);
    }

    let listing_path = config.listing_path();
    if !listing_path.exists() {
        bail!(
            "{} not found. Run 'harvest' first.",
            listing_path.display()
        );
    }
    let listing: ListingDocument = read_json_file(&listing_path)?;
    let cache = UrlCache::load(&config.metadata_cache_path())
        .context("Failed to load metadata cache")?;
    let mut fetcher = CachedFetcher::new(transport, cache, config.request_delay());
    if !fetcher.cache().is_empty() {
        println!("Resuming with {} cached responses", fetcher.cache().len());
    }

    let work = build_work_list(&listing, opts);
    let total = work.len();
    println!("\nWADs to process: {}", total);
    println!("{}", "=".repeat(50));

    let mut wads: Vec<MetadataRecord> = Vec::with_capacity(total);
    for (i, candidate) in work.iter().enumerate() {
        let index = i + 1;
        if !opts.quiet {
            println!(
                "\n[{}/{}] {} ({}, {})",
                index,
                total,
                candidate.title,
                candidate.year,
                candidate.category.as_str()
            );
        }

        let record = process_candidate(&mut fetcher, config, candidate);
        if !opts.quiet {
            match record.archive.as_ref().and_then(|a| a.filename.as_deref()) {
                Some(filename) => println!("    ✓ idGames: {}", filename),
                None => println!("    ✗ No idGames match"),
            }
            if let Some(iwad) = &record.iwad {
                println!("    ✓ IWAD: {}", iwad);
            }
            if let Some(port) = &record.port {
                println!("    ✓ Port: {}", port);
            }
        }
        wads.push(record);

        if config.checkpoint_every > 0 && index % config.checkpoint_every == 0 {
            fetcher.checkpoint().context("Failed to save metadata cache")?;
            write_metadata(config, &wads)?;
            if !opts.quiet {
                println!("\n--- Cache saved ({}/{}) ---", index, total);
            }
        }
    }

    write_metadata(config, &wads)?;
    fetcher.checkpoint().context("Failed to save metadata cache")?;

    let summary = ExtractSummary {
        processed: wads.len(),
        winners: wads.iter().filter(|w| w.is_winner).count(),
        with_archive: wads.iter().filter(|w| w.archive.is_some()).count(),
        with_iwad: wads.iter().filter(|w| w.iwad.is_some()).count(),
    };

    println!("\n{}", "=".repeat(50));
    println!("Total WADs processed: {}", summary.processed);
    println!("  Winners: {}", summary.winners);
    println!("  Runners-up: {}", summary.processed - summary.winners);
    println!("  With idGames link: {}", summary.with_archive);
    println!("  With IWAD info: {}", summary.with_iwad);
    println!("\nSaved to: {}", config.metadata_path().display());

    Ok(summary)
}
