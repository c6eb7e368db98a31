//! Metadata records into persisted catalog entries

use anyhow::{bail, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::config::Config;
use crate::normalize::{derive_identifier, map_iwad, map_port, map_type};
use crate::store::{read_json_file, write_json_file, EntryStore};
use crate::types::{
    Author, Award, AwardType, Difficulty, Download, DownloadType, Entry, MetadataDocument,
    MetadataRecord, Source, SCHEMA_VERSION, UNKNOWN_AUTHOR,
};
use crate::utils::{collapse_whitespace, osc8_file_link, truncate_chars};

/// Release year used when neither the record nor the award carries one
pub const EPOCH_YEAR: i32 = 2000;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// Strip markup, collapse whitespace and cut to `limit` characters
pub fn clean_description(raw: &str, limit: usize) -> String {
    let text = HTML_TAG.replace_all(raw, " ");
    truncate_chars(&collapse_whitespace(&text), limit)
}

fn placeholder_description(record: &MetadataRecord) -> String {
    let category = if record.is_winner {
        "winner"
    } else {
        "runner-up"
    };
    format!(
        "{} - Cacoward {} {}",
        record.title, category, record.cacoward_year
    )
}

pub fn placeholder_download(slug: &str) -> Download {
    Download {
        kind: DownloadType::Direct,
        url: format!("https://example.com/{}.zip", slug),
        filename: format!("{}.zip", slug),
    }
}

/// Assemble the entry for a record under an already derived identifier
pub fn build_entry(record: &MetadataRecord, slug: &str, description_limit: usize) -> Entry {
    let mut authors: Vec<Author> = record
        .authors
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(|a| Author {
            name: a.to_string(),
        })
        .collect();
    if authors.is_empty() {
        authors.push(Author {
            name: UNKNOWN_AUTHOR.to_string(),
        });
    }

    let year = record
        .year
        .or(Some(record.cacoward_year).filter(|y| *y > 0))
        .unwrap_or(EPOCH_YEAR);

    let description = record
        .archive
        .as_ref()
        .and_then(|a| a.description.as_deref())
        .map(|d| clean_description(d, description_limit))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| placeholder_description(record));

    let download = match record
        .archive
        .as_ref()
        .and_then(|a| a.url.as_deref().filter(|u| !u.is_empty()).map(|u| (a, u)))
    {
        Some((archive, url)) => Download {
            kind: DownloadType::Idgames,
            url: url.to_string(),
            filename: archive
                .filename
                .clone()
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| format!("{}.zip", slug)),
        },
        None => placeholder_download(slug),
    };

    let award_kind = if record.is_winner {
        AwardType::Cacoward
    } else {
        AwardType::RunnerUp
    };

    Entry {
        slug: slug.to_string(),
        title: record.title.clone(),
        authors,
        year,
        description,
        iwad: map_iwad(record.iwad.as_deref()),
        wad_type: map_type(record.wad_type.as_deref(), &record.title),
        source_port: map_port(record.port.as_deref()),
        requires: Vec::new(),
        downloads: vec![download],
        thumbnail: String::new(),
        screenshots: Vec::new(),
        youtube_videos: Vec::new(),
        awards: vec![Award {
            kind: award_kind,
            year: record.cacoward_year,
        }],
        tags: Vec::new(),
        difficulty: Difficulty::default(),
        notes: String::new(),
        schema_version: SCHEMA_VERSION,
        source: Source::CacowardsScraper,
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub limit: Option<usize>,
    pub dry_run: bool,
    pub overwrite: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateSummary {
    pub created: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub fn run_generate(config: &Config, opts: &GenerateOptions) -> Result<GenerateSummary> {
    let metadata_path = config.metadata_path();
    if !metadata_path.exists() {
        bail!(
            "{} not found. Run 'extract' first.",
            metadata_path.display()
        );
    }
    let document: MetadataDocument = read_json_file(&metadata_path)?;
    let store = EntryStore::new(&config.entries_dir);

    let records: Vec<&MetadataRecord> = match opts.limit {
        Some(limit) => document.wads.iter().take(limit).collect(),
        None => document.wads.iter().collect(),
    };
    let total = records.len();

    println!("Generating WAD entries");
    println!("{}", "=".repeat(50));
    println!("Records: {}", total);
    if opts.dry_run {
        println!("Mode: Dry run (nothing is written)");
    }
    println!("Output: {}\n", store.dir().display());

    let mut summary = GenerateSummary::default();
    let mut claimed: HashSet<String> = HashSet::new();

    for (i, record) in records.iter().enumerate() {
        let index = i + 1;
        let slug = derive_identifier(&record.title);
        if slug.is_empty() {
            eprintln!("[{}/{}] ✗ {}: title yields an empty slug", index, total, record.title);
            summary.errors += 1;
            continue;
        }
        if !claimed.insert(slug.clone()) {
            eprintln!(
                "[{}/{}] ✗ {}: slug '{}' already used in this run",
                index, total, record.title, slug
            );
            summary.errors += 1;
            continue;
        }
        if store.exists(&slug) && !opts.overwrite {
            println!("[{}/{}] - {} (exists, skipped)", index, total, slug);
            summary.skipped += 1;
            continue;
        }

        let entry = build_entry(record, &slug, config.description_limit);
        let path = store.path_for(&slug);
        if opts.dry_run {
            println!("[{}/{}] ✓ {} (dry run)", index, total, slug);
            summary.created += 1;
            continue;
        }
        match write_json_file(&path, &entry) {
            Ok(()) => {
                println!(
                    "[{}/{}] ✓ {}",
                    index,
                    total,
                    osc8_file_link(&path, &slug)
                );
                summary.created += 1;
            }
            Err(e) => {
                eprintln!("[{}/{}] ✗ {}: {:#}", index, total, slug, e);
                summary.errors += 1;
            }
        }
    }

    println!("\n{}", "=".repeat(50));
    println!("Created: {}", summary.created);
    println!("Skipped: {}", summary.skipped);
    println!("Errors: {}", summary.errors);

    Ok(summary)
}
