//! Yearly award index pages -> winners / runners-up candidate lists

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::LazyLock;
use url::Url;

use crate::config::Config;
use crate::fetch::{CachedFetcher, Transport, UrlCache};
use crate::store::write_json_file;
use crate::types::{ListingDocument, ListingItem, SectionHeader, SectionKind, YearListing};
use crate::utils::{collapse_whitespace, element_text};

/// Link labels that are site navigation rather than entry titles
const NAV_LABELS: &[&str] = &["edit", "doomworld", "idgames", "github", "moddb"];

/// Author guesses this long are almost certainly a sentence, not a name
const MAX_AUTHOR_LEN: usize = 100;

static CONTENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#mw-content-text").expect("valid selector"));
static BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, h3, ul, ol").expect("valid selector"));
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("valid selector"));

static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid regex"));
static TRAILING_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;:]$").expect("valid regex"));

/// Classify a header by substring; order matters ("runner-up winners" is a runners-up section)
pub fn classify_header(text: &str) -> Option<SectionKind> {
    let lower = text.to_lowercase().replace("[edit]", "");
    let lower = lower.trim();

    if lower.contains("winner") && !lower.contains("runner") {
        Some(SectionKind::Winners)
    } else if lower.contains("runner") {
        Some(SectionKind::RunnersUp)
    } else if lower.contains("mention") || lower.contains("honorable") {
        Some(SectionKind::Mentions)
    } else if lower.contains("mordeth") {
        Some(SectionKind::Mordeth)
    } else if lower.contains("creator") {
        Some(SectionKind::Creator)
    } else if lower.contains("mapper") {
        Some(SectionKind::Mapper)
    } else {
        None
    }
}

/// Take the segment after the first " - ", minus parentheticals and trailing punctuation
pub fn guess_author(full_text: &str) -> Option<String> {
    let segment = full_text.split(" - ").nth(1)?;
    let without_parens = PARENTHESIZED.replace_all(segment.trim(), "");
    let trimmed = without_parens.trim();
    let author = TRAILING_PUNCT.replace(trimmed, "");
    let author = collapse_whitespace(&author);

    if author.is_empty() || author.chars().count() >= MAX_AUTHOR_LEN {
        None
    } else {
        Some(author)
    }
}

/// Absolute URL for a link target, kept only when it points at a wiki article
fn resolve_detail_url(href: &str, base: &Url) -> Option<String> {
    let resolved = base.join(href).ok()?;
    if resolved.path().contains("/wiki/") {
        Some(resolved.to_string())
    } else {
        None
    }
}

fn extract_item(li: ElementRef, base: &Url) -> Option<ListingItem> {
    let link = li.select(&LINK).next()?;
    let title = element_text(&link).trim().to_string();
    if title.is_empty() {
        return None;
    }
    let lower = title.to_lowercase();
    if NAV_LABELS.contains(&lower.as_str()) {
        return None;
    }

    let wiki_url = link
        .value()
        .attr("href")
        .and_then(|href| resolve_detail_url(href, base));
    let author = guess_author(&element_text(&li));

    Some(ListingItem {
        title,
        wiki_url,
        author,
    })
}

/// Scan the content region of one index page. Pure: same HTML, same listing.
pub fn extract_year_listing(html: &str, base: &Url) -> YearListing {
    let document = Html::parse_document(html);
    let mut listing = YearListing::default();

    let Some(content) = document.select(&CONTENT).next() else {
        log::warn!("No content region found on index page");
        return listing;
    };

    let mut current: Option<SectionKind> = None;
    for element in content.select(&BLOCKS) {
        match element.value().name() {
            "h2" | "h3" => {
                let text = collapse_whitespace(&element_text(&element).replace("[edit]", ""));
                current = classify_header(&text);
                if let Some(kind) = current {
                    if !kind.is_collected() {
                        log::debug!("Not collecting section: {}", text);
                    }
                    listing.sections.push(SectionHeader { kind, text });
                }
            }
            _ => {
                let target = match current {
                    Some(SectionKind::Winners) => &mut listing.winners,
                    Some(SectionKind::RunnersUp) => &mut listing.runners_up,
                    _ => continue,
                };
                let items = element
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|child| child.value().name() == "li")
                    .filter_map(|li| extract_item(li, base));
                target.extend(items);
            }
        }
    }

    listing
}

/// Fetch and parse every year; a failed year is recorded as empty.
///
/// The cache is flushed every `checkpoint_every` years; the caller flushes the tail.
pub fn harvest_years<T: Transport>(
    fetcher: &mut CachedFetcher<'_, T>,
    config: &Config,
    base: &Url,
    years: RangeInclusive<i32>,
) -> Result<BTreeMap<i32, YearListing>> {
    let mut years_data = BTreeMap::new();

    for (i, year) in years.enumerate() {
        println!("\nProcessing {}...", year);
        let listing = match fetcher.fetch(&config.index_url(year)) {
            Ok(html) => {
                let listing = extract_year_listing(&html, base);
                println!(
                    "  Found {} winners, {} runners-up",
                    listing.winners.len(),
                    listing.runners_up.len()
                );
                listing
            }
            Err(e) => {
                eprintln!("  Error: {}", e);
                YearListing::default()
            }
        };
        years_data.insert(year, listing);

        if config.checkpoint_every > 0 && (i + 1) % config.checkpoint_every == 0 {
            fetcher.checkpoint().context("Failed to save listing cache")?;
        }
    }

    Ok(years_data)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    pub years: usize,
    pub winners: usize,
    pub runners_up: usize,
}

pub fn run_harvest<T: Transport>(
    transport: &T,
    config: &Config,
    years: RangeInclusive<i32>,
) -> Result<HarvestSummary> {
    println!("Cacowards List Scraper");
    println!("{}", "=".repeat(50));

    let base = Url::parse(&config.wiki_base)
        .with_context(|| format!("Invalid wiki_base: {}", config.wiki_base))?;
    let cache = UrlCache::load(&config.listing_cache_path())
        .context("Failed to load listing cache")?;
    let mut fetcher = CachedFetcher::new(transport, cache, config.request_delay());
    if !fetcher.cache().is_empty() {
        println!("Using {} cached pages", fetcher.cache().len());
    }

    let years_data = harvest_years(&mut fetcher, config, &base, years)?;
    fetcher.checkpoint().context("Failed to save listing cache")?;

    let summary = HarvestSummary {
        years: years_data.len(),
        winners: years_data.values().map(|y| y.winners.len()).sum(),
        runners_up: years_data.values().map(|y| y.runners_up.len()).sum(),
    };

    let document = ListingDocument {
        scraped_at: chrono::Utc::now().to_rfc3339(),
        years: years_data,
    };
    let output = config.listing_path();
    write_json_file(&output, &document)?;

    println!("\n{}", "=".repeat(50));
    println!("Years: {}", summary.years);
    println!("Total winners: {}", summary.winners);
    println!("Total runners-up: {}", summary.runners_up);
    println!("\nSaved to: {}", output.display());

    Ok(summary)
}
