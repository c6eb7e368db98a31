//! Catalog data model: harvested candidates, merged metadata and persisted entries

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current version of the persisted entry schema
pub const SCHEMA_VERSION: u32 = 1;

/// Author name used when no source resolved one
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Which award list a candidate was harvested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Winner,
    RunnerUp,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Winner => "winner",
            Category::RunnerUp => "runner-up",
        }
    }

    pub fn is_winner(&self) -> bool {
        *self == Category::Winner
    }
}

/// One list item scraped from a yearly index page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingItem {
    pub title: String,
    pub wiki_url: Option<String>,
    pub author: Option<String>,
}

/// Kind of section header found on an index page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Winners,
    RunnersUp,
    Mentions,
    Mordeth,
    Creator,
    Mapper,
}

impl SectionKind {
    /// Only winners and runners-up are turned into candidates
    pub fn is_collected(&self) -> bool {
        matches!(self, SectionKind::Winners | SectionKind::RunnersUp)
    }
}

/// Header seen on an index page, kept for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionHeader {
    pub kind: SectionKind,
    pub text: String,
}

/// Everything harvested from one year's index page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearListing {
    pub winners: Vec<ListingItem>,
    pub runners_up: Vec<ListingItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<SectionHeader>,
}

impl YearListing {
    /// Candidates in page order, winners first
    pub fn candidates(&self, year: i32) -> Vec<Candidate> {
        let winners = self
            .winners
            .iter()
            .map(|item| Candidate::from_item(item, Category::Winner, year));
        let runners_up = self
            .runners_up
            .iter()
            .map(|item| Candidate::from_item(item, Category::RunnerUp, year));
        winners.chain(runners_up).collect()
    }
}

/// Output document of the harvest stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDocument {
    pub scraped_at: String,
    pub years: BTreeMap<i32, YearListing>,
}

/// A listed entry awaiting detail extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub detail_url: Option<String>,
    pub author_guess: Option<String>,
    pub category: Category,
    pub year: i32,
}

impl Candidate {
    pub fn from_item(item: &ListingItem, category: Category, year: i32) -> Self {
        Self {
            title: item.title.clone(),
            detail_url: item.wiki_url.clone(),
            author_guess: item.author.clone(),
            category,
            year,
        }
    }
}

/// Archive search hit captured for a record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMatch {
    pub id: Option<u64>,
    pub filename: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub size: Option<u64>,
}

/// Merged metadata for one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: String,
    pub cacoward_year: i32,
    pub is_winner: bool,
    pub authors: Vec<String>,
    pub wiki_url: Option<String>,
    pub iwad: Option<String>,
    pub port: Option<String>,
    pub year: Option<i32>,
    pub wad_type: Option<String>,
    #[serde(rename = "idgames")]
    pub archive: Option<ArchiveMatch>,
}

/// Output document of the extract stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub scraped_at: String,
    pub total_wads: usize,
    pub wads: Vec<MetadataRecord>,
}

/// Base game a package is built against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Iwad {
    Doom,
    Doom2,
    Plutonia,
    Tnt,
    Heretic,
    Hexen,
    Freedoom1,
    Freedoom2,
}

impl Iwad {
    pub const ALL: [Iwad; 8] = [
        Iwad::Doom,
        Iwad::Doom2,
        Iwad::Plutonia,
        Iwad::Tnt,
        Iwad::Heretic,
        Iwad::Hexen,
        Iwad::Freedoom1,
        Iwad::Freedoom2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Iwad::Doom => "doom",
            Iwad::Doom2 => "doom2",
            Iwad::Plutonia => "plutonia",
            Iwad::Tnt => "tnt",
            Iwad::Heretic => "heretic",
            Iwad::Hexen => "hexen",
            Iwad::Freedoom1 => "freedoom1",
            Iwad::Freedoom2 => "freedoom2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

/// Engine compatibility tier, ordered from least to most demanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePort {
    Vanilla,
    LimitRemoving,
    Boom,
    Mbf21,
    Gzdoom,
}

impl SourcePort {
    pub const ALL: [SourcePort; 5] = [
        SourcePort::Vanilla,
        SourcePort::LimitRemoving,
        SourcePort::Boom,
        SourcePort::Mbf21,
        SourcePort::Gzdoom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePort::Vanilla => "vanilla",
            SourcePort::LimitRemoving => "limit_removing",
            SourcePort::Boom => "boom",
            SourcePort::Mbf21 => "mbf21",
            SourcePort::Gzdoom => "gzdoom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

/// Kind of content package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WadType {
    SingleLevel,
    Episode,
    Megawad,
    GameplayMod,
    TotalConversion,
    ResourcePack,
}

impl WadType {
    pub const ALL: [WadType; 6] = [
        WadType::SingleLevel,
        WadType::Episode,
        WadType::Megawad,
        WadType::GameplayMod,
        WadType::TotalConversion,
        WadType::ResourcePack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WadType::SingleLevel => "single-level",
            WadType::Episode => "episode",
            WadType::Megawad => "megawad",
            WadType::GameplayMod => "gameplay-mod",
            WadType::TotalConversion => "total-conversion",
            WadType::ResourcePack => "resource-pack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadType {
    Idgames,
    Moddb,
    Github,
    Direct,
}

impl DownloadType {
    pub const ALL: [DownloadType; 4] = [
        DownloadType::Idgames,
        DownloadType::Moddb,
        DownloadType::Github,
        DownloadType::Direct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadType::Idgames => "idgames",
            DownloadType::Moddb => "moddb",
            DownloadType::Github => "github",
            DownloadType::Direct => "direct",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AwardType {
    Cacoward,
    RunnerUp,
    Mention,
}

impl AwardType {
    pub const ALL: [AwardType; 3] = [AwardType::Cacoward, AwardType::RunnerUp, AwardType::Mention];

    pub fn as_str(&self) -> &'static str {
        match self {
            AwardType::Cacoward => "cacoward",
            AwardType::RunnerUp => "runner-up",
            AwardType::Mention => "mention",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Slaughter,
    #[default]
    Unknown,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Slaughter,
        Difficulty::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Slaughter => "slaughter",
            Difficulty::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

/// Provenance tag of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Manual,
    IdgamesScraper,
    CacowardsScraper,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Manual, Source::IdgamesScraper, Source::CacowardsScraper];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Manual => "manual",
            Source::IdgamesScraper => "idgames-scraper",
            Source::CacowardsScraper => "cacowards-scraper",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    #[serde(rename = "type")]
    pub kind: DownloadType,
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    #[serde(rename = "type")]
    pub kind: AwardType,
    pub year: i32,
}

/// Persisted catalog entry, one file per slug
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub slug: String,
    pub title: String,
    pub authors: Vec<Author>,
    pub year: i32,
    pub description: String,
    pub iwad: Iwad,
    #[serde(rename = "type")]
    pub wad_type: WadType,
    pub source_port: SourcePort,
    pub requires: Vec<String>,
    pub downloads: Vec<Download>,
    pub thumbnail: String,
    pub screenshots: Vec<String>,
    pub youtube_videos: Vec<String>,
    pub awards: Vec<Award>,
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
    pub notes: String,
    #[serde(rename = "_schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "_source")]
    pub source: Source,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_port_tiers_are_ordered() {
        assert!(SourcePort::Vanilla < SourcePort::LimitRemoving);
        assert!(SourcePort::LimitRemoving < SourcePort::Boom);
        assert!(SourcePort::Boom < SourcePort::Mbf21);
        assert!(SourcePort::Mbf21 < SourcePort::Gzdoom);
    }

    #[test]
    fn test_enum_strings_match_serde() {
        for port in SourcePort::ALL {
            let json = serde_json::to_string(&port).unwrap();
            assert_eq!(json, format!("\"{}\"", port.as_str()));
        }
        for kind in WadType::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        for source in Source::ALL {
            let json = serde_json::to_string(&source).unwrap();
            assert_eq!(json, format!("\"{}\"", source.as_str()));
        }
        assert_eq!(Iwad::parse("tnt"), Some(Iwad::Tnt));
        assert_eq!(Iwad::parse("doom3"), None);
        assert_eq!(AwardType::parse("runner-up"), Some(AwardType::RunnerUp));
    }

    #[test]
    fn test_year_listing_candidates_order() {
        let listing = YearListing {
            winners: vec![ListingItem {
                title: "Ancient Aliens".to_string(),
                wiki_url: Some("https://doomwiki.org/wiki/Ancient_Aliens".to_string()),
                author: Some("skillsaw".to_string()),
            }],
            runners_up: vec![ListingItem {
                title: "Swim With The Whales".to_string(),
                wiki_url: None,
                author: None,
            }],
            sections: Vec::new(),
        };

        let candidates = listing.candidates(2016);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].category, Category::Winner);
        assert_eq!(candidates[0].author_guess.as_deref(), Some("skillsaw"));
        assert_eq!(candidates[1].category, Category::RunnerUp);
        assert_eq!(candidates[1].year, 2016);
    }

    #[test]
    fn test_metadata_record_uses_idgames_key() {
        let record = MetadataRecord {
            title: "Sunlust".to_string(),
            cacoward_year: 2015,
            is_winner: true,
            authors: vec!["Ribbiks".to_string()],
            wiki_url: None,
            iwad: None,
            port: None,
            year: None,
            wad_type: None,
            archive: Some(ArchiveMatch::default()),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("idgames").is_some());
        assert!(value.get("archive").is_none());
    }
}
