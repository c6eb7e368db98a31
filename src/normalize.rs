//! Free-text metadata onto the closed catalog enums

use crate::types::{Iwad, SourcePort, WadType};

// Ordered (substring, value) tables, first match wins. Specific keys sit above generic ones.
const PORT_TABLE: &[(&str, SourcePort)] = &[
    ("vanilla", SourcePort::Vanilla),
    ("limit-removing", SourcePort::LimitRemoving),
    ("limit removing", SourcePort::LimitRemoving),
    ("mbf21-compatible", SourcePort::Mbf21),
    ("mbf21", SourcePort::Mbf21),
    ("boom-compatible", SourcePort::Boom),
    ("boom", SourcePort::Boom),
    ("mbf-compatible", SourcePort::Boom),
    ("mbf", SourcePort::Boom),
    ("gzdoom", SourcePort::Gzdoom),
    ("zdoom", SourcePort::Gzdoom),
    ("lzdoom", SourcePort::Gzdoom),
];

const IWAD_TABLE: &[(&str, Iwad)] = &[
    ("doom ii", Iwad::Doom2),
    ("doom 2", Iwad::Doom2),
    ("the ultimate doom", Iwad::Doom),
    ("ultimate doom", Iwad::Doom),
    ("tnt: evilution", Iwad::Tnt),
    ("tnt evilution", Iwad::Tnt),
    ("the plutonia experiment", Iwad::Plutonia),
    ("plutonia", Iwad::Plutonia),
    ("final doom", Iwad::Doom2),
    ("freedoom phase 1", Iwad::Freedoom1),
    ("freedoom phase 2", Iwad::Freedoom2),
    ("freedoom", Iwad::Freedoom2),
    ("heretic", Iwad::Heretic),
    ("hexen", Iwad::Hexen),
    ("doom", Iwad::Doom),
];

const TYPE_TABLE: &[(&str, WadType)] = &[
    ("megawad", WadType::Megawad),
    ("single level", WadType::SingleLevel),
    ("single-level", WadType::SingleLevel),
    ("episode", WadType::Episode),
    ("partial conversion", WadType::TotalConversion),
    ("total conversion", WadType::TotalConversion),
    ("gameplay mod", WadType::GameplayMod),
    ("weapon mod", WadType::GameplayMod),
    ("standalone", WadType::TotalConversion),
];

const TITLE_KEYWORDS: &[(&str, WadType)] = &[("megawad", WadType::Megawad)];

const DEFAULT_PORT: SourcePort = SourcePort::Boom;
const DEFAULT_IWAD: Iwad = Iwad::Doom2;
const DEFAULT_TYPE: WadType = WadType::Megawad;

fn lookup<T: Copy>(table: &[(&str, T)], text: &str) -> Option<T> {
    let lower = text.to_lowercase();
    table
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, value)| *value)
}

pub fn map_port(text: Option<&str>) -> SourcePort {
    text.and_then(|t| lookup(PORT_TABLE, t))
        .unwrap_or(DEFAULT_PORT)
}

pub fn map_iwad(text: Option<&str>) -> Iwad {
    text.and_then(|t| lookup(IWAD_TABLE, t))
        .unwrap_or(DEFAULT_IWAD)
}

/// Type text first, then keywords in the title
pub fn map_type(text: Option<&str>, title: &str) -> WadType {
    text.and_then(|t| lookup(TYPE_TABLE, t))
        .or_else(|| lookup(TITLE_KEYWORDS, title))
        .unwrap_or(DEFAULT_TYPE)
}

/// URL-safe identifier: lower-case alphanumeric runs joined by single hyphens.
///
/// Returns an empty string for titles without any alphanumeric character.
pub fn derive_identifier(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
