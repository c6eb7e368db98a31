//! Rewrite archive info-page links to verified direct downloads on a mirror

use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::fetch::Transport;
use crate::store::{read_json_file, write_json_file, EntryStore};

/// Substring marking a link to the archive's info page instead of the file
const BROKEN_MARKER: &str = "doomworld.com/idgames/";

static ARCHIVE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://www\.doomworld\.com/idgames/(.+)$").expect("valid regex")
});

pub fn is_broken_url(url: &str) -> bool {
    url.contains(BROKEN_MARKER)
}

pub fn extract_archive_path(url: &str) -> Option<String> {
    ARCHIVE_PATH
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn construct_download_url(mirror_base: &str, path: &str) -> String {
    if path.ends_with(".zip") {
        format!("{}{}", mirror_base, path)
    } else {
        format!("{}{}.zip", mirror_base, path)
    }
}

fn mirror_host(mirror_base: &str) -> &str {
    mirror_base.split('/').nth(2).unwrap_or(mirror_base)
}

/// HEAD the candidate and accept only a 200 carrying archive content
pub fn verify_download_url<T: Transport>(transport: &T, url: &str) -> Result<String, String> {
    let head = transport.head(url).map_err(|e| e.reason())?;
    if head.status != 200 {
        return Err(format!("HTTP {}", head.status));
    }
    let content_type = head.content_type.unwrap_or_default();
    if content_type.contains("zip") || content_type.contains("octet-stream") {
        let size = head
            .content_length
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        Ok(format!("OK ({} bytes)", size))
    } else {
        Err(format!("Wrong Content-Type: {}", content_type))
    }
}

/// Mirror walk settings shared by every entry in a run
pub struct Repairer<'a, T: Transport> {
    pub transport: &'a T,
    pub mirrors: &'a [String],
    pub verify: bool,
    pub delay: Duration,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub fixed: bool,
    pub messages: Vec<String>,
}

impl RepairOutcome {
    pub fn report(&self) -> String {
        if self.messages.is_empty() {
            "OK".to_string()
        } else {
            self.messages.join("; ")
        }
    }
}

impl<'a, T: Transport> Repairer<'a, T> {
    /// First mirror URL that verifies, or the first mirror outright when verification is off
    fn find_mirror(&self, path: &str, messages: &mut Vec<String>) -> Option<String> {
        for mirror in self.mirrors {
            let candidate = construct_download_url(mirror, path);
            if !self.verify {
                return Some(candidate);
            }

            let result = verify_download_url(self.transport, &candidate);
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            match result {
                Ok(detail) => {
                    log::debug!("{}: {}", candidate, detail);
                    messages.push(format!("Mirror OK: {}", mirror_host(mirror)));
                    return Some(candidate);
                }
                Err(reason) => {
                    messages.push(format!("Mirror failed ({}): {}", mirror_host(mirror), reason));
                }
            }
        }
        None
    }

    /// Replace every broken download URL in the entry document in place
    pub fn repair_entry(&self, entry: &mut Value) -> RepairOutcome {
        let mut outcome = RepairOutcome::default();
        let Some(downloads) = entry.get_mut("downloads").and_then(|d| d.as_array_mut()) else {
            outcome.messages.push("No downloads".to_string());
            return outcome;
        };
        if downloads.is_empty() {
            outcome.messages.push("No downloads".to_string());
            return outcome;
        }

        for download in downloads.iter_mut() {
            let url = download
                .get("url")
                .and_then(|u| u.as_str())
                .unwrap_or_default()
                .to_string();
            if !is_broken_url(&url) {
                continue;
            }
            let Some(path) = extract_archive_path(&url) else {
                outcome
                    .messages
                    .push(format!("Could not extract path from: {}", url));
                continue;
            };

            match self.find_mirror(&path, &mut outcome.messages) {
                Some(new_url) => {
                    download["url"] = Value::String(new_url);
                    outcome.fixed = true;
                }
                None => outcome.messages.push("All mirrors failed!".to_string()),
            }
        }
        outcome
    }
}

/// True when any download of the entry document points at the info page
pub fn needs_repair(entry: &Value) -> bool {
    entry
        .get("downloads")
        .and_then(|d| d.as_array())
        .map_or(false, |downloads| {
            downloads.iter().any(|d| {
                d.get("url")
                    .and_then(|u| u.as_str())
                    .map_or(false, is_broken_url)
            })
        })
}

#[derive(Debug, Clone)]
pub struct RepairOptions {
    pub dry_run: bool,
    pub verify: bool,
    pub limit: Option<usize>,
    pub quiet: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            verify: true,
            limit: None,
            quiet: false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairSummary {
    pub total: usize,
    pub needing_repair: usize,
    pub fixed: usize,
    pub failed: usize,
}

fn entry_slug(entry: &Value, path: &Path) -> String {
    entry
        .get("slug")
        .and_then(|s| s.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        })
}

pub fn run_repair<T: Transport>(
    transport: &T,
    config: &Config,
    opts: &RepairOptions,
) -> Result<RepairSummary> {
    println!("idGames URL Fixer");
    println!("{}", "=".repeat(60));
    if opts.dry_run {
        println!("Mode: DRY RUN (no changes will be saved)");
    }
    if !opts.verify {
        println!("Mode: NO VERIFY (skipping HEAD requests)");
    }
    println!();

    let store = EntryStore::new(&config.entries_dir);
    let mut files = store.list()?;
    if let Some(limit) = opts.limit {
        files.truncate(limit);
    }

    let mut pending: Vec<(PathBuf, Value)> = Vec::new();
    for path in &files {
        let entry: Value = match read_json_file(path) {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!("Skipping {}: {:#}", path.display(), e);
                continue;
            }
        };
        if needs_repair(&entry) {
            pending.push((path.clone(), entry));
        }
    }

    let mut summary = RepairSummary {
        total: files.len(),
        needing_repair: pending.len(),
        ..Default::default()
    };
    println!("Total WAD entries: {}", summary.total);
    println!("Need URL fixing: {}", summary.needing_repair);
    println!("{}", "=".repeat(60));

    let repairer = Repairer {
        transport,
        mirrors: &config.mirrors,
        verify: opts.verify,
        delay: config.request_delay(),
    };

    let count = pending.len();
    for (i, (path, mut entry)) in pending.into_iter().enumerate() {
        let slug = entry_slug(&entry, &path);
        let mut outcome = repairer.repair_entry(&mut entry);

        if outcome.fixed && !opts.dry_run {
            if let Err(e) = write_json_file(&path, &entry) {
                outcome.fixed = false;
                outcome.messages.push(format!("Save failed: {:#}", e));
            }
        }

        let status = if outcome.fixed { "✓" } else { "✗" };
        if !opts.quiet || !outcome.fixed {
            println!("[{}/{}] {} {}: {}", i + 1, count, status, slug, outcome.report());
        }
        if outcome.fixed {
            summary.fixed += 1;
        } else {
            summary.failed += 1;
        }
    }

    println!();
    println!("{}", "=".repeat(60));
    println!("Fixed: {}", summary.fixed);
    println!("Failed: {}", summary.failed);
    if opts.dry_run {
        println!("\n(Dry run - no files were modified)");
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockTransport;
    use serde_json::json;
    use std::fs;

    const BROKEN: &str = "https://www.doomworld.com/idgames/levels/doom2/megawads/av";

    fn mirrors() -> Vec<String> {
        vec![
            "https://one.test/idgames/".to_string(),
            "https://two.test/idgames/".to_string(),
            "https://three.test/idgames/".to_string(),
        ]
    }

    fn broken_entry() -> Value {
        json!({
            "slug": "alien-vendetta",
            "title": "Alien Vendetta",
            "downloads": [{"type": "idgames", "url": BROKEN, "filename": "av.zip"}],
            "customField": {"kept": true}
        })
    }

    #[test]
    fn test_broken_url_detection() {
        assert!(is_broken_url(BROKEN));
        assert!(!is_broken_url("https://youfailit.net/pub/idgames/levels/doom2/av.zip"));
        assert_eq!(
            extract_archive_path(BROKEN).as_deref(),
            Some("levels/doom2/megawads/av")
        );
        assert_eq!(extract_archive_path("https://doomworld.com/idgames/x"), None);
    }

    #[test]
    fn test_construct_download_url() {
        assert_eq!(
            construct_download_url("https://m.test/idgames/", "levels/doom2/av"),
            "https://m.test/idgames/levels/doom2/av.zip"
        );
        assert_eq!(
            construct_download_url("https://m.test/idgames/", "levels/doom2/av.zip"),
            "https://m.test/idgames/levels/doom2/av.zip"
        );
    }

    #[test]
    fn test_only_third_mirror_verifies() {
        let mirrors = mirrors();
        let transport = MockTransport::default()
            .with_head("https://one.test/idgames/levels/doom2/megawads/av.zip", 404, "text/html")
            .with_head("https://two.test/idgames/levels/doom2/megawads/av.zip", 200, "text/html")
            .with_head(
                "https://three.test/idgames/levels/doom2/megawads/av.zip",
                200,
                "application/zip",
            );
        let repairer = Repairer {
            transport: &transport,
            mirrors: &mirrors,
            verify: true,
            delay: Duration::ZERO,
        };

        let mut entry = broken_entry();
        let outcome = repairer.repair_entry(&mut entry);
        assert!(outcome.fixed);
        assert_eq!(
            entry["downloads"][0]["url"],
            "https://three.test/idgames/levels/doom2/megawads/av.zip"
        );
        assert_eq!(
            outcome.messages,
            vec![
                "Mirror failed (one.test): HTTP 404",
                "Mirror failed (two.test): Wrong Content-Type: text/html",
                "Mirror OK: three.test",
            ]
        );
        // Unknown keys survive the rewrite
        assert_eq!(entry["customField"]["kept"], true);
        assert_eq!(entry["slug"], "alien-vendetta");
    }

    #[test]
    fn test_no_verify_takes_first_mirror() {
        let mirrors = mirrors();
        let transport = MockTransport::default();
        let repairer = Repairer {
            transport: &transport,
            mirrors: &mirrors,
            verify: false,
            delay: Duration::ZERO,
        };

        let mut entry = broken_entry();
        assert!(repairer.repair_entry(&mut entry).fixed);
        assert_eq!(
            entry["downloads"][0]["url"],
            "https://one.test/idgames/levels/doom2/megawads/av.zip"
        );
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_all_mirrors_fail_leaves_entry_unchanged() {
        let mirrors = mirrors();
        let transport = MockTransport::default();
        let repairer = Repairer {
            transport: &transport,
            mirrors: &mirrors,
            verify: true,
            delay: Duration::ZERO,
        };

        let mut entry = broken_entry();
        let before = entry.clone();
        let outcome = repairer.repair_entry(&mut entry);
        assert!(!outcome.fixed);
        assert_eq!(entry, before);
        assert_eq!(outcome.messages.len(), 4);
        assert_eq!(outcome.messages[3], "All mirrors failed!");
        assert_eq!(transport.request_count(), 3);
    }

    #[test]
    fn test_unextractable_broken_url_is_reported() {
        let mirrors = mirrors();
        let transport = MockTransport::default();
        let repairer = Repairer {
            transport: &transport,
            mirrors: &mirrors,
            verify: true,
            delay: Duration::ZERO,
        };
        let mut entry = json!({"downloads": [{"url": "http://doomworld.com/idgames/"}]});
        let outcome = repairer.repair_entry(&mut entry);
        assert!(!outcome.fixed);
        assert!(outcome.report().starts_with("Could not extract path from"));
    }

    fn repair_config(dir: &Path) -> Config {
        Config {
            entries_dir: dir.to_path_buf(),
            mirrors: mirrors(),
            request_delay_ms: 0,
            ..Config::default()
        }
    }

    #[test]
    fn test_run_repair_writes_fixed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let config = repair_config(dir.path());
        let store = EntryStore::new(dir.path());
        write_json_file(&store.path_for("alien-vendetta"), &broken_entry()).unwrap();
        write_json_file(
            &store.path_for("fine"),
            &json!({"slug": "fine", "downloads": [{"url": "https://one.test/idgames/fine.zip"}]}),
        )
        .unwrap();

        let transport = MockTransport::default().with_head(
            "https://two.test/idgames/levels/doom2/megawads/av.zip",
            200,
            "application/octet-stream",
        );
        let summary = run_repair(&transport, &config, &RepairOptions::default()).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.needing_repair, 1);
        assert_eq!(summary.fixed, 1);

        let saved: Value = read_json_file(&store.path_for("alien-vendetta")).unwrap();
        assert_eq!(
            saved["downloads"][0]["url"],
            "https://two.test/idgames/levels/doom2/megawads/av.zip"
        );
        let keys: Vec<&String> = saved.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["slug", "title", "downloads", "customField"]);
    }

    #[test]
    fn test_run_repair_counts_failed_save_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let config = repair_config(dir.path());
        let store = EntryStore::new(dir.path());
        write_json_file(&store.path_for("alien-vendetta"), &broken_entry()).unwrap();
        let mut second = broken_entry();
        second["slug"] = json!("bvendetta");
        write_json_file(&store.path_for("bvendetta"), &second).unwrap();
        // A directory where the temp file goes makes the first save fail
        fs::create_dir(dir.path().join("alien-vendetta.json.tmp")).unwrap();

        let summary = run_repair(
            &MockTransport::default(),
            &config,
            &RepairOptions {
                verify: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(summary.needing_repair, 2);
        assert_eq!(summary.fixed, 1);
        assert_eq!(summary.failed, 1);

        let untouched: Value = read_json_file(&store.path_for("alien-vendetta")).unwrap();
        assert_eq!(untouched["downloads"][0]["url"], BROKEN);
        let saved: Value = read_json_file(&store.path_for("bvendetta")).unwrap();
        assert_eq!(
            saved["downloads"][0]["url"],
            "https://one.test/idgames/levels/doom2/megawads/av.zip"
        );
    }

    #[test]
    fn test_run_repair_dry_run_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = repair_config(dir.path());
        let store = EntryStore::new(dir.path());
        write_json_file(&store.path_for("alien-vendetta"), &broken_entry()).unwrap();
        let before = fs::read_to_string(store.path_for("alien-vendetta")).unwrap();

        let summary = run_repair(
            &MockTransport::default(),
            &config,
            &RepairOptions {
                dry_run: true,
                verify: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(summary.fixed, 1);
        assert_eq!(fs::read_to_string(store.path_for("alien-vendetta")).unwrap(), before);
    }
}
