//! Log manifest: which series files exist and how to pick one.
//!
//! The manifest is a JSON object keyed by logical series name (the logger
//! uses the day's start timestamp):
//!
//! ```json
//! {
//!   "2024-01-01 000000": { "data": "2024-01-01 000000.csv", "header": "2024-01-01 000000 header.csv" }
//! }
//! ```
//!
//! Keys keep document order, so [`Selection::First`] is deterministic for a
//! given manifest text.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PipelineError, Result};
use crate::fetch::TextSource;
use crate::location::Location;

/// Length of the timestamp prefix that groups a data file with its header.
const GROUP_KEY_CHARS: usize = 17;

/// File references for one logical series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Ordered mapping of series name to file references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: IndexMap<String, ManifestEntry>,
}

/// Predicate over manifest entries for [`Selection::Predicate`].
pub type EntryPredicate = Arc<dyn Fn(&str, &ManifestEntry) -> bool + Send + Sync>;

/// How to choose one entry from the manifest.
#[derive(Clone, Default)]
pub enum Selection {
    /// First entry with a data file, in document order.
    #[default]
    First,
    /// Last entry with a data file, in document order.
    Last,
    /// The entry with exactly this key.
    Name(String),
    /// First entry whose key starts with this prefix.
    Prefix(String),
    /// First entry the predicate accepts.
    Predicate(EntryPredicate),
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selection({self})")
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::First => write!(f, "first"),
            Selection::Last => write!(f, "last"),
            Selection::Name(name) => write!(f, "name:{name}"),
            Selection::Prefix(prefix) => write!(f, "prefix:{prefix}"),
            Selection::Predicate(_) => write!(f, "predicate"),
        }
    }
}

impl FromStr for Selection {
    type Err = String;

    /// Short format: `first`, `last`, `name:<key>`, `prefix:<prefix>`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "first" => Ok(Selection::First),
            "last" => Ok(Selection::Last),
            _ => {
                if let Some(name) = s.strip_prefix("name:") {
                    Ok(Selection::Name(name.to_string()))
                } else if let Some(prefix) = s.strip_prefix("prefix:") {
                    Ok(Selection::Prefix(prefix.to_string()))
                } else {
                    Err(format!(
                        "unknown selection: {s}, expected first, last, name:<key> or prefix:<prefix>"
                    ))
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Manifest {
    /// Parse manifest JSON. The top level must be a non-empty object whose
    /// values are objects.
    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(text)
            .map_err(|e| PipelineError::MalformedManifest(e.to_string()))?;
        if manifest.entries.is_empty() {
            return Err(PipelineError::MalformedManifest(
                "manifest has no entries".to_string(),
            ));
        }
        Ok(manifest)
    }

    pub fn entries(&self) -> &IndexMap<String, ManifestEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick an entry. Every strategy except [`Selection::Name`] ignores
    /// entries without a data file; naming such an entry is an error.
    pub fn select(&self, selection: &Selection) -> Result<(&str, &ManifestEntry)> {
        let mut usable = self.entries.iter().filter(|(_, e)| e.data.is_some());

        let found = match selection {
            Selection::First => usable.next(),
            Selection::Last => usable.next_back(),
            Selection::Prefix(prefix) => usable.find(|(k, _)| k.starts_with(prefix.as_str())),
            Selection::Predicate(pred) => usable.find(|&(k, e)| pred(k.as_str(), e)),
            Selection::Name(name) => {
                let entry = self.entries.get_key_value(name).ok_or_else(|| {
                    PipelineError::MalformedManifest(format!("no entry named {name:?}"))
                })?;
                if entry.1.data.is_none() {
                    return Err(PipelineError::MalformedManifest(format!(
                        "entry {name:?} has no data file"
                    )));
                }
                Some(entry)
            }
        };

        found.map(|(k, e)| (k.as_str(), e)).ok_or_else(|| {
            PipelineError::MalformedManifest(format!(
                "no entry with a data file matches selection {selection}"
            ))
        })
    }

    /// Build a manifest from the `.csv` files in a logs directory.
    ///
    /// Files are grouped by the first 17 characters of their name (the
    /// logger's `YYYY-MM-DD HHMMSS` prefix). Names containing `header` are
    /// the group's header, any other name is its data file. Groups appear
    /// in file name order.
    pub fn from_logs_dir(dir: &Path) -> std::io::Result<Self> {
        let mut names: Vec<String> = std::fs::read_dir(dir)?
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.file_name()),
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .filter_map(|name| match name.into_string() {
                Ok(name) => Some(name),
                Err(raw) => {
                    tracing::debug!(name = ?raw, "Skipping non UTF-8 file name");
                    None
                }
            })
            .filter(|name| name.contains(".csv"))
            .collect();
        names.sort();

        let mut entries: IndexMap<String, ManifestEntry> = IndexMap::new();
        for name in names {
            let key: String = name.chars().take(GROUP_KEY_CHARS).collect();
            let entry = entries.entry(key).or_default();
            if name.contains("header") {
                entry.header = Some(name);
            } else {
                entry.data = Some(name);
            }
        }

        tracing::debug!(dir = %dir.display(), entries = entries.len(), "Built manifest");
        Ok(Self { entries })
    }

    /// Two-space indented JSON, the form served at `/logs/manifest.json`.
    pub fn to_json_pretty(&self) -> String {
        // A string-keyed map of optional strings always serializes.
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// The chosen entry with its references resolved against the manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedEntry {
    pub name: String,
    pub data: Location,
    pub header: Option<Location>,
}

impl Manifest {
    /// Select an entry and resolve its references against `base`, the
    /// location the manifest itself was (or would be) served from.
    pub fn resolve_entry(&self, selection: &Selection, base: &Location) -> Result<ResolvedEntry> {
        let (name, entry) = self.select(selection)?;

        // select() only returns entries with a data reference.
        let data_ref = entry.data.as_deref().ok_or_else(|| {
            PipelineError::MalformedManifest(format!("entry {name:?} has no data file"))
        })?;
        let data = base.join(data_ref)?;
        let header = entry.header.as_deref().map(|h| base.join(h)).transpose()?;

        Ok(ResolvedEntry {
            name: name.to_string(),
            data,
            header,
        })
    }
}

/// Fetch the manifest at `manifest_location`, select an entry and resolve
/// its file references.
pub async fn resolve<S: TextSource>(
    source: &S,
    manifest_location: &Location,
    selection: &Selection,
) -> Result<ResolvedEntry> {
    let text = source.fetch_text(manifest_location).await?;
    let manifest = Manifest::parse(&text)?;
    let resolved = manifest.resolve_entry(selection, manifest_location)?;

    tracing::info!(
        manifest = %manifest_location,
        entries = manifest.len(),
        selected = %resolved.name,
        %selection,
        data = %resolved.data,
        "Resolved manifest entry"
    );

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::MemorySource;
    use std::fs;

    const TWO: &str = r#"{"a": {"data": "x.csv"}, "b": {"data": "y.csv"}}"#;

    #[test]
    fn test_first_key_in_document_order() {
        let manifest = Manifest::parse(TWO).unwrap();
        let (name, entry) = manifest.select(&Selection::First).unwrap();
        assert_eq!(name, "a");
        assert_eq!(entry.data.as_deref(), Some("x.csv"));

        // Same text, same answer.
        for _ in 0..10 {
            let again = Manifest::parse(TWO).unwrap();
            assert_eq!(again.select(&Selection::First).unwrap().0, "a");
        }
    }

    #[test]
    fn test_order_is_document_order_not_sorted() {
        let manifest =
            Manifest::parse(r#"{"zeta": {"data": "z.csv"}, "alpha": {"data": "a.csv"}}"#).unwrap();
        assert_eq!(manifest.select(&Selection::First).unwrap().0, "zeta");
        assert_eq!(manifest.select(&Selection::Last).unwrap().0, "alpha");
    }

    #[test]
    fn test_select_by_name_prefix_and_predicate() {
        let manifest = Manifest::parse(TWO).unwrap();
        assert_eq!(
            manifest
                .select(&Selection::Name("b".to_string()))
                .unwrap()
                .1
                .data
                .as_deref(),
            Some("y.csv")
        );
        assert_eq!(
            manifest.select(&Selection::Prefix("b".to_string())).unwrap().0,
            "b"
        );
        let pred: EntryPredicate = Arc::new(|_, e| e.data.as_deref() == Some("y.csv"));
        assert_eq!(manifest.select(&Selection::Predicate(pred)).unwrap().0, "b");
    }

    #[test]
    fn test_select_skips_header_only_entries() {
        let manifest = Manifest::parse(
            r#"{"h": {"header": "h header.csv"}, "d": {"data": "d.csv", "header": "d header.csv"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.select(&Selection::First).unwrap().0, "d");

        let err = manifest
            .select(&Selection::Name("h".to_string()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedManifest(_)));
    }

    #[test]
    fn test_select_no_match() {
        let manifest = Manifest::parse(TWO).unwrap();
        for selection in [
            Selection::Name("missing".to_string()),
            Selection::Prefix("q".to_string()),
        ] {
            assert!(matches!(
                manifest.select(&selection),
                Err(PipelineError::MalformedManifest(_))
            ));
        }
    }

    #[test]
    fn test_malformed_manifests() {
        for text in ["", "[]", "{}", r#"{"a": 5}"#, r#"{"a": {"data": 5}}"#, "not json"] {
            assert!(
                matches!(Manifest::parse(text), Err(PipelineError::MalformedManifest(_))),
                "{text:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_selection_from_str() {
        assert!(matches!("first".parse::<Selection>(), Ok(Selection::First)));
        assert!(matches!("last".parse::<Selection>(), Ok(Selection::Last)));
        assert!(matches!("name:a".parse::<Selection>(), Ok(Selection::Name(n)) if n == "a"));
        assert!(matches!(
            "prefix:2024-".parse::<Selection>(),
            Ok(Selection::Prefix(p)) if p == "2024-"
        ));
        assert!("newest".parse::<Selection>().is_err());
        assert_eq!(Selection::Name("a".to_string()).to_string(), "name:a");
    }

    #[test]
    fn test_from_logs_dir_groups_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "2024-01-02 000003.csv",
            "2024-01-01 000001 header.csv",
            "2024-01-01 000001.csv",
            "2024-01-02 000003 header.csv",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        let manifest = Manifest::from_logs_dir(dir.path()).unwrap();
        let keys: Vec<&str> = manifest.entries().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["2024-01-01 000001", "2024-01-02 000003"]);

        let first = &manifest.entries()["2024-01-01 000001"];
        assert_eq!(first.data.as_deref(), Some("2024-01-01 000001.csv"));
        assert_eq!(first.header.as_deref(), Some("2024-01-01 000001 header.csv"));
    }

    #[test]
    fn test_manifest_json_round_trips_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2024-01-01 000001.csv"), "").unwrap();
        fs::write(dir.path().join("2024-01-02 000001.csv"), "").unwrap();

        let json = Manifest::from_logs_dir(dir.path()).unwrap().to_json_pretty();
        assert!(json.starts_with("{\n  \"2024-01-01 000001\": {\n    \"data\""));
        let parsed = Manifest::parse(&json).unwrap();
        assert_eq!(parsed.select(&Selection::First).unwrap().0, "2024-01-01 000001");
    }

    #[test]
    fn test_from_logs_dir_missing_directory() {
        assert!(Manifest::from_logs_dir(Path::new("/nonexistent/bandwidth/logs")).is_err());
    }

    #[tokio::test]
    async fn test_resolve_joins_against_manifest_location() {
        let source = MemorySource::default().with(
            "/srv/logs/manifest.json",
            r#"{"day": {"data": "day.csv", "header": "day header.csv"}}"#,
        );
        let resolved = resolve(
            &source,
            &Location::parse("/srv/logs/manifest.json").unwrap(),
            &Selection::First,
        )
        .await
        .unwrap();

        assert_eq!(resolved.name, "day");
        assert_eq!(resolved.data.to_string(), "/srv/logs/day.csv");
        assert_eq!(
            resolved.header.map(|h| h.to_string()).as_deref(),
            Some("/srv/logs/day header.csv")
        );
    }

    #[tokio::test]
    async fn test_resolve_missing_manifest_is_unavailable() {
        let source = MemorySource::default();
        let err = resolve(
            &source,
            &Location::parse("/srv/logs/manifest.json").unwrap(),
            &Selection::First,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::ResourceUnavailable { .. }));
    }
}
