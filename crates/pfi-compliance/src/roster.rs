//! # Sanctions roster: atomic, process-wide snapshot
//!
//! The roster is loaded once from a [`RosterSource`] and held as an immutable
//! [`RosterSnapshot`]. Reloads fetch a complete replacement and swap it in a
//! single atomic pointer store, so screening never observes a half-loaded
//! list. A failed reload leaves the previous snapshot in place.
//!
//! ```text
//!   RosterSource::fetch() ──▶ RosterSnapshot ──ArcSwap::store──▶ readers
//! ```

use std::{io::Read, path::PathBuf, sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pfi_types::{PfiError, Result, RosterSourceConfig, SanctionsEntry};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An immutable, fully loaded roster.
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    entries: Vec<SanctionsEntry>,
    source: String,
    loaded_at: DateTime<Utc>,
}

impl RosterSnapshot {
    #[must_use]
    pub fn new(entries: Vec<SanctionsEntry>, source: impl Into<String>) -> Self {
        Self {
            entries,
            source: source.into(),
            loaded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[SanctionsEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where roster entries come from.
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Human-readable location for logs.
    fn describe(&self) -> String;

    /// Fetch the complete current roster.
    async fn fetch(&self) -> Result<Vec<SanctionsEntry>>;
}

/// A fixed in-memory roster.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    entries: Vec<SanctionsEntry>,
}

impl StaticRoster {
    #[must_use]
    pub fn new(entries: Vec<SanctionsEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl RosterSource for StaticRoster {
    fn describe(&self) -> String {
        format!("static({} entries)", self.entries.len())
    }

    async fn fetch(&self) -> Result<Vec<SanctionsEntry>> {
        Ok(self.entries.clone())
    }
}

/// A CSV roster on local disk.
#[derive(Debug, Clone)]
pub struct CsvFileRoster {
    path: PathBuf,
}

impl CsvFileRoster {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RosterSource for CsvFileRoster {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<SanctionsEntry>> {
        let bytes = tokio::fs::read(&self.path).await?;
        parse_roster_csv(bytes.as_slice())
    }
}

/// A CSV roster downloaded over HTTP(S), e.g. the OFAC SDN list.
#[derive(Debug, Clone)]
pub struct CsvHttpRoster {
    url: String,
    client: reqwest::Client,
}

impl CsvHttpRoster {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RosterSource for CsvHttpRoster {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<SanctionsEntry>> {
        let transport = |e: reqwest::Error| PfiError::Transport {
            reason: format!("{}: {e}", self.url),
        };
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?
            .bytes()
            .await
            .map_err(transport)?;
        parse_roster_csv(body.as_ref())
    }
}

/// Build the source named by configuration.
#[must_use]
pub fn source_from_config(config: &RosterSourceConfig) -> Arc<dyn RosterSource> {
    match config {
        RosterSourceConfig::Url(url) => Arc::new(CsvHttpRoster::new(url.clone())),
        RosterSourceConfig::File(path) => Arc::new(CsvFileRoster::new(path.clone())),
    }
}

// ---------------------------------------------------------------------------
// CSV parsing
// ---------------------------------------------------------------------------

/// OFAC's placeholder for an empty field.
const SDN_EMPTY: &str = "-0-";

/// Column names of the headerless OFAC SDN layout; index 1 is the name.
const SDN_COLUMNS: [&str; 12] = [
    "ent_num",
    "name",
    "sdn_type",
    "program",
    "title",
    "call_sign",
    "vess_type",
    "tonnage",
    "grt",
    "vess_flag",
    "vess_owner",
    "remarks",
];

/// Parse a roster CSV.
///
/// A first row containing a `name` column is treated as a header; the
/// optional `country` column fills [`SanctionsEntry::country`] and every other
/// column lands in metadata. Without such a header the OFAC SDN layout is
/// assumed. Rows without a name are skipped.
pub fn parse_roster_csv<R: Read>(reader: R) -> Result<Vec<SanctionsEntry>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = csv.records();
    let Some(first) = records.next().transpose().map_err(csv_error)? else {
        return Ok(Vec::new());
    };

    let header: Option<Vec<String>> = first
        .iter()
        .any(|f| f.eq_ignore_ascii_case("name"))
        .then(|| first.iter().map(str::to_ascii_lowercase).collect());

    let columns: Vec<String> = match &header {
        Some(cols) => cols.clone(),
        None => SDN_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
    };

    let mut entries = Vec::new();
    let body = if header.is_some() { None } else { Some(Ok(first)) };
    for record in body.into_iter().chain(records) {
        let record = record.map_err(csv_error)?;
        if let Some(entry) = entry_from_record(&columns, &record) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn entry_from_record(columns: &[String], record: &csv::StringRecord) -> Option<SanctionsEntry> {
    let mut name = None;
    let mut entry = SanctionsEntry::new("", "");
    for (i, value) in record.iter().enumerate() {
        if value.is_empty() || value == SDN_EMPTY {
            continue;
        }
        match columns.get(i).map(String::as_str) {
            Some("name") => name = Some(value.to_string()),
            Some("country") => entry.country = value.to_string(),
            Some(col) => entry = entry.with_metadata(col, value),
            None => entry = entry.with_metadata(format!("col{i}"), value),
        }
    }
    entry.name = name?;
    Some(entry)
}

fn csv_error(err: csv::Error) -> PfiError {
    PfiError::RosterUnavailable {
        reason: format!("roster CSV: {err}"),
    }
}

// ---------------------------------------------------------------------------
// SanctionsRoster
// ---------------------------------------------------------------------------

/// Process-wide sanctions roster with lock-free reads.
pub struct SanctionsRoster {
    source: Arc<dyn RosterSource>,
    snapshot: ArcSwapOption<RosterSnapshot>,
}

impl SanctionsRoster {
    /// A roster with nothing loaded yet. Screening fails closed until
    /// [`load`](Self::load) succeeds.
    #[must_use]
    pub fn new(source: Arc<dyn RosterSource>) -> Self {
        Self {
            source,
            snapshot: ArcSwapOption::empty(),
        }
    }

    /// A roster already holding `entries`.
    #[must_use]
    pub fn preloaded(entries: Vec<SanctionsEntry>) -> Self {
        let source = StaticRoster::new(entries.clone());
        let snapshot = RosterSnapshot::new(entries, source.describe());
        Self {
            source: Arc::new(source),
            snapshot: ArcSwapOption::from_pointee(snapshot),
        }
    }

    /// Fetch from the source and publish the result as the current snapshot.
    ///
    /// # Errors
    /// Returns [`PfiError::RosterUnavailable`] if the source fails. The
    /// previous snapshot, if any, stays current.
    pub async fn load(&self) -> Result<Arc<RosterSnapshot>> {
        let origin = self.source.describe();
        let entries = self.source.fetch().await.map_err(|e| {
            tracing::warn!(source = %origin, error = %e, "sanctions roster load failed");
            PfiError::RosterUnavailable {
                reason: e.to_string(),
            }
        })?;
        let snapshot = Arc::new(RosterSnapshot::new(entries, origin));
        self.snapshot.store(Some(Arc::clone(&snapshot)));
        tracing::info!(
            source = %snapshot.source(),
            entries = snapshot.len(),
            "sanctions roster loaded"
        );
        Ok(snapshot)
    }

    /// Wholesale replacement; identical to [`load`](Self::load).
    pub async fn reload(&self) -> Result<Arc<RosterSnapshot>> {
        self.load().await
    }

    /// The snapshot screening currently runs against.
    #[must_use]
    pub fn current_snapshot(&self) -> Option<Arc<RosterSnapshot>> {
        self.snapshot.load_full()
    }

    /// Reload every `interval` until the returned task is aborted.
    pub fn spawn_refresh(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // Failure is logged inside load; the old snapshot stays.
                let _ = self.reload().await;
            }
        })
    }
}

impl std::fmt::Debug for SanctionsRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanctionsRoster")
            .field("source", &self.source.describe())
            .field("loaded", &self.snapshot.load_full().map(|s| s.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Succeeds on the first fetch only.
    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RosterSource for FlakySource {
        fn describe(&self) -> String {
            "flaky".into()
        }

        async fn fetch(&self) -> Result<Vec<SanctionsEntry>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![SanctionsEntry::new("John Doe", "Nowhereland")])
            } else {
                Err(PfiError::Transport {
                    reason: "connection refused".into(),
                })
            }
        }
    }

    #[test]
    fn parses_headered_csv() {
        let csv = "name,country,program\nJohn Doe,Nowhereland,SDGT\n,Empty,X\n";
        let entries = parse_roster_csv(csv.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "John Doe");
        assert_eq!(entries[0].country, "Nowhereland");
        assert_eq!(entries[0].metadata["program"], "SDGT");
    }

    #[test]
    fn parses_headerless_sdn_layout() {
        let csv = "36,\"AEROCARIBBEAN AIRLINES\",-0- ,\"CUBA\",-0- ,-0- ,-0- ,-0- ,-0- ,-0- ,-0- ,-0- \n\
                   173,\"ANGLO-CARIBBEAN CO., LTD.\",-0- ,\"CUBA\",-0- ,-0- ,-0- ,-0- ,-0- ,-0- ,-0- ,-0- \n";
        let entries = parse_roster_csv(csv.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "AEROCARIBBEAN AIRLINES");
        assert_eq!(entries[1].name, "ANGLO-CARIBBEAN CO., LTD.");
        assert_eq!(entries[0].metadata["program"], "CUBA");
        assert!(!entries[0].metadata.contains_key("sdn_type"));
        assert!(!entries[0].has_country());
    }

    #[test]
    fn empty_csv_is_empty_roster() {
        assert!(parse_roster_csv("".as_bytes()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn nothing_loaded_until_load() {
        let roster = SanctionsRoster::new(Arc::new(StaticRoster::new(vec![SanctionsEntry::new(
            "John Doe", "",
        )])));
        assert!(roster.current_snapshot().is_none());
        let snap = roster.load().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(roster.current_snapshot().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_snapshot() {
        let roster = SanctionsRoster::new(Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        }));
        let first = roster.load().await.unwrap();
        let err = roster.reload().await.unwrap_err();
        assert!(matches!(err, PfiError::RosterUnavailable { .. }));
        let current = roster.current_snapshot().unwrap();
        assert!(Arc::ptr_eq(&first, &current));
    }

    #[tokio::test]
    async fn reload_swaps_whole_snapshot() {
        let roster = SanctionsRoster::preloaded(vec![SanctionsEntry::new("A", "")]);
        let before = roster.current_snapshot().unwrap();
        let after = roster.reload().await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.len(), after.len());
        // Readers holding the old snapshot keep a consistent view.
        assert_eq!(before.entries()[0].name, "A");
    }

    #[tokio::test]
    async fn file_source_reads_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"name,country\nJohn Doe,Nowhereland\n").unwrap();
        let roster = SanctionsRoster::new(Arc::new(CsvFileRoster::new(file.path())));
        let snap = roster.load().await.unwrap();
        assert_eq!(snap.entries()[0].country, "Nowhereland");
    }

    #[tokio::test]
    async fn missing_file_is_roster_unavailable() {
        let roster = SanctionsRoster::new(Arc::new(CsvFileRoster::new("/definitely/not/here.csv")));
        assert!(matches!(
            roster.load().await,
            Err(PfiError::RosterUnavailable { .. })
        ));
        assert!(roster.current_snapshot().is_none());
    }
}
