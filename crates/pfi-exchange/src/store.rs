//! # Exchange store: append-only persistence keyed by exchange id
//!
//! Two implementations:
//!
//! - [`InMemoryExchangeStore`]: `HashMap` behind a tokio `RwLock`, for tests
//!   and throwaway demo runs.
//! - [`FileExchangeStore`]: one JSON-lines file per exchange, one message per
//!   line, `fsync`ed before `append` returns.
//!
//! Stores never validate ordering; the [`Pfi`](crate::Pfi) does that under
//! the exchange lock before appending.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use pfi_types::{ExchangeId, PfiError, ProtocolMessage, Result};
use tokio::{io::AsyncWriteExt, sync::RwLock};

/// Durable, append-only message log per exchange.
#[async_trait]
pub trait ExchangeStore: Send + Sync {
    /// Durably append `message` to its exchange's log.
    async fn append(&self, message: &ProtocolMessage) -> Result<()>;

    /// Every message of `exchange_id` in append order; empty if unknown.
    async fn list(&self, exchange_id: ExchangeId) -> Result<Vec<ProtocolMessage>>;

    /// Ids of every exchange with at least one message.
    async fn exchange_ids(&self) -> Result<Vec<ExchangeId>>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Volatile store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExchangeStore {
    logs: Arc<RwLock<HashMap<ExchangeId, Vec<ProtocolMessage>>>>,
}

impl InMemoryExchangeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExchangeStore for InMemoryExchangeStore {
    async fn append(&self, message: &ProtocolMessage) -> Result<()> {
        self.logs
            .write()
            .await
            .entry(message.exchange_id())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn list(&self, exchange_id: ExchangeId) -> Result<Vec<ProtocolMessage>> {
        Ok(self
            .logs
            .read()
            .await
            .get(&exchange_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn exchange_ids(&self) -> Result<Vec<ExchangeId>> {
        let mut ids: Vec<_> = self.logs.read().await.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// File-backed
// ---------------------------------------------------------------------------

const LOG_EXTENSION: &str = "jsonl";

/// JSON-lines files under one directory, `<exchange_id>.jsonl`.
#[derive(Debug, Clone)]
pub struct FileExchangeStore {
    dir: PathBuf,
}

impl FileExchangeStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage(&dir, &e))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_path(&self, exchange_id: ExchangeId) -> PathBuf {
        self.dir.join(format!("{exchange_id}.{LOG_EXTENSION}"))
    }
}

fn storage(path: &Path, err: &dyn std::fmt::Display) -> PfiError {
    PfiError::Storage {
        reason: format!("{}: {err}", path.display()),
    }
}

#[async_trait]
impl ExchangeStore for FileExchangeStore {
    async fn append(&self, message: &ProtocolMessage) -> Result<()> {
        let path = self.log_path(message.exchange_id());
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| storage(&path, &e))?;
        file.write_all(&line).await.map_err(|e| storage(&path, &e))?;
        file.sync_data().await.map_err(|e| storage(&path, &e))?;
        Ok(())
    }

    async fn list(&self, exchange_id: ExchangeId) -> Result<Vec<ProtocolMessage>> {
        let path = self.log_path(exchange_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage(&path, &e)),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| PfiError::Storage {
                    reason: format!("{}:{}: {e}", path.display(), n + 1),
                })
            })
            .collect()
    }

    async fn exchange_ids(&self) -> Result<Vec<ExchangeId>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| storage(&self.dir, &e))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage(&self.dir, &e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()).map(str::parse::<ExchangeId>) {
                Some(Ok(id)) => ids.push(id),
                _ => tracing::warn!(path = %path.display(), "skipping unrecognised exchange log"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pfi_types::{
        BearerIdentity, CloseData, MessageData, OfferingId, RfqData, SelectedPayin,
        SelectedPayout, Signer,
    };
    use rust_decimal::Decimal;

    use super::*;

    fn signed_rfq() -> ProtocolMessage {
        let customer = BearerIdentity::deterministic(1);
        let pfi = BearerIdentity::deterministic(2);
        ProtocolMessage::rfq(
            customer.did().clone(),
            pfi.did().clone(),
            RfqData {
                offering_id: OfferingId::new("usd-to-kes"),
                payin: SelectedPayin {
                    amount: Decimal::new(100, 0),
                    kind: "USD_BANK_TRANSFER".into(),
                    payment_details: BTreeMap::new(),
                },
                payout: SelectedPayout {
                    kind: "KES_BANK_TRANSFER".into(),
                    payment_details: BTreeMap::new(),
                },
                claims: Vec::new(),
            },
        )
        .signed(&customer)
        .unwrap()
    }

    fn close_for(rfq: &ProtocolMessage) -> ProtocolMessage {
        ProtocolMessage::new(
            rfq.sender().clone(),
            rfq.recipient().clone(),
            rfq.exchange_id(),
            MessageData::Close(CloseData::default()),
        )
    }

    async fn exercise(store: &dyn ExchangeStore) {
        let rfq = signed_rfq();
        let id = rfq.exchange_id();
        assert!(store.list(id).await.unwrap().is_empty());

        store.append(&rfq).await.unwrap();
        store.append(&close_for(&rfq)).await.unwrap();

        let log = store.list(id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], rfq);
        assert!(log[0].verify());
        assert_eq!(log[1].kind(), pfi_types::MessageKind::Close);
        assert_eq!(store.exchange_ids().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn in_memory_appends_in_order() {
        exercise(&InMemoryExchangeStore::new()).await;
    }

    #[tokio::test]
    async fn file_store_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileExchangeStore::open(dir.path()).await.unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let rfq = signed_rfq();
        {
            let store = FileExchangeStore::open(dir.path()).await.unwrap();
            store.append(&rfq).await.unwrap();
        }
        let reopened = FileExchangeStore::open(dir.path()).await.unwrap();
        let log = reopened.list(rfq.exchange_id()).await.unwrap();
        assert_eq!(log, vec![rfq]);
    }

    #[tokio::test]
    async fn file_store_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("garbage.jsonl"), "").unwrap();
        let store = FileExchangeStore::open(dir.path()).await.unwrap();
        assert!(store.exchange_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_line_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileExchangeStore::open(dir.path()).await.unwrap();
        let id = ExchangeId::new();
        std::fs::write(dir.path().join(format!("{id}.jsonl")), "{not json}\n").unwrap();
        assert!(matches!(
            store.list(id).await,
            Err(PfiError::Storage { .. })
        ));
    }
}
