//! Flat key-value persistence for saved clients and invoice history.
//!
//! Each collection lives under one key as a JSON array and is rewritten as a
//! whole on every change. Entries the change does not touch are written back
//! exactly as they were read.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::value::{RawValue, to_raw_value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{Client, InvoiceDraft, InvoiceRecord};

pub const CLIENTS_KEY: &str = "invoiceClients";
pub const HISTORY_KEY: &str = "invoiceHistory";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!(key, path = %path.display(), "collection written");
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Millisecond timestamp id, kept above every id already in the collection.
fn next_id(now: DateTime<Utc>, existing: impl Iterator<Item = i64>) -> i64 {
    let candidate = now.timestamp_millis();
    match existing.max() {
        Some(max) if max >= candidate => max + 1,
        _ => candidate,
    }
}

#[derive(Deserialize)]
struct EntryId {
    #[serde(default)]
    id: i64,
}

fn corrupt(key: &str) -> impl FnOnce(serde_json::Error) -> Error + '_ {
    move |source| Error::CorruptStore {
        key: key.to_string(),
        source,
    }
}

/// One stored entry, untouched.
struct Entry {
    id: i64,
    raw: Box<RawValue>,
}

#[derive(Debug)]
pub struct Persistence<S> {
    store: S,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Persistence { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn read_entries(&self, key: &str) -> Result<Vec<Entry>> {
        let raw = match self.store.get(key)? {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Ok(Vec::new()),
        };
        let entries: Vec<Box<RawValue>> = serde_json::from_str(&raw).map_err(corrupt(key))?;
        entries
            .into_iter()
            .map(|raw| -> Result<Entry> {
                let EntryId { id } = serde_json::from_str(raw.get()).map_err(corrupt(key))?;
                Ok(Entry { id, raw })
            })
            .collect()
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        self.read_entries(key)?
            .iter()
            .map(|e| serde_json::from_str(e.raw.get()).map_err(corrupt(key)))
            .collect()
    }

    fn write(&mut self, key: &str, entries: Vec<Entry>) -> Result<()> {
        let raws: Vec<Box<RawValue>> = entries.into_iter().map(|e| e.raw).collect();
        let raw = serde_json::to_string(&raws)?;
        self.store.set(key, &raw)
    }

    fn remove(&mut self, key: &str, id: i64) -> Result<bool> {
        let mut entries = self.read_entries(key)?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.write(key, entries)?;
        Ok(true)
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        self.read(CLIENTS_KEY)
    }

    pub fn save_client(&mut self, draft: &InvoiceDraft) -> Result<Client> {
        self.save_client_at(draft, Utc::now())
    }

    fn save_client_at(&mut self, draft: &InvoiceDraft, now: DateTime<Utc>) -> Result<Client> {
        if draft.client_name.trim().is_empty() {
            return Err(Error::MissingClientName);
        }
        let mut clients = self.read_entries(CLIENTS_KEY)?;
        let id = next_id(now, clients.iter().map(|e| e.id));
        let client = Client::from_draft(id, draft);
        clients.push(Entry { id, raw: to_raw_value(&client)? });
        self.write(CLIENTS_KEY, clients)?;
        info!(id, name = %client.name, "client saved");
        Ok(client)
    }

    pub fn delete_client(&mut self, id: i64) -> Result<bool> {
        let removed = self.remove(CLIENTS_KEY, id)?;
        if removed {
            info!(id, "client deleted");
        }
        Ok(removed)
    }

    /// Newest first. Fields an older record lacks come back defaulted.
    pub fn list_invoices(&self) -> Result<Vec<InvoiceRecord>> {
        self.read(HISTORY_KEY)
    }

    pub fn save_invoice(&mut self, draft: &InvoiceDraft) -> Result<InvoiceRecord> {
        self.save_invoice_at(draft, Utc::now())
    }

    fn save_invoice_at(&mut self, draft: &InvoiceDraft, now: DateTime<Utc>) -> Result<InvoiceRecord> {
        let mut history = self.read_entries(HISTORY_KEY)?;
        let id = next_id(now, history.iter().map(|e| e.id));
        let record = InvoiceRecord::snapshot(id, draft, now);
        history.insert(0, Entry { id, raw: to_raw_value(&record)? });
        self.write(HISTORY_KEY, history)?;
        info!(id, number = %record.draft.invoice_number, total = record.total, "invoice saved");
        Ok(record)
    }

    pub fn load_invoice(&self, id: i64) -> Result<InvoiceRecord> {
        self.list_invoices()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(Error::NotFound { kind: "Invoice", id })
    }

    pub fn delete_invoice(&mut self, id: i64) -> Result<bool> {
        let removed = self.remove(HISTORY_KEY, id)?;
        if removed {
            info!(id, "invoice deleted");
        }
        Ok(removed)
    }
}
