//! Persistent application state: the scored history, the manual-entry form
//! and the last uploaded CSV text.
//!
//! The store loads its snapshot once when opened and writes it back after
//! every mutation. Callers only get shared references to the data; all writes
//! go through the named mutation methods.

use crate::error::Result;
use crate::schema::{CanonicalRow, PeriodResult, Quarter};
use crate::service::BestChoiceRequest;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_YEAR: i32 = 2024;

/// Manual-entry form values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub year: i32,
    pub quarter: Quarter,
    pub marketing_revenue: f64,
    pub marketing_spend: f64,
    pub rnd_revenue: f64,
    pub rnd_spend: f64,
    pub ops_revenue: f64,
    pub ops_spend: f64,
    pub budget: f64,
    pub risk_aversion: f64,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            year: DEFAULT_YEAR,
            quarter: Quarter::Q1,
            marketing_revenue: 0.0,
            marketing_spend: 0.0,
            rnd_revenue: 0.0,
            rnd_spend: 0.0,
            ops_revenue: 0.0,
            ops_spend: 0.0,
            budget: 0.0,
            risk_aversion: 0.5,
        }
    }
}

impl FormState {
    pub fn period_label(&self) -> String {
        format!("{} {}", self.year, self.quarter)
    }

    pub fn to_request(&self) -> BestChoiceRequest {
        BestChoiceRequest {
            marketing_revenue: self.marketing_revenue,
            rnd_revenue: self.rnd_revenue,
            ops_revenue: self.ops_revenue,
            marketing_spend: self.marketing_spend,
            rnd_spend: self.rnd_spend,
            ops_spend: self.ops_spend,
            budget: self.budget,
        }
    }

    /// Prefills the form from an ingested row; a zero year falls back to
    /// [`DEFAULT_YEAR`]. Risk aversion is not part of the table and is left as is.
    pub fn prefill_from(&mut self, row: &CanonicalRow) {
        self.year = if row.year != 0 { row.year } else { DEFAULT_YEAR };
        self.quarter = row.quarter;
        self.marketing_revenue = row.marketing_revenue;
        self.marketing_spend = row.marketing_spend;
        self.rnd_revenue = row.rnd_revenue;
        self.rnd_spend = row.rnd_spend;
        self.ops_revenue = row.ops_revenue;
        self.ops_spend = row.ops_spend;
        self.budget = row.budget;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub form: FormState,
    #[serde(default)]
    pub csv_text: Option<String>,
    #[serde(default)]
    pub history: Vec<PeriodResult>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

pub trait SnapshotStorage {
    fn load(&self) -> Result<Option<StoreSnapshot>>;
    fn save(&self, snapshot: &StoreSnapshot) -> Result<()>;
}

/// Pretty-printed JSON snapshot on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<StoreSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(snapshot)?)?;
        Ok(())
    }
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    saved: RefCell<Option<StoreSnapshot>>,
    saves: RefCell<usize>,
}

impl MemoryStorage {
    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            saved: RefCell::new(Some(snapshot)),
            saves: RefCell::new(0),
        }
    }

    pub fn saved(&self) -> Option<StoreSnapshot> {
        self.saved.borrow().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.borrow()
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self) -> Result<Option<StoreSnapshot>> {
        Ok(self.saved.borrow().clone())
    }

    fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        *self.saved.borrow_mut() = Some(snapshot.clone());
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}

/// What an upsert did to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Appended,
    Replaced(usize),
}

pub struct HistoryStore<S: SnapshotStorage> {
    storage: S,
    state: StoreSnapshot,
}

impl<S: SnapshotStorage> HistoryStore<S> {
    /// Restores the persisted snapshot. An unreadable snapshot is logged and
    /// the store starts empty.
    pub fn open(storage: S) -> Self {
        let state = match storage.load() {
            Ok(Some(snapshot)) => {
                debug!("Restored {} history entries", snapshot.history.len());
                snapshot
            }
            Ok(None) => StoreSnapshot::default(),
            Err(e) => {
                warn!("Discarding unreadable store snapshot: {}", e);
                StoreSnapshot::default()
            }
        };
        Self { storage, state }
    }

    pub fn history(&self) -> &[PeriodResult] {
        &self.state.history
    }

    pub fn form(&self) -> &FormState {
        &self.state.form
    }

    pub fn csv_text(&self) -> Option<&str> {
        self.state.csv_text.as_deref()
    }

    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.state
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn find(&self, period_label: &str) -> Option<&PeriodResult> {
        self.state
            .history
            .iter()
            .find(|h| h.period_label == period_label)
    }

    pub fn append(&mut self, item: PeriodResult) -> Result<()> {
        let mut next = self.state.clone();
        next.history.push(item);
        self.commit(next)
    }

    /// Replaces the entry with the same label in place. Returns `false` and
    /// leaves the history untouched when no entry matches.
    pub fn replace_by_label(&mut self, item: PeriodResult) -> Result<bool> {
        let Some(index) = self.position(&item.period_label) else {
            return Ok(false);
        };
        let mut next = self.state.clone();
        next.history[index] = item;
        self.commit(next)?;
        Ok(true)
    }

    /// Replace when the label exists, append otherwise.
    pub fn upsert(&mut self, item: PeriodResult) -> Result<UpsertOutcome> {
        match self.position(&item.period_label) {
            Some(index) => {
                let mut next = self.state.clone();
                next.history[index] = item;
                self.commit(next)?;
                Ok(UpsertOutcome::Replaced(index))
            }
            None => {
                self.append(item)?;
                Ok(UpsertOutcome::Appended)
            }
        }
    }

    pub fn replace_all(&mut self, items: Vec<PeriodResult>) -> Result<()> {
        let mut next = self.state.clone();
        next.history = items;
        self.commit(next)
    }

    pub fn set_form(&mut self, form: FormState) -> Result<()> {
        let mut next = self.state.clone();
        next.form = form;
        self.commit(next)
    }

    pub fn update_form(&mut self, patch: impl FnOnce(&mut FormState)) -> Result<()> {
        let mut next = self.state.clone();
        patch(&mut next.form);
        self.commit(next)
    }

    pub fn set_csv_text(&mut self, text: Option<String>) -> Result<()> {
        let mut next = self.state.clone();
        next.csv_text = text;
        self.commit(next)
    }

    fn position(&self, period_label: &str) -> Option<usize> {
        self.state
            .history
            .iter()
            .position(|h| h.period_label == period_label)
    }

    /// Saves `next` and adopts it only once the save succeeded, so a failed
    /// write leaves memory matching the last persisted snapshot.
    fn commit(&mut self, mut next: StoreSnapshot) -> Result<()> {
        next.saved_at = Some(Utc::now());
        self.storage.save(&next)?;
        self.state = next;
        debug!("Saved store snapshot ({} history entries)", self.state.history.len());
        Ok(())
    }
}
