// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::data_path::sibling_path;
use crate::domain::error::AppError;
use crate::domain::request::{RequestStatus, TrackedRequest, short_id};
use alloy::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// `maxCost` is written as a decimal string; legacy files carry a bare number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Amount {
    Text(String),
    Number(u64),
}

impl Amount {
    fn parse(&self) -> Result<u128, String> {
        match self {
            Amount::Text(s) => s
                .trim()
                .parse::<u128>()
                .map_err(|e| format!("invalid maxCost {s:?}: {e}")),
            Amount::Number(n) => Ok(*n as u128),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRequestIn {
    #[serde(alias = "maxGasPrice")]
    max_cost: Amount,
    deadline: u64,
    #[serde(default)]
    submitter: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    status: RequestStatus,
    #[serde(default)]
    attempts: u32,
    #[serde(default)]
    next_attempt_at: u64,
    #[serde(default)]
    last_error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredRequestOut<'a> {
    max_cost: String,
    deadline: u64,
    submitter: String,
    target: String,
    payload: String,
    status: RequestStatus,
    attempts: u32,
    next_attempt_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<&'a str>,
}

fn encode_id(id: &B256) -> String {
    format!("0x{}", hex::encode(id.as_slice()))
}

fn decode_id(raw: &str) -> Result<B256, AppError> {
    let bytes = hex::decode(raw.trim().trim_start_matches("0x"))
        .map_err(|e| AppError::Persistence(format!("invalid request id {raw:?}: {e}")))?;
    if bytes.len() != 32 {
        return Err(AppError::Persistence(format!(
            "request id {raw:?} is {} bytes, expected 32",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

fn decode_address(raw: Option<&str>, field: &str, id: &str) -> Result<Address, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Address::ZERO),
        Some(s) => Address::from_str(s)
            .map_err(|e| AppError::Persistence(format!("{id}: invalid {field} {s:?}: {e}"))),
    }
}

fn decode_payload(raw: Option<&str>, id: &str) -> Result<Bytes, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Bytes::new()),
        Some(s) => hex::decode(s.trim_start_matches("0x"))
            .map(Bytes::from)
            .map_err(|e| AppError::Persistence(format!("{id}: invalid payload: {e}"))),
    }
}

fn write_atomic(path: &Path, body: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Persistence(format!("create {} failed: {e}", parent.display()))
        })?;
    }
    let tmp_path = sibling_path(path, "tmp");
    let mut tmp = File::create(&tmp_path)
        .map_err(|e| AppError::Persistence(format!("create {} failed: {e}", tmp_path.display())))?;
    tmp.write_all(body)
        .and_then(|_| tmp.sync_all())
        .map_err(|e| AppError::Persistence(format!("write {} failed: {e}", tmp_path.display())))?;
    fs::rename(&tmp_path, path)
        .map_err(|e| AppError::Persistence(format!("rename to {} failed: {e}", path.display())))
}

/// Durable set of tracked requests keyed by id, plus the ingest cursor.
#[derive(Debug)]
pub struct RequestStore {
    path: PathBuf,
    requests: BTreeMap<B256, TrackedRequest>,
    cursor: Option<u64>,
    dirty: bool,
}

impl RequestStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            requests: BTreeMap::new(),
            cursor: None,
            dirty: false,
        }
    }

    /// Load persisted state. An absent file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let mut store = Self::empty(path);
        store.requests = Self::read_requests(&store.path)?;
        store.cursor = Self::read_cursor(&store.cursor_path())?;
        tracing::info!(
            target: "store",
            path = %store.path.display(),
            tracked = store.requests.len(),
            cursor = ?store.cursor,
            "Loaded tracked requests"
        );
        Ok(store)
    }

    fn read_requests(path: &Path) -> Result<BTreeMap<B256, TrackedRequest>, AppError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Persistence(format!("read {} failed: {e}", path.display())))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let entries: BTreeMap<String, StoredRequestIn> = serde_json::from_str(&raw)
            .map_err(|e| AppError::Persistence(format!("parse {} failed: {e}", path.display())))?;

        let mut out = BTreeMap::new();
        for (key, entry) in entries {
            let id = decode_id(&key)?;
            let status = match entry.status {
                RequestStatus::Removed => continue,
                // Interrupted mid-dispatch; the remote guards re-execution.
                RequestStatus::Dispatching => RequestStatus::Pending,
                other => other,
            };
            let max_cost = entry
                .max_cost
                .parse()
                .map_err(|e| AppError::Persistence(format!("{key}: {e}")))?;
            if max_cost == 0 {
                return Err(AppError::Persistence(format!("{key}: maxCost must be > 0")));
            }
            out.insert(
                id,
                TrackedRequest {
                    id,
                    submitter: decode_address(entry.submitter.as_deref(), "submitter", &key)?,
                    target: decode_address(entry.target.as_deref(), "target", &key)?,
                    payload: decode_payload(entry.payload.as_deref(), &key)?,
                    max_cost,
                    deadline: entry.deadline,
                    status,
                    attempts: entry.attempts,
                    next_attempt_at: entry.next_attempt_at,
                    last_error: entry.last_error,
                },
            );
        }
        Ok(out)
    }

    fn read_cursor(path: &Path) -> Result<Option<u64>, AppError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Persistence(format!("read {} failed: {e}", path.display())))?;
        serde_json::from_str::<u64>(raw.trim())
            .map(Some)
            .map_err(|e| AppError::Persistence(format!("parse {} failed: {e}", path.display())))
    }

    pub fn save(&mut self) -> Result<(), AppError> {
        let entries: BTreeMap<String, StoredRequestOut<'_>> = self
            .requests
            .values()
            .map(|req| {
                (
                    encode_id(&req.id),
                    StoredRequestOut {
                        max_cost: req.max_cost.to_string(),
                        deadline: req.deadline,
                        submitter: format!("{:#x}", req.submitter),
                        target: format!("{:#x}", req.target),
                        payload: format!("0x{}", hex::encode(&req.payload)),
                        status: req.status,
                        attempts: req.attempts,
                        next_attempt_at: req.next_attempt_at,
                        last_error: req.last_error.as_deref(),
                    },
                )
            })
            .collect();
        let body = serde_json::to_vec_pretty(&entries)
            .map_err(|e| AppError::Persistence(format!("encode state failed: {e}")))?;
        write_atomic(&self.path, &body)?;

        if let Some(cursor) = self.cursor {
            write_atomic(&self.cursor_path(), cursor.to_string().as_bytes())?;
        }

        self.dirty = false;
        tracing::debug!(target: "store", tracked = self.requests.len(), "State flushed");
        Ok(())
    }

    /// Flush only when something changed since the last successful save.
    pub fn flush_if_dirty(&mut self) -> Result<bool, AppError> {
        if !self.dirty {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Insert a newly observed request; returns `false` if the id is already tracked.
    pub fn insert_new(&mut self, req: TrackedRequest) -> bool {
        if self.requests.contains_key(&req.id) {
            return false;
        }
        self.requests.insert(req.id, req);
        self.dirty = true;
        true
    }

    pub fn upsert(&mut self, req: TrackedRequest) {
        self.requests.insert(req.id, req);
        self.dirty = true;
    }

    /// Terminal: the entry leaves the store and comes back marked `Removed`.
    pub fn remove(&mut self, id: &B256) -> Option<TrackedRequest> {
        let mut removed = self.requests.remove(id)?;
        removed.status = RequestStatus::Removed;
        self.dirty = true;
        Some(removed)
    }

    pub fn set_status(&mut self, id: &B256, status: RequestStatus) -> Result<(), AppError> {
        let req = self.requests.get_mut(id).ok_or_else(|| AppError::Validation {
            field: "id".into(),
            message: format!("{} is not tracked", short_id(id)),
        })?;
        req.transition(status)?;
        self.dirty = true;
        Ok(())
    }

    pub fn get(&self, id: &B256) -> Option<&TrackedRequest> {
        self.requests.get(id)
    }

    pub fn get_mut(&mut self, id: &B256) -> Option<&mut TrackedRequest> {
        let req = self.requests.get_mut(id)?;
        self.dirty = true;
        Some(req)
    }

    pub fn contains(&self, id: &B256) -> bool {
        self.requests.contains_key(id)
    }

    pub fn ids(&self) -> Vec<B256> {
        self.requests.keys().copied().collect()
    }

    /// Ids ordered by deadline (earliest first), ties broken by id.
    pub fn ids_by_deadline(&self) -> Vec<B256> {
        let mut entries: Vec<(u64, B256)> =
            self.requests.values().map(|r| (r.deadline, r.id)).collect();
        entries.sort();
        entries.into_iter().map(|(_, id)| id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedRequest> {
        self.requests.values()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    pub fn set_cursor(&mut self, next_block: u64) {
        if self.cursor != Some(next_block) {
            self.cursor = Some(next_block);
            self.dirty = true;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cursor_path(&self) -> PathBuf {
        sibling_path(&self.path, "cursor")
    }
}
