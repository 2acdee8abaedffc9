use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use hydro_common::TelemetryRecord;

/// Flat key/value settings store backed by a single JSON file. Every call
/// opens and closes the file; nothing is held across the loop's sleep, so
/// the dashboard task can interleave reads and writes freely.
#[derive(Clone)]
pub struct SettingsStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl SettingsStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: Arc::new(data_dir.join("settings.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn load_all(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let _guard = self.lock.lock().await;
        read_map(&self.path).await
    }

    pub async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = read_map(&self.path).await?;
        map.insert(key.to_string(), value.to_string());
        write_map(&self.path, &map).await
    }

    pub async fn update(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = read_map(&self.path).await?;
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        write_map(&self.path, &map).await
    }

    /// Inserts any missing keys without touching existing values, so user
    /// edits survive restarts while new keys pick up their defaults.
    pub async fn seed_defaults(&self, defaults: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = read_map(&self.path).await?;
        for (key, value) in defaults {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        write_map(&self.path, &map).await
    }
}

async fn read_map(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice(&raw)
            .with_context(|| format!("corrupt settings file at {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(err) => Err(err.into()),
    }
}

async fn write_map(path: &Path, map: &BTreeMap<String, String>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(map)?;
    tokio::fs::write(path, payload).await?;
    Ok(())
}

/// Telemetry persistence: an append-only JSON-lines history plus a single
/// overwritten "latest" record.
#[derive(Clone)]
pub struct TelemetryStore {
    history_path: Arc<PathBuf>,
    latest_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl TelemetryStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            history_path: Arc::new(data_dir.join("history.jsonl")),
            latest_path: Arc::new(data_dir.join("latest.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn append(&self, record: &TelemetryRecord) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;

        if let Some(parent) = self.history_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path.as_ref())
            .await
            .context("open telemetry history")?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        let latest = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(self.latest_path.as_ref(), latest).await?;
        Ok(())
    }

    pub async fn latest(&self) -> anyhow::Result<Option<TelemetryRecord>> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.latest_path.as_ref()).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The last `limit` history rows, newest first.
    pub async fn recent(&self, limit: usize) -> anyhow::Result<Vec<TelemetryRecord>> {
        let _guard = self.lock.lock().await;
        let raw = match tokio::fs::read_to_string(self.history_path.as_ref()).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let records: Vec<TelemetryRecord> = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        let start = records.len().saturating_sub(limit);
        let mut recent: Vec<TelemetryRecord> = records[start..].to_vec();
        recent.reverse();
        Ok(recent)
    }
}
