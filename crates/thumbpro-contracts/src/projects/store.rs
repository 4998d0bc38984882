use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::Context;
use serde_json::{Map, Value};

/// Well-known key the project collection lives under.
pub const PROJECTS_STORAGE_KEY: &str = "thumbpro.projects";

/// Where the serialized project collection is kept.
pub trait ProjectStore: Send {
    /// Raw value under [`PROJECTS_STORAGE_KEY`], `None` when nothing was stored yet.
    fn read_raw(&self) -> anyhow::Result<Option<Value>>;

    fn write_raw(&self, value: &Value) -> anyhow::Result<()>;
}

/// JSON document on disk keyed like browser local storage.
///
/// Writes re-read the document and only touch the projects key, so other keys
/// written by another process survive.
#[derive(Debug, Clone)]
pub struct FileProjectStore {
    path: PathBuf,
}

impl FileProjectStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProjectStore for FileProjectStore {
    fn read_raw(&self) -> anyhow::Result<Option<Value>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let document = read_json_object(&self.path)?;
        Ok(document.get(PROJECTS_STORAGE_KEY).cloned())
    }

    fn write_raw(&self, value: &Value) -> anyhow::Result<()> {
        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        on_disk.insert(PROJECTS_STORAGE_KEY.to_string(), value.clone());
        write_json_object(&self.path, &on_disk)
    }
}

fn read_json_object(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match parsed {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{} is not a JSON object", path.display()),
    }
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(
        &tmp_path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )
    .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to move {} into place", tmp_path.display()))?;
    Ok(())
}

/// In-process store; clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryProjectStore {
    slot: Arc<Mutex<Option<Value>>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: Value) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(value))),
        }
    }

    pub fn snapshot(&self) -> Option<Value> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl ProjectStore for MemoryProjectStore {
    fn read_raw(&self) -> anyhow::Result<Option<Value>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(slot.clone())
    }

    fn write_raw(&self, value: &Value) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        *slot = Some(value.clone());
        Ok(())
    }
}

enum StoreCommand {
    Write(Value),
    Flush(Sender<()>),
}

/// Moves writes onto a worker thread so saving never blocks the caller.
///
/// Queued writes are coalesced: only the newest collection is persisted.
/// Dropping the store waits for the queue to drain.
pub struct BackgroundProjectStore {
    inner: Arc<Mutex<Box<dyn ProjectStore>>>,
    tx: Option<Sender<StoreCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundProjectStore {
    pub fn spawn(store: impl ProjectStore + 'static) -> Self {
        let inner: Arc<Mutex<Box<dyn ProjectStore>>> = Arc::new(Mutex::new(Box::new(store)));
        let (tx, rx) = mpsc::channel();
        let worker_store = Arc::clone(&inner);
        let worker = thread::spawn(move || run_store_worker(worker_store, rx));
        Self {
            inner,
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Blocks until every write queued so far has hit the inner store.
    pub fn flush(&self) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        let (ack_tx, ack_rx) = mpsc::channel();
        if tx.send(StoreCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

impl ProjectStore for BackgroundProjectStore {
    fn read_raw(&self) -> anyhow::Result<Option<Value>> {
        let store = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("project store lock poisoned"))?;
        store.read_raw()
    }

    fn write_raw(&self, value: &Value) -> anyhow::Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("project store worker stopped"))?;
        tx.send(StoreCommand::Write(value.clone()))
            .map_err(|_| anyhow::anyhow!("project store worker stopped"))
    }
}

impl Drop for BackgroundProjectStore {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_store_worker(store: Arc<Mutex<Box<dyn ProjectStore>>>, rx: Receiver<StoreCommand>) {
    while let Ok(command) = rx.recv() {
        let mut pending = None;
        let mut acks = Vec::new();
        let mut next = Some(command);
        while let Some(command) = next.take() {
            match command {
                StoreCommand::Write(value) => pending = Some(value),
                StoreCommand::Flush(ack) => acks.push(ack),
            }
            next = rx.try_recv().ok();
        }

        if let Some(value) = pending {
            let result = store
                .lock()
                .map_err(|_| anyhow::anyhow!("project store lock poisoned"))
                .and_then(|store| store.write_raw(&value));
            if let Err(err) = result {
                tracing::warn!(error = %format!("{err:#}"), "persisting projects failed");
            }
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
}
