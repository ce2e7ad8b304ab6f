//! JSON persistence for [`VectorStore`] and the background autosave task.
//!
//! The file format is an indented JSON object mapping each id to its
//! `{id, text, vector, metadata, timestamp}` entry. Ids are written in sorted
//! order so saved files diff cleanly.

use crate::config::StoreConfig;
use crate::error::{Result, VectorStoreError};
use crate::store::VectorStore;
use crate::types::VectorEntry;
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) struct AutosaveTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl VectorStore {
    /// Builds a store from `config`, loading `persist_path` if it exists and
    /// starting the autosave task when `autosave_interval` is set.
    ///
    /// Must be called from within a tokio runtime. Pair with [`close`](Self::close).
    pub async fn open(config: StoreConfig) -> Result<Arc<Self>> {
        let store = Arc::new(Self::new(config)?);

        if let Some(path) = store.config.persist_path.clone() {
            if tokio::fs::try_exists(&path).await? {
                store.load_from_file(&path).await?;
            } else {
                log::info!("No existing store at {path:?}; starting empty");
            }
        }

        if let (Some(path), Some(interval)) = (
            store.config.persist_path.clone(),
            store.config.autosave_interval,
        ) {
            store.start_autosave(path, interval);
        }
        Ok(store)
    }

    fn start_autosave(self: &Arc<Self>, path: PathBuf, interval: Duration) {
        let cancel = CancellationToken::new();
        let weak = Arc::downgrade(self);
        let stop = cancel.clone();

        log::info!("Starting vector store autosave to {path:?} every {interval:?}");
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; nothing to save yet.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(store) = weak.upgrade() else {
                            break;
                        };
                        if let Err(err) = store.save_to_file(&path).await {
                            log::warn!("Autosave to {path:?} failed: {err}");
                        }
                    }
                }
            }
            log::debug!("Vector store autosave stopped");
        });

        let mut slot = self.autosave.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(AutosaveTask { cancel, handle }) {
            previous.cancel.cancel();
        }
    }

    /// Stops the autosave task (waiting for it to exit) and performs a final
    /// save when `persist_path` is configured.
    pub async fn close(&self) -> Result<()> {
        let task = self
            .autosave
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(err) = task.handle.await {
                log::warn!("Autosave task ended abnormally: {err}");
            }
        }

        if let Some(path) = &self.config.persist_path {
            self.save_to_file(path).await?;
        }
        Ok(())
    }

    fn snapshot_json(&self) -> Result<Vec<u8>> {
        let entries = self.read_entries();
        let ordered: BTreeMap<&String, &VectorEntry> = entries.iter().collect();
        Ok(serde_json::to_vec_pretty(&ordered)?)
    }

    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.snapshot_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        log::debug!("Saved vector store to {path:?} ({} bytes)", bytes.len());
        Ok(())
    }

    /// Replaces the in-memory contents with the file at `path`.
    pub async fn load_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let raw: HashMap<String, VectorEntry> = serde_json::from_slice(&bytes)?;
        let loaded = self.adopt_all(raw)?;
        if loaded.len() > self.config.max_vectors {
            return Err(VectorStoreError::CapacityExceeded {
                max: self.config.max_vectors,
            });
        }

        let count = loaded.len();
        let mut entries = self.write_entries();
        *entries = loaded;
        self.clear_cache();
        drop(entries);

        log::info!("Loaded {count} vectors from {path:?}");
        Ok(())
    }

    /// Merges entries read from `reader` into the store, overwriting per id.
    ///
    /// Nothing is merged if the result would exceed `max_vectors`.
    pub fn import_from_reader<R: Read>(&self, reader: R) -> Result<usize> {
        let raw: HashMap<String, VectorEntry> = serde_json::from_reader(reader)?;
        let incoming = self.adopt_all(raw)?;

        let mut entries = self.write_entries();
        let new_ids = incoming
            .keys()
            .filter(|id| !entries.contains_key(*id))
            .count();
        if entries.len() + new_ids > self.config.max_vectors {
            return Err(VectorStoreError::CapacityExceeded {
                max: self.config.max_vectors,
            });
        }

        let count = incoming.len();
        for (id, entry) in incoming {
            self.invalidate_cached(&id);
            entries.insert(id, entry);
        }
        log::info!("Imported {count} vectors ({new_ids} new). Total: {}", entries.len());
        Ok(count)
    }

    fn adopt_all(&self, raw: HashMap<String, VectorEntry>) -> Result<HashMap<String, VectorEntry>> {
        raw.into_iter()
            .map(|(id, entry)| {
                let entry = self.adopt_loaded(id, entry)?;
                Ok((entry.id.clone(), entry))
            })
            .collect()
    }

    pub fn export_to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let entries = self.read_entries();
        let ordered: BTreeMap<&String, &VectorEntry> = entries.iter().collect();
        serde_json::to_writer_pretty(writer, &ordered)?;
        Ok(())
    }
}
