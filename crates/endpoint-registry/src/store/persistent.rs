//! Durable endpoint store.

use super::state::{MarkDown, StoreState};
use super::{EndpointRecord, EndpointStore};
use crate::error::StorageError;
use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Where committed state goes.
#[derive(Debug, Clone)]
enum Backend {
    /// JSON snapshot file, replaced atomically on every commit
    File(PathBuf),
    /// No persistence (data is lost on restart)
    Memory,
}

/// Endpoint store with all-or-nothing commits.
///
/// Writers are serialized by `writer`. A mutation is applied to a copy of
/// the table, the copy is written to the backend, and only then does it
/// replace the live table. Readers only ever see committed tables.
///
/// A write that overruns `write_timeout` is reported as a timeout right
/// away, but `writer` stays held until the file write has actually
/// finished. If it lands anyway, the committed snapshot is written back
/// before the next writer gets in.
pub struct Store {
    state: RwLock<StoreState>,
    writer: Arc<Mutex<()>>,
    backend: Backend,
    write_timeout: Duration,
    #[cfg(test)]
    write_delay: Option<Duration>,
}

impl Store {
    /// Open a file-backed store, validating any existing snapshot.
    ///
    /// Returns an empty store if the file doesn't exist.
    pub async fn open(
        path: impl Into<PathBuf>,
        write_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let path = path.into();

        let state = match fs::read(&path).await {
            Ok(data) => {
                let state = StoreState::from_slice(&data)?;
                info!(
                    "Loaded endpoint store with {} records ({} alive) from {:?}",
                    state.count(),
                    state.count_alive(),
                    path
                );
                state
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Endpoint store not found at {:?}, starting empty", path);
                StoreState::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::with_backend(state, Backend::File(path), write_timeout))
    }

    /// In-memory store for testing or when persistence is disabled.
    pub fn memory(write_timeout: Duration) -> Self {
        Self::with_backend(StoreState::new(), Backend::Memory, write_timeout)
    }

    fn with_backend(state: StoreState, backend: Backend, write_timeout: Duration) -> Self {
        Self {
            state: RwLock::new(state),
            writer: Arc::new(Mutex::new(())),
            backend,
            write_timeout,
            #[cfg(test)]
            write_delay: None,
        }
    }

    /// Whether commits reach durable storage.
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, Backend::File(_))
    }

    /// Serialize writers, apply `apply` to a copy of the table and commit it
    /// if it reports a change.
    async fn commit<T>(
        &self,
        apply: impl FnOnce(&mut StoreState) -> (T, bool),
    ) -> Result<T, StorageError> {
        let writer = tokio::time::timeout(self.write_timeout, self.writer.clone().lock_owned())
            .await
            .map_err(|_| {
                warn!("Timed out waiting for the store write lock");
                StorageError::Conflict("store is busy with another write".into())
            })?;

        let committed = self.state.read().await.clone();
        let mut next = committed.clone();
        let (output, changed) = apply(&mut next);

        if changed {
            let _writer = self.persist(&next, &committed, writer).await?;
            *self.state.write().await = next;
        }

        Ok(output)
    }

    /// Write `next` to the backend. On success the writer guard is handed
    /// back so the caller can publish `next` before releasing it.
    async fn persist(
        &self,
        next: &StoreState,
        committed: &StoreState,
        writer: OwnedMutexGuard<()>,
    ) -> Result<OwnedMutexGuard<()>, StorageError> {
        let path = match &self.backend {
            Backend::File(path) => path.clone(),
            Backend::Memory => {
                debug!("Memory store: persist is a no-op");
                return Ok(writer);
            }
        };

        let data = serde_json::to_vec(next)?;
        let size = data.len();
        let mut write = spawn_write(path.clone(), data, self.write_delay());

        match tokio::time::timeout(self.write_timeout, &mut write).await {
            Ok(joined) => {
                joined
                    .map_err(|e| StorageError::Unavailable(format!("store write task failed: {}", e)))??;
                debug!("Saved endpoint store ({} bytes) to {:?}", size, path);
                Ok(writer)
            }
            Err(_) => {
                warn!("Endpoint store write to {:?} timed out", path);
                let restore = serde_json::to_vec(committed)?;
                tokio::spawn(settle_abandoned_write(write, path, restore, writer));
                Err(StorageError::Timeout(self.write_timeout))
            }
        }
    }

    #[cfg(test)]
    fn write_delay(&self) -> Option<Duration> {
        self.write_delay
    }

    #[cfg(not(test))]
    fn write_delay(&self) -> Option<Duration> {
        None
    }
}

/// Wait out a write whose caller already got a timeout, holding the writer
/// lock throughout. A write that lands late is undone by writing back the
/// last committed snapshot.
async fn settle_abandoned_write(
    write: JoinHandle<std::io::Result<()>>,
    path: PathBuf,
    restore: Vec<u8>,
    _writer: OwnedMutexGuard<()>,
) {
    match write.await {
        Ok(Ok(())) => {
            warn!("Timed out write to {:?} landed late, restoring committed snapshot", path);
            match spawn_write(path.clone(), restore, None).await {
                Ok(Ok(())) => debug!("Restored committed snapshot at {:?}", path),
                Ok(Err(e)) => error!("Failed to restore committed snapshot at {:?}: {}", path, e),
                Err(e) => error!("Restore task for {:?} failed: {}", path, e),
            }
        }
        Ok(Err(e)) => debug!("Timed out write to {:?} failed: {}", path, e),
        Err(e) => error!("Timed out write task for {:?} failed: {}", path, e),
    }
}

fn spawn_write(
    path: PathBuf,
    data: Vec<u8>,
    delay: Option<Duration>,
) -> JoinHandle<std::io::Result<()>> {
    tokio::task::spawn_blocking(move || {
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        write_atomically(&path, &data)
    })
}

/// Write via a uniquely named temp file + fsync + rename so readers of the
/// file never see a partial snapshot.
fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl EndpointStore for Store {
    async fn upsert(&self, identity: &str, index: u32, url: &str) -> Result<(), StorageError> {
        self.commit(|state| ((), state.upsert(identity, index, url)))
            .await
    }

    async fn mark_down(&self, identity: &str) -> Result<bool, StorageError> {
        self.commit(|state| match state.mark_down(identity) {
            MarkDown::Missing => (false, false),
            MarkDown::AlreadyDown => (true, false),
            MarkDown::Changed => (true, true),
        })
        .await
    }

    async fn get(&self, index: u32) -> Result<Option<EndpointRecord>, StorageError> {
        Ok(self.state.read().await.get_by_index(index).cloned())
    }

    async fn list(&self) -> Result<Vec<EndpointRecord>, StorageError> {
        Ok(self.state.read().await.list())
    }
}
