// # Cache Store Module
//
// Durable storage of the marker → album → photo graph behind two cooperating
// contexts: a reader context with UI affinity and a single serialized writer
// context for background mutation work. Every writer commit is merged into
// the reader snapshot and announced on a broadcast channel so observers can
// diff instead of reloading.
//
// - **changes**: pending change sets with field-level granularity
// - **graph**: in-memory snapshots with per-row revisions
// - **context**: a snapshot + pending changes + merge policy
// - **txn**: mutation handles resolving entities by id

mod changes;
mod context;
mod graph;
mod txn;

pub use changes::{
    ChangeSet, CommitEvent, EntityKind, EntityRef, EntityRow, FieldId, FieldValue, PendingChange,
};
pub use context::{Context, MergePolicy};
pub use graph::EntityGraph;
pub use txn::{ReaderTxn, WriterTxn};

use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::db::{Database, DbAlbum, DbMarker, DbPhoto};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("cache store worker is gone")]
    Closed,
}

/// Result of a save call
///
/// `NoChanges` is not an error, but callers should not treat it as proof
/// that anything was written either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    NoChanges,
}

type Mutation = Box<dyn for<'a> FnOnce(&mut WriterTxn<'a>) -> Result<(), StoreError> + Send>;

enum StoreCommand {
    Write {
        mutation: Mutation,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    SaveWriter {
        reply: oneshot::Sender<Result<SaveOutcome, StoreError>>,
    },
    SaveReader {
        reply: oneshot::Sender<Result<SaveOutcome, StoreError>>,
    },
}

/// The synchronized local cache
///
/// Reads go straight to the reader snapshot and never block on the writer.
/// Mutations are closures shipped to the writer worker; two `write` calls can
/// never interleave their effects. Dropping the store shuts the worker down.
pub struct CacheStore {
    cmd_tx: mpsc::UnboundedSender<StoreCommand>,
    reader: Arc<RwLock<Context>>,
    commit_tx: broadcast::Sender<CommitEvent>,
}

impl CacheStore {
    /// Open (or create) the store at the given sqlite path
    pub async fn open(database_path: &str) -> Result<Self, StoreError> {
        let db = Database::new(database_path).await?;
        Self::start(db).await
    }

    /// In-memory store for tests
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let db = Database::new_in_memory().await?;
        Self::start(db).await
    }

    async fn start(db: Database) -> Result<Self, StoreError> {
        let markers = db.load_markers().await?;
        let albums = db.load_albums().await?;
        let photos = db.load_photos().await?;
        info!(
            "Loaded {} markers, {} albums, {} photos",
            markers.len(),
            albums.len(),
            photos.len()
        );

        let graph = EntityGraph::load(markers, albums, photos);
        let writer = Context::new(graph.clone(), MergePolicy::WriterWins);
        let reader = Arc::new(RwLock::new(Context::new(graph, MergePolicy::StoreWins)));

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (commit_tx, _) = broadcast::channel(64);

        let worker = StoreWorker {
            db,
            writer,
            reader: Arc::clone(&reader),
            commit_tx: commit_tx.clone(),
            cmd_rx,
        };
        tokio::spawn(worker.run());

        Ok(Self {
            cmd_tx,
            reader,
            commit_tx,
        })
    }

    /// Run a mutation against the writer context
    ///
    /// The changes stay pending until [`CacheStore::save`]. The closure
    /// resolves every entity it needs by id through the transaction handle;
    /// rows from the reader context must never be carried in.
    pub async fn write<F>(&self, mutation: F) -> Result<(), StoreError>
    where
        F: for<'a> FnOnce(&mut WriterTxn<'a>) -> Result<(), StoreError> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(StoreCommand::Write {
                mutation: Box::new(mutation),
                reply,
            })
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }

    /// Commit the writer context's pending changes
    ///
    /// On success the batch is durable, merged into the reader snapshot
    /// (field-level, writer-wins) and announced to subscribers. On failure
    /// the pending changes stay staged so the caller can retry the save
    /// without re-deriving the mutation.
    pub async fn save(&self) -> Result<SaveOutcome, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(StoreCommand::SaveWriter { reply })
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }

    /// Write and save in one step
    pub async fn commit<F>(&self, mutation: F) -> Result<(), StoreError>
    where
        F: for<'a> FnOnce(&mut WriterTxn<'a>) -> Result<(), StoreError> + Send + 'static,
    {
        self.write(mutation).await?;
        self.save().await?;
        Ok(())
    }

    /// Stage reader-side scratch edits
    ///
    /// Intended for the single thread that owns the reader context; edits are
    /// locally visible right away and committed by [`CacheStore::save_reader`].
    pub fn edit_reader<F>(&self, edit: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut ReaderTxn<'_>) -> Result<(), StoreError>,
    {
        let mut reader = self.reader.write().expect("reader context lock poisoned");
        let mut txn = ReaderTxn::new(&mut reader);
        edit(&mut txn)
    }

    /// Commit reader-side scratch edits, store-wins
    ///
    /// Any staged edit whose base no longer matches the durable value is
    /// dropped in favor of what is already stored; the rest persist and merge
    /// into the writer context.
    pub async fn save_reader(&self) -> Result<SaveOutcome, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(StoreCommand::SaveReader { reply })
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }

    /// Subscribe to commit announcements
    pub fn subscribe(&self) -> broadcast::Receiver<CommitEvent> {
        self.commit_tx.subscribe()
    }

    pub(crate) fn reader_context(&self) -> Arc<RwLock<Context>> {
        Arc::clone(&self.reader)
    }

    /// All markers, in map-load order
    pub fn markers(&self) -> Vec<DbMarker> {
        self.read_graph(|g| g.markers_sorted())
    }

    pub fn marker(&self, marker_id: &str) -> Option<DbMarker> {
        self.read_graph(|g| g.marker(marker_id).cloned())
    }

    pub fn album(&self, album_id: &str) -> Option<DbAlbum> {
        self.read_graph(|g| g.album(album_id).cloned())
    }

    pub fn photo(&self, photo_id: &str) -> Option<DbPhoto> {
        self.read_graph(|g| g.photo(photo_id).cloned())
    }

    /// Albums for one marker, name ascending with newest-first tiebreak
    pub fn albums_for_marker(&self, marker_id: &str) -> Vec<DbAlbum> {
        self.read_graph(|g| g.albums_for_marker(marker_id))
    }

    /// Photos for one album, name descending
    pub fn photos_for_album(&self, album_id: &str) -> Vec<DbPhoto> {
        self.read_graph(|g| g.photos_for_album(album_id))
    }

    fn read_graph<T>(&self, read: impl FnOnce(&EntityGraph) -> T) -> T {
        let reader = self.reader.read().expect("reader context lock poisoned");
        read(&reader.graph)
    }
}

struct StoreWorker {
    db: Database,
    writer: Context,
    reader: Arc<RwLock<Context>>,
    commit_tx: broadcast::Sender<CommitEvent>,
    cmd_rx: mpsc::UnboundedReceiver<StoreCommand>,
}

impl StoreWorker {
    async fn run(mut self) {
        debug!("Cache store worker started");

        while let Some(command) = self.cmd_rx.recv().await {
            match command {
                StoreCommand::Write { mutation, reply } => {
                    let _ = reply.send(self.handle_write(mutation));
                }
                StoreCommand::SaveWriter { reply } => {
                    let _ = reply.send(self.handle_save_writer().await);
                }
                StoreCommand::SaveReader { reply } => {
                    let _ = reply.send(self.handle_save_reader().await);
                }
            }
        }

        debug!("Cache store worker stopped");
    }

    fn handle_write(&mut self, mutation: Mutation) -> Result<(), StoreError> {
        let staged = {
            let mut txn = WriterTxn::new(&self.writer);
            mutation(&mut txn)?;
            txn.into_changes()
        };

        for change in staged.iter() {
            self.writer.graph.apply(change);
        }
        self.writer.pending.extend(staged);
        Ok(())
    }

    async fn handle_save_writer(&mut self) -> Result<SaveOutcome, StoreError> {
        if self.writer.pending.is_empty() {
            return Ok(SaveOutcome::NoChanges);
        }

        let ops = self.writer.pending.to_row_ops();
        // On failure the pending set stays staged for a retry
        self.db.apply_ops(&ops).await?;

        let batch = std::mem::take(&mut self.writer.pending);
        {
            let mut reader = self.reader.write().expect("reader context lock poisoned");
            reader.merge_committed(&batch);
        }

        debug!("Committed {} writer changes", batch.len());
        let _ = self.commit_tx.send(CommitEvent {
            kinds: batch.kinds(),
        });
        Ok(SaveOutcome::Saved)
    }

    async fn handle_save_reader(&mut self) -> Result<SaveOutcome, StoreError> {
        let staged: Vec<PendingChange> = {
            let reader = self.reader.read().expect("reader context lock poisoned");
            reader.pending.changes().to_vec()
        };
        if staged.is_empty() {
            return Ok(SaveOutcome::NoChanges);
        }

        // Store-wins: verify each edit's base against the durable value
        let mut kept = ChangeSet::new();
        let mut reverts: Vec<(EntityRef, FieldId, FieldValue)> = Vec::new();
        for change in staged {
            if let PendingChange::Update {
                entity,
                field,
                value,
                base,
            } = change
            {
                match self.durable_field(&entity, field).await? {
                    // Entity no longer exists durably; the edit just goes away
                    None => {}
                    Some(durable) if durable != base => reverts.push((entity, field, durable)),
                    Some(_) => kept.push(PendingChange::Update {
                        entity,
                        field,
                        value,
                        base,
                    }),
                }
            }
        }

        if !kept.is_empty() {
            self.db.apply_ops(&kept.to_row_ops()).await?;
        }

        {
            let mut reader = self.reader.write().expect("reader context lock poisoned");
            reader.pending.clear();
            for (entity, field, durable) in &reverts {
                reader.graph.set_field(entity, *field, durable, false);
            }
            for change in kept.iter() {
                if let PendingChange::Update {
                    entity,
                    field,
                    value,
                    ..
                } = change
                {
                    reader.graph.set_field(entity, *field, value, true);
                }
            }
        }

        if kept.is_empty() {
            return Ok(SaveOutcome::NoChanges);
        }

        self.writer.merge_committed(&kept);
        debug!("Committed {} reader changes", kept.len());
        let _ = self.commit_tx.send(CommitEvent {
            kinds: kept.kinds(),
        });
        Ok(SaveOutcome::Saved)
    }

    async fn durable_field(
        &self,
        entity: &EntityRef,
        field: FieldId,
    ) -> Result<Option<FieldValue>, StoreError> {
        let value = match entity.kind {
            EntityKind::Album => self.db.get_album(&entity.id).await?.map(|a| match field {
                FieldId::AlbumName => FieldValue::Text(a.name),
                FieldId::AlbumRemoteTotal => FieldValue::Count(a.remote_total_count),
                _ => unreachable!("photo fields are never staged against an album"),
            }),
            EntityKind::Photo => self.db.get_photo(&entity.id).await?.map(|p| match field {
                FieldId::PhotoName => FieldValue::Text(p.name),
                FieldId::PhotoRemoteTotal => FieldValue::Count(p.remote_total_count),
                _ => unreachable!("album fields are never staged against a photo"),
            }),
            EntityKind::Marker => None,
        };
        Ok(value)
    }
}
