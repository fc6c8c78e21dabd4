use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use extract::DocumentAnalysis;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything persisted for one ingested document. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub original_text: String,
    pub analysis: DocumentAnalysis,
    /// Serialized `index::VectorIndex`
    pub vector_index: Vec<u8>,
    /// Serialized `extract::KnowledgeGraph`
    pub knowledge_graph: Vec<u8>,
    pub created_at_unix: u64,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session. Fails if the id is already taken.
    async fn create(&self, record: SessionRecord) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Arc<SessionRecord>>>;

    async fn len(&self) -> Result<usize>;
}

pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn is_session_id(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Arc<SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, record: SessionRecord) -> Result<()> {
        match self.sessions.entry(record.id.clone()) {
            Entry::Occupied(_) => anyhow::bail!("Session {} already exists", record.id),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(record));
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Arc<SessionRecord>>> {
        Ok(self.sessions.get(id).map(|r| r.value().clone()))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.sessions.len())
    }
}

/// One JSON file per session under a data directory
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self, record: SessionRecord) -> Result<()> {
        if !is_session_id(&record.id) {
            anyhow::bail!("Invalid session id: {}", record.id);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .context(format!("Failed to create session directory: {:?}", self.dir))?;

        let json = serde_json::to_vec(&record).context("Failed to serialize session")?;

        // Unique per call so concurrent creates never share a temp file
        let tmp = self.dir.join(format!("{}.{}.tmp", record.id, uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, json)
            .await
            .context(format!("Failed to write session file: {:?}", tmp))?;

        // Linking fails if the final path exists, unlike a rename
        let path = self.path_for(&record.id);
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        let _ = tokio::fs::remove_file(&tmp).await;

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                anyhow::bail!("Session {} already exists", record.id)
            }
            Err(e) => Err(e).context(format!("Failed to move session file into place: {:?}", path)),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Arc<SessionRecord>>> {
        if !is_session_id(id) {
            return Ok(None);
        }

        let json = match tokio::fs::read(self.path_for(id)).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context(format!("Failed to read session {}", id)),
        };

        let record: SessionRecord = serde_json::from_slice(&json)
            .context(format!("Failed to parse session {}", id))?;
        Ok(Some(Arc::new(record)))
    }

    async fn len(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e).context("Failed to list session directory"),
        };

        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                count += 1;
            }
        }
        Ok(count)
    }
}
