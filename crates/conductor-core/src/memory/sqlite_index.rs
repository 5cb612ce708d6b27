//! Persistent semantic index on SQLite.
//!
//! Embeddings are stored as little-endian f32 BLOBs; search loads the
//! workflow's rows and ranks them with brute-force cosine KNN.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::embedding::{blob_to_f32_vec, f32_slice_to_blob, Embedder};
use super::index::{rank_candidates, IndexEntry, IndexFilter, IndexHit, IndexScope, SemanticIndex, FULL_OUTPUT};
use crate::db::Database;
use crate::error::Result;

pub struct SqliteIndex {
    db: Database,
    embedder: Arc<dyn Embedder>,
    min_score: f32,
}

impl SqliteIndex {
    pub fn new(db: Database, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            db,
            embedder,
            min_score: 0.0,
        }
    }

    pub fn open(path: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?, embedder))
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl SemanticIndex for SqliteIndex {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let rows: Vec<(IndexEntry, Vec<u8>)> = entries
            .into_iter()
            .map(|e| {
                let blob = f32_slice_to_blob(&self.embedder.embed(&e.content));
                (e, blob)
            })
            .collect();

        let count = rows.len();
        self.db
            .with_conn_async(move |conn| {
                let tx = conn.unchecked_transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO index_entries
                            (id, workflow_id, agent_id, agent_role, item_type, content, confidence, embedding, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                         ON CONFLICT(id) DO UPDATE SET
                            agent_role = excluded.agent_role,
                            item_type  = excluded.item_type,
                            content    = excluded.content,
                            confidence = excluded.confidence,
                            embedding  = excluded.embedding,
                            created_at = excluded.created_at",
                    )?;
                    for (e, blob) in &rows {
                        stmt.execute(params![
                            e.id,
                            e.workflow_id,
                            e.agent_id,
                            e.agent_role,
                            e.item_type,
                            e.content,
                            e.confidence,
                            blob,
                            e.timestamp.timestamp_millis(),
                        ])?;
                    }
                }
                tx.commit()
            })
            .await?;

        tracing::debug!("[SqliteIndex] Upserted {} entries", count);
        Ok(())
    }

    async fn search(&self, query: &str, k: usize, filter: &IndexFilter) -> Result<Vec<IndexHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let q = self.embedder.embed(query);
        let workflow_id = filter.workflow_id.clone();

        let rows = self
            .db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, workflow_id, agent_id, agent_role, item_type, content, confidence, embedding, created_at
                     FROM index_entries WHERE workflow_id = ?1",
                )?;
                let rows = stmt.query_map(params![workflow_id], |row| {
                    let millis: i64 = row.get(8)?;
                    let blob: Vec<u8> = row.get(7)?;
                    Ok((
                        IndexEntry {
                            id: row.get(0)?,
                            workflow_id: row.get(1)?,
                            agent_id: row.get(2)?,
                            agent_role: row.get(3)?,
                            item_type: row.get(4)?,
                            content: row.get(5)?,
                            confidence: row.get(6)?,
                            timestamp: DateTime::<Utc>::from_timestamp_millis(millis)
                                .unwrap_or_default(),
                        },
                        blob_to_f32_vec(&blob),
                    ))
                })?;
                rows.collect::<std::result::Result<Vec<_>, _>>()
            })
            .await?;

        let candidates = rows.into_iter().filter(|(entry, _)| filter.matches(entry));
        Ok(rank_candidates(&q, candidates, k, self.min_score))
    }

    async fn delete_agent_items(
        &self,
        workflow_id: &str,
        agent_id: &str,
        scope: Option<IndexScope>,
    ) -> Result<usize> {
        let workflow_id = workflow_id.to_string();
        let agent_id = agent_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let base = "DELETE FROM index_entries WHERE workflow_id = ?1 AND agent_id = ?2";
                match scope {
                    None => conn.execute(base, params![workflow_id, agent_id]),
                    Some(IndexScope::Outputs) => conn.execute(
                        &format!("{} AND item_type = ?3", base),
                        params![workflow_id, agent_id, FULL_OUTPUT],
                    ),
                    Some(IndexScope::Facts) => conn.execute(
                        &format!("{} AND item_type != ?3", base),
                        params![workflow_id, agent_id, FULL_OUTPUT],
                    ),
                }
            })
            .await
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = self
            .db
            .with_conn_async(|conn| {
                conn.query_row("SELECT COUNT(*) FROM index_entries", [], |row| row.get(0))
            })
            .await?;
        Ok(n as usize)
    }

    async fn clear(&self, workflow_id: &str) -> Result<()> {
        let workflow_id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "DELETE FROM index_entries WHERE workflow_id = ?1",
                    params![workflow_id],
                )
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::embedding::HashingEmbedder;

    fn make_index() -> SqliteIndex {
        let db = Database::open_in_memory().unwrap();
        SqliteIndex::new(db, Arc::new(HashingEmbedder::default()))
    }

    fn outputs(exclude: &[&str]) -> IndexFilter {
        IndexFilter {
            workflow_id: "wf".to_string(),
            scope: IndexScope::Outputs,
            exclude_agents: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_search() {
        let idx = make_index();
        idx.upsert(vec![
            IndexEntry::output("wf", "researcher", "market size is growing quickly"),
            IndexEntry::output("wf", "analyst", "pricing should follow the premium tier"),
        ])
        .await
        .unwrap();
        assert_eq!(idx.count().await.unwrap(), 2);

        let hits = idx.search("premium pricing", 3, &outputs(&[])).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.agent_id, "analyst");
        assert!(hits[0].score > 0.0);

        let hits = idx.search("premium pricing", 3, &outputs(&["analyst"])).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_conflict_updates_content() {
        let idx = make_index();
        idx.upsert(vec![IndexEntry::output("wf", "a", "old text about markets")])
            .await
            .unwrap();
        idx.upsert(vec![IndexEntry::output("wf", "a", "new text about markets")])
            .await
            .unwrap();
        assert_eq!(idx.count().await.unwrap(), 1);

        let hits = idx.search("markets", 1, &outputs(&[])).await.unwrap();
        assert_eq!(hits[0].entry.content, "new text about markets");
    }

    #[tokio::test]
    async fn test_delete_scopes() {
        let idx = make_index();
        let mut fact = IndexEntry::output("wf", "a", "a requirement we must meet");
        fact.id = "wf_a_fact_0".to_string();
        fact.item_type = "requirement".to_string();
        idx.upsert(vec![IndexEntry::output("wf", "a", "full output"), fact])
            .await
            .unwrap();

        assert_eq!(idx.delete_agent_items("wf", "a", Some(IndexScope::Facts)).await.unwrap(), 1);
        assert_eq!(idx.delete_agent_items("wf", "a", None).await.unwrap(), 1);
        assert_eq!(idx.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let path = path.to_str().unwrap();
        {
            let idx = SqliteIndex::open(path, Arc::new(HashingEmbedder::default())).unwrap();
            idx.upsert(vec![IndexEntry::output("wf", "a", "durable output")])
                .await
                .unwrap();
        }
        let idx = SqliteIndex::open(path, Arc::new(HashingEmbedder::default())).unwrap();
        assert_eq!(idx.count().await.unwrap(), 1);
    }
}
