//! SQLite document store for promises and evidence items.
//!
//! One database file, one table per collection. Nested collections
//! (`linked_evidence`, `promise_ids`, keyword lists) live in JSON columns;
//! the scoping keys used by equality filters are real columns with indexes.
//! Thread-safe via an internal mutex on the connection. Read-modify-write
//! mutations run inside a transaction, which makes each of them atomic per
//! document — but nothing spans both tables, by design.

use super::traits::{
    DocumentStore, EvidenceFilter, OpenStore, PromiseFilter, StorageError, StorageResult,
};
use crate::model::{EvidenceItem, EvidenceLink, LinkingStatus, Promise};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed document store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS promises (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                description TEXT,
                background TEXT,
                department_lead TEXT,
                party_code TEXT NOT NULL,
                session_id TEXT NOT NULL,
                keywords_json TEXT NOT NULL,
                linked_evidence_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_promises_scope
                ON promises(session_id, party_code);

            CREATE TABLE IF NOT EXISTS evidence (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                details TEXT,
                source_type TEXT NOT NULL,
                departments_json TEXT NOT NULL,
                session_id TEXT NOT NULL,
                promise_ids_json TEXT NOT NULL,
                linking_status TEXT NOT NULL,
                linking_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_evidence_status
                ON evidence(session_id, linking_status);

            -- WAL for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn row_to_promise(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPromiseRow> {
        Ok(RawPromiseRow {
            id: row.get(0)?,
            text: row.get(1)?,
            description: row.get(2)?,
            background: row.get(3)?,
            department_lead: row.get(4)?,
            party_code: row.get(5)?,
            session_id: row.get(6)?,
            keywords_json: row.get(7)?,
            linked_evidence_json: row.get(8)?,
        })
    }

    fn row_to_evidence(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEvidenceRow> {
        Ok(RawEvidenceRow {
            id: row.get(0)?,
            title: row.get(1)?,
            details: row.get(2)?,
            source_type: row.get(3)?,
            departments_json: row.get(4)?,
            session_id: row.get(5)?,
            promise_ids_json: row.get(6)?,
            linking_status: row.get(7)?,
            linking_error: row.get(8)?,
        })
    }
}

const PROMISE_COLUMNS: &str = "id, text, description, background, department_lead, party_code, \
     session_id, keywords_json, linked_evidence_json";

const EVIDENCE_COLUMNS: &str = "id, title, details, source_type, departments_json, session_id, \
     promise_ids_json, linking_status, linking_error";

struct RawPromiseRow {
    id: String,
    text: String,
    description: Option<String>,
    background: Option<String>,
    department_lead: Option<String>,
    party_code: String,
    session_id: String,
    keywords_json: String,
    linked_evidence_json: String,
}

impl RawPromiseRow {
    fn into_promise(self) -> StorageResult<Promise> {
        Ok(Promise {
            promise_id: self.id,
            text: self.text,
            description: self.description,
            background_and_context: self.background,
            responsible_department_lead: self.department_lead,
            party_code: self.party_code,
            parliament_session_id: self.session_id,
            extracted_keywords_concepts: serde_json::from_str(&self.keywords_json)?,
            linked_evidence: serde_json::from_str(&self.linked_evidence_json)?,
        })
    }
}

struct RawEvidenceRow {
    id: String,
    title: String,
    details: Option<String>,
    source_type: String,
    departments_json: String,
    session_id: String,
    promise_ids_json: String,
    linking_status: String,
    linking_error: Option<String>,
}

impl RawEvidenceRow {
    fn into_evidence(self) -> StorageResult<EvidenceItem> {
        let status = LinkingStatus::parse(&self.linking_status).ok_or_else(|| {
            StorageError::InvalidField(format!(
                "unknown linking status '{}' on evidence {}",
                self.linking_status, self.id
            ))
        })?;
        Ok(EvidenceItem {
            evidence_id: self.id,
            title_or_summary: self.title,
            description_or_details: self.details,
            evidence_source_type: self.source_type,
            linked_departments: serde_json::from_str(&self.departments_json)?,
            parliament_session_id: self.session_id,
            promise_ids: serde_json::from_str(&self.promise_ids_json)?,
            promise_linking_status: status,
            linking_error: self.linking_error,
        })
    }
}

impl DocumentStore for SqliteStore {
    fn save_promise(&self, promise: &Promise) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO promises \
             (id, text, description, background, department_lead, party_code, session_id, \
              keywords_json, linked_evidence_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                promise.promise_id,
                promise.text,
                promise.description,
                promise.background_and_context,
                promise.responsible_department_lead,
                promise.party_code,
                promise.parliament_session_id,
                serde_json::to_string(&promise.extracted_keywords_concepts)?,
                serde_json::to_string(&promise.linked_evidence)?,
            ],
        )?;
        Ok(())
    }

    fn get_promise(&self, promise_id: &str) -> StorageResult<Option<Promise>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM promises WHERE id = ?1", PROMISE_COLUMNS),
                params![promise_id],
                Self::row_to_promise,
            )
            .optional()?;
        row.map(RawPromiseRow::into_promise).transpose()
    }

    fn find_promises(&self, filter: &PromiseFilter) -> StorageResult<Vec<Promise>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = format!("SELECT {} FROM promises", PROMISE_COLUMNS);
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<&dyn rusqlite::ToSql> = Vec::new();
        if let Some(session) = &filter.parliament_session_id {
            clauses.push("session_id = ?");
            params.push(session);
        }
        if let Some(party) = &filter.party_code {
            clauses.push("party_code = ?");
            params.push(party);
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), Self::row_to_promise)?;
        let mut promises = Vec::new();
        for row in rows {
            promises.push(row?.into_promise()?);
        }
        Ok(promises)
    }

    fn save_evidence(&self, evidence: &EvidenceItem) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO evidence \
             (id, title, details, source_type, departments_json, session_id, \
              promise_ids_json, linking_status, linking_error) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                evidence.evidence_id,
                evidence.title_or_summary,
                evidence.description_or_details,
                evidence.evidence_source_type,
                serde_json::to_string(&evidence.linked_departments)?,
                evidence.parliament_session_id,
                serde_json::to_string(&evidence.promise_ids)?,
                evidence.promise_linking_status.as_str(),
                evidence.linking_error,
            ],
        )?;
        Ok(())
    }

    fn get_evidence(&self, evidence_id: &str) -> StorageResult<Option<EvidenceItem>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM evidence WHERE id = ?1", EVIDENCE_COLUMNS),
                params![evidence_id],
                Self::row_to_evidence,
            )
            .optional()?;
        row.map(RawEvidenceRow::into_evidence).transpose()
    }

    fn find_evidence(&self, filter: &EvidenceFilter) -> StorageResult<Vec<EvidenceItem>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = format!("SELECT {} FROM evidence", EVIDENCE_COLUMNS);
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(session) = &filter.parliament_session_id {
            clauses.push("session_id = ?");
            params.push(Box::new(session.clone()));
        }
        if let Some(status) = filter.linking_status {
            clauses.push("linking_status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(params.iter().map(|p| p.as_ref())),
            Self::row_to_evidence,
        )?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?.into_evidence()?);
        }
        Ok(items)
    }

    fn upsert_promise_link(&self, promise_id: &str, link: &EvidenceLink) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let json: Option<String> = tx
            .query_row(
                "SELECT linked_evidence_json FROM promises WHERE id = ?1",
                params![promise_id],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| StorageError::PromiseNotFound(promise_id.to_string()))?;

        let mut links: Vec<EvidenceLink> = serde_json::from_str(&json)?;
        links.retain(|l| l.evidence_id != link.evidence_id);
        links.push(link.clone());

        tx.execute(
            "UPDATE promises SET linked_evidence_json = ?1 WHERE id = ?2",
            params![serde_json::to_string(&links)?, promise_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove_promise_link(&self, promise_id: &str, evidence_id: &str) -> StorageResult<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let json: Option<String> = tx
            .query_row(
                "SELECT linked_evidence_json FROM promises WHERE id = ?1",
                params![promise_id],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| StorageError::PromiseNotFound(promise_id.to_string()))?;

        let mut links: Vec<EvidenceLink> = serde_json::from_str(&json)?;
        let before = links.len();
        links.retain(|l| l.evidence_id != evidence_id);
        let removed = links.len() < before;

        if removed {
            tx.execute(
                "UPDATE promises SET linked_evidence_json = ?1 WHERE id = ?2",
                params![serde_json::to_string(&links)?, promise_id],
            )?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn dedupe_promise_links(&self, promise_id: &str) -> StorageResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let json: Option<String> = tx
            .query_row(
                "SELECT linked_evidence_json FROM promises WHERE id = ?1",
                params![promise_id],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| StorageError::PromiseNotFound(promise_id.to_string()))?;

        let links: Vec<EvidenceLink> = serde_json::from_str(&json)?;
        let before = links.len();
        let mut seen = std::collections::HashSet::new();
        let deduped: Vec<EvidenceLink> = links
            .into_iter()
            .filter(|l| seen.insert(l.evidence_id.clone()))
            .collect();
        let removed = before - deduped.len();

        if removed > 0 {
            tx.execute(
                "UPDATE promises SET linked_evidence_json = ?1 WHERE id = ?2",
                params![serde_json::to_string(&deduped)?, promise_id],
            )?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn add_promise_ref(&self, evidence_id: &str, promise_id: &str) -> StorageResult<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let json: Option<String> = tx
            .query_row(
                "SELECT promise_ids_json FROM evidence WHERE id = ?1",
                params![evidence_id],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| StorageError::EvidenceNotFound(evidence_id.to_string()))?;

        let mut ids: Vec<String> = serde_json::from_str(&json)?;
        if ids.iter().any(|id| id == promise_id) {
            tx.commit()?;
            return Ok(false);
        }
        ids.push(promise_id.to_string());

        tx.execute(
            "UPDATE evidence SET promise_ids_json = ?1 WHERE id = ?2",
            params![serde_json::to_string(&ids)?, evidence_id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn remove_promise_ref(&self, evidence_id: &str, promise_id: &str) -> StorageResult<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let json: Option<String> = tx
            .query_row(
                "SELECT promise_ids_json FROM evidence WHERE id = ?1",
                params![evidence_id],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| StorageError::EvidenceNotFound(evidence_id.to_string()))?;

        let mut ids: Vec<String> = serde_json::from_str(&json)?;
        let before = ids.len();
        ids.retain(|id| id != promise_id);
        let removed = ids.len() < before;

        if removed {
            tx.execute(
                "UPDATE evidence SET promise_ids_json = ?1 WHERE id = ?2",
                params![serde_json::to_string(&ids)?, evidence_id],
            )?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn dedupe_promise_refs(&self, evidence_id: &str) -> StorageResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let json: Option<String> = tx
            .query_row(
                "SELECT promise_ids_json FROM evidence WHERE id = ?1",
                params![evidence_id],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| StorageError::EvidenceNotFound(evidence_id.to_string()))?;

        let ids: Vec<String> = serde_json::from_str(&json)?;
        let before = ids.len();
        let mut seen = std::collections::HashSet::new();
        let deduped: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        let removed = before - deduped.len();

        if removed > 0 {
            tx.execute(
                "UPDATE evidence SET promise_ids_json = ?1 WHERE id = ?2",
                params![serde_json::to_string(&deduped)?, evidence_id],
            )?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn set_linking_status(
        &self,
        evidence_id: &str,
        status: LinkingStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE evidence SET linking_status = ?1, linking_error = ?2 WHERE id = ?3",
            params![status.as_str(), error, evidence_id],
        )?;
        if updated == 0 {
            return Err(StorageError::EvidenceNotFound(evidence_id.to_string()));
        }
        Ok(())
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}
