use std::collections::HashSet;

use rusqlite::params;

use crate::sqlite::SqliteGraphStore;
use crate::sqlite_helpers::{blob_to_vector, vector_to_blob, CompiledFilters};
use crate::store::{
    EmbeddingRow, GraphStore, ResolutionPatch, SearchCriteria, SearchPage, StoreStats,
};
use crate::types::{
    Component, EdgeDirection, EntityKind, Relationship, RelationshipKind, StoreError,
    EXTERNAL_PREFIX, RESOLVE_PREFIX,
};

impl GraphStore for SqliteGraphStore {
    fn upsert_file(
        &mut self,
        file_path: &str,
        content_hash: &str,
        components: &[Component],
        relationships: &[Relationship],
    ) -> Result<(), StoreError> {
        let batch_ids: HashSet<&str> = components.iter().map(|c| c.id.as_str()).collect();

        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM relationships WHERE file_path = ?1",
            params![file_path],
        )?;
        tx.execute(
            "DELETE FROM components WHERE file_path = ?1",
            params![file_path],
        )?;
        tx.execute(
            "INSERT INTO files (file_path, content_hash) VALUES (?1, ?2)
             ON CONFLICT(file_path) DO UPDATE
                SET content_hash = excluded.content_hash,
                    indexed_at = datetime('now')",
            params![file_path, content_hash],
        )?;

        for component in components {
            if component.file_path != file_path {
                return Err(StoreError::Integrity(format!(
                    "component {} belongs to {}, not {}",
                    component.id, component.file_path, file_path
                )));
            }
            SqliteGraphStore::insert_component(&tx, component)?;
        }

        for relationship in relationships {
            let source = relationship.source_id.as_str();
            let known = batch_ids.contains(source)
                || source.starts_with(EXTERNAL_PREFIX)
                || source.starts_with(RESOLVE_PREFIX)
                || component_exists(&tx, source)?;
            if !known {
                return Err(StoreError::Integrity(format!(
                    "relationship {} has unknown source {}",
                    relationship.id, source
                )));
            }
            SqliteGraphStore::insert_relationship(&tx, file_path, relationship)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn remove_file(&mut self, file_path: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        // Cascade: edges owned by the file, then edges whose source was a
        // component of the file, then the components and file row.
        tx.execute(
            "DELETE FROM relationships WHERE file_path = ?1
             OR source_id IN (SELECT id FROM components WHERE file_path = ?1)",
            params![file_path],
        )?;
        tx.execute(
            "DELETE FROM embeddings WHERE entity_kind = 'component'
             AND entity_id IN (SELECT id FROM components WHERE file_path = ?1)",
            params![file_path],
        )?;
        tx.execute(
            "DELETE FROM components WHERE file_path = ?1",
            params![file_path],
        )?;
        tx.execute("DELETE FROM files WHERE file_path = ?1", params![file_path])?;
        tx.commit()?;
        Ok(())
    }

    fn file_content_hash(&self, file_path: &str) -> Option<String> {
        self.conn
            .query_row(
                "SELECT content_hash FROM files WHERE file_path = ?1",
                params![file_path],
                |row| row.get(0),
            )
            .ok()
    }

    fn get_component(&self, id: &str) -> Option<Component> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM components WHERE id = ?1")
            .ok()?;
        stmt.query_row(params![id], Self::row_to_component).ok()
    }

    fn components_in_file(&self, file_path: &str) -> Vec<Component> {
        let mut stmt = match self
            .conn
            .prepare("SELECT * FROM components WHERE file_path = ?1 ORDER BY id")
        {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[felix] components_in_file: prepare failed: {e}");
                return Vec::new();
            }
        };
        let result = match stmt.query_map(params![file_path], Self::row_to_component) {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(e) => {
                eprintln!("[felix] components_in_file: query failed: {e}");
                Vec::new()
            }
        };
        result
    }

    fn search(&self, criteria: &SearchCriteria) -> Result<SearchPage, StoreError> {
        let filters = CompiledFilters::compile(criteria)?;

        let mut sql = "SELECT * FROM components".to_string();
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if !criteria.kinds.is_empty() {
            let placeholders: Vec<String> = (0..criteria.kinds.len())
                .map(|i| format!("?{}", values.len() + i + 1))
                .collect();
            clauses.push(format!("kind IN ({})", placeholders.join(", ")));
            values.extend(criteria.kinds.iter().map(|k| k.as_str().to_string()));
        }
        if !criteria.languages.is_empty() {
            let placeholders: Vec<String> = (0..criteria.languages.len())
                .map(|i| format!("?{}", values.len() + i + 1))
                .collect();
            clauses.push(format!("language IN ({})", placeholders.join(", ")));
            values.extend(criteria.languages.iter().map(|l| l.as_str().to_string()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_component)?;

        let matched: Vec<Component> = rows
            .filter_map(|r| r.ok())
            .filter(|c| filters.matches(c))
            .collect();

        let total = matched.len();
        let offset = criteria.offset;
        let limit = if criteria.limit == 0 {
            total
        } else {
            criteria.limit
        };
        let items: Vec<Component> = matched.into_iter().skip(offset).take(limit).collect();
        let has_more = offset + items.len() < total;

        Ok(SearchPage {
            items,
            total,
            has_more,
            offset,
            limit,
        })
    }

    fn neighbors(
        &self,
        id: &str,
        direction: EdgeDirection,
        kinds: Option<&[RelationshipKind]>,
        limit: Option<usize>,
    ) -> Vec<Relationship> {
        // Inverse forms are a read-side view: a query for `called_by` edges
        // serves the stored `calls` records from the incoming side.
        let mut sql = match direction {
            EdgeDirection::Incoming => {
                "SELECT * FROM relationships WHERE target_id = ?1".to_string()
            }
            EdgeDirection::Outgoing => {
                "SELECT * FROM relationships WHERE source_id = ?1".to_string()
            }
            EdgeDirection::Both => {
                "SELECT * FROM relationships WHERE source_id = ?1 OR target_id = ?1".to_string()
            }
        };
        let mut values: Vec<String> = vec![id.to_string()];
        if let Some(kinds) = kinds {
            let canonical: Vec<&str> = kinds
                .iter()
                .map(|k| {
                    if k.is_inverse_form() {
                        k.inverse().unwrap_or(*k).as_str()
                    } else {
                        k.as_str()
                    }
                })
                .collect();
            let placeholders: Vec<String> = (0..canonical.len())
                .map(|i| format!("?{}", i + 2))
                .collect();
            sql.push_str(&format!(" AND kind IN ({})", placeholders.join(", ")));
            values.extend(canonical.iter().map(|s| s.to_string()));
        }
        sql.push_str(" ORDER BY strength DESC, id ASC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = match self.conn.prepare(&sql) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[felix] neighbors: prepare failed: {e}");
                return Vec::new();
            }
        };
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        let result = match stmt.query_map(param_refs.as_slice(), Self::row_to_relationship) {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(e) => {
                eprintln!("[felix] neighbors: query failed: {e}");
                Vec::new()
            }
        };
        result
    }

    fn unresolved(&self) -> Result<Vec<Relationship>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM relationships WHERE needs_resolution = 1 ORDER BY id")?;
        let rows = stmt.query_map([], Self::row_to_relationship)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn apply_resolution_patch(&mut self, patches: &[ResolutionPatch]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        for patch in patches {
            let existing = {
                let mut stmt = tx.prepare("SELECT * FROM relationships WHERE id = ?1")?;
                stmt.query_row(params![patch.relationship_id], SqliteGraphStore::row_to_relationship)
                    .map_err(|_| {
                        StoreError::RelationshipNotFound(patch.relationship_id.clone())
                    })?
            };

            let mut metadata = existing.metadata.clone();
            let mut target_id = existing.target_id.clone();
            let mut source_id = existing.source_id.clone();

            if let Some(resolved) = &patch.resolved_target_id {
                target_id = resolved.clone();
                metadata.needs_resolution = false;
            }
            if let Some(resolved) = &patch.resolved_source_id {
                source_id = resolved.clone();
                metadata.needs_resolution = false;
            }
            if let Some(meta_patch) = &patch.metadata_patch {
                if let Some(confidence) = meta_patch.confidence {
                    metadata.confidence = confidence;
                }
                if let Some(is_external) = meta_patch.is_external {
                    metadata.is_external = is_external;
                }
                if let Some(is_junk) = meta_patch.is_junk {
                    metadata.is_junk = is_junk;
                }
                if let Some(reason) = &meta_patch.last_attempt_reason {
                    metadata.last_attempt_reason = reason.clone();
                }
                for (key, value) in &meta_patch.extras {
                    metadata.extras.insert(key.clone(), value.clone());
                }
            }

            let metadata_json = serde_json::to_string(&metadata)
                .map_err(|e| StoreError::Integrity(e.to_string()))?;
            tx.execute(
                "UPDATE relationships
                 SET source_id = ?2, target_id = ?3, confidence = ?4,
                     needs_resolution = ?5, metadata = ?6
                 WHERE id = ?1",
                params![
                    patch.relationship_id,
                    source_id,
                    target_id,
                    metadata.confidence,
                    metadata.needs_resolution as i64,
                    metadata_json,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn store_embedding(&mut self, row: &EmbeddingRow) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO embeddings (entity_id, entity_kind, vector, dims, model_version, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(entity_id, entity_kind) DO UPDATE
                SET vector = excluded.vector,
                    dims = excluded.dims,
                    model_version = excluded.model_version,
                    content_hash = excluded.content_hash,
                    updated_at = datetime('now')",
            params![
                row.entity_id,
                row.entity_kind.as_str(),
                vector_to_blob(&row.vector),
                row.vector.len() as i64,
                row.model_version,
                row.content_hash,
            ],
        )?;
        Ok(())
    }

    fn embedding_content_hash(&self, entity_id: &str, entity_kind: EntityKind) -> Option<String> {
        self.conn
            .query_row(
                "SELECT content_hash FROM embeddings WHERE entity_id = ?1 AND entity_kind = ?2",
                params![entity_id, entity_kind.as_str()],
                |row| row.get(0),
            )
            .ok()
    }

    fn embeddings_by_kind(&self, entity_kind: EntityKind) -> Result<Vec<EmbeddingRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_id, entity_kind, vector, model_version, content_hash
             FROM embeddings WHERE entity_kind = ?1 ORDER BY entity_id",
        )?;
        let rows = stmt.query_map(params![entity_kind.as_str()], |row| {
            let kind_str: String = row.get(1)?;
            let blob: Vec<u8> = row.get(2)?;
            Ok(EmbeddingRow {
                entity_id: row.get(0)?,
                entity_kind: EntityKind::parse_str(&kind_str).unwrap_or(EntityKind::Component),
                vector: blob_to_vector(&blob),
                model_version: row.get(3)?,
                content_hash: row.get(4)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats {
            components: count(&self.conn, "SELECT COUNT(*) FROM components")?,
            relationships: count(&self.conn, "SELECT COUNT(*) FROM relationships")?,
            embeddings: count(&self.conn, "SELECT COUNT(*) FROM embeddings")?,
            unresolved_relationships: count(
                &self.conn,
                "SELECT COUNT(*) FROM relationships WHERE needs_resolution = 1",
            )?,
            files: count(&self.conn, "SELECT COUNT(*) FROM files")?,
            ..Default::default()
        };

        let mut stmt = self
            .conn
            .prepare("SELECT language, COUNT(*) FROM components GROUP BY language")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        for row in rows.filter_map(|r| r.ok()) {
            stats.by_language.insert(row.0, row.1);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM components GROUP BY kind")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        for row in rows.filter_map(|r| r.ok()) {
            stats.by_kind.insert(row.0, row.1);
        }

        Ok(stats)
    }
}

fn component_exists(conn: &rusqlite::Connection, id: &str) -> Result<bool, StoreError> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM components WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(exists.is_some())
}

fn count(conn: &rusqlite::Connection, sql: &str) -> Result<usize, StoreError> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as usize)
}
