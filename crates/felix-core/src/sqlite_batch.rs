use std::collections::HashMap;

use crate::sqlite::SqliteGraphStore;
use crate::types::{Component, Relationship};

impl SqliteGraphStore {
    /// Batch-load components by id in a single query. Replaces N individual
    /// `get_component()` calls with 1 query; absent ids are simply missing
    /// from the result map.
    pub fn components_by_ids(&self, ids: &[String]) -> HashMap<String, Component> {
        if ids.is_empty() {
            return HashMap::new();
        }
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT * FROM components WHERE id IN ({})",
            placeholders.join(", ")
        );
        let mut stmt = match self.conn.prepare(&sql) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[felix] components_by_ids: prepare failed: {e}");
                return HashMap::new();
            }
        };
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let rows = match stmt.query_map(params.as_slice(), Self::row_to_component) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("[felix] components_by_ids: query failed: {e}");
                return HashMap::new();
            }
        };
        rows.filter_map(|r| r.ok())
            .map(|c| (c.id.clone(), c))
            .collect()
    }

    /// Batch-load all relationships whose source or target is one of the
    /// given ids. Used to assemble cross-references for a candidate set in
    /// a single round trip.
    pub fn relationships_among(&self, ids: &[String]) -> Vec<Relationship> {
        if ids.is_empty() {
            return Vec::new();
        }
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
        let list = placeholders.join(", ");
        let sql = format!(
            "SELECT * FROM relationships WHERE source_id IN ({list}) OR target_id IN ({list})
             ORDER BY id"
        );
        // The two IN lists reuse the same placeholders, so bind once.
        let mut stmt = match self.conn.prepare(&sql) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[felix] relationships_among: prepare failed: {e}");
                return Vec::new();
            }
        };
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let result = match stmt.query_map(params.as_slice(), Self::row_to_relationship) {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(e) => {
                eprintln!("[felix] relationships_among: query failed: {e}");
                Vec::new()
            }
        };
        result
    }
}
