use rusqlite::{params, Connection, Result as SqlResult};

use crate::types::{
    CapabilityBlock, CapabilitySet, Component, ComponentKind, ComponentMetadata, Language,
    ParsingLevel, Relationship, RelationshipKind, RelationshipMetadata, SourceLocation,
    StoreError,
};

/// An ordered schema migration. Every step ships a reversible `down` so an
/// operator can roll a store back one version at a time.
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        up: "
            CREATE TABLE IF NOT EXISTS felix_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Indexed files, keyed by path, with the content hash recorded
            -- at upsert for incremental skip.
            CREATE TABLE files (
                file_path TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                indexed_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE components (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                language TEXT NOT NULL,
                file_path TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                start_column INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                end_column INTEGER NOT NULL,
                parent_id TEXT,
                code TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                parsing_level TEXT NOT NULL,
                backend TEXT NOT NULL,
                capabilities TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX idx_components_file ON components(file_path);
            CREATE INDEX idx_components_lang_kind ON components(language, kind);

            CREATE TABLE relationships (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                file_path TEXT NOT NULL,
                start_line INTEGER,
                start_column INTEGER,
                end_line INTEGER,
                end_column INTEGER,
                confidence REAL NOT NULL DEFAULT 1.0,
                strength REAL NOT NULL DEFAULT 1.0,
                needs_resolution INTEGER NOT NULL DEFAULT 0,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX idx_relationships_source ON relationships(source_id);
            CREATE INDEX idx_relationships_target ON relationships(target_id);
            CREATE INDEX idx_relationships_kind ON relationships(kind);

            CREATE TABLE embeddings (
                entity_id TEXT NOT NULL,
                entity_kind TEXT NOT NULL,
                vector BLOB NOT NULL,
                dims INTEGER NOT NULL,
                model_version TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (entity_id, entity_kind)
            );
            CREATE INDEX idx_embeddings_kind ON embeddings(entity_kind, entity_id);
        ",
        down: "
            DROP INDEX idx_embeddings_kind;
            DROP TABLE embeddings;
            DROP INDEX idx_relationships_kind;
            DROP INDEX idx_relationships_target;
            DROP INDEX idx_relationships_source;
            DROP TABLE relationships;
            DROP INDEX idx_components_lang_kind;
            DROP INDEX idx_components_file;
            DROP TABLE components;
            DROP TABLE files;
            DROP TABLE felix_meta;
        ",
    },
    Migration {
        version: 2,
        name: "strength_ordered_neighbor_indexes",
        up: "
            CREATE INDEX idx_relationships_source_strength
                ON relationships(source_id, strength DESC);
            CREATE INDEX idx_relationships_target_strength
                ON relationships(target_id, strength DESC);
        ",
        down: "
            DROP INDEX idx_relationships_target_strength;
            DROP INDEX idx_relationships_source_strength;
        ",
    },
];

/// SQLite-backed implementation of the [`GraphStore`](crate::store::GraphStore)
/// trait.
pub struct SqliteGraphStore {
    pub(crate) conn: Connection,
}

impl SqliteGraphStore {
    /// Open or create an index store at the given path. Applies any pending
    /// migrations; migration failure is fatal and propagates.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = SqliteGraphStore { conn };
        store.apply_migrations()?;
        Ok(store)
    }

    /// Create an in-memory index store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteGraphStore { conn };
        store.apply_migrations()?;
        Ok(store)
    }

    fn apply_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                down_sql TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )?;

        let applied: u32 = self
            .conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
            let run = || -> Result<(), rusqlite::Error> {
                self.conn.execute_batch("BEGIN")?;
                self.conn.execute_batch(migration.up)?;
                self.conn.execute(
                    "INSERT INTO migrations (version, name, down_sql) VALUES (?1, ?2, ?3)",
                    params![migration.version, migration.name, migration.down],
                )?;
                self.conn.execute_batch("COMMIT")?;
                Ok(())
            };
            if let Err(e) = run() {
                let _ = self.conn.execute_batch("ROLLBACK");
                return Err(StoreError::Migration {
                    version: migration.version,
                    name: migration.name.to_string(),
                    message: e.to_string(),
                });
            }
        }

        Ok(())
    }

    /// The highest applied migration version.
    pub fn schema_version(&self) -> Result<u32, StoreError> {
        let version: u32 = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM migrations",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    /// Roll back the most recent migration using its recorded down step.
    pub fn rollback_last_migration(&self) -> Result<(), StoreError> {
        let row: Option<(u32, String, String)> = self
            .conn
            .query_row(
                "SELECT version, name, down_sql FROM migrations ORDER BY version DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        let Some((version, name, down_sql)) = row else {
            return Ok(());
        };

        let run = || -> Result<(), rusqlite::Error> {
            self.conn.execute_batch("BEGIN")?;
            self.conn.execute_batch(&down_sql)?;
            self.conn
                .execute("DELETE FROM migrations WHERE version = ?1", params![version])?;
            self.conn.execute_batch("COMMIT")?;
            Ok(())
        };
        if let Err(e) = run() {
            let _ = self.conn.execute_batch("ROLLBACK");
            return Err(StoreError::Migration {
                version,
                name,
                message: e.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn row_to_component(row: &rusqlite::Row) -> SqlResult<Component> {
        let kind_str: String = row.get("kind")?;
        let language_str: String = row.get("language")?;
        let level_str: String = row.get("parsing_level")?;
        let metadata_json: String = row.get("metadata")?;
        let capabilities_json: String = row.get("capabilities")?;

        let metadata: ComponentMetadata =
            serde_json::from_str(&metadata_json).unwrap_or_default();
        let capabilities: CapabilitySet =
            serde_json::from_str(&capabilities_json).unwrap_or_default();

        Ok(Component {
            id: row.get("id")?,
            name: row.get("name")?,
            kind: ComponentKind::parse_str(&kind_str).unwrap_or(ComponentKind::Unknown),
            language: Language::parse_str(&language_str).unwrap_or(Language::Unknown),
            file_path: row.get("file_path")?,
            location: SourceLocation {
                start_line: row.get("start_line")?,
                start_column: row.get("start_column")?,
                end_line: row.get("end_line")?,
                end_column: row.get("end_column")?,
            },
            parent_id: row.get("parent_id")?,
            code: row.get("code")?,
            metadata,
            capability: CapabilityBlock {
                parsing_level: ParsingLevel::parse_str(&level_str)
                    .unwrap_or(ParsingLevel::Basic),
                backend: row.get("backend")?,
                capabilities,
            },
        })
    }

    pub(crate) fn row_to_relationship(row: &rusqlite::Row) -> SqlResult<Relationship> {
        let kind_str: String = row.get("kind")?;
        let metadata_json: String = row.get("metadata")?;
        let mut metadata: RelationshipMetadata =
            serde_json::from_str(&metadata_json).unwrap_or_default();
        // Indexed columns are authoritative over the JSON copy.
        metadata.confidence = row.get("confidence")?;
        metadata.strength = row.get("strength")?;
        metadata.needs_resolution = row.get::<_, i64>("needs_resolution")? != 0;

        let start_line: Option<u32> = row.get("start_line")?;
        let location = match start_line {
            Some(start_line) => Some(SourceLocation {
                start_line,
                start_column: row.get::<_, Option<u32>>("start_column")?.unwrap_or(1),
                end_line: row.get::<_, Option<u32>>("end_line")?.unwrap_or(start_line),
                end_column: row.get::<_, Option<u32>>("end_column")?.unwrap_or(1),
            }),
            None => None,
        };

        Ok(Relationship {
            id: row.get("id")?,
            source_id: row.get("source_id")?,
            target_id: row.get("target_id")?,
            kind: RelationshipKind::parse_str(&kind_str).unwrap_or(RelationshipKind::References),
            location,
            metadata,
        })
    }

    pub(crate) fn insert_component(
        conn: &Connection,
        component: &Component,
    ) -> Result<(), StoreError> {
        if !component.location.is_valid() {
            return Err(StoreError::Integrity(format!(
                "component {} has an empty or non-monotonic location",
                component.id
            )));
        }
        if !component.is_file() && component.parent_id.is_none() {
            return Err(StoreError::Integrity(format!(
                "non-file component {} ({}) has no parent",
                component.id, component.name
            )));
        }
        let metadata_json = serde_json::to_string(&component.metadata)
            .map_err(|e| StoreError::Integrity(e.to_string()))?;
        let capabilities_json = serde_json::to_string(&component.capability.capabilities)
            .map_err(|e| StoreError::Integrity(e.to_string()))?;
        conn.execute(
            "INSERT INTO components (id, name, kind, language, file_path,
                start_line, start_column, end_line, end_column,
                parent_id, code, metadata, parsing_level, backend, capabilities)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                component.id,
                component.name,
                component.kind.as_str(),
                component.language.as_str(),
                component.file_path,
                component.location.start_line,
                component.location.start_column,
                component.location.end_line,
                component.location.end_column,
                component.parent_id,
                component.code,
                metadata_json,
                component.capability.parsing_level.as_str(),
                component.capability.backend,
                capabilities_json,
            ],
        )?;
        Ok(())
    }

    pub(crate) fn insert_relationship(
        conn: &Connection,
        file_path: &str,
        relationship: &Relationship,
    ) -> Result<(), StoreError> {
        let metadata_json = serde_json::to_string(&relationship.metadata)
            .map_err(|e| StoreError::Integrity(e.to_string()))?;
        conn.execute(
            "INSERT INTO relationships (id, source_id, target_id, kind, file_path,
                start_line, start_column, end_line, end_column,
                confidence, strength, needs_resolution, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                relationship.id,
                relationship.source_id,
                relationship.target_id,
                relationship.kind.as_str(),
                file_path,
                relationship.location.map(|l| l.start_line),
                relationship.location.map(|l| l.start_column),
                relationship.location.map(|l| l.end_line),
                relationship.location.map(|l| l.end_column),
                relationship.metadata.confidence,
                relationship.metadata.strength,
                relationship.metadata.needs_resolution as i64,
                metadata_json,
            ],
        )?;
        Ok(())
    }
}
