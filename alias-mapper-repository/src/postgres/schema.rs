//! Table layout.
//!
//! The mapper owns `mapping_rows` and `group_checkpoints` and creates them on
//! startup. `entities`, `entity_aliases` and `records` belong to the source
//! system and are only read:
//!
//! - `entities (id TEXT PRIMARY KEY, name TEXT)`
//! - `entity_aliases (entity_id TEXT, alias TEXT)`
//! - `records (id TEXT PRIMARY KEY, is_verified BOOLEAN)`

pub(crate) const CREATE_MAPPINGS: &str = r#"
    CREATE TABLE IF NOT EXISTS mapping_rows (
        record_id   TEXT NOT NULL,
        entity_id   TEXT NOT NULL,
        confidence  DOUBLE PRECISION NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (record_id, entity_id)
    )
"#;

pub(crate) const CREATE_CHECKPOINTS: &str = r#"
    CREATE TABLE IF NOT EXISTS group_checkpoints (
        group_id      TEXT PRIMARY KEY,
        completed_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

pub(crate) const UPSERT_MAPPINGS: &str = r#"
    INSERT INTO mapping_rows (record_id, entity_id, confidence)
    SELECT * FROM UNNEST($1::text[], $2::text[], $3::float8[])
    ON CONFLICT (record_id, entity_id) DO UPDATE
    SET confidence = GREATEST(mapping_rows.confidence, EXCLUDED.confidence),
        updated_at = now()
"#;

pub(crate) const GROUP_COMPLETE: &str =
    "SELECT EXISTS (SELECT 1 FROM group_checkpoints WHERE group_id = $1)";

pub(crate) const MARK_GROUP_COMPLETE: &str = r#"
    INSERT INTO group_checkpoints (group_id)
    VALUES ($1)
    ON CONFLICT (group_id) DO NOTHING
"#;

pub(crate) const COMPLETED_GROUPS: &str =
    "SELECT group_id FROM group_checkpoints ORDER BY completed_at";

pub(crate) const LOAD_ENTITIES: &str = "SELECT id, name FROM entities ORDER BY id";

pub(crate) const LOAD_ALIASES: &str =
    "SELECT entity_id, alias FROM entity_aliases WHERE alias IS NOT NULL ORDER BY entity_id, alias";

pub(crate) const VERIFIED_RECORDS: &str =
    "SELECT id FROM records WHERE id = ANY($1) AND is_verified";
