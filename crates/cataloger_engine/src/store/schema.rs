use rusqlite::Connection;

pub(super) fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS servers (
            url TEXT PRIMARY KEY,
            short_name TEXT,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS resources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL,
            type TEXT NOT NULL,
            subtype TEXT,
            parent_url TEXT,
            server_url TEXT NOT NULL,
            accessible INTEGER NOT NULL,
            metadata TEXT NOT NULL CHECK (json_valid(metadata)),
            name TEXT,
            description TEXT,
            start_timestamp TEXT NOT NULL,
            end_timestamp TEXT,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS fields (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_url TEXT NOT NULL,
            field_name TEXT NOT NULL,
            field_type TEXT,
            alias TEXT,
            start_timestamp TEXT NOT NULL,
            end_timestamp TEXT,
            active INTEGER NOT NULL DEFAULT 1
        );

        -- One row per coded value each time the owning field is processed.
        CREATE TABLE IF NOT EXISTS domains (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_url TEXT NOT NULL,
            field_name TEXT NOT NULL,
            domain_code TEXT,
            domain_value TEXT
        );

        CREATE TABLE IF NOT EXISTS processing_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            server_url TEXT NOT NULL,
            run_date TEXT NOT NULL,
            start_timestamp TEXT NOT NULL,
            end_timestamp TEXT
        );

        CREATE TABLE IF NOT EXISTS counts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            layer_url TEXT NOT NULL,
            record_count INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS count_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            server_url TEXT NOT NULL,
            run_date TEXT NOT NULL,
            start_timestamp TEXT NOT NULL,
            end_timestamp TEXT
        );

        -- At most one active version per key.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_resources_active_url
            ON resources(url) WHERE active = 1;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_fields_active_key
            ON fields(resource_url, field_name) WHERE active = 1;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_counts_active_layer
            ON counts(layer_url) WHERE active = 1;

        CREATE INDEX IF NOT EXISTS idx_resources_url
            ON resources(url);
        CREATE INDEX IF NOT EXISTS idx_resources_server_type
            ON resources(server_url, type) WHERE active = 1;
        CREATE INDEX IF NOT EXISTS idx_fields_resource
            ON fields(resource_url);
        CREATE INDEX IF NOT EXISTS idx_domains_field
            ON domains(resource_url, field_name);
        CREATE INDEX IF NOT EXISTS idx_processing_runs_server
            ON processing_runs(server_url, run_date);
        CREATE INDEX IF NOT EXISTS idx_count_runs_server
            ON count_runs(server_url, run_date);
        CREATE INDEX IF NOT EXISTS idx_counts_layer
            ON counts(layer_url);
    "#,
    )
}
