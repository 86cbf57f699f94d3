//! Integration tests for the migration run against a real SQLite store.

use caol_migrate::error::{ErrorKind, MigrateError};
use caol_migrate::migrate::{self, MigrateConfig};
use caol_migrate::parser::SplitMode;
use caol_migrate::routes::{RouteTable, TableRoute};
use rusqlite::Connection;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCHEMA_CLIENTE: &str = "CREATE TABLE cao_cliente (
    co_cliente INTEGER PRIMARY KEY,
    no_razao VARCHAR,
    dt_cadastro DATETIME
);";

const SCHEMA_FATURA: &str = "CREATE TABLE cao_fatura (
    co_fatura INTEGER PRIMARY KEY,
    co_cliente INTEGER,
    valor REAL,
    data_emissao DATE
);";

struct Fixture {
    dir: TempDir,
    migrations: PathBuf,
    dump: PathBuf,
    database: PathBuf,
}

impl Fixture {
    fn new(scripts: &[(&str, &str)], dump: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let migrations = dir.path().join("migrations");
        fs::create_dir(&migrations).unwrap();
        for (name, sql) in scripts {
            fs::write(migrations.join(name), sql).unwrap();
        }
        let dump_path = dir.path().join("banco_de_dados.sql");
        fs::write(&dump_path, dump).unwrap();
        let database = dir.path().join("caol.db");

        Self {
            dir,
            migrations,
            dump: dump_path,
            database,
        }
    }

    fn config(&self, routes: Vec<TableRoute>) -> MigrateConfig {
        let mut config = MigrateConfig::new(
            Some(self.database.clone()),
            self.migrations.clone(),
            self.dump.clone(),
        );
        config.routes = RouteTable::new(routes).unwrap();
        config
    }

    fn open(&self) -> Connection {
        Connection::open(&self.database).unwrap()
    }
}

fn query_rows(conn: &Connection, sql: &str) -> Vec<Vec<String>> {
    let mut stmt = conn.prepare(sql).unwrap();
    let mut rows = stmt.query([]).unwrap();
    let mut out = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        let mut values = Vec::new();
        let mut i = 0;
        while let Ok(v) = row.get::<_, Option<String>>(i) {
            values.push(v.unwrap_or_else(|| "NULL".to_string()));
            i += 1;
        }
        out.push(values);
    }
    out
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            rusqlite::params![table],
            |r| r.get(0),
        )
        .unwrap();
    count > 0
}

fn migrate_error(err: &anyhow::Error) -> &MigrateError {
    err.downcast_ref::<MigrateError>()
        .expect("error should be a MigrateError")
}

// =============================================================================
// Scenario A: multi-tuple line with hex date and sentinel date
// =============================================================================

#[test]
fn test_scenario_a_rows_normalized_and_inserted() {
    let dump = "-- MySQL dump\n\
        INSERT INTO old_t VALUES (1,'a',0x323030302d30312d3031),(2,'b','0000-00-00 00:00:00');\n";
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], dump);
    let config = fx.config(vec![TableRoute::new(2, 2, "cao_cliente")]);

    let stats = migrate::run(&config).unwrap();
    assert!(stats.committed);
    assert_eq!(stats.rows_inserted, 2);
    assert_eq!(stats.rows_for("cao_cliente"), 2);
    assert_eq!(stats.cells.hex_dates, 1);
    assert_eq!(stats.cells.sentinel_dates, 1);

    let conn = fx.open();
    let rows = query_rows(
        &conn,
        "SELECT CAST(co_cliente AS VARCHAR), no_razao, dt_cadastro FROM cao_cliente ORDER BY co_cliente",
    );
    assert_eq!(
        rows,
        vec![
            vec!["1", "a", "2000-01-01"],
            vec!["2", "b", "1800-01-00 00:00:00"],
        ]
    );
}

#[test]
fn test_placeholder_date_accepted_by_timestamp_columns() {
    let schema = "CREATE TABLE cao_usuario (
        co_usuario VARCHAR PRIMARY KEY,
        dt_nascimento DATE,
        dt_admissao_empresa TIMESTAMP,
        dt_desligamento DATETIME
    );";
    let dump = "('anapaula','0000-00-00 00:00:00',0x323030372d30312d3135,'0000-00-00 00:00:00'),\n";
    let fx = Fixture::new(&[("001_usuario.sql", schema)], dump);
    let config = fx.config(vec![TableRoute::new(1, 1, "cao_usuario")]);

    let stats = migrate::run(&config).unwrap();
    assert_eq!(stats.rows_inserted, 1);

    let conn = fx.open();
    let rows = query_rows(
        &conn,
        "SELECT dt_nascimento, dt_admissao_empresa, dt_desligamento FROM cao_usuario",
    );
    assert_eq!(
        rows,
        vec![vec!["1800-01-00 00:00:00", "2007-01-15", "1800-01-00 00:00:00"]]
    );
}

// =============================================================================
// Scenario B: lines outside every route never reach the store
// =============================================================================

#[test]
fn test_scenario_b_unrouted_lines_skipped() {
    // Line 1 would fail to parse and line 3 targets a missing table if routed
    let dump = "garbage that is not a tuple\n\
        (1,'Cliente 1','2001-01-01'),\n\
        INSERT INTO cao_salario VALUES (1,2,3);\n\
        (2,'Cliente 2','2002-02-02');\n";
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], dump);
    let config = fx.config(vec![
        TableRoute::new(2, 2, "cao_cliente"),
        TableRoute::new(4, 4, "cao_cliente"),
    ]);

    let stats = migrate::run(&config).unwrap();
    assert_eq!(stats.lines_read, 4);
    assert_eq!(stats.lines_routed, 2);
    assert_eq!(stats.lines_skipped(), 2);
    assert_eq!(stats.rows_inserted, 2);

    let conn = fx.open();
    let rows = query_rows(&conn, "SELECT no_razao FROM cao_cliente ORDER BY co_cliente");
    assert_eq!(rows, vec![vec!["Cliente 1"], vec!["Cliente 2"]]);
}

#[test]
fn test_reading_stops_after_last_route() {
    let dump = "(1,'a','x'),\n(2,'b','y');\nthis line is never read\n";
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], dump);
    let config = fx.config(vec![TableRoute::new(1, 2, "cao_cliente")]);

    let stats = migrate::run(&config).unwrap();
    assert_eq!(stats.lines_read, 2);
}

// =============================================================================
// Scenario C: decode failure rolls back everything, including schema
// =============================================================================

#[test]
fn test_scenario_c_bad_hex_rolls_back_all_rows() {
    let dump = "(1,'a',0x323030302d30312d3031),\n\
        (2,'b','2001-01-01'),\n\
        (3,'c',0x3230303),\n";
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], dump);
    let config = fx.config(vec![TableRoute::new(1, 3, "cao_cliente")]);

    let err = migrate::run(&config).unwrap_err();
    let migrate_err = migrate_error(&err);
    assert_eq!(migrate_err.kind(), ErrorKind::DecodeError);
    assert_eq!(migrate_err.line(), Some(3));

    let conn = fx.open();
    assert!(!table_exists(&conn, "cao_cliente"));
}

#[test]
fn test_non_hex_characters_abort() {
    let dump = "(1,'a',0xzz),\n";
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], dump);
    let config = fx.config(vec![TableRoute::new(1, 1, "cao_cliente")]);

    let err = migrate::run(&config).unwrap_err();
    assert_eq!(migrate_error(&err).kind(), ErrorKind::DecodeError);
}

#[test]
fn test_rollback_preserves_previous_contents() {
    let fx = Fixture::new(
        &[("001_cliente.sql", "CREATE TABLE IF NOT EXISTS cao_cliente (co_cliente INTEGER, no_razao VARCHAR, dt_cadastro VARCHAR);")],
        "(1,'first run','x'),\n",
    );
    let config = fx.config(vec![TableRoute::new(1, 1, "cao_cliente")]);
    migrate::run(&config).unwrap();

    fs::write(&fx.dump, "(2,'second run','y'),\n(3,'bad',0x4),\n").unwrap();
    let config = fx.config(vec![TableRoute::new(1, 2, "cao_cliente")]);
    assert!(migrate::run(&config).is_err());

    let conn = fx.open();
    let rows = query_rows(&conn, "SELECT no_razao FROM cao_cliente");
    assert_eq!(rows, vec![vec!["first run"]]);
}

// =============================================================================
// Scenario D: schema first; a missing table is a store error
// =============================================================================

#[test]
fn test_scenario_d_missing_table_is_store_error() {
    let dump = "(1,'a','x'),\n(7,1,10.5,'2001-01-01'),\n";
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], dump);
    let config = fx.config(vec![
        TableRoute::new(1, 1, "cao_cliente"),
        TableRoute::new(2, 2, "cao_fatura"),
    ]);

    let err = migrate::run(&config).unwrap_err();
    let migrate_err = migrate_error(&err);
    assert_eq!(migrate_err.kind(), ErrorKind::StoreError);
    assert_eq!(migrate_err.line(), Some(2));

    let conn = fx.open();
    assert!(!table_exists(&conn, "cao_cliente"));
}

#[test]
fn test_scripts_applied_in_name_order() {
    // The second script depends on the first one
    let dump = "(1,'a','x'),\n";
    let fx = Fixture::new(
        &[
            ("002_alter.sql", "ALTER TABLE cao_cliente ADD COLUMN ativo BOOLEAN;"),
            (
                "001_cliente.sql",
                "CREATE TABLE cao_cliente (co_cliente INTEGER, no_razao VARCHAR, dt_cadastro VARCHAR);",
            ),
        ],
        dump,
    );
    let config = fx.config(vec![TableRoute::new(1, 1, "cao_cliente")]);

    // Row has 3 values but the table now has 4 columns
    let err = migrate::run(&config).unwrap_err();
    assert_eq!(migrate_error(&err).kind(), ErrorKind::ColumnMismatch);
}

#[test]
fn test_column_mismatch_aborts() {
    let dump = "(1,'a'),\n";
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], dump);
    let config = fx.config(vec![TableRoute::new(1, 1, "cao_cliente")]);

    let err = migrate::run(&config).unwrap_err();
    let migrate_err = migrate_error(&err);
    assert_eq!(migrate_err.kind(), ErrorKind::ColumnMismatch);
    assert!(err.to_string().starts_with("line 1: ColumnMismatch"));
}

#[test]
fn test_constraint_violation_is_store_error() {
    let dump = "(1,'a','x'),\n(2,NULL,'y'),\n";
    let fx = Fixture::new(
        &[(
            "001_cliente.sql",
            "CREATE TABLE cao_cliente (co_cliente INTEGER, no_razao VARCHAR NOT NULL, dt_cadastro VARCHAR);",
        )],
        dump,
    );
    let config = fx.config(vec![TableRoute::new(1, 2, "cao_cliente")]);

    let err = migrate::run(&config).unwrap_err();
    let migrate_err = migrate_error(&err);
    assert_eq!(migrate_err.kind(), ErrorKind::StoreError);
    assert_eq!(migrate_err.line(), Some(2));
}

#[test]
fn test_malformed_insert_line() {
    let dump = "INSERT INTO cao_cliente SELECT * FROM x;\n";
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], dump);
    let config = fx.config(vec![TableRoute::new(1, 1, "cao_cliente")]);

    let err = migrate::run(&config).unwrap_err();
    assert_eq!(migrate_error(&err).kind(), ErrorKind::MalformedLine);
}

// =============================================================================
// Routing across several tables, split modes, dry run, compression
// =============================================================================

#[test]
fn test_multiple_tables_in_route_order() {
    let dump = "-- header\n\
        INSERT INTO `cao_cliente` VALUES (1,'Agence','2007-01-01'),\n\
        (2,'Outra','0000-00-00 00:00:00');\n\
        -- between\n\
        INSERT INTO `cao_fatura` VALUES (10,1,1500.5,0x323030372d30322d3031),\n\
        (11,2,99.9,'2007-03-01');\n";
    let fx = Fixture::new(
        &[("001_cliente.sql", SCHEMA_CLIENTE), ("002_fatura.sql", SCHEMA_FATURA)],
        dump,
    );
    let config = fx.config(vec![
        TableRoute::new(5, 6, "cao_fatura"),
        TableRoute::new(2, 3, "cao_cliente"),
    ]);

    let stats = migrate::run(&config).unwrap();
    assert_eq!(stats.scripts_applied, 2);
    assert_eq!(stats.tables[0].table, "cao_cliente");
    assert_eq!(stats.tables[1].table, "cao_fatura");
    assert_eq!(stats.rows_for("cao_cliente"), 2);
    assert_eq!(stats.rows_for("cao_fatura"), 2);

    let conn = fx.open();
    let rows = query_rows(
        &conn,
        "SELECT data_emissao FROM cao_fatura ORDER BY co_fatura",
    );
    assert_eq!(rows, vec![vec!["2007-02-01"], vec!["2007-03-01"]]);
    let rows = query_rows(&conn, "SELECT dt_cadastro FROM cao_cliente WHERE co_cliente = 2");
    assert_eq!(rows, vec![vec!["1800-01-00 00:00:00"]]);
}

#[test]
fn test_fixed_width_mode_matches_historical_output() {
    let dump = "(1,'Agence',0x323030372d30312d3031),\n(2,'Outra','0000-00-00 00:00:00');\n";
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], dump);
    let mut config = fx.config(vec![TableRoute::new(1, 2, "cao_cliente")]);
    config.split_mode = SplitMode::FixedWidth;

    let stats = migrate::run(&config).unwrap();
    assert_eq!(stats.rows_inserted, 2);

    let conn = fx.open();
    let rows = query_rows(&conn, "SELECT dt_cadastro FROM cao_cliente ORDER BY co_cliente");
    assert_eq!(rows, vec![vec!["2007-01-01"], vec!["1800-01-00 00:00:00"]]);
}

#[test]
fn test_dry_run_leaves_database_untouched() {
    let dump = "(1,'a','x'),\n";
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], dump);
    let mut config = fx.config(vec![TableRoute::new(1, 1, "cao_cliente")]);
    config.dry_run = true;

    let stats = migrate::run(&config).unwrap();
    assert!(!stats.committed);
    assert_eq!(stats.rows_inserted, 1);

    let conn = fx.open();
    assert!(!table_exists(&conn, "cao_cliente"));
}

#[test]
fn test_gzip_dump() {
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], "");
    let gz_path = fx.dir.path().join("banco_de_dados.sql.gz");
    write_gzip(&gz_path, b"-- header\n(1,'a','x'),\n");

    let mut config = fx.config(vec![TableRoute::new(2, 2, "cao_cliente")]);
    config.dump = gz_path;

    let stats = migrate::run(&config).unwrap();
    assert_eq!(stats.rows_inserted, 1);
}

#[test]
fn test_in_memory_store() {
    let fx = Fixture::new(&[("001_cliente.sql", SCHEMA_CLIENTE)], "(1,'a','x'),\n");
    let mut config = fx.config(vec![TableRoute::new(1, 1, "cao_cliente")]);
    config.database = None;

    let stats = migrate::run(&config).unwrap();
    assert!(stats.committed);
    assert!(!fx.database.exists());
}

#[test]
fn test_missing_schema_dir() {
    let fx = Fixture::new(&[], "(1,'a','x'),\n");
    let mut config = fx.config(vec![TableRoute::new(1, 1, "cao_cliente")]);
    config.schema_dir = fx.dir.path().join("does-not-exist");

    assert!(migrate::run(&config).is_err());
}

fn write_gzip(path: &Path, content: &[u8]) {
    let file = fs::File::create(path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap();
}
