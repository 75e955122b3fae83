//! Integration tests exercising the facade end to end against the embedded
//! store: object round trips, delimited export/import, and config-driven
//! construction.

use dbframe::{
    Column, ColumnType, Database, DbError, EntityBinding, Table, TransactionState,
};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq)]
struct Player {
    id: i64,
    name: String,
    score: i64,
}

fn player_binding() -> EntityBinding<Player> {
    EntityBinding::builder()
        .field("id", |p: &Player| Some(p.id.to_string()))
        .field("name", |p: &Player| Some(p.name.clone()))
        .field("score", |p: &Player| Some(p.score.to_string()))
        .constructor(&["id", "name", "score"], |args| {
            Ok(Player {
                id: args.parse(0)?,
                name: args.get(1)?.to_string(),
                score: args.parse(2)?,
            })
        })
        .build()
        .unwrap()
}

fn players_table() -> Table {
    Table::new("players")
        .add_column(Column::new("id", ColumnType::Int).not_null())
        .add_column(Column::new("name", ColumnType::Varchar(None)))
        .add_column(Column::new("score", ColumnType::Int))
        .primary_key("id")
}

fn connected_db() -> Database {
    let mut db = Database::embedded(":memory:");
    db.connect().unwrap();
    db
}

#[test]
fn object_round_trip_preserves_bound_fields() {
    let mut db = connected_db();
    db.create_table(&players_table()).unwrap();
    db.register_binding(player_binding());

    let original = Player {
        id: 42,
        name: "Alice".to_string(),
        score: 1300,
    };
    db.write_object("players", &original).unwrap();

    let loaded: Player = db.read_object("players", "id", "42").unwrap();
    assert_eq!(loaded, original);
}

#[test]
fn read_object_without_match_is_row_not_found() {
    let mut db = connected_db();
    db.create_table(&players_table()).unwrap();
    db.register_binding(player_binding());

    let result: Result<Player, _> = db.read_object("players", "id", "7");
    match result {
        Err(DbError::RowNotFound { table, key, value }) => {
            assert_eq!(table, "players");
            assert_eq!(key, "id");
            assert_eq!(value, "7");
        }
        other => panic!("expected RowNotFound, got {other:?}"),
    }
}

#[test]
fn read_object_without_registered_binding_is_no_constructor() {
    let mut db = connected_db();
    db.create_table(&players_table()).unwrap();

    let result: Result<Player, _> = db.read_object("players", "id", "1");
    assert!(matches!(result, Err(DbError::NoConstructor(_))));
}

#[test]
fn write_object_without_registered_binding_is_serialization_error() {
    let mut db = connected_db();
    db.create_table(&players_table()).unwrap();

    let player = Player {
        id: 1,
        name: "Bob".to_string(),
        score: 0,
    };
    assert!(matches!(
        db.write_object("players", &player),
        Err(DbError::Serialization(_))
    ));
}

#[test]
fn read_object_with_multiple_matches_takes_first() {
    let mut db = connected_db();
    // no primary key so duplicate scores can match
    let table = Table::new("players")
        .add_column(Column::new("id", ColumnType::Int))
        .add_column(Column::new("name", ColumnType::Varchar(None)))
        .add_column(Column::new("score", ColumnType::Int));
    db.create_table(&table).unwrap();
    db.register_binding(player_binding());

    db.insert("players", &[("id", "1"), ("name", "Alice"), ("score", "10")])
        .unwrap();
    db.insert("players", &[("id", "2"), ("name", "Bob"), ("score", "10")])
        .unwrap();

    let loaded: Player = db.read_object("players", "score", "10").unwrap();
    assert_eq!(loaded.name, "Alice");
}

#[test]
fn export_then_import_round_trips_rows() {
    let dir = tempdir().unwrap();
    let export_path = dir.path().join("players.csv");

    let mut db = connected_db();
    db.create_table(&players_table()).unwrap();
    db.insert("players", &[("id", "1"), ("name", "Alice"), ("score", "10")])
        .unwrap();
    db.insert("players", &[("id", "2"), ("name", "Bob"), ("score", "20")])
        .unwrap();

    db.export_to_delimited_file("players", &export_path, ",")
        .unwrap();
    let contents = std::fs::read_to_string(&export_path).unwrap();
    assert_eq!(contents, "1,Alice,10\n2,Bob,20\n");

    // import into a second table with the same shape
    let copy = Table::new("players_copy")
        .add_column(Column::new("id", ColumnType::Int))
        .add_column(Column::new("name", ColumnType::Varchar(None)))
        .add_column(Column::new("score", ColumnType::Int));
    db.create_table(&copy).unwrap();
    let imported = db
        .import_from_file("players_copy", &export_path, ",")
        .unwrap();
    assert_eq!(imported, 2);
    assert_eq!(db.count_rows("players_copy").unwrap(), 2);
    assert_eq!(
        db.get("players_copy", "id", "2", "name").unwrap().as_deref(),
        Some("Bob")
    );
}

#[test]
fn export_rejects_cells_containing_the_delimiter() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("players.csv");

    let mut db = connected_db();
    db.create_table(&players_table()).unwrap();
    db.insert("players", &[("id", "1"), ("name", "a,b"), ("score", "10")])
        .unwrap();

    match db.export_to_delimited_file("players", &path, ",") {
        Err(DbError::Serialization(msg)) => assert!(msg.contains("a,b")),
        other => panic!("expected Serialization error, got {other:?}"),
    }
    // nothing ambiguous was written
    assert!(!path.exists());

    // a delimiter the values do not contain round-trips the same row
    db.export_to_delimited_file("players", &path, "\t").unwrap();
    let copy = Table::new("players_copy")
        .add_column(Column::new("id", ColumnType::Int))
        .add_column(Column::new("name", ColumnType::Varchar(None)))
        .add_column(Column::new("score", ColumnType::Int));
    db.create_table(&copy).unwrap();
    assert_eq!(db.import_from_file("players_copy", &path, "\t").unwrap(), 1);
    assert_eq!(
        db.get("players_copy", "id", "1", "name").unwrap().as_deref(),
        Some("a,b")
    );
}

#[test]
fn export_import_round_trips_null_cells() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("players.csv");

    let mut db = connected_db();
    db.create_table(&players_table()).unwrap();
    // name stays NULL
    db.insert("players", &[("id", "1"), ("score", "10")]).unwrap();

    db.export_to_delimited_file("players", &path, ",").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,\\N,10\n");

    let copy = Table::new("players_copy")
        .add_column(Column::new("id", ColumnType::Int))
        .add_column(Column::new("name", ColumnType::Varchar(None)))
        .add_column(Column::new("score", ColumnType::Int));
    db.create_table(&copy).unwrap();
    assert_eq!(db.import_from_file("players_copy", &path, ",").unwrap(), 1);

    let all = db.select_all("players_copy").unwrap();
    assert_eq!(all.cell(0, "name"), None);
    assert_eq!(all.cell(0, "score"), Some("10"));
}

#[test]
fn failed_import_leaves_no_partial_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("players.csv");
    std::fs::write(&path, "1,Alice,10\n2,Bob,20\n3,Carol\n").unwrap();

    let mut db = connected_db();
    db.create_table(&players_table()).unwrap();
    match db.import_from_file("players", &path, ",") {
        Err(DbError::Schema(msg)) => assert!(msg.contains("line 3")),
        other => panic!("expected Schema error, got {other:?}"),
    }
    // the well-formed lines before the bad one were rolled back with it
    assert_eq!(db.count_rows("players").unwrap(), 0);
    assert_eq!(db.transaction_state(), TransactionState::Idle);
}

#[test]
fn import_rejects_misshapen_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "1,Alice\n").unwrap();

    let mut db = connected_db();
    db.create_table(&players_table()).unwrap();
    match db.import_from_file("players", &path, ",") {
        Err(DbError::Schema(msg)) => {
            assert!(msg.contains("line 1"));
            assert!(msg.contains("expected 3 fields"));
        }
        other => panic!("expected Schema error, got {other:?}"),
    }
    assert_eq!(db.count_rows("players").unwrap(), 0);
}

#[test]
fn file_backed_store_persists_across_connections() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.db");

    let mut db = Database::embedded(&path);
    db.connect().unwrap();
    db.create_table(&players_table()).unwrap();
    db.insert("players", &[("id", "1"), ("name", "Alice"), ("score", "10")])
        .unwrap();
    db.disconnect().unwrap();

    let mut db = Database::embedded(&path);
    db.connect().unwrap();
    assert!(db.table_exists("players").unwrap());
    assert_eq!(db.count_rows("players").unwrap(), 1);
}

#[test]
fn config_file_builds_a_working_database() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("configured.db");
    let config_path = dir.path().join("dbframe.toml");
    std::fs::write(
        &config_path,
        format!(
            "debug = true\n\n[connection]\nmode = \"embedded\"\npath = {:?}\n",
            store_path
        ),
    )
    .unwrap();

    let config = dbframe::config::load_config(&config_path).unwrap();
    let mut db = config.into_database();
    db.connect().unwrap();
    db.create_table(&players_table()).unwrap();
    assert!(db.table_exists("players").unwrap());
}

#[test]
fn transaction_state_survives_reconnect_reset() {
    let mut db = connected_db();
    db.start_transaction().unwrap();
    assert_eq!(db.transaction_state(), TransactionState::Active);

    // reconnecting replaces the handle and resets the state machine
    db.connect().unwrap();
    assert_eq!(db.transaction_state(), TransactionState::Idle);
}

#[test]
fn connect_failure_is_connection_error() {
    let mut db = Database::embedded("/nonexistent/dir/store.db");
    assert!(matches!(db.connect(), Err(DbError::Connection(_))));
    assert!(!db.is_connected());
}
