//! End-to-end engine tests against the scripted database and in-memory
//! storage: dump an archive, inspect its objects, and restore it.

use std::io::{Read, Write};

use veildump::catalog::discover::quote_ident;
use veildump::config::{Config, TableConfig, TransformerUse};
use veildump::db::mock::MockDb;
use veildump::dump::{run_dump, DumpOptions};
use veildump::restore::run_restore;
use veildump::{MemoryStorage, Storage, TransformerRegistry};
use veildump_toc::{read_toc, Entry, Section, Toc};

fn scripted_db() -> MockDb {
    let db = MockDb::new();
    db.add_query_result(
        "current_database()",
        vec![vec![Some("shop".into()), Some("16.2".into()), Some("postgres".into())]],
    );
    db.add_query_result(
        "relkind = 'r'",
        vec![
            vec![Some("100".into()), Some("public".into()), Some("orders".into()), Some("4096".into())],
            vec![Some("101".into()), Some("public".into()), Some("users".into()), Some("8192".into())],
        ],
    );
    db.add_query_result(
        "a.attrelid = 100",
        vec![
            vec![Some("id".into()), Some("23".into()), Some("integer".into()), Some("t".into()), Some("-1".into())],
            vec![Some("user_id".into()), Some("23".into()), Some("integer".into()), Some("f".into()), Some("-1".into())],
        ],
    );
    db.add_query_result(
        "a.attrelid = 101",
        vec![
            vec![Some("id".into()), Some("23".into()), Some("integer".into()), Some("t".into()), Some("-1".into())],
            vec![Some("name".into()), Some("25".into()), Some("text".into()), Some("f".into()), Some("-1".into())],
        ],
    );
    db.add_query_result("i.indrelid = 100", vec![vec![Some("id".into())]]);
    db.add_query_result("i.indrelid = 101", vec![vec![Some("id".into())]]);
    db.add_query_result(
        "contype = 'f'",
        vec![vec![
            Some("orders_user_fk".into()),
            Some("100".into()),
            Some("101".into()),
            Some("user_id".into()),
            Some("id".into()),
            Some("FOREIGN KEY (user_id) REFERENCES users(id)".into()),
        ]],
    );
    db.add_copy_stream("\"public\".\"orders\"", b"10\t1\n".to_vec());
    db.add_copy_stream("\"public\".\"users\"", b"1\ta\n2\tb\\tc\n".to_vec());
    db
}

fn gunzip(storage: &dyn Storage, key: &str) -> Vec<u8> {
    let mut compressed = Vec::new();
    storage.get(key).unwrap().read_to_end(&mut compressed).unwrap();
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(compressed.as_slice()).read_to_end(&mut out).unwrap();
    out
}

fn read_archive_toc(storage: &dyn Storage) -> Toc {
    read_toc(storage.get("toc.dat").unwrap()).unwrap()
}

#[test]
fn identity_dump_produces_native_compatible_archive() {
    let db = scripted_db();
    let storage = MemoryStorage::new();
    let registry = TransformerRegistry::with_builtins();

    let summary =
        run_dump(&db, &storage, &registry, &Config::default(), &DumpOptions::default()).unwrap();
    assert_eq!(summary.tables, 2);
    assert_eq!(summary.rows, 3);

    let toc = read_archive_toc(&storage);
    toc.validate().unwrap();
    assert_eq!(toc.header.dbname.as_deref(), Some("shop"));
    assert_eq!(toc.header.server_version.as_deref(), Some("16.2"));

    let users_data = toc
        .entries
        .iter()
        .find(|e| e.is_data() && e.tag.as_deref() == Some("users"))
        .unwrap();
    let bytes = gunzip(&storage, &format!("{}.dat.gz", users_data.dump_id));
    assert_eq!(bytes, b"1\ta\n2\tb\\tc\n\\.\n");

    // Snapshot coordination: the main transaction exported a snapshot and
    // workers were started with REPEATABLE READ transactions.
    let executed = db.executed();
    assert!(executed.iter().any(|sql| sql.contains("REPEATABLE READ")));
}

#[test]
fn transformed_dump_masks_configured_column() {
    let db = scripted_db();
    let storage = MemoryStorage::new();
    let registry = TransformerRegistry::with_builtins();

    let mut config = Config::default();
    config.dump.transformation = vec![TableConfig {
        schema: "public".into(),
        name: "users".into(),
        transformers: vec![TransformerUse {
            name: "masking".into(),
            params: [("column".to_owned(), serde_json::Value::from("name"))]
                .into_iter()
                .collect(),
        }],
        ..Default::default()
    }];

    run_dump(&db, &storage, &registry, &config, &DumpOptions::default()).unwrap();

    let toc = read_archive_toc(&storage);
    let users_data = toc
        .entries
        .iter()
        .find(|e| e.is_data() && e.tag.as_deref() == Some("users"))
        .unwrap();
    let bytes = gunzip(&storage, &format!("{}.dat.gz", users_data.dump_id));
    // "a" masks to one star; "b\tc" decodes to three characters.
    assert_eq!(bytes, b"1\t*\n2\t***\n\\.\n");
}

/// Same catalog as [`scripted_db`] but only the users table has a COPY
/// stream, so the orders table fails at copy_out. With one worker, the
/// larger users table completes first and the failure follows.
fn scripted_db_users_only_stream() -> MockDb {
    let db = MockDb::new();
    db.add_query_result(
        "current_database()",
        vec![vec![Some("shop".into()), Some("16.2".into()), Some("postgres".into())]],
    );
    db.add_query_result(
        "relkind = 'r'",
        vec![
            vec![Some("100".into()), Some("public".into()), Some("orders".into()), Some("4096".into())],
            vec![Some("101".into()), Some("public".into()), Some("users".into()), Some("8192".into())],
        ],
    );
    db.add_query_result(
        "a.attrelid = 100",
        vec![
            vec![Some("id".into()), Some("23".into()), Some("integer".into()), Some("t".into()), Some("-1".into())],
            vec![Some("user_id".into()), Some("23".into()), Some("integer".into()), Some("f".into()), Some("-1".into())],
        ],
    );
    db.add_query_result(
        "a.attrelid = 101",
        vec![
            vec![Some("id".into()), Some("23".into()), Some("integer".into()), Some("t".into()), Some("-1".into())],
            vec![Some("name".into()), Some("25".into()), Some("text".into()), Some("f".into()), Some("-1".into())],
        ],
    );
    db.add_query_result("i.indrelid = 100", vec![vec![Some("id".into())]]);
    db.add_query_result("i.indrelid = 101", vec![vec![Some("id".into())]]);
    db.add_copy_stream("\"public\".\"users\"", b"1\ta\n".to_vec());
    db
}

#[test]
fn failed_dump_cleans_the_archive() {
    let db = scripted_db_users_only_stream();
    let storage = MemoryStorage::new();
    let registry = TransformerRegistry::with_builtins();
    let mut config = Config::default();
    config.common.jobs = 1;

    let err =
        run_dump(&db, &storage, &registry, &config, &DumpOptions::default()).unwrap_err();
    assert!(matches!(err, veildump::Error::Database(_)));
    assert!(storage.keys().is_empty(), "partial archive must be deleted");
}

#[test]
fn failed_dump_keeps_archive_when_asked() {
    let db = scripted_db_users_only_stream();
    let storage = MemoryStorage::new();
    let registry = TransformerRegistry::with_builtins();
    let mut config = Config::default();
    config.common.jobs = 1;
    config.dump.keep_on_failure = true;

    run_dump(&db, &storage, &registry, &config, &DumpOptions::default()).unwrap_err();
    // The completed users data object survives; the TOC was never written.
    assert!(storage.keys().iter().any(|k| k.ends_with(".dat.gz")));
    assert!(!storage.exists("toc.dat").unwrap());
}

#[test]
fn dump_then_restore_roundtrips_data_bytes() {
    let db = scripted_db();
    let storage = MemoryStorage::new();
    let registry = TransformerRegistry::with_builtins();
    run_dump(&db, &storage, &registry, &Config::default(), &DumpOptions::default()).unwrap();

    let target = MockDb::new();
    let summary = run_restore(&target, &storage, &Config::default()).unwrap();
    assert!(summary.failed.is_empty());

    let copied = target.copied_in();
    let users = copied
        .iter()
        .find(|(sql, _)| sql.contains(&quote_ident("users")))
        .expect("users data restored");
    assert_eq!(users.1, b"1\ta\n2\tb\\tc\n\\.\n");
}

#[test]
fn restore_runs_sections_in_order() {
    // Hand-built archive with shuffled TOC entry order: the constraint
    // (post-data) first, the data entry second, the table DDL last.
    let storage = MemoryStorage::new();

    let mut table = Entry::new(1, Section::PreData);
    table.tag = Some("t".into());
    table.desc = Some("TABLE".into());
    table.defn = Some("CREATE TABLE public.t (id int4);".into());

    let mut data = Entry::new(2, Section::Data);
    data.tag = Some("t".into());
    data.desc = Some("TABLE DATA".into());
    data.had_dumper = true;
    data.copy_stmt = Some("COPY public.t (id) FROM stdin;".into());
    data.file_name = Some("2.dat.gz".into());
    data.dependencies = vec![1];

    let mut index = Entry::new(3, Section::PostData);
    index.tag = Some("t_pk".into());
    index.desc = Some("CONSTRAINT".into());
    index.defn = Some("ALTER TABLE public.t ADD PRIMARY KEY (id);".into());
    index.dependencies = vec![2];

    let mut toc = Toc::default();
    toc.entries = vec![index.clone(), data, table];
    let mut writer = storage.put("toc.dat").unwrap();
    veildump_toc::write_toc(&mut writer, &toc).unwrap();
    writer.commit().unwrap();

    let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    gz.write_all(b"7\n\\.\n").unwrap();
    let compressed = gz.finish().unwrap();
    let mut writer = storage.put("2.dat.gz").unwrap();
    writer.write_all(&compressed).unwrap();
    writer.commit().unwrap();

    let target = MockDb::new();
    let summary = run_restore(&target, &storage, &Config::default()).unwrap();
    assert_eq!(summary.restored, 3);

    let executed = target.executed();
    let pos = |needle: &str| {
        executed
            .iter()
            .position(|sql| sql.contains(needle))
            .unwrap_or_else(|| panic!("{needle:?} not executed: {executed:?}"))
    };
    let create = pos("CREATE TABLE public.t");
    let copy = pos("COPY public.t (id) FROM stdin");
    let constraint = pos("ADD PRIMARY KEY");
    assert!(create < copy && copy < constraint);

    let copied = target.copied_in();
    assert_eq!(copied[0].1, b"7\n\\.\n");
}

#[test]
fn restore_continue_policy_collects_failures() {
    let storage = MemoryStorage::new();

    let mut broken = Entry::new(1, Section::Data);
    broken.tag = Some("missing".into());
    broken.desc = Some("TABLE DATA".into());
    broken.had_dumper = true;
    broken.copy_stmt = Some("COPY public.missing FROM stdin;".into());
    broken.file_name = Some("1.dat.gz".into()); // never written

    let mut fine = Entry::new(2, Section::PostData);
    fine.tag = Some("later".into());
    fine.desc = Some("CONSTRAINT".into());
    fine.defn = Some("ALTER TABLE public.t ADD CHECK (true);".into());

    let mut toc = Toc::default();
    toc.entries = vec![broken, fine];
    let mut writer = storage.put("toc.dat").unwrap();
    veildump_toc::write_toc(&mut writer, &toc).unwrap();
    writer.commit().unwrap();

    let target = MockDb::new();

    // Abort: the missing data object fails the restore outright.
    let err = run_restore(&target, &storage, &Config::default()).unwrap_err();
    assert!(matches!(err, veildump::Error::Storage(_)));

    // Continue: the failure is collected and later entries still run.
    let mut config = Config::default();
    config.restore.on_error = veildump::config::RestoreErrorPolicy::Continue;
    let summary = run_restore(&target, &storage, &config).unwrap();
    assert_eq!(summary.restored, 1);
    assert_eq!(summary.failed.len(), 1);
    assert!(target.executed().iter().any(|sql| sql.contains("ADD CHECK")));
}
