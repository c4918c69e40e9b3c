use chrono::NaiveDate;
use datagateway::audit::AuditAction;
use datagateway::confirm::{ConfirmationPolicy, ScriptedPrompter};
use datagateway::error::{GatewayError, WriteStage};
use datagateway::model::{CellType, CellValue, Table};
use datagateway::remote::{MemoryStore, RemoteStore};
use datagateway::{DeleteOutcome, GatewayConfig, Selection, Session, TableStore};

struct Fixture {
    remote: MemoryStore,
    prompter: ScriptedPrompter,
    tables: TableStore,
}

fn fixture(answers: &[&str]) -> Fixture {
    let remote = MemoryStore::new();
    let prompter = ScriptedPrompter::new(answers.iter().copied());
    let tables = TableStore::new(Session::new(remote.clone(), remote.root_id()))
        .with_confirmation(ConfirmationPolicy::prompt(prompter.clone()));
    Fixture {
        remote,
        prompter,
        tables,
    }
}

fn t1() -> Table {
    Table::builder()
        .column("name", ["Alice", "Bob"])
        .column("value", [100i64, 50])
        .build()
        .unwrap()
}

fn mixed_types() -> Table {
    Table::builder()
        .column("id", [1i64, 2, 3])
        .column("score", [Some(1.5), None, Some(-2.0)])
        .column("active", [true, false, true])
        .column("label", [Some("a"), Some("b"), None])
        .column(
            "day",
            [
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            ],
        )
        .build()
        .unwrap()
}

#[test]
fn get_returns_what_put_stored() {
    let fx = fixture(&[]);
    for (name, table) in [("t1", t1()), ("typed", mixed_types())] {
        fx.tables.put(name, &table, false).unwrap();
        let read = fx.tables.get(name).unwrap();
        assert_eq!(read, table);
        assert_eq!(read.column_names(), table.column_names());
    }
}

#[test]
fn scenario_put_get_meta() {
    let fx = fixture(&[]);
    fx.tables.put("t1", &t1(), false).unwrap();

    let read = fx.tables.get("t1").unwrap();
    assert_eq!(read.row_count(), 2);
    assert_eq!(read.column("value").unwrap().cell_type, CellType::Int);
    assert_eq!(read.rows[1].cells[0], CellValue::from("Bob"));

    let meta = fx.tables.meta("t1").unwrap();
    assert!(meta.contains('2'));
    assert!(meta.contains("name"));
    assert!(meta.contains("value"));

    let files: Vec<String> = fx.remote.snapshot().into_keys().collect();
    assert_eq!(files, vec!["t1/t1.log", "t1/t1.parquet", "t1/t1_meta.parquet"]);
}

#[test]
fn put_without_overwrite_keeps_existing_table() {
    let fx = fixture(&[]);
    fx.tables.put("t1", &t1(), false).unwrap();
    let before = fx.remote.snapshot();
    let writes = fx.remote.write_count();

    let other = Table::builder().column("x", [1i64]).build().unwrap();
    let err = fx.tables.put("t1", &other, false).unwrap_err();
    assert!(matches!(err, GatewayError::AlreadyExists { .. }));
    assert_eq!(fx.remote.snapshot(), before);
    assert_eq!(fx.remote.write_count(), writes);
}

#[test]
fn put_with_overwrite_replaces_and_logs() {
    let fx = fixture(&[]);
    fx.tables.put("t1", &t1(), false).unwrap();
    let replacement = Table::builder().column("x", [1i64, 2, 3]).build().unwrap();
    fx.tables.put("t1", &replacement, true).unwrap();

    assert_eq!(fx.tables.get("t1").unwrap(), replacement);
    let history = fx.tables.history("t1").unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| e.action == AuditAction::Put));
    assert_eq!(history[1].rows, 3);
}

#[test]
fn put_rejects_invalid_tables_before_writing() {
    let fx = fixture(&[]);
    let mut ragged = Table::new(t1().columns);
    ragged.add_row(vec![CellValue::from("only one cell")]);

    for bad in [Table::default(), ragged] {
        assert!(matches!(
            fx.tables.put("t1", &bad, false),
            Err(GatewayError::Validation(_))
        ));
    }
    assert!(matches!(
        fx.tables.put("a/b", &t1(), false),
        Err(GatewayError::Validation(_))
    ));
    assert_eq!(fx.remote.write_count(), 0);
}

#[test]
fn append_adds_rows_after_existing_ones() {
    let fx = fixture(&[]);
    fx.tables.put("t1", &t1(), false).unwrap();
    let more = Table::builder()
        .column("name", ["Eve", "Mallory", "Trent"])
        .column("value", [7i64, 8, 9])
        .build()
        .unwrap();
    fx.tables.append("t1", &more).unwrap();

    let read = fx.tables.get("t1").unwrap();
    assert_eq!(read.row_count(), 5);
    for (i, row) in read.rows.iter().enumerate() {
        assert_eq!(row.index, i);
    }
    assert_eq!(read.rows[0].cells, t1().rows[0].cells);
    assert_eq!(read.rows[1].cells, t1().rows[1].cells);
    for (stored, new) in read.rows[2..].iter().zip(&more.rows) {
        assert_eq!(stored.cells, new.cells);
    }

    let history = fx.tables.history("t1").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].action, AuditAction::Append);
    assert_eq!(history[1].rows, 3);
    assert!(fx.tables.meta("t1").unwrap().contains("Rows: 5 entries"));
}

#[test]
fn append_rejects_schema_mismatches_without_writing() {
    let fx = fixture(&[]);
    fx.tables.put("t1", &t1(), false).unwrap();
    let before = fx.remote.snapshot();
    let writes = fx.remote.write_count();

    let wrong_type = Table::builder()
        .column("name", ["Eve"])
        .column("value", ["x"])
        .build()
        .unwrap();
    let wrong_order = Table::builder()
        .column("value", [1i64])
        .column("name", ["Eve"])
        .build()
        .unwrap();
    let extra_column = Table::builder()
        .column("name", ["Eve"])
        .column("value", [1i64])
        .column("note", ["hi"])
        .build()
        .unwrap();
    let renamed = Table::builder()
        .column("name", ["Eve"])
        .column("amount", [1i64])
        .build()
        .unwrap();

    for rows in [wrong_type, wrong_order, extra_column, renamed] {
        let err = fx.tables.append("t1", &rows).unwrap_err();
        assert!(matches!(err, GatewayError::SchemaMismatch { .. }), "{err}");
    }
    assert_eq!(fx.remote.snapshot(), before);
    assert_eq!(fx.remote.write_count(), writes);
    assert_eq!(fx.tables.get("t1").unwrap(), t1());
}

#[test]
fn append_requires_existing_table() {
    let fx = fixture(&[]);
    let err = fx.tables.append("missing", &t1()).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(fx.remote.write_count(), 0);
}

#[test]
fn delete_rows_with_no_matches_is_a_no_op() {
    let fx = fixture(&["yes"]);
    fx.tables.put("t1", &t1(), false).unwrap();
    let before = fx.remote.snapshot();
    let writes = fx.remote.write_count();

    let outcome = fx
        .tables
        .delete_rows("t1", Selection::mask(vec![false, false]))
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::NoMatches);
    assert_eq!(fx.remote.snapshot(), before);
    assert_eq!(fx.remote.write_count(), writes);
    assert_eq!(fx.prompter.remaining(), 1);
}

#[test]
fn declined_row_delete_changes_nothing() {
    for answer in ["y", "no", "", "yes please"] {
        let fx = fixture(&[answer]);
        fx.tables.put("t1", &t1(), false).unwrap();
        let before = fx.remote.snapshot();
        let writes = fx.remote.write_count();

        let outcome = fx
            .tables
            .delete_rows("t1", Selection::mask(vec![true, false]))
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::Cancelled);
        assert_eq!(fx.remote.snapshot(), before);
        assert_eq!(fx.remote.write_count(), writes);
    }
}

#[test]
fn confirmed_row_delete_keeps_the_rest() {
    let fx = fixture(&["YES\n"]);
    let table = Table::builder()
        .column("name", ["Alice", "Bob", "Carol", "Dave"])
        .column("value", [1i64, 2, 3, 4])
        .build()
        .unwrap();
    fx.tables.put("t1", &table, false).unwrap();

    let selection = Selection::predicate(|t: &Table| {
        t.column_mask("value", |v| matches!(v, CellValue::Int(n) if n % 2 == 0))
    });
    let outcome = fx.tables.delete_rows("t1", selection).unwrap();
    assert_eq!(outcome, DeleteOutcome::RowsDeleted(2));

    let read = fx.tables.get("t1").unwrap();
    let names: Vec<String> = read
        .column_values("name")
        .unwrap()
        .iter()
        .map(|c| c.to_string())
        .collect();
    assert_eq!(names, vec!["Alice", "Carol"]);
    assert_eq!(read.rows[1].index, 1);

    let last = fx.tables.history("t1").unwrap().pop().unwrap();
    assert_eq!(last.action, AuditAction::Delete);
    assert_eq!(last.rows, 2);
}

#[test]
fn malformed_selections_are_validation_errors() {
    let fx = fixture(&["yes"]);
    fx.tables.put("t1", &t1(), false).unwrap();
    let writes = fx.remote.write_count();

    let too_short = fx.tables.delete_rows("t1", Selection::mask(vec![true]));
    assert!(matches!(too_short, Err(GatewayError::Validation(_))));

    let bad_predicate = fx
        .tables
        .delete_rows("t1", Selection::predicate(|_: &Table| Ok(vec![true; 5])));
    assert!(matches!(bad_predicate, Err(GatewayError::Validation(_))));

    let not_bool = Selection::from_cells([CellValue::Bool(true), CellValue::from("x")]);
    assert!(matches!(not_bool, Err(GatewayError::Validation(_))));

    let unknown_column = fx
        .tables
        .delete_rows("t1", Selection::column_equals("nope", CellValue::Int(1)));
    assert!(matches!(unknown_column, Err(GatewayError::Validation(_))));

    assert_eq!(fx.remote.write_count(), writes);
    assert_eq!(fx.prompter.remaining(), 1);
}

#[test]
fn delete_rows_on_missing_table_is_not_found() {
    let fx = fixture(&["yes"]);
    let err = fx
        .tables
        .delete_rows("ghost", Selection::mask(Vec::new()))
        .unwrap_err();
    assert!(matches!(err, GatewayError::TableNotFound { .. }));
}

#[test]
fn table_delete_needs_exactly_y() {
    let fx = fixture(&["yes", "Y"]);
    fx.tables.put("t1", &t1(), false).unwrap();
    let before = fx.remote.snapshot();

    assert_eq!(fx.tables.delete_table("t1").unwrap(), DeleteOutcome::Cancelled);
    assert_eq!(fx.remote.snapshot(), before);

    let writes = fx.remote.write_count();
    assert_eq!(fx.tables.delete_table("t1").unwrap(), DeleteOutcome::TableDeleted);
    assert_eq!(fx.remote.write_count(), writes + 1);
    assert!(fx.remote.snapshot().is_empty());
    assert!(fx.tables.list().unwrap().is_empty());
    assert!(matches!(
        fx.tables.get("t1"),
        Err(GatewayError::TableNotFound { .. })
    ));
}

#[test]
fn table_delete_of_missing_table_does_not_fail() {
    let fx = fixture(&["y"]);
    assert_eq!(fx.tables.delete_table("ghost").unwrap(), DeleteOutcome::NotFound);
    assert_eq!(fx.prompter.remaining(), 1);
}

#[test]
fn list_names_table_folders_once() {
    let fx = fixture(&[]);
    fx.tables.put("alpha", &t1(), false).unwrap();
    fx.tables.put("beta", &t1(), false).unwrap();
    let root = fx.remote.root_id();
    fx.remote.create_folder(&root, "beta").unwrap();
    fx.remote.create_file(&root, "notes.txt", b"not a table").unwrap();
    let trashed = fx.remote.create_folder(&root, "gamma").unwrap();
    fx.remote.trash(&trashed.id).unwrap();

    let names: Vec<String> = fx.tables.list().unwrap().into_iter().collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert_eq!(fx.tables.get("beta").unwrap(), t1());
}

#[test]
fn exists_and_missing_objects() {
    let fx = fixture(&[]);
    assert!(!fx.tables.exists("t1").unwrap());
    assert!(matches!(
        fx.tables.meta("t1"),
        Err(GatewayError::TableNotFound { .. })
    ));

    fx.remote.create_folder(&fx.remote.root_id(), "t1").unwrap();
    assert!(!fx.tables.exists("t1").unwrap());
    assert!(matches!(
        fx.tables.get("t1"),
        Err(GatewayError::ObjectNotFound { .. })
    ));
    assert!(fx.tables.history("t1").unwrap().is_empty());

    fx.tables.put("t1", &t1(), false).unwrap();
    assert!(fx.tables.exists("t1").unwrap());
}

#[test]
fn metadata_failure_is_reported_as_partial_and_retry_completes() {
    let fx = fixture(&[]);
    fx.remote.fail_writes_to("t1_meta.parquet");

    let err = fx.tables.put("t1", &t1(), true).unwrap_err();
    assert!(err.is_partial());
    assert!(matches!(
        err,
        GatewayError::PartialWrite {
            completed: WriteStage::Data,
            failed: WriteStage::Metadata,
            ..
        }
    ));
    assert_eq!(fx.tables.get("t1").unwrap(), t1());
    assert!(fx.tables.meta("t1").unwrap_err().is_not_found());
    assert!(fx.tables.history("t1").unwrap().is_empty());

    fx.remote.clear_failures();
    fx.tables.put("t1", &t1(), true).unwrap();
    assert!(fx.tables.meta("t1").unwrap().contains("Rows: 2 entries"));
    assert_eq!(fx.tables.history("t1").unwrap().len(), 1);
    assert_eq!(fx.remote.snapshot().len(), 3);
}

#[test]
fn audit_failure_keeps_completed_writes() {
    let fx = fixture(&[]);
    fx.remote.fail_writes_to("t1.log");

    let err = fx.tables.put("t1", &t1(), false).unwrap_err();
    assert!(matches!(
        err,
        GatewayError::AuditLog {
            action: AuditAction::Put,
            ..
        }
    ));
    assert!(err.is_partial());
    assert_eq!(fx.tables.get("t1").unwrap(), t1());
    assert!(fx.tables.meta("t1").is_ok());
}

#[test]
fn partial_append_is_finished_by_repair_not_by_retry() {
    let fx = fixture(&[]);
    fx.tables.put("t1", &t1(), false).unwrap();
    let eve = Table::builder()
        .column("name", ["Eve"])
        .column("value", [7i64])
        .build()
        .unwrap();

    fx.remote.fail_writes_to("t1_meta.parquet");
    let err = fx.tables.append("t1", &eve).unwrap_err();
    assert!(matches!(
        err,
        GatewayError::PartialWrite {
            action: AuditAction::Append,
            rows: 1,
            ..
        }
    ));
    assert_eq!(fx.tables.get("t1").unwrap().row_count(), 3);
    assert!(fx.tables.meta("t1").unwrap().contains("Rows: 2 entries"));

    fx.remote.clear_failures();
    let (action, rows) = err.pending().unwrap();
    fx.tables.repair("t1", action, rows).unwrap();

    assert_eq!(fx.tables.get("t1").unwrap().row_count(), 3);
    assert!(fx.tables.meta("t1").unwrap().contains("Rows: 3 entries"));
    let history = fx.tables.history("t1").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].action, AuditAction::Append);
    assert_eq!(history[1].rows, 1);
}

#[test]
fn partial_row_delete_is_finished_by_repair() {
    let fx = fixture(&["yes"]);
    fx.tables.put("t1", &t1(), false).unwrap();

    fx.remote.fail_writes_to("t1.log");
    let err = fx
        .tables
        .delete_rows("t1", Selection::rows(vec![0]))
        .unwrap_err();
    assert!(err.is_partial());
    assert_eq!(err.pending(), Some((AuditAction::Delete, 1)));

    let remaining = fx.tables.get("t1").unwrap();
    assert_eq!(remaining.row_count(), 1);
    assert_eq!(remaining.rows[0].cells[0], CellValue::from("Bob"));

    fx.remote.clear_failures();
    fx.tables.repair("t1", AuditAction::Delete, 1).unwrap();
    assert_eq!(fx.tables.get("t1").unwrap(), remaining);
    assert!(fx.tables.meta("t1").unwrap().contains("Rows: 1 entries"));
    assert_eq!(fx.tables.history("t1").unwrap().len(), 2);
    assert_eq!(fx.prompter.remaining(), 0);
}

#[test]
fn repair_of_missing_table_is_not_found() {
    let fx = fixture(&[]);
    let err = fx.tables.repair("ghost", AuditAction::Put, 0).unwrap_err();
    assert!(matches!(err, GatewayError::TableNotFound { .. }));
    assert_eq!(fx.remote.write_count(), 0);
}

#[test]
fn sub_microsecond_timestamps_survive_put_and_get() {
    let fx = fixture(&[]);
    let at = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_nano_opt(1, 2, 3, 123_456_789)
        .unwrap();
    let table = Table::builder().column("at", [at]).build().unwrap();

    fx.tables.put("times", &table, false).unwrap();
    let back = fx.tables.get("times").unwrap();
    assert_eq!(back, table);
    assert_eq!(back.rows[0].cells[0], CellValue::DateTime(at));
}

#[test]
fn float_columns_reject_ints_that_would_be_rounded() {
    let fx = fixture(&[]);
    let table = Table::builder()
        .column(
            "n",
            vec![CellValue::Float(0.5), CellValue::Int(9_007_199_254_740_993)],
        )
        .build()
        .unwrap();
    assert!(matches!(
        fx.tables.put("t", &table, false),
        Err(GatewayError::Validation(_))
    ));
    assert_eq!(fx.remote.write_count(), 0);
}

#[test]
fn table_names_with_control_characters_are_rejected() {
    let fx = fixture(&[]);
    for name in ["t1\nPUT", "t1\r", "t\u{7f}"] {
        assert!(matches!(
            fx.tables.put(name, &t1(), false),
            Err(GatewayError::Validation(_))
        ));
    }
    assert_eq!(fx.remote.write_count(), 0);
    assert!(fx.tables.list().unwrap().is_empty());
}

#[test]
fn data_upload_failure_is_a_remote_error() {
    let fx = fixture(&[]);
    fx.tables.put("t1", &t1(), false).unwrap();
    fx.remote.fail_writes_to("t1.parquet");
    let before = fx.remote.snapshot();

    let more = Table::builder()
        .column("name", ["Eve"])
        .column("value", [1i64])
        .build()
        .unwrap();
    let err = fx.tables.append("t1", &more).unwrap_err();
    assert!(matches!(err, GatewayError::Remote(_)));
    assert!(!err.is_partial());
    assert_eq!(fx.remote.snapshot(), before);
}

#[test]
fn local_store_session_from_config() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = GatewayConfig::default().with_local_store(dir.path());
    let tables = TableStore::new(Session::open(&config).unwrap())
        .with_confirmation(ConfirmationPolicy::AssumeYes);

    tables.put("sales", &mixed_types(), false).unwrap();
    assert!(dir.path().join("sales").join("sales.parquet").is_file());
    assert!(dir.path().join("sales").join("sales_meta.parquet").is_file());
    assert!(dir.path().join("sales").join("sales.log").is_file());

    let reopened = TableStore::new(Session::open(&config).unwrap());
    assert_eq!(reopened.get("sales").unwrap(), mixed_types());
    assert_eq!(
        reopened.list().unwrap().into_iter().collect::<Vec<_>>(),
        vec!["sales"]
    );

    assert_eq!(
        tables
            .delete_rows("sales", Selection::rows(vec![0]))
            .unwrap(),
        DeleteOutcome::RowsDeleted(1)
    );
    assert_eq!(tables.delete_table("sales").unwrap(), DeleteOutcome::TableDeleted);
    assert!(!dir.path().join("sales").exists());
}
