//! End-to-end tests driving the `open`/`prepare`/`step` surface the way a
//! real caller would, rather than any one layer in isolation.

use chidb_rs::{ColumnType, Database, ErrorCode, StepOutcome};

fn tmp_db_path(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_str().unwrap().to_string()
}

fn run_statement(db: &mut Database, sql: &str) -> anyhow::Result<()> {
    let mut stmt = db.prepare(sql)?;
    while let StepOutcome::Row = stmt.step()? {}
    Ok(())
}

fn select_int_rows(db: &mut Database, sql: &str, col: usize) -> anyhow::Result<Vec<i32>> {
    let mut stmt = db.prepare(sql)?;
    let mut out = Vec::new();
    loop {
        match stmt.step()? {
            StepOutcome::Row => out.push(stmt.column_int(col).expect("expected an int column")),
            StepOutcome::Done => break,
        }
    }
    Ok(out)
}

#[test]
fn create_insert_select_single_row() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut db = Database::open(&tmp_db_path(&dir, "a.db"))?;
    run_statement(&mut db, "CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)")?;
    run_statement(&mut db, "INSERT INTO t VALUES(1, \"x\")")?;

    let mut stmt = db.prepare("SELECT * FROM t")?;
    assert_eq!(stmt.step()?, StepOutcome::Row);
    assert_eq!(stmt.column_int(0), Some(1));
    assert_eq!(stmt.column_text(1), Some("x"));
    assert_eq!(stmt.step()?, StepOutcome::Done);
    Ok(())
}

#[test]
fn where_greater_than_filters_and_orders_ascending() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut db = Database::open(&tmp_db_path(&dir, "b.db"))?;
    run_statement(&mut db, "CREATE TABLE t(a INTEGER PRIMARY KEY, b INTEGER)")?;
    for (a, b) in [(1, 10), (2, 20), (3, 30)] {
        run_statement(&mut db, &format!("INSERT INTO t VALUES({a}, {b})"))?;
    }

    let rows = select_int_rows(&mut db, "SELECT a FROM t WHERE b > 15", 0)?;
    assert_eq!(rows, vec![2, 3]);
    Ok(())
}

#[test]
fn seek_variants_on_primary_key_walk_in_the_expected_direction() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut db = Database::open(&tmp_db_path(&dir, "c.db"))?;
    run_statement(&mut db, "CREATE TABLE t(a INTEGER PRIMARY KEY, b INTEGER)")?;
    for (a, b) in [(1, 10), (2, 20), (3, 30)] {
        run_statement(&mut db, &format!("INSERT INTO t VALUES({a}, {b})"))?;
    }

    assert_eq!(select_int_rows(&mut db, "SELECT b FROM t WHERE a = 2", 0)?, vec![20]);
    assert_eq!(select_int_rows(&mut db, "SELECT b FROM t WHERE a >= 2", 0)?, vec![20, 30]);
    // Descending: a `<=` seek walks backwards via `Prev`.
    assert_eq!(select_int_rows(&mut db, "SELECT b FROM t WHERE a <= 2", 0)?, vec![20, 10]);
    Ok(())
}

#[test]
fn many_rows_force_a_multi_level_btree_and_all_keys_come_back_sorted() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut db = Database::open(&tmp_db_path(&dir, "d.db"))?;
    run_statement(&mut db, "CREATE TABLE t(a INTEGER PRIMARY KEY, b INTEGER)")?;

    let mut keys: Vec<i32> = (0..2000).collect();
    // A fixed pseudo-shuffle so insertion order isn't already sorted.
    keys.sort_by_key(|&k| (k * 7919) % 2000);
    for k in &keys {
        run_statement(&mut db, &format!("INSERT INTO t VALUES({k}, {k})"))?;
    }

    let rows = select_int_rows(&mut db, "SELECT a FROM t", 0)?;
    let mut expected: Vec<i32> = (0..2000).collect();
    expected.sort();
    assert_eq!(rows, expected);
    Ok(())
}

#[test]
fn duplicate_insert_on_second_step_is_a_duplicate_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut db = Database::open(&tmp_db_path(&dir, "e.db"))?;
    run_statement(&mut db, "CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)")?;
    run_statement(&mut db, "INSERT INTO t VALUES(1, \"x\")")?;

    let mut stmt = db.prepare("INSERT INTO t VALUES(1, \"y\")")?;
    let err = stmt.step().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Duplicate);
    Ok(())
}

#[test]
fn unknown_column_in_where_is_rejected_at_prepare_time() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut db = Database::open(&tmp_db_path(&dir, "f.db"))?;
    run_statement(&mut db, "CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)")?;

    let err = db.prepare("SELECT * FROM t WHERE c = 1").unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidSql);
    Ok(())
}

#[test]
fn natural_join_matches_on_shared_column_name() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut db = Database::open(&tmp_db_path(&dir, "g.db"))?;
    run_statement(&mut db, "CREATE TABLE users(id INTEGER PRIMARY KEY, name TEXT)")?;
    run_statement(&mut db, "CREATE TABLE orders(id INTEGER PRIMARY KEY, name TEXT)")?;
    run_statement(&mut db, "INSERT INTO users VALUES(1, \"alice\")")?;
    run_statement(&mut db, "INSERT INTO users VALUES(2, \"bob\")")?;
    run_statement(&mut db, "INSERT INTO orders VALUES(1, \"alice\")")?;

    let mut stmt = db.prepare("SELECT * FROM users NATURAL JOIN orders")?;
    assert_eq!(stmt.step()?, StepOutcome::Row);
    assert_eq!(stmt.column_text(1), Some("alice"));
    assert_eq!(stmt.step()?, StepOutcome::Done);
    Ok(())
}

#[test]
fn explain_reports_one_row_per_opcode_with_six_columns() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut db = Database::open(&tmp_db_path(&dir, "h.db"))?;
    run_statement(&mut db, "CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)")?;

    let mut stmt = db.prepare("EXPLAIN SELECT * FROM t")?;
    assert_eq!(stmt.column_count(), 6);
    let mut n = 0;
    while let StepOutcome::Row = stmt.step()? {
        assert_eq!(stmt.column_type(0), ColumnType::Int);
        assert_eq!(stmt.column_type(1), ColumnType::Text);
        n += 1;
    }
    assert!(n > 0);
    Ok(())
}

#[test]
fn schema_is_rebuilt_after_create_and_survives_a_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = tmp_db_path(&dir, "i.db");
    {
        let mut db = Database::open(&path)?;
        run_statement(&mut db, "CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)")?;
        run_statement(&mut db, "INSERT INTO t VALUES(5, \"hi\")")?;
        db.close()?;
    }
    let mut db = Database::open(&path)?;
    assert_eq!(db.table_names(), vec!["t"]);
    assert_eq!(select_int_rows(&mut db, "SELECT a FROM t WHERE a = 5", 0)?, vec![5]);
    Ok(())
}
