//! A small SQLite-v3-like single-file relational engine: pager, B-tree,
//! record codec, a register-based virtual machine (the DBM), an in-crate SQL
//! parser, and the `Database`/`Statement` façade tying them together.
//!
//! A typical caller never touches anything below this module: `Database::open`
//! a file, `prepare` SQL text into a `Statement`, and `step` it until it
//! reports [`StepOutcome::Done`], reading columns off each [`StepOutcome::Row`]
//! in between.

mod ast;
mod btree;
mod codegen;
mod cursor;
mod dbheader;
mod dbm;
mod error;
mod optimizer;
pub mod pager;
pub mod parser;
mod pt_to_ast;
mod record;
mod register;
mod schema;

pub use error::{Error, ErrorCode, Result};

use btree::Cell;
use cursor::Cursor;
use pager::{PageNum, Pager};
use register::Register;
use schema::{Schema, SCHEMA_ROOT};

/// One column's decoded value in a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Int(i32),
    Text(String),
}

impl From<&Register> for ColumnValue {
    fn from(r: &Register) -> ColumnValue {
        match r {
            Register::Int(i) => ColumnValue::Int(*i),
            Register::Text(s) => ColumnValue::Text(s.clone()),
            Register::Null | Register::Unspecified | Register::Binary(_) => ColumnValue::Null,
        }
    }
}

/// The host-neutral column type vocabulary exposed by `column_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Text,
    Null,
    /// No row is currently positioned, or the index is out of range.
    Invalid,
}

/// Outcome of one `Statement::step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Row,
    Done,
}

const EXPLAIN_COLUMN_NAMES: [&str; 6] = ["addr", "opcode", "p1", "p2", "p3", "p4"];

/// An open database file: the pager plus the in-memory schema derived from
/// walking the on-disk schema table.
pub struct Database {
    pager: Pager,
    schema: Schema,
}

impl Database {
    /// Opens `path`, creating it as an empty database if it does not exist,
    /// then loads the schema table.
    pub fn open(path: &str) -> Result<Database> {
        let mut pager = Pager::open(path)?;
        let schema = load_schema(&mut pager)?;
        Ok(Database { pager, schema })
    }

    /// Flushes and closes the underlying file.
    pub fn close(self) -> Result<()> {
        self.pager.close()?;
        Ok(())
    }

    /// Parses and code-generates `sql` against the current schema. Borrows
    /// `self` mutably for the statement's lifetime, matching the single
    /// concurrent writer this engine supports per root page.
    pub fn prepare(&mut self, sql: &str) -> Result<Statement<'_>> {
        let pt = parser::parse_statement(sql)?;
        let stmt = pt_to_ast::pt_statement_to_ast(pt);
        let explain = stmt.explain();
        let is_create = stmt.is_create();
        let generated = codegen::generate(&self.schema, &stmt)?;

        Ok(Statement {
            db: self,
            dbm: dbm::Dbm::new(generated.program),
            explain,
            explain_pc: 0,
            columns: generated.columns,
            is_create,
            row: Vec::new(),
        })
    }

    fn reload_schema(&mut self) -> Result<()> {
        self.schema = load_schema(&mut self.pager)?;
        Ok(())
    }

    /// The names of every user table currently known to the schema, in
    /// schema-table order. Used by the CLI's `.tables` meta-command.
    pub fn table_names(&self) -> Vec<&str> {
        self.schema.table_names()
    }

    /// The stored `CREATE TABLE` text for every user table, in schema-table
    /// order. Used by the CLI's `.schema` meta-command.
    pub fn table_sql(&self) -> Vec<&str> {
        self.schema.user_tables().iter().map(|t| t.sql.as_str()).collect()
    }
}

/// A compiled statement bound to the [`Database`] it was prepared against.
pub struct Statement<'db> {
    db: &'db mut Database,
    dbm: dbm::Dbm,
    explain: bool,
    explain_pc: usize,
    columns: Vec<codegen::ResultColumn>,
    is_create: bool,
    row: Vec<ColumnValue>,
}

impl<'db> Statement<'db> {
    /// Runs the statement until it produces a row or halts. In `EXPLAIN`
    /// mode, each call instead returns the next opcode as a six-column row
    /// without executing anything.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if self.explain {
            if self.explain_pc >= self.dbm.program.len() {
                return Ok(StepOutcome::Done);
            }
            let instr = &self.dbm.program[self.explain_pc];
            self.row = vec![
                ColumnValue::Int(self.explain_pc as i32),
                ColumnValue::Text(format!("{:?}", instr.op)),
                ColumnValue::Int(instr.p1 as i32),
                ColumnValue::Int(instr.p2 as i32),
                ColumnValue::Int(instr.p3 as i32),
                match &instr.p4 {
                    Some(s) => ColumnValue::Text(s.clone()),
                    None => ColumnValue::Null,
                },
            ];
            self.explain_pc += 1;
            return Ok(StepOutcome::Row);
        }

        match self.dbm.step(&mut self.db.pager)? {
            dbm::StepResult::Row => {
                self.row = self.dbm.result_row().iter().map(ColumnValue::from).collect();
                Ok(StepOutcome::Row)
            }
            dbm::StepResult::Done => {
                if self.is_create {
                    self.db.reload_schema()?;
                }
                Ok(StepOutcome::Done)
            }
        }
    }

    pub fn column_count(&self) -> usize {
        if self.explain {
            EXPLAIN_COLUMN_NAMES.len()
        } else {
            self.columns.len()
        }
    }

    pub fn column_name(&self, i: usize) -> &str {
        if self.explain {
            EXPLAIN_COLUMN_NAMES[i]
        } else {
            &self.columns[i].name
        }
    }

    pub fn column_type(&self, i: usize) -> ColumnType {
        match self.row.get(i) {
            Some(ColumnValue::Int(_)) => ColumnType::Int,
            Some(ColumnValue::Text(_)) => ColumnType::Text,
            Some(ColumnValue::Null) => ColumnType::Null,
            None => ColumnType::Invalid,
        }
    }

    pub fn column_int(&self, i: usize) -> Option<i32> {
        match self.row.get(i) {
            Some(ColumnValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn column_text(&self, i: usize) -> Option<&str> {
        match self.row.get(i) {
            Some(ColumnValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Releases the statement. Cursors and registers are released by
    /// ordinary `Drop` once this value goes out of scope; this method exists
    /// so callers have an explicit lifecycle call to make, per the API's
    /// `finalize` contract.
    pub fn finalize(self) {}
}

/// Walks the schema b-tree rooted at page 1, re-parsing each row's stored
/// `CREATE TABLE` text to recover its column list.
fn load_schema(pager: &mut Pager) -> Result<Schema> {
    let mut schema = Schema::new();
    let mut cursor = Cursor::new(pager, SCHEMA_ROOT, 5)?;
    if !cursor.rewind(pager)? {
        return Ok(schema);
    }
    loop {
        if let Cell::TableLeaf { payload, .. } = cursor.current_cell(pager)? {
            let values = record::unpack(&payload)?;
            if record::get_text(&values, 0)? == "table" {
                let name = record::get_text(&values, 1)?.to_string();
                let root = record::get_int(&values, 3)? as PageNum;
                let sql = record::get_text(&values, 4)?.to_string();
                let pt = parser::parse_statement(&sql)?;
                if let Ok(cs) = pt_to_ast::pt_statement_to_ast(pt).into_create() {
                    let columns = cs
                        .coldefs
                        .iter()
                        .map(|cd| schema::ColumnDef {
                            name: cd.colname.name.clone(),
                            coltype: schema::ColType::parse(&cd.coltype)
                                .expect("schema row sql was produced by this codegen and always names a supported column type"),
                        })
                        .collect();
                    schema.add_table(schema::TableSchema { name, root, columns, sql });
                }
            }
        }
        if !cursor.next(pager)? {
            break;
        }
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db").to_str().unwrap().to_string();
        (dir, Database::open(&path).unwrap())
    }

    fn stmt_row_value(stmt: &Statement, i: usize) -> ColumnValue {
        match stmt.column_type(i) {
            ColumnType::Int => ColumnValue::Int(stmt.column_int(i).unwrap()),
            ColumnType::Text => ColumnValue::Text(stmt.column_text(i).unwrap().to_string()),
            ColumnType::Null | ColumnType::Invalid => ColumnValue::Null,
        }
    }

    fn run_to_rows(stmt: &mut Statement) -> Vec<Vec<ColumnValue>> {
        let mut rows = Vec::new();
        loop {
            match stmt.step().unwrap() {
                StepOutcome::Row => {
                    rows.push((0..stmt.column_count()).map(|i| stmt_row_value(stmt, i)).collect())
                }
                StepOutcome::Done => break,
            }
        }
        rows
    }

    #[test]
    fn create_insert_select_round_trip() {
        let (_d, mut db) = tmp_db();
        db.prepare("CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)")
            .unwrap()
            .step()
            .unwrap();
        db.prepare("INSERT INTO t VALUES(1, \"x\")").unwrap().step().unwrap();

        let mut stmt = db.prepare("SELECT * FROM t").unwrap();
        let rows = run_to_rows(&mut stmt);
        assert_eq!(rows, vec![vec![ColumnValue::Int(1), ColumnValue::Text("x".to_string())]]);
    }

    #[test]
    fn where_predicate_on_non_key_column_filters_rows() {
        let (_d, mut db) = tmp_db();
        db.prepare("CREATE TABLE t(a INTEGER PRIMARY KEY, b INTEGER)")
            .unwrap()
            .step()
            .unwrap();
        for (a, b) in [(1, 10), (2, 20), (3, 30)] {
            db.prepare(&format!("INSERT INTO t VALUES({a}, {b})")).unwrap().step().unwrap();
        }

        let mut stmt = db.prepare("SELECT a FROM t WHERE b > 15").unwrap();
        let rows = run_to_rows(&mut stmt);
        assert_eq!(rows, vec![vec![ColumnValue::Int(2)], vec![ColumnValue::Int(3)]]);
    }

    #[test]
    fn duplicate_primary_key_surfaces_as_error() {
        let (_d, mut db) = tmp_db();
        db.prepare("CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)")
            .unwrap()
            .step()
            .unwrap();
        db.prepare("INSERT INTO t VALUES(1, \"x\")").unwrap().step().unwrap();
        let err = db.prepare("INSERT INTO t VALUES(1, \"y\")").unwrap().step().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Duplicate);
    }

    #[test]
    fn unknown_column_is_invalid_sql_at_prepare_time() {
        let (_d, mut db) = tmp_db();
        db.prepare("CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)")
            .unwrap()
            .step()
            .unwrap();
        let err = db.prepare("SELECT * FROM t WHERE c = 1").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSql);
    }

    #[test]
    fn explain_emits_one_row_per_opcode() {
        let (_d, mut db) = tmp_db();
        db.prepare("CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)")
            .unwrap()
            .step()
            .unwrap();
        let mut stmt = db.prepare("EXPLAIN SELECT * FROM t").unwrap();
        assert_eq!(stmt.column_count(), 6);
        let rows = run_to_rows(&mut stmt);
        assert!(!rows.is_empty());
        assert_eq!(rows[0][0], ColumnValue::Int(0));
    }

    #[test]
    fn schema_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db").to_str().unwrap().to_string();
        {
            let mut db = Database::open(&path).unwrap();
            db.prepare("CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)")
                .unwrap()
                .step()
                .unwrap();
            db.prepare("INSERT INTO t VALUES(7, \"hi\")").unwrap().step().unwrap();
            db.close().unwrap();
        }
        let mut db = Database::open(&path).unwrap();
        assert_eq!(db.table_names(), vec!["t"]);
        let mut stmt = db.prepare("SELECT b FROM t WHERE a = 7").unwrap();
        assert_eq!(run_to_rows(&mut stmt), vec![vec![ColumnValue::Text("hi".to_string())]]);
    }
}
