//! The in-memory schema: one entry per table, derived by walking the
//! on-disk schema b-tree (rooted always at page 1) and re-parsing each
//! row's stored `CREATE TABLE` text. Rebuilt by the API façade on `open`
//! and after every successful `CREATE TABLE`.

use crate::pager::PageNum;

pub const SCHEMA_ROOT: PageNum = 1;
pub const SCHEMA_TABLE_NAME: &str = "sqlite_schema";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColType {
    Integer,
    Text,
}

impl ColType {
    pub fn parse(s: &str) -> Option<ColType> {
        match s.to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" => Some(ColType::Integer),
            "TEXT" | "STRING" => Some(ColType::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub coltype: ColType,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub root: PageNum,
    pub columns: Vec<ColumnDef>,
    /// The `CREATE TABLE` text this entry was parsed from, kept around for
    /// `.schema`-style introspection.
    pub sql: String,
}

impl TableSchema {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// The schema table itself is a fixed, hardcoded entry (matching this
/// codebase's existing special-casing of `sqlite_schema`): it is never a
/// row inside itself.
fn schema_table_schema() -> TableSchema {
    TableSchema {
        name: SCHEMA_TABLE_NAME.to_string(),
        root: SCHEMA_ROOT,
        columns: vec![
            ColumnDef { name: "type".into(), coltype: ColType::Text },
            ColumnDef { name: "name".into(), coltype: ColType::Text },
            ColumnDef { name: "tbl_name".into(), coltype: ColType::Text },
            ColumnDef { name: "rootpage".into(), coltype: ColType::Integer },
            ColumnDef { name: "sql".into(), coltype: ColType::Text },
        ],
        sql: format!(
            "CREATE TABLE {SCHEMA_TABLE_NAME} (type text, name text, tbl_name text, rootpage integer, sql text)"
        ),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: Vec<TableSchema>,
}

impl Schema {
    pub fn new() -> Schema {
        Schema { tables: vec![schema_table_schema()] }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn add_table(&mut self, table: TableSchema) {
        self.tables.push(table);
    }

    /// Number of user tables registered (excludes the hardcoded schema
    /// table entry), used to assign the next schema-row primary key.
    pub fn user_table_count(&self) -> usize {
        self.tables.len() - 1
    }

    /// Names of every user table (excludes the hardcoded schema table
    /// entry), in the order they were registered.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables[1..].iter().map(|t| t.name.as_str()).collect()
    }

    /// Every user table's schema entry (excludes the hardcoded schema table
    /// entry), in the order they were registered.
    pub fn user_tables(&self) -> &[TableSchema] {
        &self.tables[1..]
    }
}
