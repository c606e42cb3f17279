//! The in-crate SQL lexer/parser: a `pest` grammar (`src/sql.pest`) plus the
//! generated `SQLParser` struct. This module only turns text into a `pest`
//! parse tree; walking that tree into `crate::ast` types is `pt_to_ast`'s
//! job.

use pest::Parser;

#[derive(Parser)]
#[grammar = "sql.pest"]
pub struct SQLParser;

#[derive(thiserror::Error, Debug, Clone)]
#[error("SQL parse error: {0}")]
pub struct Error(String);

/// Parses `sql` as a single `statement` and returns its parse tree.
pub fn parse_statement(sql: &str) -> Result<pest::iterators::Pair<'_, Rule>, Error> {
    let mut pairs = SQLParser::parse(Rule::program, sql).map_err(|e| Error(e.to_string()))?;
    let program = pairs.next().ok_or_else(|| Error("empty input".to_string()))?;
    let stmt = program
        .into_inner()
        .find(|p| p.as_rule() == Rule::statement)
        .ok_or_else(|| Error("no statement found".to_string()))?;
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_statement() {
        let stmt = parse_statement("CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)").unwrap();
        assert_eq!(stmt.as_rule(), Rule::statement);
    }

    #[test]
    fn parses_select_with_where() {
        let stmt = parse_statement("SELECT a, b FROM t WHERE a = 2").unwrap();
        assert_eq!(stmt.as_rule(), Rule::statement);
    }

    #[test]
    fn parses_explain_select() {
        let stmt = parse_statement("EXPLAIN SELECT * FROM t").unwrap();
        assert_eq!(stmt.as_rule(), Rule::statement);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_statement("not sql at all !!!").is_err());
    }
}
