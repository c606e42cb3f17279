//! Walks a `pest` parse tree (one `Rule::statement` pair) into the
//! `crate::ast` types consumed by the optimizer and code generator.
//!
//! A `pest` parse tree has one enum (`Rule`) covering every terminal and
//! non-terminal; the AST instead has one small enum/struct per production,
//! and drops lexical detail (case, surrounding whitespace, quote style).

use pest::iterators::Pair;

use crate::ast;
use crate::parser::Rule;

fn unquote(s: &str) -> String {
    let bytes = s.as_bytes();
    String::from_utf8_lossy(&bytes[1..bytes.len() - 1]).into_owned()
}

fn constant_from_pair(p: Pair<Rule>) -> ast::Constant {
    let inner = p.into_inner().next().expect("constant has one child");
    match inner.as_rule() {
        Rule::int_const => ast::Constant::Int(inner.as_str().parse().expect("valid int literal")),
        Rule::real_const => {
            ast::Constant::Real(inner.as_str().parse().expect("valid real literal"))
        }
        Rule::string_const => ast::Constant::String(unquote(inner.as_str())),
        other => unreachable!("unexpected constant child rule {:?}", other),
    }
}

fn cmp_op_from_pair(p: Pair<Rule>) -> ast::CmpOp {
    match p.as_str() {
        "=" => ast::CmpOp::Eq,
        "<>" | "!=" => ast::CmpOp::Ne,
        "<" => ast::CmpOp::Lt,
        "<=" => ast::CmpOp::Le,
        ">" => ast::CmpOp::Gt,
        ">=" => ast::CmpOp::Ge,
        other => unreachable!("unexpected comparison operator {:?}", other),
    }
}

fn create_stmt_to_ast(p: Pair<Rule>, explain: bool) -> ast::CreateStatement {
    let mut tablename = String::new();
    let mut coldefs = vec![];
    for c in p.into_inner() {
        match c.as_rule() {
            Rule::table_identifier => tablename = c.as_str().to_string(),
            Rule::column_defs => {
                use itertools::Itertools;
                for column_def in c.into_inner() {
                    // A column_def is `column_name ~ col_type ~ primary_key?`;
                    // `take(2)` drops the optional trailing `primary_key` pair
                    // before destructuring the name/type we actually keep.
                    let (name, coltype) = column_def
                        .into_inner()
                        .take(2)
                        .map(|e| e.as_str())
                        .collect_tuple()
                        .expect("column_def always has a name and a type");
                    coldefs.push(ast::ColDef {
                        colname: ast::ColName { name: name.to_string() },
                        coltype: coltype.to_lowercase(),
                    });
                }
            }
            other => unreachable!("unexpected create_stmt child rule {:?}", other),
        }
    }
    ast::CreateStatement {
        explain,
        tablename,
        coldefs,
    }
}

fn insert_stmt_to_ast(p: Pair<Rule>, explain: bool) -> ast::InsertStatement {
    let mut tablename = String::new();
    let mut values = vec![];
    for c in p.into_inner() {
        match c.as_rule() {
            Rule::table_identifier => tablename = c.as_str().to_string(),
            Rule::value_list => {
                for v in c.into_inner() {
                    values.push(constant_from_pair(v));
                }
            }
            other => unreachable!("unexpected insert_stmt child rule {:?}", other),
        }
    }
    ast::InsertStatement {
        explain,
        tablename,
        values,
    }
}

fn select_stmt_to_ast(p: Pair<Rule>, explain: bool) -> ast::SelectStatement {
    let mut items = vec![];
    let mut from = None;
    let mut r#where = None;
    for c in p.into_inner() {
        match c.as_rule() {
            Rule::select_clause => {
                for item in c.into_inner() {
                    let inner = item.into_inner().next().unwrap();
                    items.push(match inner.as_rule() {
                        Rule::star => ast::SelItem::Star,
                        Rule::column_name => ast::SelItem::ColName(ast::ColName {
                            name: inner.as_str().to_string(),
                        }),
                        other => unreachable!("unexpected select_item child rule {:?}", other),
                    });
                }
            }
            Rule::from_clause => {
                let tables: Vec<String> = c
                    .into_inner()
                    .filter(|t| t.as_rule() == Rule::table_identifier)
                    .map(|t| t.as_str().to_string())
                    .collect();
                from = Some(if tables.len() == 1 {
                    ast::FromClause::Table(tables[0].clone())
                } else {
                    ast::FromClause::NaturalJoin(tables[0].clone(), tables[1].clone())
                });
            }
            Rule::where_clause => {
                let mut inner = c.into_inner();
                let column = ast::ColName {
                    name: inner.next().unwrap().as_str().to_string(),
                };
                let op = cmp_op_from_pair(inner.next().unwrap());
                let value = constant_from_pair(inner.next().unwrap());
                r#where = Some(ast::WhereClause { column, op, value });
            }
            other => unreachable!("unexpected select_stmt child rule {:?}", other),
        }
    }
    ast::SelectStatement {
        explain,
        items,
        from: from.expect("select_stmt always has a from_clause"),
        r#where,
    }
}

/// Converts one `Rule::statement` parse-tree node into `ast::Statement`.
pub fn pt_statement_to_ast(stmt: Pair<Rule>) -> ast::Statement {
    let mut explain = false;
    let mut result = None;
    for c in stmt.into_inner() {
        match c.as_rule() {
            Rule::explain_kw => explain = true,
            Rule::create_stmt => {
                result = Some(ast::Statement::Create(create_stmt_to_ast(c, explain)))
            }
            Rule::insert_stmt => {
                result = Some(ast::Statement::Insert(insert_stmt_to_ast(c, explain)))
            }
            Rule::select_stmt => {
                result = Some(ast::Statement::Select(select_stmt_to_ast(c, explain)))
            }
            other => unreachable!("unexpected statement child rule {:?}", other),
        }
    }
    result.expect("a statement always contains exactly one of create/insert/select")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_statement;

    #[test]
    fn create_statement_round_trip() {
        let stmt = pt_statement_to_ast(
            parse_statement("CREATE TABLE t(a INTEGER PRIMARY KEY, b TEXT)").unwrap(),
        );
        match stmt {
            ast::Statement::Create(c) => {
                assert_eq!(c.tablename, "t");
                assert_eq!(c.coldefs.len(), 2);
                assert_eq!(c.coldefs[0].colname.name, "a");
                assert_eq!(c.coldefs[0].coltype, "integer");
                assert_eq!(c.coldefs[1].coltype, "text");
            }
            _ => panic!("expected Create"),
        }
    }

    #[test]
    fn insert_statement_values() {
        let stmt =
            pt_statement_to_ast(parse_statement("INSERT INTO t VALUES (1, \"x\")").unwrap());
        match stmt {
            ast::Statement::Insert(i) => {
                assert_eq!(i.tablename, "t");
                assert_eq!(
                    i.values,
                    vec![ast::Constant::Int(1), ast::Constant::String("x".to_string())]
                );
            }
            _ => panic!("expected Insert"),
        }
    }

    #[test]
    fn select_with_where_and_explain() {
        let stmt =
            pt_statement_to_ast(parse_statement("EXPLAIN SELECT a FROM t WHERE b > 15").unwrap());
        match stmt {
            ast::Statement::Select(s) => {
                assert!(s.explain);
                assert_eq!(
                    s.items,
                    vec![ast::SelItem::ColName(ast::ColName {
                        name: "a".to_string()
                    })]
                );
                assert_eq!(s.from, ast::FromClause::Table("t".to_string()));
                let w = s.r#where.unwrap();
                assert_eq!(w.column.name, "b");
                assert_eq!(w.op, ast::CmpOp::Gt);
                assert_eq!(w.value, ast::Constant::Int(15));
            }
            _ => panic!("expected Select"),
        }
    }

    #[test]
    fn select_natural_join() {
        let stmt = pt_statement_to_ast(parse_statement("SELECT * FROM t1 NATURAL JOIN t2").unwrap());
        match stmt {
            ast::Statement::Select(s) => {
                assert_eq!(
                    s.from,
                    ast::FromClause::NaturalJoin("t1".to_string(), "t2".to_string())
                );
            }
            _ => panic!("expected Select"),
        }
    }
}
