//! A minimal REPL: open a database file named on the command line, read
//! statements from stdin one per line, and print result rows as an ASCII
//! table. Lines beginning with `.` are meta-commands; everything else is
//! handed to `prepare`/`step`.

use std::io::{self, BufRead, Write};

use chidb_rs::{ColumnType, Database, StepOutcome};

fn print_row_table(header: &[String], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }
    let print_row = |cells: &[String]| {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = w))
            .collect();
        println!("{}", line.join(" | "));
    };
    print_row(header);
    for row in rows {
        print_row(row);
    }
}

fn column_value_to_string(stmt: &chidb_rs::Statement, i: usize) -> String {
    match stmt.column_type(i) {
        ColumnType::Int => stmt.column_int(i).unwrap().to_string(),
        ColumnType::Text => stmt.column_text(i).unwrap().to_string(),
        ColumnType::Null | ColumnType::Invalid => "NULL".to_string(),
    }
}

fn run_statement(db: &mut Database, sql: &str) -> anyhow::Result<()> {
    let mut stmt = db.prepare(sql)?;
    let header: Vec<String> = (0..stmt.column_count()).map(|i| stmt.column_name(i).to_string()).collect();
    let mut rows = Vec::new();
    loop {
        match stmt.step()? {
            StepOutcome::Row => {
                rows.push((0..stmt.column_count()).map(|i| column_value_to_string(&stmt, i)).collect())
            }
            StepOutcome::Done => break,
        }
    }
    if !header.is_empty() {
        print_row_table(&header, &rows);
    }
    stmt.finalize();
    Ok(())
}

fn run_meta_command(db: &Database, line: &str) -> bool {
    match line {
        ".quit" => true,
        ".tables" => {
            println!("{}", db.table_names().join(" "));
            false
        }
        ".schema" => {
            for sql in db.table_sql() {
                println!("{sql};");
            }
            false
        }
        other => {
            eprintln!("unknown meta-command: {other}");
            false
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = std::env::args().nth(1).ok_or_else(|| anyhow::anyhow!("usage: chidb-rs <database-file>"))?;
    let mut db = Database::open(&path)?;

    let stdin = io::stdin();
    print!("chidb> ");
    io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            print!("chidb> ");
            io::stdout().flush()?;
            continue;
        }
        if line.starts_with('.') {
            if run_meta_command(&db, line) {
                break;
            }
        } else if let Err(e) = run_statement(&mut db, line) {
            eprintln!("error: {e}");
        }
        print!("chidb> ");
        io::stdout().flush()?;
    }

    db.close()?;
    Ok(())
}
