//! Interactive SQL shell
//!
//! Reads `;`-terminated statements, runs them through a [`CursorProxy`] and
//! prints the results as a table. Query errors are printed and the session
//! continues; any other error ends it.

use crate::config::ClientConfig;
use crate::connection::{connect, CursorProxy, RawCursor, Row};
use crate::{Error, Result};
use comfy_table::{presets, Table};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use std::io::{self, Write};

/// Prompt for the first line of a statement
pub const PROMPT: &str = "> ";
/// Prompt for continuation lines
pub const CONTINUATION_PROMPT: &str = "  ";

/// Where the shell reads its input from
pub trait LineSource {
    /// Read one line; `Ok(None)` on end of input or interrupt
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

impl LineSource for DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => Ok(None),
            Err(ReadlineError::Io(e)) => Err(Error::Io(e)),
            Err(e) => Err(Error::Io(io::Error::other(e))),
        }
    }
}

/// Read one statement, execute it and print the result.
///
/// Returns `Ok(false)` when the input ends between statements, which is the
/// signal to leave the shell. Input ending mid-statement discards the partial
/// statement and returns `Ok(true)`.
pub async fn read_eval_print<C, L, W>(
    cursor: &mut CursorProxy<C>,
    input: &mut L,
    out: &mut W,
) -> Result<bool>
where
    C: RawCursor,
    L: LineSource,
    W: Write,
{
    let mut lines: Vec<String> = Vec::new();
    loop {
        let prompt = if lines.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        };
        let line = match input.read_line(prompt)? {
            Some(line) => line.trim().to_string(),
            None => {
                writeln!(out)?;
                return Ok(!lines.is_empty());
            }
        };

        let done = line.ends_with(';');
        lines.push(line);
        if done {
            break;
        }
    }

    let mut sql = lines.join("\n");
    sql.pop();

    match cursor.execute(&sql).await {
        Ok(()) => {}
        Err(Error::Query(e)) => {
            writeln!(out, "{}", e.message)?;
            return Ok(true);
        }
        Err(e) => return Err(e),
    }

    let headers: Vec<String> = cursor
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    loop {
        match cursor.next_row().await {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break,
            Err(Error::Query(e)) => {
                writeln!(out, "{}", e.message)?;
                return Ok(true);
            }
            Err(e) => return Err(e),
        }
    }

    writeln!(out)?;
    writeln!(out, "{}", render_table(&headers, &rows))?;
    Ok(true)
}

/// Render rows under `headers` as a plain text table
pub fn render_table(headers: &[String], rows: &[Row]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::ASCII_HORIZONTAL_ONLY);
    table.set_header(headers.iter().cloned());
    for row in rows {
        table.add_row(row.iter().map(render_value));
    }
    table
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Run the shell against `url` until input ends
pub async fn repl(url: &str, config: &ClientConfig) -> Result<()> {
    let connection = connect(url, config).await?;
    let mut cursor = connection.cursor()?;
    let mut editor = DefaultEditor::new().map_err(|e| Error::Io(io::Error::other(e)))?;
    let mut out = io::stdout();

    while read_eval_print(&mut cursor, &mut editor, &mut out).await? {}

    cursor.close().await
}
