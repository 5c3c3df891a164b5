//! CSV persistence of decoded records: `Year,Unit,Title,Track,GrantCount`,
//! header row first.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::mem::take;
use std::path::Path;

use crate::model::{Scholarship, COLUMNS};
use crate::{Error, Result};

const SEP: char = ',';

/* ---------------- Writing ---------------- */

/// Ordered record sink. The header is written on construction.
pub struct CsvSink<W: Write> {
    writer: W,
    written: usize,
}

impl CsvSink<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        write_row(&mut writer, &COLUMNS)?;
        Ok(Self { writer, written: 0 })
    }

    pub fn write(&mut self, record: &Scholarship) -> Result<()> {
        write_row(&mut self.writer, &record.to_row())?;
        self.written += 1;
        Ok(())
    }

    /// Records written so far, header excluded.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn needs_quotes(field: &str) -> bool {
    field.contains(SEP) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> std::io::Result<()> {
    let mut first = true;
    for cell in row {
        let cell = cell.as_ref();
        if !first {
            write!(w, "{}", SEP)?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/* ---------------- Reading ---------------- */

/// Reads back everything a [`CsvSink`] wrote. Any bad row fails the whole read.
pub fn load(path: &Path) -> Result<Vec<Scholarship>> {
    read_scholarships(File::open(path)?)
}

pub fn read_scholarships<R: Read>(mut reader: R) -> Result<Vec<Scholarship>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut rows = parse_rows(&text).into_iter();
    match rows.next() {
        Some(header) if header == COLUMNS => {}
        Some(header) => {
            return Err(Error::MalformedRow {
                row: 1,
                reason: format!("unexpected header {header:?}"),
            })
        }
        None => {
            return Err(Error::MalformedRow {
                row: 1,
                reason: "missing header".into(),
            })
        }
    }

    // Row numbers are 1-based and count the header.
    rows.enumerate()
        .map(|(i, row)| parse_record(i + 2, row))
        .collect()
}

fn parse_record(row_num: usize, row: Vec<String>) -> Result<Scholarship> {
    let malformed = |reason: String| Error::MalformedRow { row: row_num, reason };

    let [year, unit, title, track, grants]: [String; 5] = row
        .try_into()
        .map_err(|row: Vec<String>| malformed(format!("expected 5 columns, found {}", row.len())))?;

    let year = year
        .parse::<i32>()
        .map_err(|_| malformed(format!("invalid Year `{year}`")))?;
    let grant_count = grants
        .parse::<u32>()
        .map_err(|_| malformed(format!("invalid GrantCount `{grants}`")))?;

    Ok(Scholarship { year, unit, title, track, grant_count })
}

/// Minimal CSV parser (quotes + CRLF tolerant). Blank lines are skipped.
fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next(); // double-quote escape
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            c if c == SEP && !in_quotes => {
                row.push(take(&mut field));
            }
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                push_row(&mut rows, &mut row, &mut field);
            }
            _ => field.push(ch),
        }
    }

    // Flush a trailing row without a final newline.
    push_row(&mut rows, &mut row, &mut field);
    rows
}

fn push_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, field: &mut String) {
    row.push(take(field));
    if row.len() == 1 && row[0].is_empty() {
        row.clear();
    } else {
        rows.push(take(row));
    }
}
