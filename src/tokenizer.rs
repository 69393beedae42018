// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Scanner for the legacy key-tagged record grammar.
//!
//! The source files are line oriented.  A record opens with an uppercase
//! tag (`CRDS`, `CNTL`, `STFR`, ...) and runs, across physical lines, to
//! the same tag in lowercase:
//!
//! ```text
//! CNTL id '22128_1' nm 'Hvl_schuif1' ct 1 ca 2 ac 1 cf 0 hc ht TBLE
//! 0 0 <
//! 535 0 <
//! tble ps 9999900000 ns 9999900000 cntl
//! ```
//!
//! Within a record:
//!   - `'...'` quoted substrings are single tokens, spaces included.  An
//!     unterminated quote poisons the whole record (warning, skipped).
//!   - `TBLE ... tble` delimits a tabular sub-block.  Rows are terminated
//!     by a `<` marker (the final row may omit it); every row must have
//!     the same cell count.
//!   - The numeric sentinel `9.9999e+009` (a.k.a. `9999900000`) means
//!     "unset" and is surfaced as `None` by [`parse_opt_f64`], never as a
//!     literal value.
//!
//! Blank lines and lines starting with `*` are skipped between records.
//! A malformed record is reported as a warning and skipped; scanning
//! always continues with the next record.  The scanner is a lazy, single
//! forward pass and is not restartable.

use std::str::Lines;

use crate::common::Diagnostics;

/// The "unset / use default" sentinel used by the legacy format.
pub const UNSET_SENTINEL: f64 = 9.9999e9;

const COMMENT_MARKER: char = '*';

/// One field of a record.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Word(String),
    Quoted(String),
    /// Index into [`RawRecord::tables`].
    Table(usize),
}

impl Token {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::Word(s) | Token::Quoted(s) => Some(s),
            Token::Table(_) => None,
        }
    }
}

/// A `TBLE ... tble` sub-block: rows of equal width, cells kept as text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

/// A single tagged record, fields in source order.  Created by the
/// scanner, consumed by a record mapper, then discarded.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    pub tag: String,
    pub tokens: Vec<Token>,
    pub tables: Vec<Table>,
}

/// Parses a numeric field, mapping the unset sentinel to `None`.
pub fn parse_opt_f64(text: &str) -> Option<Option<f64>> {
    let value: f64 = text.parse().ok()?;
    if (value - UNSET_SENTINEL).abs() <= 1e3 {
        Some(None)
    } else {
        Some(Some(value))
    }
}

fn is_open_tag(word: &str) -> bool {
    word.len() >= 3
        && word.len() <= 6
        && word.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && word.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// A token as it appears on one physical line.
#[derive(Debug, PartialEq)]
enum LineTok {
    Word(String),
    Quoted(String),
    RowEnd, // '<'
}

/// Splits one line into tokens, honoring quotes.  Returns `None` on an
/// unterminated quote.
fn tokenize_line(line: &str) -> Option<Vec<LineTok>> {
    let mut toks = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some('\'') => break,
                    Some(ch) => text.push(ch),
                    None => return None,
                }
            }
            toks.push(LineTok::Quoted(text));
        } else if c == '<' {
            chars.next();
            toks.push(LineTok::RowEnd);
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || ch == '\'' || ch == '<' {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            toks.push(LineTok::Word(word));
        }
    }

    Some(toks)
}

enum State {
    Idle,
    /// Accumulating fields of an open record.
    InRecord,
    /// Accumulating rows of a table inside an open record.
    InTable { row: Vec<String> },
    /// A record went bad; discard everything up to its closing tag.
    Skipping,
}

/// Lazy scanner producing [`RawRecord`]s.  Warnings for skipped records
/// go to the supplied [`Diagnostics`]; the stream itself never fails.
pub struct RecordScanner<'a> {
    lines: Lines<'a>,
    diag: &'a mut Diagnostics,
    state: State,
    tag: String,
    close_tag: String,
    tokens: Vec<Token>,
    tables: Vec<Table>,
    current_table: Table,
}

impl<'a> RecordScanner<'a> {
    pub fn new(text: &'a str, diag: &'a mut Diagnostics) -> Self {
        RecordScanner {
            lines: text.lines(),
            diag,
            state: State::Idle,
            tag: String::new(),
            close_tag: String::new(),
            tokens: Vec::new(),
            tables: Vec::new(),
            current_table: Table::default(),
        }
    }

    fn begin_record(&mut self, tag: &str) {
        self.tag = tag.to_owned();
        self.close_tag = tag.to_ascii_lowercase();
        self.tokens.clear();
        self.tables.clear();
        self.current_table = Table::default();
        self.state = State::InRecord;
    }

    fn poison(&mut self, why: &str) {
        self.diag
            .warn(format!("skipping malformed {} record: {}", self.tag, why));
        self.state = State::Skipping;
    }

    fn finish_record(&mut self) -> RawRecord {
        self.state = State::Idle;
        RawRecord {
            tag: std::mem::take(&mut self.tag),
            tokens: std::mem::take(&mut self.tokens),
            tables: std::mem::take(&mut self.tables),
        }
    }

    /// Feeds one token through the state machine; returns a record when
    /// one completes.
    fn feed(&mut self, tok: LineTok) -> Option<RawRecord> {
        match &mut self.state {
            State::Idle => {
                if let LineTok::Word(w) = &tok {
                    if is_open_tag(w) {
                        let tag = w.clone();
                        self.begin_record(&tag);
                    }
                    // stray tokens between records are ignored
                }
                None
            }
            State::InRecord => match tok {
                LineTok::Word(w) => {
                    if w == self.close_tag {
                        return Some(self.finish_record());
                    }
                    if w == "TBLE" {
                        self.current_table = Table::default();
                        self.state = State::InTable { row: Vec::new() };
                        return None;
                    }
                    if is_open_tag(&w) && w == self.tag {
                        // missing close tag; recover at the next record
                        self.poison("record reopened before being closed");
                        let tag = w;
                        self.begin_record(&tag);
                        return None;
                    }
                    self.tokens.push(Token::Word(w));
                    None
                }
                LineTok::Quoted(q) => {
                    self.tokens.push(Token::Quoted(q));
                    None
                }
                LineTok::RowEnd => {
                    self.poison("row terminator '<' outside a table");
                    None
                }
            },
            State::InTable { row } => match tok {
                LineTok::Word(w) if w == "tble" => {
                    let pending = std::mem::take(row);
                    if !pending.is_empty() {
                        self.current_table.rows.push(pending);
                    }
                    let table = std::mem::take(&mut self.current_table);
                    let uniform = table
                        .rows
                        .iter()
                        .all(|r| r.len() == table.width());
                    if !uniform {
                        self.poison("table rows have inconsistent cell counts");
                        return None;
                    }
                    self.tokens.push(Token::Table(self.tables.len()));
                    self.tables.push(table);
                    self.state = State::InRecord;
                    None
                }
                LineTok::Word(w) => {
                    row.push(w);
                    None
                }
                LineTok::Quoted(q) => {
                    row.push(q);
                    None
                }
                LineTok::RowEnd => {
                    let done = std::mem::take(row);
                    self.current_table.rows.push(done);
                    None
                }
            },
            State::Skipping => {
                if let LineTok::Word(w) = &tok {
                    if *w == self.close_tag {
                        self.state = State::Idle;
                    } else if is_open_tag(w) {
                        // the broken record swallowed its close tag;
                        // recover at the next record start
                        let tag = w.clone();
                        self.begin_record(&tag);
                    }
                }
                None
            }
        }
    }
}

impl Iterator for RecordScanner<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        loop {
            let line = match self.lines.next() {
                Some(line) => line,
                None => {
                    match self.state {
                        State::Idle | State::Skipping => {}
                        State::InRecord | State::InTable { .. } => {
                            self.diag.warn(format!(
                                "{} record not closed before end of input; dropped",
                                self.tag
                            ));
                            self.state = State::Idle;
                        }
                    }
                    return None;
                }
            };

            if matches!(self.state, State::Idle)
                && (line.trim().is_empty() || line.trim_start().starts_with(COMMENT_MARKER))
            {
                continue;
            }

            let toks = match tokenize_line(line) {
                Some(toks) => toks,
                None => {
                    match self.state {
                        State::Idle => self
                            .diag
                            .warn("unterminated quote; line ignored".to_owned()),
                        State::Skipping => {}
                        _ => self.poison("unterminated quote"),
                    }
                    continue;
                }
            };

            for tok in toks {
                if let Some(record) = self.feed(tok) {
                    return Some(record);
                }
            }
        }
    }
}

/// Eagerly scans `text`, returning every well-formed record.
pub fn scan_records(text: &str, diag: &mut Diagnostics) -> Vec<RawRecord> {
    RecordScanner::new(text, diag).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> (Vec<RawRecord>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let records = scan_records(text, &mut diag);
        (records, diag)
    }

    #[test]
    fn test_single_record_fields() {
        let (records, diag) = scan("CRDS id '21' nm 'TrapProf01' ty 1 bw 6 crds\n");
        assert!(diag.is_empty());
        assert_eq!(1, records.len());
        let r = &records[0];
        assert_eq!("CRDS", r.tag);
        assert_eq!(
            vec![
                Token::Word("id".into()),
                Token::Quoted("21".into()),
                Token::Word("nm".into()),
                Token::Quoted("TrapProf01".into()),
                Token::Word("ty".into()),
                Token::Word("1".into()),
                Token::Word("bw".into()),
                Token::Word("6".into()),
            ],
            r.tokens
        );
    }

    #[test]
    fn test_quoted_token_keeps_spaces() {
        let (records, _) = scan("STRU id 'weir one' stru\n");
        assert_eq!(Token::Quoted("weir one".into()), records[0].tokens[1]);
    }

    #[test]
    fn test_record_spanning_lines_with_table() {
        let text = "CNTL id '1' hc ht TBLE\n0 0 <\n535 0 <\ntble ps 1.5 cntl\n";
        let (records, diag) = scan(text);
        assert!(diag.is_empty());
        let r = &records[0];
        assert_eq!(1, r.tables.len());
        assert_eq!(
            vec![vec!["0".to_owned(), "0".to_owned()], vec![
                "535".to_owned(),
                "0".to_owned()
            ]],
            r.tables[0].rows
        );
        // table placeholder sits between the 'ht' key and the 'ps' key
        assert_eq!(Token::Table(0), r.tokens[4]);
        assert_eq!(Token::Word("ps".into()), r.tokens[5]);
    }

    #[test]
    fn test_table_final_row_without_terminator() {
        let text = "CNTL ti tv TBLE\n'1991/01/01;00:00:00' 0 <\n'1991/01/02;00:00:00' 1\ntble cntl\n";
        let (records, _) = scan(text);
        assert_eq!(2, records[0].tables[0].rows.len());
    }

    #[test]
    fn test_comment_and_blank_lines_skipped() {
        let text = "* header comment\n\nCRDS id '1' ty 0 crds\n";
        let (records, diag) = scan(text);
        assert!(diag.is_empty());
        assert_eq!(1, records.len());
    }

    #[test]
    fn test_unterminated_quote_skips_record_not_stream() {
        let text = "CRDS id '1 ty 0 crds\nCRDS id '2' ty 0 crds\n";
        let (records, diag) = scan(text);
        assert_eq!(1, records.len());
        assert_eq!(Token::Quoted("2".into()), records[0].tokens[1]);
        assert_eq!(1, diag.len());
    }

    #[test]
    fn test_ragged_table_skips_record() {
        let text = "CNTL ti tv TBLE\n1 2 <\n1 2 3 <\ntble cntl\nCNTL id 'ok' cntl\n";
        let (records, diag) = scan(text);
        assert_eq!(1, records.len());
        assert_eq!(Token::Quoted("ok".into()), records[0].tokens[1]);
        assert!(!diag.is_empty());
    }

    #[test]
    fn test_unclosed_record_at_eof_dropped() {
        let (records, diag) = scan("CRDS id '1' ty 0\n");
        assert!(records.is_empty());
        assert_eq!(1, diag.len());
    }

    #[test]
    fn test_unset_sentinel_maps_to_none() {
        assert_eq!(Some(None), parse_opt_f64("9.9999e+009"));
        assert_eq!(Some(None), parse_opt_f64("9999900000"));
        assert_eq!(Some(Some(1.5)), parse_opt_f64("1.5"));
        assert_eq!(None, parse_opt_f64("bogus"));
    }

    #[test]
    fn test_two_records_same_line() {
        let text = "FLBR id '1' 0 0.5 flbr FLBR id '2' 0 0.7 flbr\n";
        let (records, diag) = scan(text);
        assert!(diag.is_empty());
        assert_eq!(2, records.len());
    }
}
