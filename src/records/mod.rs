// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Record-to-struct mappers.
//!
//! Each submodule maps one family of [`RawRecord`]s onto typed definition
//! structs.  This layer is pure structural translation: keyed fields are
//! located in the token stream, missing trailing fields take their schema
//! default, and unknown tags are ignored without error.  Anything derived
//! or computed lives in the builders, not here.

pub mod controller;
pub mod cross_section;
pub mod friction;
pub mod initial;
pub mod network;
pub mod structure_def;
pub mod trigger;
pub mod valve;

use chrono::NaiveDateTime;

use crate::tokenizer::{parse_opt_f64, RawRecord, Table, Token};

/// Timestamp grammar used inside tables: `1991/01/01;00:00:00`.
const DATETIME_FORMAT: &str = "%Y/%m/%d;%H:%M:%S";

pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT).ok()
}

/// Keyed view over a raw record's token stream.
///
/// The legacy grammar is `key value`, `key 'quoted'`, or `key1 key2
/// TBLE...tble` pairs in no fixed order, so lookups scan for the first
/// occurrence of the key word.
pub struct RecordView<'a> {
    rec: &'a RawRecord,
}

impl<'a> RecordView<'a> {
    pub fn new(rec: &'a RawRecord) -> Self {
        RecordView { rec }
    }

    pub fn tag(&self) -> &str {
        &self.rec.tag
    }

    /// Index of the token following the first standalone `key` word.
    fn after_key(&self, key: &str) -> Option<usize> {
        self.rec
            .tokens
            .iter()
            .position(|t| matches!(t, Token::Word(w) if w == key))
            .map(|i| i + 1)
    }

    /// Index of the token following the first occurrence of the
    /// consecutive word sequence `keys` (e.g. `["hc", "ht"]`).
    fn after_seq(&self, keys: &[&str]) -> Option<usize> {
        let toks = &self.rec.tokens;
        'outer: for start in 0..toks.len() {
            for (j, key) in keys.iter().enumerate() {
                match toks.get(start + j) {
                    Some(Token::Word(w)) if w == key => {}
                    _ => continue 'outer,
                }
            }
            return Some(start + keys.len());
        }
        None
    }

    fn str_at(&self, idx: usize) -> Option<&'a str> {
        self.rec.tokens.get(idx).and_then(Token::as_str)
    }

    pub fn str_after(&self, key: &str) -> Option<&'a str> {
        self.str_at(self.after_key(key)?)
    }

    pub fn quoted_after(&self, key: &str) -> Option<&'a str> {
        match self.rec.tokens.get(self.after_key(key)?) {
            Some(Token::Quoted(s)) => Some(s),
            _ => None,
        }
    }

    pub fn f64_after(&self, key: &str) -> Option<f64> {
        self.str_after(key)?.parse().ok()
    }

    /// Numeric field with the unset sentinel mapped to `None`; outer
    /// `None` when the key is missing or unparseable.
    pub fn opt_f64_after(&self, key: &str) -> Option<Option<f64>> {
        parse_opt_f64(self.str_after(key)?)
    }

    pub fn i32_after(&self, key: &str) -> Option<i32> {
        self.str_after(key)?.parse().ok()
    }

    pub fn bool01_after(&self, key: &str) -> Option<bool> {
        Some(self.i32_after(key)? != 0)
    }

    /// `n` consecutive quoted values after `key` (trigger id slots).
    pub fn quoted_seq_after(&self, key: &str, n: usize) -> Option<Vec<&'a str>> {
        let start = self.after_key(key)?;
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            match self.rec.tokens.get(start + i) {
                Some(Token::Quoted(s)) => out.push(s.as_str()),
                _ => return None,
            }
        }
        Some(out)
    }

    /// `n` consecutive word values after `key` (flag slots).
    pub fn words_after(&self, key: &str, n: usize) -> Option<Vec<&'a str>> {
        let start = self.after_key(key)?;
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            match self.rec.tokens.get(start + i) {
                Some(Token::Word(w)) => out.push(w.as_str()),
                _ => return None,
            }
        }
        Some(out)
    }

    /// The first table at or after the key sequence `keys`.
    pub fn table_after_seq(&self, keys: &[&str]) -> Option<&'a Table> {
        let start = self.after_seq(keys)?;
        self.rec.tokens[start..].iter().find_map(|t| match t {
            Token::Table(i) => Some(&self.rec.tables[*i]),
            _ => None,
        })
    }

    pub fn first_table(&self) -> Option<&'a Table> {
        self.rec.tables.first()
    }

    /// Every table in the record, in token order.
    pub fn tables(&self) -> Vec<&'a Table> {
        self.rec
            .tokens
            .iter()
            .filter_map(|t| match t {
                Token::Table(i) => Some(&self.rec.tables[*i]),
                _ => None,
            })
            .collect()
    }

    pub fn id(&self) -> Option<&'a str> {
        self.quoted_after("id")
    }

    pub fn name(&self) -> String {
        self.quoted_after("nm").unwrap_or_default().to_owned()
    }

    /// The `PDIN i1 i2 'period' pdin` interpolation/extrapolation block.
    pub fn pdin(&self) -> Option<PdinBlock> {
        let start = self.after_key("PDIN")?;
        let block_interpolation = matches!(self.str_at(start), Some("1"));
        let periodic = matches!(self.str_at(start + 1), Some("1"));
        let period = match self.rec.tokens.get(start + 2) {
            Some(Token::Quoted(s)) => s.clone(),
            _ => String::new(),
        };
        Some(PdinBlock {
            block_interpolation,
            periodic,
            period,
        })
    }
}

/// Parsed `PDIN` block: interpolation method plus periodic extrapolation
/// settings for the table that precedes it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PdinBlock {
    /// true = block (constant) interpolation, false = linear.
    pub block_interpolation: bool,
    pub periodic: bool,
    /// Period stamp, e.g. `365;00:00:00`; empty when not periodic.
    pub period: String,
}

impl PdinBlock {
    /// Periodic extrapolation applies only when the flag is set and the
    /// period is a real, non-zero stamp.
    pub fn periodic_period(&self) -> Option<&str> {
        if self.periodic && !self.period.is_empty() {
            Some(&self.period)
        } else {
            None
        }
    }
}

/// Reads a two-column `(datetime, value)` table.  Rows that fail to parse
/// are dropped; the caller treats an empty result as a missing table.
pub fn time_table(table: &Table) -> Vec<(NaiveDateTime, f64)> {
    table
        .rows
        .iter()
        .filter_map(|row| {
            let time = parse_datetime(row.first()?)?;
            let value: f64 = row.get(1)?.parse().ok()?;
            Some((time, value))
        })
        .collect()
}

/// Reads a two-column `(x, y)` lookup table.
pub fn lookup_table(table: &Table) -> Vec<(f64, f64)> {
    table
        .rows
        .iter()
        .filter_map(|row| {
            let x: f64 = row.first()?.parse().ok()?;
            let y: f64 = row.get(1)?.parse().ok()?;
            Some((x, y))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Diagnostics;
    use crate::tokenizer::scan_records;

    fn first_record(text: &str) -> RawRecord {
        let mut diag = Diagnostics::new();
        scan_records(text, &mut diag).remove(0)
    }

    #[test]
    fn test_keyed_lookup() {
        let rec = first_record("STDS id 'W1' nm 'weir' ty 6 cl 10 cw 5.5 stds\n");
        let view = RecordView::new(&rec);
        assert_eq!(Some("W1"), view.id());
        assert_eq!("weir", view.name());
        assert_eq!(Some(6), view.i32_after("ty"));
        assert_eq!(Some(10.0), view.f64_after("cl"));
        assert_eq!(Some(5.5), view.f64_after("cw"));
        assert_eq!(None, view.f64_after("zz"));
    }

    #[test]
    fn test_table_after_seq() {
        let rec = first_record("CNTL id '1' hc ht TBLE\n0 1 <\n2 3 <\ntble cntl\n");
        let view = RecordView::new(&rec);
        let table = view.table_after_seq(&["hc", "ht"]).unwrap();
        assert_eq!(vec![(0.0, 1.0), (2.0, 3.0)], lookup_table(table));
        assert!(view.table_after_seq(&["ti", "tv"]).is_none());
    }

    #[test]
    fn test_pdin_block() {
        let rec = first_record("CNTL id '1' ti tv PDIN 1 1 '365;00:00:00' pdin cntl\n");
        let view = RecordView::new(&rec);
        let pdin = view.pdin().unwrap();
        assert!(pdin.block_interpolation);
        assert_eq!(Some("365;00:00:00"), pdin.periodic_period());
    }

    #[test]
    fn test_pdin_not_periodic_with_empty_period() {
        let rec = first_record("CNTL id '1' ti tv PDIN 0 0 '' pdin cntl\n");
        let view = RecordView::new(&rec);
        assert_eq!(None, view.pdin().unwrap().periodic_period());
    }

    #[test]
    fn test_time_table() {
        let rec = first_record(
            "CNTL ti tv TBLE\n'1991/01/01;00:00:00' 0.5 <\n'1991/02/01;12:30:00' 1.5 <\ntble cntl\n",
        );
        let view = RecordView::new(&rec);
        let rows = time_table(view.first_table().unwrap());
        assert_eq!(2, rows.len());
        assert_eq!(0.5, rows[0].1);
        assert_eq!(
            parse_datetime("1991/02/01;12:30:00").unwrap(),
            rows[1].0
        );
    }
}
