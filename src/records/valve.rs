// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! `VLVE` valve loss records, referenced by culvert definitions.
//!
//! ```text
//! VLVE id 'vd1' nm 'inlet valve' lt lc TBLE
//! 0 5 <
//! 0.5 1.2 <
//! 1 0.4 <
//! tble vlve
//! ```
//!
//! The table maps the relative valve opening (0..1) onto a loss
//! coefficient.

use std::collections::HashMap;

use crate::common::Diagnostics;
use crate::tokenizer::RawRecord;

use super::RecordView;

pub const TAG: &str = "VLVE";

#[derive(Clone, Debug, PartialEq)]
pub struct ValveData {
    pub id: String,
    pub name: String,
    /// (relative opening, loss coefficient) rows, as read.
    pub loss: Vec<(f64, f64)>,
}

pub fn map_record(rec: &RawRecord, diag: &mut Diagnostics) -> Option<ValveData> {
    if rec.tag != TAG {
        return None;
    }
    let view = RecordView::new(rec);
    let id = match view.id() {
        Some(id) => id.to_owned(),
        None => {
            diag.warn("valve data record without id; skipped".to_owned());
            return None;
        }
    };
    let table = view.table_after_seq(&["lt", "lc"]).or_else(|| view.first_table());
    let loss = match table {
        Some(table) => super::lookup_table(table),
        None => Vec::new(),
    };
    if loss.is_empty() {
        diag.warn(format!("valve data {id} has no loss table; skipped"));
        return None;
    }
    Some(ValveData {
        id,
        name: view.name(),
        loss,
    })
}

/// Id-keyed map over all valve records in `text`, last record winning.
pub fn read_all(text: &str, diag: &mut Diagnostics) -> HashMap<String, ValveData> {
    let mut out: HashMap<String, ValveData> = HashMap::new();
    for rec in crate::tokenizer::scan_records(text, diag) {
        if let Some(valve) = map_record(&rec, diag) {
            if out.contains_key(&valve.id) {
                diag.warn(format!(
                    "duplicate valve data id = {}; overwriting with latest values",
                    valve.id
                ));
            }
            out.insert(valve.id.clone(), valve);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::scan_records;

    #[test]
    fn test_loss_table() {
        let text = "VLVE id 'vd1' nm 'v' lt lc TBLE\n0 5 <\n0.5 1.2 <\n1 0.4 <\ntble vlve\n";
        let mut diag = Diagnostics::new();
        let map = read_all(text, &mut diag);
        assert_eq!(vec![(0.0, 5.0), (0.5, 1.2), (1.0, 0.4)], map["vd1"].loss);
    }

    #[test]
    fn test_missing_table_warns() {
        let mut diag = Diagnostics::new();
        let map = read_all("VLVE id 'vd2' nm 'v' vlve\n", &mut diag);
        assert!(map.is_empty());
        assert_eq!(1, diag.len());
    }
}
