// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! `CRDS` cross-section definition records.
//!
//! ```text
//! CRDS id '21' nm 'TrapProf01' ty 1 bl 0 bw 6 bs 1 aw 16 sw 0 gl 0 gu 0 crds
//! ```
//!
//! Field keys: `ty` type code, `wm/w1/w2` main/floodplain widths,
//! `lt lw` height/total-width/flow-width table (tabulated), `bw/bs/aw`
//! trapezoid, `rd` diameter (closed circle), `ew` egg width, `lt yz`
//! y/z table.  Type codes 2 (open circle) and 3 (sedredge) are not
//! supported and are skipped without a diagnostic.

use std::collections::HashMap;

use crate::common::Diagnostics;
use crate::tokenizer::RawRecord;

use super::RecordView;

pub const TAG: &str = "CRDS";

#[derive(Clone, Debug, PartialEq)]
pub struct CrossSectionDefinition {
    pub id: String,
    pub name: String,
    pub kind: CrossSectionKind,
    pub main_width: f64,
    pub sediment_width: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CrossSectionKind {
    /// Rows of (height, total width, flow width), lowest first.
    Tabulated { rows: Vec<TabulatedRow> },
    Trapezoidal {
        bottom_width: f64,
        slope: f64,
        max_flow_width: f64,
    },
    ClosedCircle { diameter: f64 },
    EggShaped { width: f64 },
    /// Open y/z profile, y increasing.
    YzTable { points: Vec<(f64, f64)> },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TabulatedRow {
    pub height: f64,
    pub total_width: f64,
    pub flow_width: f64,
}

impl CrossSectionDefinition {
    /// Lowest profile elevation, used as the reference bed level.
    pub fn lowest_level(&self) -> f64 {
        match &self.kind {
            CrossSectionKind::Tabulated { rows } => rows
                .iter()
                .map(|r| r.height)
                .fold(f64::INFINITY, f64::min),
            CrossSectionKind::YzTable { points } => points
                .iter()
                .map(|p| p.1)
                .fold(f64::INFINITY, f64::min),
            _ => 0.0,
        }
    }
}

pub fn map_record(rec: &RawRecord, diag: &mut Diagnostics) -> Option<CrossSectionDefinition> {
    if rec.tag != TAG {
        return None;
    }
    let view = RecordView::new(rec);
    let id = match view.id() {
        Some(id) => id.to_owned(),
        None => {
            diag.warn("cross-section definition without id; skipped".to_owned());
            return None;
        }
    };
    let ty = view.i32_after("ty").unwrap_or(-1);

    let kind = match ty {
        0 => CrossSectionKind::Tabulated {
            rows: tabulated_rows(&view)?,
        },
        1 => CrossSectionKind::Trapezoidal {
            bottom_width: view.f64_after("bw").unwrap_or(0.0),
            slope: view.f64_after("bs").unwrap_or(0.0),
            max_flow_width: view.f64_after("aw").unwrap_or(0.0),
        },
        4 => CrossSectionKind::ClosedCircle {
            diameter: view.f64_after("rd").unwrap_or(0.0),
        },
        6 => CrossSectionKind::EggShaped {
            width: view.f64_after("ew").unwrap_or(0.0),
        },
        10 | 11 => CrossSectionKind::YzTable {
            points: yz_points(&view)?,
        },
        // open circle / sedredge / unknown: intentionally unimplemented
        _ => return None,
    };

    Some(CrossSectionDefinition {
        id,
        name: view.name(),
        kind,
        main_width: view.f64_after("wm").unwrap_or(0.0),
        sediment_width: view.f64_after("sw").unwrap_or(0.0),
    })
}

fn tabulated_rows(view: &RecordView) -> Option<Vec<TabulatedRow>> {
    let table = view.table_after_seq(&["lt", "lw"]).or_else(|| view.first_table())?;
    let rows = table
        .rows
        .iter()
        .filter_map(|row| {
            Some(TabulatedRow {
                height: row.first()?.parse().ok()?,
                total_width: row.get(1)?.parse().ok()?,
                flow_width: row.get(2)?.parse().ok()?,
            })
        })
        .collect::<Vec<_>>();
    if rows.is_empty() {
        None
    } else {
        Some(rows)
    }
}

fn yz_points(view: &RecordView) -> Option<Vec<(f64, f64)>> {
    let table = view.table_after_seq(&["lt", "yz"]).or_else(|| view.first_table())?;
    let points = super::lookup_table(table);
    if points.is_empty() {
        None
    } else {
        Some(points)
    }
}

/// Reads every cross-section definition in `text` into an id-keyed map,
/// last definition winning on duplicate ids.
pub fn read_all(text: &str, diag: &mut Diagnostics) -> HashMap<String, CrossSectionDefinition> {
    let mut out: HashMap<String, CrossSectionDefinition> = HashMap::new();
    for rec in crate::tokenizer::scan_records(text, diag) {
        if let Some(def) = map_record(&rec, diag) {
            if out.contains_key(&def.id) {
                diag.warn(format!(
                    "duplicate cross-section definition id = {}; overwriting with latest values",
                    def.id
                ));
            }
            out.insert(def.id.clone(), def);
        }
    }
    out
}
