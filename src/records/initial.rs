// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! `GLIN`/`FLBR` initial condition records (INITIAL.DAT).
//!
//! One `GLIN` record declares the global quantity (`ty` 0 water level,
//! 1 water depth) and its default value; `FLBR` records override it per
//! branch, either with a constant (`lv`) or a chainage table.  A branch
//! record whose quantity differs from the global one is excluded later,
//! during resolution.

use crate::common::Diagnostics;
use crate::tokenizer::RawRecord;

use super::RecordView;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InitialQuantity {
    #[default]
    WaterLevel,
    WaterDepth,
}

impl InitialQuantity {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => InitialQuantity::WaterDepth,
            _ => InitialQuantity::WaterLevel,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InitialValue {
    Constant(f64),
    /// `(chainage, value)` rows along the branch.
    Table(Vec<(f64, f64)>),
}

/// Network-wide defaults from the `GLIN` record.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalInitial {
    pub quantity: InitialQuantity,
    pub level: f64,
    /// `q_`: initial discharge.
    pub discharge: f64,
}

impl Default for GlobalInitial {
    fn default() -> Self {
        GlobalInitial {
            quantity: InitialQuantity::WaterLevel,
            level: 0.0,
            discharge: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BranchInitial {
    pub id: String,
    pub branch_id: String,
    pub quantity: InitialQuantity,
    pub value: InitialValue,
}

fn map_global(rec: &RawRecord) -> GlobalInitial {
    let view = RecordView::new(rec);
    GlobalInitial {
        quantity: InitialQuantity::from_code(view.i32_after("ty").unwrap_or(0)),
        level: view.f64_after("lv").unwrap_or(0.0),
        discharge: view.f64_after("q_").unwrap_or(0.0),
    }
}

fn map_branch(rec: &RawRecord, diag: &mut Diagnostics) -> Option<BranchInitial> {
    let view = RecordView::new(rec);
    let id = match view.id() {
        Some(id) => id.to_owned(),
        None => {
            diag.warn("branch initial condition without id; skipped".to_owned());
            return None;
        }
    };
    let value = match view.first_table() {
        Some(table) => InitialValue::Table(super::lookup_table(table)),
        None => InitialValue::Constant(view.f64_after("lv").unwrap_or(0.0)),
    };
    Some(BranchInitial {
        id,
        branch_id: view.quoted_after("ci").unwrap_or_default().to_owned(),
        quantity: InitialQuantity::from_code(view.i32_after("ty").unwrap_or(0)),
        value,
    })
}

/// Reads the global record (last one wins) and all branch overrides.
pub fn read_all(text: &str, diag: &mut Diagnostics) -> (GlobalInitial, Vec<BranchInitial>) {
    let mut global = GlobalInitial::default();
    let mut branches = Vec::new();
    for rec in crate::tokenizer::scan_records(text, diag) {
        match rec.tag.as_str() {
            "GLIN" => global = map_global(&rec),
            "FLBR" => branches.extend(map_branch(&rec, diag)),
            _ => {}
        }
    }
    (global, branches)
}
