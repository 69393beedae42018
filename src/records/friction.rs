// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! `STFR` structure friction and `XRST` extra resistance records
//! (FRICTION.DAT).
//!
//! ```text
//! STFR id '1' ci '7' mf 4 mt cp 0 0.2 0 s1 6 s2 6 sf 4 st cp 0 0.1 0 stfr
//! ```
//!
//! `ci` joins on the *structure definition* id, not the location id.
//! The value block after `mt`/`st` is a value-type word (`cp` constant,
//! `fh` f(h) table, `fq` f(Q) table) followed by a flag and the value.
//! Extra resistance records are recognized but not importable.

use crate::common::Diagnostics;
use crate::tokenizer::{RawRecord, Token};

use super::RecordView;

pub const TAG: &str = "STFR";

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FrictionValueKind {
    #[default]
    Constant,
    FunctionOfH,
    FunctionOfQ,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructureFriction {
    pub id: String,
    pub structure_definition_id: String,
    /// `mf`: Chezy 0, Manning 1, Strickler kn 2, Strickler ks 3,
    /// White-Colebrook 4, Bos&Bijkerk 7.
    pub main_friction_type: i32,
    pub main_friction_kind: FrictionValueKind,
    pub main_friction_value: f64,
    pub ground_layer_friction_type: i32,
    pub ground_layer_friction_value: f64,
}

pub fn map_record(rec: &RawRecord, diag: &mut Diagnostics) -> Option<StructureFriction> {
    if rec.tag != TAG {
        return None;
    }
    let view = RecordView::new(rec);
    let id = match view.id() {
        Some(id) => id.to_owned(),
        None => {
            diag.warn("structure friction without id; skipped".to_owned());
            return None;
        }
    };

    let (main_kind, main_value) = value_block(rec, "mt");
    let (_, ground_value) = value_block(rec, "st");

    Some(StructureFriction {
        id,
        structure_definition_id: view.quoted_after("ci").unwrap_or_default().to_owned(),
        main_friction_type: view.i32_after("mf").unwrap_or(0),
        main_friction_kind: main_kind,
        main_friction_value: main_value,
        ground_layer_friction_type: view.i32_after("sf").unwrap_or(0),
        ground_layer_friction_value: ground_value,
    })
}

/// `<key> cp 0 <value> ...`: value-type word, flag, then the value.
fn value_block(rec: &RawRecord, key: &str) -> (FrictionValueKind, f64) {
    let start = rec
        .tokens
        .iter()
        .position(|t| matches!(t, Token::Word(w) if w == key));
    let start = match start {
        Some(i) => i + 1,
        None => return (FrictionValueKind::Constant, 0.0),
    };
    let kind = match rec.tokens.get(start).and_then(Token::as_str) {
        Some("fh") => FrictionValueKind::FunctionOfH,
        Some("fq") => FrictionValueKind::FunctionOfQ,
        _ => FrictionValueKind::Constant,
    };
    let value = rec
        .tokens
        .get(start + 2)
        .and_then(Token::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);
    (kind, value)
}

/// Reads all structure frictions; extra resistance records only produce
/// a skip warning, matching their unimplemented import.
pub fn read_all(text: &str, diag: &mut Diagnostics) -> Vec<StructureFriction> {
    let mut out = Vec::new();
    for rec in crate::tokenizer::scan_records(text, diag) {
        match rec.tag.as_str() {
            TAG => out.extend(map_record(&rec, diag)),
            "XRST" => {
                let view = RecordView::new(&rec);
                if let Some(id) = view.id() {
                    diag.warn(format!(
                        "the extra resistance functionality is not supported, skipping this item with id {id}"
                    ));
                }
            }
            _ => {}
        }
    }
    out
}
