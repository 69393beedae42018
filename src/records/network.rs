// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Network topology and structure placement records.
//!
//! Four files share the `STRU`/`STCM`/`BRCH`/`NODE` tags:
//!
//! - `NETWORK.TP` — `NODE` coordinates and `BRCH` topology (begin/end
//!   node, declared length),
//! - `NETWORK.CP` — `BRCH` curve-point tables refining branch geometry,
//! - `NETWORK.ST` — `STRU` structure locations (branch id + chainage),
//! - `STRUCT.DAT` — `STRU` structure mappings (definition id + up to
//!   four controller slots) and `STRUCT.CMP` `STCM` compounds.
//!
//! Controller ids are namespaced with `CTR_` on read so they line up
//! with the controller definitions, which get the same prefix.

use crate::common::Diagnostics;
use crate::tokenizer::{RawRecord, Token};

use super::RecordView;

/// Prefix applied to controller ids everywhere they are read.
pub const CONTROLLER_ID_PREFIX: &str = "CTR_";

#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BranchRecord {
    pub id: String,
    pub name: String,
    pub begin_node: String,
    pub end_node: String,
    /// `al`: declared length, which the realized geometry must match
    /// within tolerance.
    pub length: f64,
}

/// Curve points for one branch, from the curve-point file.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchGeometryRecord {
    pub branch_id: String,
    /// Channel files store `(chainage, angle°)` pairs, sewer files
    /// absolute `(x, y)` pairs; the geometry pass decides which.
    pub curve_points: Vec<(f64, f64)>,
}

/// `STRU` in the network structures file: spatial placement only.
#[derive(Clone, Debug, PartialEq)]
pub struct StructureLocation {
    pub id: String,
    pub name: String,
    /// `"-1"` marks a sub-structure that only exists inside a compound.
    pub branch_id: String,
    pub chainage: f64,
}

/// `STRU` in the structure data file: definition + controller bindings.
#[derive(Clone, Debug, PartialEq)]
pub struct StructureMapping {
    pub structure_id: String,
    pub name: String,
    pub definition_id: String,
    /// Active controller ids in slot order, already `CTR_`-prefixed.
    pub controller_ids: Vec<String>,
}

/// `STCM`: a compound grouping of structure ids placed at one location.
#[derive(Clone, Debug, PartialEq)]
pub struct CompoundStructure {
    pub id: String,
    pub name: String,
    pub structure_ids: Vec<String>,
}

pub fn read_nodes(text: &str, diag: &mut Diagnostics) -> Vec<NodeRecord> {
    crate::tokenizer::scan_records(text, diag)
        .iter()
        .filter(|rec| rec.tag == "NODE")
        .filter_map(|rec| {
            let view = RecordView::new(rec);
            Some(NodeRecord {
                id: view.id()?.to_owned(),
                name: view.name(),
                x: view.f64_after("px")?,
                y: view.f64_after("py")?,
            })
        })
        .collect()
}

pub fn read_branches(text: &str, diag: &mut Diagnostics) -> Vec<BranchRecord> {
    crate::tokenizer::scan_records(text, diag)
        .iter()
        .filter(|rec| rec.tag == "BRCH")
        .filter_map(|rec| {
            let view = RecordView::new(rec);
            Some(BranchRecord {
                id: view.id()?.to_owned(),
                name: view.name(),
                begin_node: view.quoted_after("bn")?.to_owned(),
                end_node: view.quoted_after("en")?.to_owned(),
                length: view.f64_after("al").unwrap_or(0.0),
            })
        })
        .collect()
}

pub fn read_branch_geometry(text: &str, diag: &mut Diagnostics) -> Vec<BranchGeometryRecord> {
    crate::tokenizer::scan_records(text, diag)
        .iter()
        .filter(|rec| rec.tag == "BRCH")
        .filter_map(|rec| {
            let view = RecordView::new(rec);
            Some(BranchGeometryRecord {
                branch_id: view.id()?.to_owned(),
                curve_points: view
                    .first_table()
                    .map(super::lookup_table)
                    .unwrap_or_default(),
            })
        })
        .collect()
}

pub fn read_locations(text: &str, diag: &mut Diagnostics) -> Vec<StructureLocation> {
    crate::tokenizer::scan_records(text, diag)
        .iter()
        .filter(|rec| rec.tag == "STRU")
        .filter_map(|rec| {
            let view = RecordView::new(rec);
            Some(StructureLocation {
                id: view.id()?.to_owned(),
                name: view.name(),
                branch_id: view.quoted_after("ci").unwrap_or("-1").to_owned(),
                chainage: view.f64_after("lc").unwrap_or(0.0),
            })
        })
        .collect()
}

pub fn read_mappings(text: &str, diag: &mut Diagnostics) -> Vec<StructureMapping> {
    crate::tokenizer::scan_records(text, diag)
        .iter()
        .filter(|rec| rec.tag == "STRU")
        .filter_map(|rec| map_mapping(rec))
        .collect()
}

fn map_mapping(rec: &RawRecord) -> Option<StructureMapping> {
    let view = RecordView::new(rec);
    let structure_id = view.id()?.to_owned();
    let definition_id = view.quoted_after("dd")?.to_owned();

    // Four fixed controller slots: `ca` active flags, `cj` ids.  A slot
    // contributes only when its flag is nonzero and its id is not "-1".
    let active = view.words_after("ca", 4).unwrap_or_default();
    let ids = view.quoted_seq_after("cj", 4).unwrap_or_default();
    let controller_ids = active
        .iter()
        .zip(ids.iter())
        .filter(|(flag, id)| **flag != "0" && **id != "-1")
        .map(|(_, id)| format!("{CONTROLLER_ID_PREFIX}{id}"))
        .collect();

    Some(StructureMapping {
        structure_id,
        name: view.name(),
        definition_id,
        controller_ids,
    })
}

pub fn read_compounds(text: &str, diag: &mut Diagnostics) -> Vec<CompoundStructure> {
    crate::tokenizer::scan_records(text, diag)
        .iter()
        .filter(|rec| rec.tag == "STCM")
        .filter_map(|rec| {
            let view = RecordView::new(rec);
            Some(CompoundStructure {
                id: view.id()?.to_owned(),
                name: view.name(),
                structure_ids: quoted_run(rec, "dm"),
            })
        })
        .collect()
}

/// All consecutive quoted tokens following `key`, stopping at the first
/// non-quoted token.  The compound member list has no declared count.
fn quoted_run(rec: &RawRecord, key: &str) -> Vec<String> {
    let start = rec
        .tokens
        .iter()
        .position(|t| matches!(t, Token::Word(w) if w == key))
        .map(|i| i + 1);
    let mut out = Vec::new();
    if let Some(start) = start {
        for tok in &rec.tokens[start..] {
            match tok {
                Token::Quoted(s) => out.push(s.clone()),
                _ => break,
            }
        }
    }
    out
}
