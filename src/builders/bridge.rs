// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Bridge builder.
//!
//! The opening profile comes from the referenced tabulated cross
//! section.  Writers append a fake final row (zero or repeated width)
//! to mark a plain rectangular opening; those, and soil-bed bridges,
//! classify as `Rectangle` with height and width taken from the first
//! two rows.  Everything else keeps the full profile, mirrored around
//! the centerline: width W at level z yields points (-W/2, z) and
//! (W/2, z).

use std::collections::HashMap;

use float_cmp::approx_eq;

use crate::domain::{Bridge, BridgeGeometryKind, BridgeType, Structure};
use crate::records::cross_section::{CrossSectionDefinition, CrossSectionKind, TabulatedRow};
use crate::records::structure_def::{StructureDefinition, StructurePayload};

pub fn build(
    definition: &StructureDefinition,
    cross_sections: &HashMap<String, CrossSectionDefinition>,
) -> Vec<Structure> {
    let def = match &definition.payload {
        StructurePayload::Bridge(def) => def,
        _ => return Vec::new(),
    };

    let rows = match tabulated_rows(cross_sections.get(&def.cross_section_id)) {
        Some(rows) if rows.len() >= 2 => rows,
        _ => return Vec::new(),
    };

    let shift = def.bed_level.unwrap_or(0.0);
    let kind = classify(def.bridge_type, &rows);

    let (width, height, profile) = match kind {
        BridgeGeometryKind::Rectangle => {
            let width = rows[0].total_width;
            let height = rows[1].height - rows[0].height;
            (width, height, rectangle_profile(width, height, shift))
        }
        BridgeGeometryKind::Tabulated => {
            let width = rows
                .iter()
                .map(|r| r.total_width)
                .fold(0.0_f64, f64::max);
            let height = rows[rows.len() - 1].height - rows[0].height;
            (width, height, mirrored_profile(&rows, shift))
        }
    };

    let bridge = Bridge {
        name: definition.id.clone(),
        long_name: definition.name.clone(),
        kind,
        width,
        height,
        shift,
        length: def.length,
        inlet_loss: def.inlet_loss,
        outlet_loss: def.outlet_loss,
        is_pillar: def.bridge_type == BridgeType::Pillar,
        pillar_width: def.total_pillar_width,
        shape_factor: def.form_factor,
        flood_profile: flood_profile(&rows, shift),
        profile,
        friction_type: 0,
        friction: 0.0,
        ground_layer_enabled: false,
        ground_layer_roughness: 0.0,
    };
    vec![Structure::Bridge(bridge)]
}

fn tabulated_rows(cross_section: Option<&CrossSectionDefinition>) -> Option<Vec<TabulatedRow>> {
    match &cross_section?.kind {
        CrossSectionKind::Tabulated { rows } => Some(rows.clone()),
        _ => None,
    }
}

fn classify(bridge_type: BridgeType, rows: &[TabulatedRow]) -> BridgeGeometryKind {
    if bridge_type == BridgeType::SoilBed {
        return BridgeGeometryKind::Rectangle;
    }
    let n = rows.len();
    let last = rows[n - 1].total_width;
    let fake_last_row = approx_eq!(f64, last, 0.0, epsilon = 1e-9)
        || approx_eq!(f64, last, rows[n - 2].total_width, epsilon = 1e-9);
    let equal_first_widths = approx_eq!(
        f64,
        rows[0].total_width,
        rows[1].total_width,
        epsilon = 1e-9
    );
    if fake_last_row || equal_first_widths {
        BridgeGeometryKind::Rectangle
    } else {
        BridgeGeometryKind::Tabulated
    }
}

fn rectangle_profile(width: f64, height: f64, shift: f64) -> Vec<(f64, f64)> {
    let half = width / 2.0;
    vec![
        (-half, shift + height),
        (-half, shift),
        (half, shift),
        (half, shift + height),
    ]
}

/// Left edge top-to-bottom, then right edge bottom-to-top.
fn mirrored_profile(rows: &[TabulatedRow], shift: f64) -> Vec<(f64, f64)> {
    let mut profile = Vec::with_capacity(rows.len() * 2);
    for row in rows.iter().rev() {
        profile.push((-row.total_width / 2.0, row.height + shift));
    }
    for row in rows {
        profile.push((row.total_width / 2.0, row.height + shift));
    }
    profile
}

/// Four-point polygon: the two bottom corners at the lowest level, the
/// two top corners at the highest.
fn flood_profile(rows: &[TabulatedRow], shift: f64) -> Vec<(f64, f64)> {
    let bottom = &rows[0];
    let top = &rows[rows.len() - 1];
    vec![
        (-bottom.total_width / 2.0, bottom.height + shift),
        (bottom.total_width / 2.0, bottom.height + shift),
        (top.total_width / 2.0, top.height + shift),
        (-top.total_width / 2.0, top.height + shift),
    ]
}
