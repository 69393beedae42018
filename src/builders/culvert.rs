// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Culvert builder.
//!
//! The referenced cross section decides the barrel shape: a closed
//! circle gives a round culvert, an egg-shaped section an egg culvert
//! (height is 1.5 times the width), and a tabulated section a
//! rectangular culvert when every row has the same width, otherwise a
//! tabulated one.  Open profiles cannot form a barrel and build nothing.

use std::collections::HashMap;

use float_cmp::approx_eq;

use crate::domain::{Culvert, CulvertGeometryKind, LookupFunction, Structure};
use crate::records::cross_section::{CrossSectionDefinition, CrossSectionKind, TabulatedRow};
use crate::records::structure_def::{StructureDefinition, StructurePayload};
use crate::records::valve::ValveData;

pub fn build(
    definition: &StructureDefinition,
    cross_sections: &HashMap<String, CrossSectionDefinition>,
    valves: &HashMap<String, ValveData>,
) -> Vec<Structure> {
    let def = match &definition.payload {
        StructurePayload::Culvert(def) => def,
        _ => return Vec::new(),
    };

    let (geometry, width, height, diameter) =
        match barrel(cross_sections.get(&def.cross_section_id)) {
            Some(barrel) => barrel,
            None => return Vec::new(),
        };

    let valve_loss = def
        .valve_data_id
        .as_ref()
        .and_then(|id| valves.get(id))
        .map(|valve| valve.loss.iter().copied().collect())
        .unwrap_or_else(LookupFunction::new);

    let culvert = Culvert {
        name: definition.id.clone(),
        long_name: definition.name.clone(),
        geometry,
        width,
        height,
        diameter,
        inlet_level: def.bed_level_left,
        outlet_level: def.bed_level_right,
        length: def.length,
        inlet_loss: def.inlet_loss,
        outlet_loss: def.outlet_loss,
        bend_loss: def.bend_loss,
        has_valve: def.has_valve,
        valve_opening: def.initial_valve_opening,
        valve_loss,
        friction_type: 0,
        friction: 0.0,
    };
    vec![Structure::Culvert(culvert)]
}

/// (kind, width, height, diameter) of the barrel, or `None` when the
/// cross section is missing or open.
fn barrel(
    cross_section: Option<&CrossSectionDefinition>,
) -> Option<(CulvertGeometryKind, f64, f64, f64)> {
    match &cross_section?.kind {
        CrossSectionKind::ClosedCircle { diameter } => {
            Some((CulvertGeometryKind::Round, *diameter, *diameter, *diameter))
        }
        CrossSectionKind::EggShaped { width } => {
            Some((CulvertGeometryKind::Egg, *width, width * 1.5, 0.0))
        }
        CrossSectionKind::Tabulated { rows } if rows.len() >= 2 => {
            let width = rows
                .iter()
                .map(|r| r.total_width)
                .fold(0.0_f64, f64::max);
            let height = rows[rows.len() - 1].height - rows[0].height;
            let kind = if constant_width(rows) {
                CulvertGeometryKind::Rectangle
            } else {
                CulvertGeometryKind::Tabulated
            };
            Some((kind, width, height, 0.0))
        }
        _ => None,
    }
}

fn constant_width(rows: &[TabulatedRow]) -> bool {
    rows.iter()
        .all(|r| approx_eq!(f64, r.total_width, rows[0].total_width, epsilon = 1e-9))
}
