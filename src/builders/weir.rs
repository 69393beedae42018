// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Weir-family builder: simple, river and universal weirs, orifices and
//! general structures all map onto [`Weir`] with a formula variant.

use std::collections::HashMap;

use crate::domain::{FlowDirection, Structure, TimeSeries, Weir, WeirFormula};
use crate::records::cross_section::{CrossSectionDefinition, CrossSectionKind};
use crate::records::structure_def::{StructureDefinition, StructurePayload};

pub fn build(
    definition: &StructureDefinition,
    cross_sections: &HashMap<String, CrossSectionDefinition>,
) -> Vec<Structure> {
    let weir = match &definition.payload {
        StructurePayload::Weir(def) => Weir {
            crest_level: def.crest_level,
            crest_width: def.crest_width,
            flow_direction: def.flow_direction,
            formula: WeirFormula::Simple {
                discharge_coefficient: def.discharge_coefficient,
                lateral_contraction: def.lateral_contraction,
            },
            ..base(definition)
        },
        StructurePayload::RiverWeir(def) => Weir {
            crest_level: def.crest_level,
            crest_width: def.crest_width,
            formula: WeirFormula::River {
                correction_coefficient: def.correction_coefficient,
                submergence_limit: def.submergence_limit,
            },
            ..base(definition)
        },
        StructurePayload::UniversalWeir(def) => {
            let profile = match shifted_profile(
                cross_sections.get(&def.cross_section_id),
                def.crest_level_shift,
            ) {
                Some(profile) => profile,
                None => return Vec::new(),
            };
            // the crest sits at the lowest shifted profile point
            let crest_level = profile
                .iter()
                .map(|p| p.1)
                .fold(f64::INFINITY, f64::min);
            Weir {
                crest_level,
                formula: WeirFormula::FreeForm {
                    profile,
                    discharge_coefficient: def.discharge_coefficient,
                },
                ..base(definition)
            }
        }
        StructurePayload::Orifice(def) => {
            // a flipped orifice passes half the nominal opening
            let gate_opening = if def.flow_direction_sign < 0 {
                def.gate_height * 0.5
            } else {
                def.gate_height
            };
            Weir {
                crest_level: def.crest_level,
                crest_width: def.crest_width,
                flow_direction: FlowDirection::from_sign(def.flow_direction_sign),
                formula: WeirFormula::Gated {
                    contraction_coefficient: def.contraction_coefficient
                        * def.lateral_contraction,
                    gate_opening,
                    lower_edge_level: def.crest_level + gate_opening,
                    max_flow_positive: None,
                    max_flow_negative: None,
                },
                ..base(definition)
            }
        }
        StructurePayload::GeneralStructure(def) => Weir {
            crest_level: def.bed_level_structure_centre,
            crest_width: def.width_structure_centre,
            formula: WeirFormula::GeneralStructure {
                width_structure_centre: def.width_structure_centre,
                bed_level_structure_centre: def.bed_level_structure_centre,
                gate_opening: def.gate_opening(),
                positive_free_gate_flow: def.positive_free_gate_flow,
                negative_free_gate_flow: def.negative_free_gate_flow,
                extra_resistance: def.extra_resistance,
            },
            ..base(definition)
        },
        _ => return Vec::new(),
    };
    vec![Structure::Weir(weir)]
}

fn base(definition: &StructureDefinition) -> Weir {
    Weir {
        name: definition.id.clone(),
        long_name: definition.name.clone(),
        crest_level: 0.0,
        crest_width: 0.0,
        use_crest_level_time_series: false,
        crest_level_time_series: TimeSeries::new(),
        flow_direction: FlowDirection::Both,
        formula: WeirFormula::Simple {
            discharge_coefficient: 1.0,
            lateral_contraction: 1.0,
        },
        offset_y: 0.0,
    }
}

fn shifted_profile(
    cross_section: Option<&CrossSectionDefinition>,
    shift: f64,
) -> Option<Vec<(f64, f64)>> {
    match &cross_section?.kind {
        CrossSectionKind::YzTable { points } => {
            Some(points.iter().map(|&(y, z)| (y, z + shift)).collect())
        }
        _ => None,
    }
}
