// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! `STDS` structure definition records (STRUCT.DEF).
//!
//! ```text
//! STDS id '7' nm 'weir' ty 6 cl 10 cw 5 ce 1 sc 1 rt 0 stds
//! ```
//!
//! The `ty` code selects the payload layout:
//!
//! | ty | payload |
//! |----|---------|
//! | 0  | river weir |
//! | 1  | universal (free-form) weir |
//! | 2  | general structure |
//! | 6  | simple weir |
//! | 7  | orifice (gated) |
//! | 9  | pump |
//! | 10 | culvert / siphon |
//! | 12 | bridge |
//!
//! Unknown type codes are skipped with a warning naming the id.

use std::collections::HashMap;

use crate::common::Diagnostics;
use crate::tokenizer::RawRecord;

use super::RecordView;

pub const TAG: &str = "STDS";

#[derive(Clone, Debug, PartialEq)]
pub struct StructureDefinition {
    pub id: String,
    pub name: String,
    pub payload: StructurePayload,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StructurePayload {
    RiverWeir(RiverWeirDef),
    UniversalWeir(UniversalWeirDef),
    GeneralStructure(GeneralStructureDef),
    Weir(WeirDef),
    Orifice(OrificeDef),
    Pump(PumpDef),
    Culvert(CulvertDef),
    Bridge(BridgeDef),
}

/// Flow direction codes shared by the weir-family payloads.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FlowDirection {
    #[default]
    Both,
    Positive,
    Negative,
}

impl FlowDirection {
    /// `1` positive, `-1` negative, anything else both.
    pub fn from_sign(sign: i32) -> Self {
        match sign {
            1 => FlowDirection::Positive,
            -1 => FlowDirection::Negative,
            _ => FlowDirection::Both,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RiverWeirDef {
    pub crest_level: f64,
    pub crest_width: f64,
    /// `ce`: correction coefficient for the positive flow direction.
    pub correction_coefficient: f64,
    /// `sv`: submergence limit for the positive flow direction.
    pub submergence_limit: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UniversalWeirDef {
    /// `si`: referenced cross-section definition id.
    pub cross_section_id: String,
    pub discharge_coefficient: f64,
    /// `cs`: applied to every profile z before taking the crest.
    pub crest_level_shift: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeneralStructureDef {
    pub width_structure_centre: f64,
    pub bed_level_structure_centre: f64,
    pub gate_height: f64,
    pub positive_free_gate_flow: f64,
    pub negative_free_gate_flow: f64,
    /// The 2.1x layout carries the extra-resistance field; the RE layout
    /// does not, and there the gate height is already an opening.
    pub newer_format: bool,
    pub extra_resistance: Option<f64>,
}

impl GeneralStructureDef {
    /// Opening under the gate: the newer layout stores the gate's top
    /// level, the older one the opening itself.
    pub fn gate_opening(&self) -> f64 {
        if self.newer_format {
            self.gate_height - self.bed_level_structure_centre
        } else {
            self.gate_height
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeirDef {
    pub crest_level: f64,
    pub crest_width: f64,
    pub discharge_coefficient: f64,
    pub lateral_contraction: f64,
    pub flow_direction: FlowDirection,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrificeDef {
    pub crest_level: f64,
    pub crest_width: f64,
    pub gate_height: f64,
    pub contraction_coefficient: f64,
    pub lateral_contraction: f64,
    /// Raw `rt` sign; the builder needs the sign itself, not just the
    /// mapped direction, for the opening correction.
    pub flow_direction_sign: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PumpDef {
    /// `dn`: pumping direction code.
    pub direction: i32,
    /// `ct lt` rows: capacity, suction start/stop, delivery start/stop.
    pub capacity_stages: Vec<PumpStage>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PumpStage {
    pub capacity: f64,
    pub suction_start: f64,
    pub suction_stop: f64,
    pub delivery_start: f64,
    pub delivery_stop: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CulvertDef {
    pub cross_section_id: String,
    pub bed_level_left: f64,
    pub bed_level_right: f64,
    pub length: f64,
    pub inlet_loss: f64,
    pub outlet_loss: f64,
    pub bend_loss: f64,
    pub has_valve: bool,
    pub initial_valve_opening: f64,
    /// `tv`: referenced valve loss record id.
    pub valve_data_id: Option<String>,
}

/// `tb` codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BridgeType {
    FixedBed,
    SoilBed,
    Pillar,
    Abutment,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BridgeDef {
    pub bridge_type: BridgeType,
    pub cross_section_id: String,
    pub bed_level: Option<f64>,
    pub length: f64,
    pub inlet_loss: f64,
    pub outlet_loss: f64,
    pub total_pillar_width: f64,
    pub form_factor: f64,
}

pub fn map_record(rec: &RawRecord, diag: &mut Diagnostics) -> Option<StructureDefinition> {
    if rec.tag != TAG {
        return None;
    }
    let view = RecordView::new(rec);
    let id = match view.id() {
        Some(id) => id.to_owned(),
        None => {
            diag.warn("structure definition without id; skipped".to_owned());
            return None;
        }
    };
    let ty = view.i32_after("ty").unwrap_or(-1);

    let payload = match ty {
        0 => StructurePayload::RiverWeir(RiverWeirDef {
            crest_level: view.f64_after("cl").unwrap_or(0.0),
            crest_width: view.f64_after("cw").unwrap_or(0.0),
            correction_coefficient: view.f64_after("ce").unwrap_or(1.0),
            submergence_limit: view.f64_after("sv").unwrap_or(0.0),
        }),
        1 => StructurePayload::UniversalWeir(UniversalWeirDef {
            cross_section_id: view.quoted_after("si").unwrap_or_default().to_owned(),
            discharge_coefficient: view.f64_after("ce").unwrap_or(1.0),
            crest_level_shift: view.f64_after("cs").unwrap_or(0.0),
        }),
        2 => {
            let extra_resistance = view.opt_f64_after("er").flatten();
            StructurePayload::GeneralStructure(GeneralStructureDef {
                width_structure_centre: view.f64_after("ws").unwrap_or(0.0),
                bed_level_structure_centre: view.f64_after("zs").unwrap_or(0.0),
                gate_height: view.f64_after("gh").unwrap_or(0.0),
                positive_free_gate_flow: view.f64_after("pg").unwrap_or(1.0),
                negative_free_gate_flow: view.f64_after("ng").unwrap_or(1.0),
                newer_format: view.str_after("er").is_some(),
                extra_resistance,
            })
        }
        6 => StructurePayload::Weir(WeirDef {
            crest_level: view.f64_after("cl").unwrap_or(0.0),
            crest_width: view.f64_after("cw").unwrap_or(0.0),
            discharge_coefficient: view.f64_after("ce").unwrap_or(1.0),
            lateral_contraction: view.f64_after("sc").unwrap_or(1.0),
            flow_direction: FlowDirection::from_sign(view.i32_after("rt").unwrap_or(0)),
        }),
        7 => StructurePayload::Orifice(OrificeDef {
            crest_level: view.f64_after("cl").unwrap_or(0.0),
            crest_width: view.f64_after("cw").unwrap_or(0.0),
            gate_height: view.f64_after("gh").unwrap_or(0.0),
            contraction_coefficient: view.f64_after("mu").unwrap_or(1.0),
            lateral_contraction: view.f64_after("sc").unwrap_or(1.0),
            flow_direction_sign: view.i32_after("rt").unwrap_or(0),
        }),
        9 => StructurePayload::Pump(PumpDef {
            direction: view.i32_after("dn").unwrap_or(1),
            capacity_stages: pump_stages(&view),
        }),
        10 => StructurePayload::Culvert(CulvertDef {
            cross_section_id: view.quoted_after("si").unwrap_or_default().to_owned(),
            bed_level_left: view.f64_after("ll").unwrap_or(0.0),
            bed_level_right: view.f64_after("rl").unwrap_or(0.0),
            length: view.f64_after("dl").unwrap_or(0.0),
            inlet_loss: view.f64_after("li").unwrap_or(0.0),
            outlet_loss: view.f64_after("lo").unwrap_or(0.0),
            bend_loss: view.f64_after("lb").unwrap_or(0.0),
            has_valve: view.bool01_after("av").unwrap_or(false),
            initial_valve_opening: view.f64_after("ih").unwrap_or(0.0),
            valve_data_id: view.quoted_after("tv").map(str::to_owned),
        }),
        12 => StructurePayload::Bridge(BridgeDef {
            bridge_type: match view.i32_after("tb").unwrap_or(1) {
                2 => BridgeType::SoilBed,
                3 => BridgeType::Pillar,
                4 => BridgeType::Abutment,
                _ => BridgeType::FixedBed,
            },
            cross_section_id: view.quoted_after("si").unwrap_or_default().to_owned(),
            bed_level: view.opt_f64_after("bl").flatten(),
            length: view.f64_after("dl").unwrap_or(0.0),
            inlet_loss: view.f64_after("li").unwrap_or(0.0),
            outlet_loss: view.f64_after("lo").unwrap_or(0.0),
            total_pillar_width: view.f64_after("pw").unwrap_or(0.0),
            form_factor: view.f64_after("vf").unwrap_or(0.0),
        }),
        other => {
            diag.warn(format!(
                "structure definition {id} has unsupported type code {other}; skipped"
            ));
            return None;
        }
    };

    Some(StructureDefinition {
        id,
        name: view.name(),
        payload,
    })
}

fn pump_stages(view: &RecordView) -> Vec<PumpStage> {
    let table = match view.table_after_seq(&["ct", "lt"]).or_else(|| view.first_table()) {
        Some(t) => t,
        None => return Vec::new(),
    };
    table
        .rows
        .iter()
        .filter_map(|row| {
            Some(PumpStage {
                capacity: row.first()?.parse().ok()?,
                suction_start: row.get(1)?.parse().ok()?,
                suction_stop: row.get(2)?.parse().ok()?,
                delivery_start: row.get(3)?.parse().ok()?,
                delivery_stop: row.get(4)?.parse().ok()?,
            })
        })
        .collect()
}

/// Id-keyed map over all definitions in `text`, last definition winning.
pub fn read_all(text: &str, diag: &mut Diagnostics) -> HashMap<String, StructureDefinition> {
    let mut out: HashMap<String, StructureDefinition> = HashMap::new();
    for rec in crate::tokenizer::scan_records(text, diag) {
        if let Some(def) = map_record(&rec, diag) {
            if out.contains_key(&def.id) {
                diag.warn(format!(
                    "duplicate structure definition id = {}; overwriting with latest values",
                    def.id
                ));
            }
            out.insert(def.id.clone(), def);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::scan_records;

    fn map_first(text: &str) -> Option<StructureDefinition> {
        let mut diag = Diagnostics::new();
        let recs = scan_records(text, &mut diag);
        map_record(&recs[0], &mut diag)
    }

    #[test]
    fn test_simple_weir() {
        let def = map_first("STDS id '7' nm 'weir' ty 6 cl 10 cw 5 ce 1 sc 0.9 rt 1 stds\n").unwrap();
        match def.payload {
            StructurePayload::Weir(w) => {
                assert_eq!(10.0, w.crest_level);
                assert_eq!(5.0, w.crest_width);
                assert_eq!(0.9, w.lateral_contraction);
                assert_eq!(FlowDirection::Positive, w.flow_direction);
            }
            other => panic!("expected weir, got {other:?}"),
        }
    }

    #[test]
    fn test_orifice_keeps_raw_sign() {
        let def =
            map_first("STDS id '8' nm 'gate' ty 7 cl 2 cw 3 gh 1.5 mu 0.8 sc 0.5 rt -1 stds\n")
                .unwrap();
        match def.payload {
            StructurePayload::Orifice(o) => {
                assert_eq!(-1, o.flow_direction_sign);
                assert_eq!(FlowDirection::Negative, FlowDirection::from_sign(o.flow_direction_sign));
                assert_eq!(1.5, o.gate_height);
            }
            other => panic!("expected orifice, got {other:?}"),
        }
    }

    #[test]
    fn test_pump_stage_table() {
        let text = "STDS id '9' nm 'pmp' ty 9 dn 1 ct lt TBLE\n0.5 1 0.5 1.2 0.8 <\n1.25 1.5 1 1.6 1.2 <\ntble stds\n";
        let def = map_first(text).unwrap();
        match def.payload {
            StructurePayload::Pump(p) => {
                assert_eq!(2, p.capacity_stages.len());
                assert_eq!(0.5, p.capacity_stages[0].capacity);
                assert_eq!(1.25, p.capacity_stages[1].capacity);
                assert_eq!(1.6, p.capacity_stages[1].delivery_start);
            }
            other => panic!("expected pump, got {other:?}"),
        }
    }

    #[test]
    fn test_general_structure_gate_opening_formats() {
        let newer = GeneralStructureDef {
            width_structure_centre: 5.0,
            bed_level_structure_centre: 4.0,
            gate_height: 10.0,
            positive_free_gate_flow: 1.0,
            negative_free_gate_flow: 1.0,
            newer_format: true,
            extra_resistance: None,
        };
        assert_eq!(6.0, newer.gate_opening());
        let older = GeneralStructureDef {
            newer_format: false,
            ..newer
        };
        assert_eq!(10.0, older.gate_opening());
    }

    #[test]
    fn test_culvert_valve_flag() {
        let text = "STDS id '4' nm 'clv' ty 10 si '11' ll 0.1 rl 0.2 dl 25 li 0.7 lo 1 lb 0 av 1 ih 0.6 stds\n";
        let def = map_first(text).unwrap();
        match def.payload {
            StructurePayload::Culvert(c) => {
                assert!(c.has_valve);
                assert_eq!(0.6, c.initial_valve_opening);
                assert_eq!("11", c.cross_section_id);
                assert_eq!(25.0, c.length);
            }
            other => panic!("expected culvert, got {other:?}"),
        }
    }

    #[test]
    fn test_bridge_pillar_fields() {
        let text = "STDS id '5' nm 'brg' ty 12 tb 3 si '12' bl 0.5 pw 3.5 vf 1.1 dl 10 li 0.2 lo 0.3 stds\n";
        let def = map_first(text).unwrap();
        match def.payload {
            StructurePayload::Bridge(b) => {
                assert_eq!(BridgeType::Pillar, b.bridge_type);
                assert_eq!(3.5, b.total_pillar_width);
                assert_eq!(1.1, b.form_factor);
                assert_eq!(Some(0.5), b.bed_level);
            }
            other => panic!("expected bridge, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_warns() {
        let mut diag = Diagnostics::new();
        let recs = scan_records("STDS id '3' nm 'x' ty 42 stds\n", &mut diag);
        assert!(map_record(&recs[0], &mut diag).is_none());
        assert_eq!(1, diag.len());
    }
}
