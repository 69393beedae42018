// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Structures INI round-trip for the newer engine's format.
//!
//! One `[Structure]` chapter per structure, `key = value` lines, keys
//! from the newer engine's structure schema.  Weirs, orifices, general
//! structures and pumps survive a write/read round trip field for
//! field; unknown keys are ignored on read, and a chapter with an
//! unknown `type` yields no structure.  Bridges and culverts keep their
//! geometry in cross-section definition files this module does not own
//! and are not written.

use std::collections::HashMap;

use crate::common::Diagnostics;
use crate::domain::{FlowDirection, Pump, Structure, TimeSeries, Weir, WeirFormula};

const CHAPTER: &str = "[Structure]";

/// One chapter: a structure and its placement.
#[derive(Clone, Debug, PartialEq)]
pub struct StructureEntry {
    pub branch_id: String,
    pub chainage: f64,
    pub structure: Structure,
}

pub fn write(entries: &[StructureEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let mut chapter = Chapter::new();
        match &entry.structure {
            Structure::Weir(weir) => write_weir(&mut chapter, entry, weir),
            Structure::Pump(pump) => write_pump(&mut chapter, entry, pump),
            // bridge/culvert geometry lives in cross-section definitions
            Structure::Bridge(_) | Structure::Culvert(_) => continue,
        }
        out.push_str(&chapter.render());
    }
    out
}

pub fn read(text: &str, diag: &mut Diagnostics) -> Vec<StructureEntry> {
    chapters(text)
        .iter()
        .filter_map(|fields| read_chapter(fields, diag))
        .collect()
}

// ---------------------------------------------------------------------
// writing

struct Chapter {
    fields: Vec<(&'static str, String)>,
}

impl Chapter {
    fn new() -> Self {
        Chapter { fields: Vec::new() }
    }

    fn set<V: ToString>(&mut self, key: &'static str, value: V) {
        self.fields.push((key, value.to_string()));
    }

    fn set_list(&mut self, key: &'static str, values: impl Iterator<Item = f64>) {
        let joined = values
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.fields.push((key, joined));
    }

    fn render(&self) -> String {
        let mut out = String::from(CHAPTER);
        out.push('\n');
        let width = self
            .fields
            .iter()
            .map(|(k, _)| k.len())
            .max()
            .unwrap_or(0);
        for (key, value) in &self.fields {
            out.push_str(&format!("    {key:width$} = {value}\n"));
        }
        out.push('\n');
        out
    }
}

fn write_common(chapter: &mut Chapter, entry: &StructureEntry, id: &str, name: &str) {
    chapter.set("id", id);
    if !name.is_empty() {
        chapter.set("name", name);
    }
    chapter.set("branchId", &entry.branch_id);
    chapter.set("chainage", entry.chainage);
}

fn write_weir(chapter: &mut Chapter, entry: &StructureEntry, weir: &Weir) {
    write_common(chapter, entry, &weir.name, &weir.long_name);
    match &weir.formula {
        WeirFormula::Simple {
            discharge_coefficient,
            lateral_contraction,
        } => {
            chapter.set("type", "weir");
            chapter.set("allowedFlowDir", flow_direction_code(weir.flow_direction));
            chapter.set("crestLevel", weir.crest_level);
            chapter.set("crestWidth", weir.crest_width);
            chapter.set("corrCoeff", discharge_coefficient);
            chapter.set("latdiscoeff", lateral_contraction);
        }
        WeirFormula::River {
            correction_coefficient,
            submergence_limit,
        } => {
            chapter.set("type", "riverWeir");
            chapter.set("crestLevel", weir.crest_level);
            chapter.set("crestWidth", weir.crest_width);
            chapter.set("poscwcoef", correction_coefficient);
            chapter.set("posslimlimit", submergence_limit);
        }
        WeirFormula::FreeForm {
            profile,
            discharge_coefficient,
        } => {
            chapter.set("type", "universalWeir");
            chapter.set("allowedFlowDir", flow_direction_code(weir.flow_direction));
            chapter.set("numLevels", profile.len());
            chapter.set_list("yValues", profile.iter().map(|p| p.0));
            chapter.set_list("zValues", profile.iter().map(|p| p.1));
            chapter.set("crestLevel", weir.crest_level);
            chapter.set("dischargeCoeff", discharge_coefficient);
        }
        WeirFormula::Gated {
            contraction_coefficient,
            gate_opening,
            lower_edge_level,
            max_flow_positive,
            max_flow_negative,
        } => {
            chapter.set("type", "orifice");
            chapter.set("allowedFlowDir", flow_direction_code(weir.flow_direction));
            chapter.set("crestLevel", weir.crest_level);
            chapter.set("crestWidth", weir.crest_width);
            chapter.set("corrCoeff", contraction_coefficient);
            chapter.set("gateLowerEdgeLevel", lower_edge_level);
            chapter.set("openLevel", gate_opening);
            chapter.set("useLimitFlowPos", i32::from(max_flow_positive.is_some()));
            if let Some(limit) = max_flow_positive {
                chapter.set("limitFlowPos", limit);
            }
            chapter.set("useLimitFlowNeg", i32::from(max_flow_negative.is_some()));
            if let Some(limit) = max_flow_negative {
                chapter.set("limitFlowNeg", limit);
            }
        }
        WeirFormula::GeneralStructure {
            width_structure_centre,
            bed_level_structure_centre,
            gate_opening,
            positive_free_gate_flow,
            negative_free_gate_flow,
            extra_resistance,
        } => {
            chapter.set("type", "generalstructure");
            chapter.set("crestWidth", width_structure_centre);
            chapter.set("crestLevel", bed_level_structure_centre);
            // the newer format stores the gate height as an absolute level
            chapter.set("gateHeight", bed_level_structure_centre + gate_opening);
            chapter.set("posFreeGateFlowCoeff", positive_free_gate_flow);
            chapter.set("negFreeGateFlowCoeff", negative_free_gate_flow);
            if let Some(resistance) = extra_resistance {
                chapter.set("extraResistance", resistance);
            }
        }
    }
}

fn write_pump(chapter: &mut Chapter, entry: &StructureEntry, pump: &Pump) {
    write_common(chapter, entry, &pump.name, &pump.long_name);
    chapter.set("type", "pump");
    chapter.set("orientation", pump.direction);
    chapter.set("numStages", 1);
    chapter.set("capacity", pump.capacity);
    chapter.set("startLevelSuctionSide", pump.start_suction);
    chapter.set("stopLevelSuctionSide", pump.stop_suction);
    chapter.set("startLevelDeliverySide", pump.start_delivery);
    chapter.set("stopLevelDeliverySide", pump.stop_delivery);
}

fn flow_direction_code(direction: FlowDirection) -> i32 {
    match direction {
        FlowDirection::Both => 0,
        FlowDirection::Positive => 1,
        FlowDirection::Negative => 2,
    }
}

// ---------------------------------------------------------------------
// reading

fn chapters(text: &str) -> Vec<HashMap<String, String>> {
    let mut out = Vec::new();
    let mut current: Option<HashMap<String, String>> = None;
    for line in text.lines() {
        let line = line.trim();
        if line.eq_ignore_ascii_case(CHAPTER) {
            out.extend(current.take());
            current = Some(HashMap::new());
            continue;
        }
        if line.starts_with('[') {
            // a different chapter kind ends the current structure
            out.extend(current.take());
            continue;
        }
        if let (Some(fields), Some((key, value))) = (current.as_mut(), line.split_once('=')) {
            fields.insert(key.trim().to_owned(), value.trim().to_owned());
        }
    }
    out.extend(current);
    out
}

fn read_chapter(
    fields: &HashMap<String, String>,
    diag: &mut Diagnostics,
) -> Option<StructureEntry> {
    let id = fields.get("id").cloned().unwrap_or_default();
    if id.is_empty() {
        diag.warn("structure chapter without an id; skipped".to_owned());
        return None;
    }
    let name = fields.get("name").cloned().unwrap_or_default();
    let branch_id = fields.get("branchId").cloned().unwrap_or_default();
    let chainage = f64_field(fields, "chainage");

    let kind = fields.get("type").map(String::as_str).unwrap_or("");
    let structure = match kind {
        "weir" => Structure::Weir(Weir {
            crest_level: f64_field(fields, "crestLevel"),
            crest_width: f64_field(fields, "crestWidth"),
            flow_direction: flow_direction_from_code(fields),
            formula: WeirFormula::Simple {
                discharge_coefficient: f64_field(fields, "corrCoeff"),
                lateral_contraction: f64_field(fields, "latdiscoeff"),
            },
            ..base_weir(&id, &name)
        }),
        "riverWeir" => Structure::Weir(Weir {
            crest_level: f64_field(fields, "crestLevel"),
            crest_width: f64_field(fields, "crestWidth"),
            formula: WeirFormula::River {
                correction_coefficient: f64_field(fields, "poscwcoef"),
                submergence_limit: f64_field(fields, "posslimlimit"),
            },
            ..base_weir(&id, &name)
        }),
        "universalWeir" => Structure::Weir(Weir {
            crest_level: f64_field(fields, "crestLevel"),
            flow_direction: flow_direction_from_code(fields),
            formula: WeirFormula::FreeForm {
                profile: zipped_lists(fields, "yValues", "zValues"),
                discharge_coefficient: f64_field(fields, "dischargeCoeff"),
            },
            ..base_weir(&id, &name)
        }),
        "orifice" | "gate" => Structure::Weir(Weir {
            crest_level: f64_field(fields, "crestLevel"),
            crest_width: f64_field(fields, "crestWidth"),
            flow_direction: flow_direction_from_code(fields),
            formula: WeirFormula::Gated {
                contraction_coefficient: f64_field(fields, "corrCoeff"),
                gate_opening: f64_field(fields, "openLevel"),
                lower_edge_level: f64_field(fields, "gateLowerEdgeLevel"),
                max_flow_positive: limit_field(fields, "useLimitFlowPos", "limitFlowPos"),
                max_flow_negative: limit_field(fields, "useLimitFlowNeg", "limitFlowNeg"),
            },
            ..base_weir(&id, &name)
        }),
        "generalstructure" => {
            let crest_level = f64_field(fields, "crestLevel");
            Structure::Weir(Weir {
                crest_level,
                crest_width: f64_field(fields, "crestWidth"),
                formula: WeirFormula::GeneralStructure {
                    width_structure_centre: f64_field(fields, "crestWidth"),
                    bed_level_structure_centre: crest_level,
                    gate_opening: f64_field(fields, "gateHeight") - crest_level,
                    positive_free_gate_flow: f64_field(fields, "posFreeGateFlowCoeff"),
                    negative_free_gate_flow: f64_field(fields, "negFreeGateFlowCoeff"),
                    extra_resistance: fields
                        .get("extraResistance")
                        .and_then(|v| v.parse().ok()),
                },
                ..base_weir(&id, &name)
            })
        }
        "pump" => Structure::Pump(Pump {
            name: id,
            long_name: name,
            direction: fields
                .get("orientation")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            capacity: f64_field(fields, "capacity"),
            start_suction: f64_field(fields, "startLevelSuctionSide"),
            stop_suction: f64_field(fields, "stopLevelSuctionSide"),
            start_delivery: f64_field(fields, "startLevelDeliverySide"),
            stop_delivery: f64_field(fields, "stopLevelDeliverySide"),
        }),
        _ => return None,
    };

    Some(StructureEntry {
        branch_id,
        chainage,
        structure,
    })
}

fn base_weir(id: &str, name: &str) -> Weir {
    Weir {
        name: id.to_owned(),
        long_name: name.to_owned(),
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

fn f64_field(fields: &HashMap<String, String>, key: &str) -> f64 {
    fields
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}

fn limit_field(fields: &HashMap<String, String>, flag: &str, value: &str) -> Option<f64> {
    if fields.get(flag).map(String::as_str) == Some("1") {
        Some(f64_field(fields, value))
    } else {
        None
    }
}

fn flow_direction_from_code(fields: &HashMap<String, String>) -> FlowDirection {
    match fields.get("allowedFlowDir").map(String::as_str) {
        Some("1") => FlowDirection::Positive,
        Some("2") => FlowDirection::Negative,
        _ => FlowDirection::Both,
    }
}

fn zipped_lists(fields: &HashMap<String, String>, ys: &str, zs: &str) -> Vec<(f64, f64)> {
    let parse = |key: &str| -> Vec<f64> {
        fields
            .get(key)
            .map(|v| {
                v.split_whitespace()
                    .filter_map(|t| t.parse().ok())
                    .collect()
            })
            .unwrap_or_default()
    };
    parse(ys).into_iter().zip(parse(zs)).collect()
}
