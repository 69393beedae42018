// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Pump builder.  A definition with K capacity stages becomes K pumps:
//! the file stores cumulative capacity thresholds, the model wants the
//! per-stage contribution, so stage 1 keeps its absolute value and
//! every later stage gets the delta to its predecessor.  Stage names
//! are `""`, `"2"`, `"3"`, ... and are prefixed with the mapping id
//! later, so the first pump keeps the plain structure name.

use crate::domain::{Pump, Structure};
use crate::records::structure_def::{StructureDefinition, StructurePayload};

pub fn build(definition: &StructureDefinition) -> Vec<Structure> {
    let def = match &definition.payload {
        StructurePayload::Pump(def) => def,
        _ => return Vec::new(),
    };

    def.capacity_stages
        .iter()
        .enumerate()
        .map(|(i, stage)| {
            let capacity = if i == 0 {
                stage.capacity
            } else {
                stage.capacity - def.capacity_stages[i - 1].capacity
            };
            Structure::Pump(Pump {
                name: if i == 0 {
                    String::new()
                } else {
                    (i + 1).to_string()
                },
                long_name: definition.name.clone(),
                direction: def.direction,
                capacity,
                start_suction: stage.suction_start,
                stop_suction: stage.suction_stop,
                start_delivery: stage.delivery_start,
                stop_delivery: stage.delivery_stop,
            })
        })
        .collect()
}
