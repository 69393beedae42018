// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Structures INI round trips and pump stage properties over generated
//! inputs.

use std::fs;

use float_cmp::approx_eq;
use proptest::prelude::*;

use sobek_import::builders::pump;
use sobek_import::common::Diagnostics;
use sobek_import::domain::{FlowDirection, Pump, Structure, TimeSeries, Weir, WeirFormula};
use sobek_import::records::structure_def;
use sobek_import::structures_ini::{self, StructureEntry};
use sobek_import::tokenizer::scan_records;

fn entry(branch_id: &str, chainage: f64, structure: Structure) -> StructureEntry {
    StructureEntry {
        branch_id: branch_id.to_owned(),
        chainage,
        structure,
    }
}

fn weir(id: &str, crest_level: f64, crest_width: f64, formula: WeirFormula) -> Weir {
    Weir {
        name: id.to_owned(),
        long_name: String::new(),
        crest_level,
        crest_width,
        use_crest_level_time_series: false,
        crest_level_time_series: TimeSeries::new(),
        flow_direction: FlowDirection::Both,
        formula,
        offset_y: 0.0,
    }
}

fn round_trip(entries: &[StructureEntry]) -> Vec<StructureEntry> {
    let mut diag = Diagnostics::new();
    let text = structures_ini::write(entries);
    let back = structures_ini::read(&text, &mut diag);
    assert!(diag.is_empty(), "{diag:?}");
    back
}

fn direction_strategy() -> impl Strategy<Value = FlowDirection> {
    prop_oneof![
        Just(FlowDirection::Both),
        Just(FlowDirection::Positive),
        Just(FlowDirection::Negative),
    ]
}

proptest! {
    #[test]
    fn simple_weir_survives_round_trip(
        id in "[a-z][a-z0-9]{0,7}",
        crest_level in -1e4..1e4f64,
        crest_width in 0.0..1e3f64,
        discharge in 0.1..2.0f64,
        contraction in 0.1..2.0f64,
        direction in direction_strategy(),
        chainage in 0.0..1e5f64,
    ) {
        let mut structure = weir(
            &id,
            crest_level,
            crest_width,
            WeirFormula::Simple {
                discharge_coefficient: discharge,
                lateral_contraction: contraction,
            },
        );
        structure.flow_direction = direction;
        let original = entry("1", chainage, Structure::Weir(structure));
        prop_assert_eq!(vec![original.clone()], round_trip(&[original]));
    }

    #[test]
    fn pump_survives_round_trip(
        id in "[a-z][a-z0-9]{0,7}",
        direction in prop_oneof![Just(1), Just(-1)],
        capacity in 0.0..1e3f64,
        start_suction in -1e2..1e2f64,
        stop_suction in -1e2..1e2f64,
        start_delivery in -1e2..1e2f64,
        stop_delivery in -1e2..1e2f64,
    ) {
        let original = entry(
            "2",
            10.0,
            Structure::Pump(Pump {
                name: id,
                long_name: "station".to_owned(),
                direction,
                capacity,
                start_suction,
                stop_suction,
                start_delivery,
                stop_delivery,
            }),
        );
        prop_assert_eq!(vec![original.clone()], round_trip(&[original]));
    }

    /// Cumulative stage capacities come back out as per-stage deltas.
    #[test]
    fn pump_stage_capacities_sum_to_last_cumulative(
        deltas in proptest::collection::vec(0.01..50.0f64, 1..5),
    ) {
        let mut rows = String::new();
        let mut cumulative = 0.0;
        for delta in &deltas {
            cumulative += delta;
            rows.push_str(&format!("{cumulative} 1 0.5 1.2 0.8 <\n"));
        }
        let text = format!("STDS id '9' ty 9 dn 1 ct lt TBLE\n{rows}tble stds\n");

        let mut diag = Diagnostics::new();
        let recs = scan_records(&text, &mut diag);
        let def = structure_def::map_record(&recs[0], &mut diag).unwrap();
        let pumps = pump::build(&def);
        prop_assert!(diag.is_empty());
        prop_assert_eq!(deltas.len(), pumps.len());

        let mut total = 0.0;
        for (built, delta) in pumps.iter().zip(&deltas) {
            let capacity = match built {
                Structure::Pump(p) => p.capacity,
                other => panic!("expected pump, got {other:?}"),
            };
            prop_assert!(approx_eq!(f64, capacity, *delta, epsilon = 1e-9));
            total += capacity;
        }
        prop_assert!(approx_eq!(f64, total, cumulative, epsilon = 1e-9));
    }
}

#[test]
fn test_round_trip_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("structures.ini");

    let entries = vec![
        entry(
            "1",
            50.0,
            Structure::Weir(weir(
                "S1",
                10.0,
                5.0,
                WeirFormula::Simple {
                    discharge_coefficient: 1.0,
                    lateral_contraction: 1.0,
                },
            )),
        ),
        entry(
            "1",
            80.0,
            Structure::Weir(weir(
                "G1",
                2.0,
                3.0,
                WeirFormula::Gated {
                    contraction_coefficient: 0.63,
                    gate_opening: 0.75,
                    lower_edge_level: 2.75,
                    max_flow_positive: Some(12.5),
                    max_flow_negative: None,
                },
            )),
        ),
    ];

    fs::write(&path, structures_ini::write(&entries)).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    let mut diag = Diagnostics::new();
    assert_eq!(entries, structures_ini::read(&text, &mut diag));
    assert!(diag.is_empty());
}
