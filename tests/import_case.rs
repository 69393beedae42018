// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! End-to-end imports of small case directories.

use std::fs;
use std::path::Path;

use sobek_import::domain::{
    DataItem, DataItemCatalog, DataItemRole, ElementSet, OutputRef, QuantityType, RuleId,
    Structure,
};
use sobek_import::{import, ImportFiles};

fn write_file(dir: &Path, name: &str, text: &str) {
    fs::write(dir.join(name), text).unwrap();
}

fn write_network(dir: &Path) {
    write_file(
        dir,
        "NETWORK.TP",
        "NODE id 'n1' px 0 py 0 node\nNODE id 'n2' px 100 py 0 node\n\
         BRCH id '1' nm 'chan' bn 'n1' en 'n2' al 100 brch\n",
    );
}

#[test]
fn test_controlled_weir_case() {
    let dir = tempfile::tempdir().unwrap();
    write_network(dir.path());
    write_file(
        dir.path(),
        "NETWORK.ST",
        "STRU id 'S1' nm 'Weir north' ci '1' lc 50 stru\n",
    );
    write_file(
        dir.path(),
        "STRUCT.DAT",
        "STRU id 'S1' dd '7' ca 1 0 0 0 cj '1' '-1' '-1' '-1' stru\n",
    );
    write_file(
        dir.path(),
        "STRUCT.DEF",
        "STDS id '7' nm 'w' ty 6 cl 10 cw 5 stds\n",
    );
    write_file(
        dir.path(),
        "CONTROL.DEF",
        "CNTL id '1' ct 0 ca 0 ac 1 ta 1 0 0 0 gi '5' '-1' '-1' '-1' ao 0 0 0 0 0 ti tv TBLE\n\
         '1991/01/01;00:00:00' 1.1 <\ntble cntl\n",
    );
    write_file(
        dir.path(),
        "TRIGGER.DEF",
        "TRGR id '5' nm 'level check' ty 1 tp 0 ml 'obs1' ts '-1' ch 0 tt TBLE\n\
         '1991/01/01;00:00:00' 1 0 1 1.5 <\ntble trgr\n",
    );
    write_file(
        dir.path(),
        "CASEDESC.CMT",
        "I \\CASEDIR\\656NOP.WDC 231 '1402382291'\n",
    );

    let mut catalog = DataItemCatalog::new();
    catalog.add(DataItem {
        location: "S1".to_owned(),
        quantity: QuantityType::CrestLevel,
        element_set: ElementSet::Structures,
        role: DataItemRole::Input,
    });
    catalog.add(DataItem {
        location: "obs1".to_owned(),
        quantity: QuantityType::WaterLevel,
        element_set: ElementSet::Observations,
        role: DataItemRole::Output,
    });

    let files = ImportFiles::in_directory(dir.path(), true);
    let result = import(&files, &catalog).unwrap();

    assert_eq!(1, result.composites.len());
    let composite = &result.composites[0];
    assert_eq!("S1 [compound]", composite.name);
    assert_eq!("Weir north", composite.long_name);
    assert_eq!("1", composite.branch_id);
    assert_eq!(50.0, composite.chainage);
    assert_eq!(1, composite.structures.len());
    match &composite.structures[0] {
        Structure::Weir(weir) => {
            assert_eq!("S1", weir.name);
            assert_eq!("Weir north", weir.long_name);
            assert_eq!(10.0, weir.crest_level);
            assert_eq!(5.0, weir.crest_width);
        }
        other => panic!("expected weir, got {other:?}"),
    }

    assert_eq!(1, result.control_groups.len());
    let group = &result.control_groups[0];
    assert_eq!("Control group of S1", group.name);
    assert_eq!(1, group.rules.len());
    assert_eq!("CTR_1", group.rules[0].name);
    // one trigger row: a time window leading into a threshold check
    assert_eq!(2, group.conditions.len());
    assert_eq!(
        &[OutputRef::Rule(RuleId(0))],
        group.conditions[1].true_outputs.as_slice()
    );
    assert_eq!(1, group.inputs.len());
    assert_eq!("obs1", group.inputs[0].location);

    let expected_wind = format!(
        "{}/656NOP.WDC",
        dir.path().parent().unwrap().display()
    );
    assert_eq!(Some(expected_wind), result.case_data.wind_file);
    assert_eq!(None, result.case_data.precipitation_file);

    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
}

#[test]
fn test_pump_stages_and_chainage_clamp() {
    let dir = tempfile::tempdir().unwrap();
    write_network(dir.path());
    write_file(
        dir.path(),
        "NETWORK.ST",
        "STRU id 'P1' nm 'polder pump' ci '1' lc 150 stru\n",
    );
    write_file(dir.path(), "STRUCT.DAT", "STRU id 'P1' dd '9' stru\n");
    write_file(
        dir.path(),
        "STRUCT.DEF",
        "STDS id '9' nm 'p' ty 9 dn 1 ct lt TBLE\n\
         0.5 1 0.5 1.2 0.8 <\n1.25 1.5 1 1.6 1.2 <\n3 2 1.5 2 1.6 <\ntble stds\n",
    );

    let files = ImportFiles::in_directory(dir.path(), true);
    let result = import(&files, &DataItemCatalog::new()).unwrap();

    let composite = &result.composites[0];
    // chainage beyond the branch length is clamped to the end
    assert_eq!(100.0, composite.chainage);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message.contains("chainage")));

    let pumps: Vec<(&str, f64)> = composite
        .structures
        .iter()
        .map(|s| match s {
            Structure::Pump(p) => (p.name.as_str(), p.capacity),
            other => panic!("expected pump, got {other:?}"),
        })
        .collect();
    assert_eq!(
        vec![("P1", 0.5), ("P12", 0.75), ("P13", 1.75)],
        pumps
    );
}

#[test]
fn test_channel_curve_points_bend_geometry() {
    let dir = tempfile::tempdir().unwrap();
    write_network(dir.path());
    write_file(dir.path(), "NETWORK.ST", "");
    write_file(dir.path(), "STRUCT.DAT", "");
    write_file(dir.path(), "STRUCT.DEF", "");
    write_file(
        dir.path(),
        "NETWORK.CP",
        "BRCH id '1' TBLE\n50 90 <\ntble brch\n",
    );

    let files = ImportFiles::in_directory(dir.path(), true);
    let result = import(&files, &DataItemCatalog::new()).unwrap();

    let points = &result.branch_geometries["1"];
    assert_eq!(3, points.len());
    assert!((points[1].0 - 0.0).abs() < 1e-9);
    assert!((points[1].1 - 50.0).abs() < 1e-9);
    // the bend makes the realized length disagree with the declared one
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message.contains("branch 1 - chan")));
}
