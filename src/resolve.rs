// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Cross-reference resolver.
//!
//! The record files key everything by string id: a structure location
//! joins its mapping, the mapping joins its definition (or a compound
//! that fans out into member mappings), the definition joins its
//! friction record, and controller slots join the controller and
//! trigger definitions.  Every failed join produces a warning and skips
//! the dependent item; resolution itself never aborts.

use std::collections::HashMap;

use log::debug;

use crate::builders::{self, control_group};
use crate::common::Diagnostics;
use crate::domain::{CompositeStructure, ControlGroup, DataItemCatalog, Structure};
use crate::records::controller::Controller;
use crate::records::cross_section::CrossSectionDefinition;
use crate::records::friction::{FrictionValueKind, StructureFriction};
use crate::records::initial::{BranchInitial, GlobalInitial};
use crate::records::network::{
    BranchRecord, CompoundStructure, StructureLocation, StructureMapping,
};
use crate::records::structure_def::{StructureDefinition, StructurePayload};
use crate::records::trigger::TriggerDef;
use crate::records::valve::ValveData;

/// Chezy, the fallback friction type when no usable record joins.
const DEFAULT_FRICTION_TYPE: i32 = 0;
const DEFAULT_FRICTION: f64 = 45.0;

/// Everything the resolver joins, as read from the individual files.
#[derive(Clone, Debug, Default)]
pub struct ResolveInput {
    pub branches: Vec<BranchRecord>,
    pub locations: Vec<StructureLocation>,
    pub mappings: Vec<StructureMapping>,
    pub compounds: Vec<CompoundStructure>,
    pub definitions: HashMap<String, StructureDefinition>,
    pub cross_sections: HashMap<String, CrossSectionDefinition>,
    pub frictions: Vec<StructureFriction>,
    pub valves: HashMap<String, ValveData>,
    pub controllers: Vec<Controller>,
    pub triggers: Vec<TriggerDef>,
}

/// Joined output: one composite per placed location plus the control
/// groups of every controlled structure.
#[derive(Clone, Debug, Default)]
pub struct Resolved {
    pub composites: Vec<CompositeStructure>,
    pub control_groups: Vec<ControlGroup>,
}

pub fn resolve(
    input: &ResolveInput,
    catalog: &DataItemCatalog,
    diag: &mut Diagnostics,
) -> Resolved {
    let mappings = mapping_table(&input.mappings, diag);
    let compounds: HashMap<&str, &CompoundStructure> = input
        .compounds
        .iter()
        .map(|c| (c.id.as_str(), c))
        .collect();
    let branches: HashMap<&str, &BranchRecord> = input
        .branches
        .iter()
        .map(|b| (b.id.as_str(), b))
        .collect();
    let controllers: HashMap<String, Controller> = input
        .controllers
        .iter()
        .map(|c| (c.id.clone(), c.clone()))
        .collect();
    let triggers: HashMap<String, TriggerDef> = input
        .triggers
        .iter()
        .map(|t| (t.id.clone(), t.clone()))
        .collect();

    let mut out = Resolved::default();

    for location in &input.locations {
        // "-1" marks a sub-structure that only exists inside a compound
        if location.branch_id == "-1" {
            continue;
        }
        let mapping = match mappings.get(location.id.as_str()) {
            Some(mapping) => *mapping,
            None => {
                diag.warn(format!(
                    "no mapping of structure found with id = {}",
                    location.id
                ));
                continue;
            }
        };
        let branch = match branches.get(location.branch_id.as_str()) {
            Some(branch) => *branch,
            None => {
                diag.warn(format!(
                    "can not add structure {} to branch; carrier id {} not found",
                    location.id, location.branch_id
                ));
                continue;
            }
        };

        let mut chainage = location.chainage;
        if chainage > branch.length {
            diag.warn(format!(
                "the chainage of structure '{} - {}' is out of the branch length; \
                 the chainage has been set from {} to {}",
                location.id, location.name, chainage, branch.length
            ));
            chainage = branch.length;
        }

        let mut composite = CompositeStructure {
            name: format!("{} [compound]", location.id),
            long_name: location.name.clone(),
            branch_id: location.branch_id.clone(),
            chainage,
            structures: Vec::new(),
        };

        match compounds.get(mapping.definition_id.as_str()) {
            Some(compound) => {
                for member_id in &compound.structure_ids {
                    let member = match mappings.get(member_id.as_str()) {
                        Some(member) => *member,
                        None => {
                            diag.warn(format!(
                                "no mapping of structure found with id = {member_id}"
                            ));
                            continue;
                        }
                    };
                    // a member without its own display name borrows the
                    // name of its placement-less sub-location
                    let display_name = if member.name.is_empty() {
                        sub_location_name(&input.locations, member_id)
                    } else {
                        member.name.clone()
                    };
                    place(
                        member,
                        &display_name,
                        input,
                        catalog,
                        &controllers,
                        &triggers,
                        &mut composite,
                        &mut out.control_groups,
                        diag,
                    );
                }
            }
            None => place(
                mapping,
                &location.name,
                input,
                catalog,
                &controllers,
                &triggers,
                &mut composite,
                &mut out.control_groups,
                diag,
            ),
        }

        if !composite.structures.is_empty() {
            out.composites.push(composite);
        }
    }

    out
}

/// Last mapping per structure id wins, like the definition files.
fn mapping_table<'a>(
    mappings: &'a [StructureMapping],
    diag: &mut Diagnostics,
) -> HashMap<&'a str, &'a StructureMapping> {
    let mut out: HashMap<&str, &StructureMapping> = HashMap::new();
    for mapping in mappings {
        if out.insert(mapping.structure_id.as_str(), mapping).is_some() {
            diag.warn(format!(
                "duplicate structure mapping for id = {}; overwriting with latest values",
                mapping.structure_id
            ));
        }
    }
    out
}

fn sub_location_name(locations: &[StructureLocation], id: &str) -> String {
    locations
        .iter()
        .find(|l| l.id == id)
        .map(|l| l.name.clone())
        .unwrap_or_default()
}

/// Builds the structures of one mapping, names them, applies friction
/// and the control group, and adds them to the composite.
#[allow(clippy::too_many_arguments)]
fn place(
    mapping: &StructureMapping,
    display_name: &str,
    input: &ResolveInput,
    catalog: &DataItemCatalog,
    controllers: &HashMap<String, Controller>,
    triggers: &HashMap<String, TriggerDef>,
    composite: &mut CompositeStructure,
    control_groups: &mut Vec<ControlGroup>,
    diag: &mut Diagnostics,
) {
    let definition = match input.definitions.get(&mapping.definition_id) {
        Some(definition) => definition,
        None => {
            diag.warn(format!(
                "no definition with id = {} for structure {}",
                mapping.definition_id, mapping.structure_id
            ));
            return;
        }
    };

    // unsupported definition types build nothing, silently
    let mut structures = build_structures(definition, input);
    if structures.is_empty() {
        return;
    }

    let friction = input
        .frictions
        .iter()
        .find(|f| f.structure_definition_id == mapping.definition_id);

    for structure in &mut structures {
        // pumps carry their stage suffix ("", "2", "3", ...) already
        let name = if structure.is_pump() {
            format!("{}{}", mapping.structure_id, structure.name())
        } else {
            mapping.structure_id.clone()
        };
        structure.set_name(name);
        structure.set_long_name(display_name.to_owned());
        apply_friction(structure, friction, diag);
    }

    if !mapping.controller_ids.is_empty() {
        if let Some(group) = control_group::build_for_structure(
            mapping,
            &structures[0],
            catalog,
            controllers,
            triggers,
            diag,
        ) {
            control_groups.push(group);
        }
    }

    composite.structures.extend(structures);
}

fn build_structures(definition: &StructureDefinition, input: &ResolveInput) -> Vec<Structure> {
    match &definition.payload {
        StructurePayload::Pump(_) => builders::pump::build(definition),
        StructurePayload::Bridge(_) => builders::bridge::build(definition, &input.cross_sections),
        StructurePayload::Culvert(_) => {
            builders::culvert::build(definition, &input.cross_sections, &input.valves)
        }
        _ => builders::weir::build(definition, &input.cross_sections),
    }
}

/// Friction joins on the definition id.  A missing record or a
/// non-constant friction function falls back to Chezy 45; a groundlayer
/// type that differs from the bed type zeroes the groundlayer roughness.
fn apply_friction(
    structure: &mut Structure,
    friction: Option<&StructureFriction>,
    diag: &mut Diagnostics,
) {
    match structure {
        Structure::Bridge(bridge) => match friction {
            None => {
                bridge.friction_type = DEFAULT_FRICTION_TYPE;
                bridge.friction = DEFAULT_FRICTION;
                debug!(
                    "friction of bridge {} not found in import file; set default type Chezy and value 45",
                    bridge.name
                );
            }
            Some(f) if f.main_friction_kind != FrictionValueKind::Constant => {
                bridge.friction_type = DEFAULT_FRICTION_TYPE;
                bridge.friction = DEFAULT_FRICTION;
                debug!(
                    "only constant friction for structures is supported; \
                     friction of bridge {} set to default type Chezy and value 45",
                    bridge.name
                );
            }
            Some(f) => {
                bridge.friction_type = f.main_friction_type;
                bridge.friction = f.main_friction_value;
                if f.ground_layer_friction_type != f.main_friction_type {
                    if bridge.ground_layer_enabled {
                        diag.warn(format!(
                            "bridge '{}': bed friction type {} and groundlayer friction \
                             type {} should be the same; groundlayer roughness was set to 0",
                            bridge.name, f.main_friction_type, f.ground_layer_friction_type
                        ));
                    }
                    bridge.ground_layer_roughness = 0.0;
                } else {
                    bridge.ground_layer_roughness = f.ground_layer_friction_value;
                }
            }
        },
        Structure::Culvert(culvert) => match friction {
            None => {
                culvert.friction_type = DEFAULT_FRICTION_TYPE;
                culvert.friction = DEFAULT_FRICTION;
                debug!(
                    "friction of culvert {} not found in import file; set default type Chezy and value 45",
                    culvert.name
                );
            }
            Some(f) if f.main_friction_kind != FrictionValueKind::Constant => {
                culvert.friction_type = DEFAULT_FRICTION_TYPE;
                culvert.friction = DEFAULT_FRICTION;
                debug!(
                    "only constant friction for structures is supported; \
                     friction of culvert {} set to default type Chezy and value 45",
                    culvert.name
                );
            }
            Some(f) => {
                culvert.friction_type = f.main_friction_type;
                culvert.friction = f.main_friction_value;
            }
        },
        _ => {}
    }
}

/// Branch overrides whose quantity differs from the global one are
/// excluded, reported together as one batched warning.
pub fn filter_branch_initials(
    global: &GlobalInitial,
    branch_initials: Vec<BranchInitial>,
    diag: &mut Diagnostics,
) -> Vec<BranchInitial> {
    let mut kept = Vec::new();
    let mut excluded = Vec::new();
    for initial in branch_initials {
        if initial.quantity == global.quantity {
            kept.push(initial);
        } else {
            excluded.push(initial.id.clone());
        }
    }
    diag.warn_batch(
        "quantity of definition differs from global quantity",
        &excluded,
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Diagnostic;
    use crate::records::{
        cross_section, friction, initial, network, structure_def, valve,
    };

    fn base_input() -> ResolveInput {
        let mut diag = Diagnostics::new();
        ResolveInput {
            branches: network::read_branches(
                "BRCH id '1' nm 'chan' bn 'n1' en 'n2' al 100 brch\n",
                &mut diag,
            ),
            ..Default::default()
        }
    }

    fn resolve_quiet(input: &ResolveInput) -> (Resolved, Diagnostics) {
        let mut diag = Diagnostics::new();
        let resolved = resolve(input, &DataItemCatalog::new(), &mut diag);
        (resolved, diag)
    }

    #[test]
    fn test_weir_location_resolves_to_composite() {
        let mut diag = Diagnostics::new();
        let mut input = base_input();
        input.locations = network::read_locations(
            "STRU id 'S1' nm 'Weir north' ci '1' lc 50 stru\n",
            &mut diag,
        );
        input.mappings =
            network::read_mappings("STRU id 'S1' nm '' dd '7' stru\n", &mut diag);
        input.definitions =
            structure_def::read_all("STDS id '7' nm 'w' ty 6 cl 10 cw 5 stds\n", &mut diag);

        let (resolved, diag) = resolve_quiet(&input);
        assert!(diag.is_empty());
        assert_eq!(1, resolved.composites.len());
        let composite = &resolved.composites[0];
        assert_eq!("S1 [compound]", composite.name);
        assert_eq!("Weir north", composite.long_name);
        assert_eq!(50.0, composite.chainage);
        assert_eq!(1, composite.structures.len());
        assert_eq!("S1", composite.structures[0].name());
        match &composite.structures[0] {
            Structure::Weir(w) => assert_eq!("Weir north", w.long_name),
            other => panic!("expected weir, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_mapping_and_definition_warn_and_skip() {
        let mut diag = Diagnostics::new();
        let mut input = base_input();
        input.locations = network::read_locations(
            "STRU id 'S1' nm 'a' ci '1' lc 10 stru\nSTRU id 'S2' nm 'b' ci '1' lc 20 stru\n",
            &mut diag,
        );
        input.mappings =
            network::read_mappings("STRU id 'S2' nm '' dd 'missing' stru\n", &mut diag);

        let (resolved, diag) = resolve_quiet(&input);
        assert!(resolved.composites.is_empty());
        let messages: Vec<&str> = diag.iter().map(|d| d.message.as_str()).collect();
        assert!(messages
            .iter()
            .any(|m| m.contains("no mapping of structure found with id = S1")));
        assert!(messages
            .iter()
            .any(|m| m.contains("no definition with id = missing for structure S2")));
    }

    #[test]
    fn test_unknown_branch_is_skipped_with_warning() {
        let mut diag = Diagnostics::new();
        let mut input = base_input();
        input.locations =
            network::read_locations("STRU id 'S1' nm 'a' ci '9' lc 10 stru\n", &mut diag);
        input.mappings = network::read_mappings("STRU id 'S1' dd '7' stru\n", &mut diag);
        input.definitions =
            structure_def::read_all("STDS id '7' ty 6 cl 10 cw 5 stds\n", &mut diag);

        let (resolved, diag) = resolve_quiet(&input);
        assert!(resolved.composites.is_empty());
        assert!(diag
            .iter()
            .any(|d| d.message.contains("carrier id 9 not found")));
    }

    #[test]
    fn test_chainage_clamped_to_branch_length() {
        let mut diag = Diagnostics::new();
        let mut input = base_input();
        input.locations =
            network::read_locations("STRU id 'S1' nm 'a' ci '1' lc 150 stru\n", &mut diag);
        input.mappings = network::read_mappings("STRU id 'S1' dd '7' stru\n", &mut diag);
        input.definitions =
            structure_def::read_all("STDS id '7' ty 6 cl 10 cw 5 stds\n", &mut diag);

        let (resolved, diag) = resolve_quiet(&input);
        assert_eq!(100.0, resolved.composites[0].chainage);
        assert!(diag
            .iter()
            .any(|d| d.message.contains("has been set from 150 to 100")));
    }

    #[test]
    fn test_compound_fans_out_members() {
        let mut diag = Diagnostics::new();
        let mut input = base_input();
        input.locations = network::read_locations(
            "STRU id 'C1' nm 'Sluice' ci '1' lc 40 stru\n\
             STRU id 'S1' nm 'north gate' ci '-1' lc 0 stru\n\
             STRU id 'S2' nm 'south gate' ci '-1' lc 0 stru\n",
            &mut diag,
        );
        input.mappings = network::read_mappings(
            "STRU id 'C1' dd 'cmp' stru\n\
             STRU id 'S1' nm '' dd '7' stru\n\
             STRU id 'S2' nm 'named gate' dd '7' stru\n",
            &mut diag,
        );
        input.compounds =
            network::read_compounds("STCM id 'cmp' nm 'c' dm 'S1' 'S2' stcm\n", &mut diag);
        input.definitions =
            structure_def::read_all("STDS id '7' ty 6 cl 10 cw 5 stds\n", &mut diag);

        let (resolved, diag) = resolve_quiet(&input);
        assert!(diag.is_empty());
        let composite = &resolved.composites[0];
        assert_eq!("C1 [compound]", composite.name);
        assert_eq!(2, composite.structures.len());
        assert_eq!("S1", composite.structures[0].name());
        // member without a mapping name borrows the sub-location name
        match &composite.structures[0] {
            Structure::Weir(w) => assert_eq!("north gate", w.long_name),
            other => panic!("expected weir, got {other:?}"),
        }
        match &composite.structures[1] {
            Structure::Weir(w) => assert_eq!("named gate", w.long_name),
            other => panic!("expected weir, got {other:?}"),
        }
    }

    #[test]
    fn test_pump_stages_named_after_mapping_id() {
        let mut diag = Diagnostics::new();
        let mut input = base_input();
        input.locations =
            network::read_locations("STRU id 'P1' nm 'pump' ci '1' lc 10 stru\n", &mut diag);
        input.mappings = network::read_mappings("STRU id 'P1' dd '9' stru\n", &mut diag);
        input.definitions = structure_def::read_all(
            "STDS id '9' ty 9 dn 1 ct lt TBLE\n0.5 1 0.5 1.2 0.8 <\n1.25 1.5 1 1.6 1.2 <\ntble stds\n",
            &mut diag,
        );

        let (resolved, _) = resolve_quiet(&input);
        let composite = &resolved.composites[0];
        assert_eq!(2, composite.structures.len());
        assert_eq!("P1", composite.structures[0].name());
        assert_eq!("P12", composite.structures[1].name());
    }

    #[test]
    fn test_bridge_friction_defaults_and_join() {
        let mut diag = Diagnostics::new();
        let mut input = base_input();
        input.locations = network::read_locations(
            "STRU id 'B1' nm 'b' ci '1' lc 10 stru\nSTRU id 'B2' nm 'b2' ci '1' lc 20 stru\n",
            &mut diag,
        );
        input.mappings = network::read_mappings(
            "STRU id 'B1' dd '20' stru\nSTRU id 'B2' dd '21' stru\n",
            &mut diag,
        );
        input.definitions = structure_def::read_all(
            "STDS id '20' ty 12 tb 2 si '11' pw 0 vf 0 li 1 lo 1 dl 5 stds\n\
             STDS id '21' ty 12 tb 2 si '11' pw 0 vf 0 li 1 lo 1 dl 5 stds\n",
            &mut diag,
        );
        input.cross_sections = cross_section::read_all(
            "CRDS id '11' ty 0 lt lw TBLE\n0 5 5 <\n2 5 5 <\ntble crds\n",
            &mut diag,
        );
        input.frictions = friction::read_all(
            "STFR id '1' ci '21' mf 1 mt cp 0 0.03 0 sf 1 st cp 0 0.02 0 stfr\n",
            &mut diag,
        );

        let (resolved, _) = resolve_quiet(&input);
        let bridge = |i: usize| match &resolved.composites[i].structures[0] {
            Structure::Bridge(b) => b.clone(),
            other => panic!("expected bridge, got {other:?}"),
        };
        // no friction record: Chezy 45
        assert_eq!(0, bridge(0).friction_type);
        assert_eq!(45.0, bridge(0).friction);
        // joined on definition id 21
        assert_eq!(1, bridge(1).friction_type);
        assert_eq!(0.03, bridge(1).friction);
        assert_eq!(0.02, bridge(1).ground_layer_roughness);
    }

    #[test]
    fn test_culvert_gets_valve_loss_through_resolution() {
        let mut diag = Diagnostics::new();
        let mut input = base_input();
        input.locations =
            network::read_locations("STRU id 'K1' nm 'k' ci '1' lc 10 stru\n", &mut diag);
        input.mappings = network::read_mappings("STRU id 'K1' dd '4' stru\n", &mut diag);
        input.definitions = structure_def::read_all(
            "STDS id '4' ty 10 si '11' dl 25 av 1 ih 0.6 tv 'vd1' stds\n",
            &mut diag,
        );
        input.cross_sections =
            cross_section::read_all("CRDS id '11' ty 4 rd 0.8 crds\n", &mut diag);
        input.valves = valve::read_all(
            "VLVE id 'vd1' lt lc TBLE\n0 5 <\n1 0.4 <\ntble vlve\n",
            &mut diag,
        );

        let (resolved, _) = resolve_quiet(&input);
        match &resolved.composites[0].structures[0] {
            Structure::Culvert(c) => {
                assert_eq!(&[(0.0, 5.0), (1.0, 0.4)], c.valve_loss.points());
                assert_eq!(45.0, c.friction);
            }
            other => panic!("expected culvert, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_mapping_last_wins() {
        let mut diag = Diagnostics::new();
        let mut input = base_input();
        input.locations =
            network::read_locations("STRU id 'S1' nm 'a' ci '1' lc 10 stru\n", &mut diag);
        input.mappings = network::read_mappings(
            "STRU id 'S1' dd '7' stru\nSTRU id 'S1' dd '8' stru\n",
            &mut diag,
        );
        input.definitions = structure_def::read_all(
            "STDS id '7' ty 6 cl 10 cw 5 stds\nSTDS id '8' ty 6 cl 20 cw 5 stds\n",
            &mut diag,
        );

        let (resolved, diag) = resolve_quiet(&input);
        match &resolved.composites[0].structures[0] {
            Structure::Weir(w) => assert_eq!(20.0, w.crest_level),
            other => panic!("expected weir, got {other:?}"),
        }
        assert!(diag
            .iter()
            .any(|d| d.message.contains("duplicate structure mapping for id = S1")));
    }

    #[test]
    fn test_branch_initial_quantity_mismatch_batched() {
        let mut diag = Diagnostics::new();
        let (global, branch_initials) = initial::read_all(
            "GLIN ty 0 lv 1.5 q_ 0.5 glin\n\
             FLBR id 'F1' ci '1' ty 0 lv 1.2 flbr\n\
             FLBR id 'F2' ci '2' ty 1 lv 0.4 flbr\n\
             FLBR id 'F3' ci '3' ty 1 lv 0.6 flbr\n",
            &mut diag,
        );
        let kept = filter_branch_initials(&global, branch_initials, &mut diag);
        assert_eq!(1, kept.len());
        assert_eq!("F1", kept[0].id);
        let batched: Vec<&Diagnostic> = diag.warnings().collect();
        assert_eq!(1, batched.len());
        assert!(batched[0].message.contains("F2, F3"));
    }
}
