// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Control-group builder.
//!
//! One group is built per controlled structure.  Every controller bound
//! to the structure becomes a rule; the triggers on that controller
//! become chains of conditions in front of the rule.  Within one
//! condition row, AND relations chain a trigger's conditions through
//! empty true-edges; an OR relation closes the row and wires the next
//! row into every empty false-edge of the finished rows.  When two
//! rules drive the same output, the earlier rule's dangling condition
//! edges are pointed at the start of the later rule's chain so exactly
//! one rule fires.

use std::collections::HashMap;

use crate::common::Diagnostics;
use crate::domain::{
    Condition, ConditionId, ConditionKind, ControlGroup, DataItemCatalog, DataItemRole,
    DeadBandKind, ElementSet, ExtrapolationType, Input, InterpolationType, IntervalRuleKind,
    LookupFunction, Operation, Output, OutputRef, QuantityType, Rule, RuleId, RuleKind,
    SetpointMode, Structure, TimeSeries,
};
use crate::records::controller::{Controller, ControllerKind, DeadBand, IntervalKind, TriggerSlot};
use crate::records::network::StructureMapping;
use crate::records::trigger::{TriggerCheckOn, TriggerDef, TriggerLocationKind, TriggerType};

use super::{controlled_quantity, measured_quantity, trigger_quantity, StructureKind};

/// Builds the control group for one structure, or `None` when the
/// structure exposes no controllable data items or none of its
/// controllers resolve.
pub fn build_for_structure(
    mapping: &StructureMapping,
    structure: &Structure,
    catalog: &DataItemCatalog,
    controllers: &HashMap<String, Controller>,
    triggers: &HashMap<String, TriggerDef>,
    diag: &mut Diagnostics,
) -> Option<ControlGroup> {
    if !catalog.has_location(&mapping.structure_id, DataItemRole::Input) {
        diag.warn(format!(
            "item with id '{0}' has no data item; controllers and triggers of {0} have not been imported",
            mapping.structure_id
        ));
        return None;
    }

    let ordered = ordered_controllers(
        &mapping.structure_id,
        &mapping.controller_ids,
        controllers,
        diag,
    );
    if ordered.is_empty() {
        return None;
    }

    let kind = StructureKind::of(structure);
    let mut group = ControlGroup::named(format!("Control group of {}", mapping.structure_id));

    for controller in ordered {
        let quantity = match controller.parameter.and_then(|p| controlled_quantity(kind, p)) {
            Some(q) => q,
            None => {
                diag.warn(format!(
                    "controlled parameter of controller {} is not supported on structure {}; skipped",
                    controller.id, mapping.structure_id
                ));
                continue;
            }
        };
        let element_sets: &[ElementSet] = if quantity == QuantityType::PumpCapacity {
            &[ElementSet::Structures, ElementSet::Pumps]
        } else {
            &[ElementSet::Structures]
        };
        let item = match catalog.find(
            &mapping.structure_id,
            quantity,
            element_sets,
            DataItemRole::Input,
        ) {
            Some(item) => item,
            None => {
                diag.warn(format!(
                    "parameter {:?} of structure {} is not supported by the controlled model",
                    quantity, mapping.structure_id
                ));
                continue;
            }
        };
        let output = Output {
            location: item.location.clone(),
            quantity,
        };

        // A rule already driving this output gets merged with the new
        // one later; collect its guarding conditions first.
        let merge_conditions = if group.find_output(&output).is_some() && !group.rules.is_empty() {
            group.conditions_of_rule(RuleId(group.rules.len() - 1))
        } else {
            Vec::new()
        };
        let output_id = group.add_output(output);

        let mut rule = rule_from_controller(controller, diag);
        rule.outputs.push(output_id);
        set_unique_rule_name(&mut rule, &group);
        let rule_id = group.add_rule(rule);

        if let Some(input) = controller_input(controller, catalog, diag) {
            let input_id = group.add_input(input);
            group.rule_mut(rule_id).inputs.push(input_id);
        }

        add_conditions(
            &mut group,
            kind,
            &controller.triggers,
            triggers,
            catalog,
            rule_id,
            diag,
        );

        if !merge_conditions.is_empty() {
            merge_with_same_output(&mut group, rule_id, &merge_conditions);
        }
    }

    Some(group)
}

/// Keeps controllers with the same output parameter adjacent: a new
/// controller is inserted right after the last one with the same
/// parameter, unless that one already sits within two places of the
/// end, in which case it is appended.
fn ordered_controllers<'a>(
    structure_id: &str,
    controller_ids: &[String],
    controllers: &'a HashMap<String, Controller>,
    diag: &mut Diagnostics,
) -> Vec<&'a Controller> {
    let mut out: Vec<&'a Controller> = Vec::new();
    for id in controller_ids {
        let controller = match controllers.get(id) {
            Some(c) => c,
            None => {
                diag.warn(format!(
                    "controller id {id} of structure {structure_id} has not been found"
                ));
                continue;
            }
        };
        let index = out
            .iter()
            .rposition(|c| c.parameter == controller.parameter);
        match index {
            Some(i) if i + 2 < out.len() => out.insert(i + 1, controller),
            _ => out.push(controller),
        }
    }
    out
}

// ---------------------------------------------------------------------
// rules

pub fn rule_from_controller(controller: &Controller, diag: &mut Diagnostics) -> Rule {
    let kind = match &controller.kind {
        ControllerKind::Time => RuleKind::Time {
            series: value_series(controller),
        },
        ControllerKind::Hydraulic(props) => {
            let mut function: LookupFunction = controller.lookup_table.iter().copied().collect();
            function.interpolation = controller.interpolation;
            let positive = props.positive_stream.unwrap_or(0.0);
            let negative = props.negative_stream.unwrap_or(0.0);
            if function.is_empty() && (positive != 0.0 || negative != 0.0) {
                // flow-direction control: a step table over the
                // discharge sign stands in for the direction check
                function.set(-9999.0, negative);
                function.set(0.0, positive);
                function.set(9999.0, positive);
                function.interpolation = InterpolationType::Constant;
            }
            RuleKind::Hydraulic {
                function,
                time_lag: props.time_lag,
            }
        }
        ControllerKind::Interval(props) => {
            let (dead_band, dead_band_around_setpoint, setting_min, setting_max) =
                match props.dead_band {
                    DeadBand::Percentage {
                        percentage,
                        min,
                        max,
                    } => (DeadBandKind::Percentage, percentage, min, max),
                    DeadBand::Fixed { size } => (DeadBandKind::Fixed, size, 0.0, 0.0),
                    DeadBand::None => (DeadBandKind::Fixed, 0.0, 0.0, 0.0),
                };
            RuleKind::Interval {
                setting_below: props.us_minimum,
                setting_above: props.us_maximum,
                setting_min,
                setting_max,
                max_speed: props.control_velocity,
                dead_band,
                dead_band_around_setpoint,
                interval_kind: match props.interval_kind {
                    IntervalKind::Fixed => IntervalRuleKind::Fixed,
                    IntervalKind::Variable => IntervalRuleKind::Variable,
                },
                fixed_interval: props.fixed_interval,
                setpoint_mode: if controller.constant_setpoint.is_some() {
                    SetpointMode::Constant
                } else {
                    SetpointMode::TimeSeries
                },
                default_setpoint: controller.constant_setpoint.unwrap_or(0.0),
                series: value_series(controller),
            }
        }
        ControllerKind::Pid(props) => {
            diag.warn(format!(
                "the initial value {} of PID controller {} will not be used; the defined structure dimension is the initial value",
                props.us_initial, controller.id
            ));
            let setpoint_mode = if controller.constant_setpoint.is_some() {
                SetpointMode::Constant
            } else {
                if controller.time_table.is_empty() {
                    diag.warn(format!(
                        "time table for setpoint of {} not set; rule correctly initialized",
                        controller.id
                    ));
                }
                SetpointMode::TimeSeries
            };
            RuleKind::Pid {
                kp: props.k_proportional,
                ki: props.k_integral,
                kd: props.k_differential,
                setting_min: props.us_minimum,
                setting_max: props.us_maximum,
                max_speed: props.maximum_speed,
                setpoint_mode,
                constant_setpoint: controller.constant_setpoint.unwrap_or(0.0),
                series: value_series(controller),
            }
        }
        ControllerKind::RelativeTime {
            minimum_period,
            from_value,
        } => {
            let mut function: LookupFunction = controller.lookup_table.iter().copied().collect();
            function.interpolation = controller.interpolation;
            RuleKind::RelativeTime {
                function,
                minimum_period: *minimum_period,
                from_value: *from_value,
            }
        }
    };

    Rule {
        name: controller.id.clone(),
        long_name: controller.name.clone(),
        kind,
        inputs: Default::default(),
        outputs: Default::default(),
    }
}

fn value_series(controller: &Controller) -> TimeSeries<f64> {
    let mut series: TimeSeries<f64> = controller.time_table.iter().copied().collect();
    series.interpolation = controller.interpolation;
    series.extrapolation = controller.extrapolation.clone();
    series
}

fn controller_input(
    controller: &Controller,
    catalog: &DataItemCatalog,
    diag: &mut Diagnostics,
) -> Option<Input> {
    let quantity = measured_quantity(controller.measured_parameter);
    if !controller.measurement_station_id.is_empty() {
        match catalog.find(
            &controller.measurement_station_id,
            quantity,
            &[ElementSet::Observations],
            DataItemRole::Output,
        ) {
            Some(item) => Some(Input {
                location: item.location.clone(),
                quantity,
            }),
            None => {
                diag.warn(format!(
                    "parameter {:?} of observation point {} is not supported by the controlled model",
                    controller.measured_parameter, controller.measurement_station_id
                ));
                None
            }
        }
    } else if !controller.structure_id.is_empty() {
        // head and pressure difference are measured on the structure
        match catalog.find(
            &controller.structure_id,
            quantity,
            &[ElementSet::Structures],
            DataItemRole::Output,
        ) {
            Some(item) => Some(Input {
                location: item.location.clone(),
                quantity,
            }),
            None => {
                diag.warn(format!(
                    "parameter {:?} of structure {} is not supported by the controlled model",
                    controller.measured_parameter, controller.structure_id
                ));
                None
            }
        }
    } else {
        None
    }
}

// ---------------------------------------------------------------------
// conditions

fn add_conditions(
    group: &mut ControlGroup,
    kind: StructureKind,
    slots: &[TriggerSlot],
    triggers: &HashMap<String, TriggerDef>,
    catalog: &DataItemCatalog,
    rule: RuleId,
    diag: &mut Diagnostics,
) {
    let mut last_batch: Option<Vec<ConditionId>> = None;
    let mut previous: Vec<ConditionId> = Vec::new();
    let mut new_or_row = false;

    for slot in slots {
        if !slot.active {
            continue;
        }
        let slot_id = match slot.id.as_deref() {
            Some(id) => id,
            None => continue,
        };
        let trigger = match triggers.get(slot_id) {
            Some(t) => t,
            None => {
                diag.warn(format!(
                    "adding conditions to control group: trigger with id {slot_id} can not be found"
                ));
                continue;
            }
        };

        let batch = add_trigger_conditions(group, trigger, diag);

        if let Some(input) = trigger_input(trigger, kind, catalog, diag) {
            let input_id = group.add_input(input);
            for &cid in &batch {
                if !group.condition(cid).is_time() {
                    group.condition_mut(cid).input = Some(input_id);
                }
            }
        }

        let first = match batch.first() {
            Some(&first) => first,
            None => continue,
        };

        if new_or_row {
            // a fresh OR row hangs off every dangling false-edge of the
            // finished rows
            for pid in previous.drain(..) {
                if group.condition(pid).false_outputs.is_empty() {
                    group
                        .condition_mut(pid)
                        .false_outputs
                        .push(OutputRef::Condition(first));
                }
            }
            new_or_row = false;
        } else {
            for &pid in &previous {
                if group.condition(pid).true_outputs.is_empty() {
                    group
                        .condition_mut(pid)
                        .true_outputs
                        .push(OutputRef::Condition(first));
                }
            }
        }

        previous.extend(batch.iter().copied());

        if !slot.and {
            new_or_row = true;
            rule_to_empty_true_outputs(group, &batch, rule);
            last_batch = None;
        } else {
            last_batch = Some(batch);
        }
    }

    // a trailing AND row still has to reach the rule
    if let Some(batch) = last_batch {
        rule_to_empty_true_outputs(group, &batch, rule);
    }
}

fn rule_to_empty_true_outputs(
    group: &mut ControlGroup,
    conditions: &[ConditionId],
    rule: RuleId,
) {
    for &cid in conditions {
        if group.condition(cid).true_outputs.is_empty() {
            group
                .condition_mut(cid)
                .true_outputs
                .push(OutputRef::Rule(rule));
        }
    }
}

fn merge_with_same_output(
    group: &mut ControlGroup,
    rule: RuleId,
    old_conditions: &[ConditionId],
) {
    let start = match group.start_of_rule(rule) {
        Some(start) => start,
        None => return,
    };
    for &cid in old_conditions {
        if group.condition(cid).true_outputs.is_empty() {
            group.condition_mut(cid).true_outputs.push(start);
        }
        if group.condition(cid).false_outputs.is_empty() {
            group.condition_mut(cid).false_outputs.push(start);
        }
    }
}

fn add_trigger_conditions(
    group: &mut ControlGroup,
    trigger: &TriggerDef,
    diag: &mut Diagnostics,
) -> Vec<ConditionId> {
    match trigger.trigger_type {
        TriggerType::Time => vec![insert_condition(group, time_condition(trigger))],
        TriggerType::Hydraulic => hydraulic_condition_pairs(group, trigger),
        TriggerType::Combined => {
            diag.warn(format!(
                "combined triggers are not supported; trigger {} - {} has not been imported",
                trigger.id, trigger.name
            ));
            Vec::new()
        }
    }
}

fn time_condition(trigger: &TriggerDef) -> Condition {
    let mut series: TimeSeries<bool> = trigger.rows.iter().map(|r| (r.time, r.on)).collect();
    series.interpolation = InterpolationType::Constant;
    series.extrapolation = periodic_or_constant(trigger);
    Condition::new(
        trigger.id.clone(),
        trigger.name.clone(),
        ConditionKind::Time(series),
    )
}

/// Each table row becomes a (time window, threshold check) pair: the
/// window is true from the row's time to the next row's, with the start
/// and end of the whole table bracketed in so the series covers the full
/// span.  Window edges chain through false-edges; each window's
/// true-edge leads to its threshold check.
fn hydraulic_condition_pairs(
    group: &mut ControlGroup,
    trigger: &TriggerDef,
) -> Vec<ConditionId> {
    let rows = &trigger.rows;
    let mut out = Vec::with_capacity(rows.len() * 2);
    if rows.is_empty() {
        return out;
    }
    let start = rows[0].time;
    let end = rows[rows.len() - 1].time;
    let mut previous_window = None;

    for (i, row) in rows.iter().enumerate() {
        let mut series: TimeSeries<bool> = TimeSeries::new();
        series.interpolation = InterpolationType::Constant;
        series.extrapolation = periodic_or_constant(trigger);
        if row.time != start {
            series.set(start, false);
        }
        series.set(row.time, true);
        if let Some(next) = rows.get(i + 1) {
            series.set(next.time, false);
        }
        if series.last_time().map_or(false, |last| end > last) {
            let at_start = series.first_value().copied().unwrap_or(false);
            series.set(end, at_start);
        }

        let window = Condition::new(
            trigger.id.clone(),
            trigger.name.clone(),
            ConditionKind::Time(series),
        );
        let operation = if row.greater {
            Operation::Greater
        } else {
            Operation::Less
        };
        let check_kind = match trigger.check_on {
            TriggerCheckOn::Direction => ConditionKind::Directional { operation },
            TriggerCheckOn::Value => ConditionKind::Standard {
                operation,
                value: row.value,
            },
        };
        let check = Condition::new(trigger.id.clone(), trigger.name.clone(), check_kind);

        let window_id = insert_condition(group, window);
        let check_id = insert_condition(group, check);
        group
            .condition_mut(window_id)
            .true_outputs
            .push(OutputRef::Condition(check_id));
        if let Some(previous) = previous_window {
            group
                .condition_mut(previous)
                .false_outputs
                .push(OutputRef::Condition(window_id));
        }
        previous_window = Some(window_id);

        out.push(window_id);
        out.push(check_id);
    }
    out
}

fn periodic_or_constant(trigger: &TriggerDef) -> ExtrapolationType {
    if trigger.periodic_extrapolation_period.is_empty() {
        ExtrapolationType::Constant
    } else {
        ExtrapolationType::Periodic(trigger.periodic_extrapolation_period.clone())
    }
}

fn trigger_input(
    trigger: &TriggerDef,
    kind: StructureKind,
    catalog: &DataItemCatalog,
    diag: &mut Diagnostics,
) -> Option<Input> {
    if trigger.trigger_type == TriggerType::Time {
        return None;
    }
    let quantity = trigger_quantity(kind, trigger.parameter);
    match trigger.parameter.location_kind() {
        TriggerLocationKind::ObservationPoint => {
            if trigger.measurement_station_id.is_empty() {
                return None;
            }
            match catalog.find(
                &trigger.measurement_station_id,
                quantity,
                &[ElementSet::Observations],
                DataItemRole::Output,
            ) {
                Some(item) => Some(Input {
                    location: item.location.clone(),
                    quantity,
                }),
                None => {
                    diag.warn(format!(
                        "parameter {:?} of observation point {} is not supported by the data item provider",
                        trigger.parameter, trigger.measurement_station_id
                    ));
                    None
                }
            }
        }
        TriggerLocationKind::Structure => {
            if trigger.structure_id.is_empty() || trigger.structure_id == "-1" {
                return None;
            }
            match catalog.find(
                &trigger.structure_id,
                quantity,
                &[ElementSet::Structures],
                DataItemRole::Output,
            ) {
                Some(item) => Some(Input {
                    location: item.location.clone(),
                    quantity,
                }),
                None => {
                    diag.warn(format!(
                        "parameter {:?} of structure {} is not supported by the data item provider",
                        trigger.parameter, trigger.structure_id
                    ));
                    None
                }
            }
        }
        TriggerLocationKind::RetentionArea => {
            diag.warn(format!(
                "triggers on a retention area are not supported yet; parameter {:?} ignored",
                trigger.parameter
            ));
            None
        }
    }
}

// ---------------------------------------------------------------------
// naming

fn insert_condition(group: &mut ControlGroup, mut condition: Condition) -> ConditionId {
    let base = condition.name.clone();
    let prefix = format!("{base}_");
    let count = group
        .conditions
        .iter()
        .filter(|c| c.name == base || c.name.starts_with(&prefix))
        .count();
    if count > 0 {
        condition.name = format!("{base}_{count}");
    }
    group.add_condition(condition)
}

fn set_unique_rule_name(rule: &mut Rule, group: &ControlGroup) {
    let prefix = format!("{}_", rule.name);
    let count = group
        .rules
        .iter()
        .filter(|r| r.name.starts_with(&prefix))
        .count();
    if count > 0 {
        rule.name = format!("{}_{count}", rule.name);
    }
}
