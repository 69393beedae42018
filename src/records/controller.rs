// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! `CNTL` controller definition records (CONTROL.DEF).
//!
//! Shared header fields:
//!
//! - `id`/`nm` — identifier and display name,
//! - `ct` — controller type: 0 time, 1 hydraulic, 2 interval, 3 PID,
//!   4 relative time, 5 relative from value,
//! - `ca` — controlled parameter: 0 crest level, 1 crest width, 2 gate
//!   height, 3 pump capacity, 5 bed level,
//! - `ac` — active flag, `cf` — update frequency,
//! - `ta`/`gi`/`ao` — four trigger slots: active flags, trigger ids
//!   (`'-1'` when empty) and and/or relations.  The first `ao` value is
//!   a placeholder and ignored; the fourth slot is always AND.
//!
//! The per-type property block follows the header; see the field notes
//! on each kind.  Controller ids are prefixed `CTR_` and trigger ids
//! `TRG_` so they cannot collide with structure ids.

use chrono::NaiveDateTime;
use smallvec::SmallVec;

use crate::common::Diagnostics;
use crate::tokenizer::{RawRecord, Table};

use super::network::CONTROLLER_ID_PREFIX;
use super::{PdinBlock, RecordView};

pub const TAG: &str = "CNTL";

/// Prefix applied to trigger ids everywhere they are read.
pub const TRIGGER_ID_PREFIX: &str = "TRG_";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ControlledParameter {
    CrestLevel,
    CrestWidth,
    GateHeight,
    PumpCapacity,
    BedLevel,
}

impl ControlledParameter {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ControlledParameter::CrestLevel),
            1 => Some(ControlledParameter::CrestWidth),
            2 => Some(ControlledParameter::GateHeight),
            3 => Some(ControlledParameter::PumpCapacity),
            5 => Some(ControlledParameter::BedLevel),
            _ => None,
        }
    }
}

/// `cp` codes on the measurement location.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MeasuredParameter {
    #[default]
    WaterLevel,
    Discharge,
    HeadDifference,
    Velocity,
    FlowDirection,
    PressureDifference,
}

impl MeasuredParameter {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => MeasuredParameter::Discharge,
            2 => MeasuredParameter::HeadDifference,
            3 => MeasuredParameter::Velocity,
            4 => MeasuredParameter::FlowDirection,
            5 => MeasuredParameter::PressureDifference,
            _ => MeasuredParameter::WaterLevel,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InterpolationType {
    #[default]
    Linear,
    Constant,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ExtrapolationType {
    #[default]
    Constant,
    /// Repeats the table with the given `ddd;hh:mm:ss` period.
    Periodic(String),
}

/// One of the four trigger slots in a controller header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerSlot {
    /// `TRG_`-prefixed id; `None` for an empty (`'-1'`) slot.
    pub id: Option<String>,
    pub active: bool,
    /// AND relation with the preceding slot; OR when false.
    pub and: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HydraulicProps {
    /// `mp`: time lag between measured and controlled parameter.
    pub time_lag: i32,
    /// `ps`/`ns`: settings for flow-direction control (`cp 4`).
    pub positive_stream: Option<f64>,
    pub negative_stream: Option<f64>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum IntervalKind {
    #[default]
    Fixed,
    Variable,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum DeadBand {
    #[default]
    None,
    Fixed {
        size: f64,
    },
    /// Percentage of the discharge, clamped between min and max.
    Percentage {
        percentage: f64,
        min: f64,
        max: f64,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntervalProps {
    pub us_minimum: f64,
    pub us_maximum: f64,
    pub interval_kind: IntervalKind,
    pub fixed_interval: f64,
    pub control_velocity: f64,
    pub dead_band: DeadBand,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PidProps {
    pub us_minimum: f64,
    pub us_maximum: f64,
    pub us_initial: f64,
    pub k_proportional: f64,
    pub k_integral: f64,
    pub k_differential: f64,
    pub maximum_speed: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ControllerKind {
    Time,
    Hydraulic(HydraulicProps),
    Interval(IntervalProps),
    Pid(PidProps),
    RelativeTime {
        /// `mp`: minimum period between two active periods.
        minimum_period: i32,
        /// ct 5: the table is relative to the value at activation.
        from_value: bool,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Controller {
    pub id: String,
    pub name: String,
    pub kind: ControllerKind,
    pub parameter: Option<ControlledParameter>,
    pub is_active: bool,
    pub triggers: SmallVec<[TriggerSlot; 4]>,
    /// Measurement station id, or a generated branch/chainage id.
    pub measurement_station_id: String,
    pub measured_parameter: MeasuredParameter,
    /// `si`: structure measured for head/pressure difference.
    pub structure_id: String,
    pub interpolation: InterpolationType,
    pub extrapolation: ExtrapolationType,
    /// `sp tc 0`/setpoint tables for interval and PID controllers,
    /// `ti tv` for time controllers.
    pub time_table: Vec<(NaiveDateTime, f64)>,
    /// `hc ht` for hydraulic, `ti vv` (relative seconds) for relative.
    pub lookup_table: Vec<(f64, f64)>,
    /// Constant setpoint when `sp tc 0`; table mode otherwise.
    pub constant_setpoint: Option<f64>,
    /// `mc`: maximum change velocity of the controlled parameter.
    pub max_change_velocity: Option<f64>,
}

impl Controller {
    pub fn active_triggers(&self) -> impl Iterator<Item = &TriggerSlot> {
        self.triggers.iter().filter(|t| t.active && t.id.is_some())
    }
}

/// Stand-in id for a measurement on a branch at a chainage, used when
/// the record carries `cb`/`cl` instead of a station id.
pub fn measurement_location_id(branch_id: &str, chainage: f64) -> String {
    format!("{branch_id}_{chainage}")
}

pub fn map_record(rec: &RawRecord, diag: &mut Diagnostics) -> Option<Controller> {
    if rec.tag != TAG {
        return None;
    }
    let view = RecordView::new(rec);
    let id = match view.id() {
        Some(id) => format!("{CONTROLLER_ID_PREFIX}{id}"),
        None => {
            diag.warn("controller definition without id; skipped".to_owned());
            return None;
        }
    };
    let ct = view.i32_after("ct").unwrap_or(-1);

    let mut controller = Controller {
        id,
        name: view.name(),
        kind: ControllerKind::Time,
        parameter: ControlledParameter::from_code(view.i32_after("ca").unwrap_or(-1)),
        is_active: view.bool01_after("ac").unwrap_or(true),
        triggers: trigger_slots(&view),
        measurement_station_id: measurement_station(&view),
        measured_parameter: MeasuredParameter::from_code(view.i32_after("cp").unwrap_or(0)),
        structure_id: view
            .quoted_after("si")
            .map(|s| s.replace("##", "~~"))
            .unwrap_or_default(),
        interpolation: InterpolationType::default(),
        extrapolation: ExtrapolationType::default(),
        time_table: Vec::new(),
        lookup_table: Vec::new(),
        constant_setpoint: None,
        max_change_velocity: view.f64_after("mc"),
    };

    apply_interpolation(&mut controller, &view);

    controller.kind = match ct {
        0 => {
            controller.time_table = select_time_table(&view, false);
            clear_input_location(&mut controller);
            ControllerKind::Time
        }
        1 => {
            controller.lookup_table = select_lookup_table(&view);
            ControllerKind::Hydraulic(HydraulicProps {
                time_lag: view.i32_after("mp").unwrap_or(0),
                positive_stream: view.f64_after("ps"),
                negative_stream: view.f64_after("ns"),
            })
        }
        2 => {
            read_setpoint(&mut controller, &view, true);
            ControllerKind::Interval(IntervalProps {
                us_minimum: view.f64_after("ui").unwrap_or(0.0),
                us_maximum: view.f64_after("ua").unwrap_or(0.0),
                interval_kind: match view.i32_after("cn").unwrap_or(0) {
                    1 => IntervalKind::Variable,
                    _ => IntervalKind::Fixed,
                },
                fixed_interval: view.f64_after("du").unwrap_or(0.0),
                control_velocity: view.f64_after("cv").unwrap_or(0.0),
                dead_band: match view.i32_after("dt") {
                    Some(1) => DeadBand::Percentage {
                        percentage: view.f64_after("pe").unwrap_or(0.0),
                        min: view.f64_after("di").unwrap_or(0.0),
                        max: view.f64_after("da").unwrap_or(0.0),
                    },
                    Some(_) => DeadBand::Fixed {
                        size: view.f64_after("d_").unwrap_or(0.0),
                    },
                    None => DeadBand::None,
                },
            })
        }
        3 => {
            read_setpoint(&mut controller, &view, false);
            ControllerKind::Pid(PidProps {
                us_minimum: view.f64_after("ui").unwrap_or(0.0),
                us_maximum: view.f64_after("ua").unwrap_or(0.0),
                us_initial: view.f64_after("u0").unwrap_or(0.0),
                k_proportional: view.f64_after("pf").unwrap_or(0.0),
                k_integral: view.f64_after("if").unwrap_or(0.0),
                k_differential: view.f64_after("df").unwrap_or(0.0),
                maximum_speed: view.f64_after("va").unwrap_or(0.0),
            })
        }
        4 | 5 => {
            controller.lookup_table = select_lookup_table(&view);
            if ct == 4 {
                clear_input_location(&mut controller);
            }
            ControllerKind::RelativeTime {
                minimum_period: view.i32_after("mp").unwrap_or(0),
                from_value: ct == 5,
            }
        }
        other => {
            diag.warn(format!(
                "controller {} has unsupported type code {other}; skipped",
                controller.id
            ));
            return None;
        }
    };

    Some(controller)
}

fn trigger_slots(view: &RecordView) -> SmallVec<[TriggerSlot; 4]> {
    let active = view.words_after("ta", 4).unwrap_or_default();
    let ids = view.quoted_seq_after("gi", 4).unwrap_or_default();
    // Five `ao` values on file; the first is a placeholder.
    let andor = view.words_after("ao", 4).unwrap_or_default();

    (0..4)
        .map(|i| {
            let id = match ids.get(i) {
                Some(&raw) if raw != "-1" && !raw.is_empty() => {
                    Some(format!("{TRIGGER_ID_PREFIX}{raw}"))
                }
                _ => None,
            };
            TriggerSlot {
                active: id.is_some() && active.get(i).copied() == Some("1"),
                id,
                // slot 3 has no relation of its own
                and: i == 3 || andor.get(i + 1).copied() == Some("1"),
            }
        })
        .collect()
}

fn measurement_station(view: &RecordView) -> String {
    if let Some(ml) = view.quoted_after("ml") {
        return ml.to_owned();
    }
    match (view.quoted_after("cb"), view.f64_after("cl")) {
        (Some(branch), Some(chainage)) => measurement_location_id(branch, chainage),
        _ => String::new(),
    }
}

/// Stale input locations survive a controller-type switch on file; time
/// and plain relative controllers have no input.
fn clear_input_location(controller: &mut Controller) {
    controller.measurement_station_id.clear();
    controller.structure_id.clear();
}

fn apply_interpolation(controller: &mut Controller, view: &RecordView) {
    if let Some(bl) = view.i32_after("bl") {
        controller.interpolation = if bl == 1 {
            InterpolationType::Linear
        } else {
            InterpolationType::Constant
        };
    }
    if let Some(pdin) = view.pdin() {
        apply_pdin(controller, &pdin);
    }
}

fn apply_pdin(controller: &mut Controller, pdin: &PdinBlock) {
    controller.interpolation = if pdin.block_interpolation {
        InterpolationType::Constant
    } else {
        InterpolationType::Linear
    };
    controller.extrapolation = match pdin.periodic_period() {
        Some(period) => ExtrapolationType::Periodic(period.to_owned()),
        None => ExtrapolationType::Constant,
    };
}

/// `sp tc 0 <value>` is a constant setpoint; `sp tc 1` a time table.
fn read_setpoint(controller: &mut Controller, view: &RecordView, interval: bool) {
    if let Some(start) = view.after_seq(&["sp", "tc"]) {
        if view.str_at(start) == Some("0") {
            if let Some(value) = view.str_at(start + 1).and_then(|s| s.parse().ok()) {
                controller.constant_setpoint = Some(value);
                return;
            }
        }
    }
    controller.time_table = select_time_table(view, interval);
}

/// After a type switch an unused leftover table can precede the live
/// one; interval controllers and numeric lookups take the second table
/// in that case, time tables the first.
fn select_time_table(view: &RecordView, prefer_second: bool) -> Vec<(NaiveDateTime, f64)> {
    let tables = all_tables(view);
    let table = if tables.len() > 1 && prefer_second {
        tables[1]
    } else {
        match tables.first() {
            Some(t) => *t,
            None => return Vec::new(),
        }
    };
    super::time_table(table)
}

fn select_lookup_table(view: &RecordView) -> Vec<(f64, f64)> {
    let tables = all_tables(view);
    let table = match (tables.first(), tables.get(1)) {
        (_, Some(second)) => *second,
        (Some(first), None) => *first,
        (None, _) => return Vec::new(),
    };
    super::lookup_table(table)
}

fn all_tables<'a>(view: &RecordView<'a>) -> Vec<&'a Table> {
    view.tables()
}

/// All controllers in `text`, in file order.
pub fn read_all(text: &str, diag: &mut Diagnostics) -> Vec<Controller> {
    crate::tokenizer::scan_records(text, diag)
        .iter()
        .filter_map(|rec| map_record(rec, diag))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::parse_datetime;
    use crate::tokenizer::scan_records;

    fn map_first(text: &str) -> Option<Controller> {
        let mut diag = Diagnostics::new();
        let recs = scan_records(text, &mut diag);
        map_record(&recs[0], &mut diag)
    }

    #[test]
    fn test_time_controller() {
        let text = "CNTL id '1' nm 'tc' ct 0 ca 0 ac 1 cf 1 mc 0.5 ti tv PDIN 1 0 '' pdin TBLE\n'1991/01/01;00:00:00' 1.1 <\n'1991/01/05;00:00:00' 1.4 <\ntble cntl\n";
        let c = map_first(text).unwrap();
        assert_eq!("CTR_1", c.id);
        assert_eq!(ControllerKind::Time, c.kind);
        assert_eq!(Some(ControlledParameter::CrestLevel), c.parameter);
        assert_eq!(InterpolationType::Constant, c.interpolation);
        assert_eq!(Some(0.5), c.max_change_velocity);
        assert_eq!(2, c.time_table.len());
        assert_eq!(
            parse_datetime("1991/01/05;00:00:00").unwrap(),
            c.time_table[1].0
        );
    }

    #[test]
    fn test_hydraulic_controller() {
        let text = "CNTL id '2' nm 'hc' ct 1 ca 2 ac 1 cf 10 mp 0 ml 'meas1' cp 1 hc ht TBLE\n0.5 1 <\n2 3 <\ntble cntl\n";
        let c = map_first(text).unwrap();
        match c.kind {
            ControllerKind::Hydraulic(ref p) => assert_eq!(0, p.time_lag),
            ref other => panic!("expected hydraulic, got {other:?}"),
        }
        assert_eq!("meas1", c.measurement_station_id);
        assert_eq!(MeasuredParameter::Discharge, c.measured_parameter);
        assert_eq!(vec![(0.5, 1.0), (2.0, 3.0)], c.lookup_table);
    }

    #[test]
    fn test_hydraulic_flow_direction_streams() {
        let text = "CNTL id '2' ct 1 ca 2 ac 1 cp 4 ps 1.1 ns 0.1 cntl\n";
        let c = map_first(text).unwrap();
        assert_eq!(MeasuredParameter::FlowDirection, c.measured_parameter);
        match c.kind {
            ControllerKind::Hydraulic(ref p) => {
                assert_eq!(Some(1.1), p.positive_stream);
                assert_eq!(Some(0.1), p.negative_stream);
            }
            ref other => panic!("expected hydraulic, got {other:?}"),
        }
    }

    #[test]
    fn test_interval_constant_setpoint() {
        let text = "CNTL id '3' nm 'ic' ct 2 ca 0 ac 1 cb 'b1' cl 500 cp 0 ui 0.1 ua 2 cn 0 du 0.25 dt 0 d_ 0.05 sp tc 0 1.5 cntl\n";
        let c = map_first(text).unwrap();
        assert_eq!(Some(1.5), c.constant_setpoint);
        assert_eq!("b1_500", c.measurement_station_id);
        match c.kind {
            ControllerKind::Interval(ref p) => {
                assert_eq!(IntervalKind::Fixed, p.interval_kind);
                assert_eq!(DeadBand::Fixed { size: 0.05 }, p.dead_band);
                assert_eq!(0.25, p.fixed_interval);
            }
            ref other => panic!("expected interval, got {other:?}"),
        }
    }

    #[test]
    fn test_pid_table_setpoint() {
        let text = "CNTL id '4' nm 'pid' ct 3 ca 2 ac 1 ml 'm2' cp 0 ui 0 ua 5 u0 1 pf 0.2 if 0.1 df 0 va 0.01 sp tc 1 TBLE\n'1991/01/01;00:00:00' 1 <\ntble cntl\n";
        let c = map_first(text).unwrap();
        assert_eq!(None, c.constant_setpoint);
        assert_eq!(1, c.time_table.len());
        match c.kind {
            ControllerKind::Pid(ref p) => {
                assert_eq!(0.2, p.k_proportional);
                assert_eq!(0.1, p.k_integral);
                assert_eq!(0.01, p.maximum_speed);
            }
            ref other => panic!("expected pid, got {other:?}"),
        }
    }

    #[test]
    fn test_trigger_slots_first_andor_ignored() {
        let text = "CNTL id '5' ct 0 ca 0 ac 1 ta 1 1 0 0 gi '10' '11' '-1' '-1' ao 1 1 0 0 ti tv TBLE\n'1991/01/01;00:00:00' 0 <\ntble cntl\n";
        let c = map_first(text).unwrap();
        let slots: Vec<_> = c.triggers.iter().collect();
        assert_eq!(4, slots.len());
        assert_eq!(Some("TRG_10"), slots[0].id.as_deref());
        assert!(slots[0].active && slots[0].and);
        // second slot takes the third ao value
        assert!(slots[1].active && !slots[1].and);
        assert_eq!(None, slots[2].id);
        assert!(!slots[2].active);
        assert_eq!(2, c.active_triggers().count());
    }

    #[test]
    fn test_time_controller_clears_stale_input() {
        let text = "CNTL id '6' ct 0 ca 0 ac 1 ml 'stale' si 'also stale' ti tv TBLE\n'1991/01/01;00:00:00' 0 <\ntble cntl\n";
        let c = map_first(text).unwrap();
        assert!(c.measurement_station_id.is_empty());
        assert!(c.structure_id.is_empty());
    }

    #[test]
    fn test_relative_from_value_keeps_table() {
        let text = "CNTL id '7' ct 5 ca 0 ac 1 mc 0.1 mp 60 ti vv TBLE\n0 1 <\n3600 2 <\ntble cntl\n";
        let c = map_first(text).unwrap();
        match c.kind {
            ControllerKind::RelativeTime {
                minimum_period,
                from_value,
            } => {
                assert_eq!(60, minimum_period);
                assert!(from_value);
            }
            ref other => panic!("expected relative, got {other:?}"),
        }
        assert_eq!(vec![(0.0, 1.0), (3600.0, 2.0)], c.lookup_table);
    }

    #[test]
    fn test_structure_id_hash_munging() {
        let text = "CNTL id '8' ct 1 ca 2 ac 1 si '##7' cp 2 cntl\n";
        let c = map_first(text).unwrap();
        assert_eq!("~~7", c.structure_id);
    }
}
