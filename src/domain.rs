// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Target domain model populated by the builders.
//!
//! Two halves: branch structures (weirs, pumps, bridges, culverts,
//! grouped under a composite per location) and real-time control groups
//! (condition/rule graphs).  Conditions and rules live in arenas inside
//! their [`ControlGroup`] and point at each other through ids, so the
//! AND/OR graph needs no reference cycles.

use chrono::NaiveDateTime;
use smallvec::SmallVec;

pub use crate::records::controller::{ExtrapolationType, InterpolationType};
pub use crate::records::structure_def::{BridgeType, FlowDirection};

// ---------------------------------------------------------------------
// quantities and the host data-item catalog

/// Quantities the controlled model exposes per location.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum QuantityType {
    WaterLevel,
    Discharge,
    Head,
    Velocity,
    PressureDifference,
    CrestLevel,
    CrestWidth,
    GateLowerEdgeLevel,
    ValveOpening,
    PumpCapacity,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementSet {
    Structures,
    Pumps,
    Observations,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataItemRole {
    Input,
    Output,
}

/// One externally-available data item of the host model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataItem {
    pub location: String,
    pub quantity: QuantityType,
    pub element_set: ElementSet,
    pub role: DataItemRole,
}

/// The set of data items the host model exposes.  The control-group
/// builder searches it; anything it cannot find is dropped with a
/// diagnostic rather than guessed at.
#[derive(Clone, Debug, Default)]
pub struct DataItemCatalog {
    items: Vec<DataItem>,
}

impl DataItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: DataItem) {
        self.items.push(item);
    }

    /// Case-insensitive location match, like the host model's lookup.
    pub fn find(
        &self,
        location: &str,
        quantity: QuantityType,
        element_sets: &[ElementSet],
        role: DataItemRole,
    ) -> Option<&DataItem> {
        self.items.iter().find(|item| {
            item.role == role
                && item.quantity == quantity
                && element_sets.contains(&item.element_set)
                && item.location.eq_ignore_ascii_case(location)
        })
    }

    pub fn has_location(&self, location: &str, role: DataItemRole) -> bool {
        self.items
            .iter()
            .any(|item| item.role == role && item.location.eq_ignore_ascii_case(location))
    }
}

// ---------------------------------------------------------------------
// time series and lookup functions

/// A `(time, value)` series with interpolation/extrapolation settings.
/// Setting an existing timestamp replaces its value; times stay sorted.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries<T> {
    entries: Vec<(NaiveDateTime, T)>,
    pub interpolation: InterpolationType,
    pub extrapolation: ExtrapolationType,
}

impl<T: Clone> TimeSeries<T> {
    pub fn new() -> Self {
        TimeSeries {
            entries: Vec::new(),
            interpolation: InterpolationType::Linear,
            extrapolation: ExtrapolationType::Constant,
        }
    }

    pub fn set(&mut self, time: NaiveDateTime, value: T) {
        match self.entries.binary_search_by_key(&time, |e| e.0) {
            Ok(i) => self.entries[i].1 = value,
            Err(i) => self.entries.insert(i, (time, value)),
        }
    }

    pub fn get(&self, time: NaiveDateTime) -> Option<&T> {
        self.entries
            .binary_search_by_key(&time, |e| e.0)
            .ok()
            .map(|i| &self.entries[i].1)
    }

    pub fn first_time(&self) -> Option<NaiveDateTime> {
        self.entries.first().map(|e| e.0)
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.entries.last().map(|e| e.0)
    }

    pub fn first_value(&self) -> Option<&T> {
        self.entries.first().map(|e| &e.1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(NaiveDateTime, T)> {
        self.entries.iter()
    }
}

impl<T: Clone> Default for TimeSeries<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FromIterator<(NaiveDateTime, T)> for TimeSeries<T> {
    fn from_iter<I: IntoIterator<Item = (NaiveDateTime, T)>>(iter: I) -> Self {
        let mut series = TimeSeries::new();
        for (time, value) in iter {
            series.set(time, value);
        }
        series
    }
}

/// An `x → y` lookup with its interpolation mode.  Setting an existing
/// x replaces its y; points stay sorted on x.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LookupFunction {
    points: Vec<(f64, f64)>,
    pub interpolation: InterpolationType,
}

impl LookupFunction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, x: f64, y: f64) {
        match self.points.binary_search_by(|p| p.0.total_cmp(&x)) {
            Ok(i) => self.points[i].1 = y,
            Err(i) => self.points.insert(i, (x, y)),
        }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<(f64, f64)> for LookupFunction {
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        let mut function = LookupFunction::new();
        for (x, y) in iter {
            function.set(x, y);
        }
        function
    }
}

// ---------------------------------------------------------------------
// branch structures

#[derive(Clone, Debug, PartialEq)]
pub enum WeirFormula {
    Simple {
        discharge_coefficient: f64,
        lateral_contraction: f64,
    },
    River {
        correction_coefficient: f64,
        submergence_limit: f64,
    },
    /// Y/Z profile weir; the crest is the lowest profile z.
    FreeForm {
        profile: Vec<(f64, f64)>,
        discharge_coefficient: f64,
    },
    Gated {
        contraction_coefficient: f64,
        gate_opening: f64,
        lower_edge_level: f64,
        max_flow_positive: Option<f64>,
        max_flow_negative: Option<f64>,
    },
    GeneralStructure {
        width_structure_centre: f64,
        bed_level_structure_centre: f64,
        gate_opening: f64,
        positive_free_gate_flow: f64,
        negative_free_gate_flow: f64,
        extra_resistance: Option<f64>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Weir {
    pub name: String,
    pub long_name: String,
    pub crest_level: f64,
    pub crest_width: f64,
    pub use_crest_level_time_series: bool,
    pub crest_level_time_series: TimeSeries<f64>,
    pub flow_direction: FlowDirection,
    pub formula: WeirFormula,
    /// Lateral placement inside the parent profile.
    pub offset_y: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pump {
    pub name: String,
    pub long_name: String,
    /// Positive pumps from begin to end node.
    pub direction: i32,
    pub capacity: f64,
    pub start_suction: f64,
    pub stop_suction: f64,
    pub start_delivery: f64,
    pub stop_delivery: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BridgeGeometryKind {
    Rectangle,
    Tabulated,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bridge {
    pub name: String,
    pub long_name: String,
    pub kind: BridgeGeometryKind,
    pub width: f64,
    pub height: f64,
    /// Vertical shift of the profile, from the bed level when given.
    pub shift: f64,
    pub length: f64,
    pub inlet_loss: f64,
    pub outlet_loss: f64,
    pub is_pillar: bool,
    pub pillar_width: f64,
    pub shape_factor: f64,
    /// Mirrored half-width profile around x = 0.
    pub profile: Vec<(f64, f64)>,
    /// Four-point flood polygon (two bottom, two top points).
    pub flood_profile: Vec<(f64, f64)>,
    pub friction_type: i32,
    pub friction: f64,
    pub ground_layer_enabled: bool,
    pub ground_layer_roughness: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CulvertGeometryKind {
    Round,
    Egg,
    Tabulated,
    Rectangle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Culvert {
    pub name: String,
    pub long_name: String,
    pub geometry: CulvertGeometryKind,
    pub width: f64,
    pub height: f64,
    pub diameter: f64,
    pub inlet_level: f64,
    pub outlet_level: f64,
    pub length: f64,
    pub inlet_loss: f64,
    pub outlet_loss: f64,
    pub bend_loss: f64,
    pub has_valve: bool,
    pub valve_opening: f64,
    /// Relative opening → loss coefficient.
    pub valve_loss: LookupFunction,
    pub friction_type: i32,
    pub friction: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Structure {
    Weir(Weir),
    Pump(Pump),
    Bridge(Bridge),
    Culvert(Culvert),
}

impl Structure {
    pub fn name(&self) -> &str {
        match self {
            Structure::Weir(s) => &s.name,
            Structure::Pump(s) => &s.name,
            Structure::Bridge(s) => &s.name,
            Structure::Culvert(s) => &s.name,
        }
    }

    pub fn set_name(&mut self, name: String) {
        match self {
            Structure::Weir(s) => s.name = name,
            Structure::Pump(s) => s.name = name,
            Structure::Bridge(s) => s.name = name,
            Structure::Culvert(s) => s.name = name,
        }
    }

    pub fn set_long_name(&mut self, long_name: String) {
        match self {
            Structure::Weir(s) => s.long_name = long_name,
            Structure::Pump(s) => s.long_name = long_name,
            Structure::Bridge(s) => s.long_name = long_name,
            Structure::Culvert(s) => s.long_name = long_name,
        }
    }

    pub fn is_pump(&self) -> bool {
        matches!(self, Structure::Pump(_))
    }
}

/// All structures placed at one location, named after the location id.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeStructure {
    pub name: String,
    pub long_name: String,
    pub branch_id: String,
    pub chainage: f64,
    pub structures: Vec<Structure>,
}

// ---------------------------------------------------------------------
// control groups

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConditionId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RuleId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct InputId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputId(pub usize);

/// Target of a condition's true or false edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputRef {
    Condition(ConditionId),
    Rule(RuleId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Greater,
    Less,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConditionKind {
    /// True/false by clock time.
    Time(TimeSeries<bool>),
    /// Compares the input value against a threshold.
    Standard { operation: Operation, value: f64 },
    /// Compares the input's flow direction only; no threshold.
    Directional { operation: Operation },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub name: String,
    pub long_name: String,
    pub kind: ConditionKind,
    pub input: Option<InputId>,
    pub true_outputs: SmallVec<[OutputRef; 2]>,
    pub false_outputs: SmallVec<[OutputRef; 2]>,
}

impl Condition {
    pub fn new(name: String, long_name: String, kind: ConditionKind) -> Self {
        Condition {
            name,
            long_name,
            kind,
            input: None,
            true_outputs: SmallVec::new(),
            false_outputs: SmallVec::new(),
        }
    }

    pub fn is_time(&self) -> bool {
        matches!(self.kind, ConditionKind::Time(_))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeadBandKind {
    Fixed,
    Percentage,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntervalRuleKind {
    Fixed,
    Variable,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SetpointMode {
    Constant,
    TimeSeries,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RuleKind {
    Time {
        series: TimeSeries<f64>,
    },
    Hydraulic {
        function: LookupFunction,
        time_lag: i32,
    },
    Interval {
        setting_below: f64,
        setting_above: f64,
        setting_min: f64,
        setting_max: f64,
        max_speed: f64,
        dead_band: DeadBandKind,
        dead_band_around_setpoint: f64,
        interval_kind: IntervalRuleKind,
        fixed_interval: f64,
        setpoint_mode: SetpointMode,
        default_setpoint: f64,
        series: TimeSeries<f64>,
    },
    Pid {
        kp: f64,
        ki: f64,
        kd: f64,
        setting_min: f64,
        setting_max: f64,
        max_speed: f64,
        setpoint_mode: SetpointMode,
        constant_setpoint: f64,
        series: TimeSeries<f64>,
    },
    RelativeTime {
        function: LookupFunction,
        minimum_period: i32,
        from_value: bool,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    pub name: String,
    pub long_name: String,
    pub kind: RuleKind,
    pub inputs: SmallVec<[InputId; 1]>,
    pub outputs: SmallVec<[OutputId; 1]>,
}

/// A control-group input, bound to one host data item.
#[derive(Clone, Debug, PartialEq)]
pub struct Input {
    pub location: String,
    pub quantity: QuantityType,
}

impl Input {
    /// Name used for input deduplication within a group.
    pub fn binding_name(&self) -> String {
        format!("{}_{:?}", self.location, self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Output {
    pub location: String,
    pub quantity: QuantityType,
}

impl Output {
    pub fn binding_name(&self) -> String {
        format!("{}_{:?}", self.location, self.quantity)
    }
}

/// The condition/rule network controlling one structure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControlGroup {
    pub name: String,
    pub conditions: Vec<Condition>,
    pub rules: Vec<Rule>,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl ControlGroup {
    pub fn named(name: String) -> Self {
        ControlGroup {
            name,
            ..Default::default()
        }
    }

    pub fn add_condition(&mut self, condition: Condition) -> ConditionId {
        self.conditions.push(condition);
        ConditionId(self.conditions.len() - 1)
    }

    pub fn add_rule(&mut self, rule: Rule) -> RuleId {
        self.rules.push(rule);
        RuleId(self.rules.len() - 1)
    }

    /// Adds the input unless an equal binding exists, returning the
    /// existing id in that case.
    pub fn add_input(&mut self, input: Input) -> InputId {
        let name = input.binding_name();
        for (i, existing) in self.inputs.iter().enumerate() {
            if existing.binding_name() == name {
                return InputId(i);
            }
        }
        self.inputs.push(input);
        InputId(self.inputs.len() - 1)
    }

    pub fn add_output(&mut self, output: Output) -> OutputId {
        let name = output.binding_name();
        for (i, existing) in self.outputs.iter().enumerate() {
            if existing.binding_name() == name {
                return OutputId(i);
            }
        }
        self.outputs.push(output);
        OutputId(self.outputs.len() - 1)
    }

    pub fn condition(&self, id: ConditionId) -> &Condition {
        &self.conditions[id.0]
    }

    pub fn condition_mut(&mut self, id: ConditionId) -> &mut Condition {
        &mut self.conditions[id.0]
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    pub fn rule_mut(&mut self, id: RuleId) -> &mut Rule {
        &mut self.rules[id.0]
    }

    pub fn find_output(&self, output: &Output) -> Option<OutputId> {
        let name = output.binding_name();
        self.outputs
            .iter()
            .position(|o| o.binding_name() == name)
            .map(OutputId)
    }

    /// Condition ids on any path leading into `rule`.
    pub fn conditions_of_rule(&self, rule: RuleId) -> Vec<ConditionId> {
        let mut hit = vec![false; self.conditions.len()];
        // conditions pointing directly at the rule
        for (i, condition) in self.conditions.iter().enumerate() {
            let target = OutputRef::Rule(rule);
            if condition.true_outputs.contains(&target) || condition.false_outputs.contains(&target)
            {
                hit[i] = true;
            }
        }
        // walk edges backwards until stable
        loop {
            let mut changed = false;
            for i in 0..self.conditions.len() {
                if hit[i] {
                    continue;
                }
                let points_at_hit = self.conditions[i]
                    .true_outputs
                    .iter()
                    .chain(self.conditions[i].false_outputs.iter())
                    .any(|out| matches!(out, OutputRef::Condition(c) if hit[c.0]));
                if points_at_hit {
                    hit[i] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        hit.iter()
            .enumerate()
            .filter_map(|(i, &h)| if h { Some(ConditionId(i)) } else { None })
            .collect()
    }

    /// The first condition of the chain guarding `rule`, or the rule
    /// itself when it is unguarded.
    pub fn start_of_rule(&self, rule: RuleId) -> Option<OutputRef> {
        let guards = self.conditions_of_rule(rule);
        if guards.is_empty() {
            return Some(OutputRef::Rule(rule));
        }
        // the start is a guard no other guard points at
        let mut pointed_at = vec![false; self.conditions.len()];
        for id in &guards {
            for out in self
                .condition(*id)
                .true_outputs
                .iter()
                .chain(self.condition(*id).false_outputs.iter())
            {
                if let OutputRef::Condition(c) = out {
                    pointed_at[c.0] = true;
                }
            }
        }
        guards
            .iter()
            .find(|id| !pointed_at[id.0])
            .copied()
            .map(OutputRef::Condition)
    }
}
