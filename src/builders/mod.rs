// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Builders turning resolved records into domain structures.
//!
//! One builder per structure family plus the control-group builder.
//! Branch-structure builders share the contract
//! `build(definition, ...) -> Vec<Structure>`: unsupported definitions
//! produce an empty vec, never an error.

pub mod bridge;
pub mod control_group;
pub mod culvert;
pub mod pump;
pub mod weir;

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::domain::{QuantityType, Structure};
use crate::records::controller::{ControlledParameter, MeasuredParameter};
use crate::records::trigger::TriggerParameter;

/// Structure family, used to key the quantity mapping.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StructureKind {
    Weir,
    Pump,
    Bridge,
    Culvert,
}

impl StructureKind {
    pub fn of(structure: &Structure) -> Self {
        match structure {
            Structure::Weir(_) => StructureKind::Weir,
            Structure::Pump(_) => StructureKind::Pump,
            Structure::Bridge(_) => StructureKind::Bridge,
            Structure::Culvert(_) => StructureKind::Culvert,
        }
    }
}

lazy_static! {
    /// (structure kind, controlled parameter) → model quantity.  The
    /// gate height of a culvert maps onto its valve opening; on any
    /// other structure it is the gate's lower edge level.
    static ref CONTROLLED_QUANTITY: HashMap<(StructureKind, ControlledParameter), QuantityType> = {
        use ControlledParameter::*;
        use StructureKind::*;
        let mut m = HashMap::new();
        for kind in [Weir, Pump, Bridge, Culvert] {
            m.insert((kind, CrestLevel), QuantityType::CrestLevel);
            m.insert((kind, CrestWidth), QuantityType::CrestWidth);
            m.insert((kind, PumpCapacity), QuantityType::PumpCapacity);
            m.insert(
                (kind, GateHeight),
                if kind == Culvert {
                    QuantityType::ValveOpening
                } else {
                    QuantityType::GateLowerEdgeLevel
                },
            );
        }
        m
    };
}

/// Quantity written by a controller on the given structure; `None` for
/// parameters the model cannot drive (2D bed level).
pub fn controlled_quantity(
    kind: StructureKind,
    parameter: ControlledParameter,
) -> Option<QuantityType> {
    CONTROLLED_QUANTITY.get(&(kind, parameter)).copied()
}

/// Quantity a trigger watches on the given structure.
pub fn trigger_quantity(kind: StructureKind, parameter: TriggerParameter) -> QuantityType {
    match parameter {
        TriggerParameter::WaterLevelBranch | TriggerParameter::WaterLevelRetention => {
            QuantityType::WaterLevel
        }
        TriggerParameter::HeadDifference => QuantityType::Head,
        TriggerParameter::Discharge => QuantityType::Discharge,
        TriggerParameter::GateHeight => {
            if kind == StructureKind::Culvert {
                QuantityType::ValveOpening
            } else {
                QuantityType::GateLowerEdgeLevel
            }
        }
        TriggerParameter::CrestLevel => QuantityType::CrestLevel,
        TriggerParameter::CrestWidth => QuantityType::CrestWidth,
        TriggerParameter::PressureDifference => QuantityType::PressureDifference,
    }
}

/// Quantity a controller measures.  Flow direction is checked on the
/// sign of the discharge.
pub fn measured_quantity(parameter: MeasuredParameter) -> QuantityType {
    match parameter {
        MeasuredParameter::WaterLevel => QuantityType::WaterLevel,
        MeasuredParameter::Discharge | MeasuredParameter::FlowDirection => QuantityType::Discharge,
        MeasuredParameter::HeadDifference => QuantityType::Head,
        MeasuredParameter::Velocity => QuantityType::Velocity,
        MeasuredParameter::PressureDifference => QuantityType::PressureDifference,
    }
}
