// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! `TRGR` trigger definition records (TRIGGER.DEF).
//!
//! Header fields: `ty` trigger type (0 time, 1 hydraulic, 2 combined),
//! `tp` checked parameter, `ch` check-on (0 value, 1 direction), `ml`
//! measurement station or `cb`/`cl` branch location, `ts` structure id.
//! The `tt` table has five columns: timestamp, on/off flag, and/or
//! placeholder, operator flag (1 = greater, 0 = less) and threshold.

use chrono::NaiveDateTime;

use crate::common::Diagnostics;
use crate::tokenizer::RawRecord;

use super::controller::{measurement_location_id, TRIGGER_ID_PREFIX};
use super::RecordView;

pub const TAG: &str = "TRGR";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerType {
    Time,
    Hydraulic,
    /// Time-and-hydraulic; not importable.
    Combined,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TriggerCheckOn {
    #[default]
    Value,
    Direction,
}

/// `tp` codes: which quantity the trigger watches.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TriggerParameter {
    #[default]
    WaterLevelBranch,
    HeadDifference,
    Discharge,
    GateHeight,
    CrestLevel,
    CrestWidth,
    WaterLevelRetention,
    PressureDifference,
}

impl TriggerParameter {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => TriggerParameter::HeadDifference,
            2 => TriggerParameter::Discharge,
            3 => TriggerParameter::GateHeight,
            4 => TriggerParameter::CrestLevel,
            5 => TriggerParameter::CrestWidth,
            6 => TriggerParameter::WaterLevelRetention,
            7 => TriggerParameter::PressureDifference,
            _ => TriggerParameter::WaterLevelBranch,
        }
    }

    /// Whether the watched quantity lives on a structure, an
    /// observation point, or a retention area.
    pub fn location_kind(self) -> TriggerLocationKind {
        match self {
            TriggerParameter::WaterLevelBranch | TriggerParameter::Discharge => {
                TriggerLocationKind::ObservationPoint
            }
            TriggerParameter::WaterLevelRetention => TriggerLocationKind::RetentionArea,
            _ => TriggerLocationKind::Structure,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerLocationKind {
    ObservationPoint,
    Structure,
    RetentionArea,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TriggerRow {
    pub time: NaiveDateTime,
    pub on: bool,
    /// 1 = greater-than check, 0 = less-than.
    pub greater: bool,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TriggerDef {
    pub id: String,
    pub name: String,
    pub trigger_type: TriggerType,
    pub parameter: TriggerParameter,
    pub check_on: TriggerCheckOn,
    pub measurement_station_id: String,
    pub structure_id: String,
    /// `ddd;hh:mm:ss` stamp from the PDIN block; empty when absent.
    pub periodic_extrapolation_period: String,
    pub rows: Vec<TriggerRow>,
}

pub fn map_record(rec: &RawRecord, diag: &mut Diagnostics) -> Option<TriggerDef> {
    if rec.tag != TAG {
        return None;
    }
    let view = RecordView::new(rec);
    let id = match view.id() {
        Some(id) => format!("{TRIGGER_ID_PREFIX}{id}"),
        None => {
            diag.warn("trigger definition without id; skipped".to_owned());
            return None;
        }
    };

    let trigger_type = match view.i32_after("ty").unwrap_or(0) {
        1 => TriggerType::Hydraulic,
        2 => TriggerType::Combined,
        _ => TriggerType::Time,
    };

    let period = view
        .pdin()
        .and_then(|p| p.periodic_period().map(str::to_owned))
        .unwrap_or_default();

    Some(TriggerDef {
        id,
        name: view.name(),
        trigger_type,
        parameter: TriggerParameter::from_code(view.i32_after("tp").unwrap_or(0)),
        check_on: match view.i32_after("ch") {
            Some(1) => TriggerCheckOn::Direction,
            _ => TriggerCheckOn::Value,
        },
        measurement_station_id: measurement_station(&view),
        structure_id: view.quoted_after("ts").unwrap_or_default().to_owned(),
        periodic_extrapolation_period: period,
        rows: trigger_rows(&view),
    })
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

fn trigger_rows(view: &RecordView) -> Vec<TriggerRow> {
    let table = match view.first_table() {
        Some(t) => t,
        None => return Vec::new(),
    };
    table
        .rows
        .iter()
        .filter_map(|row| {
            Some(TriggerRow {
                time: super::parse_datetime(row.first()?)?,
                on: row.get(1)? == "1",
                // column 2 is the unused per-row and/or placeholder
                greater: row.get(3)? == "1",
                value: row.get(4)?.parse().ok()?,
            })
        })
        .collect()
}

/// All triggers in `text`, in file order.
pub fn read_all(text: &str, diag: &mut Diagnostics) -> Vec<TriggerDef> {
    crate::tokenizer::scan_records(text, diag)
        .iter()
        .filter_map(|rec| map_record(rec, diag))
        .collect()
}
