// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Import orchestration: reads the files of one case, runs the record
//! mappers, the resolver and the geometry pass, and hands back the
//! populated domain objects together with the batch of diagnostics.
//!
//! Only unusable input is fatal here: a missing or unreadable required
//! file aborts the import with an [`Error`].  Everything record-local
//! lands in the diagnostics instead.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::casedata::{self, CaseData};
use crate::common::{Diagnostics, Result};
use crate::domain::{CompositeStructure, ControlGroup, DataItemCatalog};
use crate::geometry::{self, Point};
use crate::import_err;
use crate::records::initial::{self, BranchInitial, GlobalInitial};
use crate::records::{controller, cross_section, friction, network, structure_def, trigger, valve};
use crate::resolve::{self, ResolveInput};

/// Paths of one case.  Required files abort the import when absent;
/// optional files contribute nothing when unset.
#[derive(Clone, Debug, Default)]
pub struct ImportFiles {
    pub network_topology: PathBuf,
    pub network_geometry: Option<PathBuf>,
    pub network_structures: PathBuf,
    pub structure_data: PathBuf,
    pub structure_definitions: PathBuf,
    pub cross_sections: Option<PathBuf>,
    pub controllers: Option<PathBuf>,
    pub triggers: Option<PathBuf>,
    pub friction: Option<PathBuf>,
    pub valve_data: Option<PathBuf>,
    pub initial_conditions: Option<PathBuf>,
    pub case_manifest: Option<PathBuf>,
    /// Channel networks store curve points as `(chainage, angle°)`;
    /// sewer networks as absolute `(x, y)`.
    pub is_channel: bool,
}

impl ImportFiles {
    /// The conventional file names of a case directory.  Optional files
    /// that do not exist are left unset.
    pub fn in_directory(dir: &Path, is_channel: bool) -> Self {
        let optional = |name: &str| {
            let path = dir.join(name);
            path.exists().then_some(path)
        };
        ImportFiles {
            network_topology: dir.join("NETWORK.TP"),
            network_geometry: optional("NETWORK.CP"),
            network_structures: dir.join("NETWORK.ST"),
            structure_data: dir.join("STRUCT.DAT"),
            structure_definitions: dir.join("STRUCT.DEF"),
            cross_sections: optional("PROFILE.DEF"),
            controllers: optional("CONTROL.DEF"),
            triggers: optional("TRIGGER.DEF"),
            friction: optional("FRICTION.DAT"),
            valve_data: optional("VALVE.TBL"),
            initial_conditions: optional("INITIAL.DAT"),
            case_manifest: optional("CASEDESC.CMT"),
            is_channel,
        }
    }
}

/// Everything one import pass produces.
#[derive(Clone, Debug, Default)]
pub struct ImportResult {
    pub composites: Vec<CompositeStructure>,
    pub control_groups: Vec<ControlGroup>,
    /// Realized polyline per branch id.
    pub branch_geometries: HashMap<String, Vec<Point>>,
    pub global_initial: GlobalInitial,
    pub branch_initials: Vec<BranchInitial>,
    pub case_data: CaseData,
    pub diagnostics: Diagnostics,
}

pub fn import(files: &ImportFiles, catalog: &DataItemCatalog) -> Result<ImportResult> {
    let mut diag = Diagnostics::new();

    let topology_text = read_required(&files.network_topology)?;
    let locations_text = read_required(&files.network_structures)?;
    let data_text = read_required(&files.structure_data)?;
    let definitions_text = read_required(&files.structure_definitions)?;

    let nodes = network::read_nodes(&topology_text, &mut diag);
    let geometry_records = match read_optional(&files.network_geometry)? {
        Some(text) => network::read_branch_geometry(&text, &mut diag),
        None => Vec::new(),
    };

    let input = ResolveInput {
        branches: network::read_branches(&topology_text, &mut diag),
        locations: network::read_locations(&locations_text, &mut diag),
        mappings: network::read_mappings(&data_text, &mut diag),
        compounds: network::read_compounds(&data_text, &mut diag),
        definitions: structure_def::read_all(&definitions_text, &mut diag),
        cross_sections: match read_optional(&files.cross_sections)? {
            Some(text) => cross_section::read_all(&text, &mut diag),
            None => HashMap::new(),
        },
        frictions: match read_optional(&files.friction)? {
            Some(text) => friction::read_all(&text, &mut diag),
            None => Vec::new(),
        },
        valves: match read_optional(&files.valve_data)? {
            Some(text) => valve::read_all(&text, &mut diag),
            None => HashMap::new(),
        },
        controllers: match read_optional(&files.controllers)? {
            Some(text) => controller::read_all(&text, &mut diag),
            None => Vec::new(),
        },
        triggers: match read_optional(&files.triggers)? {
            Some(text) => trigger::read_all(&text, &mut diag),
            None => Vec::new(),
        },
    };

    let resolved = resolve::resolve(&input, catalog, &mut diag);
    let branch_geometries = geometry::reconcile(
        &input.branches,
        &geometry_records,
        &nodes,
        files.is_channel,
        &mut diag,
    );

    let (global_initial, branch_initials) = match read_optional(&files.initial_conditions)? {
        Some(text) => {
            let (global, branches) = initial::read_all(&text, &mut diag);
            let kept = resolve::filter_branch_initials(&global, branches, &mut diag);
            (global, kept)
        }
        None => (GlobalInitial::default(), Vec::new()),
    };

    let case_data = match &files.case_manifest {
        Some(path) => {
            let text = read_required(path)?;
            casedata::read_manifest(&text, &path.display().to_string())?
        }
        None => CaseData::default(),
    };

    Ok(ImportResult {
        composites: resolved.composites,
        control_groups: resolved.control_groups,
        branch_geometries,
        global_initial,
        branch_initials,
        case_data,
        diagnostics: diag,
    })
}

fn read_required(path: &Path) -> Result<String> {
    if path.as_os_str().is_empty() {
        return import_err!(StreamIsNull, "no path configured".to_owned());
    }
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            import_err!(MissingFile, path.display().to_string())
        }
        Err(err) => import_err!(StreamNotReadable, format!("{}: {err}", path.display())),
    }
}

fn read_optional(path: &Option<PathBuf>) -> Result<Option<String>> {
    match path {
        Some(path) => read_required(path).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, text: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn write_case(dir: &Path) {
        write_file(
            dir,
            "NETWORK.TP",
            "NODE id 'n1' px 0 py 0 node\nNODE id 'n2' px 100 py 0 node\n\
             BRCH id '1' nm 'chan' bn 'n1' en 'n2' al 100 brch\n",
        );
        write_file(
            dir,
            "NETWORK.ST",
            "STRU id 'S1' nm 'Weir north' ci '1' lc 50 stru\n",
        );
        write_file(dir, "STRUCT.DAT", "STRU id 'S1' dd '7' stru\n");
        write_file(
            dir,
            "STRUCT.DEF",
            "STDS id '7' nm 'w' ty 6 cl 10 cw 5 stds\n",
        );
    }

    #[test]
    fn test_import_case_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_case(dir.path());
        write_file(
            dir.path(),
            "INITIAL.DAT",
            "GLIN ty 0 lv 1.5 q_ 0.5 glin\nFLBR id 'F1' ci '1' ty 0 lv 1.2 flbr\n",
        );

        let files = ImportFiles::in_directory(dir.path(), true);
        let result = import(&files, &DataItemCatalog::new()).unwrap();
        assert_eq!(1, result.composites.len());
        assert_eq!("S1 [compound]", result.composites[0].name);
        assert_eq!(2, result.branch_geometries["1"].len());
        assert_eq!(1.5, result.global_initial.level);
        assert_eq!(1, result.branch_initials.len());
        assert!(result.control_groups.is_empty());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_missing_required_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let files = ImportFiles::in_directory(dir.path(), true);
        let err = import(&files, &DataItemCatalog::new()).unwrap_err();
        assert_eq!(ErrorCode::MissingFile, err.code);
    }

    #[test]
    fn test_unset_required_path_is_stream_is_null() {
        let files = ImportFiles::default();
        let err = import(&files, &DataItemCatalog::new()).unwrap_err();
        assert_eq!(ErrorCode::StreamIsNull, err.code);
    }
}
