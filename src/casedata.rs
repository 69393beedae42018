// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Case-data manifest.
//!
//! The manifest lists the files of one case, one per line:
//!
//! ```text
//! I \SB216003\FIXED\656NOP.WDC 231 '1402382291'
//! ```
//!
//! The importer only needs the wind (`.WDC`) and precipitation (`.BUI`)
//! entries.  A manifest path's first component names the case directory
//! the root file itself lives in, so resolution drops that component
//! and joins the remainder one level above the root file's directory.

use crate::common::Result;
use crate::format_err;

/// Wind and precipitation file paths of one case; `None` when the
/// manifest has no matching entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaseData {
    pub wind_file: Option<String>,
    pub precipitation_file: Option<String>,
}

/// Reads a manifest, resolving entries against the manifest's own path.
/// A structurally broken entry line aborts the whole import.
pub fn read_manifest(text: &str, root_path: &str) -> Result<CaseData> {
    let mut case_data = CaseData::default();
    for line in text.lines() {
        let line = line.trim();
        let mut fields = line.split_whitespace();
        if fields.next() != Some("I") {
            continue;
        }
        let path = match fields.next() {
            Some(path) => path,
            None => return format_err!(BadManifest, format!("entry line without a path: '{line}'")),
        };
        let upper = path.to_ascii_uppercase();
        if upper.ends_with(".WDC") && case_data.wind_file.is_none() {
            case_data.wind_file = Some(resolve(path, root_path));
        } else if upper.ends_with(".BUI") && case_data.precipitation_file.is_none() {
            case_data.precipitation_file = Some(resolve(path, root_path));
        }
    }
    Ok(case_data)
}

/// Joins a manifest path, minus its case-directory component, to the
/// parent of the root file's directory.
fn resolve(manifest_path: &str, root_path: &str) -> String {
    let separator = if root_path.contains('\\') { '\\' } else { '/' };
    let is_separator = |c: char| c == '\\' || c == '/';

    // root file → its directory → that directory's parent
    let mut base: Vec<&str> = root_path.split(is_separator).collect();
    base.pop(); // file name
    base.pop(); // case directory

    let relative: Vec<&str> = manifest_path
        .split(is_separator)
        .filter(|c| !c.is_empty())
        .skip(1)
        .collect();

    let mut components = base;
    components.extend(relative);
    components.join(&separator.to_string())
}
