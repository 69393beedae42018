// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

//! Importer core for legacy SOBEK river/sewer network model files:
//! tokenizes the key-tagged bracket records, maps them onto typed
//! definition structs, resolves the cross-references between the
//! independently read files, and builds the domain graph (composite
//! branch structures and control groups) a host model consumes.

pub mod builders;
pub mod casedata;
pub mod common;
pub mod domain;
pub mod geometry;
pub mod importer;
pub mod records;
pub mod resolve;
pub mod structures_ini;
pub mod tokenizer;

pub use self::common::{Diagnostic, Diagnostics, Error, ErrorCode, Result, Severity};
pub use self::importer::{import, ImportFiles, ImportResult};
