// Copyright (C) 2026 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// The structured error kinds of the public API. Everything else surfaces as
/// a plain [`anyhow`] error; internal invariant violations are not errors but
/// panics, because a mesh that fails them is unusable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshError {
    /// The caller passed an entity kind string that is none of `node`,
    /// `edge`/`face`, `cell`, `halfedge`, `mesh`.
    BadEntityKind(String),
    /// An input array does not have the size the mesh dictates. Remember
    /// that cell-indexed arrays carry one extra slot for the sentinel cell.
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    /// Entry point declared but not implemented for this cell shape yet.
    UnsupportedOperation(&'static str),
}

impl std::fmt::Display for MeshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{self:?}"))
    }
}

impl std::error::Error for MeshError {}
