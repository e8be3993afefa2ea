// Copyright (C) 2026 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use float_ord::FloatOrd;
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Strategy used to turn a per-cell error indicator into a marked set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkStrategy {
    /// Dörfler bulk criterion: mark the minimal set of cells, largest
    /// indicator first, whose squared mass reaches `theta` times the total
    /// squared mass.
    L2,
    /// Maximum strategy: mark every cell whose indicator reaches `theta`
    /// times the largest one.
    Max,
}

/// Turns an error indicator into a marked-cell vector of length
/// `eta.len() + 1`, the trailing sentinel slot left false.
pub fn mark(eta: &[f64], theta: f64, strategy: MarkStrategy) -> Vec<bool> {
    let nc = eta.len();
    let mut marked = vec![false; nc + 1];
    match strategy {
        MarkStrategy::Max => {
            let max = eta.iter().fold(0.0f64, |a, &b| a.max(b));
            if max > 0.0 {
                for c in 0..nc {
                    if eta[c] >= theta * max {
                        marked[c] = true;
                    }
                }
            }
        }
        MarkStrategy::L2 => {
            let total: f64 = eta.iter().map(|e| e * e).sum();
            if total > 0.0 {
                let mut order: Vec<usize> = (0..nc).collect();
                order.sort_by_key(|&c| std::cmp::Reverse(FloatOrd(eta[c])));
                let mut mass = 0.0;
                for &c in &order {
                    if mass >= theta * total {
                        break;
                    }
                    marked[c] = true;
                    mass += eta[c] * eta[c];
                }
            }
        }
    }
    marked
}

impl HalfEdgeMesh {
    /// Marks cells for the next refinement pass from a per-cell error
    /// indicator. The returned vector is sized `cell_count() + 1` and feeds
    /// straight into [`refine_poly`](Self::refine_poly).
    pub fn refine_marker(
        &self,
        eta: &[f64],
        theta: f64,
        strategy: MarkStrategy,
    ) -> Result<Vec<bool>> {
        if eta.len() != self.cell_count() {
            return Err(MeshError::ShapeMismatch {
                what: "error indicator",
                expected: self.cell_count(),
                got: eta.len(),
            }
            .into());
        }
        Ok(mark(eta, theta, strategy))
    }
}
