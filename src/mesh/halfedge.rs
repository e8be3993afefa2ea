// Copyright (C) 2026 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;
use serde::{Deserialize, Serialize};

/// Error kinds for the fallible parts of the public API
pub mod errors;
pub use errors::*;

/// Pure topology queries derived from the half-edge table
pub mod queries;
pub use queries::*;

/// Named per-entity attribute tables (`set_data` / `get_data`)
pub mod channels;
pub use channels::*;

/// Build a half-edge mesh from a triangle or general polygon mesh
pub mod importers;

/// Adaptive polygonal refinement
pub mod refine;

/// Adaptive polygonal coarsening, the inverse of refinement
pub mod coarsen;

/// Cell marking strategies for adaptive refinement loops
pub mod marking;
pub use marking::*;

/// HalfEdge meshes are a type of linked list. This means it is sometimes
/// impossible to ensure some algorithms will terminate when the mesh is
/// malformed. To ensure the code never goes into an infinite loop, this max
/// number of iterations will be performed before giving an error. This should
/// be large enough, as cells with a very large number of vertices may trigger
/// it.
pub const MAX_LOOP_ITERATIONS: usize = 8196;

/// The half-edge connectivity table, stored as six parallel arrays. At
/// position `h` each array holds one field of half-edge `h`:
///
/// - `to`: the node the half-edge points to
/// - `cell`: the cell on its left
/// - `next` / `prev`: the neighboring half-edges along that cell's rim (CCW)
/// - `opp`: the twin half-edge of the same undirected edge
/// - `main`: whether this is the canonical half-edge of its undirected edge
///
/// The pair `{h, opp[h]}` represents one undirected edge and exactly one of
/// the two carries the `main` bit. Every link is always valid: half-edges on
/// the domain boundary have their twin assigned to the sentinel outer cell
/// instead of a nullable field, so array sweeps never branch on boundaries.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfEdgeTable {
    pub(crate) to: Vec<u32>,
    pub(crate) cell: Vec<u32>,
    pub(crate) next: Vec<u32>,
    pub(crate) prev: Vec<u32>,
    pub(crate) opp: Vec<u32>,
    pub(crate) main: Vec<bool>,
}

impl HalfEdgeTable {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            to: Vec::with_capacity(n),
            cell: Vec::with_capacity(n),
            next: Vec::with_capacity(n),
            prev: Vec::with_capacity(n),
            opp: Vec::with_capacity(n),
            main: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to.is_empty()
    }

    /// Appends one half-edge record and returns its index.
    pub fn push(&mut self, to: u32, cell: u32, next: u32, prev: u32, opp: u32, main: bool) -> u32 {
        let h = self.len() as u32;
        self.to.push(to);
        self.cell.push(cell);
        self.next.push(next);
        self.prev.push(prev);
        self.opp.push(opp);
        self.main.push(main);
        h
    }

    /// The table as `(to, cell, next, prev, opp, main)` rows, `main` as 0/1.
    pub fn rows(&self) -> Vec<[u32; 6]> {
        (0..self.len())
            .map(|h| {
                [
                    self.to[h],
                    self.cell[h],
                    self.next[h],
                    self.prev[h],
                    self.opp[h],
                    self.main[h] as u32,
                ]
            })
            .collect()
    }
}

/// Entity counts of a mesh. The number of half-edges is always
/// `2 * num_edges`; the sentinel outer cell is not included in `num_cells`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshCounts {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub num_cells: usize,
}

/// A read-only view over one entity class of the mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    Nodes(Vec<DVec2>),
    Edges(Vec<[u32; 2]>),
    Cells(RaggedArray),
    HalfEdges(Vec<[u32; 6]>),
}

/// A two-dimensional polygonal mesh stored as a half-edge table over dense
/// integer index arrays. Cells may be arbitrary simple polygons; the planar
/// domain may contain holes. Cell index `NC` (one past the last real cell) is
/// the sentinel outer cell holding every boundary-side twin.
///
/// The only mutation surfaces are the importers, [`refine_poly`] and
/// [`coarsen_poly`]; topology queries borrow the mesh immutably. Refinement
/// and coarsening maintain the per-entity refinement levels, the per-cell
/// subdomain tags and the per-node fixed flags.
///
/// [`refine_poly`]: HalfEdgeMesh::refine_poly
/// [`coarsen_poly`]: HalfEdgeMesh::coarsen_poly
#[derive(Debug, Clone)]
pub struct HalfEdgeMesh {
    pub(crate) positions: Vec<DVec2>,
    pub(crate) table: HalfEdgeTable,
    /// Number of real cells; the sentinel is `num_cells`.
    pub(crate) num_cells: usize,
    /// Any half-edge of each cell, used as a rim walk starting point. Size
    /// `num_cells + 1`, rebuilt by [`reinit`](Self::reinit).
    pub(crate) cell_halfedge: Vec<u32>,
    /// Refinement depth per cell, size `num_cells + 1` (sentinel slot last).
    pub(crate) cell_level: Vec<u32>,
    /// Refinement depth per half-edge.
    pub(crate) halfedge_level: Vec<u32>,
    /// Refinement depth per node.
    pub(crate) node_level: Vec<u32>,
    /// Subdomain tag per cell, size `num_cells + 1`. `0` marks the unbounded
    /// outside, `n >= 1` interior subdomain `n`, `-n` hole `n`.
    pub(crate) subdomain: Vec<i32>,
    /// Pinned nodes. A pinned node is never removed by coarsening.
    pub(crate) fixed: Vec<bool>,
    pub channels: MeshChannels,
}

impl HalfEdgeMesh {
    /// Builds a mesh from raw parts: node coordinates and a fully linked
    /// half-edge table with `num_cells` real cells (boundary twins assigned
    /// to cell `num_cells`). Levels start at zero, every cell is tagged as
    /// interior subdomain 1 and no node is pinned.
    ///
    /// Shape problems are reported as errors; a table that is shaped
    /// correctly but topologically inconsistent makes the mesh unusable and
    /// panics in [`validate`](Self::validate).
    pub fn from_parts(
        positions: Vec<DVec2>,
        table: HalfEdgeTable,
        num_cells: usize,
    ) -> Result<Self> {
        let nh = table.len();
        for (what, len) in [
            ("halfedge cell column", table.cell.len()),
            ("halfedge next column", table.next.len()),
            ("halfedge prev column", table.prev.len()),
            ("halfedge opp column", table.opp.len()),
            ("halfedge main column", table.main.len()),
        ] {
            if len != nh {
                return Err(MeshError::ShapeMismatch {
                    what,
                    expected: nh,
                    got: len,
                }
                .into());
            }
        }
        if nh % 2 != 0 {
            bail!("a half-edge table must have an even number of rows, got {nh}");
        }
        let nn = positions.len();
        let mut mesh = Self {
            positions,
            table,
            num_cells,
            cell_halfedge: vec![0; num_cells + 1],
            cell_level: vec![0; num_cells + 1],
            halfedge_level: vec![0; nh],
            node_level: vec![0; nn],
            subdomain: {
                let mut tags = vec![1; num_cells];
                tags.push(0);
                tags
            },
            fixed: vec![false; nn],
            channels: MeshChannels::default(),
        };
        mesh.reinit(num_cells);
        Ok(mesh)
    }

    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    pub fn edge_count(&self) -> usize {
        self.table.len() / 2
    }

    pub fn halfedge_count(&self) -> usize {
        self.table.len()
    }

    /// Number of real cells. The sentinel outer cell is not counted.
    pub fn cell_count(&self) -> usize {
        self.num_cells
    }

    /// Index of the sentinel outer cell.
    pub fn sentinel_cell(&self) -> usize {
        self.num_cells
    }

    pub fn counts(&self) -> MeshCounts {
        MeshCounts {
            num_nodes: self.node_count(),
            num_edges: self.edge_count(),
            num_cells: self.cell_count(),
        }
    }

    pub fn positions(&self) -> &[DVec2] {
        &self.positions
    }

    pub fn position(&self, node: usize) -> DVec2 {
        self.positions[node]
    }

    pub fn next(&self, h: usize) -> usize {
        self.table.next[h] as usize
    }

    pub fn prev(&self, h: usize) -> usize {
        self.table.prev[h] as usize
    }

    pub fn opp(&self, h: usize) -> usize {
        self.table.opp[h] as usize
    }

    pub fn to(&self, h: usize) -> usize {
        self.table.to[h] as usize
    }

    pub fn cell(&self, h: usize) -> usize {
        self.table.cell[h] as usize
    }

    pub fn is_main(&self, h: usize) -> bool {
        self.table.main[h]
    }

    /// Some half-edge of cell `c` (the sentinel included).
    pub fn cell_halfedge(&self, c: usize) -> usize {
        self.cell_halfedge[c] as usize
    }

    pub fn table(&self) -> &HalfEdgeTable {
        &self.table
    }

    /// Refinement depth per cell; the last slot belongs to the sentinel.
    pub fn cell_levels(&self) -> &[u32] {
        &self.cell_level
    }

    pub fn halfedge_levels(&self) -> &[u32] {
        &self.halfedge_level
    }

    pub fn node_levels(&self) -> &[u32] {
        &self.node_level
    }

    /// Subdomain tag per cell; the last slot belongs to the sentinel.
    pub fn subdomain(&self) -> &[i32] {
        &self.subdomain
    }

    pub fn fixed_nodes(&self) -> &[bool] {
        &self.fixed
    }

    /// Pins or releases nodes. Pinned nodes survive every coarsening pass.
    pub fn set_fixed_nodes(&mut self, fixed: Vec<bool>) -> Result<()> {
        if fixed.len() != self.node_count() {
            return Err(MeshError::ShapeMismatch {
                what: "fixed node flags",
                expected: self.node_count(),
                got: fixed.len(),
            }
            .into());
        }
        self.fixed = fixed;
        Ok(())
    }

    /// Replaces the subdomain tags. The array carries one slot per cell plus
    /// the sentinel slot.
    pub fn set_subdomain(&mut self, tags: Vec<i32>) -> Result<()> {
        if tags.len() != self.num_cells + 1 {
            return Err(MeshError::ShapeMismatch {
                what: "subdomain tags",
                expected: self.num_cells + 1,
                got: tags.len(),
            }
            .into());
        }
        self.subdomain = tags;
        Ok(())
    }

    /// The ordered rim of cell `c`: all half-edges reached by walking `next`
    /// from `cell_halfedge[c]` until the cycle closes.
    pub(crate) fn cell_ring(&self, c: usize) -> SVec<u32> {
        let h0 = self.cell_halfedge[c];
        let mut ring = smallvec::smallvec![h0];
        let mut h = h0;
        let mut count = 0;
        loop {
            if count > MAX_LOOP_ITERATIONS {
                panic!("Max number of iterations reached. Is the mesh malformed?");
            }
            count += 1;
            h = self.table.next[h as usize];
            if h == h0 {
                break;
            }
            ring.push(h);
        }
        ring
    }

    /// Atomically adopts the staged half-edge table: records the new cell
    /// count, rebuilds the cell-to-half-edge index in one linear pass and
    /// re-checks the structural invariants. Refinement, coarsening and the
    /// importers end with this; there is no other mutation surface.
    pub(crate) fn reinit(&mut self, num_cells: usize) {
        self.num_cells = num_cells;
        self.cell_halfedge = vec![0; num_cells + 1];
        for h in 0..self.table.len() {
            self.cell_halfedge[self.table.cell[h] as usize] = h as u32;
        }
        self.validate();
    }

    /// Checks the structural invariants of the half-edge table and panics on
    /// the first violation. A mesh that fails this check is unusable, so the
    /// process aborts rather than limping on with corrupt connectivity.
    pub fn validate(&self) {
        let t = &self.table;
        let nh = t.len();
        let nn = self.node_count();
        let nc = self.num_cells;
        assert!(nh % 2 == 0, "invariant violated: odd number of half-edges");
        assert_eq!(
            self.halfedge_level.len(),
            nh,
            "invariant violated: half-edge level table out of sync"
        );
        assert_eq!(
            self.node_level.len(),
            nn,
            "invariant violated: node level table out of sync"
        );
        assert_eq!(
            self.fixed.len(),
            nn,
            "invariant violated: fixed node table out of sync"
        );
        assert_eq!(
            self.cell_level.len(),
            nc + 1,
            "invariant violated: cell level table out of sync"
        );
        assert_eq!(
            self.subdomain.len(),
            nc + 1,
            "invariant violated: subdomain table out of sync"
        );

        for h in 0..nh {
            let o = t.opp[h] as usize;
            assert!(
                o < nh && (t.to[h] as usize) < nn && (t.cell[h] as usize) <= nc,
                "invariant violated: half-edge {h} has an out-of-range link"
            );
            assert!(
                o != h && t.opp[o] as usize == h,
                "invariant violated: opp is not an involution at half-edge {h}"
            );
            assert!(
                t.next[t.prev[h] as usize] as usize == h
                    && t.prev[t.next[h] as usize] as usize == h,
                "invariant violated: next/prev are not inverse at half-edge {h}"
            );
            assert!(
                t.main[h] != t.main[o],
                "invariant violated: twin pair {h}/{o} does not have exactly one main half-edge"
            );
            assert!(
                t.to[o] == t.to[t.prev[h] as usize],
                "invariant violated: tail of half-edge {h} is ambiguous"
            );
            assert!(
                t.cell[h] == t.cell[t.next[h] as usize],
                "invariant violated: half-edge {h} and its next lie in different cells"
            );
        }

        // Every cell owns at least one half-edge, and every non-sentinel cell
        // is a single rim cycle. The sentinel may consist of several cycles,
        // one per boundary loop.
        let mut per_cell = vec![0usize; nc + 1];
        for h in 0..nh {
            per_cell[t.cell[h] as usize] += 1;
        }
        for (c, &count) in per_cell.iter().enumerate() {
            assert!(count > 0, "invariant violated: cell {c} has no half-edge");
            if c < nc {
                assert_eq!(
                    self.cell_ring(c).len(),
                    count,
                    "invariant violated: cell {c} splits into several rim cycles"
                );
            }
        }
    }

    /// A view over one entity class. `kind` is one of `"node"`, `"edge"` (or
    /// `"face"`), `"cell"` and `"halfedge"`.
    pub fn entity(&self, kind: &str) -> Result<Entity> {
        match EntityKind::parse(kind)? {
            EntityKind::Node => Ok(Entity::Nodes(self.positions.clone())),
            EntityKind::Edge => Ok(Entity::Edges(self.edge_to_node())),
            EntityKind::Cell => Ok(Entity::Cells(self.cell_to_node())),
            EntityKind::HalfEdge => Ok(Entity::HalfEdges(self.table.rows())),
            EntityKind::Mesh => Err(MeshError::BadEntityKind(kind.to_owned()).into()),
        }
    }

    /// Barycenters of one entity class: the nodes themselves, edge midpoints,
    /// or the vertex average of each cell's rim. Note that the cell variant
    /// is the plain vertex average; the signed-area centroid used by
    /// refinement is [`cell_barycenter`](Self::cell_barycenter).
    pub fn entity_barycenter(&self, kind: &str) -> Result<Vec<DVec2>> {
        match EntityKind::parse(kind)? {
            EntityKind::Node => Ok(self.positions.clone()),
            EntityKind::Edge => Ok(self
                .edge_to_node()
                .iter()
                .map(|&[a, b]| lerp(self.positions[a as usize], self.positions[b as usize], 0.5))
                .collect()),
            EntityKind::Cell => Ok((0..self.num_cells)
                .map(|c| {
                    let ring = self.cell_ring(c);
                    let ring_positions: Vec<DVec2> = ring
                        .iter_cpy()
                        .map(|h| self.positions[self.table.to[h as usize] as usize])
                        .collect();
                    let sum: DVec2 = ring_positions.iter().sum();
                    sum / ring.len() as f64
                })
                .collect()),
            _ => Err(MeshError::BadEntityKind(kind.to_owned()).into()),
        }
    }
}
