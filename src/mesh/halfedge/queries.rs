// Copyright (C) 2026 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// A ragged integer array in offsets + indices form. Row `i` is
/// `indices[offsets[i]..offsets[i + 1]]`. Cells have varying valence at
/// runtime, so every per-cell index list uses this layout instead of a
/// fixed-width table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaggedArray {
    pub indices: Vec<u32>,
    pub offsets: Vec<u32>,
}

impl RaggedArray {
    pub fn rows(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn row(&self, i: usize) -> &[u32] {
        &self.indices[self.offsets[i] as usize..self.offsets[i + 1] as usize]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[u32]> {
        (0..self.rows()).map(move |i| self.row(i))
    }
}

impl FromIterator<SVec<u32>> for RaggedArray {
    fn from_iter<I: IntoIterator<Item = SVec<u32>>>(iter: I) -> Self {
        let mut out = RaggedArray {
            indices: Vec::new(),
            offsets: vec![0],
        };
        for row in iter {
            out.indices.extend_from_slice(&row);
            out.offsets.push(out.indices.len() as u32);
        }
        out
    }
}

impl HalfEdgeMesh {
    /// Number of rim half-edges (equivalently, vertices) of each real cell.
    pub fn vertices_per_cell(&self) -> Vec<u32> {
        let mut nv = self.vertices_per_cell_padded();
        nv.truncate(self.num_cells);
        nv
    }

    /// Like [`vertices_per_cell`](Self::vertices_per_cell) but with the
    /// sentinel slot kept, so scatter loops can index it without branching.
    pub(crate) fn vertices_per_cell_padded(&self) -> Vec<u32> {
        let mut nv = vec![0u32; self.num_cells + 1];
        for h in 0..self.table.len() {
            nv[self.table.cell[h] as usize] += 1;
        }
        nv
    }

    /// The ordered node ring of every real cell.
    pub fn cell_to_node(&self) -> RaggedArray {
        (0..self.num_cells)
            .map(|c| {
                self.cell_ring(c)
                    .iter_cpy()
                    .map(|h| self.table.to[h as usize])
                    .collect_svec()
            })
            .collect()
    }

    /// Dense cell-node incidence matrix, `num_cells x num_nodes`.
    pub fn cell_to_node_matrix(&self) -> Array2<bool> {
        let mut incidence = Array2::from_elem((self.num_cells, self.node_count()), false);
        for h in 0..self.table.len() {
            let c = self.table.cell[h] as usize;
            if c < self.num_cells {
                incidence[[c, self.table.to[h] as usize]] = true;
            }
        }
        incidence
    }

    /// Undirected edge index of each half-edge: the k-th main half-edge in
    /// index order is edge k, and its twin shares the number.
    pub(crate) fn halfedge_to_edge(&self) -> Vec<u32> {
        let mut edge = vec![0u32; self.table.len()];
        let mut e = 0u32;
        for h in 0..self.table.len() {
            if self.table.main[h] {
                edge[h] = e;
                edge[self.table.opp[h] as usize] = e;
                e += 1;
            }
        }
        edge
    }

    /// Endpoints `[tail, head]` of every undirected edge, oriented along its
    /// main half-edge.
    pub fn edge_to_node(&self) -> Vec<[u32; 2]> {
        let mut edges = Vec::with_capacity(self.edge_count());
        for h in 0..self.table.len() {
            if self.table.main[h] {
                edges.push([self.table.to[self.table.opp[h] as usize], self.table.to[h]]);
            }
        }
        edges
    }

    /// For every undirected edge: `[left_cell, right_cell, local_left,
    /// local_right]`, where the local indices are rim positions within the
    /// respective cell. Boundary edges duplicate the left slots, so the row
    /// never mentions the sentinel.
    pub fn edge_to_cell(&self) -> Vec<[u32; 4]> {
        let edge = self.halfedge_to_edge();
        let mut e2c = vec![[0u32; 4]; self.edge_count()];
        for h in 0..self.table.len() {
            if self.table.main[h] {
                let e = edge[h] as usize;
                e2c[e][0] = self.table.cell[h];
                e2c[e][1] = self.table.cell[self.table.opp[h] as usize];
            }
        }
        for c in 0..self.num_cells {
            for (lidx, h) in self.cell_ring(c).iter_cpy().enumerate() {
                let e = edge[h as usize] as usize;
                if self.table.main[h as usize] {
                    e2c[e][2] = lidx as u32;
                } else {
                    e2c[e][3] = lidx as u32;
                }
            }
        }
        let sentinel = self.num_cells as u32;
        for row in &mut e2c {
            if row[1] == sentinel {
                row[1] = row[0];
                row[3] = row[2];
            }
        }
        e2c
    }

    /// Symmetric cell adjacency as ragged neighbor lists.
    pub fn cell_to_cell(&self) -> RaggedArray {
        let mut neighbors: Vec<SVec<u32>> = vec![SVec::new(); self.num_cells];
        for row in self.edge_to_cell() {
            if row[0] != row[1] {
                neighbors[row[0] as usize].push(row[1]);
                neighbors[row[1] as usize].push(row[0]);
            }
        }
        neighbors.into_iter().collect()
    }

    /// Symmetric cell adjacency as a dense boolean matrix.
    pub fn cell_to_cell_matrix(&self) -> Array2<bool> {
        let mut adjacency = Array2::from_elem((self.num_cells, self.num_cells), false);
        for row in self.edge_to_cell() {
            if row[0] != row[1] {
                adjacency[[row[0] as usize, row[1] as usize]] = true;
                adjacency[[row[1] as usize, row[0] as usize]] = true;
            }
        }
        adjacency
    }

    /// True for every undirected edge whose twin side is the sentinel.
    pub fn boundary_edge_flag(&self) -> Vec<bool> {
        let sentinel = self.num_cells as u32;
        let mut flags = Vec::with_capacity(self.edge_count());
        for h in 0..self.table.len() {
            if self.table.main[h] {
                flags.push(self.table.cell[self.table.opp[h] as usize] == sentinel);
            }
        }
        flags
    }

    pub fn boundary_node_flag(&self) -> Vec<bool> {
        let sentinel = self.num_cells as u32;
        let mut flags = vec![false; self.node_count()];
        for h in 0..self.table.len() {
            if self.table.cell[h] == sentinel {
                flags[self.table.to[h] as usize] = true;
                flags[self.table.to[self.table.opp[h] as usize] as usize] = true;
            }
        }
        flags
    }

    pub fn boundary_cell_flag(&self) -> Vec<bool> {
        let sentinel = self.num_cells as u32;
        let mut flags = vec![false; self.num_cells];
        for h in 0..self.table.len() {
            if self.table.cell[self.table.opp[h] as usize] == sentinel {
                flags[self.table.cell[h] as usize] = true;
            }
        }
        flags
    }

    pub fn boundary_edge_index(&self) -> Vec<u32> {
        self.boundary_edge_flag()
            .iter()
            .positions(|&b| b)
            .map(|i| i as u32)
            .collect()
    }

    pub fn boundary_node_index(&self) -> Vec<u32> {
        self.boundary_node_flag()
            .iter()
            .positions(|&b| b)
            .map(|i| i as u32)
            .collect()
    }

    pub fn boundary_cell_index(&self) -> Vec<u32> {
        self.boundary_cell_flag()
            .iter()
            .positions(|&b| b)
            .map(|i| i as u32)
            .collect()
    }

    /// The sentinel cycles of the mesh, one per boundary loop (the outer
    /// boundary and one loop per hole), each as an ordered list of sentinel
    /// half-edges.
    pub fn boundary_loops(&self) -> Vec<Vec<u32>> {
        let sentinel = self.num_cells as u32;
        let mut visited = vec![false; self.table.len()];
        let mut loops = Vec::new();
        for h0 in 0..self.table.len() {
            if self.table.cell[h0] != sentinel || visited[h0] {
                continue;
            }
            let mut cycle = Vec::new();
            let mut h = h0;
            let mut count = 0;
            loop {
                if count > MAX_LOOP_ITERATIONS {
                    panic!("Max number of iterations reached. Is the mesh malformed?");
                }
                count += 1;
                visited[h] = true;
                cycle.push(h as u32);
                h = self.table.next[h] as usize;
                if h == h0 {
                    break;
                }
            }
            loops.push(cycle);
        }
        loops
    }

    /// Signed area of every real cell, positive for CCW rims. One sweep over
    /// the half-edge table accumulating the cross product of each directed
    /// edge into its cell slot; the sentinel slot absorbs the boundary terms
    /// and is dropped at the end.
    pub fn cell_area(&self) -> Vec<f64> {
        let mut area = vec![0.0; self.num_cells + 1];
        for h in 0..self.table.len() {
            let p0 = self.positions[self.table.to[self.table.prev[h] as usize] as usize];
            let p1 = self.positions[self.table.to[h] as usize];
            area[self.table.cell[h] as usize] += p0.perp_dot(p1);
        }
        area.truncate(self.num_cells);
        for a in &mut area {
            *a *= 0.5;
        }
        area
    }

    /// Signed-area-weighted centroid of every real cell, computed in the
    /// same single sweep as [`cell_area`](Self::cell_area). This is the
    /// point refinement uses for the star connection.
    #[profiling::function]
    pub fn cell_barycenter(&self) -> Vec<DVec2> {
        let mut area = vec![0.0; self.num_cells + 1];
        let mut center = vec![DVec2::ZERO; self.num_cells + 1];
        for h in 0..self.table.len() {
            let p0 = self.positions[self.table.to[self.table.prev[h] as usize] as usize];
            let p1 = self.positions[self.table.to[h] as usize];
            let val = p0.perp_dot(p1);
            let c = self.table.cell[h] as usize;
            area[c] += val;
            center[c] += (p0 + p1) * (0.5 * val);
        }
        (0..self.num_cells)
            .map(|c| center[c] / (3.0 * (0.5 * area[c])))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn two_quads() -> HalfEdgeMesh {
        // A 2x1 strip of unit quads sharing the edge between nodes 1 and 4.
        let positions = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(2.0, 0.0),
            DVec2::new(2.0, 1.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(0.0, 1.0),
        ];
        let cells: Vec<Vec<u32>> = vec![vec![0, 1, 4, 5], vec![1, 2, 3, 4]];
        HalfEdgeMesh::from_polygon_mesh(&positions, &cells).unwrap()
    }

    #[test]
    fn adjacency_and_boundary() {
        let mesh = two_quads();
        assert_eq!(mesh.counts().num_edges, 7);
        assert_eq!(mesh.vertices_per_cell(), vec![4, 4]);

        let e2c = mesh.edge_to_cell();
        let boundary = mesh.boundary_edge_flag();
        assert_eq!(boundary.iter().filter(|&&b| b).count(), 6);
        for (row, &is_boundary) in e2c.iter().zip(&boundary) {
            assert_eq!(row[0] == row[1], is_boundary);
        }

        let c2c = mesh.cell_to_cell();
        assert_eq!(c2c.row(0), &[1]);
        assert_eq!(c2c.row(1), &[0]);
        let adj = mesh.cell_to_cell_matrix();
        assert!(adj[[0, 1]] && adj[[1, 0]] && !adj[[0, 0]]);

        assert_eq!(mesh.boundary_node_flag(), vec![true; 6]);
        assert_eq!(mesh.boundary_cell_index(), vec![0, 1]);
        assert_eq!(mesh.boundary_loops().len(), 1);
        assert_eq!(mesh.boundary_loops()[0].len(), 6);
    }

    #[test]
    fn incidence_matrix_matches_ragged_rings() {
        let mesh = two_quads();
        let rings = mesh.cell_to_node();
        let incidence = mesh.cell_to_node_matrix();
        for c in 0..mesh.cell_count() {
            for n in 0..mesh.node_count() {
                assert_eq!(incidence[[c, n]], rings.row(c).contains(&(n as u32)));
            }
        }
    }

    #[test]
    fn areas_and_centroids() {
        let mesh = two_quads();
        assert_eq!(mesh.cell_area(), vec![1.0, 1.0]);
        let bc = mesh.cell_barycenter();
        assert!((bc[0] - DVec2::new(0.5, 0.5)).length() < 1e-12);
        assert!((bc[1] - DVec2::new(1.5, 0.5)).length() < 1e-12);
    }
}
