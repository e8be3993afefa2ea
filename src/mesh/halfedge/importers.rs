// Copyright (C) 2026 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

impl HalfEdgeMesh {
    /// Builds a half-edge mesh from a conforming triangle mesh. Triangles
    /// must be listed CCW and consistently oriented.
    ///
    /// Generic over the index type: pass whatever width your mesh generator
    /// produces (`u16`, `u32`, `usize`, ...).
    #[profiling::function]
    pub fn from_triangle_mesh<Index>(
        positions: &[DVec2],
        triangles: &[[Index; 3]],
    ) -> Result<Self>
    where
        Index: num_traits::AsPrimitive<usize> + 'static + Eq + PartialEq + core::hash::Hash + Copy,
    {
        Self::from_polygon_mesh(positions, triangles)
    }

    /// Builds a half-edge mesh from a flat polygonal mesh: a list of
    /// vertices and a list of CCW polygons referencing them.
    ///
    /// - Generic over Index: use as much precision as you need / want.
    /// - Generic over Polygon: use whatever input layout you want.
    ///
    /// If unsure, you can pass `Vec<Vec<u32>>` as `polygons`. You can also
    /// use `[[u32; 3]]` or `&[&[u32]]`. Same for `u8`, `u16` or `usize`
    /// indices.
    ///
    /// Undirected edges are numbered in order of first traversal and the
    /// first traversal direction of each edge becomes its main half-edge, so
    /// half-edges `0..NE` are the main block and `NE..2*NE` their twins.
    /// Every boundary-side twin is assigned to the sentinel outer cell and
    /// linked into one sentinel cycle per boundary loop, holes included.
    #[profiling::function]
    pub fn from_polygon_mesh<Index, Polygon>(positions: &[DVec2], polygons: &[Polygon]) -> Result<Self>
    where
        Index: num_traits::AsPrimitive<usize> + 'static + Eq + PartialEq + core::hash::Hash + Copy,
        Polygon: AsRef<[Index]>,
    {
        let nn = positions.len();
        let nc = polygons.len();

        // First pass over polygon data for some sanity checks
        let mut referenced = vec![false; nn];
        for polygon in polygons.iter().map(|p| p.as_ref()) {
            if polygon.len() < 3 {
                bail!("Cannot build meshes where polygons have less than three vertices.")
            }
            if polygon.iter().duplicates().next().is_some() {
                bail!("Cannot build meshes where a polygon has duplicate vertices")
            }
            for index in polygon {
                if index.as_() >= nn {
                    bail!("Out-of-bounds index in the polygon array {}", index.as_())
                }
                referenced[index.as_()] = true;
            }
        }
        if let Some(n) = referenced.iter().position(|&r| !r) {
            bail!("Node {n} is disconnected from every polygon");
        }

        // Second pass: discover the undirected edges. The first traversal
        // direction of an edge is its main half-edge; seeing the same
        // directed pair twice means the surface is non-manifold or the
        // polygons are not oriented in the same direction.
        let mut pair_to_edge = HashMap::<(usize, usize), usize>::new();
        let mut edge_tail = Vec::<u32>::new();
        let mut edge_head = Vec::<u32>::new();
        let mut left_cell = Vec::<u32>::new();
        let mut right_cell = Vec::<Option<u32>>::new();
        // Cyclically ordered (edge id, is main direction) rims, per cell
        let mut rims: Vec<SVec<(usize, bool)>> = Vec::with_capacity(nc);

        for (c, polygon) in polygons.iter().enumerate() {
            let mut rim = SVec::new();
            for (&a, &b) in polygon.as_ref().iter().circular_tuple_windows() {
                let (a, b) = (a.as_(), b.as_());
                if pair_to_edge.contains_key(&(a, b)) {
                    bail!(
                        "Found multiple oriented edges with the same indices.\
                         This means either (i) surface is non-manifold or (ii) faces \
                         are not oriented in the same direction"
                    )
                }
                if let Some(&e) = pair_to_edge.get(&(b, a)) {
                    pair_to_edge.insert((a, b), e);
                    right_cell[e] = Some(c as u32);
                    rim.push((e, false));
                } else {
                    let e = edge_tail.len();
                    pair_to_edge.insert((a, b), e);
                    edge_tail.push(a as u32);
                    edge_head.push(b as u32);
                    left_cell.push(c as u32);
                    right_cell.push(None);
                    rim.push((e, true));
                }
            }
            rims.push(rim);
        }

        let ne = edge_tail.len();
        let sentinel = nc as u32;

        let mut table = HalfEdgeTable {
            to: vec![0; 2 * ne],
            cell: vec![0; 2 * ne],
            next: vec![0; 2 * ne],
            prev: vec![0; 2 * ne],
            opp: vec![0; 2 * ne],
            main: vec![false; 2 * ne],
        };
        for e in 0..ne {
            table.to[e] = edge_head[e];
            table.cell[e] = left_cell[e];
            table.opp[e] = (ne + e) as u32;
            table.main[e] = true;
            table.to[ne + e] = edge_tail[e];
            table.cell[ne + e] = right_cell[e].unwrap_or(sentinel);
            table.opp[ne + e] = e as u32;
        }

        // Interior next/prev from the per-cell rims
        for rim in &rims {
            for (&(e0, d0), &(e1, d1)) in rim.iter().circular_tuple_windows() {
                let h0 = if d0 { e0 } else { ne + e0 };
                let h1 = if d1 { e1 } else { ne + e1 };
                table.next[h0] = h1 as u32;
                table.prev[h1] = h0 as u32;
            }
        }

        // Sentinel cycles. A boundary twin starts at the head of its
        // interior side; on a manifold boundary each boundary node has
        // exactly one outgoing sentinel half-edge, so chaining through a
        // tail-node map closes every loop.
        let mut outgoing = HashMap::<u32, u32>::new();
        for e in 0..ne {
            if right_cell[e].is_none() && outgoing.insert(edge_head[e], (ne + e) as u32).is_some() {
                bail!(
                    "Node {} is a non-manifold boundary vertex (more than one \
                     boundary fan meets there)",
                    edge_head[e]
                );
            }
        }
        for e in 0..ne {
            if right_cell[e].is_none() {
                let s = ne + e;
                let n = *outgoing
                    .get(&table.to[s])
                    .ok_or_else(|| anyhow!("Open boundary chain at node {}", table.to[s]))?;
                table.next[s] = n;
                table.prev[n as usize] = s as u32;
            }
        }

        log::debug!("imported polygon mesh: {nn} nodes, {ne} edges, {nc} cells");
        Self::from_parts(positions.to_vec(), table, nc)
    }
}
