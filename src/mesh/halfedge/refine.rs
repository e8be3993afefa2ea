// Copyright (C) 2026 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

impl HalfEdgeMesh {
    /// Adaptive polygonal refinement.
    ///
    /// Every marked cell is split into one child per "fresh" rim edge by
    /// connecting the midpoints of its subdivided rim edges to the cell's
    /// signed-area barycenter. Edge subdivision propagates across twins, so
    /// neighbors of marked cells gain rim midpoints and stay conforming
    /// without being split themselves. The parent's id is reused for one of
    /// its children; the remaining children take fresh contiguous ids, with
    /// the sentinel rebased past them.
    ///
    /// `marked` carries one slot per cell plus the sentinel slot, which must
    /// be false. With no marked cell the call is a no-op.
    ///
    /// `data` is an optional set of per-node value arrays to carry along:
    /// midpoint rows become the mean of the edge endpoints, barycenter rows
    /// the mean of the parent cell's rim values.
    ///
    /// With `edge_only` the pass stops after edge subdivision: rim midpoints
    /// are inserted but no cell is split. Used to build conforming
    /// interfaces without cutting the cells.
    #[profiling::function]
    pub fn refine_poly(
        &mut self,
        marked: &[bool],
        data: Option<&mut HashMap<String, Vec<f64>>>,
        edge_only: bool,
    ) -> Result<()> {
        let nn = self.node_count();
        let nh = self.halfedge_count();
        let nc = self.cell_count();
        if marked.len() != nc + 1 {
            return Err(MeshError::ShapeMismatch {
                what: "marked cells",
                expected: nc + 1,
                got: marked.len(),
            }
            .into());
        }
        if marked[nc] {
            bail!("the sentinel slot of the marked array must stay false");
        }
        if !marked[..nc].contains(&true) {
            return Ok(());
        }

        let bc = self.cell_barycenter();

        // Step A: a half-edge can be split when neither it nor its prev has
        // been subdivided past its cell's depth. Select the splittable rim of
        // every marked cell, then close the set over twins so midpoints match
        // across cell boundaries.
        let mut split = vec![false; nh];
        for h in 0..nh {
            let c = self.table.cell[h] as usize;
            split[h] = marked[c]
                && self.halfedge_level[h] <= self.cell_level[c]
                && self.halfedge_level[self.table.prev[h] as usize] <= self.cell_level[c];
        }
        for h in 0..nh {
            if !split[h] && split[self.table.opp[h] as usize] {
                split[h] = true;
            }
        }

        // Step B: one midpoint node per selected undirected edge, numbered in
        // main half-edge order. Both twins agree on the node through the
        // shared scratch table.
        let mut midnode = vec![u32::MAX; nh];
        let mut midpoints = Vec::new();
        let mut main_split = Vec::new();
        for h in 0..nh {
            if split[h] && self.table.main[h] {
                let o = self.table.opp[h] as usize;
                let m = (nn + midpoints.len()) as u32;
                midnode[h] = m;
                midnode[o] = m;
                midpoints.push(lerp(
                    self.positions[self.table.to[o] as usize],
                    self.positions[self.table.to[h] as usize],
                    0.5,
                ));
                main_split.push(h);
            }
        }
        let ne1 = midpoints.len();
        log::debug!(
            "refine_poly: {} marked cells, {} edges to split",
            marked[..nc].iter().filter(|&&m| m).count(),
            ne1
        );

        // Carry user data along while the pre-split table is still in view.
        if let Some(data) = data {
            let nv = self.vertices_per_cell_padded();
            for values in data.values_mut() {
                if values.len() != nn {
                    return Err(MeshError::ShapeMismatch {
                        what: "per-node data array",
                        expected: nn,
                        got: values.len(),
                    }
                    .into());
                }
                let mut edge_values = Vec::with_capacity(ne1);
                for &h in &main_split {
                    let o = self.table.opp[h] as usize;
                    edge_values.push(lerp(
                        values[self.table.to[o] as usize],
                        values[self.table.to[h] as usize],
                        0.5,
                    ));
                }
                let mut cell_values = vec![0.0; nc + 1];
                for h in 0..nh {
                    cell_values[self.table.cell[h] as usize] += values[self.table.to[h] as usize];
                }
                for (value, &count) in cell_values.iter_mut().zip(&nv) {
                    if count > 0 {
                        *value /= count as f64;
                    }
                }
                values.extend(edge_values);
                if !edge_only {
                    for c in 0..nc {
                        if marked[c] {
                            values.push(cell_values[c]);
                        }
                    }
                }
            }
        }

        // Step C: insert one child half-edge before every selected one. The
        // child spans from the old tail to the midpoint, the parent keeps the
        // half from the midpoint to its old head. Children are appended in
        // parent index order; all link reads below see the stable pre-split
        // table because the rewiring pass runs only after every child row has
        // been staged.
        let mut new_id = vec![u32::MAX; nh];
        let mut next_free = nh as u32;
        for h in 0..nh {
            if split[h] {
                new_id[h] = next_free;
                next_free += 1;
            }
        }
        for h in 0..nh {
            if !split[h] {
                continue;
            }
            let p = self.table.prev[h] as usize;
            let level = self.halfedge_level[h].max(self.halfedge_level[p]) + 1;
            self.table.push(
                midnode[h],
                self.table.cell[h],
                0, // next is rebuilt from prev below
                p as u32,
                self.table.opp[h],
                self.table.main[h],
            );
            self.halfedge_level.push(level);
        }
        // Rewire: the parent's prev becomes its child; the parent's twin
        // becomes the child of its old twin ("prev of the old opposite").
        for h in 0..nh {
            if !split[h] {
                continue;
            }
            let o = self.table.opp[h] as usize;
            self.table.prev[h] = new_id[h];
            self.table.opp[h] = new_id[o];
        }
        // prev is a permutation again; next is its inverse.
        for h in 0..self.table.len() {
            let p = self.table.prev[h] as usize;
            self.table.next[p] = h as u32;
        }

        // New midpoint nodes: position, level (depth of the half-edge
        // children pointing at the midpoint), free by default.
        self.positions.extend_from_slice(&midpoints);
        let mut midpoint_level = vec![0u32; ne1];
        for h in 0..nh {
            if split[h] {
                let child = new_id[h] as usize;
                let m = self.table.to[child] as usize - nn;
                midpoint_level[m] = midpoint_level[m].max(self.halfedge_level[child]);
            }
        }
        self.node_level.extend(midpoint_level);
        self.fixed.extend(std::iter::repeat(false).take(ne1));

        if edge_only {
            self.reinit(nc);
            return Ok(());
        }

        // Step D: star-connect every marked cell. The fresh rim half-edges
        // (depth one past the cell) anchor the wedges; each wedge is the
        // anchor plus the stale rim behind it, closed by a spoke pair through
        // the barycenter.
        let total = self.table.len();
        let fresh: Vec<bool> = (0..total)
            .map(|h| {
                let c = self.table.cell[h] as usize;
                self.halfedge_level[h] == self.cell_level[c] + 1
            })
            .collect();

        let mut anchors = Vec::new();
        for h in 0..total {
            let c = self.table.cell[h] as usize;
            if c < nc && marked[c] && fresh[h] {
                anchors.push((h, c));
            }
        }
        let n_spokes = anchors.len();
        let n_parents = {
            let mut seen = vec![false; nc];
            let mut count = 0;
            for &(_, c) in &anchors {
                if !seen[c] {
                    seen[c] = true;
                    count += 1;
                }
            }
            count
        };
        let new_nc = nc + n_spokes - n_parents;
        let new_sentinel = new_nc as u32;

        // Rebase the sentinel past the children-to-be.
        for h in 0..total {
            if self.table.cell[h] as usize == nc {
                self.table.cell[h] = new_sentinel;
            }
        }

        // Wedge ids: the first wedge of each parent keeps the parent id.
        let mut first_seen = vec![false; nc];
        let mut next_cell = nc as u32;
        let mut wedge_cell = Vec::with_capacity(n_spokes);
        for &(h, parent) in &anchors {
            let id = if !first_seen[parent] {
                first_seen[parent] = true;
                parent as u32
            } else {
                let id = next_cell;
                next_cell += 1;
                id
            };
            self.table.cell[h] = id;
            wedge_cell.push(id);
        }
        debug_assert_eq!(next_cell as usize, new_nc);

        // Children live one level below their parent; the parent slot now
        // describes its reused first wedge.
        for c in 0..nc {
            if marked[c] {
                self.cell_level[c] += 1;
            }
        }

        // Old next of each anchor, before the spokes cut in.
        let nex0: Vec<u32> = anchors.iter().map(|&(h, _)| self.table.next[h]).collect();

        // Flood each wedge backwards from its anchor over the stale rim.
        let mut rim_start = Vec::with_capacity(n_spokes);
        for (j, &(h, _)) in anchors.iter().enumerate() {
            let mut start = h;
            let mut count = 0;
            loop {
                if count > MAX_LOOP_ITERATIONS {
                    panic!("Max number of iterations reached. Is the mesh malformed?");
                }
                count += 1;
                let p = self.table.prev[start] as usize;
                if fresh[p] {
                    break;
                }
                start = p;
                self.table.cell[start] = wedge_cell[j];
            }
            rim_start.push(start);
        }
        let pre1: Vec<u32> = rim_start.iter().map(|&s| self.table.prev[s]).collect();

        // Spoke index tables: in-spoke j = total + j (rim to barycenter),
        // out-spoke j = total + n_spokes + j (barycenter back to the rim).
        let mut in_spoke_at = vec![u32::MAX; total];
        let mut out_spoke_at = vec![u32::MAX; total];
        for (j, &(h, _)) in anchors.iter().enumerate() {
            in_spoke_at[h] = (total + j) as u32;
            out_spoke_at[rim_start[j]] = (total + n_spokes + j) as u32;
        }

        // One barycenter node per marked cell, in cell index order.
        let mut cell_node = vec![u32::MAX; nc];
        for c in 0..nc {
            if marked[c] {
                cell_node[c] = self.positions.len() as u32;
                self.positions.push(bc[c]);
                self.node_level.push(self.cell_level[c]);
                self.fixed.push(false);
            }
        }

        for (j, &(h, _)) in anchors.iter().enumerate() {
            self.table.next[h] = (total + j) as u32;
            self.table.prev[rim_start[j]] = (total + n_spokes + j) as u32;
        }
        for (j, &(anchor, parent)) in anchors.iter().enumerate() {
            let level = self.cell_level[parent];
            // The in-spoke's twin is the out-spoke of the wedge across the
            // shared midpoint, which starts where the anchor's old next was.
            self.table.push(
                cell_node[parent],
                wedge_cell[j],
                (total + n_spokes + j) as u32,
                anchor as u32,
                out_spoke_at[nex0[j] as usize],
                true,
            );
            self.halfedge_level.push(level);
        }
        for (j, &(_, parent)) in anchors.iter().enumerate() {
            let level = self.cell_level[parent];
            let p1 = pre1[j] as usize;
            self.table.push(
                self.table.to[p1],
                wedge_cell[j],
                rim_start[j] as u32,
                (total + j) as u32,
                in_spoke_at[p1],
                false,
            );
            self.halfedge_level.push(level);
        }

        // Per-cell tables grow by the new wedges; the sentinel slot moves to
        // the end.
        self.cell_level.truncate(nc);
        self.subdomain.truncate(nc);
        let mut new_levels = vec![0u32; new_nc - nc];
        let mut new_tags = vec![0i32; new_nc - nc];
        for (j, &(_, parent)) in anchors.iter().enumerate() {
            let id = wedge_cell[j] as usize;
            if id >= nc {
                new_levels[id - nc] = self.cell_level[parent];
                new_tags[id - nc] = self.subdomain[parent];
            }
        }
        self.cell_level.extend(new_levels);
        self.cell_level.push(0);
        self.subdomain.extend(new_tags);
        self.subdomain.push(0);

        // Step E: relabel through an index map. Parent-id reuse keeps the
        // index space contiguous, so the map only compacts if a marked cell
        // somehow produced no child.
        let mut used = vec![false; new_nc + 1];
        for h in 0..self.table.len() {
            used[self.table.cell[h] as usize] = true;
        }
        let final_nc = if used.iter().all(|&u| u) {
            new_nc
        } else {
            let mut map = vec![0u32; new_nc + 1];
            let mut compact = 0u32;
            for (c, &keep) in used.iter().enumerate() {
                if keep {
                    map[c] = compact;
                    compact += 1;
                }
            }
            for h in 0..self.table.len() {
                self.table.cell[h] = map[self.table.cell[h] as usize];
            }
            self.cell_level = self
                .cell_level
                .iter_cpy()
                .zip(&used)
                .filter_map(|(level, &keep)| keep.then_some(level))
                .collect();
            self.subdomain = self
                .subdomain
                .iter_cpy()
                .zip(&used)
                .filter_map(|(tag, &keep)| keep.then_some(tag))
                .collect();
            compact as usize - 1
        };

        self.reinit(final_nc);
        Ok(())
    }

    /// Triangle red/green refinement. Declared for API parity with the
    /// polygonal operator but not implemented yet; use
    /// [`refine_poly`](Self::refine_poly), which handles triangle cells.
    pub fn refine_tri(&mut self, _marked: &[bool]) -> Result<()> {
        Err(MeshError::UnsupportedOperation("refine_tri").into())
    }

    /// Quad refinement. Declared for API parity but not implemented yet; use
    /// [`refine_poly`](Self::refine_poly), which handles quad cells.
    pub fn refine_quad(&mut self, _marked: &[bool]) -> Result<()> {
        Err(MeshError::UnsupportedOperation("refine_quad").into())
    }
}
