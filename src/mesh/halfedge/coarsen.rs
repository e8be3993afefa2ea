// Copyright (C) 2026 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

impl HalfEdgeMesh {
    /// Adaptive polygonal coarsening, the inverse of
    /// [`refine_poly`](Self::refine_poly).
    ///
    /// A node is removable when every half-edge pointing at it (i) was born
    /// in its cell's latest refinement, (ii) has the same depth as its twin
    /// and (iii) lies in a marked cell, and the node is not pinned. That
    /// singles out the barycenters of fully co-refined, fully marked stars.
    /// The cells of each star fuse back into one parent cell, the spokes are
    /// spliced out of the rim, and rim edge pairs left over from the undone
    /// subdivision collapse back into single edges, cascading until none
    /// qualify. A final pass compacts the node, half-edge and cell index
    /// spaces.
    ///
    /// `marked` carries one slot per cell plus the sentinel slot, which must
    /// be false. With nothing removable the call is a no-op.
    #[profiling::function]
    pub fn coarsen_poly(&mut self, marked: &[bool]) -> Result<()> {
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

        // Eligibility: conjunction over the incident half-edges, scattered
        // through the `to` column.
        let mut removable = vec![true; nn];
        for h in 0..nh {
            let c = self.table.cell[h] as usize;
            let ok = self.halfedge_level[h] == self.cell_level[c]
                && self.halfedge_level[h] == self.halfedge_level[self.table.opp[h] as usize]
                && marked[c];
            if !ok {
                removable[self.table.to[h] as usize] = false;
            }
        }
        for (node, &pinned) in self.fixed.iter().enumerate() {
            if pinned {
                removable[node] = false;
            }
        }
        let n_removed = removable.iter().filter(|&&r| r).count();
        if n_removed == 0 {
            return Ok(());
        }
        log::debug!("coarsen_poly: removing {n_removed} star centers");

        // Step A: plan the cell merges. Every removable node turns into one
        // fused cell drawn from the block [nc, nc + n_removed); each cell of
        // its star maps onto it. The sentinel is rebased past the block.
        let mut node_cell = vec![u32::MAX; nn];
        {
            let mut next = nc as u32;
            for n in 0..nn {
                if removable[n] {
                    node_cell[n] = next;
                    next += 1;
                }
            }
        }
        let new_sentinel = (nc + n_removed) as u32;

        let mut dead_hedge = vec![false; nh];
        for h in 0..nh {
            let o = self.table.opp[h] as usize;
            dead_hedge[h] = removable[self.table.to[h] as usize]
                || removable[self.table.to[o] as usize];
        }

        // Node depths via the original scatter: any incident half-edge's
        // depth (they agree on star centers). The fused cell sits one level
        // below its star.
        let mut node_depth = vec![0u32; nn];
        for h in 0..nh {
            node_depth[self.table.to[h] as usize] = self.halfedge_level[h];
        }

        let mut cell_level = self.cell_level[..nc].to_vec();
        let mut subdomain = self.subdomain[..nc].to_vec();
        cell_level.resize(nc + n_removed, 0);
        subdomain.resize(nc + n_removed, 0);
        for n in 0..nn {
            if removable[n] {
                cell_level[node_cell[n] as usize] = node_depth[n].saturating_sub(1);
            }
        }

        let mut cell_map: Vec<u32> = (0..=nc as u32).collect();
        cell_map[nc] = new_sentinel;
        for h in 0..nh {
            let to = self.table.to[h] as usize;
            if removable[to] {
                let c = self.table.cell[h] as usize;
                cell_map[c] = node_cell[to];
                subdomain[node_cell[to] as usize] = self.subdomain[c];
            }
        }
        for h in 0..nh {
            self.table.cell[h] = cell_map[self.table.cell[h] as usize];
        }
        cell_level.push(0);
        subdomain.push(0);

        // Step B: splice the spokes out of the fused rims. A rim half-edge
        // whose next points at a removable node jumps to the half-edge after
        // the twin spoke instead, skipping both spokes at once. The batch is
        // planned against the frozen links and applied afterwards.
        let mut splices = Vec::new();
        for h in 0..nh {
            if dead_hedge[h] {
                continue;
            }
            let nx = self.table.next[h] as usize;
            if removable[self.table.to[nx] as usize] {
                let o = self.table.opp[nx] as usize;
                splices.push((h, self.table.next[o]));
            }
        }
        for &(h, next) in &splices {
            self.table.next[h] = next;
            self.table.prev[next as usize] = h as u32;
        }

        // Step C: collapse rim edge pairs left over from the undone
        // subdivision. A half-edge strictly deeper than both its rim
        // neighbors whose twin pair is also consecutive on the far side gets
        // spliced into its next; the shared midpoint becomes removable too.
        // Each round is planned against a frozen view (the two sides of one
        // edge qualify together and their splices must not see each other),
        // and rounds cascade until nothing qualifies.
        loop {
            let mut qualified = vec![false; nh];
            for h in 0..nh {
                if dead_hedge[h] {
                    continue;
                }
                let nx = self.table.next[h] as usize;
                let twin_nx = self.table.opp[nx] as usize;
                let far = self.table.next[twin_nx] as usize;
                qualified[h] = self.table.opp[far] as usize == h
                    && self.halfedge_level[h] > self.halfedge_level[nx]
                    && self.halfedge_level[h] > self.halfedge_level[self.table.prev[h] as usize];
            }
            // An edge pair collapses only as a pair: the partner across the
            // midpoint must qualify too, or the twin links would go stale.
            let batch: Vec<usize> = (0..nh)
                .filter(|&h| {
                    qualified[h]
                        && qualified[self.table.opp[self.table.next[h] as usize] as usize]
                })
                .collect();
            if batch.is_empty() {
                break;
            }
            let planned: Vec<(usize, u32, u32, u32)> = batch
                .iter()
                .map(|&h| (h, self.table.prev[h], self.table.next[h], self.table.opp[h]))
                .collect();
            for &(h, prev, next, opp) in &planned {
                self.table.next[prev as usize] = next;
                self.table.prev[next as usize] = prev;
                self.table.opp[next as usize] = opp;
                dead_hedge[h] = true;
                removable[self.table.to[h] as usize] = true;
            }
        }

        // Step D: compact the three index spaces through forward maps.
        let mut node_map = vec![u32::MAX; nn];
        let mut kept_nodes = 0u32;
        for n in 0..nn {
            if !removable[n] {
                node_map[n] = kept_nodes;
                kept_nodes += 1;
            }
        }
        let mut hedge_map = vec![u32::MAX; nh];
        let mut kept_hedges = 0u32;
        for h in 0..nh {
            if !dead_hedge[h] {
                hedge_map[h] = kept_hedges;
                kept_hedges += 1;
            }
        }
        let mut used_cell = vec![false; nc + n_removed + 1];
        for h in 0..nh {
            if !dead_hedge[h] {
                used_cell[self.table.cell[h] as usize] = true;
            }
        }
        let mut cell_compact = vec![u32::MAX; nc + n_removed + 1];
        let mut kept_cells = 0u32;
        for (c, &used) in used_cell.iter().enumerate() {
            if used {
                cell_compact[c] = kept_cells;
                kept_cells += 1;
            }
        }

        let mut table = HalfEdgeTable::with_capacity(kept_hedges as usize);
        let mut halfedge_level = Vec::with_capacity(kept_hedges as usize);
        for h in 0..nh {
            if dead_hedge[h] {
                continue;
            }
            table.push(
                node_map[self.table.to[h] as usize],
                cell_compact[self.table.cell[h] as usize],
                hedge_map[self.table.next[h] as usize],
                hedge_map[self.table.prev[h] as usize],
                hedge_map[self.table.opp[h] as usize],
                self.table.main[h],
            );
            halfedge_level.push(self.halfedge_level[h]);
        }
        self.table = table;
        self.halfedge_level = halfedge_level;

        self.positions = self
            .positions
            .iter_cpy()
            .zip(&removable)
            .filter_map(|(p, &gone)| (!gone).then_some(p))
            .collect();
        self.node_level = self
            .node_level
            .iter_cpy()
            .zip(&removable)
            .filter_map(|(level, &gone)| (!gone).then_some(level))
            .collect();
        self.fixed = self
            .fixed
            .iter_cpy()
            .zip(&removable)
            .filter_map(|(pin, &gone)| (!gone).then_some(pin))
            .collect();
        self.cell_level = cell_level
            .iter_cpy()
            .zip(&used_cell)
            .filter_map(|(level, &used)| used.then_some(level))
            .collect();
        self.subdomain = subdomain
            .iter_cpy()
            .zip(&used_cell)
            .filter_map(|(tag, &used)| used.then_some(tag))
            .collect();

        self.reinit(kept_cells as usize - 1);
        Ok(())
    }

    /// Triangle coarsening. Declared for API parity with the polygonal
    /// operator but not implemented yet; use
    /// [`coarsen_poly`](Self::coarsen_poly).
    pub fn coarsen_tri(&mut self, _marked: &[bool]) -> Result<()> {
        Err(MeshError::UnsupportedOperation("coarsen_tri").into())
    }

    /// Quad coarsening. Declared for API parity but not implemented yet; use
    /// [`coarsen_poly`](Self::coarsen_poly).
    pub fn coarsen_quad(&mut self, _marked: &[bool]) -> Result<()> {
        Err(MeshError::UnsupportedOperation("coarsen_quad").into())
    }
}
