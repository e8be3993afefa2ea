// Copyright (C) 2026 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

/// The 3x3 lattice split into five polygonal cells: two triangles in the
/// lower-left square, a quad above them, and two more quads on the right.
/// 9 nodes, 13 edges, 5 cells, 8 boundary edges.
fn five_cell_mesh() -> HalfEdgeMesh {
    let _ = env_logger::builder().is_test(true).try_init();
    let positions = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(0.0, 1.0),
        DVec2::new(0.0, 2.0),
        DVec2::new(1.0, 0.0),
        DVec2::new(1.0, 1.0),
        DVec2::new(1.0, 2.0),
        DVec2::new(2.0, 0.0),
        DVec2::new(2.0, 1.0),
        DVec2::new(2.0, 2.0),
    ];
    let cells: Vec<Vec<u32>> = vec![
        vec![0, 3, 4],
        vec![4, 1, 0],
        vec![1, 4, 5, 2],
        vec![3, 6, 7, 4],
        vec![4, 7, 8, 5],
    ];
    HalfEdgeMesh::from_polygon_mesh(&positions, &cells).unwrap()
}

fn marks(mesh: &HalfEdgeMesh, cells: &[usize]) -> Vec<bool> {
    let mut marked = vec![false; mesh.cell_count() + 1];
    for &c in cells {
        assert!(c < mesh.cell_count(), "fixture marks a cell that does not exist");
        marked[c] = true;
    }
    marked
}

fn total_area(mesh: &HalfEdgeMesh) -> f64 {
    mesh.cell_area().iter().sum()
}

fn sorted_positions(mesh: &HalfEdgeMesh) -> Vec<Vec2Ord> {
    let mut pts: Vec<Vec2Ord> = mesh.positions().iter().map(|p| p.to_ord()).collect();
    pts.sort();
    pts
}

fn contains_node(mesh: &HalfEdgeMesh, p: DVec2) -> bool {
    mesh.positions().iter().any(|q| (*q - p).length() < 1e-12)
}

#[test]
fn five_cell_fixture_queries() {
    let mesh = five_cell_mesh();
    assert_eq!(
        mesh.counts(),
        MeshCounts {
            num_nodes: 9,
            num_edges: 13,
            num_cells: 5
        }
    );
    assert_eq!(mesh.vertices_per_cell(), vec![3, 3, 4, 4, 4]);
    assert_eq!(mesh.cell_area(), vec![0.5, 0.5, 1.0, 1.0, 1.0]);
    assert!((total_area(&mesh) - 4.0).abs() < 1e-12);
    assert_eq!(mesh.boundary_edge_index().len(), 8);
    assert_eq!(mesh.boundary_node_index().len(), 8);
    assert_eq!(mesh.boundary_cell_index(), vec![0, 1, 2, 3, 4]);
    assert_eq!(mesh.boundary_loops().len(), 1);
    assert_eq!(mesh.boundary_loops()[0].len(), 8);
    assert_eq!(mesh.subdomain(), &[1, 1, 1, 1, 1, 0]);

    // the area centroid of cell 2 (the unit square between y=1 and y=2)
    let bc = mesh.cell_barycenter();
    assert!((bc[2] - DVec2::new(0.5, 1.5)).length() < 1e-12);

    // every edge agrees with its flags about the sentinel
    let boundary = mesh.boundary_edge_flag();
    for (row, &is_boundary) in mesh.edge_to_cell().iter().zip(&boundary) {
        assert_eq!(row[0] == row[1], is_boundary);
        assert_eq!(row[2] == row[3] && row[0] == row[1], is_boundary);
    }
}

#[test]
fn refine_single_quad_cell() {
    let mut mesh = five_cell_mesh();
    let marked = marks(&mesh, &[2]);
    mesh.refine_poly(&marked, None, false).unwrap();

    assert_eq!(
        mesh.counts(),
        MeshCounts {
            num_nodes: 14,
            num_edges: 21,
            num_cells: 8
        }
    );
    assert!((total_area(&mesh) - 4.0).abs() < 1e-12);
    // the barycenter of the refined square shows up as a node
    assert!(contains_node(&mesh, DVec2::new(0.5, 1.5)));

    // four children at depth one, the parent id reused for one of them
    let levels = mesh.cell_levels();
    let children: Vec<usize> = (0..mesh.cell_count()).filter(|&c| levels[c] == 1).collect();
    assert_eq!(children, vec![2, 5, 6, 7]);
    for &c in &children {
        assert_eq!(mesh.cell_ring(c).len(), 4);
        assert_eq!(mesh.subdomain()[c], 1);
    }
    // untouched cells keep their depth and their shape
    assert_eq!(levels[0], 0);
    assert_eq!(mesh.cell_ring(0).len(), 3);
    // the neighbors gained a conforming midpoint on the shared rim
    assert_eq!(mesh.cell_ring(1).len(), 4);
    assert_eq!(mesh.cell_ring(4).len(), 5);
    // two of the four split edges were boundary edges
    assert_eq!(mesh.boundary_edge_index().len(), 10);
}

#[test]
fn refine_all_cells_uniformly() {
    let mut mesh = five_cell_mesh();
    let marked = marks(&mesh, &[0, 1, 2, 3, 4]);
    mesh.refine_poly(&marked, None, false).unwrap();

    // every cell splits into one child per rim edge
    assert_eq!(
        mesh.counts(),
        MeshCounts {
            num_nodes: 27,
            num_edges: 44,
            num_cells: 18
        }
    );
    assert!((total_area(&mesh) - 4.0).abs() < 1e-12);
    assert!(mesh.cell_levels()[..18].iter().all(|&l| l == 1));
    assert!(mesh.cell_area().iter().all(|&a| a > 0.0));
}

#[test]
fn successive_refinement_passes_stay_consistent() {
    let mut mesh = five_cell_mesh();
    let passes: &[&[usize]] = &[&[2], &[6], &[3], &[1, 5], &[1, 12], &[0, 21]];
    let mut previous_cells = mesh.cell_count();
    for pass in passes {
        let mut marked = vec![false; mesh.cell_count() + 1];
        for &c in pass.iter() {
            // cell ids are reindexed between passes; skip marks that fall
            // outside the current mesh
            if c < mesh.cell_count() {
                marked[c] = true;
            }
        }
        mesh.refine_poly(&marked, None, false).unwrap();
        mesh.validate();
        assert!((total_area(&mesh) - 4.0).abs() < 1e-12);
        assert!(mesh.cell_count() > previous_cells);
        assert!(mesh.cell_area().iter().all(|&a| a > 0.0));
        // the sentinel cycles cover exactly the boundary edges
        let loop_len: usize = mesh.boundary_loops().iter().map(|l| l.len()).sum();
        assert_eq!(loop_len, mesh.boundary_edge_index().len());
        previous_cells = mesh.cell_count();
    }
}

#[test]
fn coarsen_undoes_one_refinement() {
    let mut mesh = five_cell_mesh();
    let original_nodes = sorted_positions(&mesh);
    mesh.refine_poly(&marks(&mesh, &[2]), None, false).unwrap();

    // mark exactly the four children
    let levels = mesh.cell_levels().to_vec();
    let mut marked = vec![false; mesh.cell_count() + 1];
    for c in 0..mesh.cell_count() {
        marked[c] = levels[c] == 1;
    }
    mesh.coarsen_poly(&marked).unwrap();

    assert_eq!(
        mesh.counts(),
        MeshCounts {
            num_nodes: 9,
            num_edges: 13,
            num_cells: 5
        }
    );
    assert!((total_area(&mesh) - 4.0).abs() < 1e-12);
    assert_eq!(sorted_positions(&mesh), original_nodes);
    assert!(mesh.cell_levels().iter().all(|&l| l == 0));
    assert!(mesh.halfedge_levels().iter().all(|&l| l == 0));
    assert_eq!(mesh.subdomain(), &[1, 1, 1, 1, 1, 0]);
}

#[test]
fn coarsen_with_empty_mark_is_identity() {
    let mut mesh = five_cell_mesh();
    mesh.refine_poly(&marks(&mesh, &[2]), None, false).unwrap();
    let counts = mesh.counts();
    mesh.coarsen_poly(&vec![false; mesh.cell_count() + 1]).unwrap();
    assert_eq!(mesh.counts(), counts);
}

#[test]
fn coarsening_a_flat_mesh_dissolves_free_interior_nodes() {
    // With every cell marked and nothing pinned, the level predicate lets
    // the flat interior node go: all five cells fuse into the outer square.
    let mut mesh = five_cell_mesh();
    let marked = marks(&mesh, &[0, 1, 2, 3, 4]);
    mesh.coarsen_poly(&marked).unwrap();
    assert_eq!(
        mesh.counts(),
        MeshCounts {
            num_nodes: 8,
            num_edges: 8,
            num_cells: 1
        }
    );
    assert!((total_area(&mesh) - 4.0).abs() < 1e-12);
    assert_eq!(mesh.cell_ring(0).len(), 8);
}

#[test]
fn pinned_nodes_survive_every_coarsening() {
    let mut mesh = five_cell_mesh();
    mesh.set_fixed_nodes(vec![true; mesh.node_count()]).unwrap();

    let marked = marks(&mesh, &[0, 1, 2, 3, 4]);
    mesh.coarsen_poly(&marked).unwrap();
    // the interior node is pinned, so nothing is removable
    assert_eq!(mesh.counts().num_cells, 5);
    assert_eq!(mesh.counts().num_nodes, 9);
}

#[test]
fn deep_refinement_unwinds_to_the_original_mesh() {
    let mut mesh = five_cell_mesh();
    let passes: &[&[usize]] = &[&[2], &[6], &[3], &[1, 5], &[1, 12], &[0, 21]];
    for pass in passes {
        let mut marked = vec![false; mesh.cell_count() + 1];
        for &c in pass.iter() {
            if c < mesh.cell_count() {
                marked[c] = true;
            }
        }
        mesh.refine_poly(&marked, None, false).unwrap();
    }
    let refined_nodes = mesh.node_count();

    // pin the nine original lattice nodes (appends never reindex old nodes),
    // then coarsen everything until the hierarchy is fully unwound
    let mut fixed = vec![false; mesh.node_count()];
    for f in fixed.iter_mut().take(9) {
        *f = true;
    }
    mesh.set_fixed_nodes(fixed).unwrap();

    for _ in 0..16 {
        let before = mesh.counts();
        let marked = vec![true; mesh.cell_count()]
            .into_iter()
            .chain(std::iter::once(false))
            .collect_vec();
        mesh.coarsen_poly(&marked).unwrap();
        if mesh.counts() == before {
            break;
        }
    }

    assert_eq!(
        mesh.counts(),
        MeshCounts {
            num_nodes: 9,
            num_edges: 13,
            num_cells: 5
        }
    );
    assert!(mesh.node_count() <= refined_nodes);
    assert!((total_area(&mesh) - 4.0).abs() < 1e-12);
    assert_eq!(sorted_positions(&mesh), sorted_positions(&five_cell_mesh()));
    assert!(mesh.cell_levels().iter().all(|&l| l == 0));
}

#[test]
fn edge_only_mode_builds_conforming_interfaces() {
    let mut mesh = five_cell_mesh();
    mesh.refine_poly(&marks(&mesh, &[2]), None, true).unwrap();

    // the rim midpoints exist but no cell was cut
    assert_eq!(
        mesh.counts(),
        MeshCounts {
            num_nodes: 13,
            num_edges: 17,
            num_cells: 5
        }
    );
    assert!(mesh.cell_levels().iter().all(|&l| l == 0));
    assert_eq!(mesh.cell_ring(2).len(), 8);
    assert!((total_area(&mesh) - 4.0).abs() < 1e-12);

    // a second, full pass picks the existing midpoints up instead of
    // splitting anything again
    let marked = marks(&mesh, &[2]);
    mesh.refine_poly(&marked, None, false).unwrap();
    assert_eq!(
        mesh.counts(),
        MeshCounts {
            num_nodes: 14,
            num_edges: 21,
            num_cells: 8
        }
    );
}

#[test]
fn refinement_carries_user_data_along() {
    let mut mesh = five_cell_mesh();
    // a function linear in x: midpoint and barycenter means stay exact
    let values: Vec<f64> = mesh.positions().iter().map(|p| p.x).collect();
    let mut data = HashMap::from([("temperature".to_owned(), values)]);

    mesh.refine_poly(&marks(&mesh, &[2]), Some(&mut data), false).unwrap();

    let values = &data["temperature"];
    assert_eq!(values.len(), mesh.node_count());
    for (value, p) in values.iter().zip(mesh.positions()) {
        assert!((value - p.x).abs() < 1e-12);
    }
}

#[test]
fn refine_rejects_bad_marks() {
    let mut mesh = five_cell_mesh();
    let err = mesh.refine_poly(&[true; 3], None, false).unwrap_err();
    assert_eq!(
        err.downcast_ref::<MeshError>(),
        Some(&MeshError::ShapeMismatch {
            what: "marked cells",
            expected: 6,
            got: 3
        })
    );
    // the sentinel slot must stay false
    assert!(mesh.refine_poly(&[true; 6], None, false).is_err());
    // an empty mark is a silent no-op
    let counts = mesh.counts();
    mesh.refine_poly(&vec![false; 6], None, false).unwrap();
    assert_eq!(mesh.counts(), counts);
}

#[test]
fn shape_specific_entry_points_are_unsupported() {
    let mut mesh = five_cell_mesh();
    let marked = vec![false; mesh.cell_count() + 1];
    for err in [
        mesh.refine_tri(&marked).unwrap_err(),
        mesh.refine_quad(&marked).unwrap_err(),
        mesh.coarsen_tri(&marked).unwrap_err(),
        mesh.coarsen_quad(&marked).unwrap_err(),
    ] {
        assert!(matches!(
            err.downcast_ref::<MeshError>(),
            Some(MeshError::UnsupportedOperation(_))
        ));
    }
}

#[test]
fn triangle_import_of_a_bisected_unit_square() {
    // the unit square cut into 8 triangles on the half-step lattice
    let mut positions = Vec::new();
    for j in 0..3u32 {
        for i in 0..3u32 {
            positions.push(DVec2::new(i as f64 * 0.5, j as f64 * 0.5));
        }
    }
    let n = |i: u32, j: u32| 3 * j + i;
    let mut triangles = Vec::new();
    for j in 0..2 {
        for i in 0..2 {
            let (a, b, c, d) = (n(i, j), n(i + 1, j), n(i + 1, j + 1), n(i, j + 1));
            triangles.push([a, b, c]);
            triangles.push([a, c, d]);
        }
    }
    let mesh = HalfEdgeMesh::from_triangle_mesh(&positions, &triangles).unwrap();

    assert_eq!(
        mesh.counts(),
        MeshCounts {
            num_nodes: 9,
            num_edges: 16,
            num_cells: 8
        }
    );
    assert!((total_area(&mesh) - 1.0).abs() < 1e-12);
    assert_eq!(mesh.vertices_per_cell(), vec![3; 8]);
    // 8 boundary edges, each contributing its two half-edges to the rim
    assert_eq!(mesh.boundary_edge_index().len(), 8);
    assert_eq!(mesh.boundary_loops()[0].len(), 8);

    // uniform refinement keeps the cover exact
    let mut mesh = mesh;
    let marked = vec![true; 8].into_iter().chain([false]).collect_vec();
    mesh.refine_poly(&marked, None, false).unwrap();
    assert_eq!(mesh.cell_count(), 24);
    assert!((total_area(&mesh) - 1.0).abs() < 1e-12);
}

#[test]
fn meshes_with_holes_keep_disjoint_sentinel_cycles() {
    // a square ring of 8 quads around a missing center cell
    let mut positions = Vec::new();
    for j in 0..4u32 {
        for i in 0..4u32 {
            positions.push(DVec2::new(i as f64, j as f64));
        }
    }
    let n = |i: u32, j: u32| 4 * j + i;
    let mut cells = Vec::new();
    for j in 0..3 {
        for i in 0..3 {
            if (i, j) == (1, 1) {
                continue;
            }
            cells.push([n(i, j), n(i + 1, j), n(i + 1, j + 1), n(i, j + 1)]);
        }
    }
    let mesh = HalfEdgeMesh::from_polygon_mesh(&positions, &cells).unwrap();

    assert_eq!(
        mesh.counts(),
        MeshCounts {
            num_nodes: 16,
            num_edges: 24,
            num_cells: 8
        }
    );
    assert!((total_area(&mesh) - 8.0).abs() < 1e-12);

    let mut loops: Vec<usize> = mesh.boundary_loops().iter().map(|l| l.len()).collect();
    loops.sort_unstable();
    assert_eq!(loops, vec![4, 12]);
    assert_eq!(mesh.boundary_edge_index().len(), 16);
    assert_eq!(mesh.boundary_node_index().len(), 16);
}

#[test]
fn marker_feeds_refinement() {
    let mut mesh = five_cell_mesh();
    // a peaked indicator marks only the peak cell under the max strategy
    let eta = [0.1, 0.1, 1.0, 0.1, 0.1];
    let marked = mesh.refine_marker(&eta, 0.5, MarkStrategy::Max).unwrap();
    assert_eq!(marked, vec![false, false, true, false, false, false]);
    mesh.refine_poly(&marked, None, false).unwrap();
    assert_eq!(mesh.cell_count(), 8);

    let err = mesh.refine_marker(&eta, 0.5, MarkStrategy::Max).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MeshError>(),
        Some(MeshError::ShapeMismatch { .. })
    ));
}
