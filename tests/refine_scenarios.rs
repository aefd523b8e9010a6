//! End-to-end refinement scenarios on single cells.

use mesh_refine::geometry::parametric::edge_parametric_division;
use mesh_refine::mesh::UnstructuredMesh;
use mesh_refine::refine;

fn unit_tet() -> UnstructuredMesh {
    let mut mesh = UnstructuredMesh::new();
    mesh.add_vert([0.0, 0.0, 0.0]);
    mesh.add_vert([1.0, 0.0, 0.0]);
    mesh.add_vert([0.0, 1.0, 0.0]);
    mesh.add_vert([0.0, 0.0, 1.0]);
    mesh.add_tet([0, 1, 2, 3]).unwrap();
    mesh.synthesize_missing_boundary();
    mesh
}

fn unit_hex() -> UnstructuredMesh {
    let mut mesh = UnstructuredMesh::new();
    mesh.add_vert([0.0, 0.0, 0.0]);
    mesh.add_vert([1.0, 0.0, 0.0]);
    mesh.add_vert([1.0, 1.0, 0.0]);
    mesh.add_vert([0.0, 1.0, 0.0]);
    mesh.add_vert([0.0, 0.0, 1.0]);
    mesh.add_vert([1.0, 0.0, 1.0]);
    mesh.add_vert([1.0, 1.0, 1.0]);
    mesh.add_vert([0.0, 1.0, 1.0]);
    mesh.add_hex([0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
    mesh.synthesize_missing_boundary();
    mesh
}

fn unit_pyramid() -> UnstructuredMesh {
    let mut mesh = UnstructuredMesh::new();
    mesh.add_vert([0.0, 0.0, 0.0]);
    mesh.add_vert([1.0, 0.0, 0.0]);
    mesh.add_vert([1.0, 1.0, 0.0]);
    mesh.add_vert([0.0, 1.0, 0.0]);
    mesh.add_vert([0.5, 0.5, 1.0]);
    mesh.add_pyramid([0, 1, 2, 3, 4]).unwrap();
    mesh.synthesize_missing_boundary();
    mesh
}

fn unit_prism() -> UnstructuredMesh {
    let mut mesh = UnstructuredMesh::new();
    mesh.add_vert([0.0, 0.0, 0.0]);
    mesh.add_vert([1.0, 0.0, 0.0]);
    mesh.add_vert([0.0, 1.0, 0.0]);
    mesh.add_vert([0.0, 0.0, 1.0]);
    mesh.add_vert([1.0, 0.0, 1.0]);
    mesh.add_vert([0.0, 1.0, 1.0]);
    mesh.add_prism([0, 1, 2, 3, 4, 5]).unwrap();
    mesh.synthesize_missing_boundary();
    mesh
}

fn has_vert_at(mesh: &UnstructuredMesh, p: [f64; 3]) -> bool {
    (0..mesh.num_verts() as u32).any(|v| {
        let c = mesh.coords(v);
        (0..3).all(|k| (c[k] - p[k]).abs() < 1e-12)
    })
}

#[test]
fn single_tet_n2() {
    let refined = refine(&unit_tet(), 2).unwrap();
    assert_eq!(refined.num_tets(), 8);
    assert_eq!(refined.num_verts(), 10);
    assert_eq!(refined.num_bdry_tris(), 16);
    refined.validate().unwrap();
    // The six edge midpoints all exist.
    for mid in [
        [0.5, 0.0, 0.0],
        [0.0, 0.5, 0.0],
        [0.0, 0.0, 0.5],
        [0.5, 0.5, 0.0],
        [0.5, 0.0, 0.5],
        [0.0, 0.5, 0.5],
    ] {
        assert!(has_vert_at(&refined, mid), "missing midpoint {mid:?}");
    }
}

#[test]
fn single_hex_n3_is_a_4x4x4_lattice() {
    let refined = refine(&unit_hex(), 3).unwrap();
    assert_eq!(refined.num_hexes(), 27);
    assert_eq!(refined.num_verts(), 64);
    assert_eq!(refined.num_bdry_quads(), 54);
    refined.validate().unwrap();
    // Every vertex sits on the uniform lattice, and all 64 slots are taken.
    let mut seen = std::collections::HashSet::new();
    for v in 0..refined.num_verts() as u32 {
        let c = refined.coords(v);
        let mut slot = [0i32; 3];
        for k in 0..3 {
            let scaled = c[k] * 3.0;
            assert!(
                (scaled - scaled.round()).abs() < 1e-12,
                "vert {v} off-lattice at {c:?}"
            );
            slot[k] = scaled.round() as i32;
        }
        assert!(seen.insert(slot), "duplicate lattice vert at {slot:?}");
    }
    assert_eq!(seen.len(), 64);
}

#[test]
fn single_pyramid_n2() {
    let refined = refine(&unit_pyramid(), 2).unwrap();
    assert_eq!(refined.num_pyramids(), 6);
    assert_eq!(refined.num_tets(), 4);
    assert_eq!(refined.num_verts(), 14);
    assert_eq!(refined.num_bdry_quads(), 4);
    assert_eq!(refined.num_bdry_tris(), 16);
    refined.validate().unwrap();
    // Coarse verts keep their ids; the apex is untouched.
    assert_eq!(refined.coords(4), [0.5, 0.5, 1.0]);
}

#[test]
fn prism_with_stretched_vertical_edge_n4() {
    let mut coarse = unit_prism();
    // Vertex 0 carries a quarter of the spacing of vertex 3, so the edge
    // (0, 3) grades toward the bottom.
    coarse.set_length_scale(0, 0.25);
    let refined = refine(&coarse, 4).unwrap();
    refined.validate().unwrap();

    // The refined verts on that edge are exactly the x = y = 0 ones.
    let mut heights: Vec<f64> = (0..refined.num_verts() as u32)
        .map(|v| refined.coords(v))
        .filter(|c| c[0].abs() < 1e-12 && c[1].abs() < 1e-12)
        .map(|c| c[2])
        .collect();
    heights.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(heights.len(), 5);
    assert!(heights.windows(2).all(|w| w[1] > w[0]), "not monotone: {heights:?}");
    assert!(
        heights[1] < 0.25,
        "expected clustering toward the short end, got u1 = {}",
        heights[1]
    );
    // And they reproduce the cubic distribution exactly.
    let params = edge_parametric_division(0.25, 1.0, 4);
    for (h, p) in heights.iter().zip(&params) {
        assert!((h - p).abs() < 1e-12, "{h} vs {p}");
    }
}

#[test]
fn tet_edge_coords_follow_parametric_positions() {
    let mut coarse = unit_tet();
    coarse.set_length_scale(1, 4.0);
    let refined = refine(&coarse, 5).unwrap();
    // Verts on edge (0, 1) are the y = z = 0 ones; their x positions are
    // the recorded parametric values of that edge.
    let mut xs: Vec<f64> = (0..refined.num_verts() as u32)
        .map(|v| refined.coords(v))
        .filter(|c| c[1].abs() < 1e-12 && c[2].abs() < 1e-12)
        .map(|c| c[0])
        .collect();
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let params = edge_parametric_division(1.0, 4.0, 5);
    assert_eq!(xs.len(), params.len());
    for (x, p) in xs.iter().zip(&params) {
        assert!((x - p).abs() < 1e-12);
    }
}

#[test]
fn n1_is_identity_up_to_nothing_at_all() {
    for coarse in [unit_tet(), unit_pyramid(), unit_prism(), unit_hex()] {
        let refined = refine(&coarse, 1).unwrap();
        assert_eq!(refined.num_verts(), coarse.num_verts());
        assert_eq!(refined.total_cells(), 1);
        assert_eq!(refined.num_bdry_tris(), coarse.num_bdry_tris());
        assert_eq!(refined.num_bdry_quads(), coarse.num_bdry_quads());
        // Coarse verts are copied in order, so connectivity is unchanged.
        for ci in 0..coarse.num_tets() {
            assert_eq!(refined.tet_verts(ci), coarse.tet_verts(ci));
        }
        for ci in 0..coarse.num_pyramids() {
            assert_eq!(refined.pyramid_verts(ci), coarse.pyramid_verts(ci));
        }
        for ci in 0..coarse.num_prisms() {
            assert_eq!(refined.prism_verts(ci), coarse.prism_verts(ci));
        }
        for ci in 0..coarse.num_hexes() {
            assert_eq!(refined.hex_verts(ci), coarse.hex_verts(ci));
        }
        refined.validate().unwrap();
    }
}

#[test]
fn two_tets_share_refined_face_verts_n3() {
    let mut mesh = UnstructuredMesh::new();
    mesh.add_vert([0.0, 0.0, 0.0]);
    mesh.add_vert([1.0, 0.0, 0.0]);
    mesh.add_vert([0.0, 1.0, 0.0]);
    mesh.add_vert([0.0, 0.0, 1.0]);
    mesh.add_vert([1.0, 1.0, 1.0]);
    mesh.add_tet([0, 1, 2, 3]).unwrap();
    mesh.add_tet([1, 2, 3, 4]).unwrap();
    mesh.synthesize_missing_boundary();

    let refined = refine(&mesh, 3).unwrap();
    assert_eq!(refined.num_tets(), 54);
    // 5 coarse + 9 edges * 2 + 7 faces * 1 interior: duplicates on the
    // shared face would inflate this.
    assert_eq!(refined.num_verts(), 30);
    // Hull accounting closes only if the two sides agreed on every vertex.
    refined.validate().unwrap();
    // And no two verts coincide geometrically.
    for a in 0..refined.num_verts() as u32 {
        for b in a + 1..refined.num_verts() as u32 {
            let (ca, cb) = (refined.coords(a), refined.coords(b));
            let dist2: f64 = (0..3).map(|k| (ca[k] - cb[k]).powi(2)).sum();
            assert!(dist2 > 1e-20, "verts {a} and {b} coincide at {ca:?}");
        }
    }
}
