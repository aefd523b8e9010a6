//! Cell-count law and hull consistency on a conformal mesh mixing all four
//! cell types: a hex with a pyramid on top, a tet on one pyramid flank, and
//! a prism against one hex side.

use mesh_refine::geometry::length_scale::setup_length_scales;
use mesh_refine::mesh::sizing::RefinedMeshTally;
use mesh_refine::mesh::UnstructuredMesh;
use mesh_refine::refine;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn mixed_mesh() -> UnstructuredMesh {
    let mut mesh = UnstructuredMesh::new();
    // Hex corners 0..8.
    mesh.add_vert([0.0, 0.0, 0.0]);
    mesh.add_vert([1.0, 0.0, 0.0]);
    mesh.add_vert([1.0, 1.0, 0.0]);
    mesh.add_vert([0.0, 1.0, 0.0]);
    mesh.add_vert([0.0, 0.0, 1.0]);
    mesh.add_vert([1.0, 0.0, 1.0]);
    mesh.add_vert([1.0, 1.0, 1.0]);
    mesh.add_vert([0.0, 1.0, 1.0]);
    // Pyramid apex above the hex.
    mesh.add_vert([0.5, 0.5, 1.75]);
    // Tet tip off the pyramid's y = 0 flank.
    mesh.add_vert([0.5, -0.5, 1.5]);
    // Prism nose beyond the x = 1 side.
    mesh.add_vert([2.0, 0.5, 0.0]);
    mesh.add_vert([2.0, 0.5, 1.0]);

    mesh.add_hex([0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
    // Base is the hex top face, walked so the apex is above it.
    mesh.add_pyramid([4, 5, 6, 7, 8]).unwrap();
    // Shares the pyramid face (4, 5, 8).
    mesh.add_tet([4, 5, 8, 9]).unwrap();
    // Quad face (1, 2, 6, 5) of the prism matches the hex x = 1 side.
    mesh.add_prism([1, 2, 10, 5, 6, 11]).unwrap();
    mesh.synthesize_missing_boundary();
    mesh.validate().unwrap();
    mesh
}

#[test]
fn cell_count_law_for_all_n() {
    for n in [1usize, 2, 3, 5] {
        let coarse = mixed_mesh();
        let n64 = n as u64;
        let refined = refine(&coarse, n).unwrap();

        let tets_from_pyr = 2 * (n64 * n64 * n64 - n64) / 3;
        assert_eq!(
            refined.num_tets() as u64,
            n64 * n64 * n64 + tets_from_pyr,
            "n = {n}"
        );
        assert_eq!(
            refined.num_pyramids() as u64,
            (2 * n64 * n64 * n64 + n64) / 3,
            "n = {n}"
        );
        assert_eq!(refined.num_prisms() as u64, n64 * n64 * n64, "n = {n}");
        assert_eq!(refined.num_hexes() as u64, n64 * n64 * n64, "n = {n}");

        // The tally the driver pre-allocated from is exact.
        let tally = RefinedMeshTally::compute(&coarse, n).unwrap();
        assert_eq!(refined.num_verts() as u64, tally.verts);
        assert_eq!(refined.num_bdry_tris() as u64, tally.bdry_tris);
        assert_eq!(refined.num_bdry_quads() as u64, tally.bdry_quads);

        // Hull accounting closes: interior faces pair up, boundary faces
        // cover the rest exactly once.
        refined.validate().unwrap();
    }
}

#[test]
fn refined_verts_are_geometrically_distinct() {
    let refined = refine(&mixed_mesh(), 3).unwrap();
    let mut coords: Vec<[f64; 3]> = (0..refined.num_verts() as u32)
        .map(|v| refined.coords(v))
        .collect();
    coords.sort_by(|a, b| a.partial_cmp(b).unwrap());
    for w in coords.windows(2) {
        let dist2: f64 = (0..3).map(|k| (w[0][k] - w[1][k]).powi(2)).sum();
        assert!(dist2 > 1e-20, "coincident verts at {:?}", w[0]);
    }
}

#[test]
fn jittered_geometry_with_recomputed_scales_still_closes() {
    let coarse = mixed_mesh();
    // Shift every vertex a little; shared vertices move together, so the
    // mesh stays conformal but no edge is uniform any more.
    let mut jittered = UnstructuredMesh::new();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for v in 0..coarse.num_verts() as u32 {
        let mut c = coarse.coords(v);
        for x in &mut c {
            *x += rng.gen_range(-0.08..0.08);
        }
        jittered.add_vert(c);
    }
    for ci in 0..coarse.num_hexes() {
        jittered.add_hex(coarse.hex_verts(ci)).unwrap();
    }
    for ci in 0..coarse.num_pyramids() {
        jittered.add_pyramid(coarse.pyramid_verts(ci)).unwrap();
    }
    for ci in 0..coarse.num_tets() {
        jittered.add_tet(coarse.tet_verts(ci)).unwrap();
    }
    for ci in 0..coarse.num_prisms() {
        jittered.add_prism(coarse.prism_verts(ci)).unwrap();
    }
    jittered.synthesize_missing_boundary();
    setup_length_scales(&mut jittered);

    let n = 3usize;
    let refined = refine(&jittered, n).unwrap();
    refined.validate().unwrap();
    let tally = RefinedMeshTally::compute(&jittered, n).unwrap();
    assert_eq!(refined.num_verts() as u64, tally.verts);
}
