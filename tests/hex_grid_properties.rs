//! Property test: refining a structured hex grid of any shape gives the
//! closed-form lattice counts, and hull accounting always closes.

use mesh_refine::mesh::UnstructuredMesh;
use mesh_refine::refine;
use proptest::prelude::*;

fn hex_grid(dx: usize, dy: usize, dz: usize) -> UnstructuredMesh {
    let mut mesh = UnstructuredMesh::new();
    let v = |x: usize, y: usize, z: usize| ((x * (dy + 1) + y) * (dz + 1) + z) as u32;
    for x in 0..=dx {
        for y in 0..=dy {
            for z in 0..=dz {
                mesh.add_vert([x as f64, y as f64, z as f64]);
            }
        }
    }
    for x in 0..dx {
        for y in 0..dy {
            for z in 0..dz {
                mesh.add_hex([
                    v(x, y, z),
                    v(x + 1, y, z),
                    v(x + 1, y + 1, z),
                    v(x, y + 1, z),
                    v(x, y, z + 1),
                    v(x + 1, y, z + 1),
                    v(x + 1, y + 1, z + 1),
                    v(x, y + 1, z + 1),
                ])
                .unwrap();
            }
        }
    }
    mesh.synthesize_missing_boundary();
    mesh
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn refined_grid_counts_are_closed_form(
        dx in 1usize..=3,
        dy in 1usize..=2,
        dz in 1usize..=2,
        n in 1usize..=3,
    ) {
        let coarse = hex_grid(dx, dy, dz);
        let refined = refine(&coarse, n).unwrap();
        prop_assert_eq!(refined.num_hexes(), dx * dy * dz * n * n * n);
        prop_assert_eq!(
            refined.num_verts(),
            (dx * n + 1) * (dy * n + 1) * (dz * n + 1)
        );
        prop_assert_eq!(
            refined.num_bdry_quads(),
            2 * (dx * dy + dy * dz + dx * dz) * n * n
        );
        refined.validate().unwrap();
    }
}
