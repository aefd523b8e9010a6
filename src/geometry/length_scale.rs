//! Per-vertex isotropic length scales.
//!
//! The edge parametric distribution grades sub-edge spacing by the ratio of
//! endpoint length scales. Input files that carry no spacing data get a
//! reasonable default here: each vertex's scale is the mean length of the
//! cell edges incident on it.

use crate::mesh::UnstructuredMesh;
use crate::topology::CellType;

/// Recompute every vertex's isotropic length scale from incident cell edges.
///
/// Each edge contributes its physical length to both endpoints; vertices
/// untouched by any cell keep a scale of 1 so later ratio arithmetic stays
/// finite.
pub fn setup_length_scales(mesh: &mut UnstructuredMesh) {
    let nv = mesh.num_verts();
    let mut sums = vec![0.0f64; nv];
    let mut counts = vec![0u32; nv];

    for ct in CellType::ALL {
        for ci in 0..mesh.num_cells(ct) {
            let conn = mesh.cell_verts(ct, ci);
            for &(a, b) in ct.edges() {
                let va = conn[a] as usize;
                let vb = conn[b] as usize;
                let pa = mesh.coords(va as u32);
                let pb = mesh.coords(vb as u32);
                let len = crate::geometry::norm(crate::geometry::sub(pb, pa));
                sums[va] += len;
                counts[va] += 1;
                sums[vb] += len;
                counts[vb] += 1;
            }
        }
    }

    for v in 0..nv {
        let scale = if counts[v] > 0 {
            sums[v] / counts[v] as f64
        } else {
            1.0
        };
        mesh.set_length_scale(v as u32, scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_tet_gets_mean_edge_lengths() {
        let mut mesh = UnstructuredMesh::new();
        mesh.add_vert([0.0, 0.0, 0.0]);
        mesh.add_vert([1.0, 0.0, 0.0]);
        mesh.add_vert([0.0, 1.0, 0.0]);
        mesh.add_vert([0.0, 0.0, 1.0]);
        mesh.add_tet([0, 1, 2, 3]).unwrap();
        setup_length_scales(&mut mesh);
        // Vertex 0 touches three unit axis edges.
        assert!((mesh.length_scale(0) - 1.0).abs() < 1e-14);
        // Vertex 1 touches two sqrt(2) edges and one unit edge.
        let expect = (1.0 + 2.0 * 2.0f64.sqrt()) / 3.0;
        assert!((mesh.length_scale(1) - expect).abs() < 1e-14);
    }

    #[test]
    fn isolated_verts_default_to_one() {
        let mut mesh = UnstructuredMesh::new();
        mesh.add_vert([5.0, 5.0, 5.0]);
        setup_length_scales(&mut mesh);
        assert_eq!(mesh.length_scale(0), 1.0);
    }
}
