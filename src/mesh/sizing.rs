//! Exact sizing of the refined mesh.
//!
//! Cell counts follow closed forms per type; vertex counts need the number
//! of unique edges and faces, which one counting pass over the cells
//! provides. The refinement driver pre-allocates from this tally and
//! cross-checks its final counts against it.

use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::topology::{CellType, EdgeKey, QuadKey, TriKey};
use hashbrown::HashSet;

/// Entity counts of an n-way refined mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefinedMeshTally {
    pub verts: u64,
    pub bdry_tris: u64,
    pub bdry_quads: u64,
    pub tets: u64,
    pub pyramids: u64,
    pub prisms: u64,
    pub hexes: u64,
}

impl RefinedMeshTally {
    /// Compute the exact refined counts for `mesh` subdivided `n` ways.
    pub fn compute(mesh: &UnstructuredMesh, n: usize) -> Result<Self, MeshRefineError> {
        if n == 0 {
            return Err(MeshRefineError::InputInvalid(
                "subdivision factor must be at least 1".into(),
            ));
        }
        let n64 = n as u64;

        let mut edges: HashSet<EdgeKey> = HashSet::new();
        let mut tris: HashSet<TriKey> = HashSet::new();
        let mut quads: HashSet<QuadKey> = HashSet::new();
        let mut tally = RefinedMeshTally {
            verts: mesh.num_verts() as u64,
            bdry_tris: mesh.num_bdry_tris() as u64 * n64 * n64,
            bdry_quads: mesh.num_bdry_quads() as u64 * n64 * n64,
            ..Default::default()
        };

        for ct in CellType::ALL {
            let count = mesh.num_cells(ct) as u64;
            tally.tets += count * ct.refined_tets(n64);
            tally.pyramids += count * ct.refined_pyramids(n64);
            tally.prisms += count * ct.refined_prisms(n64);
            tally.hexes += count * ct.refined_hexes(n64);
            tally.verts += count * ct.interior_verts(n64);
            for ci in 0..mesh.num_cells(ct) {
                let conn = mesh.cell_verts(ct, ci);
                for &(a, b) in ct.edges() {
                    edges.insert(EdgeKey::new(conn[a], conn[b]));
                }
                for f in ct.tri_faces() {
                    tris.insert(TriKey::new([conn[f[0]], conn[f[1]], conn[f[2]]]));
                }
                for f in ct.quad_faces() {
                    quads.insert(QuadKey::new([conn[f[0]], conn[f[1]], conn[f[2]], conn[f[3]]]));
                }
            }
        }

        tally.verts += edges.len() as u64 * (n64 - 1);
        tally.verts += tris.len() as u64 * (n64 - 1) * n64.saturating_sub(2) / 2;
        tally.verts += quads.len() as u64 * (n64 - 1) * (n64 - 1);

        if tally.verts > u32::MAX as u64 {
            return Err(MeshRefineError::InputInvalid(format!(
                "refined mesh needs {} verts, above the u32 index limit",
                tally.verts
            )));
        }
        Ok(tally)
    }

    /// Total refined cell count.
    pub fn total_cells(&self) -> u64 {
        self.tets + self.pyramids + self.prisms + self.hexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn single_tet_n2() {
        let tally = RefinedMeshTally::compute(&unit_tet(), 2).unwrap();
        assert_eq!(tally.tets, 8);
        assert_eq!(tally.verts, 10);
        assert_eq!(tally.bdry_tris, 16);
    }

    #[test]
    fn single_hex_n3() {
        let mut mesh = UnstructuredMesh::new();
        for k in 0..2 {
            for j in 0..2 {
                for i in 0..2 {
                    mesh.add_vert([i as f64, j as f64, k as f64]);
                }
            }
        }
        mesh.add_hex([0, 1, 3, 2, 4, 5, 7, 6]).unwrap();
        mesh.synthesize_missing_boundary();
        let tally = RefinedMeshTally::compute(&mesh, 3).unwrap();
        assert_eq!(tally.hexes, 27);
        assert_eq!(tally.verts, 64);
        assert_eq!(tally.bdry_quads, 54);
    }

    #[test]
    fn single_pyramid_n2() {
        let mut mesh = UnstructuredMesh::new();
        mesh.add_vert([0.0, 0.0, 0.0]);
        mesh.add_vert([1.0, 0.0, 0.0]);
        mesh.add_vert([1.0, 1.0, 0.0]);
        mesh.add_vert([0.0, 1.0, 0.0]);
        mesh.add_vert([0.5, 0.5, 1.0]);
        mesh.add_pyramid([0, 1, 2, 3, 4]).unwrap();
        mesh.synthesize_missing_boundary();
        let tally = RefinedMeshTally::compute(&mesh, 2).unwrap();
        assert_eq!(tally.pyramids, 6);
        assert_eq!(tally.tets, 4);
        assert_eq!(tally.verts, 14);
    }

    #[test]
    fn shared_faces_and_edges_count_once() {
        let mut mesh = unit_tet();
        mesh.add_vert([1.0, 1.0, 1.0]);
        mesh.add_tet([1, 2, 3, 4]).unwrap();
        let tally = RefinedMeshTally::compute(&mesh, 3).unwrap();
        // 5 coarse verts, 9 unique edges, interior of the shared tri face
        // counted once: 5 + 9*2 + 7*1 = 30.
        assert_eq!(tally.verts, 30);
        assert_eq!(tally.tets, 54);
    }

    #[test]
    fn n_zero_is_invalid() {
        assert!(RefinedMeshTally::compute(&unit_tet(), 0).is_err());
    }
}
