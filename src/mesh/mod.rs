//! Dense unstructured-mesh storage.
//!
//! An [`UnstructuredMesh`] owns a 0-based vertex array (coordinates plus one
//! isotropic length scale per vertex), per-type cell connectivity, and the
//! declared boundary faces. It is both the input and the output of
//! refinement; the extractor produces transient per-partition instances of
//! the same type.

pub mod extract;
pub mod sizing;

use crate::mesh_error::MeshRefineError;
use crate::topology::{CellType, QuadKey, TriKey};
use hashbrown::HashSet;

/// Volume mesh of tets, pyramids, prisms, and hexes with declared boundary
/// faces.
#[derive(Clone, Debug, Default)]
pub struct UnstructuredMesh {
    coords: Vec<[f64; 3]>,
    len_scale: Vec<f64>,
    tet_conn: Vec<[u32; 4]>,
    pyr_conn: Vec<[u32; 5]>,
    prism_conn: Vec<[u32; 6]>,
    hex_conn: Vec<[u32; 8]>,
    bdry_tris: Vec<[u32; 3]>,
    bdry_quads: Vec<[u32; 4]>,
}

impl UnstructuredMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-allocate storage from a refined-size tally.
    pub fn with_capacity(tally: &sizing::RefinedMeshTally) -> Self {
        UnstructuredMesh {
            coords: Vec::with_capacity(tally.verts as usize),
            len_scale: Vec::with_capacity(tally.verts as usize),
            tet_conn: Vec::with_capacity(tally.tets as usize),
            pyr_conn: Vec::with_capacity(tally.pyramids as usize),
            prism_conn: Vec::with_capacity(tally.prisms as usize),
            hex_conn: Vec::with_capacity(tally.hexes as usize),
            bdry_tris: Vec::with_capacity(tally.bdry_tris as usize),
            bdry_quads: Vec::with_capacity(tally.bdry_quads as usize),
        }
    }

    // --- vertices ---

    /// Append a vertex and return its index. Length scale starts at 1.
    pub fn add_vert(&mut self, coords: [f64; 3]) -> u32 {
        let idx = self.coords.len() as u32;
        self.coords.push(coords);
        self.len_scale.push(1.0);
        idx
    }

    #[inline]
    pub fn num_verts(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn coords(&self, v: u32) -> [f64; 3] {
        self.coords[v as usize]
    }

    #[inline]
    pub fn length_scale(&self, v: u32) -> f64 {
        self.len_scale[v as usize]
    }

    #[inline]
    pub fn set_length_scale(&mut self, v: u32, scale: f64) {
        self.len_scale[v as usize] = scale;
    }

    // --- cells ---

    fn check_conn(&self, conn: &[u32]) -> Result<(), MeshRefineError> {
        for &v in conn {
            if v as usize >= self.coords.len() {
                return Err(MeshRefineError::InputInvalid(format!(
                    "connectivity references vert {v} but mesh has {} verts",
                    self.coords.len()
                )));
            }
        }
        Ok(())
    }

    pub fn add_tet(&mut self, conn: [u32; 4]) -> Result<u32, MeshRefineError> {
        self.check_conn(&conn)?;
        self.tet_conn.push(conn);
        Ok(self.tet_conn.len() as u32 - 1)
    }

    pub fn add_pyramid(&mut self, conn: [u32; 5]) -> Result<u32, MeshRefineError> {
        self.check_conn(&conn)?;
        self.pyr_conn.push(conn);
        Ok(self.pyr_conn.len() as u32 - 1)
    }

    pub fn add_prism(&mut self, conn: [u32; 6]) -> Result<u32, MeshRefineError> {
        self.check_conn(&conn)?;
        self.prism_conn.push(conn);
        Ok(self.prism_conn.len() as u32 - 1)
    }

    pub fn add_hex(&mut self, conn: [u32; 8]) -> Result<u32, MeshRefineError> {
        self.check_conn(&conn)?;
        self.hex_conn.push(conn);
        Ok(self.hex_conn.len() as u32 - 1)
    }

    #[inline]
    pub fn num_tets(&self) -> usize {
        self.tet_conn.len()
    }
    #[inline]
    pub fn num_pyramids(&self) -> usize {
        self.pyr_conn.len()
    }
    #[inline]
    pub fn num_prisms(&self) -> usize {
        self.prism_conn.len()
    }
    #[inline]
    pub fn num_hexes(&self) -> usize {
        self.hex_conn.len()
    }

    /// Number of cells of one type.
    pub fn num_cells(&self, ct: CellType) -> usize {
        match ct {
            CellType::Tetrahedron => self.tet_conn.len(),
            CellType::Pyramid => self.pyr_conn.len(),
            CellType::Prism => self.prism_conn.len(),
            CellType::Hexahedron => self.hex_conn.len(),
        }
    }

    /// Total volume cell count across all four types.
    pub fn total_cells(&self) -> usize {
        self.tet_conn.len() + self.pyr_conn.len() + self.prism_conn.len() + self.hex_conn.len()
    }

    /// Connectivity of one cell as a slice of vertex indices.
    #[inline]
    pub fn cell_verts(&self, ct: CellType, idx: usize) -> &[u32] {
        match ct {
            CellType::Tetrahedron => &self.tet_conn[idx],
            CellType::Pyramid => &self.pyr_conn[idx],
            CellType::Prism => &self.prism_conn[idx],
            CellType::Hexahedron => &self.hex_conn[idx],
        }
    }

    #[inline]
    pub fn tet_verts(&self, idx: usize) -> [u32; 4] {
        self.tet_conn[idx]
    }
    #[inline]
    pub fn pyramid_verts(&self, idx: usize) -> [u32; 5] {
        self.pyr_conn[idx]
    }
    #[inline]
    pub fn prism_verts(&self, idx: usize) -> [u32; 6] {
        self.prism_conn[idx]
    }
    #[inline]
    pub fn hex_verts(&self, idx: usize) -> [u32; 8] {
        self.hex_conn[idx]
    }

    // --- boundary faces ---

    pub fn add_bdry_tri(&mut self, conn: [u32; 3]) -> Result<u32, MeshRefineError> {
        self.check_conn(&conn)?;
        self.bdry_tris.push(conn);
        Ok(self.bdry_tris.len() as u32 - 1)
    }

    pub fn add_bdry_quad(&mut self, conn: [u32; 4]) -> Result<u32, MeshRefineError> {
        self.check_conn(&conn)?;
        self.bdry_quads.push(conn);
        Ok(self.bdry_quads.len() as u32 - 1)
    }

    #[inline]
    pub fn num_bdry_tris(&self) -> usize {
        self.bdry_tris.len()
    }
    #[inline]
    pub fn num_bdry_quads(&self) -> usize {
        self.bdry_quads.len()
    }
    #[inline]
    pub fn bdry_tri_verts(&self, idx: usize) -> [u32; 3] {
        self.bdry_tris[idx]
    }
    #[inline]
    pub fn bdry_quad_verts(&self, idx: usize) -> [u32; 4] {
        self.bdry_quads[idx]
    }

    /// Toggle-accounting of all cell faces: the faces left over after every
    /// cell has inserted-or-erased its own are the hull of the mesh.
    fn hull_faces(&self) -> (HashSet<TriKey>, HashSet<QuadKey>) {
        let mut tris: HashSet<TriKey> = HashSet::new();
        let mut quads: HashSet<QuadKey> = HashSet::new();
        let mut toggle_tri = |key: TriKey| {
            if !tris.remove(&key) {
                tris.insert(key);
            }
        };
        let mut toggle_quad = |key: QuadKey| {
            if !quads.remove(&key) {
                quads.insert(key);
            }
        };
        for ct in CellType::ALL {
            for ci in 0..self.num_cells(ct) {
                let conn = self.cell_verts(ct, ci);
                for f in ct.tri_faces() {
                    toggle_tri(TriKey::new([conn[f[0]], conn[f[1]], conn[f[2]]]));
                }
                for f in ct.quad_faces() {
                    toggle_quad(QuadKey::new([conn[f[0]], conn[f[1]], conn[f[2]], conn[f[3]]]));
                }
            }
        }
        (tris, quads)
    }

    /// Check connectivity ranges and that declared boundary faces exactly
    /// cover the mesh hull.
    pub fn validate(&self) -> Result<(), MeshRefineError> {
        for ct in CellType::ALL {
            for ci in 0..self.num_cells(ct) {
                self.check_conn(self.cell_verts(ct, ci))?;
            }
        }
        let (mut hull_tris, mut hull_quads) = self.hull_faces();
        for t in &self.bdry_tris {
            let key = TriKey::new(*t);
            if !hull_tris.remove(&key) {
                return Err(MeshRefineError::UnmatchedBoundaryFace(key.sorted4()));
            }
        }
        for q in &self.bdry_quads {
            let key = QuadKey::new(*q);
            if !hull_quads.remove(&key) {
                return Err(MeshRefineError::UnmatchedBoundaryFace(key.sorted()));
            }
        }
        if let Some(t) = hull_tris.iter().next() {
            return Err(MeshRefineError::UnmatchedBoundaryFace(t.sorted4()));
        }
        if let Some(q) = hull_quads.iter().next() {
            return Err(MeshRefineError::UnmatchedBoundaryFace(q.sorted()));
        }
        Ok(())
    }

    /// Declare every hull face that isn't already declared, in the
    /// orientation the owning cell sees it (outward).
    ///
    /// Mesh files sometimes omit part of the boundary; refinement needs the
    /// hull fully declared so shared-face accounting closes.
    pub fn synthesize_missing_boundary(&mut self) {
        let (hull_tris, hull_quads) = self.hull_faces();
        let declared_tris: HashSet<TriKey> =
            self.bdry_tris.iter().map(|t| TriKey::new(*t)).collect();
        let declared_quads: HashSet<QuadKey> =
            self.bdry_quads.iter().map(|q| QuadKey::new(*q)).collect();
        let mut missing_tris: Vec<[u32; 3]> = hull_tris
            .iter()
            .filter(|&k| !declared_tris.contains(k))
            .map(|k| k.corners())
            .collect();
        let mut missing_quads: Vec<[u32; 4]> = hull_quads
            .iter()
            .filter(|&k| !declared_quads.contains(k))
            .map(|k| k.corners())
            .collect();
        // Hash-set iteration order is not deterministic; the mesh is.
        missing_tris.sort_unstable();
        missing_quads.sort_unstable();
        self.bdry_tris.extend(missing_tris);
        self.bdry_quads.extend(missing_quads);
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
        mesh
    }

    #[test]
    fn out_of_range_connectivity_is_rejected() {
        let mut mesh = UnstructuredMesh::new();
        mesh.add_vert([0.0; 3]);
        let err = mesh.add_tet([0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, MeshRefineError::InputInvalid(_)));
    }

    #[test]
    fn synthesized_boundary_validates() {
        let mut mesh = unit_tet();
        assert!(mesh.validate().is_err());
        mesh.synthesize_missing_boundary();
        assert_eq!(mesh.num_bdry_tris(), 4);
        mesh.validate().unwrap();
    }

    #[test]
    fn interior_face_is_not_boundary() {
        // Two tets glued on face (1, 2, 3).
        let mut mesh = unit_tet();
        mesh.add_vert([1.0, 1.0, 1.0]);
        mesh.add_tet([1, 2, 3, 4]).unwrap();
        mesh.synthesize_missing_boundary();
        assert_eq!(mesh.num_bdry_tris(), 6);
        mesh.validate().unwrap();
        // Declaring the shared face as boundary must fail validation.
        mesh.add_bdry_tri([1, 2, 3]).unwrap();
        assert!(matches!(
            mesh.validate(),
            Err(MeshRefineError::UnmatchedBoundaryFace(_))
        ));
    }
}
