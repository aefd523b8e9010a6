//! Shared-vertex registries.
//!
//! Interior vertices on an edge or face must be created exactly once even
//! though two or more cells walk over them. Each registry keys records by
//! canonical identity; the first incident cell creates the record (and the
//! physical vertices), later cells read it. Eviction keeps the tables small:
//! an edge record leaves once the dihedral angles its clients reported close
//! the full turn, a face record leaves on its second (and last) incidence.
//! Records still present when refinement finishes belong to the partition's
//! true boundary.

use crate::geometry::parametric::{edge_parametric_division, is_strictly_increasing};
use crate::geometry::ParametricMapper;
use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::topology::{EdgeKey, QuadKey, TriKey};
use hashbrown::HashMap;

/// Dihedral slack: an interior edge has collected its full 2π when the
/// running total reaches (2 − 1e−8)·π.
const DIHEDRAL_FULL: f64 = (2.0 - 1.0e-8) * std::f64::consts::PI;

/// Square table over a face lattice, `(n + 1) x (n + 1)`; triangular faces
/// use only positions with `i + j <= n`.
#[derive(Clone, Debug)]
pub struct FaceTable<T> {
    n: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> FaceTable<T> {
    pub fn new(n: usize) -> Self {
        FaceTable {
            n,
            data: vec![T::default(); (n + 1) * (n + 1)],
        }
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        debug_assert!(i <= self.n && j <= self.n);
        self.data[i * (self.n + 1) + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        debug_assert!(i <= self.n && j <= self.n);
        self.data[i * (self.n + 1) + j] = value;
    }
}

/// Refined vertices along one edge, in canonical (smaller-id first) order.
#[derive(Clone, Debug)]
pub struct EdgeVerts {
    /// `n + 1` vertex ids; endpoints at 0 and n.
    pub verts: Vec<u32>,
    /// `n + 1` strictly increasing parametric positions from 0 to 1.
    pub params: Vec<f64>,
}

#[derive(Debug)]
struct EdgeRecord {
    shared: EdgeVerts,
    total_dihedral: f64,
}

/// Interior vertices and face-local parameters of one face.
#[derive(Clone, Debug)]
pub struct TriFaceRecord {
    /// Corner ids in the creating cell's face order.
    pub corners: [u32; 3],
    /// Interior vertex ids, valid for `i, j >= 1`, `i + j <= n - 1`.
    pub int_verts: FaceTable<u32>,
    /// Face-local `(s, t)`, valid on the whole lattice including perimeter.
    pub st: FaceTable<[f64; 2]>,
}

/// Quad analogue of [`TriFaceRecord`]; interior valid for `1 <= i, j <= n-1`.
#[derive(Clone, Debug)]
pub struct QuadFaceRecord {
    pub corners: [u32; 4],
    pub int_verts: FaceTable<u32>,
    pub st: FaceTable<[f64; 2]>,
}

/// The two shared-vertex tables of one partition's refinement run.
#[derive(Debug)]
pub struct SharedVertexRegistry {
    n: usize,
    edges: HashMap<EdgeKey, EdgeRecord>,
    tris: HashMap<TriKey, TriFaceRecord>,
    quads: HashMap<QuadKey, QuadFaceRecord>,
}

impl SharedVertexRegistry {
    pub fn new(n: usize) -> Self {
        SharedVertexRegistry {
            n,
            edges: HashMap::new(),
            tris: HashMap::new(),
            quads: HashMap::new(),
        }
    }

    /// Fetch or create the refined vertices of one edge.
    ///
    /// On a miss this computes the parametric division from the endpoint
    /// length scales (taken from `out`, where the coarse vertices already
    /// live), creates the `n - 1` interior vertices through `mapper`, and
    /// stores the record. On a hit it adds `dihedral` to the running total
    /// and evicts the record once the total closes the full turn.
    ///
    /// `uvw0`/`uvw1` are the endpoint parametric coordinates in the calling
    /// cell's frame, given in canonical key order (`key.v0()` first).
    pub fn get_or_create_edge(
        &mut self,
        key: EdgeKey,
        dihedral: f64,
        uvw0: [f64; 3],
        uvw1: [f64; 3],
        mapper: &dyn ParametricMapper,
        out: &mut UnstructuredMesh,
    ) -> Result<EdgeVerts, MeshRefineError> {
        if let Some(record) = self.edges.get_mut(&key) {
            record.total_dihedral += dihedral;
            let shared = record.shared.clone();
            if record.total_dihedral > DIHEDRAL_FULL {
                self.edges.remove(&key);
            }
            return Ok(shared);
        }

        let n = self.n;
        let scale0 = out.length_scale(key.v0());
        let scale1 = out.length_scale(key.v1());
        if !(scale0 > 0.0 && scale1 > 0.0) {
            return Err(MeshRefineError::InputInvalid(format!(
                "non-positive length scale on edge ({}, {})",
                key.v0(),
                key.v1()
            )));
        }
        let params = edge_parametric_division(scale0, scale1, n);
        if !is_strictly_increasing(&params) {
            return Err(MeshRefineError::EdgeParamMonotonicity {
                v0: key.v0(),
                v1: key.v1(),
            });
        }

        let mut verts = vec![u32::MAX; n + 1];
        verts[0] = key.v0();
        verts[n] = key.v1();
        let delta = [uvw1[0] - uvw0[0], uvw1[1] - uvw0[1], uvw1[2] - uvw0[2]];
        for i in 1..n {
            let t = params[i];
            let uvw = [
                uvw0[0] + t * delta[0],
                uvw0[1] + t * delta[1],
                uvw0[2] + t * delta[2],
            ];
            verts[i] = out.add_vert(mapper.phys_coords(uvw));
        }

        let shared = EdgeVerts { verts, params };
        self.edges.insert(
            key,
            EdgeRecord {
                shared: shared.clone(),
                total_dihedral: dihedral,
            },
        );
        Ok(shared)
    }

    /// Remove and return the record of a triangular face; `Some` means this
    /// is the second incidence and the record is spent.
    pub fn take_tri(&mut self, key: &TriKey) -> Option<TriFaceRecord> {
        self.tris.remove(key)
    }

    /// Store a freshly created triangular face record.
    pub fn insert_tri(&mut self, key: TriKey, record: TriFaceRecord) {
        debug_assert!(!self.tris.contains_key(&key));
        self.tris.insert(key, record);
    }

    /// Remove and return the record of a quadrilateral face.
    pub fn take_quad(&mut self, key: &QuadKey) -> Option<QuadFaceRecord> {
        self.quads.remove(key)
    }

    /// Store a freshly created quadrilateral face record.
    pub fn insert_quad(&mut self, key: QuadKey, record: QuadFaceRecord) {
        debug_assert!(!self.quads.contains_key(&key));
        self.quads.insert(key, record);
    }

    /// Number of live edge records (boundary edges never close the full
    /// turn, so they stay until the registry is dropped).
    pub fn live_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of live face records.
    pub fn live_faces(&self) -> usize {
        self.tris.len() + self.quads.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LinearCellMapper;
    use crate::topology::CellType;
    use std::f64::consts::PI;

    fn setup() -> (UnstructuredMesh, LinearCellMapper) {
        let mut out = UnstructuredMesh::new();
        let corners = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        for c in corners {
            out.add_vert(c);
        }
        (out, LinearCellMapper::new(CellType::Tetrahedron, &corners))
    }

    #[test]
    fn edge_created_once_and_shared() {
        let (mut out, mapper) = setup();
        let mut reg = SharedVertexRegistry::new(2);
        let key = EdgeKey::new(0, 1);
        let uvw0 = [0.0, 0.0, 0.0];
        let uvw1 = [1.0, 0.0, 0.0];
        let first = reg
            .get_or_create_edge(key, PI / 2.0, uvw0, uvw1, &mapper, &mut out)
            .unwrap();
        assert_eq!(out.num_verts(), 5);
        let mid = first.verts[1];
        assert_eq!(out.coords(mid), [0.5, 0.0, 0.0]);
        // Second client sees the same vertex and no new ones appear.
        let second = reg
            .get_or_create_edge(key, PI / 2.0, uvw0, uvw1, &mapper, &mut out)
            .unwrap();
        assert_eq!(second.verts, first.verts);
        assert_eq!(out.num_verts(), 5);
        assert_eq!(reg.live_edges(), 1);
    }

    #[test]
    fn edge_evicted_after_full_turn() {
        let (mut out, mapper) = setup();
        let mut reg = SharedVertexRegistry::new(2);
        let key = EdgeKey::new(0, 1);
        let uvw0 = [0.0, 0.0, 0.0];
        let uvw1 = [1.0, 0.0, 0.0];
        for _ in 0..4 {
            reg.get_or_create_edge(key, PI / 2.0, uvw0, uvw1, &mapper, &mut out)
                .unwrap();
        }
        assert_eq!(reg.live_edges(), 0);
        // Re-creation after eviction would duplicate verts; clients are done
        // with the edge by then, which is the point of the dihedral rule.
    }

    #[test]
    fn pathological_scale_ratio_fails_monotonicity() {
        let (mut out, mapper) = setup();
        out.set_length_scale(0, 100.0);
        let mut reg = SharedVertexRegistry::new(4);
        let err = reg
            .get_or_create_edge(
                EdgeKey::new(0, 1),
                0.0,
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                &mapper,
                &mut out,
            )
            .unwrap_err();
        assert_eq!(err, MeshRefineError::EdgeParamMonotonicity { v0: 0, v1: 1 });
    }

    #[test]
    fn face_record_take_semantics() {
        let mut reg = SharedVertexRegistry::new(2);
        let key = TriKey::new([0, 1, 2]);
        assert!(reg.take_tri(&key).is_none());
        reg.insert_tri(
            key,
            TriFaceRecord {
                corners: [0, 1, 2],
                int_verts: FaceTable::new(2),
                st: FaceTable::new(2),
            },
        );
        assert_eq!(reg.live_faces(), 1);
        // Second incidence evicts, even when queried via a rotated key.
        let rotated = TriKey::new([2, 0, 1]);
        assert!(reg.take_tri(&rotated).is_some());
        assert_eq!(reg.live_faces(), 0);
    }
}
