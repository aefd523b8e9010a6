//! Per-cell lattice machinery shared by the four cell kinds.
//!
//! A [`CellDivider`] owns the cell's `(n+1)^3` index lattice. Edges land on
//! it first (through the shared-vertex registry), then faces (with
//! corner-identity resolution so a face created by a neighbouring cell lays
//! down the same vertices here), then the type-specific interior. Each
//! lattice slot carries the vertex id and its `(u, v, w)` in this cell's
//! canonical frame.

use crate::geometry::mapper::reference_corners;
use crate::geometry::parametric::face_parametric_intersection;
use crate::geometry::{cross, dot, norm, safe_acos, sub, ParametricMapper};
use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::refine::registry::{
    EdgeVerts, FaceTable, QuadFaceRecord, SharedVertexRegistry, TriFaceRecord,
};
use crate::topology::{CellType, EdgeKey, QuadKey, TriKey};

const PARAM_EPS: f64 = 1e-12;

/// One cell kind's subdivision capabilities beyond the shared machinery.
pub(crate) trait CellKind {
    const CELL_TYPE: CellType;

    /// Create the cell-interior vertices and their `(u, v, w)`.
    fn divide_interior(
        div: &mut CellDivider<'_>,
        out: &mut UnstructuredMesh,
    ) -> Result<(), MeshRefineError>;

    /// Emit the sub-cell connectivity from the completed lattice.
    fn emit_sub_cells(
        div: &CellDivider<'_>,
        out: &mut UnstructuredMesh,
    ) -> Result<(), MeshRefineError>;
}

struct EdgeCopy {
    key: EdgeKey,
    shared: EdgeVerts,
}

/// Lattice and bookkeeping for subdividing one cell.
pub(crate) struct CellDivider<'a> {
    ct: CellType,
    n: usize,
    cell_verts: Vec<u32>,
    mapper: &'a dyn ParametricMapper,
    verts: Vec<u32>,
    uvw: Vec<[f64; 3]>,
    edge_copies: Vec<EdgeCopy>,
}

impl<'a> CellDivider<'a> {
    pub fn new(ct: CellType, n: usize, conn: &[u32], mapper: &'a dyn ParametricMapper) -> Self {
        debug_assert_eq!(conn.len(), ct.num_verts());
        let side = n + 1;
        CellDivider {
            ct,
            n,
            cell_verts: conn.to_vec(),
            mapper,
            verts: vec![u32::MAX; side * side * side],
            uvw: vec![[0.0; 3]; side * side * side],
            edge_copies: Vec::with_capacity(ct.num_edges()),
        }
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Evaluate this cell's parametric mapper.
    #[inline]
    pub(crate) fn phys_coords(&self, uvw: [f64; 3]) -> [f64; 3] {
        self.mapper.phys_coords(uvw)
    }

    #[inline]
    fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i <= self.n && j <= self.n && k <= self.n);
        (i * (self.n + 1) + j) * (self.n + 1) + k
    }

    #[inline]
    pub(crate) fn vert_at(&self, i: usize, j: usize, k: usize) -> u32 {
        let v = self.verts[self.idx(i, j, k)];
        debug_assert_ne!(v, u32::MAX, "lattice slot ({i},{j},{k}) unset");
        v
    }

    #[inline]
    pub(crate) fn uvw_at(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        self.uvw[self.idx(i, j, k)]
    }

    #[inline]
    pub(crate) fn set_lattice(&mut self, ijk: [usize; 3], vert: u32, uvw: [f64; 3]) {
        let slot = self.idx(ijk[0], ijk[1], ijk[2]);
        self.verts[slot] = vert;
        self.uvw[slot] = uvw;
    }

    /// Lattice coordinates of a local corner.
    fn corner_ijk(&self, c: usize) -> [usize; 3] {
        let n = self.n;
        let table: &[[usize; 3]] = match self.ct {
            CellType::Tetrahedron => &[[0, 0, 0], [n, 0, 0], [0, n, 0], [0, 0, n]],
            CellType::Pyramid => &[[0, 0, 0], [n, 0, 0], [n, n, 0], [0, n, 0], [0, 0, n]],
            CellType::Prism => &[
                [0, 0, 0],
                [n, 0, 0],
                [0, n, 0],
                [0, 0, n],
                [n, 0, n],
                [0, n, n],
            ],
            CellType::Hexahedron => &[
                [0, 0, 0],
                [n, 0, 0],
                [n, n, 0],
                [0, n, 0],
                [0, 0, n],
                [n, 0, n],
                [n, n, n],
                [0, n, n],
            ],
        };
        table[c]
    }

    #[inline]
    fn corner_uvw(&self, c: usize) -> [f64; 3] {
        reference_corners(self.ct)[c]
    }

    /// Find the local corner index holding vertex id `vert`.
    fn resolve_corner(&self, vert: u32) -> Result<usize, MeshRefineError> {
        self.cell_verts
            .iter()
            .position(|&cv| cv == vert)
            .ok_or_else(|| {
                MeshRefineError::InternalInvariant(format!(
                    "face corner {vert} is not a corner of this cell"
                ))
            })
    }

    fn find_edge_copy(&self, a: u32, b: u32) -> Result<&EdgeCopy, MeshRefineError> {
        let key = EdgeKey::new(a, b);
        self.edge_copies
            .iter()
            .find(|ec| ec.key == key)
            .ok_or_else(|| {
                MeshRefineError::InternalInvariant(format!(
                    "face edge ({a}, {b}) has no divided cell edge"
                ))
            })
    }

    /// Dihedral angle of this cell at the edge between local corners
    /// `ia` and `ib`, from the two cell faces meeting there.
    fn edge_dihedral(
        &self,
        ia: usize,
        ib: usize,
        out: &UnstructuredMesh,
    ) -> Result<f64, MeshRefineError> {
        let pa = out.coords(self.cell_verts[ia]);
        let pb = out.coords(self.cell_verts[ib]);
        let mut e = sub(pb, pa);
        let elen = norm(e);
        if elen < 1e-300 {
            return Err(MeshRefineError::InputInvalid(format!(
                "zero-length edge ({}, {})",
                self.cell_verts[ia], self.cell_verts[ib]
            )));
        }
        for x in &mut e {
            *x /= elen;
        }

        let mut wings = [[0.0f64; 3]; 2];
        let mut found = 0usize;
        let mut consider = |corners: &[usize]| -> Result<(), MeshRefineError> {
            if !(corners.contains(&ia) && corners.contains(&ib)) || found == 2 {
                return Ok(());
            }
            let c = corners
                .iter()
                .copied()
                .find(|&c| c != ia && c != ib)
                .expect("face has a corner off its edge");
            let v = sub(out.coords(self.cell_verts[c]), pa);
            let along = dot(v, e);
            let mut w = [v[0] - along * e[0], v[1] - along * e[1], v[2] - along * e[2]];
            let wlen = norm(w);
            if wlen < 1e-300 {
                return Err(MeshRefineError::InputInvalid(
                    "degenerate cell face while computing dihedral".into(),
                ));
            }
            for x in &mut w {
                *x /= wlen;
            }
            wings[found] = w;
            found += 1;
            Ok(())
        };
        for f in self.ct.tri_faces() {
            consider(&f[..])?;
        }
        for f in self.ct.quad_faces() {
            consider(&f[..])?;
        }
        debug_assert_eq!(found, 2, "every cell edge borders exactly two faces");
        Ok(safe_acos(dot(wings[0], wings[1])))
    }

    /// Divide all edges through the registry and transcribe them onto the
    /// lattice, parameters included.
    pub fn divide_edges(
        &mut self,
        registry: &mut SharedVertexRegistry,
        out: &mut UnstructuredMesh,
    ) -> Result<(), MeshRefineError> {
        let n = self.n;
        for &(ia, ib) in self.ct.edges() {
            let va = self.cell_verts[ia];
            let vb = self.cell_verts[ib];
            let key = EdgeKey::new(va, vb);
            let dihedral = self.edge_dihedral(ia, ib, out)?;

            // Canonical edge order; the registry works smaller-id first.
            let (start_c, end_c) = if key.v0() == va { (ia, ib) } else { (ib, ia) };
            let uvw0 = self.corner_uvw(start_c);
            let uvw1 = self.corner_uvw(end_c);
            let shared = registry.get_or_create_edge(key, dihedral, uvw0, uvw1, self.mapper, out)?;

            let start = self.corner_ijk(start_c);
            let end = self.corner_ijk(end_c);
            let incr = [
                (end[0] as isize - start[0] as isize) / n as isize,
                (end[1] as isize - start[1] as isize) / n as isize,
                (end[2] as isize - start[2] as isize) / n as isize,
            ];
            for ii in 0..=n {
                let pos = [
                    (start[0] as isize + ii as isize * incr[0]) as usize,
                    (start[1] as isize + ii as isize * incr[1]) as usize,
                    (start[2] as isize + ii as isize * incr[2]) as usize,
                ];
                let t = shared.params[ii];
                let uvw = [
                    uvw0[0] + t * (uvw1[0] - uvw0[0]),
                    uvw0[1] + t * (uvw1[1] - uvw0[1]),
                    uvw0[2] + t * (uvw1[2] - uvw0[2]),
                ];
                self.set_lattice(pos, shared.verts[ii], uvw);
            }
            self.edge_copies.push(EdgeCopy { key, shared });
        }
        Ok(())
    }

    /// Perimeter `(s, t)` of one face edge, transcribed from the cell edge's
    /// parametric division. `fill` receives `(pp, t)` for each division
    /// point, where `pp` indexes the face edge from its first corner and `t`
    /// is the parametric position along it.
    fn perimeter_params(
        &self,
        a: u32,
        b: u32,
        mut fill: impl FnMut(usize, f64),
    ) -> Result<(), MeshRefineError> {
        let n = self.n;
        let copy = self.find_edge_copy(a, b)?;
        let forward = copy.key.v0() == a;
        for pp in 0..=n {
            let t = if forward {
                copy.shared.params[pp]
            } else {
                1.0 - copy.shared.params[n - pp]
            };
            fill(pp, t);
        }
        Ok(())
    }

    fn create_tri_record(
        &self,
        corners: [u32; 3],
        face_local: [usize; 3],
        out: &mut UnstructuredMesh,
    ) -> Result<TriFaceRecord, MeshRefineError> {
        let n = self.n;
        let mut st = FaceTable::<[f64; 2]>::new(n);
        let mut int_verts = FaceTable::<u32>::new(n);

        // Perimeter: edge 0 runs (0,0)->(1,0), edge 1 is the hypotenuse
        // (1,0)->(0,1), edge 2 runs (0,1)->(0,0).
        self.perimeter_params(corners[0], corners[1], |pp, t| {
            st.set(pp, 0, [t, 0.0]);
        })?;
        self.perimeter_params(corners[1], corners[2], |pp, t| {
            st.set(n - pp, pp, [1.0 - t, t]);
        })?;
        self.perimeter_params(corners[2], corners[0], |pp, t| {
            st.set(0, n - pp, [0.0, 1.0 - t]);
        })?;

        let uvw0 = self.corner_uvw(face_local[0]);
        let uvw1 = self.corner_uvw(face_local[1]);
        let uvw2 = self.corner_uvw(face_local[2]);
        let d_s = sub(uvw1, uvw0);
        let d_t = sub(uvw2, uvw0);

        for jj in 1..n {
            for ii in 1..n - jj {
                let stv = face_parametric_intersection(
                    st.get(0, jj),
                    st.get(n - jj, jj),
                    st.get(ii, 0),
                    st.get(ii, n - ii),
                );
                let [s, t] = stv;
                if s < -PARAM_EPS || t < -PARAM_EPS || s + t > 1.0 + PARAM_EPS {
                    return Err(MeshRefineError::ParametricOutOfRange(format!(
                        "triangle face (s, t) = ({s}, {t}) at lattice ({ii}, {jj})"
                    )));
                }
                st.set(ii, jj, stv);
                let uvw = [
                    uvw0[0] + d_s[0] * s + d_t[0] * t,
                    uvw0[1] + d_s[1] * s + d_t[1] * t,
                    uvw0[2] + d_s[2] * s + d_t[2] * t,
                ];
                int_verts.set(ii, jj, out.add_vert(self.mapper.phys_coords(uvw)));
            }
        }
        Ok(TriFaceRecord {
            corners,
            int_verts,
            st,
        })
    }

    /// Lay a triangular face record onto this cell's lattice. The record may
    /// come from a neighbouring cell; corner-identity resolution maps its
    /// frame into ours, and `(u, v, w)` is rebuilt from our own corners so
    /// it stays in our frame.
    fn apply_tri_record(&mut self, rec: &TriFaceRecord) -> Result<(), MeshRefineError> {
        let n = self.n;
        let c0 = self.resolve_corner(rec.corners[0])?;
        let c1 = self.resolve_corner(rec.corners[1])?;
        let c2 = self.resolve_corner(rec.corners[2])?;
        let start = self.corner_ijk(c0);
        let (incr_i, incr_j) = (
            lattice_incr(start, self.corner_ijk(c1), n),
            lattice_incr(start, self.corner_ijk(c2), n),
        );
        let uvw0 = self.corner_uvw(c0);
        let d_s = sub(self.corner_uvw(c1), uvw0);
        let d_t = sub(self.corner_uvw(c2), uvw0);

        for jj in 1..n {
            for ii in 1..n - jj {
                let pos = lattice_pos(start, incr_i, incr_j, ii, jj);
                let [s, t] = rec.st.get(ii, jj);
                let uvw = [
                    uvw0[0] + d_s[0] * s + d_t[0] * t,
                    uvw0[1] + d_s[1] * s + d_t[1] * t,
                    uvw0[2] + d_s[2] * s + d_t[2] * t,
                ];
                self.set_lattice(pos, rec.int_verts.get(ii, jj), uvw);
            }
        }
        Ok(())
    }

    fn create_quad_record(
        &self,
        corners: [u32; 4],
        face_local: [usize; 4],
        out: &mut UnstructuredMesh,
    ) -> Result<QuadFaceRecord, MeshRefineError> {
        let n = self.n;
        let mut st = FaceTable::<[f64; 2]>::new(n);
        let mut int_verts = FaceTable::<u32>::new(n);

        self.perimeter_params(corners[0], corners[1], |pp, t| {
            st.set(pp, 0, [t, 0.0]);
        })?;
        self.perimeter_params(corners[1], corners[2], |pp, t| {
            st.set(n, pp, [1.0, t]);
        })?;
        self.perimeter_params(corners[2], corners[3], |pp, t| {
            st.set(n - pp, n, [1.0 - t, 1.0]);
        })?;
        self.perimeter_params(corners[3], corners[0], |pp, t| {
            st.set(0, n - pp, [0.0, 1.0 - t]);
        })?;

        let uvw0 = self.corner_uvw(face_local[0]);
        let uvw1 = self.corner_uvw(face_local[1]);
        let uvw2 = self.corner_uvw(face_local[2]);
        let uvw3 = self.corner_uvw(face_local[3]);
        let d_s = sub(uvw1, uvw0);
        let d_t = sub(uvw3, uvw0);
        let d_cross = [
            uvw2[0] + uvw0[0] - uvw1[0] - uvw3[0],
            uvw2[1] + uvw0[1] - uvw1[1] - uvw3[1],
            uvw2[2] + uvw0[2] - uvw1[2] - uvw3[2],
        ];

        for jj in 1..n {
            for ii in 1..n {
                let stv = face_parametric_intersection(
                    st.get(0, jj),
                    st.get(n, jj),
                    st.get(ii, 0),
                    st.get(ii, n),
                );
                let [s, t] = stv;
                if !(-PARAM_EPS..=1.0 + PARAM_EPS).contains(&s)
                    || !(-PARAM_EPS..=1.0 + PARAM_EPS).contains(&t)
                {
                    return Err(MeshRefineError::ParametricOutOfRange(format!(
                        "quad face (s, t) = ({s}, {t}) at lattice ({ii}, {jj})"
                    )));
                }
                st.set(ii, jj, stv);
                let uvw = [
                    uvw0[0] + d_s[0] * s + d_t[0] * t + d_cross[0] * s * t,
                    uvw0[1] + d_s[1] * s + d_t[1] * t + d_cross[1] * s * t,
                    uvw0[2] + d_s[2] * s + d_t[2] * t + d_cross[2] * s * t,
                ];
                int_verts.set(ii, jj, out.add_vert(self.mapper.phys_coords(uvw)));
            }
        }
        Ok(QuadFaceRecord {
            corners,
            int_verts,
            st,
        })
    }

    fn apply_quad_record(&mut self, rec: &QuadFaceRecord) -> Result<(), MeshRefineError> {
        let n = self.n;
        let c: [usize; 4] = [
            self.resolve_corner(rec.corners[0])?,
            self.resolve_corner(rec.corners[1])?,
            self.resolve_corner(rec.corners[2])?,
            self.resolve_corner(rec.corners[3])?,
        ];
        let start = self.corner_ijk(c[0]);
        let incr_i = lattice_incr(start, self.corner_ijk(c[1]), n);
        let incr_j = lattice_incr(start, self.corner_ijk(c[3]), n);
        let uvw0 = self.corner_uvw(c[0]);
        let uvw1 = self.corner_uvw(c[1]);
        let uvw2 = self.corner_uvw(c[2]);
        let uvw3 = self.corner_uvw(c[3]);
        let d_s = sub(uvw1, uvw0);
        let d_t = sub(uvw3, uvw0);
        let d_cross = [
            uvw2[0] + uvw0[0] - uvw1[0] - uvw3[0],
            uvw2[1] + uvw0[1] - uvw1[1] - uvw3[1],
            uvw2[2] + uvw0[2] - uvw1[2] - uvw3[2],
        ];

        for jj in 1..n {
            for ii in 1..n {
                let pos = lattice_pos(start, incr_i, incr_j, ii, jj);
                let [s, t] = rec.st.get(ii, jj);
                let uvw = [
                    uvw0[0] + d_s[0] * s + d_t[0] * t + d_cross[0] * s * t,
                    uvw0[1] + d_s[1] * s + d_t[1] * t + d_cross[1] * s * t,
                    uvw0[2] + d_s[2] * s + d_t[2] * t + d_cross[2] * s * t,
                ];
                self.set_lattice(pos, rec.int_verts.get(ii, jj), uvw);
            }
        }
        Ok(())
    }

    /// Divide all faces (quads first, then tris) through the registry and
    /// lay their interior vertices onto the lattice.
    pub fn divide_faces(
        &mut self,
        registry: &mut SharedVertexRegistry,
        out: &mut UnstructuredMesh,
    ) -> Result<(), MeshRefineError> {
        for f in self.ct.quad_faces() {
            let corners = [
                self.cell_verts[f[0]],
                self.cell_verts[f[1]],
                self.cell_verts[f[2]],
                self.cell_verts[f[3]],
            ];
            let key = QuadKey::new(corners);
            let rec = match registry.take_quad(&key) {
                Some(rec) => rec,
                None => {
                    let rec = self.create_quad_record(corners, *f, out)?;
                    registry.insert_quad(key, rec.clone());
                    rec
                }
            };
            self.apply_quad_record(&rec)?;
        }
        for f in self.ct.tri_faces() {
            let corners = [
                self.cell_verts[f[0]],
                self.cell_verts[f[1]],
                self.cell_verts[f[2]],
            ];
            let key = TriKey::new(corners);
            let rec = match registry.take_tri(&key) {
                Some(rec) => rec,
                None => {
                    let rec = self.create_tri_record(corners, *f, out)?;
                    registry.insert_tri(key, rec.clone());
                    rec
                }
            };
            self.apply_tri_record(&rec)?;
        }
        Ok(())
    }

    /// Read the full refined-vertex table of one face, in the frame of the
    /// given corner order (corner 0 at `(0, 0)`, corner 1 at `(n, 0)`, the
    /// last corner at `(0, n)`).
    pub fn face_table(&self, corners: &[u32]) -> Result<FaceTable<u32>, MeshRefineError> {
        let n = self.n;
        let tri = corners.len() == 3;
        debug_assert!(tri || corners.len() == 4);
        let c0 = self.resolve_corner(corners[0])?;
        let ci = self.resolve_corner(corners[1])?;
        let cj = self.resolve_corner(*corners.last().expect("nonempty corners"))?;
        let start = self.corner_ijk(c0);
        let incr_i = lattice_incr(start, self.corner_ijk(ci), n);
        let incr_j = lattice_incr(start, self.corner_ijk(cj), n);
        if !tri {
            // The affine frame must also land corner 2 on (n, n).
            let c2 = self.resolve_corner(corners[2])?;
            let expect = lattice_pos(start, incr_i, incr_j, n, n);
            if expect != self.corner_ijk(c2) {
                return Err(MeshRefineError::InternalInvariant(
                    "quad corners do not span an affine lattice frame".into(),
                ));
            }
        }
        let mut table = FaceTable::<u32>::new(n);
        for jj in 0..=n {
            let imax = if tri { n - jj } else { n };
            for ii in 0..=imax {
                let pos = lattice_pos(start, incr_i, incr_j, ii, jj);
                table.set(ii, jj, self.vert_at(pos[0], pos[1], pos[2]));
            }
        }
        Ok(table)
    }
}

#[inline]
fn lattice_incr(start: [usize; 3], end: [usize; 3], n: usize) -> [isize; 3] {
    [
        (end[0] as isize - start[0] as isize) / n as isize,
        (end[1] as isize - start[1] as isize) / n as isize,
        (end[2] as isize - start[2] as isize) / n as isize,
    ]
}

#[inline]
fn lattice_pos(start: [usize; 3], incr_i: [isize; 3], incr_j: [isize; 3], ii: usize, jj: usize) -> [usize; 3] {
    [
        (start[0] as isize + incr_i[0] * ii as isize + incr_j[0] * jj as isize) as usize,
        (start[1] as isize + incr_i[1] * ii as isize + incr_j[1] * jj as isize) as usize,
        (start[2] as isize + incr_i[2] * ii as isize + incr_j[2] * jj as isize) as usize,
    ]
}

/// Orientation test used by emission debug checks: positive for a
/// right-handed tet.
#[allow(dead_code)]
pub(crate) fn orient3d(p0: [f64; 3], p1: [f64; 3], p2: [f64; 3], p3: [f64; 3]) -> f64 {
    dot(sub(p1, p0), cross(sub(p2, p0), sub(p3, p0)))
}
