//! The refinement driver.
//!
//! Orchestrates per-cell subdivision over a whole mesh (or a partition's
//! sub-mesh): for each cell, acquire edge vertices, then face vertices, then
//! interior vertices, then emit sub-cells. Declared boundary faces are
//! re-emitted as n^2 refined faces; partition-boundary faces get their full
//! refined vertex tables captured for the cross-partition exchange.

pub(crate) mod divider;
pub(crate) mod hex;
pub(crate) mod prism;
pub(crate) mod pyramid;
pub mod registry;
pub(crate) mod tet;

use crate::geometry::{LinearMapperFactory, MapperFactory, ParametricMapper};
use crate::mesh::sizing::RefinedMeshTally;
use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::topology::{CellType, QuadKey, TriKey};
use divider::{CellDivider, CellKind};
use hashbrown::HashMap;
use registry::{FaceTable, SharedVertexRegistry};

/// A partition-boundary face awaiting refinement, with corners in both id
/// spaces plus the neighbour partition owning the other side.
#[derive(Clone, Copy, Debug)]
pub struct PartFaceSeed<const C: usize> {
    pub local: [u32; C],
    pub global: [u32; C],
    pub remote_part: u32,
}

/// A refined partition-boundary face: the seed plus the full refined vertex
/// table in the frame of the seed's corner order.
#[derive(Clone, Debug)]
pub struct RefinedPartFace<const C: usize> {
    pub seed: PartFaceSeed<C>,
    pub table: FaceTable<u32>,
}

/// Refine a whole mesh `n` ways with straight-sided cells.
pub fn refine(coarse: &UnstructuredMesh, n: usize) -> Result<UnstructuredMesh, MeshRefineError> {
    refine_with(coarse, n, &LinearMapperFactory)
}

/// Refine a whole mesh `n` ways with a caller-supplied parametric mapping.
pub fn refine_with<F: MapperFactory>(
    coarse: &UnstructuredMesh,
    n: usize,
    factory: &F,
) -> Result<UnstructuredMesh, MeshRefineError> {
    coarse.validate()?;
    let (out, _, _) = subdivide_mesh(coarse, n, factory, &[], &[])?;
    Ok(out)
}

/// Subdivide every cell of `coarse`, emitting refined boundary faces and
/// capturing the refined tables of the given partition-boundary faces.
pub(crate) fn subdivide_mesh<F: MapperFactory>(
    coarse: &UnstructuredMesh,
    n: usize,
    factory: &F,
    tri_seeds: &[PartFaceSeed<3>],
    quad_seeds: &[PartFaceSeed<4>],
) -> Result<
    (
        UnstructuredMesh,
        Vec<RefinedPartFace<3>>,
        Vec<RefinedPartFace<4>>,
    ),
    MeshRefineError,
> {
    let tally = RefinedMeshTally::compute(coarse, n)?;
    let mut out = UnstructuredMesh::with_capacity(&tally);
    for v in 0..coarse.num_verts() as u32 {
        let nv = out.add_vert(coarse.coords(v));
        out.set_length_scale(nv, coarse.length_scale(v));
    }

    let mut bdry_tris: HashMap<TriKey, usize> = HashMap::new();
    for bi in 0..coarse.num_bdry_tris() {
        bdry_tris.insert(TriKey::new(coarse.bdry_tri_verts(bi)), bi);
    }
    let mut bdry_quads: HashMap<QuadKey, usize> = HashMap::new();
    for bi in 0..coarse.num_bdry_quads() {
        bdry_quads.insert(QuadKey::new(coarse.bdry_quad_verts(bi)), bi);
    }
    let mut seed_tris: HashMap<TriKey, usize> = tri_seeds
        .iter()
        .enumerate()
        .map(|(i, s)| (TriKey::new(s.local), i))
        .collect();
    let mut seed_quads: HashMap<QuadKey, usize> = quad_seeds
        .iter()
        .enumerate()
        .map(|(i, s)| (QuadKey::new(s.local), i))
        .collect();
    let mut refined_tris: Vec<RefinedPartFace<3>> = Vec::with_capacity(tri_seeds.len());
    let mut refined_quads: Vec<RefinedPartFace<4>> = Vec::with_capacity(quad_seeds.len());

    let mut registry = SharedVertexRegistry::new(n);

    for ct in CellType::ALL {
        for ci in 0..coarse.num_cells(ct) {
            let conn = coarse.cell_verts(ct, ci);
            let corners: Vec<[f64; 3]> = conn.iter().map(|&v| coarse.coords(v)).collect();
            let mapper = factory.cell_mapper(ct, &corners);
            let div = match ct {
                CellType::Tetrahedron => {
                    subdivide_cell::<tet::TetKind>(n, conn, &mapper, &mut registry, &mut out)?
                }
                CellType::Pyramid => subdivide_cell::<pyramid::PyramidKind>(
                    n,
                    conn,
                    &mapper,
                    &mut registry,
                    &mut out,
                )?,
                CellType::Prism => {
                    subdivide_cell::<prism::PrismKind>(n, conn, &mapper, &mut registry, &mut out)?
                }
                CellType::Hexahedron => {
                    subdivide_cell::<hex::HexKind>(n, conn, &mapper, &mut registry, &mut out)?
                }
            };

            // Boundary and partition-boundary faces owned by this cell.
            for f in ct.tri_faces() {
                let key = TriKey::new([conn[f[0]], conn[f[1]], conn[f[2]]]);
                if let Some(bi) = bdry_tris.remove(&key) {
                    let table = div.face_table(&coarse.bdry_tri_verts(bi))?;
                    emit_refined_tris(&table, &mut out)?;
                }
                if let Some(si) = seed_tris.remove(&key) {
                    let seed = tri_seeds[si];
                    let table = div.face_table(&seed.local)?;
                    refined_tris.push(RefinedPartFace { seed, table });
                }
            }
            for f in ct.quad_faces() {
                let key = QuadKey::new([conn[f[0]], conn[f[1]], conn[f[2]], conn[f[3]]]);
                if let Some(bi) = bdry_quads.remove(&key) {
                    let table = div.face_table(&coarse.bdry_quad_verts(bi))?;
                    emit_refined_quads(&table, &mut out)?;
                }
                if let Some(si) = seed_quads.remove(&key) {
                    let seed = quad_seeds[si];
                    let table = div.face_table(&seed.local)?;
                    refined_quads.push(RefinedPartFace { seed, table });
                }
            }
        }
    }

    if let Some((key, _)) = bdry_tris.iter().next() {
        return Err(MeshRefineError::UnmatchedBoundaryFace(key.sorted4()));
    }
    if let Some((key, _)) = bdry_quads.iter().next() {
        return Err(MeshRefineError::UnmatchedBoundaryFace(key.sorted()));
    }
    if !(seed_tris.is_empty() && seed_quads.is_empty()) {
        return Err(MeshRefineError::PartitionProtocol(
            "partition-boundary face not incident on any cell of this partition".into(),
        ));
    }

    let counts_ok = out.num_verts() as u64 == tally.verts
        && out.num_tets() as u64 == tally.tets
        && out.num_pyramids() as u64 == tally.pyramids
        && out.num_prisms() as u64 == tally.prisms
        && out.num_hexes() as u64 == tally.hexes
        && out.num_bdry_tris() as u64 == tally.bdry_tris
        && out.num_bdry_quads() as u64 == tally.bdry_quads;
    if !counts_ok {
        return Err(MeshRefineError::InternalInvariant(format!(
            "refined counts diverge from the tally: got {} verts / {} tets / {} pyrs / {} prisms \
             / {} hexes, expected {tally:?}",
            out.num_verts(),
            out.num_tets(),
            out.num_pyramids(),
            out.num_prisms(),
            out.num_hexes(),
        )));
    }

    // Keep refined part-face lists in seed order so both partitions walk
    // them identically.
    refined_tris.sort_by_key(|f| crate::topology::sort3(f.seed.global));
    refined_quads.sort_by_key(|f| crate::topology::sort4(f.seed.global));

    Ok((out, refined_tris, refined_quads))
}

fn subdivide_cell<'m, K: CellKind>(
    n: usize,
    conn: &[u32],
    mapper: &'m dyn ParametricMapper,
    registry: &mut SharedVertexRegistry,
    out: &mut UnstructuredMesh,
) -> Result<CellDivider<'m>, MeshRefineError> {
    if conn.len() != K::CELL_TYPE.num_verts() {
        return Err(MeshRefineError::InputInvalid(format!(
            "{:?} cell carries {} verts",
            K::CELL_TYPE,
            conn.len()
        )));
    }
    let mut div = CellDivider::new(K::CELL_TYPE, n, conn, mapper);
    div.divide_edges(registry, out)?;
    div.divide_faces(registry, out)?;
    K::divide_interior(&mut div, out)?;
    K::emit_sub_cells(&div, out)?;
    Ok(div)
}

/// Emit the n^2 refined triangles of one face table.
fn emit_refined_tris(
    table: &FaceTable<u32>,
    out: &mut UnstructuredMesh,
) -> Result<(), MeshRefineError> {
    let n = table.n();
    for j in 0..n {
        for i in 0..n - j {
            out.add_bdry_tri([table.get(i, j), table.get(i + 1, j), table.get(i, j + 1)])?;
            if i + j + 2 <= n {
                out.add_bdry_tri([
                    table.get(i + 1, j),
                    table.get(i + 1, j + 1),
                    table.get(i, j + 1),
                ])?;
            }
        }
    }
    Ok(())
}

/// Emit the n^2 refined quads of one face table.
fn emit_refined_quads(
    table: &FaceTable<u32>,
    out: &mut UnstructuredMesh,
) -> Result<(), MeshRefineError> {
    let n = table.n();
    for j in 0..n {
        for i in 0..n {
            out.add_bdry_quad([
                table.get(i, j),
                table.get(i + 1, j),
                table.get(i + 1, j + 1),
                table.get(i, j + 1),
            ])?;
        }
    }
    Ok(())
}
