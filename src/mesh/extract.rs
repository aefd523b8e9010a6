//! Per-partition coarse sub-mesh extraction.
//!
//! For one partition, build a self-contained mesh holding its cells, the
//! real boundary faces whose vertices it owns, and the partition-boundary
//! faces exposed only because the neighbouring cell went to another
//! partition. Vertex ids are compacted; the mapping back to the parent mesh
//! is kept so partition-boundary faces stay identifiable globally.

use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::partitioning::CellPartData;
use crate::topology::{CellType, QuadKey, TriKey};
use hashbrown::{HashMap, HashSet};

/// A partition-boundary face in both id spaces: `local` corners index the
/// extracted sub-mesh, `global` the parent mesh, in the same order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartBdryFace<const C: usize> {
    pub local: [u32; C],
    pub global: [u32; C],
}

/// One partition's coarse sub-mesh plus its partition-boundary faces.
#[derive(Clone, Debug)]
pub struct ExtractedPart {
    pub part: u32,
    pub mesh: UnstructuredMesh,
    /// Sub-mesh vertex id to parent-mesh vertex id.
    pub to_parent_vert: Vec<u32>,
    pub part_bdry_tris: Vec<PartBdryFace<3>>,
    pub part_bdry_quads: Vec<PartBdryFace<4>>,
}

/// Extract the coarse sub-mesh for partition `part`.
///
/// Cells keep the order they have in `assignment`; vertices are renumbered
/// in ascending parent order. Both choices keep the extraction, and
/// therefore the refinement that follows it, deterministic.
pub fn extract_partition(
    mesh: &UnstructuredMesh,
    assignment: &[CellPartData],
    part: u32,
) -> Result<ExtractedPart, MeshRefineError> {
    let mut toggled_tris: HashSet<TriKey> = HashSet::new();
    let mut toggled_quads: HashSet<QuadKey> = HashSet::new();
    let mut vert_used = vec![false; mesh.num_verts()];

    let mine: Vec<&CellPartData> = assignment.iter().filter(|c| c.part == part).collect();
    for cpd in &mine {
        let ct = cpd.cell_type;
        let idx = cpd.index as usize;
        if idx >= mesh.num_cells(ct) {
            return Err(MeshRefineError::InputInvalid(format!(
                "partition assignment references {ct:?} cell {idx} of {}",
                mesh.num_cells(ct)
            )));
        }
        let conn = mesh.cell_verts(ct, idx);
        for &v in conn {
            vert_used[v as usize] = true;
        }
        for f in ct.tri_faces() {
            let key = TriKey::new([conn[f[0]], conn[f[1]], conn[f[2]]]);
            if !toggled_tris.remove(&key) {
                toggled_tris.insert(key);
            }
        }
        for f in ct.quad_faces() {
            let key = QuadKey::new([conn[f[0]], conn[f[1]], conn[f[2]], conn[f[3]]]);
            if !toggled_quads.remove(&key) {
                toggled_quads.insert(key);
            }
        }
    }

    // A declared boundary face belongs to this partition iff all its corners
    // are in use here and some cell of this partition contributed it to the
    // toggled set exactly once.
    let mut real_bdry_tris: Vec<usize> = Vec::new();
    for bi in 0..mesh.num_bdry_tris() {
        let conn = mesh.bdry_tri_verts(bi);
        if conn.iter().all(|&v| vert_used[v as usize])
            && toggled_tris.remove(&TriKey::new(conn))
        {
            real_bdry_tris.push(bi);
        }
    }
    let mut real_bdry_quads: Vec<usize> = Vec::new();
    for bi in 0..mesh.num_bdry_quads() {
        let conn = mesh.bdry_quad_verts(bi);
        if conn.iter().all(|&v| vert_used[v as usize])
            && toggled_quads.remove(&QuadKey::new(conn))
        {
            real_bdry_quads.push(bi);
        }
    }

    // Whatever is still toggled faces a cell in another partition.
    let mut part_tris: Vec<TriKey> = toggled_tris.into_iter().collect();
    let mut part_quads: Vec<QuadKey> = toggled_quads.into_iter().collect();
    part_tris.sort_unstable();
    part_quads.sort_unstable();

    // Compact vertex renumbering in ascending parent order.
    let mut to_parent_vert = Vec::new();
    let mut to_local: HashMap<u32, u32> = HashMap::new();
    let mut sub = UnstructuredMesh::new();
    for v in 0..mesh.num_verts() {
        if vert_used[v] {
            let local = sub.add_vert(mesh.coords(v as u32));
            sub.set_length_scale(local, mesh.length_scale(v as u32));
            to_parent_vert.push(v as u32);
            to_local.insert(v as u32, local);
        }
    }

    let remap = |parent: u32| -> u32 { to_local[&parent] };

    for cpd in &mine {
        let conn = mesh.cell_verts(cpd.cell_type, cpd.index as usize);
        match cpd.cell_type {
            CellType::Tetrahedron => {
                sub.add_tet([remap(conn[0]), remap(conn[1]), remap(conn[2]), remap(conn[3])])?;
            }
            CellType::Pyramid => {
                sub.add_pyramid([
                    remap(conn[0]),
                    remap(conn[1]),
                    remap(conn[2]),
                    remap(conn[3]),
                    remap(conn[4]),
                ])?;
            }
            CellType::Prism => {
                sub.add_prism([
                    remap(conn[0]),
                    remap(conn[1]),
                    remap(conn[2]),
                    remap(conn[3]),
                    remap(conn[4]),
                    remap(conn[5]),
                ])?;
            }
            CellType::Hexahedron => {
                sub.add_hex([
                    remap(conn[0]),
                    remap(conn[1]),
                    remap(conn[2]),
                    remap(conn[3]),
                    remap(conn[4]),
                    remap(conn[5]),
                    remap(conn[6]),
                    remap(conn[7]),
                ])?;
            }
        }
    }

    for bi in real_bdry_tris {
        let c = mesh.bdry_tri_verts(bi);
        sub.add_bdry_tri([remap(c[0]), remap(c[1]), remap(c[2])])?;
    }
    for bi in real_bdry_quads {
        let c = mesh.bdry_quad_verts(bi);
        sub.add_bdry_quad([remap(c[0]), remap(c[1]), remap(c[2]), remap(c[3])])?;
    }

    let part_bdry_tris = part_tris
        .iter()
        .map(|key| {
            let g = key.corners();
            PartBdryFace {
                local: [remap(g[0]), remap(g[1]), remap(g[2])],
                global: g,
            }
        })
        .collect();
    let part_bdry_quads = part_quads
        .iter()
        .map(|key| {
            let g = key.corners();
            PartBdryFace {
                local: [remap(g[0]), remap(g[1]), remap(g[2]), remap(g[3])],
                global: g,
            }
        })
        .collect();

    Ok(ExtractedPart {
        part,
        mesh: sub,
        to_parent_vert,
        part_bdry_tris,
        part_bdry_quads,
    })
}
