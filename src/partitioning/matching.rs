//! Partition-boundary face pairing and rotation-resolved vertex matching.
//!
//! Before refinement, every partition-boundary face is paired with its twin
//! in the neighbouring partition by sorted-global corner ids. After
//! refinement, the two sides exchange refined vertex tables; the receiver
//! recovers the rotation between the two corner orderings and walks both
//! lattices in lockstep to identify vertices that are the same physical
//! point.

use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::partitioning::wire::GlobalFaceSeed;
use crate::partitioning::CellPartData;
use crate::refine::registry::FaceTable;
use crate::refine::RefinedPartFace;
use crate::topology::{QuadKey, TriKey};
use hashbrown::{HashMap, HashSet};

/// Pair every partition-boundary face of the whole mesh.
///
/// One pass over all cells toggles each face per owning partition; faces
/// left contributed by exactly two partitions are partition boundary and
/// produce one seed per side. Faces contributed once must be declared mesh
/// boundary; three or more distinct contributions mean the mesh is
/// degenerate.
#[allow(clippy::type_complexity)]
pub fn pair_partition_faces(
    mesh: &UnstructuredMesh,
    assignment: &[CellPartData],
) -> Result<(Vec<GlobalFaceSeed<3>>, Vec<GlobalFaceSeed<4>>), MeshRefineError> {
    let mut tri_sides: HashMap<TriKey, Vec<(u32, [u32; 3])>> = HashMap::new();
    let mut quad_sides: HashMap<QuadKey, Vec<(u32, [u32; 4])>> = HashMap::new();

    for cpd in assignment {
        let ct = cpd.cell_type;
        let conn = mesh.cell_verts(ct, cpd.index as usize);
        for f in ct.tri_faces() {
            let corners = [conn[f[0]], conn[f[1]], conn[f[2]]];
            let sides = tri_sides.entry(TriKey::new(corners)).or_default();
            // A second contribution from the same partition makes the face
            // interior to it.
            if let Some(pos) = sides.iter().position(|&(p, _)| p == cpd.part) {
                sides.swap_remove(pos);
            } else {
                sides.push((cpd.part, corners));
            }
        }
        for f in ct.quad_faces() {
            let corners = [conn[f[0]], conn[f[1]], conn[f[2]], conn[f[3]]];
            let sides = quad_sides.entry(QuadKey::new(corners)).or_default();
            if let Some(pos) = sides.iter().position(|&(p, _)| p == cpd.part) {
                sides.swap_remove(pos);
            } else {
                sides.push((cpd.part, corners));
            }
        }
    }

    let declared_tris: HashSet<TriKey> = (0..mesh.num_bdry_tris())
        .map(|bi| TriKey::new(mesh.bdry_tri_verts(bi)))
        .collect();
    let declared_quads: HashSet<QuadKey> = (0..mesh.num_bdry_quads())
        .map(|bi| QuadKey::new(mesh.bdry_quad_verts(bi)))
        .collect();

    let mut tris: Vec<GlobalFaceSeed<3>> = Vec::new();
    for (key, sides) in tri_sides {
        match sides.len() {
            0 => {}
            1 => {
                if !declared_tris.contains(&key) {
                    return Err(MeshRefineError::UnmatchedBoundaryFace(key.sorted4()));
                }
            }
            2 => {
                for (side, other) in [(0, 1), (1, 0)] {
                    tris.push(GlobalFaceSeed {
                        part: sides[side].0,
                        remote_part: sides[other].0,
                        global: sides[side].1,
                    });
                }
            }
            _ => return Err(MeshRefineError::MalformedMesh(key.sorted4())),
        }
    }
    let mut quads: Vec<GlobalFaceSeed<4>> = Vec::new();
    for (key, sides) in quad_sides {
        match sides.len() {
            0 => {}
            1 => {
                if !declared_quads.contains(&key) {
                    return Err(MeshRefineError::UnmatchedBoundaryFace(key.sorted()));
                }
            }
            2 => {
                for (side, other) in [(0, 1), (1, 0)] {
                    quads.push(GlobalFaceSeed {
                        part: sides[side].0,
                        remote_part: sides[other].0,
                        global: sides[side].1,
                    });
                }
            }
            _ => return Err(MeshRefineError::MalformedMesh(key.sorted())),
        }
    }

    tris.sort_by_key(|s| (crate::topology::sort3(s.global), s.part));
    quads.sort_by_key(|s| (crate::topology::sort4(s.global), s.part));
    Ok((tris, quads))
}

/// Signed rotation between two corner orderings of the same face: the
/// magnitude is the cyclic shift plus one, the sign the winding. Local
/// corner 0 sits at remote corner `|rot| - 1`; positive means both sides
/// walk the corners the same way round.
pub fn face_rotation<const C: usize>(
    local: [u32; C],
    remote: [u32; C],
) -> Result<i32, MeshRefineError> {
    for cc in 0..C {
        if local[0] != remote[cc] {
            continue;
        }
        if (0..C).all(|k| local[k] == remote[(cc + k) % C]) {
            return Ok(cc as i32 + 1);
        }
        if (0..C).all(|k| local[k] == remote[(cc + C - k) % C]) {
            return Ok(-(cc as i32 + 1));
        }
    }
    Err(MeshRefineError::PartitionProtocol(format!(
        "corner orderings {local:?} and {remote:?} are not the same face"
    )))
}

/// Corner positions on a face lattice: triangles at (0,0), (n,0), (0,n);
/// quads walk the square.
fn corner_lattice<const C: usize>(n: usize) -> [[isize; 2]; C] {
    let n = n as isize;
    let tri = [[0, 0], [n, 0], [0, n]];
    let quad = [[0, 0], [n, 0], [n, n], [0, n]];
    let mut out = [[0isize; 2]; C];
    for (k, slot) in out.iter_mut().enumerate() {
        *slot = if C == 3 { tri[k] } else { quad[k] };
    }
    out
}

/// Pair each refined vertex of `local` with the corresponding vertex of the
/// remote table, resolving the rotation between the two corner orderings.
///
/// Returns the rotation and appends `(local vert, remote vert)` pairs over
/// the full face lattice.
pub fn match_face_verts<const C: usize>(
    local: &RefinedPartFace<C>,
    remote_global: [u32; C],
    remote_table: &FaceTable<u32>,
    pairs: &mut Vec<(u32, u32)>,
) -> Result<i32, MeshRefineError> {
    let n = local.table.n();
    if remote_table.n() != n {
        return Err(MeshRefineError::PartitionProtocol(
            "refined face tables disagree on subdivision factor".into(),
        ));
    }
    let rot = face_rotation(local.seed.global, remote_global)?;
    let cc = (rot.unsigned_abs() as usize) - 1;
    // Remote index of each local corner.
    let mut perm = [0usize; C];
    for (k, p) in perm.iter_mut().enumerate() {
        *p = if rot > 0 { (cc + k) % C } else { (cc + C - k) % C };
    }

    let corners = corner_lattice::<C>(n);
    let r0 = corners[perm[0]];
    let di = [
        (corners[perm[1]][0] - r0[0]) / n as isize,
        (corners[perm[1]][1] - r0[1]) / n as isize,
    ];
    let last = corners[perm[C - 1]];
    let dj = [(last[0] - r0[0]) / n as isize, (last[1] - r0[1]) / n as isize];

    let tri = C == 3;
    for j in 0..=n {
        let imax = if tri { n - j } else { n };
        for i in 0..=imax {
            let ri = r0[0] + di[0] * i as isize + dj[0] * j as isize;
            let rj = r0[1] + di[1] * i as isize + dj[1] * j as isize;
            debug_assert!(ri >= 0 && rj >= 0);
            pairs.push((
                local.table.get(i, j),
                remote_table.get(ri as usize, rj as usize),
            ));
        }
    }
    Ok(rot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refine::PartFaceSeed;

    #[test]
    fn rotation_cases_tri() {
        assert_eq!(face_rotation([1, 2, 3], [1, 2, 3]).unwrap(), 1);
        assert_eq!(face_rotation([1, 2, 3], [3, 1, 2]).unwrap(), 2);
        assert_eq!(face_rotation([1, 2, 3], [2, 3, 1]).unwrap(), 3);
        // The twin face in the neighbouring cell winds the other way.
        assert_eq!(face_rotation([1, 2, 3], [1, 3, 2]).unwrap(), -1);
        assert_eq!(face_rotation([1, 2, 3], [2, 1, 3]).unwrap(), -2);
        assert_eq!(face_rotation([1, 2, 3], [3, 2, 1]).unwrap(), -3);
        assert!(face_rotation([1, 2, 3], [1, 2, 4]).is_err());
    }

    #[test]
    fn rotation_cases_quad() {
        assert_eq!(face_rotation([4, 5, 6, 7], [4, 5, 6, 7]).unwrap(), 1);
        assert_eq!(face_rotation([4, 5, 6, 7], [7, 4, 5, 6]).unwrap(), 2);
        assert_eq!(face_rotation([4, 5, 6, 7], [4, 7, 6, 5]).unwrap(), -1);
        assert_eq!(face_rotation([4, 5, 6, 7], [5, 4, 7, 6]).unwrap(), -2);
        assert!(face_rotation([4, 5, 6, 7], [4, 6, 5, 7]).is_err());
    }

    fn tri_face(global: [u32; 3], n: usize, base: u32) -> RefinedPartFace<3> {
        let mut table = FaceTable::<u32>::new(n);
        let mut next = base;
        for j in 0..=n {
            for i in 0..=n - j {
                table.set(i, j, next);
                next += 1;
            }
        }
        RefinedPartFace {
            seed: PartFaceSeed {
                local: [0, 1, 2],
                global,
                remote_part: 1,
            },
            table,
        }
    }

    #[test]
    fn matched_tri_corners_line_up() {
        let n = 3;
        let local = tri_face([10, 20, 30], n, 0);
        // Remote side walked the face as (20, 10, 30): reversed, shift 1.
        let remote = tri_face([20, 10, 30], n, 100);
        let mut pairs = Vec::new();
        let rot = match_face_verts(&local, remote.seed.global, &remote.table, &mut pairs).unwrap();
        assert_eq!(rot, -2);
        let lookup: HashMap<u32, u32> = pairs.into_iter().collect();
        // Corner 10 is local (0,0); remote has it at (n, 0).
        assert_eq!(lookup[&local.table.get(0, 0)], remote.table.get(n, 0));
        // Corner 20: local (n, 0), remote (0, 0).
        assert_eq!(lookup[&local.table.get(n, 0)], remote.table.get(0, 0));
        // Corner 30: local and remote (0, n).
        assert_eq!(lookup[&local.table.get(0, n)], remote.table.get(0, n));
        // A perimeter point one step from corner 10 toward corner 20 maps to
        // the remote point one step from its corner 10 toward its corner 20.
        assert_eq!(lookup[&local.table.get(1, 0)], remote.table.get(n - 1, 0));
    }
}
