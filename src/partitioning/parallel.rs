//! Partition-parallel refinement drivers.
//!
//! Rank 0 computes the partition assignment and the partition-boundary face
//! pairing, broadcasts both, and every worker then refines its own
//! extracted sub-mesh independently. Afterwards workers exchange refined
//! face tables with each neighbour and resolve rotations into
//! local-to-remote vertex maps. An in-process variant refines all
//! partitions in one process and merges them back into a single mesh,
//! consolidating the cross-partition duplicates the maps identify.

use crate::geometry::{LinearMapperFactory, MapperFactory};
use crate::mesh::extract::extract_partition;
use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::partitioning::communicator::{broadcast_bytes, tags, Communicator, Wait};
use crate::partitioning::matching::{match_face_verts, pair_partition_faces};
use crate::partitioning::wire::{self, GlobalFaceSeed};
use crate::partitioning::{CellPartData, ContiguousPartitioner, Partitioner};
use crate::refine::{subdivide_mesh, PartFaceSeed, RefinedPartFace};
use crate::TOLTEST;
use hashbrown::HashMap;
use std::collections::BTreeMap;

/// One worker's refined partition: the sub-mesh, its link back to the
/// parent mesh, the refined partition-boundary faces, and (after the
/// exchange) the vertex identification maps per neighbour.
#[derive(Clone, Debug)]
pub struct PartitionRefinement {
    pub part: u32,
    pub mesh: UnstructuredMesh,
    /// Coarse sub-mesh vertex id to parent-mesh vertex id. Refined vertex
    /// ids below `to_parent_vert.len()` are coarse vertices.
    pub to_parent_vert: Vec<u32>,
    pub refined_tris: Vec<RefinedPartFace<3>>,
    pub refined_quads: Vec<RefinedPartFace<4>>,
    /// Per neighbour partition: pairs of (local refined vert, remote
    /// refined vert) that are the same physical point.
    pub neighbor_vert_maps: BTreeMap<u32, Vec<(u32, u32)>>,
}

/// Refine this worker's partition in parallel mode.
///
/// `comm.rank()` is the partition id and `comm.size()` the partition
/// count. Rank 0 partitions the mesh and pairs partition-boundary faces;
/// everyone receives both via broadcast, refines, then exchanges refined
/// face tables with each neighbour.
pub fn refine_partition<C, P, F>(
    mesh: &UnstructuredMesh,
    n: usize,
    comm: &C,
    partitioner: &P,
    factory: &F,
) -> Result<PartitionRefinement, MeshRefineError>
where
    C: Communicator,
    P: Partitioner,
    F: MapperFactory,
{
    let part = comm.rank() as u32;
    let n_parts = comm.size() as u32;

    let (assignment, tri_seeds, quad_seeds) = if comm.rank() == 0 {
        let assignment = partitioner.partition(mesh, n_parts)?;
        let (tris, quads) = pair_partition_faces(mesh, &assignment)?;
        broadcast_bytes(comm, 0, &wire::encode_assignment(&assignment));
        broadcast_bytes(comm, 0, &wire::encode_face_seeds(&tris, &quads));
        (assignment, tris, quads)
    } else {
        let bytes = broadcast_bytes(comm, 0, &[]);
        let assignment = wire::decode_assignment(&bytes)?;
        let bytes = broadcast_bytes(comm, 0, &[]);
        let (tris, quads) = wire::decode_face_seeds(&bytes)?;
        (assignment, tris, quads)
    };

    let mut result = refine_one_partition(mesh, n, part, &assignment, &tri_seeds, &quad_seeds, factory)?;
    exchange_and_match(&mut result, n, comm)?;
    Ok(result)
}

/// Refine every partition in this process and merge the results back into
/// one mesh, consolidating shared vertices through the rotation maps.
pub fn refine_partitioned(
    mesh: &UnstructuredMesh,
    n: usize,
    n_parts: u32,
) -> Result<UnstructuredMesh, MeshRefineError> {
    if n_parts <= 1 {
        return crate::refine::refine(mesh, n);
    }
    mesh.validate()?;
    let assignment = ContiguousPartitioner.partition(mesh, n_parts)?;
    let (tri_seeds, quad_seeds) = pair_partition_faces(mesh, &assignment)?;

    let refine_part = |part: u32| {
        refine_one_partition(
            mesh,
            n,
            part,
            &assignment,
            &tri_seeds,
            &quad_seeds,
            &LinearMapperFactory,
        )
    };
    #[cfg(feature = "rayon")]
    let parts: Vec<PartitionRefinement> = {
        use rayon::prelude::*;
        (0..n_parts)
            .into_par_iter()
            .map(refine_part)
            .collect::<Result<_, _>>()?
    };
    #[cfg(not(feature = "rayon"))]
    let parts: Vec<PartitionRefinement> = (0..n_parts).map(refine_part).collect::<Result<_, _>>()?;

    merge_partitions(&parts)
}

/// Run `n_parts` communicating workers on dedicated threads and return
/// every partition's refinement, in partition order.
#[cfg(feature = "rayon")]
pub fn refine_for_parallel(
    mesh: &UnstructuredMesh,
    n: usize,
    n_parts: u32,
) -> Result<Vec<PartitionRefinement>, MeshRefineError> {
    use crate::partitioning::communicator::ThreadComm;
    mesh.validate()?;
    let comms = ThreadComm::for_run(n_parts as usize);
    let mut results: Vec<Option<Result<PartitionRefinement, MeshRefineError>>> =
        (0..n_parts).map(|_| None).collect();
    std::thread::scope(|scope| {
        let mut joins = Vec::new();
        for comm in comms {
            joins.push(scope.spawn(move || {
                refine_partition(mesh, n, &comm, &ContiguousPartitioner, &LinearMapperFactory)
            }));
        }
        for (slot, join) in results.iter_mut().zip(joins) {
            *slot = Some(join.join().expect("partition worker panicked"));
        }
    });
    results
        .into_iter()
        .map(|r| r.expect("worker result recorded"))
        .collect()
}

fn refine_one_partition<F: MapperFactory>(
    mesh: &UnstructuredMesh,
    n: usize,
    part: u32,
    assignment: &[CellPartData],
    tri_seeds_all: &[GlobalFaceSeed<3>],
    quad_seeds_all: &[GlobalFaceSeed<4>],
    factory: &F,
) -> Result<PartitionRefinement, MeshRefineError> {
    let extracted = extract_partition(mesh, assignment, part)?;
    let to_local: HashMap<u32, u32> = extracted
        .to_parent_vert
        .iter()
        .enumerate()
        .map(|(local, &parent)| (parent, local as u32))
        .collect();
    let localize = |global: u32| -> Result<u32, MeshRefineError> {
        to_local.get(&global).copied().ok_or_else(|| {
            MeshRefineError::PartitionProtocol(format!(
                "matched face references vert {global} outside partition {part}"
            ))
        })
    };

    let mut tri_seeds = Vec::new();
    for seed in tri_seeds_all.iter().filter(|s| s.part == part) {
        tri_seeds.push(PartFaceSeed {
            local: [
                localize(seed.global[0])?,
                localize(seed.global[1])?,
                localize(seed.global[2])?,
            ],
            global: seed.global,
            remote_part: seed.remote_part,
        });
    }
    let mut quad_seeds = Vec::new();
    for seed in quad_seeds_all.iter().filter(|s| s.part == part) {
        quad_seeds.push(PartFaceSeed {
            local: [
                localize(seed.global[0])?,
                localize(seed.global[1])?,
                localize(seed.global[2])?,
                localize(seed.global[3])?,
            ],
            global: seed.global,
            remote_part: seed.remote_part,
        });
    }
    if tri_seeds.len() != extracted.part_bdry_tris.len()
        || quad_seeds.len() != extracted.part_bdry_quads.len()
    {
        return Err(MeshRefineError::InternalInvariant(format!(
            "partition {part}: pairing found {}+{} boundary faces, extraction {}+{}",
            tri_seeds.len(),
            quad_seeds.len(),
            extracted.part_bdry_tris.len(),
            extracted.part_bdry_quads.len(),
        )));
    }

    let (refined, refined_tris, refined_quads) =
        subdivide_mesh(&extracted.mesh, n, factory, &tri_seeds, &quad_seeds)?;
    Ok(PartitionRefinement {
        part,
        mesh: refined,
        to_parent_vert: extracted.to_parent_vert,
        refined_tris,
        refined_quads,
        neighbor_vert_maps: BTreeMap::new(),
    })
}

/// Ship refined face tables to each neighbour, receive theirs, and resolve
/// every shared face into vertex identification pairs.
fn exchange_and_match<C: Communicator>(
    result: &mut PartitionRefinement,
    n: usize,
    comm: &C,
) -> Result<(), MeshRefineError> {
    let me = result.part;
    let mut by_neighbor: BTreeMap<u32, (Vec<&RefinedPartFace<3>>, Vec<&RefinedPartFace<4>>)> =
        BTreeMap::new();
    for face in &result.refined_tris {
        by_neighbor.entry(face.seed.remote_part).or_default().0.push(face);
    }
    for face in &result.refined_quads {
        by_neighbor.entry(face.seed.remote_part).or_default().1.push(face);
    }

    // Post all receives, then all sends, then drain. Message sizes are
    // derivable: the neighbour has exactly as many faces toward us as we
    // have toward it.
    let mut recv_bufs: BTreeMap<u32, (Vec<u8>, Vec<u8>)> = by_neighbor
        .iter()
        .map(|(&r, (tris, quads))| {
            (
                r,
                (
                    vec![0u8; wire::tri_msg_size(tris.len(), n)],
                    vec![0u8; wire::quad_msg_size(quads.len(), n)],
                ),
            )
        })
        .collect();
    let mut recv_handles = Vec::new();
    for (&r, (tri_buf, quad_buf)) in recv_bufs.iter_mut() {
        recv_handles.push((r, true, comm.irecv(r as usize, tags::FACE_TRIS.as_u16(), tri_buf)));
        recv_handles.push((
            r,
            false,
            comm.irecv(r as usize, tags::FACE_QUADS.as_u16(), quad_buf),
        ));
    }
    let mut send_handles = Vec::new();
    for (&r, (tris, quads)) in &by_neighbor {
        send_handles.push(comm.isend(
            r as usize,
            tags::FACE_TRIS.as_u16(),
            &wire::encode_tri_faces(tris, n, me),
        ));
        send_handles.push(comm.isend(
            r as usize,
            tags::FACE_QUADS.as_u16(),
            &wire::encode_quad_faces(quads, n, me),
        ));
    }

    let mut received: BTreeMap<u32, (Vec<u8>, Vec<u8>)> = BTreeMap::new();
    for (r, is_tri, handle) in recv_handles {
        let msg = handle.wait().ok_or_else(|| {
            MeshRefineError::PartitionProtocol(format!("missing face message from partition {r}"))
        })?;
        let entry = received.entry(r).or_default();
        if is_tri {
            entry.0 = msg;
        } else {
            entry.1 = msg;
        }
    }
    for handle in send_handles {
        handle.wait();
    }

    // Local lookups keyed by sorted global corner ids.
    let tri_lookup: HashMap<[u32; 3], &RefinedPartFace<3>> = result
        .refined_tris
        .iter()
        .map(|f| (crate::topology::sort3(f.seed.global), f))
        .collect();
    let quad_lookup: HashMap<[u32; 4], &RefinedPartFace<4>> = result
        .refined_quads
        .iter()
        .map(|f| (crate::topology::sort4(f.seed.global), f))
        .collect();

    let mut maps: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
    for (r, (tri_bytes, quad_bytes)) in &received {
        let pairs = maps.entry(*r).or_default();
        for remote in wire::decode_tri_faces(tri_bytes, n)? {
            if remote.part != *r || remote.remote_part != me {
                return Err(MeshRefineError::PartitionProtocol(format!(
                    "face from partition {r} claims route {} -> {}",
                    remote.part, remote.remote_part
                )));
            }
            let local = tri_lookup
                .get(&crate::topology::sort3(remote.global))
                .ok_or_else(|| {
                    MeshRefineError::PartitionProtocol(format!(
                        "partition {r} sent unknown face {:?}",
                        remote.global
                    ))
                })?;
            match_face_verts(local, remote.global, &remote.table, pairs)?;
        }
        for remote in wire::decode_quad_faces(quad_bytes, n)? {
            if remote.part != *r || remote.remote_part != me {
                return Err(MeshRefineError::PartitionProtocol(format!(
                    "face from partition {r} claims route {} -> {}",
                    remote.part, remote.remote_part
                )));
            }
            let local = quad_lookup
                .get(&crate::topology::sort4(remote.global))
                .ok_or_else(|| {
                    MeshRefineError::PartitionProtocol(format!(
                        "partition {r} sent unknown face {:?}",
                        remote.global
                    ))
                })?;
            match_face_verts(local, remote.global, &remote.table, pairs)?;
        }
    }
    result.neighbor_vert_maps = maps;
    Ok(())
}

fn find(alias: &HashMap<(u32, u32), (u32, u32)>, mut x: (u32, u32)) -> (u32, u32) {
    while let Some(&next) = alias.get(&x) {
        x = next;
    }
    x
}

fn union(alias: &mut HashMap<(u32, u32), (u32, u32)>, a: (u32, u32), b: (u32, u32)) {
    let ra = find(alias, a);
    let rb = find(alias, b);
    if ra != rb {
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        alias.insert(hi, lo);
    }
}

/// Merge per-partition refined meshes into one, consolidating vertices that
/// the coarse parent ids or the face maps identify as the same point.
fn merge_partitions(parts: &[PartitionRefinement]) -> Result<UnstructuredMesh, MeshRefineError> {
    let mut alias: HashMap<(u32, u32), (u32, u32)> = HashMap::new();

    // Coarse vertices shared between partitions unify through parent ids.
    let mut parent_first: HashMap<u32, (u32, u32)> = HashMap::new();
    for pr in parts {
        for (local, &parent) in pr.to_parent_vert.iter().enumerate() {
            let here = (pr.part, local as u32);
            match parent_first.get(&parent) {
                Some(&first) => union(&mut alias, first, here),
                None => {
                    parent_first.insert(parent, here);
                }
            }
        }
    }

    // Refined face vertices unify through the rotation maps; each unordered
    // partition pair is walked from its lower side.
    let tri_index: HashMap<(u32, [u32; 3]), &RefinedPartFace<3>> = parts
        .iter()
        .flat_map(|pr| {
            pr.refined_tris
                .iter()
                .map(move |f| ((pr.part, crate::topology::sort3(f.seed.global)), f))
        })
        .collect();
    let quad_index: HashMap<(u32, [u32; 4]), &RefinedPartFace<4>> = parts
        .iter()
        .flat_map(|pr| {
            pr.refined_quads
                .iter()
                .map(move |f| ((pr.part, crate::topology::sort4(f.seed.global)), f))
        })
        .collect();

    for pr in parts {
        for local in &pr.refined_tris {
            let r = local.seed.remote_part;
            if pr.part >= r {
                continue;
            }
            let remote = tri_index
                .get(&(r, crate::topology::sort3(local.seed.global)))
                .ok_or_else(|| {
                    MeshRefineError::InternalInvariant(format!(
                        "partition {r} lost its side of face {:?}",
                        local.seed.global
                    ))
                })?;
            let mut pairs = Vec::new();
            match_face_verts(local, remote.seed.global, &remote.table, &mut pairs)?;
            for (a, b) in pairs {
                check_coords_agree(parts, (pr.part, a), (r, b))?;
                union(&mut alias, (pr.part, a), (r, b));
            }
        }
        for local in &pr.refined_quads {
            let r = local.seed.remote_part;
            if pr.part >= r {
                continue;
            }
            let remote = quad_index
                .get(&(r, crate::topology::sort4(local.seed.global)))
                .ok_or_else(|| {
                    MeshRefineError::InternalInvariant(format!(
                        "partition {r} lost its side of face {:?}",
                        local.seed.global
                    ))
                })?;
            let mut pairs = Vec::new();
            match_face_verts(local, remote.seed.global, &remote.table, &mut pairs)?;
            for (a, b) in pairs {
                check_coords_agree(parts, (pr.part, a), (r, b))?;
                union(&mut alias, (pr.part, a), (r, b));
            }
        }
    }

    // Assign merged ids in (partition, vert) order; class roots are minimal
    // in that order, so they are always numbered before their aliases.
    let mut merged = UnstructuredMesh::new();
    let mut final_ids: Vec<Vec<u32>> = parts
        .iter()
        .map(|pr| vec![u32::MAX; pr.mesh.num_verts()])
        .collect();
    for (pi, pr) in parts.iter().enumerate() {
        for v in 0..pr.mesh.num_verts() as u32 {
            let root = find(&alias, (pr.part, v));
            if root == (pr.part, v) {
                let id = merged.add_vert(pr.mesh.coords(v));
                merged.set_length_scale(id, pr.mesh.length_scale(v));
                final_ids[pi][v as usize] = id;
            } else {
                let root_part_index = parts
                    .iter()
                    .position(|q| q.part == root.0)
                    .expect("root partition present");
                let id = final_ids[root_part_index][root.1 as usize];
                debug_assert_ne!(id, u32::MAX, "alias resolved before its root");
                final_ids[pi][v as usize] = id;
            }
        }
    }

    for (pi, pr) in parts.iter().enumerate() {
        let ids = &final_ids[pi];
        let map = |v: u32| ids[v as usize];
        for ci in 0..pr.mesh.num_tets() {
            let c = pr.mesh.tet_verts(ci);
            merged.add_tet([map(c[0]), map(c[1]), map(c[2]), map(c[3])])?;
        }
        for ci in 0..pr.mesh.num_pyramids() {
            let c = pr.mesh.pyramid_verts(ci);
            merged.add_pyramid([map(c[0]), map(c[1]), map(c[2]), map(c[3]), map(c[4])])?;
        }
        for ci in 0..pr.mesh.num_prisms() {
            let c = pr.mesh.prism_verts(ci);
            merged.add_prism([map(c[0]), map(c[1]), map(c[2]), map(c[3]), map(c[4]), map(c[5])])?;
        }
        for ci in 0..pr.mesh.num_hexes() {
            let c = pr.mesh.hex_verts(ci);
            merged.add_hex([
                map(c[0]),
                map(c[1]),
                map(c[2]),
                map(c[3]),
                map(c[4]),
                map(c[5]),
                map(c[6]),
                map(c[7]),
            ])?;
        }
        for bi in 0..pr.mesh.num_bdry_tris() {
            let c = pr.mesh.bdry_tri_verts(bi);
            merged.add_bdry_tri([map(c[0]), map(c[1]), map(c[2])])?;
        }
        for bi in 0..pr.mesh.num_bdry_quads() {
            let c = pr.mesh.bdry_quad_verts(bi);
            merged.add_bdry_quad([map(c[0]), map(c[1]), map(c[2]), map(c[3])])?;
        }
    }
    Ok(merged)
}

fn check_coords_agree(
    parts: &[PartitionRefinement],
    a: (u32, u32),
    b: (u32, u32),
) -> Result<(), MeshRefineError> {
    let pa = parts.iter().find(|p| p.part == a.0).expect("partition a");
    let pb = parts.iter().find(|p| p.part == b.0).expect("partition b");
    let ca = pa.mesh.coords(a.1);
    let cb = pb.mesh.coords(b.1);
    for k in 0..3 {
        if (ca[k] - cb[k]).abs() > TOLTEST {
            return Err(MeshRefineError::InternalInvariant(format!(
                "matched verts {a:?} and {b:?} disagree: {ca:?} vs {cb:?}"
            )));
        }
    }
    Ok(())
}
