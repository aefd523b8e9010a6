//! Fixed, versioned, little-endian wire records for the partition protocol.
//!
//! Three message families travel between workers: the partition assignment
//! (broadcast), the matched partition-boundary face seeds (broadcast), and
//! the refined face tables (point-to-point, post refinement). All integers
//! are little-endian fixed width; structs are `#[repr(C)]` and Pod-safe.

use crate::mesh_error::MeshRefineError;
use crate::partitioning::CellPartData;
use crate::refine::registry::FaceTable;
use crate::refine::RefinedPartFace;
use crate::topology::CellType;
use bytemuck::{Pod, Zeroable};

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

pub const KIND_TRI_FACES: u16 = 1;
pub const KIND_QUAD_FACES: u16 = 2;
pub const KIND_ASSIGNMENT: u16 = 3;
pub const KIND_FACE_SEEDS: u16 = 4;

/// Message header: version, kind, record count.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub count_le: u32,
}

impl WireHdr {
    pub fn new(kind: u16, count: usize) -> Self {
        WireHdr {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            count_le: (count as u32).to_le(),
        }
    }

    pub fn check(&self, kind: u16) -> Result<usize, MeshRefineError> {
        if u16::from_le(self.version_le) != WIRE_VERSION {
            return Err(MeshRefineError::PartitionProtocol(format!(
                "wire version {} but expected {WIRE_VERSION}",
                u16::from_le(self.version_le)
            )));
        }
        if u16::from_le(self.kind_le) != kind {
            return Err(MeshRefineError::PartitionProtocol(format!(
                "wire kind {} but expected {kind}",
                u16::from_le(self.kind_le)
            )));
        }
        Ok(u32::from_le(self.count_le) as usize)
    }
}

/// One cell's partition assignment on the wire.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCellPart {
    pub type_le: u32,
    pub index_le: u32,
    pub part_le: u32,
}

/// One matched partition-boundary face seed on the wire. Triangles leave
/// the fourth corner at `u32::MAX`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireFaceSeed {
    pub global_le: [u32; 4],
    pub n_corners_le: u32,
    pub part_le: u32,
    pub remote_part_le: u32,
}

/// Fixed descriptor preceding each refined face table.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireFaceDesc {
    pub global_le: [u32; 4],
    pub part_le: u32,
    pub remote_part_le: u32,
}

const _: () = {
    assert!(std::mem::size_of::<WireHdr>() == 8);
    assert!(std::mem::size_of::<WireCellPart>() == 12);
    assert!(std::mem::size_of::<WireFaceSeed>() == 28);
    assert!(std::mem::size_of::<WireFaceDesc>() == 24);
};

/// Entries in a triangular face table: perimeter plus interior.
#[inline]
pub fn tri_table_len(n: usize) -> usize {
    (n + 1) * (n + 2) / 2
}

/// Entries in a quad face table.
#[inline]
pub fn quad_table_len(n: usize) -> usize {
    (n + 1) * (n + 1)
}

/// Exact byte size of a triangle face message carrying `count` faces.
pub fn tri_msg_size(count: usize, n: usize) -> usize {
    8 + count * (std::mem::size_of::<WireFaceDesc>() + 4 * tri_table_len(n))
}

/// Exact byte size of a quad face message carrying `count` faces.
pub fn quad_msg_size(count: usize, n: usize) -> usize {
    8 + count * (std::mem::size_of::<WireFaceDesc>() + 4 * quad_table_len(n))
}

// --- assignment ---

pub fn encode_assignment(assignment: &[CellPartData]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + assignment.len() * 12);
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(
        KIND_ASSIGNMENT,
        assignment.len(),
    )));
    for cpd in assignment {
        out.extend_from_slice(bytemuck::bytes_of(&WireCellPart {
            type_le: cpd.cell_type.tag().to_le(),
            index_le: cpd.index.to_le(),
            part_le: cpd.part.to_le(),
        }));
    }
    out
}

pub fn decode_assignment(bytes: &[u8]) -> Result<Vec<CellPartData>, MeshRefineError> {
    let mut reader = Reader::new(bytes);
    let hdr: WireHdr = reader.take()?;
    let count = hdr.check(KIND_ASSIGNMENT)?;
    let mut assignment = Vec::with_capacity(count);
    for _ in 0..count {
        let rec: WireCellPart = reader.take()?;
        let tag = u32::from_le(rec.type_le);
        let cell_type = CellType::from_tag(tag).ok_or_else(|| {
            MeshRefineError::PartitionProtocol(format!("unknown cell type tag {tag}"))
        })?;
        assignment.push(CellPartData {
            cell_type,
            index: u32::from_le(rec.index_le),
            part: u32::from_le(rec.part_le),
        });
    }
    reader.finish()?;
    Ok(assignment)
}

// --- face seeds ---

/// A matched partition-boundary face in global ids, as paired by rank 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalFaceSeed<const C: usize> {
    pub part: u32,
    pub remote_part: u32,
    pub global: [u32; C],
}

pub fn encode_face_seeds(
    tris: &[GlobalFaceSeed<3>],
    quads: &[GlobalFaceSeed<4>],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + (tris.len() + quads.len()) * 28);
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(KIND_FACE_SEEDS, tris.len())));
    for seed in tris {
        out.extend_from_slice(bytemuck::bytes_of(&WireFaceSeed {
            global_le: [
                seed.global[0].to_le(),
                seed.global[1].to_le(),
                seed.global[2].to_le(),
                u32::MAX,
            ],
            n_corners_le: 3u32.to_le(),
            part_le: seed.part.to_le(),
            remote_part_le: seed.remote_part.to_le(),
        }));
    }
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(KIND_FACE_SEEDS, quads.len())));
    for seed in quads {
        out.extend_from_slice(bytemuck::bytes_of(&WireFaceSeed {
            global_le: [
                seed.global[0].to_le(),
                seed.global[1].to_le(),
                seed.global[2].to_le(),
                seed.global[3].to_le(),
            ],
            n_corners_le: 4u32.to_le(),
            part_le: seed.part.to_le(),
            remote_part_le: seed.remote_part.to_le(),
        }));
    }
    out
}

#[allow(clippy::type_complexity)]
pub fn decode_face_seeds(
    bytes: &[u8],
) -> Result<(Vec<GlobalFaceSeed<3>>, Vec<GlobalFaceSeed<4>>), MeshRefineError> {
    let mut reader = Reader::new(bytes);
    let tri_count = reader.take::<WireHdr>()?.check(KIND_FACE_SEEDS)?;
    let mut tris = Vec::with_capacity(tri_count);
    for _ in 0..tri_count {
        let rec: WireFaceSeed = reader.take()?;
        if u32::from_le(rec.n_corners_le) != 3 {
            return Err(MeshRefineError::PartitionProtocol(
                "triangle seed with wrong corner count".into(),
            ));
        }
        tris.push(GlobalFaceSeed {
            part: u32::from_le(rec.part_le),
            remote_part: u32::from_le(rec.remote_part_le),
            global: [
                u32::from_le(rec.global_le[0]),
                u32::from_le(rec.global_le[1]),
                u32::from_le(rec.global_le[2]),
            ],
        });
    }
    let quad_count = reader.take::<WireHdr>()?.check(KIND_FACE_SEEDS)?;
    let mut quads = Vec::with_capacity(quad_count);
    for _ in 0..quad_count {
        let rec: WireFaceSeed = reader.take()?;
        if u32::from_le(rec.n_corners_le) != 4 {
            return Err(MeshRefineError::PartitionProtocol(
                "quad seed with wrong corner count".into(),
            ));
        }
        quads.push(GlobalFaceSeed {
            part: u32::from_le(rec.part_le),
            remote_part: u32::from_le(rec.remote_part_le),
            global: rec.global_le.map(u32::from_le),
        });
    }
    reader.finish()?;
    Ok((tris, quads))
}

// --- refined face tables ---

/// A refined partition-boundary face received from a neighbour.
#[derive(Clone, Debug)]
pub struct WireRefinedFace<const C: usize> {
    pub global: [u32; C],
    pub part: u32,
    pub remote_part: u32,
    pub table: FaceTable<u32>,
}

pub fn encode_tri_faces(faces: &[&RefinedPartFace<3>], n: usize, my_part: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(tri_msg_size(faces.len(), n));
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(KIND_TRI_FACES, faces.len())));
    for face in faces {
        out.extend_from_slice(bytemuck::bytes_of(&WireFaceDesc {
            global_le: [
                face.seed.global[0].to_le(),
                face.seed.global[1].to_le(),
                face.seed.global[2].to_le(),
                u32::MAX,
            ],
            part_le: my_part.to_le(),
            remote_part_le: face.seed.remote_part.to_le(),
        }));
        for jj in 0..=n {
            for ii in 0..=n - jj {
                out.extend_from_slice(&face.table.get(ii, jj).to_le_bytes());
            }
        }
    }
    out
}

pub fn encode_quad_faces(faces: &[&RefinedPartFace<4>], n: usize, my_part: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(quad_msg_size(faces.len(), n));
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(
        KIND_QUAD_FACES,
        faces.len(),
    )));
    for face in faces {
        out.extend_from_slice(bytemuck::bytes_of(&WireFaceDesc {
            global_le: face.seed.global.map(u32::to_le),
            part_le: my_part.to_le(),
            remote_part_le: face.seed.remote_part.to_le(),
        }));
        for jj in 0..=n {
            for ii in 0..=n {
                out.extend_from_slice(&face.table.get(ii, jj).to_le_bytes());
            }
        }
    }
    out
}

pub fn decode_tri_faces(
    bytes: &[u8],
    n: usize,
) -> Result<Vec<WireRefinedFace<3>>, MeshRefineError> {
    let mut reader = Reader::new(bytes);
    let count = reader.take::<WireHdr>()?.check(KIND_TRI_FACES)?;
    let mut faces = Vec::with_capacity(count);
    for _ in 0..count {
        let desc: WireFaceDesc = reader.take()?;
        let mut table = FaceTable::<u32>::new(n);
        for jj in 0..=n {
            for ii in 0..=n - jj {
                table.set(ii, jj, reader.take_u32()?);
            }
        }
        faces.push(WireRefinedFace {
            global: [
                u32::from_le(desc.global_le[0]),
                u32::from_le(desc.global_le[1]),
                u32::from_le(desc.global_le[2]),
            ],
            part: u32::from_le(desc.part_le),
            remote_part: u32::from_le(desc.remote_part_le),
            table,
        });
    }
    reader.finish()?;
    Ok(faces)
}

pub fn decode_quad_faces(
    bytes: &[u8],
    n: usize,
) -> Result<Vec<WireRefinedFace<4>>, MeshRefineError> {
    let mut reader = Reader::new(bytes);
    let count = reader.take::<WireHdr>()?.check(KIND_QUAD_FACES)?;
    let mut faces = Vec::with_capacity(count);
    for _ in 0..count {
        let desc: WireFaceDesc = reader.take()?;
        let mut table = FaceTable::<u32>::new(n);
        for jj in 0..=n {
            for ii in 0..=n {
                table.set(ii, jj, reader.take_u32()?);
            }
        }
        faces.push(WireRefinedFace {
            global: desc.global_le.map(u32::from_le),
            part: u32::from_le(desc.part_le),
            remote_part: u32::from_le(desc.remote_part_le),
            table,
        });
    }
    reader.finish()?;
    Ok(faces)
}

/// Cursor over a received byte buffer; every shortfall is a protocol error.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take<T: Pod>(&mut self) -> Result<T, MeshRefineError> {
        let size = std::mem::size_of::<T>();
        let end = self.pos + size;
        if end > self.bytes.len() {
            return Err(MeshRefineError::PartitionProtocol(format!(
                "message truncated at byte {} of {}",
                self.pos,
                self.bytes.len()
            )));
        }
        let value = bytemuck::pod_read_unaligned(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(value)
    }

    fn take_u32(&mut self) -> Result<u32, MeshRefineError> {
        let raw: [u8; 4] = self.take()?;
        Ok(u32::from_le_bytes(raw))
    }

    fn finish(self) -> Result<(), MeshRefineError> {
        if self.pos != self.bytes.len() {
            return Err(MeshRefineError::PartitionProtocol(format!(
                "{} trailing bytes after message",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}
