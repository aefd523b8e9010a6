//! Partition assignment and the cross-partition refinement protocol.
//!
//! Graph partitioning proper is an external collaborator; the core only
//! consumes `(cell type, cell index, partition id)` assignments through the
//! [`Partitioner`] trait. The bundled [`ContiguousPartitioner`] splits the
//! cell list into equal contiguous runs, which is enough to exercise the
//! whole partition-boundary protocol deterministically.

pub mod communicator;
pub mod matching;
pub mod parallel;
pub mod wire;

use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::topology::CellType;
use serde::{Deserialize, Serialize};

/// One cell's partition assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPartData {
    pub cell_type: CellType,
    pub index: u32,
    pub part: u32,
}

/// Assigns every cell of a mesh to one of `n_parts` partitions.
pub trait Partitioner {
    /// Produce one entry per cell; partition ids must cover `0..n_parts`.
    fn partition(
        &self,
        mesh: &UnstructuredMesh,
        n_parts: u32,
    ) -> Result<Vec<CellPartData>, MeshRefineError>;
}

/// Splits the cell list (tets, then pyramids, prisms, hexes) into contiguous
/// runs of near-equal size.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContiguousPartitioner;

impl Partitioner for ContiguousPartitioner {
    fn partition(
        &self,
        mesh: &UnstructuredMesh,
        n_parts: u32,
    ) -> Result<Vec<CellPartData>, MeshRefineError> {
        let total = mesh.total_cells();
        if n_parts == 0 || (n_parts as usize) > total {
            return Err(MeshRefineError::InputInvalid(format!(
                "cannot split {total} cells into {n_parts} partitions"
            )));
        }
        let mut assignment = Vec::with_capacity(total);
        let mut cell = 0usize;
        for ct in CellType::ALL {
            for ci in 0..mesh.num_cells(ct) {
                // Cell `cell` of `total` goes to the partition whose
                // contiguous range contains it.
                let part = (cell * n_parts as usize / total) as u32;
                assignment.push(CellPartData {
                    cell_type: ct,
                    index: ci as u32,
                    part,
                });
                cell += 1;
            }
        }
        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_with_tets(count: usize) -> UnstructuredMesh {
        let mut mesh = UnstructuredMesh::new();
        mesh.add_vert([0.0, 0.0, 0.0]);
        mesh.add_vert([1.0, 0.0, 0.0]);
        mesh.add_vert([0.0, 1.0, 0.0]);
        for i in 0..count {
            mesh.add_vert([0.0, 0.0, 1.0 + i as f64]);
            mesh.add_tet([0, 1, 2, 3 + i as u32]).unwrap();
        }
        mesh
    }

    #[test]
    fn contiguous_runs_cover_all_parts() {
        let mesh = mesh_with_tets(7);
        let assignment = ContiguousPartitioner.partition(&mesh, 3).unwrap();
        assert_eq!(assignment.len(), 7);
        let counts = [0, 1, 2].map(|p| assignment.iter().filter(|c| c.part == p).count());
        assert_eq!(counts.iter().sum::<usize>(), 7);
        assert!(counts.iter().all(|&c| c >= 2));
        // Contiguous: part ids never decrease along the cell list.
        assert!(assignment.windows(2).all(|w| w[0].part <= w[1].part));
    }

    #[test]
    fn more_parts_than_cells_is_invalid() {
        let mesh = mesh_with_tets(2);
        assert!(ContiguousPartitioner.partition(&mesh, 3).is_err());
    }

    #[test]
    fn assignment_serializes() {
        let cpd = CellPartData {
            cell_type: CellType::Prism,
            index: 11,
            part: 2,
        };
        let json = serde_json::to_string(&cpd).unwrap();
        let back: CellPartData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cpd);
    }
}
