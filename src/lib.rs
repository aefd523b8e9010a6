//! # mesh-refine
//!
//! mesh-refine is a Rust library for uniform subdivision of unstructured
//! volume meshes (tetrahedra, pyramids, prisms, and hexahedra), designed for
//! scientific computing and CFD preprocessing. Given a coarse mesh and a
//! subdivision factor `n`, every cell becomes a structured lattice of
//! roughly `n^3` smaller cells of matching topology, with curved-geometry
//! fidelity preserved through per-vertex length scales and an element-local
//! parametric mapping.
//!
//! ## Features
//! - Shared-vertex bookkeeping: edges and faces subdivided by adjacent cells
//!   produce the same refined vertices exactly once
//! - Length-scale-graded edge division and iso-curve face/interior
//!   parametric lattices for curved inputs (plug in your own
//!   [`ParametricMapper`](geometry::ParametricMapper) for higher-order
//!   geometry)
//! - Deterministic partition-parallel refinement: extraction of
//!   self-contained partition sub-meshes, a broadcast/exchange protocol over
//!   a pluggable [`Communicator`](partitioning::communicator::Communicator),
//!   and rotation-resolved identification of refined vertices across
//!   partition boundaries
//! - Closed-form refined-size tallies for exact pre-allocation
//!
//! ## Usage
//! ```
//! use mesh_refine::mesh::UnstructuredMesh;
//!
//! let mut coarse = UnstructuredMesh::new();
//! coarse.add_vert([0.0, 0.0, 0.0]);
//! coarse.add_vert([1.0, 0.0, 0.0]);
//! coarse.add_vert([0.0, 1.0, 0.0]);
//! coarse.add_vert([0.0, 0.0, 1.0]);
//! coarse.add_tet([0, 1, 2, 3])?;
//! coarse.synthesize_missing_boundary();
//!
//! let refined = mesh_refine::refine(&coarse, 2)?;
//! assert_eq!(refined.num_tets(), 8);
//! assert_eq!(refined.num_verts(), 10);
//! # Ok::<(), mesh_refine::mesh_error::MeshRefineError>(())
//! ```
//!
//! File I/O, the command-line driver, and graph partitioning proper are
//! external collaborators; see [`partitioning::Partitioner`] and
//! [`geometry::MapperFactory`] for the seams they plug into.

pub mod geometry;
pub mod mesh;
pub mod mesh_error;
pub mod partitioning;
pub mod refine;
pub mod topology;

pub use refine::{refine, refine_with};
pub use partitioning::parallel::{refine_partition, refine_partitioned, PartitionRefinement};

#[cfg(feature = "rayon")]
pub use partitioning::parallel::refine_for_parallel;

/// Absolute per-axis tolerance for cross-partition coordinate agreement.
pub const TOLTEST: f64 = 1e-9;

/// A convenient prelude for the most-used types.
pub mod prelude {
    pub use crate::geometry::{
        LinearCellMapper, LinearMapperFactory, MapperFactory, ParametricMapper,
    };
    pub use crate::mesh::sizing::RefinedMeshTally;
    pub use crate::mesh::UnstructuredMesh;
    pub use crate::mesh_error::MeshRefineError;
    pub use crate::partitioning::communicator::{Communicator, NoComm, ThreadComm, Wait};
    pub use crate::partitioning::{CellPartData, ContiguousPartitioner, Partitioner};
    pub use crate::refine::{refine, refine_with};
    pub use crate::topology::CellType;
}
