//! Mesh topology: cell kinds and canonical edge/face identity.

pub mod cell_type;
pub mod face;

pub use cell_type::CellType;
pub use face::{sort3, sort4, EdgeKey, QuadKey, TriKey};
