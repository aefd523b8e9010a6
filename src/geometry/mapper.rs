//! The parametric-to-physical mapping seam.
//!
//! The subdivision engine never computes physical coordinates itself; it
//! hands a cell-local `(u, v, w)` to a [`ParametricMapper`] and stores
//! whatever comes back. For straight-sided input meshes the per-cell
//! [`LinearCellMapper`] interpolates corner coordinates; curved inputs plug
//! in a higher-order evaluator behind the same trait.

use crate::topology::CellType;

/// Evaluates physical coordinates from cell-local parametric coordinates.
pub trait ParametricMapper {
    /// Map `(u, v, w)` in the cell's reference frame to `(x, y, z)`.
    fn phys_coords(&self, uvw: [f64; 3]) -> [f64; 3];
}

/// Reference-frame corner coordinates for each cell type.
///
/// These define the canonical local parametric frame: tet corners at the
/// origin and unit axes, prism as unit triangle times `[0, 1]`, hex as the
/// unit cube, pyramid with unit base and apex at `(1/2, 1/2, 1)`.
pub fn reference_corners(cell_type: CellType) -> &'static [[f64; 3]] {
    match cell_type {
        CellType::Tetrahedron => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ],
        CellType::Pyramid => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.5, 0.5, 1.0],
        ],
        CellType::Prism => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
        ],
        CellType::Hexahedron => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ],
    }
}

/// Supplies a parametric mapper per cell.
///
/// The refinement driver builds one mapper per coarse cell from its type and
/// corner coordinates. Curved-geometry callers implement this to return
/// higher-order evaluators; everyone else uses [`LinearMapperFactory`].
pub trait MapperFactory {
    type Mapper: ParametricMapper;
    fn cell_mapper(&self, cell_type: CellType, corners: &[[f64; 3]]) -> Self::Mapper;
}

/// Factory for straight-sided cells.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearMapperFactory;

impl MapperFactory for LinearMapperFactory {
    type Mapper = LinearCellMapper;
    fn cell_mapper(&self, cell_type: CellType, corners: &[[f64; 3]]) -> LinearCellMapper {
        LinearCellMapper::new(cell_type, corners)
    }
}

/// Linear (straight-sided) parametric mapping of one cell, interpolating its
/// corner coordinates with the canonical blend for its type.
#[derive(Clone, Debug)]
pub struct LinearCellMapper {
    cell_type: CellType,
    corners: [[f64; 3]; 8],
}

impl LinearCellMapper {
    /// Build a mapper from a cell's corner coordinates, given in the cell's
    /// canonical vertex order.
    pub fn new(cell_type: CellType, corners: &[[f64; 3]]) -> Self {
        debug_assert_eq!(corners.len(), cell_type.num_verts());
        let mut c = [[0.0; 3]; 8];
        c[..corners.len()].copy_from_slice(corners);
        LinearCellMapper {
            cell_type,
            corners: c,
        }
    }
}

impl ParametricMapper for LinearCellMapper {
    fn phys_coords(&self, uvw: [f64; 3]) -> [f64; 3] {
        let [u, v, w] = uvw;
        let c = &self.corners;
        let mut out = [0.0f64; 3];
        match self.cell_type {
            CellType::Tetrahedron => {
                let b0 = 1.0 - u - v - w;
                for k in 0..3 {
                    out[k] = b0 * c[0][k] + u * c[1][k] + v * c[2][k] + w * c[3][k];
                }
            }
            CellType::Prism => {
                let b0 = 1.0 - u - v;
                for k in 0..3 {
                    out[k] = (1.0 - w) * (b0 * c[0][k] + u * c[1][k] + v * c[2][k])
                        + w * (b0 * c[3][k] + u * c[4][k] + v * c[5][k]);
                }
            }
            CellType::Hexahedron => {
                for k in 0..3 {
                    let bot = (1.0 - u) * (1.0 - v) * c[0][k]
                        + u * (1.0 - v) * c[1][k]
                        + u * v * c[2][k]
                        + (1.0 - u) * v * c[3][k];
                    let top = (1.0 - u) * (1.0 - v) * c[4][k]
                        + u * (1.0 - v) * c[5][k]
                        + u * v * c[6][k]
                        + (1.0 - u) * v * c[7][k];
                    out[k] = (1.0 - w) * bot + w * top;
                }
            }
            CellType::Pyramid => {
                // At height w the valid (u, v) square shrinks to
                // [w/2, 1 - w/2]^2; rescale into it before the base bilinear.
                if w >= 1.0 - 1e-14 {
                    return c[4];
                }
                let ub = (u - 0.5 * w) / (1.0 - w);
                let vb = (v - 0.5 * w) / (1.0 - w);
                for k in 0..3 {
                    let base = (1.0 - ub) * (1.0 - vb) * c[0][k]
                        + ub * (1.0 - vb) * c[1][k]
                        + ub * vb * c[2][k]
                        + (1.0 - ub) * vb * c[3][k];
                    out[k] = (1.0 - w) * base + w * c[4][k];
                }
            }
        }
        out
    }
}
