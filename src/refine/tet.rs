//! Tetrahedron subdivision.
//!
//! The barycentric lattice `i + j + k <= n` fills with n^3 sub-tets: one
//! upward tet per lattice cell, four tets from each octahedral gap (split on
//! a fixed diagonal), and one downward tet per deep interior cell.

use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::refine::divider::{CellDivider, CellKind};
use crate::topology::CellType;

pub(crate) struct TetKind;

impl CellKind for TetKind {
    const CELL_TYPE: CellType = CellType::Tetrahedron;

    fn divide_interior(
        div: &mut CellDivider<'_>,
        out: &mut UnstructuredMesh,
    ) -> Result<(), MeshRefineError> {
        let n = div.n();
        let nf = n as f64;
        for i in 1..n {
            for j in 1..n - i {
                for k in 1..n - i - j {
                    let uvw = [i as f64 / nf, j as f64 / nf, k as f64 / nf];
                    let v = out.add_vert(div.phys_coords(uvw));
                    div.set_lattice([i, j, k], v, uvw);
                }
            }
        }
        Ok(())
    }

    fn emit_sub_cells(
        div: &CellDivider<'_>,
        out: &mut UnstructuredMesh,
    ) -> Result<(), MeshRefineError> {
        let n = div.n();
        let at = |i: usize, j: usize, k: usize| div.vert_at(i, j, k);

        // Upward tets: same orientation as the parent.
        for i in 0..n {
            for j in 0..n - i {
                for k in 0..n - i - j {
                    out.add_tet([at(i, j, k), at(i + 1, j, k), at(i, j + 1, k), at(i, j, k + 1)])?;
                }
            }
        }
        // Octahedral gaps, split on the (i+1,j,k)-(i,j+1,k+1) diagonal.
        for i in 0..n.saturating_sub(1) {
            for j in 0..n - 1 - i {
                for k in 0..n - 1 - i - j {
                    let d0 = at(i + 1, j, k);
                    let d1 = at(i, j + 1, k + 1);
                    let ring = [
                        at(i, j + 1, k),
                        at(i, j, k + 1),
                        at(i + 1, j, k + 1),
                        at(i + 1, j + 1, k),
                    ];
                    for m in 0..4 {
                        out.add_tet([d0, d1, ring[m], ring[(m + 1) % 4]])?;
                    }
                }
            }
        }
        // Downward tets.
        for i in 0..n.saturating_sub(2) {
            for j in 0..n - 2 - i {
                for k in 0..n - 2 - i - j {
                    out.add_tet([
                        at(i + 1, j + 1, k),
                        at(i, j + 1, k + 1),
                        at(i + 1, j, k + 1),
                        at(i + 1, j + 1, k + 1),
                    ])?;
                }
            }
        }
        Ok(())
    }
}
