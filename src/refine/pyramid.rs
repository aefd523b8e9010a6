//! Pyramid subdivision.
//!
//! The lattice shrinks with height: level k holds an (n-k+1) x (n-k+1) grid.
//! Each slab between levels k and k+1 fills with m^2 upward pyramids,
//! (m-1)^2 downward pyramids, and 2 m (m-1) gap tets, where m = n - k. That
//! yields (2n^3+n)/3 pyramids and 2(n^3-n)/3 tets in total.

use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::refine::divider::{CellDivider, CellKind};
use crate::topology::CellType;

pub(crate) struct PyramidKind;

/// Reference coordinates of pyramid lattice point (i, j, k): the level-k
/// grid sits centred over the base, so the square cross-section at height
/// k/n spans [k/2n, 1 - k/2n].
#[inline]
pub(crate) fn pyramid_lattice_uvw(i: usize, j: usize, k: usize, n: usize) -> [f64; 3] {
    let nf = n as f64;
    [
        (i as f64 + k as f64 / 2.0) / nf,
        (j as f64 + k as f64 / 2.0) / nf,
        k as f64 / nf,
    ]
}

impl CellKind for PyramidKind {
    const CELL_TYPE: CellType = CellType::Pyramid;

    fn divide_interior(
        div: &mut CellDivider<'_>,
        out: &mut UnstructuredMesh,
    ) -> Result<(), MeshRefineError> {
        let n = div.n();
        for k in 1..n {
            let m = n - k;
            for i in 1..m {
                for j in 1..m {
                    let uvw = pyramid_lattice_uvw(i, j, k, n);
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

        for k in 0..n {
            let m = n - k;
            // Upward pyramids: base on level k, apex on level k+1.
            for i in 0..m {
                for j in 0..m {
                    out.add_pyramid([
                        at(i, j, k),
                        at(i + 1, j, k),
                        at(i + 1, j + 1, k),
                        at(i, j + 1, k),
                        at(i, j, k + 1),
                    ])?;
                }
            }
            // Downward pyramids: base on level k+1, apex back on level k.
            for i in 0..m.saturating_sub(1) {
                for j in 0..m - 1 {
                    out.add_pyramid([
                        at(i, j, k + 1),
                        at(i, j + 1, k + 1),
                        at(i + 1, j + 1, k + 1),
                        at(i + 1, j, k + 1),
                        at(i + 1, j + 1, k),
                    ])?;
                }
            }
            // Gap tets along the i-direction grid lines.
            for i in 0..m.saturating_sub(1) {
                for j in 0..m {
                    out.add_tet([
                        at(i + 1, j, k),
                        at(i + 1, j + 1, k),
                        at(i, j, k + 1),
                        at(i + 1, j, k + 1),
                    ])?;
                }
            }
            // Gap tets along the j-direction grid lines.
            for i in 0..m {
                for j in 0..m.saturating_sub(1) {
                    out.add_tet([
                        at(i, j + 1, k),
                        at(i + 1, j + 1, k),
                        at(i, j + 1, k + 1),
                        at(i, j, k + 1),
                    ])?;
                }
            }
        }
        Ok(())
    }
}
