//! Prism subdivision: a triangular lattice extruded through n layers,
//! n^3 sub-prisms in all (upward and downward triangles per layer).

use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::refine::divider::{CellDivider, CellKind};
use crate::topology::CellType;

pub(crate) struct PrismKind;

impl CellKind for PrismKind {
    const CELL_TYPE: CellType = CellType::Prism;

    fn divide_interior(
        div: &mut CellDivider<'_>,
        out: &mut UnstructuredMesh,
    ) -> Result<(), MeshRefineError> {
        let n = div.n();
        let nf = n as f64;
        for k in 1..n {
            for i in 1..n {
                for j in 1..n - i {
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

        for k in 0..n {
            // Upward triangles.
            for i in 0..n {
                for j in 0..n - i {
                    out.add_prism([
                        at(i, j, k),
                        at(i + 1, j, k),
                        at(i, j + 1, k),
                        at(i, j, k + 1),
                        at(i + 1, j, k + 1),
                        at(i, j + 1, k + 1),
                    ])?;
                }
            }
            // Downward triangles between them.
            for i in 0..n.saturating_sub(1) {
                for j in 0..n - 1 - i {
                    out.add_prism([
                        at(i + 1, j, k),
                        at(i + 1, j + 1, k),
                        at(i, j + 1, k),
                        at(i + 1, j, k + 1),
                        at(i + 1, j + 1, k + 1),
                        at(i, j + 1, k + 1),
                    ])?;
                }
            }
        }
        Ok(())
    }
}
