//! Hexahedron subdivision: the full (n+1)^3 lattice, interior parametric
//! coordinates from the least-squares intersection of the three lines
//! joining matching points on opposite faces. That tracks curved-boundary
//! stretching where plain trilinear interpolation would distort.

use crate::geometry::parametric::cell_interior_intersection;
use crate::mesh::UnstructuredMesh;
use crate::mesh_error::MeshRefineError;
use crate::refine::divider::{CellDivider, CellKind};
use crate::topology::CellType;

pub(crate) struct HexKind;

impl CellKind for HexKind {
    const CELL_TYPE: CellType = CellType::Hexahedron;

    fn divide_interior(
        div: &mut CellDivider<'_>,
        out: &mut UnstructuredMesh,
    ) -> Result<(), MeshRefineError> {
        let n = div.n();
        for i in 1..n {
            for j in 1..n {
                for k in 1..n {
                    let uvw = cell_interior_intersection(
                        div.uvw_at(0, j, k),
                        div.uvw_at(n, j, k),
                        div.uvw_at(i, 0, k),
                        div.uvw_at(i, n, k),
                        div.uvw_at(i, j, 0),
                        div.uvw_at(i, j, n),
                    )?;
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
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    out.add_hex([
                        at(i, j, k),
                        at(i + 1, j, k),
                        at(i + 1, j + 1, k),
                        at(i, j + 1, k),
                        at(i, j, k + 1),
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
