//! Cell type metadata for volume mesh elements.

use serde::{Deserialize, Serialize};

/// The four volume cell kinds handled by the subdivision engine.
///
/// Vertex orderings follow the usual unstructured-mesh conventions:
/// - Tetrahedron: `[v0, v1, v2, v3]`.
/// - Pyramid: `[v0, v1, v2, v3, v4]` with base quad `[0, 1, 2, 3]` and apex `v4`.
/// - Prism: `[v0, v1, v2, v3, v4, v5]` with bottom triangle `[0, 1, 2]`
///   and top triangle `[3, 4, 5]`.
/// - Hexahedron: `[v0, ..., v7]` with bottom face `[0, 1, 2, 3]` and top
///   face `[4, 5, 6, 7]`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum CellType {
    /// 3D simplex (tet).
    Tetrahedron,
    /// Quad-based pyramid.
    Pyramid,
    /// Wedge/prism.
    Prism,
    /// 3D tensor-product cell (hex).
    Hexahedron,
}

impl CellType {
    /// Number of vertices in a cell of this type.
    #[inline]
    pub const fn num_verts(self) -> usize {
        match self {
            CellType::Tetrahedron => 4,
            CellType::Pyramid => 5,
            CellType::Prism => 6,
            CellType::Hexahedron => 8,
        }
    }

    /// Number of edges in a cell of this type.
    #[inline]
    pub const fn num_edges(self) -> usize {
        match self {
            CellType::Tetrahedron => 6,
            CellType::Pyramid => 8,
            CellType::Prism => 9,
            CellType::Hexahedron => 12,
        }
    }

    /// Number of triangular faces.
    #[inline]
    pub const fn num_tri_faces(self) -> usize {
        match self {
            CellType::Tetrahedron => 4,
            CellType::Pyramid => 4,
            CellType::Prism => 2,
            CellType::Hexahedron => 0,
        }
    }

    /// Number of quadrilateral faces.
    #[inline]
    pub const fn num_quad_faces(self) -> usize {
        match self {
            CellType::Tetrahedron => 0,
            CellType::Pyramid => 1,
            CellType::Prism => 3,
            CellType::Hexahedron => 6,
        }
    }

    /// Stable wire/serialization tag for this cell type.
    #[inline]
    pub const fn tag(self) -> u32 {
        match self {
            CellType::Tetrahedron => 0,
            CellType::Pyramid => 1,
            CellType::Prism => 2,
            CellType::Hexahedron => 3,
        }
    }

    /// Inverse of [`CellType::tag`].
    #[inline]
    pub const fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(CellType::Tetrahedron),
            1 => Some(CellType::Pyramid),
            2 => Some(CellType::Prism),
            3 => Some(CellType::Hexahedron),
            _ => None,
        }
    }

    /// All four kinds, in the fixed iteration order used by the refinement
    /// driver (tets, pyramids, prisms, hexes).
    pub const ALL: [CellType; 4] = [
        CellType::Tetrahedron,
        CellType::Pyramid,
        CellType::Prism,
        CellType::Hexahedron,
    ];

    /// Number of sub-tets an n-way subdivision of this cell produces.
    pub const fn refined_tets(self, n: u64) -> u64 {
        match self {
            CellType::Tetrahedron => n * n * n,
            // Gap tets between the up- and down-pyramids of each slab.
            CellType::Pyramid => 2 * (n * n * n - n) / 3,
            CellType::Prism | CellType::Hexahedron => 0,
        }
    }

    /// Number of sub-pyramids an n-way subdivision of this cell produces.
    pub const fn refined_pyramids(self, n: u64) -> u64 {
        match self {
            CellType::Pyramid => (2 * n * n * n + n) / 3,
            _ => 0,
        }
    }

    /// Number of sub-prisms an n-way subdivision of this cell produces.
    pub const fn refined_prisms(self, n: u64) -> u64 {
        match self {
            CellType::Prism => n * n * n,
            _ => 0,
        }
    }

    /// Number of sub-hexes an n-way subdivision of this cell produces.
    pub const fn refined_hexes(self, n: u64) -> u64 {
        match self {
            CellType::Hexahedron => n * n * n,
            _ => 0,
        }
    }

    /// Edge list as ordered pairs of local corner indices.
    #[inline]
    pub const fn edges(self) -> &'static [(usize, usize)] {
        match self {
            CellType::Tetrahedron => &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)],
            CellType::Pyramid => &[
                (0, 1),
                (1, 2),
                (2, 3),
                (3, 0),
                (0, 4),
                (1, 4),
                (2, 4),
                (3, 4),
            ],
            CellType::Prism => &[
                (0, 1),
                (1, 2),
                (2, 0),
                (3, 4),
                (4, 5),
                (5, 3),
                (0, 3),
                (1, 4),
                (2, 5),
            ],
            CellType::Hexahedron => &[
                (0, 1),
                (1, 2),
                (2, 3),
                (3, 0),
                (4, 5),
                (5, 6),
                (6, 7),
                (7, 4),
                (0, 4),
                (1, 5),
                (2, 6),
                (3, 7),
            ],
        }
    }

    /// Triangular faces as local corner triples, ordered outward.
    #[inline]
    pub const fn tri_faces(self) -> &'static [[usize; 3]] {
        match self {
            CellType::Tetrahedron => &[[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
            CellType::Pyramid => &[[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]],
            CellType::Prism => &[[0, 2, 1], [3, 4, 5]],
            CellType::Hexahedron => &[],
        }
    }

    /// Quadrilateral faces as local corner quadruples, ordered outward.
    #[inline]
    pub const fn quad_faces(self) -> &'static [[usize; 4]] {
        match self {
            CellType::Tetrahedron => &[],
            CellType::Pyramid => &[[0, 3, 2, 1]],
            CellType::Prism => &[[0, 1, 4, 3], [1, 2, 5, 4], [2, 0, 3, 5]],
            CellType::Hexahedron => &[
                [0, 3, 2, 1],
                [4, 5, 6, 7],
                [0, 1, 5, 4],
                [1, 2, 6, 5],
                [2, 3, 7, 6],
                [3, 0, 4, 7],
            ],
        }
    }

    /// Number of strictly interior lattice vertices created inside one cell
    /// of this type by an n-way subdivision.
    pub const fn interior_verts(self, n: u64) -> u64 {
        match self {
            CellType::Tetrahedron => {
                if n < 4 {
                    0
                } else {
                    (n - 1) * (n - 2) * (n - 3) / 6
                }
            }
            CellType::Pyramid => {
                if n < 3 {
                    0
                } else {
                    (n - 2) * (n - 1) * (2 * n - 3) / 6
                }
            }
            CellType::Prism => {
                if n < 3 {
                    0
                } else {
                    (n - 1) * (n - 1) * (n - 2) / 2
                }
            }
            CellType::Hexahedron => (n - 1) * (n - 1) * (n - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_and_face_counts() {
        assert_eq!(CellType::Tetrahedron.num_verts(), 4);
        assert_eq!(CellType::Pyramid.num_verts(), 5);
        assert_eq!(CellType::Prism.num_verts(), 6);
        assert_eq!(CellType::Hexahedron.num_verts(), 8);
        for ct in CellType::ALL {
            // Euler-consistent face/edge counts for the four closed polyhedra.
            let f = ct.num_tri_faces() + ct.num_quad_faces();
            assert_eq!(ct.num_verts() + f, ct.num_edges() + 2);
        }
    }

    #[test]
    fn refined_cell_tallies() {
        // tet: n^3 sub-tets.
        assert_eq!(CellType::Tetrahedron.refined_tets(2), 8);
        assert_eq!(CellType::Tetrahedron.refined_tets(3), 27);
        // pyramid, n=2: 6 pyramids and 4 gap tets.
        assert_eq!(CellType::Pyramid.refined_pyramids(2), 6);
        assert_eq!(CellType::Pyramid.refined_tets(2), 4);
        // n=1 passes every type through unchanged.
        for ct in CellType::ALL {
            let total = ct.refined_tets(1)
                + ct.refined_pyramids(1)
                + ct.refined_prisms(1)
                + ct.refined_hexes(1);
            assert_eq!(total, 1);
            assert_eq!(ct.interior_verts(1), 0);
        }
    }

    #[test]
    fn interior_vert_counts() {
        assert_eq!(CellType::Hexahedron.interior_verts(3), 8);
        assert_eq!(CellType::Tetrahedron.interior_verts(4), 1);
        assert_eq!(CellType::Pyramid.interior_verts(3), 1);
        assert_eq!(CellType::Prism.interior_verts(3), 2);
    }

    #[test]
    fn edge_and_face_tables_match_counts() {
        for ct in CellType::ALL {
            assert_eq!(ct.edges().len(), ct.num_edges());
            assert_eq!(ct.tri_faces().len(), ct.num_tri_faces());
            assert_eq!(ct.quad_faces().len(), ct.num_quad_faces());
            // Every face edge is a cell edge.
            let on_edge = |a: usize, b: usize| {
                ct.edges()
                    .iter()
                    .any(|&(p, q)| (p, q) == (a, b) || (q, p) == (a, b))
            };
            for f in ct.tri_faces() {
                for k in 0..3 {
                    assert!(on_edge(f[k], f[(k + 1) % 3]));
                }
            }
            for f in ct.quad_faces() {
                for k in 0..4 {
                    assert!(on_edge(f[k], f[(k + 1) % 4]));
                }
            }
        }
    }

    #[test]
    fn tag_roundtrip() {
        for ct in CellType::ALL {
            assert_eq!(CellType::from_tag(ct.tag()), Some(ct));
        }
        assert_eq!(CellType::from_tag(17), None);
    }
}
