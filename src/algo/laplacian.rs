//! Cotangent Laplace–Beltrami operator and lumped mass matrix.
//!
//! The operator is assembled half-edge by half-edge. Every interior half-edge
//! `h` from `i` to `j` carries the weight `w = cot(α)/2`, where `α` is the
//! angle opposite `h` in its triangle, and contributes
//!
//! ```text
//! L[i][j] += w    L[j][i] += w
//! L[i][i] -= w    L[j][j] -= w
//! ```
//!
//! so the matrix is symmetric with zero row sums by construction. An edge
//! shared by two triangles collects both halves, giving the usual
//! `(cot α + cot β)/2`. Boundary half-edges carry nothing.
//!
//! With this sign convention `L` is negative semi-definite, and on a closed
//! connected mesh its null space is spanned by the constant vector. `L` is
//! the integrated ("weak") Laplacian; `M⁻¹L` is the pointwise one, where `M`
//! is the diagonal [`MassMatrix`] of barycentric dual areas.
//!
//! # Example
//!
//! ```
//! use cotan::prelude::*;
//! use cotan::algo::laplacian::{LaplaceOperator, LaplacianOptions};
//! use nalgebra::{DVector, Point3};
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 1.0),
//! ];
//! let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
//! let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! let laplacian = LaplaceOperator::build(&mesh, &LaplacianOptions::default()).unwrap();
//! let ones = DVector::from_element(4, 1.0);
//! assert!(laplacian.apply(&ones).norm() < 1e-12);
//! ```

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::algo::sparse::{mul_mat, mul_vec};
use crate::error::{MeshError, Result};
use crate::mesh::{HalfEdgeMesh, MeshIndex};

/// What to do with faces whose area is too small for a cotangent to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegenerateFacePolicy {
    /// Abort assembly with [`MeshError::DegenerateGeometry`].
    #[default]
    Reject,
    /// Drop the face's cotangent contributions (clamp them to zero).
    Clamp,
}

/// Options for operator assembly.
#[derive(Debug, Clone)]
pub struct LaplacianOptions {
    /// Policy for zero-area faces.
    pub degenerate_policy: DegenerateFacePolicy,

    /// Faces with area at or below this value are degenerate.
    pub area_epsilon: f64,
}

impl Default for LaplacianOptions {
    fn default() -> Self {
        Self {
            degenerate_policy: DegenerateFacePolicy::Reject,
            area_epsilon: 1e-14,
        }
    }
}

impl LaplacianOptions {
    /// Set the degenerate face policy.
    pub fn with_degenerate_policy(mut self, policy: DegenerateFacePolicy) -> Self {
        self.degenerate_policy = policy;
        self
    }

    /// Clamp degenerate faces instead of rejecting the mesh.
    pub fn clamp_degenerate(mut self) -> Self {
        self.degenerate_policy = DegenerateFacePolicy::Clamp;
        self
    }

    /// Set the area threshold below which a face is degenerate.
    pub fn with_area_epsilon(mut self, epsilon: f64) -> Self {
        self.area_epsilon = epsilon.max(0.0);
        self
    }
}

/// The assembled cotangent Laplacian, an `n × n` sparse symmetric matrix
/// indexed by vertex index.
#[derive(Debug, Clone)]
pub struct LaplaceOperator {
    matrix: CsrMatrix<f64>,
}

impl LaplaceOperator {
    /// Assemble the operator for the current geometry of `mesh`.
    ///
    /// # Errors
    /// [`MeshError::DegenerateGeometry`] if a face is degenerate and the
    /// policy is [`DegenerateFacePolicy::Reject`].
    pub fn build<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, options: &LaplacianOptions) -> Result<Self> {
        let n = mesh.num_vertices();
        let degenerate = degenerate_faces(mesh, options)?;

        let mut coo = CooMatrix::new(n, n);
        for (he, record) in mesh.halfedges() {
            let Some(face) = record.face else {
                continue;
            };
            if degenerate[face.index()] {
                continue;
            }

            let origin = record.origin.index();
            let target = mesh.origin(record.next).index();
            let w = mesh.halfedge_cotan(he) / 2.0;

            coo.push(origin, target, w);
            coo.push(target, origin, w);
            coo.push(origin, origin, -w);
            coo.push(target, target, -w);
        }

        let matrix = CsrMatrix::from(&coo);
        log::debug!(
            "assembled cotangent Laplacian: {} vertices, {} non-zeros",
            n,
            matrix.nnz()
        );

        Ok(Self { matrix })
    }

    /// Wrap an already assembled matrix.
    ///
    /// # Errors
    /// [`MeshError::DimensionMismatch`] if the matrix is not square.
    pub fn from_matrix(matrix: CsrMatrix<f64>) -> Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            return Err(MeshError::DimensionMismatch {
                expected: matrix.nrows(),
                found: matrix.ncols(),
            });
        }
        Ok(Self { matrix })
    }

    /// Number of rows (= number of vertices).
    #[inline]
    pub fn dimension(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// The underlying sparse matrix.
    #[inline]
    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    /// Entry `(i, j)`, zero if not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let offsets = self.matrix.row_offsets();
        let range = offsets[i]..offsets[i + 1];
        let cols = &self.matrix.col_indices()[range.clone()];
        match cols.binary_search(&j) {
            Ok(k) => self.matrix.values()[range.start + k],
            Err(_) => 0.0,
        }
    }

    /// `L · x`.
    pub fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        mul_vec(&self.matrix, x)
    }

    /// `L · X` for a dense matrix with one column per field.
    pub fn apply_columns(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        mul_mat(&self.matrix, x)
    }

    /// Sum of each row.
    pub fn row_sums(&self) -> DVector<f64> {
        let offsets = self.matrix.row_offsets();
        let values = self.matrix.values();
        DVector::from_iterator(
            self.dimension(),
            (0..self.dimension()).map(|i| values[offsets[i]..offsets[i + 1]].iter().sum()),
        )
    }

    /// Whether `|L[i][j] - L[j][i]| <= tolerance` for every stored entry.
    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        self.matrix
            .triplet_iter()
            .all(|(i, j, &v)| (v - self.get(j, i)).abs() <= tolerance)
    }

    /// Assemble `diagonal + scale · L` as a new sparse matrix.
    ///
    /// This is the common shape of every system the solvers factorize:
    /// `−L` for the Poisson problem, `M − hL` for an implicit flow step.
    pub fn shifted(&self, scale: f64, diagonal: Option<&DVector<f64>>) -> CsrMatrix<f64> {
        let n = self.dimension();
        let mut coo = CooMatrix::new(n, n);
        if let Some(diagonal) = diagonal {
            for (i, &d) in diagonal.iter().enumerate() {
                coo.push(i, i, d);
            }
        }
        for (i, j, &v) in self.matrix.triplet_iter() {
            coo.push(i, j, scale * v);
        }
        CsrMatrix::from(&coo)
    }
}

/// Diagonal lumped mass matrix of barycentric dual areas.
#[derive(Debug, Clone)]
pub struct MassMatrix {
    diagonal: DVector<f64>,
}

impl MassMatrix {
    /// Dual area of every vertex (zero for isolated vertices).
    pub fn build<I: MeshIndex>(mesh: &HalfEdgeMesh<I>) -> Self {
        let diagonal = DVector::from_iterator(
            mesh.num_vertices(),
            mesh.vertex_ids().map(|v| mesh.vertex_area(v)),
        );
        Self { diagonal }
    }

    /// The diagonal entries.
    #[inline]
    pub fn diagonal(&self) -> &DVector<f64> {
        &self.diagonal
    }

    /// Entry `(i, i)`.
    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        self.diagonal[i]
    }

    /// Sum of all entries (the total surface area).
    pub fn total(&self) -> f64 {
        self.diagonal.sum()
    }

    /// Number of rows.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.diagonal.len()
    }

    /// `M · x`.
    pub fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        self.diagonal.component_mul(x)
    }
}

/// Assemble the operator and, when asked, the mass matrix in one call.
pub fn assemble<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    options: &LaplacianOptions,
    with_mass: bool,
) -> Result<(LaplaceOperator, Option<MassMatrix>)> {
    let laplacian = LaplaceOperator::build(mesh, options)?;
    let mass = with_mass.then(|| MassMatrix::build(mesh));
    Ok((laplacian, mass))
}

/// Flag faces at or below the area threshold, failing early under `Reject`.
fn degenerate_faces<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, options: &LaplacianOptions) -> Result<Vec<bool>> {
    let mut flags = vec![false; mesh.num_faces()];
    let mut clamped = 0usize;

    for f in mesh.face_ids() {
        let area = mesh.face_area(f);
        if area > options.area_epsilon {
            continue;
        }
        match options.degenerate_policy {
            DegenerateFacePolicy::Reject => {
                return Err(MeshError::DegenerateGeometry {
                    face: f.index(),
                    area,
                });
            }
            DegenerateFacePolicy::Clamp => {
                flags[f.index()] = true;
                clamped += 1;
            }
        }
    }

    if clamped > 0 {
        log::warn!("clamped cotangent weights of {} degenerate faces to zero", clamped);
    }
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexId;
    use crate::test_meshes::{degenerate_fan, grid, icosahedron, icosphere, tetrahedron, with_isolated_vertex};
    use approx::assert_relative_eq;

    fn build(mesh: &HalfEdgeMesh) -> LaplaceOperator {
        LaplaceOperator::build(mesh, &LaplacianOptions::default()).unwrap()
    }

    #[test]
    fn test_rows_sum_to_zero() {
        for mesh in [tetrahedron(), icosphere(2), grid(4)] {
            let laplacian = build(&mesh);
            for s in laplacian.row_sums().iter() {
                assert!(s.abs() < 1e-12, "row sum {}", s);
            }
        }
    }

    #[test]
    fn test_symmetric() {
        for mesh in [tetrahedron(), icosphere(2), grid(4)] {
            let laplacian = build(&mesh);
            assert!(laplacian.is_symmetric(1e-14));
            for i in 0..laplacian.dimension() {
                for j in 0..laplacian.dimension() {
                    assert_eq!(laplacian.get(i, j), laplacian.get(j, i));
                }
            }
        }
    }

    #[test]
    fn test_constant_vector_in_null_space() {
        let mesh = icosphere(2);
        let laplacian = build(&mesh);
        let ones = DVector::from_element(mesh.num_vertices(), 1.0);
        assert!(laplacian.apply(&ones).amax() < 1e-12);
    }

    #[test]
    fn test_negative_semi_definite() {
        let mesh = icosphere(1);
        let laplacian = build(&mesh);
        // x^T L x <= 0 for a few arbitrary fields
        for k in 1..5 {
            let x = DVector::from_iterator(
                mesh.num_vertices(),
                (0..mesh.num_vertices()).map(|i| ((i * k) as f64 * 0.37).sin()),
            );
            assert!(x.dot(&laplacian.apply(&x)) <= 1e-12);
        }
    }

    #[test]
    fn test_icosahedron_weights() {
        let mesh = icosahedron();
        let laplacian = build(&mesh);
        let w = 1.0 / 3f64.sqrt();

        for v in mesh.vertex_ids() {
            let i = v.index();
            assert_relative_eq!(laplacian.get(i, i), -5.0 * w, epsilon = 1e-12);
            for n in mesh.vertex_neighbors(v) {
                assert_relative_eq!(laplacian.get(i, n.index()), w, epsilon = 1e-12);
            }
        }
        // Antipodal vertices are not adjacent
        assert_eq!(laplacian.get(0, 3), 0.0);
        // 12 diagonal + 60 directed neighbour entries
        assert_eq!(laplacian.nnz(), 72);
    }

    #[test]
    fn test_linear_function_is_harmonic_on_flat_patch() {
        let n = 4;
        let mesh = grid(n);
        let laplacian = build(&mesh);

        let f = DVector::from_iterator(
            mesh.num_vertices(),
            mesh.vertex_ids().map(|v| {
                let p = mesh.position(v);
                2.0 * p.x - 3.0 * p.y + 0.5
            }),
        );
        let lf = laplacian.apply(&f);

        let mut interior = 0;
        for v in mesh.vertex_ids() {
            if !mesh.is_boundary_vertex(v) {
                assert!(lf[v.index()].abs() < 1e-12, "vertex {:?}: {}", v, lf[v.index()]);
                interior += 1;
            }
        }
        assert_eq!(interior, (n - 1) * (n - 1));
    }

    #[test]
    fn test_boundary_halfedges_contribute_nothing() {
        // One unit square split along 0-3
        let mesh = grid(1);
        let laplacian = build(&mesh);
        // Boundary edge 0-1 only sees the 45 degree angle at vertex 3
        assert_relative_eq!(laplacian.get(0, 1), 0.5, epsilon = 1e-12);
        // The diagonal is opposite two right angles
        assert!(laplacian.get(0, 3).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_face_rejected() {
        let mesh = degenerate_fan();
        let result = LaplaceOperator::build(&mesh, &LaplacianOptions::default());
        assert!(matches!(result, Err(MeshError::DegenerateGeometry { face: 2, .. })));
    }

    #[test]
    fn test_degenerate_face_clamped() {
        let mesh = degenerate_fan();
        let options = LaplacianOptions::default().clamp_degenerate();
        let laplacian = LaplaceOperator::build(&mesh, &options).unwrap();

        assert!(laplacian.is_symmetric(1e-14));
        for s in laplacian.row_sums().iter() {
            assert!(s.abs() < 1e-12);
        }
        for v in laplacian.matrix().values() {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_isolated_vertex_has_empty_row() {
        let mesh = with_isolated_vertex();
        let laplacian = build(&mesh);
        assert_eq!(laplacian.dimension(), 5);
        for j in 0..5 {
            assert_eq!(laplacian.get(4, j), 0.0);
        }
    }

    #[test]
    fn test_mass_matrix_matches_surface_area() {
        let mesh = icosphere(1);
        let (_, mass) = assemble(&mesh, &LaplacianOptions::default(), true).unwrap();
        let mass = mass.unwrap();
        assert_eq!(mass.dimension(), mesh.num_vertices());
        assert_relative_eq!(mass.total(), mesh.surface_area(), epsilon = 1e-12);
        assert_relative_eq!(mass.get(0), mesh.vertex_area(VertexId::new(0)));

        let ones = DVector::from_element(mesh.num_vertices(), 1.0);
        assert_relative_eq!(mass.apply(&ones).sum(), mass.total(), epsilon = 1e-12);
    }

    #[test]
    fn test_assemble_without_mass() {
        let mesh = tetrahedron();
        let (laplacian, mass) = assemble(&mesh, &LaplacianOptions::default(), false).unwrap();
        assert_eq!(laplacian.dimension(), 4);
        assert!(mass.is_none());
    }

    #[test]
    fn test_shifted_system() {
        let mesh = tetrahedron();
        let laplacian = build(&mesh);
        let mass = MassMatrix::build(&mesh);
        let h = 0.1;
        let system = LaplaceOperator::from_matrix(laplacian.shifted(-h, Some(mass.diagonal()))).unwrap();

        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { mass.get(i) } else { 0.0 } - h * laplacian.get(i, j);
                assert_relative_eq!(system.get(i, j), expected, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_apply_columns_matches_apply() {
        let mesh = icosahedron();
        let laplacian = build(&mesh);
        let x = DMatrix::from_fn(mesh.num_vertices(), 3, |i, j| (i + 2 * j) as f64);
        let lx = laplacian.apply_columns(&x);
        for j in 0..3 {
            let col = laplacian.apply(&x.column(j).into_owned());
            assert!((lx.column(j) - col).norm() < 1e-12);
        }
    }

    #[test]
    fn test_rebuild_tracks_geometry() {
        let mut mesh = icosahedron();
        let before = build(&mesh);
        let v = VertexId::new(0);
        let p = *mesh.position(v);
        mesh.set_position(v, p * 1.3);
        let after = build(&mesh);
        assert!((before.get(0, 1) - after.get(0, 1)).abs() > 1e-6);
    }
}
