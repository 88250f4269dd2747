//! # Cotan
//!
//! Discrete Laplace–Beltrami operators on triangle meshes.
//!
//! Cotan assembles the cotangent Laplacian of a half-edge mesh and uses it to
//! solve the problems that operator is usually wanted for: a scalar Poisson
//! equation on the surface, implicit mean curvature flow, and vertex normal
//! estimation.
//!
//! ## Features
//!
//! - **Half-edge data structure**: O(1) adjacency queries with type-safe indices
//! - **Flexible indexing**: Support for 16-bit, 32-bit, and 64-bit indices
//! - **Cotangent Laplacian**: sparse, symmetric, with a lumped mass matrix
//! - **Sparse solvers**: cached Cholesky factorization or conjugate gradient
//! - **Poisson solver**: area-normalised potentials from a source density
//! - **Mean curvature flow**: unconditionally stable backward Euler steps
//!
//! ## Building Meshes Programmatically
//!
//! ```
//! use cotan::prelude::*;
//! use nalgebra::Point3;
//!
//! // Define vertices and faces
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 1.0),
//! ];
//!
//! let faces = vec![
//!     [0, 2, 1],  // bottom
//!     [0, 1, 3],  // front
//!     [1, 2, 3],  // right
//!     [2, 0, 3],  // left
//! ];
//!
//! // Build the mesh
//! let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//! assert_eq!(mesh.num_vertices(), 4);
//! assert_eq!(mesh.num_faces(), 4);
//! ```
//!
//! ## Solving a Poisson Problem
//!
//! ```
//! use cotan::prelude::*;
//! use nalgebra::Point3;
//!
//! # let vertices = vec![
//! #     Point3::new(0.0, 0.0, 0.0),
//! #     Point3::new(1.0, 0.0, 0.0),
//! #     Point3::new(0.5, 1.0, 0.0),
//! #     Point3::new(0.5, 0.5, 1.0),
//! # ];
//! # let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
//! let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! // A source at one vertex, a sink at another
//! mesh.set_rho(VertexId::new(0), 1.0);
//! mesh.set_rho(VertexId::new(3), -1.0);
//!
//! let phi = solve_scalar_poisson(&mut mesh, &PoissonOptions::default()).unwrap();
//! assert!(phi[0] < phi[3]);
//!
//! // Red for positive, blue for negative
//! let max_abs = apply_potential_colors(&mut mesh);
//! assert!(max_abs > 0.0);
//! ```
//!
//! ## Smoothing
//!
//! ```
//! use cotan::algo::flow::step;
//! use cotan::prelude::*;
//! use nalgebra::Point3;
//!
//! # let vertices = vec![
//! #     Point3::new(0.0, 0.0, 0.0),
//! #     Point3::new(1.0, 0.0, 0.0),
//! #     Point3::new(0.5, 1.0, 0.0),
//! #     Point3::new(0.5, 0.5, 1.0),
//! # ];
//! # let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
//! let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! step(&mut mesh, 0.01, &CurvatureFlowOptions::default()).unwrap();
//!
//! for v in mesh.vertex_ids() {
//!     let n = vertex_normal(&mesh, v, NormalWeighting::Angle);
//!     assert!((n.norm() - 1.0).abs() < 1e-12);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;

#[cfg(test)]
mod test_meshes;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use cotan::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::color::apply_potential_colors;
    pub use crate::algo::flow::{mean_curvature_flow, CurvatureFlowOptions, FlowScheme};
    pub use crate::algo::laplacian::{
        DegenerateFacePolicy, LaplaceOperator, LaplacianOptions, MassMatrix,
    };
    pub use crate::algo::normals::{vertex_normal, vertex_normals, NormalWeighting};
    pub use crate::algo::poisson::{solve_scalar_poisson, PoissonOptions, PoissonSolver};
    pub use crate::algo::sparse::{SolverStrategy, SparseSolver};
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        build_from_triangles, EdgeId, Face, FaceId, HalfEdge, HalfEdgeId, HalfEdgeMesh, MeshIndex,
        Vertex, VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::test_meshes::tetrahedron;

    #[test]
    fn test_tetrahedron() {
        let mesh = tetrahedron();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 4);
        // Closed mesh: 4 faces * 3 half-edges, no boundary
        assert_eq!(mesh.num_halfedges(), 12);
        assert!(mesh.is_valid());

        for v in mesh.vertex_ids() {
            assert!(!mesh.is_boundary_vertex(v), "vertex {:?} should not be on boundary", v);
        }
    }

    #[test]
    fn test_pipeline() {
        let mut mesh = tetrahedron();
        mesh.set_rho(VertexId::new(1), 2.0);

        let mut solver = PoissonSolver::new(PoissonOptions::default());
        let phi = solver.solve(&mut mesh).unwrap();
        assert_eq!(phi.len(), 4);

        // Flow changes the geometry, so the next solve refactorizes
        mean_curvature_flow(&mut mesh, &CurvatureFlowOptions::default()).unwrap();
        assert!(!solver.is_current_for(&mesh));
        solver.solve(&mut mesh).unwrap();
        assert!(solver.is_current_for(&mesh));
    }
}
