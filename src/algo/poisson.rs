//! Scalar Poisson problem on a surface mesh.
//!
//! Given a per-vertex source density `rho`, [`PoissonSolver`] finds the
//! potential `phi` with
//!
//! ```text
//! L phi = A rho
//! ```
//!
//! where `L` is the cotangent Laplacian and `A` the lumped vertex areas. On a
//! closed surface this only has a solution when the total source vanishes,
//! so `rho` is first projected onto the compatible subspace by subtracting
//! its area-weighted mean (see [`project_source`]). The solution is unique up
//! to a constant, which is fixed by shifting `phi` to zero area-weighted mean.
//!
//! `L` is negative semi-definite, so the solver factorizes `-L` with one
//! vertex pinned and negates the result. A positive source therefore
//! produces a potential well and a negative source a peak.
//!
//! The factorization is cached between calls and rebuilt only when the mesh
//! geometry changes, so repeated solves with new sources are cheap.
//!
//! # Example
//!
//! ```
//! use cotan::prelude::*;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 1.0),
//! ];
//! let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
//! let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! mesh.set_rho(VertexId::new(0), 1.0);
//! mesh.set_rho(VertexId::new(3), -1.0);
//!
//! let mut solver = PoissonSolver::new(PoissonOptions::default());
//! let phi = solver.solve(&mut mesh).unwrap();
//! assert!(phi[0] < phi[3]);
//! assert_eq!(mesh.phi(VertexId::new(0)), phi[0]);
//! ```

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::algo::laplacian::{DegenerateFacePolicy, LaplaceOperator, LaplacianOptions, MassMatrix};
use crate::algo::sparse::{SolverStrategy, SparseSolver};
use crate::error::{MeshError, Result};
use crate::mesh::{HalfEdgeMesh, MeshIndex};

/// Vertex whose value is pinned to remove the constant null space.
const PINNED_VERTEX: usize = 0;

/// Options for the Poisson solve.
#[derive(Debug, Clone, Default)]
pub struct PoissonOptions {
    /// Operator assembly options.
    pub laplacian: LaplacianOptions,

    /// Linear solver used for the factorization.
    pub solver: SolverStrategy,
}

impl PoissonOptions {
    /// Set the operator assembly options.
    pub fn with_laplacian(mut self, laplacian: LaplacianOptions) -> Self {
        self.laplacian = laplacian;
        self
    }

    /// Set the linear solver.
    pub fn with_solver(mut self, solver: SolverStrategy) -> Self {
        self.solver = solver;
        self
    }

    /// Set the degenerate face policy of the operator.
    pub fn with_degenerate_policy(mut self, policy: DegenerateFacePolicy) -> Self {
        self.laplacian.degenerate_policy = policy;
        self
    }
}

/// Factorization of the pinned system for one mesh state.
struct Factorization {
    revision: u64,
    num_vertices: usize,
    mass: MassMatrix,
    solver: SparseSolver,
}

/// Poisson solver with a cached factorization.
///
/// The cache is keyed on the mesh revision and vertex count. Revision stamps
/// are unique across meshes, so one solver can be handed several meshes in
/// turn and refactorizes whenever it sees a different one.
pub struct PoissonSolver {
    options: PoissonOptions,
    cache: Option<Factorization>,
}

impl std::fmt::Debug for PoissonSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoissonSolver")
            .field("options", &self.options)
            .field("factorized", &self.is_factorized())
            .finish()
    }
}

impl PoissonSolver {
    /// Create a solver; nothing is assembled until the first solve.
    pub fn new(options: PoissonOptions) -> Self {
        Self {
            options,
            cache: None,
        }
    }

    /// The options this solver was created with.
    pub fn options(&self) -> &PoissonOptions {
        &self.options
    }

    /// Whether a factorization is currently cached.
    pub fn is_factorized(&self) -> bool {
        self.cache.is_some()
    }

    /// Whether the cached factorization matches the current state of `mesh`.
    pub fn is_current_for<I: MeshIndex>(&self, mesh: &HalfEdgeMesh<I>) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|c| c.revision == mesh.revision() && c.num_vertices == mesh.num_vertices())
    }

    /// Drop the cached factorization.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Solve for `phi` from the `rho` stored on the vertices.
    ///
    /// On success `phi` is written to every vertex and returned as well.
    /// On failure no vertex is modified.
    ///
    /// The solution satisfies `L·phi = A·rho` with a negative semi-definite
    /// `L`, so a positive source gets a negative potential (a well) and a
    /// sink a positive one. Under
    /// [`apply_potential_colors`](crate::algo::color::apply_potential_colors)
    /// sources therefore show up blue and sinks red.
    ///
    /// # Errors
    /// - [`MeshError::EmptyMesh`] if the mesh has no faces.
    /// - [`MeshError::DisconnectedMesh`] if the mesh has more than one
    ///   connected component (isolated vertices included).
    /// - [`MeshError::DegenerateGeometry`] under the `Reject` policy.
    /// - [`MeshError::InvalidState`] if the total surface area is zero.
    /// - [`MeshError::FactorizationFailed`] or [`MeshError::SolveFailed`].
    pub fn solve<I: MeshIndex>(&mut self, mesh: &mut HalfEdgeMesh<I>) -> Result<DVector<f64>> {
        if mesh.num_faces() == 0 || mesh.num_vertices() == 0 {
            return Err(MeshError::EmptyMesh);
        }

        let components = mesh.num_connected_components();
        if components > 1 {
            return Err(MeshError::DisconnectedMesh { components });
        }

        self.ensure_factorized(mesh)?;
        let Some(cache) = self.cache.as_ref() else {
            return Err(MeshError::InvalidState("factorization missing after build".into()));
        };

        let area = cache.mass.diagonal();
        let rho = DVector::from_iterator(mesh.num_vertices(), mesh.vertex_ids().map(|v| mesh.rho(v)));
        let rho = project_source(&rho, area);
        log::debug!("projected source range [{:.6e}, {:.6e}]", rho.min(), rho.max());

        let mut rhs = rho.component_mul(area);
        rhs[PINNED_VERTEX] = 0.0;

        let y = cache.solver.solve(&rhs).map_err(|e| {
            log::warn!("Poisson solve failed: {}", e);
            e
        })?;

        let mut phi = -y;
        let mean = phi.dot(area) / cache.mass.total();
        phi.add_scalar_mut(-mean);

        for v in mesh.vertex_ids().collect::<Vec<_>>() {
            mesh.set_phi(v, phi[v.index()]);
        }

        Ok(phi)
    }

    /// Build (or reuse) the factorization of the pinned `-L`.
    fn ensure_factorized<I: MeshIndex>(&mut self, mesh: &HalfEdgeMesh<I>) -> Result<()> {
        if self.is_current_for(mesh) {
            log::debug!("reusing Poisson factorization (revision {})", mesh.revision());
            return Ok(());
        }
        self.cache = None;

        let laplacian = LaplaceOperator::build(mesh, &self.options.laplacian)?;
        let mass = MassMatrix::build(mesh);
        if mass.total() <= 0.0 {
            return Err(MeshError::InvalidState(format!(
                "total surface area is {}",
                mass.total()
            )));
        }

        let system = pinned_negated(&laplacian, PINNED_VERTEX);
        let solver = SparseSolver::factorize(&system, self.options.solver).map_err(|e| {
            log::warn!("Poisson factorization failed: {}", e);
            e
        })?;

        self.cache = Some(Factorization {
            revision: mesh.revision(),
            num_vertices: mesh.num_vertices(),
            mass,
            solver,
        });
        Ok(())
    }
}

/// `-L` with the row and column of `pinned` replaced by the identity.
fn pinned_negated(laplacian: &LaplaceOperator, pinned: usize) -> CsrMatrix<f64> {
    let n = laplacian.dimension();
    let mut coo = CooMatrix::new(n, n);
    coo.push(pinned, pinned, 1.0);
    for (i, j, &v) in laplacian.matrix().triplet_iter() {
        if i != pinned && j != pinned {
            coo.push(i, j, -v);
        }
    }
    CsrMatrix::from(&coo)
}

/// Remove the area-weighted mean from a source so that `⟨rho, area⟩ = 0`.
///
/// This is the compatibility condition for the Poisson problem on a closed
/// surface. A zero total area leaves `rho` unchanged.
pub fn project_source(rho: &DVector<f64>, area: &DVector<f64>) -> DVector<f64> {
    let total = area.sum();
    if total <= 0.0 {
        return rho.clone();
    }
    let mean = rho.dot(area) / total;
    rho.add_scalar(-mean)
}

/// Solve the Poisson problem once with a throw-away solver.
///
/// See [`PoissonSolver::solve`].
pub fn solve_scalar_poisson<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    options: &PoissonOptions,
) -> Result<DVector<f64>> {
    PoissonSolver::new(options.clone()).solve(mesh)
}
