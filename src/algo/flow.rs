//! Mean curvature flow.
//!
//! Mean curvature flow moves every vertex along its mean curvature normal,
//! `dx/dt = Δx`, which smooths the surface while shrinking its area. With the
//! cotangent Laplacian `L` and lumped mass `M` the semi-discrete flow is
//!
//! ```text
//! M dX/dt = L X
//! ```
//!
//! where `X` is the `n × 3` matrix of vertex positions.
//!
//! # Schemes
//!
//! - [`FlowScheme::Implicit`] (default): backward Euler,
//!   `(M - hL) X' = M X`. `M - hL` is symmetric positive definite for any
//!   `h >= 0`, so the step is unconditionally stable. One factorization
//!   serves all three coordinate columns.
//! - [`FlowScheme::Explicit`]: forward Euler, `x_i += h (L X)_i / A_i`. Only
//!   stable for very small time steps relative to the squared edge length.
//!
//! The operator is rebuilt for the current geometry at every step; nothing is
//! reused between steps.
//!
//! # Reference
//!
//! Desbrun, M., et al. (1999). "Implicit fairing of irregular meshes using
//! diffusion and curvature flow." SIGGRAPH 99.

use nalgebra::{DMatrix, DVector, Point3};

use crate::algo::laplacian::{LaplaceOperator, LaplacianOptions, MassMatrix};
use crate::algo::progress::Progress;
use crate::algo::sparse::{SolverStrategy, SparseSolver};
use crate::error::{MeshError, Result};
use crate::mesh::{HalfEdgeMesh, MeshIndex};

/// Time integration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowScheme {
    /// Backward Euler.
    #[default]
    Implicit,
    /// Forward Euler; small time steps only.
    Explicit,
}

/// Options for mean curvature flow.
#[derive(Debug, Clone)]
pub struct CurvatureFlowOptions {
    /// Number of flow iterations.
    pub iterations: usize,

    /// Time step for integration.
    pub time_step: f64,

    /// Integration scheme.
    pub scheme: FlowScheme,

    /// Operator assembly options.
    pub laplacian: LaplacianOptions,

    /// Linear solver for the implicit scheme.
    pub solver: SolverStrategy,
}

impl Default for CurvatureFlowOptions {
    fn default() -> Self {
        Self {
            iterations: 1,
            time_step: 0.001,
            scheme: FlowScheme::Implicit,
            laplacian: LaplacianOptions::default(),
            solver: SolverStrategy::Cholesky,
        }
    }
}

impl CurvatureFlowOptions {
    /// Create options with the specified number of iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the time step. It is validated when the flow runs.
    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    /// Set the integration scheme.
    pub fn with_scheme(mut self, scheme: FlowScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Use forward Euler integration.
    pub fn explicit(mut self) -> Self {
        self.scheme = FlowScheme::Explicit;
        self
    }

    /// Set the operator assembly options.
    pub fn with_laplacian(mut self, laplacian: LaplacianOptions) -> Self {
        self.laplacian = laplacian;
        self
    }

    /// Set the linear solver used by the implicit scheme.
    pub fn with_solver(mut self, solver: SolverStrategy) -> Self {
        self.solver = solver;
        self
    }
}

/// Advance the flow by one step of size `h`.
///
/// Isolated vertices (and vertices whose every incident face is degenerate
/// under the `Clamp` policy) have no area and stay where they are.
///
/// # Errors
/// - [`MeshError::InvalidParameter`] if `h` is negative or not finite.
/// - [`MeshError::EmptyMesh`] if the mesh has no faces.
/// - [`MeshError::DegenerateGeometry`] under the `Reject` policy.
/// - [`MeshError::FactorizationFailed`] or [`MeshError::SolveFailed`].
///
/// On error the positions are left untouched.
pub fn step<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>, h: f64, options: &CurvatureFlowOptions) -> Result<()> {
    validate_time_step(h)?;
    if mesh.num_faces() == 0 {
        return Err(MeshError::EmptyMesh);
    }
    if h == 0.0 {
        return Ok(());
    }

    let x = positions(mesh);
    let laplacian = LaplaceOperator::build(mesh, &options.laplacian)?;
    let mass = MassMatrix::build(mesh);

    let updated = match options.scheme {
        FlowScheme::Implicit => implicit_step(&laplacian, &mass, &x, h, options.solver)?,
        FlowScheme::Explicit => explicit_step(&laplacian, &mass, &x, h),
    };

    log::debug!(
        "{:?} curvature flow step: h = {}, max displacement {:.3e}",
        options.scheme,
        h,
        (&updated - &x).amax()
    );

    set_positions(mesh, &updated);
    Ok(())
}

/// Solve `(M - hL) X' = M X`.
fn implicit_step(
    laplacian: &LaplaceOperator,
    mass: &MassMatrix,
    x: &DMatrix<f64>,
    h: f64,
    strategy: SolverStrategy,
) -> Result<DMatrix<f64>> {
    // Vertices without area keep a unit mass so their row reads x' = x
    let diagonal: DVector<f64> = mass.diagonal().map(|a| if a > 0.0 { a } else { 1.0 });

    let system = laplacian.shifted(-h, Some(&diagonal));
    let solver = SparseSolver::factorize(&system, strategy).map_err(|e| {
        log::warn!("curvature flow factorization failed: {}", e);
        e
    })?;

    let rhs = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| diagonal[i] * x[(i, j)]);

    solver.solve_columns(&rhs).map_err(|e| {
        log::warn!("curvature flow solve failed: {}", e);
        e
    })
}

/// `x_i += h (L X)_i / A_i`, skipping vertices without area.
fn explicit_step(laplacian: &LaplaceOperator, mass: &MassMatrix, x: &DMatrix<f64>, h: f64) -> DMatrix<f64> {
    let lx = laplacian.apply_columns(x);
    let mut updated = x.clone();
    for i in 0..x.nrows() {
        let area = mass.get(i);
        if area > 0.0 {
            for j in 0..3 {
                updated[(i, j)] += h * lx[(i, j)] / area;
            }
        }
    }
    updated
}

/// Performs mean curvature flow on a mesh.
///
/// Runs `options.iterations` steps of size `options.time_step`. If any step
/// fails the mesh is restored to the positions it had before the call.
///
/// # Example
///
/// ```
/// use cotan::prelude::*;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
///     Point3::new(0.5, 0.5, 1.0),
/// ];
/// let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
/// let mut mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
///
/// let before = mesh.surface_area();
/// let options = CurvatureFlowOptions::default()
///     .with_iterations(3)
///     .with_time_step(0.01);
/// mean_curvature_flow(&mut mesh, &options).unwrap();
/// assert!(mesh.surface_area() < before);
/// ```
pub fn mean_curvature_flow<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>, options: &CurvatureFlowOptions) -> Result<()> {
    mean_curvature_flow_with_progress(mesh, options, &Progress::none())
}

/// [`mean_curvature_flow`] with progress reporting.
///
/// The callback receives `(step, iterations, message)` before every step and
/// once more with `step == iterations` when the flow is done.
pub fn mean_curvature_flow_with_progress<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    options: &CurvatureFlowOptions,
    progress: &Progress,
) -> Result<()> {
    validate_time_step(options.time_step)?;
    if options.iterations == 0 {
        return Ok(());
    }

    let snapshot = positions(mesh);
    for i in 0..options.iterations {
        progress.report(i, options.iterations, "Mean curvature flow");
        if let Err(e) = step(mesh, options.time_step, options) {
            set_positions(mesh, &snapshot);
            return Err(e);
        }
    }
    progress.report(options.iterations, options.iterations, "Mean curvature flow");

    Ok(())
}

fn validate_time_step(h: f64) -> Result<()> {
    if !h.is_finite() {
        return Err(MeshError::invalid_param("time_step", h, "must be finite"));
    }
    if h < 0.0 {
        return Err(MeshError::invalid_param("time_step", h, "must be non-negative"));
    }
    Ok(())
}

fn positions<I: MeshIndex>(mesh: &HalfEdgeMesh<I>) -> DMatrix<f64> {
    let mut x = DMatrix::zeros(mesh.num_vertices(), 3);
    for v in mesh.vertex_ids() {
        let p = mesh.position(v);
        x[(v.index(), 0)] = p.x;
        x[(v.index(), 1)] = p.y;
        x[(v.index(), 2)] = p.z;
    }
    x
}

fn set_positions<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>, x: &DMatrix<f64>) {
    for v in mesh.vertex_ids().collect::<Vec<_>>() {
        let i = v.index();
        mesh.set_position(v, Point3::new(x[(i, 0)], x[(i, 1)], x[(i, 2)]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexId;
    use crate::test_meshes::{degenerate_fan, grid, icosphere, tetrahedron, with_isolated_vertex};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn radii(mesh: &HalfEdgeMesh) -> Vec<f64> {
        mesh.vertex_ids().map(|v| mesh.position(v).coords.norm()).collect()
    }

    #[test]
    fn test_zero_time_step_is_identity() {
        for scheme in [FlowScheme::Implicit, FlowScheme::Explicit] {
            let mut mesh = icosphere(1);
            let before = positions(&mesh);
            let options = CurvatureFlowOptions::default().with_scheme(scheme);
            step(&mut mesh, 0.0, &options).unwrap();
            assert_eq!(positions(&mesh), before);
        }
    }

    #[test]
    fn test_zero_iterations_is_identity() {
        let mut mesh = tetrahedron();
        let before = positions(&mesh);
        let options = CurvatureFlowOptions::default().with_iterations(0);
        mean_curvature_flow(&mut mesh, &options).unwrap();
        assert_eq!(positions(&mesh), before);
    }

    #[test]
    fn test_invalid_time_step() {
        let mut mesh = tetrahedron();
        let before = positions(&mesh);
        let options = CurvatureFlowOptions::default();

        for h in [-0.1, f64::NAN, f64::INFINITY] {
            let result = step(&mut mesh, h, &options);
            assert!(matches!(
                result,
                Err(MeshError::InvalidParameter { name: "time_step", .. })
            ));
        }

        let options = options.with_time_step(-1.0);
        assert!(mean_curvature_flow(&mut mesh, &options).is_err());
        assert_eq!(positions(&mesh), before);
    }

    #[test]
    fn test_sphere_shrinks_isotropically() {
        let mut mesh = icosphere(2);
        let area_before = mesh.surface_area();
        let options = CurvatureFlowOptions::default()
            .with_iterations(5)
            .with_time_step(0.01);
        mean_curvature_flow(&mut mesh, &options).unwrap();

        let r = radii(&mesh);
        let mean = r.iter().sum::<f64>() / r.len() as f64;
        let min = r.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = r.iter().cloned().fold(0.0, f64::max);

        assert!(mean < 0.97 && mean > 0.8, "mean radius {}", mean);
        assert!((max - min) / mean < 0.05, "radius spread {} .. {}", min, max);
        assert!(mesh.surface_area() < area_before);

        let centroid = mesh.centroid().unwrap();
        assert!(centroid.coords.norm() < 1e-9);
    }

    #[test]
    fn test_large_implicit_step_is_stable() {
        let mut mesh = icosphere(1);
        step(&mut mesh, 1.0, &CurvatureFlowOptions::default()).unwrap();
        for v in mesh.vertex_ids() {
            let p = mesh.position(v);
            assert!(p.coords.iter().all(|c| c.is_finite()));
            assert!(p.coords.norm() < 1.0);
        }
    }

    #[test]
    fn test_explicit_matches_implicit_for_small_steps() {
        let h = 1e-4;
        let mut implicit = icosphere(1);
        let mut explicit = icosphere(1);

        step(&mut implicit, h, &CurvatureFlowOptions::default()).unwrap();
        step(&mut explicit, h, &CurvatureFlowOptions::default().explicit()).unwrap();

        let diff = (positions(&implicit) - positions(&explicit)).amax();
        assert!(diff < 1e-6, "difference {}", diff);
        assert!(positions(&explicit) != positions(&icosphere(1)));
    }

    #[test]
    fn test_isolated_vertex_stays_put() {
        let mut mesh = with_isolated_vertex();
        let lonely = VertexId::new(4);
        let before = *mesh.position(lonely);

        for scheme in [FlowScheme::Implicit, FlowScheme::Explicit] {
            let options = CurvatureFlowOptions::default().with_scheme(scheme);
            step(&mut mesh, 0.01, &options).unwrap();
            assert_eq!(*mesh.position(lonely), before);
        }
    }

    #[test]
    fn test_flat_patch_stays_flat() {
        let mut mesh = grid(4);
        let options = CurvatureFlowOptions::default()
            .with_iterations(3)
            .with_time_step(0.05);
        mean_curvature_flow(&mut mesh, &options).unwrap();
        for v in mesh.vertex_ids() {
            assert!(mesh.position(v).z.abs() < 1e-12);
        }
    }

    #[test]
    fn test_degenerate_geometry_leaves_positions() {
        let mut mesh = degenerate_fan();
        let before = positions(&mesh);
        let result = step(&mut mesh, 0.01, &CurvatureFlowOptions::default());
        assert!(matches!(result, Err(MeshError::DegenerateGeometry { face: 2, .. })));
        assert_eq!(positions(&mesh), before);
    }

    #[test]
    fn test_degenerate_geometry_clamped() {
        let mut mesh = degenerate_fan();
        let options = CurvatureFlowOptions::default()
            .with_laplacian(LaplacianOptions::default().clamp_degenerate());
        step(&mut mesh, 0.01, &options).unwrap();
        for v in mesh.vertex_ids() {
            assert!(mesh.position(v).coords.iter().all(|c| c.is_finite()));
        }
    }

    #[test]
    fn test_conjugate_gradient_solver() {
        let mut direct = icosphere(1);
        let mut iterative = icosphere(1);
        let options = CurvatureFlowOptions::default().with_time_step(0.01);

        step(&mut direct, 0.01, &options).unwrap();
        step(
            &mut iterative,
            0.01,
            &options.clone().with_solver(SolverStrategy::conjugate_gradient()),
        )
        .unwrap();

        assert!((positions(&direct) - positions(&iterative)).amax() < 1e-8);
    }

    #[test]
    fn test_progress_reporting() {
        let calls = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));
        let progress = {
            let calls = Arc::clone(&calls);
            let last = Arc::clone(&last);
            Progress::new(move |current, total, _| {
                assert_eq!(total, 4);
                calls.fetch_add(1, Ordering::SeqCst);
                last.store(current, Ordering::SeqCst);
            })
        };

        let mut mesh = tetrahedron();
        let options = CurvatureFlowOptions::default().with_iterations(4);
        mean_curvature_flow_with_progress(&mut mesh, &options, &progress).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(last.load(Ordering::SeqCst), 4);
    }
}
