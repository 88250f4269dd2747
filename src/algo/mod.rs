//! Discrete differential operators and the solvers built on them.
//!
//! - **Operator**: cotangent Laplace–Beltrami matrix and lumped mass ([`laplacian`])
//! - **Linear algebra**: sparse Cholesky and conjugate gradient ([`sparse`])
//! - **Poisson**: potential from a source density ([`poisson`])
//! - **Smoothing**: implicit and explicit mean curvature flow ([`flow`])
//! - **Normals**: weighted vertex normals ([`normals`])
//! - **Visualisation**: potential colour ramp ([`color`])

pub mod color;
pub mod flow;
pub mod laplacian;
pub mod normals;
pub mod poisson;
pub mod progress;
pub mod sparse;
