//! Map potentials to display colours.
//!
//! Positive potentials are shaded red and negative ones blue, both scaled by
//! the largest absolute potential on the mesh so the extreme vertex is fully
//! saturated.

use nalgebra::Vector3;

use crate::mesh::{HalfEdgeMesh, MeshIndex};

/// Colour of a single potential value, given the largest absolute value.
///
/// `phi > 0` maps to `(phi / max_abs, 0, 0)`, anything else to
/// `(0, 0, -phi / max_abs)`. A zero (or non-finite) `max_abs` yields black.
pub fn potential_color(phi: f64, max_abs: f64) -> Vector3<f64> {
    if max_abs == 0.0 || !max_abs.is_finite() {
        return Vector3::zeros();
    }
    if phi > 0.0 {
        Vector3::new(phi / max_abs, 0.0, 0.0)
    } else {
        Vector3::new(0.0, 0.0, -phi / max_abs)
    }
}

/// Colour every vertex by its `phi` and return the normalising maximum.
pub fn apply_potential_colors<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) -> f64 {
    let max_abs = mesh.vertex_ids().map(|v| mesh.phi(v).abs()).fold(0.0, f64::max);

    for v in mesh.vertex_ids().collect::<Vec<_>>() {
        let color = potential_color(mesh.phi(v), max_abs);
        mesh.set_color(v, color);
    }

    max_abs
}
