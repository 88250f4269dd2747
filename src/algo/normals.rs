//! Vertex normal estimation.
//!
//! A vertex normal is a weighted combination of the normals of the incident
//! faces; the weighting is chosen per call with [`NormalWeighting`].
//!
//! Every estimator returns a unit vector, or the zero vector when there is
//! nothing to average: isolated vertices and neighbourhoods made only of
//! degenerate faces.

use nalgebra::Vector3;

use crate::mesh::{HalfEdgeId, HalfEdgeMesh, MeshIndex, VertexId};

/// Face normal weighting for [`vertex_normal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalWeighting {
    /// Plain sum of unit face normals.
    Equal,

    /// Face normals weighted by face area.
    #[default]
    Area,

    /// Face normals weighted by the tip angle at the vertex.
    Angle,

    /// Direction of the cotangent mean curvature vector `-(L X)_i`,
    /// oriented to agree with the area-weighted normal.
    ///
    /// Undefined where the surface is flat or on the boundary; those
    /// vertices fall back to [`NormalWeighting::Area`].
    MeanCurvature,

    /// Max's weights, exact for vertices sampled from a sphere:
    /// `Σ (e1 × e2) / (|e1|² |e2|²)` over the incident faces.
    SphereInscribed,
}

/// Unit normal of `v` under `weighting`.
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
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
///
/// let n = vertex_normal(&mesh, VertexId::new(0), NormalWeighting::Angle);
/// assert!((n.z - 1.0).abs() < 1e-12);
/// ```
pub fn vertex_normal<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, v: VertexId<I>, weighting: NormalWeighting) -> Vector3<f64> {
    let sum = match weighting {
        NormalWeighting::Equal => accumulate(mesh, v, |_, _| 1.0),
        NormalWeighting::Area => area_weighted(mesh, v),
        NormalWeighting::Angle => {
            // The tip angle at v is the one opposite next(h)
            accumulate(mesh, v, |mesh, he| mesh.halfedge_angle(mesh.next(he)))
        }
        NormalWeighting::MeanCurvature => mean_curvature(mesh, v),
        NormalWeighting::SphereInscribed => sphere_inscribed(mesh, v),
    };

    sum.try_normalize(f64::MIN_POSITIVE).unwrap_or_else(Vector3::zeros)
}

/// Unit normals of all vertices, indexed by vertex index.
pub fn vertex_normals<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, weighting: NormalWeighting) -> Vec<Vector3<f64>> {
    mesh.vertex_ids()
        .map(|v| vertex_normal(mesh, v, weighting))
        .collect()
}

/// Sum of `weight(h) * n(face(h))` over the outgoing interior half-edges of `v`.
fn accumulate<I, F>(mesh: &HalfEdgeMesh<I>, v: VertexId<I>, weight: F) -> Vector3<f64>
where
    I: MeshIndex,
    F: Fn(&HalfEdgeMesh<I>, HalfEdgeId<I>) -> f64,
{
    let mut sum = Vector3::zeros();
    for he in mesh.vertex_halfedges(v) {
        if let Some(f) = mesh.face_of(he) {
            sum += weight(mesh, he) * mesh.face_normal(f);
        }
    }
    sum
}

fn area_weighted<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, v: VertexId<I>) -> Vector3<f64> {
    accumulate(mesh, v, |mesh, he| mesh.face_of(he).map_or(0.0, |f| mesh.face_area(f)))
}

fn mean_curvature<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, v: VertexId<I>) -> Vector3<f64> {
    let fallback = area_weighted(mesh, v);
    if mesh.is_boundary_vertex(v) {
        return fallback;
    }

    // (L X)_v, assembled from the cotangents around v
    let mut lx = Vector3::zeros();
    let mut scale = 0.0;
    for he in mesh.vertex_halfedges(v) {
        let w = 0.5 * (mesh.halfedge_cotan(he) + mesh.halfedge_cotan(mesh.flip(he)));
        let e = mesh.edge_vector(he);
        lx += w * e;
        scale += w.abs() * e.norm();
    }

    let normal = -lx;
    if normal.norm() <= 1e-10 * scale {
        return fallback;
    }
    if normal.dot(&fallback) < 0.0 {
        -normal
    } else {
        normal
    }
}

fn sphere_inscribed<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, v: VertexId<I>) -> Vector3<f64> {
    let mut sum = Vector3::zeros();
    for he in mesh.vertex_halfedges(v) {
        if mesh.is_boundary_halfedge(he) {
            continue;
        }
        let e1 = mesh.edge_vector(he);
        let e2 = -mesh.edge_vector(mesh.prev(he));
        let denom = e1.norm_squared() * e2.norm_squared();
        if denom > 0.0 {
            sum += e1.cross(&e2) / denom;
        }
    }
    sum
}
