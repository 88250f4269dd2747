//! Mesh construction utilities.
//!
//! Mesh import lives outside this crate; loaders hand over an indexed
//! triangle list and [`build_from_triangles`] links it into a half-edge mesh.
//! Linking is deterministic: the same input always yields the same half-edge
//! numbering, so vertex and half-edge indices are reproducible between runs.

use std::collections::HashMap;

use nalgebra::Point3;

use super::halfedge::{Face, HalfEdge, HalfEdgeMesh};
use super::index::{FaceId, HalfEdgeId, MeshIndex, VertexId};
use crate::error::{MeshError, Result};

/// Build a half-edge mesh from vertices and triangle faces.
///
/// # Arguments
/// * `vertices` - List of vertex positions
/// * `faces` - List of triangle faces, each as `[v0, v1, v2]` indices
///   (counter-clockwise seen from outside)
///
/// Vertices referenced by no face are kept as isolated vertices.
///
/// # Errors
/// Fails on an empty face list, an out-of-range index, a face that repeats a
/// vertex, or a directed edge used by two faces (non-manifold or
/// inconsistently oriented input).
///
/// # Example
/// ```
/// use cotan::mesh::{build_from_triangles, HalfEdgeMesh};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_faces(), 1);
/// ```
pub fn build_from_triangles<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<HalfEdgeMesh<I>> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            if vi >= vertices.len() {
                return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
            }
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(MeshError::DegenerateFace { face: fi });
        }
    }

    let mut mesh = HalfEdgeMesh::with_capacity(vertices.len(), faces.len());

    let vertex_ids: Vec<VertexId<I>> = vertices
        .iter()
        .map(|&pos| mesh.add_vertex(pos))
        .collect();

    // Directed edge (v0, v1) -> half-edge, plus insertion order for determinism
    let mut edge_map: HashMap<(usize, usize), HalfEdgeId<I>> = HashMap::with_capacity(faces.len() * 3);
    let mut edge_order: Vec<(usize, usize)> = Vec::with_capacity(faces.len() * 3);

    // First pass: interior half-edges and faces
    for face in faces {
        let base = mesh.num_halfedges();
        let face_id = FaceId::<I>::new(mesh.num_faces());
        let ids = [
            HalfEdgeId::<I>::new(base),
            HalfEdgeId::<I>::new(base + 1),
            HalfEdgeId::<I>::new(base + 2),
        ];

        for k in 0..3 {
            let mut he = HalfEdge::unlinked(ids[k], vertex_ids[face[k]]);
            he.next = ids[(k + 1) % 3];
            he.prev = ids[(k + 2) % 3];
            he.face = Some(face_id);
            mesh.halfedges.push(he);

            // Will be overwritten for shared vertices
            mesh.vertex_mut(vertex_ids[face[k]]).halfedge = Some(ids[k]);

            let key = (face[k], face[(k + 1) % 3]);
            if edge_map.insert(key, ids[k]).is_some() {
                return Err(MeshError::NonManifoldEdge { v0: key.0, v1: key.1 });
            }
            edge_order.push(key);
        }

        mesh.faces.push(Face::new(ids[0]));
    }

    // Second pass: link flips, creating boundary half-edges for unmatched edges
    for &(v0, v1) in &edge_order {
        let he = edge_map[&(v0, v1)];
        if let Some(&flip) = edge_map.get(&(v1, v0)) {
            mesh.halfedge_mut(he).flip = flip;
        } else {
            let boundary_he = HalfEdgeId::<I>::new(mesh.num_halfedges());
            let mut bhe = HalfEdge::unlinked(boundary_he, vertex_ids[v1]);
            bhe.flip = he;
            mesh.halfedges.push(bhe);
            mesh.halfedge_mut(he).flip = boundary_he;
        }
    }

    // Third pass: link boundary half-edges into loops
    link_boundary_loops(&mut mesh)?;

    // Fourth pass: ensure boundary vertices point to boundary half-edges
    fix_boundary_vertex_halfedges(&mut mesh);

    Ok(mesh)
}

/// Link boundary half-edges into closed loops.
fn link_boundary_loops<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) -> Result<()> {
    let boundary_hes: Vec<HalfEdgeId<I>> = mesh
        .halfedge_ids()
        .filter(|&he| mesh.is_boundary_halfedge(he))
        .collect();

    // A vertex with two outgoing boundary half-edges is a non-manifold pinch
    let mut outgoing: HashMap<usize, HalfEdgeId<I>> = HashMap::with_capacity(boundary_hes.len());
    for &he in &boundary_hes {
        let origin = mesh.origin(he).index();
        if outgoing.insert(origin, he).is_some() {
            return Err(MeshError::NonManifold {
                details: format!("vertex {} lies on more than one boundary loop", origin),
            });
        }
    }

    for &he in &boundary_hes {
        let dest = mesh.dest(he).index();
        let next_he = *outgoing.get(&dest).ok_or_else(|| {
            MeshError::InvalidState(format!("open boundary at vertex {}", dest))
        })?;
        mesh.halfedge_mut(he).next = next_he;
        mesh.halfedge_mut(next_he).prev = he;
    }

    Ok(())
}

/// Ensure boundary vertices point to a boundary half-edge.
fn fix_boundary_vertex_halfedges<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) {
    for vid in mesh.vertex_ids().collect::<Vec<_>>() {
        let boundary = mesh
            .vertex_halfedges(vid)
            .find(|&he| mesh.is_boundary_halfedge(he));
        if let Some(he) = boundary {
            mesh.vertex_mut(vid).halfedge = Some(he);
        }
    }
}
