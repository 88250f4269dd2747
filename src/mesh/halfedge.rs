//! Half-edge mesh data structure.
//!
//! This module provides a half-edge (doubly-connected edge list) representation
//! for triangle meshes. Every element lives in a flat arena and refers to its
//! neighbours by index, so adjacency queries are O(1) and nothing owns anything
//! else.
//!
//! # Structure
//!
//! - Each edge is split into two **half-edges** pointing in opposite directions
//! - Each half-edge knows its **flip** (opposite half-edge), **next** (next
//!   half-edge around its face), **prev**, **origin vertex**, and **face**
//! - Each vertex stores one outgoing half-edge, or `None` when it is isolated
//! - Each face stores one half-edge on its boundary
//!
//! # Boundary Handling
//!
//! Boundary half-edges have no face. Their flips are interior half-edges, and
//! their `next` pointers link them into boundary loops, so the "flip then next"
//! walk around a vertex is closed for boundary vertices too.
//!
//! # Vertex attributes
//!
//! Besides its position a vertex carries a source value `rho`, a potential
//! `phi`, a display colour and a selection tag. Changing these does not bump
//! the mesh [revision](HalfEdgeMesh::revision); changing positions or
//! connectivity does.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::{Point3, Vector3};

use super::index::{FaceId, HalfEdgeId, MeshIndex, VertexId};

/// Source of revision stamps, shared by every mesh in the process.
static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// A vertex in the half-edge mesh.
#[derive(Debug, Clone)]
pub struct Vertex<I: MeshIndex = u32> {
    /// The 3D position of this vertex.
    pub position: Point3<f64>,

    /// One outgoing half-edge from this vertex, `None` if the vertex is isolated.
    /// For boundary vertices, this is a boundary half-edge.
    pub halfedge: Option<HalfEdgeId<I>>,

    /// Scalar source value driving the Poisson problem.
    pub rho: f64,

    /// Scalar potential computed by the Poisson solver.
    pub phi: f64,

    /// Display colour derived from `phi`.
    pub color: Vector3<f64>,

    /// Whether the vertex is selected.
    pub tag: bool,
}

impl<I: MeshIndex> Vertex<I> {
    /// Create a new isolated vertex at the given position.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            halfedge: None,
            rho: 0.0,
            phi: 0.0,
            color: Vector3::zeros(),
            tag: false,
        }
    }

    /// Whether the vertex belongs to no face or edge.
    #[inline]
    pub fn is_isolated(&self) -> bool {
        self.halfedge.is_none()
    }
}

/// A half-edge in the mesh.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge<I: MeshIndex = u32> {
    /// The vertex this half-edge originates from.
    pub origin: VertexId<I>,

    /// The opposite half-edge (pointing in the reverse direction).
    /// Until the builder links it, a half-edge's flip refers to itself.
    pub flip: HalfEdgeId<I>,

    /// The next half-edge around the face (counter-clockwise).
    pub next: HalfEdgeId<I>,

    /// The previous half-edge around the face.
    pub prev: HalfEdgeId<I>,

    /// The face this half-edge belongs to, `None` on the boundary.
    pub face: Option<FaceId<I>>,
}

impl<I: MeshIndex> HalfEdge<I> {
    /// Create an unlinked half-edge: flip, next and prev all point at `id`.
    pub fn unlinked(id: HalfEdgeId<I>, origin: VertexId<I>) -> Self {
        Self {
            origin,
            flip: id,
            next: id,
            prev: id,
            face: None,
        }
    }

    /// Check if this half-edge is on the boundary.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.face.is_none()
    }
}

/// A face in the half-edge mesh.
#[derive(Debug, Clone, Copy)]
pub struct Face<I: MeshIndex = u32> {
    /// One half-edge on the boundary of this face.
    pub halfedge: HalfEdgeId<I>,
}

impl<I: MeshIndex> Face<I> {
    /// Create a new face with the given half-edge.
    pub fn new(halfedge: HalfEdgeId<I>) -> Self {
        Self { halfedge }
    }
}

/// A half-edge mesh data structure for triangle meshes.
#[derive(Debug, Clone)]
pub struct HalfEdgeMesh<I: MeshIndex = u32> {
    pub(crate) vertices: Vec<Vertex<I>>,
    pub(crate) halfedges: Vec<HalfEdge<I>>,
    pub(crate) faces: Vec<Face<I>>,
    /// Restamped by every mutation of positions or connectivity.
    revision: u64,
}

impl<I: MeshIndex> Default for HalfEdgeMesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> HalfEdgeMesh<I> {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            halfedges: Vec::new(),
            faces: Vec::new(),
            revision: next_revision(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_faces: usize) -> Self {
        // Closed mesh: HE = 3F. Leave some room for boundary half-edges.
        let num_halfedges = num_faces * 3 + num_faces / 2;

        Self {
            vertices: Vec::with_capacity(num_vertices),
            halfedges: Vec::with_capacity(num_halfedges),
            faces: Vec::with_capacity(num_faces),
            revision: next_revision(),
        }
    }

    // ==================== Accessors ====================

    /// Get the number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of half-edges (boundary half-edges included).
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    /// Get the number of full edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.halfedges.len() / 2
    }

    /// Get the number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Geometry/topology revision stamp.
    ///
    /// Anything derived from positions or connectivity (operators,
    /// factorizations) is stale once this value changes. Stamps are unique
    /// across all meshes in the process, so two meshes only share one when
    /// one is an unmodified clone of the other.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    fn touch(&mut self) {
        self.revision = next_revision();
    }

    /// Get a vertex by ID.
    #[inline]
    pub fn vertex(&self, id: VertexId<I>) -> &Vertex<I> {
        &self.vertices[id.index()]
    }

    /// Get a mutable vertex by ID. Bumps the revision.
    #[inline]
    pub fn vertex_mut(&mut self, id: VertexId<I>) -> &mut Vertex<I> {
        self.touch();
        &mut self.vertices[id.index()]
    }

    /// Get a half-edge by ID.
    #[inline]
    pub fn halfedge(&self, id: HalfEdgeId<I>) -> &HalfEdge<I> {
        &self.halfedges[id.index()]
    }

    /// Get a mutable half-edge by ID. Bumps the revision.
    #[inline]
    pub fn halfedge_mut(&mut self, id: HalfEdgeId<I>) -> &mut HalfEdge<I> {
        self.touch();
        &mut self.halfedges[id.index()]
    }

    /// Get a face by ID.
    #[inline]
    pub fn face(&self, id: FaceId<I>) -> &Face<I> {
        &self.faces[id.index()]
    }

    /// Get a mutable face by ID. Bumps the revision.
    #[inline]
    pub fn face_mut(&mut self, id: FaceId<I>) -> &mut Face<I> {
        self.touch();
        &mut self.faces[id.index()]
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId<I>) -> &Point3<f64> {
        &self.vertex(v).position
    }

    /// Set the position of a vertex. Bumps the revision.
    #[inline]
    pub fn set_position(&mut self, v: VertexId<I>, pos: Point3<f64>) {
        self.vertex_mut(v).position = pos;
    }

    // ==================== Vertex Attributes ====================

    /// Source value of a vertex.
    #[inline]
    pub fn rho(&self, v: VertexId<I>) -> f64 {
        self.vertex(v).rho
    }

    /// Set the source value of a vertex.
    #[inline]
    pub fn set_rho(&mut self, v: VertexId<I>, rho: f64) {
        self.vertices[v.index()].rho = rho;
    }

    /// Potential of a vertex.
    #[inline]
    pub fn phi(&self, v: VertexId<I>) -> f64 {
        self.vertex(v).phi
    }

    /// Set the potential of a vertex.
    #[inline]
    pub fn set_phi(&mut self, v: VertexId<I>, phi: f64) {
        self.vertices[v.index()].phi = phi;
    }

    /// Display colour of a vertex.
    #[inline]
    pub fn color(&self, v: VertexId<I>) -> &Vector3<f64> {
        &self.vertex(v).color
    }

    /// Set the display colour of a vertex.
    #[inline]
    pub fn set_color(&mut self, v: VertexId<I>, color: Vector3<f64>) {
        self.vertices[v.index()].color = color;
    }

    /// Whether a vertex is selected.
    #[inline]
    pub fn is_tagged(&self, v: VertexId<I>) -> bool {
        self.vertex(v).tag
    }

    /// Flip the selection tag of a vertex.
    #[inline]
    pub fn toggle_tag(&mut self, v: VertexId<I>) {
        let vertex = &mut self.vertices[v.index()];
        vertex.tag = !vertex.tag;
    }

    // ==================== Topology Queries ====================

    /// Get the flip (opposite) half-edge.
    #[inline]
    pub fn flip(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).flip
    }

    /// Get the next half-edge around the face.
    #[inline]
    pub fn next(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).next
    }

    /// Get the previous half-edge around the face.
    #[inline]
    pub fn prev(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).prev
    }

    /// Get the origin vertex of a half-edge.
    #[inline]
    pub fn origin(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.halfedge(he).origin
    }

    /// Get the destination vertex of a half-edge.
    #[inline]
    pub fn dest(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.origin(self.flip(he))
    }

    /// Get the face of a half-edge, `None` on the boundary.
    #[inline]
    pub fn face_of(&self, he: HalfEdgeId<I>) -> Option<FaceId<I>> {
        self.halfedge(he).face
    }

    /// Get the outgoing half-edge of a vertex, `None` if it is isolated.
    #[inline]
    pub fn outgoing(&self, v: VertexId<I>) -> Option<HalfEdgeId<I>> {
        self.vertex(v).halfedge
    }

    /// Check if a half-edge is on the boundary.
    #[inline]
    pub fn is_boundary_halfedge(&self, he: HalfEdgeId<I>) -> bool {
        self.halfedge(he).is_boundary()
    }

    /// Check if a vertex belongs to no face or edge.
    #[inline]
    pub fn is_isolated(&self, v: VertexId<I>) -> bool {
        self.vertex(v).is_isolated()
    }

    /// Check if a vertex is on the boundary. Isolated vertices count as boundary.
    pub fn is_boundary_vertex(&self, v: VertexId<I>) -> bool {
        if self.is_isolated(v) {
            return true;
        }
        self.vertex_halfedges(v)
            .any(|he| self.is_boundary_halfedge(he))
    }

    /// Check if the mesh has no boundary half-edges.
    pub fn is_closed(&self) -> bool {
        self.halfedges.iter().all(|he| !he.is_boundary())
    }

    /// Label every vertex with the id of its connected component.
    ///
    /// Labels are dense, assigned in vertex order. Isolated vertices get a
    /// component of their own.
    pub fn connected_components(&self) -> Vec<usize> {
        let mut labels = vec![usize::MAX; self.num_vertices()];
        let mut queue = VecDeque::new();
        let mut next_label = 0;

        for seed in self.vertex_ids() {
            if labels[seed.index()] != usize::MAX {
                continue;
            }
            labels[seed.index()] = next_label;
            queue.push_back(seed);

            while let Some(v) = queue.pop_front() {
                for w in self.vertex_neighbors(v) {
                    if labels[w.index()] == usize::MAX {
                        labels[w.index()] = next_label;
                        queue.push_back(w);
                    }
                }
            }
            next_label += 1;
        }

        labels
    }

    /// Number of connected components (isolated vertices included).
    pub fn num_connected_components(&self) -> usize {
        self.connected_components()
            .into_iter()
            .max()
            .map_or(0, |max| max + 1)
    }

    // ==================== Iteration ====================

    /// Iterate over all vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        (0..self.vertices.len()).map(|i| VertexId::new(i))
    }

    /// Iterate over all vertices with their IDs.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId<I>, &Vertex<I>)> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (VertexId::new(i), v))
    }

    /// Iterate over all half-edge IDs.
    pub fn halfedge_ids(&self) -> impl Iterator<Item = HalfEdgeId<I>> + '_ {
        (0..self.halfedges.len()).map(|i| HalfEdgeId::new(i))
    }

    /// Iterate over all half-edges with their IDs.
    pub fn halfedges(&self) -> impl Iterator<Item = (HalfEdgeId<I>, &HalfEdge<I>)> + '_ {
        self.halfedges
            .iter()
            .enumerate()
            .map(|(i, he)| (HalfEdgeId::new(i), he))
    }

    /// Iterate over all face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        (0..self.faces.len()).map(|i| FaceId::new(i))
    }

    /// Iterate over all faces with their IDs.
    pub fn faces(&self) -> impl Iterator<Item = (FaceId<I>, &Face<I>)> + '_ {
        self.faces
            .iter()
            .enumerate()
            .map(|(i, f)| (FaceId::new(i), f))
    }

    /// Iterate over the outgoing half-edges of a vertex ("flip then next").
    pub fn vertex_halfedges(&self, v: VertexId<I>) -> VertexHalfEdgeIter<'_, I> {
        VertexHalfEdgeIter::new(self, v)
    }

    /// Iterate over vertices adjacent to a vertex.
    pub fn vertex_neighbors(&self, v: VertexId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertex_halfedges(v).map(|he| self.dest(he))
    }

    /// Iterate over faces adjacent to a vertex.
    pub fn vertex_faces(&self, v: VertexId<I>) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.vertex_halfedges(v).filter_map(|he| self.face_of(he))
    }

    /// Iterate over half-edges around a face.
    pub fn face_halfedges(&self, f: FaceId<I>) -> FaceHalfEdgeIter<'_, I> {
        FaceHalfEdgeIter::new(self, f)
    }

    /// Iterate over vertices of a face.
    pub fn face_vertices(&self, f: FaceId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.face_halfedges(f).map(|he| self.origin(he))
    }

    /// Get the three vertices of a triangular face.
    pub fn face_triangle(&self, f: FaceId<I>) -> [VertexId<I>; 3] {
        let he0 = self.face(f).halfedge;
        let he1 = self.next(he0);
        let he2 = self.next(he1);
        [self.origin(he0), self.origin(he1), self.origin(he2)]
    }

    /// Get the positions of the three vertices of a triangular face.
    pub fn face_positions(&self, f: FaceId<I>) -> [Point3<f64>; 3] {
        let [v0, v1, v2] = self.face_triangle(f);
        [*self.position(v0), *self.position(v1), *self.position(v2)]
    }

    // ==================== Geometry ====================

    /// Unit normal of a face. A degenerate face yields the zero vector.
    pub fn face_normal(&self, f: FaceId<I>) -> Vector3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        let e1 = p1 - p0;
        let e2 = p2 - p0;
        e1.cross(&e2)
            .try_normalize(f64::MIN_POSITIVE)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Compute the area of a face.
    pub fn face_area(&self, f: FaceId<I>) -> f64 {
        let [p0, p1, p2] = self.face_positions(f);
        let e1 = p1 - p0;
        let e2 = p2 - p0;
        0.5 * e1.cross(&e2).norm()
    }

    /// The two edge vectors leaving the corner opposite `he`, towards the
    /// origin and the destination of `he`.
    fn opposite_corner(&self, he: HalfEdgeId<I>) -> (Vector3<f64>, Vector3<f64>) {
        let apex = self.position(self.origin(self.next(self.next(he))));
        let u = self.position(self.origin(he)) - apex;
        let v = self.position(self.origin(self.next(he))) - apex;
        (u, v)
    }

    /// Cotangent of the angle opposite `he` in its triangle.
    ///
    /// Boundary half-edges have no opposite angle and return `0.0`, as do
    /// degenerate (collinear) triangles; this never divides by zero.
    pub fn halfedge_cotan(&self, he: HalfEdgeId<I>) -> f64 {
        if self.is_boundary_halfedge(he) {
            return 0.0;
        }
        let (u, v) = self.opposite_corner(he);
        let cross_norm = u.cross(&v).norm();
        if cross_norm <= f64::EPSILON * u.norm() * v.norm() {
            return 0.0;
        }
        u.dot(&v) / cross_norm
    }

    /// Angle (radians) opposite `he` in its triangle, `0.0` on the boundary.
    pub fn halfedge_angle(&self, he: HalfEdgeId<I>) -> f64 {
        if self.is_boundary_halfedge(he) {
            return 0.0;
        }
        let (u, v) = self.opposite_corner(he);
        u.cross(&v).norm().atan2(u.dot(&v))
    }

    /// Compute the length of an edge.
    pub fn edge_length(&self, he: HalfEdgeId<I>) -> f64 {
        self.edge_vector(he).norm()
    }

    /// Compute the edge vector (from origin to destination).
    pub fn edge_vector(&self, he: HalfEdgeId<I>) -> Vector3<f64> {
        self.position(self.dest(he)) - self.position(self.origin(he))
    }

    /// Barycentric dual area of a vertex: one third of the area of every
    /// incident face. Isolated vertices have zero area.
    pub fn vertex_area(&self, v: VertexId<I>) -> f64 {
        let area: f64 = self.vertex_faces(v).map(|f| self.face_area(f)).sum();
        area / 3.0
    }

    /// Number of outgoing half-edges of a vertex (0 when isolated).
    pub fn valence(&self, v: VertexId<I>) -> usize {
        self.vertex_halfedges(v).count()
    }

    /// Mean of all vertex positions.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        let sum: Vector3<f64> = self.vertices.iter().map(|v| v.position.coords).sum();
        Some(Point3::from(sum / self.vertices.len() as f64))
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.face_ids().map(|f| self.face_area(f)).sum()
    }

    // ==================== Construction ====================

    /// Add a new isolated vertex and return its ID.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexId<I> {
        self.touch();
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(Vertex::new(position));
        id
    }

    // ==================== Validation ====================

    /// Check if the mesh is valid (all connectivity is consistent).
    pub fn is_valid(&self) -> bool {
        for (vid, v) in self.vertices() {
            if let Some(he) = v.halfedge {
                if he.index() >= self.num_halfedges() || self.origin(he) != vid {
                    return false;
                }
            }
        }

        for (heid, he) in self.halfedges() {
            // Flip is an involution between distinct half-edges
            if he.flip == heid || self.flip(he.flip) != heid {
                return false;
            }
            if self.origin(he.flip) != self.origin(he.next) {
                return false;
            }
            if self.prev(he.next) != heid || self.next(he.prev) != heid {
                return false;
            }
            if let Some(f) = he.face {
                if f.index() >= self.num_faces() || self.face_of(he.next) != Some(f) {
                    return false;
                }
            }
        }

        for (fid, f) in self.faces() {
            if self.face_of(f.halfedge) != Some(fid) {
                return false;
            }
            // Exactly three distinct corners
            let corners: Vec<_> = self.face_vertices(fid).take(4).collect();
            if corners.len() != 3
                || corners[0] == corners[1]
                || corners[1] == corners[2]
                || corners[2] == corners[0]
            {
                return false;
            }
        }

        true
    }
}

/// Iterator over the outgoing half-edges of a vertex.
///
/// Walks "flip then next" from the vertex's stored half-edge until the start
/// is revisited. The walk is capped at the number of half-edges so broken
/// connectivity cannot loop forever.
pub struct VertexHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: Option<HalfEdgeId<I>>,
    current: Option<HalfEdgeId<I>>,
    remaining: usize,
}

impl<'a, I: MeshIndex> VertexHalfEdgeIter<'a, I> {
    fn new(mesh: &'a HalfEdgeMesh<I>, v: VertexId<I>) -> Self {
        let start = mesh.outgoing(v);
        Self {
            mesh,
            start,
            current: start,
            remaining: mesh.num_halfedges(),
        }
    }
}

impl<'a, I: MeshIndex> Iterator for VertexHalfEdgeIter<'a, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        if self.remaining == 0 {
            self.current = None;
            return None;
        }
        self.remaining -= 1;

        // he: v -> w, flip(he): w -> v, next(flip(he)) leaves v again
        let following = self.mesh.next(self.mesh.flip(result));
        self.current = if Some(following) == self.start {
            None
        } else {
            Some(following)
        };

        Some(result)
    }
}

/// Iterator over half-edges around a face.
pub struct FaceHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: HalfEdgeId<I>,
    current: Option<HalfEdgeId<I>>,
    remaining: usize,
}

impl<'a, I: MeshIndex> FaceHalfEdgeIter<'a, I> {
    fn new(mesh: &'a HalfEdgeMesh<I>, f: FaceId<I>) -> Self {
        let start = mesh.face(f).halfedge;
        Self {
            mesh,
            start,
            current: Some(start),
            remaining: mesh.num_halfedges(),
        }
    }
}

impl<'a, I: MeshIndex> Iterator for FaceHalfEdgeIter<'a, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        if self.remaining == 0 {
            self.current = None;
            return None;
        }
        self.remaining -= 1;

        let following = self.mesh.next(result);
        self.current = (following != self.start).then_some(following);

        Some(result)
    }
}
