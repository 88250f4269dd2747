//! Mesh fixtures shared by the unit tests.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::mesh::{build_from_triangles, HalfEdgeMesh};

pub(crate) fn tetrahedron_data() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.5, 1.0, 0.0),
        Point3::new(0.5, 0.5, 1.0),
    ];
    let faces = vec![
        [0, 2, 1], // bottom
        [0, 1, 3], // front
        [1, 2, 3], // right
        [2, 0, 3], // left
    ];
    (vertices, faces)
}

pub(crate) fn tetrahedron() -> HalfEdgeMesh {
    let (vertices, faces) = tetrahedron_data();
    build_from_triangles(&vertices, &faces).unwrap()
}

/// Regular icosahedron with edge length 2, centred at the origin.
///
/// Vertex 0 and vertex 3 are antipodal.
pub(crate) fn icosahedron_data() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let t = (1.0 + 5f64.sqrt()) / 2.0;
    let vertices = vec![
        Point3::new(-1.0, t, 0.0),
        Point3::new(1.0, t, 0.0),
        Point3::new(-1.0, -t, 0.0),
        Point3::new(1.0, -t, 0.0),
        Point3::new(0.0, -1.0, t),
        Point3::new(0.0, 1.0, t),
        Point3::new(0.0, -1.0, -t),
        Point3::new(0.0, 1.0, -t),
        Point3::new(t, 0.0, -1.0),
        Point3::new(t, 0.0, 1.0),
        Point3::new(-t, 0.0, -1.0),
        Point3::new(-t, 0.0, 1.0),
    ];
    let faces = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];
    (vertices, faces)
}

pub(crate) fn icosahedron() -> HalfEdgeMesh {
    let (vertices, faces) = icosahedron_data();
    build_from_triangles(&vertices, &faces).unwrap()
}

/// Unit sphere approximated by a subdivided icosahedron.
pub(crate) fn icosphere(subdivisions: usize) -> HalfEdgeMesh {
    let (vertices, mut faces) = icosahedron_data();
    let mut vertices: Vec<Point3<f64>> = vertices
        .into_iter()
        .map(|p| Point3::from(p.coords.normalize()))
        .collect();

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Point3<f64>>| -> usize {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let m = (vertices[a].coords + vertices[b].coords).normalize();
                vertices.push(Point3::from(m));
                vertices.len() - 1
            })
        };

        let mut refined = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            refined.push([a, ab, ca]);
            refined.push([b, bc, ab]);
            refined.push([c, ca, bc]);
            refined.push([ab, bc, ca]);
        }
        faces = refined;
    }

    build_from_triangles(&vertices, &faces).unwrap()
}

/// Flat `n × n` grid of unit squares in the z = 0 plane, two triangles per cell.
pub(crate) fn grid(n: usize) -> HalfEdgeMesh {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    let mut faces = Vec::with_capacity(n * n * 2);

    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    build_from_triangles(&vertices, &faces).unwrap()
}

/// Two disjoint tetrahedra; vertices 0..4 and 4..8.
pub(crate) fn two_tetrahedra() -> HalfEdgeMesh {
    let (mut vertices, mut faces) = tetrahedron_data();
    let shifted: Vec<Point3<f64>> = vertices
        .iter()
        .map(|p| Point3::new(p.x + 3.0, p.y, p.z))
        .collect();
    let extra: Vec<[usize; 3]> = faces
        .iter()
        .map(|f| [f[0] + 4, f[1] + 4, f[2] + 4])
        .collect();
    vertices.extend(shifted);
    faces.extend(extra);
    build_from_triangles(&vertices, &faces).unwrap()
}

/// Tetrahedron plus one vertex that belongs to no face (index 4).
pub(crate) fn with_isolated_vertex() -> HalfEdgeMesh {
    let (mut vertices, faces) = tetrahedron_data();
    vertices.push(Point3::new(2.0, 2.0, 2.0));
    build_from_triangles(&vertices, &faces).unwrap()
}

/// Small fan whose face 2 is collinear (zero area).
pub(crate) fn degenerate_fan() -> HalfEdgeMesh {
    let vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
    ];
    let faces = vec![[0, 1, 3], [1, 2, 3], [0, 2, 1]];
    build_from_triangles(&vertices, &faces).unwrap()
}
