//! Procedurally generated polyhedra.

use std::f64::consts::PI;

use polyptych_math::DVec3;

use crate::error::HedronError;
use crate::polyhedron::Polyhedron;

/// Axis-aligned cube with corners at ±1 (edge length 2), faces wound outward.
#[must_use]
pub fn cube() -> Polyhedron {
    build(
        "cube",
        &[
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [-1.0, 1.0, -1.0],
            [1.0, 1.0, -1.0],
            [1.0, -1.0, -1.0],
            [-1.0, -1.0, -1.0],
        ],
        &[
            &[0, 1, 2, 3],
            &[1, 0, 5, 4],
            &[2, 1, 4, 7],
            &[0, 3, 6, 5],
            &[3, 2, 7, 6],
            &[4, 5, 6, 7],
        ],
    )
}

/// Regular tetrahedron inscribed in the ±1 cube.
#[must_use]
pub fn tetrahedron() -> Polyhedron {
    build(
        "tetrahedron",
        &[
            [1.0, 1.0, 1.0],
            [1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
        ],
        &[&[0, 1, 2], &[0, 3, 1], &[0, 2, 3], &[1, 3, 2]],
    )
}

/// Unit sphere tessellated into `rings` latitude bands and `segments`
/// longitude slices. Duplicate pole vertices are merged, so the polar bands
/// become triangle fans.
pub fn uv_sphere(rings: usize, segments: usize, epsilon: f64) -> Result<Polyhedron, HedronError> {
    let rings = rings.max(2);
    let segments = segments.max(3);
    let mut sphere = Polyhedron {
        name: Some("sphere".to_string()),
        ..Default::default()
    };
    for i in 0..=rings {
        let theta = PI * i as f64 / rings as f64;
        for j in 0..segments {
            let phi = 2.0 * PI * j as f64 / segments as f64;
            sphere.add_point(DVec3::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            ));
        }
    }
    let index = |i: usize, j: usize| i * segments + j % segments;
    for i in 0..rings {
        for j in 0..segments {
            sphere.add_face(&[
                index(i, j),
                index(i + 1, j),
                index(i + 1, j + 1),
                index(i, j + 1),
            ])?;
        }
    }
    sphere.collapse_vertices(epsilon);
    sphere.finalize()?;
    Ok(sphere)
}

fn build(name: &str, vertices: &[[f64; 3]], faces: &[&[usize]]) -> Polyhedron {
    let mut p = Polyhedron {
        name: Some(name.to_string()),
        vertices: vertices.iter().map(|&v| DVec3::from_array(v)).collect(),
        ..Default::default()
    };
    p.faces = faces
        .iter()
        .map(|f| crate::polyhedron::Face::new(f.to_vec()))
        .collect();
    // the tables above are closed and consistently wound
    if let Err(e) = p.finalize() {
        tracing::error!("built-in shape {name} failed to finalize: {e}");
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tetrahedron_is_closed() {
        let t = tetrahedron();
        assert!(t.faces.iter().all(|f| f.adjacent.iter().all(Option::is_some)));
        assert_eq!(t.edges.len(), 6);
    }

    #[test]
    fn test_uv_sphere_merges_poles() {
        let s = uv_sphere(4, 6, 1e-9).unwrap();
        // two poles plus three inner rings of six
        assert_eq!(s.vertices.len(), 2 + 3 * 6);
        assert_eq!(s.faces.len(), 4 * 6);
        let triangles = s.faces.iter().filter(|f| f.len() == 3).count();
        assert_eq!(triangles, 12);
        assert!(s.faces.iter().all(|f| f.adjacent.iter().all(Option::is_some)));
    }

    #[test]
    fn test_outward_normals() {
        for p in [cube(), tetrahedron()] {
            for i in 0..p.num_faces() {
                let n = p.basis_of_face(i).unwrap().z;
                let c = p.center_of_face(i, false).unwrap();
                assert!(n.dot(c) > 0.0, "face {i} of {:?} points inward", p.name);
            }
        }
    }
}
