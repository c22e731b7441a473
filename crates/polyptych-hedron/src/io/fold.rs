//! FOLD export (<https://github.com/edemaine/fold>), a JSON crease pattern format.

use serde::Serialize;

use crate::error::HedronError;
use crate::polyhedron::Polyhedron;

#[derive(Serialize)]
struct FoldFile<'a> {
    file_spec: f64,
    file_creator: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_title: Option<&'a str>,
    frame_classes: [&'static str; 1],
    vertices_coords: Vec<[f64; 3]>,
    faces_vertices: Vec<&'a [usize]>,
    edges_vertices: Vec<[usize; 2]>,
    edges_faces: Vec<[Option<usize>; 2]>,
    /// `B` for a boundary edge, `U` for an unassigned fold.
    edges_assignment: Vec<&'static str>,
}

pub fn write(p: &Polyhedron) -> Result<String, HedronError> {
    if p.faces.is_empty() {
        return Err(HedronError::Empty("faces"));
    }
    let file = FoldFile {
        file_spec: 1.1,
        file_creator: "polyptych",
        frame_title: p.name.as_deref(),
        frame_classes: ["foldedForm"],
        vertices_coords: p.vertices.iter().map(|v| v.to_array()).collect(),
        faces_vertices: p.faces.iter().map(|f| f.vertices.as_slice()).collect(),
        edges_vertices: p.edges.iter().map(|e| e.vertices).collect(),
        edges_faces: p.edges.iter().map(|e| e.faces).collect(),
        edges_assignment: p
            .edges
            .iter()
            .map(|e| if e.faces[1].is_none() { "B" } else { "U" })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;

    #[test]
    fn test_cube_fold() {
        let text = write(&shapes::cube()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["vertices_coords"].as_array().unwrap().len(), 8);
        assert_eq!(doc["faces_vertices"].as_array().unwrap().len(), 6);
        let assignment = doc["edges_assignment"].as_array().unwrap();
        assert_eq!(assignment.len(), 12);
        assert!(assignment.iter().all(|a| a == "U"));
    }

    #[test]
    fn test_open_mesh_has_boundary() {
        let mut p = Polyhedron::new();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            p.add_point(polyptych_math::DVec3::new(x, y, 0.0));
        }
        p.add_face(&[0, 1, 2]).unwrap();
        p.finalize().unwrap();
        let doc: serde_json::Value = serde_json::from_str(&write(&p).unwrap()).unwrap();
        assert!(doc["edges_assignment"].as_array().unwrap().iter().all(|a| a == "B"));
        assert!(doc["edges_faces"][0][1].is_null());
    }
}
