//! VRML 2.0 wireframe: one thin cylinder per edge.

use std::fmt::Write as _;

use crate::error::HedronError;
use crate::polyhedron::Polyhedron;

pub fn write(p: &Polyhedron) -> Result<String, HedronError> {
    if p.edges.is_empty() {
        return Err(HedronError::Empty("edges"));
    }
    let mut out = String::from("#VRML V2.0 utf8\n\n");
    for edge in &p.edges {
        let a = p.vertices[edge.vertices[0]];
        let b = p.vertices[edge.vertices[1]];
        let mid = (a + b) / 2.0;
        let height = a.distance(b);
        // rotating half a turn about the bisector of +y and the edge
        // direction takes the cylinder axis onto the edge
        let mut axis = (b - a).normalize_or_zero();
        axis.y += 1.0;
        let rotate = axis.is_finite() && axis.length_squared() > 1e-24;

        let _ = writeln!(
            out,
            "# {:.6},{:.6},{:.6} to {:.6},{:.6},{:.6}",
            a.x, a.y, a.z, b.x, b.y, b.z
        );
        let _ = writeln!(out, "Transform {{");
        let _ = writeln!(out, "   translation {:.6} {:.6} {:.6}", mid.x, mid.y, mid.z);
        if rotate {
            let _ = writeln!(
                out,
                "   rotation {:.6} {:.6} {:.6} 3.1415926535897",
                axis.x, axis.y, axis.z
            );
        }
        let _ = writeln!(out, "   children");
        let _ = writeln!(out, "\tShape {{");
        let _ = writeln!(out, "\t   appearance Appearance {{");
        let _ = writeln!(out, "\t\tmaterial Material {{ diffuseColor .8 .8 1 }}");
        let _ = writeln!(out, "\t   }}");
        let _ = writeln!(out, "\t   geometry Cylinder {{ height {height:.6} radius .1 }}");
        let _ = writeln!(out, "\t}}");
        let _ = writeln!(out, "}}\n");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;

    #[test]
    fn test_one_transform_per_edge() {
        let cube = shapes::cube();
        let text = write(&cube).unwrap();
        assert!(text.starts_with("#VRML V2.0 utf8"));
        assert_eq!(text.matches("Transform {").count(), 12);
        assert!(text.contains("height 2.000000 radius .1"));
    }

    #[test]
    fn test_needs_edges() {
        assert!(matches!(
            write(&Polyhedron::new()),
            Err(HedronError::Empty("edges"))
        ));
    }
}
