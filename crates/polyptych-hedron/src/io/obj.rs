//! Wavefront OBJ, restricted to `v`, `f` and `o` lines.
//!
//! Face tokens may carry texture and normal indices (`3/1/2`); only the vertex
//! index before the first `/` is used. Indices are 1-based, and negative
//! indices count back from the most recent vertex.

use std::fmt::Write as _;

use polyptych_math::DVec3;

use crate::error::HedronError;
use crate::polyhedron::Polyhedron;

pub fn read(text: &str) -> Result<Polyhedron, HedronError> {
    let mut p = Polyhedron::new();
    for (i, raw) in text.lines().enumerate() {
        let n = i + 1;
        let line = raw.trim();
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let coords: Vec<f64> = tokens
                    .take(3)
                    .map(|t| {
                        t.parse()
                            .map_err(|_| HedronError::parse(n, format!("bad coordinate {t:?}")))
                    })
                    .collect::<Result<_, _>>()?;
                let &[x, y, z] = coords.as_slice() else {
                    return Err(HedronError::parse(n, "vertex needs 3 coordinates"));
                };
                p.add_point(DVec3::new(x, y, z));
            }
            Some("o") => {
                let name = line[1..].trim();
                if !name.is_empty() {
                    p.name = Some(name.to_string());
                }
            }
            Some("f") => {
                let count = p.vertices.len() as i64;
                let vertices: Vec<usize> = tokens
                    .map(|t| resolve_index(n, t, count))
                    .collect::<Result<_, _>>()?;
                if vertices.len() < 3 {
                    return Err(HedronError::parse(n, "face needs at least 3 vertices"));
                }
                p.add_face(&vertices)?;
            }
            _ => {}
        }
    }
    p.finalize()?;
    Ok(p)
}

fn resolve_index(line: usize, token: &str, count: i64) -> Result<usize, HedronError> {
    let first = token.split('/').next().unwrap_or("");
    let index: i64 = first
        .parse()
        .map_err(|_| HedronError::parse(line, format!("bad face index {token:?}")))?;
    let resolved = match index {
        0 => return Err(HedronError::parse(line, "face index 0 is invalid")),
        i if i < 0 => count + i,
        i => i - 1,
    };
    usize::try_from(resolved)
        .ok()
        .filter(|&r| (r as i64) < count)
        .ok_or_else(|| HedronError::parse(line, format!("face index {index} out of range")))
}

pub fn write(p: &Polyhedron) -> Result<String, HedronError> {
    if p.vertices.is_empty() || p.faces.is_empty() {
        return Err(HedronError::Empty("faces"));
    }
    let mut out = String::from("# Polyptych outputting Obj\n");
    if let Some(name) = &p.name {
        let _ = writeln!(out, "o {name}");
    }
    for &v in &p.vertices {
        let _ = writeln!(out, "v {}", super::triple(v));
    }
    for face in &p.faces {
        out.push('f');
        for v in &face.vertices {
            let _ = write!(out, " {}", v + 1);
        }
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_and_negative_indices() {
        let text = "\
# comment
o tri
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
f 1/1/1 2//2 -1/3
";
        let p = read(text).unwrap();
        assert_eq!(p.name.as_deref(), Some("tri"));
        assert_eq!(p.faces[0].vertices, vec![0, 1, 2]);
    }

    #[test]
    fn test_bad_faces() {
        let base = "v 0 0 0\nv 1 0 0\nv 0 1 0\n";
        assert!(matches!(
            read(&format!("{base}f 1 2\n")),
            Err(HedronError::Parse { line: 4, .. })
        ));
        assert!(read(&format!("{base}f 0 1 2\n")).is_err());
        assert!(read(&format!("{base}f 1 2 9\n")).is_err());
        assert!(read("v 1 2\n").is_err());
    }
}
