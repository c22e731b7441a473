//! Geomview OFF files.
//!
//! ```text
//! [ST][C][N][4][n]OFF   # header keyword
//! [Ndim]                # only for nOFF
//! NVertices NFaces NEdges
//! x y z ...             # one line per vertex
//! Nv v0 v1 ... colorspec
//! ```
//! Per-vertex normals, colors and texture coordinates follow the position and
//! are ignored, as are face colorspecs.

use std::fmt::Write as _;

use polyptych_math::DVec3;

use crate::error::HedronError;
use crate::polyhedron::Polyhedron;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct OffFlags {
    homogeneous: bool,
    higher_dimension: bool,
}

/// Parse the header keyword, returning `None` if it is not an OFF keyword.
fn parse_keyword(keyword: &str) -> Option<OffFlags> {
    let mut flags = OffFlags::default();
    let mut rest = keyword;
    loop {
        if let Some(r) = rest.strip_prefix("ST") {
            rest = r;
        } else if let Some(r) = rest.strip_prefix('C').or_else(|| rest.strip_prefix('N')) {
            rest = r;
        } else if let Some(r) = rest.strip_prefix('4') {
            flags.homogeneous = true;
            rest = r;
        } else if let Some(r) = rest.strip_prefix('n') {
            flags.higher_dimension = true;
            rest = r;
        } else {
            break;
        }
        if rest == "OFF" {
            break;
        }
    }
    (rest == "OFF").then_some(flags)
}

/// Non-blank lines with comments removed, paired with 1-based line numbers.
fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().filter_map(|(i, line)| {
        let line = line.split('#').next().unwrap_or("").trim();
        (!line.is_empty()).then_some((i + 1, line))
    })
}

pub(crate) fn looks_like_off(head: &str) -> bool {
    content_lines(head)
        .next()
        .and_then(|(_, line)| line.split_whitespace().next())
        .and_then(parse_keyword)
        .is_some()
}

fn numbers<T: std::str::FromStr>(line_no: usize, line: &str) -> Result<Vec<T>, HedronError> {
    line.split_whitespace()
        .map(|t| {
            t.parse()
                .map_err(|_| HedronError::parse(line_no, format!("bad number {t:?}")))
        })
        .collect()
}

pub fn read(text: &str) -> Result<Polyhedron, HedronError> {
    let mut lines = content_lines(text);
    let (_, header) = lines
        .next()
        .ok_or_else(|| HedronError::MalformedHeader("empty file".to_string()))?;
    let mut tokens = header.split_whitespace();
    let keyword = tokens.next().unwrap_or("");
    let flags = parse_keyword(keyword).ok_or_else(|| {
        HedronError::MalformedHeader(format!("expected OFF keyword, found {keyword:?}"))
    })?;
    let inline_counts: Vec<&str> = tokens.collect();

    if flags.higher_dimension {
        lines
            .next()
            .ok_or_else(|| HedronError::MalformedHeader("missing dimension line".to_string()))?;
    }

    let counts: Vec<usize> = if inline_counts.is_empty() {
        let (n, line) = lines
            .next()
            .ok_or_else(|| HedronError::MalformedHeader("missing element counts".to_string()))?;
        numbers(n, line).map_err(|_| HedronError::MalformedHeader(format!("bad counts {line:?}")))?
    } else {
        numbers(1, &inline_counts.join(" "))
            .map_err(|_| HedronError::MalformedHeader(format!("bad counts {inline_counts:?}")))?
    };
    let &[nv, nf, ..] = counts.as_slice() else {
        return Err(HedronError::MalformedHeader(format!(
            "expected vertex and face counts, found {counts:?}"
        )));
    };

    let mut p = Polyhedron::new();
    let needed = if flags.homogeneous { 4 } else { 3 };
    for i in 0..nv {
        let (n, line) = lines
            .next()
            .ok_or_else(|| HedronError::parse(0, format!("file ends after {i} of {nv} vertices")))?;
        let v: Vec<f64> = numbers(n, line)?;
        if v.len() < needed {
            return Err(HedronError::parse(n, format!("vertex needs {needed} numbers")));
        }
        let mut point = DVec3::new(v[0], v[1], v[2]);
        if flags.homogeneous && v[3] != 0.0 {
            point /= v[3];
        }
        p.add_point(point);
    }

    for i in 0..nf {
        let (n, line) = lines
            .next()
            .ok_or_else(|| HedronError::parse(0, format!("file ends after {i} of {nf} faces")))?;
        let mut tokens = line.split_whitespace();
        let count: usize = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .filter(|&c| c > 0)
            .ok_or_else(|| HedronError::parse(n, "face must start with its vertex count"))?;
        let vertices: Vec<usize> = tokens
            .take(count)
            .map(|t| t.parse().map_err(|_| HedronError::parse(n, format!("bad index {t:?}"))))
            .collect::<Result<_, _>>()?;
        if vertices.len() != count {
            return Err(HedronError::parse(
                n,
                format!("face lists {} of {count} vertices", vertices.len()),
            ));
        }
        p.add_face(&vertices)?;
    }

    p.finalize()?;
    Ok(p)
}

pub fn write(p: &Polyhedron) -> Result<String, HedronError> {
    if p.vertices.is_empty() || p.faces.is_empty() {
        return Err(HedronError::Empty("faces"));
    }
    let mut out = String::from("OFF\n");
    if let Some(name) = &p.name {
        let _ = writeln!(out, "# {name}");
    }
    let _ = writeln!(out, "{} {} 0", p.vertices.len(), p.faces.len());
    for &v in &p.vertices {
        let _ = writeln!(out, "{}", super::triple(v));
    }
    for face in &p.faces {
        let _ = write!(out, "{}", face.len());
        for v in &face.vertices {
            let _ = write!(out, " {v}");
        }
        out.push('\n');
    }
    Ok(out)
}
