//! The native indented polyhedron format.

use polyptych_math::{Basis, DVec3};

use crate::attribute::Attribute;
use crate::error::HedronError;
use crate::polyhedron::{FaceSet, Polyhedron};

/// Header comment identifying the format.
pub const HEADER: &str = "#Polyp";

/// Default set color when a `color` attribute is missing or short.
const DEFAULT_SET_COLOR: [u8; 4] = [255, 0, 0, 255];

pub fn read(text: &str) -> Result<Polyhedron, HedronError> {
    let doc = Attribute::parse(text)?;
    let hedron = from_attribute(&doc)?;
    Ok(hedron)
}

/// Build and finalize a polyhedron from parsed attributes.
pub fn from_attribute(doc: &Attribute) -> Result<Polyhedron, HedronError> {
    let mut p = Polyhedron::new();
    for att in &doc.children {
        match att.name.as_str() {
            "name" => p.name = att.value.clone(),
            "vertices" => {
                for (k, line) in att.value_str().lines().enumerate() {
                    let coords: Vec<f64> = line
                        .split_whitespace()
                        .map(str::parse)
                        .collect::<Result<_, _>>()
                        .map_err(|_| {
                            HedronError::parse(att.line + k + 1, format!("bad vertex {line:?}"))
                        })?;
                    let &[x, y, z] = coords.as_slice() else {
                        return Err(HedronError::parse(
                            att.line + k + 1,
                            format!("vertex needs 3 coordinates, found {}", coords.len()),
                        ));
                    };
                    p.add_point(DVec3::new(x, y, z));
                }
            }
            // derived from faces
            "edge" => {}
            "face" => {
                let vertices = att.numbers::<usize>()?;
                let fi = p.add_face(&vertices)?;
                for child in &att.children {
                    let face = &mut p.faces[fi];
                    match child.name.as_str() {
                        "planeid" => face.plane_id = Some(child.fixed::<usize, 1>()?[0]),
                        "setid" => face.set_id = Some(child.fixed::<usize, 1>()?[0]),
                        "facegroupid" => face.group_id = Some(child.fixed::<usize, 1>()?[0]),
                        "cuts" => {
                            let cuts = child.numbers::<u8>()?;
                            for (e, c) in cuts.into_iter().enumerate().take(face.cuts.len()) {
                                face.cuts[e] = c != 0;
                            }
                        }
                        // recomputed by connect_faces
                        "facelink" => {}
                        other => {
                            tracing::debug!(line = child.line, "ignoring face attribute {other}");
                        }
                    }
                }
            }
            "set" => p.sets.push(read_set(att)?),
            "plane" => p.planes.push(read_plane(att)?),
            other => tracing::debug!(line = att.line, "ignoring polyhedron attribute {other}"),
        }
    }
    p.finalize()?;
    Ok(p)
}

fn read_set(att: &Attribute) -> Result<FaceSet, HedronError> {
    let mut set = FaceSet {
        name: att.value_str().to_string(),
        on: true,
        color: DEFAULT_SET_COLOR,
        faces: Vec::new(),
    };
    for child in &att.children {
        match child.name.as_str() {
            "on" => set.on = true,
            "off" => set.on = false,
            "faces" => set.faces = child.numbers()?,
            "color" => {
                for (slot, c) in set.color.iter_mut().zip(child.numbers::<u8>()?) {
                    *slot = c;
                }
            }
            _ => {}
        }
    }
    Ok(set)
}

fn read_plane(att: &Attribute) -> Result<Basis, HedronError> {
    let mut basis = Basis::IDENTITY;
    for child in &att.children {
        let slot = match child.name.as_str() {
            "p" => &mut basis.p,
            "x" => &mut basis.x,
            "y" => &mut basis.y,
            "z" => &mut basis.z,
            _ => continue,
        };
        *slot = DVec3::from_array(child.fixed::<f64, 3>()?);
    }
    Ok(basis)
}

fn numbers_line<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Attribute tree for a polyhedron, suitable for embedding in other documents.
#[must_use]
pub fn to_attribute(p: &Polyhedron) -> Attribute {
    let mut root = Attribute::default();
    if let Some(name) = &p.name {
        root.push(Attribute::with_value("name", name));
    }
    let vertices: Vec<String> = p.vertices.iter().map(|&v| super::triple(v)).collect();
    root.push(Attribute::new("vertices", Some(vertices.join("\n"))));
    for e in &p.edges {
        root.push(Attribute::with_value("edge", numbers_line(e.vertices)));
    }
    for face in &p.faces {
        let mut att = Attribute::with_value("face", numbers_line(face.vertices.iter()));
        if face.adjacent.iter().any(Option::is_some) {
            let links = face
                .adjacent
                .iter()
                .map(|a| a.map_or(-1, |f| f as i64));
            att.push(Attribute::with_value("facelink", numbers_line(links)));
        }
        if let Some(id) = face.plane_id {
            att.push(Attribute::with_value("planeid", id));
        }
        if let Some(id) = face.set_id {
            att.push(Attribute::with_value("setid", id));
        }
        if let Some(id) = face.group_id {
            att.push(Attribute::with_value("facegroupid", id));
        }
        if face.cuts.iter().any(|&c| c) {
            att.push(Attribute::with_value(
                "cuts",
                numbers_line(face.cuts.iter().map(|&c| u8::from(c))),
            ));
        }
        root.push(att);
    }
    for set in &p.sets {
        root.push(
            Attribute::with_value("set", &set.name)
                .child(Attribute::new(if set.on { "on" } else { "off" }, None))
                .child(Attribute::with_value("color", numbers_line(set.color)))
                .child(Attribute::with_value("faces", numbers_line(set.faces.iter()))),
        );
    }
    for plane in &p.planes {
        root.push(
            Attribute::new("plane", None)
                .child(Attribute::with_value("p", super::triple(plane.p)))
                .child(Attribute::with_value("x", super::triple(plane.x)))
                .child(Attribute::with_value("y", super::triple(plane.y)))
                .child(Attribute::with_value("z", super::triple(plane.z))),
        );
    }
    root
}

#[must_use]
pub fn write(p: &Polyhedron) -> String {
    to_attribute(p).to_document(HEADER)
}
