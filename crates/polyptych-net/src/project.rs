//! Project files: the mesh and sphere image in use, the view basis, and every
//! net worth keeping.
//!
//! ```text
//! #Polyptych project
//! polyhedronfile cube.off
//! spherefile sky.jpg
//! basis
//!   p 0,0,0
//!   x 1,0,0
//!   y 0,1,0
//!   z 0,0,1
//! net
//!   info 0
//!   matrix 1 0 0 1 0 0
//!   seam 0 3
//!   face
//!     original 0
//!     matrix 1 0 0 1 0 0
//!     edge
//!       toface 1.3
//!       tooriginal 1
//!       actual
//!     edge
//!       tooriginal 2
//!       potential
//! ```
//!
//! `info` is the seed face and the net level `matrix` places the net on its
//! paper; `seed` and `paper` are read as aliases. The header line is optional.
//! Number lists may be separated by commas or spaces. On load the nets are
//! replayed from their seeds along the `actual` edges, so potential faces and
//! tags are rebuilt rather than read.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use polyptych_hedron::attribute::Attribute;
use polyptych_hedron::{Polyhedron, io};
use polyptych_math::{Basis, DVec3, Transform2};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::NetError;
use crate::net::{EdgeTag, FaceTag, Net, NetFaceEdge, PaperBinding};
use crate::unfolding::Unfolding;

pub const PROJECT_HEADER: &str = "#Polyptych project";

/// A saved session.
#[derive(Clone, Debug)]
pub struct Project {
    pub polyhedron_file: Option<PathBuf>,
    pub sphere_file: Option<PathBuf>,
    /// Orientation of the sphere image relative to the mesh.
    pub basis: Basis,
    pub unfolding: Unfolding,
}

/// One `edge` block as read from disk.
struct SavedEdge {
    tag: EdgeTag,
    toface: Option<usize>,
    tooriginal: Option<usize>,
}

/// One `face` block as read from disk.
struct SavedFace {
    original: usize,
    tag: FaceTag,
    matrix: Option<Transform2>,
    edges: Vec<SavedEdge>,
}

struct SavedNet {
    line: usize,
    seed: usize,
    paper: Option<Transform2>,
    seams: Vec<(usize, usize)>,
    faces: Vec<SavedFace>,
}

impl SavedNet {
    /// Edges of `face` hinged to an actual face, with the mesh face across.
    fn hinges(&self, face: &SavedFace) -> Vec<(usize, usize)> {
        face.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.tag == EdgeTag::Actual)
            .filter_map(|(i, e)| {
                let to = e
                    .tooriginal
                    .or_else(|| e.toface.and_then(|f| self.faces.get(f)).map(|f| f.original))?;
                Some((i, to))
            })
            .collect()
    }
}

impl Project {
    #[must_use]
    pub fn new(unfolding: Unfolding) -> Self {
        Self {
            polyhedron_file: None,
            sphere_file: None,
            basis: Basis::IDENTITY,
            unfolding,
        }
    }

    // --- Writing ---

    #[must_use]
    pub fn to_attribute(&self) -> Attribute {
        let mut root = Attribute::default();
        if let Some(path) = &self.polyhedron_file {
            root.push(Attribute::with_value("polyhedronfile", path.display()));
        }
        if let Some(path) = &self.sphere_file {
            root.push(Attribute::with_value("spherefile", path.display()));
        }
        root.push(
            Attribute::new("basis", None)
                .child(Attribute::with_value("p", triple(self.basis.p)))
                .child(Attribute::with_value("x", triple(self.basis.x)))
                .child(Attribute::with_value("y", triple(self.basis.y)))
                .child(Attribute::with_value("z", triple(self.basis.z))),
        );
        for net in self.unfolding.nets() {
            // a lone seed is not worth keeping
            if net.num_actual() <= 1 {
                continue;
            }
            root.push(net_attribute(net));
        }
        root
    }

    #[must_use]
    pub fn write(&self) -> String {
        self.to_attribute().to_document(PROJECT_HEADER)
    }

    pub fn save(&self, path: &Path) -> Result<(), NetError> {
        std::fs::write(path, self.write()).map_err(|source| NetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), nets = self.unfolding.nets().len(), "saved project");
        Ok(())
    }

    // --- Reading ---

    /// Load a project, reading the polyhedron it names. Relative paths are
    /// taken from the project file's directory.
    pub fn load(path: &Path) -> Result<Project, NetError> {
        let text = read_file(path)?;
        Self::parse(&text, path.parent(), None)
    }

    /// Load a project onto a mesh that is already in memory.
    pub fn load_with(path: &Path, hedron: Polyhedron) -> Result<Project, NetError> {
        let text = read_file(path)?;
        Self::parse(&text, path.parent(), Some(hedron))
    }

    /// Parse project text. Without `hedron`, the `polyhedronfile` is loaded,
    /// resolved against `base_dir` when relative.
    pub fn parse(
        text: &str,
        base_dir: Option<&Path>,
        hedron: Option<Polyhedron>,
    ) -> Result<Project, NetError> {
        let doc = Attribute::parse(text)?;
        let mut polyhedron_file = None;
        let mut sphere_file = None;
        let mut basis = Basis::IDENTITY;
        let mut saved = Vec::new();
        for att in &doc.children {
            match att.name.as_str() {
                "polyhedronfile" => polyhedron_file = Some(PathBuf::from(att.value_str())),
                "spherefile" => sphere_file = Some(PathBuf::from(att.value_str())),
                "basis" => basis = read_basis(att)?,
                "net" => saved.push(read_net(att)?),
                other => tracing::debug!(line = att.line, "ignoring project attribute {other}"),
            }
        }

        let hedron = match hedron {
            Some(h) => h,
            None => {
                let file = polyhedron_file
                    .as_ref()
                    .ok_or_else(|| NetError::project(0, "no polyhedronfile and no mesh given"))?;
                let resolved = match base_dir {
                    Some(dir) if file.is_relative() => dir.join(file),
                    _ => file.clone(),
                };
                io::load(&resolved)?
            }
        };

        let mut unfolding = Unfolding::new(hedron)?;
        for net in &saved {
            restore_net(&mut unfolding, net)?;
        }
        unfolding.check_invariants()?;
        Ok(Project {
            polyhedron_file,
            sphere_file,
            basis,
            unfolding,
        })
    }
}

fn read_file(path: &Path) -> Result<String, NetError> {
    std::fs::read_to_string(path).map_err(|source| NetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn triple(v: DVec3) -> String {
    format!("{},{},{}", v.x, v.y, v.z)
}

fn matrix_value(m: &Transform2) -> String {
    m.to_array().map(|x| x.to_string()).join(" ")
}

fn edge_tag_word(tag: EdgeTag) -> &'static str {
    match tag {
        EdgeTag::Undefined => "undefined",
        EdgeTag::None => "noface",
        EdgeTag::Actual => "actual",
        EdgeTag::Potential => "potential",
        EdgeTag::Taken => "facetaken",
    }
}

fn edge_attribute(edge: &NetFaceEdge) -> Attribute {
    let mut att = Attribute::new("edge", None);
    if let Some(toface) = edge.toface {
        let value = match edge.tofaceedge {
            Some(e) => format!("{toface}.{e}"),
            None => toface.to_string(),
        };
        att.push(Attribute::with_value("toface", value));
    }
    if let Some(to) = edge.tooriginal {
        att.push(Attribute::with_value("tooriginal", to));
    }
    att.push(Attribute::new(edge_tag_word(edge.tag), None));
    att
}

fn net_attribute(net: &Net) -> Attribute {
    let mut att = Attribute::new("net", None);
    if let Some(seed) = net.seed() {
        att.push(Attribute::with_value("info", seed));
    }
    if let Some(paper) = &net.paper {
        att.push(Attribute::with_value("matrix", matrix_value(&paper.transform)));
    }
    for (a, b) in net.seams() {
        att.push(Attribute::with_value("seam", format!("{a} {b}")));
    }
    for face in net.faces() {
        let mut block = Attribute::new("face", None)
            .child(Attribute::with_value("original", face.original))
            .child(Attribute::with_value("matrix", matrix_value(&face.matrix())));
        if face.tag != FaceTag::Actual {
            block.push(Attribute::new(face.tag.name(), None));
        }
        for edge in &face.edges {
            block.push(edge_attribute(edge));
        }
        att.push(block);
    }
    att
}

fn read_basis(att: &Attribute) -> Result<Basis, NetError> {
    let mut basis = Basis::IDENTITY;
    for child in &att.children {
        let [x, y, z] = child.fixed::<f64, 3>()?;
        let v = DVec3::new(x, y, z);
        match child.name.as_str() {
            "p" => basis.p = v,
            "x" => basis.x = v,
            "y" => basis.y = v,
            "z" => basis.z = v,
            other => {
                return Err(NetError::project(child.line, format!("unknown basis axis {other}")));
            }
        }
    }
    Ok(basis)
}

fn read_matrix(att: &Attribute) -> Result<Transform2, NetError> {
    Ok(Transform2::from_array(att.fixed::<f64, 6>()?))
}

/// `3` or `3.1`: an index and an optional edge. Negative means none.
fn read_link(att: &Attribute) -> Result<Option<usize>, NetError> {
    let value = att.value_str();
    let head = value.split('.').next().unwrap_or_default();
    let index: i64 = head
        .trim()
        .parse()
        .map_err(|_| NetError::project(att.line, format!("{}: bad index {value:?}", att.name)))?;
    Ok(usize::try_from(index).ok())
}

fn read_net(att: &Attribute) -> Result<SavedNet, NetError> {
    let mut seed = None;
    let mut paper = None;
    let mut seams = Vec::new();
    let mut faces = Vec::new();
    for child in &att.children {
        match child.name.as_str() {
            "info" | "seed" => seed = Some(child.fixed::<usize, 1>()?[0]),
            "matrix" | "paper" => paper = Some(read_matrix(child)?),
            "seam" => {
                let [a, b] = child.fixed::<usize, 2>()?;
                seams.push((a, b));
            }
            "face" => faces.push(read_face(child)?),
            other => tracing::debug!(line = child.line, "ignoring net attribute {other}"),
        }
    }
    let seed = seed.ok_or_else(|| NetError::project(att.line, "net without info"))?;
    Ok(SavedNet {
        line: att.line,
        seed,
        paper,
        seams,
        faces,
    })
}

fn read_face(att: &Attribute) -> Result<SavedFace, NetError> {
    let mut original = None;
    let mut tag = FaceTag::Actual;
    let mut matrix = None;
    let mut edges = Vec::new();
    for child in &att.children {
        match child.name.as_str() {
            "original" => original = Some(child.fixed::<usize, 1>()?[0]),
            "matrix" => matrix = Some(read_matrix(child)?),
            "actual" => tag = FaceTag::Actual,
            "potential" => tag = FaceTag::Potential,
            "taken" | "facetaken" => tag = FaceTag::Taken,
            "edge" => edges.push(read_edge(child)?),
            other => tracing::debug!(line = child.line, "ignoring face attribute {other}"),
        }
    }
    let original = original.ok_or_else(|| NetError::project(att.line, "face without original"))?;
    Ok(SavedFace {
        original,
        tag,
        matrix,
        edges,
    })
}

fn read_edge(att: &Attribute) -> Result<SavedEdge, NetError> {
    let mut edge = SavedEdge {
        tag: EdgeTag::Undefined,
        toface: None,
        tooriginal: None,
    };
    for child in &att.children {
        match child.name.as_str() {
            "toface" => edge.toface = read_link(child)?,
            "tooriginal" => edge.tooriginal = read_link(child)?,
            "actual" => edge.tag = EdgeTag::Actual,
            "potential" => edge.tag = EdgeTag::Potential,
            "facetaken" => edge.tag = EdgeTag::Taken,
            "noface" => edge.tag = EdgeTag::None,
            "undefined" => edge.tag = EdgeTag::Undefined,
            other => tracing::debug!(line = child.line, "ignoring edge attribute {other}"),
        }
    }
    // a link to a net face with no tag is a hinge
    if edge.toface.is_some() && matches!(edge.tag, EdgeTag::Undefined | EdgeTag::None) {
        edge.tag = EdgeTag::Actual;
    }
    Ok(edge)
}

/// Rebuild one net: anchor at the seed, then unwrap breadth first along the
/// saved hinges, then put the saved transforms back.
fn restore_net(unfolding: &mut Unfolding, saved: &SavedNet) -> Result<(), NetError> {
    let id = unfolding.establish_net(saved.seed)?;
    {
        let net = unfolding.net_mut(id)?;
        for &(a, b) in &saved.seams {
            net.add_seam(a, b);
        }
        net.paper = saved.paper.map(|transform| PaperBinding { transform });
    }

    let actual: FxHashMap<usize, &SavedFace> = saved
        .faces
        .iter()
        .filter(|f| f.tag == FaceTag::Actual)
        .map(|f| (f.original, f))
        .collect();
    let mut placed = FxHashSet::default();
    placed.insert(saved.seed);
    let mut queue = VecDeque::from([saved.seed]);
    while let Some(original) = queue.pop_front() {
        let Some(face) = actual.get(&original) else { continue };
        for (edge, to) in saved.hinges(face) {
            if !actual.contains_key(&to) || !placed.insert(to) {
                continue;
            }
            let index = unfolding
                .net(id)
                .and_then(|n| n.actual_index(original))
                .ok_or(NetError::NotPlaced(original))?;
            unfolding.unwrap(id, Some(index), Some(edge))?;
            queue.push_back(to);
        }
    }
    if placed.len() != actual.len() {
        tracing::warn!(
            line = saved.line,
            saved = actual.len(),
            restored = placed.len(),
            "some saved faces are not connected to the seed"
        );
    }

    let matrices: FxHashMap<usize, Transform2> = actual
        .values()
        .filter_map(|f| f.matrix.map(|m| (f.original, m)))
        .collect();
    unfolding.override_matrices(id, &matrices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyptych_hedron::shapes;
    use polyptych_math::DVec2;

    const EPSILON: f64 = 1e-9;

    fn unwrapped_cube() -> Unfolding {
        let mut session = Unfolding::new(shapes::cube()).unwrap();
        let id = session.establish_net(0).unwrap();
        session.total_unwrap(id).unwrap();
        session
    }

    #[test]
    fn test_round_trip_restores_net() {
        let mut session = unwrapped_cube();
        let id = session.nets()[0].id();
        session.reseed(id, 2).unwrap();
        session
            .set_paper(
                id,
                Some(PaperBinding {
                    transform: Transform2::from_translation(DVec2::new(5.0, 1.0)),
                }),
            )
            .unwrap();
        let mut project = Project::new(session);
        project.sphere_file = Some(PathBuf::from("sky.jpg"));
        let text = project.write();
        assert!(text.starts_with(PROJECT_HEADER));

        let back = Project::parse(&text, None, Some(shapes::cube())).unwrap();
        assert_eq!(back.sphere_file, Some(PathBuf::from("sky.jpg")));
        assert_eq!(back.basis, Basis::IDENTITY);
        let before = &project.unfolding.nets()[0];
        let after = &back.unfolding.nets()[0];
        assert_eq!(after.seed(), Some(2));
        assert_eq!(after.num_actual(), 6);
        assert_eq!(after.paper, before.paper);
        for original in before.actual_originals() {
            let m0 = before.face(before.actual_index(original).unwrap()).unwrap().matrix();
            let m1 = after.face(after.actual_index(original).unwrap()).unwrap().matrix();
            assert!(m0.abs_diff_eq(&m1, EPSILON), "face {original} moved");
            let h0 = before.face(before.actual_index(original).unwrap()).unwrap().hinge();
            let h1 = after.face(after.actual_index(original).unwrap()).unwrap().hinge();
            assert_eq!(h0.map(|h| h.edge), h1.map(|h| h.edge));
        }
    }

    #[test]
    fn test_lone_seeds_are_skipped() {
        let mut session = Unfolding::new(shapes::cube()).unwrap();
        session.establish_net(0).unwrap();
        let project = Project::new(session);
        assert!(!project.write().contains("\nnet"));
    }

    #[test]
    fn test_seams_and_partial_nets_survive() {
        let mut session = Unfolding::new(shapes::cube()).unwrap();
        let id = session.establish_net(0).unwrap();
        session.unwrap(id, Some(0), None).unwrap();
        let side = session.hedron().faces[0].adjacent[1].unwrap();
        let index = session.net(id).unwrap().actual_index(side).unwrap();
        let hinge = session.net(id).unwrap().face(index).unwrap().hinge().unwrap();
        session.pick_up(id, index, Some(hinge.edge)).unwrap();
        let project = Project::new(session);

        let back = Project::parse(&project.write(), None, Some(shapes::cube())).unwrap();
        let net = &back.unfolding.nets()[0];
        assert_eq!(net.num_actual(), 4);
        assert!(net.has_seam(0, side));
        assert_eq!(net.actual_index(side), None);
    }

    #[test]
    fn test_load_resolves_polyhedron_relative_to_project() {
        let dir = tempfile::tempdir().unwrap();
        io::save(&shapes::cube(), &dir.path().join("cube.off"), None, false).unwrap();
        let mut project = Project::new(unwrapped_cube());
        project.polyhedron_file = Some(PathBuf::from("cube.off"));
        let path = dir.path().join("cube.polyptych");
        project.save(&path).unwrap();

        let back = Project::load(&path).unwrap();
        assert_eq!(back.unfolding.hedron().faces.len(), 6);
        assert_eq!(back.unfolding.nets()[0].num_actual(), 6);
    }

    #[test]
    fn test_reads_saved_layout_with_info_and_comma_basis() {
        // lay out face 0 and the face across its edge 0 to get real matrices
        let mut session = Unfolding::new(shapes::cube()).unwrap();
        let id = session.establish_net(0).unwrap();
        session.unwrap(id, Some(0), Some(0)).unwrap();
        let side = session.hedron().faces[0].adjacent[0].unwrap();
        let net = session.net(id).unwrap();
        let child = net.face(net.actual_index(side).unwrap()).unwrap();
        let hinge = child.hinge().unwrap();
        let m0 = net.faces()[0].matrix().to_array().map(|x| x.to_string()).join(" ");
        let m1 = child.matrix().to_array().map(|x| x.to_string()).join(" ");

        let mut text = String::from(
            "polyhedronfile cube.off\n\
             basis\n  p 0,0,0\n  x 0,1,0\n  y -1,0,0\n  z 0,0,1\n\
             net\n  info 0\n  tabs no\n",
        );
        text.push_str(&format!("  face #0\n    original 0\n    matrix {m0}\n"));
        for (e, to) in session.hedron().faces[0].adjacent.iter().enumerate() {
            let to = to.unwrap();
            if e == 0 {
                text.push_str(&format!(
                    "    edge\n      toface 1.{}\n      tooriginal {to}\n      actual\n",
                    hinge.edge
                ));
            } else {
                text.push_str(&format!("    edge\n      tooriginal {to}\n"));
                text.push_str("      points \\\n        -.5 -.5\n        .5 -.5\n      potential\n");
            }
        }
        text.push_str(&format!("  face #1\n    original {side}\n    back\n    matrix {m1}\n"));
        for (e, to) in session.hedron().faces[side].adjacent.iter().enumerate() {
            let to = to.unwrap();
            let tag = if e == hinge.edge { "actual" } else { "potential" };
            text.push_str(&format!("    edge\n      tooriginal {to}.{e}\n      {tag}\n"));
        }

        let back = Project::parse(&text, None, Some(shapes::cube())).unwrap();
        assert_eq!(back.polyhedron_file, Some(PathBuf::from("cube.off")));
        assert_eq!(back.basis.x, DVec3::Y);
        assert_eq!(back.basis.y, -DVec3::X);
        let restored = &back.unfolding.nets()[0];
        assert_eq!(restored.seed(), Some(0));
        assert_eq!(restored.num_actual(), 2);
        let placed = restored.face(restored.actual_index(side).unwrap()).unwrap();
        assert!(placed.matrix().abs_diff_eq(&child.matrix(), EPSILON));
    }

    #[test]
    fn test_hinge_given_only_by_net_face() {
        let mut session = Unfolding::new(shapes::cube()).unwrap();
        let id = session.establish_net(0).unwrap();
        session.unwrap(id, Some(0), Some(2)).unwrap();
        let side = session.hedron().faces[0].adjacent[2].unwrap();
        let text = format!(
            "net\n  seed 0\n  face\n    original 0\n    edge\n    edge\n    edge\n      toface 1\n\
             \x20 face\n    original {side}\n"
        );
        let back = Project::parse(&text, None, Some(shapes::cube())).unwrap();
        let net = &back.unfolding.nets()[0];
        assert_eq!(net.num_actual(), 2);
        assert!(net.actual_index(side).is_some());
    }

    #[test]
    fn test_writes_info_and_comma_triples() {
        let text = Project::new(unwrapped_cube()).write();
        assert!(text.contains("\n  p 0,0,0\n"));
        assert!(text.contains("\n  info 0\n"));
        assert!(text.contains("\n    original 0\n"));
        assert!(!text.contains("seed"));
    }

    #[test]
    fn test_parse_errors() {
        let no_seed = "net\n  face\n    original 0\n";
        assert!(matches!(
            Project::parse(no_seed, None, Some(shapes::cube())),
            Err(NetError::Project { line: 1, .. })
        ));
        let no_original =
            format!("{PROJECT_HEADER}\nnet\n  info 0\n  face #0\n    matrix 1 0 0 1 0 0\n");
        assert!(matches!(
            Project::parse(&no_original, None, Some(shapes::cube())),
            Err(NetError::Project { line: 4, .. })
        ));
        let no_mesh = format!("{PROJECT_HEADER}\nspherefile a.jpg\n");
        assert!(matches!(
            Project::parse(&no_mesh, None, None),
            Err(NetError::Project { .. })
        ));
        let bad_link = format!(
            "{PROJECT_HEADER}\nnet\n  info 0\n  face\n    original 0\n\
             \x20   edge\n      tooriginal x\n"
        );
        assert!(matches!(
            Project::parse(&bad_link, None, Some(shapes::cube())),
            Err(NetError::Project { line: 7, .. })
        ));
    }
}
