//! The polyhedron mesh: vertices, faces, derived edges, and face adjacency.

use std::f64::consts::PI;

use polyptych_math::{Basis, DVec2, DVec3};
use rustc_hash::FxHashMap;

use crate::error::HedronError;
use crate::ownership::Ownership;

/// Per-face cache: current positions, their 2D projection, and net ownership.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtraFace {
    /// Current 3D vertex positions. Equal to the mesh positions while the face
    /// sits on the hedron; moved into the net plane by a remap.
    pub points3d: Vec<DVec3>,
    /// Current 2D positions in net (or face-local) coordinates.
    pub points2d: Vec<DVec2>,
    pub center: DVec3,
    /// The face's rest basis.
    pub axis: Basis,
    pub ownership: Ownership,
}

/// A planar polygonal face.
///
/// Edge `e` runs from `vertices[e]` to `vertices[(e + 1) % n]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Face {
    pub vertices: Vec<usize>,
    /// Face across each edge, `None` on a boundary.
    pub adjacent: Vec<Option<usize>>,
    /// Which edge of the adjacent face is shared.
    pub adjacent_edge: Vec<Option<usize>>,
    /// Interior dihedral angle across each edge, in radians.
    pub dihedral: Vec<Option<f64>>,
    /// Edges marked as cuts in the mesh itself. Nets never unfold across them.
    pub cuts: Vec<bool>,
    pub set_id: Option<usize>,
    pub plane_id: Option<usize>,
    pub group_id: Option<usize>,
    pub cache: ExtraFace,
}

impl Face {
    #[must_use]
    pub fn new(vertices: Vec<usize>) -> Self {
        let n = vertices.len();
        Self {
            vertices,
            adjacent: vec![None; n],
            adjacent_edge: vec![None; n],
            dihedral: vec![None; n],
            cuts: vec![false; n],
            ..Default::default()
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertex indices at the two ends of edge `e`.
    #[must_use]
    pub fn edge(&self, e: usize) -> (usize, usize) {
        let n = self.vertices.len();
        (self.vertices[e % n], self.vertices[(e + 1) % n])
    }

    #[must_use]
    pub fn is_cut(&self, e: usize) -> bool {
        self.cuts.get(e).copied().unwrap_or(false)
    }

    fn reset_links(&mut self) {
        let n = self.vertices.len();
        self.adjacent = vec![None; n];
        self.adjacent_edge = vec![None; n];
        self.dihedral = vec![None; n];
        self.cuts.resize(n, false);
    }
}

/// An edge derived from face adjacency. `faces[0]` is always present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub vertices: [usize; 2],
    pub faces: [Option<usize>; 2],
}

/// A named group of faces with a display color.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaceSet {
    pub name: String,
    pub on: bool,
    pub color: [u8; 4],
    pub faces: Vec<usize>,
}

/// A closed polygonal mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polyhedron {
    pub name: Option<String>,
    pub vertices: Vec<DVec3>,
    pub faces: Vec<Face>,
    pub edges: Vec<Edge>,
    pub sets: Vec<FaceSet>,
    pub planes: Vec<Basis>,
}

// ----------------------------------------------------------------------------
// Construction
// ----------------------------------------------------------------------------

impl Polyhedron {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn add_point(&mut self, p: DVec3) -> usize {
        self.vertices.push(p);
        self.vertices.len() - 1
    }

    /// Append a face. Every index must refer to an existing vertex.
    pub fn add_face(&mut self, vertices: &[usize]) -> Result<usize, HedronError> {
        let face = self.faces.len();
        if vertices.len() < 3 {
            return Err(HedronError::TooFewVertices {
                face,
                count: vertices.len(),
            });
        }
        if let Some(&vertex) = vertices.iter().find(|&&v| v >= self.vertices.len()) {
            return Err(HedronError::VertexOutOfRange {
                face,
                vertex,
                count: self.vertices.len(),
            });
        }
        self.faces.push(Face::new(vertices.to_vec()));
        Ok(face)
    }

    /// Link every face to its neighbours across shared edges.
    ///
    /// Shared edges are expected to run in opposite directions on the two
    /// faces. Same-direction sharing is linked anyway but logged, since any
    /// unfolding across it will mirror.
    pub fn connect_faces(&mut self) -> Result<(), HedronError> {
        let mut by_edge: FxHashMap<(usize, usize), Vec<(usize, usize)>> = FxHashMap::default();
        for (fi, face) in self.faces.iter().enumerate() {
            for e in 0..face.len() {
                let (a, b) = face.edge(e);
                by_edge.entry((a.min(b), a.max(b))).or_default().push((fi, e));
            }
        }

        let mut links: Vec<Vec<Option<(usize, usize)>>> =
            self.faces.iter().map(|f| vec![None; f.len()]).collect();
        let mut shared: FxHashMap<(usize, usize), usize> = FxHashMap::default();

        for (fi, face) in self.faces.iter().enumerate() {
            for e in 0..face.len() {
                let (a, b) = face.edge(e);
                let key = (a.min(b), a.max(b));
                let users = &by_edge[&key];
                match users.len() {
                    1 => continue,
                    2 => {}
                    count => {
                        return Err(HedronError::NonManifoldEdge {
                            v0: key.0,
                            v1: key.1,
                            count,
                        });
                    }
                }
                let Some(&(g, ge)) = users.iter().find(|&&(f, fe)| (f, fe) != (fi, e)) else {
                    continue;
                };
                if g == fi {
                    return Err(HedronError::MultipleSharedEdges { a: fi, b: fi });
                }
                if self.faces[g].edge(ge) == (a, b) {
                    tracing::warn!(
                        face = fi,
                        other = g,
                        "shared edge {a}-{b} has the same winding on both faces"
                    );
                }
                links[fi][e] = Some((g, ge));
                if fi < g {
                    let count = shared.entry((fi, g)).or_default();
                    *count += 1;
                    if *count > 1 {
                        return Err(HedronError::MultipleSharedEdges { a: fi, b: g });
                    }
                }
            }
        }

        let normals: Vec<Option<DVec3>> = (0..self.faces.len())
            .map(|i| self.basis_of_face(i).ok().map(|b| b.z))
            .collect();

        for (fi, face) in self.faces.iter_mut().enumerate() {
            face.reset_links();
            for (e, link) in links[fi].iter().enumerate() {
                let Some((g, ge)) = *link else { continue };
                face.adjacent[e] = Some(g);
                face.adjacent_edge[e] = Some(ge);
                if let (Some(n0), Some(n1)) = (normals[fi], normals[g]) {
                    face.dihedral[e] = Some(PI - n0.dot(n1).clamp(-1.0, 1.0).acos());
                }
            }
        }
        Ok(())
    }

    /// Derive the deduplicated edge list from face adjacency.
    pub fn make_edges(&mut self) {
        self.edges.clear();
        for (fi, face) in self.faces.iter().enumerate() {
            for e in 0..face.len() {
                let other = face.adjacent.get(e).copied().flatten();
                if matches!(other, Some(g) if g <= fi) {
                    continue;
                }
                let (a, b) = face.edge(e);
                self.edges.push(Edge {
                    vertices: [a, b],
                    faces: [Some(fi), other],
                });
            }
        }
    }

    /// Reset every face cache to the identity unfolding: positions straight
    /// from the mesh, flattened against the face's own basis, owned by no net.
    pub fn build_extra(&mut self) -> Result<(), HedronError> {
        for fi in 0..self.faces.len() {
            let axis = self.basis_of_face(fi)?;
            let points3d: Vec<DVec3> = self.faces[fi]
                .vertices
                .iter()
                .map(|&v| self.vertices[v])
                .collect();
            let points2d = points3d.iter().map(|&p| axis.flatten(p)).collect();
            let center = points3d.iter().copied().sum::<DVec3>() / points3d.len() as f64;
            self.faces[fi].cache = ExtraFace {
                points3d,
                points2d,
                center,
                axis,
                ownership: Ownership::Free,
            };
        }
        Ok(())
    }

    /// Apply set membership to each face's `set_id`.
    pub fn apply_sets(&mut self) {
        for (si, set) in self.sets.iter().enumerate() {
            for &f in &set.faces {
                if let Some(face) = self.faces.get_mut(f) {
                    face.set_id = Some(si);
                }
            }
        }
    }

    /// Connect, derive edges, apply sets, build caches, and validate.
    pub fn finalize(&mut self) -> Result<(), HedronError> {
        self.connect_faces()?;
        self.make_edges();
        self.apply_sets();
        self.build_extra()?;
        self.validate()
    }

    /// Merge vertices closer than `epsilon` and drop faces that collapse to
    /// fewer than three vertices. Returns how many vertices were removed.
    ///
    /// Adjacency is reset; call [`Polyhedron::finalize`] afterwards.
    pub fn collapse_vertices(&mut self, epsilon: f64) -> usize {
        let mut kept: Vec<DVec3> = Vec::with_capacity(self.vertices.len());
        let remap: Vec<usize> = self
            .vertices
            .iter()
            .map(|&p| match kept.iter().position(|q| q.distance(p) <= epsilon) {
                Some(k) => k,
                None => {
                    kept.push(p);
                    kept.len() - 1
                }
            })
            .collect();
        let removed = self.vertices.len() - kept.len();

        let mut face_remap = vec![None; self.faces.len()];
        let mut faces = Vec::with_capacity(self.faces.len());
        for (fi, face) in self.faces.iter().enumerate() {
            let mut vs: Vec<usize> = face.vertices.iter().map(|&v| remap[v]).collect();
            vs.dedup();
            while vs.len() > 1 && vs.first() == vs.last() {
                vs.pop();
            }
            if vs.len() < 3 {
                continue;
            }
            face_remap[fi] = Some(faces.len());
            let same_edges = vs.len() == face.len();
            let mut nf = Face::new(vs);
            if same_edges {
                nf.cuts.clone_from(&face.cuts);
            }
            nf.set_id = face.set_id;
            nf.plane_id = face.plane_id;
            nf.group_id = face.group_id;
            faces.push(nf);
        }
        for set in &mut self.sets {
            set.faces = set
                .faces
                .iter()
                .filter_map(|&f| face_remap.get(f).copied().flatten())
                .collect();
        }

        tracing::debug!(
            removed,
            dropped_faces = self.faces.len() - faces.len(),
            "collapsed vertices"
        );
        self.vertices = kept;
        self.faces = faces;
        self.edges.clear();
        removed
    }
}

// ----------------------------------------------------------------------------
// Queries
// ----------------------------------------------------------------------------

impl Polyhedron {
    pub fn face(&self, face: usize) -> Result<&Face, HedronError> {
        self.faces.get(face).ok_or(HedronError::InvalidFace(face))
    }

    /// A mesh is valid when every face has at least three in-range vertices and
    /// adjacency is symmetric.
    pub fn validate(&self) -> Result<(), HedronError> {
        for (fi, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(HedronError::TooFewVertices {
                    face: fi,
                    count: face.len(),
                });
            }
            if let Some(&vertex) = face.vertices.iter().find(|&&v| v >= self.vertices.len()) {
                return Err(HedronError::VertexOutOfRange {
                    face: fi,
                    vertex,
                    count: self.vertices.len(),
                });
            }
            for (e, adj) in face.adjacent.iter().enumerate() {
                let Some(g) = *adj else { continue };
                let other = self.faces.get(g).ok_or(HedronError::InvalidFace(g))?;
                if !other.adjacent.contains(&Some(fi)) {
                    return Err(HedronError::AsymmetricAdjacency {
                        face: fi,
                        edge: e,
                        other: g,
                    });
                }
            }
        }
        Ok(())
    }

    /// Orthonormal basis of a face: origin at vertex 0, x toward vertex 1, y
    /// in the plane of vertices 0, 1 and the last vertex, z the outward normal.
    pub fn basis_of_face(&self, face: usize) -> Result<Basis, HedronError> {
        let f = self.face(face)?;
        if f.len() < 3 {
            return Err(HedronError::TooFewVertices {
                face,
                count: f.len(),
            });
        }
        let point = |i: usize| -> Result<DVec3, HedronError> {
            let v = f.vertices[i];
            self.vertices
                .get(v)
                .copied()
                .ok_or(HedronError::VertexOutOfRange {
                    face,
                    vertex: v,
                    count: self.vertices.len(),
                })
        };
        Basis::from_points(point(0)?, point(1)?, point(f.len() - 1)?)
            .map_err(|source| HedronError::DegenerateGeometry { face, source })
    }

    /// Position of a face's `local`-th vertex, from the cache when `use_cache`
    /// is set and the cache is populated.
    pub fn vertex_of_face(
        &self,
        face: usize,
        local: usize,
        use_cache: bool,
    ) -> Result<DVec3, HedronError> {
        let f = self.face(face)?;
        if local >= f.len() {
            return Err(HedronError::VertexOutOfRange {
                face,
                vertex: local,
                count: f.len(),
            });
        }
        if use_cache && f.cache.points3d.len() == f.len() {
            return Ok(f.cache.points3d[local]);
        }
        self.vertices
            .get(f.vertices[local])
            .copied()
            .ok_or(HedronError::VertexOutOfRange {
                face,
                vertex: f.vertices[local],
                count: self.vertices.len(),
            })
    }

    /// Vertex average of a face.
    pub fn center_of_face(&self, face: usize, use_cache: bool) -> Result<DVec3, HedronError> {
        let n = self.face(face)?.len();
        let mut sum = DVec3::ZERO;
        for i in 0..n {
            sum += self.vertex_of_face(face, i, use_cache)?;
        }
        Ok(sum / n as f64)
    }

    /// The face flattened into its own basis.
    pub fn face_polygon(&self, face: usize) -> Result<Vec<DVec2>, HedronError> {
        let basis = self.basis_of_face(face)?;
        let f = self.face(face)?;
        Ok(f.vertices.iter().map(|&v| basis.flatten(self.vertices[v])).collect())
    }

    /// Which edge of `face` borders `other`.
    #[must_use]
    pub fn edge_toward(&self, face: usize, other: usize) -> Option<usize> {
        self.faces
            .get(face)?
            .adjacent
            .iter()
            .position(|&a| a == Some(other))
    }

    /// Interior dihedral angle between two adjacent faces.
    #[must_use]
    pub fn dihedral(&self, a: usize, b: usize) -> Option<f64> {
        let e = self.edge_toward(a, b)?;
        self.faces[a].dihedral.get(e).copied().flatten()
    }

    /// Distance between two vertices.
    #[must_use]
    pub fn vertex_distance(&self, a: usize, b: usize) -> Option<f64> {
        Some(self.vertices.get(a)?.distance(*self.vertices.get(b)?))
    }

    /// Length of edge `e` of `face`.
    pub fn edge_length(&self, face: usize, e: usize) -> Result<f64, HedronError> {
        let f = self.face(face)?;
        let (a, b) = f.edge(e);
        self.vertex_distance(a, b).ok_or(HedronError::VertexOutOfRange {
            face,
            vertex: a.max(b),
            count: self.vertices.len(),
        })
    }

    #[must_use]
    pub fn ownership(&self, face: usize) -> Option<Ownership> {
        self.faces.get(face).map(|f| f.cache.ownership)
    }

    pub fn set_ownership(&mut self, face: usize, ownership: Ownership) -> Result<(), HedronError> {
        let f = self.faces.get_mut(face).ok_or(HedronError::InvalidFace(face))?;
        f.cache.ownership = ownership;
        Ok(())
    }
}
