//! A single net and its unwrap state machine.
//!
//! Every net face is a copy of one mesh face, placed in net space by a rigid
//! transform of the face's own flattened polygon. Actual faces form a tree
//! rooted at the seed: each non-seed actual face is hinged to exactly one
//! parent. Potential faces hang off actual faces along every edge that could
//! still be unfolded, so dropping one is only a tag change.
//!
//! Ownership of mesh faces follows the actual tag: a face is claimed by a net
//! exactly while it is actual there. Potential copies of faces claimed by some
//! other net are tagged [`FaceTag::Taken`].

use polyptych_hedron::{NetId, Ownership, Polyhedron};
use polyptych_math::{Bounds2, DVec2, Transform2};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::NetError;

/// Height of a neighbor's center above a face plane below which a hinge counts as flat.
const FLAT_EPSILON: f64 = 1e-9;

/// Placement state of a net face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaceTag {
    /// Laid down in the net.
    Actual,
    /// Hinged to an actual face, ready to be dropped.
    Potential,
    /// Hinged like a potential face, but the mesh face belongs to another net.
    Taken,
}

impl FaceTag {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            FaceTag::Actual => "actual",
            FaceTag::Potential => "potential",
            FaceTag::Taken => "taken",
        }
    }

    fn as_edge_tag(self) -> EdgeTag {
        match self {
            FaceTag::Actual => EdgeTag::Actual,
            FaceTag::Potential => EdgeTag::Potential,
            FaceTag::Taken => EdgeTag::Taken,
        }
    }
}

/// What lies across one edge of a net face, from the net's point of view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EdgeTag {
    /// Not worked out. Every non-hinge edge of a potential face.
    #[default]
    Undefined,
    /// Nothing can be attached: a mesh boundary, a mesh cut or a seam.
    None,
    /// Hinged to an actual face.
    Actual,
    /// Hinged to a potential face.
    Potential,
    /// Hinged to a face of another net (`toface` set), or the mesh face across
    /// is laid down elsewhere in this net (`toface` unset).
    Taken,
}

impl EdgeTag {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            EdgeTag::Undefined => "undefined",
            EdgeTag::None => "none",
            EdgeTag::Actual => "actual",
            EdgeTag::Potential => "potential",
            EdgeTag::Taken => "taken",
        }
    }
}

/// How an edge is drawn in the laid out net.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EdgeStyle {
    #[default]
    Unknown,
    /// Hinge between coplanar faces.
    Fold,
    /// Hinge that folds away from the printed side.
    FoldPeak,
    /// Hinge that folds toward the printed side.
    FoldValley,
    /// Outline edge where a face could still be attached.
    SoftCut,
    /// Outline edge that stays cut.
    HardCut,
}

impl EdgeStyle {
    #[must_use]
    pub fn is_fold(&self) -> bool {
        matches!(self, EdgeStyle::Fold | EdgeStyle::FoldPeak | EdgeStyle::FoldValley)
    }

    #[must_use]
    pub fn is_cut(&self) -> bool {
        matches!(self, EdgeStyle::SoftCut | EdgeStyle::HardCut)
    }
}

/// One side of a net face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetFaceEdge {
    pub tag: EdgeTag,
    /// Net face across this edge.
    pub toface: Option<usize>,
    /// Edge of `toface` shared with this one.
    pub tofaceedge: Option<usize>,
    /// Mesh face across this edge, `None` on a mesh boundary.
    pub tooriginal: Option<usize>,
    /// Edge of `tooriginal` shared with this one.
    pub tooriginal_edge: Option<usize>,
    /// Net-space end points.
    pub points: [DVec2; 2],
    pub style: EdgeStyle,
    /// The edge is a requested cut.
    pub seam: bool,
}

/// Attachment of a face to its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hinge {
    pub parent: usize,
    /// Edge of the parent.
    pub parent_edge: usize,
    /// Edge of the hinged face.
    pub edge: usize,
}

/// A placed copy of one mesh face.
#[derive(Clone, Debug, PartialEq)]
pub struct NetFace {
    pub original: usize,
    pub tag: FaceTag,
    pub edges: Vec<NetFaceEdge>,
    matrix: Transform2,
    local: Vec<DVec2>,
    hinge: Option<Hinge>,
}

impl NetFace {
    fn new(
        hedron: &Polyhedron,
        original: usize,
        tag: FaceTag,
        matrix: Transform2,
    ) -> Result<Self, NetError> {
        let local = hedron.face_polygon(original)?;
        let face = hedron.face(original)?;
        let edges = (0..face.len())
            .map(|e| NetFaceEdge {
                tooriginal: face.adjacent[e],
                tooriginal_edge: face.adjacent_edge[e],
                ..Default::default()
            })
            .collect();
        let mut net_face = Self {
            original,
            tag,
            edges,
            matrix,
            local,
            hinge: None,
        };
        net_face.refresh_points();
        Ok(net_face)
    }

    /// Transform from the face's own flattened coordinates to net space.
    #[must_use]
    pub fn matrix(&self) -> Transform2 {
        self.matrix
    }

    pub fn set_matrix(&mut self, matrix: Transform2) {
        self.matrix = matrix;
        self.refresh_points();
    }

    #[must_use]
    pub fn hinge(&self) -> Option<Hinge> {
        self.hinge
    }

    /// The face polygon in its own rest basis.
    #[must_use]
    pub fn local_polygon(&self) -> &[DVec2] {
        &self.local
    }

    /// The face polygon in net space.
    #[must_use]
    pub fn polygon(&self) -> Vec<DVec2> {
        self.local.iter().map(|&p| self.matrix.apply(p)).collect()
    }

    /// Which edge borders the given mesh face.
    #[must_use]
    pub fn edge_toward(&self, original: usize) -> Option<usize> {
        self.edges.iter().position(|e| e.tooriginal == Some(original))
    }

    fn refresh_points(&mut self) {
        let n = self.local.len();
        for (e, edge) in self.edges.iter_mut().enumerate() {
            edge.points = [
                self.matrix.apply(self.local[e]),
                self.matrix.apply(self.local[(e + 1) % n]),
            ];
        }
    }
}

/// One straight segment of the net outline or of a fold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetLine {
    pub points: [DVec2; 2],
    pub style: EdgeStyle,
    /// Net face and edge the line was taken from.
    pub face: usize,
    pub edge: usize,
}

/// Placement of a net on a sheet of paper.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaperBinding {
    /// Net space to paper space.
    pub transform: Transform2,
}

/// Transform placing a face whose local polygon is `child_local` across edge
/// `parent_edge` of `parent`, glued along its own edge `child_edge`.
///
/// The shared edge runs in opposite directions on the two faces, so the
/// child's edge start lands on the parent's edge end.
fn hinge_matrix(
    parent: &NetFace,
    parent_edge: usize,
    child_local: &[DVec2],
    child_edge: usize,
) -> Result<Transform2, polyptych_math::MathError> {
    let pn = parent.local.len();
    let a = parent.matrix.apply(parent.local[parent_edge % pn]);
    let b = parent.matrix.apply(parent.local[(parent_edge + 1) % pn]);
    let cn = child_local.len();
    let q0 = child_local[child_edge % cn];
    let q1 = child_local[(child_edge + 1) % cn];
    Transform2::rigid_edge_map(q0, q1, b, a)
}

fn seam_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

fn is_mesh_cut(hedron: &Polyhedron, face: usize, edge: usize) -> bool {
    let Some(f) = hedron.faces.get(face) else {
        return false;
    };
    if f.is_cut(edge) {
        return true;
    }
    match (f.adjacent.get(edge).copied().flatten(), f.adjacent_edge.get(edge).copied().flatten()) {
        (Some(g), Some(ge)) => hedron.faces.get(g).is_some_and(|other| other.is_cut(ge)),
        _ => false,
    }
}

/// Peak or valley, judged by which side of `face`'s plane the neighbor's center lies.
fn fold_style(hedron: &Polyhedron, face: usize, edge: usize) -> EdgeStyle {
    let Some(other) = hedron
        .faces
        .get(face)
        .and_then(|f| f.adjacent.get(edge).copied().flatten())
    else {
        return EdgeStyle::Fold;
    };
    let (Ok(basis), Ok(center)) = (hedron.basis_of_face(face), hedron.center_of_face(other, false))
    else {
        return EdgeStyle::Fold;
    };
    let height = (center - basis.p).dot(basis.z);
    if height < -FLAT_EPSILON {
        EdgeStyle::FoldPeak
    } else if height > FLAT_EPSILON {
        EdgeStyle::FoldValley
    } else {
        EdgeStyle::Fold
    }
}

/// An unfolding of a connected group of mesh faces.
#[derive(Clone, Debug)]
pub struct Net {
    id: NetId,
    seed: Option<usize>,
    faces: Vec<NetFace>,
    /// Mesh face to its actual net face.
    actual: FxHashMap<usize, usize>,
    /// Mesh face to its potential and taken copies, ascending.
    copies: FxHashMap<usize, Vec<usize>>,
    /// Undirected mesh face pairs never to be hinged.
    seams: FxHashSet<(usize, usize)>,
    lines: Vec<NetLine>,
    pub paper: Option<PaperBinding>,
}

// ----------------------------------------------------------------------------
// Queries
// ----------------------------------------------------------------------------

impl Net {
    #[must_use]
    pub fn new(id: NetId) -> Self {
        Self {
            id,
            seed: None,
            faces: Vec::new(),
            actual: FxHashMap::default(),
            copies: FxHashMap::default(),
            seams: FxHashSet::default(),
            lines: Vec::new(),
            paper: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> NetId {
        self.id
    }

    /// Mesh face the net is anchored at.
    #[must_use]
    pub fn seed(&self) -> Option<usize> {
        self.seed
    }

    #[must_use]
    pub fn faces(&self) -> &[NetFace] {
        &self.faces
    }

    pub fn face(&self, index: usize) -> Result<&NetFace, NetError> {
        self.faces.get(index).ok_or(NetError::InvalidNetFace(index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    #[must_use]
    pub fn num_actual(&self) -> usize {
        self.actual.len()
    }

    /// Net face index of the actual copy of a mesh face.
    #[must_use]
    pub fn actual_index(&self, original: usize) -> Option<usize> {
        self.actual.get(&original).copied()
    }

    /// Mesh faces laid down in this net, ascending.
    #[must_use]
    pub fn actual_originals(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self.actual.keys().copied().collect();
        out.sort_unstable();
        out
    }

    /// First net face at or after `start` that copies `original`, restricted
    /// to tag `want` when given.
    #[must_use]
    pub fn find_original_face(
        &self,
        original: usize,
        want: Option<FaceTag>,
        start: usize,
    ) -> Option<usize> {
        let actual = self
            .actual
            .get(&original)
            .copied()
            .filter(|&i| i >= start && want.is_none_or(|w| w == FaceTag::Actual));
        let copy = self.copies.get(&original).and_then(|list| {
            list.iter()
                .copied()
                .find(|&i| i >= start && want.is_none_or(|w| self.faces[i].tag == w))
        });
        match (actual, copy) {
            (Some(a), Some(c)) => Some(a.min(c)),
            (a, c) => a.or(c),
        }
    }

    /// Number of edges of a net face hinged to actual faces, not counting
    /// `exclude_edge`. A non-seed actual face with a count of one is a leaf.
    pub fn actual_link(
        &self,
        index: usize,
        exclude_edge: Option<usize>,
    ) -> Result<usize, NetError> {
        let face = self.face(index)?;
        Ok(face
            .edges
            .iter()
            .enumerate()
            .filter(|&(e, _)| Some(e) != exclude_edge)
            .filter(|(_, edge)| {
                edge.toface
                    .is_some_and(|t| self.faces.get(t).is_some_and(|f| f.tag == FaceTag::Actual))
            })
            .count())
    }

    /// The actual net face across an edge, if any.
    pub fn actual_neighbor(&self, index: usize, edge: usize) -> Result<Option<usize>, NetError> {
        let face = self.face(index)?;
        let e = face
            .edges
            .get(edge)
            .ok_or(NetError::InvalidEdge { face: index, edge })?;
        Ok(e.toface
            .filter(|&t| self.faces.get(t).is_some_and(|f| f.tag == FaceTag::Actual)))
    }

    pub fn face_polygon(&self, index: usize) -> Result<Vec<DVec2>, NetError> {
        Ok(self.face(index)?.polygon())
    }

    /// Bounds of the actual faces in net space.
    #[must_use]
    pub fn bounds(&self) -> Bounds2 {
        Bounds2::from_points(
            self.faces
                .iter()
                .filter(|f| f.tag == FaceTag::Actual)
                .flat_map(NetFace::polygon),
        )
    }

    #[must_use]
    pub fn lines(&self) -> &[NetLine] {
        &self.lines
    }

    #[must_use]
    pub fn has_seam(&self, a: usize, b: usize) -> bool {
        self.seams.contains(&seam_key(a, b))
    }

    /// Seams as ascending mesh face pairs.
    #[must_use]
    pub fn seams(&self) -> Vec<(usize, usize)> {
        let mut out: Vec<_> = self.seams.iter().copied().collect();
        out.sort_unstable();
        out
    }

    /// Forbid hinging the two mesh faces. Takes effect at the next refresh.
    pub fn add_seam(&mut self, a: usize, b: usize) {
        self.seams.insert(seam_key(a, b));
    }

    pub fn remove_seam(&mut self, a: usize, b: usize) -> bool {
        self.seams.remove(&seam_key(a, b))
    }

    /// Check the index maps and mesh ownership against the face list.
    pub fn validate(&self, hedron: &Polyhedron) -> Result<(), NetError> {
        let mut seen = FxHashSet::default();
        for (i, face) in self.faces.iter().enumerate() {
            if face.tag != FaceTag::Actual {
                continue;
            }
            if !seen.insert(face.original) {
                return Err(NetError::Inconsistent(format!(
                    "{}: face {} is actual twice",
                    self.id, face.original
                )));
            }
            if self.actual.get(&face.original) != Some(&i) {
                return Err(NetError::Inconsistent(format!(
                    "{}: index of face {} is stale",
                    self.id, face.original
                )));
            }
            let expected = if self.seed == Some(face.original) {
                Ownership::Seed(self.id)
            } else {
                Ownership::Member(self.id)
            };
            let found = hedron.ownership(face.original);
            if found != Some(expected) {
                return Err(NetError::Inconsistent(format!(
                    "{}: face {} is owned as {found:?}, expected {expected:?}",
                    self.id, face.original
                )));
            }
            if let Some(h) = face.hinge
                && self.faces.get(h.parent).is_none_or(|p| p.tag != FaceTag::Actual)
            {
                return Err(NetError::Inconsistent(format!(
                    "{}: face {} hangs off a face that is not actual",
                    self.id, face.original
                )));
            }
        }
        if seen.len() != self.actual.len() {
            return Err(NetError::Inconsistent(format!("{}: index has extra faces", self.id)));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Unwrap state machine
// ----------------------------------------------------------------------------

impl Net {
    /// Anchor an empty net at mesh face `seed`. Returns the seed's net face index.
    pub fn anchor(&mut self, hedron: &mut Polyhedron, seed: usize) -> Result<usize, NetError> {
        hedron.face(seed)?;
        if let Some(&index) = self.actual.get(&seed) {
            return Ok(index);
        }
        if let Some(existing) = self.seed {
            return Err(NetError::AlreadyAnchored {
                net: self.id,
                seed: existing,
            });
        }
        self.claim(hedron, seed, Ownership::Seed(self.id))?;
        let face = NetFace::new(hedron, seed, FaceTag::Actual, Transform2::IDENTITY)?;
        self.faces.clear();
        self.faces.push(face);
        self.seed = Some(seed);
        self.refresh(hedron)?;
        tracing::debug!(net = %self.id, seed, "anchored net");
        Ok(0)
    }

    /// Lay down faces. Returns the mesh faces newly placed.
    ///
    /// | `from` | `edge` | Effect |
    /// |--------|--------|--------|
    /// | `None` | `None` | [`Net::total_unwrap`] |
    /// | `None` | `Some(f)` | anchor at mesh face `f`, nothing if `f` is already placed |
    /// | potential face | any | drop that face |
    /// | actual face | `None` | drop every potential face hinged to it |
    /// | actual face | `Some(e)` | drop the face across edge `e`, reopening a seam if needed |
    pub fn unwrap(
        &mut self,
        hedron: &mut Polyhedron,
        from: Option<usize>,
        edge: Option<usize>,
    ) -> Result<Vec<usize>, NetError> {
        let Some(from) = from else {
            return match edge {
                None => self.total_unwrap(hedron),
                Some(seed) if self.actual.contains_key(&seed) => Ok(Vec::new()),
                Some(seed) => {
                    self.anchor(hedron, seed)?;
                    Ok(vec![seed])
                }
            };
        };
        let face = self.face(from)?;
        let original = face.original;
        match face.tag {
            FaceTag::Potential => return self.drop_face(hedron, from),
            FaceTag::Taken => return Err(self.claimed(hedron, original)),
            FaceTag::Actual => {}
        }

        let Some(e) = edge else {
            let mut placed = Vec::new();
            while let Some(target) = self.actual.get(&original).and_then(|&i| {
                self.faces[i]
                    .edges
                    .iter()
                    .find_map(|edge| {
                        (edge.tag == EdgeTag::Potential)
                            .then_some(edge.toface)
                            .flatten()
                    })
            }) {
                placed.extend(self.drop_face(hedron, target)?);
            }
            return Ok(placed);
        };

        let link = face
            .edges
            .get(e)
            .cloned()
            .ok_or(NetError::InvalidEdge { face: from, edge: e })?;
        match link.tag {
            EdgeTag::Actual => Ok(Vec::new()),
            EdgeTag::Potential => {
                let target = link.toface.ok_or(NetError::InvalidEdge { face: from, edge: e })?;
                self.drop_face(hedron, target)
            }
            EdgeTag::Taken => match (link.toface, link.tooriginal) {
                (Some(t), _) => Err(self.claimed(hedron, self.faces[t].original)),
                (None, Some(target)) => Err(NetError::AlreadyPlaced(target)),
                (None, None) => Err(NetError::Boundary { face: original, edge: e }),
            },
            EdgeTag::None | EdgeTag::Undefined => {
                let target = link
                    .tooriginal
                    .ok_or(NetError::Boundary { face: original, edge: e })?;
                if is_mesh_cut(hedron, original, e) {
                    return Err(NetError::Boundary { face: original, edge: e });
                }
                if self.actual.contains_key(&target) {
                    return Err(NetError::AlreadyPlaced(target));
                }
                self.remove_seam(original, target);
                self.refresh(hedron)?;
                let index = self
                    .actual
                    .get(&original)
                    .copied()
                    .ok_or(NetError::NotPlaced(original))?;
                let link = &self.faces[index].edges[e];
                match (link.tag, link.toface) {
                    (EdgeTag::Potential, Some(t)) => self.drop_face(hedron, t),
                    (EdgeTag::Taken, Some(_)) => Err(self.claimed(hedron, target)),
                    _ => Err(NetError::Boundary { face: original, edge: e }),
                }
            }
        }
    }

    /// Keep dropping the first potential face found, scanning actual faces in
    /// index order, until none remain. Anchors at mesh face 0 if the net is empty.
    pub fn total_unwrap(&mut self, hedron: &mut Polyhedron) -> Result<Vec<usize>, NetError> {
        let mut placed = Vec::new();
        if self.faces.is_empty() {
            let seed = 0;
            self.anchor(hedron, seed)?;
            placed.push(seed);
        }
        while let Some(target) = self.next_potential() {
            placed.extend(self.drop_face(hedron, target)?);
        }
        tracing::debug!(net = %self.id, placed = placed.len(), "total unwrap");
        Ok(placed)
    }

    /// Turn a potential face into an actual one, keeping its transform.
    /// Dropping an actual face does nothing.
    pub fn drop_face(
        &mut self,
        hedron: &mut Polyhedron,
        index: usize,
    ) -> Result<Vec<usize>, NetError> {
        let face = self.face(index)?;
        let original = face.original;
        match face.tag {
            FaceTag::Actual => return Ok(Vec::new()),
            FaceTag::Taken => return Err(self.claimed(hedron, original)),
            FaceTag::Potential => {}
        }
        if self.actual.contains_key(&original) {
            return Err(NetError::AlreadyPlaced(original));
        }
        let parent = face.hinge.map(|h| self.faces[h.parent].original);
        self.claim(hedron, original, Ownership::Member(self.id))?;
        self.faces[index].tag = FaceTag::Actual;
        if let Some(parent) = parent {
            self.remove_seam(parent, original);
        }
        self.reindex();
        self.refresh(hedron)?;
        tracing::debug!(net = %self.id, face = original, "dropped face");
        Ok(vec![original])
    }

    /// Fold an actual face back up, together with every face hinged
    /// (transitively) beyond it. The face stays behind as a potential face on
    /// its hinge; the faces beyond it are discarded. Every lifted mesh face is
    /// released. Returns the released mesh faces.
    ///
    /// With `cut_edge`, the mesh edge there becomes a seam. Cutting the hinge
    /// itself discards the face too.
    pub fn pick_up(
        &mut self,
        hedron: &mut Polyhedron,
        index: usize,
        cut_edge: Option<usize>,
    ) -> Result<Vec<usize>, NetError> {
        let face = self.face(index)?;
        if face.tag != FaceTag::Actual {
            return Err(NetError::NotActual(index));
        }
        let original = face.original;
        if self.seed == Some(original) {
            return Err(NetError::SeedPickUp(original));
        }
        let cut = match cut_edge {
            Some(e) => Some(
                face.edges
                    .get(e)
                    .ok_or(NetError::InvalidEdge { face: index, edge: e })?
                    .tooriginal,
            ),
            None => None,
        };

        let lifted = self.subtree(index);
        let mut released = vec![original];
        released.extend(lifted.iter().map(|&i| self.faces[i].original));
        for &face in &released {
            hedron.set_ownership(face, Ownership::Free)?;
        }
        self.faces[index].tag = FaceTag::Potential;
        if let Some(Some(target)) = cut {
            self.add_seam(original, target);
        }
        let doomed: FxHashSet<usize> = lifted.into_iter().collect();
        self.remove_faces(&doomed);
        self.refresh(hedron)?;
        tracing::debug!(
            net = %self.id,
            face = original,
            released = released.len(),
            "picked up face"
        );
        Ok(released)
    }

    /// Make mesh face `original` the seed by re-basing every transform so that
    /// it sits at the identity. The paper binding, if any, is adjusted so that
    /// nothing moves on paper. Reseeding at the current seed does nothing.
    pub fn reseed(
        &mut self,
        hedron: &mut Polyhedron,
        original: usize,
        epsilon: f64,
    ) -> Result<(), NetError> {
        let index = self
            .actual
            .get(&original)
            .copied()
            .ok_or(NetError::NotPlaced(original))?;
        if self.seed == Some(original) {
            return Ok(());
        }
        let anchor = self.faces[index].matrix;
        let rebase = anchor
            .inverse()
            .map_err(|source| NetError::Degenerate { face: original, source })?;
        for face in &mut self.faces {
            let mut matrix = face.matrix.then(&rebase);
            matrix.orthonormalize_if_drifted(epsilon);
            face.set_matrix(matrix);
        }
        if let Some(paper) = &mut self.paper {
            paper.transform = anchor.then(&paper.transform);
        }
        if let Some(old) = self.seed {
            hedron.set_ownership(old, Ownership::Member(self.id))?;
        }
        hedron.set_ownership(original, Ownership::Seed(self.id))?;
        self.reroot(index);
        self.seed = Some(original);
        self.rebuild_lines();
        tracing::debug!(net = %self.id, seed = original, "reseeded net");
        Ok(())
    }

    /// Remove a potential or taken net face, renumbering links. Potentials are
    /// not regenerated, so the face comes back at the next state change.
    pub fn delete_face(&mut self, hedron: &Polyhedron, index: usize) -> Result<(), NetError> {
        if self.face(index)?.tag == FaceTag::Actual {
            return Err(NetError::IsActual(index));
        }
        let doomed: FxHashSet<usize> = std::iter::once(index).collect();
        self.remove_faces(&doomed);
        self.retag(hedron);
        self.rebuild_lines();
        Ok(())
    }

    /// Release every mesh face this net claims and empty it.
    pub fn release(&mut self, hedron: &mut Polyhedron) -> Result<(), NetError> {
        for face in &self.faces {
            if face.tag == FaceTag::Actual
                && hedron.ownership(face.original).and_then(|o| o.net()) == Some(self.id)
            {
                hedron.set_ownership(face.original, Ownership::Free)?;
            }
        }
        self.faces.clear();
        self.lines.clear();
        self.seed = None;
        self.reindex();
        Ok(())
    }

    /// Replace the transforms of actual faces by mesh face, then re-hinge
    /// every potential face to its parent.
    pub fn override_matrices(
        &mut self,
        hedron: &Polyhedron,
        matrices: &FxHashMap<usize, Transform2>,
    ) -> Result<(), NetError> {
        for face in &mut self.faces {
            if face.tag == FaceTag::Actual
                && let Some(&m) = matrices.get(&face.original)
            {
                face.set_matrix(m);
            }
        }
        for i in 0..self.faces.len() {
            if self.faces[i].tag == FaceTag::Actual {
                continue;
            }
            let Some(h) = self.faces[i].hinge else { continue };
            let parent = &self.faces[h.parent];
            let matrix = hinge_matrix(parent, h.parent_edge, &self.faces[i].local, h.edge)
                .map_err(|source| NetError::Degenerate {
                    face: self.faces[i].original,
                    source,
                })?;
            self.faces[i].set_matrix(matrix);
        }
        self.retag(hedron);
        self.rebuild_lines();
        Ok(())
    }

    /// Bring potential faces, tags and lines up to date with the actual faces,
    /// the seams and the ownership recorded on the mesh.
    pub fn refresh(&mut self, hedron: &Polyhedron) -> Result<(), NetError> {
        self.retag_copies(hedron);
        self.prune_copies();
        self.add_potentials(hedron)?;
        self.retag(hedron);
        self.rebuild_lines();
        Ok(())
    }

    /// One line per edge of every actual face, hinges counted once.
    pub fn rebuild_lines(&mut self) {
        self.lines.clear();
        for (i, face) in self.faces.iter().enumerate() {
            if face.tag != FaceTag::Actual {
                continue;
            }
            for (e, edge) in face.edges.iter().enumerate() {
                if edge.tag == EdgeTag::Actual && edge.toface.is_some_and(|t| t < i) {
                    continue;
                }
                self.lines.push(NetLine {
                    points: edge.points,
                    style: edge.style,
                    face: i,
                    edge: e,
                });
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Internals
// ----------------------------------------------------------------------------

impl Net {
    fn claimed(&self, hedron: &Polyhedron, original: usize) -> NetError {
        match hedron.ownership(original).and_then(|o| o.net()) {
            Some(owner) if owner != self.id => NetError::FaceClaimed {
                face: original,
                owner,
            },
            _ => NetError::AlreadyPlaced(original),
        }
    }

    fn claim(
        &self,
        hedron: &mut Polyhedron,
        face: usize,
        ownership: Ownership,
    ) -> Result<(), NetError> {
        if let Some(owner) = hedron.ownership(face).and_then(|o| o.net())
            && owner != self.id
        {
            return Err(NetError::FaceClaimed { face, owner });
        }
        hedron.set_ownership(face, ownership)?;
        Ok(())
    }

    fn copy_tag(&self, hedron: &Polyhedron, original: usize) -> FaceTag {
        match hedron.ownership(original).and_then(|o| o.net()) {
            Some(owner) if owner != self.id => FaceTag::Taken,
            _ => FaceTag::Potential,
        }
    }

    fn next_potential(&self) -> Option<usize> {
        self.faces
            .iter()
            .filter(|f| f.tag == FaceTag::Actual)
            .flat_map(|f| f.edges.iter())
            .find_map(|edge| (edge.tag == EdgeTag::Potential).then_some(edge.toface).flatten())
    }

    /// Actual faces hinged beyond `root`, excluding `root`.
    fn subtree(&self, root: usize) -> Vec<usize> {
        let mut children: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for (i, face) in self.faces.iter().enumerate() {
            if face.tag == FaceTag::Actual
                && let Some(h) = face.hinge
            {
                children.entry(h.parent).or_default().push(i);
            }
        }
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            if let Some(kids) = children.get(&i) {
                out.extend_from_slice(kids);
                stack.extend_from_slice(kids);
            }
        }
        out
    }

    /// Reverse the hinges on the path from `index` to the root.
    fn reroot(&mut self, index: usize) {
        let mut path = vec![index];
        let mut hinges = Vec::new();
        let mut current = index;
        while let Some(h) = self.faces[current].hinge {
            if path.len() > self.faces.len() {
                break;
            }
            hinges.push(h);
            current = h.parent;
            path.push(current);
        }
        self.faces[index].hinge = None;
        for (j, h) in hinges.iter().enumerate() {
            self.faces[path[j + 1]].hinge = Some(Hinge {
                parent: path[j],
                parent_edge: h.edge,
                edge: h.parent_edge,
            });
        }
    }

    fn reindex(&mut self) {
        self.actual.clear();
        self.copies.clear();
        for (i, face) in self.faces.iter().enumerate() {
            match face.tag {
                FaceTag::Actual => {
                    self.actual.insert(face.original, i);
                }
                FaceTag::Potential | FaceTag::Taken => {
                    self.copies.entry(face.original).or_default().push(i);
                }
            }
        }
    }

    fn remove_faces(&mut self, doomed: &FxHashSet<usize>) {
        if doomed.is_empty() {
            return;
        }
        let mut remap = vec![None; self.faces.len()];
        let mut next = 0;
        for (i, slot) in remap.iter_mut().enumerate() {
            if !doomed.contains(&i) {
                *slot = Some(next);
                next += 1;
            }
        }
        let old = std::mem::take(&mut self.faces);
        self.faces = old
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !doomed.contains(i))
            .map(|(_, mut face)| {
                face.hinge = face
                    .hinge
                    .and_then(|h| remap[h.parent].map(|parent| Hinge { parent, ..h }));
                for edge in &mut face.edges {
                    edge.toface = edge.toface.and_then(|t| remap[t]);
                    if edge.toface.is_none() {
                        edge.tofaceedge = None;
                    }
                }
                face
            })
            .collect();
        self.reindex();
    }

    fn retag_copies(&mut self, hedron: &Polyhedron) {
        for i in 0..self.faces.len() {
            if self.faces[i].tag != FaceTag::Actual {
                self.faces[i].tag = self.copy_tag(hedron, self.faces[i].original);
            }
        }
        self.reindex();
    }

    /// Drop copies that no longer hang off an actual face, copies of faces now
    /// actual here, copies across seams, and duplicates on one parent edge.
    fn prune_copies(&mut self) {
        let mut occupied = FxHashSet::default();
        let doomed: FxHashSet<usize> = (0..self.faces.len())
            .filter(|&i| {
                let face = &self.faces[i];
                if face.tag == FaceTag::Actual {
                    return false;
                }
                let Some(h) = face.hinge else { return true };
                let Some(parent) = self.faces.get(h.parent) else {
                    return true;
                };
                parent.tag != FaceTag::Actual
                    || self.actual.contains_key(&face.original)
                    || self.has_seam(parent.original, face.original)
                    || !occupied.insert((h.parent, h.parent_edge))
            })
            .collect();
        self.remove_faces(&doomed);
    }

    fn add_potentials(&mut self, hedron: &Polyhedron) -> Result<(), NetError> {
        let mut hinged: FxHashSet<(usize, usize)> = FxHashSet::default();
        for face in &self.faces {
            if let Some(h) = face.hinge {
                hinged.insert((h.parent, h.parent_edge));
            }
        }
        for i in 0..self.faces.len() {
            if self.faces[i].tag != FaceTag::Actual {
                continue;
            }
            let original = self.faces[i].original;
            let own_hinge = self.faces[i].hinge.map(|h| h.edge);
            for e in 0..self.faces[i].edges.len() {
                if own_hinge == Some(e) || hinged.contains(&(i, e)) {
                    continue;
                }
                let edge = &self.faces[i].edges[e];
                let (Some(target), Some(target_edge)) = (edge.tooriginal, edge.tooriginal_edge)
                else {
                    continue;
                };
                if is_mesh_cut(hedron, original, e)
                    || self.has_seam(original, target)
                    || self.actual.contains_key(&target)
                {
                    continue;
                }
                let tag = self.copy_tag(hedron, target);
                let mut copy = NetFace::new(hedron, target, tag, Transform2::IDENTITY)?;
                let matrix = hinge_matrix(&self.faces[i], e, &copy.local, target_edge)
                    .map_err(|source| NetError::Degenerate { face: target, source })?;
                copy.set_matrix(matrix);
                copy.hinge = Some(Hinge {
                    parent: i,
                    parent_edge: e,
                    edge: target_edge,
                });
                hinged.insert((i, e));
                self.copies.entry(target).or_default().push(self.faces.len());
                self.faces.push(copy);
            }
        }
        Ok(())
    }

    /// Recompute every edge link, tag, seam flag and style from the hinges.
    fn retag(&mut self, hedron: &Polyhedron) {
        self.reindex();
        let seams = &self.seams;
        for face in &mut self.faces {
            let original = face.original;
            for edge in &mut face.edges {
                edge.tag = EdgeTag::Undefined;
                edge.toface = None;
                edge.tofaceedge = None;
                edge.style = EdgeStyle::Unknown;
                edge.seam = edge
                    .tooriginal
                    .is_some_and(|t| seams.contains(&seam_key(original, t)));
            }
        }
        for i in 0..self.faces.len() {
            let Some(h) = self.faces[i].hinge else { continue };
            let child_tag = self.faces[i].tag.as_edge_tag();
            let parent_tag = self.faces[h.parent].tag.as_edge_tag();
            let own = &mut self.faces[i].edges[h.edge];
            own.tag = parent_tag;
            own.toface = Some(h.parent);
            own.tofaceedge = Some(h.parent_edge);
            let theirs = &mut self.faces[h.parent].edges[h.parent_edge];
            theirs.tag = child_tag;
            theirs.toface = Some(i);
            theirs.tofaceedge = Some(h.edge);
        }
        let actual = &self.actual;
        for face in &mut self.faces {
            if face.tag != FaceTag::Actual {
                continue;
            }
            let original = face.original;
            for (e, edge) in face.edges.iter_mut().enumerate() {
                if edge.tag == EdgeTag::Undefined {
                    edge.tag = match edge.tooriginal {
                        None => EdgeTag::None,
                        Some(_) if edge.seam || is_mesh_cut(hedron, original, e) => EdgeTag::None,
                        Some(t) if actual.contains_key(&t) => EdgeTag::Taken,
                        Some(_) => EdgeTag::Undefined,
                    };
                }
                edge.style = match (edge.tag, edge.toface) {
                    (EdgeTag::Actual, _) => fold_style(hedron, original, e),
                    (EdgeTag::Potential, _) | (EdgeTag::Taken, Some(_)) => EdgeStyle::SoftCut,
                    _ => EdgeStyle::HardCut,
                };
            }
        }
    }
}
