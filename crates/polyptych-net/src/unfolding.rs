//! The editing session: one polyhedron and every net built on it.

use polyptych_hedron::{NetId, Ownership, Polyhedron};
use polyptych_math::{DVec3, Transform2};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::NetError;
use crate::net::{EdgeTag, FaceTag, Net, PaperBinding};

/// Drift allowed in a face transform before it is re-orthonormalized.
const DEFAULT_ORTHONORMAL_EPSILON: f64 = 1e-9;

/// A polyhedron together with the nets unfolding it.
///
/// Every mutation goes through here so that the ownership recorded on the
/// mesh and the potential faces of every other net stay in step.
#[derive(Clone, Debug)]
pub struct Unfolding {
    hedron: Polyhedron,
    nets: Vec<Net>,
    next_id: u32,
    orthonormal_epsilon: f64,
}

impl Unfolding {
    /// Start a session. Face caches are reset, so no face is claimed.
    pub fn new(mut hedron: Polyhedron) -> Result<Self, NetError> {
        hedron.build_extra()?;
        Ok(Self {
            hedron,
            nets: Vec::new(),
            next_id: 1,
            orthonormal_epsilon: DEFAULT_ORTHONORMAL_EPSILON,
        })
    }

    #[must_use]
    pub fn with_orthonormal_epsilon(mut self, epsilon: f64) -> Self {
        self.set_orthonormal_epsilon(epsilon);
        self
    }

    /// Drift allowed in a reseeded matrix before it is orthonormalized again.
    pub fn set_orthonormal_epsilon(&mut self, epsilon: f64) {
        self.orthonormal_epsilon = epsilon;
    }

    #[must_use]
    pub fn orthonormal_epsilon(&self) -> f64 {
        self.orthonormal_epsilon
    }

    #[must_use]
    pub fn hedron(&self) -> &Polyhedron {
        &self.hedron
    }

    #[must_use]
    pub fn into_hedron(self) -> Polyhedron {
        self.hedron
    }

    #[must_use]
    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    #[must_use]
    pub fn net(&self, id: NetId) -> Option<&Net> {
        self.nets.iter().find(|n| n.id() == id)
    }

    #[must_use]
    pub fn face_owner(&self, face: usize) -> Option<Ownership> {
        self.hedron.ownership(face)
    }

    /// Net claiming a mesh face.
    #[must_use]
    pub fn net_of_face(&self, face: usize) -> Option<NetId> {
        self.hedron.ownership(face).and_then(|o| o.net())
    }

    fn index_of(&self, id: NetId) -> Result<usize, NetError> {
        self.nets
            .iter()
            .position(|n| n.id() == id)
            .ok_or(NetError::InvalidNet(id))
    }

    pub(crate) fn net_mut(&mut self, id: NetId) -> Result<&mut Net, NetError> {
        let index = self.index_of(id)?;
        Ok(&mut self.nets[index])
    }

    pub(crate) fn override_matrices(
        &mut self,
        id: NetId,
        matrices: &FxHashMap<usize, Transform2>,
    ) -> Result<(), NetError> {
        let index = self.index_of(id)?;
        self.nets[index].override_matrices(&self.hedron, matrices)
    }

    /// Run `f` on one net, then bring every other net up to date with the
    /// ownership changes it made. Other nets are refreshed even when `f` fails.
    fn with_net<T>(
        &mut self,
        id: NetId,
        f: impl FnOnce(&mut Net, &mut Polyhedron) -> Result<T, NetError>,
    ) -> Result<T, NetError> {
        let index = self.index_of(id)?;
        let result = f(&mut self.nets[index], &mut self.hedron);
        let refreshed = self.refresh_others(Some(index));
        let value = result?;
        refreshed?;
        Ok(value)
    }

    fn refresh_others(&mut self, except: Option<usize>) -> Result<(), NetError> {
        for (i, net) in self.nets.iter_mut().enumerate() {
            if Some(i) != except {
                net.refresh(&self.hedron)?;
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Net lifecycle
// ----------------------------------------------------------------------------

impl Unfolding {
    /// Create a net anchored at a free mesh face.
    pub fn establish_net(&mut self, seed: usize) -> Result<NetId, NetError> {
        self.hedron.face(seed)?;
        if let Some(owner) = self.net_of_face(seed) {
            return Err(NetError::FaceClaimed { face: seed, owner });
        }
        let id = NetId(self.next_id);
        self.next_id += 1;
        let mut net = Net::new(id);
        net.anchor(&mut self.hedron, seed)?;
        self.nets.push(net);
        self.refresh_others(Some(self.nets.len() - 1))?;
        tracing::debug!(net = %id, seed, "established net");
        Ok(id)
    }

    /// Discard a net, releasing every face it claims.
    pub fn remove_net(&mut self, id: NetId) -> Result<Net, NetError> {
        let index = self.index_of(id)?;
        let mut net = self.nets.remove(index);
        let snapshot = net.clone();
        net.release(&mut self.hedron)?;
        self.refresh_others(None)?;
        tracing::debug!(net = %id, "removed net");
        Ok(snapshot)
    }

    /// See [`Net::unwrap`].
    pub fn unwrap(
        &mut self,
        id: NetId,
        from: Option<usize>,
        edge: Option<usize>,
    ) -> Result<Vec<usize>, NetError> {
        self.with_net(id, |net, hedron| net.unwrap(hedron, from, edge))
    }

    /// Unwrap everything reachable. Faces claimed by other nets stay where they are.
    pub fn total_unwrap(&mut self, id: NetId) -> Result<Vec<usize>, NetError> {
        self.with_net(id, |net, hedron| net.total_unwrap(hedron))
    }

    /// See [`Net::pick_up`].
    pub fn pick_up(
        &mut self,
        id: NetId,
        netface: usize,
        cut_edge: Option<usize>,
    ) -> Result<Vec<usize>, NetError> {
        self.with_net(id, |net, hedron| net.pick_up(hedron, netface, cut_edge))
    }

    /// See [`Net::drop_face`].
    pub fn drop_face(&mut self, id: NetId, netface: usize) -> Result<Vec<usize>, NetError> {
        self.with_net(id, |net, hedron| net.drop_face(hedron, netface))
    }

    /// See [`Net::reseed`].
    pub fn reseed(&mut self, id: NetId, mesh_face: usize) -> Result<(), NetError> {
        let epsilon = self.orthonormal_epsilon;
        self.with_net(id, |net, hedron| net.reseed(hedron, mesh_face, epsilon))
    }

    pub fn set_paper(&mut self, id: NetId, paper: Option<PaperBinding>) -> Result<(), NetError> {
        self.net_mut(id)?.paper = paper;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Merging
// ----------------------------------------------------------------------------

impl Unfolding {
    /// Move every actual face of net `a` into net `b`, starting by hinging
    /// mesh face `face_a` (actual in `a`) onto `face_b` (actual in `b`) and
    /// walking outward over `a`'s hinges. Each face keeps the parent it had in
    /// `a`. Returns the number of faces moved.
    ///
    /// Net `a` is consumed. If a step fails, the faces already moved stay in
    /// `b`, the rest are released, and nothing is rolled back.
    pub fn recurse_unwrap(
        &mut self,
        a: NetId,
        face_a: usize,
        b: NetId,
        face_b: usize,
    ) -> Result<usize, NetError> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        if ia == ib {
            return Err(NetError::AlreadyPlaced(face_a));
        }
        if self.nets[ia].actual_index(face_a).is_none() {
            return Err(NetError::NotPlaced(face_a));
        }
        if self.nets[ib].actual_index(face_b).is_none() {
            return Err(NetError::NotPlaced(face_b));
        }
        if self.hedron.edge_toward(face_b, face_a).is_none() {
            return Err(NetError::NotAdjacent { a: face_a, b: face_b });
        }

        // hinge graph of `a`, read before anything moves
        let mut links: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        let source = &self.nets[ia];
        for face in source.faces().iter().filter(|f| f.tag == FaceTag::Actual) {
            let neighbors = face
                .edges
                .iter()
                .filter(|e| e.tag == EdgeTag::Actual)
                .filter_map(|e| e.toface)
                .map(|t| source.faces()[t].original)
                .collect();
            links.insert(face.original, neighbors);
        }

        let mut visited = FxHashSet::default();
        visited.insert(face_a);
        let mut work = vec![(face_a, face_b)];
        let mut moved = 0;
        let mut outcome = Ok(());
        while let Some((original, parent)) = work.pop() {
            if let Err(e) = self.hand_over(ib, original, parent) {
                outcome = Err(e);
                break;
            }
            moved += 1;
            for &next in links.get(&original).into_iter().flatten() {
                if visited.insert(next) {
                    work.push((next, original));
                }
            }
        }

        let mut consumed = self.nets.remove(ia);
        consumed.release(&mut self.hedron)?;
        self.refresh_others(None)?;
        outcome?;
        tracing::debug!(from = %a, into = %b, moved, "merged nets");
        Ok(moved)
    }

    /// Release `original` from its net and unwrap it in net `target` across
    /// the edge it shares with `parent`.
    fn hand_over(&mut self, target: usize, original: usize, parent: usize) -> Result<(), NetError> {
        self.hedron.set_ownership(original, Ownership::Free)?;
        let net = &mut self.nets[target];
        net.refresh(&self.hedron)?;
        let parent_index = net.actual_index(parent).ok_or(NetError::NotPlaced(parent))?;
        let edge = net
            .face(parent_index)?
            .edge_toward(original)
            .ok_or(NetError::NotAdjacent { a: original, b: parent })?;
        net.unwrap(&mut self.hedron, Some(parent_index), Some(edge))?;
        Ok(())
    }

    /// Merge two nets that touch somewhere. The smaller one is walked into the
    /// larger one and discarded. Returns the surviving net.
    pub fn merge_nets(&mut self, a: NetId, b: NetId) -> Result<NetId, NetError> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        if ia == ib {
            return Ok(a);
        }
        let (src, dst) = if self.nets[ia].num_actual() <= self.nets[ib].num_actual() {
            (ia, ib)
        } else {
            (ib, ia)
        };
        let pair = self.touching_pair(src, dst).ok_or(NetError::NotAdjacent {
            a: self.nets[src].seed().unwrap_or_default(),
            b: self.nets[dst].seed().unwrap_or_default(),
        })?;
        let (src_id, dst_id) = (self.nets[src].id(), self.nets[dst].id());
        self.recurse_unwrap(src_id, pair.0, dst_id, pair.1)?;
        Ok(dst_id)
    }

    /// First (source face, destination face) pair sharing an uncut mesh edge,
    /// preferring edges that are not seams in the destination.
    fn touching_pair(&self, src: usize, dst: usize) -> Option<(usize, usize)> {
        let mut fallback = None;
        for original in self.nets[src].actual_originals() {
            let face = self.hedron.faces.get(original)?;
            for (e, adjacent) in face.adjacent.iter().enumerate() {
                let Some(other) = *adjacent else { continue };
                if face.is_cut(e) || self.nets[dst].actual_index(other).is_none() {
                    continue;
                }
                if !self.nets[dst].has_seam(original, other) {
                    return Some((original, other));
                }
                fallback.get_or_insert((original, other));
            }
        }
        fallback
    }

    /// Join mesh face `to` onto mesh face `from` across their shared edge:
    /// a new net when both are free, an attachment when one is in a net, and a
    /// merge when they are in different nets. Returns the net holding both.
    pub fn unwrap_to(&mut self, from: usize, to: usize) -> Result<NetId, NetError> {
        self.hedron.face(from)?;
        self.hedron.face(to)?;
        if self.hedron.edge_toward(from, to).is_none() {
            return Err(NetError::NotAdjacent { a: from, b: to });
        }
        match (self.net_of_face(from), self.net_of_face(to)) {
            (None, None) => {
                let id = self.establish_net(from)?;
                self.attach(id, from, to)?;
                Ok(id)
            }
            (Some(id), None) => {
                self.attach(id, from, to)?;
                Ok(id)
            }
            (None, Some(id)) => {
                self.attach(id, to, from)?;
                Ok(id)
            }
            (Some(a), Some(b)) if a == b => {
                self.attach(a, from, to)?;
                Ok(a)
            }
            (Some(a), Some(b)) => {
                let size = |id: NetId| self.net(id).map_or(0, Net::num_actual);
                let (src, face_src, dst, face_dst) = if size(a) <= size(b) {
                    (a, from, b, to)
                } else {
                    (b, to, a, from)
                };
                self.recurse_unwrap(src, face_src, dst, face_dst)?;
                Ok(dst)
            }
        }
    }

    fn attach(&mut self, id: NetId, placed: usize, new: usize) -> Result<Vec<usize>, NetError> {
        self.with_net(id, |net, hedron| {
            let index = net.actual_index(placed).ok_or(NetError::NotPlaced(placed))?;
            let edge = net
                .face(index)?
                .edge_toward(new)
                .ok_or(NetError::NotAdjacent { a: placed, b: new })?;
            net.unwrap(hedron, Some(index), Some(edge))
        })
    }
}

// ----------------------------------------------------------------------------
// Cache and checks
// ----------------------------------------------------------------------------

impl Unfolding {
    /// Update each face's cached positions: faces in a net are moved into the
    /// plane of their net's seed, free faces go back to their mesh positions.
    pub fn remap_cache(&mut self) -> Result<(), NetError> {
        for fi in 0..self.hedron.faces.len() {
            let owner = self.hedron.faces[fi].cache.ownership.net();
            let placed = owner
                .and_then(|id| self.nets.iter().find(|n| n.id() == id))
                .and_then(|net| net.actual_index(fi).map(|i| (net, i)));
            let (points2d, points3d) = match placed {
                Some((net, index)) => {
                    let seed = net.seed().ok_or(NetError::NotAnchored(net.id()))?;
                    let seed_basis = self.hedron.basis_of_face(seed)?;
                    let points2d = net.face(index)?.polygon();
                    let points3d: Vec<DVec3> =
                        points2d.iter().map(|&p| seed_basis.unflatten(p)).collect();
                    (points2d, points3d)
                }
                None => {
                    let face = &self.hedron.faces[fi];
                    let points3d: Vec<DVec3> =
                        face.vertices.iter().map(|&v| self.hedron.vertices[v]).collect();
                    let points2d = points3d.iter().map(|&p| face.cache.axis.flatten(p)).collect();
                    (points2d, points3d)
                }
            };
            let cache = &mut self.hedron.faces[fi].cache;
            cache.center = points3d.iter().copied().sum::<DVec3>() / points3d.len().max(1) as f64;
            cache.points2d = points2d;
            cache.points3d = points3d;
        }
        Ok(())
    }

    /// Every claimed face is actual exactly once in its net, with the seed
    /// marked as such, and every net agrees with the mesh.
    pub fn check_invariants(&self) -> Result<(), NetError> {
        for net in &self.nets {
            net.validate(&self.hedron)?;
        }
        let mut seeds: FxHashMap<NetId, usize> = FxHashMap::default();
        for (fi, face) in self.hedron.faces.iter().enumerate() {
            let ownership = face.cache.ownership;
            let Some(id) = ownership.net() else { continue };
            let net = self.net(id).ok_or_else(|| {
                NetError::Inconsistent(format!("face {fi} is claimed by missing {id}"))
            })?;
            if net.actual_index(fi).is_none() {
                return Err(NetError::Inconsistent(format!(
                    "face {fi} is claimed by {id} but not placed there"
                )));
            }
            if ownership.is_seed_of(id) && seeds.insert(id, fi).is_some() {
                return Err(NetError::Inconsistent(format!("{id} has two seeds")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyptych_hedron::shapes;

    const EPSILON: f64 = 1e-9;

    fn cube_session() -> Unfolding {
        Unfolding::new(shapes::cube()).unwrap()
    }

    #[test]
    fn test_establish_and_remove() {
        let mut session = cube_session();
        let id = session.establish_net(0).unwrap();
        assert_eq!(session.face_owner(0), Some(Ownership::Seed(id)));
        session.total_unwrap(id).unwrap();
        assert!((0..6).all(|f| session.net_of_face(f) == Some(id)));
        session.check_invariants().unwrap();

        let removed = session.remove_net(id).unwrap();
        assert_eq!(removed.num_actual(), 6);
        assert!(session.nets().is_empty());
        assert!((0..6).all(|f| session.face_owner(f) == Some(Ownership::Free)));
        assert!(matches!(session.remove_net(id), Err(NetError::InvalidNet(_))));
    }

    #[test]
    fn test_establish_on_claimed_face() {
        let mut session = cube_session();
        let id = session.establish_net(0).unwrap();
        assert!(matches!(
            session.establish_net(0),
            Err(NetError::FaceClaimed { face: 0, owner }) if owner == id
        ));
    }

    #[test]
    fn test_total_unwrap_leaves_other_nets_alone() {
        let mut session = cube_session();
        let a = session.establish_net(0).unwrap();
        let b = session.establish_net(5).unwrap();
        session.total_unwrap(a).unwrap();
        assert_eq!(session.net(a).unwrap().num_actual(), 5);
        assert_eq!(session.net(b).unwrap().num_actual(), 1);
        // every side face borders face 5, which belongs to `b`
        let taken = session
            .net(a)
            .unwrap()
            .faces()
            .iter()
            .filter(|f| f.tag == FaceTag::Taken)
            .count();
        assert_eq!(taken, 4);
        session.check_invariants().unwrap();
    }

    #[test]
    fn test_releasing_a_face_frees_copies_elsewhere() {
        let mut session = cube_session();
        let a = session.establish_net(0).unwrap();
        let b = session.establish_net(5).unwrap();
        session.unwrap(b, Some(0), None).unwrap();
        // all four side faces went to `b`, so `a` sees only taken copies
        let net_a = session.net(a).unwrap();
        assert!(net_a.faces()[1..].iter().all(|f| f.tag == FaceTag::Taken));

        session.remove_net(b).unwrap();
        let net_a = session.net(a).unwrap();
        assert!(net_a.faces()[1..].iter().all(|f| f.tag == FaceTag::Potential));
        session.total_unwrap(a).unwrap();
        assert_eq!(session.net(a).unwrap().num_actual(), 6);
    }

    #[test]
    fn test_merge_conserves_faces() {
        let mut session = cube_session();
        let a = session.establish_net(0).unwrap();
        session.unwrap_to(0, 1).unwrap();
        let b = session.establish_net(5).unwrap();
        session.unwrap_to(5, 2).unwrap();
        session.unwrap_to(5, 4).unwrap();
        assert_eq!(session.net(a).unwrap().num_actual(), 2);
        assert_eq!(session.net(b).unwrap().num_actual(), 3);

        let survivor = session.merge_nets(a, b).unwrap();
        assert_eq!(survivor, b);
        assert_eq!(session.nets().len(), 1);
        assert!(session.net(a).is_none());
        let net = session.net(b).unwrap();
        assert_eq!(net.num_actual(), 5);
        assert_eq!(net.actual_originals(), vec![0, 1, 2, 4, 5]);
        session.check_invariants().unwrap();
    }

    #[test]
    fn test_merge_needs_contact() {
        let mut session = cube_session();
        let a = session.establish_net(0).unwrap();
        let b = session.establish_net(5).unwrap();
        assert!(matches!(
            session.merge_nets(a, b),
            Err(NetError::NotAdjacent { .. })
        ));
        assert_eq!(session.nets().len(), 2);
    }

    #[test]
    fn test_recurse_unwrap_rejects_non_adjacent_start() {
        let mut session = cube_session();
        let a = session.establish_net(0).unwrap();
        let b = session.establish_net(5).unwrap();
        assert!(matches!(
            session.recurse_unwrap(a, 0, b, 5),
            Err(NetError::NotAdjacent { a: 0, b: 5 })
        ));
        assert_eq!(session.nets().len(), 2);
        session.check_invariants().unwrap();
    }

    #[test]
    fn test_unwrap_to_cases() {
        let mut session = cube_session();
        // both free: new net at `from`
        let a = session.unwrap_to(0, 1).unwrap();
        assert_eq!(session.net(a).unwrap().seed(), Some(0));
        assert_eq!(session.net(a).unwrap().num_actual(), 2);
        // `to` in a net, `from` free
        assert_eq!(session.unwrap_to(2, 0).unwrap(), a);
        assert_eq!(session.net_of_face(2), Some(a));
        // same net, already hinged
        assert_eq!(session.unwrap_to(0, 1).unwrap(), a);
        // different nets merge into the bigger one
        let b = session.unwrap_to(5, 4).unwrap();
        assert_ne!(a, b);
        assert_eq!(session.unwrap_to(4, 0).unwrap(), a);
        assert_eq!(session.net(a).unwrap().num_actual(), 5);
        assert!(session.net(b).is_none());
        // not adjacent
        assert!(matches!(
            session.unwrap_to(0, 5),
            Err(NetError::NotAdjacent { a: 0, b: 5 })
        ));
        session.check_invariants().unwrap();
    }

    #[test]
    fn test_remap_cache_flattens_owned_faces() {
        let mut session = cube_session();
        let id = session.establish_net(0).unwrap();
        session.total_unwrap(id).unwrap();
        session.remap_cache().unwrap();
        let hedron = session.hedron();
        let seed_basis = hedron.basis_of_face(0).unwrap();
        for face in &hedron.faces {
            for p in &face.cache.points3d {
                let height = (*p - seed_basis.p).dot(seed_basis.z);
                assert!(height.abs() < EPSILON, "point {p:?} left the seed plane");
            }
        }
        // the seed stays where it is
        for (k, &v) in hedron.faces[0].vertices.iter().enumerate() {
            assert!(hedron.faces[0].cache.points3d[k].distance(hedron.vertices[v]) < EPSILON);
        }

        session.remove_net(id).unwrap();
        session.remap_cache().unwrap();
        let hedron = session.hedron();
        for face in &hedron.faces {
            for (k, &v) in face.vertices.iter().enumerate() {
                assert!(face.cache.points3d[k].distance(hedron.vertices[v]) < EPSILON);
            }
        }
    }

    #[test]
    fn test_reseed_through_session() {
        let mut session = cube_session();
        let id = session.establish_net(0).unwrap();
        session.total_unwrap(id).unwrap();
        session.reseed(id, 4).unwrap();
        assert_eq!(session.net(id).unwrap().seed(), Some(4));
        assert_eq!(session.face_owner(4), Some(Ownership::Seed(id)));
        session.check_invariants().unwrap();
    }
}
