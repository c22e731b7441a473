use std::fmt;

/// Identifier of a net, unique within one unfolding session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetId(pub u32);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

/// Which net, if any, claims a mesh face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// On the polyhedron, claimed by no net.
    #[default]
    Free,
    /// The seed (anchor) face of the net.
    Seed(NetId),
    /// A placed, non-seed face of the net.
    Member(NetId),
}

impl Ownership {
    /// The claiming net.
    #[must_use]
    pub fn net(&self) -> Option<NetId> {
        match self {
            Ownership::Free => None,
            Ownership::Seed(id) | Ownership::Member(id) => Some(*id),
        }
    }

    #[must_use]
    pub fn is_free(&self) -> bool {
        matches!(self, Ownership::Free)
    }

    #[must_use]
    pub fn is_seed_of(&self, net: NetId) -> bool {
        *self == Ownership::Seed(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership_net() {
        assert_eq!(Ownership::Free.net(), None);
        assert_eq!(Ownership::Seed(NetId(3)).net(), Some(NetId(3)));
        assert_eq!(Ownership::Member(NetId(4)).net(), Some(NetId(4)));
        assert!(Ownership::Seed(NetId(3)).is_seed_of(NetId(3)));
        assert!(!Ownership::Member(NetId(3)).is_seed_of(NetId(3)));
    }
}
