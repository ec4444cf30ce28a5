//! Topology levels
//!
//! A virtual machine's CPU topology is a strict nesting hierarchy: threads
//! live in cores, cores in clusters, and so on up to the single root that
//! stands for the whole machine. [`TopoLevel`] enumerates the rungs of that
//! hierarchy in nesting order, and [`LevelSet`] is a small bitmap over them
//! used both for "which levels does this machine support" and "which levels
//! currently have at least one attached unit".

#[cfg(any(test, feature = "proptest"))]
use proptest::{prelude::*, sample::Select};
use bitflags::bitflags;
use strum::{Display, EnumIter, IntoEnumIterator};

/// One rung in the fixed thread → … → root nesting hierarchy
///
/// The derived total order follows physical nesting: a level compares
/// strictly less than every level that can contain it, so
/// `TopoLevel::Thread < TopoLevel::Core < … < TopoLevel::Root`.
///
/// [`TopoLevel::Unknown`] sits below every real level and only ever means
/// "not yet determined" (e.g. the child level of a node that has no
/// children). It is never a member of a [`LevelSet`] and no node occupies it.
#[derive(Copy, Clone, Debug, Display, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum TopoLevel {
    /// Sentinel for "no level determined yet"
    Unknown,

    /// Hardware thread within a core
    ///
    /// Threads are tracked as a core's capacity count and are never
    /// materialized as standalone tree nodes.
    Thread,

    /// CPU core, the unit that carries thread capacity
    Core,

    /// Group of cores sharing mid-level resources
    Cluster,

    /// Die within a package
    Die,

    /// Physical package socket
    Socket,

    /// Book (s390x-style drawer subdivision)
    Book,

    /// Drawer, the outermost physical container
    Drawer,

    /// The machine-wide root; exactly one instance per machine
    Root,
}
//
impl TopoLevel {
    /// Bitmap flag standing for this level
    ///
    /// `None` for the [`Unknown`](Self::Unknown) sentinel, which has no flag.
    pub fn flag(self) -> Option<LevelSet> {
        LevelSet::from_bits(1 << (self as u16))
    }
}

#[cfg(any(test, feature = "proptest"))]
impl Arbitrary for TopoLevel {
    type Parameters = ();
    type Strategy = Select<Self>;

    fn arbitrary_with((): ()) -> Self::Strategy {
        prop::sample::select(Self::iter().collect::<Vec<_>>())
    }
}

bitflags! {
    /// Set of topology levels
    ///
    /// Bit positions match the [`TopoLevel`] discriminants, so iteration and
    /// the [`next_above()`]/[`highest_below()`] scans follow nesting order.
    /// The [`TopoLevel::Unknown`] sentinel has no bit.
    ///
    /// [`next_above()`]: LevelSet::next_above
    /// [`highest_below()`]: LevelSet::highest_below
    #[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
    pub struct LevelSet: u16 {
        /// See [`TopoLevel::Thread`]
        const THREAD = 1 << (TopoLevel::Thread as u16);
        /// See [`TopoLevel::Core`]
        const CORE = 1 << (TopoLevel::Core as u16);
        /// See [`TopoLevel::Cluster`]
        const CLUSTER = 1 << (TopoLevel::Cluster as u16);
        /// See [`TopoLevel::Die`]
        const DIE = 1 << (TopoLevel::Die as u16);
        /// See [`TopoLevel::Socket`]
        const SOCKET = 1 << (TopoLevel::Socket as u16);
        /// See [`TopoLevel::Book`]
        const BOOK = 1 << (TopoLevel::Book as u16);
        /// See [`TopoLevel::Drawer`]
        const DRAWER = 1 << (TopoLevel::Drawer as u16);
        /// See [`TopoLevel::Root`]
        const ROOT = 1 << (TopoLevel::Root as u16);
    }
}
//
impl LevelSet {
    /// Truth that `level` is a member of this set
    pub fn contains_level(self, level: TopoLevel) -> bool {
        level.flag().is_some_and(|flag| self.contains(flag))
    }

    /// Add `level` to the set (no-op for the `Unknown` sentinel)
    pub fn insert_level(&mut self, level: TopoLevel) {
        if let Some(flag) = level.flag() {
            self.insert(flag);
        }
    }

    /// Remove `level` from the set
    pub fn remove_level(&mut self, level: TopoLevel) {
        if let Some(flag) = level.flag() {
            self.remove(flag);
        }
    }

    /// Lowest member level strictly above `level`
    ///
    /// This is the bitmap-scan idiom the validator uses to detect branches
    /// that skip a level present elsewhere in the tree.
    pub fn next_above(self, level: TopoLevel) -> Option<TopoLevel> {
        TopoLevel::iter()
            .filter(|candidate| *candidate > level)
            .find(|candidate| self.contains_level(*candidate))
    }

    /// Highest member level strictly below `level`
    ///
    /// The builder uses this to pick the immediate child level of a node
    /// given the machine's supported levels.
    pub fn highest_below(self, level: TopoLevel) -> Option<TopoLevel> {
        TopoLevel::iter()
            .filter(|candidate| *candidate < level && self.contains_level(*candidate))
            .last()
    }

    /// Iterate over member levels in nesting order, innermost first
    pub fn levels(self) -> impl Iterator<Item = TopoLevel> {
        TopoLevel::iter().filter(move |level| self.contains_level(*level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[allow(unused)]
    use similar_asserts::assert_eq;
    use static_assertions::assert_impl_all;

    assert_impl_all!(TopoLevel: Copy, Ord, Send, Sync);
    assert_impl_all!(LevelSet: Copy, Send, Sync);

    #[test]
    fn nesting_order() {
        let mut levels = TopoLevel::iter();
        let mut prev = levels.next().expect("at least one level");
        assert_eq!(prev, TopoLevel::Unknown);
        for level in levels {
            assert!(prev < level);
            prev = level;
        }
        assert_eq!(prev, TopoLevel::Root);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(TopoLevel::Thread.to_string(), "thread");
        assert_eq!(TopoLevel::Socket.to_string(), "socket");
        assert_eq!(TopoLevel::Root.to_string(), "root");
    }

    #[test]
    fn unknown_has_no_flag() {
        assert_eq!(TopoLevel::Unknown.flag(), None);
        assert!(!LevelSet::all().contains_level(TopoLevel::Unknown));
    }

    #[test]
    fn every_real_level_has_a_flag() {
        for level in TopoLevel::iter().filter(|l| *l != TopoLevel::Unknown) {
            assert!(LevelSet::all().contains_level(level), "missing {level}");
        }
    }

    #[test]
    fn scans_respect_gaps() {
        let mut set = LevelSet::all();
        set.remove_level(TopoLevel::Cluster);
        set.remove_level(TopoLevel::Die);

        assert_eq!(set.next_above(TopoLevel::Core), Some(TopoLevel::Socket));
        assert_eq!(set.highest_below(TopoLevel::Socket), Some(TopoLevel::Core));
        assert_eq!(set.highest_below(TopoLevel::Thread), None);
        assert_eq!(set.next_above(TopoLevel::Root), None);
    }

    #[test]
    fn insert_and_remove_round_trip() {
        let mut set = LevelSet::empty();
        set.insert_level(TopoLevel::Book);
        assert!(set.contains_level(TopoLevel::Book));
        set.remove_level(TopoLevel::Book);
        assert_eq!(set, LevelSet::empty());

        // The sentinel is silently ignored
        set.insert_level(TopoLevel::Unknown);
        assert_eq!(set, LevelSet::empty());
    }

    #[test]
    fn levels_iterates_innermost_first() {
        let set = LevelSet::SOCKET | LevelSet::CORE | LevelSet::DRAWER;
        let members = set.levels().collect::<Vec<_>>();
        assert_eq!(
            members,
            vec![TopoLevel::Core, TopoLevel::Socket, TopoLevel::Drawer]
        );
    }
}
