//! Root-side statistics aggregation
//!
//! The root is the only node that reacts to attach/detach events elsewhere
//! in the tree. It keeps running totals per level, the largest fan-out ever
//! observed under a single parent at each level, a bitmap of levels with at
//! least one attached unit, and a flat list of every core for O(1)
//! whole-machine iteration. The maxima and the level bitmap are historical
//! high-water marks on purpose: they record the *designed* shape, so
//! validating a machine with some units unplugged still succeeds.

use crate::level::{LevelSet, TopoLevel};
use crate::node::{NodeId, NodeKind, TopoNode};

/// Levels with a statistics entry: thread up to drawer
const STAT_LEVELS: usize = 7;

/// Index of `level` in the per-level entry table
fn stat_slot(level: TopoLevel) -> usize {
    match level {
        TopoLevel::Unknown | TopoLevel::Root => {
            unreachable!("no statistics entry for the {level} level")
        }
        unit => unit as usize - TopoLevel::Thread as usize,
    }
}

/// Per-level attach statistics
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct StatEntry {
    /// Units of this level currently attached anywhere in the tree
    pub total_units: u32,
    /// Largest fan-out ever observed under a single parent at this level
    ///
    /// Never shrinks; for threads this tracks the largest configured core
    /// capacity rather than attached nodes.
    pub max_units: u32,
}

/// Live statistics the root maintains over the whole tree
#[derive(Clone, Debug)]
pub struct TopoStat {
    entries: [StatEntry; STAT_LEVELS],
    pub(crate) curr_levels: LevelSet,
    pub(crate) max_cpus: u32,
    pub(crate) pre_plugged_cpus: u32,
    pub(crate) cores: Vec<NodeId>,
}
//
impl TopoStat {
    pub(crate) fn new() -> Self {
        let mut curr_levels = LevelSet::empty();
        curr_levels.insert_level(TopoLevel::Root);
        Self {
            entries: [StatEntry::default(); STAT_LEVELS],
            curr_levels,
            max_cpus: 0,
            pre_plugged_cpus: 0,
            cores: Vec::new(),
        }
    }

    /// Statistics entry for a unit level (thread..drawer)
    pub fn entry(&self, level: TopoLevel) -> &StatEntry {
        &self.entries[stat_slot(level)]
    }

    fn entry_mut(&mut self, level: TopoLevel) -> &mut StatEntry {
        &mut self.entries[stat_slot(level)]
    }

    /// Units of `level` currently attached anywhere in the tree
    pub fn total_units(&self, level: TopoLevel) -> u32 {
        self.entry(level).total_units
    }

    /// Levels with at least one attached unit (high-water, never shrinks)
    pub fn curr_levels(&self) -> LevelSet {
        self.curr_levels
    }

    /// Total thread capacity across every core ever attached
    pub fn max_cpus(&self) -> u32 {
        self.max_cpus
    }

    /// Threads plugged at attach time, summed across every core
    pub fn pre_plugged_cpus(&self) -> u32 {
        self.pre_plugged_cpus
    }

    /// Record a successful attach of `child` whose parent now has
    /// `parent_children` children
    pub(crate) fn record_attach(
        &mut self,
        child_id: NodeId,
        child: &TopoNode,
        parent_children: u32,
    ) {
        let level = child.level();

        if child.kind() == NodeKind::Core {
            self.cores.push(child_id);
            // Max CPUs per core is the core's configured thread capacity
            self.max_cpus += child.max_children;
            self.pre_plugged_cpus += child.plugged_threads;

            let thread_entry = self.entry_mut(TopoLevel::Thread);
            if child.max_children > thread_entry.max_units {
                thread_entry.max_units = child.max_children;
            }
        }

        let entry = self.entry_mut(level);
        entry.total_units += 1;
        if parent_children > entry.max_units {
            entry.max_units = parent_children;
        }

        self.curr_levels.insert_level(level);
    }

    /// Record a detach of `child`, still linked into the tree
    ///
    /// Only `total_units` (and the core list) go back down; `max_units`,
    /// `curr_levels` and the CPU totals keep their high-water values.
    pub(crate) fn record_detach(&mut self, child_id: NodeId, child: &TopoNode) {
        let level = child.level();

        if child.kind() == NodeKind::Core {
            self.cores.retain(|id| *id != child_id);
        }

        self.entry_mut(level).total_units -= 1;
    }
}
