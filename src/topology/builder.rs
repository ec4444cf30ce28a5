//! Default-topology synthesis
//!
//! When the machine configuration only specifies flat per-level counts, the
//! whole tree is synthesized top-down from the root: each visited node is
//! bounded to the configured count of its child level, the children are
//! created with deterministic aggregator-derived names, and the recursion
//! stops above the levels that are not materialized (threads, and cores too
//! when they are created externally at core granularity).

use super::Topology;
use crate::counts::FlatCounts;
use crate::errors::TopoError;
use crate::level::{LevelSet, TopoLevel};
use crate::node::{NodeId, NodeKind, NodeSpec};

/// # Default-topology synthesis
impl Topology {
    /// Synthesize the complete default tree from flat counts
    ///
    /// `counts.cpus` is the pre-plugged CPU budget; it is drained across
    /// cores in creation order, filling each core to capacity before moving
    /// to the next. Fails with [`TopoError::UnsupportedGranularity`] unless
    /// the machine creates its CPU units at core or thread granularity.
    ///
    /// # Panics
    ///
    /// Building twice would duplicate every child; a second call is a caller
    /// logic error and panics.
    pub fn build_default_topology(&mut self, counts: &FlatCounts) -> Result<(), TopoError> {
        if !matches!(self.granularity, TopoLevel::Core | TopoLevel::Thread) {
            return Err(TopoError::UnsupportedGranularity {
                granularity: self.granularity,
            });
        }
        assert!(
            !self.synthesized,
            "the default topology must only be built once"
        );

        // Threads are never materialized, and cores never create children;
        // neither level takes part in the recursion.
        let mut recurse = self.supported_levels;
        recurse.remove_level(TopoLevel::Thread);
        recurse.remove_level(TopoLevel::Core);

        // At core granularity the cores arrive by hotplug, so the level
        // right above them must not create them here either.
        if self.granularity == TopoLevel::Core {
            if let Some(above_core) = recurse.next_above(TopoLevel::Core) {
                recurse.remove_level(above_core);
            }
        }

        let mut plugged_budget = counts.cpus;
        self.populate(self.root, counts, &mut plugged_budget, recurse)?;

        self.synthesized = true;
        Ok(())
    }

    /// Create the children of `node` and recurse into the levels `recurse`
    /// permits
    fn populate(
        &mut self,
        node: NodeId,
        counts: &FlatCounts,
        plugged_budget: &mut u32,
        recurse: LevelSet,
    ) -> Result<(), TopoError> {
        let level = self.node(node).level();
        let child_level = self
            .supported_levels
            .highest_below(level)
            .expect("every populated node has a supported level below it");
        let child_kind =
            NodeKind::for_level(child_level).expect("child levels below the root are unit kinds");

        let nr_children = counts.count(child_level);
        self.node_mut(node).max_children = nr_children;

        for _ in 0..nr_children {
            let spec = if child_kind == NodeKind::Core {
                let plugged = (*plugged_budget).min(counts.threads);
                *plugged_budget -= plugged;
                NodeSpec::core(counts.threads).plugged(plugged)
            } else {
                NodeSpec::new(child_kind)
            };

            let child = self.attach(node, spec)?;
            if recurse.contains_level(child_level) {
                self.populate(child, counts, plugged_budget, recurse)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[allow(unused)]
    use similar_asserts::assert_eq;

    fn counts(threads: u32, cores: u32, sockets: u32, cpus: u32) -> FlatCounts {
        FlatCounts {
            cpus,
            threads,
            cores,
            sockets,
            max_cpus: threads * cores * sockets,
            ..FlatCounts::default()
        }
    }

    /// Only thread/core/socket levels, the common flat machine
    fn flat_machine() -> Topology {
        let supported = LevelSet::THREAD | LevelSet::CORE | LevelSet::SOCKET | LevelSet::ROOT;
        Topology::with_config(supported, TopoLevel::Thread)
    }

    #[test]
    fn builds_the_full_level_ladder() {
        let mut topo = Topology::new();
        topo.build_default_topology(&counts(2, 2, 1, 4)).unwrap();

        // One unit per level down to the cluster, then the two cores
        let mut id = topo.root();
        for level in [
            TopoLevel::Drawer,
            TopoLevel::Book,
            TopoLevel::Socket,
            TopoLevel::Die,
            TopoLevel::Cluster,
        ] {
            assert_eq!(topo.node(id).num_children(), 1, "fan-out at {level}");
            id = topo.node(id).children()[0];
            assert_eq!(topo.node(id).level(), level);
        }
        let cluster = topo.node(id);
        assert_eq!(cluster.num_children(), 2);
        assert_eq!(cluster.max_children(), 2);
        assert_eq!(cluster.child_level(), TopoLevel::Core);

        assert!(topo.is_synthesized());
        assert!(!topo.is_explicit());
        assert_eq!(topo.cores().count(), 2);
        assert_eq!(topo.stat().max_cpus(), 4);
        assert_eq!(topo.stat().pre_plugged_cpus(), 4);
        assert_eq!(topo.stat().entry(TopoLevel::Thread).max_units, 2);
    }

    #[test]
    fn names_are_global_and_deterministic() {
        let mut topo = flat_machine();
        topo.build_default_topology(&counts(1, 2, 2, 4)).unwrap();

        let names = topo
            .cores()
            .map(|core| topo.node(core).name().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["core[0]", "core[1]", "core[2]", "core[3]"]);

        let root = topo.node(topo.root());
        let sockets = root
            .children()
            .iter()
            .map(|&socket| topo.node(socket).name().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(sockets, vec!["socket[0]", "socket[1]"]);
    }

    #[test]
    fn plugged_budget_fills_cores_in_creation_order() {
        let mut topo = flat_machine();
        topo.build_default_topology(&counts(2, 2, 1, 3)).unwrap();

        let plugged = topo
            .cores()
            .map(|core| topo.node(core).plugged_threads())
            .collect::<Vec<_>>();
        assert_eq!(plugged, vec![2, 1]);
        assert_eq!(topo.stat().pre_plugged_cpus(), 3);
        assert_eq!(topo.stat().max_cpus(), 4);
    }

    #[test]
    fn skipped_levels_do_not_appear_in_the_tree() {
        let mut topo = flat_machine();
        topo.build_default_topology(&counts(1, 2, 2, 4)).unwrap();

        let root = topo.node(topo.root());
        assert_eq!(root.child_level(), TopoLevel::Socket);
        assert_eq!(root.max_children(), 2);
        for &socket in root.children() {
            assert_eq!(topo.node(socket).child_level(), TopoLevel::Core);
            assert_eq!(topo.node(socket).num_children(), 2);
        }
        assert!(!topo.has_level(TopoLevel::Cluster));
        assert!(!topo.has_level(TopoLevel::Drawer));
    }

    #[test]
    fn core_granularity_leaves_core_creation_to_hotplug() {
        let supported = LevelSet::THREAD | LevelSet::CORE | LevelSet::SOCKET | LevelSet::ROOT;
        let mut topo = Topology::with_config(supported, TopoLevel::Core);
        topo.build_default_topology(&counts(2, 2, 2, 8)).unwrap();

        // Sockets exist, cores do not: they will be plugged in externally
        assert_eq!(topo.stat().total_units(TopoLevel::Socket), 2);
        assert_eq!(topo.cores().count(), 0);

        let socket = topo.node(topo.root()).children()[0];
        assert_eq!(topo.node(socket).num_children(), 0);

        let core = topo.attach(socket, NodeSpec::core(2)).unwrap();
        assert_eq!(topo.node(core).name(), "core[0]");
        assert_eq!(topo.stat().max_cpus(), 2);
    }

    #[test]
    fn rejects_non_cpu_granularity() {
        let mut topo = Topology::with_config(LevelSet::all(), TopoLevel::Socket);
        assert_eq!(
            topo.build_default_topology(&counts(1, 1, 1, 1)),
            Err(TopoError::UnsupportedGranularity {
                granularity: TopoLevel::Socket,
            })
        );
    }

    #[test]
    #[should_panic(expected = "must only be built once")]
    fn building_twice_is_a_logic_error() {
        let mut topo = flat_machine();
        let counts = counts(1, 1, 1, 1);
        topo.build_default_topology(&counts).unwrap();
        let _ = topo.build_default_topology(&counts);
    }
}
