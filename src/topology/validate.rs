//! Completeness and symmetry validation
//!
//! A tree built explicitly by hotplug must be checked before the machine
//! uses it: every branch complete, every node at one level fanning out
//! identically, no level present in one branch and skipped in another. The
//! walk leans on the aggregator's high-water statistics — the recorded
//! maxima reflect the designed shape even if some units were unplugged
//! again — and derives the equivalent flat counts as it goes.

use super::Topology;
use crate::counts::FlatCounts;
use crate::errors::TopoError;
use crate::level::TopoLevel;

/// # Validation and the combined machine-init entry point
impl Topology {
    /// Validate an explicit tree or build the default one
    ///
    /// The machine-init entry point: a no-op once the builder has already
    /// parsed the configuration, a
    /// [`build_default_topology()`](Topology::build_default_topology) when
    /// the root has no children yet, and otherwise a full validation walk
    /// that back-fills and returns the flat counts equivalent to the
    /// explicitly built tree.
    ///
    /// Validation is read-only and idempotent: validating an already-valid
    /// tree again yields the same counts.
    pub fn validate_or_build(&mut self, counts: &FlatCounts) -> Result<FlatCounts, TopoError> {
        if self.synthesized {
            return Ok(*counts);
        }
        if self.node(self.root).children.is_empty() {
            self.build_default_topology(counts)?;
            return Ok(*counts);
        }

        let mut derived = *counts;
        self.validate_tree(&mut derived)?;
        Ok(derived)
    }

    /// Walk the explicit tree and back-fill `counts` from the statistics
    fn validate_tree(&self, counts: &mut FlatCounts) -> Result<(), TopoError> {
        // The walk below only covers descendants; the root's own child
        // level is written here.
        let root = self.node(self.root);
        self.backfill_count(counts, root.child_level);

        for id in self.descendants(self.root) {
            let node = self.node(id);
            let level = node.level();
            let index = node.index.unwrap_or(0);

            if level != TopoLevel::Thread && node.children.is_empty() && node.max_children == 0 {
                return Err(TopoError::IncompleteTopology { level, index });
            }

            if level == TopoLevel::Unknown {
                return Err(TopoError::UnknownLevel);
            }

            if node.child_level == TopoLevel::Unknown {
                return Err(TopoError::MissingChildLevel { level, index });
            }

            // Threads per core are capacity-configured; every other level
            // counts attached children.
            let fan_out = if node.child_level == TopoLevel::Thread {
                node.max_children
            } else {
                node.num_children()
            };
            let entry = self.stat.entry(node.child_level);
            if entry.max_units != fan_out {
                return Err(TopoError::AsymmetricTopology {
                    level,
                    child_level: node.child_level,
                    expected: entry.max_units,
                    found: fan_out,
                });
            }

            let next = self
                .stat
                .curr_levels
                .next_above(node.child_level)
                .expect("the root level is always present");
            if next != level {
                return Err(TopoError::AsymmetricDepth {
                    level,
                    child_level: node.child_level,
                    next,
                });
            }

            self.backfill_count(counts, node.child_level);
        }

        counts.cpus = self.stat.pre_plugged_cpus.max(1);
        counts.max_cpus = self.stat.max_cpus.max(1);

        // The per-level counts and the aggregator must agree exactly; a
        // mismatch means statistics propagation and the tree diverged.
        let product = counts.product();
        if product != u64::from(counts.max_cpus) {
            return Err(TopoError::InternalInconsistency {
                product,
                max_cpus: counts.max_cpus,
            });
        }
        Ok(())
    }

    /// Flat count for `level`: the recorded maximum, or 1 so every level
    /// contributes a cardinality
    fn backfill_count(&self, counts: &mut FlatCounts, level: TopoLevel) {
        counts.set_count(level, self.stat.entry(level).max_units.max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, NodeSpec};
    #[allow(unused)]
    use similar_asserts::assert_eq;

    #[test]
    fn explicit_socket_core_machine_round_trips() {
        let mut topo = Topology::new();
        let root = topo.root();
        let socket = topo.attach(root, NodeSpec::new(NodeKind::Socket)).unwrap();
        topo.attach(socket, NodeSpec::core(4).plugged(3)).unwrap();
        assert!(topo.is_explicit());

        let derived = topo.validate_or_build(&FlatCounts::default()).unwrap();
        assert_eq!(
            derived,
            FlatCounts {
                cpus: 3,
                sockets: 1,
                cores: 1,
                threads: 4,
                max_cpus: 4,
                ..FlatCounts::default()
            }
        );

        // Idempotent: a second validation derives the same counts
        let again = topo.validate_or_build(&FlatCounts::default()).unwrap();
        assert_eq!(again, derived);
    }

    #[test]
    fn builder_and_validator_agree_on_flat_counts() {
        let input = FlatCounts {
            cpus: 4,
            threads: 2,
            cores: 2,
            max_cpus: 4,
            ..FlatCounts::default()
        };

        // One machine synthesized from the counts...
        let mut built = Topology::new();
        built.build_default_topology(&input).unwrap();

        // ...and one with the same shape built by explicit hotplug
        let mut explicit = Topology::new();
        let mut parent = explicit.root();
        for kind in [
            NodeKind::Drawer,
            NodeKind::Book,
            NodeKind::Socket,
            NodeKind::Die,
            NodeKind::Cluster,
        ] {
            parent = explicit.attach(parent, NodeSpec::new(kind)).unwrap();
        }
        for _ in 0..2 {
            explicit.attach(parent, NodeSpec::core(2)).unwrap();
        }

        let derived = explicit.validate_or_build(&FlatCounts::default()).unwrap();
        assert_eq!(derived, input);
        assert_eq!(
            u64::from(derived.cores * derived.threads),
            u64::from(built.stat().max_cpus())
        );
    }

    #[test]
    fn walking_a_synthesized_tree_reproduces_its_counts() {
        let input = FlatCounts {
            cpus: 4,
            threads: 2,
            cores: 2,
            max_cpus: 4,
            ..FlatCounts::default()
        };
        let mut topo = Topology::new();
        topo.build_default_topology(&input).unwrap();

        let mut derived = FlatCounts::default();
        topo.validate_tree(&mut derived).unwrap();
        assert_eq!(derived, input);
    }

    #[test]
    fn uneven_fan_out_is_asymmetric() {
        let mut topo = Topology::new();
        let root = topo.root();
        let socket0 = topo.attach(root, NodeSpec::new(NodeKind::Socket)).unwrap();
        let socket1 = topo.attach(root, NodeSpec::new(NodeKind::Socket)).unwrap();
        for _ in 0..2 {
            topo.attach(socket0, NodeSpec::core(1)).unwrap();
        }
        for _ in 0..3 {
            topo.attach(socket1, NodeSpec::core(1)).unwrap();
        }

        assert_eq!(
            topo.validate_or_build(&FlatCounts::default()),
            Err(TopoError::AsymmetricTopology {
                level: TopoLevel::Socket,
                child_level: TopoLevel::Core,
                expected: 3,
                found: 2,
            })
        );
    }

    #[test]
    fn skipping_a_level_in_one_branch_is_asymmetric_depth() {
        let mut topo = Topology::new();
        let root = topo.root();
        let socket0 = topo.attach(root, NodeSpec::new(NodeKind::Socket)).unwrap();
        let socket1 = topo.attach(root, NodeSpec::new(NodeKind::Socket)).unwrap();

        // socket0 → core, socket1 → cluster → core
        topo.attach(socket0, NodeSpec::core(1)).unwrap();
        let cluster = topo
            .attach(socket1, NodeSpec::new(NodeKind::Cluster))
            .unwrap();
        topo.attach(cluster, NodeSpec::core(1)).unwrap();

        assert_eq!(
            topo.validate_or_build(&FlatCounts::default()),
            Err(TopoError::AsymmetricDepth {
                level: TopoLevel::Socket,
                child_level: TopoLevel::Core,
                next: TopoLevel::Cluster,
            })
        );
    }

    #[test]
    fn childless_unbounded_nodes_are_incomplete() {
        let mut topo = Topology::new();
        let root = topo.root();
        topo.attach(root, NodeSpec::new(NodeKind::Socket)).unwrap();

        assert_eq!(
            topo.validate_or_build(&FlatCounts::default()),
            Err(TopoError::IncompleteTopology {
                level: TopoLevel::Socket,
                index: 0,
            })
        );
    }

    #[test]
    fn reserved_but_unplugged_parents_miss_their_child_level() {
        let mut topo = Topology::new();
        let root = topo.root();
        let socket = topo.attach(root, NodeSpec::new(NodeKind::Socket)).unwrap();
        // Capacity reserved for hotplugged cores that never arrived
        topo.node_mut(socket).max_children = 2;

        assert_eq!(
            topo.validate_or_build(&FlatCounts::default()),
            Err(TopoError::MissingChildLevel {
                level: TopoLevel::Socket,
                index: 0,
            })
        );
    }

    #[test]
    fn stale_counts_for_absent_levels_trip_the_cross_check() {
        let mut topo = Topology::new();
        let root = topo.root();
        let socket = topo.attach(root, NodeSpec::new(NodeKind::Socket)).unwrap();
        topo.attach(socket, NodeSpec::core(2)).unwrap();

        // The cluster level never appears in this tree, so the caller's
        // nonsensical count survives back-fill and breaks the product.
        let skewed = FlatCounts {
            clusters: 5,
            ..FlatCounts::default()
        };
        assert_eq!(
            topo.validate_or_build(&skewed),
            Err(TopoError::InternalInconsistency {
                product: 10,
                max_cpus: 2,
            })
        );
    }

    #[test]
    fn build_path_returns_the_configured_counts() {
        let mut topo = Topology::new();
        let input = FlatCounts {
            cpus: 2,
            cores: 2,
            max_cpus: 2,
            ..FlatCounts::default()
        };
        let out = topo.validate_or_build(&input).unwrap();
        assert_eq!(out, input);
        assert!(topo.is_synthesized());
        assert_eq!(topo.cores().count(), 2);

        // Parsed once; later calls leave the tree alone
        let again = topo.validate_or_build(&input).unwrap();
        assert_eq!(again, input);
        assert_eq!(topo.cores().count(), 2);
    }
}
