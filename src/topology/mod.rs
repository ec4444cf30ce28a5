//! The owned topology tree
//!
//! [`Topology`] is the machine's single CPU-topology object: it owns every
//! node in an arena, exposes hotplug-style [`attach()`]/[`detach()`]
//! mutation, and carries the root-side statistics the builder and validator
//! rely on. All mutation goes through `&mut Topology`, which is the Rust
//! rendition of the device model's global mutation lock: no two topology
//! operations ever interleave, and every operation either completes fully or
//! fails with the tree untouched.
//!
//! [`attach()`]: Topology::attach
//! [`detach()`]: Topology::detach

mod builder;
pub mod stats;
mod validate;

use self::stats::TopoStat;
use crate::errors::TopoError;
use crate::level::{LevelSet, TopoLevel};
use crate::node::{NodeId, NodeKind, NodeSpec, TopoNode};

/// CPU topology of one virtual machine
///
/// Created once at machine-build time and torn down with the machine; the
/// root node and the aggregated statistics live exactly as long as the
/// `Topology` itself. Every other node is owned by its parent's child
/// collection and reached through [`NodeId`] handles.
///
/// ```
/// use vcpu_topology::{NodeKind, NodeSpec, Topology};
///
/// let mut topo = Topology::new();
/// let socket = topo.attach(topo.root(), NodeSpec::new(NodeKind::Socket))?;
/// let core = topo.attach(socket, NodeSpec::core(2))?;
/// assert_eq!(topo.node(core).index(), Some(0));
/// assert_eq!(topo.stat().max_cpus(), 2);
/// # Ok::<(), vcpu_topology::TopoError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Topology {
    /// Node arena; detached slots are recycled through `free_slots`
    nodes: Vec<Option<TopoNode>>,
    free_slots: Vec<usize>,
    root: NodeId,
    /// Aggregated statistics, conceptually owned by the root node
    stat: TopoStat,
    supported_levels: LevelSet,
    granularity: TopoLevel,
    /// Set once the builder has synthesized the tree from flat counts
    synthesized: bool,
}

/// # Construction and configuration
impl Topology {
    /// Topology with every level supported and thread granularity
    pub fn new() -> Self {
        Self::with_config(LevelSet::all(), TopoLevel::Thread)
    }

    /// Topology for a machine supporting `supported_levels`, creating its
    /// externally addressable CPU units at `granularity`
    ///
    /// This creates and owns the single root node. Thread, core, socket and
    /// root support is not optional and is added to the set if missing;
    /// machines differ only in the cluster/die/book/drawer levels.
    pub fn with_config(supported_levels: LevelSet, granularity: TopoLevel) -> Self {
        let mut supported_levels = supported_levels;
        for level in [
            TopoLevel::Thread,
            TopoLevel::Core,
            TopoLevel::Socket,
            TopoLevel::Root,
        ] {
            supported_levels.insert_level(level);
        }

        let root = TopoNode::new(NodeKind::Root, "root".to_owned());
        Self {
            nodes: vec![Some(root)],
            free_slots: Vec::new(),
            root: NodeId(0),
            stat: TopoStat::new(),
            supported_levels,
            granularity,
            synthesized: false,
        }
    }

    /// Handle of the machine-wide root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Levels this machine configuration permits
    pub fn supported_levels(&self) -> LevelSet {
        self.supported_levels
    }

    /// Level at which externally addressable CPU units are created
    pub fn granularity(&self) -> TopoLevel {
        self.granularity
    }

    /// Whether the tree was synthesized by
    /// [`build_default_topology()`](Topology::build_default_topology)
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    /// Whether the tree was fully specified by explicit hotplug
    pub fn is_explicit(&self) -> bool {
        !self.synthesized && !self.node(self.root).children.is_empty()
    }

    /// Whether any unit at `level` was ever attached
    pub fn has_level(&self, level: TopoLevel) -> bool {
        self.stat.curr_levels.contains_level(level)
    }
}

/// # Node access
impl Topology {
    /// Read-only access to a node
    ///
    /// # Panics
    ///
    /// Panics if `id` designates a node that was already detached.
    pub fn node(&self, id: NodeId) -> &TopoNode {
        self.nodes[id.0]
            .as_ref()
            .expect("stale handle: node was detached")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TopoNode {
        self.nodes[id.0]
            .as_mut()
            .expect("stale handle: node was detached")
    }

    /// Every core in the machine, in attach order
    ///
    /// Maintained flat by the root so whole-machine CPU iteration does not
    /// depend on tree depth.
    pub fn cores(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.stat.cores.iter().copied()
    }

    /// Aggregated whole-tree statistics
    pub fn stat(&self) -> &TopoStat {
        &self.stat
    }

    /// All descendants of `from` in depth-first attach order
    pub(crate) fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(from).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    fn insert(&mut self, node: TopoNode) -> NodeId {
        match self.free_slots.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id.0] = None;
        self.free_slots.push(id.0);
    }
}

/// # Hotplug mutation
impl Topology {
    /// Create a node per `spec` and attach it under `parent`
    ///
    /// Every precondition is validated before any mutation, so a failed
    /// attach leaves the tree exactly as it was. On success the node gets
    /// its deterministic global name, a sibling index (the requested one, or
    /// the lowest free one), and the attach is propagated bottom-up into the
    /// root statistics.
    pub fn attach(&mut self, parent: NodeId, spec: NodeSpec) -> Result<NodeId, TopoError> {
        let level = spec.kind.level();
        if !self.supported_levels.contains_level(level) {
            return Err(TopoError::UnsupportedLevel { level });
        }

        let parent_node = self.node(parent);

        // No hybrid topologies: every sibling shares one concrete kind
        if let Some(&first) = parent_node.children.first() {
            let sibling = self.node(first).kind;
            if sibling != spec.kind {
                return Err(TopoError::HeterogeneousSiblings {
                    parent: parent_node.name.clone(),
                    child: spec.kind,
                    sibling,
                });
            }
        }

        if level >= parent_node.level() {
            return Err(TopoError::LevelOrdering {
                parent: parent_node.name.clone(),
                parent_level: parent_node.level(),
                child: level,
            });
        }

        if parent_node.child_level != TopoLevel::Unknown && parent_node.child_level != level {
            return Err(TopoError::LevelConflict {
                parent: parent_node.name.clone(),
                expected: parent_node.child_level,
                found: level,
            });
        }

        if parent_node.max_children != 0 && parent_node.num_children() >= parent_node.max_children
        {
            return Err(TopoError::ParentFull {
                parent: parent_node.name.clone(),
                max_children: parent_node.max_children,
                num_children: parent_node.num_children(),
            });
        }

        let index = self.resolve_index(parent, spec.index)?;

        let plugged_threads = if spec.kind == NodeKind::Core {
            let plugged = spec.plugged_threads.unwrap_or(spec.thread_capacity);
            if plugged > spec.thread_capacity {
                return Err(TopoError::PluggedThreadsExceedCapacity {
                    plugged_threads: plugged,
                    thread_capacity: spec.thread_capacity,
                });
            }
            plugged
        } else {
            0
        };

        // All preconditions hold; from here on nothing can fail
        let mut node = TopoNode::new(spec.kind, self.global_name(level));
        node.index = Some(index);
        node.parent = Some(parent);
        if spec.kind == NodeKind::Core {
            node.max_children = spec.thread_capacity;
            node.plugged_threads = plugged_threads;
        }
        let id = self.insert(node);

        let parent_node = self.node_mut(parent);
        if parent_node.child_level == TopoLevel::Unknown {
            parent_node.child_level = level;
        }
        parent_node.children.push(id);
        let num_children = parent_node.num_children();

        if index == self.node(parent).free_child_index {
            // Fast path: the new index sits at the no-gap high-water mark,
            // so the next free one is right above it. A hole below the mark
            // forces the linear rescan.
            let next = if index + 1 == num_children {
                index + 1
            } else {
                self.lowest_free_index(parent)
            };
            self.node_mut(parent).free_child_index = next;
        }

        self.notify(id, true);
        Ok(id)
    }

    /// Detach `node` from its parent and destroy it
    ///
    /// Teardown is leaves-first by contract: a node still holding children
    /// refuses to detach. Detaching the root is a hierarchy no-op (the root
    /// is torn down with the `Topology` itself).
    pub fn detach(&mut self, id: NodeId) -> Result<(), TopoError> {
        let node = self.node(id);
        if !node.children.is_empty() {
            return Err(TopoError::HasChildren {
                node: node.name.clone(),
                num_children: node.num_children(),
            });
        }

        let Some(parent) = node.parent else {
            return Ok(());
        };

        // Statistics go first, while the node is still linked
        self.notify(id, false);

        let index = self.node(id).index.expect("attached non-root node has an index");
        let parent_node = self.node_mut(parent);
        parent_node.children.retain(|&child| child != id);
        if index < parent_node.free_child_index {
            parent_node.free_child_index = index;
        }
        if parent_node.children.is_empty() {
            parent_node.child_level = TopoLevel::Unknown;
        }

        self.release(id);
        Ok(())
    }

    /// Deterministic global name: `"<level>[<units ever attached>]"`, read
    /// from the aggregator immediately before creation
    fn global_name(&self, level: TopoLevel) -> String {
        format!("{level}[{}]", self.stat.total_units(level))
    }

    /// Resolve the sibling index for a new child of `parent`
    fn resolve_index(&self, parent: NodeId, requested: Option<u32>) -> Result<u32, TopoError> {
        let parent_node = self.node(parent);
        let hint = parent_node.free_child_index;
        match requested {
            None => Ok(hint),
            Some(index) if index == hint => Ok(index),
            Some(index) => {
                if parent_node.max_children != 0 && index >= parent_node.max_children {
                    return Err(TopoError::IndexOutOfRange {
                        parent: parent_node.name.clone(),
                        index,
                        max_children: parent_node.max_children,
                    });
                }
                if parent_node
                    .children
                    .iter()
                    .any(|&child| self.node(child).index == Some(index))
                {
                    return Err(TopoError::DuplicateIndex {
                        parent: parent_node.name.clone(),
                        index,
                    });
                }
                Ok(index)
            }
        }
    }

    /// Lowest index no child of `parent` currently holds
    fn lowest_free_index(&self, parent: NodeId) -> u32 {
        let children = &self.node(parent).children;
        (0..=children.len() as u32)
            .find(|candidate| {
                !children
                    .iter()
                    .any(|&child| self.node(child).index == Some(*candidate))
            })
            .expect("n children cannot occupy every index in 0..=n")
    }

    /// Propagate an attach/detach bottom-up through every ancestor
    ///
    /// Each ancestor gets a chance to observe the event; the root is the one
    /// ancestor that reacts, feeding the statistics aggregator.
    fn notify(&mut self, child: NodeId, is_attach: bool) {
        let child_node = self.nodes[child.0]
            .as_ref()
            .expect("notified node is alive");
        let parent = child_node.parent.expect("notified node has a parent");

        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            let ancestor_node = self.nodes[id.0].as_ref().expect("ancestors are alive");
            if ancestor_node.kind == NodeKind::Root {
                let parent_children = self.nodes[parent.0]
                    .as_ref()
                    .expect("parent of notified node is alive")
                    .num_children();
                if is_attach {
                    self.stat.record_attach(child, child_node, parent_children);
                } else {
                    self.stat.record_detach(child, child_node);
                }
            }
            ancestor = self.nodes[id.0].as_ref().expect("ancestors are alive").parent;
        }
    }
}
//
impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}
