//! Topology error taxonomy
//!
//! Every error this crate reports is a structural or configuration problem:
//! retrying the same operation on the same tree will fail the same way, so
//! none of these are worth retrying. Variants carry the level, index and
//! parent identity needed to turn them into an actionable message.

use crate::level::TopoLevel;
use crate::node::NodeKind;
use thiserror::Error;

/// Error reported by topology construction, mutation or validation
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum TopoError {
    /// The machine configuration permanently excludes this level
    #[error("cpu topo: the {level} level is not supported by this machine")]
    UnsupportedLevel {
        /// Level of the node that was being attached
        level: TopoLevel,
    },

    /// All children of one parent must share one concrete kind
    ///
    /// Hybrid ("big.LITTLE") topologies are out of scope, so a parent with a
    /// `{sibling}` child refuses a `{child}` one.
    #[error(
        "cpu topo: different topology kinds ({child} child vs {sibling} \
         sibling) under the same parent ({parent})"
    )]
    HeterogeneousSiblings {
        /// Name of the parent whose children disagree
        parent: String,
        /// Kind of the node that was being attached
        child: NodeKind,
        /// Kind of the children already present
        sibling: NodeKind,
    },

    /// A node can only attach strictly below its parent's level
    #[error(
        "cpu topo: the {child} level should be lower than the parent's \
         {parent_level} level ({parent})"
    )]
    LevelOrdering {
        /// Name of the intended parent
        parent: String,
        /// Level of the intended parent
        parent_level: TopoLevel,
        /// Level of the node that was being attached
        child: TopoLevel,
    },

    /// The parent's child level is already decided and differs
    #[error(
        "cpu topo: the parent {parent} asks for a {expected} child, \
         but a {found} was attached"
    )]
    LevelConflict {
        /// Name of the intended parent
        parent: String,
        /// Child level the parent already committed to
        expected: TopoLevel,
        /// Level of the node that was being attached
        found: TopoLevel,
    },

    /// The parent's configured child capacity is exhausted
    #[error(
        "cpu topo: the parent {parent} limits the children to \
         {max_children}, currently it has {num_children}"
    )]
    ParentFull {
        /// Name of the intended parent
        parent: String,
        /// Configured child capacity
        max_children: u32,
        /// Children already attached
        num_children: u32,
    },

    /// Detach requires a childless node; teardown proceeds leaves-first
    #[error("cpu topo: cannot detach {node}, it still has {num_children} children")]
    HasChildren {
        /// Name of the node that was being detached
        node: String,
        /// Children still attached under it
        num_children: u32,
    },

    /// The explicitly requested sibling index is already taken
    #[error("cpu topo: the index {index} is already taken under the parent {parent}")]
    DuplicateIndex {
        /// Name of the intended parent
        parent: String,
        /// Requested index
        index: u32,
    },

    /// The explicitly requested index exceeds the parent's capacity
    #[error(
        "cpu topo: the index {index} is out of the parent {parent} \
         range of {max_children} children"
    )]
    IndexOutOfRange {
        /// Name of the intended parent
        parent: String,
        /// Requested index
        index: u32,
        /// Configured child capacity
        max_children: u32,
    },

    /// Default topologies can only be built at core or thread granularity
    #[error(
        "only core/thread granularity is supported for building the \
         default cpu topology, not {granularity} granularity"
    )]
    UnsupportedGranularity {
        /// The offending configured granularity
        granularity: TopoLevel,
    },

    /// A core cannot start with more threads plugged than it can hold
    #[error(
        "plugged threads ({plugged_threads}) must not be more than \
         max threads ({thread_capacity})"
    )]
    PluggedThreadsExceedCapacity {
        /// Requested initially-plugged thread count
        plugged_threads: u32,
        /// The core's configured thread capacity
        thread_capacity: u32,
    },

    /// A non-thread node has neither children nor a configured capacity
    #[error("invalid topology: the cpu topology (level: {level}, index: {index}) isn't completed")]
    IncompleteTopology {
        /// Level of the incomplete node
        level: TopoLevel,
        /// Sibling index of the incomplete node
        index: u32,
    },

    /// A node resolved to the `Unknown` level
    ///
    /// Unreachable after construction; kept as a defensive validation check.
    #[error("invalid cpu topology: unknown topology level")]
    UnknownLevel,

    /// A node expected to have descendants never recorded a child level
    #[error(
        "invalid cpu topology: incomplete topology \
         (level: {level}, index: {index}), no child level"
    )]
    MissingChildLevel {
        /// Level of the node missing a child level
        level: TopoLevel,
        /// Sibling index of that node
        index: u32,
    },

    /// Nodes at one level disagree on their fan-out to the next level down
    #[error(
        "invalid smp topology: the {level} topology is asymmetric \
         ({expected} vs {found} {child_level} units)"
    )]
    AsymmetricTopology {
        /// Level of the node whose fan-out disagrees
        level: TopoLevel,
        /// Level of the children being counted
        child_level: TopoLevel,
        /// Largest fan-out recorded anywhere at that child level
        expected: u32,
        /// This node's actual fan-out
        found: u32,
    },

    /// One branch of the tree skips a level another branch has
    #[error(
        "invalid smp topology: asymmetric cpu topology depth \
         ({next} is present above {child_level}, expected {level})"
    )]
    AsymmetricDepth {
        /// Level of the node being checked
        level: TopoLevel,
        /// Its child level
        child_level: TopoLevel,
        /// Closest level present above the child level, machine-wide
        next: TopoLevel,
    },

    /// The aggregator and the tree structure disagree
    ///
    /// This is a programming-error assertion, not a user-facing
    /// configuration error: it cannot fire unless statistics propagation
    /// and the per-node structure have diverged.
    #[error(
        "cpu topology statistics diverged from the tree: per-level counts \
         yield {product} cpus, the aggregator recorded {max_cpus}"
    )]
    InternalInconsistency {
        /// Product of the per-level flat counts
        product: u64,
        /// Total CPU capacity recorded by the aggregator
        max_cpus: u32,
    },
}
