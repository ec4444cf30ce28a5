//! Topology tree elements
//!
//! A [`Topology`](crate::topology::Topology) owns its nodes in an arena and
//! hands out [`NodeId`] handles. [`TopoNode`] is the generic tree element
//! every level shares: parent/child links, the sibling index, the committed
//! child level and the free-index hint. The concrete unit kinds form the
//! small closed set [`NodeKind`]; the only kind carrying extra state is the
//! core, which records its thread capacity and how many of those threads are
//! currently plugged.

use crate::level::TopoLevel;
use derive_more::{Display, From, Into};
use std::fmt;

/// Stable handle to a node owned by a [`Topology`](crate::topology::Topology)
///
/// Handles stay valid until the node they designate is detached; using a
/// stale handle is a caller bug and panics on access.
#[derive(Copy, Clone, Debug, Display, Eq, From, Hash, Into, PartialEq)]
pub struct NodeId(pub(crate) usize);

/// Concrete kind of topology unit
///
/// One kind per materialized level: threads exist only as a core's capacity
/// count and the root is the per-machine singleton. The set is closed on
/// purpose; level and behavior are resolved by `match`, not dynamic dispatch.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    /// Thread-bearing core
    Core,
    /// Core cluster
    Cluster,
    /// Die
    Die,
    /// Socket
    Socket,
    /// Book
    Book,
    /// Drawer
    Drawer,
    /// The machine-wide root
    Root,
}
//
impl NodeKind {
    /// Topology level every node of this kind occupies
    pub fn level(self) -> TopoLevel {
        match self {
            Self::Core => TopoLevel::Core,
            Self::Cluster => TopoLevel::Cluster,
            Self::Die => TopoLevel::Die,
            Self::Socket => TopoLevel::Socket,
            Self::Book => TopoLevel::Book,
            Self::Drawer => TopoLevel::Drawer,
            Self::Root => TopoLevel::Root,
        }
    }

    /// Kind in charge of `level`, if that level is materialized as nodes
    pub fn for_level(level: TopoLevel) -> Option<Self> {
        match level {
            TopoLevel::Core => Some(Self::Core),
            TopoLevel::Cluster => Some(Self::Cluster),
            TopoLevel::Die => Some(Self::Die),
            TopoLevel::Socket => Some(Self::Socket),
            TopoLevel::Book => Some(Self::Book),
            TopoLevel::Drawer => Some(Self::Drawer),
            TopoLevel::Root => Some(Self::Root),
            TopoLevel::Unknown | TopoLevel::Thread => None,
        }
    }
}

/// Request describing one node to attach
///
/// ```
/// use vcpu_topology::{NodeKind, NodeSpec};
///
/// let socket = NodeSpec::new(NodeKind::Socket);
/// let second_socket = NodeSpec::new(NodeKind::Socket).at_index(1);
/// let core = NodeSpec::core(4).plugged(2);
/// ```
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct NodeSpec {
    pub(crate) kind: NodeKind,
    pub(crate) index: Option<u32>,
    pub(crate) thread_capacity: u32,
    pub(crate) plugged_threads: Option<u32>,
}
//
impl NodeSpec {
    /// Request for a plain unit of `kind`
    ///
    /// For cores, prefer [`NodeSpec::core()`], which sets the thread
    /// capacity.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            index: None,
            thread_capacity: 0,
            plugged_threads: None,
        }
    }

    /// Request for a core with room for `thread_capacity` threads
    ///
    /// All threads start plugged unless [`plugged()`](Self::plugged) says
    /// otherwise.
    pub fn core(thread_capacity: u32) -> Self {
        Self {
            thread_capacity,
            ..Self::new(NodeKind::Core)
        }
    }

    /// Claim a specific sibling index instead of the lowest free one
    pub fn at_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    /// Number of threads initially plugged (cores only)
    ///
    /// Must not exceed the core's thread capacity.
    pub fn plugged(mut self, threads: u32) -> Self {
        self.plugged_threads = Some(threads);
        self
    }
}

/// One physical unit at one topology level
///
/// Nodes are owned by their parent's child collection inside a
/// [`Topology`](crate::topology::Topology); callers read them through
/// [`Topology::node()`](crate::topology::Topology::node) and never hold one
/// directly.
#[derive(Clone, Debug)]
pub struct TopoNode {
    pub(crate) kind: NodeKind,
    pub(crate) name: String,
    pub(crate) index: Option<u32>,
    pub(crate) max_children: u32,
    pub(crate) child_level: TopoLevel,
    pub(crate) free_child_index: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) plugged_threads: u32,
}
//
impl TopoNode {
    pub(crate) fn new(kind: NodeKind, name: String) -> Self {
        Self {
            kind,
            name,
            index: None,
            max_children: 0,
            // A core's child can only be the thread
            child_level: match kind {
                NodeKind::Core => TopoLevel::Thread,
                _ => TopoLevel::Unknown,
            },
            free_child_index: 0,
            parent: None,
            children: Vec::new(),
            plugged_threads: 0,
        }
    }

    /// Concrete kind of this unit
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Level this unit occupies, fixed by its kind
    pub fn level(&self) -> TopoLevel {
        self.kind.level()
    }

    /// Deterministic global name, `"<level>[<n>]"`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot number among siblings; `None` before attachment and for the root
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    /// Configured child capacity, 0 meaning unbounded
    ///
    /// For a core this equals its thread capacity.
    pub fn max_children(&self) -> u32 {
        self.max_children
    }

    /// Level every current and future child must have
    ///
    /// `Unknown` until the first child attaches; reset when the last child
    /// detaches. Cores are born committed to `Thread`.
    pub fn child_level(&self) -> TopoLevel {
        self.child_level
    }

    /// Handle of the owning parent, `None` for the root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in attach order (not necessarily index order)
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of currently attached children
    pub fn num_children(&self) -> u32 {
        self.children.len() as u32
    }

    /// Thread capacity of a core (0 for every other kind)
    pub fn thread_capacity(&self) -> u32 {
        match self.kind {
            NodeKind::Core => self.max_children,
            _ => 0,
        }
    }

    /// Threads currently plugged into a core (0 for every other kind)
    pub fn plugged_threads(&self) -> u32 {
        self.plugged_threads
    }
}
//
impl fmt::Display for TopoNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.name)
    }
}
