//! Virtual CPU topology for machine device models
//!
//! This library models the processor topology of a virtualized
//! multiprocessor machine: a strict hierarchy of nesting levels (thread →
//! core → cluster → die → socket → book → drawer → root) that a
//! hypervisor's device model builds, validates and keeps statistically
//! summarized as virtual CPUs are plugged and unplugged, potentially after
//! the guest has started running.
//!
//! The [`Topology`] owns the whole tree in an arena and is the single
//! mutation point. Units are hotplugged with [`Topology::attach()`] and
//! removed leaves-first with [`Topology::detach()`]; every successful
//! change is propagated bottom-up into the root's statistics, which track
//! live per-level totals, high-water fan-out maxima and a flat list of all
//! cores. At machine-init time [`Topology::validate_or_build()`] either
//! synthesizes the default tree from flat per-level counts or validates an
//! explicitly built one and derives its flat counts.
//!
//! # Example
//!
//! ```
//! use vcpu_topology::{FlatCounts, Topology};
//!
//! // -smp 3,sockets=1,cores=2,threads=2,maxcpus=4
//! let counts = FlatCounts {
//!     cpus: 3,
//!     cores: 2,
//!     threads: 2,
//!     max_cpus: 4,
//!     ..FlatCounts::default()
//! };
//!
//! let mut topo = Topology::new();
//! topo.build_default_topology(&counts)?;
//!
//! assert_eq!(topo.cores().count(), 2);
//! assert_eq!(topo.stat().max_cpus(), 4);
//! assert_eq!(topo.stat().pre_plugged_cpus(), 3);
//! # Ok::<(), vcpu_topology::TopoError>(())
//! ```
//!
//! Heterogeneous ("big.LITTLE") topologies, NUMA/memory topology and guest
//! scheduling are out of scope: this crate only tracks the shape and
//! cardinality of the CPU hierarchy.

pub mod counts;
pub mod errors;
pub mod level;
pub mod node;
pub mod topology;

pub use self::counts::FlatCounts;
pub use self::errors::TopoError;
pub use self::level::{LevelSet, TopoLevel};
pub use self::node::{NodeId, NodeKind, NodeSpec, TopoNode};
pub use self::topology::stats::{StatEntry, TopoStat};
pub use self::topology::Topology;
