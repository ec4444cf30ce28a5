//! Flat per-level configuration counts
//!
//! The flat-configuration collaborator (command line, management API) speaks
//! in per-level cardinalities rather than trees. [`FlatCounts`] is that
//! record: the builder consumes it to synthesize a default tree, and the
//! validator back-fills it from an explicitly built one.

use crate::level::TopoLevel;

/// Flat counts equivalent to a topology tree shape
///
/// One count per level plus the two machine-wide CPU totals. A complete
/// configuration has every level count ≥ 1 (absent levels contribute a
/// cardinality of 1), so the product of all level counts equals `max_cpus`.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct FlatCounts {
    /// CPUs present at boot (pre-plugged)
    pub cpus: u32,
    /// Drawers per machine
    pub drawers: u32,
    /// Books per drawer
    pub books: u32,
    /// Sockets per book
    pub sockets: u32,
    /// Dies per socket
    pub dies: u32,
    /// Clusters per die
    pub clusters: u32,
    /// Cores per cluster
    pub cores: u32,
    /// Threads per core
    pub threads: u32,
    /// Total CPU capacity of the machine
    pub max_cpus: u32,
}
//
impl Default for FlatCounts {
    /// A single-CPU machine: one unit at every level
    fn default() -> Self {
        Self {
            cpus: 1,
            drawers: 1,
            books: 1,
            sockets: 1,
            dies: 1,
            clusters: 1,
            cores: 1,
            threads: 1,
            max_cpus: 1,
        }
    }
}
//
impl FlatCounts {
    /// Count configured for `level`
    ///
    /// # Panics
    ///
    /// There is no count for the root or the `Unknown` sentinel.
    pub fn count(&self, level: TopoLevel) -> u32 {
        match level {
            TopoLevel::Thread => self.threads,
            TopoLevel::Core => self.cores,
            TopoLevel::Cluster => self.clusters,
            TopoLevel::Die => self.dies,
            TopoLevel::Socket => self.sockets,
            TopoLevel::Book => self.books,
            TopoLevel::Drawer => self.drawers,
            TopoLevel::Unknown | TopoLevel::Root => {
                unreachable!("no flat count for the {level} level")
            }
        }
    }

    /// Set the count for `level`
    ///
    /// # Panics
    ///
    /// There is no count for the root or the `Unknown` sentinel.
    pub fn set_count(&mut self, level: TopoLevel, count: u32) {
        let slot = match level {
            TopoLevel::Thread => &mut self.threads,
            TopoLevel::Core => &mut self.cores,
            TopoLevel::Cluster => &mut self.clusters,
            TopoLevel::Die => &mut self.dies,
            TopoLevel::Socket => &mut self.sockets,
            TopoLevel::Book => &mut self.books,
            TopoLevel::Drawer => &mut self.drawers,
            TopoLevel::Unknown | TopoLevel::Root => {
                unreachable!("no flat count for the {level} level")
            }
        };
        *slot = count;
    }

    /// Product of every per-level count
    ///
    /// Equals the machine's total CPU capacity when the counts are
    /// consistent; widened to `u64` so pathological configurations cannot
    /// overflow the check.
    pub fn product(&self) -> u64 {
        [
            self.drawers,
            self.books,
            self.sockets,
            self.dies,
            self.clusters,
            self.cores,
            self.threads,
        ]
        .iter()
        .map(|count| u64::from(*count))
        .product()
    }
}
