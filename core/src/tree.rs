//! Process tree resolution.
//!
//! Expands a set of root PIDs into the full descendant set using the
//! parent-child links of one process-table snapshot. Output is ordered
//! leaves-first so callers terminate children before parents, which avoids
//! orphaning grandchildren spawned mid-teardown.

use std::collections::{HashMap, HashSet};

use crate::models::ProcessRecord;

/// Traversal depth cap, guarding against parent-link cycles introduced by
/// PID recycling between enumeration and indexing.
const MAX_TREE_DEPTH: usize = 32;

/// Parent→children index over one process-table snapshot.
pub struct ProcessTreeResolver {
    children: HashMap<u32, Vec<u32>>,
}

impl ProcessTreeResolver {
    /// Build the index from a snapshot.
    pub fn from_snapshot(records: &[ProcessRecord]) -> Self {
        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for record in records {
            if let Some(ppid) = record.parent_pid {
                children.entry(ppid).or_default().push(record.pid);
            }
        }
        Self { children }
    }

    /// Expand root PIDs into their full descendant sets, leaves before
    /// roots. Each PID appears at most once even when roots overlap.
    pub fn expand(&self, roots: &[u32]) -> Vec<u32> {
        let mut ordered = Vec::new();
        let mut visited = HashSet::new();

        for &root in roots {
            self.walk(root, 0, &mut visited, &mut ordered);
        }

        ordered
    }

    /// Post-order walk: children are pushed before their parent.
    fn walk(&self, pid: u32, depth: usize, visited: &mut HashSet<u32>, out: &mut Vec<u32>) {
        if depth >= MAX_TREE_DEPTH || !visited.insert(pid) {
            return;
        }

        if let Some(kids) = self.children.get(&pid) {
            for &child in kids {
                self.walk(child, depth + 1, visited, out);
            }
        }

        out.push(pid);
    }
}
