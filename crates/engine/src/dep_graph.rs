//! Dependency graph for formula cells.
//!
//! Tracks, for every cell, the cells its formula reads (`depends_on`) and
//! the cells that read it (`dependents`) for cycle checks and ordered
//! recomputation.
//!
//! # Edge Direction
//!
//! ```text
//! A -> B  means  "B depends on A"  (A is an input of B)
//! ```
//!
//! This makes "what must be recomputed if A changes?" trivial: follow
//! outgoing edges.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::{FxHashMap, FxHashSet};

use calcgrid_core::CellRef;

/// Bidirectional adjacency for formula cells.
///
/// Maintains both directions for O(1) lookups:
/// - `preds[B]` = cells that B's formula reads
/// - `succs[A]` = cells whose formulas read A
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** If A is in preds[B] then B is in succs[A], and vice versa.
/// 2. **No dangling entries:** Empty sets are removed, not stored.
/// 3. **No duplicate edges:** Set semantics enforced by FxHashSet.
/// 4. **Atomic updates:** `replace_edges` is the only mutator that touches both maps.
/// 5. **Acyclic:** every mutation passes `would_create_cycle` first, so the
///    graph never contains a cycle.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// For each formula cell B, the cells A it reads. B -> {A1, A2, ...}
    preds: FxHashMap<CellRef, FxHashSet<CellRef>>,

    /// For each read cell A, the formula cells B reading it. A -> {B1, B2, ...}
    succs: FxHashMap<CellRef, FxHashSet<CellRef>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cells this cell's formula reads (incoming edges).
    pub fn depends_on(&self, cell: CellRef) -> impl Iterator<Item = CellRef> + '_ {
        self.preds
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// The cells that read this cell (outgoing edges).
    pub fn dependents(&self, cell: CellRef) -> impl Iterator<Item = CellRef> + '_ {
        self.succs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Replace all edges for a formula cell atomically.
    ///
    /// This is the only mutation API. It:
    /// 1. Removes the cell from all its old inputs' dependent sets
    /// 2. Clears the cell's input set
    /// 3. Adds the cell to all new inputs' dependent sets
    /// 4. Stores the cell's new input set
    ///
    /// Pass an empty set to clear all edges for this cell (the cell became
    /// a literal).
    pub fn replace_edges(&mut self, cell: CellRef, new_preds: FxHashSet<CellRef>) {
        if let Some(old_preds) = self.preds.remove(&cell) {
            for pred in old_preds {
                if let Some(deps) = self.succs.get_mut(&pred) {
                    deps.remove(&cell);
                    // Clean up empty entries (invariant: no dangling)
                    if deps.is_empty() {
                        self.succs.remove(&pred);
                    }
                }
            }
        }

        if new_preds.is_empty() {
            return;
        }

        for pred in &new_preds {
            self.succs.entry(*pred).or_default().insert(cell);
        }
        self.preds.insert(cell, new_preds);
    }

    /// Clear all edges for a cell. Convenience wrapper around
    /// `replace_edges` with an empty set.
    pub fn clear_cell(&mut self, cell: CellRef) {
        self.replace_edges(cell, FxHashSet::default());
    }

    /// Would replacing `cell`'s inputs with `new_preds` make `cell`
    /// reachable from itself?
    ///
    /// Non-mutating. A self-reference is trivially a cycle. Otherwise a
    /// cycle exists iff some candidate input can already reach `cell`,
    /// which we probe as an explicit-stack DFS from `cell` along dependent
    /// edges looking for any candidate; `cell`'s own old input edges
    /// cannot occur on such a path, so the hypothetical replacement needs
    /// no graph surgery.
    pub fn would_create_cycle(&self, cell: CellRef, new_preds: &FxHashSet<CellRef>) -> bool {
        if new_preds.contains(&cell) {
            return true;
        }

        let mut visited = FxHashSet::default();
        let mut stack = vec![cell];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(deps) = self.succs.get(&current) {
                for &dep in deps {
                    if new_preds.contains(&dep) {
                        return true;
                    }
                    stack.push(dep);
                }
            }
        }

        false
    }

    /// The cells transitively reachable from `start` along dependent
    /// edges (excluding `start`), in recompute order: a cell appears only
    /// after every cell it reads that is also in the set. Ties between
    /// unordered cells break ascending `(row, col)`.
    ///
    /// Kahn's algorithm over the induced subgraph, with a min-heap as the
    /// ready queue. Explicit worklists throughout: recursion depth never
    /// scales with the sheet.
    pub fn dirty_order(&self, start: CellRef) -> Vec<CellRef> {
        // Collect the affected set.
        let mut affected: FxHashSet<CellRef> = FxHashSet::default();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if let Some(deps) = self.succs.get(&current) {
                for &dep in deps {
                    if affected.insert(dep) {
                        stack.push(dep);
                    }
                }
            }
        }

        // In-degree within the induced subgraph: inputs outside the
        // affected set (including `start` itself) impose no ordering.
        let mut in_degree: FxHashMap<CellRef, usize> = FxHashMap::default();
        for &cell in &affected {
            let degree = self
                .preds
                .get(&cell)
                .map(|preds| preds.iter().filter(|p| affected.contains(p)).count())
                .unwrap_or(0);
            in_degree.insert(cell, degree);
        }

        let mut ready: BinaryHeap<Reverse<CellRef>> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&cell, _)| Reverse(cell))
            .collect();

        let mut order = Vec::with_capacity(affected.len());
        while let Some(Reverse(cell)) = ready.pop() {
            order.push(cell);
            if let Some(deps) = self.succs.get(&cell) {
                for &dep in deps {
                    if let Some(deg) = in_degree.get_mut(&dep) {
                        *deg -= 1;
                        if *deg == 0 {
                            ready.push(Reverse(dep));
                        }
                    }
                }
            }
        }

        // Invariant 5 guarantees the subgraph is acyclic, so Kahn's drains it.
        debug_assert_eq!(order.len(), affected.len());
        order
    }

    /// Check all invariants. Panics if any are violated.
    ///
    /// Only available in test builds.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (cell, preds) in &self.preds {
            for pred in preds {
                assert!(
                    self.succs.get(pred).is_some_and(|s| s.contains(cell)),
                    "Missing succ edge: {:?} should have {:?} in dependents",
                    pred,
                    cell
                );
            }
        }

        for (cell, dependents) in &self.succs {
            for dep in dependents {
                assert!(
                    self.preds.get(dep).is_some_and(|s| s.contains(cell)),
                    "Missing pred edge: {:?} should have {:?} in inputs",
                    dep,
                    cell
                );
            }
        }

        for (cell, preds) in &self.preds {
            assert!(!preds.is_empty(), "Empty preds set stored for {:?}", cell);
        }
        for (cell, succs) in &self.succs {
            assert!(!succs.is_empty(), "Empty succs set stored for {:?}", cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: usize, col: usize) -> CellRef {
        CellRef::new(row, col)
    }

    fn set(cells: &[CellRef]) -> FxHashSet<CellRef> {
        cells.iter().copied().collect()
    }

    #[test]
    fn test_empty_graph() {
        let graph = DepGraph::new();
        assert_eq!(graph.depends_on(cell(0, 0)).count(), 0);
        assert_eq!(graph.dependents(cell(0, 0)).count(), 0);
        assert!(graph.dirty_order(cell(0, 0)).is_empty());
        graph.assert_consistent();
    }

    #[test]
    fn test_single_edge() {
        // B1 = A1
        let mut graph = DepGraph::new();
        let a1 = cell(0, 0);
        let b1 = cell(0, 1);

        graph.replace_edges(b1, set(&[a1]));
        graph.assert_consistent();

        assert_eq!(graph.depends_on(b1).collect::<Vec<_>>(), vec![a1]);
        assert_eq!(graph.dependents(a1).collect::<Vec<_>>(), vec![b1]);
    }

    #[test]
    fn test_edges_are_exact_inverses() {
        let mut graph = DepGraph::new();
        let a1 = cell(0, 0);
        let b1 = cell(0, 1);
        let c1 = cell(0, 2);

        graph.replace_edges(c1, set(&[a1, b1]));
        graph.replace_edges(b1, set(&[a1]));
        graph.assert_consistent();

        let mut c1_reads: Vec<_> = graph.depends_on(c1).collect();
        c1_reads.sort();
        assert_eq!(c1_reads, vec![a1, b1]);

        let mut a1_read_by: Vec<_> = graph.dependents(a1).collect();
        a1_read_by.sort();
        assert_eq!(a1_read_by, vec![b1, c1]);
    }

    #[test]
    fn test_rewiring_drops_stale_edges() {
        // B1 = A1, then B1 = A2
        let mut graph = DepGraph::new();
        let a1 = cell(0, 0);
        let a2 = cell(1, 0);
        let b1 = cell(0, 1);

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(b1, set(&[a2]));
        graph.assert_consistent();

        assert_eq!(graph.depends_on(b1).collect::<Vec<_>>(), vec![a2]);
        assert_eq!(graph.dependents(a2).collect::<Vec<_>>(), vec![b1]);
        assert_eq!(graph.dependents(a1).count(), 0);
    }

    #[test]
    fn test_clear_cell() {
        let mut graph = DepGraph::new();
        let a1 = cell(0, 0);
        let b1 = cell(0, 1);

        graph.replace_edges(b1, set(&[a1]));
        graph.clear_cell(b1);
        graph.assert_consistent();

        assert_eq!(graph.depends_on(b1).count(), 0);
        assert_eq!(graph.dependents(a1).count(), 0);
    }

    #[test]
    fn test_replace_edges_idempotent_inserts() {
        let mut graph = DepGraph::new();
        let a1 = cell(0, 0);
        let b1 = cell(0, 1);

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(b1, set(&[a1]));
        graph.assert_consistent();

        assert_eq!(graph.depends_on(b1).count(), 1);
        assert_eq!(graph.dependents(a1).count(), 1);
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let graph = DepGraph::new();
        let a1 = cell(0, 0);
        assert!(graph.would_create_cycle(a1, &set(&[a1])));
    }

    #[test]
    fn test_two_cell_cycle() {
        // A1 = B1 accepted, then B1 = A1 must be a cycle
        let mut graph = DepGraph::new();
        let a1 = cell(0, 0);
        let b1 = cell(0, 1);

        graph.replace_edges(a1, set(&[b1]));
        assert!(graph.would_create_cycle(b1, &set(&[a1])));
    }

    #[test]
    fn test_indirect_cycle() {
        // A -> B -> C, then C's inputs gaining A closes the loop... probe A
        let mut graph = DepGraph::new();
        let a = cell(0, 0);
        let b = cell(0, 1);
        let c = cell(0, 2);

        graph.replace_edges(b, set(&[a]));
        graph.replace_edges(c, set(&[b]));
        assert!(graph.would_create_cycle(a, &set(&[c])));
    }

    #[test]
    fn test_no_false_cycle() {
        let mut graph = DepGraph::new();
        let a = cell(0, 0);
        let b = cell(0, 1);
        let c = cell(0, 2);
        let d = cell(0, 3);

        graph.replace_edges(b, set(&[a]));
        graph.replace_edges(c, set(&[b]));
        assert!(!graph.would_create_cycle(d, &set(&[c])));
        // Diamond reconvergence is not a cycle
        assert!(!graph.would_create_cycle(d, &set(&[b, c])));
    }

    #[test]
    fn test_cycle_probe_does_not_mutate() {
        let mut graph = DepGraph::new();
        let a1 = cell(0, 0);
        let b1 = cell(0, 1);

        graph.replace_edges(a1, set(&[b1]));
        let _ = graph.would_create_cycle(b1, &set(&[a1]));
        graph.assert_consistent();

        assert_eq!(graph.depends_on(b1).count(), 0);
        assert_eq!(graph.depends_on(a1).collect::<Vec<_>>(), vec![b1]);
    }

    #[test]
    fn test_dirty_order_chain() {
        // A -> B -> C -> D
        let mut graph = DepGraph::new();
        let a = cell(0, 0);
        let b = cell(0, 1);
        let c = cell(0, 2);
        let d = cell(0, 3);

        graph.replace_edges(b, set(&[a]));
        graph.replace_edges(c, set(&[b]));
        graph.replace_edges(d, set(&[c]));

        assert_eq!(graph.dirty_order(a), vec![b, c, d]);
        assert_eq!(graph.dirty_order(b), vec![c, d]);
        assert_eq!(graph.dirty_order(d), Vec::<CellRef>::new());
    }

    #[test]
    fn test_dirty_order_diamond() {
        //     A
        //    / \
        //   B   C
        //    \ /
        //     D
        let mut graph = DepGraph::new();
        let a = cell(0, 0);
        let b = cell(0, 1);
        let c = cell(0, 2);
        let d = cell(0, 3);

        graph.replace_edges(b, set(&[a]));
        graph.replace_edges(c, set(&[a]));
        graph.replace_edges(d, set(&[b, c]));

        // D recomputes once, after both B and C; B before C by (row, col)
        assert_eq!(graph.dirty_order(a), vec![b, c, d]);
    }

    #[test]
    fn test_dirty_order_excludes_start_and_unrelated() {
        let mut graph = DepGraph::new();
        let a = cell(0, 0);
        let b = cell(0, 1);
        let x = cell(5, 5);
        let y = cell(5, 6);

        graph.replace_edges(b, set(&[a]));
        graph.replace_edges(y, set(&[x]));

        let order = graph.dirty_order(a);
        assert_eq!(order, vec![b]);
        assert!(!order.contains(&a));
        assert!(!order.contains(&y));
    }

    #[test]
    fn test_dirty_order_tie_break_ascending() {
        // A feeds D1, C1, B1 (inserted out of order): ties break by (row, col)
        let mut graph = DepGraph::new();
        let a = cell(1, 0);
        let b1 = cell(0, 1);
        let c1 = cell(0, 2);
        let d1 = cell(0, 3);

        graph.replace_edges(d1, set(&[a]));
        graph.replace_edges(b1, set(&[a]));
        graph.replace_edges(c1, set(&[a]));

        assert_eq!(graph.dirty_order(a), vec![b1, c1, d1]);
    }

    #[test]
    fn test_dirty_order_respects_cross_links() {
        // A -> B, A -> C, C -> B: B must come after C even though B < C
        let mut graph = DepGraph::new();
        let a = cell(0, 0);
        let b = cell(0, 1);
        let c = cell(0, 2);

        graph.replace_edges(b, set(&[a, c]));
        graph.replace_edges(c, set(&[a]));

        assert_eq!(graph.dirty_order(a), vec![c, b]);
    }

    #[test]
    fn test_dirty_order_deep_chain_iterative() {
        // Deep chains must not overflow the call stack
        let mut graph = DepGraph::new();
        let n = 50_000;
        for i in 1..n {
            graph.replace_edges(cell(i, 0), set(&[cell(i - 1, 0)]));
        }
        let order = graph.dirty_order(cell(0, 0));
        assert_eq!(order.len(), n - 1);
        assert_eq!(order[0], cell(1, 0));
        assert_eq!(order[n - 2], cell(n - 1, 0));

        // The probe walks the same depth without recursing
        assert!(graph.would_create_cycle(cell(0, 0), &set(&[cell(n - 1, 0)])));
    }
}
