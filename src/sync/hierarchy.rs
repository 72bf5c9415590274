//! Ordering and sanity checks for self-referencing entities.
//!
//! Nodes are written in two passes. Pass A upserts every node without its
//! parent link, roots first and then by increasing depth. Pass B, which only
//! starts once Pass A has drained, writes the parent links.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::{NaturalKey, SourceRow};

/// Where a hierarchical domain keeps its parent link and depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchySpec {
    /// Destination field holding the parent id.
    pub parent_field: &'static str,
    /// Source column holding the parent's natural key.
    pub parent_column: &'static str,
    /// Source column holding the declared depth (1 = top level).
    pub depth_column: &'static str,
}

/// Depth given to nodes whose depth is missing or unreadable.
pub const UNDECLARED_DEPTH: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct HierarchyNode<T> {
    pub key: NaturalKey,
    /// `None` for roots.
    pub parent: Option<NaturalKey>,
    pub depth: u32,
    pub depth_declared: bool,
    pub self_reference: bool,
    pub payload: T,
}

impl<T> HierarchyNode<T> {
    /// Reads the parent and depth columns of `row`.
    ///
    /// An empty parent, `0`, or the node's own key all mean the node is a
    /// root.
    pub fn new(key: NaturalKey, row: &SourceRow, spec: &HierarchySpec, payload: T) -> Self {
        let parent_text = row.text(spec.parent_column);
        let self_reference = parent_text.as_deref() == Some(key.as_str());
        let parent = parent_text
            .filter(|p| p != "0" && p != key.as_str())
            .map(NaturalKey::from);

        let (depth, depth_declared) = match row.get(spec.depth_column).as_i64() {
            Ok(Some(d)) if d >= 0 => (u32::try_from(d).unwrap_or(UNDECLARED_DEPTH), true),
            _ => (UNDECLARED_DEPTH, false),
        };

        Self {
            key,
            parent,
            depth,
            depth_declared,
            self_reference,
            payload,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    fn order_key(&self) -> (bool, u32) {
        (!self.is_root(), self.depth)
    }
}

/// Sorts roots first, then by depth, then by key. The sort is stable, so
/// rows sharing a key keep their source order.
pub fn sort_nodes<T>(nodes: &mut [HierarchyNode<T>]) {
    nodes.sort_by(|a, b| {
        a.order_key()
            .cmp(&b.order_key())
            .then_with(|| a.key.cmp(&b.key))
    });
}

/// Splits sorted nodes into strata that can be written concurrently.
pub fn strata<T>(nodes: &[HierarchyNode<T>]) -> Vec<&[HierarchyNode<T>]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=nodes.len() {
        if i == nodes.len() || nodes[i].order_key() != nodes[start].order_key() {
            if start < i {
                groups.push(&nodes[start..i]);
            }
            start = i;
        }
    }
    groups
}

/// Structural problems found in a batch before it is written. They are
/// reported, never fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HierarchyDiagnostics {
    pub self_references: Vec<NaturalKey>,
    /// Nodes whose parent is not part of the batch.
    pub orphans: Vec<NaturalKey>,
    /// Nodes whose parent chain loops back onto itself.
    pub cycles: Vec<NaturalKey>,
    /// Nodes not deeper than their parent.
    pub depth_violations: Vec<NaturalKey>,
    pub undeclared_depths: Vec<NaturalKey>,
}

impl HierarchyDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.self_references.is_empty()
            && self.orphans.is_empty()
            && self.cycles.is_empty()
            && self.depth_violations.is_empty()
            && self.undeclared_depths.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} self-reference(s), {} orphan(s), {} node(s) in cycles, {} depth violation(s), {} undeclared depth(s)",
            self.self_references.len(),
            self.orphans.len(),
            self.cycles.len(),
            self.depth_violations.len(),
            self.undeclared_depths.len()
        )
    }
}

pub fn diagnose<T>(nodes: &[HierarchyNode<T>]) -> HierarchyDiagnostics {
    let mut by_key: HashMap<&NaturalKey, &HierarchyNode<T>> = HashMap::new();
    for node in nodes {
        by_key.insert(&node.key, node);
    }

    let mut self_references = BTreeSet::new();
    let mut orphans = BTreeSet::new();
    let mut depth_violations = BTreeSet::new();
    let mut undeclared_depths = BTreeSet::new();

    for node in nodes {
        if node.self_reference {
            self_references.insert(node.key.clone());
        }
        if !node.depth_declared {
            undeclared_depths.insert(node.key.clone());
        }
        let Some(parent_key) = &node.parent else {
            continue;
        };
        match by_key.get(parent_key) {
            None => {
                orphans.insert(node.key.clone());
            }
            Some(parent) => {
                if node.depth_declared && parent.depth_declared && parent.depth >= node.depth {
                    depth_violations.insert(node.key.clone());
                }
            }
        }
    }

    let mut cycles = BTreeSet::new();
    for start in by_key.keys() {
        let mut seen = HashSet::new();
        let mut current = *start;
        while let Some(parent) = by_key.get(current).and_then(|n| n.parent.as_ref()) {
            if parent == *start {
                cycles.insert((*start).clone());
                break;
            }
            if !seen.insert(parent) || !by_key.contains_key(parent) {
                break;
            }
            current = parent;
        }
    }

    HierarchyDiagnostics {
        self_references: self_references.into_iter().collect(),
        orphans: orphans.into_iter().collect(),
        cycles: cycles.into_iter().collect(),
        depth_violations: depth_violations.into_iter().collect(),
        undeclared_depths: undeclared_depths.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: HierarchySpec = HierarchySpec {
        parent_field: "parent_id",
        parent_column: "CODGRUPAI",
        depth_column: "GRAU",
    };

    fn node(key: &str, parent: i64, depth: Option<i64>) -> HierarchyNode<()> {
        let row = SourceRow::new()
            .with("CODGRUPOPROD", key)
            .with("CODGRUPAI", parent)
            .with("GRAU", depth);
        HierarchyNode::new(NaturalKey::from(key), &row, &SPEC, ())
    }

    fn keys(nodes: &[HierarchyNode<()>]) -> Vec<&str> {
        nodes.iter().map(|n| n.key.as_str()).collect()
    }

    #[test]
    fn test_root_conventions() {
        assert!(node("10", 0, Some(1)).is_root());
        let own = node("10", 10, Some(1));
        assert!(own.is_root());
        assert!(own.self_reference);
        let child = node("11", 10, Some(2));
        assert_eq!(child.parent, Some(NaturalKey::new("10")));
    }

    #[test]
    fn test_sort_roots_then_depth_then_key() {
        let mut nodes = vec![
            node("30", 20, Some(3)),
            node("21", 10, Some(2)),
            node("20", 10, Some(2)),
            node("99", 5, None),
            node("10", 0, Some(1)),
        ];
        sort_nodes(&mut nodes);
        assert_eq!(keys(&nodes), vec!["10", "20", "21", "30", "99"]);
        assert_eq!(nodes[4].depth, UNDECLARED_DEPTH);

        let groups = strata(&nodes);
        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![1, 2, 1, 1]);
    }

    #[test]
    fn test_strata_of_empty_batch() {
        let nodes: Vec<HierarchyNode<()>> = Vec::new();
        assert!(strata(&nodes).is_empty());
    }

    #[test]
    fn test_diagnose_clean_tree() {
        let nodes = vec![node("10", 0, Some(1)), node("11", 10, Some(2))];
        assert!(diagnose(&nodes).is_clean());
    }

    #[test]
    fn test_diagnose_problems() {
        let nodes = vec![
            node("10", 0, Some(1)),
            node("12", 99, Some(2)),
            node("13", 10, Some(1)),
            node("20", 21, Some(2)),
            node("21", 20, Some(3)),
            node("30", 30, Some(1)),
            node("40", 10, None),
        ];
        let diagnostics = diagnose(&nodes);

        assert_eq!(diagnostics.orphans, vec![NaturalKey::new("12")]);
        assert_eq!(diagnostics.depth_violations, vec![NaturalKey::new("13"), NaturalKey::new("20")]);
        assert_eq!(
            diagnostics.cycles,
            vec![NaturalKey::new("20"), NaturalKey::new("21")]
        );
        assert_eq!(diagnostics.self_references, vec![NaturalKey::new("30")]);
        assert_eq!(diagnostics.undeclared_depths, vec![NaturalKey::new("40")]);
        assert!(!diagnostics.is_clean());
    }
}
