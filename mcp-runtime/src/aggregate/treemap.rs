use std::collections::{BTreeMap, BTreeSet};

use erp_core::{ChartKind, ChartPayload, TreemapLeaf};
use serde_json::Value;

use super::{round2, text};

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub name: String,
    pub value: f64,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            children: Vec::new(),
        }
    }

    pub fn branch(name: impl Into<String>, children: Vec<TreeNode>) -> Self {
        Self {
            name: name.into(),
            value: 0.0,
            children,
        }
    }
}

/// Leaves in depth-first order. Branch nodes contribute nothing themselves.
pub fn flatten_leaves(roots: &[TreeNode]) -> Vec<TreemapLeaf> {
    let mut leaves = Vec::new();
    let mut stack: Vec<&TreeNode> = roots.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.children.is_empty() {
            leaves.push(TreemapLeaf {
                name: node.name.clone(),
                value: node.value,
            });
        } else {
            stack.extend(node.children.iter().rev());
        }
    }
    leaves
}

/// Rebuild a forest from records that point at their parent by name. Nodes
/// whose parent is absent become roots; siblings are ordered by name. Leaf
/// values come from `values` (0 when missing). Records caught in a parent
/// cycle never reach a root and are left out.
pub fn tree_from_parent_links(
    records: &[Value],
    name_field: &str,
    parent_field: &str,
    values: &BTreeMap<String, f64>,
) -> Vec<TreeNode> {
    let names: BTreeSet<&str> = records.iter().filter_map(|r| text(r, name_field)).collect();
    let mut children: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut roots: BTreeSet<&str> = BTreeSet::new();
    for record in records {
        let Some(name) = text(record, name_field) else {
            continue;
        };
        match text(record, parent_field).filter(|parent| names.contains(parent) && *parent != name) {
            Some(parent) => {
                children.entry(parent).or_default().insert(name);
            }
            None => {
                roots.insert(name);
            }
        }
    }

    fn build(
        name: &str,
        children: &BTreeMap<&str, BTreeSet<&str>>,
        values: &BTreeMap<String, f64>,
        path: &mut BTreeSet<String>,
    ) -> TreeNode {
        let kids = children.get(name);
        if kids.is_none_or(BTreeSet::is_empty) || !path.insert(name.to_string()) {
            return TreeNode::leaf(name, values.get(name).copied().unwrap_or(0.0));
        }
        let nodes = kids
            .into_iter()
            .flatten()
            .map(|child| build(child, children, values, path))
            .collect();
        path.remove(name);
        TreeNode::branch(name, nodes)
    }

    let mut path = BTreeSet::new();
    roots
        .into_iter()
        .map(|root| build(root, &children, values, &mut path))
        .collect()
}

pub fn build_treemap(title: &str, leaves: Vec<TreemapLeaf>) -> ChartPayload {
    let mut chart = ChartPayload::new(title, ChartKind::Treemap, Vec::new());
    chart.leaves = leaves
        .into_iter()
        .map(|leaf| TreemapLeaf {
            value: round2(leaf.value),
            ..leaf
        })
        .collect();
    chart
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(name: &str, value: f64) -> TreemapLeaf {
        TreemapLeaf {
            name: name.into(),
            value,
        }
    }

    #[test]
    fn only_leaves_are_emitted() {
        let tree = vec![TreeNode::branch(
            "A",
            vec![
                TreeNode::leaf("B", 5.0),
                TreeNode::branch("C", vec![TreeNode::leaf("D", 3.0)]),
            ],
        )];
        assert_eq!(flatten_leaves(&tree), vec![leaf("B", 5.0), leaf("D", 3.0)]);
    }

    #[test]
    fn parent_links_rebuild_the_account_tree() {
        let accounts = vec![
            json!({"name": "Expenses", "parent_account": null}),
            json!({"name": "Travel", "parent_account": "Indirect"}),
            json!({"name": "Indirect", "parent_account": "Expenses"}),
            json!({"name": "Cost of Goods Sold", "parent_account": "Expenses"}),
            json!({"name": "Office", "parent_account": "Indirect"}),
        ];
        let values = BTreeMap::from([
            ("Travel".to_string(), 120.0),
            ("Office".to_string(), 80.0),
            ("Cost of Goods Sold".to_string(), 900.0),
        ]);
        let tree = tree_from_parent_links(&accounts, "name", "parent_account", &values);
        assert_eq!(tree.len(), 1);
        assert_eq!(
            flatten_leaves(&tree),
            vec![
                leaf("Cost of Goods Sold", 900.0),
                leaf("Office", 80.0),
                leaf("Travel", 120.0),
            ]
        );
    }

    #[test]
    fn parent_cycles_do_not_recurse_forever() {
        let accounts = vec![
            json!({"name": "X", "parent_account": "Y"}),
            json!({"name": "Y", "parent_account": "X"}),
            json!({"name": "Root"}),
        ];
        let tree = tree_from_parent_links(&accounts, "name", "parent_account", &BTreeMap::new());
        assert_eq!(flatten_leaves(&tree), vec![leaf("Root", 0.0)]);
    }

    #[test]
    fn treemap_payload_carries_leaves() {
        let chart = build_treemap("Expenses", vec![leaf("Rent", 1000.004)]);
        assert_eq!(chart.kind, ChartKind::Treemap);
        assert_eq!(chart.leaves, vec![leaf("Rent", 1000.0)]);
    }
}
