//! Logical rules read off decision tree paths

use crate::training::{DecisionTree, TreeNode};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Comparison of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `feature <= threshold` (left branch)
    LessOrEqual,
    /// `feature > threshold` (right branch)
    Greater,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::LessOrEqual => write!(f, "<="),
            Operator::Greater => write!(f, ">"),
        }
    }
}

/// One comparison against a global feature column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub feature_idx: usize,
    pub feature_name: String,
    pub op: Operator,
    pub threshold: f64,
}

impl Condition {
    pub fn matches(&self, row: ArrayView1<'_, f64>) -> bool {
        let value = row[self.feature_idx];
        match self.op {
            Operator::LessOrEqual => value <= self.threshold,
            Operator::Greater => value > self.threshold,
        }
    }
}

// Identity ignores the name, which follows from the index
impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.feature_idx == other.feature_idx
            && self.op == other.op
            && self.threshold.to_bits() == other.threshold.to_bits()
    }
}

impl Eq for Condition {}

impl Hash for Condition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.feature_idx.hash(state);
        self.op.hash(state);
        self.threshold.to_bits().hash(state);
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.feature_name, self.op, self.threshold)
    }
}

/// Conjunction of conditions along a root-to-leaf path. A rule without
/// conditions selects every row and is written `f == f` after the first
/// feature its tree saw.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    conditions: Vec<Condition>,
    anchor: Option<String>,
}

impl Rule {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            anchor: None,
        }
    }

    /// The rule that matches every row
    pub fn all_rows(anchor: impl Into<String>) -> Self {
        Self {
            conditions: Vec::new(),
            anchor: Some(anchor.into()),
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, row: ArrayView1<'_, f64>) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    /// Per-row match flags
    pub fn mask(&self, x: &Array2<f64>) -> Vec<bool> {
        x.rows().into_iter().map(|row| self.matches(row)).collect()
    }

    /// Indices of matching rows, ascending
    pub fn matching_rows(&self, x: &Array2<f64>) -> Vec<usize> {
        x.rows()
            .into_iter()
            .enumerate()
            .filter(|(_, row)| self.matches(*row))
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            let anchor = self.anchor.as_deref().unwrap_or("c0");
            return write!(f, "{} == {}", anchor, anchor);
        }
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " and ")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Every root-to-leaf path of a fitted tree, left branches first.
///
/// `features[j]` is the global column of the tree's local feature `j`, and
/// `names` holds the global column names.
pub fn extract_rules(tree: &DecisionTree, features: &[usize], names: &[String]) -> Vec<Rule> {
    let Some(root) = tree.root() else {
        return Vec::new();
    };

    let mut rules = Vec::new();
    let mut path = Vec::new();
    collect_paths(root, features, names, &mut path, &mut rules);

    if rules.len() == 1 && rules[0].is_empty() {
        let anchor = features
            .first()
            .and_then(|&g| names.get(g))
            .cloned()
            .unwrap_or_else(|| "c0".to_string());
        rules[0] = Rule::all_rows(anchor);
    }
    rules
}

fn collect_paths(
    node: &TreeNode,
    features: &[usize],
    names: &[String],
    path: &mut Vec<Condition>,
    rules: &mut Vec<Rule>,
) {
    match node {
        TreeNode::Leaf { .. } => rules.push(Rule::new(path.clone())),
        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
            let global = features.get(*feature_idx).copied().unwrap_or(*feature_idx);
            let name = names
                .get(global)
                .cloned()
                .unwrap_or_else(|| format!("c{}", global));

            for (op, child) in [(Operator::LessOrEqual, left), (Operator::Greater, right)] {
                path.push(Condition {
                    feature_idx: global,
                    feature_name: name.clone(),
                    op,
                    threshold: *threshold,
                });
                collect_paths(child, features, names, path, rules);
                path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    fn cond(feature_idx: usize, op: Operator, threshold: f64) -> Condition {
        Condition {
            feature_idx,
            feature_name: format!("f{}", feature_idx),
            op,
            threshold,
        }
    }

    #[test]
    fn test_rule_matching_and_display() {
        let rule = Rule::new(vec![
            cond(0, Operator::LessOrEqual, 1.5),
            cond(2, Operator::Greater, 0.0),
        ]);
        let x = array![[1.0, 9.0, 1.0], [2.0, 9.0, 1.0], [1.0, 9.0, -1.0], [1.5, 0.0, 0.5]];

        assert_eq!(rule.matching_rows(&x), vec![0, 3]);
        assert_eq!(rule.mask(&x), vec![true, false, false, true]);
        assert_eq!(rule.to_string(), "f0 <= 1.5 and f2 > 0");
        assert_eq!(Rule::all_rows("LIMIT_BAL").to_string(), "LIMIT_BAL == LIMIT_BAL");
        assert_eq!(Rule::all_rows("a").matching_rows(&x).len(), 4);
    }

    #[test]
    fn test_missing_value_matches_nothing() {
        let rule = Rule::new(vec![cond(0, Operator::Greater, 0.0)]);
        assert!(!rule.matches(array![f64::NAN].view()));
        let rule = Rule::new(vec![cond(0, Operator::LessOrEqual, 0.0)]);
        assert!(!rule.matches(array![f64::NAN].view()));
    }

    #[test]
    fn test_rule_identity_ignores_names() {
        let mut a = cond(1, Operator::Greater, 0.5);
        a.feature_name = "renamed".to_string();
        let b = cond(1, Operator::Greater, 0.5);
        assert_eq!(Rule::new(vec![a]), Rule::new(vec![b.clone()]));
        assert_ne!(
            Rule::new(vec![b]),
            Rule::new(vec![cond(1, Operator::LessOrEqual, 0.5)])
        );
    }

    #[test]
    fn test_extract_rules_maps_features() {
        // Tree sees global columns [3, 1]; local column 1 separates the classes
        let x_local = array![[0.0, 0.0], [5.0, 1.0], [0.0, 2.0], [5.0, 3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new_classifier().with_max_depth(1);
        tree.fit(&x_local, &y).unwrap();

        let rules = extract_rules(&tree, &[3, 1], &names(4));
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].to_string(), "f1 <= 1.5");
        assert_eq!(rules[1].to_string(), "f1 > 1.5");
        assert_eq!(rules[0].conditions()[0].feature_idx, 1);
    }

    #[test]
    fn test_extract_rules_from_leaf_only_tree() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = Array1::from_vec(vec![1.0, 1.0]);
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let rules = extract_rules(&tree, &[2, 0], &names(3));
        assert_eq!(rules.len(), 1);
        assert!(rules[0].is_empty());
        assert_eq!(rules[0].to_string(), "f2 == f2");
    }
}
