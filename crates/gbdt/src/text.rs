//! Native line-oriented model format
//!
//! A header of `key=value` lines followed by one block per tree, each block
//! holding one space-separated array per node attribute:
//!
//! ```text
//! kstarter_model
//! version=1
//! objective=binary
//! base_score=-0.12
//! feature_names=age	chol
//! best_iteration=41
//! num_trees=2
//!
//! Tree=0
//! num_nodes=3
//! feature=0 -1 -1
//! threshold=50.5 0 0
//! default_left=1 0 0
//! left=1 -1 -1
//! right=2 -1 -1
//! leaf=- -0.3 0.2
//!
//! end_of_trees
//! ```
//!
//! Feature names are tab separated. Floats use Rust's shortest round-trip
//! formatting, so a write/read cycle reproduces the model exactly.

use crate::model::{Model, ModelError, Objective, MODEL_FORMAT_VERSION};
use crate::tree::{Node, Tree};
use std::collections::HashMap;
use std::fmt;

const MAGIC: &str = "kstarter_model";
const END: &str = "end_of_trees";

/// Display adapter rendering a model in the native format
pub(crate) struct TextDump<'a>(pub(crate) &'a Model);

impl fmt::Display for TextDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self.0;
        writeln!(f, "{MAGIC}")?;
        writeln!(f, "version={}", model.version)?;
        writeln!(f, "objective={}", model.objective.as_str())?;
        writeln!(f, "base_score={}", model.base_score)?;
        writeln!(f, "feature_names={}", model.feature_names.join("\t"))?;
        match model.best_iteration {
            Some(best) => writeln!(f, "best_iteration={best}")?,
            None => writeln!(f, "best_iteration=none")?,
        }
        writeln!(f, "num_trees={}", model.trees.len())?;
        writeln!(f, "producer=kstarter-gbdt {}", crate::VERSION)?;

        for (i, tree) in model.trees.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "Tree={i}")?;
            writeln!(f, "num_nodes={}", tree.nodes.len())?;
            write_array(f, "feature", tree.nodes.iter().map(|n| n.feature_idx.to_string()))?;
            write_array(f, "threshold", tree.nodes.iter().map(|n| n.threshold.to_string()))?;
            write_array(
                f,
                "default_left",
                tree.nodes.iter().map(|n| u8::from(n.default_left).to_string()),
            )?;
            write_array(f, "left", tree.nodes.iter().map(|n| n.left.to_string()))?;
            write_array(f, "right", tree.nodes.iter().map(|n| n.right.to_string()))?;
            write_array(
                f,
                "leaf",
                tree.nodes
                    .iter()
                    .map(|n| n.leaf.map_or_else(|| "-".to_string(), |v| v.to_string())),
            )?;
        }

        writeln!(f)?;
        writeln!(f, "{END}")
    }
}

fn write_array(
    f: &mut fmt::Formatter<'_>,
    key: &str,
    values: impl Iterator<Item = String>,
) -> fmt::Result {
    let joined: Vec<String> = values.collect();
    writeln!(f, "{}={}", key, joined.join(" "))
}

pub(crate) fn read_model(input: &str) -> Result<Model, ModelError> {
    let mut lines = input.lines().map(str::trim_end).enumerate();

    match lines.next() {
        Some((_, MAGIC)) => {}
        _ => return Err(invalid(format!("missing `{MAGIC}` header"))),
    }

    let mut header: HashMap<&str, &str> = HashMap::new();
    let mut trees: Vec<Tree> = Vec::new();
    let mut block: Option<(usize, HashMap<&str, &str>)> = None;
    let mut finished = false;

    for (line_no, line) in lines {
        if line.is_empty() {
            continue;
        }
        if line == END {
            if let Some((idx, fields)) = block.take() {
                trees.push(parse_tree(idx, &fields)?);
            }
            finished = true;
            break;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| invalid(format!("line {}: expected key=value", line_no + 1)))?;

        if key == "Tree" {
            if let Some((idx, fields)) = block.take() {
                trees.push(parse_tree(idx, &fields)?);
            }
            let idx = value
                .parse::<usize>()
                .map_err(|_| invalid(format!("line {}: bad tree index `{value}`", line_no + 1)))?;
            if idx != trees.len() {
                return Err(invalid(format!("tree {idx} out of order")));
            }
            block = Some((idx, HashMap::new()));
        } else if let Some((_, fields)) = block.as_mut() {
            fields.insert(key, value);
        } else {
            header.insert(key, value);
        }
    }

    if !finished {
        return Err(invalid(format!("missing `{END}` terminator")));
    }

    let version: i32 = parse_field(&header, "version")?;
    if version != MODEL_FORMAT_VERSION {
        return Err(invalid(format!("unsupported version {version}")));
    }

    let objective_raw = required(&header, "objective")?;
    let objective = Objective::parse(objective_raw)
        .ok_or_else(|| invalid(format!("unknown objective `{objective_raw}`")))?;

    let base_score: f64 = parse_field(&header, "base_score")?;

    let names_raw = required(&header, "feature_names")?;
    let feature_names: Vec<String> = if names_raw.is_empty() {
        Vec::new()
    } else {
        names_raw.split('\t').map(str::to_string).collect()
    };

    let best_iteration = match required(&header, "best_iteration")? {
        "none" => None,
        raw => Some(
            raw.parse::<usize>()
                .map_err(|_| invalid(format!("bad best_iteration `{raw}`")))?,
        ),
    };

    let num_trees: usize = parse_field(&header, "num_trees")?;
    if num_trees != trees.len() {
        return Err(invalid(format!(
            "header declares {} trees, found {}",
            num_trees,
            trees.len()
        )));
    }

    let mut model = Model::new(objective, base_score, trees, feature_names);
    model.best_iteration = best_iteration;
    Ok(model)
}

fn parse_tree(idx: usize, fields: &HashMap<&str, &str>) -> Result<Tree, ModelError> {
    let num_nodes: usize = parse_field(fields, "num_nodes")?;

    let feature: Vec<i32> = parse_array(fields, "feature", num_nodes, idx)?;
    let threshold: Vec<f64> = parse_array(fields, "threshold", num_nodes, idx)?;
    let default_left: Vec<u8> = parse_array(fields, "default_left", num_nodes, idx)?;
    let left: Vec<i32> = parse_array(fields, "left", num_nodes, idx)?;
    let right: Vec<i32> = parse_array(fields, "right", num_nodes, idx)?;

    let leaf_raw = required(fields, "leaf")?;
    let leaf: Vec<Option<f64>> = leaf_raw
        .split(' ')
        .map(|tok| match tok {
            "-" => Ok(None),
            v => v
                .parse::<f64>()
                .map(Some)
                .map_err(|_| invalid(format!("tree {idx}: bad leaf value `{v}`"))),
        })
        .collect::<Result<_, _>>()?;
    if leaf.len() != num_nodes {
        return Err(invalid(format!("tree {idx}: leaf has {} entries", leaf.len())));
    }

    let nodes = (0..num_nodes)
        .map(|i| Node {
            id: i as i32,
            left: left[i],
            right: right[i],
            feature_idx: feature[i],
            threshold: threshold[i],
            default_left: default_left[i] != 0,
            leaf: leaf[i],
        })
        .collect();

    Ok(Tree::new(nodes))
}

fn required<'a>(fields: &HashMap<&str, &'a str>, key: &str) -> Result<&'a str, ModelError> {
    fields
        .get(key)
        .copied()
        .ok_or_else(|| invalid(format!("missing field `{key}`")))
}

fn parse_field<T: std::str::FromStr>(
    fields: &HashMap<&str, &str>,
    key: &str,
) -> Result<T, ModelError> {
    let raw = required(fields, key)?;
    raw.parse::<T>()
        .map_err(|_| invalid(format!("field `{key}` has bad value `{raw}`")))
}

fn parse_array<T: std::str::FromStr>(
    fields: &HashMap<&str, &str>,
    key: &str,
    expected: usize,
    tree: usize,
) -> Result<Vec<T>, ModelError> {
    let raw = required(fields, key)?;
    let values: Vec<T> = raw
        .split(' ')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| invalid(format!("tree {tree}: bad `{key}` entry `{s}`")))
        })
        .collect::<Result<_, _>>()?;

    if values.len() != expected {
        return Err(invalid(format!(
            "tree {}: `{}` has {} entries, expected {}",
            tree,
            key,
            values.len(),
            expected
        )));
    }
    Ok(values)
}

fn invalid(msg: String) -> ModelError {
    ModelError::InvalidFormat(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> Model {
        let tree = Tree::new(vec![
            Node::internal(0, 1, 0.1 + 0.2, true, 1, 2),
            Node::leaf(1, -0.031_25),
            Node::internal(2, 0, 1e-9, false, 3, 4),
            Node::leaf(3, 0.7),
            Node::leaf(4, -1.0 / 3.0),
        ]);
        let mut model = Model::new(
            Objective::Binary,
            -0.405_465,
            vec![tree, Tree::new(vec![Node::leaf(0, 0.01)])],
            vec!["resting bp".to_string(), "max_hr".to_string()],
        );
        model.best_iteration = Some(1);
        model
    }

    #[test]
    fn test_text_is_exact() {
        let model = sample_model();
        let text = model.to_text();

        assert!(text.starts_with("kstarter_model\n"));
        assert!(text.contains("feature_names=resting bp\tmax_hr"));
        assert!(text.contains("leaf=- -0.03125 - 0.7 "));

        let parsed = Model::from_text(&text).unwrap();
        assert_eq!(parsed, model);
    }

    #[test]
    fn test_rejects_truncated_input() {
        let text = sample_model().to_text();
        let cut = &text[..text.find("end_of_trees").unwrap()];
        assert!(matches!(
            Model::from_text(cut),
            Err(ModelError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_array_length() {
        let text = sample_model()
            .to_text()
            .replace("left=1 -1 3 -1 -1", "left=1 -1 3");
        assert!(Model::from_text(&text).is_err());
    }

    #[test]
    fn test_rejects_foreign_header() {
        assert!(Model::from_text("tree\nversion=v3\n").is_err());
    }
}
