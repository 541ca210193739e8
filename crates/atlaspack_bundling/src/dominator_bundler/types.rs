use std::sync::Arc;

use anyhow::Context;
use atlaspack_core::content_graph::ContentGraph;
use atlaspack_core::content_graph::NodeId;
use atlaspack_core::types::Asset;
use atlaspack_core::types::AssetId;

/// Content key of the synthetic root in every bundler graph
pub const ROOT_CONTENT_KEY: &str = "root";

/// Assets reachable from the entries, hung off a synthetic root.
///
/// The same type is used before and after cycles are collapsed; the acyclic version may contain
/// [`BundlerNode::StronglyConnectedComponent`] nodes.
pub type RootedGraph = ContentGraph<BundlerNode, RootedEdgeType, DependencyEdge>;

/// A tree where every node's parent is its immediate dominator in the acyclic [`RootedGraph`].
///
/// Node ids are shared with the acyclic graph it was built from. Package nodes are appended after.
pub type DominatorTree = ContentGraph<BundlerNode, DominatorTreeEdgeType, DependencyEdge>;

/// Which terminal bundles reference which packages
pub type PackageGraph = ContentGraph<BundlerNode, PackageGraphEdgeType>;

#[derive(Clone, Debug, PartialEq)]
pub enum BundlerNode {
  Root,
  Asset(Arc<Asset>),
  /// Assets that import each other in a cycle, collapsed into one node
  StronglyConnectedComponent {
    /// Ids of the members in the graph the cycle was found in
    node_ids: Vec<NodeId>,
    values: Vec<Arc<Asset>>,
  },
  /// A dominator subtree shared by more than one entry point or async boundary
  Package {
    member_asset_ids: Vec<AssetId>,
    entry_point_ids: Vec<NodeId>,
  },
}

impl BundlerNode {
  /// The assets held directly by this node
  pub fn assets(&self) -> &[Arc<Asset>] {
    match self {
      BundlerNode::Asset(asset) => std::slice::from_ref(asset),
      BundlerNode::StronglyConnectedComponent { values, .. } => values,
      BundlerNode::Root | BundlerNode::Package { .. } => &[],
    }
  }

  pub fn is_package(&self) -> bool {
    matches!(self, BundlerNode::Package { .. })
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RootedEdgeType {
  Sync,
  /// A lazily loaded dependency. The target is also attached to the root.
  Async,
  /// A dependency into an asset with a different bundle type. The target is also attached to the
  /// root.
  TypeChange,
}

impl RootedEdgeType {
  pub fn label(&self) -> &'static str {
    match self {
      RootedEdgeType::Sync => "sync",
      RootedEdgeType::Async => "async",
      RootedEdgeType::TypeChange => "type-change",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DominatorTreeEdgeType {
  Contains,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PackageGraphEdgeType {
  /// A bundle synchronously imports code owned by a package
  References,
}

/// Edge weight listing the dependencies folded into a single edge
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyEdge {
  pub dependency_ids: Vec<String>,
}

impl DependencyEdge {
  pub fn new(dependency_id: impl Into<String>) -> Self {
    DependencyEdge {
      dependency_ids: vec![dependency_id.into()],
    }
  }

  /// How many imports were folded into this edge
  pub fn import_count(&self) -> usize {
    self.dependency_ids.len()
  }

  pub fn merge(&mut self, other: &DependencyEdge) {
    self
      .dependency_ids
      .extend(other.dependency_ids.iter().cloned());
  }
}

/// Adds an edge, folding `weight` into the weight of an existing `(from, to, type)` edge
pub fn add_merged_edge<N, E>(
  graph: &mut ContentGraph<N, E, DependencyEdge>,
  from: NodeId,
  to: NodeId,
  edge_type: E,
  weight: Option<&DependencyEdge>,
) -> anyhow::Result<()>
where
  E: Copy + Eq + std::hash::Hash + std::fmt::Debug,
{
  graph
    .add_edge(from, to, edge_type)
    .with_context(|| format!("adding {edge_type:?} edge {from} -> {to}"))?;

  let Some(weight) = weight else {
    return Ok(());
  };

  match graph.get_edge_weight_mut(from, to, edge_type) {
    Some(existing) => existing.merge(weight),
    None => {
      graph.add_edge_with_weight(from, to, edge_type, weight.clone())?;
    }
  }

  Ok(())
}

/// The name used for a node in package keys and bundle names.
///
/// Assets are named by their file path, cycles by their sorted member paths and packages by their
/// content key.
pub fn display_name<E, W>(
  graph: &ContentGraph<BundlerNode, E, W>,
  node_id: NodeId,
) -> anyhow::Result<String>
where
  E: Copy + Eq + std::hash::Hash,
{
  let node = graph
    .expect_node(node_id)
    .with_context(|| format!("naming node {node_id}"))?;

  match node {
    BundlerNode::Root => Ok(String::from(ROOT_CONTENT_KEY)),
    BundlerNode::Asset(asset) => Ok(asset.display_name()),
    BundlerNode::StronglyConnectedComponent { values, .. } => Ok(cycle_display_name(values)),
    BundlerNode::Package { .. } => graph
      .get_content_key(node_id)
      .map(String::from)
      .with_context(|| format!("node {node_id} has no content key")),
  }
}

/// Names a collapsed cycle after its members, e.g. `scc(a.js, b.js)`
pub fn cycle_display_name(values: &[Arc<Asset>]) -> String {
  let mut paths = values
    .iter()
    .map(|asset| asset.display_name())
    .collect::<Vec<_>>();
  paths.sort();
  format!("scc({})", paths.join(", "))
}

/// Finds the synthetic root of a bundler graph
pub fn root_node_id<E, W>(graph: &ContentGraph<BundlerNode, E, W>) -> anyhow::Result<NodeId>
where
  E: Copy + Eq + std::hash::Hash,
{
  graph
    .expect_node_id_by_content_key(ROOT_CONTENT_KEY)
    .context("bundler graph has no root node")
}

#[cfg(test)]
mod tests {
  use atlaspack_core::types::Environment;
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn test_add_merged_edge_accumulates_dependency_ids() {
    let mut graph = RootedGraph::new();
    let root = graph.add_node_by_content_key(ROOT_CONTENT_KEY, BundlerNode::Root);
    let asset = Arc::new(Asset::new("src/a.js", Arc::new(Environment::default())));
    let a = graph.add_node_by_content_key(asset.id.clone(), BundlerNode::Asset(asset));

    add_merged_edge(&mut graph, root, a, RootedEdgeType::Sync, None).unwrap();
    add_merged_edge(
      &mut graph,
      root,
      a,
      RootedEdgeType::Sync,
      Some(&DependencyEdge::new("dep-1")),
    )
    .unwrap();
    add_merged_edge(
      &mut graph,
      root,
      a,
      RootedEdgeType::Sync,
      Some(&DependencyEdge::new("dep-2")),
    )
    .unwrap();

    let weight = graph
      .get_edge_weight(root, a, RootedEdgeType::Sync)
      .unwrap();
    assert_eq!(weight.import_count(), 2);
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(display_name(&graph, a).unwrap(), "src/a.js");
    assert_eq!(root_node_id(&graph).unwrap(), root);
  }

  #[test]
  fn test_add_merged_edge_to_unknown_node_names_the_edge() {
    let mut graph = RootedGraph::new();
    let root = graph.add_node_by_content_key(ROOT_CONTENT_KEY, BundlerNode::Root);

    let error =
      add_merged_edge(&mut graph, root, 9, RootedEdgeType::Async, None).unwrap_err();

    assert_eq!(error.to_string(), "adding Async edge 0 -> 9");
  }
}
