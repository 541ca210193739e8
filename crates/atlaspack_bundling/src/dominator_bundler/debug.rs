//! Graphviz exports of the intermediate bundler graphs.
//!
//! Labels are stable across runs so the output can be used as a test snapshot.

use std::hash::Hash;

use atlaspack_core::content_graph::ContentGraph;
use atlaspack_core::content_graph::NodeId;

use super::types::cycle_display_name;
use super::types::BundlerNode;
use super::types::DominatorTree;
use super::types::PackageGraph;
use super::types::RootedGraph;

pub fn rooted_graph_to_dot(graph: &RootedGraph) -> String {
  graph.to_dot(
    |node_id, node| node_label(graph, node_id, node),
    |edge_type, _| String::from(edge_type.label()),
  )
}

pub fn dominator_tree_to_dot(tree: &DominatorTree) -> String {
  tree.to_dot(
    |node_id, node| node_label(tree, node_id, node),
    |_, _| String::new(),
  )
}

pub fn package_graph_to_dot(package_graph: &PackageGraph) -> String {
  package_graph.to_dot(
    |node_id, node| node_label(package_graph, node_id, node),
    |_, _| String::from("sync"),
  )
}

fn node_label<E, W>(
  graph: &ContentGraph<BundlerNode, E, W>,
  node_id: NodeId,
  node: &BundlerNode,
) -> String
where
  E: Copy + Eq + Hash,
{
  match node {
    BundlerNode::Root => String::from("root"),
    BundlerNode::Asset(asset) => asset.display_name(),
    BundlerNode::StronglyConnectedComponent { values, .. } => cycle_display_name(values),
    BundlerNode::Package { .. } => graph
      .get_content_key(node_id)
      .map(String::from)
      .unwrap_or_else(|| format!("package#{node_id}")),
  }
}
