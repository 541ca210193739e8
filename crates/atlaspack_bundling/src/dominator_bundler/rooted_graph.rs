use std::collections::HashSet;
use std::collections::VecDeque;

use anyhow::Context;
use atlaspack_core::asset_graph::AssetGraph;
use atlaspack_core::content_graph::NodeId;
use atlaspack_core::types::AssetId;
use tracing::debug;
use tracing::instrument;

use crate::options::DominatorBundlerOptions;

use super::types::add_merged_edge;
use super::types::BundlerNode;
use super::types::DependencyEdge;
use super::types::RootedEdgeType;
use super::types::RootedGraph;
use super::types::ROOT_CONTENT_KEY;

/// Projects the asset graph down to the assets reachable from `entries`.
///
/// Entries are attached to the root with `Sync` edges in the order given. Lazy dependencies and
/// (optionally) bundle type changes are marked on the importing edge and also attach their target
/// to the root, so every bundle boundary is a child of the root.
#[instrument(level = "debug", skip_all)]
pub fn build_rooted_graph(
  asset_graph: &AssetGraph,
  entries: &[AssetId],
  options: &DominatorBundlerOptions,
) -> anyhow::Result<RootedGraph> {
  let mut graph = RootedGraph::new();
  let root = graph.add_node_by_content_key(ROOT_CONTENT_KEY, BundlerNode::Root);

  let mut queue = VecDeque::new();
  let mut visited = HashSet::new();

  for entry in entries {
    let asset_node_id = asset_graph
      .expect_asset_node_id(entry)
      .with_context(|| format!("resolving entry asset {entry}"))?;
    let node_id = add_asset_node(&mut graph, asset_graph, asset_node_id)?;

    graph.add_edge(root, node_id, RootedEdgeType::Sync)?;
    if visited.insert(asset_node_id) {
      queue.push_back(asset_node_id);
    }
  }

  while let Some(asset_node_id) = queue.pop_front() {
    let from = add_asset_node(&mut graph, asset_graph, asset_node_id)?;
    let source = asset_graph
      .get_asset(asset_node_id)
      .with_context(|| format!("asset graph node {asset_node_id} is not an asset"))?;

    for dependency_node_id in asset_graph.get_outgoing_dependencies(asset_node_id) {
      let Some(target_node_id) = asset_graph.resolve_dependency_asset(dependency_node_id) else {
        continue;
      };
      let (Some(dependency), Some(target)) = (
        asset_graph.get_dependency(dependency_node_id),
        asset_graph.get_asset(target_node_id),
      ) else {
        continue;
      };

      let to = add_asset_node(&mut graph, asset_graph, target_node_id)?;
      let edge_type = if dependency.is_lazy() {
        RootedEdgeType::Async
      } else if options.split_on_type_change
        && source.file_type.bundle_type() != target.file_type.bundle_type()
      {
        RootedEdgeType::TypeChange
      } else {
        RootedEdgeType::Sync
      };

      add_merged_edge(
        &mut graph,
        from,
        to,
        edge_type,
        Some(&DependencyEdge::new(dependency.id())),
      )?;

      if edge_type != RootedEdgeType::Sync {
        graph.add_edge(root, to, edge_type)?;
      }

      if visited.insert(target_node_id) {
        queue.push_back(target_node_id);
      }
    }
  }

  for (asset_node_id, asset) in asset_graph.get_assets() {
    if visited.contains(&asset_node_id) || !options.is_helper_module(&asset.file_path) {
      continue;
    }

    debug!(helper = %asset.file_path.display(), "dominator bundler: retaining helper module");
    let node_id = add_asset_node(&mut graph, asset_graph, asset_node_id)?;
    graph.add_edge(root, node_id, RootedEdgeType::Sync)?;
  }

  debug!(
    nodes = graph.node_count(),
    edges = graph.edge_count(),
    "dominator bundler: built rooted graph"
  );

  Ok(graph)
}

fn add_asset_node(
  graph: &mut RootedGraph,
  asset_graph: &AssetGraph,
  asset_node_id: NodeId,
) -> anyhow::Result<NodeId> {
  let asset = asset_graph
    .get_asset(asset_node_id)
    .with_context(|| format!("asset graph node {asset_node_id} is not an asset"))?;

  Ok(graph.add_node_by_content_key(asset.id.clone(), BundlerNode::Asset(asset.clone())))
}
