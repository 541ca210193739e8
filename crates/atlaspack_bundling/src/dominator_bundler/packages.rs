use std::collections::HashMap;
use std::collections::HashSet;

use atlaspack_core::content_graph::NodeId;
use atlaspack_core::content_graph::TraversalControl;
use atlaspack_core::content_graph::TraversalEvent;
use atlaspack_core::types::AssetId;
use tracing::debug;
use tracing::instrument;

use super::entry_dependencies::EntryDependencies;
use super::types::add_merged_edge;
use super::types::display_name;
use super::types::root_node_id;
use super::types::BundlerNode;
use super::types::DominatorTree;
use super::types::DominatorTreeEdgeType;
use super::types::RootedGraph;

/// A dominator tree with shared subtrees moved under package nodes
#[derive(Debug)]
pub struct PackagedTree {
  pub tree: DominatorTree,
  /// Package node ids, in creation order
  pub packages: Vec<NodeId>,
}

/// Moves every shared dominator subtree under a [`BundlerNode::Package`] node.
///
/// A child of the root in the dominator tree is shared when it is not itself a bundle boundary
/// (a root child in `graph`) and more than one entry or async boundary loads it. Subtrees loaded
/// by the same set of entry points end up in the same package, keyed by the sorted entry point
/// names. Whole subtrees move, so a package never splits one.
#[instrument(level = "debug", skip_all)]
pub fn build_packages(
  graph: &RootedGraph,
  tree: &DominatorTree,
  entry_dependencies: &EntryDependencies,
) -> anyhow::Result<PackagedTree> {
  let root = root_node_id(tree)?;
  let bundle_boundaries = graph
    .get_node_ids_connected_from(root)
    .into_iter()
    .collect::<HashSet<_>>();

  let mut result = tree.clone();
  let mut packages = Vec::new();

  for candidate in tree.get_node_ids_connected_from(root) {
    if bundle_boundaries.contains(&candidate) {
      continue;
    }

    let entry_point_ids = entry_dependencies.chunk_entry_points(candidate);
    if entry_point_ids.len() <= 1 {
      continue;
    }

    let key = package_key(graph, &entry_point_ids)?;
    let package = match result.get_node_id_by_content_key(&key) {
      Some(package) => package,
      None => {
        let package = result.add_node_by_content_key(
          key,
          BundlerNode::Package {
            member_asset_ids: Vec::new(),
            entry_point_ids,
          },
        );
        result.add_edge(root, package, DominatorTreeEdgeType::Contains)?;
        packages.push(package);
        package
      }
    };

    let weight = result
      .get_edge_weight(root, candidate, DominatorTreeEdgeType::Contains)
      .cloned();
    result.remove_edge(root, candidate, DominatorTreeEdgeType::Contains)?;
    add_merged_edge(
      &mut result,
      package,
      candidate,
      DominatorTreeEdgeType::Contains,
      weight.as_ref(),
    )?;
  }

  for package in &packages {
    let assets = subtree_asset_ids(&result, *package)?;
    if let Some(BundlerNode::Package {
      member_asset_ids, ..
    }) = result.get_node_mut(*package)
    {
      *member_asset_ids = assets;
    }
  }

  debug!(
    packages = packages.len(),
    "dominator bundler: created packages"
  );

  Ok(PackagedTree {
    tree: result,
    packages,
  })
}

/// `package:` followed by the sorted display names of the entry points
pub fn package_key(graph: &RootedGraph, entry_point_ids: &[NodeId]) -> anyhow::Result<String> {
  let mut names = entry_point_ids
    .iter()
    .map(|entry_point| display_name(graph, *entry_point))
    .collect::<anyhow::Result<Vec<_>>>()?;
  names.sort();

  Ok(format!("package:{}", names.join(",")))
}

/// Ids of every asset in the dominator subtree of `start`, in pre-order
pub fn subtree_asset_ids(tree: &DominatorTree, start: NodeId) -> anyhow::Result<Vec<AssetId>> {
  let mut asset_ids = Vec::new();

  tree.traverse(start, Some(DominatorTreeEdgeType::Contains), |event| {
    if let TraversalEvent::Enter(node_id) = event {
      if let Some(node) = tree.get_node(node_id) {
        asset_ids.extend(node.assets().iter().map(|asset| asset.id.clone()));
      }
    }
    TraversalControl::Continue
  })?;

  Ok(asset_ids)
}

/// Maps every node under a root child of the tree to that root child, the bundle it ends up in
pub fn bundle_owners(
  tree: &DominatorTree,
  root: NodeId,
) -> anyhow::Result<HashMap<NodeId, NodeId>> {
  let mut owners = HashMap::new();

  for bundle_root in tree.get_node_ids_connected_from(root) {
    tree.traverse(bundle_root, Some(DominatorTreeEdgeType::Contains), |event| {
      if let TraversalEvent::Enter(node_id) = event {
        owners.insert(node_id, bundle_root);
      }
      TraversalControl::Continue
    })?;
  }

  Ok(owners)
}
