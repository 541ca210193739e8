use std::collections::HashMap;

use anyhow::Context;
use atlaspack_core::content_graph::NodeId;
use tracing::debug;
use tracing::instrument;

use crate::options::DominatorBundlerOptions;

use super::packages::bundle_owners;
use super::types::add_merged_edge;
use super::types::root_node_id;
use super::types::BundlerNode;
use super::types::DominatorTree;
use super::types::DominatorTreeEdgeType;
use super::types::PackageGraph;
use super::types::PackageGraphEdgeType;
use super::types::RootedEdgeType;
use super::types::RootedGraph;

/// Connects every bundle to the packages it synchronously imports code from.
///
/// The nodes are the root children of `tree` (entries, async boundaries and packages), keyed by
/// the same content keys.
#[instrument(level = "debug", skip_all)]
pub fn build_package_graph(
  graph: &RootedGraph,
  tree: &DominatorTree,
) -> anyhow::Result<PackageGraph> {
  let root = root_node_id(tree)?;
  let owners = bundle_owners(tree, root)?;

  let mut package_graph = PackageGraph::new();
  let mut package_graph_ids = HashMap::new();
  for bundle_root in tree.get_node_ids_connected_from(root) {
    let content_key = content_key(tree, bundle_root)?;
    let node = tree.expect_node(bundle_root)?.clone();
    package_graph_ids.insert(
      bundle_root,
      package_graph.add_node_by_content_key(content_key, node),
    );
  }

  for (from, to, edge_type) in graph.edges() {
    if edge_type != RootedEdgeType::Sync {
      continue;
    }

    let (Some(from_bundle), Some(to_bundle)) = (owners.get(&from), owners.get(&to)) else {
      continue;
    };
    if from_bundle == to_bundle || !tree.expect_node(*to_bundle)?.is_package() {
      continue;
    }

    let (Some(referrer), Some(package)) = (
      package_graph_ids.get(from_bundle),
      package_graph_ids.get(to_bundle),
    ) else {
      continue;
    };
    package_graph.add_edge(*referrer, *package, PackageGraphEdgeType::References)?;
  }

  debug!(
    bundles = package_graph.node_count(),
    references = package_graph.edge_count(),
    "dominator bundler: built package graph"
  );

  Ok(package_graph)
}

#[derive(Debug)]
pub struct MergedPackages {
  pub tree: DominatorTree,
  pub package_graph: PackageGraph,
  /// The packages that were kept, in creation order
  pub packages: Vec<NodeId>,
  pub merged: usize,
}

/// Folds packages referenced by too few bundles back into a bundle that references them.
///
/// Sweeps the packages in creation order and merges every package with at least one, but fewer
/// than `min_shared_bundles`, referencing bundles into the first of them. Repeats until a sweep
/// merges nothing.
#[instrument(level = "debug", skip_all)]
pub fn run_merge_packages(
  mut tree: DominatorTree,
  mut package_graph: PackageGraph,
  packages: Vec<NodeId>,
  options: &DominatorBundlerOptions,
) -> anyhow::Result<MergedPackages> {
  let root = root_node_id(&tree)?;
  let mut remaining = packages;
  let mut merged = 0;

  loop {
    let mut merged_package = None;

    for package in &remaining {
      let package_key = content_key(&tree, *package)?;
      let package_node = package_graph
        .expect_node_id_by_content_key(&package_key)
        .with_context(|| format!("package {package_key} is missing from the package graph"))?;

      let referrers = package_graph.get_node_ids_connected_to(package_node);
      let Some(first_referrer) = referrers.first() else {
        continue;
      };
      if referrers.len() >= options.min_shared_bundles {
        continue;
      }

      let target_key = package_graph
        .get_content_key(*first_referrer)
        .map(String::from)
        .with_context(|| format!("package graph node {first_referrer} has no content key"))?;
      let target = tree.expect_node_id_by_content_key(&target_key)?;

      debug!(
        package = %package_key,
        into = %target_key,
        referrers = referrers.len(),
        "dominator bundler: merging package"
      );

      merge_into_bundle(&mut tree, root, *package, target)?;
      redirect_references(&mut package_graph, package_node, *first_referrer)?;
      merged_package = Some(*package);
      break;
    }

    let Some(merged_package) = merged_package else {
      break;
    };
    remaining.retain(|package| *package != merged_package);
    merged += 1;
  }

  debug!(merged, kept = remaining.len(), "dominator bundler: merged packages");

  Ok(MergedPackages {
    tree,
    package_graph,
    packages: remaining,
    merged,
  })
}

/// Moves the package's subtrees under `target` and removes the package node
fn merge_into_bundle(
  tree: &mut DominatorTree,
  root: NodeId,
  package: NodeId,
  target: NodeId,
) -> anyhow::Result<()> {
  anyhow::ensure!(
    target != root && target != package,
    "cannot merge package {package} into node {target}"
  );

  for child in tree.get_node_ids_connected_from(package) {
    let weight = tree
      .get_edge_weight(package, child, DominatorTreeEdgeType::Contains)
      .cloned();
    tree.remove_edge(package, child, DominatorTreeEdgeType::Contains)?;
    add_merged_edge(
      tree,
      target,
      child,
      DominatorTreeEdgeType::Contains,
      weight.as_ref(),
    )?;
  }

  let moved_asset_ids = match tree.remove_node(package)? {
    BundlerNode::Package {
      member_asset_ids, ..
    } => member_asset_ids,
    other => anyhow::bail!("node {package} is not a package: {other:?}"),
  };

  if let Some(BundlerNode::Package {
    member_asset_ids, ..
  }) = tree.get_node_mut(target)
  {
    member_asset_ids.extend(moved_asset_ids);
  }

  Ok(())
}

/// Points every reference into or out of `package` at `target` instead, then drops `package`
fn redirect_references(
  package_graph: &mut PackageGraph,
  package: NodeId,
  target: NodeId,
) -> anyhow::Result<()> {
  for referenced in package_graph.get_node_ids_connected_from(package) {
    if referenced != target {
      package_graph.add_edge(target, referenced, PackageGraphEdgeType::References)?;
    }
  }

  for referrer in package_graph.get_node_ids_connected_to(package) {
    if referrer != target {
      package_graph.add_edge(referrer, target, PackageGraphEdgeType::References)?;
    }
  }

  package_graph.remove_node(package)?;
  Ok(())
}

fn content_key(tree: &DominatorTree, node_id: NodeId) -> anyhow::Result<String> {
  tree
    .get_content_key(node_id)
    .map(String::from)
    .with_context(|| format!("node {node_id} has no content key"))
}
