use std::collections::HashMap;
use std::collections::HashSet;

use anyhow::Context;
use atlaspack_core::content_graph::NodeId;
use atlaspack_core::content_graph::TraversalControl;
use atlaspack_core::content_graph::TraversalEvent;
use atlaspack_core::hash::hash_string;
use atlaspack_core::types::AssetId;
use atlaspack_core::types::FileType;
use atlaspack_core::types::Target;
use indexmap::IndexMap;
use indexmap::IndexSet;
use serde::Serialize;
use tracing::debug;
use tracing::instrument;

use super::packages::bundle_owners;
use super::packages::subtree_asset_ids;
use super::types::display_name;
use super::types::root_node_id;
use super::types::BundlerNode;
use super::types::DominatorTree;
use super::types::DominatorTreeEdgeType;
use super::types::RootedEdgeType;
use super::types::RootedGraph;

/// Why a bundle exists
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleKind {
  /// Loaded by one of the requested entries
  Entry,
  /// Loaded lazily through a non-sync dependency
  Async,
  /// Split off because its type differs from the importing asset
  TypeChange,
  /// Code shared by several entries or async boundaries
  Shared,
  /// A runtime helper module nothing imports yet
  Helper,
}

/// A terminal bundle and the assets assigned to it
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedBundle {
  pub id: String,

  /// Deterministic name derived from the entry points the bundle serves
  pub key: String,

  pub kind: BundleKind,

  /// Content key of the dominator tree node the bundle was created from
  pub root_content_key: String,

  /// Member assets in dominator tree pre-order
  pub asset_ids: Vec<AssetId>,

  /// Display names of the entries and async boundaries that load this bundle
  pub entry_point_keys: Vec<String>,

  #[serde(rename = "type")]
  pub bundle_type: FileType,

  pub target: Target,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleEdgeType {
  /// The bundle must be loaded alongside the referencing bundle
  Sync,
  /// The bundle is loaded on demand
  Async,
}

/// Bundle level dependency between two [`AssignedBundle`]s, by id
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEdge {
  pub from: String,
  pub to: String,
  pub edge_type: BundleEdgeType,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DominatorBundlerStats {
  pub assets: usize,
  pub dependencies: usize,
  pub strongly_connected_components: usize,
  pub packages_created: usize,
  pub packages_merged: usize,
  pub bundles: usize,
}

/// Output of the dominator bundler.
///
/// Every asset reachable from the entries belongs to exactly one bundle.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleAssignment {
  /// Bundles in dominator tree order
  pub bundles: Vec<AssignedBundle>,

  /// Asset id to bundle id
  pub asset_to_bundle: IndexMap<AssetId, String>,

  pub bundle_edges: Vec<BundleEdge>,

  pub stats: DominatorBundlerStats,
}

impl BundleAssignment {
  pub fn get_bundle(&self, bundle_id: &str) -> Option<&AssignedBundle> {
    self.bundles.iter().find(|bundle| bundle.id == bundle_id)
  }

  pub fn get_bundle_by_key(&self, key: &str) -> Option<&AssignedBundle> {
    self.bundles.iter().find(|bundle| bundle.key == key)
  }

  /// The bundle an asset was assigned to
  pub fn bundle_for_asset(&self, asset_id: &str) -> Option<&AssignedBundle> {
    self
      .asset_to_bundle
      .get(asset_id)
      .and_then(|bundle_id| self.get_bundle(bundle_id))
  }
}

/// Turns every root child of the final dominator tree into a bundle.
///
/// `graph` is the acyclic rooted graph the tree was built from. It decides what kind of
/// bundle a root child becomes and which bundles load each other.
#[instrument(level = "debug", skip_all)]
pub fn build_bundle_assignment(
  graph: &RootedGraph,
  tree: &DominatorTree,
  entries: &[AssetId],
  target: &Target,
  mut stats: DominatorBundlerStats,
) -> anyhow::Result<BundleAssignment> {
  let root = root_node_id(tree)?;
  let entries = entries.iter().map(String::as_str).collect::<HashSet<_>>();

  let mut assignment = BundleAssignment::default();
  let mut bundle_ids = HashMap::new();

  for bundle_root in tree.get_node_ids_connected_from(root) {
    let bundle = assigned_bundle(graph, tree, root, bundle_root, &entries, target)?;

    for asset_id in &bundle.asset_ids {
      let previous = assignment
        .asset_to_bundle
        .insert(asset_id.clone(), bundle.id.clone());
      anyhow::ensure!(
        previous.is_none(),
        "asset {asset_id} is assigned to more than one bundle"
      );
    }

    bundle_ids.insert(bundle_root, bundle.id.clone());
    assignment.bundles.push(bundle);
  }

  for (_, node) in graph.nodes() {
    for asset in node.assets() {
      anyhow::ensure!(
        assignment.asset_to_bundle.contains_key(&asset.id),
        "asset {} was not assigned to a bundle",
        asset.display_name()
      );
    }
  }

  let owners = bundle_owners(tree, root)?;
  let mut bundle_edges = IndexSet::new();
  for (from, to, edge_type) in graph.edges() {
    if from == root {
      continue;
    }

    let (Some(from_owner), Some(to_owner)) = (owners.get(&from), owners.get(&to)) else {
      continue;
    };
    if from_owner == to_owner {
      continue;
    }

    let (Some(from_bundle), Some(to_bundle)) =
      (bundle_ids.get(from_owner), bundle_ids.get(to_owner))
    else {
      continue;
    };

    bundle_edges.insert(BundleEdge {
      from: from_bundle.clone(),
      to: to_bundle.clone(),
      edge_type: match edge_type {
        RootedEdgeType::Sync => BundleEdgeType::Sync,
        RootedEdgeType::Async | RootedEdgeType::TypeChange => BundleEdgeType::Async,
      },
    });
  }

  assignment.bundle_edges = bundle_edges.into_iter().collect();
  stats.bundles = assignment.bundles.len();
  assignment.stats = stats;

  debug!(
    bundles = assignment.bundles.len(),
    assets = assignment.asset_to_bundle.len(),
    bundle_edges = assignment.bundle_edges.len(),
    "dominator bundler: assigned bundles"
  );

  Ok(assignment)
}

fn assigned_bundle(
  graph: &RootedGraph,
  tree: &DominatorTree,
  root: NodeId,
  bundle_root: NodeId,
  entries: &HashSet<&str>,
  target: &Target,
) -> anyhow::Result<AssignedBundle> {
  let node = tree.expect_node(bundle_root)?;
  let root_content_key = tree
    .get_content_key(bundle_root)
    .map(String::from)
    .with_context(|| format!("bundle root {bundle_root} has no content key"))?;

  let (kind, key, entry_point_keys) = match node {
    BundlerNode::Package {
      entry_point_ids, ..
    } => {
      let mut entry_point_keys = entry_point_ids
        .iter()
        .map(|entry_point| display_name(graph, *entry_point))
        .collect::<anyhow::Result<Vec<_>>>()?;
      entry_point_keys.sort();
      (BundleKind::Shared, root_content_key.clone(), entry_point_keys)
    }
    BundlerNode::Root => anyhow::bail!("root node {bundle_root} cannot be a bundle"),
    BundlerNode::Asset(_) | BundlerNode::StronglyConnectedComponent { .. } => {
      let name = display_name(tree, bundle_root)?;
      let kind = boundary_kind(graph, root, bundle_root, node, entries);
      let prefix = match kind {
        BundleKind::Entry => "entry",
        BundleKind::Async => "async",
        BundleKind::TypeChange => "type-change",
        BundleKind::Shared => "shared",
        BundleKind::Helper => "helper",
      };
      (kind, format!("{prefix}:{name}"), vec![name])
    }
  };

  let asset_ids = subtree_asset_ids(tree, bundle_root)?;
  let bundle_type = first_asset_type(tree, bundle_root)?;

  Ok(AssignedBundle {
    id: hash_string(format!("bundle:{}{}", key, target.dist_dir.display())),
    key,
    kind,
    root_content_key,
    asset_ids,
    entry_point_keys,
    bundle_type,
    target: target.clone(),
  })
}

/// Classifies a bundle created from a root child of the rooted graph.
///
/// A node that is only a root child of the dominator tree is code that several paths reach
/// without any one of them dominating it.
fn boundary_kind(
  graph: &RootedGraph,
  root: NodeId,
  bundle_root: NodeId,
  node: &BundlerNode,
  entries: &HashSet<&str>,
) -> BundleKind {
  let edge_types = graph.get_edge_types_between(root, bundle_root);

  if edge_types.contains(&RootedEdgeType::Sync) {
    let is_entry = node
      .assets()
      .iter()
      .any(|asset| entries.contains(asset.id.as_str()));
    if is_entry {
      BundleKind::Entry
    } else {
      BundleKind::Helper
    }
  } else if edge_types.contains(&RootedEdgeType::Async) {
    BundleKind::Async
  } else if edge_types.contains(&RootedEdgeType::TypeChange) {
    BundleKind::TypeChange
  } else {
    BundleKind::Shared
  }
}

/// The bundle type of the first asset in the subtree of `bundle_root`, in pre-order
fn first_asset_type(tree: &DominatorTree, bundle_root: NodeId) -> anyhow::Result<FileType> {
  let mut file_type = None;

  tree.traverse(bundle_root, Some(DominatorTreeEdgeType::Contains), |event| {
    let TraversalEvent::Enter(node_id) = event else {
      return TraversalControl::Continue;
    };
    match tree.get_node(node_id).and_then(|node| node.assets().first()) {
      Some(asset) => {
        file_type = Some(asset.file_type.bundle_type());
        TraversalControl::Break
      }
      None => TraversalControl::Continue,
    }
  })?;

  file_type.with_context(|| format!("bundle root {bundle_root} has no assets"))
}
