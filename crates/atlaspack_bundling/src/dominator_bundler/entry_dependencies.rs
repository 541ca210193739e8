use std::collections::HashMap;

use atlaspack_core::content_graph::NodeId;
use indexmap::IndexSet;
use tracing::debug;
use tracing::instrument;

use super::types::RootedEdgeType;
use super::types::RootedGraph;

/// For every node, the entries and async boundaries it can be synchronously reached from
#[derive(Debug, Default)]
pub struct EntryDependencies {
  pub entries: Vec<NodeId>,
  pub async_boundaries: Vec<NodeId>,
  entry_dependencies_by_asset: HashMap<NodeId, IndexSet<NodeId>>,
  async_dependencies_by_asset: HashMap<NodeId, IndexSet<NodeId>>,
}

impl EntryDependencies {
  /// Entries `node_id` is synchronously reachable from, in root order
  pub fn entry_dependencies(&self, node_id: NodeId) -> Option<&IndexSet<NodeId>> {
    self.entry_dependencies_by_asset.get(&node_id)
  }

  /// Async boundaries `node_id` is synchronously reachable from, in root order
  pub fn async_dependencies(&self, node_id: NodeId) -> Option<&IndexSet<NodeId>> {
    self.async_dependencies_by_asset.get(&node_id)
  }

  /// Whether `node_id` can only be loaded lazily
  pub fn is_async_only(&self, node_id: NodeId) -> bool {
    self.entry_dependencies(node_id).is_none() && self.async_dependencies(node_id).is_some()
  }

  /// Every entry and async boundary that loads `node_id`, entries first
  pub fn chunk_entry_points(&self, node_id: NodeId) -> Vec<NodeId> {
    let entries = self.entry_dependencies(node_id).into_iter().flatten();
    let async_boundaries = self.async_dependencies(node_id).into_iter().flatten();

    entries
      .chain(async_boundaries)
      .copied()
      .collect::<IndexSet<_>>()
      .into_iter()
      .collect()
  }
}

/// Computes sync reachability from every entry and every async boundary.
///
/// Entries are the `Sync` children of the root, async boundaries its `Async` and `TypeChange`
/// children. Only `Sync` edges are followed.
#[instrument(level = "debug", skip_all)]
pub fn build_entry_dependencies(graph: &RootedGraph, root: NodeId) -> EntryDependencies {
  let mut result = EntryDependencies::default();

  for child in graph.get_node_ids_connected_from(root) {
    for edge_type in graph.get_edge_types_between(root, child) {
      let roots = match edge_type {
        RootedEdgeType::Sync => &mut result.entries,
        RootedEdgeType::Async | RootedEdgeType::TypeChange => &mut result.async_boundaries,
      };
      if !roots.contains(&child) {
        roots.push(child);
      }
    }
  }

  for entry in &result.entries {
    for node_id in sync_reachable(graph, *entry) {
      result
        .entry_dependencies_by_asset
        .entry(node_id)
        .or_default()
        .insert(*entry);
    }
  }

  for boundary in &result.async_boundaries {
    for node_id in sync_reachable(graph, *boundary) {
      result
        .async_dependencies_by_asset
        .entry(node_id)
        .or_default()
        .insert(*boundary);
    }
  }

  debug!(
    entries = result.entries.len(),
    async_boundaries = result.async_boundaries.len(),
    "dominator bundler: computed entry dependencies"
  );

  result
}

fn sync_reachable(graph: &RootedGraph, start: NodeId) -> Vec<NodeId> {
  let mut reached = IndexSet::new();
  let mut worklist = vec![start];

  while let Some(node_id) = worklist.pop() {
    if !reached.insert(node_id) {
      continue;
    }
    for child in graph.get_node_ids_connected_from_by_type(node_id, RootedEdgeType::Sync) {
      if !reached.contains(&child) {
        worklist.push(child);
      }
    }
  }

  reached.into_iter().collect()
}
