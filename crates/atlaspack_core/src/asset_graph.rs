use std::sync::Arc;

use crate::content_graph::ContentGraph;
use crate::content_graph::ContentGraphError;
use crate::content_graph::NodeId;
use crate::content_graph::TraversalControl;
use crate::content_graph::TraversalEvent;
use crate::types::Asset;
use crate::types::AssetId;
use crate::types::Bundle;
use crate::types::Dependency;

const ROOT_CONTENT_KEY: &str = "@@root";

#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum AssetGraphNode {
  Root,
  Asset(Arc<Asset>),
  Dependency(Arc<Dependency>),
  Bundle(Arc<Bundle>),
}

/// `Null` edges form the module graph (root -> dependency -> asset -> dependency ...).
/// `Contains` edges attach assets to the bundles that already hold them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AssetGraphEdgeType {
  #[default]
  Null,
  Contains,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AssetGraphError {
  #[error(transparent)]
  Graph(#[from] ContentGraphError),

  #[error("Node {0} is not an asset")]
  NotAnAsset(NodeId),

  #[error("Asset {0} is not in the asset graph")]
  AssetNotFound(AssetId),
}

/// The module graph produced by transformation and resolution
///
/// Assets and dependencies are keyed by their ids so re-adding one returns the existing node.
#[derive(Clone, Debug)]
pub struct AssetGraph {
  graph: ContentGraph<AssetGraphNode, AssetGraphEdgeType>,
  root_node_id: NodeId,
}

impl Default for AssetGraph {
  fn default() -> Self {
    Self::new()
  }
}

impl AssetGraph {
  pub fn new() -> Self {
    let mut graph = ContentGraph::new();
    let root_node_id = graph.add_node_by_content_key(ROOT_CONTENT_KEY, AssetGraphNode::Root);

    AssetGraph {
      graph,
      root_node_id,
    }
  }

  pub fn root_node(&self) -> NodeId {
    self.root_node_id
  }

  pub fn graph(&self) -> &ContentGraph<AssetGraphNode, AssetGraphEdgeType> {
    &self.graph
  }

  pub fn node_count(&self) -> usize {
    self.graph.node_count()
  }

  pub fn get_node(&self, node_id: NodeId) -> Option<&AssetGraphNode> {
    self.graph.get_node(node_id)
  }

  pub fn add_asset(&mut self, asset: Arc<Asset>) -> NodeId {
    self
      .graph
      .add_node_by_content_key(asset.id.clone(), AssetGraphNode::Asset(asset))
  }

  pub fn add_dependency(&mut self, dependency: Dependency) -> NodeId {
    self
      .graph
      .add_node_by_content_key(dependency.id(), AssetGraphNode::Dependency(Arc::new(dependency)))
  }

  /// Adds a dependency and connects it to the root node
  pub fn add_entry_dependency(
    &mut self,
    dependency: Dependency,
  ) -> Result<NodeId, AssetGraphError> {
    let dependency_node_id = self.add_dependency(dependency);
    self.add_edge(self.root_node_id, dependency_node_id)?;
    Ok(dependency_node_id)
  }

  pub fn add_bundle(&mut self, bundle: Bundle) -> NodeId {
    self.graph.add_node_by_content_key(
      format!("bundle:{}", bundle.id),
      AssetGraphNode::Bundle(Arc::new(bundle)),
    )
  }

  pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), AssetGraphError> {
    self.add_edge_of_type(from, to, AssetGraphEdgeType::Null)
  }

  pub fn add_edge_of_type(
    &mut self,
    from: NodeId,
    to: NodeId,
    edge_type: AssetGraphEdgeType,
  ) -> Result<(), AssetGraphError> {
    self.graph.add_edge(from, to, edge_type)?;
    Ok(())
  }

  pub fn get_asset(&self, node_id: NodeId) -> Option<&Arc<Asset>> {
    match self.graph.get_node(node_id)? {
      AssetGraphNode::Asset(asset) => Some(asset),
      _ => None,
    }
  }

  pub fn get_dependency(&self, node_id: NodeId) -> Option<&Arc<Dependency>> {
    match self.graph.get_node(node_id)? {
      AssetGraphNode::Dependency(dependency) => Some(dependency),
      _ => None,
    }
  }

  pub fn get_bundle(&self, node_id: NodeId) -> Option<&Arc<Bundle>> {
    match self.graph.get_node(node_id)? {
      AssetGraphNode::Bundle(bundle) => Some(bundle),
      _ => None,
    }
  }

  pub fn get_asset_node_id(&self, asset_id: &str) -> Option<NodeId> {
    self
      .graph
      .get_node_id_by_content_key(asset_id)
      .filter(|node_id| self.get_asset(*node_id).is_some())
  }

  /// Looks up an asset by id, failing when the id is unknown or names another kind of node
  pub fn expect_asset_node_id(&self, asset_id: &str) -> Result<NodeId, AssetGraphError> {
    let node_id = self
      .graph
      .get_node_id_by_content_key(asset_id)
      .ok_or_else(|| AssetGraphError::AssetNotFound(asset_id.to_string()))?;

    if self.get_asset(node_id).is_none() {
      return Err(AssetGraphError::NotAnAsset(node_id));
    }

    Ok(node_id)
  }

  pub fn get_assets(&self) -> impl Iterator<Item = (NodeId, &Arc<Asset>)> + '_ {
    self.graph.nodes().filter_map(|(node_id, node)| match node {
      AssetGraphNode::Asset(asset) => Some((node_id, asset)),
      _ => None,
    })
  }

  pub fn get_dependencies(&self) -> impl Iterator<Item = (NodeId, &Arc<Dependency>)> + '_ {
    self.graph.nodes().filter_map(|(node_id, node)| match node {
      AssetGraphNode::Dependency(dependency) => Some((node_id, dependency)),
      _ => None,
    })
  }

  pub fn get_node_ids_connected_from(&self, node_id: NodeId) -> Vec<NodeId> {
    self
      .graph
      .get_node_ids_connected_from_by_type(node_id, AssetGraphEdgeType::Null)
  }

  pub fn get_node_ids_connected_to(&self, node_id: NodeId) -> Vec<NodeId> {
    self
      .graph
      .get_node_ids_connected_to_by_type(node_id, AssetGraphEdgeType::Null)
  }

  /// The dependency nodes declared by an asset, in insertion order
  pub fn get_outgoing_dependencies(&self, asset_node_id: NodeId) -> Vec<NodeId> {
    self
      .get_node_ids_connected_from(asset_node_id)
      .into_iter()
      .filter(|node_id| self.get_dependency(*node_id).is_some())
      .collect()
  }

  /// The asset a dependency resolved to, if it has been resolved
  pub fn resolve_dependency_asset(&self, dependency_node_id: NodeId) -> Option<NodeId> {
    self
      .get_node_ids_connected_from(dependency_node_id)
      .into_iter()
      .find(|node_id| self.get_asset(*node_id).is_some())
  }

  /// Ids of the assets that entry dependencies resolved to, in insertion order
  pub fn entry_asset_ids(&self) -> Vec<AssetId> {
    let mut entry_asset_ids: Vec<AssetId> = Vec::new();

    for (node_id, dependency) in self.get_dependencies() {
      if !dependency.is_entry {
        continue;
      }

      let Some(asset) = self
        .resolve_dependency_asset(node_id)
        .and_then(|asset_node_id| self.get_asset(asset_node_id))
      else {
        continue;
      };

      if !entry_asset_ids.contains(&asset.id) {
        entry_asset_ids.push(asset.id.clone());
      }
    }

    entry_asset_ids
  }

  /// Depth-first walk over the assets reachable from `start`, passing through dependency nodes.
  ///
  /// Every asset is visited once, in pre-order. Bundle nodes are not entered.
  pub fn traverse_assets(
    &self,
    start: NodeId,
    mut visit: impl FnMut(NodeId, &Arc<Asset>),
  ) -> Result<(), AssetGraphError> {
    self
      .graph
      .traverse(start, Some(AssetGraphEdgeType::Null), |event| {
        let TraversalEvent::Enter(node_id) = event else {
          return TraversalControl::Continue;
        };

        match self.graph.get_node(node_id) {
          Some(AssetGraphNode::Asset(asset)) => {
            visit(node_id, asset);
            TraversalControl::Continue
          }
          Some(AssetGraphNode::Bundle(_)) => TraversalControl::Prune,
          _ => TraversalControl::Continue,
        }
      })?;

    Ok(())
  }
}
