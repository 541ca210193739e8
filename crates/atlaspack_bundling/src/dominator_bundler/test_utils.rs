use std::sync::Arc;

use atlaspack_core::asset_graph::AssetGraph;
use atlaspack_core::content_graph::NodeId;
use atlaspack_core::types::Asset;
use atlaspack_core::types::AssetId;
use atlaspack_core::types::Dependency;
use atlaspack_core::types::Environment;
use atlaspack_core::types::Priority;
use atlaspack_core::types::Target;

use super::types::add_merged_edge;
use super::types::BundlerNode;
use super::types::DependencyEdge;
use super::types::RootedEdgeType;
use super::types::RootedGraph;
use super::types::ROOT_CONTENT_KEY;

/// Builds rooted graphs directly, without going through an asset graph
pub struct RootedGraphBuilder {
  graph: RootedGraph,
  root: NodeId,
  env: Arc<Environment>,
}

pub fn rooted_graph_builder() -> RootedGraphBuilder {
  let mut graph = RootedGraph::new();
  let root = graph.add_node_by_content_key(ROOT_CONTENT_KEY, BundlerNode::Root);

  RootedGraphBuilder {
    graph,
    root,
    env: Arc::new(Environment::default()),
  }
}

impl RootedGraphBuilder {
  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn entry_asset(&mut self, file_path: &str) -> NodeId {
    let node_id = self.asset(file_path);
    self
      .graph
      .add_edge(self.root, node_id, RootedEdgeType::Sync)
      .unwrap();
    node_id
  }

  pub fn asset(&mut self, file_path: &str) -> NodeId {
    let asset = Arc::new(Asset::new(file_path, self.env.clone()));
    self
      .graph
      .add_node_by_content_key(asset.id.clone(), BundlerNode::Asset(asset))
  }

  pub fn sync_dependency(&mut self, from: NodeId, to: NodeId) -> &mut Self {
    self.dependency(from, to, RootedEdgeType::Sync)
  }

  pub fn async_dependency(&mut self, from: NodeId, to: NodeId) -> &mut Self {
    self.dependency(from, to, RootedEdgeType::Async);
    self
      .graph
      .add_edge(self.root, to, RootedEdgeType::Async)
      .unwrap();
    self
  }

  fn dependency(&mut self, from: NodeId, to: NodeId, edge_type: RootedEdgeType) -> &mut Self {
    let dependency_id = format!("{from}->{to}");
    add_merged_edge(
      &mut self.graph,
      from,
      to,
      edge_type,
      Some(&DependencyEdge::new(dependency_id)),
    )
    .unwrap();
    self
  }

  pub fn build(self) -> RootedGraph {
    self.graph
  }
}

/// Builds full asset graphs, with dependency nodes between assets
#[derive(Default)]
pub struct AssetGraphFixture {
  pub graph: AssetGraph,
  pub target: Target,
  entries: Vec<AssetId>,
}

impl AssetGraphFixture {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entry(&mut self, file_path: &str) -> NodeId {
    let dependency = Dependency::entry(file_path, self.target.clone());
    let dependency_node_id = self.graph.add_entry_dependency(dependency).unwrap();
    let asset_node_id = self.asset(file_path);
    self
      .graph
      .add_edge(dependency_node_id, asset_node_id)
      .unwrap();
    self.entries.push(self.asset_id(asset_node_id));
    asset_node_id
  }

  pub fn asset(&mut self, file_path: &str) -> NodeId {
    let asset = Asset::new(file_path, self.target.env.clone());
    self.graph.add_asset(Arc::new(asset))
  }

  pub fn dependency(&mut self, from: NodeId, to: NodeId, priority: Priority) -> NodeId {
    self.import(from, to, &format!("./{to}"), priority)
  }

  /// Adds a dependency with an explicit specifier, so one asset can import another twice
  pub fn import(
    &mut self,
    from: NodeId,
    to: NodeId,
    specifier: &str,
    priority: Priority,
  ) -> NodeId {
    let source = self.graph.get_asset(from).unwrap().clone();
    let dependency = Dependency::from_asset(
      source.id.clone(),
      source.file_path.clone(),
      specifier,
      priority,
      source.env.clone(),
    );
    let dependency_node_id = self.graph.add_dependency(dependency);
    self.graph.add_edge(from, dependency_node_id).unwrap();
    self.graph.add_edge(dependency_node_id, to).unwrap();
    dependency_node_id
  }

  pub fn asset_id(&self, node_id: NodeId) -> AssetId {
    self.graph.get_asset(node_id).unwrap().id.clone()
  }

  pub fn entries(&self) -> Vec<AssetId> {
    self.entries.clone()
  }
}

/// Finds the node holding the asset at `file_path`
pub fn node_by_path<E, W>(
  graph: &atlaspack_core::content_graph::ContentGraph<BundlerNode, E, W>,
  file_path: &str,
) -> NodeId
where
  E: Copy + Eq + std::hash::Hash,
{
  graph
    .nodes()
    .find(|(_, node)| {
      node
        .assets()
        .iter()
        .any(|asset| asset.file_path.to_str() == Some(file_path))
    })
    .map(|(node_id, _)| node_id)
    .unwrap_or_else(|| panic!("no node holds {file_path}"))
}
