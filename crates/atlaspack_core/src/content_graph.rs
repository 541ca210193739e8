//! A directed multigraph whose nodes are addressed by stable string content keys.
//!
//! Node ids are dense indexes into an arena and stay valid for the lifetime of a
//! graph instance; removed nodes leave a tombstone behind instead of shifting ids.
//!
//! Adjacency is stored in insertion order. Everything built on top of this graph
//! (the bundler stages in particular) relies on that to produce stable output for
//! identical input.
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use indexmap::IndexMap;
use petgraph::dot::Dot;
use petgraph::stable_graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;

pub type NodeId = usize;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ContentGraphError {
  #[error("Node {0} does not exist in the graph")]
  NodeNotFound(NodeId),

  #[error("No node found for content key {0:?}")]
  ContentKeyNotFound(String),
}

/// Events emitted by [`ContentGraph::traverse`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraversalEvent {
  /// The node is visited for the first time (pre-order)
  Enter(NodeId),
  /// All of the node's children have been visited (post-order)
  Exit(NodeId),
}

/// Returned by traversal visitors to steer the traversal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraversalControl {
  #[default]
  Continue,
  /// Do not descend into the children of the node that was just entered
  Prune,
  /// Stop the traversal
  Break,
}

struct Frame {
  node_id: NodeId,
  children: Vec<NodeId>,
  next_child: usize,
}

#[derive(Clone, Debug)]
pub struct ContentGraph<N, E, W = ()> {
  nodes: Vec<Option<N>>,
  content_keys: Vec<Option<String>>,
  content_key_to_node_id: HashMap<String, NodeId>,
  outbound: Vec<IndexMap<NodeId, Vec<E>>>,
  inbound: Vec<IndexMap<NodeId, Vec<E>>>,
  weights: HashMap<(NodeId, NodeId, E), W>,
  node_count: usize,
  edge_count: usize,
}

impl<N, E, W> Default for ContentGraph<N, E, W>
where
  E: Copy + Eq + Hash,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<N, E, W> ContentGraph<N, E, W>
where
  E: Copy + Eq + Hash,
{
  pub fn new() -> Self {
    ContentGraph {
      nodes: Vec::new(),
      content_keys: Vec::new(),
      content_key_to_node_id: HashMap::new(),
      outbound: Vec::new(),
      inbound: Vec::new(),
      weights: HashMap::new(),
      node_count: 0,
      edge_count: 0,
    }
  }

  /// Adds a node without a content key
  pub fn add_node(&mut self, value: N) -> NodeId {
    let node_id = self.nodes.len();

    self.nodes.push(Some(value));
    self.content_keys.push(None);
    self.outbound.push(IndexMap::new());
    self.inbound.push(IndexMap::new());
    self.node_count += 1;

    node_id
  }

  /// Adds a node under `content_key`.
  ///
  /// If a node already exists for the key its id is returned and `value` is dropped.
  pub fn add_node_by_content_key(&mut self, content_key: impl Into<String>, value: N) -> NodeId {
    let content_key = content_key.into();
    if let Some(node_id) = self.content_key_to_node_id.get(&content_key) {
      return *node_id;
    }

    let node_id = self.add_node(value);
    self.content_keys[node_id] = Some(content_key.clone());
    self.content_key_to_node_id.insert(content_key, node_id);

    node_id
  }

  pub fn has_node(&self, node_id: NodeId) -> bool {
    matches!(self.nodes.get(node_id), Some(Some(_)))
  }

  pub fn get_node(&self, node_id: NodeId) -> Option<&N> {
    self.nodes.get(node_id).and_then(Option::as_ref)
  }

  pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut N> {
    self.nodes.get_mut(node_id).and_then(Option::as_mut)
  }

  pub fn expect_node(&self, node_id: NodeId) -> Result<&N, ContentGraphError> {
    self
      .get_node(node_id)
      .ok_or(ContentGraphError::NodeNotFound(node_id))
  }

  pub fn get_node_id_by_content_key(&self, content_key: &str) -> Option<NodeId> {
    self.content_key_to_node_id.get(content_key).copied()
  }

  pub fn expect_node_id_by_content_key(
    &self,
    content_key: &str,
  ) -> Result<NodeId, ContentGraphError> {
    self
      .get_node_id_by_content_key(content_key)
      .ok_or_else(|| ContentGraphError::ContentKeyNotFound(content_key.to_string()))
  }

  pub fn get_content_key(&self, node_id: NodeId) -> Option<&str> {
    self
      .content_keys
      .get(node_id)
      .and_then(|key| key.as_deref())
  }

  pub fn node_count(&self) -> usize {
    self.node_count
  }

  pub fn edge_count(&self) -> usize {
    self.edge_count
  }

  /// One past the largest node id ever assigned, tombstones included
  pub fn node_bound(&self) -> usize {
    self.nodes.len()
  }

  /// Ids of all live nodes in ascending order
  pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
    self
      .nodes
      .iter()
      .enumerate()
      .filter_map(|(node_id, node)| node.as_ref().map(|_| node_id))
  }

  pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &N)> + '_ {
    self
      .nodes
      .iter()
      .enumerate()
      .filter_map(|(node_id, node)| node.as_ref().map(|node| (node_id, node)))
  }

  /// All edges, grouped by source node and in insertion order within each source
  pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, E)> + '_ {
    self
      .outbound
      .iter()
      .enumerate()
      .flat_map(|(from, targets)| {
        targets.iter().flat_map(move |(to, edge_types)| {
          edge_types
            .iter()
            .map(move |edge_type| (from, *to, *edge_type))
        })
      })
  }

  /// Adds an edge, returning `false` when the same `(from, to, type)` edge already existed
  pub fn add_edge(
    &mut self,
    from: NodeId,
    to: NodeId,
    edge_type: E,
  ) -> Result<bool, ContentGraphError> {
    self.ensure_node(from)?;
    self.ensure_node(to)?;

    let edge_types = self.outbound[from].entry(to).or_default();
    if edge_types.contains(&edge_type) {
      return Ok(false);
    }

    edge_types.push(edge_type);
    self.inbound[to].entry(from).or_default().push(edge_type);
    self.edge_count += 1;

    Ok(true)
  }

  /// Adds an edge and sets its weight, replacing the weight of an existing edge
  pub fn add_edge_with_weight(
    &mut self,
    from: NodeId,
    to: NodeId,
    edge_type: E,
    weight: W,
  ) -> Result<bool, ContentGraphError> {
    let added = self.add_edge(from, to, edge_type)?;
    self.weights.insert((from, to, edge_type), weight);
    Ok(added)
  }

  pub fn get_edge_weight(&self, from: NodeId, to: NodeId, edge_type: E) -> Option<&W> {
    self.weights.get(&(from, to, edge_type))
  }

  pub fn get_edge_weight_mut(&mut self, from: NodeId, to: NodeId, edge_type: E) -> Option<&mut W> {
    self.weights.get_mut(&(from, to, edge_type))
  }

  /// Checks for an edge between two nodes, of a given type or of any type when `edge_type` is
  /// `None`
  pub fn has_edge(&self, from: NodeId, to: NodeId, edge_type: Option<E>) -> bool {
    self
      .outbound
      .get(from)
      .and_then(|targets| targets.get(&to))
      .is_some_and(|edge_types| match edge_type {
        Some(edge_type) => edge_types.contains(&edge_type),
        None => !edge_types.is_empty(),
      })
  }

  /// The types of all edges from `from` to `to`, in insertion order
  pub fn get_edge_types_between(&self, from: NodeId, to: NodeId) -> &[E] {
    self
      .outbound
      .get(from)
      .and_then(|targets| targets.get(&to))
      .map(|edge_types| edge_types.as_slice())
      .unwrap_or(&[])
  }

  pub fn remove_edge(
    &mut self,
    from: NodeId,
    to: NodeId,
    edge_type: E,
  ) -> Result<bool, ContentGraphError> {
    self.ensure_node(from)?;
    self.ensure_node(to)?;

    if !remove_adjacent(&mut self.outbound[from], to, edge_type) {
      return Ok(false);
    }

    remove_adjacent(&mut self.inbound[to], from, edge_type);
    self.weights.remove(&(from, to, edge_type));
    self.edge_count -= 1;

    Ok(true)
  }

  /// Removes a node and every edge touching it, returning its value
  pub fn remove_node(&mut self, node_id: NodeId) -> Result<N, ContentGraphError> {
    self.ensure_node(node_id)?;

    let outgoing = self.outgoing_edges(node_id);
    for (to, edge_type) in outgoing {
      self.remove_edge(node_id, to, edge_type)?;
    }

    let incoming = self.incoming_edges(node_id);
    for (from, edge_type) in incoming {
      self.remove_edge(from, node_id, edge_type)?;
    }

    if let Some(content_key) = self.content_keys[node_id].take() {
      self.content_key_to_node_id.remove(&content_key);
    }

    self.node_count -= 1;
    self.nodes[node_id]
      .take()
      .ok_or(ContentGraphError::NodeNotFound(node_id))
  }

  /// Nodes with an edge from `node_id`, each listed once, in insertion order
  ///
  /// Unknown ids have no neighbours.
  pub fn get_node_ids_connected_from(&self, node_id: NodeId) -> Vec<NodeId> {
    self
      .outbound
      .get(node_id)
      .map(|targets| targets.keys().copied().collect())
      .unwrap_or_default()
  }

  /// Nodes with an edge to `node_id`, each listed once, in insertion order
  pub fn get_node_ids_connected_to(&self, node_id: NodeId) -> Vec<NodeId> {
    self
      .inbound
      .get(node_id)
      .map(|sources| sources.keys().copied().collect())
      .unwrap_or_default()
  }

  pub fn get_node_ids_connected_from_by_type(&self, node_id: NodeId, edge_type: E) -> Vec<NodeId> {
    filter_adjacent(self.outbound.get(node_id), edge_type)
  }

  pub fn get_node_ids_connected_to_by_type(&self, node_id: NodeId, edge_type: E) -> Vec<NodeId> {
    filter_adjacent(self.inbound.get(node_id), edge_type)
  }

  /// Depth-first traversal from `start`, following edges of `edge_type` (or all edges).
  ///
  /// Children are visited in insertion order and every node is entered at most once.
  pub fn traverse<F>(
    &self,
    start: NodeId,
    edge_type: Option<E>,
    mut visit: F,
  ) -> Result<(), ContentGraphError>
  where
    F: FnMut(TraversalEvent) -> TraversalControl,
  {
    self.ensure_node(start)?;

    let mut visited = vec![false; self.nodes.len()];
    let mut stack = Vec::new();

    visited[start] = true;
    match visit(TraversalEvent::Enter(start)) {
      TraversalControl::Break => return Ok(()),
      TraversalControl::Prune => {
        visit(TraversalEvent::Exit(start));
        return Ok(());
      }
      TraversalControl::Continue => stack.push(Frame {
        node_id: start,
        children: self.children(start, edge_type),
        next_child: 0,
      }),
    }

    while let Some(frame) = stack.last_mut() {
      if let Some(&child) = frame.children.get(frame.next_child) {
        frame.next_child += 1;
        if visited[child] {
          continue;
        }

        visited[child] = true;
        match visit(TraversalEvent::Enter(child)) {
          TraversalControl::Break => return Ok(()),
          TraversalControl::Prune => {
            if visit(TraversalEvent::Exit(child)) == TraversalControl::Break {
              return Ok(());
            }
          }
          TraversalControl::Continue => stack.push(Frame {
            node_id: child,
            children: self.children(child, edge_type),
            next_child: 0,
          }),
        }
      } else {
        let node_id = frame.node_id;
        stack.pop();

        if visit(TraversalEvent::Exit(node_id)) == TraversalControl::Break {
          return Ok(());
        }
      }
    }

    Ok(())
  }

  /// Nodes reachable from `start` in depth-first post-order
  pub fn post_order(
    &self,
    start: NodeId,
    edge_type: Option<E>,
  ) -> Result<Vec<NodeId>, ContentGraphError> {
    let mut order = Vec::new();
    self.traverse(start, edge_type, |event| {
      if let TraversalEvent::Exit(node_id) = event {
        order.push(node_id);
      }
      TraversalControl::Continue
    })?;
    Ok(order)
  }

  /// Copies every node, with the same ids and content keys, into a graph with no edges
  pub fn clone_without_edges<E2, W2>(&self) -> ContentGraph<N, E2, W2>
  where
    N: Clone,
    E2: Copy + Eq + Hash,
  {
    ContentGraph {
      nodes: self.nodes.clone(),
      content_keys: self.content_keys.clone(),
      content_key_to_node_id: self.content_key_to_node_id.clone(),
      outbound: self.nodes.iter().map(|_| IndexMap::new()).collect(),
      inbound: self.nodes.iter().map(|_| IndexMap::new()).collect(),
      weights: HashMap::new(),
      node_count: self.node_count,
      edge_count: 0,
    }
  }

  /// Builds a labelled petgraph copy of this graph for debugging output.
  ///
  /// Nodes are added in id order and edges in [`ContentGraph::edges`] order.
  pub fn to_debug_graph(
    &self,
    node_label: impl Fn(NodeId, &N) -> String,
    edge_label: impl Fn(E, Option<&W>) -> String,
  ) -> StableDiGraph<String, String> {
    let mut result = StableDiGraph::new();
    let mut indexes: HashMap<NodeId, NodeIndex> = HashMap::new();

    for (node_id, node) in self.nodes() {
      indexes.insert(node_id, result.add_node(node_label(node_id, node)));
    }

    for (from, to, edge_type) in self.edges() {
      let (Some(from_index), Some(to_index)) = (indexes.get(&from), indexes.get(&to)) else {
        continue;
      };
      result.add_edge(
        *from_index,
        *to_index,
        edge_label(edge_type, self.get_edge_weight(from, to, edge_type)),
      );
    }

    result
  }

  /// Renders the graph in graphviz `digraph` format
  pub fn to_dot(
    &self,
    node_label: impl Fn(NodeId, &N) -> String,
    edge_label: impl Fn(E, Option<&W>) -> String,
  ) -> String {
    let debug_graph = self.to_debug_graph(node_label, edge_label);
    format!("{}", Dot::new(&debug_graph))
  }

  fn ensure_node(&self, node_id: NodeId) -> Result<(), ContentGraphError> {
    if self.has_node(node_id) {
      Ok(())
    } else {
      Err(ContentGraphError::NodeNotFound(node_id))
    }
  }

  fn children(&self, node_id: NodeId, edge_type: Option<E>) -> Vec<NodeId> {
    match edge_type {
      Some(edge_type) => self.get_node_ids_connected_from_by_type(node_id, edge_type),
      None => self.get_node_ids_connected_from(node_id),
    }
  }

  fn outgoing_edges(&self, node_id: NodeId) -> Vec<(NodeId, E)> {
    flatten_adjacent(&self.outbound[node_id])
  }

  fn incoming_edges(&self, node_id: NodeId) -> Vec<(NodeId, E)> {
    flatten_adjacent(&self.inbound[node_id])
  }
}

fn remove_adjacent<E: Copy + Eq>(
  adjacent: &mut IndexMap<NodeId, Vec<E>>,
  node_id: NodeId,
  edge_type: E,
) -> bool {
  let Some(edge_types) = adjacent.get_mut(&node_id) else {
    return false;
  };

  let Some(position) = edge_types.iter().position(|t| *t == edge_type) else {
    return false;
  };

  edge_types.remove(position);
  if edge_types.is_empty() {
    adjacent.shift_remove(&node_id);
  }

  true
}

fn filter_adjacent<E: Copy + Eq>(
  adjacent: Option<&IndexMap<NodeId, Vec<E>>>,
  edge_type: E,
) -> Vec<NodeId> {
  adjacent
    .map(|adjacent| {
      adjacent
        .iter()
        .filter(|(_, edge_types)| edge_types.contains(&edge_type))
        .map(|(node_id, _)| *node_id)
        .collect()
    })
    .unwrap_or_default()
}

fn flatten_adjacent<E: Copy>(adjacent: &IndexMap<NodeId, Vec<E>>) -> Vec<(NodeId, E)> {
  adjacent
    .iter()
    .flat_map(|(node_id, edge_types)| {
      edge_types
        .iter()
        .map(move |edge_type| (*node_id, *edge_type))
    })
    .collect()
}
