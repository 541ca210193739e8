use std::collections::HashMap;
use std::hash::Hash;

use anyhow::Context;
use atlaspack_core::content_graph::ContentGraph;
use atlaspack_core::content_graph::NodeId;
use atlaspack_core::hash::hash_string;
use tracing::debug;
use tracing::instrument;

use super::types::add_merged_edge;
use super::types::BundlerNode;
use super::types::RootedGraph;

struct Frame {
  node_id: NodeId,
  children: Vec<NodeId>,
  next_child: usize,
}

struct Tarjan<'a, N, E, W> {
  graph: &'a ContentGraph<N, E, W>,
  index: Vec<Option<usize>>,
  low_link: Vec<usize>,
  on_stack: Vec<bool>,
  stack: Vec<NodeId>,
  frames: Vec<Frame>,
  next_index: usize,
  components: Vec<Vec<NodeId>>,
}

impl<'a, N, E, W> Tarjan<'a, N, E, W>
where
  E: Copy + Eq + Hash,
{
  fn new(graph: &'a ContentGraph<N, E, W>) -> Self {
    let bound = graph.node_bound();
    Tarjan {
      graph,
      index: vec![None; bound],
      low_link: vec![0; bound],
      on_stack: vec![false; bound],
      stack: Vec::new(),
      frames: Vec::new(),
      next_index: 0,
      components: Vec::new(),
    }
  }

  fn discover(&mut self, node_id: NodeId) {
    self.index[node_id] = Some(self.next_index);
    self.low_link[node_id] = self.next_index;
    self.next_index += 1;
    self.stack.push(node_id);
    self.on_stack[node_id] = true;
    self.frames.push(Frame {
      node_id,
      children: self.graph.get_node_ids_connected_from(node_id),
      next_child: 0,
    });
  }

  fn run(mut self) -> Vec<Vec<NodeId>> {
    let graph = self.graph;
    for start in graph.node_ids() {
      if self.index[start].is_some() {
        continue;
      }

      self.discover(start);
      while let Some(frame) = self.frames.last_mut() {
        let node_id = frame.node_id;

        if let Some(&child) = frame.children.get(frame.next_child) {
          frame.next_child += 1;
          match self.index[child] {
            None => self.discover(child),
            Some(child_index) if self.on_stack[child] => {
              self.low_link[node_id] = self.low_link[node_id].min(child_index);
            }
            Some(_) => {}
          }
          continue;
        }

        self.frames.pop();
        if let Some(parent) = self.frames.last() {
          self.low_link[parent.node_id] = self.low_link[parent.node_id].min(self.low_link[node_id]);
        }

        if Some(self.low_link[node_id]) == self.index[node_id] {
          let mut component = Vec::new();
          while let Some(member) = self.stack.pop() {
            self.on_stack[member] = false;
            component.push(member);
            if member == node_id {
              break;
            }
          }
          self.components.push(component);
        }
      }
    }

    self.components
  }
}

/// Tarjan's strongly connected components, without recursion.
///
/// Components are returned in the order they complete, so the deepest come first. Members are
/// listed in the order they were popped off the component stack. Every node ends up in exactly
/// one component; single nodes without a self loop form trivial components.
pub fn find_strongly_connected_components<N, E, W>(
  graph: &ContentGraph<N, E, W>,
) -> Vec<Vec<NodeId>>
where
  E: Copy + Eq + Hash,
{
  Tarjan::new(graph).run()
}

/// Whether a component is a real cycle rather than a lone node
pub fn is_cycle<N, E, W>(graph: &ContentGraph<N, E, W>, component: &[NodeId]) -> bool
where
  E: Copy + Eq + Hash,
{
  match component {
    [node_id] => graph.has_edge(*node_id, *node_id, None),
    _ => true,
  }
}

/// Replaces every cycle with a single [`BundlerNode::StronglyConnectedComponent`] node.
///
/// Edges entering or leaving a cycle are redirected to its node, parallel edges of the same type
/// are folded together and their dependency weights accumulated. Edges inside a cycle are dropped.
#[instrument(level = "debug", skip_all)]
pub fn convert_to_acyclic_graph(
  graph: &RootedGraph,
  components: &[Vec<NodeId>],
) -> anyhow::Result<RootedGraph> {
  let cycles = components
    .iter()
    .filter(|component| is_cycle(graph, component))
    .collect::<Vec<_>>();

  let mut cycle_by_member = HashMap::new();
  for (cycle_index, cycle) in cycles.iter().enumerate() {
    for member in cycle.iter() {
      cycle_by_member.insert(*member, cycle_index);
    }
  }

  let mut result = RootedGraph::new();
  let mut cycle_node_ids: Vec<Option<NodeId>> = vec![None; cycles.len()];
  let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();

  for node_id in graph.node_ids() {
    let new_node_id = match cycle_by_member.get(&node_id) {
      Some(cycle_index) => match cycle_node_ids[*cycle_index] {
        Some(new_node_id) => new_node_id,
        None => {
          let new_node_id = add_cycle_node(&mut result, graph, cycles[*cycle_index])?;
          cycle_node_ids[*cycle_index] = Some(new_node_id);
          new_node_id
        }
      },
      None => {
        let content_key = content_key(graph, node_id)?;
        let node = graph.expect_node(node_id)?.clone();
        result.add_node_by_content_key(content_key, node)
      }
    };

    mapping.insert(node_id, new_node_id);
  }

  for (from, to, edge_type) in graph.edges() {
    let (Some(new_from), Some(new_to)) = (mapping.get(&from), mapping.get(&to)) else {
      continue;
    };

    if cycle_by_member.contains_key(&from) && new_from == new_to {
      continue;
    }

    add_merged_edge(
      &mut result,
      *new_from,
      *new_to,
      edge_type,
      graph.get_edge_weight(from, to, edge_type),
    )?;
  }

  debug!(
    cycles = cycles.len(),
    nodes = result.node_count(),
    edges = result.edge_count(),
    "dominator bundler: collapsed cycles"
  );

  Ok(result)
}

fn add_cycle_node(
  result: &mut RootedGraph,
  graph: &RootedGraph,
  members: &[NodeId],
) -> anyhow::Result<NodeId> {
  let mut member_keys = Vec::with_capacity(members.len());
  let mut values = Vec::with_capacity(members.len());

  for member in members {
    member_keys.push(content_key(graph, *member)?);
    match graph.expect_node(*member)? {
      BundlerNode::Asset(asset) => values.push(asset.clone()),
      BundlerNode::StronglyConnectedComponent {
        values: nested, ..
      } => values.extend(nested.iter().cloned()),
      other => anyhow::bail!("cannot collapse {other:?} into a strongly connected component"),
    }
  }

  let content_key = format!("scc:{}", hash_string(member_keys.join(",")));
  Ok(result.add_node_by_content_key(
    content_key,
    BundlerNode::StronglyConnectedComponent {
      node_ids: members.to_vec(),
      values,
    },
  ))
}

fn content_key(graph: &RootedGraph, node_id: NodeId) -> anyhow::Result<String> {
  graph
    .get_content_key(node_id)
    .map(String::from)
    .with_context(|| format!("node {node_id} has no content key"))
}
