use std::hash::Hash;

use atlaspack_core::content_graph::ContentGraph;
use atlaspack_core::content_graph::ContentGraphError;
use atlaspack_core::content_graph::NodeId;
use tracing::debug;
use tracing::instrument;

use super::types::add_merged_edge;
use super::types::DependencyEdge;
use super::types::DominatorTree;
use super::types::DominatorTreeEdgeType;
use super::types::RootedGraph;

/// Immediate dominators of every node reachable from a root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dominators {
  root: NodeId,
  idom: Vec<Option<NodeId>>,
  rpo_rank: Vec<Option<usize>>,
  reverse_post_order: Vec<NodeId>,
}

impl Dominators {
  pub fn root(&self) -> NodeId {
    self.root
  }

  /// The closest strict dominator of `node_id`. The root is its own immediate dominator.
  ///
  /// Returns `None` for nodes that are not reachable from the root.
  pub fn immediate_dominator(&self, node_id: NodeId) -> Option<NodeId> {
    self.idom.get(node_id).copied().flatten()
  }

  /// The dominator chain of `node_id`, starting with the node itself and ending at the root
  pub fn dominators(&self, node_id: NodeId) -> Option<Vec<NodeId>> {
    let mut current = self.immediate_dominator(node_id).map(|_| node_id)?;
    let mut chain = vec![current];

    while current != self.root {
      current = self.immediate_dominator(current)?;
      chain.push(current);
    }

    Some(chain)
  }

  /// Whether every path from the root to `node_id` passes through `dominator`
  pub fn dominates(&self, dominator: NodeId, node_id: NodeId) -> bool {
    self
      .dominators(node_id)
      .is_some_and(|chain| chain.contains(&dominator))
  }

  pub fn reverse_post_order(&self) -> &[NodeId] {
    &self.reverse_post_order
  }

  fn rank(&self, node_id: NodeId) -> usize {
    self.rpo_rank[node_id].unwrap_or(usize::MAX)
  }

  fn intersect(&self, mut a: NodeId, mut b: NodeId) -> NodeId {
    while a != b {
      while self.rank(a) > self.rank(b) {
        match self.idom[a] {
          Some(next) => a = next,
          None => return self.root,
        }
      }
      while self.rank(b) > self.rank(a) {
        match self.idom[b] {
          Some(next) => b = next,
          None => return self.root,
        }
      }
    }
    a
  }
}

/// The iterative dominance algorithm from Cooper, Harvey and Kennedy, "A Simple, Fast Dominance
/// Algorithm".
///
/// Nodes are compared by their reverse post-order rank. Every edge type is followed.
pub fn simple_fast_dominance<N, E, W>(
  graph: &ContentGraph<N, E, W>,
  root: NodeId,
) -> Result<Dominators, ContentGraphError>
where
  E: Copy + Eq + Hash,
{
  let mut reverse_post_order = graph.post_order(root, None)?;
  reverse_post_order.reverse();

  let bound = graph.node_bound();
  let mut rpo_rank = vec![None; bound];
  for (rank, node_id) in reverse_post_order.iter().enumerate() {
    rpo_rank[*node_id] = Some(rank);
  }

  let mut dominators = Dominators {
    root,
    idom: vec![None; bound],
    rpo_rank,
    reverse_post_order,
  };
  dominators.idom[root] = Some(root);

  let predecessors = dominators
    .reverse_post_order
    .iter()
    .map(|node_id| {
      let mut predecessors = graph
        .get_node_ids_connected_to(*node_id)
        .into_iter()
        .filter(|predecessor| dominators.rpo_rank[*predecessor].is_some())
        .collect::<Vec<_>>();
      predecessors.sort_by_key(|predecessor| dominators.rpo_rank[*predecessor]);
      predecessors
    })
    .collect::<Vec<_>>();

  let mut changed = true;
  while changed {
    changed = false;

    for (rank, node_id) in dominators.reverse_post_order.iter().enumerate().skip(1) {
      let mut new_idom = None;
      for predecessor in &predecessors[rank] {
        if dominators.idom[*predecessor].is_none() {
          continue;
        }
        new_idom = Some(match new_idom {
          None => *predecessor,
          Some(current) => dominators.intersect(*predecessor, current),
        });
      }

      if new_idom.is_some() && dominators.idom[*node_id] != new_idom {
        dominators.idom[*node_id] = new_idom;
        changed = true;
      }
    }
  }

  Ok(dominators)
}

/// Re-materializes the dominators as a tree with one `Contains` edge per `(idom, node)` pair.
///
/// Node ids and content keys match `graph`. Where the immediate dominator also imports the node
/// directly, the tree edge carries the weights of those imports.
#[instrument(level = "debug", skip_all)]
pub fn build_dominator_tree(
  graph: &RootedGraph,
  dominators: &Dominators,
) -> anyhow::Result<DominatorTree> {
  let mut tree: DominatorTree = graph.clone_without_edges();
  let root = dominators.root();

  for node_id in graph.node_ids() {
    if node_id == root {
      continue;
    }

    let Some(idom) = dominators.immediate_dominator(node_id) else {
      tree.remove_node(node_id)?;
      continue;
    };

    let mut weight: Option<DependencyEdge> = None;
    for edge_type in graph.get_edge_types_between(idom, node_id) {
      if let Some(edge_weight) = graph.get_edge_weight(idom, node_id, *edge_type) {
        weight
          .get_or_insert_with(DependencyEdge::default)
          .merge(edge_weight);
      }
    }

    add_merged_edge(
      &mut tree,
      idom,
      node_id,
      DominatorTreeEdgeType::Contains,
      weight.as_ref(),
    )?;
  }

  debug!(
    nodes = tree.node_count(),
    edges = tree.edge_count(),
    "dominator bundler: built dominator tree"
  );

  Ok(tree)
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use petgraph::algo::dominators::simple_fast;
  use pretty_assertions::assert_eq;
  use rand::rngs::StdRng;
  use rand::Rng;
  use rand::SeedableRng;

  use super::super::debug::dominator_tree_to_dot;
  use super::super::test_utils::rooted_graph_builder;
  use super::*;

  #[test]
  fn test_linear_chain() {
    let mut builder = rooted_graph_builder();
    let a = builder.entry_asset("a.js");
    let b = builder.asset("b.js");
    let c = builder.asset("c.js");
    let d = builder.asset("d.js");
    builder
      .sync_dependency(a, b)
      .sync_dependency(b, c)
      .sync_dependency(c, d);
    let root = builder.root();
    let graph = builder.build();

    let dominators = simple_fast_dominance(&graph, root).unwrap();

    assert_eq!(dominators.immediate_dominator(root), Some(root));
    assert_eq!(dominators.immediate_dominator(a), Some(root));
    assert_eq!(dominators.immediate_dominator(b), Some(a));
    assert_eq!(dominators.immediate_dominator(c), Some(b));
    assert_eq!(dominators.immediate_dominator(d), Some(c));
    assert_eq!(dominators.dominators(d), Some(vec![d, c, b, a, root]));
    assert_eq!(dominators.reverse_post_order(), &[root, a, b, c, d]);
  }

  #[test]
  fn test_diamond() {
    let mut builder = rooted_graph_builder();
    let a = builder.entry_asset("a.js");
    let b = builder.entry_asset("b.js");
    let c = builder.asset("c.js");
    let d = builder.asset("d.js");
    builder
      .sync_dependency(a, c)
      .sync_dependency(a, d)
      .sync_dependency(b, d)
      .sync_dependency(d, c);
    let root = builder.root();
    let graph = builder.build();

    let dominators = simple_fast_dominance(&graph, root).unwrap();

    assert_eq!(dominators.immediate_dominator(c), Some(root));
    assert_eq!(dominators.immediate_dominator(d), Some(root));
    assert!(!dominators.dominates(a, d));
    assert!(dominators.dominates(root, c));

    let tree = build_dominator_tree(&graph, &dominators).unwrap();
    let expected_dot = r#"
digraph {
    0 [ label = "root" ]
    1 [ label = "a.js" ]
    2 [ label = "b.js" ]
    3 [ label = "c.js" ]
    4 [ label = "d.js" ]
    0 -> 1 [ label = "" ]
    0 -> 2 [ label = "" ]
    0 -> 3 [ label = "" ]
    0 -> 4 [ label = "" ]
}
    "#;
    assert_eq!(dominator_tree_to_dot(&tree).trim(), expected_dot.trim());
  }

  #[test]
  fn test_async_edges_take_part_in_dominance() {
    let mut builder = rooted_graph_builder();
    let index = builder.entry_asset("index.js");
    let page = builder.asset("page.js");
    let button = builder.asset("button.js");
    builder
      .async_dependency(index, page)
      .sync_dependency(page, button);
    let root = builder.root();
    let graph = builder.build();

    let dominators = simple_fast_dominance(&graph, root).unwrap();
    let tree = build_dominator_tree(&graph, &dominators).unwrap();

    assert_eq!(dominators.immediate_dominator(page), Some(root));
    assert_eq!(dominators.immediate_dominator(button), Some(page));
    assert_eq!(
      tree
        .get_edge_weight(page, button, DominatorTreeEdgeType::Contains)
        .map(|weight| weight.import_count()),
      Some(1)
    );
    assert_eq!(
      tree.get_edge_weight(root, page, DominatorTreeEdgeType::Contains),
      None
    );
    assert_eq!(tree.get_node_ids_connected_from(root), vec![index, page]);
  }

  #[test]
  fn test_unreachable_nodes_are_left_out_of_the_tree() {
    let mut builder = rooted_graph_builder();
    let a = builder.entry_asset("a.js");
    let orphan = builder.asset("orphan.js");
    builder.sync_dependency(orphan, a);
    let root = builder.root();
    let graph = builder.build();

    let dominators = simple_fast_dominance(&graph, root).unwrap();
    let tree = build_dominator_tree(&graph, &dominators).unwrap();

    assert_eq!(dominators.immediate_dominator(orphan), None);
    assert_eq!(dominators.dominators(orphan), None);
    assert!(!tree.has_node(orphan));
    assert_eq!(dominators.immediate_dominator(a), Some(root));
  }

  #[test]
  fn test_matches_petgraph_on_random_graphs() {
    let mut rng = StdRng::seed_from_u64(0xd0d0);

    for _ in 0..100 {
      let node_count = rng.gen_range(1..40);
      let mut builder = rooted_graph_builder();
      let root = builder.root();
      let nodes = (0..node_count)
        .map(|i| builder.asset(&format!("{i}.js")))
        .collect::<Vec<_>>();

      let mut reference = petgraph::graph::DiGraph::<NodeId, ()>::new();
      let mut indexes = HashMap::new();
      indexes.insert(root, reference.add_node(root));
      for node_id in &nodes {
        indexes.insert(*node_id, reference.add_node(*node_id));
      }

      let mut add_edge = |builder: &mut super::super::test_utils::RootedGraphBuilder, from, to| {
        builder.sync_dependency(from, to);
        reference.update_edge(indexes[&from], indexes[&to], ());
      };

      add_edge(&mut builder, root, nodes[0]);
      for _ in 0..rng.gen_range(0..node_count * 3) {
        let from = nodes[rng.gen_range(0..node_count)];
        let to = nodes[rng.gen_range(0..node_count)];
        add_edge(&mut builder, from, to);
      }
      if node_count > 1 {
        add_edge(&mut builder, root, nodes[rng.gen_range(1..node_count)]);
      }

      let graph = builder.build();
      let dominators = simple_fast_dominance(&graph, root).unwrap();
      let expected = simple_fast(&reference, indexes[&root]);

      for node_id in std::iter::once(root).chain(nodes.iter().copied()) {
        let expected_idom = if node_id == root {
          Some(root)
        } else {
          expected
            .immediate_dominator(indexes[&node_id])
            .map(|index| reference[index])
        };
        assert_eq!(
          dominators.immediate_dominator(node_id),
          expected_idom,
          "immediate dominator of {node_id}"
        );
      }
    }
  }
}
