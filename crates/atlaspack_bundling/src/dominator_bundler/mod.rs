//! Code splitting based on the dominator tree of the asset graph.
//!
//! The pipeline runs in stages, each producing a new graph from the previous one:
//!
//! 1. [`rooted_graph`] projects the asset graph onto the assets reachable from the entries,
//!    hung off a synthetic root.
//! 2. [`cycle_breaker`] collapses import cycles into single nodes.
//! 3. [`dominance`] computes immediate dominators and the dominator tree.
//! 4. [`entry_dependencies`] and [`packages`] move subtrees shared by several entry points
//!    into packages.
//! 5. [`merge_packages`] folds packages that are not shared widely enough back into a bundle.
//! 6. [`bundle_assignment`] turns the root children of the final tree into bundles.
//!
//! Every stage can be rendered with the [`debug`] exports.

pub mod bundle_assignment;
pub mod cycle_breaker;
pub mod debug;
pub mod dominance;
pub mod entry_dependencies;
pub mod merge_packages;
pub mod packages;
pub mod rooted_graph;
pub mod types;

#[cfg(test)]
mod test_utils;

use anyhow::Context;
use tracing::info;

use crate::options::DominatorBundlerOptions;
use crate::BundleParams;
use crate::Bundler;

use self::bundle_assignment::build_bundle_assignment;
use self::bundle_assignment::BundleAssignment;
use self::bundle_assignment::DominatorBundlerStats;
use self::cycle_breaker::convert_to_acyclic_graph;
use self::cycle_breaker::find_strongly_connected_components;
use self::cycle_breaker::is_cycle;
use self::dominance::build_dominator_tree;
use self::dominance::simple_fast_dominance;
use self::entry_dependencies::build_entry_dependencies;
use self::merge_packages::build_package_graph;
use self::merge_packages::run_merge_packages;
use self::packages::build_packages;
use self::rooted_graph::build_rooted_graph;
use self::types::root_node_id;
use self::types::DominatorTree;
use self::types::DominatorTreeEdgeType;
use self::types::PackageGraph;
use self::types::RootedGraph;

/// Every intermediate graph of one bundler run, for debugging and tests
#[derive(Debug)]
pub struct DominatorBundlerStages {
  pub rooted: RootedGraph,
  pub acyclic: RootedGraph,
  pub dominator_tree: DominatorTree,
  pub package_graph: PackageGraph,
  pub assignment: BundleAssignment,
}

#[derive(Debug, Default)]
pub struct DominatorBundler {
  pub options: DominatorBundlerOptions,
}

impl DominatorBundler {
  pub fn new(options: DominatorBundlerOptions) -> Self {
    Self { options }
  }

  /// Runs the whole pipeline and keeps every intermediate graph
  pub fn build_stages(&self, params: BundleParams<'_>) -> anyhow::Result<DominatorBundlerStages> {
    let rooted = build_rooted_graph(params.asset_graph, params.entries, &self.options)
      .context("building rooted graph")?;
    let root = root_node_id(&rooted)?;

    let mut stats = DominatorBundlerStats {
      assets: rooted
        .nodes()
        .map(|(_, node)| node.assets().len())
        .sum(),
      dependencies: rooted
        .edges()
        .filter_map(|(from, to, edge_type)| rooted.get_edge_weight(from, to, edge_type))
        .map(|weight| weight.import_count())
        .sum(),
      ..DominatorBundlerStats::default()
    };

    let (acyclic, tree) = if rooted.node_count() <= 2 {
      // Nothing to split, every child of the root is its own bundle
      let acyclic = rooted.clone();
      let mut tree: DominatorTree = acyclic.clone_without_edges();
      for child in acyclic.get_node_ids_connected_from(root) {
        tree.add_edge(root, child, DominatorTreeEdgeType::Contains)?;
      }
      (acyclic, tree)
    } else {
      let components = find_strongly_connected_components(&rooted);
      stats.strongly_connected_components = components
        .iter()
        .filter(|component| is_cycle(&rooted, component))
        .count();

      let acyclic =
        convert_to_acyclic_graph(&rooted, &components).context("collapsing import cycles")?;
      let acyclic_root = root_node_id(&acyclic)?;
      let dominators =
        simple_fast_dominance(&acyclic, acyclic_root).context("computing dominators")?;
      let tree = build_dominator_tree(&acyclic, &dominators).context("building dominator tree")?;
      (acyclic, tree)
    };

    let acyclic_root = root_node_id(&acyclic)?;
    let entry_dependencies = build_entry_dependencies(&acyclic, acyclic_root);
    let packaged =
      build_packages(&acyclic, &tree, &entry_dependencies).context("creating packages")?;
    stats.packages_created = packaged.packages.len();

    let package_graph =
      build_package_graph(&acyclic, &packaged.tree).context("building package graph")?;

    let (dominator_tree, package_graph) = if self.options.merge_packages {
      let merged = run_merge_packages(
        packaged.tree,
        package_graph,
        packaged.packages,
        &self.options,
      )
      .context("merging packages")?;
      stats.packages_merged = merged.merged;
      (merged.tree, merged.package_graph)
    } else {
      (packaged.tree, package_graph)
    };

    let assignment = build_bundle_assignment(
      &acyclic,
      &dominator_tree,
      params.entries,
      params.target,
      stats,
    )
    .context("assigning assets to bundles")?;

    info!(
      assets = assignment.stats.assets,
      dependencies = assignment.stats.dependencies,
      cycles = assignment.stats.strongly_connected_components,
      packages_created = assignment.stats.packages_created,
      packages_merged = assignment.stats.packages_merged,
      bundles = assignment.stats.bundles,
      "dominator bundler: done"
    );

    Ok(DominatorBundlerStages {
      rooted,
      acyclic,
      dominator_tree,
      package_graph,
      assignment,
    })
  }
}

impl Bundler for DominatorBundler {
  fn bundle(&self, params: BundleParams<'_>) -> anyhow::Result<BundleAssignment> {
    Ok(self.build_stages(params)?.assignment)
  }
}

#[cfg(test)]
mod tests {
  use atlaspack_core::types::Priority;
  use pretty_assertions::assert_eq;

  use super::bundle_assignment::BundleKind;
  use super::debug::dominator_tree_to_dot;
  use super::debug::package_graph_to_dot;
  use super::test_utils::AssetGraphFixture;
  use super::*;

  fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
  }

  fn bundle_keys(assignment: &BundleAssignment) -> Vec<(String, BundleKind)> {
    assignment
      .bundles
      .iter()
      .map(|bundle| (bundle.key.clone(), bundle.kind))
      .collect()
  }

  fn run(fixture: &AssetGraphFixture, options: DominatorBundlerOptions) -> DominatorBundlerStages {
    let entries = fixture.entries();
    DominatorBundler::new(options)
      .build_stages(BundleParams {
        asset_graph: &fixture.graph,
        entries: &entries,
        target: &fixture.target,
      })
      .unwrap()
  }

  fn multi_entry_fixture() -> AssetGraphFixture {
    let mut fixture = AssetGraphFixture::new();
    let entry1 = fixture.entry("entry1.js");
    let entry2 = fixture.entry("entry2.js");
    let react = fixture.asset("react.js");
    let left_pad = fixture.asset("left-pad.js");
    let string_concat = fixture.asset("string-concat.js");
    fixture.dependency(entry1, react, Priority::Sync);
    fixture.dependency(entry2, react, Priority::Sync);
    fixture.dependency(react, left_pad, Priority::Sync);
    fixture.dependency(left_pad, string_concat, Priority::Sync);
    fixture
  }

  #[test]
  fn test_multi_entry_sharing() {
    init_tracing();
    let fixture = multi_entry_fixture();

    let stages = run(&fixture, DominatorBundlerOptions::default());

    let expected_tree = r#"
digraph {
    0 [ label = "root" ]
    1 [ label = "entry1.js" ]
    2 [ label = "entry2.js" ]
    3 [ label = "react.js" ]
    4 [ label = "left-pad.js" ]
    5 [ label = "string-concat.js" ]
    6 [ label = "package:entry1.js,entry2.js" ]
    0 -> 1 [ label = "" ]
    0 -> 2 [ label = "" ]
    0 -> 6 [ label = "" ]
    3 -> 4 [ label = "" ]
    4 -> 5 [ label = "" ]
    6 -> 3 [ label = "" ]
}
    "#;
    assert_eq!(
      dominator_tree_to_dot(&stages.dominator_tree).trim(),
      expected_tree.trim()
    );

    let expected_package_graph = r#"
digraph {
    0 [ label = "entry1.js" ]
    1 [ label = "entry2.js" ]
    2 [ label = "package:entry1.js,entry2.js" ]
    0 -> 2 [ label = "sync" ]
    1 -> 2 [ label = "sync" ]
}
    "#;
    assert_eq!(
      package_graph_to_dot(&stages.package_graph).trim(),
      expected_package_graph.trim()
    );

    assert_eq!(
      bundle_keys(&stages.assignment),
      vec![
        (String::from("entry:entry1.js"), BundleKind::Entry),
        (String::from("entry:entry2.js"), BundleKind::Entry),
        (String::from("package:entry1.js,entry2.js"), BundleKind::Shared),
      ]
    );
    assert_eq!(
      stages.assignment.stats,
      DominatorBundlerStats {
        assets: 5,
        dependencies: 4,
        strongly_connected_components: 0,
        packages_created: 1,
        packages_merged: 0,
        bundles: 3,
      }
    );
  }

  #[test]
  fn test_output_is_deterministic() {
    let fixture = multi_entry_fixture();

    let first = run(&fixture, DominatorBundlerOptions::default());
    let second = run(&fixture, DominatorBundlerOptions::default());

    assert_eq!(first.assignment, second.assignment);
    assert_eq!(
      serde_json::to_string(&first.assignment).unwrap(),
      serde_json::to_string(&second.assignment).unwrap()
    );
    assert_eq!(
      dominator_tree_to_dot(&first.dominator_tree),
      dominator_tree_to_dot(&second.dominator_tree)
    );
  }

  #[test]
  fn test_merging_can_be_disabled() {
    let fixture = multi_entry_fixture();

    let stages = run(
      &fixture,
      DominatorBundlerOptions {
        min_shared_bundles: 3,
        merge_packages: false,
        ..DominatorBundlerOptions::default()
      },
    );

    assert_eq!(stages.assignment.bundles.len(), 3);
    assert_eq!(stages.assignment.stats.packages_merged, 0);
  }

  #[test]
  fn test_package_below_threshold_is_merged() {
    let fixture = multi_entry_fixture();

    let stages = run(
      &fixture,
      DominatorBundlerOptions {
        min_shared_bundles: 3,
        ..DominatorBundlerOptions::default()
      },
    );

    assert_eq!(
      bundle_keys(&stages.assignment),
      vec![
        (String::from("entry:entry1.js"), BundleKind::Entry),
        (String::from("entry:entry2.js"), BundleKind::Entry),
      ]
    );
    let entry1 = stages.assignment.get_bundle_by_key("entry:entry1.js").unwrap();
    let entry2 = stages.assignment.get_bundle_by_key("entry:entry2.js").unwrap();
    assert_eq!(entry1.asset_ids.len(), 4);
    assert_eq!(stages.assignment.stats.packages_merged, 1);
    assert_eq!(
      stages.assignment.bundle_edges,
      vec![bundle_assignment::BundleEdge {
        from: entry2.id.clone(),
        to: entry1.id.clone(),
        edge_type: bundle_assignment::BundleEdgeType::Sync,
      }]
    );
  }

  #[test]
  fn test_empty_graph_yields_root_only_result() {
    let fixture = AssetGraphFixture::new();

    let stages = run(&fixture, DominatorBundlerOptions::default());

    assert_eq!(stages.rooted.node_count(), 1);
    assert_eq!(stages.dominator_tree.node_count(), 1);
    assert!(stages.assignment.bundles.is_empty());
    assert!(stages.assignment.asset_to_bundle.is_empty());
  }

  #[test]
  fn test_single_entry_skips_dominance() {
    let mut fixture = AssetGraphFixture::new();
    let index = fixture.entry("index.js");

    let stages = run(&fixture, DominatorBundlerOptions::default());

    assert_eq!(
      bundle_keys(&stages.assignment),
      vec![(String::from("entry:index.js"), BundleKind::Entry)]
    );
    assert_eq!(
      stages.assignment.bundles[0].asset_ids,
      vec![fixture.asset_id(index)]
    );
  }

  #[test]
  fn test_cycles_are_bundled_together() {
    let mut fixture = AssetGraphFixture::new();
    let index = fixture.entry("index.js");
    let a = fixture.asset("a.js");
    let b = fixture.asset("b.js");
    fixture.dependency(index, a, Priority::Sync);
    fixture.dependency(a, b, Priority::Sync);
    fixture.dependency(b, a, Priority::Sync);

    let stages = run(&fixture, DominatorBundlerOptions::default());

    let expected_tree = r#"
digraph {
    0 [ label = "root" ]
    1 [ label = "index.js" ]
    2 [ label = "scc(a.js, b.js)" ]
    0 -> 1 [ label = "" ]
    1 -> 2 [ label = "" ]
}
    "#;
    assert_eq!(
      dominator_tree_to_dot(&stages.dominator_tree).trim(),
      expected_tree.trim()
    );
    assert_eq!(stages.assignment.stats.strongly_connected_components, 1);
    assert_eq!(stages.assignment.bundles.len(), 1);
    assert_eq!(stages.assignment.bundles[0].asset_ids.len(), 3);
  }

  #[test]
  fn test_entries_importing_each_other_are_named_after_their_members() {
    let mut fixture = AssetGraphFixture::new();
    let a = fixture.entry("a.js");
    let b = fixture.entry("b.js");
    fixture.dependency(a, b, Priority::Sync);
    fixture.dependency(b, a, Priority::Sync);

    let stages = run(&fixture, DominatorBundlerOptions::default());

    assert_eq!(
      bundle_keys(&stages.assignment),
      vec![(String::from("entry:scc(a.js, b.js)"), BundleKind::Entry)]
    );

    let bundle = &stages.assignment.bundles[0];
    assert_eq!(bundle.entry_point_keys, vec![String::from("scc(a.js, b.js)")]);
    for asset in [a, b] {
      assert_eq!(
        stages
          .assignment
          .bundle_for_asset(&fixture.asset_id(asset))
          .map(|bundle| bundle.key.as_str()),
        Some("entry:scc(a.js, b.js)")
      );
    }
  }

  #[test]
  fn test_async_and_type_change_boundaries() {
    init_tracing();
    let mut fixture = AssetGraphFixture::new();
    let index = fixture.entry("index.js");
    let page = fixture.asset("page.js");
    let styles = fixture.asset("page.css");
    let utils = fixture.asset("utils.js");
    fixture.dependency(index, page, Priority::Lazy);
    fixture.dependency(page, styles, Priority::Sync);
    fixture.dependency(index, utils, Priority::Sync);
    fixture.dependency(page, utils, Priority::Sync);

    let stages = run(&fixture, DominatorBundlerOptions::default());

    assert_eq!(
      bundle_keys(&stages.assignment),
      vec![
        (String::from("entry:index.js"), BundleKind::Entry),
        (String::from("async:page.js"), BundleKind::Async),
        (String::from("type-change:page.css"), BundleKind::TypeChange),
        (String::from("package:index.js,page.js"), BundleKind::Shared),
      ]
    );

    let utils_bundle = stages
      .assignment
      .bundle_for_asset(&fixture.asset_id(utils))
      .unwrap();
    assert_eq!(utils_bundle.key, "package:index.js,page.js");
    assert_eq!(
      stages
        .assignment
        .bundle_for_asset(&fixture.asset_id(styles))
        .map(|bundle| bundle.bundle_type.clone()),
      Some(atlaspack_core::types::FileType::Css)
    );
  }

  #[test]
  fn test_unknown_entry_is_an_error() {
    let fixture = AssetGraphFixture::new();

    let error = DominatorBundler::default()
      .bundle(BundleParams {
        asset_graph: &fixture.graph,
        entries: &[String::from("missing")],
        target: &fixture.target,
      })
      .unwrap_err();

    assert_eq!(error.to_string(), "building rooted graph");
    assert!(format!("{error:#}").contains("resolving entry asset missing"));
  }
}
