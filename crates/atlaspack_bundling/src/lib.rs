use atlaspack_core::asset_graph::AssetGraph;
use atlaspack_core::types::AssetId;
use atlaspack_core::types::Target;

pub mod dominator_bundler;
pub mod options;

pub use self::dominator_bundler::bundle_assignment::AssignedBundle;
pub use self::dominator_bundler::bundle_assignment::BundleAssignment;
pub use self::dominator_bundler::bundle_assignment::BundleKind;
pub use self::dominator_bundler::DominatorBundler;
pub use self::options::DominatorBundlerOptions;

/// Input to a single bundling run
#[derive(Clone, Copy, Debug)]
pub struct BundleParams<'a> {
  pub asset_graph: &'a AssetGraph,

  /// Entry asset ids. Their order decides the order of the resulting bundles.
  pub entries: &'a [AssetId],

  /// Where the bundles are written to
  pub target: &'a Target,
}

/// Bundler algorithms take an asset graph and assign every reachable asset to a bundle.
///
/// Implementations must not keep state between calls, so separate targets can be bundled
/// concurrently.
pub trait Bundler {
  fn bundle(&self, params: BundleParams<'_>) -> anyhow::Result<BundleAssignment>;
}
