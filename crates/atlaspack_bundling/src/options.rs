use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum FromEnvError {
  #[error("Invalid value for {0}: {1}")]
  InvalidKey(String, String),
}

/// Policy knobs for [`crate::DominatorBundler`]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DominatorBundlerOptions {
  /// A package referenced by fewer bundles than this is merged back into its first referencing
  /// bundle
  pub min_shared_bundles: usize,

  /// Whether to run the package merger at all
  pub merge_packages: bool,

  /// Whether a sync import into an asset of a different bundle type starts a new bundle
  pub split_on_type_change: bool,

  /// File name suffixes of runtime helper modules that are kept even when no entry imports them
  pub helper_modules: Vec<String>,
}

impl Default for DominatorBundlerOptions {
  fn default() -> Self {
    Self {
      min_shared_bundles: 2,
      merge_packages: true,
      split_on_type_change: true,
      helper_modules: vec![String::from("esmodule-helpers.js")],
    }
  }
}

impl DominatorBundlerOptions {
  /// Defaults with overrides from `ATLASPACK_BUNDLER_*` environment variables
  pub fn from_env() -> Result<Self, FromEnvError> {
    Self::default().with_overrides(|name| std::env::var(name).ok())
  }

  fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, FromEnvError> {
    const MIN_SHARED_BUNDLES: &str = "ATLASPACK_BUNDLER_MIN_SHARED_BUNDLES";
    const MERGE_PACKAGES: &str = "ATLASPACK_BUNDLER_MERGE_PACKAGES";

    if let Some(value) = var(MIN_SHARED_BUNDLES) {
      self.min_shared_bundles = value
        .trim()
        .parse()
        .map_err(|_| FromEnvError::InvalidKey(String::from(MIN_SHARED_BUNDLES), value))?;
    }

    if let Some(value) = var(MERGE_PACKAGES) {
      self.merge_packages = match value.trim() {
        "true" | "1" => true,
        "false" | "0" => false,
        _ => return Err(FromEnvError::InvalidKey(String::from(MERGE_PACKAGES), value)),
      };
    }

    Ok(self)
  }

  /// Whether an asset at `file_path` is one of the configured helper modules
  pub fn is_helper_module(&self, file_path: &std::path::Path) -> bool {
    self
      .helper_modules
      .iter()
      .any(|suffix| file_path.ends_with(suffix))
  }
}
