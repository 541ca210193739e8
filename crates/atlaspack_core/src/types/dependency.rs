use std::hash::Hash;
use std::hash::Hasher;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_repr::Deserialize_repr;
use serde_repr::Serialize_repr;

use crate::hash::IdentifierHasher;
use crate::types::AssetId;

use super::environment::Environment;
use super::target::Target;

pub fn create_dependency_id(
  source_asset_id: Option<&AssetId>,
  specifier: &str,
  environment: &Environment,
  target: Option<&Target>,
  specifier_type: &SpecifierType,
  priority: &Priority,
) -> String {
  let mut hasher = IdentifierHasher::new();

  source_asset_id.hash(&mut hasher);
  specifier.hash(&mut hasher);
  environment.hash(&mut hasher);
  target.hash(&mut hasher);
  specifier_type.hash(&mut hasher);
  priority.hash(&mut hasher);

  let hash = hasher.finish();
  format!("{:016x}", hash)
}

/// A dependency denotes a connection between two assets
#[derive(Hash, PartialEq, Eq, Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
  /// The environment of the dependency
  pub env: Arc<Environment>,

  /// Determines when the dependency should be loaded
  pub priority: Priority,

  /// The id of the asset with this dependency
  pub source_asset_id: Option<AssetId>,

  /// The file path of the asset with this dependency
  pub source_path: Option<PathBuf>,

  /// The import or export specifier that connects two assets together
  pub specifier: String,

  /// How the specifier should be interpreted
  pub specifier_type: SpecifierType,

  /// The target associated with an entry, if any
  #[serde(default)]
  pub target: Option<Box<Target>>,

  /// Whether the dependency is an entry
  pub is_entry: bool,

  /// Whether the resolved asset must be emitted under a stable name
  pub needs_stable_name: bool,
}

impl Dependency {
  pub fn new(specifier: impl Into<String>, env: Arc<Environment>) -> Self {
    Dependency {
      env,
      specifier: specifier.into(),
      ..Dependency::default()
    }
  }

  /// An entry dependency of a target, resolved from the project root
  pub fn entry(entry: impl Into<String>, target: Target) -> Self {
    Dependency {
      env: target.env.clone(),
      is_entry: true,
      needs_stable_name: true,
      specifier: entry.into(),
      specifier_type: SpecifierType::Url,
      target: Some(Box::new(target)),
      ..Dependency::default()
    }
  }

  /// A dependency declared by `source_asset_id`
  pub fn from_asset(
    source_asset_id: impl Into<AssetId>,
    source_path: impl Into<PathBuf>,
    specifier: impl Into<String>,
    priority: Priority,
    env: Arc<Environment>,
  ) -> Self {
    Dependency {
      env,
      priority,
      source_asset_id: Some(source_asset_id.into()),
      source_path: Some(source_path.into()),
      specifier: specifier.into(),
      ..Dependency::default()
    }
  }

  pub fn id(&self) -> String {
    create_dependency_id(
      self.source_asset_id.as_ref(),
      &self.specifier,
      &self.env,
      self.target.as_deref(),
      &self.specifier_type,
      &self.priority,
    )
  }

  /// Whether the resolved asset is loaded by the page only when the import runs
  pub fn is_lazy(&self) -> bool {
    self.priority != Priority::Sync
  }
}

/// Determines when a dependency should load
#[derive(Clone, Copy, Debug, Default, Deserialize_repr, Eq, Hash, PartialEq, Serialize_repr)]
#[repr(u32)]
pub enum Priority {
  /// Resolves the dependency synchronously, placing the resolved asset in the same bundle as the
  /// parent or another bundle that is already on the page
  #[default]
  Sync = 0,
  /// Places the dependency in a separate bundle loaded in parallel with the current bundle
  Parallel = 1,
  /// The dependency should be placed in a separate bundle that is loaded later
  Lazy = 2,
  /// The dependency should be placed in a separate bundle that is loaded conditionally
  Conditional = 3,
}

/// The type of the import specifier
#[derive(Clone, Copy, Debug, Default, Deserialize_repr, Eq, Hash, PartialEq, Serialize_repr)]
#[repr(u8)]
pub enum SpecifierType {
  /// An ES Module specifier
  #[default]
  Esm = 0,

  /// A CommonJS specifier
  CommonJS = 1,

  /// A URL that works as in a browser
  ///
  /// Bare specifiers are treated as relative URLs.
  Url = 2,

  /// A custom specifier that must be handled by a custom resolver plugin
  Custom = 3,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_priority_serializes_as_number() {
    assert_eq!(serde_json::to_string(&Priority::Lazy).unwrap(), "2");
    assert_eq!(
      serde_json::from_str::<Priority>("3").unwrap(),
      Priority::Conditional
    );
  }

  #[test]
  fn test_dependency_id_depends_on_priority() {
    let env = Arc::new(Environment::default());
    let sync = Dependency::from_asset("a", "src/a.js", "./b", Priority::Sync, env.clone());
    let lazy = Dependency::from_asset("a", "src/a.js", "./b", Priority::Lazy, env);

    assert_eq!(sync.id(), sync.clone().id());
    assert_ne!(sync.id(), lazy.id());
    assert!(lazy.is_lazy());
    assert!(!sync.is_lazy());
  }
}
