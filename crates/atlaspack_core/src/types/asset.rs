use std::hash::Hash;
use std::hash::Hasher;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::hash::IdentifierHasher;

use super::environment::Environment;
use super::file_type::FileType;

pub type AssetId = String;

#[derive(Debug)]
pub struct CreateAssetIdParams<'a> {
  pub environment: &'a Environment,
  /// All paths should be normalized to a project relative string to generate a consistent hash.
  pub file_path: &'a Path,
  pub file_type: &'a FileType,
  pub unique_key: Option<&'a str>,
}

pub fn create_asset_id(params: CreateAssetIdParams) -> AssetId {
  let mut hasher = IdentifierHasher::new();

  params.environment.hash(&mut hasher);
  params.file_path.hash(&mut hasher);
  params.file_type.hash(&mut hasher);
  params.unique_key.hash(&mut hasher);

  format!("{:016x}", hasher.finish())
}

/// An asset is a file or part of a file that may represent any data type including source code,
/// binary data, etc.
#[derive(Default, PartialEq, Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
  /// The main identity hash for the asset. It is consistent for the entire
  /// build and between builds.
  pub id: AssetId,

  /// The environment of the asset
  pub env: Arc<Environment>,

  /// The file path to the asset
  pub file_path: PathBuf,

  /// The file type of the asset, which may change during transformation
  #[serde(rename = "type")]
  pub file_type: FileType,
}

impl Asset {
  /// Creates a source asset whose id and type are derived from its path
  pub fn new(file_path: impl Into<PathBuf>, env: Arc<Environment>) -> Self {
    let file_path = file_path.into();
    let file_type = file_path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(FileType::from_extension)
      .unwrap_or_default();

    let id = create_asset_id(CreateAssetIdParams {
      environment: &env,
      file_path: &file_path,
      file_type: &file_type,
      unique_key: None,
    });

    Asset {
      id,
      env,
      file_path,
      file_type,
    }
  }

  /// The path used to identify this asset in debug output and bundle names
  pub fn display_name(&self) -> String {
    self.file_path.display().to_string()
  }
}
