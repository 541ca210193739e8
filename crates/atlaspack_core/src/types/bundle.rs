use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use super::environment::Environment;
use super::file_type::FileType;
use super::target::Target;

/// A bundle groups assets that are packaged into one output file
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
  pub id: String,

  /// The type of the output file
  #[serde(rename = "type")]
  pub bundle_type: FileType,

  pub env: Arc<Environment>,

  pub target: Target,
}
