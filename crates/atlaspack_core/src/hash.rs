use xxhash_rust::xxh3::xxh3_64;
use xxhash_rust::xxh3::Xxh3;

/// Hasher used for identifiers such as asset, dependency and bundle ids.
///
/// The hashes don't need to be incredibly fast, but they should be stable across
/// runs, machines, platforms and versions, because they end up in output file names.
pub type IdentifierHasher = Xxh3;

pub fn hash_string(s: String) -> String {
  hash_bytes(s.as_bytes())
}

pub fn hash_bytes(s: &[u8]) -> String {
  let res = xxh3_64(s);
  format!("{:016x}", res)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hash_string_is_fixed_width_hex() {
    let hash = hash_string(String::from("bundle:entry:src/index.js"));

    assert_eq!(hash.len(), 16);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(hash, hash_bytes(b"bundle:entry:src/index.js"));
    assert_ne!(hash, hash_string(String::from("bundle:entry:src/other.js")));
  }
}
