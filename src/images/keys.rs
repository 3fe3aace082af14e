//! Canonical cache-key derivation for image resource families.
//!
//! Many URL variants of one logical image differ only in a size suffix:
//! photos carry `-<width>px.jpg` (`/photos/9-8028-e1d2bda28e-800px.jpg`),
//! avatars carry `-<density>x.jpg` (`/avatars/sam-2x.jpg`). Stripping the
//! suffix collapses every variant to one canonical storage key, so the cache
//! holds a single copy per image. Pure string transforms, no I/O.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static PHOTO_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\d+px\.jpg$").expect("photo suffix pattern"));
static AVATAR_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\dx\.jpg$").expect("avatar suffix pattern"));

/// Resource family a request belongs to, deciding its freshness strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
  /// Content photo, served cache-or-fetch.
  Photo,
  /// Avatar, served stale-while-revalidate.
  Avatar,
}

/// Classify a request URL and derive its canonical storage key.
///
/// The key is the origin-relative path with the variant suffix removed.
/// Returns `None` for paths outside both families; those fall through to
/// the default cache-or-network handling.
pub fn derive_key(url: &str) -> Option<(Family, String)> {
  let path = request_path(url);

  if PHOTO_SUFFIX.is_match(&path) {
    let key = PHOTO_SUFFIX.replace(&path, "").into_owned();
    return Some((Family::Photo, key));
  }
  if AVATAR_SUFFIX.is_match(&path) {
    let key = AVATAR_SUFFIX.replace(&path, "").into_owned();
    return Some((Family::Avatar, key));
  }
  None
}

/// Origin-relative path of a request. Accepts absolute URLs and bare paths.
pub fn request_path(url: &str) -> String {
  match Url::parse(url) {
    Ok(parsed) => parsed.path().to_string(),
    // Not an absolute URL; treat it as a path already
    Err(_) => url.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_photo_variants_share_one_key() {
    let (family, key) =
      derive_key("http://localhost:8888/photos/9-8028-7527734776-e1d2bda28e-800px.jpg").unwrap();
    assert_eq!(family, Family::Photo);
    assert_eq!(key, "/photos/9-8028-7527734776-e1d2bda28e");

    let (_, other) =
      derive_key("http://localhost:8888/photos/9-8028-7527734776-e1d2bda28e-400px.jpg").unwrap();
    assert_eq!(other, key);
  }

  #[test]
  fn test_avatar_density_suffix_is_stripped() {
    let (family, key) = derive_key("http://localhost:8888/avatars/sam-2x.jpg").unwrap();
    assert_eq!(family, Family::Avatar);
    assert_eq!(key, "/avatars/sam");
  }

  #[test]
  fn test_families_are_disjoint() {
    // A px suffix must never classify as an avatar density suffix
    let (family, _) = derive_key("/photos/x-8px.jpg").unwrap();
    assert_eq!(family, Family::Photo);
  }

  #[test]
  fn test_unmatched_paths_are_out_of_scope() {
    assert!(derive_key("http://localhost:8888/css/main.css").is_none());
    assert!(derive_key("http://localhost:8888/photos/unsized.jpg").is_none());
    assert!(derive_key("http://localhost:8888/avatars/sam-2x.png").is_none());
  }

  #[test]
  fn test_bare_paths_are_accepted() {
    let (_, key) = derive_key("/photos/a-1-640px.jpg").unwrap();
    assert_eq!(key, "/photos/a-1");
  }
}
