//! Stable cache identifiers.
//!
//! The engine caches every package on disk under a key that must be
//! reproducible across builds: the same inputs always derive the same id.
//! Identifiers double as path segments, so hash-derived ids are truncated
//! to a fixed budget.

/// Longest cache id the engine accepts; ids become directory names.
pub const MAX_CACHE_ID_LENGTH: usize = 64;

/// Thumbprint prefix mixed into remote cache ids.
pub const REMOTE_THUMBPRINT_LENGTH: usize = 20;

/// How a package is identified for caching.
#[derive(Debug, Clone, Copy)]
pub enum CacheIdentity<'a> {
    /// Identified by an intrinsic GUID plus version (bundle code, MSI
    /// ProductCode with ProductVersion).
    GuidVersion {
        /// Identifying GUID.
        guid: &'a str,
        /// Package version.
        version: &'a str,
    },
    /// Identified by a unique code alone (MSP patch code).
    Code(&'a str),
    /// No intrinsic identity; fall back to the payload content hash.
    Hash(&'a str),
}

/// Derives the default cache id for a package.
///
/// Pure and deterministic: the same identity always produces the same id,
/// and hash-derived ids never exceed [`MAX_CACHE_ID_LENGTH`].
pub fn cache_id(identity: CacheIdentity<'_>) -> String {
    match identity {
        CacheIdentity::GuidVersion { guid, version } => format!("{guid}v{version}"),
        CacheIdentity::Code(code) => code.to_string(),
        CacheIdentity::Hash(hash) => truncate(hash, MAX_CACHE_ID_LENGTH),
    }
}

/// Derives the cache id used for remote (downloaded) payloads.
///
/// When a certificate thumbprint is present its first
/// [`REMOTE_THUMBPRINT_LENGTH`] characters are appended, and the default id
/// is truncated so the combined result still fits the
/// [`MAX_CACHE_ID_LENGTH`] budget.
pub fn remote_cache_id(identity: CacheIdentity<'_>, thumbprint: Option<&str>) -> String {
    let default_id = cache_id(identity);
    match thumbprint {
        Some(thumbprint) if !thumbprint.is_empty() => {
            let prefix = truncate(thumbprint, REMOTE_THUMBPRINT_LENGTH);
            let budget = MAX_CACHE_ID_LENGTH - prefix.len();
            format!("{}{prefix}", truncate(&default_id, budget))
        }
        _ => default_id,
    }
}

fn truncate(value: &str, max: usize) -> String {
    // Identifiers are ASCII (GUIDs, hex hashes), but guard the boundary
    // anyway so a multi-byte character cannot split.
    let mut end = max.min(value.len());
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUID: &str = "{11111111-2222-3333-4444-555555555555}";

    #[test]
    fn guid_version_identity_is_stable() {
        let identity = CacheIdentity::GuidVersion {
            guid: GUID,
            version: "1.2.3.4",
        };
        assert_eq!(format!("{GUID}v1.2.3.4"), cache_id(identity));
        assert_eq!(cache_id(identity), cache_id(identity));
    }

    #[test]
    fn patch_code_identity_passes_through() {
        assert_eq!(GUID, cache_id(CacheIdentity::Code(GUID)));
    }

    #[test]
    fn hash_identity_is_truncated_to_budget() {
        let hash = "ab".repeat(64);
        let id = cache_id(CacheIdentity::Hash(&hash));
        assert_eq!(MAX_CACHE_ID_LENGTH, id.len());
        assert!(hash.starts_with(&id));
    }

    #[test]
    fn remote_id_never_exceeds_budget() {
        let hash = "cd".repeat(64);
        let thumbprint = "0123456789abcdef0123456789abcdef";
        let id = remote_cache_id(CacheIdentity::Hash(&hash), Some(thumbprint));
        assert_eq!(MAX_CACHE_ID_LENGTH, id.len());
        assert!(id.ends_with(&thumbprint[..REMOTE_THUMBPRINT_LENGTH]));
    }

    #[test]
    fn remote_id_without_thumbprint_matches_default() {
        let identity = CacheIdentity::GuidVersion {
            guid: GUID,
            version: "2.0",
        };
        assert_eq!(cache_id(identity), remote_cache_id(identity, None));
    }
}
