use super::TranslationMap;
use crate::errors::{RemapError, RemapResult};

/// Rewrite a collection location (`/1/42/`) for `target`.
///
/// Leading segments without a copy pass through unchanged, so a shared ancestor such as
/// the environments root stays in place. Once one segment has been remapped every later
/// segment must have a copy too; a gap after that point is a [`RemapError::PartialLocation`].
pub fn remap_location(
    location: &str,
    target: i32,
    collections: &TranslationMap,
) -> RemapResult<String> {
    let mut remapping = false;
    let mut parts = Vec::new();

    for segment in location.split('/').filter(|s| !s.is_empty()) {
        let source_id: i32 = segment.parse().map_err(|_| RemapError::MalformedLocation {
            location: location.to_string(),
            segment: segment.to_string(),
        })?;

        match collections.lookup(source_id, target) {
            Some(copied_id) => {
                remapping = true;
                parts.push(copied_id.to_string());
            }
            None if remapping => {
                return Err(RemapError::PartialLocation {
                    location: location.to_string(),
                    segment: segment.to_string(),
                    target,
                })
            }
            None => parts.push(segment.to_string()),
        }
    }

    if parts.is_empty() {
        return Ok("/".to_string());
    }
    Ok(format!("/{}/", parts.join("/")))
}

/// Number of ancestor segments in a location
pub fn depth(location: &str) -> usize {
    location.split('/').filter(|s| !s.is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::EntityKind;

    const T: i32 = 7;

    fn map(entries: &[(i32, i32)]) -> TranslationMap {
        let mut map = TranslationMap::new(EntityKind::Collection);
        for (source, copied) in entries {
            map.insert(*source, T, *copied);
        }
        map
    }

    #[test]
    fn test_full_remap() {
        let collections = map(&[(1, 10), (2, 20), (3, 30)]);
        assert_eq!(remap_location("/1/2/3/", T, &collections).unwrap(), "/10/20/30/");
    }

    #[test]
    fn test_gap_after_first_remap_fails() {
        let collections = map(&[(1, 10)]);
        let err = remap_location("/1/2/3/", T, &collections).unwrap_err();
        assert_eq!(
            err,
            RemapError::PartialLocation {
                location: "/1/2/3/".to_string(),
                segment: "2".to_string(),
                target: T,
            }
        );
    }

    #[test]
    fn test_unmapped_prefix_passes_through() {
        let collections = map(&[(2, 20), (3, 30)]);
        assert_eq!(remap_location("/1/2/3/", T, &collections).unwrap(), "/1/20/30/");
        assert_eq!(remap_location("/1/", T, &collections).unwrap(), "/1/");
    }

    #[test]
    fn test_other_target_is_not_used() {
        let collections = map(&[(2, 20)]);
        assert_eq!(remap_location("/1/2/", T + 1, &collections).unwrap(), "/1/2/");
    }

    #[test]
    fn test_root_location() {
        let collections = map(&[]);
        assert_eq!(remap_location("/", T, &collections).unwrap(), "/");
        assert_eq!(remap_location("", T, &collections).unwrap(), "/");
    }

    #[test]
    fn test_malformed_segment() {
        let collections = map(&[]);
        assert!(matches!(
            remap_location("/1/abc/", T, &collections),
            Err(RemapError::MalformedLocation { .. })
        ));
    }

    #[test]
    fn test_depth() {
        assert_eq!(depth("/"), 0);
        assert_eq!(depth("/1/"), 1);
        assert_eq!(depth("/1/2/3/"), 3);
    }
}
