//! Marker and URL matching policy.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::image::serving_url;

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<img\b[^>]*?\bdata-image-id=["']([^"']*)["'][^>]*?/?>"#)
        .expect("marker regex is valid")
});

static SRC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<img\b[^>]*?\bsrc=["'][^"']*/images/v2/([^"'?#]+)["'][^>]*?/?>"#)
        .expect("src regex is valid")
});

/// Added/removed image IDs between two content versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceDiff {
    /// Images referenced by the new version only.
    pub added: Vec<Uuid>,
    /// Images referenced by the old version only.
    pub removed: Vec<Uuid>,
}

/// The matching rules for canonical markers and serving URLs.
#[derive(Debug, Clone)]
pub struct MarkerPolicy {
    marker_re: Regex,
    src_re: Regex,
}

impl Default for MarkerPolicy {
    fn default() -> Self {
        Self {
            marker_re: MARKER_RE.clone(),
            src_re: SRC_RE.clone(),
        }
    }
}

impl MarkerPolicy {
    /// Canonical marker for an image ID.
    #[must_use]
    pub fn marker_for(&self, id: Uuid) -> String {
        format!("<img data-image-id=\"{id}\">")
    }

    /// Display tag for an image ID.
    #[must_use]
    pub fn display_tag_for(&self, id: Uuid) -> String {
        format!("<img src=\"{}\">", serving_url(id))
    }

    /// Rewrite canonical markers to display tags.
    ///
    /// Markers whose ID is not a valid UUID are left untouched: a dangling
    /// or malformed reference must not break rendering.
    #[must_use]
    pub fn to_display(&self, content: &str) -> String {
        self.marker_re
            .replace_all(content, |caps: &regex::Captures<'_>| {
                match Uuid::parse_str(&caps[1]) {
                    Ok(id) => self.display_tag_for(id),
                    Err(_) => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Rewrite display tags back to canonical markers, returning the
    /// rewritten content and the referenced image IDs in first-occurrence
    /// order (duplicates collapse to one entry).
    #[must_use]
    pub fn canonicalize(&self, content: &str) -> (String, Vec<Uuid>) {
        let mut ids: Vec<Uuid> = Vec::new();
        let rewritten = self
            .src_re
            .replace_all(content, |caps: &regex::Captures<'_>| {
                match Uuid::parse_str(&caps[1]) {
                    Ok(id) => {
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                        self.marker_for(id)
                    }
                    Err(_) => caps[0].to_string(),
                }
            })
            .into_owned();
        (rewritten, ids)
    }

    /// Image IDs referenced by a content string, in first-occurrence order.
    /// Both canonical markers and serving-URL tags count.
    #[must_use]
    pub fn extract_ids(&self, content: &str) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for caps in self
            .marker_re
            .captures_iter(content)
            .chain(self.src_re.captures_iter(content))
        {
            if let Ok(id) = Uuid::parse_str(&caps[1]) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Set-difference of the image IDs referenced by two content versions.
    #[must_use]
    pub fn diff(&self, old_content: &str, new_content: &str) -> ReferenceDiff {
        let old_ids = self.extract_ids(old_content);
        let new_ids = self.extract_ids(new_content);

        ReferenceDiff {
            added: new_ids
                .iter()
                .filter(|id| !old_ids.contains(id))
                .copied()
                .collect(),
            removed: old_ids
                .iter()
                .filter(|id| !new_ids.contains(id))
                .copied()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_display_rewrites_marker() {
        let policy = MarkerPolicy::default();
        let id = Uuid::new_v4();
        let content = format!("before <img data-image-id=\"{id}\"> after");

        let display = policy.to_display(&content);
        assert_eq!(
            display,
            format!("before <img src=\"/images/v2/{id}\"> after")
        );
    }

    #[test]
    fn test_to_display_leaves_malformed_id_untouched() {
        let policy = MarkerPolicy::default();
        let content = "x <img data-image-id=\"not-a-uuid\"> y";
        assert_eq!(policy.to_display(content), content);
    }

    #[test]
    fn test_canonicalize_rewrites_and_extracts() {
        let policy = MarkerPolicy::default();
        let id = Uuid::new_v4();
        let content = format!("<p>hi</p><img src=\"https://blog.example.com/images/v2/{id}\">");

        let (canonical, ids) = policy.canonicalize(&content);
        assert_eq!(
            canonical,
            format!("<p>hi</p><img data-image-id=\"{id}\">")
        );
        assert_eq!(ids, vec![id]);
    }

    #[test]
    fn test_duplicate_markers_count_once_order_from_first_occurrence() {
        let policy = MarkerPolicy::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let content = format!(
            "<img src=\"/images/v2/{a}\"><img src=\"/images/v2/{b}\"><img src=\"/images/v2/{a}\">"
        );

        let (_, ids) = policy.canonicalize(&content);
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_diff_added_and_removed() {
        let policy = MarkerPolicy::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let old = format!("<img data-image-id='{a}'>");
        let new = format!("<img data-image-id='{b}'>");

        let diff = policy.diff(&old, &new);
        assert_eq!(diff.added, vec![b]);
        assert_eq!(diff.removed, vec![a]);
    }

    #[test]
    fn test_diff_unchanged_is_empty() {
        let policy = MarkerPolicy::default();
        let a = Uuid::new_v4();
        let content = format!("<img data-image-id=\"{a}\">");

        let diff = policy.diff(&content, &content);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_extract_ids_mixes_markers_and_urls() {
        let policy = MarkerPolicy::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let content = format!(
            "<img data-image-id=\"{a}\"> and <img src=\"/images/v2/{b}\">"
        );

        let ids = policy.extract_ids(&content);
        assert!(ids.contains(&a));
        assert!(ids.contains(&b));
        assert_eq!(ids.len(), 2);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn arb_ids() -> impl Strategy<Value = Vec<Uuid>> {
        proptest::collection::vec(any::<u128>().prop_map(Uuid::from_u128), 0..8)
    }

    proptest! {
        // Display -> storage -> display preserves the marker set exactly.
        #[test]
        fn prop_roundtrip_preserves_marker_set(ids in arb_ids(), filler in "[a-z ]{0,16}") {
            let policy = MarkerPolicy::default();

            let mut content = String::new();
            for id in &ids {
                content.push_str(&filler);
                content.push_str(&policy.marker_for(*id));
            }

            let display = policy.to_display(&content);
            let (canonical, extracted) = policy.canonicalize(&display);
            let redisplayed = policy.to_display(&canonical);

            let original: HashSet<Uuid> = ids.iter().copied().collect();
            let roundtripped: HashSet<Uuid> =
                policy.extract_ids(&canonical).into_iter().collect();
            prop_assert_eq!(&original, &roundtripped);

            let extracted_set: HashSet<Uuid> = extracted.into_iter().collect();
            prop_assert_eq!(&original, &extracted_set);

            // A second display pass is a fixpoint.
            prop_assert_eq!(policy.to_display(&redisplayed), redisplayed.clone());
        }
    }
}
