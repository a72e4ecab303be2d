/// Search bar state: free text plus inline `#tag` tokens.
///
/// The facet never talks to the catalog itself. It produces an [`ImageFilter`]
/// which is both sent to the catalog as the fetch key and applied locally to
/// the cached image list, so optimistic tag edits are reflected immediately.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::state::data::{ImageItem, Tag, TagId};

/// Filter predicate consumed upstream of the layout engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageFilter {
    /// An image must carry every one of these tags
    pub tag_ids: BTreeSet<TagId>,
    /// Case-insensitive substring of the image name; empty matches everything
    pub text: String,
}

impl ImageFilter {
    pub fn new(tag_ids: impl IntoIterator<Item = TagId>, text: impl Into<String>) -> Self {
        Self {
            tag_ids: tag_ids.into_iter().collect(),
            text: text.into(),
        }
    }

    pub fn matches(&self, image: &ImageItem) -> bool {
        if !self.tag_ids.iter().all(|id| image.has_tag(*id)) {
            return false;
        }
        if self.text.is_empty() {
            return true;
        }
        image.name.to_lowercase().contains(&self.text.to_lowercase())
    }
}

/// State behind the search bar
#[derive(Debug, Clone, Default)]
pub struct SearchFacet {
    input: String,
    selected: Vec<Tag>,
    /// The search input reported an erase while already empty; the Backspace
    /// key event that follows removes a chip
    erase_on_empty: bool,
}

impl SearchFacet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn selected_tags(&self) -> &[Tag] {
        &self.selected
    }

    /// Edit from the search input. The input reports every Backspace or
    /// Delete it receives, even one that leaves it unchanged, so an empty
    /// edit of an empty input can only be an erase key pressed inside it.
    pub fn set_input(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.erase_on_empty = text.is_empty() && self.input.is_empty();
        self.input = text;
    }

    /// Another text input took the keystroke
    pub fn edited_elsewhere(&mut self) {
        self.erase_on_empty = false;
    }

    /// The partial tag name after the last `#`, if the user is typing one
    pub fn tag_query(&self) -> Option<&str> {
        self.input.rfind('#').map(|idx| &self.input[idx + 1..])
    }

    /// Tags offered while a `#` token is being typed, excluding tags that are
    /// already part of the filter and tags still waiting for confirmation
    pub fn suggestions<'a>(&self, tags: &'a [Tag]) -> Vec<&'a Tag> {
        let Some(query) = self.tag_query() else {
            return Vec::new();
        };
        let query = query.to_lowercase();

        tags.iter()
            .filter(|tag| !tag.is_optimistic())
            .filter(|tag| !self.selected.iter().any(|s| s.id == tag.id))
            .filter(|tag| tag.name.to_lowercase().contains(&query))
            .collect()
    }

    /// Add a tag to the filter, dropping the `#partial` token that led to it
    pub fn select_tag(&mut self, tag: Tag) {
        if let Some(idx) = self.input.rfind('#') {
            self.input.truncate(idx);
        }
        self.erase_on_empty = false;
        if !self.selected.iter().any(|s| s.id == tag.id) {
            self.selected.push(tag);
        }
    }

    /// Enter key: accept the first suggestion. Returns false when there was
    /// nothing to accept.
    pub fn submit(&mut self, tags: &[Tag]) -> bool {
        let first = self.suggestions(tags).first().map(|tag| (*tag).clone());
        match first {
            Some(tag) => {
                self.select_tag(tag);
                true
            }
            None => false,
        }
    }

    /// Backspace key. Removes the rightmost tag only when the key went to the
    /// search input while it was already empty.
    pub fn backspace(&mut self) -> bool {
        std::mem::take(&mut self.erase_on_empty) && self.selected.pop().is_some()
    }

    pub fn remove_tag(&mut self, id: TagId) {
        self.selected.retain(|tag| tag.id != id);
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.input.clear();
        self.erase_on_empty = false;
    }

    pub fn has_content(&self) -> bool {
        !self.selected.is_empty() || !self.input.is_empty()
    }

    /// Tags can be renamed or deleted behind our back; keep the selected
    /// chips in step with the latest tag list
    pub fn retain_known(&mut self, tags: &[Tag]) {
        self.selected.retain(|s| tags.iter().any(|t| t.id == s.id));
    }

    /// Free text with any half-typed `#tag` token removed
    pub fn search_text(&self) -> String {
        let text = match self.input.rfind('#') {
            Some(idx) => &self.input[..idx],
            None => self.input.as_str(),
        };
        text.trim().to_string()
    }

    pub fn filter(&self) -> ImageFilter {
        ImageFilter::new(self.selected.iter().map(|t| t.id), self.search_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::ImageId;

    fn tags() -> Vec<Tag> {
        vec![
            Tag::new(TagId(1), "Beach", "#fff"),
            Tag::new(TagId(2), "Mountains", "#fff"),
            Tag::new(TagId(3), "beach-house", "#fff"),
            Tag::new(TagId(-1), "beachball", "#fff"),
        ]
    }

    fn image(name: &str, tags: Vec<Tag>) -> ImageItem {
        ImageItem {
            id: ImageId(1),
            url: format!("/photos/{name}"),
            width: 100.0,
            height: 100.0,
            name: name.into(),
            tags,
        }
    }

    #[test]
    fn test_no_suggestions_without_hash() {
        let mut facet = SearchFacet::new();
        facet.set_input("beach");
        assert!(facet.tag_query().is_none());
        assert!(facet.suggestions(&tags()).is_empty());
    }

    #[test]
    fn test_suggestions_match_substring_case_insensitively() {
        let tags = tags();
        let mut facet = SearchFacet::new();
        facet.set_input("sunset #BEA");

        let names: Vec<_> = facet.suggestions(&tags).iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Beach", "beach-house"]);
    }

    #[test]
    fn test_selecting_tag_strips_token_and_hides_it() {
        let tags = tags();
        let mut facet = SearchFacet::new();
        facet.set_input("sunset #bea");
        facet.select_tag(tags[0].clone());

        assert_eq!(facet.input(), "sunset ");
        assert_eq!(facet.selected_tags().len(), 1);

        facet.set_input("sunset #bea");
        let names: Vec<_> = facet.suggestions(&tags).iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["beach-house"]);
    }

    #[test]
    fn test_submit_takes_first_suggestion() {
        let tags = tags();
        let mut facet = SearchFacet::new();
        facet.set_input("#mount");
        assert!(facet.submit(&tags));
        assert_eq!(facet.selected_tags()[0].id, TagId(2));
        assert_eq!(facet.input(), "");

        facet.set_input("#nothing");
        assert!(!facet.submit(&tags));
    }

    #[test]
    fn test_backspace_removes_rightmost_tag_only_when_empty() {
        let tags = tags();
        let mut facet = SearchFacet::new();
        facet.select_tag(tags[0].clone());
        facet.select_tag(tags[1].clone());

        facet.set_input("x");
        assert!(!facet.backspace());

        // the Backspace that empties the input keeps the chips
        facet.set_input("");
        assert!(!facet.backspace());
        assert_eq!(facet.selected_tags().len(), 2);

        // the next one, on the empty input, removes the rightmost chip
        facet.set_input("");
        assert!(facet.backspace());
        assert_eq!(facet.selected_tags().len(), 1);
        assert_eq!(facet.selected_tags()[0].id, TagId(1));

        // one key, one chip
        assert!(!facet.backspace());
    }

    #[test]
    fn test_backspace_in_another_input_keeps_chips() {
        let mut facet = SearchFacet::new();
        facet.select_tag(tags()[0].clone());

        facet.set_input("");
        facet.edited_elsewhere();
        assert!(!facet.backspace());

        // a key event no text input reported
        assert!(!facet.backspace());
        assert_eq!(facet.selected_tags().len(), 1);
    }

    #[test]
    fn test_filter_excludes_partial_token() {
        let tags = tags();
        let mut facet = SearchFacet::new();
        facet.select_tag(tags[1].clone());
        facet.set_input("  lake #mo");

        let filter = facet.filter();
        assert_eq!(filter.text, "lake");
        assert!(filter.tag_ids.contains(&TagId(2)));
    }

    #[test]
    fn test_filter_requires_every_tag() {
        let tags = tags();
        let filter = ImageFilter::new([TagId(1), TagId(2)], "");

        assert!(filter.matches(&image("a.jpg", vec![tags[0].clone(), tags[1].clone()])));
        assert!(!filter.matches(&image("a.jpg", vec![tags[0].clone()])));
    }

    #[test]
    fn test_filter_text_is_case_insensitive() {
        let filter = ImageFilter::new([], "LAKE");
        assert!(filter.matches(&image("Lake_Tahoe.jpg", vec![])));
        assert!(!filter.matches(&image("desert.jpg", vec![])));
        assert!(ImageFilter::default().matches(&image("desert.jpg", vec![])));
    }

    #[test]
    fn test_clear() {
        let mut facet = SearchFacet::new();
        facet.select_tag(tags()[0].clone());
        facet.set_input("abc");
        assert!(facet.has_content());
        facet.clear();
        assert!(!facet.has_content());
    }
}
