/// Client-side query cache for images and tags.
///
/// Each store keeps the last snapshot confirmed by the catalog and, on top of
/// it, the list of mutations the user made that the catalog has not answered
/// yet. What the UI sees is the confirmed snapshot with the pending mutations
/// replayed over it. A failed request simply drops its mutation, which rolls
/// the view back to the confirmed state; a successful one is folded into the
/// confirmed snapshot.
///
/// Tag mutations are serialized per image: at most one request per image is in
/// flight, the rest wait in issue order. Assigning a tag that is still being
/// created holds the request until the catalog hands out the tag's real id.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::data::{ImageId, ImageItem, Tag, TagId};
use crate::search::ImageFilter;

/// Identifies one optimistic mutation across its request round-trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(pub u64);

/// A speculative change to one image's tag set
#[derive(Debug, Clone, PartialEq)]
pub enum TagOp {
    Assign(Tag),
    Remove(TagId),
}

impl TagOp {
    pub fn tag_id(&self) -> TagId {
        match self {
            TagOp::Assign(tag) => tag.id,
            TagOp::Remove(id) => *id,
        }
    }

    fn apply(&self, image: &mut ImageItem) {
        match self {
            TagOp::Assign(tag) => {
                if !image.has_tag(tag.id) {
                    image.tags.push(tag.clone());
                }
            }
            TagOp::Remove(id) => image.tags.retain(|t| t.id != *id),
        }
    }
}

/// A mutation that should now be sent to the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub mutation: MutationId,
    pub image: ImageId,
    pub op: TagOp,
}

#[derive(Debug, Clone)]
struct Pending {
    id: MutationId,
    image: ImageId,
    op: TagOp,
    in_flight: bool,
}

/// Cached image list keyed by the filter it was fetched with
#[derive(Debug, Default)]
pub struct ImageStore {
    confirmed: Vec<ImageItem>,
    /// Filter of the data in `confirmed`
    loaded: Option<ImageFilter>,
    /// Filter of the most recently issued fetch
    requested: Option<ImageFilter>,
    in_flight: Option<ImageFilter>,
    pending: Vec<Pending>,
    next_mutation: u64,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Confirmed snapshot with every pending mutation replayed on top
    pub fn images(&self) -> Vec<ImageItem> {
        let mut images = self.confirmed.clone();
        for pending in &self.pending {
            if let Some(image) = images.iter_mut().find(|i| i.id == pending.image) {
                pending.op.apply(image);
            }
        }
        images
    }

    pub fn image(&self, id: ImageId) -> Option<ImageItem> {
        let mut image = self.confirmed.iter().find(|i| i.id == id)?.clone();
        for pending in self.pending.iter().filter(|p| p.image == id) {
            pending.op.apply(&mut image);
        }
        Some(image)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Ask for `filter`. Returns the filter to fetch, or `None` when an
    /// identical request is already in flight.
    pub fn request(&mut self, filter: ImageFilter) -> Option<ImageFilter> {
        self.requested = Some(filter.clone());
        if self.in_flight.as_ref() == Some(&filter) {
            debug!("image fetch already in flight, reusing it");
            return None;
        }
        self.in_flight = Some(filter.clone());
        Some(filter)
    }

    /// Force a fetch of the last requested filter, e.g. after an import
    pub fn invalidate(&mut self) -> Option<ImageFilter> {
        let filter = self.requested.clone().unwrap_or_default();
        self.in_flight = None;
        self.request(filter)
    }

    /// Store a fetch result. Results for a filter that is no longer the one
    /// wanted are discarded; returns whether the cache changed.
    pub fn receive(&mut self, filter: ImageFilter, images: Vec<ImageItem>) -> bool {
        if self.in_flight.as_ref() == Some(&filter) {
            self.in_flight = None;
        }
        if self.requested.as_ref() != Some(&filter) {
            debug!("discarding image fetch for superseded filter");
            return false;
        }
        self.confirmed = images;
        self.loaded = Some(filter);
        true
    }

    pub fn fetch_failed(&mut self, filter: &ImageFilter) {
        if self.in_flight.as_ref() == Some(filter) {
            self.in_flight = None;
        }
    }

    /// Apply `op` optimistically. Returns the mutation id and, if no other
    /// request for the same image is in flight, the request to send now.
    pub fn mutate(&mut self, image: ImageId, op: TagOp) -> (MutationId, Option<Dispatch>) {
        self.next_mutation += 1;
        let id = MutationId(self.next_mutation);
        let busy = self.pending.iter().any(|p| p.image == image && p.in_flight);

        self.pending.push(Pending {
            id,
            image,
            op: op.clone(),
            in_flight: !busy,
        });

        let dispatch = (!busy).then_some(Dispatch { mutation: id, image, op });
        if dispatch.is_none() {
            debug!(%image, "tag mutation queued behind an in-flight request");
        }
        (id, dispatch)
    }

    /// Record the catalog's answer for a mutation. Success folds it into the
    /// confirmed snapshot, failure drops it. Returns the next queued request
    /// for the same image, if any.
    pub fn settle(&mut self, mutation: MutationId, succeeded: bool) -> Option<Dispatch> {
        let index = self.pending.iter().position(|p| p.id == mutation)?;
        let done = self.pending.remove(index);

        if succeeded {
            if let Some(image) = self.confirmed.iter_mut().find(|i| i.id == done.image) {
                done.op.apply(image);
            }
        } else {
            warn!(image = %done.image, tag = %done.op.tag_id(), "tag change rolled back");
        }

        let next = self
            .pending
            .iter_mut()
            .find(|p| p.image == done.image && !p.in_flight)?;
        next.in_flight = true;
        Some(Dispatch {
            mutation: next.id,
            image: next.image,
            op: next.op.clone(),
        })
    }

    /// Placeholder tags get real ids once created; rewrite queued ops that
    /// still reference the placeholder
    pub fn replace_tag(&mut self, placeholder: TagId, tag: &Tag) {
        for pending in &mut self.pending {
            if let TagOp::Assign(assigned) = &mut pending.op {
                if assigned.id == placeholder {
                    *assigned = tag.clone();
                }
            }
        }
    }
}

/// A tag created locally, waiting for the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTag {
    pub mutation: MutationId,
    pub placeholder: Tag,
}

/// Cached tag list with optimistic creation
#[derive(Debug, Default)]
pub struct TagStore {
    confirmed: Vec<Tag>,
    optimistic: Vec<PendingTag>,
    next_mutation: u64,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Confirmed tags followed by placeholders still being created
    pub fn tags(&self) -> Vec<Tag> {
        self.confirmed
            .iter()
            .cloned()
            .chain(self.optimistic.iter().map(|p| p.placeholder.clone()))
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Tag> {
        let name = name.trim().to_lowercase();
        self.tags().into_iter().find(|t| t.name.to_lowercase() == name)
    }

    pub fn receive(&mut self, tags: Vec<Tag>) {
        self.confirmed = tags;
    }

    /// Show a new tag immediately under a negative placeholder id
    pub fn create(&mut self, name: &str, color: &str) -> PendingTag {
        self.next_mutation += 1;
        let pending = PendingTag {
            mutation: MutationId(self.next_mutation),
            placeholder: Tag::new(TagId(-(self.next_mutation as i64)), name.trim(), color),
        };
        self.optimistic.push(pending.clone());
        pending
    }

    /// Swap the placeholder for the catalog's tag
    pub fn confirm(&mut self, mutation: MutationId, tag: Tag) -> Option<TagId> {
        let index = self.optimistic.iter().position(|p| p.mutation == mutation)?;
        let pending = self.optimistic.remove(index);
        if !self.confirmed.iter().any(|t| t.id == tag.id) {
            self.confirmed.push(tag);
        }
        Some(pending.placeholder.id)
    }

    /// Creation failed, forget the placeholder
    pub fn reject(&mut self, mutation: MutationId) {
        self.optimistic.retain(|p| p.mutation != mutation);
    }
}

/// Both stores plus the requests waiting for a tag to be created. Every
/// method returns the requests that can go to the catalog now.
#[derive(Debug, Default)]
pub struct QueryCache {
    pub images: ImageStore,
    pub tags: TagStore,
    /// Tag creations in flight, with their placeholder ids
    creating: HashMap<MutationId, TagId>,
    /// Dispatched requests that reference a placeholder tag
    held: Vec<Dispatch>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change an image's tags optimistically
    pub fn change_tags(&mut self, image: ImageId, op: TagOp) -> Vec<Dispatch> {
        let (_, dispatch) = self.images.mutate(image, op);
        self.release(dispatch)
    }

    /// Create a tag and assign it to `image`. The tag shows up at once under
    /// a placeholder id; the assignment waits for the creation to succeed.
    pub fn create_and_assign(&mut self, image: ImageId, name: &str, color: &str) -> (PendingTag, Vec<Dispatch>) {
        let pending = self.tags.create(name, color);
        self.creating.insert(pending.mutation, pending.placeholder.id);
        let ready = self.change_tags(image, TagOp::Assign(pending.placeholder.clone()));
        (pending, ready)
    }

    /// The catalog answered a tag change
    pub fn tag_changed(&mut self, mutation: MutationId, succeeded: bool) -> Vec<Dispatch> {
        let next = self.images.settle(mutation, succeeded);
        self.release(next)
    }

    /// The catalog created a tag: swap in its real id and send what was held
    pub fn tag_created(&mut self, mutation: MutationId, tag: Tag) -> Vec<Dispatch> {
        self.creating.remove(&mutation);
        let Some(placeholder) = self.tags.confirm(mutation, tag.clone()) else {
            return Vec::new();
        };
        self.images.replace_tag(placeholder, &tag);

        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.held)
            .into_iter()
            .partition(|dispatch| dispatch.op.tag_id() == placeholder);
        self.held = waiting;

        ready
            .into_iter()
            .map(|mut dispatch| {
                dispatch.op = match dispatch.op {
                    TagOp::Assign(_) => TagOp::Assign(tag.clone()),
                    TagOp::Remove(_) => TagOp::Remove(tag.id),
                };
                dispatch
            })
            .collect()
    }

    /// Creation failed: drop the placeholder and roll back every change that
    /// used it
    pub fn tag_rejected(&mut self, mutation: MutationId) -> Vec<Dispatch> {
        self.tags.reject(mutation);
        let placeholder = self.creating.remove(&mutation);

        let (failed, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.held)
            .into_iter()
            .partition(|dispatch| Some(dispatch.op.tag_id()) == placeholder);
        self.held = waiting;

        let mut ready = Vec::new();
        for dispatch in failed {
            let next = self.images.settle(dispatch.mutation, false);
            ready.extend(self.release(next));
        }
        ready
    }

    /// Hold requests for tags that are still being created. One whose tag
    /// creation already failed is settled as failed, which may release the
    /// next request for the same image.
    fn release(&mut self, mut next: Option<Dispatch>) -> Vec<Dispatch> {
        let mut ready = Vec::new();

        while let Some(dispatch) = next.take() {
            let tag = dispatch.op.tag_id();
            if !tag.is_placeholder() {
                ready.push(dispatch);
            } else if self.creating.values().any(|placeholder| *placeholder == tag) {
                debug!(image = %dispatch.image, %tag, "holding tag change until the tag exists");
                self.held.push(dispatch);
            } else {
                next = self.images.settle(dispatch.mutation, false);
            }
        }

        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: i64, tags: Vec<Tag>) -> ImageItem {
        ImageItem {
            id: ImageId(id),
            url: format!("/photos/{id}.jpg"),
            width: 100.0,
            height: 100.0,
            name: format!("{id}.jpg"),
            tags,
        }
    }

    fn loaded_store(images: Vec<ImageItem>) -> ImageStore {
        let mut store = ImageStore::new();
        let filter = store.request(ImageFilter::default()).unwrap();
        assert!(store.receive(filter, images));
        store
    }

    fn tag(id: i64, name: &str) -> Tag {
        Tag::new(TagId(id), name, "#3B82F6")
    }

    #[test]
    fn test_identical_fetch_is_deduplicated() {
        let mut store = ImageStore::new();
        assert!(store.request(ImageFilter::default()).is_some());
        assert!(store.request(ImageFilter::default()).is_none());

        let other = ImageFilter::new([], "lake");
        assert_eq!(store.request(other.clone()), Some(other));
    }

    #[test]
    fn test_superseded_fetch_is_discarded() {
        let mut store = ImageStore::new();
        let first = store.request(ImageFilter::new([], "a")).unwrap();
        let second = store.request(ImageFilter::new([], "ab")).unwrap();

        assert!(!store.receive(first, vec![image(1, vec![])]));
        assert!(store.images().is_empty());

        assert!(store.receive(second, vec![image(2, vec![])]));
        assert_eq!(store.images()[0].id, ImageId(2));
    }

    #[test]
    fn test_optimistic_assign_rolls_back_on_failure() {
        let mut store = loaded_store(vec![image(1, vec![tag(1, "old")])]);
        let before = store.image(ImageId(1)).unwrap().tags;

        let (_, dispatch) = store.mutate(ImageId(1), TagOp::Assign(tag(2, "new")));
        let dispatch = dispatch.unwrap();

        // visible immediately
        assert!(store.image(ImageId(1)).unwrap().has_tag(TagId(2)));

        assert!(store.settle(dispatch.mutation, false).is_none());
        assert_eq!(store.image(ImageId(1)).unwrap().tags, before);
    }

    #[test]
    fn test_successful_assign_is_confirmed() {
        let mut store = loaded_store(vec![image(1, vec![])]);
        let (id, _) = store.mutate(ImageId(1), TagOp::Assign(tag(2, "new")));
        assert!(store.settle(id, true).is_none());
        assert!(store.image(ImageId(1)).unwrap().has_tag(TagId(2)));

        // nothing in flight any more, the next change goes out right away
        let (_, next) = store.mutate(ImageId(1), TagOp::Remove(TagId(2)));
        assert!(next.is_some());
    }

    #[test]
    fn test_optimistic_remove() {
        let mut store = loaded_store(vec![image(1, vec![tag(1, "a"), tag(2, "b")])]);
        let (id, _) = store.mutate(ImageId(1), TagOp::Remove(TagId(1)));
        assert!(!store.image(ImageId(1)).unwrap().has_tag(TagId(1)));

        store.settle(id, false);
        assert!(store.image(ImageId(1)).unwrap().has_tag(TagId(1)));
    }

    #[test]
    fn test_mutations_are_serialized_per_image() {
        let mut store = loaded_store(vec![image(1, vec![]), image(2, vec![])]);

        let (first, d1) = store.mutate(ImageId(1), TagOp::Assign(tag(5, "x")));
        let (second, d2) = store.mutate(ImageId(1), TagOp::Remove(TagId(5)));
        let (_, d3) = store.mutate(ImageId(2), TagOp::Assign(tag(5, "x")));

        assert!(d1.is_some());
        assert!(d2.is_none(), "same image must wait");
        assert!(d3.is_some(), "other images are independent");

        // both ops are already reflected, in order
        assert!(!store.image(ImageId(1)).unwrap().has_tag(TagId(5)));

        let next = store.settle(first, true).unwrap();
        assert_eq!(next.mutation, second);
        assert_eq!(next.op, TagOp::Remove(TagId(5)));
    }

    #[test]
    fn test_refetch_keeps_pending_mutations_visible() {
        let mut store = loaded_store(vec![image(1, vec![])]);
        store.mutate(ImageId(1), TagOp::Assign(tag(3, "t")));

        let filter = store.invalidate().unwrap();
        store.receive(filter, vec![image(1, vec![])]);

        assert!(store.image(ImageId(1)).unwrap().has_tag(TagId(3)));
    }

    #[test]
    fn test_tag_creation_reconciles_placeholder() {
        let mut tags = TagStore::new();
        tags.receive(vec![tag(1, "a")]);

        let pending = tags.create("fresh", "#fff");
        assert!(pending.placeholder.is_optimistic());
        assert_eq!(tags.tags().len(), 2);

        let replaced = tags.confirm(pending.mutation, tag(7, "fresh"));
        assert_eq!(replaced, Some(pending.placeholder.id));
        assert_eq!(
            tags.tags().iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![TagId(1), TagId(7)]
        );
    }

    #[test]
    fn test_tag_creation_rolls_back() {
        let mut tags = TagStore::new();
        tags.receive(vec![tag(1, "a")]);

        let pending = tags.create("fresh", "#fff");
        tags.reject(pending.mutation);

        assert_eq!(tags.tags(), vec![tag(1, "a")]);
    }

    #[test]
    fn test_placeholder_ids_are_unique() {
        let mut tags = TagStore::new();
        let a = tags.create("a", "#fff");
        let b = tags.create("b", "#fff");
        assert_ne!(a.placeholder.id, b.placeholder.id);
        assert_eq!(tags.find_by_name(" B ").unwrap().id, b.placeholder.id);
    }

    fn cache_with(images: Vec<ImageItem>) -> QueryCache {
        let mut cache = QueryCache::new();
        let filter = cache.images.request(ImageFilter::default()).unwrap();
        assert!(cache.images.receive(filter, images));
        cache.tags.receive(vec![tag(1, "old")]);
        cache
    }

    #[test]
    fn test_new_tag_assignment_is_sent_with_real_id() {
        let mut cache = cache_with(vec![image(1, vec![tag(1, "old")])]);

        let (pending, ready) = cache.create_and_assign(ImageId(1), "fresh", "#fff");
        assert!(ready.is_empty(), "nothing to send before the tag exists");
        assert!(cache.images.image(ImageId(1)).unwrap().has_tag(pending.placeholder.id));

        let ready = cache.tag_created(pending.mutation, tag(7, "fresh"));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].image, ImageId(1));
        assert_eq!(ready[0].op, TagOp::Assign(tag(7, "fresh")));

        let shown = cache.images.image(ImageId(1)).unwrap();
        assert!(shown.has_tag(TagId(7)));
        assert!(!shown.has_tag(pending.placeholder.id));

        assert!(cache.tag_changed(ready[0].mutation, true).is_empty());
        assert!(cache.images.image(ImageId(1)).unwrap().has_tag(TagId(7)));
    }

    #[test]
    fn test_failed_tag_creation_restores_image_tags() {
        let mut cache = cache_with(vec![image(1, vec![tag(1, "old")])]);
        let before = cache.images.image(ImageId(1)).unwrap().tags;

        let (pending, _) = cache.create_and_assign(ImageId(1), "fresh", "#fff");
        assert!(cache.tag_rejected(pending.mutation).is_empty());

        assert_eq!(cache.images.image(ImageId(1)).unwrap().tags, before);
        assert_eq!(cache.tags.tags(), vec![tag(1, "old")]);
    }

    #[test]
    fn test_change_waits_behind_held_assignment() {
        let mut cache = cache_with(vec![image(1, vec![tag(1, "old")])]);

        let (pending, _) = cache.create_and_assign(ImageId(1), "fresh", "#fff");
        assert!(cache.change_tags(ImageId(1), TagOp::Remove(TagId(1))).is_empty());

        // creation releases only the assignment; the removal stays queued
        let ready = cache.tag_created(pending.mutation, tag(7, "fresh"));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].op, TagOp::Assign(tag(7, "fresh")));

        let next = cache.tag_changed(ready[0].mutation, true);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].op, TagOp::Remove(TagId(1)));
    }

    #[test]
    fn test_failed_tag_creation_releases_queued_change() {
        let mut cache = cache_with(vec![image(1, vec![tag(1, "old")])]);

        let (pending, _) = cache.create_and_assign(ImageId(1), "fresh", "#fff");
        cache.change_tags(ImageId(1), TagOp::Remove(TagId(1)));

        let ready = cache.tag_rejected(pending.mutation);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].op, TagOp::Remove(TagId(1)));

        let shown = cache.images.image(ImageId(1)).unwrap();
        assert!(shown.tags.is_empty());
    }

    #[test]
    fn test_assigning_a_rejected_placeholder_fails_at_once() {
        let mut cache = cache_with(vec![image(1, vec![]), image(2, vec![])]);

        let (pending, _) = cache.create_and_assign(ImageId(1), "fresh", "#fff");
        let placeholder = pending.placeholder.clone();
        // queued on image 2 behind an unrelated change
        let (_, first) = cache.images.mutate(ImageId(2), TagOp::Assign(tag(1, "old")));
        cache.change_tags(ImageId(2), TagOp::Assign(placeholder.clone()));

        cache.tag_rejected(pending.mutation);
        assert!(cache.tag_changed(first.unwrap().mutation, true).is_empty());
        assert!(!cache.images.image(ImageId(2)).unwrap().has_tag(placeholder.id));
    }
}
