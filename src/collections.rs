use crate::entity::{
    CalendarEvent, CollectionId, Document, Fields, Moment, PerformanceSession, Record,
    SocialLink, UserProfile, VodClip, seed_event,
};

/// One synchronized collection: its seed entries plus whatever the current mode supplied.
#[derive(Debug, Clone)]
pub struct Collection<T: Record> {
    items: Vec<T>,
    seed: Vec<T>,
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self::with_seed(Vec::new())
    }
}

impl<T: Record> Collection<T> {
    pub fn with_seed(seed: Vec<T>) -> Self {
        let mut collection = Self {
            items: seed.clone(),
            seed,
        };
        collection.resort();
        collection
    }

    pub fn get_all(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn reset(&mut self) {
        self.items = self.seed.clone();
        self.resort();
    }

    /// Full replacement from a live snapshot. Seeds are re-prepended.
    pub fn replace_from_snapshot(&mut self, documents: &[Document]) {
        let mut items = self.seed.clone();
        items.extend(
            documents
                .iter()
                .filter(|doc| !self.seed.iter().any(|s| s.id() == doc.id))
                .map(T::from_document),
        );
        self.items = items;
        self.resort();
    }

    /// New records go in front on newest-first lists so the stable resort keeps
    /// them ahead of equal timestamps.
    pub fn insert_local(&mut self, document: &Document) {
        let item = T::from_document(document);
        if T::NEWEST_FIRST {
            self.items.insert(0, item);
        } else {
            self.items.push(item);
        }
        self.resort();
    }

    pub fn merge_local(&mut self, id: &str, partial: &Fields) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| item.id() == id) else {
            return false;
        };
        let mut fields = item.to_fields();
        for (key, value) in partial {
            fields.insert(key.clone(), value.clone());
        }
        *item = T::from_document(&Document::new(id, fields));
        self.resort();
        true
    }

    pub fn remove_local(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        self.items.len() != before
    }

    fn resort(&mut self) {
        if T::NEWEST_FIRST {
            // Stable: equal moments keep their arrival order.
            self.items.sort_by(|a, b| {
                let ta = a.recency().unwrap_or(Moment::ZERO);
                let tb = b.recency().unwrap_or(Moment::ZERO);
                tb.cmp(&ta)
            });
        }
    }
}

/// The five synchronized collections. Only the writer and snapshot application mutate them.
#[derive(Debug, Clone)]
pub struct Collections {
    events: Collection<CalendarEvent>,
    social_links: Collection<SocialLink>,
    vod_library: Collection<VodClip>,
    performance_log: Collection<PerformanceSession>,
    profile: UserProfile,
}

impl Default for Collections {
    fn default() -> Self {
        Self::new()
    }
}

impl Collections {
    pub fn new() -> Self {
        Self {
            events: Collection::with_seed(vec![seed_event()]),
            social_links: Collection::default(),
            vod_library: Collection::default(),
            performance_log: Collection::default(),
            profile: UserProfile::default(),
        }
    }

    pub fn events(&self) -> &Collection<CalendarEvent> {
        &self.events
    }

    pub fn social_links(&self) -> &Collection<SocialLink> {
        &self.social_links
    }

    pub fn vod_library(&self) -> &Collection<VodClip> {
        &self.vod_library
    }

    pub fn performance_log(&self) -> &Collection<PerformanceSession> {
        &self.performance_log
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn len(&self, collection: CollectionId) -> usize {
        match collection {
            CollectionId::Events => self.events.len(),
            CollectionId::SocialLinks => self.social_links.len(),
            CollectionId::VodLibrary => self.vod_library.len(),
            CollectionId::PerformanceLog => self.performance_log.len(),
            CollectionId::UserProfile => 1,
        }
    }

    pub fn reset_to_seed(&mut self) {
        self.events.reset();
        self.social_links.reset();
        self.vod_library.reset();
        self.performance_log.reset();
        self.profile = UserProfile::default();
    }

    pub fn apply_snapshot(&mut self, collection: CollectionId, documents: &[Document]) {
        match collection {
            CollectionId::Events => self.events.replace_from_snapshot(documents),
            CollectionId::SocialLinks => self.social_links.replace_from_snapshot(documents),
            CollectionId::VodLibrary => self.vod_library.replace_from_snapshot(documents),
            CollectionId::PerformanceLog => self.performance_log.replace_from_snapshot(documents),
            CollectionId::UserProfile => {
                self.profile = UserProfile::from_fields(documents.first().map(|d| &d.fields));
            }
        }
    }

    pub fn apply_profile(&mut self, fields: Option<&Fields>) {
        self.profile = UserProfile::from_fields(fields);
    }

    pub(crate) fn insert_local(&mut self, collection: CollectionId, document: &Document) {
        match collection {
            CollectionId::Events => self.events.insert_local(document),
            CollectionId::SocialLinks => self.social_links.insert_local(document),
            CollectionId::VodLibrary => self.vod_library.insert_local(document),
            CollectionId::PerformanceLog => self.performance_log.insert_local(document),
            CollectionId::UserProfile => self.profile = UserProfile::from_fields(Some(&document.fields)),
        }
    }

    pub(crate) fn merge_local(&mut self, collection: CollectionId, id: &str, partial: &Fields) -> bool {
        match collection {
            CollectionId::Events => self.events.merge_local(id, partial),
            CollectionId::SocialLinks => self.social_links.merge_local(id, partial),
            CollectionId::VodLibrary => self.vod_library.merge_local(id, partial),
            CollectionId::PerformanceLog => self.performance_log.merge_local(id, partial),
            CollectionId::UserProfile => {
                let mut fields = self.profile.to_fields();
                for (key, value) in partial {
                    fields.insert(key.clone(), value.clone());
                }
                self.profile = UserProfile::from_fields(Some(&fields));
                true
            }
        }
    }

    pub(crate) fn remove_local(&mut self, collection: CollectionId, id: &str) -> bool {
        match collection {
            CollectionId::Events => self.events.remove_local(id),
            CollectionId::SocialLinks => self.social_links.remove_local(id),
            CollectionId::VodLibrary => self.vod_library.remove_local(id),
            CollectionId::PerformanceLog => self.performance_log.remove_local(id),
            CollectionId::UserProfile => {
                self.profile = UserProfile::default();
                true
            }
        }
    }

    pub(crate) fn replace_profile(&mut self, profile: UserProfile) {
        self.profile = profile;
    }
}
