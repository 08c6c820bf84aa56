use crate::entity::CollectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Calendar,
    Profile,
    Vod,
    Tracker,
    Assistant,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Calendar,
        Tab::Profile,
        Tab::Vod,
        Tab::Tracker,
        Tab::Assistant,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Tab::Calendar => "Calendar",
            Tab::Profile => "Profile",
            Tab::Vod => "VOD Library",
            Tab::Tracker => "Tracker",
            Tab::Assistant => "Assistant",
        }
    }

    /// Whether this tab's view is derived from `collection`.
    pub fn depends_on(self, collection: CollectionId) -> bool {
        matches!(
            (self, collection),
            (Tab::Calendar, CollectionId::Events)
                | (Tab::Profile, CollectionId::SocialLinks)
                | (Tab::Profile, CollectionId::UserProfile)
                | (Tab::Vod, CollectionId::VodLibrary)
                | (Tab::Tracker, CollectionId::PerformanceLog)
        )
    }
}

/// Decides per change notification whether the active tab needs a redraw.
///
/// Live snapshots and demo-mode writes both land here, so there is one redraw path.
#[derive(Debug, Clone, Default)]
pub struct ViewRefreshDispatcher {
    dirty: bool,
    redraws: u64,
    skipped: u64,
    changes: Vec<CollectionId>,
}

impl ViewRefreshDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the change scheduled a redraw.
    pub fn notify(&mut self, active: Tab, collection: CollectionId) -> bool {
        self.changes.push(collection);
        if active.depends_on(collection) {
            self.dirty = true;
            self.redraws += 1;
            true
        } else {
            self.skipped += 1;
            tracing::debug!(%collection, tab = active.label(), "background change, redraw skipped");
            false
        }
    }

    /// Navigation, mode transitions and other chrome changes redraw unconditionally.
    pub fn request_full(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Redraws scheduled by collection changes.
    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped
    }

    pub fn drain_changes(&mut self) -> Vec<CollectionId> {
        std::mem::take(&mut self.changes)
    }
}
