use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Schemaless document body as the store sees it.
pub type Fields = Map<String, Value>;

pub const PROFILE_DOC_ID: &str = "mainProfile";

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionId {
    Events,
    SocialLinks,
    VodLibrary,
    PerformanceLog,
    UserProfile,
}

impl CollectionId {
    /// The four list collections; the profile is a singleton document.
    pub const LISTS: [CollectionId; 4] = [
        CollectionId::Events,
        CollectionId::SocialLinks,
        CollectionId::VodLibrary,
        CollectionId::PerformanceLog,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CollectionId::Events => "events",
            CollectionId::SocialLinks => "socialLinks",
            CollectionId::VodLibrary => "vodLibrary",
            CollectionId::PerformanceLog => "performanceLog",
            CollectionId::UserProfile => "userProfile",
        }
    }

    /// Field stamped with a moment on create.
    pub fn moment_field(self) -> Option<&'static str> {
        match self {
            CollectionId::Events | CollectionId::SocialLinks | CollectionId::VodLibrary => {
                Some("createdAt")
            }
            CollectionId::PerformanceLog => Some("finishedAt"),
            CollectionId::UserProfile => None,
        }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque ordering-only timestamp, normalized to epoch millis at the store boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Moment(i64);

impl Moment {
    pub const ZERO: Moment = Moment(0);

    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn millis(self) -> i64 {
        self.0
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        DateTime::parse_from_rfc3339(trimmed)
            .ok()
            .map(|dt| Self(dt.timestamp_millis()))
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(raw) => Self::parse(raw),
            Value::Number(n) => n.as_i64().map(Self),
            // SDK-style serialized timestamps.
            Value::Object(map) => {
                let seconds = map.get("seconds").and_then(Value::as_i64)?;
                let nanos = map
                    .get("nanoseconds")
                    .or_else(|| map.get("nanos"))
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                let millis = seconds.checked_mul(1000)?.checked_add(nanos / 1_000_000)?;
                Some(Self(millis))
            }
            _ => None,
        }
    }

    /// Sortable RFC 3339 rendering used for locally stamped moments.
    pub fn encode(self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.0)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }
}

/// Typed view over one collection's documents.
///
/// `from_document` must never fail: inbound documents may be missing fields or
/// carry the wrong types, and those default.
pub trait Record: Clone + fmt::Debug {
    const COLLECTION: CollectionId;
    const NEWEST_FIRST: bool = false;

    fn id(&self) -> &str;
    fn from_document(doc: &Document) -> Self;
    fn to_fields(&self) -> Fields;

    fn recency(&self) -> Option<Moment> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Training,
    Tournament,
    VodReview,
    Personal,
    Other(String),
}

impl EventKind {
    pub const CHOICES: [&'static str; 4] = ["training", "tournament", "vod-review", "personal"];

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "training" => EventKind::Training,
            "tournament" => EventKind::Tournament,
            "vod-review" => EventKind::VodReview,
            "personal" => EventKind::Personal,
            _ => EventKind::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Training => "training",
            EventKind::Tournament => "tournament",
            EventKind::VodReview => "vod-review",
            EventKind::Personal => "personal",
            EventKind::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub date: String,
    pub kind: EventKind,
    pub created_at: Option<Moment>,
}

pub const SEED_EVENT_ID: &str = "tournament-1";

/// Fixed tournament shown in every mode; never persisted.
pub fn seed_event() -> CalendarEvent {
    CalendarEvent {
        id: SEED_EVENT_ID.to_string(),
        title: "RL 1v1 Cash Cup".to_string(),
        date: "2025-11-17".to_string(),
        kind: EventKind::Tournament,
        created_at: None,
    }
}

impl Record for CalendarEvent {
    const COLLECTION: CollectionId = CollectionId::Events;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_document(doc: &Document) -> Self {
        let f = &doc.fields;
        Self {
            id: doc.id.clone(),
            title: pick_string(f, &["title"]).unwrap_or_default(),
            date: pick_string(f, &["date"]).unwrap_or_default(),
            kind: EventKind::parse(&pick_string(f, &["type", "kind"]).unwrap_or_default()),
            created_at: pick_moment(f, "createdAt"),
        }
    }

    fn to_fields(&self) -> Fields {
        let mut f = Fields::new();
        f.insert("title".into(), Value::from(self.title.clone()));
        f.insert("date".into(), Value::from(self.date.clone()));
        f.insert("type".into(), Value::from(self.kind.as_str()));
        put_moment(&mut f, "createdAt", self.created_at);
        f
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SocialLink {
    pub id: String,
    pub platform: String,
    pub username: String,
    pub created_at: Option<Moment>,
}

impl Record for SocialLink {
    const COLLECTION: CollectionId = CollectionId::SocialLinks;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_document(doc: &Document) -> Self {
        let f = &doc.fields;
        Self {
            id: doc.id.clone(),
            platform: pick_string(f, &["platform"]).unwrap_or_default(),
            username: pick_string(f, &["username"]).unwrap_or_default(),
            created_at: pick_moment(f, "createdAt"),
        }
    }

    fn to_fields(&self) -> Fields {
        let mut f = Fields::new();
        f.insert("platform".into(), Value::from(self.platform.clone()));
        f.insert("username".into(), Value::from(self.username.clone()));
        put_moment(&mut f, "createdAt", self.created_at);
        f
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VodClip {
    pub id: String,
    pub url: String,
    pub embed_url: String,
    pub title: String,
    pub game: String,
    pub notes: String,
    pub created_at: Option<Moment>,
}

impl Record for VodClip {
    const COLLECTION: CollectionId = CollectionId::VodLibrary;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_document(doc: &Document) -> Self {
        let f = &doc.fields;
        Self {
            id: doc.id.clone(),
            url: pick_string(f, &["url"]).unwrap_or_default(),
            embed_url: pick_string(f, &["embedUrl"]).unwrap_or_default(),
            title: pick_string(f, &["title"]).unwrap_or_default(),
            game: pick_string(f, &["game"]).unwrap_or_default(),
            notes: pick_string(f, &["notes"]).unwrap_or_default(),
            created_at: pick_moment(f, "createdAt"),
        }
    }

    fn to_fields(&self) -> Fields {
        let mut f = Fields::new();
        f.insert("url".into(), Value::from(self.url.clone()));
        f.insert("embedUrl".into(), Value::from(self.embed_url.clone()));
        f.insert("title".into(), Value::from(self.title.clone()));
        f.insert("game".into(), Value::from(self.game.clone()));
        f.insert("notes".into(), Value::from(self.notes.clone()));
        put_moment(&mut f, "createdAt", self.created_at);
        f
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNote {
    pub time: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSession {
    pub id: String,
    pub game: String,
    pub mode: String,
    pub wins: u32,
    pub losses: u32,
    pub notes: Vec<SessionNote>,
    pub finished_at: Option<Moment>,
}

impl Record for PerformanceSession {
    const COLLECTION: CollectionId = CollectionId::PerformanceLog;
    const NEWEST_FIRST: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_document(doc: &Document) -> Self {
        let f = &doc.fields;
        let notes = f
            .get("notes")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_object)
                    .map(|note| SessionNote {
                        time: pick_string(note, &["time"]).unwrap_or_default(),
                        text: pick_string(note, &["text"]).unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            id: doc.id.clone(),
            game: pick_string(f, &["game"]).unwrap_or_default(),
            mode: pick_string(f, &["mode"]).unwrap_or_default(),
            wins: pick_u32(f, &["wins"]).unwrap_or(0),
            losses: pick_u32(f, &["losses"]).unwrap_or(0),
            notes,
            finished_at: pick_moment(f, "finishedAt"),
        }
    }

    fn to_fields(&self) -> Fields {
        let mut f = Fields::new();
        f.insert("game".into(), Value::from(self.game.clone()));
        f.insert("mode".into(), Value::from(self.mode.clone()));
        f.insert("wins".into(), Value::from(self.wins));
        f.insert("losses".into(), Value::from(self.losses));
        f.insert("notes".into(), notes_value(&self.notes));
        put_moment(&mut f, "finishedAt", self.finished_at);
        f
    }

    fn recency(&self) -> Option<Moment> {
        self.finished_at
    }
}

pub fn notes_value(notes: &[SessionNote]) -> Value {
    Value::Array(
        notes
            .iter()
            .map(|note| {
                let mut obj = Fields::new();
                obj.insert("time".into(), Value::from(note.time.clone()));
                obj.insert("text".into(), Value::from(note.text.clone()));
                Value::Object(obj)
            })
            .collect(),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerCard {
    pub role: String,
    pub style: String,
    pub availability: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub game_accounts: BTreeMap<String, String>,
    pub player_card: BTreeMap<String, PlayerCard>,
}

impl UserProfile {
    pub fn from_fields(fields: Option<&Fields>) -> Self {
        let Some(fields) = fields else {
            return Self::default();
        };
        let game_accounts = fields
            .get("gameAccounts")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(game, name)| name.as_str().map(|n| (game.clone(), n.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        let player_card = fields
            .get("playerCard")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(game, card)| {
                        let card = card.as_object()?;
                        Some((
                            game.clone(),
                            PlayerCard {
                                role: pick_string(card, &["role"]).unwrap_or_default(),
                                style: pick_string(card, &["style"]).unwrap_or_default(),
                                availability: pick_string(card, &["availability"])
                                    .unwrap_or_default(),
                            },
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            game_accounts,
            player_card,
        }
    }

    pub fn to_fields(&self) -> Fields {
        let accounts: Fields = self
            .game_accounts
            .iter()
            .map(|(game, name)| (game.clone(), Value::from(name.clone())))
            .collect();
        let cards: Fields = self
            .player_card
            .iter()
            .map(|(game, card)| {
                let mut obj = Fields::new();
                obj.insert("role".into(), Value::from(card.role.clone()));
                obj.insert("style".into(), Value::from(card.style.clone()));
                obj.insert("availability".into(), Value::from(card.availability.clone()));
                (game.clone(), Value::Object(obj))
            })
            .collect();
        let mut f = Fields::new();
        f.insert("gameAccounts".into(), Value::Object(accounts));
        f.insert("playerCard".into(), Value::Object(cards));
        f
    }

    pub fn account_for(&self, game_id: &str) -> Option<&str> {
        self.game_accounts
            .get(game_id)
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Game {
    pub id: &'static str,
    pub name: &'static str,
}

pub const GAMES: [Game; 6] = [
    Game { id: "rocketLeague", name: "Rocket League" },
    Game { id: "fortnite", name: "Fortnite" },
    Game { id: "marvelRivals", name: "Marvel Rivals" },
    Game { id: "clashRoyale", name: "Clash Royale" },
    Game { id: "clashOfClans", name: "Clash of Clans" },
    Game { id: "marvelSnap", name: "Marvel Snap" },
];

pub fn game_name(id: &str) -> &'static str {
    GAMES
        .iter()
        .find(|g| g.id == id)
        .map(|g| g.name)
        .unwrap_or("Unknown Game")
}

pub fn pick_string(fields: &Fields, keys: &[&str]) -> Option<String> {
    for key in keys {
        match fields.get(*key) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            Some(Value::Bool(b)) => return Some(b.to_string()),
            _ => {}
        }
    }
    None
}

pub fn pick_u32(fields: &Fields, keys: &[&str]) -> Option<u32> {
    for key in keys {
        match fields.get(*key) {
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_u64() {
                    return u32::try_from(v).ok();
                }
                if let Some(v) = n.as_f64() {
                    if v >= 0.0 {
                        return Some(v as u32);
                    }
                }
            }
            Some(Value::String(s)) => {
                if let Ok(v) = s.trim().parse::<u32>() {
                    return Some(v);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn pick_moment(fields: &Fields, key: &str) -> Option<Moment> {
    fields.get(key).and_then(Moment::from_value)
}

fn put_moment(fields: &mut Fields, key: &str, moment: Option<Moment>) {
    if let Some(m) = moment {
        fields.insert(key.to_string(), Value::from(m.encode()));
    }
}
