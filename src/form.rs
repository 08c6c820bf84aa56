//! Small modal input forms for the terminal UI.

use crate::entity::{EventKind, GAMES};

pub const PLATFORMS: [&str; 5] = ["Twitch", "YouTube", "X / Twitter", "Discord", "TikTok"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    AddEvent,
    AddSocialLink,
    GameAccount,
    PlayerCard,
    AddVod,
    StartSession,
    QuickNote,
    TrainingPlan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub label: &'static str,
    pub value: String,
    /// Fixed options cycled with left/right instead of typed.
    pub choices: Option<Vec<String>>,
}

impl FormField {
    fn text(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
            choices: None,
        }
    }

    fn choice(label: &'static str, choices: Vec<String>) -> Self {
        Self {
            label,
            value: choices.first().cloned().unwrap_or_default(),
            choices: Some(choices),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub kind: FormKind,
    pub fields: Vec<FormField>,
    pub focus: usize,
}

fn game_ids() -> Vec<String> {
    GAMES.iter().map(|g| g.id.to_string()).collect()
}

impl Form {
    pub fn new(kind: FormKind) -> Self {
        let fields = match kind {
            FormKind::AddEvent => vec![
                FormField::text("Title", ""),
                FormField::text("Date (YYYY-MM-DD)", ""),
                FormField::choice(
                    "Type",
                    EventKind::CHOICES.iter().map(|c| c.to_string()).collect(),
                ),
            ],
            FormKind::AddSocialLink => vec![
                FormField::choice("Platform", PLATFORMS.iter().map(|p| p.to_string()).collect()),
                FormField::text("Username", ""),
            ],
            FormKind::GameAccount => vec![
                FormField::choice("Game", game_ids()),
                FormField::text("Username", ""),
            ],
            FormKind::PlayerCard => vec![
                FormField::choice("Game", game_ids()),
                FormField::text("Role", ""),
                FormField::text("Playstyle", ""),
                FormField::text("Availability", ""),
            ],
            FormKind::AddVod => vec![
                FormField::text("YouTube URL", ""),
                FormField::text("Title", ""),
                FormField::choice("Game", game_ids()),
            ],
            FormKind::StartSession => vec![
                FormField::choice("Game", game_ids()),
                FormField::text("Mode", "Ranked"),
            ],
            FormKind::QuickNote => vec![FormField::text("Note", "")],
            FormKind::TrainingPlan => vec![
                FormField::choice("Game", game_ids()),
                FormField::text("Goal", ""),
            ],
        };
        Self {
            kind,
            fields,
            focus: 0,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            FormKind::AddEvent => "Add Event",
            FormKind::AddSocialLink => "Link Social Account",
            FormKind::GameAccount => "Game Account",
            FormKind::PlayerCard => "Player Card",
            FormKind::AddVod => "Add Clip",
            FormKind::StartSession => "Start Session",
            FormKind::QuickNote => "Quick Note",
            FormKind::TrainingPlan => "Training Plan",
        }
    }

    /// Prefill a text field by label.
    pub fn with_value(mut self, label: &str, value: impl Into<String>) -> Self {
        if let Some(field) = self.fields.iter_mut().find(|f| f.label == label) {
            field.value = value.into();
        }
        self
    }

    pub fn value(&self, idx: usize) -> &str {
        self.fields.get(idx).map(|f| f.value.as_str()).unwrap_or("")
    }

    pub fn input(&mut self, c: char) {
        if let Some(field) = self.fields.get_mut(self.focus)
            && field.choices.is_none()
        {
            field.value.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focus)
            && field.choices.is_none()
        {
            field.value.pop();
        }
    }

    pub fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn prev_field(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }

    /// Step through a choice field's options; no-op on text fields.
    pub fn cycle(&mut self, step: isize) {
        let Some(field) = self.fields.get_mut(self.focus) else {
            return;
        };
        let Some(choices) = field.choices.as_ref() else {
            return;
        };
        if choices.is_empty() {
            return;
        }
        let len = choices.len() as isize;
        let current = choices.iter().position(|c| *c == field.value).unwrap_or(0) as isize;
        let next = (current + step).rem_euclid(len) as usize;
        field.value = choices[next].clone();
    }
}
