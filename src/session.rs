use chrono::{DateTime, Local};
use rand::Rng;
use serde_json::Value;

use crate::entity::{Fields, PerformanceSession, SessionNote, UserProfile, notes_value};

pub const AUTO_TRACK_GAME: &str = "rocketLeague";
pub const AUTO_TRACK_MODE: &str = "Ranked (Auto-Tracked)";

/// An open practice session. Lives in memory only until finished.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSession {
    pub game: String,
    pub mode: String,
    pub wins: u32,
    pub losses: u32,
    pub notes: Vec<SessionNote>,
    pub started_at: DateTime<Local>,
}

impl LiveSession {
    pub fn start(game: impl Into<String>, mode: impl Into<String>, now: DateTime<Local>) -> Self {
        Self {
            game: game.into(),
            mode: mode.into(),
            wins: 0,
            losses: 0,
            notes: Vec::new(),
            started_at: now,
        }
    }

    /// Blank notes are ignored.
    pub fn add_note(&mut self, text: &str, now: DateTime<Local>) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.notes.push(SessionNote {
            time: note_time(now),
            text: text.to_string(),
        });
        true
    }

    pub fn record_win(&mut self) {
        self.wins = self.wins.saturating_add(1);
    }

    pub fn record_loss(&mut self) {
        self.losses = self.losses.saturating_add(1);
    }

    pub fn undo_win(&mut self) {
        self.wins = self.wins.saturating_sub(1);
    }

    pub fn undo_loss(&mut self) {
        self.losses = self.losses.saturating_sub(1);
    }

    /// Fields of the performance entry this session becomes. The completion
    /// moment is stamped by the writer, and the start time is dropped.
    pub fn into_fields(self) -> Fields {
        session_fields(&self.game, &self.mode, self.wins, self.losses, &self.notes)
    }
}

pub fn note_time(now: DateTime<Local>) -> String {
    now.format("%I:%M %p").to_string()
}

fn session_fields(game: &str, mode: &str, wins: u32, losses: u32, notes: &[SessionNote]) -> Fields {
    let mut f = Fields::new();
    f.insert("game".into(), Value::from(game));
    f.insert("mode".into(), Value::from(mode));
    f.insert("wins".into(), Value::from(wins));
    f.insert("losses".into(), Value::from(losses));
    f.insert("notes".into(), notes_value(notes));
    f
}

/// Stand-in for a stats backend: a Rocket League session for the linked account.
/// Returns None when the profile has no Rocket League username.
pub fn simulate_auto_session<R: Rng>(
    profile: &UserProfile,
    rng: &mut R,
    now: DateTime<Local>,
) -> Option<Fields> {
    let username = profile.account_for(AUTO_TRACK_GAME)?;
    let wins = rng.gen_range(3..=7);
    let losses = rng.gen_range(1..=4);
    let notes = vec![SessionNote {
        time: note_time(now),
        text: format!("Auto-tracked session for {username}"),
    }];
    Some(session_fields(
        AUTO_TRACK_GAME,
        AUTO_TRACK_MODE,
        wins,
        losses,
        &notes,
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerStats {
    pub wins: u64,
    pub losses: u64,
    /// Percent, one decimal. Zero when no matches were played.
    pub win_rate: f64,
    /// Per-session win rate, oldest first; sessions without matches are skipped.
    pub series: Vec<(String, f64)>,
}

/// Dashboard figures for one game. `sessions` is expected newest-first.
pub fn tracker_stats(sessions: &[PerformanceSession], game: &str) -> TrackerStats {
    let for_game: Vec<&PerformanceSession> = sessions.iter().filter(|s| s.game == game).collect();
    // Widened so totals across many sessions cannot overflow.
    let wins: u64 = for_game.iter().map(|s| u64::from(s.wins)).sum();
    let losses: u64 = for_game.iter().map(|s| u64::from(s.losses)).sum();
    let total = wins + losses;
    let win_rate = if total > 0 {
        round1(wins as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    let series = for_game
        .iter()
        .rev()
        .enumerate()
        .filter_map(|(idx, s)| {
            let matches = u64::from(s.wins) + u64::from(s.losses);
            if matches == 0 {
                return None;
            }
            Some((
                format!("Session {}", idx + 1),
                f64::from(s.wins) / matches as f64 * 100.0,
            ))
        })
        .collect();

    TrackerStats {
        wins,
        losses,
        win_rate,
        series,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
