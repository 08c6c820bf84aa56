use std::fs::OpenOptions;
use std::io;
use std::sync::{Mutex, mpsc};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Paragraph, Tabs, Wrap};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sensei_hub::calendar::{self, IndicatorColor};
use sensei_hub::config::AppConfig;
use sensei_hub::dispatch::Tab;
use sensei_hub::entity::{GAMES, Moment, PlayerCard, game_name};
use sensei_hub::firestore::FirestoreConnector;
use sensei_hub::form::{Form, FormKind};
use sensei_hub::genai::{self, GenAiClient};
use sensei_hub::hub::SyncHub;
use sensei_hub::session::tracker_stats;
use sensei_hub::state::{AppState, Delta};
use sensei_hub::supervisor::Mode;

struct App {
    hub: SyncHub,
    form: Option<Form>,
    notes_draft: Option<String>,
    selected: usize,
    assistant_game: usize,
    should_quit: bool,
}

impl App {
    fn new(hub: SyncHub) -> Self {
        Self {
            hub,
            form: None,
            notes_draft: None,
            selected: 0,
            assistant_game: 0,
            should_quit: false,
        }
    }

    fn state(&self) -> &AppState {
        self.hub.state()
    }

    fn list_len(&self) -> usize {
        let collections = self.state().collections();
        match self.state().tab {
            Tab::Profile => collections.social_links().len(),
            Tab::Vod => collections.vod_library().len(),
            _ => 0,
        }
    }

    /// Keeps view-local state valid after snapshots shrink lists or unload the clip.
    fn settle_view(&mut self) {
        let len = self.list_len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
        if self.notes_draft.is_some() && self.state().vod_loaded.is_none() {
            self.notes_draft = None;
        }
    }

    fn assistant_game_id(&self) -> &'static str {
        GAMES[self.assistant_game % GAMES.len()].id
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.form.is_some() {
            self.on_form_key(key);
            return;
        }
        if self.notes_draft.is_some() {
            self.on_notes_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char(c @ '1'..='5') => {
                let idx = c as usize - '1' as usize;
                self.hub.navigate(Tab::ALL[idx]);
                self.selected = 0;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if self.selected + 1 < self.list_len() {
                    self.selected += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            _ => match self.state().tab {
                Tab::Calendar => self.on_calendar_key(key),
                Tab::Profile => self.on_profile_key(key),
                Tab::Vod => self.on_vod_key(key),
                Tab::Tracker => self.on_tracker_key(key),
                Tab::Assistant => self.on_assistant_key(key),
            },
        }
    }

    fn on_calendar_key(&mut self, key: KeyEvent) {
        let delta = match key.code {
            KeyCode::Char('a') => {
                let today = Local::now().format("%Y-%m-%d").to_string();
                self.form = Some(Form::new(FormKind::AddEvent).with_value("Date (YYYY-MM-DD)", today));
                return;
            }
            KeyCode::Char('h') | KeyCode::Left => -1,
            KeyCode::Char('l') | KeyCode::Right => 1,
            KeyCode::Char('t') => {
                let today = Local::now().date_naive();
                let state = self.hub.state_mut();
                state.calendar_year = today.year();
                state.calendar_month = today.month();
                return;
            }
            _ => return,
        };
        let state = self.hub.state_mut();
        let (year, month) = calendar::shift_month(state.calendar_year, state.calendar_month, delta);
        state.calendar_year = year;
        state.calendar_month = month;
    }

    fn on_profile_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('a') => self.form = Some(Form::new(FormKind::AddSocialLink)),
            KeyCode::Char('g') => self.form = Some(Form::new(FormKind::GameAccount)),
            KeyCode::Char('c') => self.form = Some(Form::new(FormKind::PlayerCard)),
            KeyCode::Char('x') => {
                let id = self
                    .state()
                    .collections()
                    .social_links()
                    .get_all()
                    .get(self.selected)
                    .map(|l| l.id.clone());
                if let Some(id) = id {
                    let _ = self.hub.unlink_social(&id);
                }
            }
            _ => {}
        }
    }

    fn selected_clip_id(&self) -> Option<String> {
        self.state()
            .collections()
            .vod_library()
            .get_all()
            .get(self.selected)
            .map(|c| c.id.clone())
    }

    fn on_vod_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('a') => self.form = Some(Form::new(FormKind::AddVod)),
            KeyCode::Enter => {
                if let Some(id) = self.selected_clip_id() {
                    let _ = self.hub.load_vod(&id);
                }
            }
            KeyCode::Char('x') => {
                if let Some(id) = self.selected_clip_id() {
                    let _ = self.hub.delete_vod(&id);
                }
            }
            KeyCode::Char('e') => {
                if let Some(clip) = self.state().loaded_clip() {
                    self.notes_draft = Some(clip.notes.clone());
                }
            }
            KeyCode::Char('f') => {
                if self.hub.ask_vod_feedback().is_ok() {
                    self.hub.navigate(Tab::Assistant);
                }
            }
            KeyCode::Char('p') => {
                if self.hub.ask_social_post().is_ok() {
                    self.hub.navigate(Tab::Assistant);
                }
            }
            _ => {}
        }
    }

    fn on_notes_key(&mut self, key: KeyEvent) {
        let Some(draft) = self.notes_draft.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.notes_draft = None;
                return;
            }
            KeyCode::Enter => draft.push('\n'),
            KeyCode::Backspace => {
                draft.pop();
            }
            KeyCode::Char(c) => draft.push(c),
            _ => return,
        }
        let value = draft.clone();
        self.hub.edit_vod_notes(value, Instant::now());
    }

    fn on_tracker_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('s') => self.form = Some(Form::new(FormKind::StartSession)),
            KeyCode::Char('n') if self.state().live_session.is_some() => {
                self.form = Some(Form::new(FormKind::QuickNote));
            }
            KeyCode::Char('w') => self.hub.record_win(),
            KeyCode::Char('l') => self.hub.record_loss(),
            KeyCode::Char('W') => self.hub.undo_win(),
            KeyCode::Char('L') => self.hub.undo_loss(),
            KeyCode::Char('f') => {
                let _ = self.hub.finish_session();
            }
            KeyCode::Char('d') => self.hub.discard_session(),
            KeyCode::Char('a') => {
                let _ = self.hub.simulate_auto_session();
            }
            KeyCode::Char('g') => {
                let state = self.hub.state_mut();
                let idx = GAMES
                    .iter()
                    .position(|g| g.id == state.tracker_game)
                    .map(|i| (i + 1) % GAMES.len())
                    .unwrap_or(0);
                state.tracker_game = GAMES[idx].id.to_string();
            }
            _ => {}
        }
    }

    fn on_assistant_key(&mut self, key: KeyEvent) {
        let game = self.assistant_game_id();
        let _ = match key.code {
            KeyCode::Char('g') => {
                self.assistant_game = (self.assistant_game + 1) % GAMES.len();
                return;
            }
            KeyCode::Char('t') => {
                self.form = Some(Form::new(FormKind::TrainingPlan));
                return;
            }
            KeyCode::Char('n') => self.hub.ask_news(Some(game)),
            KeyCode::Char('N') => self.hub.ask_news(None),
            KeyCode::Char('m') => self.hub.ask_meta(game),
            KeyCode::Char('r') => self.hub.ask_tournaments(game),
            KeyCode::Char('l') => self.hub.ask_lfg(game),
            _ => return,
        };
    }

    fn on_form_key(&mut self, key: KeyEvent) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.form = None,
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left => form.cycle(-1),
            KeyCode::Right => form.cycle(1),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(c) => form.input(c),
            KeyCode::Enter => {
                let form = form.clone();
                if self.submit(&form) {
                    self.form = None;
                }
            }
            _ => {}
        }
    }

    /// True when the form can close. Failures are already on the console.
    fn submit(&mut self, form: &Form) -> bool {
        let v = |idx| form.value(idx);
        match form.kind {
            FormKind::AddEvent => self.hub.add_event(v(0), v(1), v(2)).is_ok(),
            FormKind::AddSocialLink => self.hub.add_social_link(v(0), v(1)).is_ok(),
            FormKind::GameAccount => self.hub.set_game_account(v(0), v(1)).is_ok(),
            FormKind::PlayerCard => {
                let card = PlayerCard {
                    role: v(1).trim().to_string(),
                    style: v(2).trim().to_string(),
                    availability: v(3).trim().to_string(),
                };
                self.hub.set_player_card(v(0), card).is_ok()
            }
            FormKind::AddVod => self.hub.add_vod(v(0), v(1), v(2)).is_ok(),
            FormKind::StartSession => self.hub.start_session(v(0), v(1)).is_ok(),
            FormKind::QuickNote => {
                self.hub.add_quick_note(v(0));
                true
            }
            FormKind::TrainingPlan => self.hub.ask_training_plan(v(0), v(1)).is_ok(),
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = AppConfig::from_env();
    init_tracing(&config)?;

    let (tx, rx) = mpsc::channel();
    let mut hub = SyncHub::new(tx.clone());

    // Resolved before the terminal loop starts; nothing reads state until then.
    let connector = FirestoreConnector::new(config.app_id.clone(), config.poll_interval);
    let resolution = hub.start(&connector, &config);
    tracing::info!(mode = ?resolution.mode, generation = resolution.generation, "mode resolved");

    let (ask_tx, ask_rx) = mpsc::channel();
    genai::spawn_assistant(
        GenAiClient::new(config.genai_api_key.clone(), config.genai_model.clone()),
        ask_rx,
        tx,
    );
    hub.attach_assistant(ask_tx);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(hub);
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err:#}");
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("cannot open log file {}", config.log_file.display()))?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensei_hub=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    app.hub.state_mut().refresh.request_full();

    loop {
        app.hub.drain(&rx);
        app.hub.tick(Instant::now());
        app.settle_view();

        if app.hub.take_redraw() {
            terminal.draw(|f| ui(f, app))?;
        }

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.on_key(key),
                Event::Resize(..) => {}
                _ => continue,
            }
            // Input changes view-local state the dispatcher does not track.
            app.hub.state_mut().refresh.request_full();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let state = app.state();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    render_header(frame, chunks[0], state);
    match state.tab {
        Tab::Calendar => render_calendar(frame, chunks[1], state),
        Tab::Profile => render_profile(frame, chunks[1], app),
        Tab::Vod => render_vod(frame, chunks[1], app),
        Tab::Tracker => render_tracker(frame, chunks[1], state),
        Tab::Assistant => render_assistant(frame, chunks[1], app),
    }

    let console = Paragraph::new(console_text(state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(app)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    if let Some(form) = app.form.as_ref() {
        render_form(frame, frame.size(), form);
    }
}

fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(32)])
        .split(area);

    let titles: Vec<String> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{} {}", i + 1, t.label()))
        .collect();
    let selected = Tab::ALL.iter().position(|t| *t == state.tab).unwrap_or(0);
    let tabs = Tabs::new(titles)
        .block(Block::default().title("SENSEI HUB").borders(Borders::ALL))
        .select(selected)
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, cols[0]);

    let color = match state.mode {
        Mode::Live => Color::Green,
        Mode::Demo => Color::Yellow,
    };
    let status = Paragraph::new(state.status_label())
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, cols[1]);
}

fn indicator_style(color: IndicatorColor) -> Style {
    let fg = match color {
        IndicatorColor::Blue => Color::Blue,
        IndicatorColor::Red => Color::Red,
        IndicatorColor::Green => Color::Green,
        IndicatorColor::Yellow => Color::Yellow,
        IndicatorColor::Gray => Color::Gray,
    };
    Style::default().fg(fg)
}

fn render_calendar(frame: &mut Frame, area: Rect, state: &AppState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(44), Constraint::Min(20)])
        .split(area);

    let events = state.collections().events().get_all();
    let month = calendar::build_month(state.calendar_year, state.calendar_month, events);
    let today = Local::now().format("%Y-%m-%d").to_string();

    let header: String = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"]
        .iter()
        .map(|d| format!(" {d}   "))
        .collect();
    let mut lines = vec![Line::from(header)];
    let mut week: Vec<Span> = Vec::new();
    for _ in 0..month.leading_blanks {
        week.push(Span::raw("      "));
    }
    for day in &month.days {
        let style = if day.date == today {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        week.push(Span::styled(format!(" {:>2}", day.day), style));
        for color in &day.indicators {
            week.push(Span::styled("•", indicator_style(*color)));
        }
        week.push(Span::raw(" ".repeat(3 - day.indicators.len())));
        if (month.leading_blanks + day.day) % 7 == 0 {
            lines.push(Line::from(std::mem::take(&mut week)));
        }
    }
    if !week.is_empty() {
        lines.push(Line::from(week));
    }

    let grid = Paragraph::new(lines).block(
        Block::default()
            .title(format!("{}  (h/l month, t today)", month.title()))
            .borders(Borders::ALL),
    );
    frame.render_widget(grid, cols[0]);

    let prefix = format!("{}-{:02}-", month.year, month.month);
    let mut on_month: Vec<_> = events.iter().filter(|e| e.date.starts_with(&prefix)).collect();
    on_month.sort_by(|a, b| a.date.cmp(&b.date));
    let list: Vec<Line> = if on_month.is_empty() {
        vec![Line::styled("No events this month", Style::default().fg(Color::DarkGray))]
    } else {
        on_month
            .iter()
            .map(|e| {
                Line::from(vec![
                    Span::styled("• ", indicator_style(calendar::indicator_color(&e.kind))),
                    Span::raw(format!("{} [{}] {}", e.date, e.kind.as_str(), e.title)),
                ])
            })
            .collect()
    };
    let panel = Paragraph::new(list).block(Block::default().title("Events").borders(Borders::ALL));
    frame.render_widget(panel, cols[1]);
}

fn selectable(text: String, selected: bool) -> Line<'static> {
    if selected {
        Line::styled(text, Style::default().fg(Color::White).bg(Color::DarkGray))
    } else {
        Line::raw(text)
    }
}

fn render_profile(frame: &mut Frame, area: Rect, app: &App) {
    let state = app.state();
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let profile = state.collections().profile();
    let mut lines = Vec::new();
    for game in GAMES {
        let account = profile.account_for(game.id).unwrap_or("not linked");
        lines.push(Line::from(vec![
            Span::styled(format!("{:<16}", game.name), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(account.to_string()),
        ]));
        if let Some(card) = profile.player_card.get(game.id) {
            lines.push(Line::styled(
                format!(
                    "  role: {}  style: {}  availability: {}",
                    card.role, card.style, card.availability
                ),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }
    let accounts = Paragraph::new(lines)
        .block(Block::default().title("Game Accounts (g edit, c card)").borders(Borders::ALL));
    frame.render_widget(accounts, cols[0]);

    let links = state.collections().social_links().get_all();
    let lines: Vec<Line> = if links.is_empty() {
        vec![Line::styled("No social accounts linked", Style::default().fg(Color::DarkGray))]
    } else {
        links
            .iter()
            .enumerate()
            .map(|(i, l)| selectable(format!("{}: {}", l.platform, l.username), i == app.selected))
            .collect()
    };
    let panel = Paragraph::new(lines)
        .block(Block::default().title("Social Links (a add, x unlink)").borders(Borders::ALL));
    frame.render_widget(panel, cols[1]);
}

fn render_vod(frame: &mut Frame, area: Rect, app: &App) {
    let state = app.state();
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let clips = state.collections().vod_library().get_all();
    let lines: Vec<Line> = if clips.is_empty() {
        vec![Line::styled(
            "Your VOD library is empty. Press a to add a clip.",
            Style::default().fg(Color::DarkGray),
        )]
    } else {
        clips
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let marker = if state.vod_loaded.as_deref() == Some(c.id.as_str()) { ">" } else { " " };
                selectable(format!("{marker} {} ({})", c.title, game_name(&c.game)), i == app.selected)
            })
            .collect()
    };
    let list = Paragraph::new(lines)
        .block(Block::default().title("Library (Enter load, x delete)").borders(Borders::ALL));
    frame.render_widget(list, cols[0]);

    let body = match state.loaded_clip() {
        None => Text::from("Load a clip from the library to review it."),
        Some(clip) => {
            let notes = app.notes_draft.as_deref().unwrap_or(&clip.notes);
            let indicator = state.notes.indicator(Instant::now());
            let hint = if app.notes_draft.is_some() { "editing, Esc to stop" } else { "e to edit" };
            let mut lines = vec![
                Line::styled(clip.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
                Line::raw(format!("{}  {}", game_name(&clip.game), clip.embed_url)),
                Line::raw(""),
                Line::styled(format!("Notes ({hint})"), Style::default().fg(Color::Cyan)),
            ];
            lines.extend(notes.lines().map(|l| Line::raw(l.to_string())));
            lines.push(Line::raw(""));
            lines.push(Line::styled(indicator, Style::default().fg(Color::DarkGray)));
            Text::from(lines)
        }
    };
    let reviewer = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .block(Block::default().title("Review Station (f feedback, p post)").borders(Borders::ALL));
    frame.render_widget(reviewer, cols[1]);
}

fn short_moment(moment: Option<Moment>) -> String {
    let encoded = moment.unwrap_or(Moment::ZERO).encode();
    encoded.get(..16).unwrap_or(&encoded).replace('T', " ")
}

fn render_tracker(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(6)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    let session = match state.live_session.as_ref() {
        None => Text::from("No session running. Press s to start one, a to auto-track."),
        Some(s) => {
            let mut lines = vec![
                Line::styled(
                    format!("{} - {}", game_name(&s.game), s.mode),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Line::raw(format!("W {}  L {}", s.wins, s.losses)),
            ];
            lines.extend(
                s.notes
                    .iter()
                    .rev()
                    .take(4)
                    .map(|n| Line::raw(format!("{} {}", n.time, n.text))),
            );
            Text::from(lines)
        }
    };
    frame.render_widget(
        Paragraph::new(session)
            .block(Block::default().title("Live Session (w/l, n note, f finish)").borders(Borders::ALL)),
        top[0],
    );

    let sessions = state.collections().performance_log().get_all();
    let stats = tracker_stats(sessions, &state.tracker_game);
    let summary = vec![
        Line::raw(format!("Wins: {}", stats.wins)),
        Line::raw(format!("Losses: {}", stats.losses)),
        Line::raw(format!("Win rate: {:.1}%", stats.win_rate)),
    ];
    frame.render_widget(
        Paragraph::new(summary).block(
            Block::default()
                .title(format!("{} (g game)", game_name(&state.tracker_game)))
                .borders(Borders::ALL),
        ),
        top[1],
    );

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    let bars: Vec<Bar> = stats
        .series
        .iter()
        .map(|(label, rate)| {
            Bar::default()
                .value(rate.round() as u64)
                .label(Line::from(label.trim_start_matches("Session ").to_string()))
                .text_value(format!("{rate:.0}"))
        })
        .collect();
    let chart = BarChart::default()
        .block(Block::default().title("Win rate per session").borders(Borders::ALL))
        .bar_width(4)
        .bar_gap(1)
        .max(100)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, bottom[0]);

    let history: Vec<Line> = sessions
        .iter()
        .map(|s| {
            Line::raw(format!(
                "{}  {} {}  {}-{}",
                short_moment(s.finished_at),
                game_name(&s.game),
                s.mode,
                s.wins,
                s.losses
            ))
        })
        .collect();
    frame.render_widget(
        Paragraph::new(history).block(Block::default().title("History").borders(Borders::ALL)),
        bottom[1],
    );
}

fn render_assistant(frame: &mut Frame, area: Rect, app: &App) {
    let panel = &app.state().assistant;
    let topic = panel.topic.map(|t| t.label()).unwrap_or("Assistant");
    let status = if panel.pending.is_some() { " (working)" } else { "" };
    let title = format!("{topic}{status}  game: {}", game_name(app.assistant_game_id()));
    let text = if panel.text.is_empty() {
        "t training plan, n news, N esports news, m meta, r tournaments, l LFG post, g game"
            .to_string()
    } else {
        panel.text.clone()
    };
    let body = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(body, area);
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    let skip = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(skip)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn footer_text(app: &App) -> String {
    if app.form.is_some() {
        return "Tab/↑/↓ Field | ←/→ Choose | Enter Save | Esc Cancel".to_string();
    }
    if app.notes_draft.is_some() {
        return "Typing notes, saved automatically | Esc Done".to_string();
    }
    let tab = match app.state().tab {
        Tab::Calendar => "a Add | h/l Month | t Today",
        Tab::Profile => "a Link | x Unlink | g Account | c Card | j/k Move",
        Tab::Vod => "a Add | Enter Load | x Delete | e Notes | f Feedback | p Post | j/k Move",
        Tab::Tracker => "s Start | w/l Win/Loss | W/L Undo | n Note | f Finish | d Discard | a Auto | g Game",
        Tab::Assistant => "t Plan | n News | m Meta | r Tournaments | l LFG | g Game",
    };
    format!("1-5 Tabs | {tab} | q Quit")
}

fn render_form(frame: &mut Frame, area: Rect, form: &Form) {
    let popup_area = centered_rect(60, 40, area);
    frame.render_widget(Clear, popup_area);

    let lines: Vec<Line> = form
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let value = match field.choices {
                Some(_) => format!("< {} >", field.value),
                None => format!("{}_", field.value),
            };
            let style = if i == form.focus {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::styled(format!("{:<20} {value}", field.label), style)
        })
        .collect();
    let popup = Paragraph::new(lines)
        .block(Block::default().title(form.title()).borders(Borders::ALL));
    frame.render_widget(popup, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
