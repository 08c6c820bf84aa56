//! Generative-text collaborator (Gemini `generateContent`) and the assistant worker.
//!
//! `generate` never fails: transport errors and empty or blocked responses come
//! back as human-readable strings that the panel shows as-is.

use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::entity::{UserProfile, VodClip, game_name};
use crate::error::{SyncError, SyncResult};
use crate::http_client::http_client;
use crate::state::Delta;

const GENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const NO_CONTENT: &str = "Error: Received no content from API.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantTopic {
    VodFeedback,
    SocialPost,
    TrainingPlan,
    News,
    Meta,
    Tournaments,
    LfgPost,
}

impl AssistantTopic {
    pub fn label(self) -> &'static str {
        match self {
            AssistantTopic::VodFeedback => "VOD Feedback",
            AssistantTopic::SocialPost => "Social Post",
            AssistantTopic::TrainingPlan => "Training Plan",
            AssistantTopic::News => "News",
            AssistantTopic::Meta => "Meta Analysis",
            AssistantTopic::Tournaments => "Tournaments",
            AssistantTopic::LfgPost => "LFG Post",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Ground the answer with web search.
    pub search: bool,
    /// Ask for a JSON response body.
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantRequest {
    pub request_id: u64,
    pub topic: AssistantTopic,
    pub prompt: String,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone)]
pub struct GenAiClient {
    api_key: Option<String>,
    model: String,
}

impl GenAiClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
        }
    }

    pub fn generate(&self, prompt: &str, options: GenerateOptions) -> String {
        match self.request(prompt, options) {
            Ok(body) => extract_reply(&body),
            Err(err) => {
                tracing::warn!(error = %err, "generative text request failed");
                format!("Error: Could not fetch response. {err:#}")
            }
        }
    }

    fn request(&self, prompt: &str, options: GenerateOptions) -> Result<Value> {
        let key = self
            .api_key
            .as_deref()
            .context("GEMINI_API_KEY is not set")?;
        let client = http_client()?;
        let url = format!("{GENAI_BASE_URL}/{}:generateContent", self.model);
        let resp = client
            .post(&url)
            .query(&[("key", key)])
            .json(&build_payload(prompt, options))
            .send()
            .context("request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow::anyhow!("API Error: {status}"));
        }
        serde_json::from_str(&body).context("invalid generateContent json")
    }
}

pub fn build_payload(prompt: &str, options: GenerateOptions) -> Value {
    let mut payload = json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
    });
    if options.search {
        payload["tools"] = json!([{ "google_search": {} }]);
    }
    if options.json {
        payload["generationConfig"] = json!({ "responseMimeType": "application/json" });
    }
    payload
}

/// First candidate's text, the block reason, or the no-content message.
pub fn extract_reply(body: &Value) -> String {
    let text = body
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str);
    if let Some(text) = text {
        return text.to_string();
    }
    if let Some(feedback) = body.get("promptFeedback") {
        let reason = feedback
            .get("blockReason")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        tracing::warn!(reason, "generative text request blocked");
        return format!("The request was blocked due to: {reason}");
    }
    NO_CONTENT.to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TournamentListing {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub url: String,
}

/// Parses a JSON tournament list, tolerating markdown code fences.
pub fn parse_tournaments(reply: &str) -> Result<Vec<TournamentListing>> {
    let cleaned = reply.replace("```json", "").replace("```", "");
    serde_json::from_str(cleaned.trim()).context("could not parse tournament data")
}

pub fn vod_feedback_prompt(clip: &VodClip) -> SyncResult<String> {
    if clip.notes.trim().is_empty() {
        return Err(SyncError::Validation("write some notes for this clip first".to_string()));
    }
    Ok(format!(
        "Act as an expert esports coach. A player is reviewing a VOD clip from {game}.\n\
         The clip is titled: \"{title}\"\n\
         The player's own analysis is:\n\"{notes}\"\n\n\
         Based *only* on the player's notes, provide constructive feedback. What did they observe \
         correctly? What might they be missing? Ask one or two guiding questions to help them think deeper.",
        game = game_name(&clip.game),
        title = clip.title,
        notes = clip.notes,
    ))
}

pub fn social_post_prompt(clip: &VodClip) -> SyncResult<String> {
    if clip.notes.trim().is_empty() {
        return Err(SyncError::Validation("write some notes for this clip first".to_string()));
    }
    Ok(format!(
        "Act as a social media manager for an aspiring pro {game} player.\n\
         The player just analyzed a clip titled \"{title}\" and wrote these notes: \"{notes}\".\n\n\
         Generate an engaging, short Tweet (under 280 chars) that shares a key insight, then a \
         slightly longer YouTube description for the clip. Use \"### Tweet\" and \
         \"### YouTube Description\" as headings.",
        game = game_name(&clip.game),
        title = clip.title,
        notes = clip.notes,
    ))
}

pub fn training_plan_prompt(game_id: &str, goal: &str) -> SyncResult<String> {
    let goal = goal.trim();
    if goal.is_empty() {
        return Err(SyncError::Validation("please enter a goal".to_string()));
    }
    Ok(format!(
        "I am an aspiring pro esports player for {game}. My goal is to \"{goal}\".\n\
         Act as a world-class esports coach. Create a detailed, step-by-step 7-day training plan \
         to help me achieve this specific goal. Use headings for each day.",
        game = game_name(game_id),
    ))
}

/// `None` asks for general esports news.
pub fn news_prompt(game_id: Option<&str>) -> String {
    let subject = game_id.map(game_name).unwrap_or("esports");
    format!(
        "Find the top 3 latest news articles, patch notes, or esports updates for {subject}. \
         For each, provide a title, a short summary, and the source URL."
    )
}

pub fn meta_prompt(game_id: &str) -> String {
    format!(
        "What is the current competitive meta for the game {}? Provide a concise, bulleted \
         summary for an aspiring pro player. Include top strategies, characters, or items if applicable.",
        game_name(game_id)
    )
}

pub fn tournaments_prompt(game_id: &str) -> String {
    format!(
        "Find 3 upcoming, open-registration tournaments for {}.\n\
         For each tournament, provide its name, date, region, and a direct URL to the registration \
         or details page. Provide this as a JSON array of objects with keys \"name\", \"date\", \
         \"region\" and \"url\". If you cannot find any open tournaments, return an empty array [].",
        game_name(game_id)
    )
}

/// Needs a complete player card for the game.
pub fn lfg_prompt(profile: &UserProfile, game_id: &str) -> SyncResult<String> {
    let game = game_name(game_id);
    let card = profile
        .player_card
        .get(game_id)
        .filter(|c| {
            !c.role.trim().is_empty() && !c.style.trim().is_empty() && !c.availability.trim().is_empty()
        })
        .ok_or_else(|| {
            SyncError::Validation(format!("fill out your player card for {game} first"))
        })?;
    let username = profile.account_for(game_id).unwrap_or("MyUsername");
    Ok(format!(
        "Act as an esports team recruiter. I need a \"Looking for Group\" (LFG) post for {game}.\n\
         Base it on my player card:\n\
         - Role: {role}\n- Playstyle: {style}\n- Availability: {availability}\n- My Username: {username}\n\n\
         Draft a clear, professional, and confident post for me to use on Discord or Reddit. \
         Include a call to action.",
        role = card.role,
        style = card.style,
        availability = card.availability,
    ))
}

pub fn topic_options(topic: AssistantTopic) -> GenerateOptions {
    match topic {
        AssistantTopic::News | AssistantTopic::Meta => GenerateOptions {
            search: true,
            json: false,
        },
        AssistantTopic::Tournaments => GenerateOptions {
            search: true,
            json: true,
        },
        _ => GenerateOptions::default(),
    }
}

/// One request at a time, in arrival order; replies go back as deltas.
pub fn spawn_assistant(
    client: GenAiClient,
    rx: Receiver<AssistantRequest>,
    tx: Sender<Delta>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(req) = rx.recv() {
            tracing::debug!(request_id = req.request_id, topic = req.topic.label(), "assistant request");
            let mut text = client.generate(&req.prompt, req.options);
            if req.topic == AssistantTopic::Tournaments && !text.starts_with("Error") {
                text = match parse_tournaments(&text) {
                    Ok(list) if list.is_empty() => {
                        "No open tournaments found at the moment.".to_string()
                    }
                    Ok(list) => list
                        .iter()
                        .map(|t| format!("{}\n  Date: {}\n  Region: {}\n  {}", t.name, t.date, t.region, t.url))
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                    Err(_) => "Error: Could not parse tournament data from the API.".to_string(),
                };
            }
            if tx
                .send(Delta::AssistantReply {
                    request_id: req.request_id,
                    text,
                })
                .is_err()
            {
                break;
            }
        }
    })
}
