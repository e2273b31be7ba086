//! Deterministic doubles for the external capabilities.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ai::embedding::Embedder;
use crate::ai::provider::{CompletionProvider, LlmResponse, TextResponse};
use crate::market::{
    FitAggregator, FitScorer, RatedResponse, RespondentRatings, ScoredResponses,
};
use crate::ssr::Pmf;
use crate::types::{ErrorCategory, LlmError, MarketError, PersonaResponse, Result};
use crate::workflow::{ProgressEvent, ProgressObserver};

const DIMS: usize = 256;

fn fnv1a(bytes: impl IntoIterator<Item = u8>) -> u64 {
    bytes.into_iter().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Bag-of-words embedder: each lowercase word lights two hashed dimensions
pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; DIMS];
        let lower = text.to_lowercase();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let a = fnv1a(word.bytes()) as usize % DIMS;
            let b = fnv1a(word.bytes().chain(*b"#")) as usize % DIMS;
            v[a] += 1.0;
            v[b] += 1.0;
        }
        Ok(v)
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(LlmError::with_provider(ErrorCategory::Unavailable, "embedding down", "test").into())
    }
}

/// A response with text on every dimension
pub fn response(name: &str) -> PersonaResponse {
    PersonaResponse {
        persona_name: name.to_string(),
        interest_response: "I am somewhat curious about this product".into(),
        purchase_intent_response: "I would consider paying for it".into(),
        disappointment_response: "I would miss it somewhat".into(),
        recommendation_response: "I might mention it if someone asked".into(),
        main_benefit: "Saves time".into(),
        concerns: vec!["Price".into()],
    }
}

/// A raw persona record as a provider would return it
pub fn persona_record(name: &str, age: u8) -> Value {
    json!({
        "name": name,
        "age": age,
        "occupation": "Engineer",
        "income_bracket": "middle",
        "location_type": "urban",
        "tech_savviness": 3,
        "values": ["Efficiency", "Family"],
        "pain_points": ["No time", "Too many apps"],
        "personality_traits": "Curious, pragmatic",
        "shopping_behavior": "Researches before buying"
    })
}

pub fn concept_record(name: &str) -> Value {
    json!({
        "name": name,
        "tagline": "Less hassle",
        "target_market": "Busy parents",
        "problem_solved": "Meal planning takes too long",
        "features": ["Weekly plans", "Shopping lists"],
        "differentiators": ["Learns preferences"],
        "pricing_model": "$9/month"
    })
}

pub fn response_record(name: &str) -> Value {
    serde_json::to_value(response(name)).unwrap_or(Value::Null)
}

pub fn critic_record() -> Value {
    json!({
        "strengths_to_amplify": ["Clear value"],
        "critical_gaps": ["Pricing unclear"],
        "refinements": {"pricing": ["Offer a free tier"]},
        "strategic_direction": "Focus on busy parents"
    })
}

type Handler = Box<dyn Fn(&str) -> Result<Value> + Send + Sync>;
type TextHandler = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Provider that answers by schema title with scripted handlers
#[derive(Default)]
pub struct ScriptedProvider {
    handlers: HashMap<String, Handler>,
    text: Option<TextHandler>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, title: &str, handler: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(title.to_string(), Box::new(handler));
        self
    }

    pub fn on_text<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        self.text = Some(Box::new(handler));
        self
    }

    pub fn calls(&self, title: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.get(title).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn count(&self, title: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(title.to_string()).or_default() += 1;
        }
    }
}

pub fn unscripted(what: &str) -> MarketError {
    LlmError::with_provider(ErrorCategory::BadRequest, format!("no script for {}", what), "scripted")
        .into()
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        let title = schema["title"].as_str().unwrap_or_default();
        self.count(title);
        let handler = self.handlers.get(title).ok_or_else(|| unscripted(title))?;
        handler(prompt).map(LlmResponse::content_only)
    }

    async fn complete_text(&self, prompt: &str) -> Result<TextResponse> {
        self.count("text");
        let handler = self.text.as_ref().ok_or_else(|| unscripted("text"))?;
        handler(prompt).map(TextResponse::text_only)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Scorer returning a fixed fit sequence; the last value repeats
pub struct ScriptedFitScorer {
    fits: Vec<f64>,
    calls: AtomicUsize,
}

impl ScriptedFitScorer {
    pub fn new(fits: Vec<f64>) -> Self {
        Self {
            fits,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FitScorer for ScriptedFitScorer {
    async fn score(&self, responses: Vec<PersonaResponse>) -> Result<ScoredResponses> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let rated: Vec<RatedResponse> = responses
            .into_iter()
            .map(|response| RatedResponse {
                response,
                ratings: RespondentRatings::uniform_across(Pmf::uniform()),
            })
            .collect();
        let mut score = FitAggregator::aggregate(&rated, 0)?;
        score.fit_score = self
            .fits
            .get(n)
            .or(self.fits.last())
            .copied()
            .unwrap_or_default();
        Ok(ScoredResponses { score, rated })
    }
}

/// Observer that keeps every event
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressObserver for RecordingObserver {
    fn notify(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
