//! Gentle suggestions for companion mode.
//!
//! Output is templated, never analytical. The template is picked from a
//! SHA-256 of the context so the same context always yields the same text.

use crate::core::error::ModewardError;
use clap::Parser;
use sha2::{Digest, Sha256};

pub const FALLBACK: &str = "Take things one step at a time; you're doing well.";

const TOPIC_WORDS: usize = 4;

const TEMPLATES: [&str; 6] = [
    "You might find it helpful to take a moment with {topic}.",
    "When you're ready, revisiting {topic} could be worthwhile.",
    "It's okay to approach {topic} at your own pace.",
    "One small step with {topic} might open things up a bit.",
    "There's no rush; exploring {topic} when the time feels right is perfectly fine.",
    "I wonder if returning to {topic} with fresh eyes might feel different now.",
];

/// Short contexts are used whole; longer ones contribute their last four
/// words with trailing punctuation stripped.
pub fn extract_topic(context: &str) -> String {
    let words: Vec<&str> = context.split_whitespace().collect();
    if words.len() <= TOPIC_WORDS {
        return context.to_string();
    }
    words[words.len() - TOPIC_WORDS..]
        .join(" ")
        .trim_end_matches(['.', ',', ';', ':', '!', '?'])
        .to_string()
}

fn template_for(context: &str) -> &'static str {
    let digest = Sha256::digest(context.as_bytes());
    TEMPLATES[digest[0] as usize % TEMPLATES.len()]
}

pub fn suggest(context: &str) -> String {
    let context = context.trim();
    if context.is_empty() {
        return FALLBACK.to_string();
    }
    template_for(context).replace("{topic}", &extract_topic(context))
}

#[derive(Parser, Debug)]
#[clap(name = "suggest", about = "Offer a low-stakes suggestion (companion mode only)")]
pub struct SuggestCli {
    /// Conversational context.
    #[clap(default_value = "")]
    pub context: String,
}

pub fn run_suggest_cli(cli: SuggestCli) -> Result<(), ModewardError> {
    println!("{}", suggest(&cli.context));
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "suggest",
        "version": "0.3.0",
        "description": "Deterministic templated suggestions (companion mode only)",
        "commands": [
            { "name": "suggest", "parameters": ["context"] }
        ],
        "storage": []
    })
}
