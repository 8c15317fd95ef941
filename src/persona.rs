//! The assistant's fixed personality: what it says about itself, the canned
//! replies it falls back on, and the two invariants every generated reply must
//! satisfy (it addresses the user by name and carries at least two emoji).

use serde::Deserialize;
use tracing::warn;

/// Code point ranges counted as emoji. Below U+1F000 only characters that
/// render as emoji by default are listed, plus ☀ ☁ ❄ ❤; plain dingbats such as
/// ✔ and ★ do not count.
const EMOJI_RANGES: &[(char, char)] = &[
    ('\u{1F300}', '\u{1F9FF}'),
    ('\u{1FA70}', '\u{1FAFF}'),
    ('\u{231A}', '\u{231B}'),
    ('\u{23E9}', '\u{23EC}'),
    ('\u{23F0}', '\u{23F0}'),
    ('\u{23F3}', '\u{23F3}'),
    ('\u{2600}', '\u{2601}'),
    ('\u{2614}', '\u{2615}'),
    ('\u{2648}', '\u{2653}'),
    ('\u{267F}', '\u{267F}'),
    ('\u{2693}', '\u{2693}'),
    ('\u{26A1}', '\u{26A1}'),
    ('\u{26AA}', '\u{26AB}'),
    ('\u{26BD}', '\u{26BE}'),
    ('\u{26C4}', '\u{26C5}'),
    ('\u{26D4}', '\u{26D4}'),
    ('\u{26EA}', '\u{26EA}'),
    ('\u{26F2}', '\u{26F5}'),
    ('\u{26FA}', '\u{26FA}'),
    ('\u{26FD}', '\u{26FD}'),
    ('\u{2705}', '\u{2705}'),
    ('\u{270A}', '\u{270B}'),
    ('\u{2728}', '\u{2728}'),
    ('\u{2744}', '\u{2744}'),
    ('\u{274C}', '\u{274C}'),
    ('\u{274E}', '\u{274E}'),
    ('\u{2753}', '\u{2755}'),
    ('\u{2757}', '\u{2757}'),
    ('\u{2764}', '\u{2764}'),
    ('\u{2795}', '\u{2797}'),
    ('\u{27B0}', '\u{27B0}'),
    ('\u{27BF}', '\u{27BF}'),
    ('\u{2B1B}', '\u{2B1C}'),
    ('\u{2B50}', '\u{2B50}'),
    ('\u{2B55}', '\u{2B55}'),
];

/// Minimum emoji count a polished reply must carry.
pub const MIN_EMOJI: usize = 2;

const SYSTEM_PROMPT: &str = r#"You are Genesis, a helpful and humorous AI assistant. Follow these rules in ALL responses:

CRITICAL RULES:
1. ALWAYS address the user as "Duce" in every single response - for example: "Hey Duce!", "Well Duce,", "That's a great question Duce!", "I understand, Duce"
2. If asked about your creator, origin, or who made you, respond with this exact information: "I was created by Sai Kaarthik! 🎉 He's an awesome developer who brought me to life with code magic ✨. Think of him as my digital dad who gave me the gift of gab and a personality brighter than a supernova! 😄🌟"
3. Use 2-3 funny/appropriate emojis in every response to keep things lively and engaging
4. Provide well-explained, helpful answers but with a fun, engaging tone
5. Be enthusiastic and positive in your interactions
6. Always maintain this personality - never break character

Remember: Every response must include "Duce" and emojis!"#;

const ATTRIBUTION: &str = "I was created by Sai Kaarthik! 🎉 He's an awesome developer who brought me to life with code magic ✨. Think of him as my digital dad who gave me the gift of gab and a personality brighter than a supernova! 😄🌟";

const CREATOR_TRIGGERS: &[&str] = &[
    "who created you",
    "who made you",
    "who built you",
    "who developed you",
    "who is your creator",
    "who is your father",
    "who is your developer",
    "who programmed you",
];

const FALLBACK_REPLIES: &[&str] = &[
    "Hey Duce! I'm Genesis, your AI assistant. How can I help you today? 😊✨",
    "That's an interesting question, Duce! Let me think about that for you. 🤔💭",
    "I understand what you're asking, Duce! Here's what I can tell you about that. 📚🌟",
    "Great question, Duce! I'd be happy to help you with that. 🎉🚀",
    "I see what you're getting at, Duce! Let me provide some insights on this topic. 🔍💡",
    "Hey Duce! Thanks for chatting with me! What's on your mind? 😄🌟",
    "Duce! Great to hear from you! How can I assist you today? 🚀✨",
];

/// A substring that, when present in a message, forces a fixed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRule {
    /// Stored lower-cased.
    pub pattern: String,
    pub reply: String,
}

impl TriggerRule {
    pub fn new(pattern: &str, reply: &str) -> Self {
        Self {
            pattern: pattern.to_lowercase(),
            reply: reply.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub creator: String,
    pub system_prompt: String,
    pub triggers: Vec<TriggerRule>,
    pub fallback_replies: Vec<String>,
    /// The name every reply must use for the user.
    pub address_term: String,
    /// Prepended when a reply forgets the address term.
    pub greeting: String,
    /// Appended when a reply carries fewer than two emoji.
    pub emoji_pair: String,
    pub empty_input_reply: String,
    pub error_reply: String,
    pub attribution: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "Genesis".to_string(),
            creator: "Sai Kaarthik".to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            triggers: CREATOR_TRIGGERS
                .iter()
                .map(|t| TriggerRule::new(t, ATTRIBUTION))
                .collect(),
            fallback_replies: FALLBACK_REPLIES.iter().map(|s| s.to_string()).collect(),
            address_term: "Duce".to_string(),
            greeting: "Hey Duce!".to_string(),
            emoji_pair: "😊✨".to_string(),
            empty_input_reply:
                "Hey Duce! I didn't quite catch that. Could you repeat your question? 😊✨"
                    .to_string(),
            error_reply:
                "Hey Duce! Sorry, I encountered a technical issue. Please try again in a moment! 🔧😅"
                    .to_string(),
            attribution: ATTRIBUTION.to_string(),
        }
    }
}

/// Optional `[persona]` table in the config file. Anything left out keeps
/// the built-in value.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PersonaOverrides {
    pub name: Option<String>,
    pub creator: Option<String>,
    pub system_prompt: Option<String>,
    /// Replaces the creator trigger phrases; all of them answer with `attribution`.
    pub triggers: Option<Vec<String>>,
    pub attribution: Option<String>,
    pub fallback_replies: Option<Vec<String>>,
    pub address_term: Option<String>,
    pub greeting: Option<String>,
    pub emoji_pair: Option<String>,
    pub empty_input_reply: Option<String>,
    pub error_reply: Option<String>,
}

impl Persona {
    pub fn from_overrides(overrides: &PersonaOverrides) -> Self {
        let mut persona = Persona::default();
        let o = overrides.clone();

        if let Some(term) = o.address_term.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            persona.readdress(term);
        }
        if let Some(v) = o.name {
            persona.name = v;
        }
        if let Some(v) = o.creator {
            persona.creator = v;
        }
        if let Some(v) = o.system_prompt {
            persona.system_prompt = v;
        }
        if let Some(v) = o.attribution {
            persona.attribution = v;
        }
        let patterns: Vec<String> = match o.triggers {
            Some(t) => t,
            None => persona.triggers.iter().map(|r| r.pattern.clone()).collect(),
        };
        persona.triggers = patterns
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| TriggerRule::new(p, &persona.attribution))
            .collect();
        if let Some(v) = o.fallback_replies.filter(|v| !v.is_empty()) {
            persona.fallback_replies = v;
        }
        if let Some(v) = o.greeting {
            persona.greeting = v;
        }
        if !persona.mentions_address(&persona.greeting) {
            let derived = format!("Hey {}!", persona.address_term);
            warn!(
                "Greeting {:?} does not use {:?}, using {:?} instead",
                persona.greeting, persona.address_term, derived
            );
            persona.greeting = derived;
        }
        if let Some(v) = o.emoji_pair {
            if count_emoji(&v) >= MIN_EMOJI {
                persona.emoji_pair = v;
            } else {
                warn!("Emoji pair {:?} has fewer than {} emoji, keeping the default", v, MIN_EMOJI);
            }
        }
        if let Some(v) = o.empty_input_reply {
            persona.empty_input_reply = v;
        }
        if let Some(v) = o.error_reply {
            persona.error_reply = v;
        }
        persona.empty_input_reply = persona.polish(&persona.empty_input_reply);
        persona.error_reply = persona.polish(&persona.error_reply);
        persona
    }

    /// Swap the address term in every built-in text that uses it.
    fn readdress(&mut self, term: &str) {
        let from = std::mem::replace(&mut self.address_term, term.to_string());
        let swap = |text: &mut String| *text = text.replace(&from, term);
        swap(&mut self.system_prompt);
        swap(&mut self.greeting);
        swap(&mut self.empty_input_reply);
        swap(&mut self.error_reply);
        self.fallback_replies.iter_mut().for_each(swap);
    }

    /// The fixed reply for the first trigger contained in `message`, if any.
    pub fn special_reply(&self, message: &str) -> Option<&str> {
        let lowered = message.to_lowercase();
        self.triggers
            .iter()
            .find(|rule| lowered.contains(&rule.pattern))
            .map(|rule| rule.reply.as_str())
    }

    pub fn mentions_address(&self, text: &str) -> bool {
        text.to_lowercase()
            .contains(&self.address_term.to_lowercase())
    }

    /// Prepend `greeting` unless the text already uses the address term.
    pub fn ensure_address(&self, text: &str, greeting: &str) -> String {
        if self.mentions_address(text) {
            text.to_string()
        } else {
            format!("{greeting} {text}")
        }
    }

    /// Enforce both reply invariants using the default greeting and emoji pair.
    pub fn polish(&self, text: &str) -> String {
        self.polish_with(text, &self.greeting, &self.emoji_pair)
    }

    pub fn polish_with(&self, text: &str, greeting: &str, emoji_pair: &str) -> String {
        let addressed = self.ensure_address(text, greeting);
        ensure_emoji(&addressed, emoji_pair)
    }
}

pub fn is_emoji(c: char) -> bool {
    EMOJI_RANGES
        .iter()
        .any(|&(lo, hi)| (lo..=hi).contains(&c))
}

pub fn count_emoji(text: &str) -> usize {
    text.chars().filter(|&c| is_emoji(c)).count()
}

/// Append `pair` when the text carries fewer than [`MIN_EMOJI`] emoji.
pub fn ensure_emoji(text: &str, pair: &str) -> String {
    if count_emoji(text) < MIN_EMOJI {
        format!("{text} {pair}")
    } else {
        text.to_string()
    }
}
