use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::generation::GenerationRequest;
use crate::llm::{AttemptError, ChatMessage, CompletionBackend};
use crate::persona::Persona;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchKind {
    Special,
    Ai,
    Fallback,
    Error,
}

/// One model that did not answer, and why.
#[derive(Debug)]
pub struct AttemptFailure {
    pub model: String,
    pub error: AttemptError,
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "model {} failed: {}", self.model, self.error)
    }
}

#[derive(Debug)]
pub struct DispatchResult {
    pub kind: DispatchKind,
    pub text: String,
    /// The model that answered, for `Ai` results.
    pub model: Option<String>,
    /// Every failed attempt, in the order tried.
    pub failures: Vec<AttemptFailure>,
}

#[derive(Debug)]
pub struct GenerationResult {
    pub kind: DispatchKind,
    pub output: String,
    pub message: String,
    pub model: Option<String>,
    pub failures: Vec<AttemptFailure>,
}

/// How a pass over the model list ended.
#[derive(Debug)]
enum ChainOutcome {
    Answered { model: String, text: String },
    Exhausted,
    Unreadable,
}

/// Chooses an index into a pool of canned replies.
pub trait FallbackPicker: Send + Sync {
    /// `len` is always at least 1.
    fn pick(&self, len: usize) -> usize;
}

pub struct RandomPicker;

impl FallbackPicker for RandomPicker {
    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Turns one user message into one reply: scripted triggers first, then each
/// configured model in order, then a canned reply.
pub struct Dispatcher {
    backend: Arc<dyn CompletionBackend>,
    persona: Persona,
    models: Vec<String>,
    attempt_timeout: Duration,
    picker: Arc<dyn FallbackPicker>,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        persona: Persona,
        models: Vec<String>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            persona,
            models,
            attempt_timeout,
            picker: Arc::new(RandomPicker),
        }
    }

    /// Replace the random source used for canned replies.
    #[cfg(test)]
    pub fn with_picker(mut self, picker: Arc<dyn FallbackPicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn has_credential(&self) -> bool {
        self.backend.has_credential()
    }

    /// Produce a reply for `message`. Never fails: remote problems become a
    /// fallback reply, an unreadable remote payload becomes an apology.
    pub async fn dispatch(&self, message: &str) -> DispatchResult {
        if let Some(reply) = self.persona.special_reply(message) {
            debug!("Message matched a creator trigger");
            return DispatchResult {
                kind: DispatchKind::Special,
                text: reply.to_string(),
                model: None,
                failures: Vec::new(),
            };
        }

        if !self.backend.has_credential() {
            debug!("No API key configured, using a canned reply");
            return self.canned_reply(Vec::new());
        }

        let (outcome, failures) = self.try_models(message).await;
        match outcome {
            ChainOutcome::Answered { model, text } => DispatchResult {
                kind: DispatchKind::Ai,
                text: self.persona.polish(&text),
                model: Some(model),
                failures,
            },
            ChainOutcome::Exhausted => {
                info!("All models failed, using a canned reply");
                self.canned_reply(failures)
            }
            ChainOutcome::Unreadable => DispatchResult {
                kind: DispatchKind::Error,
                text: self.persona.error_reply.clone(),
                model: None,
                failures,
            },
        }
    }

    /// Ask for a description, composition, storyboard or text about a prompt.
    /// Creator triggers are not consulted here.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let term = self.persona.address_term.as_str();
        let (greeting, emoji_pair) = match request.polish_overrides(term) {
            Some((greeting, pair)) => (greeting, pair),
            None => (self.persona.greeting.clone(), self.persona.emoji_pair.as_str()),
        };
        let polish = |text: &str| self.persona.polish_with(text, &greeting, emoji_pair);

        if request.prompt.is_empty() {
            let reply = request.empty_prompt_reply(term);
            return GenerationResult {
                kind: DispatchKind::Fallback,
                output: reply.clone(),
                message: reply,
                model: None,
                failures: Vec::new(),
            };
        }

        if !self.backend.has_credential() {
            let variants = request.offline_variants(term);
            let idx = self.picker.pick(variants.len()).min(variants.len() - 1);
            return GenerationResult {
                kind: DispatchKind::Fallback,
                output: polish(&variants[idx]),
                message: request.offline_message(term),
                model: None,
                failures: Vec::new(),
            };
        }

        info!("Generating {} output", request.kind);
        let (outcome, failures) = self.try_models(&request.instruction()).await;
        match outcome {
            ChainOutcome::Answered { model, text } => GenerationResult {
                kind: DispatchKind::Ai,
                output: polish(&text),
                message: request.success_message(term),
                model: Some(model),
                failures,
            },
            ChainOutcome::Exhausted => GenerationResult {
                kind: DispatchKind::Fallback,
                output: polish(&request.fallback_output(term)),
                message: request.fallback_message(term),
                model: None,
                failures,
            },
            ChainOutcome::Unreadable => GenerationResult {
                kind: DispatchKind::Error,
                output: polish(&request.error_output(term)),
                message: self.persona.error_reply.clone(),
                model: None,
                failures,
            },
        }
    }

    /// Walk the model list once, stopping at the first answer.
    async fn try_models(&self, prompt: &str) -> (ChainOutcome, Vec<AttemptFailure>) {
        let messages = [
            ChatMessage::system(&self.persona.system_prompt),
            ChatMessage::user(prompt),
        ];
        let mut failures = Vec::new();

        info!("Trying {} models...", self.models.len());

        for model in &self.models {
            debug!("Trying model: {}", model);

            let attempt = match tokio::time::timeout(
                self.attempt_timeout,
                self.backend.complete(model, &messages),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AttemptError::Timeout(self.attempt_timeout)),
            };

            match attempt {
                Ok(text) => {
                    info!("Success with model: {}", model);
                    let outcome = ChainOutcome::Answered {
                        model: model.clone(),
                        text,
                    };
                    return (outcome, failures);
                }
                Err(error) => {
                    let fatal = error.is_fatal();
                    let failure = AttemptFailure {
                        model: model.clone(),
                        error,
                    };
                    if fatal {
                        error!("Giving up, {}", failure);
                        failures.push(failure);
                        return (ChainOutcome::Unreadable, failures);
                    }
                    warn!("{}", failure);
                    failures.push(failure);
                }
            }
        }

        (ChainOutcome::Exhausted, failures)
    }

    fn canned_reply(&self, failures: Vec<AttemptFailure>) -> DispatchResult {
        let pool = &self.persona.fallback_replies;
        let text = if pool.is_empty() {
            self.persona.empty_input_reply.clone()
        } else {
            let idx = self.picker.pick(pool.len()).min(pool.len() - 1);
            pool[idx].clone()
        };

        DispatchResult {
            kind: DispatchKind::Fallback,
            text: self.persona.polish(&text),
            model: None,
            failures,
        }
    }
}
