//! Prompt templates for the "generate" endpoints. Nothing here produces media:
//! every kind asks the model for a written description, composition idea or
//! storyboard and returns that text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Image,
    Music,
    Video,
    Text,
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationKind::Image => write!(f, "image"),
            GenerationKind::Music => write!(f, "music"),
            GenerationKind::Video => write!(f, "video"),
            GenerationKind::Text => write!(f, "text"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: GenerationKind,
    pub prompt: String,
    /// Music only.
    pub genre: String,
    /// Video only.
    pub style: String,
    /// Seconds, as free text.
    pub duration: String,
}

impl GenerationRequest {
    pub fn image(prompt: &str) -> Self {
        Self::new(GenerationKind::Image, prompt)
    }

    pub fn text(prompt: &str) -> Self {
        Self::new(GenerationKind::Text, prompt)
    }

    pub fn music(prompt: &str, genre: Option<&str>, duration: Option<&str>) -> Self {
        Self {
            genre: genre.unwrap_or("electronic").to_string(),
            duration: duration.unwrap_or("30").to_string(),
            ..Self::new(GenerationKind::Music, prompt)
        }
    }

    pub fn video(prompt: &str, style: Option<&str>, duration: Option<&str>) -> Self {
        Self {
            style: style.unwrap_or("cinematic").to_string(),
            duration: duration.unwrap_or("15").to_string(),
            ..Self::new(GenerationKind::Video, prompt)
        }
    }

    fn new(kind: GenerationKind, prompt: &str) -> Self {
        Self {
            kind,
            prompt: prompt.trim().to_string(),
            genre: String::new(),
            style: String::new(),
            duration: String::new(),
        }
    }

    /// The instruction sent to the model in place of the raw prompt.
    pub fn instruction(&self) -> String {
        let prompt = &self.prompt;
        match self.kind {
            GenerationKind::Image => format!(
                "Create a detailed, vivid description for an image about: \"{prompt}\". \
                 Be very descriptive about colors, style, composition, lighting, and mood. \
                 Make it inspiring and creative."
            ),
            GenerationKind::Music => format!(
                "Create a detailed music composition idea for a {} song about: \"{prompt}\". \
                 Describe the melody, rhythm, instruments, mood, and structure. \
                 Make it about {} seconds long.",
                self.genre, self.duration
            ),
            GenerationKind::Video => format!(
                "Create a detailed video storyboard for a {} style video about: \"{prompt}\". \
                 Describe the scenes, camera angles, lighting, transitions, and overall narrative. \
                 Make it about {} seconds long.",
                self.style, self.duration
            ),
            GenerationKind::Text => format!("Please generate content about: {prompt}"),
        }
    }

    /// Every text below addresses the user as `term`.
    pub fn empty_prompt_reply(&self, term: &str) -> String {
        match self.kind {
            GenerationKind::Image => format!("Hey {term}! What would you like me to create an image of? 🎨✨"),
            GenerationKind::Music => format!("Hey {term}! What kind of music would you like me to create? 🎵✨"),
            GenerationKind::Video => format!("Hey {term}! What kind of video would you like me to create? 🎥✨"),
            GenerationKind::Text => format!("Hey {term}! What would you like me to generate for you? 📝✨"),
        }
    }

    /// Canned outputs used when no credential is configured.
    pub fn offline_variants(&self, term: &str) -> Vec<String> {
        let prompt = &self.prompt;
        match self.kind {
            GenerationKind::Image => vec![
                format!("A beautiful landscape with {prompt}, created just for you {term}! 🌄✨"),
                format!("An artistic representation of {prompt} - imagine this masterpiece, {term}! 🎨🌟"),
                format!("Picture this amazing scene: {prompt} - all for you {term}! 🖼️😊"),
            ],
            GenerationKind::Music => {
                let genre = &self.genre;
                vec![
                    format!("A {genre} track about {prompt} with catchy melodies and great rhythm! 🎶"),
                    format!("Imagine a {genre} composition inspired by {prompt} - it would be amazing {term}! 🎵"),
                    format!("A musical piece in {genre} style capturing the essence of {prompt} 🎧"),
                ]
            }
            GenerationKind::Video => {
                let style = &self.style;
                vec![
                    format!("A {style} style video about {prompt} with amazing visuals and storytelling! 🎬"),
                    format!("Imagine a {style} video showcasing {prompt} - it would be epic {term}! 📽️"),
                    format!("A video production in {style} style featuring {prompt} with great cinematography 🎞️"),
                ]
            }
            GenerationKind::Text => vec![format!(
                "Sure thing, {term}! I'd generate something about \"{prompt}\" but I'm in offline mode right now. 🔌😅"
            )],
        }
    }

    /// Output used when every model failed.
    pub fn fallback_output(&self, term: &str) -> String {
        let prompt = &self.prompt;
        match self.kind {
            GenerationKind::Image => format!(
                "A stunning visual representation of {prompt} with vibrant colors and amazing details, created specially for you {term}! 🌟🎨"
            ),
            GenerationKind::Music => format!(
                "A {} musical piece about {prompt} with beautiful melodies and engaging rhythms, composed just for you {term}! 🎶🌟",
                self.genre
            ),
            GenerationKind::Video => format!(
                "A {} style video about {prompt} with stunning visuals, smooth transitions, and engaging storytelling - directed just for you {term}! 🎬🌟",
                self.style
            ),
            GenerationKind::Text => format!(
                "I'd love to generate text about \"{prompt}\" for you {term}, but all AI models are busy right now! 🔄😅 Try again in a moment! ✨"
            ),
        }
    }

    pub fn error_output(&self, term: &str) -> String {
        match self.kind {
            GenerationKind::Image => format!("I couldn't generate image ideas right now, {term}! 🎨😅 Let's try something else! ✨"),
            GenerationKind::Music => format!("I couldn't generate music ideas right now, {term}! 🎵😅 Let's try again later! ✨"),
            GenerationKind::Video => format!("I couldn't generate video ideas right now, {term}! 🎥😅 Let's try again later! ✨"),
            GenerationKind::Text => format!("I couldn't generate that text right now, {term}! 📝😅 Let's try something else! ✨"),
        }
    }

    pub fn success_message(&self, term: &str) -> String {
        match self.kind {
            GenerationKind::Image => format!("Hey {term}! Here's a creative image description for you! 🎨✨"),
            GenerationKind::Music => format!("Hey {term}! Here's your music composition idea! 🎵✨"),
            GenerationKind::Video => format!("Hey {term}! Here's your video storyboard! 🎥✨"),
            GenerationKind::Text => format!("Here you go, {term}! 📝✨"),
        }
    }

    pub fn offline_message(&self, term: &str) -> String {
        match self.kind {
            GenerationKind::Image => format!("Hey {term}! I'd generate a real image but I need an API key. Here's a description instead! 🎨😅"),
            GenerationKind::Music => format!("Hey {term}! Here's a music concept for you! 🎵😊"),
            GenerationKind::Video => format!("Hey {term}! Here's a video concept for you! 🎥😊"),
            GenerationKind::Text => format!("Hey {term}! I'm in offline mode right now. 🔌😅"),
        }
    }

    pub fn fallback_message(&self, term: &str) -> String {
        match self.kind {
            GenerationKind::Image => format!("Hey {term}! Here's your image concept! 🖼️😊"),
            GenerationKind::Music => format!("Hey {term}! Here's your music idea! 🎵😊"),
            GenerationKind::Video => format!("Hey {term}! Here's your video concept! 🎥😊"),
            GenerationKind::Text => format!("Hey {term}! All AI models are busy right now! 🔄😅"),
        }
    }

    /// Greeting and emoji pair used to polish model output for this kind.
    /// `None` means the persona defaults.
    pub fn polish_overrides(&self, term: &str) -> Option<(String, &'static str)> {
        match self.kind {
            GenerationKind::Text => Some((format!("Here you go, {term}!"), "📚🌟")),
            _ => None,
        }
    }
}
