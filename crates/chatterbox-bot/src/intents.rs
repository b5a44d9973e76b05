//! Rule tables for reading a chat message.
//!
//! Everything here is pure text matching: trigger detection with parameter
//! extraction for the lookup adapters, the small-talk table, the noun
//! heuristic and the filler replies. All patterns are case-insensitive and
//! match whole words.

use std::sync::LazyLock;

use rand::seq::SliceRandom;
use regex::Regex;

pub const EMPTY_MESSAGE_REPLY: &str = "Please type a message so I can help.";
pub const TEACH_ME_REPLY: &str =
    "I don't know the answer to that yet. Teach me by sending the question and answer to /learn.";
pub const FILLER_REPLIES: &[&str] = &[
    "Interesting! Tell me more.",
    "Can you clarify that?",
    "I'm listening...",
];

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static WEATHER: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bweather\b"));
static WEATHER_CITY: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\bweather\b.*?\b(?:in|for|at)\s+([^?!,;]+)"));
static NEWS: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bnews\b"));
static NEWS_TOPIC: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\bnews\s+(?:about|on|for)\s+([^?!,;]+)"));
static TIME: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\btime\b"));
static TRANSLATE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\btranslate\b"));
static TRANSLATE_PARTS: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\btranslate\s+(.+?)\s+(?:to|into)\s+([a-z]+)\W*$")
});
static TASK: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(?:schedule|task)\b"));
static TRIVIA: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\btell me about\s+([^?!]+)"));

/// A message that should be answered by a lookup adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// City is empty when the message names none.
    Weather { city: String },
    News { topic: Option<String> },
    Time,
    /// Both parts are empty when the message does not follow
    /// "translate <text> to <language>".
    Translate { text: String, language: String },
    Task,
    Trivia { subject: String },
}

/// First trigger in the message, checked in fixed priority order.
pub fn detect_trigger(message: &str) -> Option<Trigger> {
    if WEATHER.is_match(message) {
        let city = capture(&WEATHER_CITY, message, 1).unwrap_or_default();
        return Some(Trigger::Weather { city });
    }
    if NEWS.is_match(message) {
        let topic = capture(&NEWS_TOPIC, message, 1);
        return Some(Trigger::News { topic });
    }
    if TIME.is_match(message) {
        return Some(Trigger::Time);
    }
    if TRANSLATE.is_match(message) {
        let (text, language) = TRANSLATE_PARTS
            .captures(message)
            .map(|c| (clean(&c[1]), clean(&c[2])))
            .unwrap_or_default();
        let text = text.trim_matches(|c| c == '"' || c == '\'').to_string();
        return Some(Trigger::Translate { text, language });
    }
    if TASK.is_match(message) {
        return Some(Trigger::Task);
    }
    if let Some(subject) = capture(&TRIVIA, message, 1) {
        return Some(Trigger::Trivia { subject });
    }
    None
}

fn capture(pattern: &Regex, message: &str, group: usize) -> Option<String> {
    pattern
        .captures(message)
        .and_then(|c| c.get(group))
        .map(|m| clean(m.as_str()))
        .filter(|s| !s.is_empty())
}

fn clean(raw: &str) -> String {
    raw.trim().trim_end_matches('.').trim().to_string()
}

struct SmallTalk {
    pattern: Regex,
    replies: &'static [&'static str],
}

static SMALL_TALK: LazyLock<Vec<SmallTalk>> = LazyLock::new(|| {
    let row = |pattern: &str, replies: &'static [&'static str]| SmallTalk {
        pattern: re(pattern),
        replies,
    };
    vec![
        row(
            r"(?i)\b(?:hi|hello|hey|greetings|good (?:morning|afternoon|evening))\b",
            GREETING_REPLIES,
        ),
        row(
            r"(?i)\b(?:how are you|how's it going|how are things)\b",
            &[
                "I'm doing great, thanks for asking!",
                "All systems running smoothly. How about you?",
            ],
        ),
        row(
            r"(?i)\b(?:your name|who are you)\b",
            &[
                "I'm Chatterbox, your friendly assistant.",
                "You can call me Chatterbox.",
            ],
        ),
        row(
            r"(?i)\bhelp\b",
            &["I can check the weather, the news and the time, translate text, schedule tasks and learn new answers. Just ask!"],
        ),
        row(
            r"(?i)\b(?:thanks|thank you|thx)\b",
            &["You're welcome!", "Happy to help!", "Anytime!"],
        ),
        row(
            r"(?i)\b(?:bye|goodbye|see you|farewell)\b",
            &["Goodbye! Have a great day.", "See you later!", "Take care!"],
        ),
    ]
});

pub const GREETING_REPLIES: &[&str] = &[
    "Hello! How can I help you today?",
    "Hi there! What's on your mind?",
    "Hey! Nice to see you.",
];

/// Random reply from the first small-talk row that matches.
pub fn small_talk(message: &str) -> Option<&'static str> {
    SMALL_TALK
        .iter()
        .find(|row| row.pattern.is_match(message))
        .and_then(|row| row.replies.choose(&mut rand::thread_rng()).copied())
}

const NOUN_SUFFIXES: &[&str] = &[
    "tion", "sion", "ment", "ness", "ity", "ism", "ship", "hood", "ance", "ence", "ology",
];
const MIN_SUFFIXED_NOUN_LEN: usize = 5;

const STOPWORDS: &[&str] = &[
    "i", "me", "my", "you", "your", "we", "our", "they", "them", "he", "she", "it", "the", "a",
    "an", "and", "or", "but", "is", "are", "was", "were", "be", "been", "do", "does", "did",
    "to", "of", "in", "on", "at", "for", "with", "about", "this", "that", "these", "those",
    "what", "which", "who", "when", "where", "why", "how", "can", "could", "would", "should",
    "will", "just", "really", "very", "so", "not", "no", "yes", "ok", "okay",
];

/// First token that looks like a noun: a capitalized word other than the
/// first, or a long word with a nominal suffix.
pub fn find_noun(message: &str) -> Option<String> {
    message
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .enumerate()
        .filter(|(_, w)| !w.is_empty() && w.chars().all(char::is_alphabetic))
        .filter(|(_, w)| !STOPWORDS.contains(&w.to_lowercase().as_str()))
        .find(|(i, w)| {
            let capitalized = *i > 0 && w.chars().next().is_some_and(char::is_uppercase);
            let lower = w.to_lowercase();
            let suffixed = lower.chars().count() >= MIN_SUFFIXED_NOUN_LEN
                && NOUN_SUFFIXES.iter().any(|s| lower.ends_with(s));
            capitalized || suffixed
        })
        .map(|(_, w)| w.to_string())
}

pub fn noun_echo(noun: &str) -> String {
    format!("Tell me more about {noun}.")
}

pub fn filler() -> &'static str {
    FILLER_REPLIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FILLER_REPLIES[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_city() {
        assert_eq!(
            detect_trigger("What's the weather like in New York?"),
            Some(Trigger::Weather { city: "New York".into() })
        );
        assert_eq!(
            detect_trigger("WEATHER for london"),
            Some(Trigger::Weather { city: "london".into() })
        );
        assert_eq!(
            detect_trigger("nice weather"),
            Some(Trigger::Weather { city: String::new() })
        );
    }

    #[test]
    fn test_trigger_priority() {
        // weather precedes time
        assert!(matches!(
            detect_trigger("weather in Oslo at this time"),
            Some(Trigger::Weather { .. })
        ));
        assert_eq!(detect_trigger("what time is it"), Some(Trigger::Time));
        assert_eq!(detect_trigger("please schedule a call"), Some(Trigger::Task));
    }

    #[test]
    fn test_whole_words_only() {
        assert_eq!(detect_trigger("sometimes I wonder"), None);
        assert_eq!(detect_trigger("newsletter signup"), None);
        assert_eq!(detect_trigger("multitasking is hard"), None);
    }

    #[test]
    fn test_news_topic() {
        assert_eq!(
            detect_trigger("any news about Rust?"),
            Some(Trigger::News { topic: Some("Rust".into()) })
        );
        assert_eq!(detect_trigger("news"), Some(Trigger::News { topic: None }));
    }

    #[test]
    fn test_translate_parts() {
        assert_eq!(
            detect_trigger("Translate \"good morning\" into Spanish."),
            Some(Trigger::Translate {
                text: "good morning".into(),
                language: "Spanish".into()
            })
        );
        assert_eq!(
            detect_trigger("can you translate?"),
            Some(Trigger::Translate {
                text: String::new(),
                language: String::new()
            })
        );
    }

    #[test]
    fn test_trivia() {
        assert_eq!(
            detect_trigger("Tell me about Alan Turing"),
            Some(Trigger::Trivia { subject: "Alan Turing".into() })
        );
    }

    #[test]
    fn test_small_talk_rows() {
        let hello = small_talk("hello").unwrap();
        assert!(GREETING_REPLIES.contains(&hello));
        assert!(small_talk("thanks a lot").is_some());
        assert!(small_talk("ship it").is_none());
        // "this" must not match "hi"
        assert!(small_talk("this thing").is_none());
    }

    #[test]
    fn test_find_noun() {
        assert_eq!(find_noun("I visited Paris"), Some("Paris".into()));
        assert_eq!(find_noun("the education system"), Some("education".into()));
        assert_eq!(find_noun("Maybe later"), None);
        assert_eq!(find_noun("I think so"), None);
    }

    #[test]
    fn test_filler_from_set() {
        assert!(FILLER_REPLIES.contains(&filler()));
    }
}
