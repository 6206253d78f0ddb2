//! Story generation and tolerant response parsing.
//!
//! Language models rarely return exactly the JSON they were asked for. The
//! parser works through explicit tiers, each a pure function:
//!
//! 1. [`parse_structured`]: JSON, possibly fenced or wrapped in prose
//! 2. [`split_blank_lines`]: blank-line delimited chunks
//! 3. [`group_sentences`]: sentences grouped three at a time
//! 4. [`pad_by_repetition`]: repeat the last paragraph
//!
//! [`parse_story_response`] composes them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storyreel_common::error::{StoryreelError, StoryreelResult};

/// Maximum hook length (characters) when the hook is derived from text.
const HOOK_MAX_CHARS: usize = 180;

/// Sentences per paragraph in the sentence-grouping tier.
const SENTENCES_PER_GROUP: usize = 3;

/// A generated story.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Story {
    #[serde(default)]
    pub hook: String,

    #[serde(default)]
    pub outline: Vec<String>,

    #[serde(default)]
    pub paragraphs: Vec<String>,

    #[serde(default, alias = "retention_notes")]
    pub notes: Vec<String>,
}

/// Inputs for story generation.
#[derive(Debug, Clone)]
pub struct StoryRequest {
    pub title: String,
    pub paragraphs: usize,
    pub style_prompt: Option<String>,
    pub source_url: Option<String>,
    pub audience: String,
}

impl StoryRequest {
    pub fn new(title: impl Into<String>, paragraphs: usize) -> Self {
        Self {
            title: title.into(),
            paragraphs,
            style_prompt: None,
            source_url: None,
            audience: "sleepy story".to_string(),
        }
    }
}

/// Text-generation capability producing a [`Story`].
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate(&self, request: &StoryRequest) -> StoryreelResult<Story>;

    fn name(&self) -> &str;
}

/// Prompt sent to the language model.
pub fn build_story_prompt(request: &StoryRequest) -> String {
    let source_line = request
        .source_url
        .as_deref()
        .map(|url| format!("Source inspiration: {url}\n"))
        .unwrap_or_default();
    let style = request.style_prompt.as_deref().unwrap_or("calm, minimalist");

    format!(
        "You are an expert YouTube scriptwriter focused on retention. \
         Write a calm sleepy story with gentle hooks, micro-tension, and curiosity loops. \
         Return ONLY valid JSON. No extra text. No markdown fences.\n\n\
         Title: {title}\n\
         {source_line}\
         Audience: {audience}\n\
         Paragraphs: {count}\n\
         Style: {style}\n\n\
         JSON schema: {{\n  \"hook\": string,\n  \"outline\": string[],\n  \"paragraphs\": string[],\n  \"retention_notes\": string[]\n}}\n\
         Output: JSON only.",
        title = request.title,
        audience = request.audience,
        count = request.paragraphs,
    )
}

/// Deterministic image prompt for one paragraph.
pub fn image_prompt_for_paragraph(paragraph: &str, style_prompt: Option<&str>) -> String {
    let style = style_prompt
        .filter(|s| !s.trim().is_empty())
        .map(|s| format!(" Style: {s}."))
        .unwrap_or_default();
    format!(
        "Create a concise, vivid visual prompt for an illustration that represents the \
         paragraph content. No text in the image. Keep it calm and suitable for a sleepy \
         story.{style} Paragraph: {paragraph}"
    )
}

/// Parse a raw model response into a story with exactly `expected` paragraphs.
///
/// Fails only when the response is blank.
pub fn parse_story_response(raw: &str, expected: usize, title: &str) -> StoryreelResult<Story> {
    let expected = expected.max(1);
    if raw.trim().is_empty() {
        return Err(StoryreelError::generation(
            "Story generator returned an empty response",
        ));
    }

    if let Some(mut story) = parse_structured(raw, expected) {
        if !story.paragraphs.is_empty() {
            pad_by_repetition(&mut story.paragraphs, expected);
            return Ok(story);
        }
    }

    tracing::debug!("Story response is not structured; using text heuristics");
    let mut parts = split_blank_lines(raw);
    if parts.len() < expected {
        for group in group_sentences(raw) {
            if parts.len() >= expected {
                break;
            }
            parts.push(group);
        }
    }
    pad_by_repetition(&mut parts, expected);
    parts.truncate(expected);

    let hook = parts
        .first()
        .map(|p| p.chars().take(HOOK_MAX_CHARS).collect())
        .unwrap_or_else(|| title.to_string());

    Ok(Story {
        hook,
        outline: (1..=expected).map(|i| format!("Part {i}")).collect(),
        paragraphs: parts,
        notes: Vec::new(),
    })
}

/// Tier 1: structured JSON.
///
/// Returns `None` unless the payload is an object with a `paragraphs` array.
/// Paragraphs are trimmed, empty entries dropped, topped up from blank-line
/// chunks when short, and truncated (with the outline) to `expected`.
pub fn parse_structured(raw: &str, expected: usize) -> Option<Story> {
    let value = extract_json(raw)?;
    let object = value.as_object()?;
    let paragraphs_value = object.get("paragraphs")?.as_array()?;

    let mut paragraphs = string_items(paragraphs_value);
    if paragraphs.len() < expected {
        let source = if paragraphs.is_empty() {
            raw.to_string()
        } else {
            paragraphs.join("\n\n")
        };
        for chunk in split_blank_lines(&source) {
            if paragraphs.len() >= expected {
                break;
            }
            if !paragraphs.contains(&chunk) {
                paragraphs.push(chunk);
            }
        }
    }
    paragraphs.truncate(expected);

    let mut outline = object
        .get("outline")
        .and_then(Value::as_array)
        .map(|items| string_items(items))
        .unwrap_or_default();
    outline.truncate(expected);

    let notes = object
        .get("retention_notes")
        .or_else(|| object.get("notes"))
        .and_then(Value::as_array)
        .map(|items| string_items(items))
        .unwrap_or_default();

    let hook = object
        .get("hook")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    Some(Story {
        hook,
        outline,
        paragraphs,
        notes,
    })
}

/// Tier 2: chunks separated by one or more blank lines, trimmed.
pub fn split_blank_lines(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                chunks.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        chunks.push(current.join("\n").trim().to_string());
    }
    chunks.retain(|c| !c.is_empty());
    chunks
}

/// Tier 3: sentences split on `.`, grouped three per paragraph.
pub fn group_sentences(text: &str) -> Vec<String> {
    let flattened = text.replace('\n', " ");
    let sentences: Vec<&str> = flattened
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    sentences
        .chunks(SENTENCES_PER_GROUP)
        .map(|group| format!("{}.", group.join(". ")))
        .collect()
}

/// Tier 4: repeat the last paragraph until there are `expected` of them.
///
/// An empty list stays empty.
pub fn pad_by_repetition(paragraphs: &mut Vec<String>, expected: usize) {
    if let Some(last) = paragraphs.last().cloned() {
        while paragraphs.len() < expected {
            paragraphs.push(last.clone());
        }
    }
}

/// Extract a JSON value from a model response.
///
/// Strips a surrounding code fence, then tries a direct parse, then the
/// span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<Value> {
    let mut s = text.trim();
    if s.starts_with("```") {
        s = match s.find('\n') {
            Some(newline) => &s[newline + 1..],
            None => "",
        };
        s = s.trim_end();
        if let Some(stripped) = s.strip_suffix("```") {
            s = stripped;
        }
        s = s.trim();
    }

    if let Ok(value) = serde_json::from_str::<Value>(s) {
        return Some(value);
    }

    let start = s.find('{')?;
    let end = s.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&s[start..=end]).ok()
}

fn string_items(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
