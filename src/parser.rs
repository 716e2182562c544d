use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;
use tracing::debug;

use crate::core::AnkimdError;

static PROPERTIES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:---|\.\.\.)\s*$").unwrap());
static QUESTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^>\[!question\]-?\s*(.+)#card").unwrap());
static EMPTY_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*$").unwrap());
static INLINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\s*(.+?)::([^:^][^^]*?)(?:\s*\^(\d+))?\s*$").unwrap());
static INLINE_REVERSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\s*(.+?):::([^:^][^^]*?)(?:\s*\^(\d+))?\s*$").unwrap());

/// Matches both id marker styles: the HTML comment form and the caret form.
pub(crate) static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--ID: (\d+)-->|\^(\d+)\s*?(?m:$)").unwrap());

pub const BASIC_MODEL: &str = "Basic";
pub const REVERSED_MODEL: &str = "Basic (and reversed card)";

/// Raw parse of one line group, before any rendering.
#[derive(Debug, Clone, Default)]
pub struct ParsedCard {
    pub front: String,
    pub back: String,
    pub id: Option<u64>,
    pub inline: bool,
    pub model_name: String,
    pub is_card: bool,
}

/// Splits file lines into the yaml frontmatter (delimiters included) and the
/// remaining body lines.
pub fn extract_properties(lines: &[String]) -> Result<(Vec<String>, Vec<String>), AnkimdError> {
    let mut markers = lines.iter().enumerate().filter(|(_, line)| PROPERTIES_RE.is_match(line));

    let start = markers
        .next()
        .map(|(i, _)| i)
        .ok_or_else(|| AnkimdError::BadFrontmatter("no frontmatter block found".to_string()))?;
    let end = markers
        .next()
        .map(|(i, _)| i + 1)
        .ok_or_else(|| AnkimdError::BadFrontmatter("unterminated frontmatter".to_string()))?;

    if start != 0 {
        return Err(AnkimdError::BadFrontmatter(
            "frontmatter must open on the first line".to_string(),
        ));
    }

    Ok((lines[..end].to_vec(), lines[end..].to_vec()))
}

#[derive(Debug, Clone)]
pub struct Metadata {
    pub deck: String,
    pub tags: Vec<String>,
}

/// Reads the deck name and common tags out of the frontmatter lines. The
/// deck is required; tags may be a single string, a list, or absent.
pub fn parse_metadata(properties: &[String]) -> Result<Metadata, AnkimdError> {
    let body = if properties.len() > 1 {
        properties[..properties.len() - 1].concat()
    } else {
        String::new()
    };

    let value: Value = serde_yaml::from_str(&body)?;
    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => serde_yaml::Mapping::new(),
        other => {
            return Err(AnkimdError::BadFrontmatter(format!(
                "expected a mapping, got {:?}",
                other
            )))
        }
    };

    let deck = match mapping.get(Value::String("deck".to_string())) {
        Some(Value::String(deck)) => deck.clone(),
        Some(other) => {
            return Err(AnkimdError::BadFrontmatter(format!(
                "expected 'deck' as a string, got {:?}",
                other
            )))
        }
        None => return Err(AnkimdError::MissingDeck),
    };

    let tags = match mapping.get(Value::String("tags".to_string())) {
        Some(Value::String(tag)) => vec![tag.clone()],
        Some(Value::Sequence(seq)) => seq
            .iter()
            .map(|tag| match tag {
                Value::String(tag) => Ok(tag.clone()),
                other => Err(AnkimdError::BadFrontmatter(format!(
                    "expected string tag, got {:?}",
                    other
                ))),
            })
            .collect::<Result<Vec<String>, AnkimdError>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(AnkimdError::BadFrontmatter(format!(
                "expected 'tags' as a string or list, got {:?}",
                other
            )))
        }
    };

    debug!("parsed frontmatter: deck '{}', {} common tags", deck, tags.len());
    Ok(Metadata { deck, tags })
}

/// Groups body lines into row groups. Inline-card lines and empty lines form
/// single-line groups of their own; any other run of lines accumulates into
/// one group. Concatenating the groups back reproduces the input.
pub fn group_lines(lines: &[String]) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in lines {
        if INLINE_RE.is_match(line) || EMPTY_LINE_RE.is_match(line) {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            groups.push(vec![line.clone()]);
        } else {
            current.push(line.clone());
        }
    }

    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

fn parse_id(text: &str) -> Option<u64> {
    let caps = ID_RE.captures(text)?;
    caps.get(1).or_else(|| caps.get(2)).and_then(|m| m.as_str().parse().ok())
}

/// Parses one line group into a card candidate. Groups that never produce
/// both a front and a back are not cards (frontmatter, prose, blank lines).
pub fn parse_card(lines: &[String]) -> ParsedCard {
    let mut card = ParsedCard { model_name: BASIC_MODEL.to_string(), ..ParsedCard::default() };
    let mut has_question = false;

    for line in lines {
        // inline card syntax, reversed variant first since the plain pattern
        // also matches a ":::" line
        let caps = match INLINE_REVERSE_RE.captures(line) {
            Some(caps) => {
                card.model_name = REVERSED_MODEL.to_string();
                Some(caps)
            }
            None => INLINE_RE.captures(line),
        };

        if let Some(caps) = caps {
            card.front = caps[1].trim().to_string();
            card.back = caps[2].trim().to_string();
            card.id = caps.get(3).and_then(|m| m.as_str().parse().ok());
            card.inline = true;
            card.is_card = !card.front.is_empty() && !card.back.is_empty();
            return card;
        }

        // block card syntax
        if let Some(caps) = QUESTION_RE.captures(line) {
            card.front = caps[1].trim().to_string();
            has_question = true;
        } else if let Some(answer) = line.strip_prefix('>') {
            if !card.back.is_empty() {
                card.back.push('\n');
            }
            card.back.push_str(answer.trim());
        } else if ID_RE.is_match(line) {
            card.id = parse_id(line);
        }
    }

    card.is_card = has_question && !card.front.is_empty() && !card.back.is_empty();
    card
}
