//! Parsing helpers for backend responses
//!
//! Models often wrap their JSON in prose, so the object is located by its
//! outermost braces. When no usable JSON is present, priority-tagged lines
//! are accepted instead.

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::Priority;

use super::types::SuggestionList;

/// Number of suggestions a response must contain
pub const SUGGESTION_COUNT: usize = 3;

/// Parse exactly three prioritized suggestions from a response
pub fn parse_suggestions(response: &str) -> Result<Vec<(Priority, String)>> {
    let response = response.trim();

    let parsed = match extract_json(response) {
        Some(json_str) => match serde_json::from_str::<SuggestionList>(json_str) {
            Ok(list) => Some(
                list.suggestions
                    .into_iter()
                    .map(|s| {
                        let priority = s.priority.parse::<Priority>().map_err(|e| {
                            Error::InvalidData(format!("{} | Raw: {}", e, truncate(response)))
                        })?;
                        Ok((priority, s.text.trim().to_string()))
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            Err(e) => {
                tracing::debug!(error = %e, "Response JSON unusable, trying tagged lines");
                None
            }
        },
        None => None,
    };

    let suggestions = match parsed {
        Some(s) => s,
        None => parse_tagged_lines(response),
    };

    if suggestions.iter().any(|(_, text)| text.is_empty()) {
        return Err(Error::InvalidData(format!(
            "Empty suggestion text | Raw: {}",
            truncate(response)
        )));
    }

    if suggestions.len() != SUGGESTION_COUNT {
        return Err(Error::InvalidData(format!(
            "Expected {} suggestions, got {} | Raw: {}",
            SUGGESTION_COUNT,
            suggestions.len(),
            truncate(response)
        )));
    }

    Ok(suggestions)
}

/// Lines tagged `High: ...`, `[Medium] ...` or `- Low - ...`
pub fn parse_tagged_lines(response: &str) -> Vec<(Priority, String)> {
    let re = Regex::new(
        r"(?i)^\s*(?:\d+[.)]\s*)?(?:[-*]\s*)?(?:\[(high|medium|low)\]|(high|medium|low)\s*:|(high|medium|low)\s+-)\s*(.+?)\s*$",
    )
    .expect("valid regex");

    response
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            let tag = caps.get(1).or(caps.get(2)).or(caps.get(3))?;
            let priority = tag.as_str().parse::<Priority>().ok()?;
            let text = caps.get(4)?.as_str().to_string();
            Some((priority, text))
        })
        .collect()
}

fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (start < end).then(|| &response[start..=end])
}

fn truncate(response: &str) -> String {
    if response.len() > 200 {
        let mut end = 200;
        while !response.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &response[..end])
    } else {
        response.to_string()
    }
}
