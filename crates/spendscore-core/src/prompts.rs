//! Prompt library for recommendation generation
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for an override in the data dir (~/.local/share/spendscore/prompts/)
//! 2. Fall back to the embedded default (compiled into the binary)
//!
//! A prompt file starts with YAML frontmatter followed by `# System` and
//! `# User` sections. `{{var}}` placeholders are substituted at render time
//! and `{{#if var}}...{{/if}}` blocks are kept only when `var` is non-empty.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

mod defaults {
    pub const SPEND_RECOMMENDATIONS: &str =
        include_str!("../../../prompts/spend_recommendations.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    SpendRecommendations,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpendRecommendations => "spend_recommendations",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::SpendRecommendations]
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::SpendRecommendations => defaults::SPEND_RECOMMENDATIONS,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    /// Bumped whenever the default prompt changes
    pub version: u32,
    pub task_type: String,
}

/// A loaded prompt with metadata and body
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    pub content: String,
    /// Path of the override file, if one was used
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    pub fn is_override(&self) -> bool {
        self.override_path.is_some()
    }

    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the system section, or the whole body when it has no sections
    pub fn render_system(&self, vars: &HashMap<&str, String>) -> String {
        render(self.system_section().unwrap_or(&self.content), vars)
    }

    /// Render the user section, or the whole body when it has no sections
    pub fn render_user(&self, vars: &HashMap<&str, String>) -> String {
        render(self.user_section().unwrap_or(&self.content), vars)
    }
}

/// Loads and caches prompts
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptLibrary {
    /// Create a library using the default override directory
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Embedded prompts only, ignoring any overrides
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading it on first use
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::InvalidData(format!("Prompt {} not cached", id.as_str())))
    }

    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(path) = self.override_path(id) {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::InvalidData(format!("Failed to read prompt override: {}", e))
            })?;
            let (metadata, body) = parse_prompt(&content)?;
            tracing::debug!(prompt = id.as_str(), path = %path.display(), "Using prompt override");
            return Ok(Prompt {
                metadata,
                content: body,
                override_path: Some(path),
            });
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            override_path: None,
        })
    }

    /// Override file for a prompt, if one exists
    pub fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|d| d.join(format!("{}.md", id.as_str())))
            .filter(|p| p.exists())
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("spendscore").join("prompts"))
}

/// Split a prompt file into frontmatter and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    let rest = content.strip_prefix("---").ok_or_else(|| {
        Error::InvalidData("Prompt must start with YAML frontmatter (---)".into())
    })?;

    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];
    let end = after_header.find("\n# ").unwrap_or(after_header.len());
    Some(after_header[..end].trim())
}

fn render(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = resolve_conditionals(template, vars);
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

/// Keep `{{#if var}}` blocks whose variable is set, drop the rest
fn resolve_conditionals(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = template.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_len) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = result[var_start..var_start + var_len].trim().to_string();
        let block_start = var_start + var_len + 2;
        let Some(block_len) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let block_end = block_start + block_len;

        let keep = vars.get(var_name.as_str()).is_some_and(|v| !v.is_empty());
        let replacement = if keep {
            result[block_start..block_end].to_string()
        } else {
            String::new()
        };
        result = format!("{}{}{}", &result[..if_start], replacement, &result[block_end + 7..]);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_parse_prompt() {
        let content = "---\nid: test_prompt\nversion: 2\ntask_type: reasoning\n---\n\n# System\nSys.\n\n# User\nUser {{x}}.\n";

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 2);
        assert!(body.starts_with("# System"));
        assert_eq!(extract_section(&body, "# System"), Some("Sys."));
        assert_eq!(extract_section(&body, "# User"), Some("User {{x}}."));
    }

    #[test]
    fn test_parse_prompt_requires_frontmatter() {
        assert!(parse_prompt("# System\nno frontmatter").is_err());
        assert!(parse_prompt("---\nid: x\n").is_err());
    }

    #[test]
    fn test_conditional_blocks() {
        let template = "Start{{#if note}}\nNote: {{note}}{{/if}}\nEnd";

        let rendered = render(template, &vars(&[("note", "thin data")]));
        assert_eq!(rendered, "Start\nNote: thin data\nEnd");

        let rendered = render(template, &vars(&[("note", "")]));
        assert_eq!(rendered, "Start\nEnd");

        let rendered = render(template, &HashMap::new());
        assert_eq!(rendered, "Start\nEnd");
    }

    #[test]
    fn test_default_prompts_parse() {
        for id in PromptId::all() {
            let (metadata, body) = parse_prompt(id.default_content()).unwrap();
            assert_eq!(metadata.id, id.as_str());
            assert!(body.contains("# System"));
            assert!(body.contains("# User"));
        }
    }

    #[test]
    fn test_embedded_render() {
        let mut lib = PromptLibrary::embedded_only();
        let prompt = lib.get(PromptId::SpendRecommendations).unwrap();
        assert!(!prompt.is_override());

        let user = prompt.render_user(&vars(&[("score", "64"), ("tier_label", "Needs Improvement")]));
        assert!(user.contains("SpendScore: 64/100 (Needs Improvement)"));
        assert!(!user.contains("Note:"));
        assert!(prompt.render_system(&HashMap::new()).contains("exactly 3"));
    }

    #[test]
    fn test_override_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("spend_recommendations.md"),
            "---\nid: spend_recommendations\nversion: 9\ntask_type: reasoning\n---\n# System\nCustom\n# User\nScore {{score}}\n",
        )
        .unwrap();

        let mut lib = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        let prompt = lib.get(PromptId::SpendRecommendations).unwrap();
        assert!(prompt.is_override());
        assert_eq!(prompt.metadata.version, 9);
        assert_eq!(prompt.render_user(&vars(&[("score", "70")])), "Score 70");
    }

    #[test]
    fn test_missing_override_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        assert!(lib.override_path(PromptId::SpendRecommendations).is_none());
        assert!(!lib.get(PromptId::SpendRecommendations).unwrap().is_override());
    }
}
