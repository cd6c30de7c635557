//! Prompt Library for the search collaborator
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/rival/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! This allows users to tune the wording without modifying the source,
//! while automatically getting new default prompts on upgrade.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const COMPETITOR_SEARCH: &str = include_str!("../../../prompts/competitor_search.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Market search for cheaper alternatives to a recurring expense
    CompetitorSearch,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompetitorSearch => "competitor_search",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[Self::CompetitorSearch]
    }

    /// Get the default embedded content for this prompt
    fn default_content(&self) -> &'static str {
        match self {
            Self::CompetitorSearch => defaults::COMPETITOR_SEARCH,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Metadata from frontmatter
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
}

impl Prompt {
    /// Render the prompt with template variables replaced
    ///
    /// Values are inserted verbatim except for template braces, which are
    /// flattened so caller text can never introduce placeholders. Rendering
    /// is therefore independent of the order variables are applied in.
    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        let mut result = self.content.clone();

        // Simple mustache-style replacement: {{var}}
        for (key, value) in vars {
            let pattern = format!("{{{{{}}}}}", key);
            result = result.replace(&pattern, &sanitize_value(value));
        }

        // Conditional blocks: {{#if var}}...{{/if}}
        remove_unmatched_conditionals(&result, vars)
    }
}

/// Prompt library for loading prompts
pub struct PromptLibrary {
    /// Override directory path
    override_dir: Option<PathBuf>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self { override_dir: None }
    }

    /// Load a prompt (checking override first, then default)
    pub fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(ref override_dir) = self.override_dir {
            let override_path = override_dir.join(format!("{}.md", id.as_str()));
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::Config(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                tracing::info!(
                    prompt = id.as_str(),
                    version = metadata.version,
                    path = %override_path.display(),
                    "Using prompt override"
                );
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
        })
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("rival").join("prompts").join("overrides"))
}

/// Split a prompt file into its YAML frontmatter and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let rest = content.trim().strip_prefix("---").ok_or_else(|| {
        Error::Config("Prompt must start with YAML frontmatter (---)".into())
    })?;
    let (frontmatter, body) = rest.split_once("---").ok_or_else(|| {
        Error::Config("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter.trim())
        .map_err(|e| Error::Config(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.trim().to_string()))
}

fn sanitize_value(value: &str) -> String {
    let mut value = value.to_string();
    while value.contains("{{") || value.contains("}}") {
        value = value.replace("{{", "{").replace("}}", "}");
    }
    value
}

/// Resolve `{{#if var}}...{{/if}}` blocks
///
/// A block is kept (markers stripped) when `var` is present and non-empty,
/// otherwise dropped. Blocks do not nest; a malformed block is left as is.
fn remove_unmatched_conditionals(content: &str, vars: &HashMap<&str, &str>) -> String {
    const OPEN: &str = "{{#if ";
    const CLOSE: &str = "{{/if}}";

    let mut output = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some((var_name, after_tag)) = after_open.split_once("}}") else {
            break;
        };
        let Some((block, after_block)) = after_tag.split_once(CLOSE) else {
            break;
        };

        output.push_str(&rest[..start]);
        if vars.get(var_name.trim()).is_some_and(|v| !v.is_empty()) {
            output.push_str(block);
        }
        rest = after_block;
    }

    output.push_str(rest);
    output
}
