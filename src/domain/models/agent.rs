//! Agent descriptor parser for `.maestro/agents/*.md` files.
//!
//! Descriptors use YAML frontmatter + markdown body format:
//! ```markdown
//! ---
//! name: backend-dev
//! description: Implements server-side services. Use for API and database work.
//! keywords:
//!   - backend
//!   - api
//! tools:
//!   - read
//!   - write
//!   - shell
//! temperature: 0.4
//! max_tokens: 4000
//! ---
//!
//! You are a backend engineer...
//! ```
//! The markdown body after the closing `---` is the system prompt.

use serde::{Deserialize, Serialize};

/// Tool identifiers agents may request. Unknown identifiers fail validation.
pub const TOOL_CATALOGUE: &[&str] = &[
    "read",
    "write",
    "edit",
    "shell",
    "search",
    "grep",
    "glob",
    "web_fetch",
    "debugger",
    "test_runner",
    "screenshot",
    "browser_screenshot",
];

/// Where a descriptor was loaded from. Project entries shadow user entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentScope {
    Project,
    User,
    Builtin,
}

impl AgentScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::User => "user",
            Self::Builtin => "builtin",
        }
    }
}

/// A usage example attached to a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentExample {
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub description: String,
}

/// An immutable agent descriptor. Replaced atomically on reload, never
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique lowercase-hyphenated name.
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub color: Option<String>,
    #[serde(default)]
    pub examples: Vec<AgentExample>,
    /// The markdown body after the closing `---`.
    pub system_prompt: String,
    pub scope: AgentScope,
}

impl AgentDescriptor {
    /// Parse a descriptor file into an `AgentDescriptor`.
    ///
    /// Expected format: YAML frontmatter between `---` markers, followed by
    /// the markdown body which becomes the system prompt. Tolerant of
    /// trailing whitespace and blank lines.
    pub fn parse(content: &str, scope: AgentScope) -> Result<AgentDescriptor, String> {
        let trimmed = content.trim();

        if !trimmed.starts_with("---") {
            return Err("Agent descriptor must start with YAML frontmatter (---)".to_string());
        }

        let after_first = &trimmed[3..];
        let closing_idx = after_first
            .find("\n---")
            .ok_or_else(|| "Missing closing --- for YAML frontmatter".to_string())?;

        let yaml_str = after_first[..closing_idx].trim();
        let body_start = closing_idx + 4; // skip "\n---"
        let system_prompt = after_first[body_start..].trim().to_string();

        let header: Frontmatter = serde_yaml::from_str(yaml_str)
            .map_err(|e| format!("Failed to parse YAML frontmatter: {}", e))?;

        let descriptor = AgentDescriptor {
            name: header.name.to_lowercase(),
            description: header.description,
            keywords: header.keywords,
            tools: header.tools,
            model: header.model,
            provider: header.provider,
            temperature: header.temperature,
            max_tokens: header.max_tokens,
            color: header.color,
            examples: header.examples,
            system_prompt,
            scope,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Validate the descriptor against the schema.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(format!(
                "Agent name '{}' must be lowercase-hyphenated",
                self.name
            ));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(format!(
                "Agent '{}': temperature {} out of range [0, 1]",
                self.name, self.temperature
            ));
        }
        if !(100..=10_000).contains(&self.max_tokens) {
            return Err(format!(
                "Agent '{}': max_tokens {} out of range [100, 10000]",
                self.name, self.max_tokens
            ));
        }
        for tool in &self.tools {
            if !TOOL_CATALOGUE.contains(&tool.as_str()) {
                return Err(format!(
                    "Agent '{}': unknown tool '{}'",
                    self.name, tool
                ));
            }
        }
        if self.system_prompt.is_empty() {
            return Err(format!(
                "Agent '{}': descriptor must have a markdown body (system prompt)",
                self.name
            ));
        }
        Ok(())
    }

    /// Serialize back to `.md` format (YAML frontmatter + markdown body).
    pub fn to_markdown(&self) -> String {
        let mut yaml_parts = vec![
            format!("name: {}", self.name),
            format!("description: {}", self.description),
        ];

        if let Some(ref color) = self.color {
            yaml_parts.push(format!("color: {}", color));
        }
        if !self.keywords.is_empty() {
            yaml_parts.push("keywords:".to_string());
            for keyword in &self.keywords {
                yaml_parts.push(format!("  - {}", keyword));
            }
        }
        if !self.tools.is_empty() {
            yaml_parts.push("tools:".to_string());
            for tool in &self.tools {
                yaml_parts.push(format!("  - {}", tool));
            }
        }
        if let Some(ref model) = self.model {
            yaml_parts.push(format!("model: {}", model));
        }
        if let Some(ref provider) = self.provider {
            yaml_parts.push(format!("provider: {}", provider));
        }
        yaml_parts.push(format!("temperature: {}", self.temperature));
        yaml_parts.push(format!("max_tokens: {}", self.max_tokens));

        if !self.examples.is_empty() {
            yaml_parts.push("examples:".to_string());
            for example in &self.examples {
                yaml_parts.push(format!("  - input: {}", yaml_scalar(&example.input)));
                yaml_parts.push(format!("    output: {}", yaml_scalar(&example.output)));
                if !example.description.is_empty() {
                    yaml_parts.push(format!(
                        "    description: {}",
                        yaml_scalar(&example.description)
                    ));
                }
            }
        }

        format!(
            "---\n{}\n---\n\n{}\n",
            yaml_parts.join("\n"),
            self.system_prompt
        )
    }

    /// The built-in fallback agent, always available even when both agent
    /// roots are missing or empty.
    pub fn general_purpose() -> Self {
        Self {
            name: "general-purpose".to_string(),
            description: "General-purpose software engineering agent. \
                Used when no specialized agent matches a task."
                .to_string(),
            keywords: vec!["general".to_string()],
            tools: vec![
                "read".to_string(),
                "write".to_string(),
                "edit".to_string(),
                "shell".to_string(),
                "search".to_string(),
            ],
            model: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 4096,
            color: None,
            examples: vec![],
            system_prompt: "You are a capable software engineer. Complete the \
                assigned task carefully, report the artifacts you produce, and \
                flag anything that blocks you."
                .to_string(),
            scope: AgentScope::Builtin,
        }
    }
}

/// Quote a scalar for single-line YAML emission.
fn yaml_scalar(s: &str) -> String {
    if s.contains(':') || s.contains('#') || s.contains('"') {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

/// Raw frontmatter shape, deserialized before validation.
#[derive(Debug, Deserialize)]
struct Frontmatter {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    examples: Vec<AgentExample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"---
name: backend-dev
description: Implements server-side services
keywords:
  - backend
  - api
tools:
  - read
  - write
  - shell
temperature: 0.4
max_tokens: 4000
---

You are a backend engineer. Build robust services."#;

    #[test]
    fn test_parse_basic() {
        let agent = AgentDescriptor::parse(BASIC, AgentScope::Project).unwrap();
        assert_eq!(agent.name, "backend-dev");
        assert_eq!(agent.keywords, vec!["backend", "api"]);
        assert_eq!(agent.tools, vec!["read", "write", "shell"]);
        assert!((agent.temperature - 0.4).abs() < f32::EPSILON);
        assert_eq!(agent.max_tokens, 4000);
        assert_eq!(
            agent.system_prompt,
            "You are a backend engineer. Build robust services."
        );
        assert_eq!(agent.scope, AgentScope::Project);
    }

    #[test]
    fn test_parse_lowercases_name() {
        let content = BASIC.replace("backend-dev", "Backend-Dev");
        let agent = AgentDescriptor::parse(&content, AgentScope::User).unwrap();
        assert_eq!(agent.name, "backend-dev");
    }

    #[test]
    fn test_parse_defaults() {
        let content = "---\nname: minimal\ndescription: d\n---\n\nPrompt body.";
        let agent = AgentDescriptor::parse(content, AgentScope::User).unwrap();
        assert!((agent.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(agent.max_tokens, 4096);
        assert!(agent.tools.is_empty());
    }

    #[test]
    fn test_parse_examples() {
        let content = r#"---
name: reviewer
description: Reviews code
examples:
  - input: review src/lib.rs
    output: found two issues
    description: basic review
---

Review carefully."#;
        let agent = AgentDescriptor::parse(content, AgentScope::Project).unwrap();
        assert_eq!(agent.examples.len(), 1);
        assert_eq!(agent.examples[0].input, "review src/lib.rs");
    }

    #[test]
    fn test_parse_missing_frontmatter() {
        assert!(AgentDescriptor::parse("no frontmatter here", AgentScope::User).is_err());
    }

    #[test]
    fn test_parse_missing_body() {
        let content = "---\nname: test\ndescription: d\n---\n";
        assert!(AgentDescriptor::parse(content, AgentScope::User).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_temperature() {
        let content = BASIC.replace("temperature: 0.4", "temperature: 1.5");
        assert!(AgentDescriptor::parse(&content, AgentScope::User).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_max_tokens() {
        let content = BASIC.replace("max_tokens: 4000", "max_tokens: 50");
        assert!(AgentDescriptor::parse(&content, AgentScope::User).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_tool() {
        let content = BASIC.replace("  - shell", "  - teleport");
        assert!(AgentDescriptor::parse(&content, AgentScope::User).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_name() {
        let content = BASIC.replace("name: backend-dev", "name: backend_dev!");
        assert!(AgentDescriptor::parse(&content, AgentScope::User).is_err());
    }

    #[test]
    fn test_markdown_round_trip() {
        let agent = AgentDescriptor::parse(BASIC, AgentScope::Project).unwrap();
        let markdown = agent.to_markdown();
        let reparsed = AgentDescriptor::parse(&markdown, AgentScope::Project).unwrap();
        assert_eq!(agent, reparsed);
    }

    #[test]
    fn test_general_purpose_is_valid() {
        let agent = AgentDescriptor::general_purpose();
        assert!(agent.validate().is_ok());
        assert_eq!(agent.scope, AgentScope::Builtin);
    }
}
