//! Prompt Builder
//!
//! Sectioned prompt construction shared by every agent, so that role,
//! context, and output rules always appear in the same order and format.

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Who the model is playing
    Role(String),
    /// Numbered tasks
    Objectives(Vec<String>),
    /// Ordered key/value facts
    Context(Vec<(String, String)>),
    /// Free text with optional header
    Text {
        header: Option<String>,
        content: String,
    },
    /// Bulleted list with header
    List { header: String, items: Vec<String> },
    /// Hard constraints on the answer
    Rules(Vec<String>),
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, role: &str) -> Self {
        self.sections.push(PromptSection::Role(role.to_string()));
        self
    }

    pub fn objectives(mut self, objectives: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.into_iter().map(String::from).collect(),
        ));
        self
    }

    /// Add a context item; items keep insertion order
    pub fn context_item(mut self, key: &str, value: impl ToString) -> Self {
        let entry = (key.to_string(), value.to_string());
        match self.sections.iter_mut().find_map(|s| match s {
            PromptSection::Context(items) => Some(items),
            _ => None,
        }) {
            Some(items) => items.push(entry),
            None => self.sections.push(PromptSection::Context(vec![entry])),
        }
        self
    }

    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    /// Bulleted list; skipped entirely when `items` is empty
    pub fn list<S: AsRef<str>>(mut self, header: &str, items: &[S]) -> Self {
        if !items.is_empty() {
            self.sections.push(PromptSection::List {
                header: header.to_string(),
                items: items.iter().map(|s| s.as_ref().to_string()).collect(),
            });
        }
        self
    }

    pub fn rules(mut self, rules: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Rules(
            rules.into_iter().map(String::from).collect(),
        ));
        self
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role(role) => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&role);
                    prompt.push_str("\n</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Context(items) => {
                    prompt.push_str("# Context\n\n");
                    for (key, value) in items {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::List { header, items } => {
                    prompt.push_str(&format!("# {}\n\n", header));
                    for item in items {
                        prompt.push_str(&format!("- {}\n", item));
                    }
                    prompt.push('\n');
                }
                PromptSection::Rules(rules) => {
                    prompt.push_str("<RULES>\n");
                    for rule in rules {
                        prompt.push_str(&format!("- {}\n", rule));
                    }
                    prompt.push_str("</RULES>\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}
