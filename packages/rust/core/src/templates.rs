//! Ready-made brainstorm topics and topic source resolution.

use brainstorm_shared::{BrainstormError, Result};

/// A named topic with its default context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicTemplate {
    pub name: &'static str,
    pub topic: &'static str,
    pub context: &'static str,
}

/// Fixed template table, in display order.
pub const TEMPLATES: &[TopicTemplate] = &[
    TopicTemplate {
        name: "product",
        topic: "Development of an innovative product",
        context: "Need to create a product that solves a real user problem and will be commercially successful",
    },
    TopicTemplate {
        name: "ecology",
        topic: "Improving urban ecology with technology",
        context: "Focus on solutions that can be implemented within 2-3 years and will give measurable effect",
    },
    TopicTemplate {
        name: "education",
        topic: "Revolution in online education with AI",
        context: "How to make distance learning more effective and engaging than traditional education",
    },
    TopicTemplate {
        name: "startup",
        topic: "Creating an AI technology startup",
        context: "Budget up to $100k, team of 3-5 people, planning horizon 12 months",
    },
];

/// Look up a template by name.
pub fn template(name: &str) -> Option<&'static TopicTemplate> {
    TEMPLATES.iter().find(|t| t.name == name)
}

/// Where a run's topic comes from. Exactly one source is used per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicSource {
    Explicit { topic: String, context: Option<String> },
    Template(String),
}

impl TopicSource {
    /// Resolve to a `(topic, context)` pair.
    pub fn resolve(&self) -> Result<(String, Option<String>)> {
        match self {
            Self::Explicit { topic, context } => Ok((topic.clone(), context.clone())),
            Self::Template(name) => {
                let t = template(name).ok_or_else(|| {
                    let known: Vec<&str> = TEMPLATES.iter().map(|t| t.name).collect();
                    BrainstormError::invalid_input(format!(
                        "unknown template '{name}': expected one of {}",
                        known.join(", ")
                    ))
                })?;
                Ok((t.topic.to_string(), Some(t.context.to_string())))
            }
        }
    }
}
