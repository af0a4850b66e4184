//! Prompt construction for rename requests.
//!
//! [`PromptAssembler`] is the single place the request text is formatted.
//! The cost estimator and the live batch both go through it, so the
//! estimated and the sent prompt are always the same string.

use serde::Serialize;

/// Instruction used when the caller does not supply one
pub const DEFAULT_INSTRUCTION: &str = "Rename this file with a concise, descriptive name based on its content. \
Use underscores between words, keep it under 60 characters, put dates first in YYYY-MM-DD form when the \
content has an important date, and keep the original file extension.";

const EXAMPLES_HEADER: &str = "\nPrevious rename examples for consistency:\n";

const RESPONSE_INSTRUCTION: &str =
    "Please provide only the new filename (with extension), nothing else.";

/// A prior (original -> new) rename shown to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameExample {
    pub original_name: String,
    pub new_name: String,
}

impl RenameExample {
    pub fn new(original_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            new_name: new_name.into(),
        }
    }
}

/// One fully assembled generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub instruction: String,
    /// Window snapshot, oldest first
    pub examples: Vec<RenameExample>,
    pub original_name: String,
    pub excerpt: String,
    prompt: String,
}

impl GenerationRequest {
    /// The exact text sent as the user message
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Character count of the prompt, the basis for token estimates
    pub fn char_count(&self) -> usize {
        self.prompt.chars().count()
    }
}

/// Combines instruction, example window, name and excerpt into a request
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    instruction: String,
}

impl PromptAssembler {
    /// Blank or missing instructions select [`DEFAULT_INSTRUCTION`]
    pub fn new(instruction: Option<&str>) -> Self {
        let instruction = instruction
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .unwrap_or(DEFAULT_INSTRUCTION);

        Self {
            instruction: instruction.to_string(),
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn assemble(
        &self,
        examples: &[RenameExample],
        original_name: &str,
        excerpt: &str,
    ) -> GenerationRequest {
        let prompt = format!(
            "Instruction: {}\n{}\nOriginal filename: {}\n\nFile content (excerpt):\n{}\n\n{}",
            self.instruction,
            format_examples(examples),
            original_name,
            excerpt,
            RESPONSE_INSTRUCTION
        );

        GenerationRequest {
            instruction: self.instruction.clone(),
            examples: examples.to_vec(),
            original_name: original_name.to_string(),
            excerpt: excerpt.to_string(),
            prompt,
        }
    }
}

/// Render the consistency window; empty when there is nothing to show
fn format_examples(examples: &[RenameExample]) -> String {
    if examples.is_empty() {
        return String::new();
    }

    let mut text = String::from(EXAMPLES_HEADER);
    for example in examples {
        text.push_str(&format!(
            "  {} -> {}\n",
            example.original_name, example.new_name
        ));
    }
    text
}
