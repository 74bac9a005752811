use chrono::NaiveDate;
use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

use crate::tools::SEARCH_TOOL_NAME;

const SYSTEM_PROMPT: &str = include_str!("prompts/system.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

#[derive(Serialize)]
struct SystemPromptContext {
    current_date: String,
    search_tool: &'static str,
}

/// Render the analyst's system prompt for `today`
pub fn system_prompt(today: NaiveDate) -> Result<String, TeraError> {
    let context = SystemPromptContext {
        current_date: today.format("%d.%m.%Y.").to_string(),
        search_tool: SEARCH_TOOL_NAME,
    };
    load_prompt(SYSTEM_PROMPT, &context)
}

/// The user turn wrapping a raw prompt
pub fn user_prompt(prompt: &str) -> String {
    format!("User prompt: {}", prompt)
}
