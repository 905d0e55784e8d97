// Review Prompt
//
// Builds the text sent to the model: review instructions followed by the
// Dockerfile content.

use crate::config::PromptConfig;
use lerelais::{RelaisError, Result};
use std::fs;

/// Built-in review instructions
pub const DEFAULT_TEMPLATE: &str = "\
You are an expert in container security and Docker best practices. Review the \
Dockerfile below.

Structure the answer in Markdown:
1. A short summary of what the image does.
2. Security issues (base image tags, root user, secrets, package hygiene).
3. Optimization opportunities (layer count, cache usage, image size, multi-stage builds).
4. Best-practice violations and potential runtime issues.
5. A corrected Dockerfile in a single fenced code block labelled `dockerfile`.

The corrected Dockerfile must be complete, must start with a FROM instruction, \
and must be the first fenced code block in the answer.

Dockerfile to review:";

/// Instructions followed by a blank line and the Dockerfile
pub fn format_prompt(dockerfile_content: &str, template: &str) -> String {
    format!("{}\n\n{}", template, dockerfile_content)
}

/// Template from `template_file`, or the built-in one
pub fn load_template(config: &PromptConfig) -> Result<String> {
    match &config.template_file {
        Some(path) => {
            let template = fs::read_to_string(path).map_err(|e| {
                RelaisError::io("Failed to read prompt template", Some(path.clone()), e)
            })?;
            if template.trim().is_empty() {
                return Err(RelaisError::config_error(
                    format!("Prompt template is empty: {}", path.display()),
                    Some("Remove prompt.template_file to use the built-in template".to_string()),
                ));
            }
            Ok(template)
        }
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}
