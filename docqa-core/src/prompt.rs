//! Prompt templates with `{name}` placeholders.
//!
//! Templates keep the familiar single-brace placeholder syntax and are
//! compiled into a minijinja template once, when they are created. Values
//! are looked up by key, so a placeholder may use a name that Jinja treats
//! as a keyword (`{none}`, `{not}`).

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use minijinja::{Environment, UndefinedBehavior, context};

use crate::error::{DocqaError, Result};

static ENVIRONMENT: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
});

fn template_error(e: minijinja::Error) -> DocqaError {
    DocqaError::Configuration(format!("prompt template error: {e}"))
}

/// A prompt with named placeholders, parsed once and rendered many times.
///
/// Placeholders are written `{name}` where `name` is made of ASCII letters,
/// digits and underscores. Literal braces are written `{{` and `}}`.
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use docqa_core::PromptTemplate;
///
/// let template = PromptTemplate::new("Tell me about {name}").unwrap();
/// let values = HashMap::from([("name".to_string(), "Ada Lovelace".to_string())]);
/// assert_eq!(template.format(&values).unwrap(), "Tell me about Ada Lovelace");
/// ```
#[derive(Clone)]
pub struct PromptTemplate {
    source: String,
    compiled: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    /// Parse a template.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] on an unclosed `{`, a stray `}`,
    /// or a placeholder name that is empty or contains other characters.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let mut compiled = String::with_capacity(source.len() + 16);
        let mut variables: Vec<String> = Vec::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    compiled.push_str(r#"{{ "{" }}"#);
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    compiled.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(DocqaError::Configuration(format!(
                            "unclosed '{{' in prompt template near '{{{name}'"
                        )));
                    }
                    let name = name.trim().to_string();
                    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    {
                        return Err(DocqaError::Configuration(format!(
                            "invalid placeholder '{{{name}}}' in prompt template"
                        )));
                    }
                    compiled.push_str(&format!(r#"{{{{ vars["{name}"] }}}}"#));
                    if !variables.contains(&name) {
                        variables.push(name);
                    }
                }
                '}' => {
                    return Err(DocqaError::Configuration(
                        "unmatched '}' in prompt template (use '}}' for a literal brace)".into(),
                    ));
                }
                other => compiled.push(other),
            }
        }

        ENVIRONMENT.template_from_str(&compiled).map_err(template_error)?;
        Ok(Self { source, compiled, variables })
    }

    /// The template text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of first appearance, without duplicates.
    pub fn input_variables(&self) -> &[String] {
        &self.variables
    }

    /// Render the template.
    ///
    /// Values that no placeholder refers to are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] naming the first placeholder
    /// with no value.
    pub fn format(&self, values: &HashMap<String, String>) -> Result<String> {
        if let Some(name) = self.variables.iter().find(|name| !values.contains_key(*name)) {
            return Err(DocqaError::Configuration(format!(
                "missing value for prompt variable '{name}'"
            )));
        }
        ENVIRONMENT
            .render_str(&self.compiled, context! { vars => values })
            .map_err(template_error)
    }

    /// Render from `(name, value)` pairs.
    pub fn format_with<'a, I>(&self, pairs: I) -> Result<String>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let values: HashMap<String, String> =
            pairs.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        self.format(&values)
    }
}

impl fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptTemplate")
            .field("source", &self.source)
            .field("variables", &self.variables)
            .finish()
    }
}

impl PartialEq for PromptTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PromptTemplate {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn collects_variables_in_order() {
        let template = PromptTemplate::new(
            "Write a blog for {target_audience} about {blog_topic} in {num_words} words. {blog_topic}!",
        )
        .unwrap();
        assert_eq!(template.input_variables(), ["target_audience", "blog_topic", "num_words"]);
    }

    #[test]
    fn renders_escaped_braces() {
        let template = PromptTemplate::new("{{\"name\": \"{name}\"}}").unwrap();
        let rendered = template.format_with([("name", "Curry House")]).unwrap();
        assert_eq!(rendered, "{\"name\": \"Curry House\"}");
    }

    #[test]
    fn missing_value_is_configuration_error() {
        let template = PromptTemplate::new("{context} / {question}").unwrap();
        let err = template.format_with([("context", "c")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("question"));
    }

    #[test]
    fn keeps_whitespace_and_jinja_lookalikes_verbatim() {
        let template = PromptTemplate::new("{{% raw %}} {{#x#}} {{ {name} }}\n").unwrap();
        let rendered = template.format_with([("name", "Ada")]).unwrap();
        assert_eq!(rendered, "{% raw %} {#x#} { Ada }\n");
    }

    #[test]
    fn keyword_names_are_plain_variables() {
        let template = PromptTemplate::new("{none} and {true}").unwrap();
        let rendered = template.format_with([("none", "zero"), ("true", "yes")]).unwrap();
        assert_eq!(rendered, "zero and yes");
    }

    #[test]
    fn values_are_not_reinterpreted() {
        let template = PromptTemplate::new("Q: {question}").unwrap();
        let rendered = template.format_with([("question", "what is {{ 1 + 1 }}?")]).unwrap();
        assert_eq!(rendered, "Q: what is {{ 1 + 1 }}?");
    }

    #[test]
    fn rejects_malformed_templates() {
        for bad in ["open {name", "stray } brace", "{}", "{two words}"] {
            let err = PromptTemplate::new(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "template: {bad}");
        }
    }
}
