//! Answer synthesis: stuff retrieved chunks into a prompt and complete it.

use std::sync::Arc;

use docqa_core::{
    CompletionRequest, DocqaError, ModelProvider, PromptTemplate, Result, RetryPolicy, retry,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::SearchResult;

/// The phrase the default template asks the model to use when the context
/// does not contain the answer.
pub const NOT_IN_CONTEXT: &str = "answer is not available in the context";

/// Default question-answering prompt. Placeholders: `{context}`, `{question}`.
pub const DEFAULT_TEMPLATE: &str = "Answer the question as detailed as possible from the provided \
context, make sure to provide all the details. If the answer is not in the provided context just \
say, \"answer is not available in the context\", don't provide the wrong answer.

Context:
{context}

Question:
{question}

Answer:
";

/// Default sampling temperature for answers.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// A generated answer and the context it was generated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// The model output, unchanged.
    pub text: String,
    /// Whether the model said the context does not contain the answer.
    pub not_in_context: bool,
    /// The chunks that were placed in the prompt, best first.
    pub sources: Vec<SearchResult>,
}

/// Whether `text` contains [`NOT_IN_CONTEXT`], ignoring case.
pub fn is_not_in_context(text: &str) -> bool {
    text.to_lowercase().contains(NOT_IN_CONTEXT)
}

/// Renders the question-answering prompt and calls the completion model.
pub struct Synthesizer {
    provider: Arc<dyn ModelProvider>,
    template: PromptTemplate,
    temperature: Option<f32>,
    retry: RetryPolicy,
}

impl Synthesizer {
    /// Create a synthesizer using [`DEFAULT_TEMPLATE`] and [`DEFAULT_TEMPERATURE`].
    pub fn new(provider: Arc<dyn ModelProvider>) -> Result<Self> {
        Ok(Self {
            provider,
            template: PromptTemplate::new(DEFAULT_TEMPLATE)?,
            temperature: Some(DEFAULT_TEMPERATURE),
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the prompt template.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] unless the template uses exactly
    /// the `{context}` and `{question}` placeholders.
    pub fn with_template(mut self, template: &str) -> Result<Self> {
        let template = PromptTemplate::new(template)?;
        let vars = template.input_variables();
        for required in ["context", "question"] {
            if !vars.iter().any(|v| v == required) {
                return Err(DocqaError::Configuration(format!(
                    "answer template must contain {{{required}}}"
                )));
            }
        }
        if let Some(extra) = vars.iter().find(|v| *v != "context" && *v != "question") {
            return Err(DocqaError::Configuration(format!(
                "answer template has unknown placeholder {{{extra}}}"
            )));
        }
        self.template = template;
        Ok(self)
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Render the prompt for `question` over `context`.
    pub fn render(&self, question: &str, context: &[SearchResult]) -> Result<String> {
        let context = context.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join("\n\n");
        self.template.format_with([("context", context.as_str()), ("question", question)])
    }

    /// Answer `question` from `context`.
    ///
    /// The model is called even when `context` is empty; its reply is
    /// returned as-is, with the not-in-context flag set if it used the
    /// sentinel phrase.
    pub async fn synthesize(&self, question: &str, context: &[SearchResult]) -> Result<Answer> {
        let mut request = CompletionRequest::new(self.render(question, context)?);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        let text =
            retry(&self.retry, "synthesize answer", || self.provider.complete(&request)).await?;
        let not_in_context = is_not_in_context(&text);

        info!(
            model = self.provider.completion_model(),
            context_chunks = context.len(),
            not_in_context,
            "answer synthesized"
        );
        Ok(Answer { text, not_in_context, sources: context.to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use docqa_core::ErrorKind;
    use docqa_model::MockProvider;

    use super::*;

    #[test]
    fn sentinel_match_ignores_case() {
        assert!(is_not_in_context("Answer is NOT available in the context."));
        assert!(!is_not_in_context("The answer is 42."));
    }

    #[test]
    fn custom_template_needs_both_placeholders() {
        let synth = Synthesizer::new(Arc::new(MockProvider::new(4))).unwrap();
        let err = synth.with_template("Question: {question}").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let synth = Synthesizer::new(Arc::new(MockProvider::new(4))).unwrap();
        let err = synth.with_template("{context} {question} {tone}").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let synth = Synthesizer::new(Arc::new(MockProvider::new(4))).unwrap();
        let synth = synth.with_template("Q: {question}\nC: {context}").unwrap();
        assert_eq!(synth.render("why?", &[]).unwrap(), "Q: why?\nC: ");
    }

    #[tokio::test]
    async fn temperature_is_sent_with_the_prompt() {
        let provider = Arc::new(MockProvider::new(4).with_reply("Ownership."));
        let synth = Synthesizer::new(provider.clone()).unwrap();
        let answer = synth.synthesize("What is Rust known for?", &[]).await.unwrap();

        assert_eq!(answer.text, "Ownership.");
        assert!(!answer.not_in_context);
        let requests = provider.requests();
        assert_eq!(requests[0].temperature, Some(DEFAULT_TEMPERATURE));
        assert!(requests[0].prompt.contains("Question:\nWhat is Rust known for?"));
    }
}
