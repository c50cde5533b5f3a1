//! Chain stages.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use docqa_core::{
    CompletionRequest, DocqaError, ModelProvider, PromptTemplate, Result, RetryPolicy, retry,
};
use tracing::debug;

/// Named values flowing through a chain.
pub type Values = HashMap<String, String>;

/// One step of a [`SequentialChain`](crate::SequentialChain).
///
/// A stage reads the values named by [`input_keys`](Stage::input_keys) and
/// returns new values for every key in [`output_keys`](Stage::output_keys).
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn input_keys(&self) -> &[String];

    fn output_keys(&self) -> &[String];

    async fn run(&self, values: &Values) -> Result<Values>;
}

/// Renders a prompt template from the chain's values and stores the model's
/// reply, trimmed, under a single output key.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_chain::LlmStage;
///
/// let stage = LlmStage::new(
///     "name",
///     provider,
///     "I want to open a restaurant for {cuisine} food. Suggest a fancy name for it.",
///     "restaurant_name",
/// )?
/// .with_temperature(0.6);
/// ```
pub struct LlmStage {
    name: String,
    provider: Arc<dyn ModelProvider>,
    template: PromptTemplate,
    output_keys: Vec<String>,
    system: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    retry: RetryPolicy,
}

impl LlmStage {
    /// Create a stage whose inputs are the template's placeholders.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] if the template does not parse.
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn ModelProvider>,
        template: &str,
        output_key: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            provider,
            template: PromptTemplate::new(template)?,
            output_keys: vec![output_key.into()],
            system: None,
            temperature: None,
            max_tokens: None,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    fn request(&self, values: &Values) -> Result<CompletionRequest> {
        let mut request = CompletionRequest::new(self.template.format(values)?);
        request.system = self.system.clone();
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        Ok(request)
    }
}

#[async_trait]
impl Stage for LlmStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_keys(&self) -> &[String] {
        self.template.input_variables()
    }

    fn output_keys(&self) -> &[String] {
        &self.output_keys
    }

    async fn run(&self, values: &Values) -> Result<Values> {
        let request = self.request(values)?;
        debug!(stage = %self.name, prompt_len = request.prompt.len(), "running llm stage");

        let text = retry(&self.retry, &self.name, || self.provider.complete(&request)).await?;
        Ok(self.output_keys.iter().map(|key| (key.clone(), text.trim().to_string())).collect())
    }
}

type Transform = dyn Fn(&Values) -> Result<Values> + Send + Sync;

/// A synchronous transformation between model calls.
pub struct FnStage {
    name: String,
    input_keys: Vec<String>,
    output_keys: Vec<String>,
    f: Box<Transform>,
}

impl FnStage {
    pub fn new<I, O, F>(name: impl Into<String>, input_keys: I, output_keys: O, f: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
        F: Fn(&Values) -> Result<Values> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            input_keys: input_keys.into_iter().map(Into::into).collect(),
            output_keys: output_keys.into_iter().map(Into::into).collect(),
            f: Box::new(f),
        }
    }
}

#[async_trait]
impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_keys(&self) -> &[String] {
        &self.input_keys
    }

    fn output_keys(&self) -> &[String] {
        &self.output_keys
    }

    async fn run(&self, values: &Values) -> Result<Values> {
        for key in &self.input_keys {
            if !values.contains_key(key) {
                return Err(DocqaError::Configuration(format!(
                    "stage '{}' is missing input '{key}'",
                    self.name
                )));
            }
        }
        (self.f)(values)
    }
}
