//! Sequential composition of stages.

use std::collections::HashSet;
use std::sync::Arc;

use docqa_core::{DocqaError, Result};
use tracing::{debug, error, info};

use crate::stage::{Stage, Values};

/// Runs stages in order over a shared set of named values.
///
/// Each stage sees the chain inputs plus everything earlier stages produced.
/// The wiring is checked once, when the chain is built.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_chain::{LlmStage, SequentialChain};
///
/// let chain = SequentialChain::builder()
///     .input_variables(["cuisine"])
///     .stage(name_stage)
///     .stage(menu_stage)
///     .output_variables(["restaurant_name", "menu_items"])
///     .build()?;
///
/// let out = chain.run(Values::from([("cuisine".into(), "Korean".into())])).await?;
/// ```
pub struct SequentialChain {
    input_variables: Vec<String>,
    output_variables: Vec<String>,
    stages: Vec<Arc<dyn Stage>>,
}

impl SequentialChain {
    pub fn builder() -> SequentialChainBuilder {
        SequentialChainBuilder::default()
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    pub fn output_variables(&self) -> &[String] {
        &self.output_variables
    }

    /// Run every stage and return the requested output variables.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] if an input variable is missing
    /// or a stage fails to produce one of its declared outputs. Stage
    /// errors are returned unchanged.
    pub async fn run(&self, inputs: Values) -> Result<Values> {
        for key in &self.input_variables {
            if !inputs.contains_key(key) {
                return Err(DocqaError::Configuration(format!("missing chain input '{key}'")));
            }
        }

        let mut values = inputs;
        for stage in &self.stages {
            debug!(stage = stage.name(), "running stage");
            let mut produced = stage.run(&values).await.inspect_err(|e| {
                error!(stage = stage.name(), error = %e, "stage failed");
            })?;
            for key in stage.output_keys() {
                let value = produced.remove(key).ok_or_else(|| {
                    DocqaError::Configuration(format!(
                        "stage '{}' did not produce '{key}'",
                        stage.name()
                    ))
                })?;
                values.insert(key.clone(), value);
            }
        }

        info!(stages = self.stages.len(), "chain completed");
        Ok(self
            .output_variables
            .iter()
            .filter_map(|key| values.get(key).map(|v| (key.clone(), v.clone())))
            .collect())
    }
}

/// Builder for a validated [`SequentialChain`].
#[derive(Default)]
pub struct SequentialChainBuilder {
    input_variables: Vec<String>,
    output_variables: Option<Vec<String>>,
    stages: Vec<Arc<dyn Stage>>,
}

impl SequentialChainBuilder {
    pub fn input_variables<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.input_variables = names.into_iter().map(Into::into).collect();
        self
    }

    /// Append a stage. Order matters.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn shared_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Values to return from [`SequentialChain::run`]. Defaults to the last
    /// stage's outputs.
    pub fn output_variables<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.output_variables = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Check the wiring and build the chain.
    ///
    /// # Errors
    ///
    /// Returns [`DocqaError::Configuration`] if:
    /// - there are no stages
    /// - a stage needs a value that neither the inputs nor an earlier stage provide
    /// - a stage output would overwrite an input or an earlier output
    /// - a requested output variable is never produced
    pub fn build(self) -> Result<SequentialChain> {
        if self.stages.is_empty() {
            return Err(DocqaError::Configuration("a chain needs at least one stage".into()));
        }

        let mut available: HashSet<&str> =
            self.input_variables.iter().map(String::as_str).collect();
        for stage in &self.stages {
            for key in stage.input_keys() {
                if !available.contains(key.as_str()) {
                    return Err(DocqaError::Configuration(format!(
                        "stage '{}' needs '{key}', which no input or earlier stage provides",
                        stage.name()
                    )));
                }
            }
            for key in stage.output_keys() {
                if !available.insert(key.as_str()) {
                    return Err(DocqaError::Configuration(format!(
                        "stage '{}' output '{key}' would overwrite an existing value",
                        stage.name()
                    )));
                }
            }
        }

        let output_variables = match self.output_variables {
            Some(names) => names,
            None => self.stages.last().map(|s| s.output_keys().to_vec()).unwrap_or_default(),
        };
        if let Some(missing) = output_variables.iter().find(|k| !available.contains(k.as_str())) {
            return Err(DocqaError::Configuration(format!(
                "output variable '{missing}' is never produced"
            )));
        }

        Ok(SequentialChain {
            input_variables: self.input_variables,
            output_variables,
            stages: self.stages,
        })
    }
}
