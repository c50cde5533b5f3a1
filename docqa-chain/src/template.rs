//! Free-form generation from one prompt template.
//!
//! The chain's inputs are exactly the template's placeholders, so a missing
//! value is reported by [`SequentialChain::run`] before the model is called.

use docqa_core::Result;

use crate::chain::SequentialChain;
use crate::stage::{LlmStage, Stage};

/// The key under which the generated text is returned.
pub const GENERATED_TEXT: &str = "generated_text";

/// Wrap a single [`LlmStage`] in a chain whose inputs are its placeholders.
///
/// ```rust,ignore
/// let stage = LlmStage::new("blog", provider, "Write a blog about {blog_topic}", GENERATED_TEXT)?;
/// let chain = template_chain(stage)?;
/// let out = chain.run(Values::from([("blog_topic".into(), "lifetimes".into())])).await?;
/// ```
pub fn template_chain(stage: LlmStage) -> Result<SequentialChain> {
    let inputs = stage.input_keys().to_vec();
    SequentialChain::builder().input_variables(inputs).stage(stage).build()
}
