//! # docqa-chain
//!
//! Prompt chains: named [`Stage`]s run in order by a [`SequentialChain`],
//! each reading the values produced before it.
//!
//! ```rust,ignore
//! use docqa_chain::{Values, restaurant_chain};
//!
//! let chain = restaurant_chain(provider)?;
//! let out = chain.run(Values::from([("cuisine".into(), "Mexican".into())])).await?;
//! println!("{}\n{}", out["restaurant_name"], out["menu_items"]);
//! ```

pub mod chain;
pub mod restaurant;
pub mod stage;
pub mod template;

pub use chain::{SequentialChain, SequentialChainBuilder};
pub use restaurant::{parse_menu, restaurant_chain};
pub use stage::{FnStage, LlmStage, Stage, Values};
pub use template::{GENERATED_TEXT, template_chain};
