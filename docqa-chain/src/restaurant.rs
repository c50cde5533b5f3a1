//! The restaurant name and menu generator: a two-stage chain.

use std::sync::Arc;

use docqa_core::{ModelProvider, Result};

use crate::chain::SequentialChain;
use crate::stage::LlmStage;

pub const NAME_TEMPLATE: &str =
    "I want to open a restaurant for {cuisine} food. Suggest a fancy name for it. Only one name please.";

pub const MENU_TEMPLATE: &str = "Please suggest 10-15 menu items for {restaurant_name} with \
fictitious prices. Return as comma separated list of tuples enclosed in [], example \
[(menu_item1, price1), (menu_item2, price2),...]";

pub const TEMPERATURE: f32 = 0.6;

/// `cuisine` → `restaurant_name` → `menu_items`.
pub fn restaurant_chain(provider: Arc<dyn ModelProvider>) -> Result<SequentialChain> {
    let name = LlmStage::new("restaurant_name", provider.clone(), NAME_TEMPLATE, "restaurant_name")?
        .with_temperature(TEMPERATURE);
    let menu = LlmStage::new("menu_items", provider, MENU_TEMPLATE, "menu_items")?
        .with_temperature(TEMPERATURE);

    SequentialChain::builder()
        .input_variables(["cuisine"])
        .stage(name)
        .stage(menu)
        .output_variables(["restaurant_name", "menu_items"])
        .build()
}

/// Pull `(item, price)` pairs out of a reply shaped like
/// `[(Butter Chicken, $18), (Naan, $4)]`.
///
/// Quotes around either field are removed. Groups without a comma are
/// skipped, so a reply in some other shape yields an empty list.
pub fn parse_menu(text: &str) -> Vec<(String, String)> {
    let clean = |s: &str| s.trim().trim_matches(|c: char| c == '"' || c == '\'').trim().to_string();
    text.split('(')
        .skip(1)
        .filter_map(|group| {
            let inner = &group[..group.find(')')?];
            let (item, price) = inner.rsplit_once(',')?;
            Some((clean(item), clean(price)))
        })
        .filter(|(item, _)| !item.is_empty())
        .collect()
}
