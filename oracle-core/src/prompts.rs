//! Prompt templates for table and conflict-map generation.

use crate::conflict::{AnimosityType, APPROACHES, APPROACH_DICE};

pub const TABLES_SYSTEM: &str = "You are a generator of RPG oracle tables.";

pub const CONFLICT_SYSTEM: &str = "You are a narrative conflict mapping assistant for RPG \
worldbuilding. Your response should be in JSON format.";

/// Tone used when none is given.
pub const DEFAULT_TONE: &str = "proto-transhuman solarpunk apocalypse";

/// Prompt asking for four oracle tables in the given tone.
pub fn oracle_tables_prompt(tone: &str) -> String {
    include_str!("prompts/oracle_tables.txt").replace("{{tone}}", tone.trim())
}

/// Prompt asking for protagonists and a conflict matrix built from `elements`.
pub fn conflict_map_prompt(elements: &[String]) -> String {
    let listed = elements
        .iter()
        .enumerate()
        .map(|(i, element)| format!("{}. {}", i + 1, element.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    let dice = APPROACH_DICE
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    include_str!("prompts/conflict_map.txt")
        .replace("{{elements}}", &listed)
        .replace("{{dice}}", &dice)
        .replace("{{approaches}}", &APPROACHES.join(", "))
        .replace("{{animosities}}", &AnimosityType::vocabulary())
}
