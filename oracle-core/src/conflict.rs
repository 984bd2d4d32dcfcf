//! Conflict maps: protagonists and the animosities between them.
//!
//! The service's output is only loosely held to the requested schema, so a
//! [`ConflictMap`] keeps the raw JSON for each group and offers typed,
//! best-effort views on top of it. [`check_schema`] reports where the output
//! strays from the schema without rejecting it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Protagonists requested per conflict map.
pub const PROTAGONIST_COUNT: usize = 4;

/// Best interests requested per protagonist.
pub const BEST_INTEREST_COUNT: usize = 2;

/// The six approaches a protagonist rates with dice.
pub const APPROACHES: [&str; 6] = [
    "covertly",
    "directly",
    "for myself",
    "for others",
    "with love",
    "with violence",
];

/// The dice assigned across the six approaches, each used exactly once.
pub const APPROACH_DICE: [Die; 6] = [Die::D12, Die::D10, Die::D8, Die::D6, Die::D6, Die::D4];

/// A decoded conflict map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictMap {
    pub elements: Vec<Value>,
    pub characters: Vec<Value>,
    /// A list of conflict entries, or whatever matrix shape the service chose.
    pub conflicts: Value,
}

impl Default for ConflictMap {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            characters: Vec::new(),
            conflicts: Value::Array(Vec::new()),
        }
    }
}

impl ConflictMap {
    /// Read the three groups out of a decoded response.
    ///
    /// Missing keys become empty lists. A non-list `elements` or `characters`
    /// value is kept as a single entry.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut object) = value else {
            tracing::warn!("conflict map response is not an object; using empty groups");
            return Self::default();
        };

        for key in ["elements", "characters", "conflicts"] {
            if !object.contains_key(key) {
                tracing::warn!(key, "conflict map response has no '{key}' key; defaulting to empty");
            }
        }

        Self {
            elements: into_list(object.remove("elements")),
            characters: into_list(object.remove("characters")),
            conflicts: match object.remove("conflicts") {
                None | Some(Value::Null) => Value::Array(Vec::new()),
                Some(conflicts) => conflicts,
            },
        }
    }

    /// Characters that deserialize into the typed view, with their index.
    pub fn typed_characters(&self) -> Vec<(usize, Result<Character, serde_json::Error>)> {
        self.characters
            .iter()
            .enumerate()
            .map(|(index, value)| (index, Character::deserialize(value)))
            .collect()
    }

    /// Character names in order, skipping entries without one.
    pub fn character_names(&self) -> Vec<&str> {
        self.characters
            .iter()
            .filter_map(|c| c.get("name").and_then(Value::as_str))
            .collect()
    }

    /// Elements as strings, skipping non-string entries.
    pub fn element_strings(&self) -> Vec<&str> {
        self.elements.iter().filter_map(Value::as_str).collect()
    }

    /// Whether the conflicts group holds no entries.
    pub fn conflicts_is_empty(&self) -> bool {
        match &self.conflicts {
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }
}

fn into_list(value: Option<Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
    }
}

/// Typed view of one protagonist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub origin_element: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Usually `{name, effect}`, sometimes a bare string.
    #[serde(default)]
    pub particular_strength: Value,
    #[serde(default)]
    pub best_interests: Vec<String>,
    /// Usually an approach → die object; lists of pairs also appear.
    #[serde(default)]
    pub approaches: Value,
}

impl Character {
    /// Every die found in `approaches`, in the order encountered.
    pub fn approach_dice(&self) -> Vec<Die> {
        let mut dice = Vec::new();
        collect_dice(&self.approaches, &mut dice);
        dice
    }

    /// Whether `approaches` uses exactly the dice in [`APPROACH_DICE`].
    pub fn has_valid_dice(&self) -> bool {
        let mut found = self.approach_dice();
        let mut expected = APPROACH_DICE.to_vec();
        found.sort();
        expected.sort();
        found == expected
    }
}

fn collect_dice(value: &Value, dice: &mut Vec<Die>) {
    match value {
        Value::String(s) => {
            if let Ok(die) = s.parse() {
                dice.push(die);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_dice(item, dice)),
        Value::Object(map) => map.values().for_each(|item| collect_dice(item, dice)),
        _ => {}
    }
}

/// Dice used to rate approaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Die {
    D4,
    D6,
    D8,
    D10,
    D12,
}

impl Die {
    pub fn sides(&self) -> u32 {
        match self {
            Die::D4 => 4,
            Die::D6 => 6,
            Die::D8 => 8,
            Die::D10 => 10,
            Die::D12 => 12,
        }
    }

    pub fn from_sides(sides: u32) -> Option<Die> {
        match sides {
            4 => Some(Die::D4),
            6 => Some(Die::D6),
            8 => Some(Die::D8),
            10 => Some(Die::D10),
            12 => Some(Die::D12),
            _ => None,
        }
    }
}

impl fmt::Display for Die {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

impl FromStr for Die {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let sides = s.strip_prefix('d').unwrap_or(&s);
        sides
            .parse()
            .ok()
            .and_then(Die::from_sides)
            .ok_or(())
    }
}

/// The closed vocabulary of animosity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimosityType {
    Betrayal,
    Envy,
    Vengeance,
    Desire,
    Ambition,
    Duty,
    Prophecy,
    Desperation,
    Family,
    Ideology,
    Romance,
}

impl AnimosityType {
    pub const ALL: [AnimosityType; 11] = [
        AnimosityType::Betrayal,
        AnimosityType::Envy,
        AnimosityType::Vengeance,
        AnimosityType::Desire,
        AnimosityType::Ambition,
        AnimosityType::Duty,
        AnimosityType::Prophecy,
        AnimosityType::Desperation,
        AnimosityType::Family,
        AnimosityType::Ideology,
        AnimosityType::Romance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnimosityType::Betrayal => "betrayal",
            AnimosityType::Envy => "envy",
            AnimosityType::Vengeance => "vengeance",
            AnimosityType::Desire => "desire",
            AnimosityType::Ambition => "ambition",
            AnimosityType::Duty => "duty",
            AnimosityType::Prophecy => "prophecy",
            AnimosityType::Desperation => "desperation",
            AnimosityType::Family => "family",
            AnimosityType::Ideology => "ideology",
            AnimosityType::Romance => "romance",
        }
    }

    /// The vocabulary as a comma-separated list, for prompts.
    pub fn vocabulary() -> String {
        Self::ALL
            .iter()
            .map(AnimosityType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for AnimosityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimosityType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or(())
    }
}

/// A departure from the requested schema. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaWarning {
    CharacterCount { found: usize },
    UnreadableCharacter { index: usize, message: String },
    BestInterestCount { character: String, found: usize },
    DiceSet { character: String, found: Vec<Die> },
    UnknownAnimosity { value: String },
    NoConflicts,
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::CharacterCount { found } => {
                write!(f, "expected {PROTAGONIST_COUNT} characters, found {found}")
            }
            SchemaWarning::UnreadableCharacter { index, message } => {
                write!(f, "character {index} does not match the schema: {message}")
            }
            SchemaWarning::BestInterestCount { character, found } => write!(
                f,
                "{character} has {found} best interests, expected {BEST_INTEREST_COUNT}"
            ),
            SchemaWarning::DiceSet { character, found } => {
                let found: Vec<String> = found.iter().map(Die::to_string).collect();
                write!(
                    f,
                    "{character} rates approaches with [{}], expected d12, d10, d8, d6, d6, d4",
                    found.join(", ")
                )
            }
            SchemaWarning::UnknownAnimosity { value } => {
                write!(f, "animosity type '{value}' is not in the vocabulary")
            }
            SchemaWarning::NoConflicts => write!(f, "no conflicts were returned"),
        }
    }
}

/// Keys that hold an animosity type in the conflict entries seen in practice.
const ANIMOSITY_KEYS: [&str; 4] = ["animosity_type", "animosity", "type_of_animosity", "type"];

/// Compare a conflict map against the requested schema.
pub fn check_schema(map: &ConflictMap) -> Vec<SchemaWarning> {
    let mut warnings = Vec::new();

    if map.characters.len() != PROTAGONIST_COUNT {
        warnings.push(SchemaWarning::CharacterCount {
            found: map.characters.len(),
        });
    }

    for (index, character) in map.typed_characters() {
        let character = match character {
            Ok(character) => character,
            Err(e) => {
                warnings.push(SchemaWarning::UnreadableCharacter {
                    index,
                    message: e.to_string(),
                });
                continue;
            }
        };

        if character.best_interests.len() != BEST_INTEREST_COUNT {
            warnings.push(SchemaWarning::BestInterestCount {
                character: character.name.clone(),
                found: character.best_interests.len(),
            });
        }

        if !character.has_valid_dice() {
            warnings.push(SchemaWarning::DiceSet {
                found: character.approach_dice(),
                character: character.name,
            });
        }
    }

    if map.conflicts_is_empty() {
        warnings.push(SchemaWarning::NoConflicts);
    }

    let mut animosities = Vec::new();
    collect_animosities(&map.conflicts, &mut animosities);
    for value in animosities {
        if value.parse::<AnimosityType>().is_err() {
            warnings.push(SchemaWarning::UnknownAnimosity {
                value: value.to_string(),
            });
        }
    }

    warnings
}

fn collect_animosities<'a>(value: &'a Value, found: &mut Vec<&'a str>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_animosities(item, found)),
        Value::Object(map) => {
            for (key, item) in map {
                match item {
                    Value::String(s) if ANIMOSITY_KEYS.contains(&key.as_str()) => found.push(s),
                    _ => collect_animosities(item, found),
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn character(name: &str, approaches: Value) -> Value {
        json!({
            "name": name,
            "origin_element": "A drowned bell tower",
            "description": "A bellringer who hears the dead.",
            "particular_strength": {"name": "Tolling", "effect": "Summons the drowned"},
            "best_interests": [
                "Steal the lantern from Vell tonight",
                "Make Oris confess before the tide"
            ],
            "approaches": approaches
        })
    }

    fn valid_approaches() -> Value {
        json!({
            "covertly": "d12",
            "directly": "d10",
            "for myself": "d8",
            "for others": "d6",
            "with love": "d6",
            "with violence": "d4"
        })
    }

    #[test]
    fn test_missing_keys_default_to_empty() {
        let map = ConflictMap::from_value(json!({"characters": [{"name": "Ash"}]}));
        assert!(map.elements.is_empty());
        assert_eq!(map.characters.len(), 1);
        assert_eq!(map.conflicts, json!([]));
    }

    #[test]
    fn test_non_object_response_is_all_empty() {
        assert_eq!(ConflictMap::from_value(json!([1, 2, 3])), ConflictMap::default());
    }

    #[test]
    fn test_matrix_conflicts_are_kept() {
        let matrix = json!({"Ash": {"Bone": {"reason": "debt", "animosity_type": "envy"}}});
        let map = ConflictMap::from_value(json!({"conflicts": matrix.clone()}));
        assert_eq!(map.conflicts, matrix);
        assert!(!map.conflicts_is_empty());
    }

    #[test]
    fn test_scalar_group_becomes_single_entry() {
        let map = ConflictMap::from_value(json!({"elements": "A lone element"}));
        assert_eq!(map.element_strings(), vec!["A lone element"]);
    }

    #[test]
    fn test_die_parsing() {
        assert_eq!("d12".parse::<Die>(), Ok(Die::D12));
        assert_eq!(" D6 ".parse::<Die>(), Ok(Die::D6));
        assert_eq!("8".parse::<Die>(), Ok(Die::D8));
        assert!("d20".parse::<Die>().is_err());
        assert!("sword".parse::<Die>().is_err());
    }

    #[test]
    fn test_animosity_vocabulary() {
        assert_eq!("Vengeance".parse::<AnimosityType>(), Ok(AnimosityType::Vengeance));
        assert!("jealousy".parse::<AnimosityType>().is_err());
        assert!(AnimosityType::vocabulary().starts_with("betrayal, envy"));
        assert_eq!(
            serde_json::to_value(AnimosityType::Romance).unwrap(),
            json!("romance")
        );
    }

    #[test]
    fn test_valid_dice_in_object_and_list_forms() {
        let object_form: Character =
            serde_json::from_value(character("Ash", valid_approaches())).unwrap();
        assert!(object_form.has_valid_dice());

        let list_form: Character = serde_json::from_value(character(
            "Bone",
            json!([
                {"approach": "covertly", "die": "d4"},
                {"approach": "directly", "die": "d6"},
                {"approach": "for myself", "die": "d6"},
                {"approach": "for others", "die": "d8"},
                {"approach": "with love", "die": "d10"},
                {"approach": "with violence", "die": "d12"}
            ]),
        ))
        .unwrap();
        assert!(list_form.has_valid_dice());
    }

    #[test]
    fn test_clean_map_has_no_warnings() {
        let map = ConflictMap::from_value(json!({
            "elements": ["a", "b", "c", "d"],
            "characters": [
                character("Ash", valid_approaches()),
                character("Bone", valid_approaches()),
                character("Coin", valid_approaches()),
                character("Dust", valid_approaches())
            ],
            "conflicts": [
                {"character": "Ash", "in_conflict_with": "Bone", "reason": "debt", "animosity_type": "envy"}
            ]
        }));
        assert_eq!(check_schema(&map), Vec::new());
        assert_eq!(map.character_names(), vec!["Ash", "Bone", "Coin", "Dust"]);
    }

    #[test]
    fn test_schema_warnings() {
        let map = ConflictMap::from_value(json!({
            "characters": [
                character("Ash", json!({"covertly": "d12", "directly": "d12"})),
                {"description": "nameless"}
            ],
            "conflicts": [{"with": "Ash", "reason": "old grudge", "animosity_type": "jealousy"}]
        }));
        let warnings = check_schema(&map);

        assert!(warnings.contains(&SchemaWarning::CharacterCount { found: 2 }));
        assert!(warnings.iter().any(|w| matches!(
            w,
            SchemaWarning::DiceSet { character, .. } if character == "Ash"
        )));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, SchemaWarning::UnreadableCharacter { index: 1, .. })));
        assert!(warnings.contains(&SchemaWarning::UnknownAnimosity {
            value: "jealousy".to_string()
        }));
    }

    #[test]
    fn test_empty_conflicts_warns() {
        let warnings = check_schema(&ConflictMap::default());
        assert!(warnings.contains(&SchemaWarning::NoConflicts));
        assert!(warnings.contains(&SchemaWarning::CharacterCount { found: 0 }));
    }
}
