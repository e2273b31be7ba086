//! Synthetic respondent profiles and their reactions to a concept.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::utils::{json_string, json_string_list, json_u8};
use crate::constants::population::{MAX_AGE, MAX_TECH_SAVVINESS, MIN_AGE, MIN_TECH_SAVVINESS};
use crate::ssr::Dimension;
use crate::types::{MarketError, Result};

// =============================================================================
// Categorical Demographics
// =============================================================================

/// Income bracket, parsed leniently from free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeLevel {
    Low,
    LowerMiddle,
    Middle,
    UpperMiddle,
    High,
}

impl IncomeLevel {
    pub const ALL: [IncomeLevel; 5] = [
        Self::Low,
        Self::LowerMiddle,
        Self::Middle,
        Self::UpperMiddle,
        Self::High,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::LowerMiddle => "lower-middle",
            Self::Middle => "middle",
            Self::UpperMiddle => "upper-middle",
            Self::High => "high",
        }
    }

    /// Map phrases like "Upper middle class" or "$120k+ (high)" onto a bracket
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        let has_middle = lower.contains("middle") || lower.contains("mid");
        if lower.contains("upper") && has_middle {
            Some(Self::UpperMiddle)
        } else if lower.contains("lower") && has_middle {
            Some(Self::LowerMiddle)
        } else if has_middle {
            Some(Self::Middle)
        } else if lower.contains("high")
            || lower.contains("upper")
            || lower.contains("wealthy")
            || lower.contains("affluent")
        {
            Some(Self::High)
        } else if lower.contains("low") || lower.contains("poverty") || lower.contains("modest") {
            Some(Self::Low)
        } else {
            None
        }
    }
}

impl std::fmt::Display for IncomeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a persona lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Urban,
    Suburban,
    Rural,
}

impl LocationType {
    pub const ALL: [LocationType; 3] = [Self::Urban, Self::Suburban, Self::Rural];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urban => "urban",
            Self::Suburban => "suburban",
            Self::Rural => "rural",
        }
    }

    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        // "suburban" contains "urban", so check it first
        if lower.contains("suburb") {
            Some(Self::Suburban)
        } else if lower.contains("urban") || lower.contains("city") || lower.contains("metro") {
            Some(Self::Urban)
        } else if lower.contains("rural")
            || lower.contains("country")
            || lower.contains("small town")
            || lower.contains("village")
        {
            Some(Self::Rural)
        } else {
            None
        }
    }
}

impl std::fmt::Display for LocationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Age bracket derived from a persona's age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeBracket {
    #[serde(rename = "18-24")]
    From18To24,
    #[serde(rename = "25-34")]
    From25To34,
    #[serde(rename = "35-44")]
    From35To44,
    #[serde(rename = "45-54")]
    From45To54,
    #[serde(rename = "55-64")]
    From55To64,
    #[serde(rename = "65+")]
    From65,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 6] = [
        Self::From18To24,
        Self::From25To34,
        Self::From35To44,
        Self::From45To54,
        Self::From55To64,
        Self::From65,
    ];

    pub fn from_age(age: u8) -> Self {
        match age {
            0..=24 => Self::From18To24,
            25..=34 => Self::From25To34,
            35..=44 => Self::From35To44,
            45..=54 => Self::From45To54,
            55..=64 => Self::From55To64,
            _ => Self::From65,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::From18To24 => "18-24",
            Self::From25To34 => "25-34",
            Self::From35To44 => "35-44",
            Self::From45To54 => "45-54",
            Self::From55To64 => "55-64",
            Self::From65 => "65+",
        }
    }
}

impl std::fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Persona
// =============================================================================

/// Synthetic respondent profile. Immutable once the population is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub age: u8,
    pub occupation: String,
    pub income_bracket: IncomeLevel,
    pub location_type: LocationType,
    /// 1 (avoids technology) to 5 (early adopter)
    pub tech_savviness: u8,
    pub values: Vec<String>,
    pub pain_points: Vec<String>,
    pub personality_traits: String,
    pub shopping_behavior: String,
}

impl Persona {
    /// Parse one generated record. Any violation rejects only this record.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| MarketError::invalid_record("persona", "record is not an object"))?;
        let field = |key: &str| obj.get(key).unwrap_or(&Value::Null);

        let name = json_string(field("name"));
        if name.trim().is_empty() {
            return Err(MarketError::invalid_record("persona", "missing name"));
        }

        let age = json_u8(field("age"))
            .ok_or_else(|| MarketError::invalid_record("persona", "age is not a number"))?;
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            return Err(MarketError::invalid_record(
                "persona",
                format!("age {} outside {}-{}", age, MIN_AGE, MAX_AGE),
            ));
        }

        let tech_savviness = json_u8(field("tech_savviness")).ok_or_else(|| {
            MarketError::invalid_record("persona", "tech_savviness is not a number")
        })?;
        if !(MIN_TECH_SAVVINESS..=MAX_TECH_SAVVINESS).contains(&tech_savviness) {
            return Err(MarketError::invalid_record(
                "persona",
                format!("tech_savviness {} outside 1-5", tech_savviness),
            ));
        }

        let income_raw = json_string(field("income_bracket"));
        let income_bracket = IncomeLevel::parse_lenient(&income_raw).ok_or_else(|| {
            MarketError::invalid_record("persona", format!("unknown income '{}'", income_raw))
        })?;

        let location_raw = json_string(field("location_type"));
        let location_type = LocationType::parse_lenient(&location_raw).ok_or_else(|| {
            MarketError::invalid_record("persona", format!("unknown location '{}'", location_raw))
        })?;

        Ok(Self {
            name: name.trim().to_string(),
            age,
            occupation: json_string(field("occupation")),
            income_bracket,
            location_type,
            tech_savviness,
            values: json_string_list(field("values")),
            pain_points: json_string_list(field("pain_points")),
            personality_traits: json_string_list(field("personality_traits")).join(", "),
            shopping_behavior: json_string(field("shopping_behavior")),
        })
    }

    pub fn age_bracket(&self) -> AgeBracket {
        AgeBracket::from_age(self.age)
    }

    /// Profile block used when asking the provider to role-play this persona
    pub fn to_prompt_context(&self) -> String {
        format!(
            "Name: {}\nAge: {}\nOccupation: {}\nIncome: {}\nLocation: {}\nTech-savviness: {}/5\n\
             Values: {}\nPain points: {}\nPersonality: {}\nShopping behavior: {}",
            self.name,
            self.age,
            self.occupation,
            self.income_bracket,
            self.location_type,
            self.tech_savviness,
            self.values.join(", "),
            self.pain_points.join(", "),
            self.personality_traits,
            self.shopping_behavior,
        )
    }

    /// JSON schema describing one persona record
    pub fn schema() -> Value {
        json!({
            "title": "Persona",
            "type": "object",
            "required": ["name", "age", "occupation", "income_bracket", "location_type", "tech_savviness"],
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": MIN_AGE, "maximum": MAX_AGE},
                "occupation": {"type": "string"},
                "income_bracket": {"type": "string", "enum": IncomeLevel::ALL.iter().map(|i| i.as_str()).collect::<Vec<_>>()},
                "location_type": {"type": "string", "enum": LocationType::ALL.iter().map(|l| l.as_str()).collect::<Vec<_>>()},
                "tech_savviness": {"type": "integer", "minimum": MIN_TECH_SAVVINESS, "maximum": MAX_TECH_SAVVINESS},
                "values": {"type": "array", "items": {"type": "string"}, "minItems": 2, "maxItems": 2},
                "pain_points": {"type": "array", "items": {"type": "string"}, "minItems": 2, "maxItems": 2},
                "personality_traits": {"type": "string"},
                "shopping_behavior": {"type": "string"}
            }
        })
    }
}

// =============================================================================
// Persona Response
// =============================================================================

/// One respondent's free-text reaction to a concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaResponse {
    #[serde(default)]
    pub persona_name: String,
    pub interest_response: String,
    pub purchase_intent_response: String,
    pub disappointment_response: String,
    pub recommendation_response: String,
    pub main_benefit: String,
    #[serde(default)]
    pub concerns: Vec<String>,
}

impl PersonaResponse {
    /// Free-text answer for a rating dimension
    pub fn text_for(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Interest => &self.interest_response,
            Dimension::PurchaseIntent => &self.purchase_intent_response,
            Dimension::Disappointment => &self.disappointment_response,
            Dimension::Recommendation => &self.recommendation_response,
        }
    }

    pub fn schema() -> Value {
        json!({
            "title": "PersonaResponse",
            "type": "object",
            "required": [
                "interest_response",
                "purchase_intent_response",
                "disappointment_response",
                "recommendation_response",
                "main_benefit",
                "concerns"
            ],
            "properties": {
                "interest_response": {"type": "string", "description": "How interested you are, in your own words"},
                "purchase_intent_response": {"type": "string", "description": "Whether you would buy it, in your own words"},
                "disappointment_response": {"type": "string", "description": "How you would feel if this product were no longer available"},
                "recommendation_response": {"type": "string", "description": "Whether you would recommend it to a friend"},
                "main_benefit": {"type": "string"},
                "concerns": {"type": "array", "items": {"type": "string"}}
            }
        })
    }
}
