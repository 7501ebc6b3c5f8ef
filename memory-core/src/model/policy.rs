//! Retention policy and rule entities for the lifecycle engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-tenant default retention policy, used when a tenant has no
/// [`RetentionRule`]s of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub tenant_id: String,
    pub max_age_days: u32,
    pub importance_threshold: f32,
    pub max_items: u32,
    pub delete_after_days: u32,
}

impl RetentionPolicy {
    /// Materialise a default policy for a tenant that has none on record.
    #[must_use]
    pub fn default_for_tenant(tenant_id: impl Into<String>, defaults: &RetentionDefaults) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            max_age_days: defaults.max_age_days,
            importance_threshold: defaults.importance_threshold,
            max_items: defaults.max_items,
            delete_after_days: defaults.delete_after_days,
        }
    }
}

/// Service-wide defaults used to materialise a [`RetentionPolicy`] on first
/// use for a tenant that has never configured one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionDefaults {
    pub max_age_days: u32,
    pub importance_threshold: f32,
    pub max_items: u32,
    pub delete_after_days: u32,
}

impl Default for RetentionDefaults {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            importance_threshold: 0.35,
            max_items: u32::MAX,
            delete_after_days: 90,
        }
    }
}

/// Discriminates how a [`RetentionRule`] selects candidate messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Age,
    Importance,
    ConversationAge,
    MaxItems,
    Custom,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleType::Age => "age",
            RuleType::Importance => "importance",
            RuleType::ConversationAge => "conversation_age",
            RuleType::MaxItems => "max_items",
            RuleType::Custom => "custom",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RuleType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "age" => Ok(RuleType::Age),
            "importance" => Ok(RuleType::Importance),
            "conversation_age" => Ok(RuleType::ConversationAge),
            "max_items" => Ok(RuleType::MaxItems),
            "custom" => Ok(RuleType::Custom),
            other => Err(crate::Error::Validation(format!("invalid rule_type: {other}"))),
        }
    }
}

/// The action a [`RetentionRule`] takes on its candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Archive,
    Delete,
    Cold,
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleAction::Archive => "archive",
            RuleAction::Delete => "delete",
            RuleAction::Cold => "cold",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RuleAction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archive" => Ok(RuleAction::Archive),
            "delete" => Ok(RuleAction::Delete),
            "cold" => Ok(RuleAction::Cold),
            other => Err(crate::Error::Validation(format!("invalid rule action: {other}"))),
        }
    }
}

/// A tenant-scoped retention rule evaluated by the [`crate::lifecycle::LifecycleEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionRule {
    pub id: uuid::Uuid,
    pub tenant_id: String,
    pub name: String,
    pub rule_type: RuleType,
    pub conditions: Value,
    pub action: RuleAction,
    pub priority: i32,
    pub enabled: bool,
    pub last_applied: Option<DateTime<Utc>>,
}

/// Parsed `conditions` for a [`RuleType::Age`] rule.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AgeConditions {
    pub days: u32,
}

/// Parsed `conditions` for a [`RuleType::Importance`] rule.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ImportanceConditions {
    pub threshold: f32,
}

/// Parsed `conditions` for a [`RuleType::ConversationAge`] rule.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConversationAgeConditions {
    pub days: u32,
}

/// Parsed `conditions` for a [`RuleType::MaxItems`] rule.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MaxItemsConditions {
    pub max_items: u32,
}

/// Parsed `conditions` for a [`RuleType::Custom`] rule: an optional subset of
/// `{role, min_importance, max_importance}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomConditions {
    pub role: Option<String>,
    pub min_importance: Option<f32>,
    pub max_importance: Option<f32>,
}
