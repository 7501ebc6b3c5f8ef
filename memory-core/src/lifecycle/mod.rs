//! Rule-driven retention evaluation (§4.7): [`LifecycleEngine`] applies a
//! tenant's enabled [`RetentionRule`]s, or falls back to its
//! [`RetentionPolicy`] when it has none.

pub mod scheduler;

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use crate::config::RetentionConfig;
use crate::error::Result;
use crate::model::{CustomConditions, Message, RetentionRule, RuleAction, RuleType};
use crate::store::Repository;

pub use scheduler::RetentionScheduler;

/// Result of one [`LifecycleEngine::apply`] call.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LifecycleReport {
    pub rules_applied: u32,
    pub archived: u64,
    pub deleted: u64,
    pub cold: u64,
    pub dry_run: bool,
    pub elapsed_ms: u64,
}

/// Evaluates a tenant's retention rules (or default policy) and executes
/// the resulting archive/delete/cold actions.
pub struct LifecycleEngine {
    repository: Arc<dyn Repository>,
    defaults: RetentionConfig,
}

impl LifecycleEngine {
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>, defaults: RetentionConfig) -> Self {
        Self { repository, defaults }
    }

    /// Evaluate and (unless `dry_run`) execute retention actions for
    /// `tenant_id`.
    #[instrument(skip(self), fields(tenant = %tenant_id, dry_run))]
    pub async fn apply(&self, tenant_id: &str, dry_run: bool) -> Result<LifecycleReport> {
        let started = std::time::Instant::now();
        let mut tx = self.repository.begin().await?;
        let rules = self.repository.load_rules(&mut tx, tenant_id).await?;
        self.repository.commit(tx).await?;

        let enabled: Vec<RetentionRule> = rules.into_iter().filter(|r| r.enabled).collect();

        let mut report = LifecycleReport {
            dry_run,
            ..Default::default()
        };

        if enabled.is_empty() {
            self.apply_default_policy(tenant_id, dry_run, &mut report).await?;
        } else {
            let mut sorted = enabled;
            sorted.sort_by_key(|r| r.priority);
            for rule in sorted {
                self.apply_rule(tenant_id, &rule, dry_run, &mut report).await?;
                report.rules_applied += 1;
            }
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            archived = report.archived,
            deleted = report.deleted,
            cold = report.cold,
            rules_applied = report.rules_applied,
            "lifecycle apply complete"
        );
        Ok(report)
    }

    async fn apply_rule(
        &self,
        tenant_id: &str,
        rule: &RetentionRule,
        dry_run: bool,
        report: &mut LifecycleReport,
    ) -> Result<()> {
        let mut tx = self.repository.begin().await?;
        let candidates: Vec<Message> = match rule.rule_type {
            RuleType::Age => {
                let conditions: crate::model::AgeConditions =
                    serde_json::from_value(rule.conditions.clone())?;
                self.repository
                    .rule_candidates_age(&mut tx, tenant_id, conditions.days)
                    .await?
            }
            RuleType::Importance => {
                let conditions: crate::model::ImportanceConditions =
                    serde_json::from_value(rule.conditions.clone())?;
                self.repository
                    .rule_candidates_importance(&mut tx, tenant_id, conditions.threshold)
                    .await?
            }
            RuleType::ConversationAge => {
                let conditions: crate::model::ConversationAgeConditions =
                    serde_json::from_value(rule.conditions.clone())?;
                self.repository
                    .rule_candidates_conversation_age(&mut tx, tenant_id, conditions.days)
                    .await?
            }
            RuleType::MaxItems => {
                let conditions: crate::model::MaxItemsConditions =
                    serde_json::from_value(rule.conditions.clone())?;
                self.repository
                    .rule_candidates_max_items(&mut tx, tenant_id, conditions.max_items)
                    .await?
            }
            RuleType::Custom => {
                let conditions: CustomConditions =
                    serde_json::from_value(rule.conditions.clone()).unwrap_or_default();
                self.repository
                    .rule_candidates_custom(&mut tx, tenant_id, &conditions)
                    .await?
            }
        };

        if dry_run || candidates.is_empty() {
            self.repository.commit(tx).await?;
            return Ok(());
        }

        match rule.action {
            RuleAction::Archive => {
                let count = self
                    .repository
                    .move_to_archive(&mut tx, &candidates, &rule.name)
                    .await?;
                report.archived += count;
            }
            RuleAction::Delete => {
                let count = self.repository.delete_messages(&mut tx, &candidates).await?;
                report.deleted += count;
            }
            RuleAction::Cold => {
                let reason = format!("cold_storage:{}", rule.name);
                let count = self
                    .repository
                    .move_to_archive(&mut tx, &candidates, &reason)
                    .await?;
                report.cold += count;
            }
        }

        self.repository
            .touch_rule_applied(&mut tx, rule.id, Utc::now())
            .await?;
        self.repository.commit(tx).await?;
        Ok(())
    }

    async fn apply_default_policy(
        &self,
        tenant_id: &str,
        dry_run: bool,
        report: &mut LifecycleReport,
    ) -> Result<()> {
        let mut tx = self.repository.begin().await?;
        let policy = self
            .repository
            .load_policy(&mut tx, tenant_id)
            .await?
            .unwrap_or_else(|| {
                crate::model::RetentionPolicy::default_for_tenant(
                    tenant_id,
                    &crate::model::RetentionDefaults {
                        max_age_days: self.defaults.max_age_days,
                        importance_threshold: self.defaults.importance_threshold,
                        max_items: u32::MAX,
                        delete_after_days: self.defaults.delete_after_days,
                    },
                )
            });

        let candidates = self
            .repository
            .archive_candidates(
                &mut tx,
                tenant_id,
                policy.max_age_days,
                policy.importance_threshold,
            )
            .await?;

        if !dry_run && !candidates.is_empty() {
            let count = self
                .repository
                .move_to_archive(&mut tx, &candidates, "default_policy")
                .await?;
            report.archived += count;
        }

        if !dry_run {
            let deleted = self
                .repository
                .delete_archived(&mut tx, tenant_id, policy.delete_after_days)
                .await?;
            report.deleted += deleted;
        }

        self.repository.commit(tx).await?;
        Ok(())
    }
}
