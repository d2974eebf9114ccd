use crate::application::rules::RuleEngine;
use crate::domain::ports::SharedRuleStore;
use crate::domain::rule::{Condition, Rule, RuleAction};
use crate::error::Result;
use std::sync::Arc;

/// Rule management: every write goes to the store and then invalidates the
/// engine's cached snapshot.
pub struct RuleAdmin {
    store: SharedRuleStore,
    engine: Arc<RuleEngine>,
}

impl RuleAdmin {
    pub fn new(store: SharedRuleStore, engine: Arc<RuleEngine>) -> Self {
        Self { store, engine }
    }

    /// Stores a new rule after checking that both expressions decode.
    pub async fn create_rule(&self, rule: Rule) -> Result<()> {
        check_expressions(&rule)?;
        let id = rule.id.clone();
        self.store.save(rule).await?;
        self.engine.invalidate_cache().await;
        tracing::info!(rule_id = %id, "Rule created");
        Ok(())
    }

    pub async fn update_rule(&self, rule: Rule) -> Result<()> {
        check_expressions(&rule)?;
        let id = rule.id.clone();
        self.store.update(rule).await?;
        self.engine.invalidate_cache().await;
        tracing::info!(rule_id = %id, "Rule updated");
        Ok(())
    }

    pub async fn deactivate_rule(&self, id: &str) -> Result<()> {
        self.store.deactivate(id).await?;
        self.engine.invalidate_cache().await;
        tracing::info!(rule_id = %id, "Rule deactivated");
        Ok(())
    }

    pub async fn get_rule(&self, id: &str) -> Result<Option<Rule>> {
        self.store.get(id).await
    }

    pub async fn list_rules(&self) -> Result<Vec<Rule>> {
        self.store.get_all().await
    }
}

fn check_expressions(rule: &Rule) -> Result<()> {
    Condition::parse(&rule.condition)?;
    RuleAction::parse(&rule.action)?;
    Ok(())
}
