use crate::domain::ports::SharedRuleStore;
use crate::domain::rule::{ActionKind, Condition, Rule, RuleAction, RuleError};
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const ACTIVE_RULES: &str = "active";

/// An active rule with its expressions decoded once, when the cache is filled.
#[derive(Debug)]
pub struct CompiledRule {
    pub rule: Rule,
    condition: std::result::Result<Condition, RuleError>,
    action: std::result::Result<RuleAction, RuleError>,
}

impl CompiledRule {
    pub fn compile(rule: Rule) -> Self {
        let condition = Condition::parse(&rule.condition);
        let action = RuleAction::parse(&rule.action);
        Self {
            rule,
            condition,
            action,
        }
    }
}

/// A rule whose condition matched a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleResult {
    pub rule_id: String,
    pub rule_name: String,
    pub description: String,
    pub action: RuleAction,
}

/// Evaluates the cached set of active rules against transactions.
///
/// The snapshot is loaded on first use and kept until `invalidate_cache` is
/// called. Evaluation never applies an action; see `execute_action`.
pub struct RuleEngine {
    store: SharedRuleStore,
    cache: RwLock<HashMap<&'static str, Arc<Vec<CompiledRule>>>>,
}

impl RuleEngine {
    pub fn new(store: SharedRuleStore) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the triggered rules sorted ascending by priority, ties in
    /// encounter order.
    ///
    /// Rules that fail to decode are logged and skipped. Only a failure to load
    /// the rule set is returned as an error.
    pub async fn evaluate_rules(&self, tx: &Transaction) -> Result<Vec<RuleResult>> {
        let rules = self.active_rules().await?;
        let mut results = Vec::new();

        for compiled in rules.iter() {
            let rule = &compiled.rule;
            let condition = match &compiled.condition {
                Ok(condition) => condition,
                Err(e) => {
                    tracing::error!(rule_id = %rule.id, error = %e, "Failed to evaluate rule: bad condition");
                    continue;
                }
            };
            if !condition.is_met_by(tx) {
                continue;
            }
            let action = match &compiled.action {
                Ok(action) => action.clone(),
                Err(e) => {
                    tracing::error!(rule_id = %rule.id, error = %e, "Failed to evaluate rule: bad action");
                    continue;
                }
            };

            tracing::info!(
                rule_id = %rule.id,
                rule_name = %rule.name,
                transaction_id = %tx.id(),
                "Rule triggered"
            );
            results.push(RuleResult {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                description: rule.description.clone(),
                action,
            });
        }

        let mut keyed = Vec::with_capacity(results.len());
        for result in results {
            let priority = self.rule_priority(&result.rule_id).await;
            keyed.push((priority, result));
        }
        keyed.sort_by_key(|(priority, _)| *priority);

        Ok(keyed.into_iter().map(|(_, result)| result).collect())
    }

    /// Applies one action to `tx`. Never called by the processing pipeline.
    pub fn execute_action(&self, action: &RuleAction, tx: &mut Transaction) -> Result<()> {
        match &action.kind {
            ActionKind::FlagTransaction { reason } => {
                tracing::warn!(transaction_id = %tx.id(), reason = %reason, "Transaction flagged");
                tx.add_metadata("flagged_reason", reason.as_str());
            }
            ActionKind::BlockTransaction { reason } => {
                tracing::error!(transaction_id = %tx.id(), reason = %reason, "Transaction blocked");
                tx.status = TransactionStatus::Failed;
                tx.add_metadata("block_reason", reason.as_str());
            }
            ActionKind::RequireApproval => {
                tracing::info!(transaction_id = %tx.id(), "Transaction requires approval");
                tx.status = TransactionStatus::Pending;
                tx.add_metadata("requires_approval", "true");
            }
            ActionKind::Notify { channel, message } => {
                tracing::info!(
                    channel = %channel,
                    transaction_id = %tx.id(),
                    message = %message,
                    "Notification sent"
                );
            }
            ActionKind::AdjustRiskScore { adjustment } => {
                tx.risk_score = tx.risk_score.adjusted(*adjustment);
                tracing::info!(
                    transaction_id = %tx.id(),
                    new_risk_score = tx.risk_score.value(),
                    adjustment = *adjustment,
                    "Risk score adjusted"
                );
            }
        }
        Ok(())
    }

    /// Decodes a raw action expression and applies it. Unknown action types fail.
    pub fn execute_action_expr(&self, expr: &str, tx: &mut Transaction) -> Result<()> {
        let action = RuleAction::parse(expr)?;
        self.execute_action(&action, tx)
    }

    /// Drops the cached snapshot so the next evaluation reloads from the store.
    pub async fn invalidate_cache(&self) {
        self.cache.write().await.clear();
        tracing::debug!("Rule cache invalidated");
    }

    async fn active_rules(&self) -> Result<Arc<Vec<CompiledRule>>> {
        if let Some(rules) = self.cache.read().await.get(ACTIVE_RULES) {
            return Ok(Arc::clone(rules));
        }

        // The write guard is held across the load so an `invalidate_cache`
        // issued meanwhile runs after the insert, never before it.
        let mut cache = self.cache.write().await;
        if let Some(rules) = cache.get(ACTIVE_RULES) {
            return Ok(Arc::clone(rules));
        }

        let loaded: Vec<CompiledRule> = self
            .store
            .get_active()
            .await?
            .into_iter()
            .map(CompiledRule::compile)
            .collect();
        tracing::debug!(count = loaded.len(), "Loaded active rules");

        let rules = Arc::new(loaded);
        cache.insert(ACTIVE_RULES, Arc::clone(&rules));
        Ok(rules)
    }

    /// Priority from the cached snapshot, else from the store, else 0.
    async fn rule_priority(&self, rule_id: &str) -> i32 {
        let cached = {
            let cache = self.cache.read().await;
            cache
                .values()
                .flat_map(|rules| rules.iter())
                .find(|c| c.rule.id == rule_id)
                .map(|c| c.rule.priority)
        };
        if let Some(priority) = cached {
            return priority;
        }
        match self.store.get(rule_id).await {
            Ok(Some(rule)) => rule.priority,
            _ => 0,
        }
    }
}
