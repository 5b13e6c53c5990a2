//! All-or-nothing multi-rule mutation via a compensating log.
//!
//! The store offers no multi-document transaction across rule partitions,
//! so atomicity is application-level: every completed step records its exact
//! inverse, and the first failure replays the log in reverse before the
//! error surfaces. Cross-batch isolation is the caller's responsibility.

use crate::cache::Cache;
use crate::engine::Engine;
use crate::error::Result;
use crate::store::RuleStore;
use crate::types::Rule;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One step of a batch mutation: replace `old` with `new`.
///
/// When the rules live in different partitions the step becomes a removal
/// under the old partition followed by an insert under the new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    /// Rule to replace; must exist.
    pub old: Rule,
    /// Replacement rule.
    pub new: Rule,
}

/// Inverse-replay entry for one completed store mutation.
#[derive(Debug, Clone)]
enum AppliedStep {
    Removed(Rule),
    Added(Rule),
    Replaced { old: Rule, new: Rule },
}

impl<S, C> Engine<S, C>
where
    S: RuleStore + Send + Sync,
    C: Cache,
{
    /// Applies `updates` strictly in order, all-or-nothing.
    ///
    /// On failure, every already-applied mutation is rolled back in reverse
    /// order; rollback failures are logged and swallowed so they cannot mask
    /// the original error, which surfaces as
    /// [`Error::BatchStepFailed`](crate::Error::BatchStepFailed) carrying
    /// the 1-based failing index.
    pub async fn apply_updates(&self, updates: &[RuleUpdate]) -> Result<()> {
        let mut log: Vec<AppliedStep> = Vec::new();

        for (index, update) in updates.iter().enumerate() {
            if let Err(error) = self.apply_one(update, &mut log).await {
                self.roll_back(&log).await;
                return Err(error.at_step(index + 1));
            }
        }

        Ok(())
    }

    async fn apply_one(&self, update: &RuleUpdate, log: &mut Vec<AppliedStep>) -> Result<()> {
        if update.old.kind() == update.new.kind() {
            self.update_rule(&update.old, update.new.clone()).await?;
            log.push(AppliedStep::Replaced {
                old: update.old.clone(),
                new: update.new.clone(),
            });
            return Ok(());
        }

        self.remove_rule(&update.old).await?;
        log.push(AppliedStep::Removed(update.old.clone()));
        self.add_rule(update.new.clone()).await?;
        log.push(AppliedStep::Added(update.new.clone()));
        Ok(())
    }

    async fn roll_back(&self, log: &[AppliedStep]) {
        for step in log.iter().rev() {
            let outcome = match step {
                AppliedStep::Removed(rule) => self.add_rule(rule.clone()).await,
                AppliedStep::Added(rule) => self.remove_rule(rule).await,
                AppliedStep::Replaced { old, new } => self.update_rule(new, old.clone()).await,
            };
            if let Err(error) = outcome {
                warn!(%error, "batch rollback step failed; continuing");
            }
        }
    }
}
