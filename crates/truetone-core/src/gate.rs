//! Quota gate
//!
//! The single decision point for AI generations. Every allowed decision has
//! already been durably counted by the time it is returned; callers never
//! increment.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use truetone_db::{ConsumeOutcome, UsageStore};
use truetone_types::{CountingKey, Principal, QuotaDecision, QuotaTier, UserId};

use crate::metrics::{self, Operation, OperationTimer};
use crate::subscription::MeteringPlan;
use crate::{GateError, SubscriptionResolver};

/// What to meter a principal against
struct Meter {
    key: String,
    tier: QuotaTier,
    limit: u32,
    reset_at: Option<DateTime<Utc>>,
}

/// Atomic check-and-increment over the usage store
#[derive(Clone)]
pub struct QuotaGate {
    resolver: SubscriptionResolver,
    usage: Arc<dyn UsageStore>,
}

impl QuotaGate {
    /// Create a gate. `usage` must be the store `resolver` reads from.
    pub fn new(resolver: SubscriptionResolver, usage: Arc<dyn UsageStore>) -> Self {
        Self { resolver, usage }
    }

    /// The subscription resolver backing this gate
    pub fn resolver(&self) -> &SubscriptionResolver {
        &self.resolver
    }

    /// Check the principal's allowance and count one generation if allowed
    pub async fn check_and_increment(&self, principal: &Principal) -> Result<QuotaDecision, GateError> {
        self.check_and_increment_at(principal, Utc::now()).await
    }

    /// Like [`check_and_increment`](Self::check_and_increment), but turns a
    /// denial into [`GateError::QuotaExceeded`]
    pub async fn require(&self, principal: &Principal) -> Result<QuotaDecision, GateError> {
        let decision = self.check_and_increment(principal).await?;
        if decision.allowed {
            Ok(decision)
        } else {
            Err(GateError::QuotaExceeded(decision))
        }
    }

    /// Check and increment as of `now`
    #[instrument(skip_all, fields(counting_key = %principal.counting_key()))]
    pub async fn check_and_increment_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, GateError> {
        let timer = OperationTimer::start(Operation::QuotaCheck);
        let result = self.decide(principal, now).await;
        timer.observe(&result);

        if let Ok(decision) = &result {
            metrics::record_quota_decision(decision);
            if decision.allowed {
                debug!(used = decision.used, limit = decision.limit, tier = %decision.tier, "Generation allowed");
            } else {
                info!(used = decision.used, limit = decision.limit, tier = %decision.tier, "Generation quota exceeded");
            }
        }
        result
    }

    async fn decide(&self, principal: &Principal, now: DateTime<Utc>) -> Result<QuotaDecision, GateError> {
        let user = match principal {
            Principal::Anonymous(visitor) => {
                let meter = self.anonymous_meter(visitor.counting_key());
                return self.consume(&meter).await;
            }
            Principal::Authenticated(user) => user,
        };

        let row = match self.resolver.load(&user.id).await {
            Ok(row) => row,
            Err(GateError::UserNotFound(id)) => {
                debug!(user_id = %id, "No user record, metering with anonymous allowance");
                let meter = self.anonymous_meter(CountingKey::User(id));
                return self.consume(&meter).await;
            }
            Err(e) => return Err(e),
        };

        let plan = self.resolver.plan(&row);
        let reset_at = self.resolver.reset_if_period_elapsed(&row, &plan, now).await?;
        let meter = self.user_meter(&user.id, &plan, reset_at);
        let decision = self.consume(&meter).await?;

        if !decision.allowed {
            return Ok(decision);
        }

        // The increment is committed; a failed live read only loses the
        // merged subscription fields.
        match self.resolver.resolve_at(&user.id, now).await {
            Ok(snapshot) => Ok(QuotaDecision {
                tier: snapshot.effective_tier.into(),
                used: snapshot.monthly_generations_used,
                limit: snapshot.monthly_generation_limit,
                remaining: snapshot.generations_remaining,
                ..decision
            }),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Live subscription read failed after increment");
                Ok(decision)
            }
        }
    }

    /// Advisory snapshot of the principal's allowance. Never increments and
    /// never gates access.
    #[instrument(skip_all, fields(counting_key = %principal.counting_key()))]
    pub async fn status(&self, principal: &Principal) -> Result<QuotaDecision, GateError> {
        let now = Utc::now();
        let meter = match principal {
            Principal::Anonymous(visitor) => self.anonymous_meter(visitor.counting_key()),
            Principal::Authenticated(user) => match self.resolver.load(&user.id).await {
                Ok(row) => {
                    let plan = self.resolver.plan(&row);
                    let reset_at = if plan.effective_tier.resets_monthly() {
                        row.generation_reset_date
                    } else {
                        None
                    };
                    self.user_meter(&user.id, &plan, reset_at)
                }
                Err(GateError::UserNotFound(id)) => self.anonymous_meter(CountingKey::User(id)),
                Err(e) => return Err(e),
            },
        };

        let record = self.usage.find(&meter.key).await?.map(|row| row.record());
        let (mut used, mut reset_at) = record
            .map(|r| (r.used, r.reset_at.or(meter.reset_at)))
            .unwrap_or((0, meter.reset_at));

        // An elapsed monthly period reads as fresh even before the next
        // check performs the reset.
        if meter.tier.resets_monthly() && reset_at.is_some_and(|at| now >= at) {
            used = 0;
            reset_at = reset_at.map(|at| crate::next_reset_after(at, now));
        }

        if used < meter.limit {
            Ok(QuotaDecision::allow(used, meter.limit, meter.tier))
        } else {
            Ok(QuotaDecision::deny(used, meter.limit, meter.tier, reset_at))
        }
    }

    fn anonymous_meter(&self, key: CountingKey) -> Meter {
        Meter {
            key: key.to_string(),
            tier: QuotaTier::Anonymous,
            limit: self.resolver.quota().anonymous_limit,
            reset_at: None,
        }
    }

    fn user_meter(&self, user_id: &UserId, plan: &MeteringPlan, reset_at: Option<DateTime<Utc>>) -> Meter {
        Meter {
            key: CountingKey::User(user_id.clone()).to_string(),
            tier: plan.effective_tier.into(),
            limit: plan.limit,
            reset_at,
        }
    }

    async fn consume(&self, meter: &Meter) -> Result<QuotaDecision, GateError> {
        let outcome = self
            .usage
            .try_consume(&meter.key, meter.limit, meter.reset_at)
            .await?;

        Ok(match outcome {
            ConsumeOutcome::Consumed(record) => QuotaDecision::allow(record.used, meter.limit, meter.tier),
            ConsumeOutcome::Rejected(record) => {
                let used = record.as_ref().map_or(0, |r| r.used);
                let reset_at = record.and_then(|r| r.reset_at).or(meter.reset_at);
                QuotaDecision::deny(used, meter.limit, meter.tier, reset_at)
            }
        })
    }
}

impl std::fmt::Debug for QuotaGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaGate")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
