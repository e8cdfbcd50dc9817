//! Subscription status resolution
//!
//! Reads tier and billing status from the user record, derives the tier the
//! user is metered as, and owns the monthly period reset for paid metering.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, Utc};
use tracing::{debug, instrument, warn};
use truetone_db::{UsageStore, UserRepository, UserRow};
use truetone_types::{
    can_access_paid_features, effective_tier, CountingKey, SubscriptionSnapshot,
    SubscriptionStatus, Tier, UserId,
};

use crate::metrics::{Operation, OperationTimer};
use crate::{GateError, QuotaConfig};

/// How a user is metered right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeteringPlan {
    /// Stored tier
    pub tier: Tier,
    /// Stored billing status
    pub status: SubscriptionStatus,
    /// Tier after applying paid-feature access
    pub effective_tier: Tier,
    /// Allowance for the current period
    pub limit: u32,
}

impl MeteringPlan {
    /// Whether paid features are available
    pub fn can_access_paid_features(&self) -> bool {
        can_access_paid_features(self.tier, self.status)
    }
}

/// The first monthly boundary strictly after `now`, stepping from `anchor`
/// by whole calendar months. Month ends clamp (Jan 31 steps to Feb 28).
pub fn next_reset_after(anchor: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if anchor > now {
        return anchor;
    }

    let elapsed = (now.year() - anchor.year()) * 12 + now.month() as i32 - anchor.month() as i32;
    let mut months = u32::try_from(elapsed.max(1)).unwrap_or(1);
    loop {
        match anchor.checked_add_months(Months::new(months)) {
            Some(candidate) if candidate > now => return candidate,
            Some(_) => months += 1,
            None => return now + chrono::Duration::days(30),
        }
    }
}

/// Resolves subscription state for authenticated users
#[derive(Clone)]
pub struct SubscriptionResolver {
    users: Arc<dyn UserRepository>,
    usage: Arc<dyn UsageStore>,
    quota: QuotaConfig,
}

impl SubscriptionResolver {
    /// Create a new resolver
    pub fn new(
        users: Arc<dyn UserRepository>,
        usage: Arc<dyn UsageStore>,
        quota: QuotaConfig,
    ) -> Self {
        Self { users, usage, quota }
    }

    /// Configured allowances
    pub fn quota(&self) -> &QuotaConfig {
        &self.quota
    }

    /// Load the user record
    pub async fn load(&self, user_id: &UserId) -> Result<UserRow, GateError> {
        self.users
            .find_by_id(user_id.as_str())
            .await?
            .ok_or_else(|| GateError::UserNotFound(user_id.clone()))
    }

    /// Derive the metering plan from a user record.
    ///
    /// Unreadable tier or status values are metered as free.
    pub fn plan(&self, user: &UserRow) -> MeteringPlan {
        let tier = user.tier().unwrap_or_else(|e| {
            warn!(user_id = %user.id, error = %e, "Unreadable tier, metering as free");
            Tier::Free
        });
        let status = user.subscription_status().unwrap_or_else(|e| {
            warn!(user_id = %user.id, error = %e, "Unreadable subscription status");
            SubscriptionStatus::Inactive
        });
        let effective = effective_tier(tier, status);

        // A per-user override only applies to the tier it was granted for.
        let limit = match user.limit_override() {
            Some(limit) if effective == tier => limit,
            _ => self.quota.limit_for_tier(effective),
        };

        MeteringPlan {
            tier,
            status,
            effective_tier: effective,
            limit,
        }
    }

    /// Reset the user's counter if the monthly period has elapsed.
    ///
    /// Only applies to paid metering. The reset is a compare-and-swap on the
    /// stored period end, so concurrent callers reset a period exactly once.
    /// Returns the period end to meter against (`None` for lifetime limits).
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn reset_if_period_elapsed(
        &self,
        user: &UserRow,
        plan: &MeteringPlan,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, GateError> {
        if !plan.effective_tier.resets_monthly() {
            return Ok(None);
        }

        let key = CountingKey::User(user.user_id()).to_string();
        let record = self.usage.find(&key).await?;

        let Some(record) = record else {
            // First generation: seed the period end for the new counter.
            let anchor = user.generation_reset_date.unwrap_or(now);
            return Ok(Some(next_reset_after(anchor, now)));
        };

        if let Some(reset_at) = record.reset_at {
            if now < reset_at {
                return Ok(Some(reset_at));
            }
        }

        let anchor = record
            .reset_at
            .or(user.generation_reset_date)
            .unwrap_or(now);
        let next = next_reset_after(anchor, now);

        if self.usage.reset_period(&key, record.reset_at, next).await? {
            debug!(counting_key = %key, next_reset = %next, "Monthly generation period reset");
            if let Err(e) = self
                .users
                .update_generation_reset_date(&user.id, next)
                .await
            {
                warn!(error = %e, "Failed to record next generation reset date");
            }
            return Ok(Some(next));
        }

        // Lost the race: another request already reset this period.
        let current = self.usage.find(&key).await?;
        Ok(current.and_then(|row| row.reset_at).or(Some(next)))
    }

    /// Resolve the subscription snapshot as of now
    pub async fn resolve(&self, user_id: &UserId) -> Result<SubscriptionSnapshot, GateError> {
        self.resolve_at(user_id, Utc::now()).await
    }

    /// Resolve the subscription snapshot as of `now`
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn resolve_at(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionSnapshot, GateError> {
        let timer = OperationTimer::start(Operation::SubscriptionResolve);
        let result = self.snapshot(user_id, now).await;
        timer.observe(&result);
        result
    }

    /// Usage and period end as they stand at `now`, without writing.
    ///
    /// An elapsed monthly period reads as fresh; the reset itself is left to
    /// the next check.
    pub async fn current_period(
        &self,
        user: &UserRow,
        plan: &MeteringPlan,
        now: DateTime<Utc>,
    ) -> Result<(u32, Option<DateTime<Utc>>), GateError> {
        let key = CountingKey::User(user.user_id()).to_string();
        let record = self.usage.find(&key).await?.map(|row| row.record());
        let used = record.as_ref().map_or(0, |r| r.used);

        if !plan.effective_tier.resets_monthly() {
            return Ok((used, None));
        }

        let stored = record.and_then(|r| r.reset_at);
        match stored.or(user.generation_reset_date) {
            Some(reset_at) if now < reset_at => Ok((used, Some(reset_at))),
            Some(elapsed) => Ok((0, Some(next_reset_after(elapsed, now)))),
            None => Ok((0, Some(next_reset_after(now, now)))),
        }
    }

    async fn snapshot(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionSnapshot, GateError> {
        let user = self.load(user_id).await?;
        let plan = self.plan(&user);
        let (used, reset_at) = self.current_period(&user, &plan, now).await?;

        Ok(SubscriptionSnapshot {
            user_id: user_id.clone(),
            tier: plan.tier,
            status: plan.status,
            effective_tier: plan.effective_tier,
            monthly_generation_limit: plan.limit,
            monthly_generations_used: used,
            generations_remaining: plan.limit.saturating_sub(used),
            generation_reset_date: reset_at,
            can_access_paid_features: plan.can_access_paid_features(),
        })
    }
}

impl std::fmt::Debug for SubscriptionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionResolver")
            .field("quota", &self.quota)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use truetone_db::{MemoryUsageStore, MemoryUserRepository, UsageRow};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn setup() -> (SubscriptionResolver, MemoryUserRepository, MemoryUsageStore) {
        let users = MemoryUserRepository::new();
        let usage = MemoryUsageStore::new();
        let resolver = SubscriptionResolver::new(
            Arc::new(users.clone()),
            Arc::new(usage.clone()),
            QuotaConfig::default(),
        );
        (resolver, users, usage)
    }

    #[test]
    fn test_next_reset_steps_by_calendar_month() {
        assert_eq!(next_reset_after(at(2026, 1, 15), at(2026, 1, 20)), at(2026, 2, 15));
        assert_eq!(next_reset_after(at(2026, 1, 15), at(2026, 5, 14)), at(2026, 5, 15));
        assert_eq!(next_reset_after(at(2026, 1, 15), at(2026, 5, 16)), at(2026, 6, 15));
        assert_eq!(next_reset_after(at(2026, 1, 31), at(2026, 2, 1)), at(2026, 2, 28));
        // Future anchors are already the next boundary.
        assert_eq!(next_reset_after(at(2026, 9, 1), at(2026, 8, 1)), at(2026, 9, 1));
    }

    #[test]
    fn test_next_reset_is_strictly_after_now() {
        let now = at(2026, 3, 15);
        assert_eq!(next_reset_after(now, now), at(2026, 4, 15));
    }

    #[test]
    fn test_plan_meters_lapsed_paid_user_as_free() {
        let (resolver, _, _) = setup();
        let mut row = UserRow::new("kp_1", None).with_subscription(Tier::Paid, SubscriptionStatus::PastDue);
        row.monthly_generation_limit = Some(1000);

        let plan = resolver.plan(&row);
        assert_eq!(plan.effective_tier, Tier::Free);
        assert_eq!(plan.limit, 5);
        assert!(!plan.can_access_paid_features());
    }

    #[test]
    fn test_plan_applies_override_for_active_tier() {
        let (resolver, _, _) = setup();
        let mut row = UserRow::new("kp_1", None).with_subscription(Tier::Premium, SubscriptionStatus::Active);
        row.monthly_generation_limit = Some(42);
        assert_eq!(resolver.plan(&row).limit, 42);
    }

    #[tokio::test]
    async fn test_missing_user_is_user_not_found() {
        let (resolver, _, _) = setup();
        let err = resolver.resolve(&UserId::from("kp_missing")).await.unwrap_err();
        assert!(matches!(err, GateError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_paid_counter_resets_once_per_period() {
        let (resolver, users, usage) = setup();
        let row = UserRow::new("kp_2", None).with_subscription(Tier::Paid, SubscriptionStatus::Active);
        users.insert(row.clone());
        usage.insert(UsageRow {
            counting_key: "user:kp_2".into(),
            used: 100,
            usage_limit: 100,
            reset_at: Some(at(2026, 2, 1)),
            updated_at: at(2026, 1, 5),
        });

        let plan = resolver.plan(&row);
        let now = at(2026, 2, 3);
        let first = resolver.reset_if_period_elapsed(&row, &plan, now).await.unwrap();
        assert_eq!(first, Some(at(2026, 3, 1)));
        assert_eq!(usage.find("user:kp_2").await.unwrap().unwrap().used, 0);

        // Usage accrues again; a repeated check in the same period leaves it alone.
        usage.try_consume("user:kp_2", 100, None).await.unwrap();
        let second = resolver.reset_if_period_elapsed(&row, &plan, now).await.unwrap();
        assert_eq!(second, Some(at(2026, 3, 1)));
        assert_eq!(usage.find("user:kp_2").await.unwrap().unwrap().used, 1);

        let stored = users.find_by_id("kp_2").await.unwrap().unwrap();
        assert_eq!(stored.generation_reset_date, Some(at(2026, 3, 1)));
    }

    #[tokio::test]
    async fn test_free_counter_never_resets() {
        let (resolver, users, usage) = setup();
        let row = UserRow::new("kp_3", None);
        users.insert(row.clone());
        usage.insert(UsageRow {
            counting_key: "user:kp_3".into(),
            used: 5,
            usage_limit: 5,
            reset_at: None,
            updated_at: at(2020, 1, 1),
        });

        let plan = resolver.plan(&row);
        let reset = resolver
            .reset_if_period_elapsed(&row, &plan, at(2030, 1, 1))
            .await
            .unwrap();
        assert_eq!(reset, None);
        assert_eq!(usage.find("user:kp_3").await.unwrap().unwrap().used, 5);
    }

    #[tokio::test]
    async fn test_snapshot_reports_usage() {
        let (resolver, users, usage) = setup();
        users.insert(UserRow::new("kp_4", None).with_subscription(Tier::Premium, SubscriptionStatus::Trialing));
        usage.try_consume("user:kp_4", 500, Some(Utc::now() + chrono::Duration::days(10))).await.unwrap();

        let snapshot = resolver.resolve(&UserId::from("kp_4")).await.unwrap();
        assert_eq!(snapshot.effective_tier, Tier::Premium);
        assert_eq!(snapshot.monthly_generation_limit, 500);
        assert_eq!(snapshot.monthly_generations_used, 1);
        assert_eq!(snapshot.generations_remaining, 499);
        assert!(snapshot.can_access_paid_features);
        assert!(snapshot.generation_reset_date.is_some());
    }

    #[tokio::test]
    async fn test_resolve_reports_elapsed_period_without_writing() {
        let (resolver, users, usage) = setup();
        let row = UserRow::new("kp_4", None).with_subscription(Tier::Paid, SubscriptionStatus::Active);
        users.insert(row);
        usage.insert(UsageRow {
            counting_key: "user:kp_4".into(),
            used: 70,
            usage_limit: 100,
            reset_at: Some(at(2026, 2, 1)),
            updated_at: at(2026, 1, 20),
        });

        let snapshot = resolver
            .resolve_at(&UserId::from("kp_4"), at(2026, 2, 3))
            .await
            .unwrap();
        assert_eq!(snapshot.monthly_generations_used, 0);
        assert_eq!(snapshot.generations_remaining, 100);
        assert_eq!(snapshot.generation_reset_date, Some(at(2026, 3, 1)));

        let stored = usage.find("user:kp_4").await.unwrap().unwrap();
        assert_eq!(stored.used, 70);
        assert_eq!(stored.reset_at, Some(at(2026, 2, 1)));
        let user = users.find_by_id("kp_4").await.unwrap().unwrap();
        assert_eq!(user.generation_reset_date, None);
    }

    #[tokio::test]
    async fn test_resolve_within_period_reports_stored_usage() {
        let (resolver, users, usage) = setup();
        let row = UserRow::new("kp_5", None).with_subscription(Tier::Premium, SubscriptionStatus::Active);
        users.insert(row);
        usage.insert(UsageRow {
            counting_key: "user:kp_5".into(),
            used: 12,
            usage_limit: 1000,
            reset_at: Some(at(2026, 2, 10)),
            updated_at: at(2026, 2, 1),
        });

        let snapshot = resolver
            .resolve_at(&UserId::from("kp_5"), at(2026, 2, 3))
            .await
            .unwrap();
        assert_eq!(snapshot.monthly_generations_used, 12);
        assert_eq!(snapshot.generation_reset_date, Some(at(2026, 2, 10)));
    }
}
