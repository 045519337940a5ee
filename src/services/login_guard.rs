use time::{Duration, PrimitiveDateTime};

use crate::db::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginGate {
    Open,
    Locked { until: PrimitiveDateTime },
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FailedLogin {
    pub(crate) attempts: i32,
    pub(crate) lock_until: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LockoutPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) lock_minutes: u64,
}

pub(crate) fn login_gate(user: &User, now: PrimitiveDateTime) -> LoginGate {
    if !user.is_active() {
        return LoginGate::Disabled;
    }
    match user.lock_until {
        Some(until) if until > now => LoginGate::Locked { until },
        _ => LoginGate::Open,
    }
}

/// Counter state after one more wrong password. An expired lock starts a
/// fresh count.
pub(crate) fn register_failure(
    user: &User,
    policy: LockoutPolicy,
    now: PrimitiveDateTime,
) -> FailedLogin {
    let previous = match user.lock_until {
        Some(until) if until <= now => 0,
        _ => user.login_attempts.max(0),
    };
    let attempts = previous.saturating_add(1);

    let max_attempts = i32::try_from(policy.max_attempts).unwrap_or(i32::MAX);
    let lock_until = if attempts >= max_attempts {
        let minutes = i64::try_from(policy.lock_minutes).unwrap_or(i64::MAX / 60);
        Some(now + Duration::minutes(minutes))
    } else {
        None
    };

    FailedLogin { attempts, lock_until }
}

pub(crate) fn minutes_remaining(until: PrimitiveDateTime, now: PrimitiveDateTime) -> i64 {
    let seconds = (until - now).whole_seconds().max(0);
    (seconds + 59) / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::UserStats;
    use crate::db::types::{UserRole, UserStatus};
    use sqlx::types::Json;
    use time::macros::datetime;

    const NOW: PrimitiveDateTime = datetime!(2025-03-10 12:00);
    const POLICY: LockoutPolicy = LockoutPolicy { max_attempts: 5, lock_minutes: 120 };

    fn user(attempts: i32, lock_until: Option<PrimitiveDateTime>) -> User {
        User {
            id: "u1".to_string(),
            username: "learner".to_string(),
            email: None,
            hashed_password: String::new(),
            display_name: "Learner".to_string(),
            role: UserRole::User,
            status: UserStatus::Active,
            login_attempts: attempts,
            lock_until,
            last_login_at: None,
            stats: Json(UserStats::default()),
            created_at: NOW,
            updated_at: NOW,
        }
    }

    #[test]
    fn fifth_failure_locks_account() {
        let update = register_failure(&user(3, None), POLICY, NOW);
        assert_eq!(update, FailedLogin { attempts: 4, lock_until: None });

        let update = register_failure(&user(4, None), POLICY, NOW);
        assert_eq!(update.attempts, 5);
        assert_eq!(update.lock_until, Some(datetime!(2025-03-10 14:00)));
    }

    #[test]
    fn active_lock_closes_gate() {
        let locked = user(5, Some(datetime!(2025-03-10 13:00)));
        assert_eq!(
            login_gate(&locked, NOW),
            LoginGate::Locked { until: datetime!(2025-03-10 13:00) }
        );
        assert_eq!(minutes_remaining(datetime!(2025-03-10 13:00), NOW), 60);
    }

    #[test]
    fn expired_lock_reopens_and_restarts_count() {
        let expired = user(5, Some(datetime!(2025-03-10 11:00)));
        assert_eq!(login_gate(&expired, NOW), LoginGate::Open);
        assert_eq!(register_failure(&expired, POLICY, NOW).attempts, 1);
    }

    #[test]
    fn disabled_accounts_are_rejected_first() {
        let mut disabled = user(0, None);
        disabled.status = UserStatus::Disabled;
        assert_eq!(login_gate(&disabled, NOW), LoginGate::Disabled);
    }
}
