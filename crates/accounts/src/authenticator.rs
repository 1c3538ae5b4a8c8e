use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    rhea_protocol::{LoginRequest, LoginResponse, Sex, login_codes},
    tracing::{debug, info},
};

use crate::{
    account::AccountId,
    repository::{AccountError, AccountRepository},
};

// ── Types ────────────────────────────────────────────────────────────────────

/// Configurable refusal rules applied after the fixed account checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthPolicy {
    /// 0 disables version gating.
    pub min_client_version: u32,
}

/// Why a login was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    UnknownAccount,
    BadPassword,
    /// Non-zero account state; reported as `state - 1`, clamped at `i32::MIN`.
    AccountState(i32),
    Banned { until: DateTime<Utc> },
    OutdatedClient { required: u32, reported: u32 },
}

impl AuthFailure {
    pub fn code(&self) -> i32 {
        match self {
            AuthFailure::UnknownAccount => login_codes::UNKNOWN_ACCOUNT,
            AuthFailure::BadPassword => login_codes::BAD_PASSWORD,
            AuthFailure::AccountState(state) => state.saturating_sub(1),
            AuthFailure::Banned { .. } => login_codes::BANNED,
            AuthFailure::OutdatedClient { .. } => login_codes::OUTDATED_CLIENT,
        }
    }
}

/// Decision for one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Granted { account_id: AccountId, sex: Sex },
    Denied(AuthFailure),
}

impl AuthOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AuthOutcome::Granted { .. })
    }

    pub fn into_response(self) -> LoginResponse {
        match self {
            AuthOutcome::Granted { account_id, sex } => LoginResponse::granted(account_id, sex),
            AuthOutcome::Denied(failure) => LoginResponse::refused(failure.code()),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Constant-time string comparison.
fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

// ── Authenticator ────────────────────────────────────────────────────────────

/// Verifies credentials against the account store.
pub struct Authenticator {
    repo: Arc<dyn AccountRepository>,
    policy: AuthPolicy,
}

impl Authenticator {
    pub fn new(repo: Arc<dyn AccountRepository>, policy: AuthPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn repository(&self) -> &Arc<dyn AccountRepository> {
        &self.repo
    }

    pub async fn authenticate(&self, req: &LoginRequest) -> Result<AuthOutcome, AccountError> {
        self.authenticate_at(req, Utc::now()).await
    }

    /// Evaluate `req` as of `now`.
    ///
    /// Checks run in a fixed order and stop at the first refusal. An expired
    /// ban is cleared in the store before this returns; a store error on that
    /// write fails the call.
    pub async fn authenticate_at(
        &self,
        req: &LoginRequest,
        now: DateTime<Utc>,
    ) -> Result<AuthOutcome, AccountError> {
        let Some(account) = self.repo.find_by_username(&req.username).await? else {
            debug!(username = %req.username, "login refused: unknown account");
            return Ok(AuthOutcome::Denied(AuthFailure::UnknownAccount));
        };

        if !safe_equal(&req.password, &account.password) {
            debug!(account_id = account.account_id, "login refused: bad password");
            return Ok(AuthOutcome::Denied(AuthFailure::BadPassword));
        }

        if account.state != 0 {
            debug!(
                account_id = account.account_id,
                state = account.state,
                "login refused: account state"
            );
            return Ok(AuthOutcome::Denied(AuthFailure::AccountState(account.state)));
        }

        if let Some(until) = account.ban_expiry {
            if until > now {
                debug!(account_id = account.account_id, %until, "login refused: banned");
                return Ok(AuthOutcome::Denied(AuthFailure::Banned { until }));
            }
            self.repo.clear_ban(account.account_id).await?;
            info!(account_id = account.account_id, %until, "ban expired, cleared");
        }

        let required = self.policy.min_client_version;
        if required > 0 && req.client_version < required {
            debug!(
                account_id = account.account_id,
                required,
                reported = req.client_version,
                "login refused: outdated client"
            );
            return Ok(AuthOutcome::Denied(AuthFailure::OutdatedClient {
                required,
                reported: req.client_version,
            }));
        }

        Ok(AuthOutcome::Granted {
            account_id: account.account_id,
            sex: account.sex,
        })
    }
}

#[cfg(test)]
mod tests {
    use {async_trait::async_trait, chrono::Duration};

    use {
        super::*,
        crate::{account::Account, memory::MemoryAccountRepository},
    };

    fn request(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.into(),
            password: password.into(),
            client_version: 20,
            client_type: 0,
        }
    }

    fn engine(accounts: Vec<Account>) -> (Arc<MemoryAccountRepository>, Authenticator) {
        let repo = Arc::new(MemoryAccountRepository::with_accounts(accounts));
        let auth = Authenticator::new(repo.clone(), AuthPolicy::default());
        (repo, auth)
    }

    #[tokio::test]
    async fn unknown_account() {
        let (_, auth) = engine(vec![]);
        let outcome = auth.authenticate(&request("ghost", "x")).await.unwrap();
        assert_eq!(outcome, AuthOutcome::Denied(AuthFailure::UnknownAccount));

        let resp = outcome.into_response();
        assert!(!resp.success);
        assert_eq!(resp.error_code, login_codes::UNKNOWN_ACCOUNT);
        assert_eq!(resp.account_id, 0);
    }

    #[tokio::test]
    async fn bad_password() {
        let (_, auth) = engine(vec![Account::new(1, "alice", "secret", Sex::Female)]);
        let outcome = auth.authenticate(&request("alice", "Secret")).await.unwrap();
        assert_eq!(outcome, AuthOutcome::Denied(AuthFailure::BadPassword));
        assert_eq!(outcome.into_response().error_code, login_codes::BAD_PASSWORD);
    }

    #[tokio::test]
    async fn account_state_is_offset_by_one() {
        let (_, auth) = engine(vec![
            Account::new(1, "alice", "secret", Sex::Female).with_state(3),
        ]);
        let outcome = auth.authenticate(&request("alice", "secret")).await.unwrap();
        assert_eq!(outcome, AuthOutcome::Denied(AuthFailure::AccountState(3)));
        assert_eq!(outcome.into_response().error_code, 2);
    }

    #[tokio::test]
    async fn state_one_reports_code_zero_but_not_success() {
        let (_, auth) = engine(vec![
            Account::new(1, "alice", "secret", Sex::Female).with_state(1),
        ]);
        let resp = auth
            .authenticate(&request("alice", "secret"))
            .await
            .unwrap()
            .into_response();
        assert_eq!(resp.error_code, 0);
        assert!(!resp.success);
    }

    #[tokio::test]
    async fn state_checked_before_ban() {
        let now = Utc::now();
        let (repo, auth) = engine(vec![
            Account::new(1, "alice", "secret", Sex::Female)
                .with_state(5)
                .with_ban_expiry(now - Duration::days(1)),
        ]);
        let outcome = auth
            .authenticate_at(&request("alice", "secret"), now)
            .await
            .unwrap();
        assert_eq!(outcome, AuthOutcome::Denied(AuthFailure::AccountState(5)));
        // Refused before reaching the ban check, so the expired ban stays.
        assert!(repo.get("alice").await.unwrap().ban_expiry.is_some());
    }

    #[tokio::test]
    async fn future_ban_refuses_and_keeps_expiry() {
        let now = Utc::now();
        let until = now + Duration::hours(2);
        let (repo, auth) = engine(vec![
            Account::new(1, "alice", "secret", Sex::Female).with_ban_expiry(until),
        ]);

        let outcome = auth
            .authenticate_at(&request("alice", "secret"), now)
            .await
            .unwrap();
        assert_eq!(outcome, AuthOutcome::Denied(AuthFailure::Banned { until }));
        assert_eq!(outcome.into_response().error_code, login_codes::BANNED);
        assert_eq!(repo.get("alice").await.unwrap().ban_expiry, Some(until));
    }

    #[tokio::test]
    async fn expired_ban_is_cleared_and_login_succeeds() {
        let now = Utc::now();
        let (repo, auth) = engine(vec![
            Account::new(42, "alice", "secret", Sex::Male).with_ban_expiry(now - Duration::minutes(1)),
        ]);

        let outcome = auth
            .authenticate_at(&request("alice", "secret"), now)
            .await
            .unwrap();
        assert_eq!(outcome, AuthOutcome::Granted {
            account_id: 42,
            sex: Sex::Male
        });
        assert!(repo.get("alice").await.unwrap().ban_expiry.is_none());

        let resp = outcome.into_response();
        assert!(resp.success);
        assert_eq!(resp.error_code, 0);
        assert_eq!(resp.account_id, 42);
        assert_eq!(resp.sex, Sex::Male);
    }

    #[tokio::test]
    async fn ban_ending_exactly_now_is_expired() {
        let now = Utc::now();
        let (repo, auth) = engine(vec![
            Account::new(1, "alice", "secret", Sex::Female).with_ban_expiry(now),
        ]);
        let outcome = auth
            .authenticate_at(&request("alice", "secret"), now)
            .await
            .unwrap();
        assert!(outcome.is_granted());
        assert!(repo.get("alice").await.unwrap().ban_expiry.is_none());
    }

    #[tokio::test]
    async fn alice_end_to_end() {
        let (_, auth) = engine(vec![Account::new(2000001, "alice", "secret", Sex::Female)]);
        let resp = auth
            .authenticate(&request("alice", "secret"))
            .await
            .unwrap()
            .into_response();
        assert_eq!(resp, LoginResponse::granted(2000001, Sex::Female));
    }

    #[tokio::test]
    async fn version_gate() {
        let repo = Arc::new(MemoryAccountRepository::with_accounts([Account::new(
            1,
            "alice",
            "secret",
            Sex::Female,
        )]));
        let auth = Authenticator::new(repo, AuthPolicy {
            min_client_version: 25,
        });

        let outcome = auth.authenticate(&request("alice", "secret")).await.unwrap();
        assert_eq!(
            outcome,
            AuthOutcome::Denied(AuthFailure::OutdatedClient {
                required: 25,
                reported: 20
            })
        );
        assert_eq!(outcome.into_response().error_code, login_codes::OUTDATED_CLIENT);

        // Unknown accounts are still reported as unknown.
        let outcome = auth.authenticate(&request("ghost", "secret")).await.unwrap();
        assert_eq!(outcome, AuthOutcome::Denied(AuthFailure::UnknownAccount));
    }

    struct FailingClear(MemoryAccountRepository);

    #[async_trait]
    impl AccountRepository for FailingClear {
        fn backend(&self) -> &'static str {
            "failing"
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AccountError> {
            self.0.find_by_username(username).await
        }

        async fn clear_ban(&self, _account_id: AccountId) -> Result<(), AccountError> {
            Err(AccountError::Store(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn failed_ban_clear_fails_the_call() {
        let now = Utc::now();
        let repo = FailingClear(MemoryAccountRepository::with_accounts([Account::new(
            1,
            "alice",
            "secret",
            Sex::Female,
        )
        .with_ban_expiry(now - Duration::hours(1))]));
        let auth = Authenticator::new(Arc::new(repo), AuthPolicy::default());
        let err = auth
            .authenticate_at(&request("alice", "secret"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Store(_)));
    }

    #[test]
    fn extreme_state_codes_do_not_overflow() {
        assert_eq!(AuthFailure::AccountState(i32::MIN).code(), i32::MIN);
        assert_eq!(AuthFailure::AccountState(i32::MAX).code(), i32::MAX - 1);
        assert_eq!(AuthFailure::AccountState(-1).code(), -2);
    }

    #[test]
    fn safe_equal_works() {
        assert!(safe_equal("secret", "secret"));
        assert!(!safe_equal("secret", "secreT"));
        assert!(!safe_equal("secret", "secrets"));
    }
}
