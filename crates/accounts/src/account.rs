use {
    chrono::{DateTime, Utc},
    rhea_protocol::Sex,
};

pub type AccountId = i64;

/// A persisted user identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub account_id: AccountId,
    pub username: String,
    pub password: String,
    /// 0 = active; any other value is a block reason.
    pub state: i32,
    /// Present while a temporary ban is (or was) in effect.
    pub ban_expiry: Option<DateTime<Utc>>,
    pub sex: Sex,
}

impl Account {
    /// An active, unbanned account.
    pub fn new(
        account_id: AccountId,
        username: impl Into<String>,
        password: impl Into<String>,
        sex: Sex,
    ) -> Self {
        Self {
            account_id,
            username: username.into(),
            password: password.into(),
            state: 0,
            ban_expiry: None,
            sex,
        }
    }

    pub fn with_state(mut self, state: i32) -> Self {
        self.state = state;
        self
    }

    pub fn with_ban_expiry(mut self, until: DateTime<Utc>) -> Self {
        self.ban_expiry = Some(until);
        self
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("account_id", &self.account_id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("state", &self.state)
            .field("ban_expiry", &self.ban_expiry)
            .field("sex", &self.sex)
            .finish()
    }
}
