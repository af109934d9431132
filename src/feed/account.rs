//! Turning a user argument into an account.

use tracing::{debug, warn};

use super::FeedApi;
use super::error::FeedError;

/// A resolved account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub uid: String,
    pub screen_name: Option<String>,
}

impl Account {
    /// The screen name, or `(uid)` when it is unknown.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.screen_name
            .clone()
            .unwrap_or_else(|| format!("({})", self.uid))
    }
}

/// Whether `user` is written as an account identifier (10 digits).
#[must_use]
pub fn is_account_id(user: &str) -> bool {
    user.len() == 10 && user.bytes().all(|b| b.is_ascii_digit())
}

/// Resolves a user argument: an account identifier or a display name.
///
/// An identifier is accepted as is and its screen name looked up; a failed
/// lookup only leaves the name unknown. A display name must resolve to an
/// identifier, otherwise `Ok(None)` is returned.
///
/// # Errors
///
/// Returns the [`FeedError`] of a failed display-name lookup.
pub async fn resolve_account(api: &dyn FeedApi, user: &str) -> Result<Option<Account>, FeedError> {
    let user = user.trim();
    if is_account_id(user) {
        let screen_name = match api.name_for_uid(user).await {
            Ok(name) => name,
            Err(error) => {
                warn!(uid = user, error = %error, "screen name lookup failed");
                None
            }
        };
        return Ok(Some(Account {
            uid: user.to_string(),
            screen_name,
        }));
    }

    let Some(uid) = api.uid_for_name(user).await? else {
        debug!(user, "display name did not resolve");
        return Ok(None);
    };
    Ok(Some(Account {
        uid,
        screen_name: Some(user.to_string()),
    }))
}
