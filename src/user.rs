//! Resource owners allowed to log in.

use std::collections::HashMap;

use crate::config::UserConfig;
use crate::crypto::PasswordManager;

/// Database user representation.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub(crate) password_hash: String,
}

impl From<UserConfig> for User {
    fn from(config: UserConfig) -> Self {
        Self {
            id: config.id,
            password_hash: config.password_hash,
        }
    }
}

/// Read-only set of users, loaded once at startup.
pub struct UserDirectory {
    users: HashMap<String, User>,
    pwd: PasswordManager,
}

impl UserDirectory {
    /// Create a new [`UserDirectory`].
    pub fn new(users: impl IntoIterator<Item = User>, pwd: PasswordManager) -> Self {
        Self {
            users: users.into_iter().map(|user| (user.id.clone(), user)).collect(),
            pwd,
        }
    }

    /// Check `password` for user `id`. Returns the user on success.
    pub fn authenticate(&self, id: &str, password: &str) -> Option<&User> {
        let user = self.users.get(id)?;

        if self.pwd.verify_password(password, &user.password_hash) {
            Some(user)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
