//! Credential store for login/registration

use std::sync::{Arc, Mutex, MutexGuard};

use log::info;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::error::{FleetError, Result};
use crate::store::Clock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Public view of an account, never carries the password
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Admin account seeded at startup
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AdminAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

struct Account {
    user: User,
    salt: [u8; 16],
    digest: [u8; 32],
}

pub struct CredentialStore {
    accounts: Mutex<Vec<Account>>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: Mutex::new(vec![]),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Account>>> {
        self.accounts
            .lock()
            .map_err(|_| FleetError::Internal("credential store lock poisoned".to_string()))
    }

    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        self.create(name, email, password, Role::User)
    }

    pub fn seed_admin(&self, admin: &AdminAccount) -> Result<User> {
        self.create(&admin.name, &admin.email, &admin.password, Role::Admin)
    }

    fn create(&self, name: &str, email: &str, password: &str, role: Role) -> Result<User> {
        let name = required(name, "name")?;
        let email = required(email, "email")?;
        if password.is_empty() {
            return Err(FleetError::missing("password"));
        }

        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = hash(&salt, password);

        let mut accounts = self.lock()?;
        if accounts.iter().any(|a| a.user.email == email) {
            return Err(FleetError::Conflict(format!(
                "Email `{}` is already registered",
                email
            )));
        }

        let user = User {
            id: accounts.len() as u64 + 1,
            name,
            email,
            role,
            created_at: self.clock.now(),
        };
        accounts.push(Account {
            user: user.clone(),
            salt,
            digest,
        });

        info!("Registered {:?} account #{}", role, user.id);

        Ok(user)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Session> {
        let email = required(email, "email")?;
        if password.is_empty() {
            return Err(FleetError::missing("password"));
        }

        let accounts = self.lock()?;
        let account = accounts
            .iter()
            .find(|a| a.user.email == email && hash(&a.salt, password) == a.digest)
            .ok_or(FleetError::Unauthorized)?;

        let mut token = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut token);

        Ok(Session {
            user: account.user.clone(),
            token: to_hex(&token),
        })
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

fn required(value: &str, field: &'static str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FleetError::missing(field));
    }
    Ok(value.to_string())
}

fn hash(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
