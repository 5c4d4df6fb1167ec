use std::sync::Arc;

use anyhow::{anyhow, Result};
use jsonwebtoken::{decode, encode, get_current_timestamp, DecodingKey, EncodingKey, Header, Validation};
use tracing::{info, warn};

use super::dto::{AuthResponse, LoginRequest, TokenClaims, UserResponse};
use super::model::{Account, FIXED_ACCOUNTS};
use crate::common::security;

/// Verifies passwords against the built-in accounts and issues HS256 bearer tokens.
#[derive(Clone)]
pub struct CredentialService {
    accounts: Arc<Vec<Account>>,
    secret: Arc<str>,
    ttl_secs: u64,
}

impl CredentialService {
    pub fn new(secret: &str, ttl_hours: u64) -> Result<Self> {
        let accounts = FIXED_ACCOUNTS
            .iter()
            .map(|(id, username, password, role)| {
                Ok(Account {
                    id: id.to_string(),
                    username: username.to_string(),
                    password_hash: security::hash_password(password)?,
                    role: *role,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!("✅ Loaded {} accounts", accounts.len());

        Ok(Self {
            accounts: Arc::new(accounts),
            secret: Arc::from(secret),
            ttl_secs: ttl_hours * 60 * 60,
        })
    }

    pub fn verify(&self, username: &str, password: &str) -> Option<&Account> {
        let account = self.accounts.iter().find(|a| a.username == username)?;
        security::verify_password(password, &account.password_hash).ok()?;
        Some(account)
    }

    pub fn login(&self, req: LoginRequest) -> Result<AuthResponse> {
        let Some(account) = self.verify(&req.username, &req.password) else {
            warn!(username = %req.username, "rejected login");
            return Err(anyhow!("Invalid credentials"));
        };

        let token = self.issue_token(account)?;
        info!(user_id = %account.id, "🔑 issued token");

        Ok(AuthResponse {
            token,
            user: UserResponse {
                id: account.id.clone(),
                username: account.username.clone(),
                role: account.role,
            },
        })
    }

    pub fn issue_token(&self, account: &Account) -> Result<String> {
        let now = get_current_timestamp();
        let claims = TokenClaims {
            sub: account.id.clone(),
            username: account.username.clone(),
            role: account.role,
            iat: now as usize,
            exp: (now + self.ttl_secs) as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| anyhow!(e.to_string()))
    }

    pub fn decode_token(&self, token: &str) -> Result<TokenClaims> {
        let data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| anyhow!(e.to_string()))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::model::UserRole;

    fn service() -> CredentialService {
        CredentialService::new("test-secret", 6).unwrap()
    }

    fn login(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn fixed_accounts_log_in() {
        let creds = service();
        let res = creds.login(login("angus", "pass123")).unwrap();
        assert_eq!(res.user.id, "2");
        assert_eq!(res.user.role, UserRole::User);

        let claims = creds.decode_token(&res.token).unwrap();
        assert_eq!(claims.sub, "2");
        assert_eq!(claims.username, "angus");
        assert_eq!(claims.exp - claims.iat, 6 * 60 * 60);
    }

    #[test]
    fn wrong_password_or_user_is_rejected() {
        let creds = service();
        assert!(creds.login(login("admin", "nope")).is_err());
        assert!(creds.login(login("nobody", "admin123")).is_err());
        assert!(creds.verify("admin", "admin123").is_some());
    }

    #[test]
    fn tokens_from_another_secret_do_not_decode() {
        let ours = service();
        let theirs = CredentialService::new("other-secret", 6).unwrap();
        let token = theirs.login(login("admin", "admin123")).unwrap().token;
        assert!(ours.decode_token(&token).is_err());
        assert!(ours.decode_token("garbage").is_err());
    }
}
