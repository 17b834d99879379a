use anyhow::{anyhow, Result};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sha2::{Digest, Sha256};
use sqlx::{PgConnection, Row};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::user::User;
use crate::infra::db::Db;

/// Used as both `iss` and `aud`.
const ISSUER: &str = "folio";
const KIND_CLAIM: &str = "kind";

/// Sign-up input, already validated and normalized by the caller.
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A freshly opened session: a short-lived access token plus the refresh
/// token that can be exchanged for the next session.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

/// Secret keys and lifetimes for both token kinds.
#[derive(Clone)]
pub struct SessionKeys {
    pub access_key: [u8; 32],
    pub refresh_key: [u8; 32],
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn label(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl SessionKeys {
    fn key(&self, kind: TokenKind) -> Result<SymmetricKey<V4>> {
        let bytes = match kind {
            TokenKind::Access => &self.access_key,
            TokenKind::Refresh => &self.refresh_key,
        };
        Ok(SymmetricKey::<V4>::from(bytes)?)
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Encrypts a token of `kind` for `user_id`. Refresh tokens carry their
    /// row id as `jti`.
    fn seal(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        token_id: Option<Uuid>,
    ) -> Result<(String, OffsetDateTime)> {
        let ttl = self.ttl(kind);
        let mut claims = Claims::new_expires_in(&std::time::Duration::try_from(ttl)?)?;
        claims.issuer(ISSUER)?;
        claims.audience(ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional(KIND_CLAIM, kind.label())?;
        if let Some(token_id) = token_id {
            claims.token_identifier(&token_id.to_string())?;
        }

        let token = local::encrypt(&self.key(kind)?, &claims, None, None)?;
        Ok((token, OffsetDateTime::now_utc() + ttl))
    }

    /// Decrypts and validates a token of `kind`. Anything that fails
    /// validation reads as `None`.
    fn open(&self, kind: TokenKind, token: &str) -> Option<OpenedToken> {
        let untrusted = UntrustedToken::<Local, V4>::try_from(token).ok()?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(ISSUER);
        rules.validate_audience_with(ISSUER);

        let key = self.key(kind).ok()?;
        let trusted = local::decrypt(&key, &untrusted, &rules, None, None).ok()?;
        let claims = trusted.payload_claims()?;

        if claim_str(claims, KIND_CLAIM)? != kind.label() {
            return None;
        }
        let user_id = Uuid::parse_str(claim_str(claims, "sub")?).ok()?;
        let token_id = match claim_str(claims, "jti") {
            Some(raw) => Some(Uuid::parse_str(raw).ok()?),
            None => None,
        };
        Some(OpenedToken { user_id, token_id })
    }
}

struct OpenedToken {
    user_id: Uuid,
    token_id: Option<Uuid>,
}

/// Accounts, credentials and session tokens.
#[derive(Clone)]
pub struct IdentityService {
    db: Db,
    keys: SessionKeys,
}

impl IdentityService {
    pub fn new(db: Db, keys: SessionKeys) -> Self {
        Self { db, keys }
    }

    /// Stores a new account. Username and email uniqueness is left to the
    /// database, so callers see the constraint violation.
    pub async fn sign_up(&self, account: NewAccount) -> Result<User> {
        let password_hash = hash_password(&account.password)?;
        let row = sqlx::query(
            "INSERT INTO users (username, email, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING id, username, email, created_at",
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(password_hash)
        .fetch_one(self.db.pool())
        .await?;

        Ok(User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            created_at: row.get("created_at"),
        })
    }

    /// `login` matches either the username or the email address.
    pub async fn sign_in(&self, login: &str, password: &str) -> Result<Option<Session>> {
        let account: Option<(Uuid, String)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE username = $1 OR email = $1")
                .bind(login)
                .fetch_optional(self.db.pool())
                .await?;

        match account {
            Some((user_id, stored)) if password_matches(password, &stored)? => {
                Ok(Some(self.open_session(user_id).await?))
            }
            _ => Ok(None),
        }
    }

    pub async fn open_session(&self, user_id: Uuid) -> Result<Session> {
        let mut conn = self.db.pool().acquire().await?;
        let (session, _) = self.store_session(user_id, &mut conn).await?;
        Ok(session)
    }

    /// Spends `refresh_token` and opens the session that replaces it. A token
    /// can be spent once; a second attempt yields `None`.
    pub async fn rotate(&self, refresh_token: &str) -> Result<Option<Session>> {
        let Some((user_id, token_id)) = self.open_refresh(refresh_token) else {
            return Ok(None);
        };

        let mut tx = self.db.pool().begin().await?;
        let spent = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 \
               AND revoked_at IS NULL AND expires_at > now()",
        )
        .bind(token_id)
        .bind(user_id)
        .bind(fingerprint(refresh_token))
        .execute(&mut *tx)
        .await?;
        if spent.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let (session, successor) = self.store_session(user_id, &mut tx).await?;
        sqlx::query("UPDATE refresh_tokens SET replaced_by = $1 WHERE id = $2")
            .bind(successor)
            .bind(token_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(session))
    }

    /// Returns whether a live refresh token was revoked.
    pub async fn sign_out(&self, refresh_token: &str) -> Result<bool> {
        let Some((user_id, token_id)) = self.open_refresh(refresh_token) else {
            return Ok(false);
        };

        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 AND revoked_at IS NULL",
        )
        .bind(token_id)
        .bind(user_id)
        .bind(fingerprint(refresh_token))
        .execute(self.db.pool())
        .await?;

        Ok(revoked.rows_affected() > 0)
    }

    /// Resolves a bearer access token to its user.
    pub fn verify_access(&self, access_token: &str) -> Option<Uuid> {
        self.keys
            .open(TokenKind::Access, access_token)
            .map(|opened| opened.user_id)
    }

    fn open_refresh(&self, refresh_token: &str) -> Option<(Uuid, Uuid)> {
        let opened = self.keys.open(TokenKind::Refresh, refresh_token)?;
        Some((opened.user_id, opened.token_id?))
    }

    async fn store_session(
        &self,
        user_id: Uuid,
        conn: &mut PgConnection,
    ) -> Result<(Session, Uuid)> {
        let token_id = Uuid::new_v4();
        let (access_token, access_expires_at) = self.keys.seal(TokenKind::Access, user_id, None)?;
        let (refresh_token, refresh_expires_at) =
            self.keys.seal(TokenKind::Refresh, user_id, Some(token_id))?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(token_id)
        .bind(user_id)
        .bind(fingerprint(&refresh_token))
        .bind(refresh_expires_at)
        .execute(&mut *conn)
        .await?;

        let session = Session {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        };
        Ok((session, token_id))
    }
}

fn claim_str<'a>(claims: &'a Claims, name: &str) -> Option<&'a str> {
    claims.get_claim(name).and_then(|value| value.as_str())
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("hashing password: {}", err))
}

fn password_matches(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| anyhow!("stored password hash is unreadable: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Refresh tokens are stored as their SHA-256 hex digest.
fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys {
            access_key: [1u8; 32],
            refresh_key: [2u8; 32],
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(30),
        }
    }

    #[test]
    fn passwords_verify_against_their_hash_only() {
        let stored = hash_password("correct horse").unwrap();
        assert!(password_matches("correct horse", &stored).unwrap());
        assert!(!password_matches("battery staple", &stored).unwrap());
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sealed_tokens_open_only_as_their_kind() {
        let keys = keys();
        let user_id = Uuid::new_v4();
        let token_id = Uuid::new_v4();

        let (access, _) = keys.seal(TokenKind::Access, user_id, None).unwrap();
        let opened = keys.open(TokenKind::Access, &access).unwrap();
        assert_eq!(opened.user_id, user_id);
        assert!(opened.token_id.is_none());
        assert!(keys.open(TokenKind::Refresh, &access).is_none());

        let (refresh, expires_at) = keys
            .seal(TokenKind::Refresh, user_id, Some(token_id))
            .unwrap();
        assert_eq!(keys.open(TokenKind::Refresh, &refresh).unwrap().token_id, Some(token_id));
        assert!(keys.open(TokenKind::Access, &refresh).is_none());
        assert!(expires_at > OffsetDateTime::now_utc() + Duration::days(29));
    }

    #[test]
    fn garbage_never_opens() {
        let keys = keys();
        assert!(keys.open(TokenKind::Access, "v4.local.not-a-token").is_none());
        assert!(keys.open(TokenKind::Refresh, "").is_none());
    }
}
