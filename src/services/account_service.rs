use std::sync::{Arc, OnceLock};

use chrono::{Duration, Utc};
use log::info;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;

use crate::db::store::UserStore;
use crate::error::ApiError;
use crate::middleware::auth::JwtKeys;
use crate::middleware::auth_context::Identity;
use crate::models::new_id;
use crate::models::user::{AuthResponse, RegisterRequest, User, UserProfile, UserRole};
use crate::services::email_service::{dispatch, EmailMessage, Mailer};

const MIN_PASSWORD_LEN: usize = 6;
const RESET_TOKEN_LEN: usize = 40;
const RESET_TOKEN_TTL_MINUTES: i64 = 10;

fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(
                r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*$",
            )
            .ok()
        })
        .as_ref()
        .map_or(false, |re| re.is_match(email))
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn generate_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    jwt: JwtKeys,
    client_url: String,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        jwt: JwtKeys,
        client_url: String,
    ) -> Self {
        Self {
            users,
            mailer,
            jwt,
            client_url,
        }
    }

    fn session(&self, user: &User) -> Result<AuthResponse, ApiError> {
        Ok(AuthResponse {
            token: self.jwt.issue(&user.id, user.role)?,
            user: UserProfile::from(user),
        })
    }

    async fn load(&self, id: &str) -> Result<User, ApiError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User"))
    }

    /// New accounts always start as plain users; roles are granted by admins.
    pub async fn register(&self, input: RegisterRequest) -> Result<AuthResponse, ApiError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ApiError::validation("Name is required"));
        }
        let email = input.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(ApiError::validation("Please provide a valid email"));
        }
        validate_password(&input.password)?;

        let now = Utc::now();
        let user = User {
            id: new_id(),
            name: name.to_string(),
            email,
            phone: input.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            role: UserRole::User,
            password_hash: bcrypt::hash(&input.password, bcrypt::DEFAULT_COST)?,
            reset_password_token: None,
            reset_password_expires: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(&user).await?;
        info!("User {} registered", user.id);
        self.session(&user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());
        let user = self
            .users
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or_else(invalid)?;
        if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
            return Err(invalid());
        }
        self.session(&user)
    }

    pub async fn me(&self, actor: &Identity) -> Result<UserProfile, ApiError> {
        Ok(UserProfile::from(&self.load(&actor.user_id).await?))
    }

    /// Always succeeds so the response does not reveal which emails exist.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let Some(mut user) = self
            .users
            .find_by_email(&email.trim().to_lowercase())
            .await?
        else {
            return Ok(());
        };

        let token = generate_reset_token();
        user.reset_password_token = Some(token.clone());
        user.reset_password_expires =
            Some(Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES));
        user.updated_at = Utc::now();
        self.users.replace(&user).await?;

        let link = format!(
            "{}/reset-password/{}",
            self.client_url.trim_end_matches('/'),
            token
        );
        dispatch(
            self.mailer.clone(),
            EmailMessage {
                to: user.email.clone(),
                subject: "Password reset".to_string(),
                text: format!(
                    "You requested a password reset. Follow this link within {} minutes to choose a new password:\n\n{}\n\nIf you did not ask for this, ignore this email.",
                    RESET_TOKEN_TTL_MINUTES, link
                ),
            },
        );
        Ok(())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        validate_password(password)?;
        let invalid = || ApiError::validation("Reset token is invalid or has expired");
        let mut user = self
            .users
            .find_by_reset_token(token)
            .await?
            .ok_or_else(invalid)?;
        if user
            .reset_password_expires
            .map_or(true, |expires| expires <= Utc::now())
        {
            return Err(invalid());
        }

        user.password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
        user.reset_password_token = None;
        user.reset_password_expires = None;
        user.updated_at = Utc::now();
        self.users.replace(&user).await?;
        info!("Password reset for user {}", user.id);
        self.session(&user)
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, ApiError> {
        Ok(self
            .users
            .list()
            .await?
            .iter()
            .map(UserProfile::from)
            .collect())
    }

    /// The role stored for `user_id` now. Tokens carry the role from when
    /// they were issued, so anything guarding on privilege asks here.
    pub async fn current_role(&self, user_id: &str) -> Result<UserRole, ApiError> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|user| user.role)
            .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))
    }

    pub async fn set_role(&self, user_id: &str, role: UserRole) -> Result<UserProfile, ApiError> {
        let mut user = self.load(user_id).await?;
        user.role = role;
        user.updated_at = Utc::now();
        self.users.replace(&user).await?;
        info!("User {} is now {}", user.id, role);
        Ok(UserProfile::from(&user))
    }
}
