//! User service
//!
//! Registration, login, profile reads and self-service updates.
//! Login issues a JWT through [`TokenService`].

use serde::Serialize;
use std::sync::Arc;

use crate::db::repositories::UserRepository;
use crate::db::UnitOfWork;
use crate::error::{AppError, AppResult};
use crate::models::{LoginInput, RegisterUserInput, UpdateUserInput, User};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::TokenService;

/// Successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// User service for accounts and authentication
pub struct UserService {
    uow: UnitOfWork,
    users: Arc<dyn UserRepository>,
    tokens: TokenService,
}

impl UserService {
    pub fn new(uow: UnitOfWork, users: Arc<dyn UserRepository>, tokens: TokenService) -> Self {
        Self { uow, users, tokens }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// - `Validation` if a field is empty
    /// - `Conflict` if the email is already registered
    pub async fn register(&self, input: RegisterUserInput) -> AppResult<User> {
        if input.password.is_empty() {
            return Err(AppError::validation("password must not be empty"));
        }
        let user = User::new(input.username, input.email, hash_password(&input.password)?)?;

        let users = self.users.clone();
        let created = self
            .uow
            .transaction(|tx| async move {
                match users.find_by_email(&tx, &user.email).await {
                    Ok(_) => {
                        return Err(AppError::Conflict(format!(
                            "email already registered: {}",
                            user.email
                        )))
                    }
                    Err(AppError::NotFound { .. }) => {}
                    Err(e) => return Err(e),
                }
                users.create(&tx, &user).await?;
                Ok(user)
            })
            .await?;

        tracing::info!("Registered user {}", created.id);
        Ok(created)
    }

    /// Check credentials and issue an access token.
    ///
    /// Unknown email and wrong password both yield the same `Unauthorized`.
    pub async fn login(&self, input: LoginInput) -> AppResult<LoginResponse> {
        let invalid = || AppError::Unauthorized("invalid email or password".into());

        let user = match self.users.find_by_email(&self.uow.handle(), &input.email).await {
            Ok(user) => user,
            Err(AppError::NotFound { .. }) => return Err(invalid()),
            Err(e) => return Err(e),
        };
        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!("Rejected login for user {}", user.id);
            return Err(invalid());
        }

        let token = self.tokens.issue(&user.id)?;
        Ok(LoginResponse { token, user })
    }

    pub async fn get(&self, id: &str) -> AppResult<User> {
        self.users.find_by_id(&self.uow.handle(), id).await
    }

    /// Update the caller's own account
    pub async fn update(&self, actor_id: &str, id: &str, input: UpdateUserInput) -> AppResult<User> {
        ensure_self(actor_id, id)?;
        let password_hash = match &input.password {
            Some(p) if p.is_empty() => return Err(AppError::validation("password must not be empty")),
            Some(p) => Some(hash_password(p)?),
            None => None,
        };

        let users = self.users.clone();
        let id = id.to_string();
        self.uow
            .transaction(|tx| async move {
                let mut user = users.find_by_id(&tx, &id).await?;

                if let Some(username) = input.username {
                    if username.trim().is_empty() {
                        return Err(AppError::validation("username must not be empty"));
                    }
                    user.username = username;
                }
                if let Some(email) = input.email {
                    if email.trim().is_empty() {
                        return Err(AppError::validation("email must not be empty"));
                    }
                    match users.find_by_email(&tx, &email).await {
                        Ok(other) if other.id != user.id => {
                            return Err(AppError::Conflict(format!(
                                "email already registered: {}",
                                email
                            )))
                        }
                        Ok(_) | Err(AppError::NotFound { .. }) => {}
                        Err(e) => return Err(e),
                    }
                    user.email = email;
                }
                if let Some(hash) = password_hash {
                    user.password_hash = hash;
                }
                user.touch();

                users.update(&tx, &user).await?;
                Ok(user)
            })
            .await
    }

    /// Delete the caller's own account
    pub async fn delete(&self, actor_id: &str, id: &str) -> AppResult<()> {
        ensure_self(actor_id, id)?;
        self.users.delete(&self.uow.handle(), id).await?;
        tracing::info!("Deleted user {}", id);
        Ok(())
    }
}

fn ensure_self(actor_id: &str, id: &str) -> AppResult<()> {
    if actor_id != id {
        return Err(AppError::Forbidden("users may only modify their own account".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::AuthConfig;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::test_storage;

    async fn setup_service() -> UserService {
        let storage = test_storage().await;
        let tokens = TokenService::new(&AuthConfig::default(), SystemClock::shared());
        UserService::new(UnitOfWork::new(storage), SqlxUserRepository::boxed(), tokens)
    }

    fn register_input(username: &str, email: &str) -> RegisterUserInput {
        RegisterUserInput {
            username: username.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let service = setup_service().await;
        let user = service
            .register(register_input("alice", "alice@example.com"))
            .await
            .expect("Failed to register");
        assert!(user.password_hash.starts_with("$argon2id$"));

        let login = service
            .login(LoginInput {
                email: "alice@example.com".into(),
                password: "password123".into(),
            })
            .await
            .expect("Failed to log in");
        assert_eq!(login.user.id, user.id);
        assert!(!login.token.is_empty());
    }

    #[tokio::test]
    async fn test_register_validation_and_conflict() {
        let service = setup_service().await;

        let result = service.register(register_input("", "x@example.com")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let mut no_password = register_input("bob", "bob@example.com");
        no_password.password.clear();
        assert!(matches!(
            service.register(no_password).await,
            Err(AppError::Validation(_))
        ));

        service.register(register_input("bob", "bob@example.com")).await.unwrap();
        let result = service.register(register_input("bobby", "bob@example.com")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let service = setup_service().await;
        service.register(register_input("carol", "carol@example.com")).await.unwrap();

        let wrong_password = service
            .login(LoginInput {
                email: "carol@example.com".into(),
                password: "nope".into(),
            })
            .await;
        assert!(matches!(wrong_password, Err(AppError::Unauthorized(_))));

        let unknown = service
            .login(LoginInput {
                email: "nobody@example.com".into(),
                password: "password123".into(),
            })
            .await;
        assert!(matches!(unknown, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_update_checks_ownership_and_email_uniqueness() {
        let service = setup_service().await;
        let dave = service.register(register_input("dave", "dave@example.com")).await.unwrap();
        let erin = service.register(register_input("erin", "erin@example.com")).await.unwrap();

        let forbidden = service
            .update(&erin.id, &dave.id, UpdateUserInput::default())
            .await;
        assert!(matches!(forbidden, Err(AppError::Forbidden(_))));

        let taken = service
            .update(
                &dave.id,
                &dave.id,
                UpdateUserInput {
                    email: Some("erin@example.com".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));

        // Keeping one's own email is not a conflict
        let updated = service
            .update(
                &dave.id,
                &dave.id,
                UpdateUserInput {
                    username: Some("david".into()),
                    email: Some("dave@example.com".into()),
                    password: Some("new-password".into()),
                },
            )
            .await
            .expect("Failed to update user");
        assert_eq!(updated.username, "david");

        assert!(service
            .login(LoginInput {
                email: "dave@example.com".into(),
                password: "new-password".into(),
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let service = setup_service().await;
        let frank = service.register(register_input("frank", "frank@example.com")).await.unwrap();

        service.delete(&frank.id, &frank.id).await.unwrap();
        assert!(matches!(
            service.get(&frank.id).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
