//! User administration (admin-only endpoints).

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::types::{NewUser, User, UserList, UserUpdate};
use crate::api::{paths, ApiClient, ApiError};
use crate::bus::{BusEvent, SharedBus};
use crate::settings::SettingsError;

#[derive(Serialize)]
struct PasswordReset<'a> {
    new_password: &'a str,
}

#[derive(Serialize)]
struct PasswordChange<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

fn user_path(username: &str) -> String {
    format!("{}/{}", paths::USERS, urlencoding::encode(username))
}

pub struct UserAdmin {
    client: ApiClient,
    bus: SharedBus,
}

impl UserAdmin {
    pub fn new(client: ApiClient, bus: SharedBus) -> Self {
        Self { client, bus }
    }

    fn reject(&self, message: &str) -> SettingsError {
        self.bus.publish(BusEvent::error(message));
        SettingsError::Validation(message.to_string())
    }

    fn failed(&self, message: &str, error: ApiError) -> SettingsError {
        warn!("{}: {}", message, error);
        self.bus.publish(BusEvent::error(message));
        error.into()
    }

    pub async fn list(&self) -> Result<Vec<User>, SettingsError> {
        match self.client.get_json::<UserList>(paths::USERS).await {
            Ok(list) => Ok(list.users),
            Err(e) => Err(self.failed("Failed to load users", e)),
        }
    }

    pub async fn create(&self, user: NewUser) -> Result<(), SettingsError> {
        if user.username.trim().is_empty() || user.password.is_empty() {
            return Err(self.reject("Username and password are required"));
        }

        self.client
            .post_json::<_, Value>(paths::USERS, &user)
            .await
            .map_err(|e| self.failed("Failed to create user", e))?;

        info!(username = %user.username, "User created");
        self.bus.publish(BusEvent::success("User created"));
        Ok(())
    }

    pub async fn update(&self, username: &str, update: UserUpdate) -> Result<(), SettingsError> {
        self.client
            .patch_json::<_, Value>(&user_path(username), &update)
            .await
            .map_err(|e| self.failed("Failed to update user", e))?;

        self.bus.publish(BusEvent::success("User updated"));
        Ok(())
    }

    pub async fn reset_password(&self, username: &str, new_password: &str) -> Result<(), SettingsError> {
        if new_password.is_empty() {
            return Err(self.reject("New password is required"));
        }

        let path = format!("{}/reset-password", user_path(username));
        self.client
            .post_json::<_, Value>(&path, &PasswordReset { new_password })
            .await
            .map_err(|e| self.failed("Failed to reset password", e))?;

        info!(username, "Password reset");
        self.bus.publish(BusEvent::success("Password reset"));
        Ok(())
    }

    /// Change the calling user's own password
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), SettingsError> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(self.reject("Current and new password are required"));
        }

        self.client
            .post_json::<_, Value>(
                paths::CHANGE_PASSWORD,
                &PasswordChange {
                    current_password,
                    new_password,
                },
            )
            .await
            .map_err(|e| self.failed("Failed to change password", e))?;

        self.bus.publish(BusEvent::success("Password changed"));
        Ok(())
    }
}
