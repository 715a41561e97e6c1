use chrono::Utc;
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};

use crate::{
    EngineError, ResultEngine, User, users,
    util::{normalize_required_name, normalize_username},
};

use super::{Engine, with_tx};

impl Engine {
    /// Registers a user. Returns the normalized username, which is the id
    /// used everywhere else.
    pub async fn create_user(&self, username: &str, display_name: &str) -> ResultEngine<String> {
        let username = normalize_username(username)?;
        let display_name = normalize_required_name(display_name, "display")?;

        with_tx!(self, |db_tx| {
            if users::Entity::find_by_id(username.clone())
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(username));
            }

            users::ActiveModel {
                username: ActiveValue::Set(username.clone()),
                display_name: ActiveValue::Set(display_name),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;

            tracing::info!(user_id = %username, "user created");
            Ok(username)
        })
    }

    pub async fn user(&self, username: &str) -> ResultEngine<User> {
        let username = normalize_username(username)?;
        with_tx!(self, |db_tx| {
            let model = self.require_user_exists(&db_tx, &username).await?;
            Ok(User::from(model))
        })
    }
}
