use crate::model::{
    Id,
    auth::{Password, PasswordHash},
    bounded_text,
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

pub const USERNAME_MAX_LEN: usize = 50;
pub const DISPLAY_NAME_MAX_LEN: usize = 100;

bounded_text!(Username, InvalidUsernameError, "username", max = USERNAME_MAX_LEN);
bounded_text!(
    DisplayName,
    InvalidDisplayNameError,
    "display name",
    max = DISPLAY_NAME_MAX_LEN
);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

/// The public part of an account.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub name: DisplayName,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Account {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub password_hash: PasswordHash,
    pub name: DisplayName,
    pub gender: Gender,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateAccount {
    pub username: Username,
    pub password_hash: PasswordHash,
    pub name: DisplayName,
    pub gender: Gender,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct Registration {
    pub username: Username,
    pub password: Password,
    pub name: DisplayName,
    pub gender: Gender,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct Login {
    pub username: Username,
    pub password: Password,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown gender: {0:?}")]
pub struct InvalidGenderError(String);

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = InvalidGenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(InvalidGenderError(s.to_owned())),
        }
    }
}

impl From<Account> for User {
    fn from(value: Account) -> Self {
        Self {
            id: value.id,
            username: value.username,
            name: value.name,
        }
    }
}
