/// Implements a length-checked text newtype with validating `Deserialize`.
macro_rules! bounded_text {
    ($name:ident, $error:ident, $what:literal, max = $max:ident) => {
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, thiserror::Error)]
        #[error("The {what} must have between 1 and {max} characters: {value:?}")]
        pub struct $error {
            what: &'static str,
            value: String,
            max: usize,
        }

        impl $name {
            pub fn new(value: String) -> Result<Self, $error> {
                if (1..=$max).contains(&value.chars().count()) {
                    Ok(Self(value))
                } else {
                    Err($error {
                        what: $what,
                        value,
                        max: $max,
                    })
                }
            }

            #[must_use]
            pub fn get(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s.to_owned())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let inner = <String as serde::Deserialize>::deserialize(deserializer)?;
                Self::new(inner).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use bounded_text;

pub mod auth;
pub mod post;
pub mod user;

use crate::{
    model::{
        post::InvalidPostContentError,
        user::{InvalidDisplayNameError, InvalidGenderError, InvalidUsernameError},
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    DisplayName(#[from] InvalidDisplayNameError),
    #[error(transparent)]
    Gender(#[from] InvalidGenderError),
    #[error(transparent)]
    PostContent(#[from] InvalidPostContentError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PerchEpoch;
impl Epoch for PerchEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type PerchSnowflake = Snowflake<PerchEpoch>;
pub type PerchSnowflakeGenerator = SnowflakeGenerator<PerchEpoch>;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(PerchSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: PerchSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> PerchSnowflake {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<PerchSnowflake> for Id<Marker> {
    fn from(value: PerchSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(PerchSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}
