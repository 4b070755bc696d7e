use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AccessError;

/// Strength of a permission on a repository.
///
/// Modes are totally ordered: `None < Read < Write < Admin < Owner`. Every
/// "is this enough" question is a comparison, and combining several grants
/// for the same user keeps the strongest one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    None,
    Read,
    Write,
    Admin,
    Owner,
}

impl AccessMode {
    /// Strongest of the given modes, `None` when there are none.
    pub fn max_of<I>(modes: I) -> AccessMode
    where
        I: IntoIterator<Item = AccessMode>,
    {
        modes.into_iter().max().unwrap_or(AccessMode::None)
    }

    /// Whether holding `self` satisfies an action that requires `required`.
    pub fn allows(self, required: AccessMode) -> bool {
        required <= self
    }

    /// Integer stored in the `accesses.mode` and `teams.authorize` columns.
    pub fn as_i32(self) -> i32 {
        match self {
            AccessMode::None => 0,
            AccessMode::Read => 1,
            AccessMode::Write => 2,
            AccessMode::Admin => 3,
            AccessMode::Owner => 4,
        }
    }
}

impl TryFrom<i32> for AccessMode {
    type Error = AccessError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AccessMode::None),
            1 => Ok(AccessMode::Read),
            2 => Ok(AccessMode::Write),
            3 => Ok(AccessMode::Admin),
            4 => Ok(AccessMode::Owner),
            other => Err(AccessError::InvalidAccessMode(other)),
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessMode::None => "none",
            AccessMode::Read => "read",
            AccessMode::Write => "write",
            AccessMode::Admin => "admin",
            AccessMode::Owner => "owner",
        };
        f.write_str(s)
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(AccessMode::None),
            "read" => Ok(AccessMode::Read),
            "write" => Ok(AccessMode::Write),
            "admin" => Ok(AccessMode::Admin),
            "owner" => Ok(AccessMode::Owner),
            other => Err(format!(
                "unknown access mode `{other}` (expected none, read, write, admin or owner)"
            )),
        }
    }
}
