// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

/// The five access levels which can be held on a container or project. Greater access levels are
/// assumed to also contain all lower ones.
///
/// Guest < Reporter < Developer < Maintainer < Owner
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessLevel {
    /// Permission to view a project.
    Guest,

    /// Permission to read code, issues and other project data.
    Reporter,

    /// Permission to push changes to a project.
    Developer,

    /// Permission to manage project settings and members.
    Maintainer,

    /// Full control, including deletion and transfer.
    Owner,
}

impl AccessLevel {
    /// All access levels in ascending order.
    pub const ALL: [AccessLevel; 5] = [
        AccessLevel::Guest,
        AccessLevel::Reporter,
        AccessLevel::Developer,
        AccessLevel::Maintainer,
        AccessLevel::Owner,
    ];

    /// Numeric representation as it is commonly persisted in relational stores.
    pub fn as_u8(&self) -> u8 {
        match self {
            AccessLevel::Guest => 10,
            AccessLevel::Reporter => 20,
            AccessLevel::Developer => 30,
            AccessLevel::Maintainer => 40,
            AccessLevel::Owner => 50,
        }
    }

    /// Restrict this level to never exceed `cap`.
    ///
    /// Used along a single share path, where access can only shrink.
    pub fn capped_by(self, cap: AccessLevel) -> AccessLevel {
        self.min(cap)
    }

    /// Combine two levels derived from independent paths, keeping the greater one.
    pub fn combine(self, other: AccessLevel) -> AccessLevel {
        self.max(other)
    }
}

impl TryFrom<u8> for AccessLevel {
    type Error = AccessLevelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(AccessLevel::Guest),
            20 => Ok(AccessLevel::Reporter),
            30 => Ok(AccessLevel::Developer),
            40 => Ok(AccessLevel::Maintainer),
            50 => Ok(AccessLevel::Owner),
            _ => Err(AccessLevelError::UnknownValue(value)),
        }
    }
}

impl Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccessLevel::Guest => "guest",
            AccessLevel::Reporter => "reporter",
            AccessLevel::Developer => "developer",
            AccessLevel::Maintainer => "maintainer",
            AccessLevel::Owner => "owner",
        };

        write!(f, "{}", s)
    }
}

impl FromStr for AccessLevel {
    type Err = AccessLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(AccessLevel::Guest),
            "reporter" => Ok(AccessLevel::Reporter),
            "developer" => Ok(AccessLevel::Developer),
            "maintainer" => Ok(AccessLevel::Maintainer),
            "owner" => Ok(AccessLevel::Owner),
            _ => Err(AccessLevelError::UnknownName(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessLevelError {
    #[error("unknown access level value {0}")]
    UnknownValue(u8),

    #[error("unknown access level name \"{0}\"")]
    UnknownName(String),
}
