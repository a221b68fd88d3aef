use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Role published as a tag on the instance's service registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Master, Role::Slave];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Slave => "slave",
        }
    }

    /// Returns the role a tag denotes, if it is a role tag.
    pub fn from_tag(tag: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.as_str() == tag)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::from_tag(value).ok_or_else(|| Error::Config(format!("unknown role: {value}")))
    }
}
