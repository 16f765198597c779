//! The authenticated actor behind a request
use crate::error::MarketError;
use crate::types::UserId;
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    #[n(0)]
    Farmer,
    #[n(1)]
    Buyer,
    #[n(2)]
    Transporter,
    #[n(3)]
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Farmer, Role::Buyer, Role::Transporter, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Buyer => "buyer",
            Role::Transporter => "transporter",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MarketError;

    // role names arrive from clients in any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "farmer" => Ok(Role::Farmer),
            "buyer" => Ok(Role::Buyer),
            "transporter" => Ok(Role::Transporter),
            "admin" => Ok(Role::Admin),
            _ => Err(MarketError::validation(format!("unknown role {s:?}"))),
        }
    }
}

/// Identity resolved from the bearer token before any handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
    pub fn farmer(user_id: UserId) -> Self {
        Self::new(user_id, Role::Farmer)
    }
    pub fn buyer(user_id: UserId) -> Self {
        Self::new(user_id, Role::Buyer)
    }
    pub fn transporter(user_id: UserId) -> Self {
        Self::new(user_id, Role::Transporter)
    }
    pub fn admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::Admin)
    }
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Handlers receive the identity as an option; a missing one is a 401.
    pub fn require(identity: Option<&Identity>) -> Result<&Identity, MarketError> {
        identity.ok_or(MarketError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Farmer".parse::<Role>().unwrap(), Role::Farmer);
        assert_eq!(" ADMIN ".parse::<Role>().unwrap(), Role::Admin);
        assert!("admn".parse::<Role>().is_err());
    }

    #[test]
    fn role_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn missing_identity_is_unauthorized() {
        let err = Identity::require(None).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
