use serde::{Deserialize, Serialize};

/// The three human parties plus the engine itself.
///
/// `System` is reserved for transitions driven by the reconciliation engine
/// (marking a booking paid, completing a queued refund); it is never
/// accepted from an external caller.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Organization,
    Admin,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Customer => "customer",
            Role::Organization => "organization",
            Role::Admin => "admin",
            Role::System => "system",
        };
        f.write_str(name)
    }
}

/// An authenticated caller, as handed over by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn customer(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Customer,
        }
    }

    pub fn organization(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Organization,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Admin,
        }
    }

    pub fn system() -> Self {
        Self {
            id: "system".to_string(),
            role: Role::System,
        }
    }
}
