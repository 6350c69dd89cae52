use std::fmt::{Display, Formatter, Result as FmtResult};

/// Reference to a security principal as it appears in configuration or on disk.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Principal {
    /// Well-known account or group name, resolved as-is (eg. `BUILTIN\Administrators`).
    Name(String),
    /// Account name qualified by the realm it lives in.
    Account { realm: String, name: String },
}

impl Principal {
    pub fn account(realm: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Account {
            realm: realm.into(),
            name: name.into(),
        }
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Account { realm, name } => write!(f, "{realm}\\{name}"),
        }
    }
}

/// Canonical, comparable identity (a SID in string form on Windows).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(canonical: impl Into<String>) -> Self {
        Self(canonical.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Identity),
    Unresolvable,
}

pub trait IdentityResolver {
    /// Translates a principal into its canonical identity.
    ///
    /// A principal unknown to the identity service is `Ok(Resolution::Unresolvable)`;
    /// `Err` is reserved for failures of the service itself.
    fn resolve(&self, principal: &Principal) -> anyhow::Result<Resolution>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_fmt() {
        assert_eq!(
            format!("{}", Principal::account("CORP", "alice")),
            "CORP\\alice"
        );
        assert_eq!(
            format!("{}", Principal::Name("BUILTIN\\Users".into())),
            "BUILTIN\\Users"
        );
    }
}
