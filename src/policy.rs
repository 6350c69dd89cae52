use crate::access::{Grant, Inheritance, Rights};
use crate::identity::{Identity, IdentityResolver, Principal, Resolution};
use anyhow::Context;
use thiserror::Error;

/// Principals making up the access policy of the user data root.
#[derive(Clone, Debug, PartialEq)]
pub struct RootPolicy {
    pub full_access: Vec<Principal>,
    pub default_group: Principal,
    pub owners_group: Principal,
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Did not find the following users or groups: {}", .0.join(", "))]
    Unresolvable(Vec<String>),
    #[error(transparent)]
    Resolution(#[from] anyhow::Error),
}

/// Rights of the default group on the root: enough to traverse into a user directory,
/// not enough to read anybody else's.
pub fn traversal_rights() -> Rights {
    Rights::LIST_DIRECTORY
        | Rights::CREATE_DIRECTORIES
        | Rights::READ_ATTRIBUTES
        | Rights::READ_EXTENDED_ATTRIBUTES
        | Rights::READ_PERMISSIONS
}

impl RootPolicy {
    pub fn build(&self, resolver: &impl IdentityResolver) -> Result<Vec<Grant>, PolicyError> {
        let mut unresolvable = vec![];
        let mut lookup = |principal: &Principal| -> anyhow::Result<Option<Identity>> {
            match resolver
                .resolve(principal)
                .context(format!("Failed to resolve {principal}"))?
            {
                Resolution::Resolved(identity) => Ok(Some(identity)),
                Resolution::Unresolvable => {
                    unresolvable.push(principal.to_string());
                    Ok(None)
                }
            }
        };

        let mut grants = vec![];
        for principal in &self.full_access {
            if let Some(identity) = lookup(principal)? {
                grants.push(
                    Grant::allow(identity, Rights::FULL_CONTROL)
                        .inherited_by(Inheritance::SubfoldersAndFiles),
                );
            }
        }
        if let Some(identity) = lookup(&self.default_group)? {
            grants.push(Grant::allow(identity, traversal_rights()));
        }
        if let Some(identity) = lookup(&self.owners_group)? {
            grants.push(
                Grant::allow(identity, Rights::FULL_CONTROL)
                    .inherited_by(Inheritance::SubfoldersAndFiles)
                    .inherit_only(),
            );
        }

        if !unresolvable.is_empty() {
            return Err(PolicyError::Unresolvable(unresolvable));
        }
        Ok(grants)
    }
}
