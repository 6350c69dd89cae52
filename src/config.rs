use crate::identity::Principal;
use crate::policy::RootPolicy;
use crate::termination::Fatal;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::from_str;
use std::collections::HashSet;
use std::fs::read_to_string;

pub const DEFAULT_CONFIG_FILE_NAME: &str = "UserDataPermissions.json";

pub fn load(path: &Utf8Path) -> Result<Config, Fatal> {
    if !path.is_file() {
        return Err(Fatal::MissingConfiguration(path.into()));
    }
    read_to_string(path)
        .context("Reading failed")
        .and_then(|content| from_str(&content).context("Parsing failed"))
        .map_err(|cause| Fatal::InvalidConfiguration {
            path: path.into(),
            cause,
        })
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub path_user_data: Utf8PathBuf,
    pub domain: String,
    pub full_access_users: Vec<String>,
    pub default_group: String,
    pub owners_group: String,
    #[serde(default)]
    pub skip_parent_permissions: bool,
    #[serde(default)]
    pub exceptions: HashSet<String>,
    #[serde(default)]
    pub start_from: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    pub fn validate(&self) -> Result<(), Fatal> {
        if !self.path_user_data.is_dir() {
            return Err(Fatal::MissingRoot(self.path_user_data.clone()));
        }
        if self.domain.trim().is_empty() {
            return Err(Fatal::EmptyDomain);
        }
        Ok(())
    }

    pub fn root_policy(&self) -> RootPolicy {
        RootPolicy {
            full_access: self
                .full_access_users
                .iter()
                .map(|name| Principal::Name(name.clone()))
                .collect(),
            default_group: Principal::Name(self.default_group.clone()),
            owners_group: Principal::Name(self.owners_group.clone()),
        }
    }

    pub fn resume_cursor(&self) -> Option<&str> {
        self.start_from.as_deref().filter(|name| !name.is_empty())
    }

    pub fn user_account(&self, name: &str) -> Principal {
        Principal::account(self.domain.trim(), name)
    }
}
