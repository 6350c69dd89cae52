use crate::config::Config;
use crate::fs_entries::{descendants, top_level_directories};
use crate::identity::{Identity, IdentityResolver, Resolution};
use crate::policy::PolicyError;
use crate::privilege::OwnershipPrivilege;
use crate::rewrite::{DescriptorStore, Rewrite, rewrite};
use crate::termination::Fatal;
use anyhow::Context;
use camino::Utf8Path;
use log::{Level, error, info, log, warn};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::ErrorKind;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub identities_processed: usize,
    pub identities_skipped: usize,
    pub identities_unresolvable: usize,
    pub nodes_rewritten: usize,
    pub nodes_failed: usize,
    pub files_vanished: usize,
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{} user directories processed, {} skipped, {} without account; \
             {} nodes rewritten, {} failed, {} vanished",
            self.identities_processed,
            self.identities_skipped,
            self.identities_unresolvable,
            self.nodes_rewritten,
            self.nodes_failed,
            self.files_vanished,
        )
    }
}

/// Suppresses user directories until the configured name shows up.
struct ResumeCursor<'a> {
    target: Option<&'a str>,
    reached: bool,
}

impl<'a> ResumeCursor<'a> {
    fn new(target: Option<&'a str>) -> Self {
        Self {
            target,
            reached: target.is_none(),
        }
    }

    fn admit(&mut self, name: &str) -> bool {
        if self.target == Some(name) {
            self.reached = true;
        }
        self.reached
    }
}

pub struct Migration<'a, S> {
    config: &'a Config,
    security: &'a S,
}

impl<'a, S> Migration<'a, S>
where
    S: IdentityResolver + DescriptorStore + OwnershipPrivilege,
{
    pub fn new(config: &'a Config, security: &'a S) -> Self {
        Self { config, security }
    }

    pub fn run(&self) -> Result<Summary, Fatal> {
        self.config.validate()?;
        self.apply_root_policy()?;

        info!("Giving executing user restore privileges");
        self.security
            .acquire_ownership_privilege()
            .map_err(Fatal::PrivilegeElevation)?;

        let summary = self.migrate_user_directories()?;
        info!("{summary}");
        info!("Done");
        Ok(summary)
    }

    fn apply_root_policy(&self) -> Result<(), Fatal> {
        let root = &self.config.path_user_data;
        if self.config.skip_parent_permissions {
            info!("Skipping parent permissions.");
            return Ok(());
        }
        info!("{root}: Setting parent permissions");
        let grants = self
            .config
            .root_policy()
            .build(self.security)
            .map_err(|error| match error {
                PolicyError::Unresolvable(names) => Fatal::UnresolvablePrincipals(names),
                PolicyError::Resolution(cause) => Fatal::Other(cause),
            })?;
        rewrite(self.security, root, &Rewrite::protected(grants))
            .context("Failed to set parent permissions")?;
        Ok(())
    }

    fn migrate_user_directories(&self) -> Result<Summary, Fatal> {
        let mut summary = Summary::default();
        let mut cursor = ResumeCursor::new(self.config.resume_cursor());

        let top_level = top_level_directories(&self.config.path_user_data)?;
        for enumeration_error in &top_level.errors {
            error!("{enumeration_error:?}");
        }

        for user_directory in top_level.directories {
            let Some(name) = user_directory.file_name() else {
                continue;
            };
            info!("{user_directory}");

            if self.config.exceptions.contains(name) {
                info!("Skipping {user_directory}");
                summary.identities_skipped += 1;
                continue;
            }
            if !cursor.admit(name) {
                info!(
                    "Skipping {name} (looking for {} to start from)",
                    cursor.target.unwrap_or_default()
                );
                summary.identities_skipped += 1;
                continue;
            }

            match self.resolve_user(name) {
                Some(identity) => {
                    self.migrate_user_directory(&user_directory, identity, &mut summary);
                    summary.identities_processed += 1;
                }
                None => summary.identities_unresolvable += 1,
            }
        }

        if !cursor.reached {
            warn!(
                "Never encountered {} to start from, no user directory was processed",
                cursor.target.unwrap_or_default()
            );
        }
        Ok(summary)
    }

    fn resolve_user(&self, name: &str) -> Option<Identity> {
        match self.security.resolve(&self.config.user_account(name)) {
            Ok(Resolution::Resolved(identity)) => Some(identity),
            Ok(Resolution::Unresolvable) => {
                warn!(
                    " User {name} not found in domain {}",
                    self.config.domain.trim()
                );
                None
            }
            Err(error) => {
                error!(
                    " Failed to look up user {name} in domain {}: {error:?}",
                    self.config.domain.trim()
                );
                None
            }
        }
    }

    fn migrate_user_directory(
        &self,
        user_directory: &Utf8Path,
        identity: Identity,
        summary: &mut Summary,
    ) {
        let target = Rewrite::inheriting(identity);
        self.rewrite_node(user_directory, &target, summary);

        let descendants = descendants(user_directory);
        for enumeration_error in &descendants.errors {
            error!("{enumeration_error:?}");
        }

        info!("  Processing subdirs");
        for directory in &descendants.directories {
            self.rewrite_node(directory, &target, summary);
        }

        info!("  Processing subfiles");
        for file in &descendants.files {
            if vanished(file) {
                summary.files_vanished += 1;
                continue;
            }
            self.rewrite_node(file, &target, summary);
        }
    }

    fn rewrite_node(&self, node: &Utf8Path, target: &Rewrite, summary: &mut Summary) {
        log!(node_log_level(self.config.debug), "    {node}");
        match rewrite(self.security, node, target) {
            Ok(()) => summary.nodes_rewritten += 1,
            Err(error) => {
                error!("Error processing {node} (path might be too long): {error:?}");
                summary.nodes_failed += 1;
            }
        }
    }
}

fn node_log_level(debug: bool) -> Level {
    if debug { Level::Info } else { Level::Debug }
}

fn vanished(path: &Utf8Path) -> bool {
    matches!(path.symlink_metadata(), Err(error) if error.kind() == ErrorKind::NotFound)
}
