use camino::Utf8PathBuf;
use thiserror::Error;

/// Conditions that end a run before any user directory is touched.
#[derive(Debug, Error)]
pub enum Fatal {
    #[error("Configuration file {0} does not exist")]
    MissingConfiguration(Utf8PathBuf),
    #[error("Configuration file {path} is unusable")]
    InvalidConfiguration {
        path: Utf8PathBuf,
        #[source]
        cause: anyhow::Error,
    },
    #[error("User data directory {0} does not exist")]
    MissingRoot(Utf8PathBuf),
    #[error("No domain configured, please set `domain` in the configuration file")]
    EmptyDomain,
    #[error(
        "Did not find users or groups of the parent permissions. Maybe your OS uses a different language, please adjust user or group names: {}",
        .0.join(", ")
    )]
    UnresolvablePrincipals(Vec<String>),
    #[error("Failed to acquire the privilege to change ownership")]
    PrivilegeElevation(#[source] anyhow::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Fatal {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingConfiguration(_) | Self::InvalidConfiguration { .. } => -30,
            Self::MissingRoot(_) => -10,
            Self::UnresolvablePrincipals(_) => -20,
            Self::EmptyDomain => -40,
            Self::PrivilegeElevation(_) => -50,
            Self::Other(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            Fatal::MissingConfiguration("c.json".into()).exit_code(),
            Fatal::MissingRoot("D:\\UserData".into()).exit_code(),
            Fatal::UnresolvablePrincipals(vec!["Users".into()]).exit_code(),
            Fatal::EmptyDomain.exit_code(),
            Fatal::PrivilegeElevation(anyhow::anyhow!("denied")).exit_code(),
        ];
        for (index, code) in codes.iter().enumerate() {
            assert!(*code < 0);
            assert!(!codes[index + 1..].contains(code));
        }
    }
}
