pub mod access;
pub mod config;
pub mod fs_entries;
pub mod identity;
pub mod migration;
pub mod policy;
pub mod privilege;
pub mod rewrite;
pub mod termination;
pub mod windows_security;
