/// Grants the running process the right to set the owner of objects it does not own.
pub trait OwnershipPrivilege {
    /// Idempotent; called once before any ownership change.
    fn acquire_ownership_privilege(&self) -> anyhow::Result<()>;
}
