use crate::access::{AccessDescriptor, Grant};
use crate::identity::Identity;
use anyhow::Context;
use camino::Utf8Path;

/// Persistent access control metadata of file system nodes.
pub trait DescriptorStore {
    fn read_descriptor(&self, node: &Utf8Path) -> anyhow::Result<AccessDescriptor>;
    /// `owner_changed` tells whether `descriptor.owner` differs from what was read.
    fn write_descriptor(
        &self,
        node: &Utf8Path,
        descriptor: &AccessDescriptor,
        owner_changed: bool,
    ) -> anyhow::Result<()>;
}

/// Target state of a node after rewriting.
#[derive(Clone, Debug, Default)]
pub struct Rewrite {
    pub owner: Option<Identity>,
    pub protect: bool,
    pub grants: Vec<Grant>,
}

impl Rewrite {
    /// Owned by `owner`, no explicit grants, inheriting from the parent.
    pub fn inheriting(owner: Identity) -> Self {
        Self {
            owner: Some(owner),
            protect: false,
            grants: vec![],
        }
    }

    /// Only `grants` apply, nothing is inherited.
    pub fn protected(grants: Vec<Grant>) -> Self {
        Self {
            owner: None,
            protect: true,
            grants,
        }
    }

    /// Returns whether the owner changed.
    pub fn apply_to(&self, descriptor: &mut AccessDescriptor) -> bool {
        descriptor.remove_explicit_grants();
        descriptor.set_protected(self.protect);
        for grant in &self.grants {
            descriptor.add_grant(grant.clone());
        }
        match &self.owner {
            Some(owner) if descriptor.owner.as_ref() != Some(owner) => {
                descriptor.owner = Some(owner.clone());
                true
            }
            _ => false,
        }
    }
}

pub fn rewrite(
    store: &impl DescriptorStore,
    node: &Utf8Path,
    target: &Rewrite,
) -> anyhow::Result<()> {
    let mut descriptor = store
        .read_descriptor(node)
        .context(format!("Failed to read security descriptor of {node}"))?;
    let owner_changed = target.apply_to(&mut descriptor);
    store
        .write_descriptor(node, &descriptor, owner_changed)
        .context(format!("Failed to write security descriptor of {node}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Entry, Inheritance, Rights};
    use std::cell::RefCell;

    struct SingleNode {
        descriptor: RefCell<AccessDescriptor>,
        owner_writes: RefCell<Vec<bool>>,
    }

    impl SingleNode {
        fn new(descriptor: AccessDescriptor) -> Self {
            Self {
                descriptor: RefCell::new(descriptor),
                owner_writes: RefCell::new(vec![]),
            }
        }
    }

    impl DescriptorStore for SingleNode {
        fn read_descriptor(&self, _node: &Utf8Path) -> anyhow::Result<AccessDescriptor> {
            Ok(self.descriptor.borrow().clone())
        }

        fn write_descriptor(
            &self,
            _node: &Utf8Path,
            descriptor: &AccessDescriptor,
            owner_changed: bool,
        ) -> anyhow::Result<()> {
            *self.descriptor.borrow_mut() = descriptor.clone();
            self.owner_writes.borrow_mut().push(owner_changed);
            Ok(())
        }
    }

    fn previously_configured() -> AccessDescriptor {
        AccessDescriptor {
            owner: Some(Identity::new("S-1-5-32-544")),
            protected: true,
            entries: vec![
                Entry {
                    grant: Grant::allow(Identity::new("S-1-5-21-7"), Rights::FULL_CONTROL),
                    inherited: false,
                },
                Entry {
                    grant: Grant::allow(Identity::new("S-1-1-0"), Rights::READ_ATTRIBUTES),
                    inherited: false,
                },
            ],
        }
    }

    #[test]
    fn test_rewrite_inheriting() -> anyhow::Result<()> {
        let store = SingleNode::new(previously_configured());
        let target = Rewrite::inheriting(Identity::new("S-1-5-21-42"));
        rewrite(&store, Utf8Path::new("root/alice"), &target)?;
        rewrite(&store, Utf8Path::new("root/alice"), &target)?;
        assert_eq!(*store.owner_writes.borrow(), vec![true, false]);
        let descriptor = store.descriptor.into_inner();
        assert_eq!(descriptor.owner, Some(Identity::new("S-1-5-21-42")));
        assert!(!descriptor.protected);
        assert!(descriptor.entries.is_empty());
        Ok(())
    }

    #[test]
    fn test_rewrite_protected_is_idempotent() -> anyhow::Result<()> {
        let store = SingleNode::new(previously_configured());
        let target = Rewrite::protected(vec![
            Grant::allow(Identity::new("S-1-5-32-544"), Rights::FULL_CONTROL)
                .inherited_by(Inheritance::SubfoldersAndFiles),
        ]);
        rewrite(&store, Utf8Path::new("root"), &target)?;
        let once = store.descriptor.borrow().clone();
        rewrite(&store, Utf8Path::new("root"), &target)?;
        assert_eq!(*store.descriptor.borrow(), once);
        assert_eq!(*store.owner_writes.borrow(), vec![false, false]);
        assert!(once.protected);
        assert_eq!(once.owner, Some(Identity::new("S-1-5-32-544")));
        assert_eq!(once.explicit_grants().count(), 1);
        Ok(())
    }
}
