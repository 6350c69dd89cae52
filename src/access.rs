use crate::identity::Identity;
use bitflags::bitflags;

bitflags! {
    /// File system rights, using the NTFS access mask bit values.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Rights: u32 {
        const LIST_DIRECTORY = 0x0000_0001;
        const CREATE_FILES = 0x0000_0002;
        const CREATE_DIRECTORIES = 0x0000_0004;
        const READ_EXTENDED_ATTRIBUTES = 0x0000_0008;
        const WRITE_EXTENDED_ATTRIBUTES = 0x0000_0010;
        const TRAVERSE = 0x0000_0020;
        const DELETE_SUBDIRECTORIES_AND_FILES = 0x0000_0040;
        const READ_ATTRIBUTES = 0x0000_0080;
        const WRITE_ATTRIBUTES = 0x0000_0100;
        const DELETE = 0x0001_0000;
        const READ_PERMISSIONS = 0x0002_0000;
        const CHANGE_PERMISSIONS = 0x0004_0000;
        const TAKE_OWNERSHIP = 0x0008_0000;
        const SYNCHRONIZE = 0x0010_0000;
        const FULL_CONTROL = 0x001F_01FF;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inheritance {
    None,
    Subfolders,
    Files,
    SubfoldersAndFiles,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    /// The grant applies to the node it is attached to (and its heirs, if inheritable).
    Direct,
    /// The grant only applies to heirs, never to the node itself.
    InheritOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    Allow,
    Deny,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grant {
    pub trustee: Identity,
    pub rights: Rights,
    pub inheritance: Inheritance,
    pub propagation: Propagation,
    pub access_type: AccessType,
}

impl Grant {
    pub fn allow(trustee: Identity, rights: Rights) -> Self {
        Self {
            trustee,
            rights,
            inheritance: Inheritance::None,
            propagation: Propagation::Direct,
            access_type: AccessType::Allow,
        }
    }

    pub fn inherited_by(self, inheritance: Inheritance) -> Self {
        Self {
            inheritance,
            ..self
        }
    }

    pub fn inherit_only(self) -> Self {
        Self {
            propagation: Propagation::InheritOnly,
            ..self
        }
    }

    fn merges_with(&self, other: &Grant) -> bool {
        self.trustee == other.trustee
            && self.access_type == other.access_type
            && self.inheritance == other.inheritance
            && self.propagation == other.propagation
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub grant: Grant,
    /// Set for entries the node received from an ancestor.
    pub inherited: bool,
}

/// Access control state of a single file system node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessDescriptor {
    pub owner: Option<Identity>,
    pub protected: bool,
    pub entries: Vec<Entry>,
}

impl AccessDescriptor {
    pub fn explicit_grants(&self) -> impl Iterator<Item = &Grant> {
        self.entries
            .iter()
            .filter(|entry| !entry.inherited)
            .map(|entry| &entry.grant)
    }

    pub fn inherited_grants(&self) -> impl Iterator<Item = &Grant> {
        self.entries
            .iter()
            .filter(|entry| entry.inherited)
            .map(|entry| &entry.grant)
    }

    pub fn remove_explicit_grants(&mut self) {
        self.entries.retain(|entry| entry.inherited);
    }

    /// Protecting a node discards its inherited entries; they are not converted into explicit ones.
    pub fn set_protected(&mut self, protected: bool) {
        self.protected = protected;
        if protected {
            self.entries.retain(|entry| !entry.inherited);
        }
    }

    pub fn add_grant(&mut self, grant: Grant) {
        match self
            .entries
            .iter_mut()
            .find(|entry| !entry.inherited && entry.grant.merges_with(&grant))
        {
            Some(entry) => entry.grant.rights |= grant.rights,
            None => self.entries.push(Entry {
                grant,
                inherited: false,
            }),
        }
    }
}
