#![cfg(windows)]
use crate::access::{
    AccessDescriptor, AccessType, Entry, Grant, Inheritance, Propagation, Rights,
};
use crate::identity::{Identity, IdentityResolver, Principal, Resolution};
use crate::privilege::OwnershipPrivilege;
use crate::rewrite::DescriptorStore;
use anyhow::{Context, bail};
use camino::Utf8Path;
use std::ffi::c_void;
use std::ops::{Deref, DerefMut};
use std::ptr::null_mut;
use windows::Win32::Foundation::{
    CloseHandle, ERROR_INSUFFICIENT_BUFFER, ERROR_NONE_MAPPED, ERROR_NOT_ALL_ASSIGNED,
    GetLastError, HANDLE, HLOCAL, LUID, LocalFree,
};
use windows::Win32::Security::Authorization::{
    ConvertSidToStringSidW, ConvertStringSidToSidW, DENY_ACCESS, EXPLICIT_ACCESS_W, GRANT_ACCESS,
    GetNamedSecurityInfoW, NO_MULTIPLE_TRUSTEE, SE_FILE_OBJECT, SetEntriesInAclW,
    SetNamedSecurityInfoW, TRUSTEE_IS_SID, TRUSTEE_IS_UNKNOWN, TRUSTEE_W,
};
use windows::Win32::Security::{
    ACCESS_ALLOWED_ACE, ACE_FLAGS, ACE_HEADER, ACL, ACL_REVISION, AdjustTokenPrivileges,
    DACL_SECURITY_INFORMATION, GetAce, GetSecurityDescriptorControl, InitializeAcl,
    LUID_AND_ATTRIBUTES, LookupAccountNameW, LookupPrivilegeValueW, OBJECT_SECURITY_INFORMATION,
    OWNER_SECURITY_INFORMATION, PROTECTED_DACL_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR, PSID,
    SE_PRIVILEGE_ENABLED, SID_NAME_USE, TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
    UNPROTECTED_DACL_SECURITY_INFORMATION,
};
use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};
use windows::core::{HSTRING, PCWSTR, PWSTR};

const ACCESS_ALLOWED_ACE_TYPE: u8 = 0;
const ACCESS_DENIED_ACE_TYPE: u8 = 1;
const OBJECT_INHERIT_ACE: u8 = 0x01;
const CONTAINER_INHERIT_ACE: u8 = 0x02;
const INHERIT_ONLY_ACE: u8 = 0x08;
const INHERITED_ACE: u8 = 0x10;
const SE_DACL_PROTECTED: u16 = 0x1000;

// Restore allows setting arbitrary owners, take ownership covers objects we cannot even read.
const OWNERSHIP_PRIVILEGES: [&str; 2] = ["SeRestorePrivilege", "SeTakeOwnershipPrivilege"];

#[repr(transparent)]
struct OwnedLocalAlloc<T>(T);

impl<T> Default for OwnedLocalAlloc<T> {
    fn default() -> Self {
        unsafe { std::mem::zeroed() }
    }
}

impl<T> Drop for OwnedLocalAlloc<T> {
    fn drop(&mut self) {
        unsafe {
            let ptr: HLOCAL = std::mem::transmute_copy(self);
            if !ptr.0.is_null() {
                let _ = LocalFree(Some(ptr));
            }
        }
    }
}

impl<T> Deref for OwnedLocalAlloc<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for OwnedLocalAlloc<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Access control of NTFS objects through the Win32 security API.
pub struct WindowsSecurity;

impl IdentityResolver for WindowsSecurity {
    fn resolve(&self, principal: &Principal) -> anyhow::Result<Resolution> {
        let account = principal.to_string();
        Ok(match lookup_account_sid(&account)? {
            Some(mut sid) => Resolution::Resolved(Identity::new(sid_to_string(PSID(
                sid.as_mut_ptr().cast(),
            ))?)),
            None => Resolution::Unresolvable,
        })
    }
}

impl DescriptorStore for WindowsSecurity {
    fn read_descriptor(&self, node: &Utf8Path) -> anyhow::Result<AccessDescriptor> {
        let info = SecurityInfo::read(
            node,
            OWNER_SECURITY_INFORMATION | DACL_SECURITY_INFORMATION,
        )?;
        let mut control = 0u16;
        let mut revision = 0u32;
        unsafe { GetSecurityDescriptorControl(*info.descriptor, &mut control, &mut revision) }
            .context(format!("Failed to read security descriptor control of {node}"))?;
        Ok(AccessDescriptor {
            owner: info.owner()?,
            protected: control & SE_DACL_PROTECTED != 0,
            entries: info.entries()?,
        })
    }

    fn write_descriptor(
        &self,
        node: &Utf8Path,
        descriptor: &AccessDescriptor,
        owner_changed: bool,
    ) -> anyhow::Result<()> {
        let grants: Vec<&Grant> = descriptor.explicit_grants().collect();
        let trustees = grants
            .iter()
            .map(|grant| string_to_sid(&grant.trustee))
            .collect::<anyhow::Result<Vec<OwnedLocalAlloc<PSID>>>>()?;
        let explicit_accesses: Vec<EXPLICIT_ACCESS_W> = grants
            .iter()
            .zip(&trustees)
            .map(|(grant, trustee)| EXPLICIT_ACCESS_W {
                grfAccessPermissions: grant.rights.bits(),
                grfAccessMode: match grant.access_type {
                    AccessType::Allow => GRANT_ACCESS,
                    AccessType::Deny => DENY_ACCESS,
                },
                grfInheritance: ACE_FLAGS(u32::from(ace_flags(grant))),
                Trustee: TRUSTEE_W {
                    pMultipleTrustee: null_mut(),
                    MultipleTrusteeOperation: NO_MULTIPLE_TRUSTEE,
                    TrusteeForm: TRUSTEE_IS_SID,
                    TrusteeType: TRUSTEE_IS_UNKNOWN,
                    ptstrName: PWSTR(trustee.0.0.cast()),
                },
            })
            .collect();

        // SetEntriesInAclW yields a NULL DACL (everyone full access) for zero entries.
        let mut empty_acl = ACL::default();
        let mut built_acl = OwnedLocalAlloc::<*mut ACL>::default();
        let acl: *const ACL = if explicit_accesses.is_empty() {
            unsafe { InitializeAcl(&mut empty_acl, size_of::<ACL>() as u32, ACL_REVISION) }
                .context(format!("Failed to initialize empty access control list for {node}"))?;
            &empty_acl
        } else {
            unsafe { SetEntriesInAclW(Some(&explicit_accesses), None, &mut *built_acl) }
                .ok()
                .context(format!("Failed to build access control list for {node}"))?;
            if built_acl.is_null() {
                bail!("Building access control list for {node} yielded no list");
            }
            *built_acl
        };

        let mut information = DACL_SECURITY_INFORMATION
            | if descriptor.protected {
                PROTECTED_DACL_SECURITY_INFORMATION
            } else {
                UNPROTECTED_DACL_SECURITY_INFORMATION
            };
        let owner = match &descriptor.owner {
            Some(owner) if owner_changed => {
                information |= OWNER_SECURITY_INFORMATION;
                Some(string_to_sid(owner)?)
            }
            _ => None,
        };

        unsafe {
            SetNamedSecurityInfoW(
                &HSTRING::from(make_long_path(node)),
                SE_FILE_OBJECT,
                information,
                owner.as_ref().map(|sid| **sid),
                None,
                Some(acl),
                None,
            )
        }
        .ok()
        .context(format!("Failed to set security information of {node}"))
    }
}

impl OwnershipPrivilege for WindowsSecurity {
    fn acquire_ownership_privilege(&self) -> anyhow::Result<()> {
        let mut token = HANDLE::default();
        unsafe {
            OpenProcessToken(
                GetCurrentProcess(),
                TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
                &mut token,
            )
        }
        .context("Could not retrieve process token")?;
        let result = OWNERSHIP_PRIVILEGES
            .iter()
            .try_for_each(|privilege| enable_privilege(token, privilege));
        unsafe {
            let _ = CloseHandle(token);
        }
        result
    }
}

struct SecurityInfo {
    descriptor: OwnedLocalAlloc<PSECURITY_DESCRIPTOR>,
    owner: PSID,
    dacl: *mut ACL,
}

impl SecurityInfo {
    fn read(node: &Utf8Path, information: OBJECT_SECURITY_INFORMATION) -> anyhow::Result<Self> {
        let mut info = Self {
            descriptor: OwnedLocalAlloc::default(),
            owner: PSID(null_mut()),
            dacl: null_mut(),
        };
        unsafe {
            GetNamedSecurityInfoW(
                &HSTRING::from(make_long_path(node)),
                SE_FILE_OBJECT,
                information,
                Some(&mut info.owner as *mut PSID),
                None,
                Some(&mut info.dacl as *mut *mut ACL),
                None,
                &mut *info.descriptor,
            )
        }
        .ok()
        .context(format!("Failed to get security information of {node}"))?;
        Ok(info)
    }

    fn owner(&self) -> anyhow::Result<Option<Identity>> {
        if self.owner.0.is_null() {
            return Ok(None);
        }
        Ok(Some(Identity::new(sid_to_string(self.owner)?)))
    }

    fn entries(&self) -> anyhow::Result<Vec<Entry>> {
        if self.dacl.is_null() {
            return Ok(vec![]);
        }
        let mut entries = vec![];
        for index in 0..u32::from(unsafe { (*self.dacl).AceCount }) {
            let mut ace: *mut c_void = null_mut();
            unsafe { GetAce(self.dacl, index, &mut ace) }
                .context(format!("Failed to read access control entry {index}"))?;
            let header = unsafe { &*(ace as *const ACE_HEADER) };
            let access_type = match header.AceType {
                ACCESS_ALLOWED_ACE_TYPE => AccessType::Allow,
                ACCESS_DENIED_ACE_TYPE => AccessType::Deny,
                _ => continue,
            };
            // Allowed and denied entries share their layout.
            let ace = unsafe { &*(ace as *const ACCESS_ALLOWED_ACE) };
            let trustee = PSID(&ace.SidStart as *const u32 as *mut c_void);
            entries.push(Entry {
                grant: Grant {
                    trustee: Identity::new(sid_to_string(trustee)?),
                    rights: Rights::from_bits_retain(ace.Mask),
                    inheritance: inheritance(header.AceFlags),
                    propagation: if header.AceFlags & INHERIT_ONLY_ACE != 0 {
                        Propagation::InheritOnly
                    } else {
                        Propagation::Direct
                    },
                    access_type,
                },
                inherited: header.AceFlags & INHERITED_ACE != 0,
            });
        }
        Ok(entries)
    }
}

fn inheritance(flags: u8) -> Inheritance {
    match (
        flags & CONTAINER_INHERIT_ACE != 0,
        flags & OBJECT_INHERIT_ACE != 0,
    ) {
        (true, true) => Inheritance::SubfoldersAndFiles,
        (true, false) => Inheritance::Subfolders,
        (false, true) => Inheritance::Files,
        (false, false) => Inheritance::None,
    }
}

fn ace_flags(grant: &Grant) -> u8 {
    let inheritance = match grant.inheritance {
        Inheritance::None => 0,
        Inheritance::Subfolders => CONTAINER_INHERIT_ACE,
        Inheritance::Files => OBJECT_INHERIT_ACE,
        Inheritance::SubfoldersAndFiles => CONTAINER_INHERIT_ACE | OBJECT_INHERIT_ACE,
    };
    match grant.propagation {
        Propagation::Direct => inheritance,
        Propagation::InheritOnly => inheritance | INHERIT_ONLY_ACE,
    }
}

fn lookup_account_sid(account: &str) -> anyhow::Result<Option<Vec<u8>>> {
    let account_name = HSTRING::from(account);
    let mut sid_size = 0u32;
    let mut domain_size = 0u32;
    let mut sid_name_use = SID_NAME_USE::default();
    if let Err(error) = unsafe {
        LookupAccountNameW(
            PCWSTR::null(),
            &account_name,
            None,
            &mut sid_size,
            None,
            &mut domain_size,
            &mut sid_name_use,
        )
    } {
        if error.code() == ERROR_NONE_MAPPED.to_hresult() {
            return Ok(None);
        }
        if error.code() != ERROR_INSUFFICIENT_BUFFER.to_hresult() {
            return Err(error).context(format!("Failed to look up account {account}"));
        }
    }

    let mut sid = vec![0u8; sid_size as usize];
    let mut domain = vec![0u16; domain_size as usize];
    unsafe {
        LookupAccountNameW(
            PCWSTR::null(),
            &account_name,
            Some(PSID(sid.as_mut_ptr().cast())),
            &mut sid_size,
            Some(PWSTR(domain.as_mut_ptr())),
            &mut domain_size,
            &mut sid_name_use,
        )
    }
    .context(format!("Failed to look up account {account}"))?;
    Ok(Some(sid))
}

fn sid_to_string(sid: PSID) -> anyhow::Result<String> {
    let mut string_sid = OwnedLocalAlloc::<PWSTR>::default();
    unsafe { ConvertSidToStringSidW(sid, &mut *string_sid) }
        .context("Failed to convert SID to string")?;
    Ok(unsafe { (*string_sid).to_string() }?)
}

fn string_to_sid(identity: &Identity) -> anyhow::Result<OwnedLocalAlloc<PSID>> {
    let mut sid = OwnedLocalAlloc::<PSID>::default();
    unsafe { ConvertStringSidToSidW(&HSTRING::from(identity.as_str()), &mut *sid) }
        .context(format!("Failed to convert {identity} to SID"))?;
    Ok(sid)
}

fn enable_privilege(token: HANDLE, privilege: &str) -> anyhow::Result<()> {
    let mut luid = LUID::default();
    unsafe { LookupPrivilegeValueW(PCWSTR::null(), &HSTRING::from(privilege), &mut luid) }
        .context(format!("Could not find privilege {privilege}"))?;
    let privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    unsafe {
        AdjustTokenPrivileges(
            token,
            false,
            Some(&privileges as *const TOKEN_PRIVILEGES),
            0,
            None,
            None,
        )
    }
    .context(format!("Could not assign privilege {privilege}"))?;
    // AdjustTokenPrivileges reports success even if the token does not hold the privilege.
    if unsafe { GetLastError() } == ERROR_NOT_ALL_ASSIGNED {
        bail!("Executing user does not hold privilege {privilege}")
    }
    Ok(())
}

fn make_long_path(path: &Utf8Path) -> String {
    if path.as_str().starts_with("\\\\") {
        return path.to_string();
    }
    format!("\\\\?\\{}", path)
}
