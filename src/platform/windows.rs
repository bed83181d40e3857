//! Windows variant: local accounts through the NetAPI, privileges
//! through the LSA policy database, and directory ACLs through the
//! authorization API.

use std::collections::BTreeSet;
use std::ffi::{c_void, OsStr};
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use windows_sys::Win32::Foundation::{
    GetLastError, LocalFree, ERROR_INSUFFICIENT_BUFFER, ERROR_NONE_MAPPED, HLOCAL,
};
use windows_sys::Win32::NetworkManagement::NetManagement::{
    NERR_Success, NetUserAdd, UF_DONT_EXPIRE_PASSWD, UF_SCRIPT, USER_INFO_1, USER_PRIV_USER,
};
use windows_sys::Win32::Security::Authentication::Identity::{
    LsaAddAccountRights, LsaClose, LsaEnumerateAccountRights, LsaFreeMemory,
    LsaNtStatusToWinError, LsaOpenPolicy, LSA_HANDLE, LSA_OBJECT_ATTRIBUTES,
    LSA_UNICODE_STRING, POLICY_CREATE_ACCOUNT, POLICY_LOOKUP_NAMES,
};
use windows_sys::Win32::Security::Authorization::{
    GetNamedSecurityInfoW, SetEntriesInAclW, SetNamedSecurityInfoW, EXPLICIT_ACCESS_W,
    SET_ACCESS, SE_FILE_OBJECT, TRUSTEE_IS_SID, TRUSTEE_IS_USER, TRUSTEE_W,
};
use windows_sys::Win32::Security::{
    LookupAccountNameW, ACL, CONTAINER_INHERIT_ACE, DACL_SECURITY_INFORMATION,
    OBJECT_INHERIT_ACE, SID_NAME_USE,
};
use windows_sys::Win32::Storage::FileSystem::{
    FILE_ALL_ACCESS, FILE_GENERIC_EXECUTE, FILE_GENERIC_READ, FILE_GENERIC_WRITE,
};
use windows_sys::Win32::System::WindowsProgramming::GetUserNameW;

use super::{Capability, PlatformCapability};
use crate::acl::{AccessRights, AclStore};
use crate::err::*;
use crate::identity::{Credential, Identity, IdentityStore};
use crate::privilege::{PrivilegeKind, PrivilegePolicy};

/// Returned by LsaEnumerateAccountRights for an account holding no rights.
const STATUS_OBJECT_NAME_NOT_FOUND: i32 = 0xC000_0034_u32 as i32;

fn to_wide<S: AsRef<OsStr>>(s: S) -> Vec<u16> {
    let mut v: Vec<u16> = s.as_ref().encode_wide().collect();
    v.push(0);
    v
}

fn last_error() -> u32 {
    unsafe { GetLastError() }
}

/// SID bytes for `name`, or None if no such account.
fn lookup_sid(name: &str) -> Result<Option<Vec<u8>>, ProvisionError> {
    let name_w = to_wide(name);
    let mut sid = vec![0u8; 68];
    let mut sid_len = sid.len() as u32;
    let mut domain: Vec<u16> = Vec::new();
    let mut domain_len: u32 = 0;
    let mut use_type: SID_NAME_USE = 0;
    loop {
        let ok = unsafe {
            LookupAccountNameW(ptr::null(), name_w.as_ptr(),
                               sid.as_mut_ptr() as *mut c_void, &mut sid_len,
                               domain.as_mut_ptr(), &mut domain_len,
                               &mut use_type)
        };
        if ok != 0 {
            sid.truncate(sid_len as usize);
            return Ok(Some(sid));
        }
        match last_error() {
            ERROR_INSUFFICIENT_BUFFER => {
                sid.resize(sid_len as usize, 0);
                domain.resize(domain_len as usize, 0);
            }
            ERROR_NONE_MAPPED => return Ok(None),
            code => return Err(map_os_err(code, format!("LookupAccountName {}", name))),
        }
    }
}

fn require_sid(identity: &Identity) -> Result<Vec<u8>, ProvisionError> {
    identity.require_exists()?;
    lookup_sid(identity.name())?
        .ok_or_else(|| ProvisionError::UnknownIdentity(String::from(identity.name())))
}

fn rights_mask(rights: AccessRights) -> u32 {
    match rights {
        AccessRights::ReadWriteCreate => {
            FILE_GENERIC_READ | FILE_GENERIC_WRITE | FILE_GENERIC_EXECUTE
        }
        AccessRights::FullControl => FILE_ALL_ACCESS,
    }
}

/// Borrowed view of a wide string as an LSA_UNICODE_STRING.  `wide`
/// must be NUL-terminated and outlive the result.
fn lsa_string(wide: &mut [u16]) -> LSA_UNICODE_STRING {
    let chars = wide.len().saturating_sub(1);
    LSA_UNICODE_STRING {
        Length: (chars * 2) as u16,
        MaximumLength: (wide.len() * 2) as u16,
        Buffer: wide.as_mut_ptr(),
    }
}

/// An open handle on the local security policy.
struct Policy(LSA_HANDLE);

impl Policy {
    fn open() -> Result<Policy, ProvisionError> {
        unsafe {
            let attrs: LSA_OBJECT_ATTRIBUTES = std::mem::zeroed();
            let mut handle: LSA_HANDLE = std::mem::zeroed();
            let status = LsaOpenPolicy(ptr::null(), &attrs,
                                       POLICY_CREATE_ACCOUNT | POLICY_LOOKUP_NAMES,
                                       &mut handle);
            if status != 0 {
                return Err(map_os_err(LsaNtStatusToWinError(status),
                                      String::from("LsaOpenPolicy")));
            }
            Ok(Policy(handle))
        }
    }
}

impl Drop for Policy {
    fn drop(&mut self) {
        unsafe {
            LsaClose(self.0);
        }
    }
}

pub struct WindowsSecurityProvisioner;

impl WindowsSecurityProvisioner {
    pub fn new() -> WindowsSecurityProvisioner {
        WindowsSecurityProvisioner
    }
}

impl IdentityStore for WindowsSecurityProvisioner {
    fn exists(&self, name: &str) -> Result<bool, ProvisionError> {
        lookup_sid(name).map(|s| s.is_some())
    }

    fn create(&mut self, name: &str, credential: &Credential)
              -> Result<(), ProvisionError> {
        let name_w = to_wide(name);
        let pwd_w = to_wide(credential.expose());
        let status = unsafe {
            let info = USER_INFO_1 {
                usri1_name: name_w.as_ptr() as *mut u16,
                usri1_password: pwd_w.as_ptr() as *mut u16,
                usri1_password_age: 0,
                usri1_priv: USER_PRIV_USER,
                usri1_home_dir: ptr::null_mut(),
                usri1_comment: ptr::null_mut(),
                usri1_flags: UF_SCRIPT | UF_DONT_EXPIRE_PASSWD,
                usri1_script_path: ptr::null_mut(),
            };
            NetUserAdd(ptr::null(), 1, &info as *const _ as *mut u8,
                       ptr::null_mut())
        };
        if status != NERR_Success {
            return Err(map_os_err(status, format!("NetUserAdd {}", name)));
        }
        Ok(())
    }

    fn session_identity(&self) -> Result<String, ProvisionError> {
        let mut buf = vec![0u16; 257];
        let mut len = buf.len() as u32;
        if unsafe { GetUserNameW(buf.as_mut_ptr(), &mut len) } == 0 {
            return Err(map_os_err(last_error(), String::from("GetUserName")));
        }
        // len includes the terminating NUL.
        buf.truncate(len.saturating_sub(1) as usize);
        Ok(String::from_utf16_lossy(&buf))
    }
}

impl PrivilegePolicy for WindowsSecurityProvisioner {
    fn held(&self, identity: &Identity)
            -> Result<BTreeSet<PrivilegeKind>, ProvisionError> {
        let mut sid = require_sid(identity)?;
        let policy = Policy::open()?;
        let mut rights: *mut LSA_UNICODE_STRING = ptr::null_mut();
        let mut count: u32 = 0;
        let status = unsafe {
            LsaEnumerateAccountRights(policy.0, sid.as_mut_ptr() as *mut c_void,
                                      &mut rights, &mut count)
        };
        if status == STATUS_OBJECT_NAME_NOT_FOUND {
            return Ok(BTreeSet::new());
        }
        if status != 0 {
            return Err(map_os_err(unsafe { LsaNtStatusToWinError(status) },
                                  format!("LsaEnumerateAccountRights {}",
                                          identity)));
        }
        let mut held = BTreeSet::new();
        for i in 0..count as usize {
            let name = unsafe {
                let r = &*rights.add(i);
                let chars = std::slice::from_raw_parts(r.Buffer,
                                                       (r.Length / 2) as usize);
                String::from_utf16_lossy(chars)
            };
            // Rights outside the fixed set are none of our business.
            if let Ok(p) = name.parse::<PrivilegeKind>() {
                held.insert(p);
            }
        }
        unsafe {
            LsaFreeMemory(rights as *const c_void);
        }
        Ok(held)
    }

    fn add(&mut self, identity: &Identity, privilege: PrivilegeKind)
           -> Result<(), ProvisionError> {
        let mut sid = require_sid(identity)?;
        let policy = Policy::open().map_err(|e| {
            ProvisionError::PrivilegeGrantFailure {
                identity: String::from(identity.name()),
                privilege: privilege,
                detail: e.to_string(),
            }
        })?;
        let mut name_w = to_wide(privilege.policy_name());
        let right = lsa_string(&mut name_w);
        let status = unsafe {
            LsaAddAccountRights(policy.0, sid.as_mut_ptr() as *mut c_void,
                                &right, 1)
        };
        if status != 0 {
            return Err(ProvisionError::PrivilegeGrantFailure {
                identity: String::from(identity.name()),
                privilege: privilege,
                detail: format!("LsaAddAccountRights: system error {}",
                                unsafe { LsaNtStatusToWinError(status) }),
            });
        }
        Ok(())
    }
}

impl AclStore for WindowsSecurityProvisioner {
    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Merges a SET_ACCESS entry into the existing DACL, so this
    /// account ends up with exactly `rights` and nobody else changes.
    fn set_entry(&mut self, identity: &Identity, path: &Path,
                 rights: AccessRights) -> Result<(), ProvisionError> {
        let mut sid = require_sid(identity)?;
        let path_w = to_wide(path.as_os_str());
        unsafe {
            let mut old_dacl: *mut ACL = ptr::null_mut();
            let mut sd: *mut c_void = ptr::null_mut();
            let res = GetNamedSecurityInfoW(path_w.as_ptr(), SE_FILE_OBJECT,
                                            DACL_SECURITY_INFORMATION,
                                            ptr::null_mut(), ptr::null_mut(),
                                            &mut old_dacl, ptr::null_mut(),
                                            &mut sd);
            if res != 0 {
                return Err(map_os_err(res, format!("GetNamedSecurityInfo {}",
                                                   path.display())));
            }

            let ea = EXPLICIT_ACCESS_W {
                grfAccessPermissions: rights_mask(rights),
                grfAccessMode: SET_ACCESS,
                grfInheritance: OBJECT_INHERIT_ACE | CONTAINER_INHERIT_ACE,
                Trustee: TRUSTEE_W {
                    pMultipleTrustee: ptr::null_mut(),
                    MultipleTrusteeOperation: 0,
                    TrusteeForm: TRUSTEE_IS_SID,
                    TrusteeType: TRUSTEE_IS_USER,
                    ptstrName: sid.as_mut_ptr() as *mut u16,
                },
            };
            let mut new_dacl: *mut ACL = ptr::null_mut();
            let set = SetEntriesInAclW(1, &ea, old_dacl, &mut new_dacl);
            if set != 0 {
                LocalFree(sd as HLOCAL);
                return Err(map_os_err(set, format!("SetEntriesInAcl {}",
                                                   path.display())));
            }
            let res = SetNamedSecurityInfoW(path_w.as_ptr() as *mut u16,
                                            SE_FILE_OBJECT,
                                            DACL_SECURITY_INFORMATION,
                                            ptr::null_mut(), ptr::null_mut(),
                                            new_dacl, ptr::null_mut());
            LocalFree(new_dacl as HLOCAL);
            LocalFree(sd as HLOCAL);
            if res != 0 {
                return Err(map_os_err(res, format!("SetNamedSecurityInfo {}",
                                                   path.display())));
            }
        }
        Ok(())
    }
}

impl PlatformCapability for WindowsSecurityProvisioner {
    fn name(&self) -> &'static str {
        "windows-security"
    }

    fn supports(&self, capability: Capability) -> bool {
        capability != Capability::Cgroups
    }

    fn identities(&mut self) -> &mut dyn IdentityStore {
        self
    }

    fn privileges(&mut self) -> Option<&mut dyn PrivilegePolicy> {
        Some(self)
    }

    fn acls(&mut self) -> Option<&mut dyn AclStore> {
        Some(self)
    }
}
