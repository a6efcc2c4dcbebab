//! Access control seam.
//!
//! Privilege checks are answered by the surrounding engine; this trait is
//! the stable signature the administration API calls through.

use tempodb_commons::{ProcName, RoleName};

/// Privilege checks consulted by the job administration API.
pub trait AccessControl: Send + Sync {
    /// Whether `role` may execute the given callable.
    fn has_execute_privilege(&self, role: &RoleName, proc: &ProcName) -> bool;

    /// Whether `role` may own background jobs.
    fn can_own_background_jobs(&self, role: &RoleName) -> bool;

    /// Whether `role` holds the privileges of `owner` (directly or via
    /// role membership).
    fn has_privs_of_role(&self, role: &RoleName, owner: &RoleName) -> bool;
}

/// Access control that allows everything. Suitable for embedded
/// deployments with a single trusted principal.
#[derive(Debug, Default)]
pub struct AllowAll;

impl AccessControl for AllowAll {
    fn has_execute_privilege(&self, _role: &RoleName, _proc: &ProcName) -> bool {
        true
    }

    fn can_own_background_jobs(&self, _role: &RoleName) -> bool {
        true
    }

    fn has_privs_of_role(&self, _role: &RoleName, _owner: &RoleName) -> bool {
        true
    }
}
