//! Access control: who may view, download, or delete a file record

use lockbox_core::{FileRecord, Principal, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied,
}

/// Admins may act on any record; everyone else only on their own.
///
/// The same rule guards view, download, and delete.
pub fn check_access(principal: &Principal, record: &FileRecord) -> Access {
    if principal.is_admin() || principal.id == record.owner_id {
        Access::Allowed
    } else {
        Access::Denied
    }
}

/// Owner filter for record store lookups on behalf of `principal`
pub fn owner_scope(principal: &Principal) -> Option<UserId> {
    if principal.is_admin() {
        None
    } else {
        Some(principal.id)
    }
}
