use serde::{Deserialize, Serialize};

/// A single capability bit. The wire values are fixed by the stored role
/// masks; changing them would reinterpret every persisted role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    Follow,
    Comment,
    Write,
    Moderate,
    Admin,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::Follow,
        Permission::Comment,
        Permission::Write,
        Permission::Moderate,
        Permission::Admin,
    ];

    pub fn bit(self) -> i32 {
        match self {
            Permission::Follow => 1,
            Permission::Comment => 2,
            Permission::Write => 4,
            Permission::Moderate => 8,
            Permission::Admin => 16,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Permission::Follow => "follow",
            Permission::Comment => "comment",
            Permission::Write => "write",
            Permission::Moderate => "moderate",
            Permission::Admin => "admin",
        }
    }
}

/// A set of named capability flags backed by the stored integer mask.
/// Flags are additive and independent; roles are built by union, never by
/// inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(i32);

impl PermissionSet {
    pub const EMPTY: PermissionSet = PermissionSet(0);

    pub fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> i32 {
        self.0
    }

    pub fn of(flags: &[Permission]) -> Self {
        flags
            .iter()
            .fold(Self::EMPTY, |set, &flag| set.with(flag))
    }

    /// True iff every bit of `flag` is present. The empty requirement is
    /// satisfied by any mask, including zero.
    pub fn contains(self, flag: Permission) -> bool {
        self.0 & flag.bit() == flag.bit()
    }

    pub fn insert(&mut self, flag: Permission) {
        self.0 |= flag.bit();
    }

    pub fn remove(&mut self, flag: Permission) {
        self.0 &= !flag.bit();
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn with(self, flag: Permission) -> Self {
        Self(self.0 | flag.bit())
    }

    pub fn union(self, other: PermissionSet) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_subset_of(self, other: PermissionSet) -> bool {
        self.0 & other.0 == self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The named flags present in this set, for API responses and logs.
    pub fn flags(self) -> Vec<Permission> {
        Permission::ALL
            .into_iter()
            .filter(|&flag| self.contains(flag))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: i32,
    pub name: String,
    pub is_default: bool,
    pub permissions: PermissionSet,
}

impl Role {
    pub fn has_permission(&self, flag: Permission) -> bool {
        self.permissions.contains(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_requirement_always_satisfied() {
        for mask in [0, 1, 7, 15, 31] {
            let set = PermissionSet::from_bits(mask);
            assert!(PermissionSet::EMPTY.is_subset_of(set));
        }
    }

    #[test]
    fn zero_mask_has_no_permissions() {
        let set = PermissionSet::EMPTY;
        for flag in Permission::ALL {
            assert!(!set.contains(flag));
        }
        assert!(set.is_empty());
    }

    #[test]
    fn insert_and_remove_are_bitwise() {
        let mut set = PermissionSet::EMPTY;
        set.insert(Permission::Follow);
        set.insert(Permission::Write);
        assert!(set.contains(Permission::Follow));
        assert!(set.contains(Permission::Write));
        assert!(!set.contains(Permission::Comment));
        assert_eq!(set.bits(), 5);

        set.remove(Permission::Follow);
        assert!(!set.contains(Permission::Follow));
        assert!(set.contains(Permission::Write));

        // Removing an absent flag is a no-op.
        set.remove(Permission::Admin);
        assert_eq!(set.bits(), 4);
    }

    #[test]
    fn clear_zeroes_the_mask() {
        let mut set = PermissionSet::of(&Permission::ALL);
        set.clear();
        assert_eq!(set, PermissionSet::EMPTY);
    }

    #[test]
    fn moderator_is_union_of_user_flags_plus_moderate() {
        let user = PermissionSet::of(&[
            Permission::Follow,
            Permission::Comment,
            Permission::Write,
        ]);
        let moderator = user.union(PermissionSet::of(&[Permission::Moderate]));

        assert_eq!(user.bits(), 7);
        assert_eq!(moderator.bits(), 15);
        assert!(user.is_subset_of(moderator));
        assert!(!moderator.is_subset_of(user));
        assert!(moderator.contains(Permission::Moderate));
        assert!(!moderator.contains(Permission::Admin));
    }

    #[test]
    fn administrator_mask_matches_seed() {
        let admin = PermissionSet::of(&Permission::ALL);
        assert_eq!(admin.bits(), 31);
        assert_eq!(
            admin.flags(),
            vec![
                Permission::Follow,
                Permission::Comment,
                Permission::Write,
                Permission::Moderate,
                Permission::Admin,
            ]
        );
    }

    #[test]
    fn role_delegates_to_its_set() {
        let role = Role {
            id: 1,
            name: "Moderator".into(),
            is_default: false,
            permissions: PermissionSet::from_bits(15),
        };
        assert!(role.has_permission(Permission::Moderate));
        assert!(!role.has_permission(Permission::Admin));
    }
}
