use serde::{Deserialize, Serialize};

/// Account role, from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Guest,
  User,
  Admin,
  SuperAdmin,
}

impl Role {
  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "guest" => Some(Self::Guest),
      "user" => Some(Self::User),
      "admin" => Some(Self::Admin),
      "super_admin" => Some(Self::SuperAdmin),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Guest => "guest",
      Self::User => "user",
      Self::Admin => "admin",
      Self::SuperAdmin => "super_admin",
    }
  }

  /// Reference data, the calculator and saved calculations
  pub fn can_access_references(&self) -> bool {
    *self >= Self::User
  }

  /// User administration; admins double as support staff
  pub fn is_admin(&self) -> bool {
    *self >= Self::Admin
  }

  pub fn is_support(&self) -> bool {
    self.is_admin()
  }

  pub fn is_super_admin(&self) -> bool {
    *self == Self::SuperAdmin
  }
}

impl std::fmt::Display for Role {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_role_round_trip_strings() {
    for role in [Role::Guest, Role::User, Role::Admin, Role::SuperAdmin] {
      assert_eq!(Role::from_str(role.as_str()), Some(role));
    }
    assert_eq!(Role::from_str("support"), None);
    assert_eq!(Role::from_str("Admin"), None);
  }

  #[test]
  fn test_reference_access() {
    assert!(!Role::Guest.can_access_references());
    assert!(Role::User.can_access_references());
    assert!(Role::Admin.can_access_references());
    assert!(Role::SuperAdmin.can_access_references());
  }

  #[test]
  fn test_admin_and_support() {
    assert!(!Role::User.is_admin());
    assert!(Role::Admin.is_admin());
    assert!(Role::SuperAdmin.is_support());
    assert!(!Role::Admin.is_super_admin());
    assert!(Role::SuperAdmin.is_super_admin());
  }

  #[test]
  fn test_serde_uses_snake_case() {
    let json = serde_json::to_string(&Role::SuperAdmin).unwrap();
    assert_eq!(json, "\"super_admin\"");
  }
}
