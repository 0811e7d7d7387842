//! Session identifiers for the login cookie.

use rand::Rng;

/// Length of a generated session id
const SESSION_ID_LEN: usize = 32;

/// Generate a new session ID (lowercase alphanumeric)
pub fn generate_session_id() -> String {
  let mut rng = rand::rng();
  (0..SESSION_ID_LEN)
    .map(|_| {
      let idx: u8 = rng.random_range(0..36);
      if idx < 10 {
        (b'0' + idx) as char
      } else {
        (b'a' + idx - 10) as char
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_session_id_shape() {
    let id = generate_session_id();
    assert_eq!(id.len(), SESSION_ID_LEN);
    assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
  }

  #[test]
  fn test_session_ids_differ() {
    assert_ne!(generate_session_id(), generate_session_id());
  }
}
