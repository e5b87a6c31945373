//! Session id generation

use uuid::Uuid;

/// Length of generated session ids
pub const SESSION_ID_LEN: usize = 32;

/// Longest id accepted from clients
const MAX_ID_LEN: usize = 128;

/// Generate a new 32-character session id.
///
/// The id is the simple (hyphen-less, lowercase hex) form of a random v4 UUID,
/// so 122 bits come from the OS random source rather than the clock.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Whether `id` is safe to use as a storage key and file name.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_id_shape() {
        let id = new_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));
        assert!(is_valid_id(&id));
    }

    #[test]
    fn test_new_id_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..1000).map(|_| new_id()).collect::<Vec<_>>()))
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 8000);
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("abc"));
        assert!(is_valid_id("a-b_c"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc/passwd"));
        assert!(!is_valid_id("a b"));
        assert!(!is_valid_id(&"x".repeat(129)));
    }
}
