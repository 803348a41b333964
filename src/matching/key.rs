//! Match key construction shared by records and reference rows.

use crate::models::{FacilityReference, PatientRecord};
use crate::normalize::{char_prefix, normalize_name};

/// `trim(name) + national_id[..prefix_len]`, or `None` when either part is blank.
pub fn key_for(name: &str, national_id: &str, prefix_len: usize) -> Option<String> {
    let name = normalize_name(name);
    let id = national_id.trim();
    if name.is_empty() || id.is_empty() {
        return None;
    }
    let mut key = String::with_capacity(name.len() + prefix_len);
    key.push_str(&name);
    key.push_str(char_prefix(id, prefix_len));
    Some(key)
}

pub fn record_key(r: &PatientRecord, prefix_len: usize) -> Option<String> {
    key_for(&r.name, &r.national_id, prefix_len)
}

pub fn reference_key(r: &FacilityReference, prefix_len: usize) -> Option<String> {
    key_for(&r.name, &r.national_id, prefix_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_uses_trimmed_name_and_id_prefix() {
        assert_eq!(
            key_for("  Kim ", "9001011234567", 6).as_deref(),
            Some("Kim900101")
        );
        assert_eq!(
            key_for("김철수", "900101-1234567", 6).as_deref(),
            Some("김철수900101")
        );
    }

    #[test]
    fn short_ids_use_what_is_there() {
        assert_eq!(key_for("Kim", "9001", 6).as_deref(), Some("Kim9001"));
    }

    #[test]
    fn blank_parts_give_no_key() {
        assert_eq!(key_for("", "9001011234567", 6), None);
        assert_eq!(key_for("   ", "9001011234567", 6), None);
        assert_eq!(key_for("Kim", "", 6), None);
    }

    #[test]
    fn key_is_stable() {
        let a = key_for("Park", "7501012345678", 6);
        for _ in 0..10 {
            assert_eq!(key_for("Park", "7501012345678", 6), a);
        }
    }
}
