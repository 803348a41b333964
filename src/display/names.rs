use std::collections::HashMap;

use crate::models::PatientRecord;
use crate::normalize::char_prefix;

/// Display names for a table: the plain name when it appears on exactly one
/// row of the table, else `name(NN)`. A patient with several visits is
/// annotated as well.
///
/// Two namesakes with the same ID prefix still collide; the suffix is not
/// guaranteed unique.
#[derive(Debug, Clone)]
pub struct DisplayNames {
    rows_by_name: HashMap<String, usize>,
    prefix_len: usize,
}

impl DisplayNames {
    pub fn new<'a, I>(records: I, prefix_len: usize) -> Self
    where
        I: IntoIterator<Item = &'a PatientRecord>,
    {
        let mut rows_by_name: HashMap<String, usize> = HashMap::new();
        for r in records {
            *rows_by_name.entry(r.name.clone()).or_insert(0) += 1;
        }
        Self {
            rows_by_name,
            prefix_len,
        }
    }

    pub fn is_shared(&self, name: &str) -> bool {
        self.rows_by_name.get(name).map_or(false, |n| *n >= 2)
    }

    pub fn get(&self, r: &PatientRecord) -> String {
        if self.is_shared(&r.name) {
            format!(
                "{}({})",
                r.name,
                char_prefix(r.national_id.trim(), self.prefix_len)
            )
        } else {
            r.name.clone()
        }
    }
}
