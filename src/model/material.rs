//! A committed allocation of time to one query occurrence.

use serde::{Deserialize, Serialize};

use super::{QueryId, Range};

/// Immutable once appended to the material list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub query_id: QueryId,
    pub potential_id: u32,
    /// Fragment index for splittable occurrences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_id: Option<u32>,
    pub start: i64,
    pub end: i64,
}

impl Material {
    pub fn new(query_id: QueryId, potential_id: u32, start: i64, end: i64) -> Self {
        Self { query_id, potential_id, split_id: None, start, end }
    }

    pub fn with_split(mut self, split_id: u32) -> Self {
        self.split_id = Some(split_id);
        self
    }

    pub fn range(&self) -> Range {
        Range::new(self.start, self.end)
    }

    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Append and keep the list ordered by start. Equal starts keep insertion
/// order.
pub fn insert_sorted(materials: &mut Vec<Material>, new: impl IntoIterator<Item = Material>) {
    materials.extend(new);
    materials.sort_by_key(|m| m.start);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sorted_is_stable() {
        let mut list = vec![Material::new(QueryId(1), 0, 0, 5), Material::new(QueryId(2), 0, 10, 12)];
        insert_sorted(
            &mut list,
            [Material::new(QueryId(3), 0, 5, 7), Material::new(QueryId(4), 0, 10, 11)],
        );
        let ids: Vec<u64> = list.iter().map(|m| m.query_id.0).collect();
        assert_eq!(ids, vec![1, 3, 2, 4]);
    }
}
