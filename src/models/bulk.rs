//! Bulk operation requests and results

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::{enums::EquipmentStatus, equipment::CreateEquipment};

/// Items handled per transaction
pub const BULK_CHUNK_SIZE: usize = 500;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkIds {
    #[validate(length(min = 1, max = 10000))]
    pub ids: Vec<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkStatusRequest {
    #[validate(length(min = 1, max = 10000))]
    pub ids: Vec<i32>,
    pub status: EquipmentStatus,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkRejectRequest {
    #[validate(length(min = 1, max = 10000))]
    pub ids: Vec<i32>,
    #[validate(length(min = 1, max = 500, message = "A rejection reason is required"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkImportRequest {
    #[validate(length(min = 1, max = 10000), nested)]
    pub records: Vec<CreateEquipment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BulkFailure {
    /// Item id, or the record's position for imports
    pub id: i32,
    pub error: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct BulkResult {
    pub succeeded: Vec<i32>,
    pub failed: Vec<BulkFailure>,
}

impl BulkResult {
    pub fn fail(&mut self, id: i32, error: impl Into<String>) {
        self.failed.push(BulkFailure {
            id,
            error: error.into(),
        });
    }

    /// Mark every id of a chunk failed with the same error
    pub fn fail_all(&mut self, ids: &[i32], error: &str) {
        for &id in ids {
            self.fail(id, error);
        }
    }

    /// Record ids in `attempted` as succeeded when present in `done`, failed with `error` otherwise
    pub fn settle(&mut self, attempted: &[i32], done: &[i32], error: &str) {
        let done: IndexSet<i32> = done.iter().copied().collect();
        for &id in attempted {
            if done.contains(&id) {
                self.succeeded.push(id);
            } else {
                self.fail(id, error);
            }
        }
    }
}

/// Drop repeated ids, keeping the first occurrence
pub fn dedup_ids(ids: &[i32]) -> Vec<i32> {
    ids.iter().copied().collect::<IndexSet<i32>>().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_order() {
        assert_eq!(dedup_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn test_settle() {
        let mut result = BulkResult::default();
        result.settle(&[1, 2, 3], &[3, 1], "not found");
        assert_eq!(result.succeeded, vec![1, 3]);
        assert_eq!(
            result.failed,
            vec![BulkFailure {
                id: 2,
                error: "not found".to_string()
            }]
        );
    }

    #[test]
    fn test_chunking() {
        let ids: Vec<i32> = (0..1201).collect();
        let sizes: Vec<usize> = ids.chunks(BULK_CHUNK_SIZE).map(<[i32]>::len).collect();
        assert_eq!(sizes, vec![500, 500, 201]);
    }
}
