//! Saved equipment searches

use crate::{
    error::AppResult,
    models::{
        equipment::Equipment,
        saved_search::{CreateSavedSearch, SavedSearch},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct SavedSearchesService {
    repository: Repository,
}

impl SavedSearchesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, user_id: i32) -> AppResult<Vec<SavedSearch>> {
        self.repository.saved_searches.list_for_user(user_id).await
    }

    pub async fn create(&self, user_id: i32, data: &CreateSavedSearch) -> AppResult<SavedSearch> {
        self.repository.saved_searches.create(user_id, data).await
    }

    pub async fn delete(&self, user_id: i32, id: i32) -> AppResult<()> {
        self.repository.saved_searches.delete(id, user_id).await
    }

    /// Execute the stored criteria through the equipment search
    pub async fn run(&self, user_id: i32, id: i32) -> AppResult<(SavedSearch, Vec<Equipment>, i64)> {
        let saved = self.repository.saved_searches.get(id, user_id).await?;
        let (items, total) = self.repository.equipment.search(&saved.criteria).await?;
        Ok((saved, items, total))
    }
}
