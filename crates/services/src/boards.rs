//! Board management. Boards are created by any signed-in user and never
//! rate-limited; they only exist to scope articles.

use std::sync::Arc;

use domains::{Board, BoardRepo, NewBoard, Result, User};

#[derive(Clone)]
pub struct BoardService {
    boards: Arc<dyn BoardRepo>,
}

impl BoardService {
    pub fn new(boards: Arc<dyn BoardRepo>) -> Self {
        Self { boards }
    }

    pub async fn create(&self, _caller: &User, title: String, description: String) -> Result<Board> {
        self.boards.insert(NewBoard { title, description }).await
    }

    pub async fn list(&self) -> Result<Vec<Board>> {
        self.boards.list_active().await
    }
}
