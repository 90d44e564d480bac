//! Explicit dependency bundle handed to the router. Built once at process
//! start from the configured adapters; cloned per request by axum.

use services::{
    AdService, ArticleService, BoardService, CommentService, NotificationService, UserService,
};

#[derive(Clone)]
pub struct Context {
    pub users: UserService,
    pub boards: BoardService,
    pub articles: ArticleService,
    pub comments: CommentService,
    pub ads: AdService,
    pub notifications: NotificationService,
}
