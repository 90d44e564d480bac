//! # services
//!
//! Use-case logic over the domain ports. Each service owns the trait-object
//! handles it needs and exposes the operations the web layer calls; nothing
//! in here knows about HTTP or any concrete store.

pub mod access;
pub mod ads;
pub mod articles;
pub mod boards;
pub mod comments;
pub mod notifications;
pub mod rate_limit;
pub mod users;

pub use access::{authorize_account_delete, authorize_mutation};
pub use ads::AdService;
pub use articles::ArticleService;
pub use boards::BoardService;
pub use comments::CommentService;
pub use notifications::NotificationService;
pub use rate_limit::{ActionKind, RateLimitPolicy, RateLimiter};
pub use users::UserService;
