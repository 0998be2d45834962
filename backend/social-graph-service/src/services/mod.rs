pub mod accounts;
pub mod content;
pub mod follow;
pub mod mention_parser;
pub mod notifications;
pub mod ordering;
pub mod paging;
pub mod queries;
pub mod recommendations;

pub use accounts::{AccountService, SignupInput};
pub use content::ContentService;
pub use follow::FollowService;
pub use mention_parser::{extract_hashtags, extract_mentions};
pub use notifications::NotificationFanout;
pub use paging::PageRange;
pub use queries::QueryService;
pub use recommendations::RecommendationService;
