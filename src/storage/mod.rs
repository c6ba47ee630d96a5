mod articles;
mod comments;
mod favorites;
mod import;
mod preferences;
mod schema;
mod tags;
mod types;

pub use schema::Database;
pub use types::{
    ArticleRecord, DatabaseError, ImportSummary, LikeState, Message, NewArticle, SeedArticle,
    SeedComment, SeedFavorite, SeedFile, SeedUser, Tag, User, UserRef,
};
