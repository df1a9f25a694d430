pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresMetadata;
pub use sqlite::SqliteMetadata;
