pub mod sqlx;

pub use self::sqlx::{db_connection, insert_results};
