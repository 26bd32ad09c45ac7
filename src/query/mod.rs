//! Filtered record queries
//!
//! Provides search filters over catalogued records and their translation
//! into parameterized queries for a store.

mod builder;
mod filter;

pub use builder::{
    CypherDialect, FilterDialect, FilterQuery, QueryBuilder, SqliteDialect, FOLD_CASE_FUNCTION,
};
pub use filter::{PropertyKey, QueryError, QueryResult, SearchFilter};
