//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod purge;
mod retention;

pub use purge::{
    OLDER_THAN_OPERATOR, PurgeFilter, PurgeOperation, PurgeRequest, PurgeStatus,
    TIME_GENERATED_COLUMN, format_threshold,
};
pub use retention::{RetentionEntry, RetentionPeriod, TableName};
