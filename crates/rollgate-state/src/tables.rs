//! redb table definitions for the rollgate release store.

use redb::TableDefinition;

/// Persisted releases keyed by `{kind}:{version}`.
pub const RELEASES: TableDefinition<&str, &[u8]> = TableDefinition::new("releases");
