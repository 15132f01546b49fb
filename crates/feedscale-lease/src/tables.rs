//! redb table definitions for the lease store.

use redb::TableDefinition;

/// Lease records keyed by `{prefix}..{lease_token}`, JSON-encoded.
pub const LEASES: TableDefinition<&str, &[u8]> = TableDefinition::new("leases");
