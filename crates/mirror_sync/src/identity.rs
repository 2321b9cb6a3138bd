//! Origin -> destination identity mapping
//!
//! A destination copy carries the marker `"<originTenant>:<originRecord>"`
//! under [`IDENTITY_META_KEY`]. Looking a copy up means searching the
//! destination tenant for that exact marker value.

use mirror_common::{RecordId, RecordKey, Result, SyncError, TenantScope, IDENTITY_META_KEY};

/// Identity mappings stored in one destination tenant
#[derive(Debug, Clone, Copy)]
pub struct IdentityMap<'s> {
    scope: TenantScope<'s>,
}

impl<'s> IdentityMap<'s> {
    pub fn new(scope: TenantScope<'s>) -> Self {
        Self { scope }
    }

    /// Destination copy of `origin`, if one exists.
    ///
    /// Several records carrying the same marker should never happen; if it
    /// does the lowest id wins and the duplicates are logged.
    pub fn lookup(&self, origin: RecordKey) -> Result<Option<RecordId>> {
        let marker = origin.to_string();
        let matches = self.scope.find_by_metadata(IDENTITY_META_KEY, &marker)?;

        let winner = matches.iter().min().copied();
        if matches.len() > 1 {
            tracing::warn!(
                tenant = %self.scope.tenant(),
                origin = %marker,
                "Duplicate identity markers on records {:?}, using {:?}",
                matches,
                winner
            );
        }
        Ok(winner)
    }

    /// Mark `destination` as the copy of `origin`.
    ///
    /// A no-op when the mapping already exists; refuses to create a second
    /// copy for the same origin.
    pub fn record(&self, destination: RecordId, origin: RecordKey) -> Result<()> {
        match self.lookup(origin)? {
            Some(existing) if existing == destination => Ok(()),
            Some(existing) => Err(SyncError::IdentityConflict {
                tenant: self.scope.tenant(),
                origin,
                existing,
            }),
            None => {
                self.scope
                    .add_metadata(destination, IDENTITY_META_KEY, &origin.to_string())
            }
        }
    }

    /// Origin a destination record was copied from
    pub fn origin_of(&self, destination: RecordId) -> Result<Option<RecordKey>> {
        let metadata = self.scope.metadata(destination)?;
        metadata
            .get(IDENTITY_META_KEY)
            .and_then(|values| values.first())
            .map(|marker| marker.parse::<RecordKey>())
            .transpose()
    }
}
