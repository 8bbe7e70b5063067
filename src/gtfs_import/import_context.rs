use ahash::AHashMap;

use super::errors::GtfsFeedImporterError;
use super::field_mapping::EntityKind;

/// Source key to database id lookups for one import run.
///
/// Filled after every flushed batch so later entity types can resolve
/// references to earlier ones. Dropped when the run ends.
#[derive(Debug, Default)]
pub struct ImportContext {
    feed_id: i32,
    ids: AHashMap<EntityKind, AHashMap<String, i32>>,
    agency_ids: Vec<i32>,
}

impl ImportContext {
    pub fn new(feed_id: i32) -> Self {
        ImportContext {
            feed_id,
            ..Default::default()
        }
    }

    pub fn feed_id(&self) -> i32 {
        self.feed_id
    }

    pub fn register(&mut self, kind: EntityKind, source_id: String, id: i32) {
        if kind == EntityKind::Agency {
            self.agency_ids.push(id);
        }

        self.ids.entry(kind).or_default().insert(source_id, id);
    }

    pub fn extend<I>(&mut self, kind: EntityKind, rows: I)
    where
        I: IntoIterator<Item = (i32, String)>,
    {
        for (id, source_id) in rows {
            self.register(kind, source_id, id);
        }
    }

    pub fn resolve(&self, kind: EntityKind, source_id: &str) -> Option<i32> {
        self.ids.get(&kind)?.get(source_id).copied()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.ids.get(&kind).map_or(0, |ids| ids.len())
    }

    /// A missing or unknown agency reference falls back to the feed's only
    /// agency. With zero or several agencies there is no sensible default.
    pub fn resolve_agency(&self, source_id: Option<&str>) -> Result<i32, GtfsFeedImporterError> {
        if let Some(id) = source_id.and_then(|source_id| self.resolve(EntityKind::Agency, source_id)) {
            return Ok(id);
        }

        match self.agency_ids.as_slice() {
            [only] => Ok(*only),
            agencies => Err(GtfsFeedImporterError::AmbiguousDefaultAgency {
                count: agencies.len(),
            }),
        }
    }
}
