//! Harvested entity records
//!
//! A `PartialRecord` is what the listing fragment yields on its own. It becomes
//! a `Record` once the detail page has been consulted for the external site URL.

/// An entity as extracted from one listing block, before enrichment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    /// Entity name, used as the natural key
    pub name: String,

    /// Image reference (absolute URL when resolvable)
    pub image_url: String,

    /// Location labels, split from a comma-separated list
    pub locations: Vec<String>,

    /// Free-text description
    pub description: String,

    /// Detail page URL the entity was linked to
    pub source_url: String,
}

impl PartialRecord {
    /// Completes the record with the enrichment result
    ///
    /// An empty `website_url` is a valid outcome and the record is kept.
    pub fn complete(self, website_url: String) -> Record {
        Record {
            name: self.name,
            image_url: self.image_url,
            locations: self.locations,
            description: self.description,
            source_url: self.source_url,
            website_url,
        }
    }
}

/// A fully enriched entity ready to be persisted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub image_url: String,
    pub locations: Vec<String>,
    pub description: String,
    pub source_url: String,

    /// External site URL found on the detail page, empty if none
    pub website_url: String,
}

impl Record {
    /// Location labels joined the way they are stored
    pub fn locations_joined(&self) -> String {
        self.locations.join(", ")
    }
}
