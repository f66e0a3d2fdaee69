//! Location records returned by address lookups.

use serde::Serialize;

/// Geographic location owned by an address or network prefix.
///
/// Many prefixes may map to equal records; only value equality matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    /// Country name or code, as stored in the database.
    pub country: String,
    /// City name, as stored in the database.
    pub city: String,
}

impl Location {
    pub fn new(country: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            city: city.into(),
        }
    }
}
