//! Location database backends and the factory that selects one.
//!
//! The only backend is a CSV file (`address-or-cidr,city,country`, no
//! header) loaded fully into a [`LocationStore`] at startup.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{LoadError, NotFoundError};
use crate::location::Location;
use crate::store::{LocationStore, LocationStoreBuilder};

/// Read-only lookup seam used by the request layer.
pub trait LocationDatabase: Send + Sync {
    /// Resolves an address to its location.
    fn find_location(&self, addr: IpAddr) -> Result<Arc<Location>, NotFoundError>;

    /// Number of entries loaded.
    fn entry_count(&self) -> usize;
}

impl LocationDatabase for LocationStore {
    fn find_location(&self, addr: IpAddr) -> Result<Arc<Location>, NotFoundError> {
        self.resolve(addr).map(Arc::clone)
    }

    fn entry_count(&self) -> usize {
        self.len()
    }
}

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Csv,
}

impl DatabaseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            _ => Err(LoadError::UnsupportedType(s.to_string())),
        }
    }
}

/// Opens the database of the given kind at `path`.
pub fn open_database(kind: &str, path: &Path) -> Result<Arc<dyn LocationDatabase>, LoadError> {
    let kind = kind.parse::<DatabaseKind>()?;
    tracing::info!(%kind, path = %path.display(), "Loading location database");

    match kind {
        DatabaseKind::Csv => Ok(Arc::new(load_csv(path)?)),
    }
}

/// Loads a CSV database file into a store.
pub fn load_csv(path: &Path) -> Result<LocationStore, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_csv_reader(file)
}

/// Loads CSV rows from any reader into a store.
///
/// Records may have any number of fields; rows with fewer than three are
/// skipped by the store builder rather than rejected by the parser. Fields
/// are not required to be UTF-8: invalid bytes are replaced with U+FFFD so
/// one badly encoded city name cannot fail the whole load.
pub fn load_csv_reader<R: Read>(reader: R) -> Result<LocationStore, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut builder = LocationStoreBuilder::default();
    for record in reader.byte_records() {
        let record = record?;
        builder.push_row(record.iter().map(String::from_utf8_lossy));
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = "\
203.0.113.0/24,Paris,FR
198.51.100.7,Austin,US
\"2001:db8::/32\",\"Sao Paulo, SP\",BR
bogus,Nowhere,XX
10.0.0.1,short
";

    #[test]
    fn reads_quoted_and_ragged_csv() {
        let store = load_csv_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(store.exact_len(), 1);
        assert_eq!(store.cidr_len(), 2);

        let loc = store.resolve("2001:db8::1".parse().unwrap()).unwrap();
        assert_eq!(loc.city, "Sao Paulo, SP");
        assert_eq!(loc.country, "BR");
    }

    #[test]
    fn non_utf8_row_does_not_abort_load() {
        let input: &[u8] = b"203.0.113.0/24,Paris,FR\n198.51.100.7,S\xE3o Paulo,BR\n";
        let store = load_csv_reader(input).unwrap();
        assert_eq!(store.len(), 2);

        let loc = store.resolve("198.51.100.7".parse().unwrap()).unwrap();
        assert_eq!(loc.country, "BR");
        assert_eq!(loc.city, "S\u{FFFD}o Paulo");
        assert_eq!(
            store.resolve("203.0.113.9".parse().unwrap()).unwrap().city,
            "Paris"
        );
    }

    #[test]
    fn kind_display_matches_config_value() {
        assert_eq!(DatabaseKind::Csv.to_string(), "csv");
        assert_eq!(
            DatabaseKind::Csv.as_str().parse::<DatabaseKind>().unwrap(),
            DatabaseKind::Csv
        );
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(matches!(
            load_csv_reader("".as_bytes()),
            Err(LoadError::Empty)
        ));
        assert!(matches!(
            load_csv_reader("header,only,garbage\n".as_bytes()),
            Err(LoadError::Empty)
        ));
    }

    #[test]
    fn open_database_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let db = open_database("csv", file.path()).unwrap();
        assert_eq!(db.entry_count(), 3);
        assert_eq!(
            *db.find_location("203.0.113.42".parse().unwrap()).unwrap(),
            Location::new("FR", "Paris")
        );
        assert!(db.find_location("8.8.8.8".parse().unwrap()).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = open_database("csv", Path::new("/nonexistent/ip2country.csv"))
            .err()
            .unwrap();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/ip2country.csv"));
    }

    #[test]
    fn unsupported_kind() {
        let err = open_database("mmdb", Path::new("unused")).err().unwrap();
        assert!(matches!(err, LoadError::UnsupportedType(ref t) if t == "mmdb"));
        assert_eq!("CSV".parse::<DatabaseKind>().unwrap(), DatabaseKind::Csv);
    }
}
