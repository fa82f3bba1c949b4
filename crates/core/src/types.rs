/// Identifier of a sensor source. A monitoring slot (enclosure) is addressed
/// by the id its sensor reports under, so slots and sources share this type.
pub type SourceId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
