/// Database primary keys are SQLite INTEGER PRIMARY KEY (64-bit).
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
