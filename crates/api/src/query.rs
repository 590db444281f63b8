//! Shared query parameter types for API handlers.

use acemusic_core::status::TrackStatus;
use acemusic_db::models::track::TrackFilter;
use serde::Deserialize;

use crate::error::AppResult;

/// `?search=&status=&limit=` for track listings.
///
/// Empty strings count as absent so HTML forms can submit blank fields.
#[derive(Debug, Default, Deserialize)]
pub struct TrackListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

impl TrackListParams {
    /// Convert into a store filter; an unknown status is a validation error.
    pub fn to_filter(&self) -> AppResult<TrackFilter> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<TrackStatus>()?),
        };
        Ok(TrackFilter {
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            status,
            limit: self.limit,
        })
    }
}
