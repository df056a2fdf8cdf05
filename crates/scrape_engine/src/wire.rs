//! JSON bodies exchanged between the dashboard and the mock API.

use serde::{Deserialize, Serialize};

pub const SUBMIT_MESSAGE: &str = "URL scraping has been initiated";

/// `POST /scrape` body. `url` is optional so a missing field maps to 400, not 422.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub url: Option<String>,
}

impl SubmitRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
