use chrono::{DateTime, Utc};

use super::Lookups;

/// Reply for a time question at instant `now`.
pub fn current_time_reply(now: DateTime<Utc>) -> String {
    format!("The current time is {} UTC.", now.format("%H:%M:%S"))
}

impl Lookups {
    /// Local clock; never touches the network.
    pub fn current_time(&self) -> String {
        current_time_reply(Utc::now())
    }
}
