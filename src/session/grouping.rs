// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Recency grouping for the history view

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::model::Session;

/// Time-since-last-update bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyBand {
    JustNow,
    Last15Minutes,
    LastHour,
    Last3Hours,
    Last24Hours,
    LastWeek,
    LastMonth,
    Older,
}

impl RecencyBand {
    /// Canonical display order
    pub const ALL: [RecencyBand; 8] = [
        RecencyBand::JustNow,
        RecencyBand::Last15Minutes,
        RecencyBand::LastHour,
        RecencyBand::Last3Hours,
        RecencyBand::Last24Hours,
        RecencyBand::LastWeek,
        RecencyBand::LastMonth,
        RecencyBand::Older,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RecencyBand::JustNow => "Just now",
            RecencyBand::Last15Minutes => "Last 15 minutes",
            RecencyBand::LastHour => "Last hour",
            RecencyBand::Last3Hours => "Last 3 hours",
            RecencyBand::Last24Hours => "Last 24 hours",
            RecencyBand::LastWeek => "Last week",
            RecencyBand::LastMonth => "Last month",
            RecencyBand::Older => "Older",
        }
    }

    /// Band for a given age; timestamps in the future count as just now.
    pub fn for_age(age: Duration) -> Self {
        if age <= Duration::minutes(5) {
            RecencyBand::JustNow
        } else if age <= Duration::minutes(15) {
            RecencyBand::Last15Minutes
        } else if age <= Duration::hours(1) {
            RecencyBand::LastHour
        } else if age <= Duration::hours(3) {
            RecencyBand::Last3Hours
        } else if age <= Duration::hours(24) {
            RecencyBand::Last24Hours
        } else if age <= Duration::days(7) {
            RecencyBand::LastWeek
        } else if age <= Duration::days(30) {
            RecencyBand::LastMonth
        } else {
            RecencyBand::Older
        }
    }
}

/// Sessions in one band, most recently updated first
#[derive(Debug, Clone, Serialize)]
pub struct SessionGroup<'a> {
    pub band: RecencyBand,
    pub label: &'static str,
    pub sessions: Vec<&'a Session>,
}

impl SessionGroup<'_> {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Filter sessions by `query` and bucket them by recency.
///
/// Every band is returned, in canonical order, even when empty.
pub fn group_sessions<'a>(
    sessions: &'a [Session],
    query: &str,
    now: DateTime<Utc>,
) -> Vec<SessionGroup<'a>> {
    let query = query.trim().to_lowercase();
    let mut groups: Vec<SessionGroup<'a>> = RecencyBand::ALL
        .into_iter()
        .map(|band| SessionGroup {
            band,
            label: band.label(),
            sessions: Vec::new(),
        })
        .collect();

    for session in sessions.iter().filter(|s| s.matches(&query)) {
        let band = RecencyBand::for_age(now - session.last_updated_at);
        // ALL is in declaration order, so the discriminant is the index
        groups[band as usize].sessions.push(session);
    }
    for group in &mut groups {
        group
            .sessions
            .sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
    }
    groups
}

/// Short relative label such as "5m ago"
pub fn relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now - timestamp;
    if age < Duration::minutes(1) {
        "Just now".to_string()
    } else if age < Duration::hours(1) {
        format!("{}m ago", age.num_minutes())
    } else if age < Duration::days(1) {
        format!("{}h ago", age.num_hours())
    } else if age < Duration::days(7) {
        format!("{}d ago", age.num_days())
    } else {
        timestamp.format("%Y-%m-%d").to_string()
    }
}
