//! Competition data exchanged with the results server.
//!
//! Field names follow the server's camelCase JSON.

use serde::{Deserialize, Serialize};

/// Per-event competition rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventRules {
    pub attempts: u32,
    pub cut_enabled: bool,
    pub cut_qualifiers: u32,
    pub reorder_after_cut: bool,
}

/// An athlete on an event roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Athlete {
    pub bib: String,
    pub order: u32,
    pub name: String,
    pub club: String,
}

/// An event as listed by `GET /api/v1/events`, with roster and rules when
/// fetched individually.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub rules: Option<EventRules>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub athletes: Vec<Athlete>,
}

/// One attempt in an athlete's series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Performance {
    /// 1-based attempt number
    pub attempt: u32,
    /// Mark as displayed, e.g. "14.52", "X" or "-"
    pub mark: String,
    /// Unit of the mark, e.g. "m"
    pub unit: String,
    /// Wind reading for wind-assisted events, e.g. "+1.2"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind: Option<String>,
    pub valid: bool,
}

/// A full series for one athlete, as posted to `POST /api/v1/results`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub event_id: String,
    pub athlete_bib: String,
    pub series: Vec<Performance>,
}

impl ResultPayload {
    pub fn new(event_id: &str, athlete_bib: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            athlete_bib: athlete_bib.to_string(),
            series: Vec::new(),
        }
    }

    /// Append an attempt, numbering it after the existing series.
    pub fn with_attempt(mut self, mark: &str, unit: &str, wind: Option<&str>, valid: bool) -> Self {
        let attempt = self.series.len() as u32 + 1;
        self.series.push(Performance {
            attempt,
            mark: mark.to_string(),
            unit: unit.to_string(),
            wind: wind.map(str::to_string),
            valid,
        });
        self
    }
}
