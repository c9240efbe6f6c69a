//! Patient event timeline — the clinical chronology Passes 2 and 4 reason
//! over for surgical-frequency and treatment-proximity checks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Clinical event category on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    Surgery,
    Radiation,
    Chemotherapy,
    Diagnosis,
    Imaging,
    Other,
}

impl TimelineEventType {
    /// Treatment events are the ones that cannot plausibly precede the
    /// first diagnosis.
    pub fn is_treatment(&self) -> bool {
        matches!(self, Self::Surgery | Self::Radiation | Self::Chemotherapy)
    }
}

/// One ordered clinical event supplied by the timeline provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub event_type: TimelineEventType,
    pub event_date: NaiveDate,
    pub description: String,
}

/// Precomputed prior-surgery/prior-treatment summary relative to one
/// surgical event. The orchestrator derives this once per event so Pass 2
/// does not re-walk the timeline per variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurgicalContext {
    /// Surgeries dated within ±30 days of the event (the event's own
    /// surgery included).
    pub surgeries_within_30_days: u32,
    /// Radiation started within 90 days after the event.
    pub radiation_within_90_days: bool,
    /// Chemotherapy started within 60 days after the event.
    pub chemo_within_60_days: bool,
}

impl SurgicalContext {
    pub fn derive(timeline: &[TimelineEvent], event_date: NaiveDate) -> Self {
        let mut ctx = Self::default();
        for ev in timeline {
            let offset = (ev.event_date - event_date).num_days();
            match ev.event_type {
                TimelineEventType::Surgery if offset.abs() <= 30 => {
                    ctx.surgeries_within_30_days += 1;
                }
                TimelineEventType::Radiation if (0..=90).contains(&offset) => {
                    ctx.radiation_within_90_days = true;
                }
                TimelineEventType::Chemotherapy if (0..=60).contains(&offset) => {
                    ctx.chemo_within_60_days = true;
                }
                _ => {}
            }
        }
        ctx
    }
}

/// Surgeries within `window_days` after (and including) `event_date`.
pub fn surgeries_within(timeline: &[TimelineEvent], event_date: NaiveDate, window_days: i64) -> u32 {
    timeline
        .iter()
        .filter(|ev| {
            ev.event_type == TimelineEventType::Surgery
                && (0..=window_days).contains(&(ev.event_date - event_date).num_days())
        })
        .count() as u32
}

/// First event of `event_type` within `window_days` after `event_date`.
pub fn event_within<'a>(
    timeline: &'a [TimelineEvent],
    event_type: TimelineEventType,
    event_date: NaiveDate,
    window_days: i64,
) -> Option<&'a TimelineEvent> {
    timeline.iter().find(|ev| {
        ev.event_type == event_type
            && (0..=window_days).contains(&(ev.event_date - event_date).num_days())
    })
}

/// Earliest diagnosis event on the timeline, if any.
pub fn earliest_diagnosis(timeline: &[TimelineEvent]) -> Option<&TimelineEvent> {
    timeline
        .iter()
        .filter(|ev| ev.event_type == TimelineEventType::Diagnosis)
        .min_by_key(|ev| ev.event_date)
}
