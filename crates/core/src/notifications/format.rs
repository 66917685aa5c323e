//! Batch deduplication, grouping and message formatting.

use std::collections::HashSet;

use crate::media::MediaType;

use super::NotificationEvent;

/// Events sharing title, type, year, state and version.
#[derive(Debug, Clone, PartialEq)]
pub struct EventGroup {
    pub title: String,
    pub media_type: MediaType,
    pub year: Option<i32>,
    pub state: String,
    pub version: Option<String>,
    pub events: Vec<NotificationEvent>,
}

impl EventGroup {
    fn matches(&self, event: &NotificationEvent) -> bool {
        self.title == event.title
            && self.media_type == event.media_type
            && self.year == event.year
            && self.state == event.display_state()
            && self.version == event.version
    }

    fn header(&self) -> String {
        let icon = match self.media_type {
            MediaType::Movie => "🎬",
            MediaType::Episode => "📺",
        };
        let mut header = format!("{} **{}**", icon, self.title);
        if let Some(year) = self.year {
            header.push_str(&format!(" ({})", year));
        }
        if let Some(version) = &self.version {
            header.push_str(&format!(" [{}]", version));
        }
        header.push_str(&format!(" → {}", self.state));
        header
    }
}

/// Drop repeated events, keeping the first occurrence of each key.
pub fn dedup_events(events: Vec<NotificationEvent>) -> Vec<NotificationEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|event| seen.insert(event.dedup_key()))
        .collect()
}

/// Group events in first-seen order.
pub fn group_events(events: &[NotificationEvent]) -> Vec<EventGroup> {
    let mut groups: Vec<EventGroup> = Vec::new();
    for event in events {
        match groups.iter_mut().find(|g| g.matches(event)) {
            Some(group) => group.events.push(event.clone()),
            None => groups.push(EventGroup {
                title: event.title.clone(),
                media_type: event.media_type,
                year: event.year,
                state: event.display_state().to_string(),
                version: event.version.clone(),
                events: vec![event.clone()],
            }),
        }
    }
    groups
}

fn episode_line(event: &NotificationEvent) -> Option<String> {
    match (event.season_number, event.episode_number) {
        (Some(s), Some(e)) => Some(format!("    S{:02}E{:02}", s, e)),
        _ => None,
    }
}

/// Render one message for a batch.
///
/// Each group gets one header; episode groups list one line per episode,
/// condensed to the first line plus a count once they exceed
/// `condense_threshold` (0 never condenses).
pub fn format_batch(events: &[NotificationEvent], condense_threshold: usize) -> String {
    group_events(events)
        .iter()
        .map(|group| {
            let mut lines = vec![group.header()];
            let episodes: Vec<String> = group.events.iter().filter_map(episode_line).collect();
            if condense_threshold > 0 && episodes.len() > condense_threshold {
                lines.push(episodes[0].clone());
                lines.push(format!("    ...and {} others", episodes.len() - 1));
            } else {
                lines.extend(episodes);
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
