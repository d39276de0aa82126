//! In-memory logging backend.

use super::{EventFilter, GroupQuery, LogEvent, LogGroup, LogStream, LogsApi, StreamQuery};
use crate::error::{Error, Result, Service};
use crate::page::{Page, paginate};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Default)]
struct MemGroup {
    streams: BTreeMap<String, Vec<LogEvent>>,
}

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<String, MemGroup>,
    group_queries: Vec<GroupQuery>,
    stream_queries: Vec<StreamQuery>,
    event_filters: Vec<EventFilter>,
    next_event_id: u64,
}

/// [`LogsApi`] that keeps groups and events in process memory.
///
/// Every request is recorded so callers can check exactly what would have
/// been sent to the service.
#[derive(Debug)]
pub struct InMemoryLogs {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for InMemoryLogs {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLogs {
    /// Empty backend.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Return at most `page_size` items per call.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Create an empty group (no-op if it exists).
    pub fn add_group(&self, name: &str) {
        self.state().groups.entry(name.to_string()).or_default();
    }

    /// Append an event, creating the group and stream on demand.
    pub fn put_event(&self, group: &str, stream: &str, timestamp: i64, message: &str) {
        let mut state = self.state();
        state.next_event_id += 1;
        let event_id = state.next_event_id.to_string();
        state
            .groups
            .entry(group.to_string())
            .or_default()
            .streams
            .entry(stream.to_string())
            .or_default()
            .push(LogEvent {
                log_stream_name: Some(stream.to_string()),
                timestamp: Some(timestamp),
                ingestion_time: Some(timestamp),
                message: message.to_string(),
                event_id: Some(event_id),
            });
    }

    /// The most recent `DescribeLogGroups` request.
    pub fn last_group_query(&self) -> Option<GroupQuery> {
        self.state().group_queries.last().cloned()
    }

    /// The most recent `DescribeLogStreams` request.
    pub fn last_stream_query(&self) -> Option<StreamQuery> {
        self.state().stream_queries.last().cloned()
    }

    /// The most recent `FilterLogEvents` request.
    pub fn last_event_filter(&self) -> Option<EventFilter> {
        self.state().event_filters.last().cloned()
    }
}

fn group_not_found(operation: &'static str, name: &str) -> Error {
    Error::Remote {
        service: Service::Logs,
        operation,
        code: Some("ResourceNotFoundException".to_string()),
        message: format!("The specified log group does not exist: {name}"),
    }
}

/// Term matching: every whitespace-separated term must occur in the message.
fn matches_pattern(pattern: &str, message: &str) -> bool {
    pattern
        .split_whitespace()
        .map(|term| term.trim_matches('"'))
        .filter(|term| !term.is_empty())
        .all(|term| message.contains(term))
}

impl LogsApi for InMemoryLogs {
    fn describe_log_groups(&self, query: &GroupQuery) -> Result<Page<LogGroup>> {
        let mut state = self.state();
        state.group_queries.push(query.clone());

        let groups: Vec<LogGroup> = state
            .groups
            .iter()
            .filter(|(name, _)| {
                query
                    .name_prefix
                    .as_deref()
                    .is_none_or(|prefix| name.starts_with(prefix))
            })
            .map(|(name, group)| LogGroup {
                name: name.clone(),
                arn: Some(format!("arn:aws:logs:local:000000000000:log-group:{name}:*")),
                creation_time: Some(0),
                stored_bytes: Some(
                    group
                        .streams
                        .values()
                        .flatten()
                        .map(|e| i64::try_from(e.message.len()).unwrap_or(i64::MAX))
                        .sum(),
                ),
                retention_in_days: None,
            })
            .collect();

        Ok(paginate(&groups, self.page_size, query.next_token.as_deref()))
    }

    fn describe_log_streams(&self, query: &StreamQuery) -> Result<Page<LogStream>> {
        let mut state = self.state();
        state.stream_queries.push(query.clone());

        let group = state
            .groups
            .get(&query.group_name)
            .ok_or_else(|| group_not_found("DescribeLogStreams", &query.group_name))?;

        let streams: Vec<LogStream> = group
            .streams
            .iter()
            .filter(|(name, _)| {
                query
                    .name_prefix
                    .as_deref()
                    .is_none_or(|prefix| name.starts_with(prefix))
            })
            .map(|(name, events)| LogStream {
                name: name.clone(),
                arn: None,
                creation_time: events.first().and_then(|e| e.timestamp),
                first_event_timestamp: events.iter().filter_map(|e| e.timestamp).min(),
                last_event_timestamp: events.iter().filter_map(|e| e.timestamp).max(),
                last_ingestion_time: events.iter().filter_map(|e| e.ingestion_time).max(),
            })
            .collect();

        Ok(paginate(&streams, self.page_size, query.next_token.as_deref()))
    }

    fn filter_log_events(&self, filter: &EventFilter) -> Result<Page<LogEvent>> {
        let mut state = self.state();
        state.event_filters.push(filter.clone());

        let group = state
            .groups
            .get(&filter.group_name)
            .ok_or_else(|| group_not_found("FilterLogEvents", &filter.group_name))?;

        let mut events: Vec<LogEvent> = group
            .streams
            .values()
            .flatten()
            .filter(|e| {
                let ts = e.timestamp.unwrap_or_default();
                filter.start_time.is_none_or(|start| ts >= start)
                    && filter.end_time.is_none_or(|end| ts <= end)
                    && matches_pattern(&filter.pattern, &e.message)
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp);

        Ok(paginate(&events, self.page_size, filter.next_token.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_pattern_terms() {
        assert!(matches_pattern("", "anything"));
        assert!(matches_pattern("ERROR", "ERROR disk full"));
        assert!(matches_pattern("ERROR disk", "ERROR disk full"));
        assert!(!matches_pattern("ERROR memory", "ERROR disk full"));
        assert!(matches_pattern("\"disk\"", "ERROR disk full"));
    }

    #[test]
    fn test_group_pages_follow_token() {
        let logs = InMemoryLogs::new().with_page_size(1);
        logs.add_group("a");
        logs.add_group("b");

        let first = logs.describe_log_groups(&GroupQuery::default()).unwrap();
        assert_eq!(first.items[0].name, "a");
        let second = logs
            .describe_log_groups(&GroupQuery {
                next_token: first.next_token,
                ..GroupQuery::default()
            })
            .unwrap();
        assert_eq!(second.items[0].name, "b");
        assert!(second.next_token.is_none());
    }

    #[test]
    fn test_stream_timestamps_derived_from_events() {
        let logs = InMemoryLogs::new();
        logs.put_event("g", "s", 10, "one");
        logs.put_event("g", "s", 30, "two");

        let page = logs
            .describe_log_streams(&StreamQuery {
                group_name: "g".into(),
                ..StreamQuery::default()
            })
            .unwrap();
        assert_eq!(page.items[0].first_event_timestamp, Some(10));
        assert_eq!(page.items[0].last_event_timestamp, Some(30));
        assert_eq!(logs.last_stream_query().unwrap().group_name, "g");
    }

    #[test]
    fn test_filter_end_bound_inclusive() {
        let logs = InMemoryLogs::new();
        logs.put_event("g", "s", 10, "a");
        logs.put_event("g", "s", 20, "b");
        let page = logs
            .filter_log_events(&EventFilter {
                group_name: "g".into(),
                end_time: Some(10),
                ..EventFilter::default()
            })
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].message, "a");
    }
}
