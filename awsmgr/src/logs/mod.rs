//! Log group, stream and event queries.
//!
//! Three read-only operations, each a single call through a [`LogsApi`]
//! backend:
//!
//! - [`list_log_groups`]: groups, optionally filtered by name prefix
//! - [`list_log_group_streams`]: streams of one group, optionally by prefix
//! - [`filter_log_events`]: events matching a filter pattern and time bounds
//!
//! Filtering is done by the service; these functions only assemble the
//! request. Each returns one [`Page`] and its continuation token.

#[cfg(feature = "aws")]
pub mod cloudwatch;
pub mod memory;

use crate::error::{Error, Result};
use crate::page::Page;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;

#[cfg(feature = "aws")]
pub use cloudwatch::CloudWatchLogs;
pub use memory::InMemoryLogs;

/// A log group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LogGroup {
    /// Group name.
    pub name: String,
    /// Group ARN.
    pub arn: Option<String>,
    /// Creation time, epoch milliseconds.
    pub creation_time: Option<i64>,
    /// Bytes stored in the group.
    pub stored_bytes: Option<i64>,
    /// Retention setting, `None` for "never expire".
    pub retention_in_days: Option<i32>,
}

/// A log stream inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LogStream {
    /// Stream name.
    pub name: String,
    /// Stream ARN.
    pub arn: Option<String>,
    /// Creation time, epoch milliseconds.
    pub creation_time: Option<i64>,
    /// Timestamp of the first event, epoch milliseconds.
    pub first_event_timestamp: Option<i64>,
    /// Timestamp of the last event, epoch milliseconds.
    pub last_event_timestamp: Option<i64>,
    /// Last ingestion time, epoch milliseconds.
    pub last_ingestion_time: Option<i64>,
}

/// A matched log event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LogEvent {
    /// Stream the event was ingested into.
    pub log_stream_name: Option<String>,
    /// Event time, epoch milliseconds.
    pub timestamp: Option<i64>,
    /// Ingestion time, epoch milliseconds.
    pub ingestion_time: Option<i64>,
    /// Raw message.
    pub message: String,
    /// Service-assigned event id.
    pub event_id: Option<String>,
}

/// Parameters of a `DescribeLogGroups` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupQuery {
    /// Only groups whose name starts with this prefix.
    pub name_prefix: Option<String>,
    /// Continuation token from a previous page.
    pub next_token: Option<String>,
}

/// Parameters of a `DescribeLogStreams` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamQuery {
    /// Group to list.
    pub group_name: String,
    /// Only streams whose name starts with this prefix.
    pub name_prefix: Option<String>,
    /// Continuation token from a previous page.
    pub next_token: Option<String>,
}

/// Parameters of a `FilterLogEvents` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventFilter {
    /// Group to search.
    pub group_name: String,
    /// CloudWatch filter pattern.
    pub pattern: String,
    /// Lower time bound, epoch milliseconds.
    pub start_time: Option<i64>,
    /// Upper time bound, epoch milliseconds.
    pub end_time: Option<i64>,
    /// Continuation token from a previous page.
    pub next_token: Option<String>,
}

/// Backend for the logging service.
///
/// Implementations:
///
/// - [`CloudWatchLogs`]: the AWS SDK (feature `aws`)
/// - [`InMemoryLogs`]: in-process fake for tests and dry runs
pub trait LogsApi {
    /// Describe log groups.
    fn describe_log_groups(&self, query: &GroupQuery) -> Result<Page<LogGroup>>;

    /// Describe the streams of one group.
    fn describe_log_streams(&self, query: &StreamQuery) -> Result<Page<LogStream>>;

    /// Search a group for events.
    fn filter_log_events(&self, filter: &EventFilter) -> Result<Page<LogEvent>>;
}

/// Treat empty strings from the command line as "not given".
fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_owned)
}

/// List log groups, optionally restricted to a name prefix.
pub fn list_log_groups<L: LogsApi + ?Sized>(
    api: &L,
    name_prefix: Option<&str>,
    next_token: Option<&str>,
) -> Result<Page<LogGroup>> {
    let query = GroupQuery {
        name_prefix: non_empty(name_prefix),
        next_token: non_empty(next_token),
    };
    debug!("DescribeLogGroups {query:?}");
    api.describe_log_groups(&query)
}

/// List the streams of `group_name`, optionally restricted to a name prefix.
pub fn list_log_group_streams<L: LogsApi + ?Sized>(
    api: &L,
    group_name: &str,
    name_prefix: Option<&str>,
    next_token: Option<&str>,
) -> Result<Page<LogStream>> {
    let query = StreamQuery {
        group_name: group_name.to_string(),
        name_prefix: non_empty(name_prefix),
        next_token: non_empty(next_token),
    };
    debug!("DescribeLogStreams {query:?}");
    api.describe_log_streams(&query)
}

/// Filter the events of `group_name` by `pattern` and optional time bounds.
pub fn filter_log_events<L: LogsApi + ?Sized>(
    api: &L,
    group_name: &str,
    pattern: &str,
    start_time: Option<i64>,
    end_time: Option<i64>,
    next_token: Option<&str>,
) -> Result<Page<LogEvent>> {
    let filter = EventFilter {
        group_name: group_name.to_string(),
        pattern: pattern.to_string(),
        start_time,
        end_time,
        next_token: non_empty(next_token),
    };
    debug!("FilterLogEvents {filter:?}");
    api.filter_log_events(&filter)
}

/// Parse a time bound into epoch milliseconds.
///
/// Accepts raw epoch milliseconds (`1700000000000`), RFC 3339
/// (`2024-01-31T12:00:00Z`) or a plain date (`2024-01-31`, midnight UTC).
pub fn parse_time_bound(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<i64>() {
        return Ok(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp_millis());
        }
    }
    Err(Error::InvalidArgument(format!(
        "'{value}' is not epoch milliseconds, RFC 3339 or YYYY-MM-DD"
    )))
}

/// Render epoch milliseconds as RFC 3339, or the raw number if out of range.
pub fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_backend() -> InMemoryLogs {
        let logs = InMemoryLogs::new();
        logs.add_group("/aws/lambda/orders");
        logs.add_group("/aws/lambda/payments");
        logs.add_group("/ecs/web");
        logs.put_event("/aws/lambda/orders", "2024/01/01/a", 1_000, "START RequestId: 1");
        logs.put_event("/aws/lambda/orders", "2024/01/01/a", 2_000, "ERROR timeout");
        logs.put_event("/aws/lambda/orders", "2024/01/02/b", 3_000, "ERROR disk full");
        logs
    }

    #[test]
    fn test_list_log_groups_passes_prefix_through() {
        let logs = sample_backend();
        let page = list_log_groups(&logs, Some("/aws/lambda"), None).unwrap();

        assert_eq!(
            logs.last_group_query().unwrap().name_prefix.as_deref(),
            Some("/aws/lambda")
        );
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|g| g.name.starts_with("/aws/lambda")));
    }

    #[test]
    fn test_list_log_groups_without_prefix_sends_none() {
        let logs = sample_backend();
        let page = list_log_groups(&logs, None, None).unwrap();
        assert!(logs.last_group_query().unwrap().name_prefix.is_none());
        assert_eq!(page.items.len(), 3);
    }

    #[test]
    fn test_list_log_groups_empty_prefix_is_none() {
        let logs = sample_backend();
        list_log_groups(&logs, Some(""), None).unwrap();
        assert!(logs.last_group_query().unwrap().name_prefix.is_none());
    }

    #[test]
    fn test_list_log_group_streams_with_prefix() {
        let logs = sample_backend();
        let page =
            list_log_group_streams(&logs, "/aws/lambda/orders", Some("2024/01/02"), None).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "2024/01/02/b");
    }

    #[test]
    fn test_list_log_group_streams_unknown_group_is_remote_error() {
        let logs = sample_backend();
        let err = list_log_group_streams(&logs, "/missing", None, None).unwrap_err();
        assert_eq!(err.code(), Some("ResourceNotFoundException"));
    }

    #[test]
    fn test_filter_log_events_pattern_and_bounds() {
        let logs = sample_backend();
        let page =
            filter_log_events(&logs, "/aws/lambda/orders", "ERROR", Some(2_500), None, None)
                .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].message, "ERROR disk full");

        let sent = logs.last_event_filter().unwrap();
        assert_eq!(sent.pattern, "ERROR");
        assert_eq!(sent.start_time, Some(2_500));
        assert_eq!(sent.end_time, None);
    }

    #[test]
    fn test_filter_log_events_empty_pattern_matches_all() {
        let logs = sample_backend();
        let page = filter_log_events(&logs, "/aws/lambda/orders", "", None, None, None).unwrap();
        assert_eq!(page.items.len(), 3);
    }

    #[test]
    fn test_parse_time_bound_formats() {
        assert_eq!(parse_time_bound("1700000000000").unwrap(), 1_700_000_000_000);
        assert_eq!(
            parse_time_bound("2024-01-01T00:00:00Z").unwrap(),
            1_704_067_200_000
        );
        assert_eq!(parse_time_bound("2024-01-01").unwrap(), 1_704_067_200_000);
        assert_eq!(
            parse_time_bound("2024-01-01T01:00:00+01:00").unwrap(),
            1_704_067_200_000
        );
    }

    #[test]
    fn test_parse_time_bound_rejects_garbage() {
        let err = parse_time_bound("yesterday").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(1_704_067_200_000), "2024-01-01T00:00:00+00:00");
    }
}
