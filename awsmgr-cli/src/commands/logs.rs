//! `awsmgr logs` operations.

use anyhow::{Context, Result};
use awsmgr::logs::{self, LogsApi, format_millis};
use clap::Subcommand;
use std::io::Write;

use super::{write_json, write_next_token};

fn parse_time(value: &str) -> Result<i64, String> {
    logs::parse_time_bound(value).map_err(|e| e.to_string())
}

/// CloudWatch Logs operations.
#[derive(Debug, Subcommand)]
#[command(rename_all = "snake_case")]
pub(crate) enum LogsCommand {
    /// List log groups.
    ListLogGroups {
        /// Only groups whose name starts with this prefix.
        #[arg(long = "group_name", value_name = "PREFIX")]
        group_name: Option<String>,

        /// Continuation token from a previous listing.
        #[arg(long = "next_token")]
        next_token: Option<String>,
    },

    /// List the streams of a log group.
    ListLogGroupStreams {
        /// Log group name.
        group_name: String,

        /// Only streams whose name starts with this prefix.
        #[arg(long = "stream_name", value_name = "PREFIX")]
        stream_name: Option<String>,

        /// Continuation token from a previous listing.
        #[arg(long = "next_token")]
        next_token: Option<String>,
    },

    /// Filter the events of a log group.
    FilterLogEvents {
        /// Log group name.
        group_name: String,

        /// CloudWatch filter pattern ("" matches everything).
        filter_pat: String,

        /// Lower bound: epoch ms, RFC 3339 or YYYY-MM-DD.
        #[arg(long, value_parser = parse_time)]
        start: Option<i64>,

        /// Upper bound: epoch ms, RFC 3339 or YYYY-MM-DD.
        #[arg(long, value_parser = parse_time)]
        stop: Option<i64>,

        /// Continuation token from a previous listing.
        #[arg(long = "next_token")]
        next_token: Option<String>,
    },
}

/// Run one logs operation against `api`.
pub(crate) fn run<L: LogsApi + ?Sized>(
    api: &L,
    command: &LogsCommand,
    out: &mut dyn Write,
    json: bool,
) -> Result<()> {
    match command {
        LogsCommand::ListLogGroups {
            group_name,
            next_token,
        } => {
            let page = logs::list_log_groups(api, group_name.as_deref(), next_token.as_deref())
                .context("Failed to list log groups")?;
            if json {
                return write_json(
                    out,
                    &serde_json::json!({
                        "log_groups": page.items,
                        "next_token": page.next_token,
                    }),
                );
            }
            for group in &page.items {
                writeln!(out, "{}", group.name)?;
            }
            write_next_token(out, page.next_token.as_deref())
        },

        LogsCommand::ListLogGroupStreams {
            group_name,
            stream_name,
            next_token,
        } => {
            let page = logs::list_log_group_streams(
                api,
                group_name,
                stream_name.as_deref(),
                next_token.as_deref(),
            )
            .with_context(|| format!("Failed to list streams of {group_name}"))?;
            if json {
                return write_json(
                    out,
                    &serde_json::json!({
                        "log_streams": page.items,
                        "next_token": page.next_token,
                    }),
                );
            }
            for stream in &page.items {
                match stream.last_event_timestamp {
                    Some(ts) => writeln!(out, "{}\t{}", stream.name, format_millis(ts))?,
                    None => writeln!(out, "{}", stream.name)?,
                }
            }
            write_next_token(out, page.next_token.as_deref())
        },

        LogsCommand::FilterLogEvents {
            group_name,
            filter_pat,
            start,
            stop,
            next_token,
        } => {
            let page = logs::filter_log_events(
                api,
                group_name,
                filter_pat,
                *start,
                *stop,
                next_token.as_deref(),
            )
            .with_context(|| format!("Failed to filter events of {group_name}"))?;
            if json {
                return write_json(
                    out,
                    &serde_json::json!({
                        "events": page.items,
                        "next_token": page.next_token,
                    }),
                );
            }
            for event in &page.items {
                writeln!(
                    out,
                    "{} {} {}",
                    event.timestamp.map(format_millis).unwrap_or_default(),
                    event.log_stream_name.as_deref().unwrap_or("-"),
                    event.message.trim_end()
                )?;
            }
            write_next_token(out, page.next_token.as_deref())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::output_string;
    use awsmgr::logs::InMemoryLogs;

    fn backend() -> InMemoryLogs {
        let logs = InMemoryLogs::new();
        logs.add_group("/aws/lambda/api");
        logs.add_group("/ecs/web");
        logs.put_event("/aws/lambda/api", "s1", 1_704_067_200_000, "ERROR boom\n");
        logs.put_event("/aws/lambda/api", "s1", 1_704_067_260_000, "INFO ok");
        logs
    }

    #[test]
    fn test_list_log_groups_forwards_prefix() {
        let api = backend();
        let mut buf = Vec::new();
        let command = LogsCommand::ListLogGroups {
            group_name: Some("/aws".into()),
            next_token: None,
        };
        run(&api, &command, &mut buf, false).unwrap();

        assert_eq!(output_string(buf), "/aws/lambda/api\n");
        assert_eq!(
            api.last_group_query().unwrap().name_prefix.as_deref(),
            Some("/aws")
        );
    }

    #[test]
    fn test_list_log_groups_prints_next_token() {
        let api = InMemoryLogs::new().with_page_size(1);
        api.add_group("a");
        api.add_group("b");
        let mut buf = Vec::new();
        let command = LogsCommand::ListLogGroups {
            group_name: None,
            next_token: None,
        };
        run(&api, &command, &mut buf, false).unwrap();
        assert_eq!(output_string(buf), "a\nNext token: 1\n");
    }

    #[test]
    fn test_filter_log_events_dispatches_to_filter() {
        let api = backend();
        let mut buf = Vec::new();
        let command = LogsCommand::FilterLogEvents {
            group_name: "/aws/lambda/api".into(),
            filter_pat: "ERROR".into(),
            start: Some(1),
            stop: None,
            next_token: None,
        };
        run(&api, &command, &mut buf, false).unwrap();

        let text = output_string(buf);
        assert_eq!(text, "2024-01-01T00:00:00+00:00 s1 ERROR boom\n");
        let filter = api.last_event_filter().unwrap();
        assert_eq!(filter.pattern, "ERROR");
        assert_eq!(filter.start_time, Some(1));
    }

    #[test]
    fn test_list_streams_json() {
        let api = backend();
        let mut buf = Vec::new();
        let command = LogsCommand::ListLogGroupStreams {
            group_name: "/aws/lambda/api".into(),
            stream_name: None,
            next_token: None,
        };
        run(&api, &command, &mut buf, true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["data"]["log_streams"][0]["name"], "s1");
        assert!(value["data"]["next_token"].is_null());
    }

    #[test]
    fn test_missing_group_is_error_with_context() {
        let api = backend();
        let mut buf = Vec::new();
        let command = LogsCommand::ListLogGroupStreams {
            group_name: "/missing".into(),
            stream_name: None,
            next_token: None,
        };
        let err = run(&api, &command, &mut buf, false).unwrap_err();
        assert!(format!("{err:#}").contains("/missing"));
        assert!(err.downcast_ref::<awsmgr::Error>().is_some());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_parse_time_accepts_dates() {
        assert_eq!(parse_time("2024-01-01"), Ok(1_704_067_200_000));
        assert!(parse_time("soon").is_err());
    }
}
