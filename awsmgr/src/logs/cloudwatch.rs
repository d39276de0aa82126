//! CloudWatch Logs backend on top of `aws-sdk-cloudwatchlogs`.

use super::{EventFilter, GroupQuery, LogEvent, LogGroup, LogStream, LogsApi, StreamQuery};
use crate::error::{Result, Service};
use crate::page::Page;
use crate::sdk::{AwsContext, remote_error};
use aws_sdk_cloudwatchlogs::Client;
use std::sync::Arc;

/// [`LogsApi`] backed by the CloudWatch Logs SDK client.
#[derive(Debug)]
pub struct CloudWatchLogs {
    ctx: Arc<AwsContext>,
    client: Client,
}

impl CloudWatchLogs {
    /// Build a client from a loaded context.
    pub fn new(ctx: Arc<AwsContext>) -> Self {
        let client = Client::new(ctx.sdk_config());
        Self { ctx, client }
    }
}

impl LogsApi for CloudWatchLogs {
    fn describe_log_groups(&self, query: &GroupQuery) -> Result<Page<LogGroup>> {
        let output = self
            .ctx
            .block_on(
                self.client
                    .describe_log_groups()
                    .set_log_group_name_prefix(query.name_prefix.clone())
                    .set_next_token(query.next_token.clone())
                    .send(),
            )
            .map_err(|e| remote_error(Service::Logs, "DescribeLogGroups", e))?;

        let items = output
            .log_groups()
            .iter()
            .map(|group| LogGroup {
                name: group.log_group_name().unwrap_or_default().to_string(),
                arn: group.arn().map(str::to_owned),
                creation_time: group.creation_time(),
                stored_bytes: group.stored_bytes(),
                retention_in_days: group.retention_in_days(),
            })
            .collect();

        Ok(Page {
            items,
            next_token: output.next_token().map(str::to_owned),
        })
    }

    fn describe_log_streams(&self, query: &StreamQuery) -> Result<Page<LogStream>> {
        let output = self
            .ctx
            .block_on(
                self.client
                    .describe_log_streams()
                    .log_group_name(&query.group_name)
                    .set_log_stream_name_prefix(query.name_prefix.clone())
                    .set_next_token(query.next_token.clone())
                    .send(),
            )
            .map_err(|e| remote_error(Service::Logs, "DescribeLogStreams", e))?;

        let items = output
            .log_streams()
            .iter()
            .map(|stream| LogStream {
                name: stream.log_stream_name().unwrap_or_default().to_string(),
                arn: stream.arn().map(str::to_owned),
                creation_time: stream.creation_time(),
                first_event_timestamp: stream.first_event_timestamp(),
                last_event_timestamp: stream.last_event_timestamp(),
                last_ingestion_time: stream.last_ingestion_time(),
            })
            .collect();

        Ok(Page {
            items,
            next_token: output.next_token().map(str::to_owned),
        })
    }

    fn filter_log_events(&self, filter: &EventFilter) -> Result<Page<LogEvent>> {
        let output = self
            .ctx
            .block_on(
                self.client
                    .filter_log_events()
                    .log_group_name(&filter.group_name)
                    .filter_pattern(&filter.pattern)
                    .set_start_time(filter.start_time)
                    .set_end_time(filter.end_time)
                    .set_next_token(filter.next_token.clone())
                    .send(),
            )
            .map_err(|e| remote_error(Service::Logs, "FilterLogEvents", e))?;

        let items = output
            .events()
            .iter()
            .map(|event| LogEvent {
                log_stream_name: event.log_stream_name().map(str::to_owned),
                timestamp: event.timestamp(),
                ingestion_time: event.ingestion_time(),
                message: event.message().unwrap_or_default().to_string(),
                event_id: event.event_id().map(str::to_owned),
            })
            .collect();

        Ok(Page {
            items,
            next_token: output.next_token().map(str::to_owned),
        })
    }
}
