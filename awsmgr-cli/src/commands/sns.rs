//! `awsmgr sns` operations.

use anyhow::{Context, Result};
use awsmgr::notify::{self, NotificationService};
use clap::Subcommand;
use std::io::Write;

use super::{write_json, write_next_token};

/// SNS topic, subscription and publish operations.
#[derive(Debug, Subcommand)]
#[command(rename_all = "snake_case")]
pub(crate) enum SnsCommand {
    /// Create an SNS topic.
    CreateSnsTopic {
        /// Topic name.
        topic_name: String,
    },

    /// List SNS topics.
    ListSnsTopics {
        /// Continuation token from a previous listing.
        #[arg(long = "next_token")]
        next_token: Option<String>,
    },

    /// List SNS subscriptions.
    ListSnsSubscriptions {
        /// Continuation token from a previous listing.
        #[arg(long = "next_token")]
        next_token: Option<String>,
    },

    /// Subscribe a mobile number to a topic (SMS).
    SubscribeSnsTopic {
        /// SNS topic ARN.
        topic_arn: String,

        /// Mobile number in E.164 format, e.g. +15555550100.
        mobile_number: String,
    },

    /// Publish a message.
    SendSnsMessage {
        /// SNS topic ARN to publish to.
        topic_arn: String,

        /// Message to be published.
        message: String,
    },

    /// Remove a subscription.
    UnsubscribeSnsTopic {
        /// Subscription ARN to remove.
        subscription_arn: String,
    },

    /// Delete a topic and its subscriptions.
    DeleteSnsTopic {
        /// SNS topic ARN to delete.
        topic_arn: String,
    },
}

/// Run one sns operation against `api`.
pub(crate) fn run<N: NotificationService + ?Sized>(
    api: &N,
    command: &SnsCommand,
    out: &mut dyn Write,
    json: bool,
) -> Result<()> {
    match command {
        SnsCommand::CreateSnsTopic { topic_name } => {
            let arn = notify::create_sns_topic(api, topic_name)
                .with_context(|| format!("Failed to create topic {topic_name}"))?;
            if json {
                return write_json(out, &serde_json::json!({ "topic_arn": arn }));
            }
            writeln!(out, "{arn}")?;
        },

        SnsCommand::ListSnsTopics { next_token } => {
            let page = notify::list_sns_topics(api, next_token.as_deref())?;
            if json {
                return write_json(
                    out,
                    &serde_json::json!({ "topics": page.items, "next_token": page.next_token }),
                );
            }
            for topic in &page.items {
                writeln!(out, "{}", topic.arn)?;
            }
            write_next_token(out, page.next_token.as_deref())?;
        },

        SnsCommand::ListSnsSubscriptions { next_token } => {
            let page = notify::list_sns_subscriptions(api, next_token.as_deref())?;
            if json {
                return write_json(
                    out,
                    &serde_json::json!({
                        "subscriptions": page.items,
                        "next_token": page.next_token,
                    }),
                );
            }
            for sub in &page.items {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    sub.arn, sub.protocol, sub.endpoint, sub.topic_arn
                )?;
            }
            write_next_token(out, page.next_token.as_deref())?;
        },

        SnsCommand::SubscribeSnsTopic {
            topic_arn,
            mobile_number,
        } => {
            let receipt = notify::subscribe_sns_topic(api, topic_arn, mobile_number)
                .with_context(|| format!("Failed to subscribe to {topic_arn}"))?;
            if json {
                return write_json(out, &receipt);
            }
            writeln!(out, "{}", receipt.subscription_arn)?;
        },

        SnsCommand::SendSnsMessage { topic_arn, message } => {
            let receipt = notify::send_sns_message(api, topic_arn, message)
                .with_context(|| format!("Failed to publish to {topic_arn}"))?;
            if json {
                return write_json(out, &receipt);
            }
            writeln!(out, "MessageId: {}", receipt.message_id)?;
            if let Some(seq) = &receipt.sequence_number {
                writeln!(out, "SequenceNumber: {seq}")?;
            }
        },

        SnsCommand::UnsubscribeSnsTopic { subscription_arn } => {
            notify::unsubscribe_sns_topic(api, subscription_arn)
                .with_context(|| format!("Failed to unsubscribe {subscription_arn}"))?;
            if json {
                return write_json(
                    out,
                    &serde_json::json!({ "subscription_arn": subscription_arn }),
                );
            }
        },

        SnsCommand::DeleteSnsTopic { topic_arn } => {
            notify::delete_sns_topic(api, topic_arn)
                .with_context(|| format!("Failed to delete topic {topic_arn}"))?;
            if json {
                return write_json(out, &serde_json::json!({ "topic_arn": topic_arn }));
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::output_string;
    use awsmgr::notify::InMemoryNotifications;

    fn run_text(api: &InMemoryNotifications, command: &SnsCommand) -> String {
        let mut buf = Vec::new();
        run(api, command, &mut buf, false).unwrap();
        output_string(buf)
    }

    #[test]
    fn test_create_then_list_topics() {
        let api = InMemoryNotifications::new();
        let arn = run_text(
            &api,
            &SnsCommand::CreateSnsTopic {
                topic_name: "alerts".into(),
            },
        );
        let listed = run_text(&api, &SnsCommand::ListSnsTopics { next_token: None });
        assert_eq!(listed, arn);
    }

    #[test]
    fn test_send_message_prints_message_id() {
        let api = InMemoryNotifications::new();
        let arn = api.create_topic("alerts").unwrap();
        let text = run_text(
            &api,
            &SnsCommand::SendSnsMessage {
                topic_arn: arn.clone(),
                message: "hi".into(),
            },
        );
        assert!(text.starts_with("MessageId: "));
        assert_eq!(api.published(&arn), vec!["hi".to_string()]);
    }

    #[test]
    fn test_send_message_json_has_message_id() {
        let api = InMemoryNotifications::new();
        let arn = api.create_topic("alerts").unwrap();
        let mut buf = Vec::new();
        run(
            &api,
            &SnsCommand::SendSnsMessage {
                topic_arn: arn,
                message: "hi".into(),
            },
            &mut buf,
            true,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert!(value["data"]["message_id"].is_string());
    }

    #[test]
    fn test_subscribe_and_list_subscriptions() {
        let api = InMemoryNotifications::new();
        let arn = api.create_topic("alerts").unwrap();
        let sub_arn = run_text(
            &api,
            &SnsCommand::SubscribeSnsTopic {
                topic_arn: arn.clone(),
                mobile_number: "+15555550100".into(),
            },
        );
        let listed = run_text(&api, &SnsCommand::ListSnsSubscriptions { next_token: None });
        assert_eq!(
            listed,
            format!("{}\tsms\t+15555550100\t{arn}\n", sub_arn.trim_end())
        );
    }

    #[test]
    fn test_delete_topic_prints_nothing() {
        let api = InMemoryNotifications::new();
        let arn = api.create_topic("alerts").unwrap();
        let text = run_text(&api, &SnsCommand::DeleteSnsTopic { topic_arn: arn });
        assert!(text.is_empty());
        assert!(run_text(&api, &SnsCommand::ListSnsTopics { next_token: None }).is_empty());
    }

    #[test]
    fn test_publish_unknown_topic_fails() {
        let api = InMemoryNotifications::new();
        let mut buf = Vec::new();
        let err = run(
            &api,
            &SnsCommand::SendSnsMessage {
                topic_arn: "arn:aws:sns:local:000000000000:none".into(),
                message: "x".into(),
            },
            &mut buf,
            false,
        )
        .unwrap_err();
        assert!(err.downcast_ref::<awsmgr::Error>().is_some_and(awsmgr::Error::is_remote));
    }
}
