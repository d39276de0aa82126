//! SNS backend on top of `aws-sdk-sns`.

use super::{NotificationService, PublishReceipt, SubscribeReceipt, Subscription, Topic};
use crate::error::{Error, Result, Service};
use crate::page::Page;
use crate::sdk::{AwsContext, remote_error};
use aws_sdk_sns::Client;
use std::sync::Arc;

/// [`NotificationService`] backed by the SNS SDK client.
#[derive(Debug)]
pub struct SnsNotifications {
    ctx: Arc<AwsContext>,
    client: Client,
}

impl SnsNotifications {
    /// Build a client from a loaded context.
    pub fn new(ctx: Arc<AwsContext>) -> Self {
        let client = Client::new(ctx.sdk_config());
        Self { ctx, client }
    }
}

fn missing_field(operation: &'static str, field: &str) -> Error {
    Error::remote(
        Service::Sns,
        operation,
        format!("response did not include {field}"),
    )
}

impl NotificationService for SnsNotifications {
    fn create_topic(&self, name: &str) -> Result<String> {
        let output = self
            .ctx
            .block_on(self.client.create_topic().name(name).send())
            .map_err(|e| remote_error(Service::Sns, "CreateTopic", e))?;
        output
            .topic_arn()
            .map(str::to_owned)
            .ok_or_else(|| missing_field("CreateTopic", "TopicArn"))
    }

    fn list_topics(&self, next_token: Option<&str>) -> Result<Page<Topic>> {
        let output = self
            .ctx
            .block_on(
                self.client
                    .list_topics()
                    .set_next_token(next_token.map(str::to_owned))
                    .send(),
            )
            .map_err(|e| remote_error(Service::Sns, "ListTopics", e))?;

        Ok(Page {
            items: output
                .topics()
                .iter()
                .filter_map(|topic| topic.topic_arn())
                .map(|arn| Topic {
                    arn: arn.to_string(),
                })
                .collect(),
            next_token: output.next_token().map(str::to_owned),
        })
    }

    fn list_subscriptions(&self, next_token: Option<&str>) -> Result<Page<Subscription>> {
        let output = self
            .ctx
            .block_on(
                self.client
                    .list_subscriptions()
                    .set_next_token(next_token.map(str::to_owned))
                    .send(),
            )
            .map_err(|e| remote_error(Service::Sns, "ListSubscriptions", e))?;

        Ok(Page {
            items: output
                .subscriptions()
                .iter()
                .map(|sub| Subscription {
                    arn: sub.subscription_arn().unwrap_or_default().to_string(),
                    owner: sub.owner().map(str::to_owned),
                    protocol: sub.protocol().unwrap_or_default().to_string(),
                    endpoint: sub.endpoint().unwrap_or_default().to_string(),
                    topic_arn: sub.topic_arn().unwrap_or_default().to_string(),
                })
                .collect(),
            next_token: output.next_token().map(str::to_owned),
        })
    }

    fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<SubscribeReceipt> {
        let output = self
            .ctx
            .block_on(
                self.client
                    .subscribe()
                    .topic_arn(topic_arn)
                    .protocol(protocol)
                    .endpoint(endpoint)
                    .return_subscription_arn(true)
                    .send(),
            )
            .map_err(|e| remote_error(Service::Sns, "Subscribe", e))?;
        let subscription_arn = output
            .subscription_arn()
            .map(str::to_owned)
            .ok_or_else(|| missing_field("Subscribe", "SubscriptionArn"))?;
        Ok(SubscribeReceipt { subscription_arn })
    }

    fn publish(&self, topic_arn: &str, message: &str) -> Result<PublishReceipt> {
        let output = self
            .ctx
            .block_on(
                self.client
                    .publish()
                    .topic_arn(topic_arn)
                    .message(message)
                    .send(),
            )
            .map_err(|e| remote_error(Service::Sns, "Publish", e))?;
        let message_id = output
            .message_id()
            .map(str::to_owned)
            .ok_or_else(|| missing_field("Publish", "MessageId"))?;
        Ok(PublishReceipt {
            message_id,
            sequence_number: output.sequence_number().map(str::to_owned),
        })
    }

    fn unsubscribe(&self, subscription_arn: &str) -> Result<()> {
        self.ctx
            .block_on(
                self.client
                    .unsubscribe()
                    .subscription_arn(subscription_arn)
                    .send(),
            )
            .map_err(|e| remote_error(Service::Sns, "Unsubscribe", e))?;
        Ok(())
    }

    fn delete_topic(&self, topic_arn: &str) -> Result<()> {
        self.ctx
            .block_on(self.client.delete_topic().topic_arn(topic_arn).send())
            .map_err(|e| remote_error(Service::Sns, "DeleteTopic", e))?;
        Ok(())
    }
}
