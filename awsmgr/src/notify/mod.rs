//! Topics, SMS subscriptions and publishing.
//!
//! Every operation is a single call through a [`NotificationService`]
//! backend. Listings return one [`Page`] and surface the continuation token
//! unchanged; nothing here follows tokens on its own.

pub mod memory;
#[cfg(feature = "aws")]
pub mod sns;

use crate::error::Result;
use crate::page::Page;
use log::{debug, info};

pub use memory::InMemoryNotifications;
#[cfg(feature = "aws")]
pub use sns::SnsNotifications;

/// Protocol used for mobile-number subscriptions.
pub const SMS_PROTOCOL: &str = "sms";

/// A topic, identified by its ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Topic {
    /// Topic ARN.
    pub arn: String,
}

/// An endpoint registered to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Subscription {
    /// Subscription ARN (`PendingConfirmation` until confirmed).
    pub arn: String,
    /// Owning account.
    pub owner: Option<String>,
    /// Delivery protocol, e.g. `sms`.
    pub protocol: String,
    /// Endpoint, e.g. a phone number.
    pub endpoint: String,
    /// Topic the subscription belongs to.
    pub topic_arn: String,
}

/// What the service returns for a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PublishReceipt {
    /// Service-assigned message id.
    pub message_id: String,
    /// Sequence number, FIFO topics only.
    pub sequence_number: Option<String>,
}

/// What the service returns for a subscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SubscribeReceipt {
    /// ARN of the new subscription.
    pub subscription_arn: String,
}

/// Backend for the notification service.
///
/// Implementations:
///
/// - [`SnsNotifications`]: the AWS SDK (feature `aws`)
/// - [`InMemoryNotifications`]: in-process fake for tests and dry runs
pub trait NotificationService {
    /// Create (or look up) a topic by name; returns its ARN.
    fn create_topic(&self, name: &str) -> Result<String>;

    /// One page of topics.
    fn list_topics(&self, next_token: Option<&str>) -> Result<Page<Topic>>;

    /// One page of subscriptions across all topics.
    fn list_subscriptions(&self, next_token: Option<&str>) -> Result<Page<Subscription>>;

    /// Register `endpoint` for `protocol` on a topic.
    fn subscribe(&self, topic_arn: &str, protocol: &str, endpoint: &str)
    -> Result<SubscribeReceipt>;

    /// Publish a message to a topic.
    fn publish(&self, topic_arn: &str, message: &str) -> Result<PublishReceipt>;

    /// Remove a subscription.
    fn unsubscribe(&self, subscription_arn: &str) -> Result<()>;

    /// Delete a topic and its subscriptions.
    fn delete_topic(&self, topic_arn: &str) -> Result<()>;
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Create a topic; returns its ARN.
pub fn create_sns_topic<N: NotificationService + ?Sized>(api: &N, name: &str) -> Result<String> {
    let arn = api.create_topic(name)?;
    info!("Created topic {arn}");
    Ok(arn)
}

/// One page of topics.
pub fn list_sns_topics<N: NotificationService + ?Sized>(
    api: &N,
    next_token: Option<&str>,
) -> Result<Page<Topic>> {
    api.list_topics(non_empty(next_token))
}

/// One page of subscriptions.
pub fn list_sns_subscriptions<N: NotificationService + ?Sized>(
    api: &N,
    next_token: Option<&str>,
) -> Result<Page<Subscription>> {
    api.list_subscriptions(non_empty(next_token))
}

/// Subscribe a mobile number to a topic over SMS.
pub fn subscribe_sns_topic<N: NotificationService + ?Sized>(
    api: &N,
    topic_arn: &str,
    mobile_number: &str,
) -> Result<SubscribeReceipt> {
    let receipt = api.subscribe(topic_arn, SMS_PROTOCOL, mobile_number)?;
    debug!("Subscribed {mobile_number} as {}", receipt.subscription_arn);
    Ok(receipt)
}

/// Publish a message to a topic.
pub fn send_sns_message<N: NotificationService + ?Sized>(
    api: &N,
    topic_arn: &str,
    message: &str,
) -> Result<PublishReceipt> {
    let receipt = api.publish(topic_arn, message)?;
    debug!("Published message {} to {topic_arn}", receipt.message_id);
    Ok(receipt)
}

/// Remove a subscription.
pub fn unsubscribe_sns_topic<N: NotificationService + ?Sized>(
    api: &N,
    subscription_arn: &str,
) -> Result<()> {
    api.unsubscribe(subscription_arn)
}

/// Delete a topic and, with it, its subscriptions.
pub fn delete_sns_topic<N: NotificationService + ?Sized>(api: &N, topic_arn: &str) -> Result<()> {
    api.delete_topic(topic_arn)?;
    info!("Deleted topic {topic_arn}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_arns(api: &InMemoryNotifications) -> Vec<String> {
        list_sns_topics(api, None)
            .unwrap()
            .items
            .into_iter()
            .map(|t| t.arn)
            .collect()
    }

    #[test]
    fn test_topic_round_trip() {
        let api = InMemoryNotifications::new();
        let arn = create_sns_topic(&api, "alerts").unwrap();
        assert!(arn.ends_with(":alerts"));
        assert!(topic_arns(&api).contains(&arn));

        delete_sns_topic(&api, &arn).unwrap();
        assert!(!topic_arns(&api).contains(&arn));
    }

    #[test]
    fn test_create_topic_is_idempotent() {
        let api = InMemoryNotifications::new();
        let first = create_sns_topic(&api, "alerts").unwrap();
        let second = create_sns_topic(&api, "alerts").unwrap();
        assert_eq!(first, second);
        assert_eq!(topic_arns(&api).len(), 1);
    }

    #[test]
    fn test_empty_arguments_are_left_to_the_service() {
        let api = InMemoryNotifications::new();
        let err = create_sns_topic(&api, "").unwrap_err();
        assert!(err.is_remote());
        assert_eq!(err.code(), Some("InvalidParameter"));

        let err = send_sns_message(&api, "", "hello").unwrap_err();
        assert!(err.is_remote());
        let err = unsubscribe_sns_topic(&api, "").unwrap_err();
        assert!(err.is_remote());
    }

    #[test]
    fn test_publish_returns_message_id() {
        let api = InMemoryNotifications::new();
        let arn = create_sns_topic(&api, "alerts").unwrap();
        let receipt = send_sns_message(&api, &arn, "disk full").unwrap();
        assert!(!receipt.message_id.is_empty());
        assert!(receipt.sequence_number.is_none());
        assert_eq!(api.published(&arn), vec!["disk full".to_string()]);
    }

    #[test]
    fn test_publish_to_fifo_topic_has_sequence_number() {
        let api = InMemoryNotifications::new();
        let arn = create_sns_topic(&api, "orders.fifo").unwrap();
        let receipt = send_sns_message(&api, &arn, "o-1").unwrap();
        assert!(receipt.sequence_number.is_some());
    }

    #[test]
    fn test_publish_to_unknown_topic_is_remote_error() {
        let api = InMemoryNotifications::new();
        let err = send_sns_message(&api, "arn:aws:sns:local:000000000000:nope", "x").unwrap_err();
        assert_eq!(err.code(), Some("NotFound"));
    }

    #[test]
    fn test_subscribe_uses_sms_protocol() {
        let api = InMemoryNotifications::new();
        let arn = create_sns_topic(&api, "alerts").unwrap();
        let receipt = subscribe_sns_topic(&api, &arn, "+15555550100").unwrap();

        let subs = list_sns_subscriptions(&api, None).unwrap().items;
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].arn, receipt.subscription_arn);
        assert_eq!(subs[0].protocol, SMS_PROTOCOL);
        assert_eq!(subs[0].endpoint, "+15555550100");
        assert_eq!(subs[0].topic_arn, arn);
    }

    #[test]
    fn test_unsubscribe_removes_subscription() {
        let api = InMemoryNotifications::new();
        let arn = create_sns_topic(&api, "alerts").unwrap();
        let receipt = subscribe_sns_topic(&api, &arn, "+15555550100").unwrap();

        unsubscribe_sns_topic(&api, &receipt.subscription_arn).unwrap();
        assert!(list_sns_subscriptions(&api, None).unwrap().items.is_empty());
    }

    #[test]
    fn test_delete_topic_drops_its_subscriptions() {
        let api = InMemoryNotifications::new();
        let keep = create_sns_topic(&api, "keep").unwrap();
        let drop = create_sns_topic(&api, "drop").unwrap();
        subscribe_sns_topic(&api, &keep, "+15555550100").unwrap();
        subscribe_sns_topic(&api, &drop, "+15555550101").unwrap();

        delete_sns_topic(&api, &drop).unwrap();
        let subs = list_sns_subscriptions(&api, None).unwrap().items;
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].topic_arn, keep);
    }

    #[test]
    fn test_list_topics_token_passthrough() {
        let api = InMemoryNotifications::new().with_page_size(2);
        for name in ["a", "b", "c"] {
            create_sns_topic(&api, name).unwrap();
        }
        let first = list_sns_topics(&api, None).unwrap();
        assert_eq!(first.items.len(), 2);
        let token = first.next_token.clone().unwrap();

        let second = list_sns_topics(&api, Some(&token)).unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(!second.has_more());
        assert_eq!(api.last_token().as_deref(), Some(token.as_str()));
    }

    #[test]
    fn test_list_topics_empty_token_is_none() {
        let api = InMemoryNotifications::new();
        list_sns_topics(&api, Some("")).unwrap();
        assert!(api.last_token().is_none());
    }
}
