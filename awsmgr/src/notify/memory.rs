//! In-memory notification backend.

use super::{NotificationService, PublishReceipt, SubscribeReceipt, Subscription, Topic};
use crate::error::{Error, Result, Service};
use crate::page::{Page, paginate};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

const DEFAULT_PAGE_SIZE: usize = 100;
const ARN_PREFIX: &str = "arn:aws:sns:local:000000000000";
const OWNER: &str = "000000000000";

#[derive(Debug, Default)]
struct State {
    // topic ARN -> published messages
    topics: BTreeMap<String, Vec<String>>,
    subscriptions: Vec<Subscription>,
    next_id: u64,
    last_token: Option<String>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn not_found(operation: &'static str, what: &str) -> Error {
    Error::Remote {
        service: Service::Sns,
        operation,
        code: Some("NotFound".to_string()),
        message: format!("{what} does not exist"),
    }
}

fn invalid_parameter(operation: &'static str, message: &str) -> Error {
    Error::Remote {
        service: Service::Sns,
        operation,
        code: Some("InvalidParameter".to_string()),
        message: message.to_string(),
    }
}

/// [`NotificationService`] that keeps topics and subscriptions in memory.
#[derive(Debug)]
pub struct InMemoryNotifications {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for InMemoryNotifications {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNotifications {
    /// Empty backend.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Return at most `page_size` items per listing.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Messages published to a topic, oldest first.
    pub fn published(&self, topic_arn: &str) -> Vec<String> {
        self.state().topics.get(topic_arn).cloned().unwrap_or_default()
    }

    /// Continuation token of the most recent listing call.
    pub fn last_token(&self) -> Option<String> {
        self.state().last_token.clone()
    }
}

impl NotificationService for InMemoryNotifications {
    fn create_topic(&self, name: &str) -> Result<String> {
        if name.trim().is_empty() {
            return Err(invalid_parameter("CreateTopic", "Invalid parameter: Topic Name"));
        }
        let arn = format!("{ARN_PREFIX}:{name}");
        self.state().topics.entry(arn.clone()).or_default();
        Ok(arn)
    }

    fn list_topics(&self, next_token: Option<&str>) -> Result<Page<Topic>> {
        let mut state = self.state();
        state.last_token = next_token.map(str::to_owned);
        let topics: Vec<Topic> = state
            .topics
            .keys()
            .map(|arn| Topic { arn: arn.clone() })
            .collect();
        Ok(paginate(&topics, self.page_size, next_token))
    }

    fn list_subscriptions(&self, next_token: Option<&str>) -> Result<Page<Subscription>> {
        let mut state = self.state();
        state.last_token = next_token.map(str::to_owned);
        Ok(paginate(&state.subscriptions, self.page_size, next_token))
    }

    fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<SubscribeReceipt> {
        let mut state = self.state();
        if !state.topics.contains_key(topic_arn) {
            return Err(not_found("Subscribe", topic_arn));
        }
        let id = state.next_id();
        let arn = format!("{topic_arn}:{id:08x}-0000-4000-8000-{id:012x}");
        state.subscriptions.push(Subscription {
            arn: arn.clone(),
            owner: Some(OWNER.to_string()),
            protocol: protocol.to_string(),
            endpoint: endpoint.to_string(),
            topic_arn: topic_arn.to_string(),
        });
        Ok(SubscribeReceipt {
            subscription_arn: arn,
        })
    }

    fn publish(&self, topic_arn: &str, message: &str) -> Result<PublishReceipt> {
        let mut state = self.state();
        let id = state.next_id();
        let messages = state
            .topics
            .get_mut(topic_arn)
            .ok_or_else(|| not_found("Publish", topic_arn))?;
        messages.push(message.to_string());
        Ok(PublishReceipt {
            message_id: format!("{id:08x}-1111-4000-8000-{id:012x}"),
            sequence_number: topic_arn.ends_with(".fifo").then(|| format!("{id:020}")),
        })
    }

    fn unsubscribe(&self, subscription_arn: &str) -> Result<()> {
        let mut state = self.state();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.arn != subscription_arn);
        if state.subscriptions.len() == before {
            return Err(not_found("Unsubscribe", subscription_arn));
        }
        Ok(())
    }

    fn delete_topic(&self, topic_arn: &str) -> Result<()> {
        let mut state = self.state();
        // Deleting a missing topic succeeds on the real service too.
        state.topics.remove(topic_arn);
        state.subscriptions.retain(|s| s.topic_arn != topic_arn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_missing_topic_is_ok() {
        let api = InMemoryNotifications::new();
        api.delete_topic("arn:aws:sns:local:000000000000:ghost").unwrap();
    }

    #[test]
    fn test_subscribe_unknown_topic_fails() {
        let api = InMemoryNotifications::new();
        let err = api.subscribe("arn:nope", "sms", "+1555").unwrap_err();
        assert_eq!(err.code(), Some("NotFound"));
    }

    #[test]
    fn test_unsubscribe_unknown_fails() {
        let api = InMemoryNotifications::new();
        assert!(api.unsubscribe("arn:nope").is_err());
    }
}
