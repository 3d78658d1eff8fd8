use thiserror::Error;

/// Errors that can occur within the delivery queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Nothing is subscribed to the topic, so a published message would be lost.
    #[error("No subscription for topic: {topic}")]
    NoSubscribers { topic: String },

    #[error("Subscription not found: {name}")]
    UnknownSubscription { name: String },

    /// The subscription exists but is bound to another topic.
    #[error("Subscription {name} is bound to topic {topic}")]
    TopicMismatch { name: String, topic: String },

    /// An in-process subscription can only have one active subscriber.
    #[error("Subscription already has a subscriber: {name}")]
    AlreadySubscribed { name: String },

    /// Broker temporarily unreachable.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
