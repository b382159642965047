//! Subscribers and contact messages.
//!
//! The subscriber id is the normalized email, and creation goes through the
//! store's atomic insert-if-absent, so two concurrent subscribe attempts
//! with the same address can no longer both land.

use chrono::Utc;
use uuid::Uuid;

use crate::error::ContentError;
use crate::keys;
use crate::model::{ContactMessage, Subscriber};

fn normalize_email(email: &str) -> Result<String, ContentError> {
    let email = email.trim().to_ascii_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(email)
    } else {
        Err(ContentError::InvalidEmail(email))
    }
}

pub async fn subscribe(
    store: &dyn store::DocumentStore,
    email: &str,
) -> Result<Subscriber, ContentError> {
    let email = normalize_email(email)?;
    let subscriber = Subscriber {
        email: email.clone(),
        created_at: Utc::now(),
        active: true,
    };

    let inserted = store
        .insert_if_absent(
            keys::SUBSCRIBERS,
            &email,
            serde_json::to_value(&subscriber)?,
        )
        .await?;
    if !inserted {
        return Err(ContentError::AlreadySubscribed);
    }
    Ok(subscriber)
}

pub async fn list_subscribers(
    store: &dyn store::DocumentStore,
) -> Result<Vec<(String, Subscriber)>, ContentError> {
    let mut subscribers: Vec<(String, Subscriber)> = store
        .list(keys::SUBSCRIBERS)
        .await?
        .into_iter()
        .filter_map(|(id, doc)| serde_json::from_value(doc).ok().map(|s| (id, s)))
        .collect();
    subscribers.sort_by_key(|(_, s): &(String, Subscriber)| std::cmp::Reverse(s.created_at));
    Ok(subscribers)
}

pub async fn unsubscribe(
    store: &dyn store::DocumentStore,
    id: &str,
) -> Result<(), ContentError> {
    store.delete(keys::SUBSCRIBERS, id).await?;
    Ok(())
}

/// Stores a contact-form submission. Delivery to the operator's inbox is
/// the external email service's job.
pub async fn store_message(
    store: &dyn store::DocumentStore,
    name: &str,
    email: &str,
    message: &str,
) -> Result<ContactMessage, ContentError> {
    let email = normalize_email(email)?;
    let record = ContactMessage {
        name: name.trim().to_string(),
        email,
        message: message.trim().to_string(),
        created_at: Utc::now(),
    };
    store
        .put(
            keys::MESSAGES,
            &Uuid::new_v4().to_string(),
            serde_json::to_value(&record)?,
        )
        .await?;
    Ok(record)
}
