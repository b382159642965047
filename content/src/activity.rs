//! Admin activity audit trail.
//!
//! Fire-and-forget: one record per admin action, written from a spawned
//! task. Failures are logged and swallowed; the trail is best effort and
//! never load-bearing.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::error::ContentError;
use crate::keys;
use crate::model::ActivityRecord;

/// Appends an activity record without blocking the caller. The document id
/// is `{millis}-{userId}`.
pub fn log_activity(
    store: Arc<dyn store::DocumentStore>,
    user_id: impl Into<String>,
    action: impl Into<String>,
    details: impl Into<String>,
) {
    let record = ActivityRecord {
        user_id: user_id.into(),
        action: action.into(),
        details: details.into(),
        timestamp: Utc::now(),
    };
    tokio::spawn(async move {
        if let Err(err) = append(store.as_ref(), &record).await {
            warn!(action = %record.action, error = %err, "activity log write failed");
        }
    });
}

async fn append(
    store: &dyn store::DocumentStore,
    record: &ActivityRecord,
) -> Result<(), ContentError> {
    let id = format!("{}-{}", record.timestamp.timestamp_millis(), record.user_id);
    store
        .put(keys::ADMIN_ACTIVITY, &id, serde_json::to_value(record)?)
        .await?;
    Ok(())
}

/// Recent activity, newest first.
pub async fn recent_activity(
    store: &dyn store::DocumentStore,
    limit: usize,
) -> Result<Vec<ActivityRecord>, ContentError> {
    let mut records: Vec<ActivityRecord> = store
        .list(keys::ADMIN_ACTIVITY)
        .await?
        .into_iter()
        .filter_map(|(_, doc)| serde_json::from_value(doc).ok())
        .collect();
    records.sort_by_key(|r| std::cmp::Reverse(r.timestamp));
    records.truncate(limit);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{DocumentStore, MemoryStore};

    #[tokio::test]
    async fn record_lands_with_derived_id() {
        let store = Arc::new(MemoryStore::new());

        log_activity(store.clone(), "admin@example.com", "save", "hero updated");
        // Fire-and-forget: give the spawned write a chance to land.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let records = recent_activity(store.as_ref(), 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "save");

        let listed = store.list(keys::ADMIN_ACTIVITY).await.unwrap();
        assert!(listed[0].0.ends_with("-admin@example.com"));
    }

    #[tokio::test]
    async fn recent_activity_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let record = ActivityRecord {
                user_id: "admin".into(),
                action: format!("a{i}"),
                details: String::new(),
                timestamp: Utc::now() + chrono::Duration::seconds(i),
            };
            append(&store, &record).await.unwrap();
        }

        let records = recent_activity(&store, 3).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].action, "a4");
    }
}
