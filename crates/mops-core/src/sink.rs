//! ---
//! mops_section: "01-core-functionality"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Resource controllers and dashboard wiring."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;
use mops_notify::{Notification, NotificationSink, NotifyError, Target};
use mops_query::{Record, RecordStore};
use mops_security::IdentityProvider;
use serde_json::{json, Value};

/// Collection notification rows are written to.
pub const NOTIFICATIONS_COLLECTION: &str = "notifications";

/// Persists notifications as unread rows, one per recipient. `AllAdmins` is
/// expanded against the identity provider at delivery time.
pub struct CollectionSink {
    store: Arc<dyn RecordStore>,
    identity: IdentityProvider,
}

impl CollectionSink {
    /// Sink writing into `store`, resolving admins through `identity`.
    pub fn new(store: Arc<dyn RecordStore>, identity: IdentityProvider) -> Self {
        Self { store, identity }
    }

    fn row(user_id: &str, notification: &Notification) -> Record {
        let value = json!({
            "user_id": user_id,
            "title": notification.title,
            "message": notification.message,
            "type": notification.severity.to_string(),
            "action_type": notification.action_type,
            "resource_type": notification.resource_type,
            "resource_id": notification.resource_id,
            "is_read": false,
            "created_at": notification.created_at.to_rfc3339(),
        });
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }
}

#[async_trait]
impl NotificationSink for CollectionSink {
    fn name(&self) -> &str {
        "collection"
    }

    async fn deliver(&self, notification: &Notification) -> mops_notify::Result<()> {
        let recipients = match &notification.target {
            Target::User(user_id) => vec![user_id.clone()],
            Target::AllAdmins => self.identity.admin_ids(),
        };
        for user_id in recipients {
            self.store
                .insert(NOTIFICATIONS_COLLECTION, Self::row(&user_id, notification))
                .await
                .map_err(|err| NotifyError::Unavailable(err.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mops_notify::Severity;
    use mops_query::MemoryStore;

    #[tokio::test]
    async fn admin_notifications_fan_out_per_admin() {
        let store = MemoryStore::new();
        let identity = IdentityProvider::new();
        let admin = identity.register("alice", None).unwrap();
        identity.register("bob", None).unwrap();
        let sink = CollectionSink::new(Arc::new(store.clone()), identity);

        let notification =
            Notification::new(Target::AllAdmins, "User deleted", "bob was deleted", "delete_user")
                .with_severity(Severity::Warning)
                .with_resource("user", "u-2");
        sink.deliver(&notification).await.unwrap();

        let rows = store.snapshot(NOTIFICATIONS_COLLECTION);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["user_id"], json!(admin.id));
        assert_eq!(rows[0]["type"], json!("warning"));
        assert_eq!(rows[0]["is_read"], json!(false));
    }
}
