//! ---
//! mops_section: "01-core-functionality"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Resource controllers and dashboard wiring."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use mops_notify::Severity;

/// Collection holding user profiles; mutations there are mirrored into the
/// identity provider.
pub const PROFILES_COLLECTION: &str = "profiles";

/// Who receives the per-user notification of a create or update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// The session that performed the mutation.
    Actor,
    /// The user the record describes (its own id).
    Subject,
}

/// Ties a permission-table resource to the collection holding its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBinding {
    /// Resource name the access policy is keyed on.
    pub resource: &'static str,
    /// Backing-store collection.
    pub collection: &'static str,
    /// Singular kind used in action names (`create_<kind>`) and activity entries.
    pub kind: &'static str,
    /// Human label for notification titles.
    pub display: &'static str,
    /// Record field used to name a record in notifications.
    pub label_field: &'static str,
    /// Who gets the per-user notification.
    pub recipient: Recipient,
    /// Severity of update notifications.
    pub update_severity: Severity,
}

/// Resources managed through controllers.
pub const BUILTIN_BINDINGS: &[ResourceBinding] = &[
    ResourceBinding {
        resource: "leads",
        collection: "leads",
        kind: "lead",
        display: "Lead",
        label_field: "name",
        recipient: Recipient::Actor,
        update_severity: Severity::Success,
    },
    ResourceBinding {
        resource: "blogs",
        collection: "blogs",
        kind: "blog",
        display: "Blog",
        label_field: "title",
        recipient: Recipient::Actor,
        update_severity: Severity::Success,
    },
    ResourceBinding {
        resource: "users",
        collection: PROFILES_COLLECTION,
        kind: "user",
        display: "User",
        label_field: "username",
        recipient: Recipient::Subject,
        update_severity: Severity::Info,
    },
    ResourceBinding {
        resource: "seo",
        collection: "seo_meta",
        kind: "seo_meta",
        display: "SEO meta tag",
        label_field: "page_url",
        recipient: Recipient::Actor,
        update_severity: Severity::Success,
    },
    ResourceBinding {
        resource: "sites",
        collection: "sites",
        kind: "site",
        display: "Site",
        label_field: "name",
        recipient: Recipient::Actor,
        update_severity: Severity::Success,
    },
    ResourceBinding {
        resource: "ip_security",
        collection: "ip_rules",
        kind: "ip_rule",
        display: "IP rule",
        label_field: "ip_address",
        recipient: Recipient::Actor,
        update_severity: Severity::Success,
    },
    ResourceBinding {
        resource: "activity",
        collection: "activity_logs",
        kind: "activity",
        display: "Activity",
        label_field: "action",
        recipient: Recipient::Actor,
        update_severity: Severity::Success,
    },
];

/// Binding for `resource`, if it is managed through a controller.
pub fn binding(resource: &str) -> Option<&'static ResourceBinding> {
    BUILTIN_BINDINGS
        .iter()
        .find(|binding| binding.resource == resource)
}

impl ResourceBinding {
    /// Action name for a verb, e.g. `delete_blog`.
    pub fn action_name(&self, verb: &str) -> String {
        format!("{verb}_{}", self.kind)
    }
}
