//! ---
//! mops_section: "06-security-access-control"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Access policy, identity, and activity auditing."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use serde::Serialize;

use crate::rbac::{AccessPolicy, Action, Role};

/// Sidebar entry gated on `read` of its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    /// Display label.
    pub name: &'static str,
    /// Route path.
    pub href: &'static str,
    /// Resource whose `read` permission reveals the entry.
    pub resource: &'static str,
}

impl MenuEntry {
    const fn new(name: &'static str, href: &'static str, resource: &'static str) -> Self {
        Self {
            name,
            href,
            resource,
        }
    }
}

/// Dashboard sidebar in display order.
pub const DEFAULT_MENU: &[MenuEntry] = &[
    MenuEntry::new("Dashboard", "/", "dashboard"),
    MenuEntry::new("Leads", "/leads", "leads"),
    MenuEntry::new("SEO Meta Tags", "/seo", "seo"),
    MenuEntry::new("Blogs", "/blogs", "blogs"),
    MenuEntry::new("Sites", "/sites", "sites"),
    MenuEntry::new("IP Security", "/ip-security", "ip_security"),
    MenuEntry::new("Subscription", "/subscription", "subscription"),
    MenuEntry::new("User Management", "/users", "users"),
    MenuEntry::new("Permissions", "/permissions", "permissions"),
    MenuEntry::new("Activity Logs", "/activity", "activity"),
];

/// Entries of `menu` the role may read, in menu order. An unknown role sees nothing.
pub fn visible_menu(
    policy: &AccessPolicy,
    role: Option<Role>,
    menu: &[MenuEntry],
) -> Vec<MenuEntry> {
    menu.iter()
        .filter(|entry| policy.can_opt(role, entry.resource, Action::Read))
        .copied()
        .collect()
}
