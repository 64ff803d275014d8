//! ---
//! mops_section: "06-security-access-control"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Access policy, identity, and activity auditing."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
//! Role-based access policy.
//!
//! The permission table is static configuration: it is compiled once into a
//! `resource -> action -> roles` lookup and never mutated afterwards. Every
//! lookup that misses denies, including for [`Role::SuperAdmin`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

/// Closed set of dashboard roles.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// Full platform operator, including site management.
    SuperAdmin,
    /// Tenant administrator.
    Admin,
    /// Leads the sales team.
    SalesManager,
    /// Works assigned leads.
    SalesPerson,
    /// Leads the SEO/content team.
    SeoManager,
    /// Edits SEO metadata and blogs.
    SeoPerson,
    /// Paying customer with read access to their own leads.
    Client,
}

impl Role {
    /// Parse a role name. Unknown names yield `None`, which the policy treats as
    /// holding no permissions.
    pub fn parse(name: &str) -> Option<Self> {
        name.trim().to_ascii_lowercase().parse().ok()
    }

    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::SalesManager => "sales_manager",
            Role::SalesPerson => "sales_person",
            Role::SeoManager => "seo_manager",
            Role::SeoPerson => "seo_person",
            Role::Client => "client",
        }
    }

    /// Whether the role receives "all admins" notifications.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}

/// Operation class a rule grants.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    /// View a resource.
    Read,
    /// Create or modify a resource.
    Write,
    /// Remove a resource.
    Delete,
}

impl Action {
    /// Parse an action name; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        name.trim().to_ascii_lowercase().parse().ok()
    }
}

/// One row of the permission table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Resource identifier (e.g. `leads`, `users`).
    pub resource: String,
    /// Action the rule covers.
    pub action: Action,
    /// Roles allowed to perform the action.
    pub roles: BTreeSet<Role>,
}

impl PermissionRule {
    /// Construct a rule from a role slice.
    pub fn new(resource: impl Into<String>, action: Action, roles: &[Role]) -> Self {
        Self {
            resource: resource.into(),
            action,
            roles: roles.iter().copied().collect(),
        }
    }
}

/// Errors raised while loading a policy file. Evaluation itself never fails.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A rule names a role outside the closed set.
    #[error("rule for '{resource}' references unknown role '{role}'")]
    UnknownRole {
        /// Resource of the offending rule.
        resource: String,
        /// Unrecognised role name.
        role: String,
    },
    /// A rule names an action other than read/write/delete.
    #[error("rule for '{resource}' references unknown action '{action}'")]
    UnknownAction {
        /// Resource of the offending rule.
        resource: String,
        /// Unrecognised action name.
        action: String,
    },
    /// A rule has an empty resource identifier.
    #[error("rule #{0} has an empty resource")]
    EmptyResource(usize),
    /// Policy file could not be read.
    #[error("unable to read policy file: {0}")]
    Io(#[from] std::io::Error),
    /// Policy file is not valid TOML.
    #[error("unable to parse policy file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    resource: String,
    action: String,
    #[serde(default)]
    roles: Vec<String>,
}

use Role::*;

const ALL_ROLES: &[Role] = &[
    SuperAdmin,
    Admin,
    SalesManager,
    SalesPerson,
    SeoManager,
    SeoPerson,
    Client,
];
const CONTENT_TEAM: &[Role] = &[SuperAdmin, Admin, SeoManager, SeoPerson];
const CONTENT_LEADS: &[Role] = &[SuperAdmin, Admin, SeoManager];
const ADMINS: &[Role] = &[SuperAdmin, Admin];

/// Built-in permission table mirroring the dashboard's menus and mutation gates.
const BUILTIN_RULES: &[(&str, Action, &[Role])] = &[
    ("dashboard", Action::Read, ALL_ROLES),
    (
        "leads",
        Action::Read,
        &[SuperAdmin, Admin, SalesManager, SalesPerson, Client],
    ),
    (
        "leads",
        Action::Write,
        &[SuperAdmin, Admin, SalesManager, SalesPerson],
    ),
    ("leads", Action::Delete, &[SuperAdmin, Admin, SalesManager]),
    ("seo", Action::Read, CONTENT_TEAM),
    ("seo", Action::Write, CONTENT_TEAM),
    ("seo", Action::Delete, CONTENT_LEADS),
    ("blogs", Action::Read, CONTENT_TEAM),
    ("blogs", Action::Write, CONTENT_TEAM),
    ("blogs", Action::Delete, CONTENT_LEADS),
    ("sites", Action::Read, &[SuperAdmin]),
    ("sites", Action::Write, &[SuperAdmin]),
    ("sites", Action::Delete, &[SuperAdmin]),
    ("ip_security", Action::Read, ADMINS),
    ("ip_security", Action::Write, ADMINS),
    ("ip_security", Action::Delete, ADMINS),
    ("subscription", Action::Read, &[Client]),
    ("subscription", Action::Write, ADMINS),
    ("users", Action::Read, ADMINS),
    ("users", Action::Write, ADMINS),
    ("users", Action::Delete, ADMINS),
    ("permissions", Action::Read, &[SuperAdmin]),
    ("permissions", Action::Write, &[SuperAdmin]),
    (
        "activity",
        Action::Read,
        &[SuperAdmin, Admin, SalesManager, SeoManager],
    ),
];

/// Compiled permission table.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    grants: HashMap<String, HashMap<Action, HashSet<Role>>>,
}

impl AccessPolicy {
    /// Compile a rule list. Rules for the same `(resource, action)` pair union their roles.
    pub fn from_rules<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = PermissionRule>,
    {
        let mut grants: HashMap<String, HashMap<Action, HashSet<Role>>> = HashMap::new();
        for rule in rules {
            grants
                .entry(rule.resource)
                .or_default()
                .entry(rule.action)
                .or_default()
                .extend(rule.roles);
        }
        Self { grants }
    }

    /// The built-in dashboard table.
    pub fn builtin() -> Self {
        Self::from_rules(
            BUILTIN_RULES
                .iter()
                .map(|(resource, action, roles)| PermissionRule::new(*resource, *action, roles)),
        )
    }

    /// Parse a TOML policy document of `[[rules]]` tables.
    ///
    /// Unknown role or action names are rejected rather than skipped so that a
    /// typo cannot silently drop a grant.
    pub fn from_toml_str(contents: &str) -> Result<Self, PolicyError> {
        let document: PolicyDocument = toml::from_str(contents)?;
        let mut rules = Vec::with_capacity(document.rules.len());
        for (index, raw) in document.rules.into_iter().enumerate() {
            let resource = raw.resource.trim().to_owned();
            if resource.is_empty() {
                return Err(PolicyError::EmptyResource(index));
            }
            let action = Action::parse(&raw.action).ok_or_else(|| PolicyError::UnknownAction {
                resource: resource.clone(),
                action: raw.action.clone(),
            })?;
            let mut roles = BTreeSet::new();
            for name in &raw.roles {
                let role = Role::parse(name).ok_or_else(|| PolicyError::UnknownRole {
                    resource: resource.clone(),
                    role: name.clone(),
                })?;
                roles.insert(role);
            }
            rules.push(PermissionRule {
                resource,
                action,
                roles,
            });
        }
        Ok(Self::from_rules(rules))
    }

    /// Load a TOML policy document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Whether `role` may perform `action` on `resource`. Misses deny.
    pub fn can(&self, role: Role, resource: &str, action: Action) -> bool {
        self.grants
            .get(resource)
            .and_then(|actions| actions.get(&action))
            .is_some_and(|roles| roles.contains(&role))
    }

    /// Like [`AccessPolicy::can`] for an optional role; `None` never has permissions.
    pub fn can_opt(&self, role: Option<Role>, resource: &str, action: Action) -> bool {
        role.is_some_and(|role| self.can(role, resource, action))
    }

    /// String-typed check used at untyped boundaries (CLI, claims).
    /// Unrecognised roles or actions deny.
    pub fn can_str(&self, role: &str, resource: &str, action: &str) -> bool {
        match Action::parse(action) {
            Some(action) => self.can_opt(Role::parse(role), resource, action),
            None => false,
        }
    }

    /// Roles configured for a pair, if any rule exists.
    pub fn allowed_roles(&self, resource: &str, action: Action) -> Option<&HashSet<Role>> {
        self.grants
            .get(resource)
            .and_then(|actions| actions.get(&action))
    }

    /// Sorted `(resource, action)` pairs granted to `role`.
    pub fn grants_for(&self, role: Role) -> Vec<(String, Action)> {
        let mut pairs: Vec<(String, Action)> = self
            .grants
            .iter()
            .flat_map(|(resource, actions)| {
                actions
                    .iter()
                    .filter(|(_, roles)| roles.contains(&role))
                    .map(move |(action, _)| (resource.clone(), *action))
            })
            .collect();
        pairs.sort();
        pairs
    }

    /// The compiled table flattened back into sorted rules.
    pub fn rules(&self) -> Vec<PermissionRule> {
        let mut rules: Vec<PermissionRule> = self
            .grants
            .iter()
            .flat_map(|(resource, actions)| {
                actions.iter().map(move |(action, roles)| PermissionRule {
                    resource: resource.clone(),
                    action: *action,
                    roles: roles.iter().copied().collect(),
                })
            })
            .collect();
        rules.sort_by(|a, b| (&a.resource, a.action).cmp(&(&b.resource, b.action)));
        rules
    }

    /// Number of configured `(resource, action)` pairs.
    pub fn len(&self) -> usize {
        self.grants.values().map(HashMap::len).sum()
    }

    /// Whether no rules are configured (everything denies).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
