use std::collections::{HashMap, HashSet};
use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Role;

/// A dashboard capability, written `area:action` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "dashboard:view")]
    DashboardView,
    #[serde(rename = "products:read")]
    ProductsRead,
    #[serde(rename = "products:write")]
    ProductsWrite,
    #[serde(rename = "orders:read")]
    OrdersRead,
    #[serde(rename = "orders:write")]
    OrdersWrite,
    #[serde(rename = "content:write")]
    ContentWrite,
    #[serde(rename = "blog:write")]
    BlogWrite,
    #[serde(rename = "messages:read")]
    MessagesRead,
    #[serde(rename = "seo:read")]
    SeoRead,
    #[serde(rename = "seo:write")]
    SeoWrite,
    #[serde(rename = "users:manage")]
    UsersManage,
}

impl Permission {
    pub const ALL: [Self; 11] = [
        Self::DashboardView,
        Self::ProductsRead,
        Self::ProductsWrite,
        Self::OrdersRead,
        Self::OrdersWrite,
        Self::ContentWrite,
        Self::BlogWrite,
        Self::MessagesRead,
        Self::SeoRead,
        Self::SeoWrite,
        Self::UsersManage,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DashboardView => "dashboard:view",
            Self::ProductsRead => "products:read",
            Self::ProductsWrite => "products:write",
            Self::OrdersRead => "orders:read",
            Self::OrdersWrite => "orders:write",
            Self::ContentWrite => "content:write",
            Self::BlogWrite => "blog:write",
            Self::MessagesRead => "messages:read",
            Self::SeoRead => "seo:read",
            Self::SeoWrite => "seo:write",
            Self::UsersManage => "users:manage",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission: {s}"))
    }
}

/// Immutable role to permission mapping, built once at startup.
///
/// `Admin` holds every permission regardless of the table. Roles without an
/// entry hold none.
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    grants: HashMap<Role, HashSet<Permission>>,
}

impl PermissionTable {
    /// The shop's standard grants.
    #[must_use]
    pub fn standard() -> Self {
        use Permission::{
            BlogWrite, ContentWrite, DashboardView, MessagesRead, OrdersRead, OrdersWrite,
            ProductsRead, ProductsWrite, SeoRead, SeoWrite,
        };

        Self::from_grants([
            (
                Role::Editor,
                vec![
                    DashboardView,
                    ProductsRead,
                    ProductsWrite,
                    OrdersRead,
                    OrdersWrite,
                    ContentWrite,
                    BlogWrite,
                    MessagesRead,
                ],
            ),
            (
                Role::SeoManager,
                vec![
                    DashboardView,
                    ProductsRead,
                    SeoRead,
                    SeoWrite,
                    BlogWrite,
                    ContentWrite,
                ],
            ),
        ])
    }

    pub fn from_grants(grants: impl IntoIterator<Item = (Role, Vec<Permission>)>) -> Self {
        Self {
            grants: grants
                .into_iter()
                .map(|(role, perms)| (role, perms.into_iter().collect()))
                .collect(),
        }
    }

    #[must_use]
    pub fn allows(&self, role: Role, permission: Permission) -> bool {
        role == Role::Admin
            || self
                .grants
                .get(&role)
                .is_some_and(|perms| perms.contains(&permission))
    }

    /// Permissions held by `role`, in declaration order.
    #[must_use]
    pub fn permissions_for(&self, role: Role) -> Vec<Permission> {
        Permission::ALL
            .into_iter()
            .filter(|p| self.allows(role, *p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_holds_everything() {
        let table = PermissionTable::standard();
        for perm in Permission::ALL {
            assert!(table.allows(Role::Admin, perm), "{perm}");
        }
        assert!(PermissionTable::default().allows(Role::Admin, Permission::UsersManage));
    }

    #[test]
    fn test_editor_grants() {
        let table = PermissionTable::standard();
        assert!(table.allows(Role::Editor, Permission::ProductsWrite));
        assert!(table.allows(Role::Editor, Permission::MessagesRead));
        assert!(!table.allows(Role::Editor, Permission::SeoWrite));
        assert!(!table.allows(Role::Editor, Permission::UsersManage));
    }

    #[test]
    fn test_seo_manager_grants() {
        let table = PermissionTable::standard();
        assert!(table.allows(Role::SeoManager, Permission::SeoWrite));
        assert!(table.allows(Role::SeoManager, Permission::ProductsRead));
        assert!(!table.allows(Role::SeoManager, Permission::ProductsWrite));
        assert!(!table.allows(Role::SeoManager, Permission::OrdersRead));
    }

    #[test]
    fn test_customer_and_missing_roles_hold_nothing() {
        let table = PermissionTable::standard();
        assert!(table.permissions_for(Role::Customer).is_empty());

        let sparse = PermissionTable::from_grants([(Role::Editor, vec![Permission::BlogWrite])]);
        assert!(sparse.permissions_for(Role::SeoManager).is_empty());
        assert_eq!(sparse.permissions_for(Role::Editor), vec![Permission::BlogWrite]);
    }

    #[test]
    fn test_permission_wire_names() {
        assert_eq!("seo:write".parse::<Permission>(), Ok(Permission::SeoWrite));
        assert!("seo:delete".parse::<Permission>().is_err());
        assert_eq!(
            serde_json::to_string(&Permission::DashboardView).ok().as_deref(),
            Some("\"dashboard:view\"")
        );
    }
}
