/// Permission catalog
///
/// Every guarded action maps to a dotted permission key. Each key lists the
/// roles that hold it by default. Members can be given per-key overrides
/// (`custom_permissions`) and time-boxed grants on top of that.
///
/// | Area        | Owner | Manager | Accountant | Agent |
/// |-------------|-------|---------|------------|-------|
/// | team        | all   | all but settings edit | view | members view |
/// | properties  | all   | all     | view       | all but delete |
/// | leases      | all   | all     | view       | view, create |
/// | tenants     | all   | all     | view       | all |
/// | payments    | all   | all but void | view, confirm, receipts | view |
/// | maintenance | all   | all     | none       | view, create, complete |
/// | inventory   | all   | all     | none       | all |
/// | documents   | all   | all     | view, generate | view |
/// | reports     | all   | all     | all        | none |

use serde::{Deserialize, Serialize};

use crate::models::team_member::TeamRole;

use TeamRole::{Accountant, Agent, Manager, Owner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamPermission {
    #[serde(rename = "team.settings.view")]
    TeamSettingsView,
    #[serde(rename = "team.settings.edit")]
    TeamSettingsEdit,
    #[serde(rename = "team.members.view")]
    TeamMembersView,
    #[serde(rename = "team.members.invite")]
    TeamMembersInvite,
    #[serde(rename = "team.members.edit_role")]
    TeamMembersEditRole,
    #[serde(rename = "team.members.remove")]
    TeamMembersRemove,
    #[serde(rename = "team.audit.view")]
    TeamAuditView,

    #[serde(rename = "properties.view")]
    PropertiesView,
    #[serde(rename = "properties.create")]
    PropertiesCreate,
    #[serde(rename = "properties.edit")]
    PropertiesEdit,
    #[serde(rename = "properties.delete")]
    PropertiesDelete,
    #[serde(rename = "properties.publish")]
    PropertiesPublish,

    #[serde(rename = "leases.view")]
    LeasesView,
    #[serde(rename = "leases.create")]
    LeasesCreate,
    #[serde(rename = "leases.edit")]
    LeasesEdit,
    #[serde(rename = "leases.terminate")]
    LeasesTerminate,
    #[serde(rename = "leases.delete")]
    LeasesDelete,

    #[serde(rename = "tenants.view")]
    TenantsView,
    #[serde(rename = "tenants.edit")]
    TenantsEdit,
    #[serde(rename = "tenants.contact")]
    TenantsContact,

    #[serde(rename = "payments.view")]
    PaymentsView,
    #[serde(rename = "payments.confirm")]
    PaymentsConfirm,
    #[serde(rename = "payments.void")]
    PaymentsVoid,
    #[serde(rename = "payments.receipts")]
    PaymentsReceipts,

    #[serde(rename = "maintenance.view")]
    MaintenanceView,
    #[serde(rename = "maintenance.create")]
    MaintenanceCreate,
    #[serde(rename = "maintenance.approve_quote")]
    MaintenanceApproveQuote,
    #[serde(rename = "maintenance.complete")]
    MaintenanceComplete,

    #[serde(rename = "inventory.view")]
    InventoryView,
    #[serde(rename = "inventory.create")]
    InventoryCreate,

    #[serde(rename = "documents.view")]
    DocumentsView,
    #[serde(rename = "documents.generate")]
    DocumentsGenerate,
    #[serde(rename = "documents.delete")]
    DocumentsDelete,

    #[serde(rename = "reports.view")]
    ReportsView,
    #[serde(rename = "reports.financial.view")]
    ReportsFinancialView,
    #[serde(rename = "reports.export")]
    ReportsExport,
}

impl TeamPermission {
    pub const ALL: [TeamPermission; 36] = [
        TeamPermission::TeamSettingsView,
        TeamPermission::TeamSettingsEdit,
        TeamPermission::TeamMembersView,
        TeamPermission::TeamMembersInvite,
        TeamPermission::TeamMembersEditRole,
        TeamPermission::TeamMembersRemove,
        TeamPermission::TeamAuditView,
        TeamPermission::PropertiesView,
        TeamPermission::PropertiesCreate,
        TeamPermission::PropertiesEdit,
        TeamPermission::PropertiesDelete,
        TeamPermission::PropertiesPublish,
        TeamPermission::LeasesView,
        TeamPermission::LeasesCreate,
        TeamPermission::LeasesEdit,
        TeamPermission::LeasesTerminate,
        TeamPermission::LeasesDelete,
        TeamPermission::TenantsView,
        TeamPermission::TenantsEdit,
        TeamPermission::TenantsContact,
        TeamPermission::PaymentsView,
        TeamPermission::PaymentsConfirm,
        TeamPermission::PaymentsVoid,
        TeamPermission::PaymentsReceipts,
        TeamPermission::MaintenanceView,
        TeamPermission::MaintenanceCreate,
        TeamPermission::MaintenanceApproveQuote,
        TeamPermission::MaintenanceComplete,
        TeamPermission::InventoryView,
        TeamPermission::InventoryCreate,
        TeamPermission::DocumentsView,
        TeamPermission::DocumentsGenerate,
        TeamPermission::DocumentsDelete,
        TeamPermission::ReportsView,
        TeamPermission::ReportsFinancialView,
        TeamPermission::ReportsExport,
    ];

    /// Dotted key stored in overrides and grants
    pub fn key(&self) -> &'static str {
        match self {
            TeamPermission::TeamSettingsView => "team.settings.view",
            TeamPermission::TeamSettingsEdit => "team.settings.edit",
            TeamPermission::TeamMembersView => "team.members.view",
            TeamPermission::TeamMembersInvite => "team.members.invite",
            TeamPermission::TeamMembersEditRole => "team.members.edit_role",
            TeamPermission::TeamMembersRemove => "team.members.remove",
            TeamPermission::TeamAuditView => "team.audit.view",
            TeamPermission::PropertiesView => "properties.view",
            TeamPermission::PropertiesCreate => "properties.create",
            TeamPermission::PropertiesEdit => "properties.edit",
            TeamPermission::PropertiesDelete => "properties.delete",
            TeamPermission::PropertiesPublish => "properties.publish",
            TeamPermission::LeasesView => "leases.view",
            TeamPermission::LeasesCreate => "leases.create",
            TeamPermission::LeasesEdit => "leases.edit",
            TeamPermission::LeasesTerminate => "leases.terminate",
            TeamPermission::LeasesDelete => "leases.delete",
            TeamPermission::TenantsView => "tenants.view",
            TeamPermission::TenantsEdit => "tenants.edit",
            TeamPermission::TenantsContact => "tenants.contact",
            TeamPermission::PaymentsView => "payments.view",
            TeamPermission::PaymentsConfirm => "payments.confirm",
            TeamPermission::PaymentsVoid => "payments.void",
            TeamPermission::PaymentsReceipts => "payments.receipts",
            TeamPermission::MaintenanceView => "maintenance.view",
            TeamPermission::MaintenanceCreate => "maintenance.create",
            TeamPermission::MaintenanceApproveQuote => "maintenance.approve_quote",
            TeamPermission::MaintenanceComplete => "maintenance.complete",
            TeamPermission::InventoryView => "inventory.view",
            TeamPermission::InventoryCreate => "inventory.create",
            TeamPermission::DocumentsView => "documents.view",
            TeamPermission::DocumentsGenerate => "documents.generate",
            TeamPermission::DocumentsDelete => "documents.delete",
            TeamPermission::ReportsView => "reports.view",
            TeamPermission::ReportsFinancialView => "reports.financial.view",
            TeamPermission::ReportsExport => "reports.export",
        }
    }

    /// Parses a dotted key; unknown keys are rejected
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    /// Roles holding this permission without overrides or grants
    pub fn default_roles(&self) -> &'static [TeamRole] {
        match self {
            TeamPermission::TeamSettingsView => &[Owner, Manager, Accountant],
            TeamPermission::TeamSettingsEdit => &[Owner],
            TeamPermission::TeamMembersView => &[Owner, Manager, Accountant, Agent],
            TeamPermission::TeamMembersInvite
            | TeamPermission::TeamMembersEditRole
            | TeamPermission::TeamMembersRemove
            | TeamPermission::TeamAuditView => &[Owner, Manager],

            TeamPermission::PropertiesView => &[Owner, Manager, Accountant, Agent],
            TeamPermission::PropertiesCreate
            | TeamPermission::PropertiesEdit
            | TeamPermission::PropertiesPublish => &[Owner, Manager, Agent],
            TeamPermission::PropertiesDelete => &[Owner, Manager],

            TeamPermission::LeasesView => &[Owner, Manager, Accountant, Agent],
            TeamPermission::LeasesCreate => &[Owner, Manager, Agent],
            TeamPermission::LeasesEdit
            | TeamPermission::LeasesTerminate
            | TeamPermission::LeasesDelete => &[Owner, Manager],

            TeamPermission::TenantsView => &[Owner, Manager, Accountant, Agent],
            TeamPermission::TenantsEdit | TeamPermission::TenantsContact => {
                &[Owner, Manager, Agent]
            }

            TeamPermission::PaymentsView => &[Owner, Manager, Accountant, Agent],
            TeamPermission::PaymentsConfirm | TeamPermission::PaymentsReceipts => {
                &[Owner, Manager, Accountant]
            }
            TeamPermission::PaymentsVoid => &[Owner],

            TeamPermission::MaintenanceView
            | TeamPermission::MaintenanceCreate
            | TeamPermission::MaintenanceComplete => &[Owner, Manager, Agent],
            TeamPermission::MaintenanceApproveQuote => &[Owner, Manager],

            TeamPermission::InventoryView | TeamPermission::InventoryCreate => {
                &[Owner, Manager, Agent]
            }

            TeamPermission::DocumentsView => &[Owner, Manager, Accountant, Agent],
            TeamPermission::DocumentsGenerate => &[Owner, Manager, Accountant],
            TeamPermission::DocumentsDelete => &[Owner, Manager],

            TeamPermission::ReportsView
            | TeamPermission::ReportsFinancialView
            | TeamPermission::ReportsExport => &[Owner, Manager, Accountant],
        }
    }

    pub fn is_default_for(&self, role: TeamRole) -> bool {
        self.default_roles().contains(&role)
    }
}

/// Permissions a role holds by default
pub fn role_permissions(role: TeamRole) -> Vec<TeamPermission> {
    TeamPermission::ALL
        .into_iter()
        .filter(|p| p.is_default_for(role))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_unique_and_parse_back() {
        let keys: HashSet<&str> = TeamPermission::ALL.iter().map(|p| p.key()).collect();
        assert_eq!(keys.len(), TeamPermission::ALL.len());

        for permission in TeamPermission::ALL {
            assert_eq!(TeamPermission::from_key(permission.key()), Some(permission));
        }
        assert_eq!(TeamPermission::from_key("payments.refund"), None);
    }

    #[test]
    fn test_serde_uses_dotted_key() {
        for permission in TeamPermission::ALL {
            let json = serde_json::to_string(&permission).unwrap();
            assert_eq!(json, format!("\"{}\"", permission.key()));
        }
    }

    #[test]
    fn test_owner_holds_everything() {
        assert_eq!(role_permissions(TeamRole::Owner).len(), TeamPermission::ALL.len());
    }

    #[test]
    fn test_every_permission_has_owner() {
        for permission in TeamPermission::ALL {
            assert!(permission.is_default_for(TeamRole::Owner), "{}", permission.key());
        }
    }

    #[test]
    fn test_role_boundaries() {
        assert!(TeamPermission::TeamMembersEditRole.is_default_for(TeamRole::Manager));
        assert!(!TeamPermission::TeamMembersEditRole.is_default_for(TeamRole::Agent));

        assert!(TeamPermission::PaymentsConfirm.is_default_for(TeamRole::Accountant));
        assert!(!TeamPermission::PaymentsConfirm.is_default_for(TeamRole::Agent));
        assert!(!TeamPermission::PaymentsVoid.is_default_for(TeamRole::Manager));

        assert!(TeamPermission::PropertiesCreate.is_default_for(TeamRole::Agent));
        assert!(!TeamPermission::PropertiesCreate.is_default_for(TeamRole::Accountant));
        assert!(!TeamPermission::ReportsView.is_default_for(TeamRole::Agent));
    }
}
