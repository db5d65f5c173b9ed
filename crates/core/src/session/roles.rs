use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Reviewer,
    User,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    EditAnswers,
    RequestApproval,
    ReviewApprovals,
    ViewReports,
    ManageProcesses,
    ManageUsers,
}

impl Role {
    /// Resolves the free-text role delivered at sign-in. Unknown roles get the
    /// least privileged role.
    pub fn resolve(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        let normalized = normalized.strip_prefix("role_").unwrap_or(&normalized);

        match normalized {
            "admin" | "administrator" | "administrador" | "superadmin" => Self::Admin,
            "reviewer" | "revisor" | "approver" | "aprobador" | "auditor" => Self::Reviewer,
            _ => Self::User,
        }
    }

    pub fn capabilities(self) -> CapabilitySet {
        use Capability::*;

        let granted: &[Capability] = match self {
            Self::Admin => &[
                EditAnswers,
                RequestApproval,
                ReviewApprovals,
                ViewReports,
                ManageProcesses,
                ManageUsers,
            ],
            Self::Reviewer => &[ReviewApprovals, ViewReports],
            Self::User => &[EditAnswers, RequestApproval, ViewReports],
        };
        CapabilitySet(granted.iter().copied().collect())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Reviewer => "reviewer",
            Self::User => "user",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn allows(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::{Capability, Role};

    #[test]
    fn role_aliases_resolve_case_insensitively() {
        assert_eq!(Role::resolve("ADMINISTRADOR"), Role::Admin);
        assert_eq!(Role::resolve(" ROLE_ADMIN "), Role::Admin);
        assert_eq!(Role::resolve("Aprobador"), Role::Reviewer);
        assert_eq!(Role::resolve("reviewer"), Role::Reviewer);
        assert_eq!(Role::resolve("usuario"), Role::User);
        assert_eq!(Role::resolve("something-new"), Role::User);
    }

    #[test]
    fn capability_sets_follow_role() {
        let reviewer = Role::Reviewer.capabilities();
        assert!(reviewer.allows(Capability::ReviewApprovals));
        assert!(!reviewer.allows(Capability::EditAnswers));

        let user = Role::User.capabilities();
        assert!(user.allows(Capability::RequestApproval));
        assert!(!user.allows(Capability::ReviewApprovals));
        assert!(!user.allows(Capability::ManageUsers));

        assert_eq!(Role::Admin.capabilities().iter().count(), 6);
    }
}
