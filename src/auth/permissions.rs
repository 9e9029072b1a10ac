//! Static role-to-permission table.

use crate::models::user::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ManageUsers,
    ManageStock,
    ViewStock,
    RecordMovement,
    ReverseMovement,
    ViewMovements,
    ViewReports,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::ManageUsers,
        Action::ManageStock,
        Action::ViewStock,
        Action::RecordMovement,
        Action::ReverseMovement,
        Action::ViewMovements,
        Action::ViewReports,
    ];

    pub fn describe(self) -> &'static str {
        match self {
            Action::ManageUsers => "manage users",
            Action::ManageStock => "manage stock items",
            Action::ViewStock => "view stock items",
            Action::RecordMovement => "record movements",
            Action::ReverseMovement => "reverse movements",
            Action::ViewMovements => "view movements",
            Action::ViewReports => "view reports",
        }
    }
}

impl Role {
    pub fn permits(self, action: Action) -> bool {
        match self {
            Role::Admin => true,
            Role::Employee => matches!(
                action,
                Action::ViewStock
                    | Action::RecordMovement
                    | Action::ViewMovements
                    | Action::ViewReports
            ),
        }
    }
}

pub fn authorize(role: Role, action: Action) -> bool {
    role.permits(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_may_do_everything() {
        for action in Action::ALL {
            assert!(authorize(Role::Admin, action), "{action:?}");
        }
    }

    #[test]
    fn employee_records_movements_and_views_reports_only() {
        assert!(authorize(Role::Employee, Action::RecordMovement));
        assert!(authorize(Role::Employee, Action::ViewReports));
        assert!(authorize(Role::Employee, Action::ViewStock));
        assert!(authorize(Role::Employee, Action::ViewMovements));

        assert!(!authorize(Role::Employee, Action::ManageStock));
        assert!(!authorize(Role::Employee, Action::ManageUsers));
        assert!(!authorize(Role::Employee, Action::ReverseMovement));
    }
}
