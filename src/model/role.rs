#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    SuperAdmin = 1,
    SchoolAdmin = 2,
    Teacher = 3,
    Staff = 4,
    Parent = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::SuperAdmin),
            2 => Some(Role::SchoolAdmin),
            3 => Some(Role::Teacher),
            4 => Some(Role::Staff),
            5 => Some(Role::Parent),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Platform or school administrators
    pub fn is_admin(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::SchoolAdmin)
    }
}
