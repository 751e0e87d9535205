use townsquare_core::Role;

/// Decides the role a connection receives when it joins.
///
/// The admin credential is still a display name; it is only checked once,
/// at join, and the resulting role is kept server-side.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admin_name: Option<String>,
}

impl AccessPolicy {
    pub fn new(admin_name: Option<String>) -> Self {
        Self {
            admin_name: admin_name.filter(|name| !name.is_empty()),
        }
    }

    pub fn role_for(&self, display_name: &str) -> Role {
        match &self.admin_name {
            None => Role::Admin,
            Some(admin) if admin == display_name => Role::Admin,
            Some(_) => Role::Member,
        }
    }
}
