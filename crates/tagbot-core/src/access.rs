use crate::domain::ChatKind;

/// Outcome of an authorization check for an admin-only action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied,
}

impl Access {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Admin-only actions are open to everyone in a private chat; in groups they
/// require a (freshly looked up) admin status.
pub fn authorize(kind: ChatKind, is_admin: bool) -> Access {
    match kind {
        ChatKind::Private => Access::Allowed,
        ChatKind::Group if is_admin => Access::Allowed,
        ChatKind::Group => Access::Denied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_chats_are_always_allowed() {
        assert_eq!(authorize(ChatKind::Private, false), Access::Allowed);
        assert_eq!(authorize(ChatKind::Private, true), Access::Allowed);
    }

    #[test]
    fn groups_require_admin() {
        assert!(authorize(ChatKind::Group, true).is_allowed());
        assert!(!authorize(ChatKind::Group, false).is_allowed());
    }
}
