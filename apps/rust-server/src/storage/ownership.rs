// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership checks shared by the access engine and the repositories.

/// Trait for resources that have an owner.
pub trait OwnedResource {
    /// Get the owner's principal id.
    fn owner_user_id(&self) -> &str;

    fn is_owned_by(&self, principal_id: &str) -> bool {
        self.owner_user_id() == principal_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestResource {
        owner: String,
    }

    impl OwnedResource for TestResource {
        fn owner_user_id(&self) -> &str {
            &self.owner
        }
    }

    fn resource(owner: &str) -> TestResource {
        TestResource {
            owner: owner.to_string(),
        }
    }

    #[test]
    fn owner_matches() {
        assert!(resource("user_123").is_owned_by("user_123"));
    }

    #[test]
    fn non_owner_does_not_match() {
        assert!(!resource("user_123").is_owned_by("user_456"));
        assert!(!resource("user_123").is_owned_by(""));
    }
}
