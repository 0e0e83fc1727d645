//! Integration tests for Gym Access Core
//!
//! This test suite covers:
//! - User profile serialization
//! - Typed user extensions
//! - Error handling

use gym_access_core::{AccessError, PrimaryRole, RoleScope, User, UserExtension};
use serde::{Deserialize, Serialize};

mod user_tests {
    use super::*;

    #[test]
    fn test_user_json_shape() {
        let user = User::new("u1", "coach@example.com", PrimaryRole::Trainer)
            .name("Sam")
            .branch("downtown")
            .gym("g1");

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["role"], "trainer");
        assert_eq!(json["branch_id"], "downtown");
        assert!(json.get("team_role").is_none());
    }

    #[test]
    fn test_extensions_flatten_into_profile() {
        let mut user = User::new("u1", "front@example.com", PrimaryRole::Team).branch("b1");
        user.set_extension("shift", "morning");

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["shift"], "morning");

        let parsed: User = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.get_extension::<String>("shift").as_deref(), Some("morning"));
        assert_eq!(parsed.role, PrimaryRole::Team);
    }

    #[test]
    fn test_every_primary_role_parses_back() {
        for role in PrimaryRole::all() {
            assert_eq!(role.as_str().parse::<PrimaryRole>().unwrap(), *role);
        }
        assert_eq!(
            PrimaryRole::all().iter().filter(|r| r.scope() == RoleScope::Global).count(),
            2
        );
    }
}

mod extension_tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct LockerInfo {
        number: u32,
    }

    impl UserExtension for LockerInfo {
        const KEY: &'static str = "locker";

        fn from_user(user: &User) -> Option<Self> {
            user.get_extension(Self::KEY)
        }

        fn apply_to(&self, user: &mut User) {
            user.set_extension(Self::KEY, self);
        }
    }

    #[test]
    fn test_typed_extension_round_trip() {
        let mut user = User::new("u1", "member@example.com", PrimaryRole::Member).branch("b1");
        assert!(LockerInfo::from_user(&user).is_none());

        LockerInfo { number: 17 }.apply_to(&mut user);
        assert_eq!(LockerInfo::from_user(&user), Some(LockerInfo { number: 17 }));
    }

    #[test]
    fn test_malformed_extension_reads_as_none() {
        let mut user = User::new("u1", "member@example.com", PrimaryRole::Member).branch("b1");
        user.set_extension(LockerInfo::KEY, "not a locker");
        assert!(LockerInfo::from_user(&user).is_none());
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AccessError::validation("bad").status_code(), 422);
        assert_eq!(AccessError::forbidden("no").status_code(), 403);
        assert_eq!(AccessError::not_found("role", "id", "r1").status_code(), 404);
        assert_eq!(AccessError::Unauthenticated.status_code(), 401);
        assert_eq!(AccessError::duplicate("role", "name", "coach").status_code(), 409);
        assert_eq!(AccessError::database("down").status_code(), 500);
        assert_eq!(AccessError::config("bad template").status_code(), 500);
    }

    #[test]
    fn test_user_errors() {
        assert!(AccessError::validation("bad").is_user_error());
        assert!(AccessError::Unauthenticated.is_user_error());
        assert!(!AccessError::internal("boom").is_user_error());
    }

    #[test]
    fn test_messages() {
        let err = AccessError::not_found("role", "id", "r1");
        assert_eq!(err.to_string(), "Record not found: role with id=r1");

        let err: AccessError = serde_json::from_str::<User>("{").unwrap_err().into();
        assert!(matches!(err, AccessError::SerializationError { .. }));
    }

    #[test]
    fn test_validation_errors_from_user() {
        let err = User::new("", "x@example.com", PrimaryRole::SuperAdmin).validate().unwrap_err();
        assert!(matches!(err, AccessError::Validation { .. }));
    }
}
