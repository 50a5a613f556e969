use std::sync::Arc;

use super::*;
use crate::storage::MemoryStorage;

// =============================================================================
// Role basics
// =============================================================================

#[test]
fn role_slugs() {
    assert_eq!(Role::User.slug(), "user");
    assert_eq!(Role::Admin.slug(), "admin");
}

#[test]
fn role_header_values() {
    assert_eq!(Role::User.header_value(), "USER");
    assert_eq!(Role::Admin.header_value(), "ADMIN");
}

#[test]
fn role_other_flips() {
    assert_eq!(Role::User.other(), Role::Admin);
    assert_eq!(Role::Admin.other(), Role::User);
}

#[test]
fn role_login_paths_differ() {
    assert_eq!(Role::User.login_path(), "/login");
    assert_eq!(Role::Admin.login_path(), "/admin/login");
}

#[test]
fn role_parse_case_insensitive() {
    assert_eq!("USER".parse::<Role>(), Ok(Role::User));
    assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
    assert_eq!(" Admin ".parse::<Role>(), Ok(Role::Admin));
}

#[test]
fn role_parse_rejects_unknown() {
    assert!("moderator".parse::<Role>().is_err());
    assert!("".parse::<Role>().is_err());
}

#[test]
fn role_serde_uppercase() {
    assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
    let role: Role = serde_json::from_str("\"USER\"").unwrap();
    assert_eq!(role, Role::User);
}

// =============================================================================
// PerRole
// =============================================================================

#[test]
fn per_role_get_and_get_mut() {
    let mut pair = PerRole { user: 1, admin: 2 };
    assert_eq!(*pair.get(Role::User), 1);
    *pair.get_mut(Role::Admin) = 7;
    assert_eq!(*pair.get(Role::Admin), 7);
}

// =============================================================================
// role_for_path
// =============================================================================

#[test]
fn path_admin_prefix_maps_to_admin() {
    assert_eq!(role_for_path("/admin/shelters"), Some(Role::Admin));
    assert_eq!(role_for_path("/admin"), Some(Role::Admin));
}

#[test]
fn path_user_prefix_maps_to_user() {
    assert_eq!(role_for_path("/user/pets"), Some(Role::User));
}

#[test]
fn path_unscoped_maps_to_none() {
    assert_eq!(role_for_path("/pets/42"), None);
    assert_eq!(role_for_path("/"), None);
}

#[test]
fn path_prefix_requires_segment_boundary() {
    // "/username" is not under "/user".
    assert_eq!(role_for_path("/username/pets"), None);
    assert_eq!(role_for_path("/administrators"), None);
}

#[test]
fn path_query_string_ignored() {
    assert_eq!(role_for_path("/admin/pets?page=2"), Some(Role::Admin));
}

// =============================================================================
// RoleResolver
// =============================================================================

fn resolver() -> (RoleResolver, TabStore, CredentialStore) {
    let persistent: Arc<MemoryStorage> = Arc::new(MemoryStorage::new());
    let tab: Arc<MemoryStorage> = Arc::new(MemoryStorage::new());
    let creds = CredentialStore::new(persistent);
    let tab = TabStore::new(tab);
    (RoleResolver::new(creds.clone(), tab.clone()), tab, creds)
}

fn record_with_token(token: &str) -> crate::session::types::CredentialRecord {
    crate::session::types::CredentialRecord {
        access_token: token.to_owned(),
        ..Default::default()
    }
}

#[test]
fn resolver_explicit_wins_over_everything() {
    let (resolver, tab, _) = resolver();
    tab.write(Role::User);
    assert_eq!(resolver.resolve(Some(Role::Admin), "/user/pets"), Role::Admin);
}

#[test]
fn resolver_tab_marker_wins_over_path() {
    let (resolver, tab, _) = resolver();
    tab.write(Role::Admin);
    assert_eq!(resolver.resolve(None, "/user/pets"), Role::Admin);
}

#[test]
fn resolver_path_wins_over_stored_fallback() {
    let (resolver, _, creds) = resolver();
    creds.save(Role::User, &record_with_token("tok"));
    assert_eq!(resolver.resolve(None, "/admin/shelters"), Role::Admin);
}

#[test]
fn resolver_stored_fallback_prefers_user() {
    let (resolver, _, creds) = resolver();
    creds.save(Role::User, &record_with_token("u"));
    creds.save(Role::Admin, &record_with_token("a"));
    assert_eq!(resolver.resolve(None, "/pets"), Role::User);
}

#[test]
fn resolver_stored_fallback_admin_when_only_admin() {
    let (resolver, _, creds) = resolver();
    creds.save(Role::Admin, &record_with_token("a"));
    assert_eq!(resolver.resolve(None, "/pets"), Role::Admin);
}

#[test]
fn resolver_defaults_to_user() {
    let (resolver, _, _) = resolver();
    assert_eq!(resolver.resolve(None, "/pets"), Role::User);
}

#[test]
fn resolver_rewrites_tab_marker() {
    let (resolver, tab, _) = resolver();
    assert_eq!(tab.read(), None);
    resolver.resolve(None, "/admin/pets");
    assert_eq!(tab.read(), Some(Role::Admin));
    // Subsequent unscoped calls stay pinned.
    assert_eq!(resolver.resolve(None, "/pets"), Role::Admin);
}
