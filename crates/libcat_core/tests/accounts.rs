use libcat_core::db::open_db_in_memory;
use libcat_core::{
    is_admin, is_librarian, is_member, AccountService, AccountServiceError, BookPermission,
    NewUser, Principal, RegistrationForm, Role, SqliteSessionRepository, SqliteUserRepository,
};
use libcat_core::auth::password::hash_password;
use rusqlite::Connection;

type Service<'conn> = AccountService<SqliteUserRepository<'conn>, SqliteSessionRepository<'conn>>;

fn service(conn: &Connection) -> Service<'_> {
    AccountService::new(
        SqliteUserRepository::new(conn),
        SqliteSessionRepository::new(conn),
    )
}

fn profile_count(conn: &Connection, user_id: i64) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM user_profiles WHERE user_id = ?1;",
        [user_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn new_user_gets_exactly_one_member_profile() {
    let conn = open_db_in_memory().unwrap();
    let accounts = service(&conn);

    let mut user = accounts
        .create_user(&NewUser::new("alice", "correct-horse"))
        .unwrap();
    assert_eq!(profile_count(&conn, user.id), 1);

    user.email = "alice@example.com".to_string();
    accounts.save_user(&user).unwrap();
    accounts.save_user(&user).unwrap();
    assert_eq!(profile_count(&conn, user.id), 1);

    let principal = accounts.principal_for_user(user.id).unwrap();
    assert!(is_member(&principal));
    assert!(!is_admin(&principal));
    assert!(!is_librarian(&principal));
    assert_eq!(principal.user().unwrap().email, "alice@example.com");
}

#[test]
fn password_hash_is_never_stored_in_plaintext() {
    let conn = open_db_in_memory().unwrap();
    let user = service(&conn)
        .create_user(&NewUser::new("bob", "sup3r-secret"))
        .unwrap();

    let stored: String = conn
        .query_row(
            "SELECT password_hash FROM users WHERE id = ?1;",
            [user.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_ne!(stored, "sup3r-secret");
    assert!(stored.starts_with("$argon2id$"));
}

#[test]
fn duplicate_username_is_a_form_error() {
    let conn = open_db_in_memory().unwrap();
    let accounts = service(&conn);
    accounts
        .create_user(&NewUser::new("carol", "password-one"))
        .unwrap();

    let Err(AccountServiceError::Invalid(errors)) =
        accounts.create_user(&NewUser::new("carol", "password-two"))
    else {
        panic!("expected duplicate username to fail");
    };
    assert!(errors.get("username").is_some());
}

#[test]
fn register_validates_and_starts_a_session() {
    let conn = open_db_in_memory().unwrap();
    let accounts = service(&conn);

    let mismatch = RegistrationForm {
        username: "dave".to_string(),
        email: String::new(),
        password1: "long-enough-1".to_string(),
        password2: "long-enough-2".to_string(),
    };
    let Err(AccountServiceError::Invalid(errors)) = accounts.register(&mismatch) else {
        panic!("expected mismatch to fail");
    };
    assert!(errors.get("password2").is_some());

    let numeric = RegistrationForm {
        password1: "12345678".to_string(),
        password2: "12345678".to_string(),
        ..mismatch.clone()
    };
    let Err(AccountServiceError::Invalid(errors)) = accounts.register(&numeric) else {
        panic!("expected numeric password to fail");
    };
    assert!(errors.get("password1").is_some());

    let valid = RegistrationForm {
        password2: "long-enough-1".to_string(),
        ..mismatch
    };
    let session = accounts.register(&valid).unwrap();
    assert_eq!(session.user.username, "dave");

    let principal = accounts
        .principal_for_session(Some(&session.token))
        .unwrap();
    assert!(principal.is_authenticated());
    assert!(!principal.has_perm(BookPermission::View));
}

#[test]
fn login_and_logout_round_trip() {
    let conn = open_db_in_memory().unwrap();
    let accounts = service(&conn);
    accounts
        .create_user(&NewUser::new("erin", "hunter2-but-longer"))
        .unwrap();

    assert!(matches!(
        accounts.login("erin", "wrong-password"),
        Err(AccountServiceError::InvalidCredentials)
    ));
    assert!(matches!(
        accounts.login("nobody", "hunter2-but-longer"),
        Err(AccountServiceError::InvalidCredentials)
    ));

    let session = accounts.login("erin", "hunter2-but-longer").unwrap();
    assert!(accounts
        .principal_for_session(Some(&session.token))
        .unwrap()
        .is_authenticated());

    assert!(accounts.logout(&session.token).unwrap());
    assert!(!accounts.logout(&session.token).unwrap());
    assert_eq!(
        accounts.principal_for_session(Some(&session.token)).unwrap(),
        Principal::Anonymous
    );
    assert_eq!(
        accounts.principal_for_session(None).unwrap(),
        Principal::Anonymous
    );
}

#[test]
fn inactive_user_cannot_log_in_and_loses_sessions() {
    let conn = open_db_in_memory().unwrap();
    let accounts = service(&conn);
    let mut user = accounts
        .create_user(&NewUser::new("frank", "frank-password"))
        .unwrap();
    let session = accounts.login("frank", "frank-password").unwrap();
    accounts.add_to_group(user.id, "Admins").unwrap();

    user.is_active = false;
    accounts.save_user(&user).unwrap();

    assert!(matches!(
        accounts.login("frank", "frank-password"),
        Err(AccountServiceError::InvalidCredentials)
    ));
    let principal = accounts
        .principal_for_session(Some(&session.token))
        .unwrap();
    assert!(!principal.has_perm(BookPermission::View));
}

#[test]
fn group_membership_grants_cumulative_permissions() {
    let conn = open_db_in_memory().unwrap();
    let accounts = service(&conn);
    let viewer = accounts
        .create_user(&NewUser::new("gina", "gina-password"))
        .unwrap();
    let editor = accounts
        .create_user(&NewUser::new("hank", "hank-password"))
        .unwrap();

    accounts.add_to_group(viewer.id, "Viewers").unwrap();
    accounts.add_to_group(editor.id, "Editors").unwrap();
    accounts.add_to_group(editor.id, "Editors").unwrap();

    let viewer = accounts.principal_for_user(viewer.id).unwrap();
    assert!(viewer.has_perm(BookPermission::View));
    assert!(!viewer.has_perm(BookPermission::Create));

    let editor = accounts.principal_for_user(editor.id).unwrap();
    assert!(editor.has_perm(BookPermission::Edit));
    assert!(!editor.has_perm(BookPermission::Delete));

    assert!(matches!(
        accounts.add_to_group(1, "Moderators"),
        Err(AccountServiceError::Invalid(_))
    ));
}

#[test]
fn direct_grants_and_roles_are_independent() {
    let conn = open_db_in_memory().unwrap();
    let accounts = service(&conn);
    let user = accounts
        .create_user(&NewUser::new("iris", "iris-password"))
        .unwrap();

    accounts.set_role(user.id, Role::Admin).unwrap();
    let principal = accounts.principal_for_user(user.id).unwrap();
    assert!(is_admin(&principal));
    assert!(!is_member(&principal));
    assert!(!principal.has_perm(BookPermission::Delete));

    let granted = accounts
        .grant_permission(user.id, "relationship_app.can_delete")
        .unwrap();
    assert_eq!(granted, BookPermission::Delete);
    let principal = accounts.principal_for_user(user.id).unwrap();
    assert!(principal.has_perm(BookPermission::Delete));
    assert!(!principal.has_perm(BookPermission::View));

    assert!(accounts.grant_permission(user.id, "can_delete").is_err());
    assert!(accounts
        .grant_permission(user.id, "relationship_app.can_publish")
        .is_err());
}

#[test]
fn active_superuser_has_every_permission() {
    let conn = open_db_in_memory().unwrap();
    let accounts = service(&conn);
    let root = accounts
        .create_user(&NewUser {
            is_staff: true,
            is_superuser: true,
            ..NewUser::new("root", "root-password")
        })
        .unwrap();

    let principal = accounts.principal_for_user(root.id).unwrap();
    for permission in BookPermission::ALL {
        assert!(principal.has_perm(permission));
    }
    assert!(is_member(&principal));
}

#[test]
fn registration_reports_every_field_error_together() {
    let conn = open_db_in_memory().unwrap();
    let accounts = service(&conn);
    accounts
        .create_user(&NewUser::new("jules", "jules-password"))
        .unwrap();

    let form = RegistrationForm {
        username: "jules".to_string(),
        email: "not-an-email".to_string(),
        password1: "123".to_string(),
        password2: "456".to_string(),
    };
    let Err(AccountServiceError::Invalid(errors)) = accounts.register(&form) else {
        panic!("expected form errors");
    };
    assert_eq!(
        errors.get("username"),
        Some(&["a user with that username already exists".to_string()][..])
    );
    assert!(errors.get("email").is_some());
    assert!(errors.get("password1").is_some());
    assert!(errors.get("password2").is_some());
}

#[test]
fn split_registration_stores_a_precomputed_hash() {
    let conn = open_db_in_memory().unwrap();
    let accounts = service(&conn);
    let form = RegistrationForm {
        username: " kim ".to_string(),
        email: String::new(),
        password1: "kim-password".to_string(),
        password2: "kim-password".to_string(),
    };

    let new_user = accounts.check_registration(&form).unwrap();
    assert_eq!(new_user.username, "kim");
    let hash = hash_password(&new_user.password).unwrap();
    let session = accounts.register_hashed(&new_user, &hash).unwrap();
    assert_eq!(profile_count(&conn, session.user.id), 1);

    // The name was free at check time but is taken by the time it is stored.
    let Err(AccountServiceError::Invalid(errors)) = accounts.register_hashed(&new_user, &hash)
    else {
        panic!("expected a username conflict");
    };
    assert!(errors.get("username").is_some());

    let user = accounts
        .begin_login("kim")
        .unwrap()
        .verify("kim-password")
        .unwrap();
    let session = accounts.open_session(user).unwrap();
    assert!(accounts
        .principal_for_session(Some(&session.token))
        .unwrap()
        .is_authenticated());
}

#[test]
fn unknown_user_and_wrong_password_fail_alike() {
    let conn = open_db_in_memory().unwrap();
    let accounts = service(&conn);
    accounts
        .create_user(&NewUser::new("lena", "lena-password"))
        .unwrap();

    let unknown = accounts.begin_login("nobody").unwrap().verify("lena-password");
    let wrong = accounts.begin_login("lena").unwrap().verify("not-her-password");
    for result in [unknown, wrong] {
        let err = result.unwrap_err();
        assert!(matches!(err, AccountServiceError::InvalidCredentials));
        assert_eq!(err.to_string(), "invalid username or password");
    }
}
