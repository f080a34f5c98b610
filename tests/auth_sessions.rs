use anyhow::Result;

use foundling::auth::{change_password, ensure_admin_user, login, SessionStore};

#[path = "util.rs"]
mod util;

#[tokio::test]
async fn seed_is_idempotent_and_keeps_the_password() -> Result<()> {
    let pool = util::memory_pool().await?;
    ensure_admin_user(&pool, "admin", "first-password").await?;
    ensure_admin_user(&pool, "admin", "second-password").await?;

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await?;
    assert_eq!(users, 1);

    let sessions = SessionStore::new();
    assert!(login(&pool, &sessions, "admin", "first-password").await.is_ok());
    let err = login(&pool, &sessions, "admin", "second-password")
        .await
        .expect_err("reseed must not change the password");
    assert_eq!(err.code(), "AUTH/INVALID_CREDENTIALS");
    Ok(())
}

#[tokio::test]
async fn login_rejects_unknown_users_and_wrong_passwords_alike() -> Result<()> {
    let pool = util::memory_pool().await?;
    ensure_admin_user(&pool, "admin", "hunter2hunter2").await?;
    let sessions = SessionStore::new();

    let token = login(&pool, &sessions, "admin", "hunter2hunter2").await?;
    let session = sessions.authenticate(&token).expect("fresh session");
    assert_eq!(session.username, "admin");
    assert_eq!(session.role, "admin");

    let wrong = login(&pool, &sessions, "admin", "wrong")
        .await
        .expect_err("wrong password");
    let unknown = login(&pool, &sessions, "nobody", "hunter2hunter2")
        .await
        .expect_err("unknown user");
    assert_eq!(wrong.code(), unknown.code());
    Ok(())
}

#[tokio::test]
async fn change_password_verifies_the_current_one() -> Result<()> {
    let pool = util::memory_pool().await?;
    ensure_admin_user(&pool, "admin", "old-password").await?;
    let sessions = SessionStore::new();

    let err = change_password(&pool, "admin", "not-the-old-one", "new-password")
        .await
        .expect_err("wrong current password");
    assert_eq!(err.code(), "AUTH/INVALID_CREDENTIALS");

    let err = change_password(&pool, "admin", "old-password", "   ")
        .await
        .expect_err("blank new password");
    assert_eq!(err.code(), "VALIDATION/MISSING_FIELD");

    change_password(&pool, "admin", "old-password", "new-password").await?;
    assert!(login(&pool, &sessions, "admin", "old-password").await.is_err());
    assert!(login(&pool, &sessions, "admin", "new-password").await.is_ok());
    Ok(())
}
