//! End-to-end access and delivery flows against an in-memory database.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use common::{memory_pool, now, seed_folder, MockSender};
use foldervault::access::gate::GateDecision;
use foldervault::access::otp::{issue_otp, verify_otp, VerifyOutcome};
use foldervault::access::{check_token, SessionProof};
use foldervault::delivery::{CancelRegistry, DeliveryEngine, DeliveryResult, Recipient, SelfDestructQueue};
use foldervault::storage::{folders, links, DbPool};
use foldervault::core::token::generate_token;

fn engine_with(pool: &DbPool, sender: Arc<MockSender>) -> DeliveryEngine {
    DeliveryEngine::new(
        pool.clone(),
        sender,
        SelfDestructQueue::new(),
        Arc::new(CancelRegistry::new()),
    )
}

fn requester(id: i64) -> Recipient {
    Recipient { id, username: Some(format!("user{}", id)) }
}

fn folder_access_count(pool: &DbPool, folder_id: i64) -> i64 {
    let conn = pool.get().unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM logs WHERE folder_id = ?1",
        rusqlite::params![folder_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[tokio::test]
async fn test_happy_path_link_delivery() {
    let pool = memory_pool();
    let sender = MockSender::new();
    let engine = engine_with(&pool, sender.clone());

    let folder_id = seed_folder(&pool, "press-kit");
    let token = generate_token();
    {
        let conn = pool.get().unwrap();
        links::create_link(&conn, folder_id, &token, None, false, &now()).unwrap();
    }

    let conn = pool.get().unwrap();
    let (decision, link, folder) = check_token(&conn, &token, 100, SessionProof::default()).unwrap();
    drop(conn);
    assert_eq!(decision, GateDecision::Allow);

    let result = engine
        .deliver(&requester(100), &folder.unwrap(), link.as_ref())
        .await
        .unwrap();
    assert_eq!(result, DeliveryResult::Delivered { sent: 3, delivery_id: None });

    let sent = sender.sent_to(100);
    assert_eq!(sent.len(), 4); // notice + 3 items
    assert!(sent[0].payload.contains("Access granted"));
    assert_eq!(sent[1].kind, "text");
    assert_eq!(sent[2].kind, "photo");
    assert!(sent[2].spoiler);
    assert!(!sent[2].protect); // folder is forwardable by default
    assert_eq!(sent[3].kind, "document");

    let conn = pool.get().unwrap();
    let link = links::get_link_by_token(&conn, &token).unwrap().unwrap();
    assert_eq!(link.access_count, 1);
    assert_eq!(folder_access_count(&pool, folder_id), 1);

    // A multi-use link serves a second requester and counts again.
    let (decision, link, folder) = check_token(&conn, &token, 101, SessionProof::default()).unwrap();
    drop(conn);
    assert_eq!(decision, GateDecision::Allow);
    engine
        .deliver(&requester(101), &folder.unwrap(), link.as_ref())
        .await
        .unwrap();

    let conn = pool.get().unwrap();
    let link = links::get_link_by_token(&conn, &token).unwrap().unwrap();
    assert_eq!(link.access_count, 2);
    assert_eq!(folder_access_count(&pool, folder_id), 2);
}

#[tokio::test]
async fn test_password_lockout_clears_the_session() {
    use foldervault::access::session::{self, Pending};
    use foldervault::core::config::access::MAX_PASSWORD_ATTEMPTS;

    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let folder_id = seed_folder(&pool, "guarded");
    folders::set_password(&conn, folder_id, Some("hunter2")).unwrap();
    let token = generate_token();
    links::create_link(&conn, folder_id, &token, None, false, &now()).unwrap();

    let user_id = 777_000;
    session::set(
        user_id,
        Pending::AwaitingPassword { folder_id, token: Some(token.clone()), attempts: 0 },
    );

    // Three wrong entries exhaust the budget and the session is dropped.
    for _ in 0..MAX_PASSWORD_ATTEMPTS {
        session::record_failed_attempt(user_id);
    }
    session::clear(user_id);

    // With no pending prompt, a correct password is no longer treated as
    // a password entry; the gate still demands one.
    assert_eq!(session::get(user_id), None);
    let (decision, _, _) = check_token(&conn, &token, user_id, SessionProof::default()).unwrap();
    assert_eq!(decision, GateDecision::PasswordRequired);
}

#[tokio::test]
async fn test_single_use_race_redeems_exactly_once() {
    let pool = memory_pool();
    let sender = MockSender::new();
    let engine = Arc::new(engine_with(&pool, sender.clone()));

    let folder_id = seed_folder(&pool, "one-shot");
    let token = generate_token();
    {
        let conn = pool.get().unwrap();
        links::create_link(&conn, folder_id, &token, None, true, &now()).unwrap();
    }

    let mut tasks = Vec::new();
    for i in 0..8i64 {
        let pool = pool.clone();
        let engine = Arc::clone(&engine);
        let token = token.clone();
        tasks.push(tokio::spawn(async move {
            let conn = pool.get().unwrap();
            let (decision, link, folder) =
                check_token(&conn, &token, 1000 + i, SessionProof::default()).unwrap();
            drop(conn);
            if decision != GateDecision::Allow {
                return decision == GateDecision::RedeemedByOther;
            }
            let result = engine
                .deliver(&requester(1000 + i), &folder.unwrap(), link.as_ref())
                .await
                .unwrap();
            !matches!(result, DeliveryResult::Delivered { .. })
        }));
    }

    let mut losers = 0;
    for task in tasks {
        if task.await.unwrap() {
            losers += 1;
        }
    }
    assert_eq!(losers, 7);

    let conn = pool.get().unwrap();
    let link = links::get_link_by_token(&conn, &token).unwrap().unwrap();
    assert!(link.used_by.is_some());
    assert!(!link.revoked);
    assert_eq!(link.access_count, 1);
}

#[tokio::test]
async fn test_empty_folder_is_a_no_op_and_keeps_single_use() {
    let pool = memory_pool();
    let sender = MockSender::new();
    let engine = engine_with(&pool, sender.clone());

    let conn = pool.get().unwrap();
    let folder_id = folders::create_folder(&conn, "empty", &now()).unwrap();
    let token = generate_token();
    links::create_link(&conn, folder_id, &token, None, true, &now()).unwrap();
    let (_, link, folder) = check_token(&conn, &token, 100, SessionProof::default()).unwrap();
    drop(conn);

    let result = engine
        .deliver(&requester(100), &folder.unwrap(), link.as_ref())
        .await
        .unwrap();
    assert_eq!(result, DeliveryResult::EmptyFolder);

    let sent = sender.sent_to(100);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].payload.contains("empty"));

    // The link is still redeemable and nothing was logged or counted.
    let conn = pool.get().unwrap();
    let link = links::get_link_by_token(&conn, &token).unwrap().unwrap();
    assert_eq!(link.used_by, None);
    assert_eq!(link.access_count, 0);
    assert_eq!(folder_access_count(&pool, folder_id), 0);
}

#[tokio::test]
async fn test_gate_precedence_on_stored_links() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let folder_id = seed_folder(&pool, "precedence");

    // Revoked and expired at once: revoked wins.
    let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
    links::create_link(&conn, folder_id, "tok-rev", Some(&past), false, &now()).unwrap();
    links::revoke_link(&conn, "tok-rev").unwrap();
    let (decision, _, _) = check_token(&conn, "tok-rev", 100, SessionProof::default()).unwrap();
    assert_eq!(decision, GateDecision::Revoked);

    // Redeemed by someone else and expired: redemption conflict wins.
    links::create_link(&conn, folder_id, "tok-used", Some(&past), true, &now()).unwrap();
    links::consume_single_use(&conn, "tok-used", 555, &now()).unwrap();
    let (decision, _, _) = check_token(&conn, "tok-used", 100, SessionProof::default()).unwrap();
    assert_eq!(decision, GateDecision::RedeemedByOther);

    // The claimant themselves sees the expiry instead.
    let (decision, _, _) = check_token(&conn, "tok-used", 555, SessionProof::default()).unwrap();
    assert_eq!(decision, GateDecision::Expired);

    // Unknown token.
    let (decision, _, _) = check_token(&conn, "tok-nope", 100, SessionProof::default()).unwrap();
    assert_eq!(decision, GateDecision::Invalid);
}

#[tokio::test]
async fn test_expiry_boundary_on_stored_link() {
    let pool = memory_pool();
    let conn = pool.get().unwrap();
    let folder_id = seed_folder(&pool, "boundary");

    let future = (Utc::now() + Duration::minutes(5)).to_rfc3339();
    links::create_link(&conn, folder_id, "tok-fresh", Some(&future), false, &now()).unwrap();
    let (decision, _, _) = check_token(&conn, "tok-fresh", 100, SessionProof::default()).unwrap();
    assert_eq!(decision, GateDecision::Allow);

    let past = (Utc::now() - Duration::seconds(1)).to_rfc3339();
    links::create_link(&conn, folder_id, "tok-stale", Some(&past), false, &now()).unwrap();
    let (decision, _, _) = check_token(&conn, "tok-stale", 100, SessionProof::default()).unwrap();
    assert_eq!(decision, GateDecision::Expired);
}

#[tokio::test]
async fn test_password_then_otp_ordering() {
    let pool = memory_pool();
    let sender = MockSender::new();
    let engine = engine_with(&pool, sender.clone());

    let folder_id = seed_folder(&pool, "fortress");
    let conn = pool.get().unwrap();
    folders::set_password(&conn, folder_id, Some("hunter2")).unwrap();
    folders::set_otp_requirement(&conn, folder_id, Some(5)).unwrap();
    let token = generate_token();
    links::create_link(&conn, folder_id, &token, None, false, &now()).unwrap();

    // Nothing proven yet: the password gate fires first.
    let (decision, _, _) = check_token(&conn, &token, 100, SessionProof::default()).unwrap();
    assert_eq!(decision, GateDecision::PasswordRequired);

    // Password proven: the OTP gate is next.
    let proof = SessionProof { password_verified: true, otp_verified: false };
    let (decision, _, folder) = check_token(&conn, &token, 100, proof).unwrap();
    assert_eq!(decision, GateDecision::OtpRequired);

    // Clear the OTP and everything opens.
    let folder = folder.unwrap();
    let (code, _) = issue_otp(&conn, &folder, 100).unwrap();
    assert_eq!(verify_otp(&conn, folder_id, 100, &code, 0).unwrap(), VerifyOutcome::Accepted);

    let proof = SessionProof { password_verified: true, otp_verified: true };
    let (decision, _, folder) = check_token(&conn, &token, 100, proof).unwrap();
    drop(conn);
    assert_eq!(decision, GateDecision::Allow);

    // OTP-based delivery logs at folder level.
    let result = engine
        .deliver(&requester(100), &folder.unwrap(), None)
        .await
        .unwrap();
    assert!(matches!(result, DeliveryResult::Delivered { sent: 3, .. }));
    assert_eq!(folder_access_count(&pool, folder_id), 1);
}

#[tokio::test]
async fn test_cancellation_stops_the_stream() {
    let pool = memory_pool();
    let sender = MockSender::new();
    let engine = engine_with(&pool, sender.clone());

    let folder_id = seed_folder(&pool, "cancel-me");

    // Cancel lands right after the notice and the first item go out.
    sender.cancel_after(2, Arc::clone(engine.cancels()), 100);

    let conn = pool.get().unwrap();
    let folder = folders::get_folder(&conn, folder_id).unwrap().unwrap();
    drop(conn);

    let result = engine.deliver(&requester(100), &folder, None).await.unwrap();
    assert_eq!(result, DeliveryResult::Cancelled { sent: 1 });

    let sent = sender.sent_to(100);
    assert_eq!(sent.len(), 3); // notice, first item, cancellation notice
    assert!(sent[2].payload.contains("cancelled"));

    // Cancelled deliveries leave no trace in the ledger.
    assert_eq!(folder_access_count(&pool, folder_id), 0);
}

#[tokio::test(start_paused = true)]
async fn test_auto_delete_removes_everything_sent() {
    let pool = memory_pool();
    let sender = MockSender::new();
    let engine = engine_with(&pool, sender.clone());

    let folder_id = seed_folder(&pool, "ephemeral");
    let conn = pool.get().unwrap();
    folders::set_auto_delete(&conn, folder_id, Some(2)).unwrap();
    let folder = folders::get_folder(&conn, folder_id).unwrap().unwrap();
    drop(conn);

    let result = engine.deliver(&requester(100), &folder, None).await.unwrap();
    let delivery_id = match result {
        DeliveryResult::Delivered { sent, delivery_id } => {
            assert_eq!(sent, 3);
            delivery_id.expect("auto-delete folder registers a job")
        }
        other => panic!("unexpected result: {:?}", other),
    };
    assert_eq!(engine.self_destruct().pending_jobs(), 1);

    tokio::time::sleep(tokio::time::Duration::from_secs(2 * 60 + 1)).await;
    tokio::task::yield_now().await;

    // Notice plus three items, all deleted.
    assert_eq!(sender.deleted.lock().unwrap().len(), 4);
    assert_eq!(engine.self_destruct().pending_jobs(), 0);
    assert!(!engine.self_destruct().cancel(&delivery_id));
}

#[tokio::test]
async fn test_protect_content_follows_forwardable() {
    let pool = memory_pool();
    let sender = MockSender::new();
    let engine = engine_with(&pool, sender.clone());

    let folder_id = seed_folder(&pool, "locked-down");
    let conn = pool.get().unwrap();
    folders::set_forwardable(&conn, folder_id, false).unwrap();
    let folder = folders::get_folder(&conn, folder_id).unwrap().unwrap();
    drop(conn);

    engine.deliver(&requester(100), &folder, None).await.unwrap();

    let sent = sender.sent_to(100);
    let photo = sent.iter().find(|m| m.kind == "photo").unwrap();
    assert!(photo.protect);
    assert!(photo.spoiler);
    let doc = sent.iter().find(|m| m.kind == "document").unwrap();
    assert!(doc.protect);
    assert!(!doc.spoiler);
}

#[tokio::test]
async fn test_purge_touches_links_only() {
    let pool = memory_pool();

    let folder_id = seed_folder(&pool, "survivor");
    let conn = pool.get().unwrap();
    let past = (Utc::now() - Duration::days(2)).to_rfc3339();
    links::create_link(&conn, folder_id, "tok-gone", Some(&past), false, &now()).unwrap();
    links::create_link(&conn, folder_id, "tok-alive", None, false, &now()).unwrap();
    drop(conn);

    foldervault::sweeper::purge_links(&pool).unwrap();

    let conn = pool.get().unwrap();
    assert!(links::get_link_by_token(&conn, "tok-gone").unwrap().is_none());
    assert!(links::get_link_by_token(&conn, "tok-alive").unwrap().is_some());
    assert!(folders::get_folder(&conn, folder_id).unwrap().is_some());
    assert_eq!(folders::list_content(&conn, folder_id).unwrap().len(), 3);
}
