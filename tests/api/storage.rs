use crate::helpers::{spawn_database, TestDatabase, GUILD_ID};
use chrono::{Duration, Utc};
use claim::{assert_none, assert_ok, assert_some};
use diesel::prelude::*;
use feedrelay::connections::{ConnectionStore, PgConnectionStore, StoreError};
use feedrelay::db;
use feedrelay::delivery::DeliveryAccounting;
use feedrelay::domain::{
    ConnectionName, ConnectionPatch, DeliveryOutcome, DetailsPatch, Embed, FeedFilter, FeedPatch,
    FeedStatus, FindOptions, NewConnection, WebhookPointerPatch, WebhookRef,
};
use feedrelay::feeds::{FeedError, FeedService};
use feedrelay::models::{NewDeliveryRecord, NewFailureRecord, NewFeed};
use feedrelay::schema::{delivery_records, failure_records, feeds};
use uuid::Uuid;

const DEFAULT_REFRESH_RATE: u32 = 600;

fn insert_feed(test_db: &TestDatabase, title: &str, url: &str) -> Uuid {
    let id = Uuid::new_v4();
    diesel::insert_into(feeds::table)
        .values(NewFeed {
            id: &id,
            guild_id: GUILD_ID,
            title,
            url,
            channel_id: "channel-1",
        })
        .execute(&test_db.connection)
        .expect("Failed to insert a feed.");
    id
}

fn insert_failure(test_db: &TestDatabase, url: &str, hours_ago: i64) {
    let failed_at = db::current_time() - Duration::hours(hours_ago);
    diesel::insert_into(failure_records::table)
        .values(NewFailureRecord {
            url,
            reason: Some("connection reset"),
            failed_at: &failed_at,
            alerted: false,
        })
        .execute(&test_db.connection)
        .expect("Failed to insert a failure record.");
}

fn insert_delivery(
    test_db: &TestDatabase,
    feed_id: Uuid,
    outcome: DeliveryOutcome,
    seconds_ago: i64,
) {
    let id = Uuid::new_v4();
    let created_at = db::current_time() - Duration::seconds(seconds_ago);
    diesel::insert_into(delivery_records::table)
        .values(NewDeliveryRecord::new(&id, &feed_id, &outcome, &created_at))
        .execute(&test_db.connection)
        .expect("Failed to insert a delivery record.");
}

fn rejected() -> DeliveryOutcome {
    DeliveryOutcome::Rejected {
        error_code: "DISCORD_400".into(),
        message: "Invalid form body".into(),
    }
}

fn failed() -> DeliveryOutcome {
    DeliveryOutcome::Failed {
        error_code: "FETCH_TIMEOUT".into(),
        message: "Timed out fetching the article".into(),
    }
}

fn name(s: &str) -> ConnectionName {
    ConnectionName::parse(s.to_string()).unwrap()
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn appended_connections_are_read_back_with_all_their_details() {
    // arrange
    let test_db = spawn_database().await;
    let feed_id = insert_feed(&test_db, "Rust blog", "https://blog.rust-lang.org/feed.xml");
    let store = PgConnectionStore::new(test_db.pool.clone());
    let new = NewConnection::webhook(
        name("hooked"),
        WebhookRef {
            id: "hook-1".into(),
            token: "hook-token".into(),
            name: Some("Feeds".into()),
            icon_url: None,
        },
    );

    // act
    let stored = store.append_connection(feed_id, new.clone()).await;

    // assert
    let stored = assert_ok!(stored);
    assert_eq!(stored.id, new.id);
    assert_eq!(stored.feed_id, feed_id);
    assert_eq!(stored.details, new.details);
    let found = store.find_connection(feed_id, new.id).await.unwrap();
    assert_eq!(found, Some(stored));
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn appending_to_a_missing_feed_is_not_persisted() {
    // arrange
    let test_db = spawn_database().await;
    let store = PgConnectionStore::new(test_db.pool.clone());

    // act
    let result = store
        .append_connection(
            Uuid::new_v4(),
            NewConnection::channel(name("news"), "channel-1".into()),
        )
        .await;

    // assert
    assert!(matches!(result, Err(StoreError::NotPersisted { .. })));
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn patches_only_touch_the_fields_they_carry() {
    // arrange
    let test_db = spawn_database().await;
    let feed_id = insert_feed(&test_db, "Rust blog", "https://blog.rust-lang.org/feed.xml");
    let store = PgConnectionStore::new(test_db.pool.clone());
    let created = store
        .append_connection(
            feed_id,
            NewConnection::channel(name("news"), "channel-1".into()),
        )
        .await
        .unwrap();
    let patch = ConnectionPatch {
        details: Some(DetailsPatch {
            content: Some(Some("{{title}}".into())),
            embeds: Some(vec![Embed {
                title: Some("{{title}}".into()),
                color: Some(0xff0000),
                ..Embed::default()
            }]),
            ..DetailsPatch::default()
        }),
        ..ConnectionPatch::default()
    };

    // act
    let once = store
        .patch_connection(feed_id, created.id, patch.clone())
        .await
        .unwrap();
    let twice = store
        .patch_connection(feed_id, created.id, patch)
        .await
        .unwrap();

    // assert
    assert_eq!(once, twice);
    assert_eq!(once.name, "news");
    assert_eq!(once.details.channel, created.details.channel);
    assert_eq!(once.details.content.as_deref(), Some("{{title}}"));
    assert_eq!(once.details.embeds.len(), 1);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn patching_a_connection_of_another_feed_is_not_persisted() {
    // arrange
    let test_db = spawn_database().await;
    let feed_id = insert_feed(&test_db, "Rust blog", "https://blog.rust-lang.org/feed.xml");
    let other_feed_id = insert_feed(
        &test_db,
        "This Week in Rust",
        "https://this-week-in-rust.org/rss.xml",
    );
    let store = PgConnectionStore::new(test_db.pool.clone());
    let created = store
        .append_connection(
            feed_id,
            NewConnection::channel(name("news"), "channel-1".into()),
        )
        .await
        .unwrap();

    // act
    let result = store
        .patch_connection(
            other_feed_id,
            created.id,
            ConnectionPatch {
                name: Some(name("stolen")),
                ..ConnectionPatch::default()
            },
        )
        .await;

    // assert
    assert!(matches!(result, Err(StoreError::NotPersisted { .. })));
    let untouched = store.find_connection(feed_id, created.id).await.unwrap();
    assert_eq!(untouched.map(|c| c.name), Some("news".to_string()));
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn only_sent_and_rejected_deliveries_inside_the_window_are_counted() {
    // arrange
    let test_db = spawn_database().await;
    let feed_id = Uuid::new_v4();
    let other_feed_id = Uuid::new_v4();
    insert_delivery(&test_db, feed_id, DeliveryOutcome::Sent, 10);
    insert_delivery(&test_db, feed_id, rejected(), 20);
    insert_delivery(&test_db, feed_id, DeliveryOutcome::Sent, 120);
    insert_delivery(&test_db, feed_id, failed(), 5);
    insert_delivery(&test_db, other_feed_id, DeliveryOutcome::Sent, 5);
    let accounting = DeliveryAccounting::new(test_db.pool.clone());

    // act
    let count = accounting.count_recent(feed_id, 60).await.unwrap();

    // assert
    assert_eq!(count, 2);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn recorded_deliveries_show_up_in_the_history() {
    // arrange
    let test_db = spawn_database().await;
    let feed_id = Uuid::new_v4();
    let accounting = DeliveryAccounting::new(test_db.pool.clone());

    // act
    let sent = accounting
        .record(feed_id, DeliveryOutcome::Sent)
        .await
        .unwrap();
    let rejected = accounting.record(feed_id, rejected()).await.unwrap();

    // assert
    let history = accounting.history(feed_id, 0, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.contains(&sent));
    assert!(history.contains(&rejected));
    assert_eq!(accounting.count_recent(feed_id, 60).await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn search_matches_title_or_url_case_insensitively() {
    // arrange
    let test_db = spawn_database().await;
    insert_feed(&test_db, "first", "https://GOo.example/feed");
    insert_feed(&test_db, "google", "https://a.example/feed");
    insert_feed(&test_db, "GOO", "https://b.example/feed");
    insert_feed(&test_db, "fourth", "https://goog.example/feed");
    insert_feed(&test_db, "unrelated", "https://c.example/feed");
    let service = FeedService::new(test_db.pool.clone(), DEFAULT_REFRESH_RATE);
    let options = FindOptions {
        search: Some("go".into()),
        ..FindOptions::default()
    };

    // act
    let found = service
        .find_many(FeedFilter::for_guild(GUILD_ID), options)
        .await
        .unwrap();
    let count = service
        .count_many(FeedFilter::for_guild(GUILD_ID), Some("go".into()))
        .await
        .unwrap();

    // assert
    assert_eq!(found.len(), 4);
    assert_eq!(count, 4);
    assert!(found.iter().all(|feed| feed.title != "unrelated"));
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn wildcards_in_search_terms_are_matched_literally() {
    // arrange
    let test_db = spawn_database().await;
    insert_feed(&test_db, "100% Rust", "https://a.example/feed");
    insert_feed(&test_db, "Rust", "https://b.example/feed");
    let service = FeedService::new(test_db.pool.clone(), DEFAULT_REFRESH_RATE);

    // act
    let count = service
        .count_many(FeedFilter::default(), Some("%".into()))
        .await
        .unwrap();

    // assert
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn pagination_skips_and_limits_results() {
    // arrange
    let test_db = spawn_database().await;
    for i in 0..5 {
        insert_feed(
            &test_db,
            &format!("feed {}", i),
            &format!("https://{}.example/feed", i),
        );
    }
    let service = FeedService::new(test_db.pool.clone(), DEFAULT_REFRESH_RATE);

    // act
    let page = service
        .find_many(
            FeedFilter::for_guild(GUILD_ID),
            FindOptions {
                skip: 3,
                limit: 10,
                search: None,
            },
        )
        .await
        .unwrap();
    let other_guild = service
        .count_many(FeedFilter::for_guild("guild-2"), None)
        .await
        .unwrap();

    // assert
    assert_eq!(page.len(), 2);
    assert_eq!(other_guild, 0);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn negative_paging_values_are_treated_as_zero() {
    // arrange
    let test_db = spawn_database().await;
    insert_feed(&test_db, "only", "https://only.example/feed");
    let service = FeedService::new(test_db.pool.clone(), DEFAULT_REFRESH_RATE);
    let accounting = DeliveryAccounting::new(test_db.pool.clone());

    // act
    let first_page = service
        .find_many(
            FeedFilter::default(),
            FindOptions {
                skip: -3,
                limit: 10,
                search: None,
            },
        )
        .await;
    let empty_page = service
        .find_many(
            FeedFilter::default(),
            FindOptions {
                skip: 0,
                limit: -1,
                search: None,
            },
        )
        .await;
    let history = accounting.history(Uuid::new_v4(), -1, -1).await;

    // assert
    assert_eq!(assert_ok!(first_page).len(), 1);
    assert!(assert_ok!(empty_page).is_empty());
    assert!(assert_ok!(history).is_empty());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn status_reflects_only_recent_failures() {
    // arrange
    let test_db = spawn_database().await;
    let recent = insert_feed(&test_db, "recent", "https://recent.example/feed");
    let stale = insert_feed(&test_db, "stale", "https://stale.example/feed");
    let healthy = insert_feed(&test_db, "healthy", "https://healthy.example/feed");
    insert_failure(&test_db, "https://recent.example/feed", 2);
    insert_failure(&test_db, "https://stale.example/feed", 19);
    let service = FeedService::new(test_db.pool.clone(), DEFAULT_REFRESH_RATE);

    // act
    let found = service
        .find_many(
            FeedFilter {
                ids: Some(vec![recent, stale, healthy]),
                ..FeedFilter::default()
            },
            FindOptions::default(),
        )
        .await
        .unwrap();

    // assert
    let status_of = |id: Uuid| found.iter().find(|feed| feed.id == id).unwrap().status;
    assert_eq!(status_of(recent), FeedStatus::Failed);
    assert_eq!(status_of(stale), FeedStatus::Ok);
    assert_eq!(status_of(healthy), FeedStatus::Ok);
    assert!(found
        .iter()
        .all(|feed| feed.refresh_rate_seconds == DEFAULT_REFRESH_RATE));
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn refreshing_a_failed_feed_clears_its_failure() {
    // arrange
    let test_db = spawn_database().await;
    let url = "https://recent.example/feed";
    let id = insert_feed(&test_db, "recent", url);
    insert_failure(&test_db, url, 2);
    let service = FeedService::new(test_db.pool.clone(), DEFAULT_REFRESH_RATE);

    // act
    let refreshed = service.refresh(id).await.unwrap();

    // assert
    assert_eq!(refreshed.status, FeedStatus::Ok);
    let remaining: i64 = failure_records::table
        .filter(failure_records::url.eq(url))
        .count()
        .get_result(&test_db.connection)
        .unwrap();
    assert_eq!(remaining, 0);
    let found = service.find_one(id).await.unwrap();
    assert_eq!(found.map(|feed| feed.status), Some(FeedStatus::Ok));
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn refreshing_a_healthy_feed_succeeds() {
    // arrange
    let test_db = spawn_database().await;
    let id = insert_feed(&test_db, "healthy", "https://healthy.example/feed");
    let service = FeedService::new(test_db.pool.clone(), DEFAULT_REFRESH_RATE);

    // act
    let refreshed = service.refresh(id).await;

    // assert
    let refreshed = assert_ok!(refreshed);
    assert_eq!(refreshed.id, id);
    assert_eq!(refreshed.status, FeedStatus::Ok);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn refreshing_an_unknown_feed_fails() {
    // arrange
    let test_db = spawn_database().await;
    let service = FeedService::new(test_db.pool.clone(), DEFAULT_REFRESH_RATE);
    let id = Uuid::new_v4();

    // act
    let result = service.refresh(id).await;

    // assert
    match result {
        Err(FeedError::NotExists(missing)) => assert_eq!(missing, id),
        other => panic!("Expected NotExists, got {:?}", other),
    }
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn updating_a_feed_sets_and_removes_its_webhook() {
    // arrange
    let test_db = spawn_database().await;
    let id = insert_feed(&test_db, "Rust blog", "https://blog.rust-lang.org/feed.xml");
    let service = FeedService::new(test_db.pool.clone(), DEFAULT_REFRESH_RATE);

    // act
    let with_webhook = service
        .update_one(
            id,
            FeedPatch {
                text: Some("{{link}}".into()),
                webhook: Some(WebhookPointerPatch {
                    id: "hook-1".into(),
                    name: Some("Feeds".into()),
                    avatar: None,
                }),
            },
        )
        .await
        .unwrap();
    let without_webhook = service
        .update_one(
            id,
            FeedPatch {
                webhook: Some(WebhookPointerPatch::default()),
                ..FeedPatch::default()
            },
        )
        .await
        .unwrap();

    // assert
    let with_webhook = with_webhook.unwrap();
    assert_eq!(with_webhook.text.as_deref(), Some("{{link}}"));
    let webhook = assert_some!(with_webhook.webhook);
    assert_eq!(webhook.id, "hook-1");
    assert_eq!(webhook.name.as_deref(), Some("Feeds"));

    let without_webhook = without_webhook.unwrap();
    assert_none!(without_webhook.webhook);
    assert_eq!(without_webhook.text.as_deref(), Some("{{link}}"));
    assert!(without_webhook.updated_at >= with_webhook.updated_at);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn updating_an_unknown_feed_returns_nothing() {
    // arrange
    let test_db = spawn_database().await;
    let service = FeedService::new(test_db.pool.clone(), DEFAULT_REFRESH_RATE);

    // act
    let updated = service
        .update_one(
            Uuid::new_v4(),
            FeedPatch {
                text: Some("hello".into()),
                ..FeedPatch::default()
            },
        )
        .await
        .unwrap();

    // assert
    assert_none!(updated);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn recording_a_failure_again_resets_the_alert_flag() {
    // arrange
    let test_db = spawn_database().await;
    let url = "https://broken.example/feed".to_string();
    let service = FeedService::new(test_db.pool.clone(), DEFAULT_REFRESH_RATE);
    let first = service
        .record_failure(url.clone(), Some("timeout".into()))
        .await
        .unwrap();

    // act
    let alerted = service.mark_failure_alerted(url.clone()).await.unwrap();
    let second = service
        .record_failure(url.clone(), Some("404".into()))
        .await
        .unwrap();

    // assert
    assert!(alerted);
    assert!(!first.alerted);
    assert!(!second.alerted);
    assert_eq!(second.reason.as_deref(), Some("404"));
    assert!(second.failed_at >= first.failed_at);
    assert!(second.failed_at <= Utc::now());
    assert!(!service
        .mark_failure_alerted("https://never-failed.example".into())
        .await
        .unwrap());
}
