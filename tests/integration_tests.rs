/// 통합 테스트
/// 로컬에서 실행 중인 서비스 인스턴스(BIND_ADDR, 기본 localhost:3000)와
/// DATABASE_URL이 가리키는 데이터베이스를 전제로 한다.
use async_trait::async_trait;
use auction_room_service::auction::events::RoomEvent;
use auction_room_service::auction::model::Auction;
use auction_room_service::bidding::commands::{place_bid as place_bid_command, PlaceBidCommand};
use auction_room_service::database::DatabaseManager;
use auction_room_service::error::AuctionError;
use auction_room_service::lock::AuctionLockManager;
use auction_room_service::participant::commands as participant_commands;
use auction_room_service::query;
use auction_room_service::room::RoomChannel;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// 트레이싱 초기화
#[allow(dead_code)]
fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 데이터베이스 매니저 설정
async fn setup() -> Arc<DatabaseManager> {
    Arc::new(DatabaseManager::new().await)
}

fn base_url() -> String {
    std::env::var("TEST_SERVER_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// 발행된 룸 이벤트를 수집하는 테스트 채널
struct CapturingChannel {
    events: tokio::sync::Mutex<Vec<RoomEvent>>,
}

impl CapturingChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: tokio::sync::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl RoomChannel for CapturingChannel {
    async fn publish(&self, _auction_id: i64, event: &RoomEvent) -> Result<(), String> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// 테스트용 경매 픽스처
struct Fixture {
    seller_id: i64,
    start_price: i64,
    min_bid_increment: i64,
    bid_cooldown_seconds: i64,
    ends_in_seconds: i64,
    anti_snipe_threshold_seconds: i64,
    anti_snipe_extension_seconds: i64,
    max_extensions: i32,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            seller_id: 1000,
            start_price: 100,
            min_bid_increment: 10,
            bid_cooldown_seconds: 0,
            ends_in_seconds: 7200,
            anti_snipe_threshold_seconds: 30,
            anti_snipe_extension_seconds: 30,
            max_extensions: 10,
        }
    }
}

/// 테스트용 경매 생성 (ACTIVE 상태로 직접 삽입)
async fn create_active_auction(db: &DatabaseManager, fixture: Fixture) -> Auction {
    db.transaction(|tx| {
        Box::pin(async move {
            sqlx::query_as::<_, Auction>(
                "INSERT INTO auctions (seller_id, title, description, start_price,
                    min_bid_increment, current_price, start_at, end_at, status,
                    anti_snipe_threshold_seconds, anti_snipe_extension_seconds,
                    max_extensions, bid_cooldown_seconds)
                 VALUES ($1, $2, $3, $4, $5, $4, $6, $7, 'ACTIVE', $8, $9, $10, $11)
                 RETURNING *",
            )
            .bind(fixture.seller_id)
            .bind("통합 테스트 경매")
            .bind("통합 테스트를 위한 경매입니다.")
            .bind(fixture.start_price)
            .bind(fixture.min_bid_increment)
            .bind(Utc::now() - Duration::seconds(1))
            .bind(Utc::now() + Duration::seconds(fixture.ends_in_seconds))
            .bind(fixture.anti_snipe_threshold_seconds)
            .bind(fixture.anti_snipe_extension_seconds)
            .bind(fixture.max_extensions)
            .bind(fixture.bid_cooldown_seconds)
            .fetch_one(&mut **tx)
            .await
        })
    })
    .await
    .unwrap()
}

/// 룸 입장
async fn enter_room(client: &Client, auction_id: i64, user_id: i64) {
    let response = client
        .post(format!("{}/auctions/{}/enter", base_url(), auction_id))
        .json(&json!({ "user_id": user_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}

/// 입찰 요청
async fn place_bid(
    client: &Client,
    auction_id: i64,
    user_id: i64,
    amount: i64,
) -> (StatusCode, Value) {
    let response = client
        .post(format!("{}/bid", base_url()))
        .json(&json!({
            "auction_id": auction_id,
            "user_id": user_id,
            "amount": amount
        }))
        .send()
        .await
        .expect("Failed to send request");
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    let body: Value = response.json().await.expect("invalid json body");
    (status, body)
}

/// 시나리오 A: 최소 입찰 단위 검증
/// start_price=100, min_increment=10일 때 105는 거부(최소 110), 110은 수락
#[tokio::test]
async fn test_min_increment_enforced() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(&db, Fixture::default()).await;

    enter_room(&client, auction.id, 1).await;

    let (status, body) = place_bid(&client, auction.id, 1, 105).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BID_TOO_LOW");
    assert!(body["error"]["message"].as_str().unwrap().contains("110"));

    let (status, body) = place_bid(&client, auction.id, 1, 110).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bid"]["amount"], 110);

    let updated = query::handlers::get_auction(&db, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.current_price, 110);
}

/// 시나리오 B: 입찰 쿨다운
/// 같은 사용자가 60초 쿨다운 내에 재입찰하면 RATE_LIMITED
#[tokio::test]
async fn test_bid_cooldown_rate_limited() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(
        &db,
        Fixture {
            bid_cooldown_seconds: 60,
            ..Fixture::default()
        },
    )
    .await;

    enter_room(&client, auction.id, 2).await;

    let (status, _) = place_bid(&client, auction.id, 2, 110).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = place_bid(&client, auction.id, 2, 120).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    // 남은 대기 시간이 메시지에 초 단위로 포함된다 (약 60초)
    let message = body["error"]["message"].as_str().unwrap();
    let remaining: i64 = message
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap();
    assert!((55..=60).contains(&remaining), "remaining={}", remaining);

    // 가격은 첫 입찰 그대로
    let updated = query::handlers::get_auction(&db, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.current_price, 110);
}

/// 안티 스나이핑: 종료 임박 입찰이 종료 시각을 정확히 extension_seconds만큼 연장
#[tokio::test]
async fn test_anti_snipe_extends_end_time() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(
        &db,
        Fixture {
            ends_in_seconds: 10,
            anti_snipe_threshold_seconds: 30,
            anti_snipe_extension_seconds: 30,
            ..Fixture::default()
        },
    )
    .await;

    enter_room(&client, auction.id, 3).await;

    let before = query::handlers::get_auction(&db, auction.id)
        .await
        .unwrap()
        .unwrap();

    let (status, body) = place_bid(&client, auction.id, 3, 110).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["extended"], true);
    assert_eq!(body["data"]["extension_count"], 1);

    let after = query::handlers::get_auction(&db, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((after.end_at - before.end_at).num_seconds(), 30);
    assert_eq!(after.extension_count, 1);
}

/// 안티 스나이핑: 임계 구간 밖의 입찰은 연장하지 않음
#[tokio::test]
async fn test_bid_outside_threshold_does_not_extend() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(
        &db,
        Fixture {
            ends_in_seconds: 3600,
            ..Fixture::default()
        },
    )
    .await;

    enter_room(&client, auction.id, 4).await;

    let (status, body) = place_bid(&client, auction.id, 4, 110).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["extended"], false);

    let after = query::handlers::get_auction(&db, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.extension_count, 0);
}

/// 시나리오 D + 왕복: 참가 철회로 가격 재계산, 철회 해제는 입찰/가격을 복원하지 않음
#[tokio::test]
async fn test_revocation_recomputes_price() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(&db, Fixture::default()).await;
    let seller = auction.seller_id;

    enter_room(&client, auction.id, 10).await;
    enter_room(&client, auction.id, 11).await;

    // 사용자 11이 300, 사용자 10이 500 입찰
    let (status, _) = place_bid(&client, auction.id, 11, 300).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = place_bid(&client, auction.id, 10, 500).await;
    assert_eq!(status, StatusCode::OK);

    // 판매자가 최고 입찰자(10)를 철회
    let response = client
        .post(format!("{}/auctions/{}/revoke", base_url(), auction.id))
        .json(&json!({ "actor_id": seller, "target_user_id": 10 }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["price_changed"], true);
    assert_eq!(body["data"]["old_price"], 500);
    assert_eq!(body["data"]["new_price"], 300);
    assert_eq!(body["data"]["invalidated_bids"], 1);

    let updated = query::handlers::get_auction(&db, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.current_price, 300);

    // 철회된 사용자는 입찰 불가
    let (status, body) = place_bid(&client, auction.id, 10, 400).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "USER_REVOKED");

    // 철회 해제: 입찰 자격은 돌아오지만 무효화된 입찰과 가격은 그대로
    let response = client
        .post(format!("{}/auctions/{}/unrevoke", base_url(), auction.id))
        .json(&json!({ "actor_id": seller, "target_user_id": 10 }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let updated = query::handlers::get_auction(&db, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.current_price, 300);

    let history = query::handlers::get_bid_history(&db, auction.id)
        .await
        .unwrap();
    let invalid_count = history.iter().filter(|b| !b.valid).count();
    assert_eq!(invalid_count, 1);

    // 다시 입찰 가능 (현재 가격 300 기준 최소 310)
    let (status, _) = place_bid(&client, auction.id, 10, 310).await;
    assert_eq!(status, StatusCode::OK);
}

/// 판매자 본인 입찰 거부, 미참가자 거부
#[tokio::test]
async fn test_seller_and_non_participant_rejected() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(&db, Fixture::default()).await;

    // 미참가자
    let (status, body) = place_bid(&client, auction.id, 20, 110).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NOT_PARTICIPANT");

    // 판매자
    enter_room(&client, auction.id, auction.seller_id).await;
    let (status, body) = place_bid(&client, auction.id, auction.seller_id, 110).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "SELLER_CANNOT_BID");
}

/// 일시정지 중 입찰 거부, 재개 후 수락
#[tokio::test]
async fn test_pause_blocks_bids() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(&db, Fixture::default()).await;
    let seller = auction.seller_id;

    enter_room(&client, auction.id, 30).await;

    let response = client
        .post(format!("{}/auctions/{}/pause", base_url(), auction.id))
        .json(&json!({ "actor_id": seller }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let (status, body) = place_bid(&client, auction.id, 30, 110).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "AUCTION_PAUSED");

    let response = client
        .post(format!("{}/auctions/{}/resume", base_url(), auction.id))
        .json(&json!({ "actor_id": seller }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let (status, _) = place_bid(&client, auction.id, 30, 110).await;
    assert_eq!(status, StatusCode::OK);
}

/// 시나리오 E + 멱등성: 입찰 없는 경매 종료는 FAILED, 재종료는 success=false
#[tokio::test]
async fn test_end_without_bids_and_idempotence() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(&db, Fixture::default()).await;
    let seller = auction.seller_id;

    let response = client
        .post(format!("{}/auctions/{}/end", base_url(), auction.id))
        .json(&json!({ "actor_id": seller }))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["winner_id"], Value::Null);
    assert_eq!(body["data"]["completion_status"], "FAILED");

    let ended = query::handlers::get_auction(&db, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ended.status, "ENDED");
    assert_eq!(ended.completion_status.as_deref(), Some("FAILED"));
    assert_eq!(ended.winner_id, None);

    // 재종료는 멱등 no-op
    let response = client
        .post(format!("{}/auctions/{}/end", base_url(), auction.id))
        .json(&json!({ "actor_id": seller }))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    // 결제 의향 레코드가 생기지 않았는지 확인
    let auction_id = auction.id;
    let intents: i64 = db
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_scalar("SELECT COUNT(*) FROM payment_intents WHERE auction_id = $1")
                    .bind(auction_id)
                    .fetch_one(&mut **tx)
                    .await
            })
        })
        .await
        .unwrap();
    assert_eq!(intents, 0);
}

/// 낙찰 종료: 최고 유효 입찰이 낙찰자, 결제 의향 레코드 1건 생성
#[tokio::test]
async fn test_end_with_winner_creates_payment_intent() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(&db, Fixture::default()).await;
    let seller = auction.seller_id;

    enter_room(&client, auction.id, 40).await;
    enter_room(&client, auction.id, 41).await;
    let (status, _) = place_bid(&client, auction.id, 40, 110).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = place_bid(&client, auction.id, 41, 150).await;
    assert_eq!(status, StatusCode::OK);

    let response = client
        .post(format!("{}/auctions/{}/end", base_url(), auction.id))
        .json(&json!({ "actor_id": seller }))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["winner_id"], 41);
    assert_eq!(body["data"]["final_price"], 150);
    assert_eq!(body["data"]["completion_status"], "PENDING");

    let ended = query::handlers::get_auction(&db, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ended.winner_id, Some(41));
    assert!(ended.winner_payment_deadline.is_some());

    let auction_id = auction.id;
    let intents: Vec<(i64, i64)> = db
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as(
                    "SELECT winner_id, amount FROM payment_intents WHERE auction_id = $1",
                )
                .bind(auction_id)
                .fetch_all(&mut **tx)
                .await
            })
        })
        .await
        .unwrap();
    assert_eq!(intents, vec![(41, 150)]);
}

/// 공개 가드: 자산 없는 DRAFT는 공개 불가, 자산 첨부 후 공개 가능
#[tokio::test]
async fn test_publish_requires_asset() {
    let client = Client::new();
    let seller = 2000;

    let response = client
        .post(format!("{}/auctions", base_url()))
        .json(&json!({
            "seller_id": seller,
            "title": "공개 가드 테스트",
            "start_price": 100,
            "min_bid_increment": 10,
            "start_at": Utc::now(),
            "end_at": Utc::now() + Duration::hours(2),
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    let auction_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["status"], "DRAFT");

    let response = client
        .post(format!("{}/auctions/{}/publish", base_url(), auction_id))
        .json(&json!({ "actor_id": seller }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NO_ASSETS");

    let response = client
        .post(format!("{}/auctions/{}/assets", base_url(), auction_id))
        .json(&json!({ "actor_id": seller, "url": "https://assets.example/1.jpg" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/auctions/{}/publish", base_url(), auction_id))
        .json(&json!({ "actor_id": seller }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "ACTIVE");
}

/// 일시정지 중 만료된 경매는 재개 시 즉시 종료
#[tokio::test]
async fn test_resume_after_expiry_ends_auction() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(
        &db,
        Fixture {
            ends_in_seconds: 2,
            ..Fixture::default()
        },
    )
    .await;
    let seller = auction.seller_id;

    let response = client
        .post(format!("{}/auctions/{}/pause", base_url(), auction.id))
        .json(&json!({ "actor_id": seller }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    // 일시정지 상태로 종료 시각 경과
    tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;

    let response = client
        .post(format!("{}/auctions/{}/resume", base_url(), auction.id))
        .json(&json!({ "actor_id": seller }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["ended"]["success"], true);

    let ended = query::handlers::get_auction(&db, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ended.status, "ENDED");
}

/// 시나리오 C + 속성 검증: 동시 입찰 경쟁
/// 커밋 순서 기준으로 수락된 입찰 금액이 순증가하고,
/// 최종 가격은 도착 순서와 무관하게 수락된 최고 금액과 같다.
#[tokio::test]
async fn test_concurrent_bidding_race() {
    init_tracing();
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(&db, Fixture::default()).await;

    // 10명의 참가자 입장
    for user_id in 100..110 {
        enter_room(&client, auction.id, user_id).await;
    }

    // 서로 다른 금액으로 동시 입찰
    let mut handles = vec![];
    for i in 0..10i64 {
        let auction_id = auction.id;
        let user_id = 100 + i;
        let amount = 110 + i * 10;
        let handle = tokio::spawn(async move {
            let client = Client::new();
            let response = client
                .post(format!("{}/bid", base_url()))
                .json(&json!({
                    "auction_id": auction_id,
                    "user_id": user_id,
                    "amount": amount
                }))
                .send()
                .await
                .unwrap();
            (response.status().as_u16(), amount)
        });
        handles.push(handle);
    }

    let mut accepted = vec![];
    for handle in handles {
        let (status, amount) = handle.await.unwrap();
        if status == 200 {
            accepted.push(amount);
        } else {
            // 경쟁에서 밀린 입찰은 BID_TOO_LOW 또는 LOCK_BUSY로만 실패해야 한다
            assert!(status == 400 || status == 409, "unexpected status {}", status);
        }
    }
    info!("수락된 입찰 수: {}", accepted.len());
    assert!(!accepted.is_empty());

    // 최고 금액 200은 언제 도착하든 수락된다
    let max_accepted = *accepted.iter().max().unwrap();
    assert_eq!(max_accepted, 200);

    // 커밋 시간 순서로 금액이 순증가하는지 확인
    let history = query::handlers::get_bid_history(&db, auction.id)
        .await
        .unwrap();
    let mut committed: Vec<_> = history.iter().filter(|b| b.valid).collect();
    committed.sort_by_key(|b| (b.created_at, b.id));
    for pair in committed.windows(2) {
        assert!(
            pair[1].amount > pair[0].amount,
            "입찰 금액이 커밋 순서대로 증가하지 않음: {} -> {}",
            pair[0].amount,
            pair[1].amount
        );
    }

    // 최종 가격 = 수락된 최고 금액
    let updated = query::handlers::get_auction(&db, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.current_price, max_accepted);
    assert_eq!(
        updated.current_price,
        committed.last().unwrap().amount
    );
}

/// 임계 구역 도중 요청 future가 드롭돼도(클라이언트 연결 종료와 동일)
/// 다른 세션이 같은 경매의 잠금을 곧바로 얻을 수 있어야 한다
#[tokio::test]
async fn test_lock_released_after_cancelled_critical_section() {
    let db = setup().await;
    let locks = AuctionLockManager::new(db.get_pool());
    let auction_key = 987_654_321;

    // 잠금을 쥔 채 future를 드롭한다
    let cancelled = tokio::time::timeout(
        tokio::time::Duration::from_millis(300),
        locks.with_auction_lock(auction_key, || async {
            tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
            Ok::<(), AuctionError>(())
        }),
    )
    .await;
    assert!(cancelled.is_err());

    // 별도 풀의 다른 인스턴스가 재시도 한도 안에 잠금을 얻어야 한다
    let other = setup().await;
    let other_locks = AuctionLockManager::new(other.get_pool());
    let value = other_locks
        .with_auction_lock(auction_key, || async { Ok::<i64, AuctionError>(7) })
        .await
        .unwrap();
    assert_eq!(value, 7);
}

/// 활동 기록이 activity-created 이벤트로 룸에 발행된다
#[tokio::test]
async fn test_bid_activity_broadcast_to_room() {
    let db = setup().await;
    let locks = AuctionLockManager::new(db.get_pool());
    let channel = CapturingChannel::new();
    let auction = create_active_auction(&db, Fixture::default()).await;

    let room_channel: Arc<dyn RoomChannel> = channel.clone();
    participant_commands::enter(&db, Arc::clone(&room_channel), auction.id, 70)
        .await
        .unwrap();

    let placement = place_bid_command(
        &db,
        &locks,
        Arc::clone(&room_channel),
        PlaceBidCommand {
            auction_id: auction.id,
            user_id: 70,
            amount: 110,
        },
    )
    .await
    .unwrap();
    assert_eq!(placement.bid.amount, 110);

    // 기록과 발행은 분리된 태스크에서 수행되므로 잠시 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    let events = channel.events.lock().await;
    let bid_activity = events.iter().any(|event| {
        matches!(event, RoomEvent::ActivityCreated { auction_id, kind, .. }
            if *auction_id == auction.id && kind == "BID")
    });
    assert!(bid_activity, "activity-created(BID) 이벤트가 발행되지 않음");
}

/// 룸 스냅샷: 최신 유효 입찰과 활동, 참가자 한정 마지막 입찰 시각
#[tokio::test]
async fn test_room_snapshot_projection() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(&db, Fixture::default()).await;

    enter_room(&client, auction.id, 50).await;
    let (status, _) = place_bid(&client, auction.id, 50, 110).await;
    assert_eq!(status, StatusCode::OK);

    // 쿨다운 캐시 기록은 best-effort이므로 잠시 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    let response = client
        .get(format!(
            "{}/auctions/{}/room?limit=5&user_id=50",
            base_url(),
            auction.id
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["data"]["auction"]["id"], auction.id);
    let bids = body["data"]["latest_bids"].as_array().unwrap();
    assert_eq!(bids.len(), 1);
    assert_eq!(bids[0]["amount"], 110);
    assert!(body["data"]["caller_last_bid_time"].is_string());

    // 비참가자에게는 마지막 입찰 시각을 내려주지 않는다
    let response = client
        .get(format!(
            "{}/auctions/{}/room?user_id=51",
            base_url(),
            auction.id
        ))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.unwrap();
    assert!(body["data"]["caller_last_bid_time"].is_null());
}

/// 채팅: 참가자만 전송 가능, 철회된 사용자는 거부
#[tokio::test]
async fn test_chat_gating() {
    let db = setup().await;
    let client = Client::new();
    let auction = create_active_auction(&db, Fixture::default()).await;
    let seller = auction.seller_id;

    enter_room(&client, auction.id, 60).await;

    let response = client
        .post(format!("{}/auctions/{}/chat", base_url(), auction.id))
        .json(&json!({ "user_id": 60, "message": "안녕하세요" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    // 판매자가 철회하면 채팅도 거부된다
    let response = client
        .post(format!("{}/auctions/{}/revoke", base_url(), auction.id))
        .json(&json!({ "actor_id": seller, "target_user_id": 60 }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/auctions/{}/chat", base_url(), auction.id))
        .json(&json!({ "user_id": 60, "message": "다시 안녕하세요" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "USER_REVOKED");

    // 채팅이 CHAT 활동으로 기록되었는지 확인
    let auction_id = auction.id;
    let chats: i64 = db
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM activities WHERE auction_id = $1 AND kind = 'CHAT'",
                )
                .bind(auction_id)
                .fetch_one(&mut **tx)
                .await
            })
        })
        .await
        .unwrap();
    assert_eq!(chats, 1);
}
