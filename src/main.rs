// region:    --- Imports
use crate::database::DatabaseManager;
use crate::handlers::AppState;
use crate::lock::AuctionLockManager;
use crate::message_broker::KafkaManager;
use crate::room::{KafkaRoomChannel, RoomChannel, ROOM_EVENTS_TOPIC};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Modules
mod activity;
mod auction;
mod bidding;
mod database;
mod error;
mod handlers;
mod lock;
mod message_broker;
mod participant;
mod query;
mod room;
mod scheduler;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // DatabaseManager 생성 및 초기화
    let db = Arc::new(DatabaseManager::new().await);
    if let Err(e) = db.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // Kafka 매니저 생성 및 초기화
    let kafka_manager = KafkaManager::new();
    if let Err(e) = kafka_manager.initialize().await {
        error!("{:<12} --> Kafka 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> Kafka 초기화 성공", "Main");

    // 룸 이벤트 토픽 생성
    kafka_manager.create_topic(ROOM_EVENTS_TOPIC, 5, 1).await?;

    // 의존성 조립 (합성 루트)
    let locks = Arc::new(AuctionLockManager::new(db.get_pool()));
    let channel: Arc<dyn RoomChannel> =
        Arc::new(KafkaRoomChannel::new(kafka_manager.get_producer()));

    // 만료 경매 종료 스케줄러 시작
    let auction_scheduler =
        scheduler::AuctionScheduler::new(Arc::clone(&db), Arc::clone(&channel));
    auction_scheduler.start().await;

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        db,
        locks,
        channel,
    };

    // 라우터 설정
    let routes_all = Router::new()
        .route(
            "/auctions",
            post(handlers::handle_create_auction).get(handlers::handle_list_active),
        )
        .route("/auctions/upcoming", get(handlers::handle_list_upcoming))
        .route(
            "/auctions/:id",
            put(handlers::handle_update_auction).get(handlers::handle_get_auction),
        )
        .route("/auctions/:id/assets", post(handlers::handle_add_asset))
        .route("/auctions/:id/publish", post(handlers::handle_publish_auction))
        .route("/auctions/:id/pause", post(handlers::handle_pause_auction))
        .route("/auctions/:id/resume", post(handlers::handle_resume_auction))
        .route("/auctions/:id/end", post(handlers::handle_end_auction))
        .route("/auctions/:id/cancel", post(handlers::handle_cancel_auction))
        .route("/auctions/:id/enter", post(handlers::handle_enter_room))
        .route("/auctions/:id/revoke", post(handlers::handle_revoke_participant))
        .route(
            "/auctions/:id/unrevoke",
            post(handlers::handle_unrevoke_participant),
        )
        .route("/auctions/:id/chat", post(handlers::handle_send_chat))
        .route("/auctions/:id/bids", get(handlers::handle_get_bid_history))
        .route("/auctions/:id/room", get(handlers::handle_get_room_snapshot))
        .route("/bid", post(handlers::handle_place_bid))
        .layer(cors)
        .with_state(state);

    // 리스너 생성
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
