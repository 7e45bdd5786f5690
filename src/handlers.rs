// region:    --- Imports
use crate::auction::commands::{self as auction_commands, CreateAuctionCommand, UpdateAuctionCommand};
use crate::auction::events::RoomEvent;
use crate::bidding::commands::{place_bid, PlaceBidCommand};
use crate::database::DatabaseManager;
use crate::error::AuctionError;
use crate::lock::AuctionLockManager;
use crate::participant::commands as participant_commands;
use crate::query;
use crate::room::{self, RoomChannel};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- App State

/// 합성 루트가 소유한 의존성 묶음
/// 전역 싱글턴 대신 명시적으로 주입한다.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseManager>,
    pub locks: Arc<AuctionLockManager>,
    pub channel: Arc<dyn RoomChannel>,
}

// endregion: --- App State

// region:    --- Request Bodies

#[derive(Debug, Deserialize)]
pub struct ActorBody {
    pub actor_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct EnterBody {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RevokeBody {
    pub actor_id: i64,
    pub target_user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct AssetBody {
    pub actor_id: i64,
    pub url: String,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub user_id: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RoomQueryParams {
    pub limit: Option<i64>,
    pub user_id: Option<i64>,
}

// endregion: --- Request Bodies

// region:    --- Command Handlers

/// 경매 생성 (DRAFT)
pub async fn handle_create_auction(
    State(state): State<AppState>,
    Json(cmd): Json<CreateAuctionCommand>,
) -> Result<impl IntoResponse, AuctionError> {
    let auction = auction_commands::create(&state.db, cmd).await?;
    Ok(Json(json!({ "success": true, "data": auction })))
}

/// 경매 수정 (DRAFT 전용)
pub async fn handle_update_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(cmd): Json<UpdateAuctionCommand>,
) -> Result<impl IntoResponse, AuctionError> {
    let auction = auction_commands::update(&state.db, auction_id, cmd).await?;
    Ok(Json(json!({ "success": true, "data": auction })))
}

/// 자산 첨부
pub async fn handle_add_asset(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<AssetBody>,
) -> Result<impl IntoResponse, AuctionError> {
    let asset =
        auction_commands::add_asset(&state.db, auction_id, body.actor_id, body.url, body.position)
            .await?;
    Ok(Json(json!({ "success": true, "data": asset })))
}

/// 경매 공개
pub async fn handle_publish_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<ActorBody>,
) -> Result<impl IntoResponse, AuctionError> {
    let auction =
        auction_commands::publish(&state.db, Arc::clone(&state.channel), auction_id, body.actor_id)
            .await?;
    Ok(Json(json!({ "success": true, "data": auction })))
}

/// 경매 일시정지
pub async fn handle_pause_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<ActorBody>,
) -> Result<impl IntoResponse, AuctionError> {
    let auction =
        auction_commands::pause(&state.db, Arc::clone(&state.channel), auction_id, body.actor_id)
            .await?;
    room::broadcast(
        Arc::clone(&state.channel),
        auction_id,
        RoomEvent::AuctionPaused { auction_id },
    );
    Ok(Json(json!({ "success": true, "data": auction })))
}

/// 경매 재개 (일시정지 중 만료된 경우 즉시 종료)
pub async fn handle_resume_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<ActorBody>,
) -> Result<impl IntoResponse, AuctionError> {
    let outcome =
        auction_commands::resume(&state.db, Arc::clone(&state.channel), auction_id, body.actor_id)
            .await?;
    match &outcome.ended {
        Some(end) if end.success => {
            room::broadcast(
                Arc::clone(&state.channel),
                auction_id,
                RoomEvent::AuctionEnded {
                    auction_id,
                    winner_id: end.winner_id,
                    final_price: end.final_price,
                    completion_status: end
                        .completion_status
                        .clone()
                        .unwrap_or_else(|| "FAILED".to_string()),
                },
            );
        }
        _ => {
            room::broadcast(
                Arc::clone(&state.channel),
                auction_id,
                RoomEvent::AuctionResumed {
                    auction_id,
                    end_at: outcome.auction.end_at,
                },
            );
        }
    }
    Ok(Json(json!({ "success": true, "data": outcome })))
}

/// 경매 취소 (DRAFT 전용)
pub async fn handle_cancel_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<ActorBody>,
) -> Result<impl IntoResponse, AuctionError> {
    let auction =
        auction_commands::cancel(&state.db, Arc::clone(&state.channel), auction_id, body.actor_id)
            .await?;
    Ok(Json(json!({ "success": true, "data": auction })))
}

/// 경매 종료 (판매자)
/// 이미 종료된 경매에 대해서는 success=false의 멱등 no-op.
pub async fn handle_end_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<ActorBody>,
) -> Result<impl IntoResponse, AuctionError> {
    let outcome = auction_commands::end(
        &state.db,
        Arc::clone(&state.channel),
        auction_id,
        Some(body.actor_id),
    )
    .await?;
    if outcome.success {
        room::broadcast(
            Arc::clone(&state.channel),
            auction_id,
            RoomEvent::AuctionEnded {
                auction_id,
                winner_id: outcome.winner_id,
                final_price: outcome.final_price,
                completion_status: outcome
                    .completion_status
                    .clone()
                    .unwrap_or_else(|| "FAILED".to_string()),
            },
        );
    }
    Ok(Json(json!({ "success": outcome.success, "data": outcome })))
}

/// 룸 입장
pub async fn handle_enter_room(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<EnterBody>,
) -> Result<impl IntoResponse, AuctionError> {
    let participant =
        participant_commands::enter(&state.db, Arc::clone(&state.channel), auction_id, body.user_id)
            .await?;
    room::broadcast(
        Arc::clone(&state.channel),
        auction_id,
        RoomEvent::ParticipantsUpdated {
            auction_id,
            user_id: body.user_id,
            joined: true,
        },
    );
    Ok(Json(json!({ "success": true, "data": participant })))
}

/// 참가 철회
pub async fn handle_revoke_participant(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<RevokeBody>,
) -> Result<impl IntoResponse, AuctionError> {
    let revocation = participant_commands::revoke(
        &state.db,
        &state.locks,
        Arc::clone(&state.channel),
        auction_id,
        body.actor_id,
        body.target_user_id,
    )
    .await?;
    // 대상 사용자에게 먼저 통지한 뒤 참가자 목록 변경을 룸에 알린다.
    room::broadcast(
        Arc::clone(&state.channel),
        auction_id,
        RoomEvent::UserRevoked {
            auction_id,
            user_id: body.target_user_id,
        },
    );
    room::broadcast(
        Arc::clone(&state.channel),
        auction_id,
        RoomEvent::ParticipantsUpdated {
            auction_id,
            user_id: body.target_user_id,
            joined: false,
        },
    );
    Ok(Json(json!({ "success": true, "data": revocation })))
}

/// 철회 해제 (입찰/가격은 복원하지 않음)
pub async fn handle_unrevoke_participant(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<RevokeBody>,
) -> Result<impl IntoResponse, AuctionError> {
    let participant = participant_commands::unrevoke(
        &state.db,
        Arc::clone(&state.channel),
        auction_id,
        body.actor_id,
        body.target_user_id,
    )
    .await?;
    room::broadcast(
        Arc::clone(&state.channel),
        auction_id,
        RoomEvent::ParticipantsUpdated {
            auction_id,
            user_id: body.target_user_id,
            joined: true,
        },
    );
    Ok(Json(json!({ "success": true, "data": participant })))
}

/// 입찰 요청 처리
pub async fn handle_place_bid(
    State(state): State<AppState>,
    Json(cmd): Json<PlaceBidCommand>,
) -> Result<impl IntoResponse, AuctionError> {
    info!("{:<12} --> 입찰 요청: {:?}", "Handler", cmd);
    let auction_id = cmd.auction_id;

    let placement = place_bid(&state.db, &state.locks, Arc::clone(&state.channel), cmd).await?;

    room::broadcast(
        Arc::clone(&state.channel),
        auction_id,
        RoomEvent::BidCreated {
            auction_id,
            bid: placement.bid.clone(),
            current_price: placement.bid.amount,
        },
    );
    if placement.extended {
        room::broadcast(
            Arc::clone(&state.channel),
            auction_id,
            RoomEvent::AuctionExtended {
                auction_id,
                new_end_time: placement.new_end_time,
                extension_count: placement.extension_count,
            },
        );
    }

    Ok(Json(json!({ "success": true, "data": placement })))
}

/// 채팅 전송
pub async fn handle_send_chat(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<ChatBody>,
) -> Result<impl IntoResponse, AuctionError> {
    let chat = room::send_chat(&state.db, auction_id, body.user_id, body.message).await?;
    room::broadcast(
        Arc::clone(&state.channel),
        auction_id,
        RoomEvent::ChatCreated {
            auction_id,
            user_id: body.user_id,
            message: chat.description.clone(),
            created_at: chat.created_at,
        },
    );
    Ok(Json(json!({ "success": true, "data": chat })))
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 경매 조회
pub async fn handle_get_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, AuctionError> {
    let auction = query::handlers::get_auction(&state.db, auction_id)
        .await?
        .ok_or(AuctionError::AuctionNotFound)?;
    Ok(Json(json!({ "success": true, "data": auction })))
}

/// 진행 중 경매 목록 조회
pub async fn handle_list_active(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AuctionError> {
    let auctions = query::handlers::list_active(&state.db).await?;
    Ok(Json(json!({ "success": true, "data": auctions })))
}

/// 시작 예정 경매 목록 조회
pub async fn handle_list_upcoming(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AuctionError> {
    let auctions = query::handlers::list_upcoming(&state.db).await?;
    Ok(Json(json!({ "success": true, "data": auctions })))
}

/// 입찰 이력 조회
pub async fn handle_get_bid_history(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, AuctionError> {
    let bids = query::handlers::get_bid_history(&state.db, auction_id).await?;
    Ok(Json(json!({ "success": true, "data": bids })))
}

/// 룸 스냅샷 조회 (새로 접속한 클라이언트용)
pub async fn handle_get_room_snapshot(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Query(params): Query<RoomQueryParams>,
) -> Result<impl IntoResponse, AuctionError> {
    let snapshot = room::project(&state.db, auction_id, params.limit, params.user_id).await?;
    Ok(Json(json!({ "success": true, "data": snapshot })))
}

// endregion: --- Query Handlers
