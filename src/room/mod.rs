/// 경매 룸: 실시간 팬아웃 글루와 룸 상태 프로젝터
/// 브로드캐스트 채널은 협력자(소켓 게이트웨이)이며 여기서는 발행만 담당한다.
// region:    --- Imports
use crate::activity::{self, Activity, NewActivity};
use crate::auction::events::RoomEvent;
use crate::auction::model::Auction;
use crate::bidding::model::Bid;
use crate::database::DatabaseManager;
use crate::error::AuctionError;
use crate::lock;
use crate::message_broker::KafkaProducer;
use crate::participant::model::Participant;
use crate::query::queries;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

// endregion: --- Imports

// region:    --- Room Channel

pub const ROOM_EVENTS_TOPIC: &str = "room-events";

/// 실시간 푸시 채널 인터페이스
#[async_trait]
pub trait RoomChannel: Send + Sync {
    async fn publish(&self, auction_id: i64, event: &RoomEvent) -> Result<(), String>;
}

/// Kafka 기반 룸 채널
/// 경매 id를 키로 발행해 같은 룸의 이벤트 순서를 보존한다.
pub struct KafkaRoomChannel {
    producer: Arc<KafkaProducer>,
}

impl KafkaRoomChannel {
    pub fn new(producer: Arc<KafkaProducer>) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl RoomChannel for KafkaRoomChannel {
    async fn publish(&self, auction_id: i64, event: &RoomEvent) -> Result<(), String> {
        let payload = serde_json::to_string(event).map_err(|e| e.to_string())?;
        self.producer
            .send_message(ROOM_EVENTS_TOPIC, &auction_id.to_string(), &payload)
            .await
    }
}

/// 룸 이벤트 브로드캐스트 (fire-and-forget)
/// 발행 실패는 로깅만 한다. 커밋된 입찰/전이를 되돌리지 않는다.
pub fn broadcast(channel: Arc<dyn RoomChannel>, auction_id: i64, event: RoomEvent) {
    tokio::spawn(async move {
        if let Err(e) = channel.publish(auction_id, &event).await {
            error!(
                "{:<12} --> 룸 이벤트 발행 실패: auction_id={}, {}",
                "Room", auction_id, e
            );
        }
    });
}

// endregion: --- Room Channel

// region:    --- Room State Projector

const DEFAULT_SNAPSHOT_LIMIT: i64 = 20;
const MAX_SNAPSHOT_LIMIT: i64 = 100;

/// 새로 접속한 클라이언트를 위한 일관된 룸 스냅샷
#[derive(Debug, Serialize)]
pub struct RoomSnapshot {
    pub auction: Auction,
    pub latest_bids: Vec<Bid>,
    pub latest_activity: Vec<Activity>,
    /// 표시용 힌트일 뿐이며, 쿨다운 판정은 입찰 시점에 서버가 다시 한다.
    pub caller_last_bid_time: Option<DateTime<Utc>>,
}

/// 룸 스냅샷 조립
/// 최신 유효 입찰과 활동 로그를 최신순으로 모으고, 호출자가 참가자인 경우에만
/// 마지막 입찰 시각을 함께 내려준다.
pub async fn project(
    db: &DatabaseManager,
    auction_id: i64,
    limit: Option<i64>,
    caller_user_id: Option<i64>,
) -> Result<RoomSnapshot, AuctionError> {
    let limit = limit
        .unwrap_or(DEFAULT_SNAPSHOT_LIMIT)
        .clamp(1, MAX_SNAPSHOT_LIMIT);

    let (auction, latest_bids, latest_activity, caller_is_participant) = db
        .transaction(|tx| {
            Box::pin(async move {
                let auction: Option<Auction> = sqlx::query_as(queries::GET_AUCTION)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await?;
                let auction = auction.ok_or(AuctionError::AuctionNotFound)?;

                let latest_bids: Vec<Bid> = sqlx::query_as(queries::LATEST_VALID_BIDS)
                    .bind(auction_id)
                    .bind(limit)
                    .fetch_all(&mut **tx)
                    .await?;

                let latest_activity: Vec<Activity> = sqlx::query_as(queries::LATEST_ACTIVITIES)
                    .bind(auction_id)
                    .bind(limit)
                    .fetch_all(&mut **tx)
                    .await?;

                let caller_is_participant = match caller_user_id {
                    Some(user_id) => {
                        let participant: Option<Participant> =
                            sqlx::query_as(queries::GET_PARTICIPANT)
                                .bind(auction_id)
                                .bind(user_id)
                                .fetch_optional(&mut **tx)
                                .await?;
                        matches!(participant, Some(p) if p.revoked_at.is_none())
                    }
                    None => false,
                };

                Ok::<_, AuctionError>((auction, latest_bids, latest_activity, caller_is_participant))
            })
        })
        .await?;

    let caller_last_bid_time = match (caller_is_participant, caller_user_id) {
        (true, Some(user_id)) => lock::last_bid_timestamp(db.pool(), auction_id, user_id).await?,
        _ => None,
    };

    Ok(RoomSnapshot {
        auction,
        latest_bids,
        latest_activity,
        caller_last_bid_time,
    })
}

// endregion: --- Room State Projector

// region:    --- Chat

/// 채팅 메시지 전송
/// 철회되지 않은 참가자만 보낼 수 있고, CHAT 활동으로 기록된다.
pub async fn send_chat(
    db: &DatabaseManager,
    auction_id: i64,
    user_id: i64,
    message: String,
) -> Result<Activity, AuctionError> {
    let message = message.trim().to_string();
    if message.is_empty() {
        return Err(AuctionError::EmptyMessage);
    }

    let participant: Option<Participant> = sqlx::query_as(queries::GET_PARTICIPANT)
        .bind(auction_id)
        .bind(user_id)
        .fetch_optional(db.pool())
        .await?;
    let participant = participant.ok_or(AuctionError::NotParticipant)?;
    if participant.revoked_at.is_some() {
        return Err(AuctionError::UserRevoked);
    }

    let entry = NewActivity {
        auction_id,
        kind: "CHAT",
        description: message,
        actor_id: Some(user_id),
        metadata: serde_json::json!({}),
    };
    let activity = activity::insert_returning(db.pool(), &entry).await?;
    Ok(activity)
}

// endregion: --- Chat
