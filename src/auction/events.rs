use crate::bidding::model::Bid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 경매 룸으로 팬아웃되는 실시간 이벤트
/// 소켓 게이트웨이가 room-events 토픽을 구독해 연결된 클라이언트에 전달한다.
/// user-revoked는 대상 사용자에게만 전달 후 룸에서 강제 퇴장시키는 것이 게이트웨이의 책임.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RoomEvent {
    // 입찰 수락
    BidCreated {
        auction_id: i64,
        bid: Bid,
        current_price: i64,
    },
    // 안티 스나이핑 연장
    AuctionExtended {
        auction_id: i64,
        new_end_time: DateTime<Utc>,
        extension_count: i32,
    },
    // 채팅
    ChatCreated {
        auction_id: i64,
        user_id: i64,
        message: String,
        created_at: DateTime<Utc>,
    },
    // 활동 로그 추가
    ActivityCreated {
        auction_id: i64,
        kind: String,
        description: String,
        created_at: DateTime<Utc>,
    },
    // 참가자 목록 변경
    ParticipantsUpdated {
        auction_id: i64,
        user_id: i64,
        joined: bool,
    },
    // 일시정지 / 재개
    AuctionPaused {
        auction_id: i64,
    },
    AuctionResumed {
        auction_id: i64,
        end_at: DateTime<Utc>,
    },
    // 종료 (낙찰자 유무 포함)
    AuctionEnded {
        auction_id: i64,
        winner_id: Option<i64>,
        final_price: i64,
        completion_status: String,
    },
    // 참가 철회 (대상 사용자 전용)
    UserRevoked {
        auction_id: i64,
        user_id: i64,
    },
}
