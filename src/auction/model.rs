use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 경매 모델
// status: DRAFT | ACTIVE | ENDED | CANCELLED
// completion_status: PENDING | PAID | FAILED (종료 후에만 설정)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Auction {
    pub id: i64,
    pub seller_id: i64,
    pub category_id: Option<i64>,
    pub condition_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub start_price: i64,
    pub min_bid_increment: i64,
    pub current_price: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: String,
    pub is_paused: bool,
    pub winner_id: Option<i64>,
    pub winner_payment_deadline: Option<DateTime<Utc>>,
    pub completion_status: Option<String>,
    pub extension_count: i32,
    pub anti_snipe_threshold_seconds: i64,
    pub anti_snipe_extension_seconds: i64,
    pub max_extensions: i32,
    pub bid_cooldown_seconds: i64,
    pub created_at: DateTime<Utc>,
}

// 경매 자산 모델 (DRAFT 상태에서만 첨부)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuctionAsset {
    pub id: i64,
    pub auction_id: i64,
    pub url: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

// 낙찰자 결제 의향 레코드 (경매당 최대 1건, 멱등 end 전이가 보장)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentIntent {
    pub id: i64,
    pub auction_id: i64,
    pub winner_id: i64,
    pub amount: i64,
    pub status: String,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
