use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 입찰 모델
// valid=false는 참가 철회로 무효화된 입찰. 감사 추적을 위해 삭제하지 않는다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
}

// 입찰 수락 결과
#[derive(Debug, Clone, Serialize)]
pub struct BidPlacement {
    pub bid: Bid,
    pub extended: bool,
    pub new_end_time: DateTime<Utc>,
    pub extension_count: i32,
}
