use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 참가자 모델
// revoked_at은 append-only 사실 기록이며 unrevoke 시에만 NULL로 되돌린다.
// 온라인 여부/소켓 세션 같은 프레즌스는 게이트웨이 소관이라 여기에 저장하지 않는다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Participant {
    pub id: i64,
    pub auction_id: i64,
    pub user_id: i64,
    pub joined_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

// 참가 철회 결과
#[derive(Debug, Clone, Serialize)]
pub struct Revocation {
    pub invalidated_bids: u64,
    pub price_changed: bool,
    pub old_price: i64,
    pub new_price: i64,
}
