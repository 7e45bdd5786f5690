/// 경매 룸 활동 로그 (append-only 감사 기록)
/// 기록은 best-effort: 실패해도 입찰/가격 상태의 정합성에는 영향이 없다.
// region:    --- Imports
use crate::auction::events::RoomEvent;
use crate::room::RoomChannel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

// endregion: --- Imports

// region:    --- Model

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Activity {
    pub id: i64,
    pub auction_id: i64,
    pub kind: String,
    pub description: String,
    pub actor_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// 신규 활동 항목
/// kind: BID | EXTENSION | REVOKE | UNREVOKE | CHAT | JOIN |
///       PUBLISH | PAUSE | RESUME | END | CANCEL
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub auction_id: i64,
    pub kind: &'static str,
    pub description: String,
    pub actor_id: Option<i64>,
    pub metadata: serde_json::Value,
}

impl NewActivity {
    /// 수명주기 전이 항목
    pub fn lifecycle(
        auction_id: i64,
        kind: &'static str,
        description: &str,
        actor_id: i64,
    ) -> Self {
        Self {
            auction_id,
            kind,
            description: description.to_string(),
            actor_id: Some(actor_id),
            metadata: serde_json::json!({}),
        }
    }
}

// endregion: --- Model

// region:    --- Recording

/// 활동 기록 (fire-and-forget)
/// 분리된 태스크로 실행하며 오류는 로깅 후 무시한다.
/// 기록에 성공하면 같은 태스크에서 activity-created 이벤트를 룸으로 발행한다.
pub fn record(pool: Arc<PgPool>, channel: Arc<dyn RoomChannel>, entry: NewActivity) {
    tokio::spawn(async move {
        match insert_returning(&pool, &entry).await {
            Ok(activity) => {
                let event = RoomEvent::ActivityCreated {
                    auction_id: activity.auction_id,
                    kind: activity.kind,
                    description: activity.description,
                    created_at: activity.created_at,
                };
                if let Err(e) = channel.publish(entry.auction_id, &event).await {
                    error!(
                        "{:<12} --> 활동 이벤트 발행 실패: auction_id={}, kind={}, {}",
                        "Activity", entry.auction_id, entry.kind, e
                    );
                }
            }
            Err(e) => {
                error!(
                    "{:<12} --> 활동 기록 실패: auction_id={}, kind={}, {:?}",
                    "Activity", entry.auction_id, entry.kind, e
                );
            }
        }
    });
}

/// 활동 기록 (동기, 채팅처럼 항목 자체가 작업 결과인 경우)
pub async fn insert_returning(
    pool: &PgPool,
    entry: &NewActivity,
) -> Result<Activity, sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO activities (auction_id, kind, description, actor_id, metadata)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(entry.auction_id)
    .bind(entry.kind)
    .bind(&entry.description)
    .bind(entry.actor_id)
    .bind(&entry.metadata)
    .fetch_one(pool)
    .await
}

// endregion: --- Recording
