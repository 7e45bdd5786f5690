/// 만료 경매 종료 스케줄러
/// 매초 종료 시각이 지난 진행 중 경매를 찾아 멱등 end 전이를 실행한다.
/// 일시정지 중인 경매는 건너뛰고, 재개 시점에 종료가 트리거된다.
// region:    --- Imports
use crate::auction::commands;
use crate::auction::events::RoomEvent;
use crate::database::DatabaseManager;
use crate::query::queries;
use crate::room::{self, RoomChannel};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

// endregion: --- Imports

// region:    --- Auction Scheduler

pub struct AuctionScheduler {
    db: Arc<DatabaseManager>,
    channel: Arc<dyn RoomChannel>,
}

impl AuctionScheduler {
    pub fn new(db: Arc<DatabaseManager>, channel: Arc<dyn RoomChannel>) -> Self {
        Self { db, channel }
    }

    /// 스케줄러 시작
    pub async fn start(&self) {
        let db = Arc::clone(&self.db);
        let channel = Arc::clone(&self.channel);
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                if let Err(e) = Self::end_expired_auctions(&db, &channel).await {
                    error!(
                        "{:<12} --> 만료 경매 종료 중 오류 발생: {:?}",
                        "Scheduler", e
                    );
                }
            }
        });
    }

    /// 만료 경매 일괄 종료
    async fn end_expired_auctions(
        db: &Arc<DatabaseManager>,
        channel: &Arc<dyn RoomChannel>,
    ) -> Result<(), sqlx::Error> {
        let expired: Vec<i64> = sqlx::query_scalar(queries::LIST_EXPIRED_ACTIVE)
            .bind(Utc::now())
            .fetch_all(db.pool())
            .await?;

        if expired.is_empty() {
            debug!("{:<12} --> 만료된 경매 없음", "Scheduler");
            return Ok(());
        }

        for auction_id in expired {
            // end는 멱등이므로 경쟁하는 인스턴스가 같은 경매를 집어도 안전하다.
            match commands::end(db, Arc::clone(channel), auction_id, None).await {
                Ok(outcome) if outcome.success => {
                    info!(
                        "{:<12} --> 만료 경매 종료: id={}, winner={:?}",
                        "Scheduler", auction_id, outcome.winner_id
                    );
                    room::broadcast(
                        Arc::clone(channel),
                        auction_id,
                        RoomEvent::AuctionEnded {
                            auction_id,
                            winner_id: outcome.winner_id,
                            final_price: outcome.final_price,
                            completion_status: outcome
                                .completion_status
                                .unwrap_or_else(|| "FAILED".to_string()),
                        },
                    );
                }
                Ok(_) => {
                    // 이미 다른 경로로 종료된 경매
                }
                Err(e) => {
                    error!(
                        "{:<12} --> 경매 종료 실패: id={}, {:?}",
                        "Scheduler", auction_id, e
                    );
                }
            }
        }
        Ok(())
    }
}

// endregion: --- Auction Scheduler
