/// 경매 수명주기 커맨드 처리
/// DRAFT → ACTIVE(is_paused 토글) → ENDED, CANCELLED는 DRAFT에서만 진입하는 종료 상태.
/// 모든 전이는 하나의 트랜잭션 안에서 FOR UPDATE 재조회 후 수행한다.
// region:    --- Imports
use crate::activity::{self, NewActivity};
use crate::auction::model::{Auction, AuctionAsset};
use crate::bidding::model::Bid;
use crate::database::DatabaseManager;
use crate::error::AuctionError;
use crate::room::RoomChannel;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Commands

/// 경매 생성 명령 (DRAFT로 생성)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateAuctionCommand {
    pub seller_id: i64,
    pub category_id: Option<i64>,
    pub condition_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_price: i64,
    pub min_bid_increment: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default = "default_anti_snipe_threshold")]
    pub anti_snipe_threshold_seconds: i64,
    #[serde(default = "default_anti_snipe_extension")]
    pub anti_snipe_extension_seconds: i64,
    #[serde(default = "default_max_extensions")]
    pub max_extensions: i32,
    #[serde(default)]
    pub bid_cooldown_seconds: i64,
}

fn default_anti_snipe_threshold() -> i64 {
    30
}

fn default_anti_snipe_extension() -> i64 {
    30
}

fn default_max_extensions() -> i32 {
    10
}

/// 경매 수정 명령 (DRAFT 전용, None 필드는 유지)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpdateAuctionCommand {
    pub actor_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_price: Option<i64>,
    pub min_bid_increment: Option<i64>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub anti_snipe_threshold_seconds: Option<i64>,
    pub anti_snipe_extension_seconds: Option<i64>,
    pub max_extensions: Option<i32>,
    pub bid_cooldown_seconds: Option<i64>,
}

/// 경매 종료 결과
/// success=false는 이미 종료/취소된 경매에 대한 멱등 no-op을 뜻한다.
#[derive(Debug, Clone, Serialize)]
pub struct EndOutcome {
    pub success: bool,
    pub auction_id: i64,
    pub winner_id: Option<i64>,
    pub final_price: i64,
    pub completion_status: Option<String>,
}

/// 재개 결과 (일시정지 중 종료 시각이 지났으면 재개 대신 즉시 종료)
#[derive(Debug, Clone, Serialize)]
pub struct ResumeOutcome {
    pub auction: Auction,
    pub ended: Option<EndOutcome>,
}

// 낙찰자 결제 기한
const WINNER_PAYMENT_HOURS: i64 = 24;

/// 경매 생성
pub async fn create(
    db: &DatabaseManager,
    cmd: CreateAuctionCommand,
) -> Result<Auction, AuctionError> {
    info!("{:<12} --> 경매 생성: seller_id={}", "Command", cmd.seller_id);

    if cmd.end_at <= cmd.start_at {
        return Err(AuctionError::InvalidWindow);
    }

    db.transaction(|tx| {
        Box::pin(async move {
            let auction: Auction = sqlx::query_as(
                "INSERT INTO auctions (seller_id, category_id, condition_id, title, description,
                    start_price, min_bid_increment, current_price, start_at, end_at, status,
                    anti_snipe_threshold_seconds, anti_snipe_extension_seconds, max_extensions,
                    bid_cooldown_seconds)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $6, $8, $9, 'DRAFT', $10, $11, $12, $13)
                 RETURNING *",
            )
            .bind(cmd.seller_id)
            .bind(cmd.category_id)
            .bind(cmd.condition_id)
            .bind(&cmd.title)
            .bind(&cmd.description)
            .bind(cmd.start_price)
            .bind(cmd.min_bid_increment)
            .bind(cmd.start_at)
            .bind(cmd.end_at)
            .bind(cmd.anti_snipe_threshold_seconds)
            .bind(cmd.anti_snipe_extension_seconds)
            .bind(cmd.max_extensions)
            .bind(cmd.bid_cooldown_seconds)
            .fetch_one(&mut **tx)
            .await?;
            Ok(auction)
        })
    })
    .await
}

/// 경매 수정 (DRAFT 전용)
pub async fn update(
    db: &DatabaseManager,
    auction_id: i64,
    cmd: UpdateAuctionCommand,
) -> Result<Auction, AuctionError> {
    info!("{:<12} --> 경매 수정: id={}", "Command", auction_id);

    db.transaction(|tx| {
        Box::pin(async move {
            let mut auction = fetch_for_update(tx, auction_id).await?;
            if auction.seller_id != cmd.actor_id {
                return Err(AuctionError::NotSeller);
            }
            if auction.status != "DRAFT" {
                return Err(AuctionError::InvalidTransition {
                    current: auction.status,
                });
            }

            if let Some(title) = cmd.title {
                auction.title = title;
            }
            if let Some(description) = cmd.description {
                auction.description = description;
            }
            if let Some(start_price) = cmd.start_price {
                auction.start_price = start_price;
                // DRAFT에는 입찰이 없으므로 현재 가격도 시작 가격을 따른다.
                auction.current_price = start_price;
            }
            if let Some(increment) = cmd.min_bid_increment {
                auction.min_bid_increment = increment;
            }
            if let Some(start_at) = cmd.start_at {
                auction.start_at = start_at;
            }
            if let Some(end_at) = cmd.end_at {
                auction.end_at = end_at;
            }
            if let Some(v) = cmd.anti_snipe_threshold_seconds {
                auction.anti_snipe_threshold_seconds = v;
            }
            if let Some(v) = cmd.anti_snipe_extension_seconds {
                auction.anti_snipe_extension_seconds = v;
            }
            if let Some(v) = cmd.max_extensions {
                auction.max_extensions = v;
            }
            if let Some(v) = cmd.bid_cooldown_seconds {
                auction.bid_cooldown_seconds = v;
            }

            if auction.end_at <= auction.start_at {
                return Err(AuctionError::InvalidWindow);
            }

            let updated: Auction = sqlx::query_as(
                "UPDATE auctions SET title = $1, description = $2, start_price = $3,
                    min_bid_increment = $4, current_price = $5, start_at = $6, end_at = $7,
                    anti_snipe_threshold_seconds = $8, anti_snipe_extension_seconds = $9,
                    max_extensions = $10, bid_cooldown_seconds = $11
                 WHERE id = $12
                 RETURNING *",
            )
            .bind(&auction.title)
            .bind(&auction.description)
            .bind(auction.start_price)
            .bind(auction.min_bid_increment)
            .bind(auction.current_price)
            .bind(auction.start_at)
            .bind(auction.end_at)
            .bind(auction.anti_snipe_threshold_seconds)
            .bind(auction.anti_snipe_extension_seconds)
            .bind(auction.max_extensions)
            .bind(auction.bid_cooldown_seconds)
            .bind(auction_id)
            .fetch_one(&mut **tx)
            .await?;
            Ok(updated)
        })
    })
    .await
}

/// 자산 첨부 (DRAFT 전용, 판매자 전용)
pub async fn add_asset(
    db: &DatabaseManager,
    auction_id: i64,
    actor_id: i64,
    url: String,
    position: i32,
) -> Result<AuctionAsset, AuctionError> {
    info!("{:<12} --> 자산 첨부: auction_id={}", "Command", auction_id);

    db.transaction(|tx| {
        Box::pin(async move {
            let auction = fetch_for_update(tx, auction_id).await?;
            if auction.seller_id != actor_id {
                return Err(AuctionError::NotSeller);
            }
            if auction.status != "DRAFT" {
                return Err(AuctionError::InvalidTransition {
                    current: auction.status,
                });
            }

            let asset: AuctionAsset = sqlx::query_as(
                "INSERT INTO auction_assets (auction_id, url, position)
                 VALUES ($1, $2, $3)
                 RETURNING *",
            )
            .bind(auction_id)
            .bind(&url)
            .bind(position)
            .fetch_one(&mut **tx)
            .await?;
            Ok(asset)
        })
    })
    .await
}

/// 경매 공개: DRAFT → ACTIVE
/// 자산 1개 이상, 종료 시각이 미래이고 시작 시각보다 뒤여야 한다.
pub async fn publish(
    db: &DatabaseManager,
    channel: Arc<dyn RoomChannel>,
    auction_id: i64,
    actor_id: i64,
) -> Result<Auction, AuctionError> {
    info!("{:<12} --> 경매 공개: id={}", "Command", auction_id);

    let auction = db
        .transaction(|tx| {
            Box::pin(async move {
                let auction = fetch_for_update(tx, auction_id).await?;
                if auction.seller_id != actor_id {
                    return Err(AuctionError::NotSeller);
                }
                if auction.status != "DRAFT" {
                    return Err(AuctionError::InvalidTransition {
                        current: auction.status,
                    });
                }

                let now = Utc::now();
                if auction.end_at <= now || auction.end_at <= auction.start_at {
                    return Err(AuctionError::InvalidWindow);
                }

                let asset_count: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM auction_assets WHERE auction_id = $1")
                        .bind(auction_id)
                        .fetch_one(&mut **tx)
                        .await?;
                if asset_count == 0 {
                    return Err(AuctionError::NoAssets);
                }

                let published: Auction = sqlx::query_as(
                    "UPDATE auctions SET status = 'ACTIVE' WHERE id = $1 RETURNING *",
                )
                .bind(auction_id)
                .fetch_one(&mut **tx)
                .await?;
                Ok(published)
            })
        })
        .await?;

    activity::record(
        db.get_pool(),
        channel,
        NewActivity::lifecycle(auction_id, "PUBLISH", "경매가 공개되었습니다.", actor_id),
    );
    Ok(auction)
}

/// 일시정지: ACTIVE(진행 중) → ACTIVE(일시정지)
pub async fn pause(
    db: &DatabaseManager,
    channel: Arc<dyn RoomChannel>,
    auction_id: i64,
    actor_id: i64,
) -> Result<Auction, AuctionError> {
    info!("{:<12} --> 경매 일시정지: id={}", "Command", auction_id);

    let auction = db
        .transaction(|tx| {
            Box::pin(async move {
                let auction = fetch_for_update(tx, auction_id).await?;
                if auction.seller_id != actor_id {
                    return Err(AuctionError::NotSeller);
                }
                if auction.status != "ACTIVE" || auction.is_paused {
                    return Err(AuctionError::InvalidTransition {
                        current: transition_label(&auction),
                    });
                }

                let paused: Auction = sqlx::query_as(
                    "UPDATE auctions SET is_paused = TRUE WHERE id = $1 RETURNING *",
                )
                .bind(auction_id)
                .fetch_one(&mut **tx)
                .await?;
                Ok(paused)
            })
        })
        .await?;

    activity::record(
        db.get_pool(),
        channel,
        NewActivity::lifecycle(auction_id, "PAUSE", "경매가 일시정지되었습니다.", actor_id),
    );
    Ok(auction)
}

/// 재개: ACTIVE(일시정지) → ACTIVE(진행 중)
/// 일시정지 중에 종료 시각이 지났다면, 만료된 경매를 되살리는 대신 즉시 종료한다.
pub async fn resume(
    db: &DatabaseManager,
    channel: Arc<dyn RoomChannel>,
    auction_id: i64,
    actor_id: i64,
) -> Result<ResumeOutcome, AuctionError> {
    info!("{:<12} --> 경매 재개: id={}", "Command", auction_id);

    let auction = db
        .transaction(|tx| {
            Box::pin(async move {
                let auction = fetch_for_update(tx, auction_id).await?;
                if auction.seller_id != actor_id {
                    return Err(AuctionError::NotSeller);
                }
                if auction.status != "ACTIVE" || !auction.is_paused {
                    return Err(AuctionError::InvalidTransition {
                        current: transition_label(&auction),
                    });
                }

                let resumed: Auction = sqlx::query_as(
                    "UPDATE auctions SET is_paused = FALSE WHERE id = $1 RETURNING *",
                )
                .bind(auction_id)
                .fetch_one(&mut **tx)
                .await?;
                Ok(resumed)
            })
        })
        .await?;

    activity::record(
        db.get_pool(),
        Arc::clone(&channel),
        NewActivity::lifecycle(auction_id, "RESUME", "경매가 재개되었습니다.", actor_id),
    );

    if Utc::now() >= auction.end_at {
        let outcome = end(db, channel, auction_id, Some(actor_id)).await?;
        return Ok(ResumeOutcome {
            auction,
            ended: Some(outcome),
        });
    }

    Ok(ResumeOutcome {
        auction,
        ended: None,
    })
}

/// 취소: DRAFT → CANCELLED (종료 상태)
pub async fn cancel(
    db: &DatabaseManager,
    channel: Arc<dyn RoomChannel>,
    auction_id: i64,
    actor_id: i64,
) -> Result<Auction, AuctionError> {
    info!("{:<12} --> 경매 취소: id={}", "Command", auction_id);

    let auction = db
        .transaction(|tx| {
            Box::pin(async move {
                let auction = fetch_for_update(tx, auction_id).await?;
                if auction.seller_id != actor_id {
                    return Err(AuctionError::NotSeller);
                }
                if auction.status != "DRAFT" {
                    return Err(AuctionError::InvalidTransition {
                        current: auction.status,
                    });
                }

                let cancelled: Auction = sqlx::query_as(
                    "UPDATE auctions SET status = 'CANCELLED' WHERE id = $1 RETURNING *",
                )
                .bind(auction_id)
                .fetch_one(&mut **tx)
                .await?;
                Ok(cancelled)
            })
        })
        .await?;

    activity::record(
        db.get_pool(),
        channel,
        NewActivity::lifecycle(auction_id, "CANCEL", "경매가 취소되었습니다.", actor_id),
    );
    Ok(auction)
}

/// 종료: ACTIVE → ENDED (판매자 또는 스케줄러)
/// 이미 종료/취소된 경매에 대해서는 success=false를 반환하는 멱등 no-op.
/// 낙찰자는 유효 입찰 중 최고 금액, 동률이면 먼저 커밋된 입찰(생성 시각, id 순)이 이긴다.
pub async fn end(
    db: &DatabaseManager,
    channel: Arc<dyn RoomChannel>,
    auction_id: i64,
    actor_id: Option<i64>,
) -> Result<EndOutcome, AuctionError> {
    info!("{:<12} --> 경매 종료: id={}", "Command", auction_id);

    let outcome = db
        .transaction(|tx| {
            Box::pin(async move {
                let auction = fetch_for_update(tx, auction_id).await?;
                if let Some(actor) = actor_id {
                    if auction.seller_id != actor {
                        return Err(AuctionError::NotSeller);
                    }
                }

                match auction.status.as_str() {
                    "ENDED" | "CANCELLED" => {
                        // 스케줄러가 무조건 재시도해도 안전해야 한다.
                        return Ok(EndOutcome {
                            success: false,
                            auction_id,
                            winner_id: auction.winner_id,
                            final_price: auction.current_price,
                            completion_status: auction.completion_status,
                        });
                    }
                    "ACTIVE" => {}
                    _ => {
                        return Err(AuctionError::InvalidTransition {
                            current: auction.status,
                        });
                    }
                }

                let winning_bid: Option<Bid> = sqlx::query_as(
                    "SELECT * FROM bids
                     WHERE auction_id = $1 AND valid
                     ORDER BY amount DESC, created_at ASC, id ASC
                     LIMIT 1",
                )
                .bind(auction_id)
                .fetch_optional(&mut **tx)
                .await?;

                let now = Utc::now();
                match winning_bid {
                    Some(bid) => {
                        let deadline = now + Duration::hours(WINNER_PAYMENT_HOURS);
                        sqlx::query(
                            "UPDATE auctions
                             SET status = 'ENDED', is_paused = FALSE, winner_id = $1,
                                 completion_status = 'PENDING', winner_payment_deadline = $2
                             WHERE id = $3",
                        )
                        .bind(bid.user_id)
                        .bind(deadline)
                        .bind(auction_id)
                        .execute(&mut **tx)
                        .await?;

                        sqlx::query(
                            "INSERT INTO payment_intents (auction_id, winner_id, amount, deadline)
                             VALUES ($1, $2, $3, $4)",
                        )
                        .bind(auction_id)
                        .bind(bid.user_id)
                        .bind(bid.amount)
                        .bind(deadline)
                        .execute(&mut **tx)
                        .await?;

                        Ok(EndOutcome {
                            success: true,
                            auction_id,
                            winner_id: Some(bid.user_id),
                            final_price: bid.amount,
                            completion_status: Some("PENDING".to_string()),
                        })
                    }
                    None => {
                        sqlx::query(
                            "UPDATE auctions
                             SET status = 'ENDED', is_paused = FALSE,
                                 completion_status = 'FAILED'
                             WHERE id = $1",
                        )
                        .bind(auction_id)
                        .execute(&mut **tx)
                        .await?;

                        Ok(EndOutcome {
                            success: true,
                            auction_id,
                            winner_id: None,
                            final_price: auction.start_price,
                            completion_status: Some("FAILED".to_string()),
                        })
                    }
                }
            })
        })
        .await?;

    if outcome.success {
        let description = match outcome.winner_id {
            Some(winner) => format!("경매가 종료되었습니다. 낙찰자: {}", winner),
            None => "경매가 유효 입찰 없이 종료되었습니다.".to_string(),
        };
        activity::record(
            db.get_pool(),
            channel,
            NewActivity {
                auction_id,
                kind: "END",
                description,
                actor_id,
                metadata: serde_json::json!({
                    "winner_id": outcome.winner_id,
                    "final_price": outcome.final_price,
                    "completion_status": outcome.completion_status,
                }),
            },
        );
    }
    Ok(outcome)
}

// endregion: --- Commands

// region:    --- Helpers

/// 경매 행을 쓰기 잠금으로 재조회 (lost update 2차 방어선)
pub(crate) async fn fetch_for_update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    auction_id: i64,
) -> Result<Auction, AuctionError> {
    sqlx::query_as::<_, Auction>("SELECT * FROM auctions WHERE id = $1 FOR UPDATE")
        .bind(auction_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AuctionError::AuctionNotFound)
}

fn transition_label(auction: &Auction) -> String {
    if auction.status == "ACTIVE" && auction.is_paused {
        "ACTIVE(PAUSED)".to_string()
    } else {
        auction.status.clone()
    }
}

// endregion: --- Helpers
