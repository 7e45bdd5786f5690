/// 입찰 배치 오케스트레이터
/// 경매별 분산 잠금 → 참가자 확인 → 단일 트랜잭션(쓰기 잠금 재조회, 쿨다운,
/// 상태/시간 창, 금액 검증, 입찰 삽입, 가격 갱신, 안티 스나이핑) 순서로 처리한다.
// region:    --- Imports
use crate::activity::{self, NewActivity};
use crate::auction::commands::fetch_for_update;
use crate::bidding::antisnipe;
use crate::bidding::model::{Bid, BidPlacement};
use crate::database::DatabaseManager;
use crate::error::AuctionError;
use crate::lock::{self, AuctionLockManager};
use crate::participant::model::Participant;
use crate::query::queries;
use crate::room::RoomChannel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Commands

/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub user_id: i64,
    pub amount: i64,
}

/// 입찰 처리
pub async fn place_bid(
    db: &DatabaseManager,
    locks: &AuctionLockManager,
    channel: Arc<dyn RoomChannel>,
    cmd: PlaceBidCommand,
) -> Result<BidPlacement, AuctionError> {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

    let auction_id = cmd.auction_id;
    let user_id = cmd.user_id;
    let amount = cmd.amount;

    locks
        .with_auction_lock(auction_id, || async move {
            // 참가자 게이트 (철회된 사용자는 입찰 불가)
            let participant: Option<Participant> = sqlx::query_as(queries::GET_PARTICIPANT)
                .bind(auction_id)
                .bind(user_id)
                .fetch_optional(db.pool())
                .await?;
            let participant = participant.ok_or(AuctionError::NotParticipant)?;
            if participant.revoked_at.is_some() {
                return Err(AuctionError::UserRevoked);
            }

            let placement = db
                .transaction(|tx| {
                    Box::pin(async move {
                        let auction = fetch_for_update(tx, auction_id).await?;
                        let now = Utc::now();

                        // 쿨다운: 같은 사용자의 직전 입찰과의 간격 (무효화된 입찰 포함)
                        if auction.bid_cooldown_seconds > 0 {
                            let last: Option<DateTime<Utc>> = sqlx::query_scalar(
                                "SELECT MAX(created_at) FROM bids
                                 WHERE auction_id = $1 AND user_id = $2",
                            )
                            .bind(auction_id)
                            .bind(user_id)
                            .fetch_one(&mut **tx)
                            .await?;

                            if let Some(last) = last {
                                let elapsed_ms = (now - last).num_milliseconds();
                                let cooldown_ms = auction.bid_cooldown_seconds * 1_000;
                                if elapsed_ms < cooldown_ms {
                                    // 남은 시간은 올림으로 보고
                                    let retry_after_seconds =
                                        (cooldown_ms - elapsed_ms + 999) / 1_000;
                                    return Err(AuctionError::RateLimited {
                                        retry_after_seconds,
                                    });
                                }
                            }
                        }

                        // 상태 및 시간 창 검증
                        match auction.status.as_str() {
                            "ACTIVE" => {}
                            "DRAFT" => return Err(AuctionError::NotStarted),
                            _ => return Err(AuctionError::AlreadyEnded),
                        }
                        if auction.is_paused {
                            return Err(AuctionError::AuctionPaused);
                        }
                        if now < auction.start_at {
                            return Err(AuctionError::NotStarted);
                        }
                        if now > auction.end_at {
                            return Err(AuctionError::AlreadyEnded);
                        }
                        if user_id == auction.seller_id {
                            return Err(AuctionError::SellerCannotBid);
                        }

                        // 정수 비교, 허용 오차 없음
                        let minimum = auction.current_price + auction.min_bid_increment;
                        if amount < minimum {
                            return Err(AuctionError::BidTooLow { minimum });
                        }

                        let bid: Bid = sqlx::query_as(
                            "INSERT INTO bids (auction_id, user_id, amount, valid, created_at)
                             VALUES ($1, $2, $3, TRUE, $4)
                             RETURNING *",
                        )
                        .bind(auction_id)
                        .bind(user_id)
                        .bind(amount)
                        .bind(now)
                        .fetch_one(&mut **tx)
                        .await?;

                        sqlx::query("UPDATE auctions SET current_price = $1 WHERE id = $2")
                            .bind(amount)
                            .bind(auction_id)
                            .execute(&mut **tx)
                            .await?;

                        // 안티 스나이핑: 같은 잠금/트랜잭션 안에서 판정하고 반영
                        let decision = antisnipe::evaluate(
                            now,
                            auction.end_at,
                            auction.anti_snipe_threshold_seconds,
                            auction.extension_count,
                            auction.max_extensions,
                            auction.anti_snipe_extension_seconds,
                        );
                        if decision.extended {
                            sqlx::query(
                                "UPDATE auctions SET end_at = $1, extension_count = $2
                                 WHERE id = $3",
                            )
                            .bind(decision.new_end_at)
                            .bind(decision.new_extension_count)
                            .bind(auction_id)
                            .execute(&mut **tx)
                            .await?;
                        }

                        Ok(BidPlacement {
                            bid,
                            extended: decision.extended,
                            new_end_time: decision.new_end_at,
                            extension_count: decision.new_extension_count,
                        })
                    })
                })
                .await?;

            // 커밋 이후 best-effort 부수효과: 감사 로그와 쿨다운 캐시
            activity::record(
                db.get_pool(),
                Arc::clone(&channel),
                NewActivity {
                    auction_id,
                    kind: "BID",
                    description: format!("입찰 수락: {} (사용자 {})", amount, user_id),
                    actor_id: Some(user_id),
                    metadata: serde_json::json!({ "amount": amount, "bid_id": placement.bid.id }),
                },
            );
            if placement.extended {
                activity::record(
                    db.get_pool(),
                    channel,
                    NewActivity {
                        auction_id,
                        kind: "EXTENSION",
                        description: format!(
                            "경매 종료 시각이 연장되었습니다. (연장 {}회)",
                            placement.extension_count
                        ),
                        actor_id: None,
                        metadata: serde_json::json!({
                            "new_end_time": placement.new_end_time,
                            "extension_count": placement.extension_count,
                        }),
                    },
                );
            }
            lock::record_bid_timestamp(
                db.get_pool(),
                auction_id,
                user_id,
                placement.bid.created_at,
            );

            Ok(placement)
        })
        .await
}

// endregion: --- Commands
