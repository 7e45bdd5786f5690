/// 참가자 입장/철회 커맨드 처리
/// 철회는 입찰과 같은 경매별 잠금 경로를 지나므로, 아직 커밋되지 않은 입찰에
/// 대해 가격을 재계산하는 일은 발생하지 않는다.
// region:    --- Imports
use crate::activity::{self, NewActivity};
use crate::auction::commands::fetch_for_update;
use crate::database::DatabaseManager;
use crate::error::AuctionError;
use crate::lock::AuctionLockManager;
use crate::participant::model::{Participant, Revocation};
use crate::query::queries;
use crate::room::RoomChannel;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Commands

/// 경매 룸 입장
/// 첫 입장 시 참가자 행을 만들고, 재입장은 no-op. 철회된 사용자는 재입장 불가.
pub async fn enter(
    db: &DatabaseManager,
    channel: Arc<dyn RoomChannel>,
    auction_id: i64,
    user_id: i64,
) -> Result<Participant, AuctionError> {
    info!(
        "{:<12} --> 룸 입장: auction_id={}, user_id={}",
        "Command", auction_id, user_id
    );

    let participant = db
        .transaction(|tx| {
            Box::pin(async move {
                let auction = fetch_for_update(tx, auction_id).await?;
                if auction.status != "ACTIVE" {
                    return Err(AuctionError::InvalidTransition {
                        current: auction.status,
                    });
                }

                let existing: Option<Participant> = sqlx::query_as(queries::GET_PARTICIPANT)
                    .bind(auction_id)
                    .bind(user_id)
                    .fetch_optional(&mut **tx)
                    .await?;

                if let Some(existing) = existing {
                    if existing.revoked_at.is_some() {
                        return Err(AuctionError::UserRevoked);
                    }
                    return Ok(existing);
                }

                let participant: Participant = sqlx::query_as(
                    "INSERT INTO participants (auction_id, user_id)
                     VALUES ($1, $2)
                     RETURNING *",
                )
                .bind(auction_id)
                .bind(user_id)
                .fetch_one(&mut **tx)
                .await?;
                Ok(participant)
            })
        })
        .await?;

    activity::record(
        db.get_pool(),
        channel,
        NewActivity {
            auction_id,
            kind: "JOIN",
            description: format!("사용자 {}가 입장했습니다.", user_id),
            actor_id: Some(user_id),
            metadata: serde_json::json!({}),
        },
    );
    Ok(participant)
}

/// 참가 철회: 대상의 입찰을 전부 무효화하고 가격을 재계산한다.
/// 판매자 전용. 재철회는 no-op.
pub async fn revoke(
    db: &DatabaseManager,
    locks: &AuctionLockManager,
    channel: Arc<dyn RoomChannel>,
    auction_id: i64,
    actor_id: i64,
    target_user_id: i64,
) -> Result<Revocation, AuctionError> {
    info!(
        "{:<12} --> 참가 철회: auction_id={}, target={}",
        "Command", auction_id, target_user_id
    );

    let revocation = locks
        .with_auction_lock(auction_id, || async move {
            db.transaction(|tx| {
                Box::pin(async move {
                    let auction = fetch_for_update(tx, auction_id).await?;
                    if auction.seller_id != actor_id {
                        return Err(AuctionError::NotSeller);
                    }

                    let participant: Option<Participant> =
                        sqlx::query_as(queries::GET_PARTICIPANT)
                            .bind(auction_id)
                            .bind(target_user_id)
                            .fetch_optional(&mut **tx)
                            .await?;
                    let participant = participant.ok_or(AuctionError::NotParticipant)?;

                    if participant.revoked_at.is_some() {
                        // 멱등: 이미 철회된 참가자는 그대로 둔다.
                        return Ok(Revocation {
                            invalidated_bids: 0,
                            price_changed: false,
                            old_price: auction.current_price,
                            new_price: auction.current_price,
                        });
                    }

                    sqlx::query(
                        "UPDATE participants SET revoked_at = $1
                         WHERE auction_id = $2 AND user_id = $3",
                    )
                    .bind(Utc::now())
                    .bind(auction_id)
                    .bind(target_user_id)
                    .execute(&mut **tx)
                    .await?;

                    let invalidated = sqlx::query(
                        "UPDATE bids SET valid = FALSE
                         WHERE auction_id = $1 AND user_id = $2 AND valid",
                    )
                    .bind(auction_id)
                    .bind(target_user_id)
                    .execute(&mut **tx)
                    .await?
                    .rows_affected();

                    // 가격 재계산: 남은 유효 입찰의 최고가, 없으면 시작 가격으로 복귀
                    let highest: Option<i64> = sqlx::query_scalar(
                        "SELECT MAX(amount) FROM bids WHERE auction_id = $1 AND valid",
                    )
                    .bind(auction_id)
                    .fetch_one(&mut **tx)
                    .await?;
                    let new_price = highest.unwrap_or(auction.start_price);

                    let price_changed = new_price != auction.current_price;
                    if price_changed {
                        sqlx::query("UPDATE auctions SET current_price = $1 WHERE id = $2")
                            .bind(new_price)
                            .bind(auction_id)
                            .execute(&mut **tx)
                            .await?;
                    }

                    Ok(Revocation {
                        invalidated_bids: invalidated,
                        price_changed,
                        old_price: auction.current_price,
                        new_price,
                    })
                })
            })
            .await
        })
        .await?;

    activity::record(
        db.get_pool(),
        channel,
        NewActivity {
            auction_id,
            kind: "REVOKE",
            description: format!(
                "사용자 {}의 참가가 철회되었습니다. (무효화된 입찰 {}건)",
                target_user_id, revocation.invalidated_bids
            ),
            actor_id: Some(actor_id),
            metadata: serde_json::json!({
                "target_user_id": target_user_id,
                "invalidated_bids": revocation.invalidated_bids,
                "old_price": revocation.old_price,
                "new_price": revocation.new_price,
            }),
        },
    );
    Ok(revocation)
}

/// 철회 해제: revoked_at만 지운다.
/// 무효화된 입찰과 가격은 복원하지 않는다. (의도된 비대칭)
pub async fn unrevoke(
    db: &DatabaseManager,
    channel: Arc<dyn RoomChannel>,
    auction_id: i64,
    actor_id: i64,
    target_user_id: i64,
) -> Result<Participant, AuctionError> {
    info!(
        "{:<12} --> 철회 해제: auction_id={}, target={}",
        "Command", auction_id, target_user_id
    );

    let participant = db
        .transaction(|tx| {
            Box::pin(async move {
                let auction = fetch_for_update(tx, auction_id).await?;
                if auction.seller_id != actor_id {
                    return Err(AuctionError::NotSeller);
                }

                let participant: Option<Participant> = sqlx::query_as(
                    "UPDATE participants SET revoked_at = NULL
                     WHERE auction_id = $1 AND user_id = $2
                     RETURNING *",
                )
                .bind(auction_id)
                .bind(target_user_id)
                .fetch_optional(&mut **tx)
                .await?;
                participant.ok_or(AuctionError::NotParticipant)
            })
        })
        .await?;

    activity::record(
        db.get_pool(),
        channel,
        NewActivity {
            auction_id,
            kind: "UNREVOKE",
            description: format!("사용자 {}의 철회가 해제되었습니다.", target_user_id),
            actor_id: Some(actor_id),
            metadata: serde_json::json!({ "target_user_id": target_user_id }),
        },
    );
    Ok(participant)
}

// endregion: --- Commands
