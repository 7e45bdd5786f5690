/// 경매별 분산 잠금 및 입찰 쿨다운 캐시
/// 잠금은 Postgres advisory lock으로 구현하며, 하나의 경매에 대한
/// 입찰/철회 스트림을 프로세스 경계를 넘어 직렬화하는 유일한 지점이다.
// region:    --- Imports
use crate::error::AuctionError;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

// endregion: --- Imports

// region:    --- Auction Lock Manager

/// 잠금 획득 대기 한도
const LOCK_ACQUIRE_BUDGET_MS: u64 = 5_000;
/// try-lock 재시도 간격
const LOCK_RETRY_INTERVAL_MS: u64 = 100;

pub struct AuctionLockManager {
    pool: Arc<PgPool>,
}

/// 잠금을 쥔 채로 드롭되는 커넥션을 풀에서 분리하는 가드
/// 클라이언트 연결 종료 등으로 임계 구역의 future가 await 지점에서 드롭되면
/// unlock이 실행되지 않는다. 그 커넥션이 잠금을 쥔 채 풀로 돌아가면 이후
/// 모든 세션의 try-lock이 실패하므로, 취소 경로에서는 세션 자체를 끊어
/// 서버가 잠금을 회수하게 한다. (세션 종료 = advisory lock 해제)
struct HeldLock {
    conn: Option<sqlx::pool::PoolConnection<sqlx::Postgres>>,
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}

impl AuctionLockManager {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// 경매별 잠금 범위 안에서 클로저 실행
    /// 한도 내에 잠금을 얻지 못하면 LockBusy(재시도 가능)를 반환한다.
    /// 잠금 해제는 성공/실패 모든 종료 경로에서 수행하며, 임계 구역 도중
    /// future가 취소되면 HeldLock 가드가 커넥션을 풀에서 분리해 닫는다.
    pub async fn with_auction_lock<F, Fut, R>(
        &self,
        auction_id: i64,
        f: F,
    ) -> Result<R, AuctionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, AuctionError>>,
    {
        // 잠금은 세션 단위이므로 전용 커넥션을 잡아 유지한다.
        let mut conn = self.pool.acquire().await?;
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(LOCK_ACQUIRE_BUDGET_MS);

        loop {
            let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
                .bind(auction_id)
                .fetch_one(&mut *conn)
                .await?;
            if acquired {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "{:<12} --> 잠금 획득 실패(한도 초과): auction_id={}",
                    "Lock", auction_id
                );
                return Err(AuctionError::LockBusy);
            }
            tokio::time::sleep(Duration::from_millis(LOCK_RETRY_INTERVAL_MS)).await;
        }

        // 여기서부터 잠금을 쥔 상태. break와 가드 생성 사이에는 await 지점이 없다.
        let mut held = HeldLock { conn: Some(conn) };

        let result = f().await;

        if let Some(conn) = held.conn.as_mut() {
            match sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
                .bind(auction_id)
                .fetch_one(&mut **conn)
                .await
            {
                Ok(_) => {
                    // 정상 해제: 커넥션을 풀로 되돌린다.
                    drop(held.conn.take());
                }
                Err(e) => {
                    // 해제 실패 시 가드가 커넥션을 분리해 닫는다.
                    error!(
                        "{:<12} --> 잠금 해제 실패: auction_id={}, {:?}",
                        "Lock", auction_id, e
                    );
                }
            }
        }

        result
    }
}

// endregion: --- Auction Lock Manager

// region:    --- Cooldown Cache

/// 입찰 시각 기록 (best-effort)
/// 실패는 로깅만 하고 입찰 결과에 영향을 주지 않는다.
/// 쿨다운 판정 자체는 항상 트랜잭션 안에서 bids 테이블을 기준으로 한다.
pub fn record_bid_timestamp(
    pool: Arc<PgPool>,
    auction_id: i64,
    user_id: i64,
    at: DateTime<Utc>,
) {
    tokio::spawn(async move {
        let result = sqlx::query(
            "INSERT INTO bid_cooldowns (auction_id, user_id, last_bid_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (auction_id, user_id)
             DO UPDATE SET last_bid_at = EXCLUDED.last_bid_at",
        )
        .bind(auction_id)
        .bind(user_id)
        .bind(at)
        .execute(&*pool)
        .await;

        if let Err(e) = result {
            error!(
                "{:<12} --> 입찰 시각 기록 실패: auction_id={}, user_id={}, {:?}",
                "Cooldown", auction_id, user_id, e
            );
        }
    });
}

/// 마지막 입찰 시각 조회 (표시용 힌트)
pub async fn last_bid_timestamp(
    pool: &PgPool,
    auction_id: i64,
    user_id: i64,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT last_bid_at FROM bid_cooldowns WHERE auction_id = $1 AND user_id = $2",
    )
    .bind(auction_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

// endregion: --- Cooldown Cache
