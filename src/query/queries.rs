/// 경매 조회
pub const GET_AUCTION: &str = "SELECT * FROM auctions WHERE id = $1";

/// 진행 중 경매 목록 (종료 임박 순)
pub const LIST_ACTIVE: &str = r#"
    SELECT * FROM auctions
    WHERE status = 'ACTIVE' AND start_at <= $1
    ORDER BY end_at ASC
"#;

/// 시작 예정 경매 목록 (공개되었으나 시작 전)
pub const LIST_UPCOMING: &str = r#"
    SELECT * FROM auctions
    WHERE status = 'ACTIVE' AND start_at > $1
    ORDER BY start_at ASC
"#;

/// 최신 유효 입찰 조회 (최신순)
pub const LATEST_VALID_BIDS: &str = r#"
    SELECT * FROM bids
    WHERE auction_id = $1 AND valid
    ORDER BY created_at DESC, id DESC
    LIMIT $2
"#;

/// 경매 입찰 이력 조회 (무효화된 입찰 포함, 최신순)
pub const GET_BID_HISTORY: &str = r#"
    SELECT * FROM bids
    WHERE auction_id = $1
    ORDER BY created_at DESC, id DESC
"#;

/// 최신 활동 로그 조회 (최신순)
pub const LATEST_ACTIVITIES: &str = r#"
    SELECT * FROM activities
    WHERE auction_id = $1
    ORDER BY created_at DESC, id DESC
    LIMIT $2
"#;

/// 참가자 조회
pub const GET_PARTICIPANT: &str =
    "SELECT * FROM participants WHERE auction_id = $1 AND user_id = $2";

/// 만료된 진행 중 경매 id 조회 (일시정지 중인 경매는 재개 시점에 종료)
pub const LIST_EXPIRED_ACTIVE: &str = r#"
    SELECT id FROM auctions
    WHERE status = 'ACTIVE' AND is_paused = FALSE AND end_at <= $1
"#;
