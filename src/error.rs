/// 경매 서비스 오류 타입
/// 비즈니스 규칙 위반은 전부 타입화된 변형으로 반환하고,
/// 인프라 장애(sqlx)만 Database 변형으로 전파한다.
// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Error Type

#[derive(Debug, Error)]
pub enum AuctionError {
    /// 경매 없음
    #[error("경매를 찾을 수 없습니다.")]
    AuctionNotFound,

    /// 경매 참가자가 아님
    #[error("경매 참가자가 아닙니다. 먼저 입장해 주세요.")]
    NotParticipant,

    /// 판매자에 의해 퇴장당한 사용자
    #[error("판매자에 의해 참가가 철회된 사용자입니다.")]
    UserRevoked,

    /// 판매자 전용 작업
    #[error("판매자만 수행할 수 있는 작업입니다.")]
    NotSeller,

    /// 판매자는 자신의 경매에 입찰 불가
    #[error("판매자는 자신의 경매에 입찰할 수 없습니다.")]
    SellerCannotBid,

    /// 경매별 잠금 획득 실패(재시도 가능)
    #[error("다른 입찰이 처리 중입니다. 잠시 후 다시 시도해 주세요.")]
    LockBusy,

    /// 입찰 쿨다운 위반
    #[error("입찰 간격 제한에 걸렸습니다. {retry_after_seconds}초 후 다시 시도해 주세요.")]
    RateLimited { retry_after_seconds: i64 },

    /// 최소 입찰 금액 미달
    #[error("입찰 금액이 너무 낮습니다. 최소 입찰 금액은 {minimum}입니다.")]
    BidTooLow { minimum: i64 },

    /// 경매 시작 전
    #[error("경매가 아직 시작되지 않았습니다.")]
    NotStarted,

    /// 경매 종료됨
    #[error("경매가 이미 종료되었습니다.")]
    AlreadyEnded,

    /// 일시정지 상태
    #[error("경매가 일시정지 상태입니다.")]
    AuctionPaused,

    /// 허용되지 않는 상태 전이
    #[error("현재 상태({current})에서는 허용되지 않는 작업입니다.")]
    InvalidTransition { current: String },

    /// 자산 없는 경매는 공개 불가
    #[error("자산이 최소 1개 있어야 경매를 공개할 수 있습니다.")]
    NoAssets,

    /// 경매 시간 창이 유효하지 않음
    #[error("경매 시간 설정이 유효하지 않습니다.")]
    InvalidWindow,

    /// 빈 채팅 메시지
    #[error("메시지 내용이 비어 있습니다.")]
    EmptyMessage,

    /// 데이터베이스 오류
    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),
}

impl AuctionError {
    /// 클라이언트용 기계 판독 코드
    pub fn code(&self) -> &'static str {
        match self {
            AuctionError::AuctionNotFound => "NOT_FOUND",
            AuctionError::NotParticipant => "NOT_PARTICIPANT",
            AuctionError::UserRevoked => "USER_REVOKED",
            AuctionError::NotSeller => "NOT_SELLER",
            AuctionError::SellerCannotBid => "SELLER_CANNOT_BID",
            AuctionError::LockBusy => "LOCK_BUSY",
            AuctionError::RateLimited { .. } => "RATE_LIMITED",
            AuctionError::BidTooLow { .. } => "BID_TOO_LOW",
            AuctionError::NotStarted => "NOT_STARTED",
            AuctionError::AlreadyEnded => "ALREADY_ENDED",
            AuctionError::AuctionPaused => "AUCTION_PAUSED",
            AuctionError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AuctionError::NoAssets => "NO_ASSETS",
            AuctionError::InvalidWindow => "INVALID_WINDOW",
            AuctionError::EmptyMessage => "EMPTY_MESSAGE",
            AuctionError::Database(_) => "INTERNAL",
        }
    }

    /// HTTP 상태 코드 매핑
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuctionError::AuctionNotFound => StatusCode::NOT_FOUND,
            AuctionError::NotParticipant
            | AuctionError::UserRevoked
            | AuctionError::NotSeller
            | AuctionError::SellerCannotBid => StatusCode::FORBIDDEN,
            AuctionError::LockBusy => StatusCode::CONFLICT,
            AuctionError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuctionError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// 모든 오류는 {"success": false, "error": {"code", "message"}} 형태로 반환
impl IntoResponse for AuctionError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}

// endregion: --- Error Type

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_carries_remaining_seconds() {
        let err = AuctionError::RateLimited {
            retry_after_seconds: 55,
        };
        assert_eq!(err.code(), "RATE_LIMITED");
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert!(err.to_string().contains("55"));
    }

    #[test]
    fn bid_too_low_reports_minimum() {
        let err = AuctionError::BidTooLow { minimum: 110 };
        assert_eq!(err.code(), "BID_TOO_LOW");
        assert!(err.to_string().contains("110"));
    }

    #[test]
    fn lock_busy_is_conflict() {
        assert_eq!(AuctionError::LockBusy.status_code(), StatusCode::CONFLICT);
    }
}
// endregion: --- Tests
