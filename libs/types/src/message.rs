//! Messages published on the asynchronous output lanes.

use crate::ids::UserId;
use crate::order::Order;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an order request or cancel was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiError {
    #[error("order price and quantity must be positive")]
    InvalidParameter,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("order not found")]
    OrderNotFound,
    #[error("order does not belong to user")]
    NotOwner,
}

/// Outcome of one order request or cancel, correlated by `ref_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResultMessage {
    pub ref_id: String,
    pub created_at: i64,
    pub error: Option<ApiError>,
    pub order: Option<Order>,
}

impl ApiResultMessage {
    pub fn order_success(ref_id: String, order: Order, timestamp: i64) -> Self {
        Self {
            ref_id,
            created_at: timestamp,
            error: None,
            order: Some(order),
        }
    }

    pub fn failure(ref_id: String, error: ApiError, timestamp: i64) -> Self {
        Self {
            ref_id,
            created_at: timestamp,
            error: Some(error),
            order: None,
        }
    }
}

/// Kind of user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderMatched,
    OrderCanceled,
}

/// Push notification about a change to one user's order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub created_at: i64,
    pub kind: NotificationKind,
    pub user_id: UserId,
    pub order: Order,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::OrderId;
    use crate::numeric::{Price, Quantity};
    use crate::order::Direction;

    #[test]
    fn test_result_constructors() {
        let order = Order::new(
            OrderId::derive(1, 1_708_123_456_789),
            1,
            UserId(100),
            Direction::BUY,
            Price::from_u64(100),
            Quantity::from_u64(1),
            false,
            1_708_123_456_789,
        );
        let ok = ApiResultMessage::order_success("r1".to_string(), order, 1);
        assert!(ok.error.is_none());
        assert!(ok.order.is_some());

        let err = ApiResultMessage::failure("r2".to_string(), ApiError::InsufficientBalance, 1);
        assert_eq!(err.error, Some(ApiError::InsufficientBalance));
        assert!(err.order.is_none());
    }

    #[test]
    fn test_api_error_serialization() {
        let json = serde_json::to_string(&ApiError::OrderNotFound).unwrap();
        assert_eq!(json, "\"ORDER_NOT_FOUND\"");
        let json = serde_json::to_string(&ApiError::InvalidParameter).unwrap();
        assert_eq!(json, "\"INVALID_PARAMETER\"");
    }
}
