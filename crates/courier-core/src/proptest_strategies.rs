//! Property-based testing strategies for generating test data
//!
//! Random but valid payloads, statuses and transport failures for
//! property tests of the codec and the classifier.

#![cfg(test)]

use crate::http::error::TransportErrorCode;
use proptest::collection::{hash_map, vec};
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for generating simple JSON values with controlled depth
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        "[a-zA-Z0-9 ]{0,50}".prop_map(Value::String),
    ];

    leaf.prop_recursive(
        3,  // max depth
        10, // max size
        5,  // items per collection
        |inner| {
            prop_oneof![
                vec(inner.clone(), 0..5).prop_map(Value::Array),
                hash_map("[a-zA-Z_][a-zA-Z0-9_]{0,20}", inner, 0..5)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        },
    )
}

/// Strategy for generating statuses outside 2xx/304
pub fn failure_status_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![
        300u16..=303,
        305u16..=399,
        400u16..=599,
    ]
}

/// Strategy for generating transport failure codes
pub fn transport_error_code_strategy() -> impl Strategy<Value = TransportErrorCode> {
    prop_oneof![
        Just(TransportErrorCode::Network),
        Just(TransportErrorCode::ConnectionAborted),
        Just(TransportErrorCode::TimedOut),
        Just(TransportErrorCode::Canceled),
        Just(TransportErrorCode::TooManyRedirects),
        Just(TransportErrorCode::BadOption),
        Just(TransportErrorCode::BadRequest),
        Just(TransportErrorCode::BadResponse),
        Just(TransportErrorCode::Blank),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::classifier::{ErrorClassifier, StatusTable};
    use crate::http::codec::{encode, ContentType};
    use crate::http::error::{
        ErrorKind, TransportError, NETWORK_ERROR_CODE, NETWORK_ERROR_MESSAGE,
    };
    use crate::http::probe::StaticProbe;
    use crate::testing::response;
    use crate::types::{Code, Payload};
    use std::sync::Arc;

    fn classifier(online: bool) -> ErrorClassifier {
        ErrorClassifier::new(StatusTable::default(), Arc::new(StaticProbe::new(online)))
    }

    proptest! {
        #[test]
        fn test_json_encoding_is_identity(value in json_value_strategy()) {
            let payload = Payload::Json(value);
            let encoded = futures::executor::block_on(encode(&payload, &ContentType::Json)).unwrap();
            prop_assert_eq!(encoded, payload);
        }

        #[test]
        fn test_offline_is_always_network_error(
            code in transport_error_code_strategy(),
            message in "[a-zA-Z ]{0,40}",
            status in proptest::option::of(failure_status_strategy()),
        ) {
            let mut raw = TransportError::new(code, message);
            if let Some(status) = status {
                raw = raw.with_response(response(status, Value::Null));
            }
            let err = classifier(false).from_transport_failure(raw);
            prop_assert_eq!(err.kind(), ErrorKind::Transport);
            prop_assert_eq!(err.code(), &Code::from(NETWORK_ERROR_CODE));
        }

        #[test]
        fn test_network_error_message_always_wins(code in transport_error_code_strategy()) {
            let raw = TransportError::new(code, NETWORK_ERROR_MESSAGE);
            let err = classifier(true).from_transport_failure(raw);
            prop_assert_eq!(err.code(), &Code::from(NETWORK_ERROR_CODE));
        }

        #[test]
        fn test_not_found_ignores_body(body in json_value_strategy()) {
            let err = classifier(true).from_http_status(&response(404, body));
            prop_assert_eq!(err.kind(), ErrorKind::Http);
            prop_assert_eq!(err.code(), &Code::Number(404));
            prop_assert_eq!(err.msg(), "Not Found");
        }

        #[test]
        fn test_http_failures_use_status_as_code(status in failure_status_strategy()) {
            let err = classifier(true).from_http_status(&response(status, Value::Null));
            prop_assert_eq!(err.kind(), ErrorKind::Http);
            prop_assert_eq!(err.code(), &Code::from(status));
            prop_assert!(!err.msg().is_empty());
        }
    }
}
