// tests/property/protocol_props.rs

//! Wire-protocol round-trips for arbitrary methods, URLs and bodies.

use bundlecache::core::gateway::protocol::{WireRequest, WireResponse};
use bundlecache::core::model::{ProxyRequest, ProxyResponse};
use bytes::Bytes;
use proptest::prelude::*;

proptest! {
    /// Request frames survive encode → decode → rebuild with identity on
    /// method, url, headers, body and request id.
    #[test]
    fn prop_wire_request_roundtrip(
        method in "[A-Z]{3,7}",
        path in "[a-zA-Z0-9/_.-]{0,24}",
        body in proptest::collection::vec(any::<u8>(), 0..512),
        header_value in "[a-zA-Z0-9 ,;=/-]{0,32}",
    ) {
        let mut request = ProxyRequest::new(method, format!("http://prop.test/{path}"));
        request.body = Bytes::from(body);
        request
            .headers
            .insert("Accept".to_string(), vec![header_value]);

        let frame = WireRequest::new("0123456789abcdef", &request);
        let encoded = frame.encode().unwrap();
        let decoded: WireRequest = serde_json::from_slice(&encoded).unwrap();
        prop_assert_eq!(&decoded, &frame);
        prop_assert_eq!(&decoded.request_id, "0123456789abcdef");

        let rebuilt = decoded.into_request().unwrap();
        prop_assert_eq!(rebuilt.method, request.method);
        prop_assert_eq!(rebuilt.url, request.url);
        prop_assert_eq!(rebuilt.headers, request.headers);
        prop_assert_eq!(rebuilt.body, request.body);
    }

    /// Response frames survive the same cycle.
    #[test]
    fn prop_wire_response_roundtrip(
        status in 100u16..600,
        body in proptest::collection::vec(any::<u8>(), 0..512),
        content_type in prop_oneof![
            Just("text/html"),
            Just("application/json"),
            Just("application/octet-stream"),
        ],
    ) {
        let response = ProxyResponse::new(status, Bytes::from(body), content_type);

        let frame = WireResponse::from_response("fedcba9876543210", &response);
        let encoded = frame.encode().unwrap();
        let decoded = WireResponse::decode(&encoded).unwrap();
        prop_assert_eq!(&decoded, &frame);

        let rebuilt = decoded.into_response().unwrap();
        prop_assert_eq!(rebuilt, response);
    }

    /// Queue records (serde JSON of the request model) round-trip.
    #[test]
    fn prop_queue_record_roundtrip(
        path in "[a-z0-9/]{0,24}",
        body in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let mut request = ProxyRequest::new("GET", format!("http://prop.test/{path}"));
        request.body = Bytes::from(body);
        request.content_length = request.body.len() as i64;

        let record = serde_json::to_vec(&request).unwrap();
        let decoded: ProxyRequest = serde_json::from_slice(&record).unwrap();
        prop_assert_eq!(decoded, request);
    }
}
