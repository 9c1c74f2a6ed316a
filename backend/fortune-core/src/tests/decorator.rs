use crate::credential::Credential;
use crate::request::decorator::{
    AUTHORIZATION_HEADER, DEVICE_INFO_HEADER, DeviceInfo, REQUEST_ID_HEADER,
};
use crate::request::{RequestDescriptor, decorate};

use std::collections::HashSet;

use serde_json::{Value, json};

fn device() -> DeviceInfo {
    DeviceInfo {
        is_mobile: false,
        user_agent: String::from("fortune-core/test"),
        platform: String::from("linux"),
        client_version: String::from("0.0.0"),
    }
}

fn descriptors() -> Vec<RequestDescriptor> {
    vec![
        RequestDescriptor::get("divination/history").with_query("page", 1),
        RequestDescriptor::post("divination/start").with_json(json!({ "question": "q" })),
        RequestDescriptor::put("divination/1/rating").with_header("X-Trace", "abc"),
        RequestDescriptor::delete("divination/1"),
        RequestDescriptor::get("user/profile").with_header("authorization", "Bearer forged"),
    ]
}

/// **VALUE**: `Authorization` is present exactly when the access token is non-empty.
///
/// **WHY THIS MATTERS**: Sending `Bearer ` with an empty token makes some
/// servers answer 401 instead of treating the call as anonymous, which
/// would kick off a pointless refresh.
///
/// **BUG THIS CATCHES**: Unconditional header attachment, or a descriptor
/// header sneaking a stale token past the decorator.
#[test]
fn given_any_descriptor_when_decorated_then_authorization_iff_token_present() {
    let logged_in = Credential::new("access-1", "refresh-1");
    let logged_out = Credential::default();
    let blank = Credential::new("   ", "refresh-1");

    for descriptor in descriptors() {
        let with_token = decorate(&descriptor, &logged_in, &device());
        assert_eq!(
            with_token.header(AUTHORIZATION_HEADER),
            Some("Bearer access-1"),
            "{}",
            descriptor.key()
        );

        for credential in [&logged_out, &blank] {
            let without = decorate(&descriptor, credential, &device());
            assert_eq!(without.header(AUTHORIZATION_HEADER), None, "{}", descriptor.key());
        }
    }
}

#[test]
fn given_repeated_decoration_when_decorated_then_request_ids_are_unique() {
    let descriptor = RequestDescriptor::get("divination/stats");
    let credential = Credential::default();

    let ids: HashSet<String> = (0..50)
        .map(|_| decorate(&descriptor, &credential, &device()).request_id)
        .collect();

    assert_eq!(ids.len(), 50);
}

#[test]
fn given_descriptor_when_decorated_then_tracing_and_device_headers_attached() {
    let descriptor = RequestDescriptor::put("divination/1/rating").with_header("X-Trace", "abc");
    let decorated = decorate(&descriptor, &Credential::default(), &device());

    assert_eq!(decorated.header("x-trace"), Some("abc"));
    assert_eq!(
        decorated.header(REQUEST_ID_HEADER),
        Some(decorated.request_id.as_str())
    );

    let device_header: Value = serde_json::from_str(
        decorated
            .header(DEVICE_INFO_HEADER)
            .expect("device header present"),
    )
    .expect("device header is JSON");
    assert_eq!(device_header["isMobile"], json!(false));
    assert_eq!(device_header["platform"], json!("linux"));
    assert_eq!(device_header["clientVersion"], json!("0.0.0"));
}

/// **VALUE**: Decoration never mutates the descriptor it was given.
///
/// **BUG THIS CATCHES**: A retry or replay reusing headers (old request id,
/// old bearer token) from a previous attempt.
#[test]
fn given_descriptor_when_decorated_twice_then_descriptor_unchanged() {
    let descriptor = RequestDescriptor::get("divination/history").with_query("page", 2);
    let before = descriptor.clone();

    let first = decorate(&descriptor, &Credential::new("old", "r"), &device());
    let second = decorate(&descriptor, &Credential::new("new", "r"), &device());

    assert_eq!(descriptor, before);
    assert_eq!(first.header(AUTHORIZATION_HEADER), Some("Bearer old"));
    assert_eq!(second.header(AUTHORIZATION_HEADER), Some("Bearer new"));
    assert_ne!(first.request_id, second.request_id);
}
