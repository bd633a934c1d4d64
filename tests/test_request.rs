use larder::http::request::{Method, Request, RequestBuilder};

fn request_with_headers(headers: &[&str]) -> Request {
    Request {
        method: Method::GET,
        target: "http://example.com/".to_string(),
        version: "HTTP/1.0".to_string(),
        headers: headers.iter().map(|h| h.to_string()).collect(),
        body: vec![],
    }
}

#[test]
fn test_request_header_retrieval() {
    let req = request_with_headers(&["Host: example.com", "Content-Type: application/json"]);

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("Content-Type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_header_name_is_case_insensitive() {
    let req = request_with_headers(&["content-LENGTH:   12  "]);

    assert_eq!(req.header("Content-Length"), Some("12"));
    assert_eq!(req.content_length(), 12);
}

#[test]
fn test_request_header_skips_lines_without_colon() {
    let req = request_with_headers(&["BrokenHeader", "Host: example.com"]);

    assert_eq!(req.header("Host"), Some("example.com"));
}

#[test]
fn test_request_first_duplicate_header_wins() {
    let req = request_with_headers(&["X-Tag: one", "X-Tag: two"]);

    assert_eq!(req.header("x-tag"), Some("one"));
}

#[test]
fn test_request_content_length_missing_or_invalid() {
    assert_eq!(request_with_headers(&[]).content_length(), 0);
    assert_eq!(
        request_with_headers(&["Content-Length: not-a-number"]).content_length(),
        0
    );
}

#[test]
fn test_request_method_from_string() {
    assert_eq!(Method::from_str("GET"), Some(Method::GET));
    assert_eq!(Method::from_str("POST"), Some(Method::POST));
    assert_eq!(
        Method::from_str("MKCOL"),
        Some(Method::Extension("MKCOL".to_string()))
    );
    assert_eq!(Method::from_str("get"), None); // Case-sensitive
    assert_eq!(Method::from_str(""), None);
    assert_eq!(Method::from_str("GE T"), None);
}

#[test]
fn test_request_method_display_round_trips() {
    for method in Method::standard() {
        assert_eq!(Method::from_str(&method.to_string()), Some(method));
    }
}

#[test]
fn test_request_builder() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .target("http://example.com/api")
        .header_line("Content-Length: 4")
        .body(b"data".to_vec())
        .build()
        .unwrap();

    assert_eq!(req.version, "HTTP/1.0");
    assert_eq!(req.headers, vec!["Content-Length: 4".to_string()]);
    assert_eq!(req.body, b"data".to_vec());
}

#[test]
fn test_request_builder_requires_method_and_target() {
    assert!(RequestBuilder::new().target("http://example.com/").build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).target("").build().is_err());
}
