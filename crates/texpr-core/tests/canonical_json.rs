use serde_json::json;
use texpr_core::{from_json_slice, sha256_hex, to_pretty_json_bytes};

#[test]
fn pretty_output_sorts_keys() {
    let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
    let text = String::from_utf8(to_pretty_json_bytes(&value).unwrap()).unwrap();
    let a = text.find("\"a\"").unwrap();
    let b = text.find("\"b\"").unwrap();
    let c = text.find("\"c\"").unwrap();
    let d = text.find("\"d\"").unwrap();
    assert!(a < b && c < d);
}

#[test]
fn pretty_output_parses_back() {
    let value = json!({"results": [{"test": "a", "status": "pass"}]});
    let bytes = to_pretty_json_bytes(&value).unwrap();
    assert!(bytes.ends_with(b"\n"));
    let back: serde_json::Value = from_json_slice(&bytes).unwrap();
    assert_eq!(back, value);
}

#[test]
fn malformed_json_is_a_serde_error() {
    let err = from_json_slice::<serde_json::Value>(b"{not json").unwrap_err();
    assert_eq!(err.info().code, "json-read");
}

#[test]
fn fingerprint_is_lowercase_hex() {
    let digest = sha256_hex(b"abc");
    assert_eq!(
        digest,
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
