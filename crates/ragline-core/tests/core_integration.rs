#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for ragline-core: response wire shape, chunk helpers,
//! and the vector decode path as seen by store readers.

use std::collections::HashMap;

use ragline_core::{
    cosine_similarity, decode_vector, Chunk, RagResponse, SearchResult, Source, UNTITLED,
};
use serde_json::json;

fn chunk(title: Option<&str>) -> Chunk {
    Chunk {
        id: "c1".into(),
        page_id: "p1".into(),
        url: "https://x/a".into(),
        title: title.map(str::to_string),
        content: "Offset accounts reduce interest".into(),
        vector: vec![1.0, 0.0],
        metadata: HashMap::new(),
        chunk_index: Some(0),
        created_at: None,
    }
}

#[test]
fn response_serializes_excerpt_as_content() {
    let response = RagResponse {
        answer: "Hello".into(),
        sources: vec![Source {
            url: "https://x/a".into(),
            title: "A".into(),
            excerpt: "short".into(),
            similarity: 0.5,
        }],
        degraded: false,
    };
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["sources"][0]["content"], "short");
    assert!(value.get("degraded").is_none(), "healthy responses omit the flag");
}

#[test]
fn degraded_flag_is_serialized_when_set() {
    let response = RagResponse {
        answer: "busy".into(),
        sources: vec![],
        degraded: true,
    };
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["degraded"], true);
}

#[test]
fn display_title_falls_back_to_untitled() {
    assert_eq!(chunk(None).display_title(), UNTITLED);
    assert_eq!(chunk(Some("   ")).display_title(), UNTITLED);
    assert_eq!(chunk(Some("Rates")).display_title(), "Rates");
}

#[test]
fn search_result_similarity_is_clamped() {
    assert_eq!(SearchResult::new(chunk(None), 1.37).similarity(), 1.0);
    assert_eq!(SearchResult::new(chunk(None), -0.2).similarity(), 0.0);
    assert_eq!(SearchResult::new(chunk(None), f32::NAN).similarity(), 0.0);
    assert!((SearchResult::new(chunk(None), 0.42).similarity() - 0.42).abs() < 1e-6);
}

#[test]
fn string_and_array_vectors_decode_identically() {
    let from_array = decode_vector(&json!([0.1, 0.2, 0.3])).unwrap();
    let from_string = decode_vector(&json!("[0.1, 0.2, 0.3]")).unwrap();
    assert_eq!(from_array, from_string);
    let sim = cosine_similarity(&from_array, &from_string).unwrap();
    assert!((sim - 1.0).abs() < 1e-6);
}
