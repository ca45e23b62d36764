//! HTTP message bodies for the `/answer` sub-protocol. Client ↔ server JSON.

use serde::Serialize;

/// Client → server: answer query.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRequest<'a> {
    pub query: &'a str,
    pub top_k: u32,
}

impl<'a> AnswerRequest<'a> {
    pub fn new(query: &'a str, top_k: u32) -> Self {
        Self { query, top_k }
    }
}

/// Server → client: answer text plus the ids of the documents it cites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerReply {
    pub text: String,
    pub citations: Vec<String>,
}

impl AnswerReply {
    /// Interpret a success body. Never fails: a body whose `text` is missing
    /// or blank-ish (null, false, 0, "") is shown whole, serialized back to
    /// JSON. Any other non-string `text` is shown as its own JSON.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let text = match value.get("text") {
            Some(t) if is_truthy(t) => match t.as_str() {
                Some(s) => s.to_string(),
                None => t.to_string(),
            },
            _ => value.to_string(),
        };
        let citations = value
            .get("citations")
            .and_then(|c| c.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item.as_str() {
                        Some(s) => s.to_string(),
                        None => item.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        AnswerReply { text, citations }
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_query_and_top_k() {
        let body = serde_json::to_value(AnswerRequest::new("ping", 6)).unwrap();
        assert_eq!(body, json!({"query": "ping", "top_k": 6}));
    }

    #[test]
    fn reply_keeps_citation_order() {
        let reply = AnswerReply::from_json(&json!({
            "text": "pong",
            "citations": ["doc2", "doc1", "doc3"]
        }));
        assert_eq!(reply.text, "pong");
        assert_eq!(reply.citations, vec!["doc2", "doc1", "doc3"]);
    }

    #[test]
    fn missing_citations_is_empty() {
        let reply = AnswerReply::from_json(&json!({"text": "pong"}));
        assert!(reply.citations.is_empty());

        let reply = AnswerReply::from_json(&json!({"text": "pong", "citations": null}));
        assert!(reply.citations.is_empty());
    }

    #[test]
    fn missing_text_falls_back_to_whole_body() {
        let body = json!({"answer": "pong", "citations": ["doc1"]});
        let reply = AnswerReply::from_json(&body);
        assert_eq!(reply.text, body.to_string());
        assert_eq!(reply.citations, vec!["doc1"]);
    }

    #[test]
    fn empty_or_falsy_text_falls_back() {
        for body in [
            json!({"text": ""}),
            json!({"text": null}),
            json!({"text": false}),
            json!({"text": 0}),
            json!(["not", "an", "object"]),
        ] {
            assert_eq!(AnswerReply::from_json(&body).text, body.to_string());
        }
    }

    #[test]
    fn non_string_text_is_shown_as_json() {
        assert_eq!(AnswerReply::from_json(&json!({"text": 42})).text, "42");
        assert_eq!(AnswerReply::from_json(&json!({"text": true})).text, "true");
        assert_eq!(
            AnswerReply::from_json(&json!({"text": {"a": 1}})).text,
            r#"{"a":1}"#
        );
        assert_eq!(AnswerReply::from_json(&json!({"text": ["x"]})).text, r#"["x"]"#);
    }
}
