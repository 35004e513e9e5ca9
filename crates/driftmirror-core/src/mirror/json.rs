//! Pull a JSON object out of free-form model output.

use serde_json::{Map, Value};

/// Extract the first JSON object from `text`.
///
/// Looks inside a fenced code block if there is one, then takes the span from
/// the first `{` to the last `}`. When that span does not parse, common
/// single-quote slips are repaired and parsing is tried once more.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let body = fenced_block(text).unwrap_or(text);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    let span = &body[start..=end];

    let parsed = serde_json::from_str::<Value>(span).or_else(|e| {
        tracing::debug!(error = %e, "JSON parse failed, retrying with quote repair");
        serde_json::from_str::<Value>(&repair_quotes(span))
    });
    match parsed {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let (open, skip) = match text.find("```json") {
        Some(i) => (i, "```json".len()),
        None => (text.find("```")?, "```".len()),
    };
    let start = open + skip;
    let end = start + text[start..].find("```")?;
    Some(text[start..end].trim())
}

fn repair_quotes(span: &str) -> String {
    [
        ("{'", "{\""),
        ("['", "[\""),
        (", '", ", \""),
        ("':", "\":"),
        (": '", ": \""),
        (":'", ":\""),
        ("'}", "\"}"),
        ("',", "\","),
        ("']", "\"]"),
    ]
    .iter()
    .fold(span.to_string(), |acc, (from, to)| acc.replace(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object() {
        let map = extract_json_object(r#"{"findings": []}"#).unwrap();
        assert!(map["findings"].is_array());
    }

    #[test]
    fn fenced_json_block_with_chatter() {
        let text = "Here you go:\n```json\n{\"counterfactual\": \"x\"}\n```\nHope it helps {";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["counterfactual"], "x");
    }

    #[test]
    fn bare_fence() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(text).unwrap()["a"], 1);
    }

    #[test]
    fn surrounding_prose() {
        let text = "Sure! {\"a\": {\"b\": 2}} Let me know.";
        assert_eq!(extract_json_object(text).unwrap()["a"]["b"], 2);
    }

    #[test]
    fn single_quotes_are_repaired() {
        let text = "{'finding': 'late nights', 'evidence': ['a', 'b']}";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["finding"], "late nights");
        assert_eq!(map["evidence"][1], "b");
    }

    #[test]
    fn no_object_yields_none() {
        assert!(extract_json_object("").is_none());
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
        assert!(extract_json_object("[1, 2]").is_none());
    }
}
