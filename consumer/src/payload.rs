use crate::errors::Result;
use serde_json::{Map, Value};

pub type Document = Map<String, Value>;

/// Classified shape of one topic message.
#[derive(Debug, PartialEq)]
pub enum Payload {
    /// A single reading, inserted as one document.
    Single(Document),
    /// A batch envelope, inserted as one bulk write.
    Batch(Vec<Document>),
    /// Anything else; dropped without a write.
    Invalid(Value),
}

/// Decodes message bytes into a classified payload. Tolerates exactly one
/// level of double-encoding: a message that decodes to a JSON string has
/// the inner text parsed again before classification.
pub fn decode(bytes: &[u8]) -> Result<Payload> {
    let text = std::str::from_utf8(bytes)?;
    let mut value: Value = serde_json::from_str(text)?;
    if let Value::String(inner) = value {
        value = serde_json::from_str(&inner)?;
    }
    Ok(classify(value))
}

fn classify(value: Value) -> Payload {
    match value {
        Value::Object(doc) => Payload::Single(doc),
        Value::Array(items) => {
            if items.is_empty() || !items.iter().all(Value::is_object) {
                return Payload::Invalid(Value::Array(items));
            }
            let docs = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(doc) => Some(doc),
                    _ => None,
                })
                .collect();
            Payload::Batch(docs)
        }
        other => Payload::Invalid(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_classifies_as_single() {
        let payload = decode(br#"{"Device_Id":1156053075,"Battery_Level":3.5}"#).unwrap();
        match payload {
            Payload::Single(doc) => {
                assert_eq!(doc["Device_Id"], 1156053075);
                assert_eq!(doc["Battery_Level"], 3.5);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn array_of_objects_classifies_as_batch() {
        let payload = decode(br#"[{"Device_Id":1},{"Device_Id":2}]"#).unwrap();
        match payload {
            Payload::Batch(docs) => {
                assert_eq!(docs.len(), 2);
                assert_eq!(docs[1]["Device_Id"], 2);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn double_encoded_array_unwraps_once() {
        // The message body is the JSON string "[{\"Device_Id\":1}]".
        let payload = decode(br#""[{\"Device_Id\":1}]""#).unwrap();
        match payload {
            Payload::Batch(docs) => {
                assert_eq!(docs.len(), 1);
                assert_eq!(docs[0]["Device_Id"], 1);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn scalar_is_invalid() {
        assert!(matches!(decode(b"5").unwrap(), Payload::Invalid(_)));
        assert!(matches!(decode(b"true").unwrap(), Payload::Invalid(_)));
        assert!(matches!(decode(b"null").unwrap(), Payload::Invalid(_)));
    }

    #[test]
    fn empty_array_is_invalid() {
        assert!(matches!(decode(b"[]").unwrap(), Payload::Invalid(_)));
    }

    #[test]
    fn array_with_non_object_element_is_invalid() {
        assert!(matches!(
            decode(br#"[{"Device_Id":1},5]"#).unwrap(),
            Payload::Invalid(_)
        ));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(decode(b"{ not json").is_err());
    }

    #[test]
    fn double_encoded_garbage_is_an_error() {
        assert!(decode(br#""not json at all""#).is_err());
    }

    #[test]
    fn non_utf8_bytes_are_an_error() {
        assert!(decode(&[0xff, 0xfe, 0x00]).is_err());
    }
}
