//! Substitutes for values the standard JSON encoder rejects.

use std::borrow::Cow;

use serde::ser::{Serialize, Serializer};

use super::EventValue;

/// A JSON-representable stand-in for a rejected value.
///
/// Neither variant needs further fallback at its own level. List elements
/// are still encoded through [`EventValue`]'s serializer, so a nested
/// non-native element gets its own substitute.
#[derive(Debug, Clone, PartialEq)]
pub enum Substitute<'a> {
    List(&'a [EventValue]),
    Text(Cow<'a, str>),
}

/// Convert a value the encoder cannot represent into a substitute.
///
/// - sets become lists of their elements, in iteration order
/// - bytes are decoded as UTF-8, invalid sequences become U+FFFD
/// - anything else becomes its textual representation
///
/// Never fails.
pub fn fallback(value: &EventValue) -> Substitute<'_> {
    match value {
        EventValue::Set(items) => Substitute::List(items),
        EventValue::Bytes(bytes) => Substitute::Text(String::from_utf8_lossy(bytes)),
        EventValue::String(s) => Substitute::Text(Cow::Borrowed(s)),
        other => Substitute::Text(Cow::Owned(other.to_string())),
    }
}

impl Serialize for Substitute<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Substitute::List(items) => serializer.collect_seq(items.iter()),
            Substitute::Text(text) => serializer.serialize_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_becomes_list_in_iteration_order() {
        let set = EventValue::Set(vec![EventValue::from("b"), EventValue::from("a")]);
        match fallback(&set) {
            Substitute::List(items) => {
                assert_eq!(items, &[EventValue::from("b"), EventValue::from("a")]);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn valid_utf8_bytes_decode_verbatim() {
        let bytes = EventValue::Bytes("héllo".as_bytes().to_vec());
        assert_eq!(fallback(&bytes), Substitute::Text(Cow::Borrowed("héllo")));
    }

    #[test]
    fn invalid_bytes_use_replacement_character() {
        let bytes = EventValue::Bytes(vec![b'a', 0xfe, 0xff, b'z']);
        assert_eq!(
            fallback(&bytes),
            Substitute::Text(Cow::Owned("a\u{FFFD}\u{FFFD}z".to_string()))
        );
    }

    #[test]
    fn opaque_values_use_their_display_form() {
        struct Model;
        impl std::fmt::Display for Model {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("<GeminiModel gemini-2.5-flash>")
            }
        }

        let value = EventValue::opaque(Model);
        assert_eq!(
            fallback(&value),
            Substitute::Text(Cow::Owned("<GeminiModel gemini-2.5-flash>".to_string()))
        );
    }

    #[test]
    fn empty_set_and_bytes() {
        assert_eq!(fallback(&EventValue::Set(vec![])), Substitute::List(&[]));
        assert_eq!(
            fallback(&EventValue::Bytes(vec![])),
            Substitute::Text(Cow::Borrowed(""))
        );
    }

    #[test]
    fn substitute_serializes_to_json() {
        let items = [EventValue::Int(1), EventValue::Bytes(vec![0xff])];
        let json = serde_json::to_string(&Substitute::List(&items)).unwrap();
        assert_eq!(json, "[1,\"\u{FFFD}\"]");
    }
}
