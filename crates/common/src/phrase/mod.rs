//! Phrase records and the request shapes that create and patch them
//!
//! A phrase is one snippet extracted from a source document, plus the
//! topic-model annotations computed for it elsewhere. The `topics` payload is
//! carried through untouched; only its outer shape (an object of objects) is
//! checked.

mod service;

pub use service::{Page, PhraseService, MAX_WINDOW};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

/// Topic annotations keyed by model configuration, e.g. `"40t_0,9a_0,1e"`
pub type Topics = Map<String, Value>;

/// A stored phrase record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phrase {
    #[serde(rename = "_id", alias = "id")]
    pub id: i64,
    pub txt_id: i64,
    pub path: String,
    pub phrase: String,
    pub lenght: i64,
    pub section: String,
    pub a_id: i64,
    pub match_word: Vec<String>,
    pub topics: Topics,
}

/// Body of `POST /`: every attribute except the identifier is required
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewPhrase {
    /// Caller-chosen identifier; the store assigns one when absent
    #[serde(default, rename = "_id", alias = "id", skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub id: Option<i64>,

    #[validate(range(min = 0))]
    pub txt_id: i64,

    pub path: String,

    pub phrase: String,

    #[validate(range(min = 0))]
    pub lenght: i64,

    pub section: String,

    #[validate(range(min = 0))]
    pub a_id: i64,

    pub match_word: Vec<String>,

    #[validate(custom(function = "validate_topics"))]
    pub topics: Topics,
}

/// Body of `PUT /{id}`: any subset of the mutable attributes.
///
/// A missing key and an explicit `null` both leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PhrasePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub txt_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phrase: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub lenght: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub a_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_word: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_topics"))]
    pub topics: Option<Topics>,
}

/// Query string of `GET /`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

fn validate_topics(topics: &Topics) -> Result<(), ValidationError> {
    if topics.values().all(Value::is_object) {
        return Ok(());
    }

    let mut error = ValidationError::new("topics_shape");
    error.message = Some("every topics entry must be a JSON object".into());
    Err(error)
}

impl NewPhrase {
    /// Materialize the record under the identifier the store settled on
    pub fn into_phrase(self, id: i64) -> Phrase {
        Phrase {
            id,
            txt_id: self.txt_id,
            path: self.path,
            phrase: self.phrase,
            lenght: self.lenght,
            section: self.section,
            a_id: self.a_id,
            match_word: self.match_word,
            topics: self.topics,
        }
    }
}

impl PhrasePatch {
    /// True when the patch names no attribute at all
    pub fn is_empty(&self) -> bool {
        self.txt_id.is_none()
            && self.path.is_none()
            && self.phrase.is_none()
            && self.lenght.is_none()
            && self.section.is_none()
            && self.a_id.is_none()
            && self.match_word.is_none()
            && self.topics.is_none()
    }
}

impl Phrase {
    /// Apply the supplied attributes of `patch`; returns whether any value changed
    pub fn merge(&mut self, patch: &PhrasePatch) -> bool {
        fn assign<T: Clone + PartialEq>(slot: &mut T, value: &Option<T>) -> bool {
            match value {
                Some(v) if slot != v => {
                    *slot = v.clone();
                    true
                }
                _ => false,
            }
        }

        let mut changed = false;
        changed |= assign(&mut self.txt_id, &patch.txt_id);
        changed |= assign(&mut self.path, &patch.path);
        changed |= assign(&mut self.phrase, &patch.phrase);
        changed |= assign(&mut self.lenght, &patch.lenght);
        changed |= assign(&mut self.section, &patch.section);
        changed |= assign(&mut self.a_id, &patch.a_id);
        changed |= assign(&mut self.match_word, &patch.match_word);
        changed |= assign(&mut self.topics, &patch.topics);
        changed
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde_json::json;

    /// The record used throughout the API documentation
    pub fn example_new_phrase() -> NewPhrase {
        serde_json::from_value(example_body()).expect("example body deserializes")
    }

    pub fn example_body() -> Value {
        json!({
            "txt_id": 6,
            "path": "./pdf/0001/0001008v3.tei.xml",
            "phrase": "this is the traditional machine learning problem.",
            "lenght": 49,
            "section": "text",
            "a_id": 885,
            "match_word": ["machine learning"],
            "topics": {
                "40t_0,9a_0,1e": {
                    "number_of_topics": 40,
                    "alpha": 0.9,
                    "eta": 0.1,
                    "topics": [
                        { "topic": 32, "prob": 0.0725 },
                        { "topic": 2, "prob": 0.0475 },
                        { "topic": 23, "prob": 0.0475 }
                    ]
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_example_body_is_valid() {
        let input = example_new_phrase();
        assert!(input.validate().is_ok());
        assert_eq!(input.id, None);
        assert_eq!(input.lenght, 49);
        assert!(input.topics.contains_key("40t_0,9a_0,1e"));
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let mut body = example_body();
        body.as_object_mut().unwrap().remove("section");
        assert!(serde_json::from_value::<NewPhrase>(body).is_err());
    }

    #[test]
    fn test_wrongly_typed_field_is_rejected() {
        let mut body = example_body();
        body["a_id"] = json!("885");
        assert!(serde_json::from_value::<NewPhrase>(body).is_err());
    }

    #[test]
    fn test_topics_must_be_an_object_of_objects() {
        let mut body = example_body();
        body["topics"] = json!(["not", "a", "mapping"]);
        assert!(serde_json::from_value::<NewPhrase>(body).is_err());

        let mut input = example_new_phrase();
        input.topics.insert("broken".into(), json!(3));
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("topics"));
    }

    #[test]
    fn test_negative_length_is_rejected() {
        let mut input = example_new_phrase();
        input.lenght = -1;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_identifier_accepts_both_spellings() {
        let mut body = example_body();
        body["_id"] = json!(12);
        assert_eq!(serde_json::from_value::<NewPhrase>(body).unwrap().id, Some(12));

        let mut body = example_body();
        body["id"] = json!(13);
        assert_eq!(serde_json::from_value::<NewPhrase>(body).unwrap().id, Some(13));
    }

    #[test]
    fn test_phrase_serializes_identifier_under_reserved_key() {
        let phrase = example_new_phrase().into_phrase(4);
        let value = serde_json::to_value(&phrase).unwrap();
        assert_eq!(value["_id"], json!(4));
        assert!(value.get("id").is_none());
        assert_eq!(value["match_word"], json!(["machine learning"]));
    }

    #[test]
    fn test_patch_null_and_missing_are_both_omitted() {
        let patch: PhrasePatch = serde_json::from_value(json!({ "section": null })).unwrap();
        assert!(patch.is_empty());

        let patch: PhrasePatch = serde_json::from_value(json!({ "section": "abstract" })).unwrap();
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_merge_touches_only_supplied_fields() {
        let mut phrase = example_new_phrase().into_phrase(1);
        let before = phrase.clone();

        let patch = PhrasePatch {
            section: Some("abstract".into()),
            ..Default::default()
        };
        assert!(phrase.merge(&patch));
        assert_eq!(phrase.section, "abstract");
        assert_eq!(phrase.phrase, before.phrase);
        assert_eq!(phrase.topics, before.topics);

        // Same value again is not a modification
        assert!(!phrase.merge(&patch));
    }
}
