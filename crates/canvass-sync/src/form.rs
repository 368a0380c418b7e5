//! Canvassing forms and users
//!
//! A form names the remote folder its participants sync through and the
//! survey questions asked at each door. The locally known forms are kept
//! under [`keys::FORMS`] as a JSON array whose entries may be `null`.

use canvass_graph::storage::keys;
use canvass_graph::KeyValueStore;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One survey question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub label: String,
    /// Answer type as authored (`String`, `Boolean`, `TEXTBOX`, ...)
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub optional: bool,
}

impl Question {
    #[must_use]
    pub fn new(label: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: kind.into(),
            optional: false,
        }
    }
}

/// A canvassing form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Account id of the form's creator
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub author: String,
    /// Remote folder shared by the form's participants
    #[serde(default)]
    pub folder_path: String,
    #[serde(default)]
    pub questions: IndexMap<String, Question>,
    #[serde(default)]
    pub questions_order: Vec<String>,
}

impl Form {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, folder_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            author_id: String::new(),
            author: String::new(),
            folder_path: folder_path.into(),
            questions: IndexMap::new(),
            questions_order: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = author_id.into();
        self
    }

    /// Append a question, keeping `questions_order` in step
    #[must_use]
    pub fn with_question(mut self, key: impl Into<String>, question: Question) -> Self {
        let key = key.into();
        if !self.questions_order.contains(&key) {
            self.questions_order.push(key.clone());
        }
        self.questions.insert(key, question);
        self
    }

    /// Question keys in display order
    ///
    /// Uses `questions_order` when present; otherwise the questions' own
    /// order.
    #[must_use]
    pub fn ordered_keys(&self) -> Vec<&str> {
        if self.questions_order.is_empty() {
            self.questions.keys().map(String::as_str).collect()
        } else {
            self.questions_order.iter().map(String::as_str).collect()
        }
    }

    /// Whether `user` created this form
    #[inline]
    #[must_use]
    pub fn is_owned_by(&self, user: &User) -> bool {
        !self.author_id.is_empty() && self.author_id == user.account_id
    }
}

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    /// Volunteer id at the organization service
    pub id: String,
    /// Account id at the file store; compared against `Form::author_id`
    pub account_id: String,
    #[serde(default)]
    pub display_name: String,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            display_name: String::new(),
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

/// Read the locally known forms, skipping `null` entries
///
/// # Errors
/// Returns error if storage cannot be read. A malformed blob reads as no forms.
pub fn load_forms(storage: &dyn KeyValueStore) -> Result<Vec<Form>> {
    let Some(blob) = storage.get(keys::FORMS)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Vec<Option<Form>>>(&blob) {
        Ok(forms) => Ok(forms.into_iter().flatten().collect()),
        Err(e) => {
            tracing::warn!(error = %e, "unreadable forms list");
            Ok(Vec::new())
        }
    }
}

/// Write the locally known forms
///
/// # Errors
/// Returns error if serialization or storage fails
pub fn save_forms(storage: &dyn KeyValueStore, forms: &[Form]) -> Result<()> {
    let blob = serde_json::to_string(forms)?;
    storage.set(keys::FORMS, &blob)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvass_graph::MemoryKv;

    #[test]
    fn forms_with_nulls() {
        let kv = MemoryKv::new();
        kv.set(
            keys::FORMS,
            r#"[null, {"id": "f1", "name": "Door", "author_id": "acct", "folder_path": "/Door",
                "questions": {"FullName": {"type": "String", "label": "Full Name"}},
                "questions_order": ["FullName"]}]"#,
        )
        .unwrap();
        let forms = load_forms(&kv).unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].questions["FullName"].kind, "String");
        assert_eq!(forms[0].ordered_keys(), vec!["FullName"]);
    }

    #[test]
    fn missing_or_garbage_forms() {
        let kv = MemoryKv::new();
        assert!(load_forms(&kv).unwrap().is_empty());
        kv.set(keys::FORMS, "nope").unwrap();
        assert!(load_forms(&kv).unwrap().is_empty());
    }

    #[test]
    fn save_then_load() {
        let kv = MemoryKv::new();
        let form = Form::new("f1", "Door", "/Door")
            .with_author("acct")
            .with_question("Phone", Question::new("Phone", "String"));
        save_forms(&kv, &[form.clone()]).unwrap();
        assert_eq!(load_forms(&kv).unwrap(), vec![form]);
    }

    #[test]
    fn ownership() {
        let form = Form::new("f1", "Door", "/Door").with_author("acct");
        assert!(form.is_owned_by(&User::new("v1", "acct")));
        assert!(!form.is_owned_by(&User::new("v1", "other")));
        assert!(!Form::new("f2", "x", "/x").is_owned_by(&User::new("v1", "")));
    }
}
