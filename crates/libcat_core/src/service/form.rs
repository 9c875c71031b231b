//! Bound form input and per-field error collection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field name → messages, ordered by field name for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when no error was recorded.
    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for FormErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl Error for FormErrors {}

/// Raw `title` / `author_id` submission for book create and edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookForm {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
}

impl BookForm {
    pub fn new(title: impl Into<String>, author_id: impl ToString) -> Self {
        Self {
            title: Some(title.into()),
            author_id: Some(author_id.to_string()),
        }
    }
}

/// Raw registration submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

/// Optional `q` query for book search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookSearchForm {
    #[serde(default)]
    pub q: Option<String>,
}

pub const BOOK_SEARCH_MAX_CHARS: usize = 200;

impl BookSearchForm {
    /// Trimmed, non-empty search term. Longer than the limit is an error.
    pub fn cleaned(&self) -> Result<Option<String>, FormErrors> {
        let Some(raw) = self.q.as_deref() else {
            return Ok(None);
        };
        let trimmed = raw.trim();
        if trimmed.chars().count() > BOOK_SEARCH_MAX_CHARS {
            return Err(FormErrors::single(
                "q",
                format!("ensure this value has at most {BOOK_SEARCH_MAX_CHARS} characters"),
            ));
        }
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{BookSearchForm, FormErrors};

    #[test]
    fn errors_accumulate_per_field() {
        let mut errors = FormErrors::new();
        errors.add("title", "required");
        errors.add("title", "too long");
        errors.add("author_id", "required");
        assert_eq!(errors.get("title").map(<[String]>::len), Some(2));
        assert_eq!(
            errors.to_string(),
            "author_id: required; title: required; title: too long"
        );
        assert!(errors.into_result().is_err());
        assert!(FormErrors::new().into_result().is_ok());
    }

    #[test]
    fn search_form_trims_and_drops_blank() {
        let blank = BookSearchForm {
            q: Some("   ".to_string()),
        };
        assert_eq!(blank.cleaned(), Ok(None));

        let term = BookSearchForm {
            q: Some("  tolkien ".to_string()),
        };
        assert_eq!(term.cleaned(), Ok(Some("tolkien".to_string())));

        let long = BookSearchForm {
            q: Some("x".repeat(201)),
        };
        assert!(long.cleaned().is_err());
    }
}
