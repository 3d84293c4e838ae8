//! Message and mailbox annotations (RFC 5257 / RFC 5464).

/// A single annotation attribute value.
///
/// RFC 5257 names attributes `value.priv` / `value.shared` (plus size
/// variants); a NIL value removes the attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationValue {
    /// Attribute name, e.g. `value.priv`.
    pub attribute: String,
    /// Attribute value; `None` is NIL.
    pub value: Option<String>,
}

impl AnnotationValue {
    /// A private value attribute.
    #[must_use]
    pub fn private(value: impl Into<String>) -> Self {
        Self {
            attribute: "value.priv".to_string(),
            value: Some(value.into()),
        }
    }

    /// A shared value attribute.
    #[must_use]
    pub fn shared(value: impl Into<String>) -> Self {
        Self {
            attribute: "value.shared".to_string(),
            value: Some(value.into()),
        }
    }
}

/// An annotation: an entry name with its attribute values.
///
/// Entries are slash-separated paths such as `/comment` or
/// `/altsubject`; each carries one or more attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Entry name, e.g. `/comment`.
    pub entry: String,
    /// Attribute values for the entry.
    pub values: Vec<AnnotationValue>,
}

impl Annotation {
    /// Creates an annotation with a single private value.
    #[must_use]
    pub fn private(entry: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            values: vec![AnnotationValue::private(value)],
        }
    }

    /// Creates an annotation with a single shared value.
    #[must_use]
    pub fn shared(entry: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            values: vec![AnnotationValue::shared(value)],
        }
    }

    /// The private value, if one is present.
    #[must_use]
    pub fn private_value(&self) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.attribute.eq_ignore_ascii_case("value.priv"))
            .and_then(|v| v.value.as_deref())
    }

    /// The shared value, if one is present.
    #[must_use]
    pub fn shared_value(&self) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.attribute.eq_ignore_ascii_case("value.shared"))
            .and_then(|v| v.value.as_deref())
    }
}

/// Access the server grants to annotations on a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnotationAccess {
    /// Annotations are not supported here.
    #[default]
    None,
    /// Annotations may be read but not written.
    ReadOnly,
    /// Annotations may be read and written.
    ReadWrite,
}

/// Annotation scopes a folder supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationScope {
    /// Per-user private annotations.
    Private,
    /// Shared annotations visible to all users.
    Shared,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_annotation() {
        let a = Annotation::private("/comment", "todo: reply");
        assert_eq!(a.entry, "/comment");
        assert_eq!(a.private_value(), Some("todo: reply"));
        assert_eq!(a.shared_value(), None);
    }

    #[test]
    fn shared_annotation() {
        let a = Annotation::shared("/comment", "team note");
        assert_eq!(a.shared_value(), Some("team note"));
        assert_eq!(a.private_value(), None);
    }

    #[test]
    fn nil_value_removes() {
        let a = Annotation {
            entry: "/comment".to_string(),
            values: vec![AnnotationValue {
                attribute: "value.priv".to_string(),
                value: None,
            }],
        };
        assert_eq!(a.private_value(), None);
    }
}
