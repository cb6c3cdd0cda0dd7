//! Content documents and their embedded comment lists.

use serde_json::Value;
use time::OffsetDateTime;

use super::{
    document::{Document, DocumentId},
    user::User,
};

pub const TYPE_FIELD: &str = "type";
pub const SLUG_FIELD: &str = "slug";
pub const TITLE_FIELD: &str = "title";
pub const BODY_FIELD: &str = "body";
pub const CREATED_FIELD: &str = "created";
pub const CREATED_BY_FIELD: &str = "created_by";
pub const LAST_MODIFIED_FIELD: &str = "last_modified";
pub const LAST_MODIFIED_BY_FIELD: &str = "last_modified_by";
pub const COMMENTS_FIELD: &str = "comments";
pub const COMMENT_ID_FIELD: &str = "comment_id";

/// Stamp creation time and author on a freshly extracted document.
pub fn stamp_created(document: &mut Document, user: &User, now: OffsetDateTime) {
    document.insert(CREATED_FIELD.into(), Value::from(now.unix_timestamp()));
    document.insert(CREATED_BY_FIELD.into(), author_value(user));
}

/// Stamp modification time and author; `created`/`created_by` are never touched here.
pub fn stamp_modified(document: &mut Document, user: &User, now: OffsetDateTime) {
    document.insert(LAST_MODIFIED_FIELD.into(), Value::from(now.unix_timestamp()));
    document.insert(LAST_MODIFIED_BY_FIELD.into(), author_value(user));
}

fn author_value(user: &User) -> Value {
    user.id.map(Value::from).unwrap_or(Value::Null)
}

pub fn comments(document: &Document) -> Option<&Vec<Value>> {
    document.get(COMMENTS_FIELD).and_then(Value::as_array)
}

fn comment_matches(comment: &Value, comment_id: DocumentId) -> bool {
    comment
        .as_object()
        .and_then(|comment| DocumentId::from_field(comment, COMMENT_ID_FIELD))
        == Some(comment_id)
}

/// Linear scan of the embedded list; comments are not indexed on their own.
pub fn find_comment(document: &Document, comment_id: DocumentId) -> Option<&Document> {
    comments(document)?
        .iter()
        .find(|comment| comment_matches(comment, comment_id))
        .and_then(Value::as_object)
}

pub fn push_comment(document: &mut Document, comment: Document) {
    let entry = document
        .entry(COMMENTS_FIELD)
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    if let Value::Array(list) = entry {
        list.push(Value::Object(comment));
    }
}

/// Replace the comment matching `comment_id` in place, keeping its position and identifier.
pub fn replace_comment(
    document: &mut Document,
    comment_id: DocumentId,
    mut replacement: Document,
) -> bool {
    let Some(Value::Array(list)) = document.get_mut(COMMENTS_FIELD) else {
        return false;
    };
    let Some(slot) = list
        .iter_mut()
        .find(|comment| comment_matches(comment, comment_id))
    else {
        return false;
    };
    replacement.insert(COMMENT_ID_FIELD.into(), comment_id.into());
    *slot = Value::Object(replacement);
    true
}

pub fn remove_comment(document: &mut Document, comment_id: DocumentId) -> bool {
    let Some(Value::Array(list)) = document.get_mut(COMMENTS_FIELD) else {
        return false;
    };
    let before = list.len();
    list.retain(|comment| !comment_matches(comment, comment_id));
    list.len() != before
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn comment(id: DocumentId, body: &str) -> Document {
        let mut comment = Document::new();
        comment.insert(COMMENT_ID_FIELD.into(), id.into());
        comment.insert("body".into(), json!(body));
        comment
    }

    #[test]
    fn replaces_comment_at_its_position() {
        let (first, second) = (DocumentId::generate(), DocumentId::generate());
        let mut document = Document::new();
        push_comment(&mut document, comment(first, "one"));
        push_comment(&mut document, comment(second, "two"));

        let mut edited = Document::new();
        edited.insert("body".into(), json!("edited"));
        assert!(replace_comment(&mut document, first, edited));

        let list = comments(&document).expect("comments");
        assert_eq!(list[0]["body"], json!("edited"));
        assert_eq!(list[0][COMMENT_ID_FIELD], json!(first.to_string()));
        assert_eq!(list[1]["body"], json!("two"));
        assert!(!replace_comment(&mut document, DocumentId::generate(), Document::new()));
    }

    #[test]
    fn removes_only_the_matching_comment() {
        let (first, second) = (DocumentId::generate(), DocumentId::generate());
        let mut document = Document::new();
        push_comment(&mut document, comment(first, "one"));
        push_comment(&mut document, comment(second, "two"));

        assert!(remove_comment(&mut document, second));
        assert!(!remove_comment(&mut document, second));
        assert!(find_comment(&document, first).is_some());
        assert!(find_comment(&document, second).is_none());
    }

    #[test]
    fn stamps_author_and_time() {
        let user = User::new(DocumentId::generate(), 150);
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");
        let mut document = Document::new();

        stamp_created(&mut document, &user, now);
        stamp_modified(&mut document, &User::anonymous(), now);

        assert_eq!(document[CREATED_FIELD], json!(1_700_000_000));
        assert_eq!(
            DocumentId::from_field(&document, CREATED_BY_FIELD),
            user.id
        );
        assert_eq!(document[LAST_MODIFIED_BY_FIELD], Value::Null);
    }
}
