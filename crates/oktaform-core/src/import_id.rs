//! Compound import IDs (`auth_server_id/id`, `app_id/group_id`, ...).

use crate::error::CoreError;

pub const SEPARATOR: char = '/';

/// Split `id` on `/` into exactly `fields.len()` non-empty components.
///
/// The error message names the expected layout so the user can fix the
/// import command without reading docs.
pub fn parse<'a>(id: &'a str, fields: &[&str]) -> Result<Vec<&'a str>, CoreError> {
    let parts: Vec<&str> = id.split(SEPARATOR).collect();
    if parts.len() != fields.len() || parts.iter().any(|p| p.is_empty()) {
        return Err(CoreError::ImportFormat {
            id: id.to_string(),
            expected: fields.join("/"),
        });
    }
    Ok(parts)
}

/// Join components back into the compound form stored as the resource ID.
pub fn join(parts: &[&str]) -> String {
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_matching_arity() {
        let parts = parse("aus123/scp456", &["auth_server_id", "id"]).unwrap();
        assert_eq!(parts, vec!["aus123", "scp456"]);
    }

    #[test]
    fn wrong_arity_names_expected_format() {
        let err = parse("aus123", &["auth_server_id", "id"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid import ID \"aus123\": expected format \"auth_server_id/id\""
        );

        let err = parse("a/b/c", &["app_id", "group_id"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid import ID \"a/b/c\": expected format \"app_id/group_id\""
        );
    }

    #[test]
    fn empty_component_is_rejected() {
        assert!(parse("app/", &["app_id", "group_id"]).is_err());
        assert!(parse("/grp", &["app_id", "group_id"]).is_err());
    }

    #[test]
    fn join_inverts_parse() {
        assert_eq!(join(&["a", "b"]), "a/b");
    }
}
