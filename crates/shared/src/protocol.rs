//! Wire-level shape of the remote contact resource.
//!
//! The resource is plain REST: `GET/POST /contacts`, and
//! `GET/PUT/DELETE /contacts/{id}`. List responses are a bare JSON array of
//! [`Contact`](crate::domain::Contact); create and update echo the stored
//! contact back; delete returns an empty body. Error responses carry an
//! [`ErrorBody`](crate::error::ErrorBody) when the server bothers to.

use crate::domain::ContactId;

pub const CONTACTS_PATH: &str = "contacts";

/// Header used when an auth token is available.
pub const AUTH_HEADER: &str = "Authorization";

pub fn collection_path() -> String {
    CONTACTS_PATH.to_string()
}

pub fn item_path(id: &ContactId) -> String {
    format!("{CONTACTS_PATH}/{id}")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_path_embeds_id() {
        assert_eq!(item_path(&ContactId::from("abc123")), "contacts/abc123");
    }

    #[test]
    fn bearer_prefixes_token() {
        assert_eq!(bearer("tok"), "Bearer tok");
    }
}
