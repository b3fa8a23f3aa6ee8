use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel stored in `photo_url` when a contact has no picture.
pub const NO_PHOTO: &str = "#";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(pub String);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContactId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub photo_url: String,
}

impl Contact {
    pub fn has_photo(&self) -> bool {
        self.photo_url != NO_PHOTO
    }
}

/// A contact that has not been persisted yet: everything but the
/// server-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub photo_url: String,
}

impl Default for ContactDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            photo_url: NO_PHOTO.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    Name,
    Email,
    Phone,
    Address,
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DraftField::Name => "name",
            DraftField::Email => "email",
            DraftField::Phone => "phone",
            DraftField::Address => "address",
        };
        f.write_str(name)
    }
}

impl ContactDraft {
    /// Field-level validation applied before any create/update call is
    /// issued. Returns every failing field so presentation can highlight
    /// all of them at once.
    pub fn validate(&self) -> Result<(), Vec<DraftField>> {
        let mut invalid = Vec::new();
        if self.name.trim().is_empty() {
            invalid.push(DraftField::Name);
        }
        if !email_shape_ok(&self.email) {
            invalid.push(DraftField::Email);
        }
        if self.phone.trim().is_empty() {
            invalid.push(DraftField::Phone);
        }
        if self.address.trim().is_empty() {
            invalid.push(DraftField::Address);
        }
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(invalid)
        }
    }

    pub fn into_contact(self, id: ContactId) -> Contact {
        Contact {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            photo_url: self.photo_url,
        }
    }
}

impl From<Contact> for ContactDraft {
    fn from(contact: Contact) -> Self {
        Self {
            name: contact.name,
            email: contact.email,
            phone: contact.phone,
            address: contact.address,
            photo_url: contact.photo_url,
        }
    }
}

/// Simple `local@domain` shape check: no whitespace, a non-empty local
/// part, and a dot with something on both sides in the domain.
pub fn email_shape_ok(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}

/// Avatar fallback when a contact has no photo: up to two uppercase
/// initials taken from the name's words.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|part| part.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}
