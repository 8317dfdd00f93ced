//! Contact records and the editable subset used by add/edit forms.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ContactId, IdentityId};

/// Whether a contact is currently active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    #[default]
    Active,
    Inactive,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Active => "active",
            ContactStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(ContactStatus::Active),
            "inactive" => Ok(ContactStatus::Inactive),
            other => Err(format!("unknown contact status '{other}'")),
        }
    }
}

/// A contact as stored in the remote collection
///
/// `id`, `date_added` and `owner_id` are fixed at creation. Edits only ever
/// go through [`ContactFormData`], which cannot carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
    pub location: String,
    pub status: ContactStatus,
    /// Device-local calendar date of creation (serialised as `YYYY-MM-DD`)
    pub date_added: NaiveDate,
    /// Identity that created the record
    pub owner_id: IdentityId,
}

impl Contact {
    /// Stamp a new record for `owner` from validated form input.
    pub fn create(
        id: ContactId,
        owner: IdentityId,
        data: ContactFormData,
        date_added: NaiveDate,
    ) -> Self {
        Self {
            id,
            name: data.name,
            email: data.email,
            phone: data.phone,
            role: data.role,
            location: data.location,
            status: ContactStatus::Active,
            date_added,
            owner_id: owner,
        }
    }

    /// Overwrite the editable fields, leaving identity and provenance intact.
    pub fn apply_form(&mut self, data: ContactFormData) {
        self.name = data.name;
        self.email = data.email;
        self.phone = data.phone;
        self.role = data.role;
        self.location = data.location;
    }

    /// Editable fields of this record, e.g. to prefill an edit form.
    pub fn form_data(&self) -> ContactFormData {
        ContactFormData {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            role: self.role.clone(),
            location: self.location.clone(),
        }
    }

    /// ISO 8601 date-only rendering of `date_added`
    pub fn date_added_iso(&self) -> String {
        self.date_added.format("%Y-%m-%d").to_string()
    }
}

/// Validated input for creating or updating a contact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFormData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
    pub location: String,
}

impl ContactFormData {
    /// Copy with surrounding whitespace removed from every field
    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            role: self.role.trim().to_string(),
            location: self.location.trim().to_string(),
        }
    }
}

/// Form fields, used as keys for field-level validation messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContactField {
    Name,
    Email,
    Phone,
    Role,
    Location,
}

impl std::fmt::Display for ContactField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ContactField::Name => "name",
            ContactField::Email => "email",
            ContactField::Phone => "phone",
            ContactField::Role => "role",
            ContactField::Location => "location",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> ContactFormData {
        ContactFormData {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "+1-202-555-0101".into(),
            role: "Engineer".into(),
            location: "London".into(),
        }
    }

    #[test]
    fn test_create_stamps_defaults() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let contact = Contact::create(ContactId::new("c1"), IdentityId::new("U1"), form(), date);
        assert_eq!(contact.status, ContactStatus::Active);
        assert_eq!(contact.owner_id, IdentityId::new("U1"));
        assert_eq!(contact.date_added_iso(), "2026-10-19");
    }

    #[test]
    fn test_apply_form_keeps_provenance() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let mut contact = Contact::create(ContactId::new("c1"), IdentityId::new("U1"), form(), date);
        contact.status = ContactStatus::Inactive;

        let mut edit = form();
        edit.name = "Augusta Ada King".into();
        contact.apply_form(edit);

        assert_eq!(contact.name, "Augusta Ada King");
        assert_eq!(contact.id, ContactId::new("c1"));
        assert_eq!(contact.owner_id, IdentityId::new("U1"));
        assert_eq!(contact.date_added, date);
        assert_eq!(contact.status, ContactStatus::Inactive);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ContactStatus::Inactive).unwrap();
        assert_eq!(json, "\"inactive\"");
        assert_eq!("Active".parse::<ContactStatus>().unwrap(), ContactStatus::Active);
        assert!("archived".parse::<ContactStatus>().is_err());
    }

    #[test]
    fn test_date_added_serializes_as_iso_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let contact = Contact::create(ContactId::new("c1"), IdentityId::new("U1"), form(), date);
        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["date_added"], "2026-03-07");
    }
}
