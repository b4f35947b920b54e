//! Vendor records and the draft builder used to register them
use super::error::WorkflowError;
use super::request::TimeStamp;
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum VendorStatus {
    #[n(0)]
    Active,
    #[n(1)]
    Inactive,
}

impl VendorStatus {
    pub fn label(&self) -> &'static str {
        match self {
            VendorStatus::Active => "active",
            VendorStatus::Inactive => "inactive",
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct Vendor {
    #[n(0)]
    pub id: String, // uuid7, bech32 encoded with "vnd_"
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub contact_person: String,
    #[n(3)]
    pub email: String,
    #[n(4)]
    pub phone: String,
    #[n(5)]
    pub address: String,
    #[n(6)]
    pub tax_id: String,
    #[n(7)]
    pub status: VendorStatus,
    // aggregates, owned by the completion transition
    #[n(8)]
    pub total_payments_cents: u64,
    #[n(9)]
    pub last_payment_date: Option<TimeStamp<Utc>>,
}

impl Vendor {
    pub fn is_active(&self) -> bool {
        self.status == VendorStatus::Active
    }
}

// Used for registering new vendors. Aggregates always start at zero; the
// id is assigned by the engine on add.
#[derive(Default, Debug)]
pub struct VendorDraft {
    name: Option<String>,
    contact_person: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    tax_id: Option<String>,
}

impl VendorDraft {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
    pub fn set_contact_person(mut self, contact: &str) -> Self {
        self.contact_person = Some(contact.to_string());
        self
    }
    pub fn set_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
    pub fn set_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }
    pub fn set_address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }
    pub fn set_tax_id(mut self, tax_id: &str) -> Self {
        self.tax_id = Some(tax_id.to_string());
        self
    }

    // Checks fields then finalises into a Vendor record under the given id.
    // Name and tax id are the fields payment runs depend on; contact fields
    // may be filled in later via update.
    pub fn finalise(self, id: String) -> Result<Vendor, WorkflowError> {
        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(WorkflowError::InvalidVendor("vendor name is not set".into())),
        };
        let tax_id = match self.tax_id {
            Some(tax_id) if !tax_id.trim().is_empty() => tax_id,
            _ => {
                return Err(WorkflowError::InvalidVendor(format!(
                    "vendor {name} has no tax id"
                )));
            }
        };

        Ok(Vendor {
            id,
            name,
            contact_person: self.contact_person.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
            tax_id,
            status: VendorStatus::Active,
            total_payments_cents: 0,
            last_payment_date: None,
        })
    }
}

/// Patch applied by `update_vendor`. `None` fields are left untouched.
#[derive(Default, Debug, Clone)]
pub struct VendorUpdate {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
}

impl VendorUpdate {
    pub fn apply(&self, vendor: &mut Vendor) {
        if let Some(name) = &self.name {
            vendor.name = name.clone();
        }
        if let Some(contact) = &self.contact_person {
            vendor.contact_person = contact.clone();
        }
        if let Some(email) = &self.email {
            vendor.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            vendor.phone = phone.clone();
        }
        if let Some(address) = &self.address {
            vendor.address = address.clone();
        }
        if let Some(tax_id) = &self.tax_id {
            vendor.tax_id = tax_id.clone();
        }
    }
}
