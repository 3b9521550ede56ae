//! Request payloads for the card service
//!
//! Every request variant carries exactly the form fields its flow posts.
//! Payloads are plain ordered `(name, value)` pairs because the service only
//! accepts urlencoded forms.

use super::error::ValidationError;

/// Ordered urlencoded form fields
pub type FormFields = Vec<(String, String)>;

/// Postal code sentinel meaning "no postal code supplied"
pub const DEFAULT_POSTAL_CODE: &str = "00000";

/// Canonical card payload posted to every login-style endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    pub card_number: String,
    pub expiration_month: String,
    pub expiration_year: String,
    pub security_code: String,
    /// `None` when the card carries the default postal sentinel
    pub postal_code: Option<String>,
}

impl CardInfo {
    /// Form fields in the order the service's own form submits them
    pub fn form_fields(&self) -> FormFields {
        let mut fields = vec![
            ("CardNumber".to_string(), self.card_number.clone()),
            ("ExpirationMonth".to_string(), self.expiration_month.clone()),
            ("ExpirationYear".to_string(), self.expiration_year.clone()),
            ("SecurityCode".to_string(), self.security_code.clone()),
        ];
        if let Some(postal) = &self.postal_code {
            fields.push(("PostalCode".to_string(), postal.clone()));
        }
        fields
    }
}

/// Contact details posted to the registration-completion endpoint
///
/// The service's profile form is opaque to us, so callers supply the field
/// names along with the values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactInfo {
    fields: FormFields,
}

impl ContactInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one form field, keeping insertion order
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn form_fields(&self) -> FormFields {
        self.fields.clone()
    }
}

/// A four digit card PIN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinCode(String);

impl PinCode {
    /// Validate and wrap a PIN
    pub fn new(pin: &str) -> Result<Self, ValidationError> {
        let pin = pin.trim();
        if pin.len() == 4 && pin.chars().all(|c| c.is_ascii_digit()) {
            Ok(PinCode(pin.to_string()))
        } else {
            Err(ValidationError::InvalidPin)
        }
    }

    /// PIN-set form: the value, its confirmation, and the scraped card token
    pub fn form_fields(&self, card_id: &str) -> FormFields {
        vec![
            ("PinCode".to_string(), self.0.clone()),
            ("ConfirmPin".to_string(), self.0.clone()),
            ("CardID".to_string(), card_id.to_string()),
        ]
    }
}

/// The three operations the card service supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolRequest {
    /// Single POST returning the balance and transaction page
    BalanceLookup { card: CardInfo },

    /// Login, then post contact details to complete registration
    Registration { card: CardInfo, contact: ContactInfo },

    /// Login, scrape the card token, then post the PIN
    SetPin { card: CardInfo, pin: PinCode },
}

impl ProtocolRequest {
    pub fn card(&self) -> &CardInfo {
        match self {
            ProtocolRequest::BalanceLookup { card }
            | ProtocolRequest::Registration { card, .. }
            | ProtocolRequest::SetPin { card, .. } => card,
        }
    }

    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolRequest::BalanceLookup { .. } => "balance",
            ProtocolRequest::Registration { .. } => "registration",
            ProtocolRequest::SetPin { .. } => "set-pin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn card_info(postal: Option<&str>) -> CardInfo {
        CardInfo {
            card_number: "4111111111111111".to_string(),
            expiration_month: "01".to_string(),
            expiration_year: "27".to_string(),
            security_code: "123".to_string(),
            postal_code: postal.map(str::to_string),
        }
    }

    #[test]
    fn test_card_form_fields_without_postal() {
        let fields = card_info(None).form_fields();
        let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec!["CardNumber", "ExpirationMonth", "ExpirationYear", "SecurityCode"]
        );
    }

    #[test]
    fn test_card_form_fields_with_postal() {
        let fields = card_info(Some("94105")).form_fields();
        assert_eq!(
            fields.last(),
            Some(&("PostalCode".to_string(), "94105".to_string()))
        );
    }

    #[rstest]
    #[case::valid("1234", true)]
    #[case::trimmed(" 0000 ", true)]
    #[case::too_short("123", false)]
    #[case::too_long("12345", false)]
    #[case::letters("12a4", false)]
    #[case::empty("", false)]
    fn test_pin_validation(#[case] pin: &str, #[case] valid: bool) {
        assert_eq!(PinCode::new(pin).is_ok(), valid);
    }

    #[test]
    fn test_pin_form_fields_repeat_pin_and_carry_token() {
        let pin = PinCode::new("4321").unwrap();
        assert_eq!(
            pin.form_fields("998877"),
            vec![
                ("PinCode".to_string(), "4321".to_string()),
                ("ConfirmPin".to_string(), "4321".to_string()),
                ("CardID".to_string(), "998877".to_string()),
            ]
        );
    }

    #[test]
    fn test_contact_info_keeps_order() {
        let contact = ContactInfo::new()
            .field("FirstName", "Ada")
            .field("LastName", "Lovelace");
        assert_eq!(contact.form_fields()[0].0, "FirstName");
        assert_eq!(contact.form_fields()[1].1, "Lovelace");
    }
}
