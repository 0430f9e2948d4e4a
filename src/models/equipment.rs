//! Equipment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::enums::EquipmentStatus;

/// Scheme used in QR payloads
pub const QR_SCHEME: &str = "equiplend://equipment/";

/// Equipment record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    /// Category (laptop, camera, monitor, ...)
    pub category: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial_number: String,
    pub status: EquipmentStatus,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub qr_token: Uuid,
    pub crea_date: DateTime<Utc>,
    pub modif_date: DateTime<Utc>,
}

impl Equipment {
    /// String a QR code for this item should encode
    pub fn qr_payload(&self) -> String {
        format!("{}{}", QR_SCHEME, self.qr_token)
    }
}

/// Extract the token from a scanned QR payload (or a bare token)
pub fn parse_qr_payload(payload: &str) -> Option<Uuid> {
    let payload = payload.trim();
    let token = payload.strip_prefix(QR_SCHEME).unwrap_or(payload);
    Uuid::parse_str(token).ok()
}

/// Create equipment request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 50, message = "Category is required"))]
    pub category: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Serial number is required"))]
    pub serial_number: String,
    pub status: Option<EquipmentStatus>,
    pub location: Option<String>,
    pub description: Option<String>,
    #[validate(url(message = "Invalid image URL"))]
    pub image_url: Option<String>,
}

/// Update equipment request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipment {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub serial_number: Option<String>,
    pub status: Option<EquipmentStatus>,
    pub location: Option<String>,
    pub description: Option<String>,
    #[validate(url(message = "Invalid image URL"))]
    pub image_url: Option<String>,
}

/// Search criteria built by the advanced search form, also persisted by saved searches
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct EquipmentSearchCriteria {
    /// Free text matched against name, brand, model and serial number
    pub query: Option<String>,
    pub category: Option<String>,
    pub status: Option<EquipmentStatus>,
    pub location: Option<String>,
    /// Page number (1-based)
    pub page: Option<i64>,
    /// Items per page
    pub per_page: Option<i64>,
}

impl EquipmentSearchCriteria {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(20).clamp(1, 200)
    }

    /// In-memory equivalent of the SQL search
    pub fn matches(&self, equipment: &Equipment) -> bool {
        if let Some(ref category) = self.category {
            if !equipment.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if equipment.status != status {
                return false;
            }
        }
        if let Some(ref location) = self.location {
            let location = crate::text::normalize(location);
            let actual = equipment.location.as_deref().map(crate::text::normalize);
            if !actual.is_some_and(|l| l.contains(&location)) {
                return false;
            }
        }
        if let Some(ref query) = self.query {
            let haystack = [
                Some(equipment.name.as_str()),
                equipment.brand.as_deref(),
                equipment.model.as_deref(),
                Some(equipment.serial_number.as_str()),
            ];
            if !crate::text::any_contains(&haystack, query) {
                return false;
            }
        }
        true
    }
}

/// Equipment count per category
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CategoryCount {
    pub category: String,
    pub total: i64,
    pub available: i64,
}

/// QR payload for an item
#[derive(Debug, Serialize, ToSchema)]
pub struct EquipmentQr {
    pub equipment_id: i32,
    pub qr_token: Uuid,
    /// Content to encode in the QR image
    pub payload: String,
}

#[cfg(test)]
pub(crate) fn sample(id: i32) -> Equipment {
    let now = Utc::now();
    Equipment {
        id,
        name: "MacBook Air 13".to_string(),
        category: "laptop".to_string(),
        brand: Some("Apple".to_string()),
        model: Some("M2".to_string()),
        serial_number: format!("SN-{:04}", id),
        status: EquipmentStatus::Available,
        location: Some("Library, 2nd floor".to_string()),
        description: None,
        image_url: None,
        qr_token: Uuid::new_v4(),
        crea_date: now,
        modif_date: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_payload_round_trip() {
        let eq = sample(1);
        let payload = eq.qr_payload();
        assert!(payload.starts_with(QR_SCHEME));
        assert_eq!(parse_qr_payload(&payload), Some(eq.qr_token));
        assert_eq!(parse_qr_payload(&eq.qr_token.to_string()), Some(eq.qr_token));
        assert_eq!(parse_qr_payload("equiplend://equipment/not-a-uuid"), None);
    }

    #[test]
    fn test_criteria_matching() {
        let eq = sample(7);

        assert!(EquipmentSearchCriteria::default().matches(&eq));

        let by_text = EquipmentSearchCriteria {
            query: Some("apple".to_string()),
            ..Default::default()
        };
        assert!(by_text.matches(&eq));

        let by_serial = EquipmentSearchCriteria {
            query: Some("sn-0007".to_string()),
            ..Default::default()
        };
        assert!(by_serial.matches(&eq));

        let wrong_category = EquipmentSearchCriteria {
            category: Some("camera".to_string()),
            ..Default::default()
        };
        assert!(!wrong_category.matches(&eq));

        let wrong_status = EquipmentSearchCriteria {
            status: Some(EquipmentStatus::Maintenance),
            ..Default::default()
        };
        assert!(!wrong_status.matches(&eq));

        let by_location = EquipmentSearchCriteria {
            location: Some("LIBRARY".to_string()),
            category: Some("Laptop".to_string()),
            ..Default::default()
        };
        assert!(by_location.matches(&eq));
    }

    #[test]
    fn test_pagination_bounds() {
        let c = EquipmentSearchCriteria {
            page: Some(0),
            per_page: Some(10_000),
            ..Default::default()
        };
        assert_eq!(c.page(), 1);
        assert_eq!(c.per_page(), 200);
    }
}
