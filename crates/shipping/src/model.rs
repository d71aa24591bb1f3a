//! Shipment records and the values carried with them.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ShipmentId, UserId};
use document_store::{IndexKey, Version};
use domain::{Address, Aggregate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::carrier::CarrierCode;
use crate::error::{Result, ShippingError};

/// Where a parcel is, as reported by its carrier.
///
/// Only `Cancelled` is ever set locally; every other value comes from
/// carrier tracking data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShipmentStatus {
    #[default]
    Created,
    PickedUp,
    InTransit,
    InBranch,
    OutForDelivery,
    Delivered,
    FailedDelivery,
    Returned,
    Cancelled,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Created => "Created",
            ShipmentStatus::PickedUp => "PickedUp",
            ShipmentStatus::InTransit => "InTransit",
            ShipmentStatus::InBranch => "InBranch",
            ShipmentStatus::OutForDelivery => "OutForDelivery",
            ShipmentStatus::Delivered => "Delivered",
            ShipmentStatus::FailedDelivery => "FailedDelivery",
            ShipmentStatus::Returned => "Returned",
            ShipmentStatus::Cancelled => "Cancelled",
        }
    }

    /// Still with the carrier and worth cancelling.
    pub fn is_live(&self) -> bool {
        !matches!(
            self,
            ShipmentStatus::Delivered | ShipmentStatus::Returned | ShipmentStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One scan in a parcel's journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: ShipmentStatus,
    pub description: String,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_delivered: bool,
}

impl TrackingEvent {
    pub fn new(
        status: ShipmentStatus,
        description: impl Into<String>,
        location: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            status,
            description: description.into(),
            location,
            timestamp,
            is_delivered: status == ShipmentStatus::Delivered,
        }
    }
}

/// Sender or receiver block on a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    pub city: String,
    pub district: String,
    pub postal_code: String,
}

impl From<&Address> for ContactInfo {
    fn from(address: &Address) -> Self {
        Self {
            full_name: address.full_name.clone(),
            phone: address.phone.clone(),
            email: (!address.email.is_empty()).then(|| address.email.clone()),
            address: address.street(),
            city: address.city.clone(),
            district: address.state.clone(),
            postal_code: address.postal_code.clone(),
        }
    }
}

/// Divisor turning cubic centimetres into volumetric kilograms.
pub const VOLUMETRIC_DIVISOR: u32 = 3000;

/// Physical description of what is being sent. Weights in kg, sizes in cm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub weight: Decimal,
    pub width: Decimal,
    pub height: Decimal,
    pub length: Decimal,
    #[serde(default = "one")]
    pub package_count: u32,
    pub declared_value: Money,
    pub description: Option<String>,
}

fn one() -> u32 {
    1
}

impl PackageInfo {
    pub fn new(weight: Decimal, width: Decimal, height: Decimal, length: Decimal) -> Self {
        Self {
            weight,
            width,
            height,
            length,
            package_count: 1,
            declared_value: Money::ZERO,
            description: None,
        }
    }

    /// The box used when no measurements are supplied: 2.5 kg, 30x20x40 cm.
    pub fn standard(declared_value: Money, description: impl Into<String>) -> Self {
        Self {
            declared_value,
            description: Some(description.into()),
            ..Self::new(
                Decimal::new(25, 1),
                Decimal::from(30),
                Decimal::from(20),
                Decimal::from(40),
            )
        }
    }

    pub fn with_declared_value(mut self, value: Money) -> Self {
        self.declared_value = value;
        self
    }

    /// `width * height * length / 3000`, to two decimals.
    pub fn dimensional_weight(&self) -> Decimal {
        (self.width * self.height * self.length / Decimal::from(VOLUMETRIC_DIVISOR)).round_dp(2)
    }

    /// The weight carriers bill: the larger of actual and dimensional.
    pub fn billable_weight(&self) -> Decimal {
        self.weight.max(self.dimensional_weight())
    }

    pub fn validate(&self) -> Result<()> {
        let measures = [
            ("weight", self.weight),
            ("width", self.width),
            ("height", self.height),
            ("length", self.length),
        ];
        if let Some((name, _)) = measures.iter().find(|(_, v)| *v <= Decimal::ZERO) {
            return Err(ShippingError::InvalidInput(format!(
                "package {name} must be positive"
            )));
        }
        if self.package_count == 0 {
            return Err(ShippingError::InvalidInput(
                "package count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A parcel handed to a carrier for one order.
///
/// The order id and the tracking number are unique keys, so at most one
/// shipment can ever exist per order even under concurrent dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CargoShipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub carrier: CarrierCode,
    pub tracking_number: String,
    pub status: ShipmentStatus,
    pub sender: ContactInfo,
    pub receiver: ContactInfo,
    pub package: PackageInfo,
    pub billable_weight: Decimal,
    pub cost: Money,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub tracking_history: Vec<TrackingEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    version: Version,
}

/// Everything needed to open a shipment record.
#[derive(Debug, Clone)]
pub struct NewShipment {
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub carrier: CarrierCode,
    pub tracking_number: String,
    pub sender: ContactInfo,
    pub receiver: ContactInfo,
    pub package: PackageInfo,
    pub cost: Money,
}

impl CargoShipment {
    /// Opens a shipment in `Created` with its first tracking event.
    pub fn open(new: NewShipment, now: DateTime<Utc>) -> Self {
        let estimated_delivery =
            now + chrono::Duration::days(i64::from(new.carrier.estimated_delivery_days()));
        let first_event = TrackingEvent::new(
            ShipmentStatus::Created,
            "Shipment created",
            Some(new.sender.city.clone()),
            now,
        );
        Self {
            id: ShipmentId::new(),
            order_id: new.order_id,
            order_number: new.order_number,
            user_id: new.user_id,
            carrier: new.carrier,
            tracking_number: new.tracking_number,
            status: ShipmentStatus::Created,
            sender: new.sender,
            receiver: new.receiver,
            billable_weight: new.package.billable_weight(),
            package: new.package,
            cost: new.cost,
            estimated_delivery: Some(estimated_delivery),
            actual_delivery: None,
            tracking_history: vec![first_event],
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        }
    }

    /// Replaces status and history with what the carrier reported.
    pub fn apply_tracking(&mut self, report: &TrackingReport, now: DateTime<Utc>) {
        self.status = report.status;
        self.tracking_history = report.history.clone();
        if report.estimated_delivery.is_some() {
            self.estimated_delivery = report.estimated_delivery;
        }
        if report.actual_delivery.is_some() {
            self.actual_delivery = report.actual_delivery;
        }
        self.updated_at = now;
    }

    /// Marks the shipment cancelled. Returns false if it already was.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == ShipmentStatus::Cancelled {
            return false;
        }
        self.status = ShipmentStatus::Cancelled;
        self.tracking_history.push(TrackingEvent::new(
            ShipmentStatus::Cancelled,
            "Shipment cancelled",
            None,
            now,
        ));
        self.updated_at = now;
        true
    }
}

impl Aggregate for CargoShipment {
    fn aggregate_type() -> &'static str {
        "shipments"
    }

    fn id(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![
            IndexKey::unique("order_id", self.order_id.to_string()),
            IndexKey::unique("tracking_number", self.tracking_number.clone()),
            IndexKey::new("user_id", self.user_id.to_string()),
            IndexKey::new("status", self.status.as_str()),
            IndexKey::new("carrier", self.carrier.as_str()),
        ]
    }
}

/// A carrier's answer to a tracking query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingReport {
    pub tracking_number: String,
    pub carrier: CarrierCode,
    pub status: ShipmentStatus,
    pub history: Vec<TrackingEvent>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
}
