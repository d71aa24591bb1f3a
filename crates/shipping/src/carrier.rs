//! Carrier capability trait and the registry dispatch looks carriers up in.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use common::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Result, ShippingError};
use crate::model::{ContactInfo, PackageInfo, TrackingReport};

/// Carriers the shop knows about. Which ones are usable depends on what is
/// registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CarrierCode {
    Aras,
    Mng,
    Yurtici,
    Ptt,
    Surat,
    Ups,
}

impl CarrierCode {
    pub const ALL: [CarrierCode; 6] = [
        CarrierCode::Aras,
        CarrierCode::Mng,
        CarrierCode::Yurtici,
        CarrierCode::Ptt,
        CarrierCode::Surat,
        CarrierCode::Ups,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CarrierCode::Aras => "aras",
            CarrierCode::Mng => "mng",
            CarrierCode::Yurtici => "yurtici",
            CarrierCode::Ptt => "ptt",
            CarrierCode::Surat => "surat",
            CarrierCode::Ups => "ups",
        }
    }

    /// Name printed on labels and order history.
    pub fn display_name(&self) -> &'static str {
        match self {
            CarrierCode::Aras => "Aras Kargo",
            CarrierCode::Mng => "MNG Kargo",
            CarrierCode::Yurtici => "Yurtiçi Kargo",
            CarrierCode::Ptt => "PTT Kargo",
            CarrierCode::Surat => "Sürat Kargo",
            CarrierCode::Ups => "UPS",
        }
    }

    pub fn estimated_delivery_days(&self) -> u32 {
        match self {
            CarrierCode::Aras | CarrierCode::Mng | CarrierCode::Surat => 2,
            CarrierCode::Yurtici => 3,
            CarrierCode::Ptt => 4,
            CarrierCode::Ups => 1,
        }
    }
}

impl std::fmt::Display for CarrierCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CarrierCode {
    type Err = ShippingError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        CarrierCode::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ShippingError::UnsupportedCarrier(wanted.to_string()))
    }
}

/// A failure reported by a carrier integration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CarrierFailure(pub String);

impl CarrierFailure {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

/// What a carrier needs to accept a parcel.
#[derive(Debug, Clone)]
pub struct ShipmentRequest {
    pub order_number: String,
    pub sender: ContactInfo,
    pub receiver: ContactInfo,
    pub package: PackageInfo,
}

/// Operations every carrier integration provides.
///
/// Implementations may call a remote provider; the dispatcher bounds each
/// call with a timeout and wraps failures with the carrier's name.
#[async_trait]
pub trait CarrierGateway: Send + Sync {
    /// Price for sending a parcel between two cities.
    async fn quote_rate(
        &self,
        sender_city: &str,
        receiver_city: &str,
        weight: Decimal,
        dimensional_weight: Decimal,
    ) -> std::result::Result<Money, CarrierFailure>;

    /// Books a parcel and returns its tracking number.
    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> std::result::Result<String, CarrierFailure>;

    async fn track_shipment(
        &self,
        tracking_number: &str,
    ) -> std::result::Result<TrackingReport, CarrierFailure>;

    /// Returns false when the carrier refuses, e.g. the parcel is already delivered.
    async fn cancel_shipment(&self, tracking_number: &str)
    -> std::result::Result<bool, CarrierFailure>;
}

/// Carrier gateways keyed by carrier code.
#[derive(Clone, Default)]
pub struct CarrierRegistry {
    gateways: HashMap<CarrierCode, Arc<dyn CarrierGateway>>,
}

impl CarrierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a gateway, replacing any earlier one for the same code.
    pub fn register(mut self, code: CarrierCode, gateway: impl CarrierGateway + 'static) -> Self {
        self.gateways.insert(code, Arc::new(gateway));
        self
    }

    pub fn get(&self, code: CarrierCode) -> Result<Arc<dyn CarrierGateway>> {
        self.gateways
            .get(&code)
            .cloned()
            .ok_or_else(|| ShippingError::UnsupportedCarrier(code.display_name().to_string()))
    }

    pub fn contains(&self, code: CarrierCode) -> bool {
        self.gateways.contains_key(&code)
    }

    /// Registered codes in a stable order.
    pub fn codes(&self) -> Vec<CarrierCode> {
        let mut codes: Vec<CarrierCode> = self.gateways.keys().copied().collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}

impl std::fmt::Debug for CarrierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierRegistry")
            .field("carriers", &self.codes())
            .finish()
    }
}
