//! Simulated carrier integrations.
//!
//! Each preset prices parcels with its carrier's public rate card and keeps
//! booked parcels in memory. Tests drive parcels forward with
//! [`SimulatedCarrier::advance`] and inject failures or latency.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Money;
use rand::Rng;
use rust_decimal::Decimal;

use crate::carrier::{CarrierCode, CarrierFailure, CarrierGateway, ShipmentRequest};
use crate::model::{ShipmentStatus, TrackingEvent, TrackingReport};

/// `(base + max(weight * per_kg, dimensional * per_volumetric_kg)) * factor`,
/// where the factor applies only between different cities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCard {
    pub base: Decimal,
    pub per_kg: Decimal,
    pub per_volumetric_kg: Decimal,
    pub intercity_factor: Decimal,
}

impl RateCard {
    pub fn quote(
        &self,
        sender_city: &str,
        receiver_city: &str,
        weight: Decimal,
        dimensional_weight: Decimal,
    ) -> Money {
        let by_weight = weight * self.per_kg;
        let by_volume = dimensional_weight * self.per_volumetric_kg;
        let factor = if sender_city.trim().to_lowercase() == receiver_city.trim().to_lowercase() {
            Decimal::ONE
        } else {
            self.intercity_factor
        };
        Money::from_decimal((self.base + by_weight.max(by_volume)) * factor).round_cents()
    }
}

#[derive(Debug, Clone)]
struct Parcel {
    status: ShipmentStatus,
    history: Vec<TrackingEvent>,
    estimated_delivery: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct SimulatedCarrierState {
    parcels: HashMap<String, Parcel>,
    fail_quotes: bool,
    fail_on_create: bool,
    fail_on_track: bool,
    fail_on_cancel: bool,
    latency: Option<Duration>,
    cancellations: usize,
}

/// In-memory carrier with a real rate card.
#[derive(Debug, Clone)]
pub struct SimulatedCarrier {
    code: CarrierCode,
    rates: RateCard,
    tracking_prefix: &'static str,
    state: Arc<RwLock<SimulatedCarrierState>>,
}

impl SimulatedCarrier {
    pub fn new(code: CarrierCode, rates: RateCard, tracking_prefix: &'static str) -> Self {
        Self {
            code,
            rates,
            tracking_prefix,
            state: Arc::default(),
        }
    }

    /// Aras Kargo: 15 + max(2w, 1.5d), x1.5 between cities.
    pub fn aras() -> Self {
        Self::new(
            CarrierCode::Aras,
            RateCard {
                base: Decimal::from(15),
                per_kg: Decimal::from(2),
                per_volumetric_kg: Decimal::new(15, 1),
                intercity_factor: Decimal::new(15, 1),
            },
            "ARAS",
        )
    }

    /// MNG Kargo: 12 + max(1.8w, 1.3d), x1.4 between cities.
    pub fn mng() -> Self {
        Self::new(
            CarrierCode::Mng,
            RateCard {
                base: Decimal::from(12),
                per_kg: Decimal::new(18, 1),
                per_volumetric_kg: Decimal::new(13, 1),
                intercity_factor: Decimal::new(14, 1),
            },
            "MNG",
        )
    }

    /// Yurtiçi Kargo: 14 + max(2.2w, 1.6d), x1.6 between cities.
    pub fn yurtici() -> Self {
        Self::new(
            CarrierCode::Yurtici,
            RateCard {
                base: Decimal::from(14),
                per_kg: Decimal::new(22, 1),
                per_volumetric_kg: Decimal::new(16, 1),
                intercity_factor: Decimal::new(16, 1),
            },
            "YK",
        )
    }

    pub fn code(&self) -> CarrierCode {
        self.code
    }

    pub fn set_fail_quotes(&self, fail: bool) {
        self.write().fail_quotes = fail;
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.write().fail_on_create = fail;
    }

    pub fn set_fail_on_track(&self, fail: bool) {
        self.write().fail_on_track = fail;
    }

    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.write().fail_on_cancel = fail;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.write().latency = latency;
    }

    /// Number of parcels booked so far.
    pub fn parcel_count(&self) -> usize {
        self.read().parcels.len()
    }

    /// Number of parcels cancelled so far.
    pub fn cancellation_count(&self) -> usize {
        self.read().cancellations
    }

    pub fn status_of(&self, tracking_number: &str) -> Option<ShipmentStatus> {
        self.read().parcels.get(tracking_number).map(|p| p.status)
    }

    /// Records a scan. Returns false for an unknown tracking number.
    pub fn advance(&self, tracking_number: &str, status: ShipmentStatus, location: &str) -> bool {
        let mut state = self.write();
        let Some(parcel) = state.parcels.get_mut(tracking_number) else {
            return false;
        };
        let now = Utc::now();
        parcel.status = status;
        parcel.history.push(TrackingEvent::new(
            status,
            describe(status),
            Some(location.to_string()),
            now,
        ));
        if status == ShipmentStatus::Delivered {
            parcel.delivered_at = Some(now);
        }
        true
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SimulatedCarrierState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SimulatedCarrierState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        let latency = self.read().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn tracking_number(&self, now: DateTime<Utc>) -> String {
        format!(
            "{}{}{}",
            self.tracking_prefix,
            now.format("%Y%m%d%H%M%S"),
            rand::rng().random_range(1000..=9999)
        )
    }
}

fn describe(status: ShipmentStatus) -> &'static str {
    match status {
        ShipmentStatus::Created => "Shipment created",
        ShipmentStatus::PickedUp => "Picked up from sender",
        ShipmentStatus::InTransit => "On the way to the receiving branch",
        ShipmentStatus::InBranch => "Arrived at the receiving branch",
        ShipmentStatus::OutForDelivery => "Out for delivery",
        ShipmentStatus::Delivered => "Delivered to receiver",
        ShipmentStatus::FailedDelivery => "Delivery attempt failed",
        ShipmentStatus::Returned => "Returned to sender",
        ShipmentStatus::Cancelled => "Shipment cancelled",
    }
}

#[async_trait]
impl CarrierGateway for SimulatedCarrier {
    async fn quote_rate(
        &self,
        sender_city: &str,
        receiver_city: &str,
        weight: Decimal,
        dimensional_weight: Decimal,
    ) -> Result<Money, CarrierFailure> {
        self.delay().await;
        if self.read().fail_quotes {
            return Err(CarrierFailure::new("rate service unavailable"));
        }
        Ok(self
            .rates
            .quote(sender_city, receiver_city, weight, dimensional_weight))
    }

    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<String, CarrierFailure> {
        self.delay().await;
        let mut state = self.write();
        if state.fail_on_create {
            return Err(CarrierFailure::new("shipment service unavailable"));
        }

        let now = Utc::now();
        let mut tracking_number = self.tracking_number(now);
        while state.parcels.contains_key(&tracking_number) {
            tracking_number = self.tracking_number(now);
        }

        let parcel = Parcel {
            status: ShipmentStatus::Created,
            history: vec![TrackingEvent::new(
                ShipmentStatus::Created,
                format!("Shipment created for order {}", request.order_number),
                Some(request.sender.city.clone()),
                now,
            )],
            estimated_delivery: now
                + chrono::Duration::days(i64::from(self.code.estimated_delivery_days())),
            delivered_at: None,
        };
        state.parcels.insert(tracking_number.clone(), parcel);
        Ok(tracking_number)
    }

    async fn track_shipment(&self, tracking_number: &str) -> Result<TrackingReport, CarrierFailure> {
        self.delay().await;
        let state = self.read();
        if state.fail_on_track {
            return Err(CarrierFailure::new("tracking service unavailable"));
        }
        let parcel = state
            .parcels
            .get(tracking_number)
            .ok_or_else(|| CarrierFailure::new(format!("unknown tracking number {tracking_number}")))?;

        Ok(TrackingReport {
            tracking_number: tracking_number.to_string(),
            carrier: self.code,
            status: parcel.status,
            history: parcel.history.clone(),
            estimated_delivery: Some(parcel.estimated_delivery),
            actual_delivery: parcel.delivered_at,
        })
    }

    async fn cancel_shipment(&self, tracking_number: &str) -> Result<bool, CarrierFailure> {
        self.delay().await;
        let mut state = self.write();
        if state.fail_on_cancel {
            return Err(CarrierFailure::new("cancellation service unavailable"));
        }
        let Some(parcel) = state.parcels.get_mut(tracking_number) else {
            return Ok(false);
        };
        if !parcel.status.is_live() {
            return Ok(parcel.status == ShipmentStatus::Cancelled);
        }

        parcel.status = ShipmentStatus::Cancelled;
        parcel.history.push(TrackingEvent::new(
            ShipmentStatus::Cancelled,
            describe(ShipmentStatus::Cancelled),
            None,
            Utc::now(),
        ));
        state.cancellations += 1;
        Ok(true)
    }
}
