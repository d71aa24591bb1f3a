//! Carrier integrations and shipment dispatch.
//!
//! Carriers are reached through the [`CarrierGateway`] trait and looked up by
//! [`CarrierCode`] in a [`CarrierRegistry`]. The [`DispatchService`] books
//! parcels for orders, keeps one shipment per order, refreshes tracking and
//! mirrors shipping progress onto the order.

pub mod carrier;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod label;
pub mod model;
pub mod simulated;

pub use carrier::{CarrierCode, CarrierFailure, CarrierGateway, CarrierRegistry, ShipmentRequest};
pub use config::ShippingConfig;
pub use dispatch::{
    BulkShipmentResult, DispatchService, OrderCancellation, RateQuote, RateRequest,
    ShipmentFilter,
};
pub use error::{Result, ShippingError};
pub use label::{ShippingLabel, render_label};
pub use model::{
    CargoShipment, ContactInfo, NewShipment, PackageInfo, ShipmentStatus, TrackingEvent,
    TrackingReport,
};
pub use simulated::{RateCard, SimulatedCarrier};
