//! Shipment dispatch: booking, tracking and cancelling parcels, and keeping
//! the order's tracking fields in step.

use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use common::{ErrorKind, Money, OrderId, ShipmentId, UserId};
use document_store::{DocumentQuery, DocumentStore, DocumentStoreError};
use domain::actor::require_admin;
use domain::{
    Actor, Aggregate, DomainError, Order, OrderService, OrderStatus, PaymentGateway,
    ProductCatalog, Repository, StatusUpdate,
};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::carrier::{CarrierCode, CarrierFailure, CarrierGateway, CarrierRegistry, ShipmentRequest};
use crate::config::ShippingConfig;
use crate::error::{Result, ShippingError};
use crate::label::{ShippingLabel, render_label};
use crate::model::{
    CargoShipment, ContactInfo, NewShipment, PackageInfo, ShipmentStatus, TrackingReport,
};

/// Rate shopping input. Weights in kg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRequest {
    /// Quote a single carrier instead of every registered one.
    pub carrier: Option<CarrierCode>,
    pub sender_city: String,
    pub receiver_city: String,
    pub weight: Decimal,
    pub dimensional_weight: Decimal,
}

impl RateRequest {
    /// Quotes every registered carrier for a package.
    pub fn for_package(
        sender_city: impl Into<String>,
        receiver_city: impl Into<String>,
        package: &PackageInfo,
    ) -> Self {
        Self {
            carrier: None,
            sender_city: sender_city.into(),
            receiver_city: receiver_city.into(),
            weight: package.weight,
            dimensional_weight: package.billable_weight(),
        }
    }

    pub fn only(mut self, carrier: CarrierCode) -> Self {
        self.carrier = Some(carrier);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    pub carrier: CarrierCode,
    pub carrier_name: String,
    pub cost: Money,
    pub estimated_delivery_days: u32,
    pub service_type: String,
}

/// Outcome for one order of a bulk dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkShipmentResult {
    pub order_id: OrderId,
    pub success: bool,
    pub tracking_number: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub message: Option<String>,
}

/// Result of cancelling an order that may already be with a carrier.
#[derive(Debug, Clone)]
pub struct OrderCancellation {
    pub order: Order,
    /// Tracking number of the shipment that was cancelled at the carrier.
    pub cancelled_shipment: Option<String>,
    /// Why the carrier cancellation failed, if it did. Stock is restored regardless.
    pub carrier_error: Option<String>,
}

/// Admin listing filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipmentFilter {
    pub status: Option<ShipmentStatus>,
    pub carrier: Option<CarrierCode>,
}

/// Hands orders to carriers.
///
/// The shipment record refers to its order by id; the order's tracking
/// number and carrier name are a copy kept current through [`OrderService`].
pub struct DispatchService<S, C, P>
where
    S: DocumentStore,
    C: ProductCatalog,
    P: PaymentGateway,
{
    shipments: Repository<S, CargoShipment>,
    orders: OrderService<S, C, P>,
    carriers: CarrierRegistry,
    config: ShippingConfig,
}

impl<S, C, P> Clone for DispatchService<S, C, P>
where
    S: DocumentStore + Clone,
    C: ProductCatalog + Clone,
    P: PaymentGateway + Clone,
{
    fn clone(&self) -> Self {
        Self {
            shipments: self.shipments.clone(),
            orders: self.orders.clone(),
            carriers: self.carriers.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, C, P> DispatchService<S, C, P>
where
    S: DocumentStore + Clone,
    C: ProductCatalog,
    P: PaymentGateway,
{
    pub fn new(
        store: S,
        orders: OrderService<S, C, P>,
        carriers: CarrierRegistry,
        config: ShippingConfig,
    ) -> Self {
        Self {
            shipments: Repository::new(store),
            orders,
            carriers,
            config,
        }
    }

    pub fn carriers(&self) -> &CarrierRegistry {
        &self.carriers
    }

    /// Runs one carrier call under the configured timeout.
    async fn call<T>(
        &self,
        carrier: CarrierCode,
        operation: &'static str,
        fut: impl Future<Output = std::result::Result<T, CarrierFailure>>,
    ) -> Result<T> {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.config.carrier_timeout, fut).await;
        metrics::histogram!(
            "carrier_call_duration_seconds",
            "carrier" => carrier.as_str(),
            "operation" => operation
        )
        .record(started.elapsed().as_secs_f64());

        let error = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(failure)) => ShippingError::Carrier {
                carrier,
                detail: failure.0,
            },
            Err(_) => ShippingError::Timeout {
                carrier,
                after: self.config.carrier_timeout,
            },
        };
        metrics::counter!(
            "carrier_errors_total",
            "carrier" => carrier.as_str(),
            "operation" => operation
        )
        .increment(1);
        tracing::warn!(%carrier, operation, error = %error, "carrier call failed");
        Err(error)
    }

    /// Books a parcel for an order and marks the order shipped.
    ///
    /// The carrier is asked for a quote before booking. If the shipment record
    /// or the order update cannot be saved, the booking is cancelled at the
    /// carrier and the record removed, so a retry starts clean.
    #[tracing::instrument(skip(self, package))]
    pub async fn create_shipment(
        &self,
        order_id: OrderId,
        carrier: CarrierCode,
        package: PackageInfo,
        is_admin: bool,
    ) -> Result<CargoShipment> {
        require_admin(is_admin, "create shipments")?;
        package.validate()?;
        let gateway = self.carriers.get(carrier)?;

        let order = self.orders.load(order_id).await?;
        if !order.status.can_ship() {
            return Err(ShippingError::OrderNotShippable {
                status: order.status,
            });
        }
        if self.find_for_order(order_id).await?.is_some() {
            return Err(ShippingError::ShipmentAlreadyExists(order_id));
        }

        let receiver = ContactInfo::from(&order.shipping_address);
        let sender = self.config.sender.clone();
        let cost = self
            .call(
                carrier,
                "quote_rate",
                gateway.quote_rate(
                    &sender.city,
                    &receiver.city,
                    package.weight,
                    package.billable_weight(),
                ),
            )
            .await?;

        let request = ShipmentRequest {
            order_number: order.order_number.clone(),
            sender: sender.clone(),
            receiver: receiver.clone(),
            package: package.clone(),
        };
        let tracking_number = self
            .call(carrier, "create_shipment", gateway.create_shipment(&request))
            .await?;

        let mut shipment = CargoShipment::open(
            NewShipment {
                order_id,
                order_number: order.order_number.clone(),
                user_id: order.user_id,
                carrier,
                tracking_number: tracking_number.clone(),
                sender,
                receiver,
                package,
                cost,
            },
            Utc::now(),
        );

        if let Err(e) = self.shipments.save(&mut shipment).await {
            self.cancel_booking(gateway.as_ref(), carrier, &tracking_number).await;
            return Err(match e {
                DomainError::Store(DocumentStoreError::UniqueViolation { key, .. })
                    if key == "order_id" =>
                {
                    ShippingError::ShipmentAlreadyExists(order_id)
                }
                other => other.into(),
            });
        }

        if let Err(e) = self
            .orders
            .record_shipment(order_id, carrier.display_name(), &tracking_number)
            .await
        {
            tracing::warn!(%order_id, error = %e, "order rejected shipment, undoing booking");
            if let Err(delete_err) = self.shipments.delete(&shipment.id()).await {
                tracing::error!(shipment_id = %shipment.id, error = %delete_err, "failed to remove shipment record");
            }
            self.cancel_booking(gateway.as_ref(), carrier, &tracking_number).await;
            return Err(match e {
                DomainError::Order(domain::OrderError::NotShippable { status }) => {
                    ShippingError::OrderNotShippable { status }
                }
                other => other.into(),
            });
        }

        metrics::counter!("shipments_created_total", "carrier" => carrier.as_str()).increment(1);
        tracing::info!(
            %order_id,
            order_number = %shipment.order_number,
            tracking_number = %shipment.tracking_number,
            cost = %shipment.cost,
            "shipment created"
        );
        Ok(shipment)
    }

    async fn cancel_booking(
        &self,
        gateway: &dyn CarrierGateway,
        carrier: CarrierCode,
        tracking_number: &str,
    ) {
        match self
            .call(carrier, "cancel_shipment", gateway.cancel_shipment(tracking_number))
            .await
        {
            Ok(true) => tracing::debug!(%carrier, tracking_number, "carrier booking cancelled"),
            Ok(false) => tracing::error!(%carrier, tracking_number, "carrier refused to cancel booking"),
            Err(e) => tracing::error!(%carrier, tracking_number, error = %e, "failed to cancel carrier booking"),
        }
    }

    /// Pulls the latest tracking data from the carrier into the stored shipment.
    ///
    /// A delivered parcel marks its order delivered. A stored shipment booked
    /// with another carrier is reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn track_shipment(
        &self,
        tracking_number: &str,
        carrier: CarrierCode,
    ) -> Result<TrackingReport> {
        let gateway = self.carriers.get(carrier)?;
        let stored = self.find_by_tracking(tracking_number).await?;
        if let Some(shipment) = &stored
            && shipment.carrier != carrier
        {
            return Err(ShippingError::NotFound(format!(
                "{} shipment {tracking_number}",
                carrier.display_name()
            )));
        }

        let report = self
            .call(carrier, "track_shipment", gateway.track_shipment(tracking_number))
            .await?;

        let Some(shipment) = stored else {
            return Ok(report);
        };
        let (shipment, ()) = self
            .shipments
            .update(&shipment.id(), |s| {
                s.apply_tracking(&report, Utc::now());
                Ok::<_, DomainError>(())
            })
            .await?;

        if shipment.status == ShipmentStatus::Delivered {
            self.orders.record_delivery(shipment.order_id).await?;
        }
        tracing::debug!(tracking_number, status = %shipment.status, "tracking refreshed");
        Ok(report)
    }

    /// Quotes carriers, cheapest first.
    ///
    /// Asking for one carrier surfaces its error; shopping across all of them
    /// skips carriers that fail.
    #[tracing::instrument(skip(self))]
    pub async fn get_rates(&self, request: &RateRequest) -> Result<Vec<RateQuote>> {
        if let Some(carrier) = request.carrier {
            let gateway = self.carriers.get(carrier)?;
            let cost = self.quote(gateway.as_ref(), carrier, request).await?;
            return Ok(vec![rate_quote(carrier, cost)]);
        }

        let quotes = join_all(self.carriers.codes().into_iter().map(|carrier| async move {
            let gateway = self.carriers.get(carrier)?;
            let cost = self.quote(gateway.as_ref(), carrier, request).await?;
            Ok::<_, ShippingError>(rate_quote(carrier, cost))
        }))
        .await;

        let mut rates: Vec<RateQuote> = quotes
            .into_iter()
            .filter_map(|quote| match quote {
                Ok(quote) => Some(quote),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping carrier in rate shopping");
                    None
                }
            })
            .collect();
        rates.sort_by(|a, b| a.cost.cmp(&b.cost).then(a.carrier.cmp(&b.carrier)));
        Ok(rates)
    }

    async fn quote(
        &self,
        gateway: &dyn CarrierGateway,
        carrier: CarrierCode,
        request: &RateRequest,
    ) -> Result<Money> {
        self.call(
            carrier,
            "quote_rate",
            gateway.quote_rate(
                &request.sender_city,
                &request.receiver_city,
                request.weight,
                request.dimensional_weight,
            ),
        )
        .await
    }

    /// Cancels a parcel at the carrier and, if the carrier agrees, marks the
    /// stored shipment cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_shipment(
        &self,
        tracking_number: &str,
        carrier: CarrierCode,
        is_admin: bool,
    ) -> Result<bool> {
        require_admin(is_admin, "cancel shipments")?;
        let gateway = self.carriers.get(carrier)?;
        let cancelled = self
            .call(carrier, "cancel_shipment", gateway.cancel_shipment(tracking_number))
            .await?;

        if cancelled {
            self.mark_cancelled(tracking_number).await?;
            tracing::info!(tracking_number, %carrier, "shipment cancelled");
        }
        Ok(cancelled)
    }

    async fn mark_cancelled(&self, tracking_number: &str) -> Result<()> {
        if let Some(shipment) = self.find_by_tracking(tracking_number).await? {
            self.shipments
                .update(&shipment.id(), |s| {
                    s.cancel(Utc::now());
                    Ok::<_, DomainError>(())
                })
                .await?;
        }
        Ok(())
    }

    /// Ships each order with the standard package, one at a time.
    ///
    /// A failing order is reported in its result and does not stop the rest.
    #[tracing::instrument(skip(self, order_ids), fields(orders = order_ids.len()))]
    pub async fn create_bulk_shipments(
        &self,
        order_ids: &[OrderId],
        carrier: CarrierCode,
        is_admin: bool,
    ) -> Result<Vec<BulkShipmentResult>> {
        require_admin(is_admin, "create shipments")?;

        let mut results = Vec::with_capacity(order_ids.len());
        for &order_id in order_ids {
            let outcome = match self.orders.load(order_id).await {
                Ok(order) => {
                    let package = PackageInfo::standard(
                        order.totals.total,
                        format!("Order {}", order.order_number),
                    );
                    self.create_shipment(order_id, carrier, package, true).await
                }
                Err(e) => Err(e.into()),
            };

            results.push(match outcome {
                Ok(shipment) => BulkShipmentResult {
                    order_id,
                    success: true,
                    tracking_number: Some(shipment.tracking_number),
                    error_kind: None,
                    message: None,
                },
                Err(e) => BulkShipmentResult {
                    order_id,
                    success: false,
                    tracking_number: None,
                    error_kind: Some(e.kind()),
                    message: Some(e.to_string()),
                },
            });
        }

        let shipped = results.iter().filter(|r| r.success).count();
        tracing::info!(shipped, failed = results.len() - shipped, "bulk dispatch finished");
        Ok(results)
    }

    /// Cancels an order and withdraws any live shipment from its carrier.
    ///
    /// Customers go through the regular cancellation guard; administrators
    /// may also cancel orders already shipped. Stock is restored by the order
    /// side before the carrier is contacted, and a carrier failure is only
    /// reported.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        reason: &str,
        actor: &Actor,
    ) -> Result<OrderCancellation> {
        let order = if actor.is_admin {
            self.orders
                .update_status(
                    order_id,
                    StatusUpdate::to(OrderStatus::Cancelled).with_note(reason),
                    actor,
                )
                .await?
        } else {
            self.orders.cancel_order(order_id, reason, actor).await?
        };

        let mut result = OrderCancellation {
            order,
            cancelled_shipment: None,
            carrier_error: None,
        };

        let Some(shipment) = self.find_for_order(order_id).await? else {
            return Ok(result);
        };
        if !shipment.status.is_live() {
            return Ok(result);
        }

        let withdrawn = match self.carriers.get(shipment.carrier) {
            Ok(gateway) => {
                self.call(
                    shipment.carrier,
                    "cancel_shipment",
                    gateway.cancel_shipment(&shipment.tracking_number),
                )
                .await
            }
            Err(e) => Err(e),
        };
        match withdrawn {
            Ok(true) => {
                self.mark_cancelled(&shipment.tracking_number).await?;
                result.cancelled_shipment = Some(shipment.tracking_number);
            }
            Ok(false) => {
                result.carrier_error = Some(format!(
                    "{} refused to cancel {}",
                    shipment.carrier.display_name(),
                    shipment.tracking_number
                ));
            }
            Err(e) => {
                tracing::error!(%order_id, tracking_number = %shipment.tracking_number, error = %e, "shipment left with carrier after cancellation");
                result.carrier_error = Some(e.to_string());
            }
        }
        Ok(result)
    }

    /// The shipment for an order visible to the actor.
    pub async fn shipment_for_order(&self, order_id: OrderId, actor: &Actor) -> Result<CargoShipment> {
        let shipment = self
            .find_for_order(order_id)
            .await?
            .ok_or_else(|| ShippingError::NotFound(format!("order {order_id}")))?;
        actor.ensure_access(shipment.user_id, "view this shipment")?;
        Ok(shipment)
    }

    /// Shipments of a customer's orders, newest first.
    pub async fn my_shipments(&self, user_id: UserId) -> Result<Vec<CargoShipment>> {
        let query = DocumentQuery::collection(CargoShipment::aggregate_type())
            .key("user_id", user_id.to_string())
            .newest_first();
        Ok(self.shipments.find(query).await?)
    }

    /// All shipments, newest first. Administrators only.
    pub async fn list_shipments(
        &self,
        filter: &ShipmentFilter,
        is_admin: bool,
    ) -> Result<Vec<CargoShipment>> {
        require_admin(is_admin, "list shipments")?;

        let mut query = DocumentQuery::collection(CargoShipment::aggregate_type());
        if let Some(status) = filter.status {
            query = query.key("status", status.as_str());
        }
        if let Some(carrier) = filter.carrier {
            query = query.key("carrier", carrier.as_str());
        }
        Ok(self.shipments.find(query.newest_first()).await?)
    }

    /// Renders the label of a stored shipment. Administrators only.
    pub async fn label(&self, shipment_id: ShipmentId, is_admin: bool) -> Result<ShippingLabel> {
        require_admin(is_admin, "print shipping labels")?;
        let shipment = self
            .shipments
            .load(&shipment_id.to_string())
            .await?
            .ok_or_else(|| ShippingError::NotFound(shipment_id.to_string()))?;
        Ok(render_label(&shipment))
    }

    async fn find_for_order(&self, order_id: OrderId) -> Result<Option<CargoShipment>> {
        Ok(self
            .shipments
            .find_one("order_id", &order_id.to_string())
            .await?)
    }

    async fn find_by_tracking(&self, tracking_number: &str) -> Result<Option<CargoShipment>> {
        Ok(self
            .shipments
            .find_one("tracking_number", tracking_number)
            .await?)
    }
}

fn rate_quote(carrier: CarrierCode, cost: Money) -> RateQuote {
    RateQuote {
        carrier,
        carrier_name: carrier.display_name().to_string(),
        cost,
        estimated_delivery_days: carrier.estimated_delivery_days(),
        service_type: "Standard".to_string(),
    }
}
