//! Simulated side-effecting tools.
//!
//! Two fixed tools: `order_lookup` against a small static order table and
//! `create_ticket` with deterministic validation. Latency and stochastic
//! failure come from a [`ToolSim`] source so tests can force either branch
//! without sleeping or rolling dice.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use helpline_core::domain::tool::ToolExecution;
use rand::Rng;
use serde_json::{json, Value};
use tracing::debug;

/// Probability that an order lookup fails with a service outage.
const ORDER_LOOKUP_FAILURE_RATE: f64 = 0.2;
const MIN_TICKET_DESCRIPTION_CHARS: usize = 10;

/// Source of the executor's randomness: failure rolls, latency draws, and
/// ticket-id suffixes.
pub trait ToolSim: Send + Sync {
    /// Uniform draw in [0, 1) consumed by the failure check.
    fn failure_roll(&self) -> f64;
    /// Simulated latency, uniform in `min..=max` milliseconds.
    fn latency_ms(&self, min: u64, max: u64) -> u64;
    /// Random component of a ticket id, in 0..1000.
    fn ticket_suffix(&self) -> u32;
}

/// Production source backed by the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRngSim;

impl ToolSim for ThreadRngSim {
    fn failure_roll(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }

    fn latency_ms(&self, min: u64, max: u64) -> u64 {
        rand::thread_rng().gen_range(min..=max)
    }

    fn ticket_suffix(&self) -> u32 {
        rand::thread_rng().gen_range(0..1000)
    }
}

pub struct ToolExecutor<S = ThreadRngSim> {
    sim: S,
    orders: HashMap<String, Value>,
}

impl ToolExecutor<ThreadRngSim> {
    pub fn new() -> Self {
        Self::with_sim(ThreadRngSim)
    }
}

impl Default for ToolExecutor<ThreadRngSim> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ToolSim> ToolExecutor<S> {
    pub fn with_sim(sim: S) -> Self {
        Self { sim, orders: default_order_table() }
    }

    pub fn with_sim_and_orders(sim: S, orders: HashMap<String, Value>) -> Self {
        Self { sim, orders }
    }

    /// Dispatch on the tool name. Unknown names fail immediately with zero
    /// latency; they are a routing bug, not a simulated outage.
    pub async fn execute(&self, tool_name: &str, arguments: Value) -> ToolExecution {
        match tool_name {
            "order_lookup" => self.order_lookup(arguments).await,
            "create_ticket" => self.create_ticket(arguments).await,
            other => ToolExecution::failed(other, arguments, format!("Unknown tool: {other}"), 0),
        }
    }

    async fn order_lookup(&self, arguments: Value) -> ToolExecution {
        let started = Instant::now();
        let order_id =
            arguments.get("orderId").and_then(Value::as_str).unwrap_or_default().to_string();

        tokio::time::sleep(Duration::from_millis(self.sim.latency_ms(100, 300))).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        if self.sim.failure_roll() < ORDER_LOOKUP_FAILURE_RATE {
            return ToolExecution::failed(
                "order_lookup",
                arguments,
                "Order lookup service temporarily unavailable",
                latency_ms,
            );
        }

        // "Not found" is a successful lookup with a Not Found record, never
        // an error.
        let record = self.orders.get(&order_id).cloned().unwrap_or_else(|| {
            json!({
                "orderId": order_id,
                "status": "Not Found",
                "message": "Order not found in system",
            })
        });

        debug!(
            event_name = "tools.order_lookup",
            order_id = %order_id,
            latency_ms,
            "order lookup completed"
        );
        ToolExecution::succeeded("order_lookup", arguments, record, latency_ms)
    }

    async fn create_ticket(&self, arguments: Value) -> ToolExecution {
        let started = Instant::now();
        let category =
            arguments.get("category").and_then(Value::as_str).unwrap_or("general").to_string();
        let description =
            arguments.get("description").and_then(Value::as_str).unwrap_or_default().to_string();

        tokio::time::sleep(Duration::from_millis(self.sim.latency_ms(150, 400))).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        if description.chars().count() < MIN_TICKET_DESCRIPTION_CHARS {
            return ToolExecution::failed(
                "create_ticket",
                arguments,
                "Description too short. Minimum 10 characters required.",
                latency_ms,
            );
        }

        let ticket_id = format!("TKT-{}-{}", unix_millis(), self.sim.ticket_suffix());
        let record = json!({
            "ticketId": ticket_id,
            "category": category,
            "description": description,
            "status": "Open",
            "createdAt": Utc::now().to_rfc3339(),
            "message": "Ticket created successfully",
        });

        debug!(
            event_name = "tools.create_ticket",
            ticket_id = %ticket_id,
            latency_ms,
            "ticket created"
        );
        ToolExecution::succeeded("create_ticket", arguments, record, latency_ms)
    }
}

fn unix_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_millis()).unwrap_or(0)
}

pub fn default_order_table() -> HashMap<String, Value> {
    HashMap::from([
        (
            "1234".to_string(),
            json!({
                "orderId": "1234",
                "status": "In Transit",
                "location": "Mumbai Distribution Center",
                "estimatedDelivery": "2026-02-18",
            }),
        ),
        (
            "5678".to_string(),
            json!({
                "orderId": "5678",
                "status": "Delivered",
                "location": "Delivered to Customer",
                "deliveryDate": "2026-02-10",
            }),
        ),
    ])
}
