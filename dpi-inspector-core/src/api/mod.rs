//! The administrative HTTP surface (spec.md §6): `/ingest`, `/analyze`,
//! `/stats`, `/stats/connections`, `/rules/{ip,domain,app}[/{value}]`,
//! `/health`. Implemented with bare `hyper::service::service_fn` and a
//! manual path match, in the same style as the teacher's
//! `telemetry/metrics.rs` serves `/metrics` — no web framework.
mod server;
mod types;

pub use server::{start_admin_server, AdminState};
