//! `facetrack-cockpit` – the inbound HTTP surface of the controller.
//!
//! An axum [`Router`][axum::Router] over a
//! [`ControllerHandle`][facetrack_runtime::ControllerHandle]:
//!
//! | Route | Effect |
//! |---|---|
//! | `POST /drive/`, `POST /drive` | Parse a pose sequence and dispatch it; answers before any step runs. |
//! | `GET /face/{x}/{y}`, `GET /face?x=&y=` | Feed a raw face report through the smoother. |
//! | `GET /state` | Current flags and target. |
//!
//! Every request is logged with its status, method, path and query.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use facetrack_hal::RecordingActuator;
//! use facetrack_runtime::{Controller, RuntimeConfig};
//! use facetrack_cockpit::CockpitServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let controller =
//!         Controller::start(RuntimeConfig::default(), Arc::new(RecordingActuator::new()), None)
//!             .unwrap();
//!     CockpitServer::new(controller.handle())
//!         .with_port(3333)
//!         .run_until(async { let _ = tokio::signal::ctrl_c().await; })
//!         .await
//!         .unwrap();
//!     controller.shutdown().await;
//! }
//! ```

pub mod server;

pub use server::{CockpitServer, DEFAULT_PORT, router};
