//! pressbee — wireless button to MQTT pulse forwarder
//!
//! This crate bridges press events from low-power wireless buttons to an
//! MQTT broker. Each configured button maps its hardware address to a topic;
//! an observed press publishes a retained `active`, and a fixed delay after
//! the last observed signal the topic auto-reverts to `inactive`. A burst of
//! protocol retransmissions therefore becomes a single clean pulse.
//!
//! ## Modules
//!
//! * `config` — TOML configuration: logging, button mapping, probe listener
//!   and broker transport sections, validated via the `validator` crate,
//!   materialized from a packaged sample on first run.
//!
//! * `core` — runtime components:
//!   - `debounce`: the press debouncing and notification state machine
//!   - `readiness`: broker readiness gate derived from transport state
//!
//! * `detect` — the detection boundary: `DetectionSource` trait and the UDP
//!   probe listener observing button wake broadcasts.
//!
//! * `logger` — centralized `tracing` initialization (console and optional
//!   systemd journald output).
//!
//! The MQTT transport itself lives in the `pressbee-mqtt` workspace crate.

pub mod config;
pub mod core;
pub mod detect;
pub mod logger;
