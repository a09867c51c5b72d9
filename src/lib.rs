//! # Anifeed
//!
//! Polls AniList activity feeds for tracked users and announces new
//! activity to webhook channels, with per-channel status filters.
//!
//! ## Architecture
//!
//! ```text
//! ActivitySource → FeedState → Dispatcher → Notifier
//!                      ↑
//!              SubscriptionManager ↔ SubscriptionStore
//! ```
//!
//! The reconciliation core is [`feed::FeedState`]: per subscription it
//! tracks a bounded window of already-announced items, decides which
//! fetched items are genuinely new, and guarantees at-most-once delivery.
//! Everything around it is wiring: the [`dispatcher`] drives
//! fetch→reconcile→notify cycles on an interval, the [`manager`] keeps the
//! active set in step with the [`store`], and the [`source`]/[`notifier`]
//! collaborators talk to AniList and the webhook endpoints.

/// Application context and error handling.
///
/// [`AppContext`](app::AppContext) wires together store, source and
/// notifier so nothing reaches through globals.
pub mod app;

/// Configuration from `~/.config/anifeed/config.toml`: poll interval,
/// memory limit, batch pacing.
pub mod config;

/// Command-line interface using clap: `run`, `add`, `remove`, `list`,
/// `filter`.
pub mod cli;

/// Drives the retrieve→update→process cycle across all subscriptions with
/// batch pacing and graceful shutdown.
pub mod dispatcher;

/// Core domain models.
///
/// - [`Activity`](domain::Activity): one fetched activity unit
/// - [`Subscription`](domain::Subscription): a tracked (identity,
///   destination, kind) triple
/// - [`ChannelFilter`](domain::ChannelFilter): per-destination status
///   suppression
pub mod domain;

/// Per-subscription reconciliation windows ([`FeedState`](feed::FeedState)).
pub mod feed;

/// The authoritative set of active subscriptions, mirrored from the store.
pub mod manager;

/// Delivery collaborators.
///
/// - [`Notifier`](notifier::Notifier): renders and sends one activity
/// - [`WebhookNotifier`](notifier::WebhookNotifier): Discord-compatible
///   webhook implementation
pub mod notifier;

/// Fetch collaborators.
///
/// - [`ActivitySource`](source::ActivitySource): one page of activity per
///   request
/// - [`AniListSource`](source::AniListSource): AniList GraphQL
///   implementation
pub mod source;

/// Durable subscription records and channel filters.
///
/// - [`SubscriptionStore`](store::SubscriptionStore): trait defining the
///   storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
