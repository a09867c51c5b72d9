use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::app::{AnifeedError, AppContext, Result};
use crate::dispatcher::Dispatcher;
use crate::domain::{ActivityKind, ChannelFilter, Subscription};
use crate::manager::{AddOutcome, SubscriptionManager};
use crate::store::SubscriptionStore;

/// Run the polling daemon until SIGTERM/SIGINT.
pub async fn run(ctx: Arc<AppContext>) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));

    #[cfg(unix)]
    {
        let running = running.clone();
        tokio::spawn(async move {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to set up SIGTERM handler");
            let mut sigint =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                    .expect("Failed to set up SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
            running.store(false, Ordering::SeqCst);
        });
    }

    #[cfg(windows)]
    {
        let running = running.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            running.store(false, Ordering::SeqCst);
        });
    }

    let manager = Arc::new(SubscriptionManager::new(
        ctx.store.clone(),
        ctx.config.memory_limit,
    ));
    let loaded = manager.load(&ctx).await?;
    println!(
        "Tracking {} subscription(s), polling every {}s",
        loaded, ctx.config.interval_secs
    );

    let dispatcher = Dispatcher::from_config(&ctx.config);
    dispatcher.run(ctx.clone(), manager, running).await;

    Ok(())
}

pub async fn add(ctx: &AppContext, identity: &str, destination: &str, kind: &str) -> Result<()> {
    let kind = parse_kind(kind)?;
    let manager = SubscriptionManager::new(ctx.store.clone(), ctx.config.memory_limit);
    manager.hydrate().await?;

    let subscription = Subscription::new(identity, destination, kind);
    match manager.add(ctx, subscription).await? {
        AddOutcome::Added => println!("Now tracking {} ({})", identity, kind),
        AddOutcome::AlreadyTracking => println!("Already tracking {} ({})", identity, kind),
        AddOutcome::UnknownIdentity => println!("No AniList user named {}", identity),
        AddOutcome::BadDestination => {
            println!("Destination did not accept the reachability check")
        }
    }

    Ok(())
}

pub async fn remove(ctx: &AppContext, identity: &str, destination: &str, kind: &str) -> Result<()> {
    let kind = parse_kind(kind)?;
    let manager = SubscriptionManager::new(ctx.store.clone(), ctx.config.memory_limit);
    manager.hydrate().await?;

    let subscription = Subscription::new(identity, destination, kind);
    if manager.remove(&subscription).await? {
        println!("Stopped tracking {} ({})", identity, kind);
    } else {
        println!("Was not tracking {} ({})", identity, kind);
    }

    Ok(())
}

pub fn list(ctx: &AppContext) -> Result<()> {
    let records = ctx.store.list()?;

    if records.is_empty() {
        println!("No subscriptions");
        return Ok(());
    }

    for record in records {
        println!(
            "{} ({}) -> {}",
            record.identity, record.kind, record.destination
        );
    }

    Ok(())
}

pub fn filter(ctx: &AppContext, destination: &str, hide: &[String], show: &[String]) -> Result<()> {
    let mut filter = ctx.store.get_filter(destination)?;

    for name in hide {
        set_category(&mut filter, name, true)?;
    }
    for name in show {
        set_category(&mut filter, name, false)?;
    }

    if !hide.is_empty() || !show.is_empty() {
        ctx.store.set_filter(destination, &filter)?;
    }

    println!("Filter for {}:", destination);
    print_flag("progress", filter.hide_in_progress);
    print_flag("planning", filter.hide_planning);
    print_flag("dropped", filter.hide_dropped);
    print_flag("paused", filter.hide_paused);
    println!("  completed: shown (never suppressible)");

    Ok(())
}

fn print_flag(name: &str, hidden: bool) {
    println!("  {}: {}", name, if hidden { "hidden" } else { "shown" });
}

fn set_category(filter: &mut ChannelFilter, name: &str, hidden: bool) -> Result<()> {
    match name.to_ascii_lowercase().as_str() {
        "progress" => filter.hide_in_progress = hidden,
        "planning" => filter.hide_planning = hidden,
        "dropped" => filter.hide_dropped = hidden,
        "paused" => filter.hide_paused = hidden,
        other => {
            return Err(AnifeedError::Other(format!(
                "unknown status category: {} (expected progress, planning, dropped or paused)",
                other
            )))
        }
    }
    Ok(())
}

fn parse_kind(kind: &str) -> Result<ActivityKind> {
    kind.parse::<ActivityKind>().map_err(AnifeedError::Other)
}
