//! Dashboard screen commands

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use futures::StreamExt;

use crate::api::ApiClient;
use crate::cli::output::{OutputFormat, format_count, print_event, print_success};
use crate::config::Config;
use crate::dashboard::{
    ApiDataSource, CacheDataSource, ContentState, DashboardMachine, DataSource, Navigator,
    ScreenState, SideEffect,
};
use crate::db::Database;
use crate::models::Product;
use crate::player::{self, PlaybackSession, PlaybackState};

/// How long the simulated viewer watches when `--exit-after` is not given
const DEFAULT_WATCH_MS: u64 = 3_000;

#[derive(Subcommand, Debug)]
pub enum DashboardCommands {
    /// Load the dashboard and print every state and side effect it publishes
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only use the local product cache
    #[arg(long)]
    offline: bool,

    /// Enter fullscreen playback this many milliseconds after start
    #[arg(long, value_name = "MS")]
    fullscreen_after: Option<u64>,

    /// Leave fullscreen after watching this many milliseconds
    #[arg(long, value_name = "MS")]
    exit_after: Option<u64>,

    /// Keep the screen open at least this long
    #[arg(long, value_name = "MS")]
    duration: Option<u64>,

    /// Select the first future product once loaded
    #[arg(long)]
    select_product: bool,

    /// Select the first investment once loaded
    #[arg(long)]
    select_investment: bool,
}

pub async fn run(command: DashboardCommands, format: OutputFormat, quiet: bool) -> Result<()> {
    match command {
        DashboardCommands::Run(args) => run_dashboard(args, format, quiet).await,
    }
}

async fn run_dashboard(args: RunArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let mut config = Config::load()?;
    let machine = DashboardMachine::new(build_sources(&config, args.offline)?, &config.dashboard);

    let mut states = machine.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            print_event(&state, format, format_state);
        }
    });

    let effects = machine.side_effects();
    let navigator = tokio::spawn(async move {
        let mut navigator = PrintingNavigator { format };
        effects.dispatch(&mut navigator).await;
    });

    let started = tokio::time::Instant::now();
    machine.start();

    if let Some(delay) = args.fullscreen_after {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let playable = machine
            .state()
            .as_content()
            .and_then(|c| c.broadcast.as_ref())
            .is_some_and(|b| b.has_playable_url());
        if !playable {
            tracing::info!("No playable broadcast loaded yet, fullscreen will fall back");
        }
        machine.on_fullscreen(config.session.last_position);

        let watch_ms = args.exit_after.unwrap_or(DEFAULT_WATCH_MS);
        if let Some(position) = watch_broadcast(&machine, &config, watch_ms).await {
            config.session.last_position = position;
            config.save()?;
        }
    }

    machine.settle().await;
    select_items(&machine, &args).await;

    if let Some(duration) = args.duration {
        tokio::time::sleep_until(started + Duration::from_millis(duration)).await;
        machine.settle().await;
    }

    // Closing the machine ends both streams
    drop(machine);
    printer.await?;
    navigator.await?;

    print_success("Dashboard closed", quiet);
    Ok(())
}

/// Cache first, backend second: on a conflict the later source wins, so
/// fresh network data replaces cached data.
fn build_sources(config: &Config, offline: bool) -> Result<Vec<Box<dyn DataSource>>> {
    let cache = match Database::open() {
        Ok(db) => Some(Arc::new(Mutex::new(db))),
        Err(e) => {
            tracing::warn!("Product cache unavailable: {:#}", e);
            None
        }
    };

    let mut sources: Vec<Box<dyn DataSource>> = Vec::new();
    if let Some(cache) = &cache {
        sources.push(Box::new(CacheDataSource::new(
            cache.clone(),
            config.dashboard.future_products_limit,
        )));
    }

    if offline {
        tracing::info!("Offline mode, backend skipped");
    } else {
        let mut api = ApiDataSource::new(ApiClient::new(&config.api)?);
        if let Some(cache) = cache {
            api = api.with_cache(cache);
        }
        sources.push(Box::new(api));
    }

    Ok(sources)
}

/// Play the fullscreen broadcast for `watch_ms`, then leave fullscreen.
/// Returns the position the viewer stopped at.
async fn watch_broadcast(machine: &DashboardMachine, config: &Config, watch_ms: u64) -> Option<i64> {
    let ScreenState::FullscreenPlayback {
        url,
        link_type,
        initial_position,
    } = machine.state()
    else {
        tracing::warn!("Fullscreen playback was not entered");
        return None;
    };

    let mut session = PlaybackSession::new(url, link_type, initial_position);
    session.on_state_changed(PlaybackState::Play);

    let interval = Duration::from_millis(config.player.position_poll_ms.max(1));
    let step = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
    let samples = player::position_stream(interval, || {
        session.advance(step);
        session.position
    })
    .take_until(tokio::time::sleep(Duration::from_millis(watch_ms)))
    .count()
    .await;

    tracing::debug!("Watched {} samples, stopped at {}ms", samples, session.position);
    machine.on_exit_fullscreen(session.position, session.is_playing());
    Some(session.position)
}

async fn select_items(machine: &DashboardMachine, args: &RunArgs) {
    let state = machine.state();
    let Some(content) = state.as_content() else {
        return;
    };

    if args.select_product {
        match content.future_products.as_ref().and_then(|p| p.first()) {
            Some(product) => machine.on_product_selected(product.clone()).await,
            None => tracing::warn!("No future product to select"),
        }
    }

    if args.select_investment {
        match content.investments.as_ref().and_then(|i| i.first()) {
            Some(investment) => machine.on_investment_selected(investment).await,
            None => tracing::warn!("No investment to select"),
        }
    }
}

/// Prints navigation requests instead of navigating
struct PrintingNavigator {
    format: OutputFormat,
}

impl Navigator for PrintingNavigator {
    fn navigate_to_product(&mut self, product: &Product) {
        let effect = SideEffect::NavigateToProduct(product.clone());
        print_event(&effect, self.format, format_effect);
    }

    fn show_coming_soon(&mut self) {
        print_event(
            &SideEffect::NavigateToInvestmentsComingSoon,
            self.format,
            format_effect,
        );
    }
}

fn format_effect(effect: &SideEffect) -> String {
    match effect {
        SideEffect::NavigateToProduct(product) => {
            format!("effect     open product #{} ({})", product.id, product.company)
        }
        SideEffect::NavigateToInvestmentsComingSoon => {
            "effect     investments: coming soon".to_string()
        }
    }
}

fn format_state(state: &ScreenState) -> String {
    match state {
        ScreenState::Loading(next) => format!("loading    {:?}", next),
        ScreenState::Content(content) => format!("content    {}", summarize(content)),
        ScreenState::FullscreenPlayback {
            url,
            link_type,
            initial_position,
        } => format!("fullscreen {} ({:?}) from {}ms", url, link_type, initial_position),
    }
}

fn summarize(content: &ContentState) -> String {
    format!(
        "broadcast={} investments={} future_products={} news={} autoplay={} position={}ms",
        content.broadcast.as_ref().map_or("-", |b| b.title.as_str()),
        format_count(content.investments.as_ref().map(Vec::len)),
        format_count(content.future_products.as_ref().map(Vec::len)),
        format_count(content.news.as_ref().map(Vec::len)),
        content.autoplay,
        content.initial_position,
    )
}
