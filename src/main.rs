use betpool::api::filters::GameFilters;
use betpool::api::types::GameStatus;
use betpool::api::ApiClient;
use betpool::cache::QueryCache;
use betpool::config::Config;
use betpool::db::flags::OnboardingFlag;
use betpool::db::Database;
use betpool::queries::QueryClient;
use betpool::query::{Query, QueryState};
use betpool::services::market::MarketFilters;
use betpool::services::pools::{LeaderboardFilters, PoolFilters};
use betpool::session::SessionHandle;
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// How often a pending query is polled
const TICK: Duration = Duration::from_millis(25);

#[derive(Parser, Debug)]
#[command(name = "betpool")]
#[command(about = "Browse games, odds, pools and leaderboards of a betting pool")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/betpool/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Signed-in user id (overrides session.user_id from the config)
  #[arg(short, long)]
  user: Option<String>,

  /// Keep observing the query, re-checking every N seconds
  #[arg(short, long, value_name = "SECS")]
  watch: Option<u64>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List games
  Games(GameArgs),
  /// Show one game
  Game { id: String },
  /// Show the active odds for a game
  Odds { game_id: String },
  /// Games with odds for a league
  Market(MarketArgs),
  /// List leagues
  Leagues,
  /// List pools
  Pools {
    #[arg(long)]
    league: Option<String>,
    /// Only active pools
    #[arg(long)]
    active: bool,
  },
  /// Leaderboard of one pool, or across all active pools
  Leaderboard {
    #[arg(long)]
    pool: Option<String>,
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    limit: Option<u32>,
  },
  /// Your membership in a pool
  Membership { pool_id: String },
  /// Your recent bets
  Bets,
  /// Print the query string a games filter encodes to
  Encode(GameArgs),
  /// Read or change the onboarding flag
  Onboarding {
    #[command(subcommand)]
    action: OnboardingAction,
  },
}

#[derive(ClapArgs, Debug)]
struct GameArgs {
  #[arg(long)]
  league: Option<String>,
  /// scheduled, in_progress, final, postponed or cancelled
  #[arg(long)]
  status: Option<GameStatus>,
  /// Earliest kickoff (RFC 3339)
  #[arg(long)]
  after: Option<DateTime<Utc>>,
  /// Latest kickoff (RFC 3339)
  #[arg(long)]
  before: Option<DateTime<Utc>>,
  #[arg(long)]
  page: Option<u32>,
  #[arg(long)]
  limit: Option<u32>,
}

impl From<GameArgs> for GameFilters {
  fn from(args: GameArgs) -> Self {
    GameFilters {
      league: args.league,
      status: args.status,
      start_time_after: args.after,
      start_time_before: args.before,
      page: args.page,
      limit: args.limit,
    }
  }
}

#[derive(ClapArgs, Debug)]
struct MarketArgs {
  #[arg(long)]
  league: Option<String>,
  #[arg(long)]
  status: Option<GameStatus>,
  /// Only games with odds
  #[arg(long)]
  odds_available: bool,
  #[arg(long)]
  limit: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum OnboardingAction {
  Get,
  Set {
    #[arg(action = clap::ArgAction::Set, default_value_t = true)]
    completed: bool,
  },
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging()?;

  let config = Config::load(args.config.as_deref())?;
  let watch = args.watch.map(Duration::from_secs);

  let queries = {
    let api = ApiClient::new(&config)?;
    info!(base_url = api.base_url(), "Starting betpool");
    let session = SessionHandle::ready(args.user.or(config.session.user_id.clone()));
    QueryClient::new(api, QueryCache::new(config.cache.retries), Arc::new(session))
  };

  match args.command {
    Command::Games(game_args) => run(queries.games(game_args.into()), watch).await,
    Command::Game { id } => run(queries.game(Some(id)), watch).await,
    Command::Odds { game_id } => run(queries.active_odds(Some(game_id)), watch).await,
    Command::Market(market_args) => {
      let filters = MarketFilters {
        league_id: market_args.league,
        status: market_args.status,
        odds_available: market_args.odds_available.then_some(true),
        limit: market_args.limit,
      };
      run(queries.market_games(filters), watch).await
    }
    Command::Leagues => run(queries.leagues(), watch).await,
    Command::Pools { league, active } => {
      let filters = PoolFilters {
        league,
        active: active.then_some(true),
        ..Default::default()
      };
      run(queries.pools(filters), watch).await
    }
    Command::Leaderboard { pool, page, limit } => {
      let filters = LeaderboardFilters {
        pool_id: pool,
        page,
        limit,
      };
      run(queries.leaderboard(filters), watch).await
    }
    Command::Membership { pool_id } => run(queries.pool_membership(Some(pool_id)), watch).await,
    Command::Bets => run(queries.user_bets(), watch).await,
    Command::Encode(game_args) => {
      println!("{}", GameFilters::from(game_args).encode());
      Ok(())
    }
    Command::Onboarding { action } => onboarding(action),
  }
}

/// Log to a daily file so stdout only carries command output.
fn init_logging() -> Result<WorkerGuard> {
  let log_dir = Config::data_dir()?.join("logs");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&log_dir, "betpool.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_env("BETPOOL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

/// Drive a query to completion and print its data as JSON.
///
/// With `watch`, keep observing: the query refetches once its data goes
/// stale and every new result is printed.
async fn run<T>(mut query: Query<T>, watch: Option<Duration>) -> Result<()>
where
  T: Serialize + Clone + Send + Sync + 'static,
{
  query.fetch();
  if query.is_idle() {
    return Err(eyre!(
      "Nothing to fetch: a required input is missing (pass --user or set session.user_id)"
    ));
  }

  loop {
    match query.wait(TICK).await {
      QueryState::Success(data) => {
        let json = serde_json::to_string_pretty(data)
          .map_err(|e| eyre!("Failed to serialize output: {}", e))?;
        println!("{}", json);
      }
      QueryState::Error(e) if watch.is_none() => return Err(eyre!("{}", e)),
      QueryState::Error(e) => error!(error = %e, "Query failed"),
      QueryState::Idle | QueryState::Loading => {}
    }

    let Some(interval) = watch else {
      return Ok(());
    };

    // Re-observe until the query decides its data is stale
    loop {
      tokio::time::sleep(interval).await;
      query.fetch();
      if query.is_loading() {
        break;
      }
    }
  }
}

fn onboarding(action: OnboardingAction) -> Result<()> {
  let flag = OnboardingFlag::new(Database::open()?);

  match action {
    OnboardingAction::Get => println!("{}", flag.get()?),
    OnboardingAction::Set { completed } => flag.set(completed)?,
    OnboardingAction::Clear => flag.clear()?,
  }

  Ok(())
}
