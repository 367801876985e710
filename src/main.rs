//! # WorkClaw Scheduler — Recurring Task Service
//!
//! Background worker for the WorkClaw workflow portal. Respawns recurring
//! tasks on their weekly or every-N-days schedules, carries accepted
//! assignees over to each new occurrence, and retires dead salary share
//! links.
//!
//! Usage:
//!   workclaw-scheduler                     # Run the scheduler loop
//!   workclaw-scheduler --once              # Run every sweep once, then exit
//!   workclaw-scheduler --seed-demo         # Insert demo data and exit

use anyhow::Result;
use chrono::NaiveTime;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use workclaw_core::WorkClawConfig;
use workclaw_core::time;
use workclaw_scheduler::SchedulerService;
use workclaw_store::{WorkflowDb, db, models::Task};

#[derive(Parser)]
#[command(
    name = "workclaw-scheduler",
    version,
    about = "⏰ WorkClaw Scheduler — recurring tasks & share-link cleanup"
)]
struct Cli {
    /// Database path (overrides config)
    #[arg(long)]
    db_path: Option<String>,

    /// Config file (default ~/.workclaw/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Node name for the writer lease (default: hostname)
    #[arg(long)]
    node: Option<String>,

    /// Seconds between scheduler ticks (overrides config)
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Run every sweep once, then exit
    #[arg(long)]
    once: bool,

    /// Insert demo tasks and salary data, then exit
    #[arg(long)]
    seed_demo: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "workclaw=debug,workclaw_core=debug,workclaw_store=debug,workclaw_scheduler=debug"
    } else {
        "workclaw=info,workclaw_core=info,workclaw_store=info,workclaw_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    // Load config, then let CLI flags win
    let mut config = match &cli.config {
        Some(path) => WorkClawConfig::load_from(std::path::Path::new(&expand_path(path)))?,
        None => WorkClawConfig::load()?,
    };
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }
    if let Some(node) = cli.node {
        config.scheduler.node = Some(node);
    }
    if let Some(tick_secs) = cli.tick_secs {
        config.scheduler.tick_secs = tick_secs;
    }
    if config.scheduler.tick_secs == 0 {
        // A zero interval is not a schedule.
        tracing::warn!("⚠️ tick_secs 0 requested, using 60");
        config.scheduler.tick_secs = 60;
    }

    // Open database
    let db_path = expand_path(&config.db_path);
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = WorkflowDb::open(std::path::Path::new(&db_path))?;

    // One lease holder name per process, so two copies on the same host
    // still contend for the lease instead of both sweeping.
    let node = config
        .scheduler
        .node
        .clone()
        .or_else(|| hostname::get().ok().and_then(|h| h.into_string().ok()))
        .unwrap_or_else(|| "workclaw".to_string());
    let holder = format!("{node}-{}", uuid::Uuid::new_v4());

    // --seed-demo: insert demo data and exit
    if cli.seed_demo {
        println!("⏰ WorkClaw Scheduler — Demo Seed\n");
        seed_demo(&store)?;
        return Ok(());
    }

    // --once: run every sweep immediately and exit
    if cli.once {
        let mut service = SchedulerService::new(store, &config.scheduler, holder);
        let (cleaned, swept) = service.run_all_once()?;
        println!(
            "🧹 cleanup-links: {} expired, {} out of views",
            cleaned.expired, cleaned.exhausted
        );
        println!(
            "🔁 generate-recurring: {} spawned, {} not due, {} failed",
            swept.spawned, swept.skipped, swept.failed
        );
        return Ok(());
    }

    println!("⏰ WorkClaw Scheduler v{}", env!("CARGO_PKG_VERSION"));
    println!("   🗄️  Database:  {db_path}");
    println!("   🔑 Node:      {holder}");
    println!(
        "   📅 Sweeps:    every {} min, {:02}:00–{:02}:59 wall clock",
        config.scheduler.sweep_every_mins,
        config.scheduler.window_start_hour,
        config.scheduler.window_end_hour
    );
    println!();

    SchedulerService::new(store, &config.scheduler, holder).run().await;
    Ok(())
}

/// A small believable data set for poking at the scheduler by hand.
fn seed_demo(store: &WorkflowDb) -> Result<()> {
    let now = time::utc_now();
    let nine = NaiveTime::from_hms_opt(9, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("bad demo fire time"))?;

    let standup = db::insert_task(
        store.conn(),
        &Task::recurring_weekly(
            "Họp giao ban buổi sáng",
            "Điểm danh đầu ngày tại phòng họp lớn",
            1,
            vec![0, 1, 2, 3, 4],
            nine,
            1,
            now,
        ),
    )?;
    db::assign_user(store.conn(), standup, 2, 1, Some("Vận hành"), now)?;
    db::assign_user(store.conn(), standup, 3, 1, Some("Vận hành"), now)?;
    db::accept_assignment(store.conn(), standup, 2, now)?;
    db::accept_assignment(store.conn(), standup, 3, now)?;
    println!("✅ Weekly task {standup}: Mon–Fri 09:00, 2 accepted assignees");

    let stocktake = db::insert_task(
        store.conn(),
        &Task::recurring_interval(
            "Kiểm kê kho định kỳ",
            "Đối chiếu tồn kho thực tế với sổ sách",
            1,
            7,
            now,
        )
        .with_due(now + chrono::Duration::days(2)),
    )?;
    db::assign_user(store.conn(), stocktake, 4, 1, Some("Kho vận"), now)?;
    db::accept_assignment(store.conn(), stocktake, 4, now)?;
    println!("✅ Interval task {stocktake}: every 7 days, due +2 days");

    let month = now.format("%Y-%m").to_string();
    let mut salary = workclaw_store::models::Salary::new(
        "Nguyễn Văn A",
        &month,
        26.0,
        24.0,
        13_000_000.0,
        2_600_000.0,
        1,
        now,
    );
    salary.capacity_bonuses.push(workclaw_store::models::SalaryItem {
        name: "Thưởng năng suất".to_string(),
        amount: 1_500_000.0,
    });
    salary.deductions.push(workclaw_store::models::SalaryItem {
        name: "Bảo hiểm xã hội".to_string(),
        amount: 1_365_000.0,
    });
    let salary_id = db::insert_salary(store.conn(), &mut salary)?;
    let link = db::create_share_link(
        store.conn(),
        salary_id,
        1,
        now + chrono::Duration::days(7),
        Some(3),
        now,
    )?;
    println!("✅ Salary {salary_id} for Nguyễn Văn A, share token {} (3 views, 7 days)", link.token);

    Ok(())
}
