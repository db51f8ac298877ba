use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use classboard::schedule::datetime::{self, DecomposedTime};
use classboard::schedule::{
    ApiClient, BoardConfig, CanonicalSchedule, Period, RoomStatus, ScheduleBoard, ScheduleError,
    ScheduleForm, ScheduleId,
};

/// Schedule board for the academic administration API.
#[derive(Debug, Parser)]
#[command(name = "classboard", version)]
struct Cli {
    /// JSON config file
    #[arg(long, env = "CLASSBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured API root
    #[arg(long, env = "CLASSBOARD_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "CLASSBOARD_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "CLASSBOARD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Existing access token; skips the login call
    #[arg(long, env = "CLASSBOARD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lists the schedules visible to the signed-in user
    List {
        /// Case-insensitive filter on class, room, and teacher
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Prints the half-hour time slots accepted by forms
    Slots,
    /// Creates a schedule
    Create(FormArgs),
    /// Updates a schedule; unspecified fields keep their current values
    Update {
        id: String,
        #[command(flatten)]
        form: FormArgs,
    },
    /// Deletes a schedule
    Delete { id: String },
    /// Shows the latest cleanliness report for a schedule's room
    Cleanliness { id: String },
}

#[derive(Debug, Args)]
struct FormArgs {
    #[arg(long)]
    class_id: Option<i64>,
    /// Date for both start and end, YYYY-MM-DD
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Start slot, e.g. "09:30 AM". Omitted on update, the current time is kept
    #[arg(long, value_parser = parse_slot)]
    start: Option<(String, Period)>,
    /// End slot, e.g. "11:00 AM"
    #[arg(long, value_parser = parse_slot)]
    end: Option<(String, Period)>,
    #[arg(long)]
    room: Option<String>,
    /// Occupied, Clean, or "Needs Cleaning"
    #[arg(long, value_parser = parse_status)]
    status: Option<RoomStatus>,
}

impl FormArgs {
    fn apply(&self, mut form: ScheduleForm) -> ScheduleForm {
        if let Some(class_id) = self.class_id {
            form.class_id = class_id;
        }
        form.start = merge_time(form.start, self.date, self.start.as_ref());
        form.end = merge_time(form.end, self.date, self.end.as_ref());
        if let Some(room) = &self.room {
            form.room_number = room.clone();
        }
        if let Some(status) = self.status {
            form.status = status;
        }
        form
    }
}

fn merge_time(
    existing: Option<DecomposedTime>,
    date: Option<NaiveDate>,
    slot: Option<&(String, Period)>,
) -> Option<DecomposedTime> {
    let date = date.or(existing.as_ref().map(|e| e.date))?;
    match (slot, existing) {
        (Some((time, period)), _) => Some(DecomposedTime {
            date,
            time: time.clone(),
            period: *period,
        }),
        (None, Some(existing)) => Some(DecomposedTime { date, ..existing }),
        (None, None) => None,
    }
}

fn parse_slot(raw: &str) -> Result<(String, Period), String> {
    let (time, period) = raw
        .trim()
        .rsplit_once(' ')
        .ok_or_else(|| format!("expected \"HH:MM AM|PM\", got {raw:?}"))?;
    let period: Period = period.parse().map_err(|e| format!("{e}"))?;
    let time = time.trim();
    if !datetime::is_slot(time, period) {
        return Err(format!("{raw:?} is not a half-hour slot; see `classboard slots`"));
    }
    Ok((time.to_string(), period))
}

fn parse_status(raw: &str) -> Result<RoomStatus, String> {
    RoomStatus::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = RoomStatus::ALL.iter().map(RoomStatus::as_str).collect();
        format!("unknown status {raw:?} (expected one of: {})", known.join(", "))
    })
}

fn print_schedules(schedules: &[CanonicalSchedule]) {
    for s in schedules {
        println!(
            "{:<10} {:<24} {:<8} {:<20} {:<10} {} - {}  [{}]",
            s.id.to_string(),
            s.class_name,
            s.class_code,
            s.teacher_name,
            s.room_number,
            s.start_time,
            s.end_time,
            s.status
        );
    }
}

async fn connect(cli: &Cli, config: &BoardConfig) -> Result<ApiClient> {
    let client = ApiClient::new(config)?;
    if let Some(token) = &cli.token {
        return Ok(client.with_token(token.clone()));
    }
    let (Some(username), Some(password)) = (&cli.username, &cli.password) else {
        bail!("either --token or both --username and --password are required");
    };
    let token = client.login(username, password).await?;
    Ok(client.with_token(token))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ScheduleError>() {
                Some(schedule_err) => eprintln!("{}", schedule_err.user_message()),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::Slots = cli.command {
        for slot in datetime::time_slots() {
            println!("{slot}");
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => BoardConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BoardConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    info!(base_url = %config.base_url, "Starting classboard");

    let api = connect(&cli, &config).await?;
    let board = ScheduleBoard::sign_in(Arc::new(api), config).await?;
    let view = board.load().await;
    if let Some(banner) = &view.banner {
        eprintln!("{banner}");
    }

    match &cli.command {
        Command::List { search, json } => {
            let schedules = match search {
                Some(query) => board.search(query).await,
                None => view.schedules.clone(),
            };
            if *json {
                println!("{}", serde_json::to_string_pretty(&schedules)?);
            } else if schedules.is_empty() && view.banner.is_none() {
                println!("No schedules found.");
            } else {
                print_schedules(&schedules);
            }
        }
        Command::Create(args) => {
            let view = board.create(&args.apply(ScheduleForm::default())).await?;
            println!("Schedule created. {} schedules now visible.", view.schedules.len());
        }
        Command::Update { id, form } => {
            let id = ScheduleId::Server(id.clone());
            let existing = board
                .find(&id)
                .await
                .ok_or_else(|| anyhow!("schedule {id} is not visible to this account"))?;
            let updated = form.apply(ScheduleForm::from_schedule(&existing));
            board.update(&id, &updated).await?;
            println!("Schedule {id} updated.");
        }
        Command::Delete { id } => {
            let id = ScheduleId::Server(id.clone());
            board.delete(&id).await?;
            println!("Schedule {id} deleted.");
        }
        Command::Cleanliness { id } => {
            let report = board.cleanliness(&ScheduleId::Server(id.clone())).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Slots => unreachable!("handled before sign-in"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slot_accepts_picker_times_only() {
        assert_eq!(
            parse_slot("09:30 pm").unwrap(),
            ("09:30".to_string(), Period::Pm)
        );
        assert!(parse_slot("09:15 AM").is_err());
        assert!(parse_slot("9:30 AM").is_err());
        assert!(parse_slot("09:30").is_err());
    }

    #[test]
    fn test_merge_time_keeps_existing_fields() {
        let existing = DecomposedTime {
            date: NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
            time: "09:15".to_string(),
            period: Period::Am,
        };
        let moved = NaiveDate::from_ymd_opt(2024, 9, 9).unwrap();

        let kept = merge_time(Some(existing.clone()), None, None).unwrap();
        assert_eq!(kept, existing);

        let redated = merge_time(Some(existing.clone()), Some(moved), None).unwrap();
        assert_eq!(redated.date, moved);
        assert_eq!(redated.time, "09:15");

        let picked = ("01:00".to_string(), Period::Pm);
        let retimed = merge_time(Some(existing), None, Some(&picked)).unwrap();
        assert_eq!(retimed.time, "01:00");
        assert_eq!(retimed.period, Period::Pm);

        assert!(merge_time(None, None, Some(&picked)).is_none());
    }
}
