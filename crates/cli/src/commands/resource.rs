use chrono::{NaiveDate, Weekday};
use clap::{Args, Subcommand, ValueEnum};

use crate::commands::CommandResult;
use bookflow_core::config::{AppConfig, LoadOptions};
use bookflow_core::{AvailabilityConfig, NewResource, ResourceId, ResourceType};
use bookflow_db::repositories::{ResourceRepository, SqlResourceRepository};
use bookflow_db::{connect_with_settings, migrations};

#[derive(Debug, Subcommand)]
pub enum ResourceAction {
    #[command(about = "Create a schedulable resource")]
    Create(CreateArgs),
    #[command(about = "Replace a resource's working-hours configuration")]
    SetAvailability(SetAvailabilityArgs),
    #[command(about = "Add a blackout date to a resource")]
    AddBlackout(AddBlackoutArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ResourceKind {
    Team,
    Equipment,
    Room,
}

impl From<ResourceKind> for ResourceType {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Team => ResourceType::Team,
            ResourceKind::Equipment => ResourceType::Equipment,
            ResourceKind::Room => ResourceType::Room,
        }
    }
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[arg(long, help = "Organization the resource belongs to")]
    pub org: String,
    #[arg(long)]
    pub name: String,
    #[arg(long, value_enum, default_value = "team")]
    pub kind: ResourceKind,
    #[arg(long, default_value_t = 1, help = "Maximum concurrent bookings")]
    pub capacity: i64,
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Debug, Args)]
pub struct SetAvailabilityArgs {
    #[arg(long)]
    pub org: String,
    #[arg(long)]
    pub id: i64,
    #[arg(long, default_value_t = 9)]
    pub start_hour: u32,
    #[arg(long, default_value_t = 17)]
    pub end_hour: u32,
    #[arg(
        long,
        value_delimiter = ',',
        value_parser = parse_weekday,
        default_value = "mon,tue,wed,thu,fri",
        help = "Working days, e.g. mon,tue,wed"
    )]
    pub days: Vec<Weekday>,
}

fn parse_weekday(raw: &str) -> Result<Weekday, String> {
    raw.parse::<Weekday>().map_err(|_| format!("unknown weekday `{raw}`"))
}

#[derive(Debug, Args)]
pub struct AddBlackoutArgs {
    #[arg(long)]
    pub org: String,
    #[arg(long)]
    pub id: i64,
    #[arg(long, help = "Blackout date, e.g. 2026-12-25")]
    pub date: NaiveDate,
}

pub fn run(action: ResourceAction) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "resource",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "resource",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let repo = SqlResourceRepository::new(pool.clone());
        let outcome = apply(&repo, action).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(message) => CommandResult::success("resource", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("resource", error_class, message, exit_code)
        }
    }
}

async fn apply(
    repo: &SqlResourceRepository,
    action: ResourceAction,
) -> Result<String, (&'static str, String, u8)> {
    match action {
        ResourceAction::Create(args) => {
            let new = NewResource {
                org_id: args.org,
                name: args.name,
                resource_type: args.kind.into(),
                description: args.description,
                max_concurrent_bookings: args.capacity,
                availability: AvailabilityConfig::default(),
                linked_team: None,
                external_resource_id: None,
                service_type: "bookflow".to_string(),
            };
            new.validate().map_err(|error| ("validation", error.to_string(), 6u8))?;
            let resource =
                repo.create(new).await.map_err(|error| ("persistence", error.to_string(), 7u8))?;
            Ok(format!("created resource `{}` with id {}", resource.name, resource.id.0))
        }
        ResourceAction::SetAvailability(args) => {
            let availability = AvailabilityConfig {
                start_hour: args.start_hour,
                end_hour: args.end_hour,
                working_days: args.days,
                blackout_dates: Vec::new(),
            };
            availability.validate().map_err(|error| ("validation", error.to_string(), 6u8))?;

            let mut resource = load(repo, &args.org, args.id).await?;
            // Preserve blackout dates already on the resource.
            let blackouts = std::mem::take(&mut resource.availability.blackout_dates);
            resource.availability = AvailabilityConfig { blackout_dates: blackouts, ..availability };
            repo.save(resource.clone())
                .await
                .map_err(|error| ("persistence", error.to_string(), 7u8))?;
            Ok(format!(
                "resource {} now works {}:00-{}:00 on {} day(s)",
                resource.id.0,
                resource.availability.start_hour,
                resource.availability.end_hour,
                resource.availability.working_days.len()
            ))
        }
        ResourceAction::AddBlackout(args) => {
            let mut resource = load(repo, &args.org, args.id).await?;
            if resource.availability.blackout_dates.contains(&args.date) {
                return Ok(format!("resource {} already blacks out {}", args.id, args.date));
            }
            resource.availability.blackout_dates.push(args.date);
            resource.availability.blackout_dates.sort();
            repo.save(resource)
                .await
                .map_err(|error| ("persistence", error.to_string(), 7u8))?;
            Ok(format!("resource {} blacked out on {}", args.id, args.date))
        }
    }
}

async fn load(
    repo: &SqlResourceRepository,
    org: &str,
    id: i64,
) -> Result<bookflow_core::SchedulableResource, (&'static str, String, u8)> {
    repo.find_by_id(org, ResourceId(id))
        .await
        .map_err(|error| ("persistence", error.to_string(), 7u8))?
        .ok_or_else(|| ("not_found", format!("resource `{id}` not found in org `{org}`"), 8u8))
}
