use crate::commands::CommandResult;
use bookflow_core::config::{AppConfig, LoadOptions};
use bookflow_db::{connect_with_settings, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
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
                "migrate",
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
        let versions = migrations::applied_versions(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let tables = migrations::managed_tables(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>((versions, tables))
    });

    match result {
        Ok((versions, tables)) => {
            CommandResult::success("migrate", describe_schema(&versions, &tables))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}

fn describe_schema(versions: &[i64], tables: &[String]) -> String {
    let latest = match versions.last() {
        Some(version) => format!("{} applied, latest version {version}", versions.len()),
        None => "none recorded".to_string(),
    };
    format!(
        "scheduling database schema is current:\n  - migrations: {latest}\n  - tables: {}",
        tables.join(", "),
    )
}
