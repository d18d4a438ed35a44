use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use screening_core::constants::{DEFAULT_LOG_FILTER, RULESET_ENV_VAR};
use screening_core::models::{
    ExtraNeeds, Participant, ParticipantId, Provider, ProviderId, User, UserId,
};
use screening_core::{
    resolve_ruleset, ActionParams, AppointmentAction, AppointmentWorkflow, CoreConfig,
    CoreContext, IdMinter, InMemoryStore, RandomIdMinter, SystemClock,
};
use screening_types::NonEmptyText;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "screening")]
#[command(about = "Breast screening appointment workflow tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List permissions grouped by app label
    Permissions {
        /// YAML ruleset file (defaults to SCREENING_RULESET, then the built-in ruleset)
        #[arg(long)]
        ruleset: Option<PathBuf>,
    },
    /// Evaluate a permission for a user holding the given groups
    CheckPerm {
        /// Permission name, e.g. participants.perform_mammogram_appointment
        permission: String,
        /// Group held by the user (repeatable)
        #[arg(long = "group")]
        groups: Vec<String>,
        /// Evaluate for an inactive user
        #[arg(long)]
        inactive: bool,
        #[arg(long)]
        ruleset: Option<PathBuf>,
    },
    /// Apply a scripted sequence of actions to one appointment in memory
    Replay {
        /// JSON script of users and steps
        script: PathBuf,
        #[arg(long)]
        ruleset: Option<PathBuf>,
    },
}

/// A replay script.
///
/// ```json
/// {
///   "users": { "alice": ["Clinical"], "bob": ["Clinical"] },
///   "steps": [
///     { "user": "alice", "action": "check_in" },
///     { "user": "alice", "action": "take_images", "params": { "images": "standard_set" } }
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Script {
    users: BTreeMap<String, Vec<String>>,
    steps: Vec<ScriptStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptStep {
    user: String,
    action: AppointmentAction,
    #[serde(default)]
    params: ActionParams,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(DEFAULT_LOG_FILTER.parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let env_ruleset = std::env::var_os(RULESET_ENV_VAR).map(PathBuf::from);
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Permissions { ruleset }) => {
            let config = load_config(ruleset.or(env_ruleset))?;
            for (app, perms) in config.ruleset().permissions() {
                println!("{app}");
                for perm in perms {
                    println!("  {}", perm.name());
                }
            }
        }
        Some(Commands::CheckPerm {
            permission,
            groups,
            inactive,
            ruleset,
        }) => {
            let config = load_config(ruleset.or(env_ruleset))?;
            let mut user = User::new(
                UserId::from_uuid(RandomIdMinter.new_id()),
                NonEmptyText::new("Command line user")?,
                None,
            )
            .with_groups(groups);
            if inactive {
                user = user.deactivated();
            }

            let allowed = config.ruleset().has_perm(&user, &permission, None);
            if !config.ruleset().contains(&permission) {
                tracing::warn!(permission = %permission, "permission is not defined by the ruleset");
            }
            println!("{permission}: {}", if allowed { "allowed" } else { "denied" });
        }
        Some(Commands::Replay { script, ruleset }) => {
            let text = std::fs::read_to_string(&script)
                .with_context(|| format!("reading {}", script.display()))?;
            let script: Script = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", script.display()))?;
            let config = load_config(ruleset.or(env_ruleset))?;
            replay(config, script)?;
        }
        None => {
            println!("Use 'screening --help' for commands");
        }
    }

    Ok(())
}

fn load_config(ruleset: Option<PathBuf>) -> anyhow::Result<CoreConfig> {
    Ok(CoreConfig::new(resolve_ruleset(ruleset)?)?)
}

fn replay(config: CoreConfig, script: Script) -> anyhow::Result<()> {
    let ids: Arc<dyn IdMinter> = Arc::new(RandomIdMinter);
    let store = Arc::new(InMemoryStore::new());

    let provider = Provider {
        id: ProviderId::from_uuid(ids.new_id()),
        name: NonEmptyText::new("Replay provider")?,
    };
    let participant = Participant {
        id: ParticipantId::from_uuid(ids.new_id()),
        first_name: NonEmptyText::new("Replay")?,
        last_name: NonEmptyText::new("Participant")?,
        date_of_birth: NaiveDate::from_ymd_opt(1970, 1, 1).context("invalid date of birth")?,
        ethnic_background_id: None,
        extra_needs: ExtraNeeds::new(),
    };
    let appointment = store.seed_appointment(&*ids, &provider, participant, Utc::now())?;

    let users = script
        .users
        .iter()
        .map(|(name, groups)| {
            let user = User::new(
                UserId::from_uuid(ids.new_id()),
                NonEmptyText::new(name)?,
                Some(provider.id),
            )
            .with_groups(groups.iter().cloned());
            Ok::<_, anyhow::Error>((name.clone(), user))
        })
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

    let ctx = CoreContext::new(
        Arc::new(config),
        Arc::clone(&store),
        Arc::new(SystemClock::new()),
        ids,
    );
    let workflow = AppointmentWorkflow::new(ctx);

    for (n, step) in script.steps.into_iter().enumerate() {
        let user = users
            .get(&step.user)
            .with_context(|| format!("step {} names unknown user {}", n + 1, step.user))?;

        match workflow.apply(appointment, step.action, user, step.params) {
            Ok(applied) => {
                let marker = if applied.changed { "" } else { " (no change)" };
                println!(
                    "{:>3} {:<8} {:<28} -> {}{marker}",
                    n + 1,
                    step.user,
                    step.action.as_str(),
                    applied.status.name()
                );
                for signal in &applied.signals {
                    println!("    signal: {signal:?}");
                }
            }
            Err(err) => println!("{:>3} {:<8} {:<28} !! {err}", n + 1, step.user, step.action.as_str()),
        }
    }

    println!();
    println!("history:");
    for row in workflow.history(appointment)?.iter().rev() {
        let by = users
            .iter()
            .find(|(_, user)| user.id == row.created_by)
            .map_or("?", |(name, _)| name.as_str());
        println!("  {} {:<30} {by}", row.created_at.format("%H:%M:%S%.3f"), row.name.to_string());
    }

    println!("steps:");
    for state in workflow.steps(appointment)? {
        let mark = match (state.completed, state.current, state.disabled) {
            (true, _, _) => "done",
            (false, true, _) => "current",
            (false, false, true) => "locked",
            (false, false, false) => "open",
        };
        println!("  {:<28} {mark}", state.step.to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_parses_actions_and_params() {
        let script: Script = serde_json::from_str(
            r#"{
                "users": { "alice": ["Clinical"] },
                "steps": [
                    { "user": "alice", "action": "check_in" },
                    { "user": "alice", "action": "take_images", "params": { "images": "standard_set" } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(script.users["alice"], vec!["Clinical".to_owned()]);
        assert_eq!(script.steps[0].action, AppointmentAction::CheckIn);
        assert_eq!(script.steps[0].params, ActionParams::None);
        assert!(matches!(script.steps[1].params, ActionParams::Images(_)));
    }

    #[test]
    fn script_rejects_unknown_actions() {
        let result = serde_json::from_str::<Script>(
            r#"{ "users": {}, "steps": [ { "user": "a", "action": "teleport" } ] }"#,
        );
        assert!(result.is_err());
    }
}
