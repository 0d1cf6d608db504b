mod api;
mod chart;
mod config;
mod credentials;
mod domain;
mod stats;
mod validation;

use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::api::{ApiClient, ApiError};
use crate::chart::{ChartStyle, EMPTY_STATE};
use crate::config::{API_URL_ENV, Config, resolve_config_path};
use crate::credentials::{
	StoredCredentials, clear_credentials, credentials_path, load_credentials, save_credentials,
};
use crate::domain::{
	DEFAULT_TIMER_MINUTES, NewSession, NewUser, TimeWindow, format_minutes,
	parse_session_timestamp,
};
use crate::stats::StudyStats;

#[derive(Debug, Parser)]
#[command(name = "study-stats", about = "Study timer client and statistics", version)]
struct Cli {
	#[arg(long, global = true)]
	config: Option<PathBuf>,
	#[arg(short, long, global = true)]
	verbose: bool,
	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	Login {
		#[arg(long)]
		email: String,
		#[arg(long)]
		password: String,
	},
	Register {
		#[arg(long)]
		username: String,
		#[arg(long)]
		email: String,
		#[arg(long)]
		password: String,
		#[arg(long)]
		first_name: String,
		#[arg(long)]
		last_name: String,
	},
	Logout,
	/// Study time per subject for a day, week, month or year.
	Stats {
		#[arg(long, value_enum, default_value_t = TimeWindow::Day)]
		window: TimeWindow,
		/// Reference time instead of now, e.g. "2024-06-15 10:00:00".
		#[arg(long)]
		at: Option<String>,
		/// Print every window from a single fetch.
		#[arg(long)]
		all: bool,
	},
	Sessions {
		#[command(subcommand)]
		action: SessionAction,
	},
	Tags {
		#[command(subcommand)]
		action: TagAction,
	},
	Presets {
		#[command(subcommand)]
		action: PresetAction,
	},
	Account {
		#[command(subcommand)]
		action: AccountAction,
	},
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Debug, Subcommand)]
enum SessionAction {
	/// Record a completed session that ends now.
	Record {
		#[arg(long, conflicts_with = "preset")]
		minutes: Option<u32>,
		#[arg(long)]
		preset: Option<i64>,
		#[arg(long)]
		tag: Option<i64>,
	},
	/// Delete every recorded session.
	Clear,
}

#[derive(Debug, Subcommand)]
enum TagAction {
	List,
	Add {
		#[arg(long)]
		name: String,
	},
	Remove {
		#[arg(long)]
		id: i64,
	},
}

#[derive(Debug, Subcommand)]
enum PresetAction {
	List,
	Add {
		#[arg(long)]
		minutes: u32,
	},
	Remove {
		#[arg(long)]
		id: i64,
	},
}

#[derive(Debug, Subcommand)]
enum AccountAction {
	Show,
	Update {
		#[arg(long)]
		field: String,
		#[arg(long)]
		value: String,
	},
	Delete,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
	Show,
	Init,
	Path,
}

struct Context {
	config: Config,
	config_path: PathBuf,
	credentials_path: PathBuf,
}

impl Context {
	fn client(&self) -> Result<ApiClient, ApiError> {
		ApiClient::new(&self.config)
	}

	fn token(&self) -> Result<String, Box<dyn Error>> {
		load_credentials(&self.credentials_path)?
			.map(|credentials| credentials.token)
			.ok_or_else(|| ApiError::NotLoggedIn.into())
	}

	/// Runs an authenticated call, forgetting the stored token if the server
	/// says it has expired.
	fn authed<T>(
		&self,
		action: impl FnOnce(&ApiClient, &str) -> Result<T, ApiError>,
	) -> Result<T, Box<dyn Error>> {
		let token = self.token()?;
		let client = self.client()?;
		match action(&client, &token) {
			Err(ApiError::SessionExpired) => {
				clear_credentials(&self.credentials_path)?;
				warn!("cleared expired credentials");
				Err(ApiError::SessionExpired.into())
			}
			result => Ok(result?),
		}
	}
}

fn main() {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	if let Err(err) = run(cli) {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn init_tracing(verbose: bool) {
	let filter = if verbose {
		EnvFilter::new("debug")
	} else {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("study_stats=info,warn"))
	};
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
	let config_path = resolve_config_path(cli.config);
	let config = Config::load(&config_path)?.with_api_url_override(std::env::var(API_URL_ENV).ok());
	let ctx = Context {
		config,
		config_path,
		credentials_path: credentials_path(),
	};

	match cli.command {
		Command::Login { email, password } => {
			login(&ctx, &email, &password)?;
		}
		Command::Register {
			username,
			email,
			password,
			first_name,
			last_name,
		} => {
			let user = NewUser {
				username,
				email,
				password,
				first_name,
				last_name,
			};
			ctx.client()?.register(&user)?;
			println!("registered {}", user.username);
			login(&ctx, &user.email, &user.password)?;
		}
		Command::Logout => {
			clear_credentials(&ctx.credentials_path)?;
			println!("logged out");
		}
		Command::Stats { window, at, all } => {
			let reference = parse_reference(at.as_deref())?;
			let mut stats = ctx.authed(|client, token| StudyStats::load(client, token, window, reference))?;
			println!("{} sessions fetched", stats.session_count());
			if all {
				for window in TimeWindow::ALL {
					stats.select(window, reference);
					print_stats(&stats, &ctx.config.chart);
					println!();
				}
			} else {
				print_stats(&stats, &ctx.config.chart);
			}
		}
		Command::Sessions { action } => run_session_action(&ctx, action)?,
		Command::Tags { action } => run_tag_action(&ctx, action)?,
		Command::Presets { action } => run_preset_action(&ctx, action)?,
		Command::Account { action } => run_account_action(&ctx, action)?,
		Command::Config { action } => run_config_action(&ctx, action)?,
	}

	Ok(())
}

fn login(ctx: &Context, email: &str, password: &str) -> Result<(), Box<dyn Error>> {
	let token = ctx.client()?.login(email, password)?;
	save_credentials(
		&ctx.credentials_path,
		&StoredCredentials::new(token, Some(email.to_string())),
	)?;
	println!("logged in as {email}");
	Ok(())
}

fn run_session_action(ctx: &Context, action: SessionAction) -> Result<(), Box<dyn Error>> {
	match action {
		SessionAction::Record {
			minutes,
			preset,
			tag,
		} => {
			let session = ctx.authed(|client, token| {
				let minutes = match preset {
					Some(preset_id) => client
						.presets(token)?
						.into_iter()
						.find(|preset| preset.session_id == preset_id)
						.map(|preset| preset.session_length_minutes)
						.ok_or_else(|| ApiError::Rejected(format!("preset not found: {preset_id}")))?,
					None => minutes.unwrap_or(DEFAULT_TIMER_MINUTES),
				};
				let subject = match tag {
					Some(tag_id) => Some(
						client
							.subjects(token)?
							.into_iter()
							.find(|subject| subject.subject_id == tag_id)
							.ok_or_else(|| ApiError::Rejected(format!("tag not found: {tag_id}")))?,
					),
					None => None,
				};
				let session = NewSession::completed(subject.as_ref(), minutes, Local::now().naive_local());
				client.record_session(token, &session)?;
				Ok(session)
			})?;
			println!(
				"recorded {} session ending {}{}",
				format_minutes(u64::from(session.session_duration)),
				session.session_end,
				session
					.subject_name
					.as_ref()
					.map(|name| format!(" tagged {name}"))
					.unwrap_or_default()
			);
		}
		SessionAction::Clear => {
			ctx.authed(|client, token| client.delete_all_sessions(token))?;
			println!("deleted all sessions");
		}
	}
	Ok(())
}

fn run_tag_action(ctx: &Context, action: TagAction) -> Result<(), Box<dyn Error>> {
	match action {
		TagAction::List => {
			let subjects = ctx.authed(|client, token| client.subjects(token))?;
			if subjects.is_empty() {
				println!("no tags yet");
			}
			for subject in subjects {
				println!("{} | {}", subject.subject_id, subject.subject_name);
			}
		}
		TagAction::Add { name } => {
			ctx.authed(|client, token| client.add_subject(token, &name))?;
			println!("added tag {name}");
		}
		TagAction::Remove { id } => {
			ctx.authed(|client, token| client.delete_subject(token, id))?;
			println!("removed tag {id}");
		}
	}
	Ok(())
}

fn run_preset_action(ctx: &Context, action: PresetAction) -> Result<(), Box<dyn Error>> {
	match action {
		PresetAction::List => {
			let presets = ctx.authed(|client, token| client.presets(token))?;
			println!("default | {}", format_minutes(u64::from(DEFAULT_TIMER_MINUTES)));
			for preset in presets {
				println!(
					"{} | {}",
					preset.session_id,
					format_minutes(u64::from(preset.session_length_minutes))
				);
			}
		}
		PresetAction::Add { minutes } => {
			ctx.authed(|client, token| client.add_preset(token, minutes))?;
			println!("added {} preset", format_minutes(u64::from(minutes)));
		}
		PresetAction::Remove { id } => {
			ctx.authed(|client, token| client.delete_preset(token, id))?;
			println!("removed preset {id}");
		}
	}
	Ok(())
}

fn run_account_action(ctx: &Context, action: AccountAction) -> Result<(), Box<dyn Error>> {
	match action {
		AccountAction::Show => {
			let profile = ctx.authed(|client, token| client.profile(token))?;
			let show = |value: Option<&String>| value.cloned().unwrap_or_else(|| "-".to_string());
			println!("username:   {}", show(profile.username.as_ref()));
			println!("email:      {}", show(profile.email.as_ref()));
			println!("first name: {}", show(profile.first_name.as_ref()));
			println!("last name:  {}", show(profile.last_name.as_ref()));
			if let Some(stored) = load_credentials(&ctx.credentials_path)? {
				println!(
					"signed in:  {} since {}",
					show(stored.email.as_ref()),
					stored.saved_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
				);
			}
		}
		AccountAction::Update { field, value } => {
			ctx.authed(|client, token| client.update_profile(token, &field, &value))?;
			println!("updated {field}");
		}
		AccountAction::Delete => {
			ctx.authed(|client, token| client.delete_account(token))?;
			clear_credentials(&ctx.credentials_path)?;
			println!("account deleted");
		}
	}
	Ok(())
}

fn run_config_action(ctx: &Context, action: ConfigAction) -> Result<(), Box<dyn Error>> {
	match action {
		ConfigAction::Show => {
			print!("{}", toml::to_string_pretty(&ctx.config)?);
		}
		ConfigAction::Init => {
			if ctx.config_path.exists() {
				println!("config already exists at {}", ctx.config_path.display());
			} else {
				Config::default().save(&ctx.config_path)?;
				println!("wrote default config to {}", ctx.config_path.display());
			}
		}
		ConfigAction::Path => {
			println!("{}", ctx.config_path.display());
		}
	}
	Ok(())
}

fn parse_reference(input: Option<&str>) -> Result<NaiveDateTime, Box<dyn Error>> {
	match input {
		Some(raw) => parse_session_timestamp(raw)
			.ok_or_else(|| format!("invalid --at timestamp: {raw}").into()),
		None => Ok(Local::now().naive_local()),
	}
}

fn print_stats(stats: &StudyStats, style: &ChartStyle) {
	println!(
		"{} | {} across {} subject(s)",
		stats.window(),
		format_minutes(stats.total_minutes()),
		stats.groups().len()
	);

	match stats.chart(style) {
		Some(chart) => {
			for line in chart.render_lines(style) {
				println!("{line}");
			}
		}
		None => {
			for line in EMPTY_STATE {
				println!("{line}");
			}
		}
	}
}
