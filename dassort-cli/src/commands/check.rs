//! `dassort check`: load the configuration and show what was understood.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use dassort_core::{config, Profile, RouterConfig, Settings};
use dassort_renderer::referenced_names;
use dassort_router::Router;

use super::args::RunArgs;

/// Always bound when a destination path is rendered.
const PATH_BUILTINS: &[&str] = &["root", "sub_folder", "sub"];
/// Bound when a follow-up command is rendered.
const COMMAND_VARS: &[&str] = &["path", "file", "dest", "user", "host", "cmd_host"];

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct CheckJson<'a> {
    config_dir: String,
    profiles: &'a [Profile],
    router: Option<&'a RouterConfig>,
    warnings: Vec<String>,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "profile")]
    name: String,
    #[tabled(rename = "keys → vars")]
    bindings: String,
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "root")]
    root: String,
    #[tabled(rename = "remote")]
    remote: String,
    #[tabled(rename = "triggers")]
    triggers: String,
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "field")]
    field: String,
    #[tabled(rename = "pattern")]
    pattern: String,
    #[tabled(rename = "flags")]
    flags: String,
    #[tabled(rename = "profile")]
    profile: String,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let config_dir = self.run.config_dir()?;
        let settings = config::load_dir(&config_dir, &self.run.defaults()?)
            .with_context(|| format!("invalid configuration in {}", config_dir.display()))?;
        if let Some(router) = &settings.router {
            Router::new(router).context("invalid router")?;
        }
        let warnings = unbound_variables(&settings);

        if self.json {
            let payload = CheckJson {
                config_dir: config_dir.display().to_string(),
                profiles: &settings.profiles,
                router: settings.router.as_ref(),
                warnings,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize config JSON")?
            );
            return Ok(());
        }

        print_tables(&settings);
        for warning in &warnings {
            println!("{} {warning}", "warning:".yellow().bold());
        }
        println!("✓ configuration in {} is valid", config_dir.display());
        Ok(())
    }
}

/// Template names that nothing binds. Such a group would fail to resolve on
/// every poll.
fn unbound_variables(settings: &Settings) -> Vec<String> {
    let mut warnings = Vec::new();
    for profile in &settings.profiles {
        let bound: BTreeSet<&str> = profile
            .map
            .iter()
            .map(String::as_str)
            .chain(PATH_BUILTINS.iter().copied())
            .collect();
        for name in referenced_names(&profile.path_template) {
            if !bound.contains(name) {
                warnings.push(format!(
                    "{}: path uses ${{{name}}}, which no key maps to",
                    profile.name
                ));
            }
        }
        for rule in &profile.commands {
            for name in referenced_names(&rule.run) {
                if !COMMAND_VARS.contains(&name) {
                    warnings.push(format!(
                        "{}: command for '{}' uses unknown ${{{name}}}",
                        profile.name, rule.ext
                    ));
                }
            }
        }
    }
    warnings
}

fn print_tables(settings: &Settings) {
    let rows: Vec<ProfileRow> = settings
        .profiles
        .iter()
        .map(|p| ProfileRow {
            name: p.name.to_string(),
            bindings: p
                .bindings()
                .map(|(key, var, default)| format!("{key} → {var} ({default})"))
                .collect::<Vec<_>>()
                .join("\n"),
            path: p.path_template.clone(),
            root: p.destination_root.clone(),
            remote: match p.remote.copy_protocol {
                dassort_core::CopyProtocol::NoCopy => "nocopy".to_string(),
                dassort_core::CopyProtocol::Scp => {
                    format!("scp {}@{}", p.remote.user, p.remote.host)
                }
            },
            triggers: p
                .commands
                .iter()
                .map(|c| c.ext.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let Some(router) = &settings.router else {
        println!("No router: every group uses {}.", first_profile(settings).bold());
        return;
    };
    let rows: Vec<RuleRow> = router
        .rules
        .iter()
        .enumerate()
        .map(|(index, r)| {
            let mut flags = Vec::new();
            if r.exact {
                flags.push("exact");
            }
            if r.case_insensitive {
                flags.push("ignore-case");
            }
            if r.invert {
                flags.push("invert");
            }
            RuleRow {
                index,
                field: r.field.clone(),
                pattern: r.pattern.clone(),
                flags: flags.join(","),
                profile: r.profile.to_string(),
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", "Router (first hit wins)".bold());
    println!("{table}");
}

fn first_profile(settings: &Settings) -> String {
    settings
        .default_profile()
        .map(|p| p.name.to_string())
        .unwrap_or_default()
}
