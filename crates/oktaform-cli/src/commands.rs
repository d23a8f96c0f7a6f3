use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr, bail, eyre};
use serde_json::Value;

use oktaform_client::OktaClient;
use oktaform_provider::{
    ApplyReport, Declarations, Plan, ProviderContext, ProviderState, Registry, ResourceAddr,
    StatePersistence,
};

use crate::cli::Cli;
use crate::config;

/// Everything a command needs: declarations, state, and a connected provider.
pub struct Session {
    pub registry: Registry,
    pub decls: Declarations,
    pub provider: ProviderContext,
    pub persistence: StatePersistence,
    pub state: ProviderState,
}

impl Session {
    pub async fn open(cli: &Cli) -> Result<Self> {
        let decls = Declarations::load(&cli.config)
            .wrap_err_with(|| format!("failed to load {}", cli.config.display()))?;
        let resolved = config::resolve(&cli.env, &decls.provider, cli.parallelism)?;
        let client = OktaClient::new(resolved.client).wrap_err("failed to build API client")?;
        let provider = ProviderContext::new(client, resolved.settings);

        let persistence = StatePersistence::new(state_path(&cli.config, cli.state.as_deref()));
        let state = persistence.load().await?;
        tracing::info!(
            declarations = decls.resources.len(),
            tracked = state.resources.len(),
            state = %persistence.path.display(),
            "session opened"
        );

        // First Ctrl-C cancels in-flight operations; their records are still flushed.
        let cancel = provider.cancel_token().clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling in-flight operations");
                cancel.cancel();
            }
        });

        Ok(Self {
            registry: Registry::okta(),
            decls,
            provider,
            persistence,
            state,
        })
    }

    async fn refresh(&mut self) -> Result<()> {
        let report = oktaform_provider::refresh(
            &self.provider,
            &self.registry,
            &self.decls,
            &mut self.state,
            &self.persistence,
        )
        .await?;
        for addr in &report.vanished {
            println!("{addr}: deleted outside oktaform, will be recreated");
        }
        Ok(())
    }

    fn plan(&self) -> Result<Plan> {
        Ok(oktaform_provider::plan(&self.registry, &self.decls, &self.state)?)
    }
}

/// `<config stem>.state.json` beside the declarations unless given.
pub fn state_path(config: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => config.with_extension("state.json"),
    }
}

// ── Commands ─────────────────────────────────────────────────────

pub async fn plan(cli: &Cli, refresh: bool) -> Result<()> {
    let mut session = Session::open(cli).await?;
    if refresh {
        session.refresh().await?;
    }
    let plan = session.plan()?;
    print_plan(&session.registry, &plan);
    Ok(())
}

pub async fn apply(cli: &Cli, refresh: bool) -> Result<()> {
    let mut session = Session::open(cli).await?;
    if refresh {
        session.refresh().await?;
    }
    let plan = session.plan()?;
    print_plan(&session.registry, &plan);
    if !plan.has_changes() {
        return Ok(());
    }

    let report = oktaform_provider::apply(
        &session.provider,
        &session.registry,
        &session.decls,
        &plan,
        &mut session.state,
        &session.persistence,
    )
    .await?;
    finish(
        &report,
        &format!(
            "Apply complete: {} added, {} changed, {} replaced, {} destroyed.",
            report.created, report.updated, report.replaced, report.deleted
        ),
    )
}

pub async fn destroy(cli: &Cli) -> Result<()> {
    let mut session = Session::open(cli).await?;
    if session.state.resources.is_empty() {
        println!("Nothing to destroy.");
        return Ok(());
    }
    let report = oktaform_provider::destroy_all(
        &session.provider,
        &session.registry,
        &session.decls,
        &mut session.state,
        &session.persistence,
    )
    .await?;
    finish(&report, &format!("Destroy complete: {} destroyed.", report.deleted))
}

pub async fn import(cli: &Cli, address: &str, id: &str) -> Result<()> {
    let addr: ResourceAddr = address.parse().map_err(|e: String| eyre!(e))?;
    let mut session = Session::open(cli).await?;
    let observed = oktaform_provider::import(
        &session.provider,
        &session.registry,
        &addr,
        id,
        &mut session.state,
        &session.persistence,
    )
    .await?;
    println!("{addr}: imported");
    let schema = session.registry.get(&addr.resource_type)?.schema();
    for (name, value) in &observed.attributes {
        let sensitive = schema.get(name).is_some_and(|a| a.sensitive);
        if sensitive {
            println!("    {name} = (sensitive)");
        } else {
            println!("    {name} = {value}");
        }
    }
    Ok(())
}

pub fn schema() -> Result<()> {
    let registry = Registry::okta();
    println!("{}", serde_json::to_string_pretty(&registry.schemas())?);
    Ok(())
}

// ── Output ───────────────────────────────────────────────────────

fn print_plan(registry: &Registry, plan: &Plan) {
    if !plan.has_changes() {
        println!("No changes. The org matches the declarations.");
        return;
    }
    println!("{}", redacted(registry, plan));
}

/// Copy of `plan` with sensitive attribute values masked.
fn redacted(registry: &Registry, plan: &Plan) -> Plan {
    let mut plan = plan.clone();
    for entry in &mut plan.entries {
        let Ok(resource) = registry.get(&entry.addr.resource_type) else {
            continue;
        };
        for change in &mut entry.changes {
            if resource.schema().get(&change.attribute).is_some_and(|a| a.sensitive) {
                change.before = Value::from("(sensitive)");
                change.after = Value::from("(sensitive)");
            }
        }
    }
    plan
}

fn finish(report: &ApplyReport, summary: &str) -> Result<()> {
    for (addr, err) in &report.failures {
        eprintln!("Error: {addr}: {err}");
    }
    if !report.is_success() {
        bail!("{} operation(s) failed", report.failures.len());
    }
    println!("{summary}");
    Ok(())
}
