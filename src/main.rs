use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use governance::clock::{Clock, MockClock};
use governance::engine;
use governance::models::approval::{
    Metadata, NewApprovalRequest, RequestType, ReviewDecision, UserIdentity,
};
use governance::models::rule::{GovernanceRule, Operator, RuleType};
use governance::rules;
use governance::{ApprovalManager, MemoryStore};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "governance=info,hitl=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::Cli::parse();

    match args.command {
        cli::Commands::Evaluate {
            rules,
            request_type,
            metadata,
            tenant,
        } => handle_evaluate(&rules, &request_type, &metadata, tenant.as_deref()),
        cli::Commands::Lint { rules } => handle_lint(&rules),
        cli::Commands::Demo { tenant } => run_demo(&tenant).await,
    }
}

fn handle_evaluate(
    path: &std::path::Path,
    request_type: &str,
    metadata: &str,
    tenant: Option<&str>,
) -> anyhow::Result<()> {
    let mut rule_set = rules::load_rules(path)?;
    if let Some(tenant) = tenant {
        rule_set = rules::rules_for_tenant(&rule_set, tenant);
    }
    let request_type: RequestType = request_type.parse().map_err(anyhow::Error::msg)?;
    let metadata: Metadata =
        serde_json::from_str(metadata).context("--metadata must be a JSON object")?;

    let evaluation = engine::evaluate_rules(&rule_set, request_type, &metadata);
    println!("{}", serde_json::to_string_pretty(&evaluation)?);
    Ok(())
}

fn handle_lint(path: &std::path::Path) -> anyhow::Result<()> {
    let rule_set = rules::load_rules(path)?;
    let findings = rules::lint_rules(&rule_set);

    if findings.is_empty() {
        println!("{} rules, no findings.", rule_set.len());
        return Ok(());
    }

    println!("{:<8} {:<30} MESSAGE", "LEVEL", "RULE");
    for f in &findings {
        let level = match f.level {
            rules::LintLevel::Warning => "warning",
            rules::LintLevel::Error => "error",
        };
        println!("{:<8} {:<30} {}", level, f.rule_id, f.message);
    }

    if rules::has_errors(&findings) {
        anyhow::bail!("rule file {} has errors", path.display());
    }
    Ok(())
}

/// Walks one tenant through a day of approvals on a simulated clock.
async fn run_demo(tenant: &str) -> anyhow::Result<()> {
    let cfg = governance::config::load()?;
    let clock = MockClock::new(chrono::Utc::now() - Duration::hours(14));
    let manager = ApprovalManager::with_config(
        Arc::new(MemoryStore::new()),
        Arc::new(clock.clone()),
        cfg,
    )?;

    let rule_set = vec![GovernanceRule::new(
        "large-audiences",
        tenant,
        RequestType::Activation,
        RuleType::ThresholdBased,
    )
    .with_condition("audienceSize", Operator::Gt, json!(10000))
    .with_approvers(["u-legal"])];

    let marketer = UserIdentity::new("u-mkt", "Mia", "mia@example.com", "marketer");
    let legal = UserIdentity::new("u-legal", "Leo", "leo@example.com", "legal");

    let mut created = Vec::new();
    for (title, size) in [
        ("Spring sale lookalikes", 250_000),
        ("Churn win-back", 40_000),
        ("VIP preview", 12_000),
        ("Store staff list", 80),
    ] {
        let mut metadata = Metadata::new();
        metadata.insert("audienceSize".into(), json!(size));
        let evaluation = engine::evaluate_rules(&rule_set, RequestType::Activation, &metadata);
        if !evaluation.required {
            println!("'{}' needs no approval (audienceSize {})", title, size);
            continue;
        }
        let fields = NewApprovalRequest::new(RequestType::Activation, tenant, title, marketer.clone())
            .with_metadata(metadata);
        created.push(manager.create_from_evaluation(fields, &evaluation).await?);
        clock.advance(Duration::hours(4) + Duration::minutes(30));
    }

    if let [first, second, ..] = created.as_slice() {
        manager
            .approve(
                first.id,
                ReviewDecision::by(legal.clone()).with_reason("consent verified"),
            )
            .await?;
        manager.cancel(second.id, &marketer.user_id).await?;
    }

    let queue = manager.get_queue(tenant).await?;
    let mut trail = Vec::new();
    for req in &created {
        trail.push(json!({
            "requestId": req.id,
            "events": manager.get_audit_log(req.id).await?,
        }));
    }
    manager.verify_audit_chain().await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "now": clock.now(),
            "queue": queue,
            "audit": trail,
        }))?
    );
    Ok(())
}
