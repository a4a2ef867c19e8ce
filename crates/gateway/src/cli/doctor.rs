use sark_domain::config::{ConfigSeverity, PolicyEngineKind};
use std::str::FromStr;

use crate::config::GatewayConfig;

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &GatewayConfig, config_path: &str) -> anyhow::Result<bool> {
    println!("sark doctor");
    println!("===========\n");

    let mut all_passed = true;

    // 1. Config file
    check_config_file(config_path, &mut all_passed);

    // 2. Config validation
    check_config_validation(config, &mut all_passed);

    // 3. Budget timezone
    check_budget_timezone(config, &mut all_passed);

    // 4. Policy engine reachability
    check_policy_engine(config, &mut all_passed).await;

    // 5. Audit sink reachability
    check_audit_sinks(config, &mut all_passed).await;

    // Summary
    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists { config_path.to_owned() } else { format!("{config_path} not found (using defaults)") },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &GatewayConfig, all_passed: &mut bool) {
    let issues = config.core.validate();
    let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check("Config validation", error_count == 0, format!("{} issue(s) ({} error(s))", issues.len(), error_count));
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_budget_timezone(config: &GatewayConfig, all_passed: &mut bool) {
    let tz = &config.core.budget.timezone;
    let ok = chrono_tz::Tz::from_str(tz).is_ok();
    print_check("Budget timezone valid", ok, if ok { tz.clone() } else { format!("{tz} (unrecognized IANA timezone)") });
    if !ok {
        *all_passed = false;
    }
}

async fn check_policy_engine(config: &GatewayConfig, all_passed: &mut bool) {
    match config.core.policy.engine {
        PolicyEngineKind::Embedded => {
            let dir = std::path::Path::new(&config.core.policy.policy_dir);
            let ok = dir.exists();
            print_check(
                "Policy directory exists",
                ok,
                if ok { config.core.policy.policy_dir.clone() } else { format!("{} not found", config.core.policy.policy_dir) },
            );
            if !ok {
                *all_passed = false;
            }
        }
        PolicyEngineKind::Remote => {
            let Some(url) = &config.core.policy.remote_url else {
                print_check("Remote policy engine reachable", false, "policy.remote_url not set".into());
                *all_passed = false;
                return;
            };
            let reachable = match reqwest::Client::builder().timeout(std::time::Duration::from_secs(5)).build() {
                Ok(client) => client.get(url).send().await.is_ok(),
                Err(_) => false,
            };
            print_check("Remote policy engine reachable", reachable, if reachable { url.clone() } else { format!("{url} (unreachable)") });
            if !reachable {
                *all_passed = false;
            }
        }
    }
}

async fn check_audit_sinks(config: &GatewayConfig, all_passed: &mut bool) {
    if config.core.audit.sinks.is_empty() {
        print_check("Audit sinks configured", true, "none (events fall back to local disk only)".into());
        return;
    }

    let client = match reqwest::Client::builder().timeout(std::time::Duration::from_secs(5)).build() {
        Ok(c) => c,
        Err(e) => {
            print_check("Audit sinks reachable", false, format!("could not build HTTP client: {e}"));
            *all_passed = false;
            return;
        }
    };

    for sink in &config.core.audit.sinks {
        let reachable = client.get(&sink.endpoint).send().await.is_ok();
        print_check(
            &format!("Audit sink reachable ({:?})", sink.kind),
            reachable,
            if reachable { sink.endpoint.clone() } else { format!("{} (unreachable)", sink.endpoint) },
        );
        if !reachable {
            *all_passed = false;
        }
    }
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
