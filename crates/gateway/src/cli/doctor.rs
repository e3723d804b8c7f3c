use agentd_domain::config::{Config, ConfigSeverity};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least one
/// check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("agentd doctor");
    println!("=============\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_llm_reachable(config, &mut all_passed).await;
    check_auth_secret(config, &mut all_passed);
    check_directory("persistence.state_dir", std::path::Path::new(&config.persistence.state_dir), &mut all_passed);
    check_directory("tools.workspace_root", std::path::Path::new(&config.tools.workspace_root), &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

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

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check("Config validation", error_count == 0, format!("{} issue(s) ({error_count} error(s))", issues.len()));
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

async fn check_llm_reachable(config: &Config, all_passed: &mut bool) {
    let url = &config.llm.base_url;
    let reachable = match reqwest::Client::builder().timeout(std::time::Duration::from_secs(5)).build() {
        Ok(client) => client.get(url).send().await.is_ok(),
        Err(_) => false,
    };

    print_check("LLM endpoint reachable", reachable, if reachable { url.clone() } else { format!("{url} (unreachable)") });

    if !reachable {
        *all_passed = false;
    }
}

fn check_auth_secret(config: &Config, all_passed: &mut bool) {
    if !config.auth.enabled {
        print_check("Auth secret", true, "auth disabled".into());
        return;
    }
    let present = std::env::var(&config.auth.jwt_secret_env).map(|v| !v.is_empty()).unwrap_or(false);
    print_check(
        "Auth secret",
        present,
        if present { format!("found in {}", config.auth.jwt_secret_env) } else { format!("{} not set", config.auth.jwt_secret_env) },
    );
    if !present {
        *all_passed = false;
    }
}

fn check_directory(label: &str, path: &std::path::Path, all_passed: &mut bool) {
    let exists = path.exists();
    let writable = if exists {
        let probe = path.join(".agentd_doctor_probe");
        let w = std::fs::write(&probe, b"probe").is_ok();
        let _ = std::fs::remove_file(&probe);
        w
    } else {
        false
    };

    let ok = exists && writable;
    let detail = match (exists, writable) {
        (true, true) => format!("{} (writable)", path.display()),
        (true, false) => format!("{} (not writable)", path.display()),
        _ => format!("{} (does not exist)", path.display()),
    };

    print_check(label, ok, detail);

    if !ok {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
